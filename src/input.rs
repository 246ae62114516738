// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/input.rs - 模型输出张量输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

use crate::{FromUrl, frame::TensorFrame};

#[cfg(feature = "tensor_input")]
mod tensor_file;
#[cfg(feature = "tensor_input")]
pub use self::tensor_file::{TensorFileInput, TensorFileInputError};

#[cfg(feature = "json_input")]
mod json_file;
#[cfg(feature = "json_input")]
pub use self::json_file::{JsonFileInput, JsonFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "tensor_input")]
  #[error("张量文件输入错误: {0}")]
  TensorFileInputError(#[from] TensorFileInputError),
  #[cfg(feature = "json_input")]
  #[error("JSON 输入错误: {0}")]
  JsonFileInputError(#[from] JsonFileInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "tensor_input")]
  TensorFile(TensorFileInput),
  #[cfg(feature = "json_input")]
  JsonFile(JsonFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "tensor_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == TensorFileInput::SCHEME {
        let input = TensorFileInput::from_url(url)?;
        return Ok(InputWrapper::TensorFile(input));
      }
    }
    #[cfg(feature = "json_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == JsonFileInput::SCHEME {
        let input = JsonFileInput::from_url(url)?;
        return Ok(InputWrapper::JsonFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = TensorFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "tensor_input")]
      InputWrapper::TensorFile(input) => input.next(),
      #[cfg(feature = "json_input")]
      InputWrapper::JsonFile(input) => input.next(),
    }
  }
}
