// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/input/json_file.rs - JSON 张量输入
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::TensorFrame};

#[derive(Error, Debug)]
pub enum JsonFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
  Many(Vec<TensorFrame>),
  One(TensorFrame),
}

/// `json:///path/to/frames.json`，内容为 `{"shape": [...], "data": [...]}` 或其数组
pub struct JsonFileInput {
  frames: std::vec::IntoIter<TensorFrame>,
  next_index: u64,
}

impl FromUrlWithScheme for JsonFileInput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileInput {
  type Error = JsonFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonFileInputError::SchemeMismatch);
    }
    let text = std::fs::read_to_string(url.path())?;
    let input = Self::from_json(&text)?;
    info!("JSON 输入: {} 帧", input.frames.len());
    Ok(input)
  }
}

impl JsonFileInput {
  pub fn from_json(text: &str) -> Result<Self, JsonFileInputError> {
    let frames = match serde_json::from_str::<OneOrMany>(text)? {
      OneOrMany::Many(frames) => frames,
      OneOrMany::One(frame) => vec![frame],
    };
    Ok(Self {
      frames: frames.into_iter(),
      next_index: 0,
    })
  }
}

impl Iterator for JsonFileInput {
  type Item = TensorFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let frame = self.frames.next()?.with_index(self.next_index);
    self.next_index += 1;
    Some(frame)
  }
}
