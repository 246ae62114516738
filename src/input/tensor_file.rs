// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/input/tensor_file.rs - 原始 f32 张量文件输入
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

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::TensorFrame};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("缺少 shape 参数，例如 ?shape=1,20,8400")]
  MissingShape,
  #[error("shape 参数格式错误: {0}")]
  InvalidShape(String),
  #[error("数据长度 {0} 字节不是 4 的整数倍")]
  TruncatedData(usize),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 读取小端序 f32 原始张量：单个文件为一帧，目录按文件名顺序每个文件一帧。
///
/// `tensor:///path/to/frames?shape=1,20,8400`
pub struct TensorFileInput {
  shape: Box<[usize]>,
  files: VecDeque<PathBuf>,
  next_index: u64,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemeMismatch);
    }

    let shape = url
      .query_pairs()
      .find(|(k, _)| k == "shape")
      .map(|(_, v)| parse_shape(&v))
      .ok_or(TensorFileInputError::MissingShape)??;

    let path = PathBuf::from(url.path());
    let files = if path.is_dir() {
      let mut files = std::fs::read_dir(&path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
      files.sort();
      files
    } else {
      vec![path]
    };
    info!("张量输入: {} 个文件, 形状 {:?}", files.len(), shape);

    Ok(TensorFileInput {
      shape,
      files: files.into(),
      next_index: 0,
    })
  }
}

/// 逗号或 `x` 分隔的维度列表
fn parse_shape(value: &str) -> Result<Box<[usize]>, TensorFileInputError> {
  value
    .split([',', 'x'])
    .map(|dim| {
      dim
        .trim()
        .parse::<usize>()
        .map_err(|_| TensorFileInputError::InvalidShape(value.to_string()))
    })
    .collect()
}

pub fn read_f32_le(path: &Path) -> Result<Vec<f32>, TensorFileInputError> {
  let bytes = std::fs::read(path)?;
  if bytes.len() % 4 != 0 {
    return Err(TensorFileInputError::TruncatedData(bytes.len()));
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

impl Iterator for TensorFileInput {
  type Item = TensorFrame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      match read_f32_le(&path) {
        Ok(data) => {
          debug!("读取张量文件: {} ({} 个数值)", path.display(), data.len());
          let frame = TensorFrame::new(self.shape.clone(), data).with_index(self.next_index);
          self.next_index += 1;
          return Some(frame);
        }
        Err(e) => {
          error!("读取张量文件 {} 失败, 跳过: {}", path.display(), e);
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_frame(dir: &Path, name: &str, values: &[f32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(dir.join(name), bytes).unwrap();
  }

  #[test]
  fn shape_parsing() {
    assert_eq!(&*parse_shape("1,20,8400").unwrap(), &[1, 20, 8400]);
    assert_eq!(&*parse_shape("20x8400").unwrap(), &[20, 8400]);
    assert!(parse_shape("1,,2").is_err());
  }

  #[test]
  fn reads_directory_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), "b.bin", &[3.0, 4.0]);
    write_frame(dir.path(), "a.bin", &[1.0, 2.0]);
    std::fs::write(dir.path().join("c.bin"), [0u8; 3]).unwrap();

    let url = Url::parse(&format!("tensor://{}?shape=1,2", dir.path().display())).unwrap();
    let frames: Vec<_> = TensorFileInput::from_url(&url).unwrap().collect();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].data(), &[1.0, 2.0]);
    assert_eq!(frames[1].data(), &[3.0, 4.0]);
    assert_eq!(frames[1].index(), 1);
    assert_eq!(frames[0].shape(), &[1, 2]);
  }

  #[test]
  fn requires_shape() {
    let url = Url::parse("tensor:///tmp/none.bin").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::MissingShape)
    ));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("json:///tmp/none.json?shape=1").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::SchemeMismatch)
    ));
  }
}
