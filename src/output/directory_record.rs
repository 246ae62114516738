// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme, frame::TensorFrame, model::DetectionResult, output::Render,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录文件中类别一列的写法
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordLabel {
  #[default]
  Name,
  Id,
}

impl RecordLabel {
  /// 每个检测一行：`类别, 置信度, x1, y1, x2, y2, x3, y3, x4, y4`
  pub fn format(self, result: &DetectionResult) -> String {
    let mut records = Vec::with_capacity(result.boxes.len());
    for detection in result.boxes.iter() {
      let name = match (self, &detection.label) {
        (RecordLabel::Name, Some(label)) => label.clone(),
        _ => detection.class_index.to_string(),
      };
      let mut record = format!("{}, {:.4}", name, detection.confidence);
      for corner in detection.corners.iter() {
        record.push_str(&format!(", {:.4}, {:.4}", corner.x, corner.y));
      }
      records.push(record);
    }
    records.join("\n")
  }
}

/// `record:///path/to/dir?record=id&always`
///
/// 按 `年/月/日` 分目录，每帧写一个文本文件；默认只记录有检测结果的帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  label: RecordLabel,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let label = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| {
        if v == "id" {
          RecordLabel::Id
        } else {
          RecordLabel::Name
        }
      })
      .unwrap_or_default();
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      label,
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self.frame_counter.lock().unwrap_or_else(PoisonError::into_inner);
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn frame_path(&self, frame_index: u64) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}-{}.txt",
      now.format("%H-%M-%S"),
      self.frame_id(),
      frame_index
    )))
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }
}

impl Render<TensorFrame, DetectionResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &TensorFrame, result: &DetectionResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }
    let path = self.frame_path(frame.index())?;
    std::fs::write(&path, self.label.format(result))?;
    debug!("记录写入: {}", path.display());
    Ok(())
  }
}
