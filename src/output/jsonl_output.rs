// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/output/jsonl_output.rs - JSON Lines 结果输出
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::TensorFrame, model::DetectionResult, output::Render,
};

#[derive(Error, Debug)]
pub enum JsonlOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  frame: u64,
  #[serde(flatten)]
  result: &'a DetectionResult,
}

/// `jsonl:///path/to/result.jsonl`，每帧一行
pub struct JsonlOutput {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for JsonlOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlOutput {
  type Error = JsonlOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonlOutputError::SchemeMismatch);
    }
    let file = File::create(url.path())?;
    info!("结果写入: {}", url.path());
    Ok(JsonlOutput {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl Render<TensorFrame, DetectionResult> for JsonlOutput {
  type Error = JsonlOutputError;

  fn render_result(&self, frame: &TensorFrame, result: &DetectionResult) -> Result<(), Self::Error> {
    let record = FrameRecord {
      frame: frame.index(),
      result,
    };
    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    serde_json::to_writer(&mut *writer, &record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}
