// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::convert::Infallible;

use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::TensorFrame, model::DetectionResult, output::Render,
};

/// `log://`，带 `?boxes` 时逐个打印检测框
#[derive(Debug, Default)]
pub struct LogOutput {
  boxes: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = Infallible;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Ok(LogOutput {
      boxes: url.query_pairs().any(|(k, _)| k == "boxes"),
    })
  }
}

impl Render<TensorFrame, DetectionResult> for LogOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &TensorFrame, result: &DetectionResult) -> Result<(), Self::Error> {
    let counts = result
      .class_counts
      .iter()
      .filter(|(_, n)| **n > 0)
      .map(|(name, n)| format!("{}={}", name, n))
      .collect::<Vec<_>>()
      .join(", ");
    info!(
      "第 {} 帧: 共 {} 个目标 [{}]",
      frame.index(),
      result.total_count,
      counts
    );
    if self.boxes {
      for detection in &result.boxes {
        let [a, b, c, d] = detection.corners;
        info!(
          "  {} ({:.4}): {} {} {} {}",
          detection.label.as_deref().unwrap_or("?"),
          detection.confidence,
          a,
          b,
          c,
          d
        );
      }
    }
    Ok(())
  }
}
