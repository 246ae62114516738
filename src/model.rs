// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/model.rs - 检测结果与检测器定义
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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{self, Quad};

mod decode;
mod nms;

pub use self::decode::{DecodeOptions, Layout, LayoutStrategy, Scale, decode_corners, decode_frame};
pub use self::nms::nms;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
  #[error("模型输出格式错误: {0}")]
  MalformedOutput(String),
}

impl DetectError {
  pub fn malformed(msg: impl Into<String>) -> Self {
    DetectError::MalformedOutput(msg.into())
  }
}

/// 解码后、NMS 之前的候选框
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CandidateBox {
  /// 零旋转时依次为 左上、右上、右下、左下
  pub corners: Quad,
  /// 最高类别分数，原样保留；经过 sigmoid 的模型输出在 [0, 1] 内
  pub confidence: f32,
  pub class_index: usize,
}

/// 检测器种类：轴对齐框与旋转框共用置信度过滤和计数，只在行宽、解码和 IoU 上不同
#[derive(
  Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Detector {
  /// 每行 `[cx, cy, w, h, scores...]`
  AxisAligned,
  /// 每行 `[cx, cy, w, h, scores..., angle]`
  #[default]
  Oriented,
}

impl Detector {
  /// 每个检测占用的数值个数
  pub fn attributes(self, num_classes: usize) -> usize {
    match self {
      Detector::AxisAligned => 4 + num_classes,
      Detector::Oriented => 5 + num_classes,
    }
  }

  pub fn iou(self, a: &CandidateBox, b: &CandidateBox) -> f32 {
    match self {
      Detector::AxisAligned => geometry::axis_aligned_iou(&a.corners, &b.corners),
      Detector::Oriented => geometry::rotated_iou(&a.corners, &b.corners),
    }
  }
}

/// NMS 保留下来的检测
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
  pub corners: Quad,
  pub confidence: f32,
  pub class_index: usize,
  /// 类别名称；类别序号超出标签表时为空
  pub label: Option<String>,
}

/// 一帧的检测结果
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetectionResult {
  /// 按 NMS 接受顺序排列，置信度从高到低
  pub boxes: Vec<Detection>,
  pub class_counts: BTreeMap<String, usize>,
  pub total_count: usize,
}

impl DetectionResult {
  /// 所有类别计数为 0 的空结果
  pub fn empty(class_names: &[String]) -> Self {
    Self {
      boxes: Vec::new(),
      class_counts: class_names.iter().map(|name| (name.clone(), 0)).collect(),
      total_count: 0,
    }
  }

  /// 由 NMS 的输出统计各类别数量；没有标签的类别序号不参与分类计数
  pub fn tally(kept: Vec<CandidateBox>, class_names: &[String]) -> Self {
    let mut result = Self::empty(class_names);
    result.total_count = kept.len();
    result.boxes = kept
      .into_iter()
      .map(|candidate| {
        let label = class_names.get(candidate.class_index).cloned();
        if let Some(name) = &label {
          *result.class_counts.entry(name.clone()).or_insert(0) += 1;
        }
        Detection {
          corners: candidate.corners,
          confidence: candidate.confidence,
          class_index: candidate.class_index,
          label,
        }
      })
      .collect();
    result
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn count_of(&self, label: &str) -> usize {
    self.class_counts.get(label).copied().unwrap_or(0)
  }
}
