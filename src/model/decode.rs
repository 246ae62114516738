// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/model/decode.rs - 模型输出解码
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

use ndarray::{ArrayView1, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::frame::TensorFrame;
use crate::geometry::{Point, Quad};
use crate::model::{CandidateBox, DetectError, Detector};

/// 张量布局选择策略
#[derive(
  Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutStrategy {
  /// `[num_detections][attributes]`
  Rows,
  /// `[attributes][num_detections]`
  Columns,
  /// 按形状判断；两个轴都等于属性个数时按列处理
  #[default]
  Auto,
}

/// 判定后的实际布局
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
  Rows,
  Columns,
}

impl LayoutStrategy {
  /// 返回实际布局和检测数量。
  ///
  /// 去掉前导的大小为 1 的批次维度后必须是二维；一维的扁平数据只接受显式的
  /// `Rows` / `Columns`，`Auto` 无法从中判断。
  pub fn resolve(self, shape: &[usize], attributes: usize) -> Result<(Layout, usize), DetectError> {
    if attributes == 0 {
      return Err(DetectError::malformed("每个检测的属性个数为 0"));
    }

    let mut dims = shape;
    while dims.len() > 2 && dims[0] == 1 {
      dims = &dims[1..];
    }

    let resolved = match (self, dims) {
      (LayoutStrategy::Rows, &[n, b]) if b == attributes => Some((Layout::Rows, n)),
      (LayoutStrategy::Columns, &[a, n]) if a == attributes => Some((Layout::Columns, n)),
      (LayoutStrategy::Auto, &[a, n]) if a == attributes => Some((Layout::Columns, n)),
      (LayoutStrategy::Auto, &[n, b]) if b == attributes => Some((Layout::Rows, n)),
      (LayoutStrategy::Rows, &[len]) if len % attributes == 0 => {
        Some((Layout::Rows, len / attributes))
      }
      (LayoutStrategy::Columns, &[len]) if len % attributes == 0 => {
        Some((Layout::Columns, len / attributes))
      }
      _ => None,
    };

    resolved.ok_or_else(|| {
      DetectError::malformed(format!(
        "形状 {:?} 无法按 {:?} 策略解释为每个检测 {} 个属性",
        shape, self, attributes
      ))
    })
  }
}

/// 模型输入坐标到显示坐标的缩放比例
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Scale {
  pub x: f32,
  pub y: f32,
}

impl Default for Scale {
  fn default() -> Self {
    Self { x: 1.0, y: 1.0 }
  }
}

/// 单帧解码参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeOptions {
  pub detector: Detector,
  pub num_classes: usize,
  pub scale: Scale,
  pub layout: LayoutStrategy,
  pub conf_threshold: f32,
}

/// 由中心、尺寸和弧度角计算四个角点（左上、右上、右下、左下）
pub fn decode_corners(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> Quad {
  let (hw, hh) = (w / 2.0, h / 2.0);
  let (sin, cos) = angle.sin_cos();
  [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
    .map(|(dx, dy)| Point::new(cx + cos * dx - sin * dy, cy + sin * dx + cos * dy))
}

/// 将一帧输出解码为候选框，只保留置信度严格大于阈值的检测。
///
/// 返回的迭代器惰性地遍历每一行一次。
pub fn decode_frame(
  frame: &TensorFrame,
  options: DecodeOptions,
) -> Result<impl Iterator<Item = CandidateBox> + '_, DetectError> {
  if options.num_classes == 0 {
    return Err(DetectError::malformed("类别数量为 0"));
  }

  let attributes = options.detector.attributes(options.num_classes);
  let view: ArrayView2<'_, f32> = if frame.is_empty() {
    ArrayView2::from_shape((0, attributes), frame.data())
      .map_err(|e| DetectError::malformed(e.to_string()))?
  } else {
    let (layout, num_detections) = options.layout.resolve(frame.shape(), attributes)?;
    let expected = num_detections.checked_mul(attributes).ok_or_else(|| {
      DetectError::malformed(format!("形状 {:?} 的数值个数溢出", frame.shape()))
    })?;
    if expected != frame.data().len() {
      return Err(DetectError::malformed(format!(
        "形状 {:?} 需要 {} 个数值，实际为 {}",
        frame.shape(),
        expected,
        frame.data().len()
      )));
    }
    debug!(
      "解码第 {} 帧: 布局 {:?}, {} 个检测, 每个 {} 个属性",
      frame.index(),
      layout,
      num_detections,
      attributes
    );
    match layout {
      Layout::Rows => ArrayView2::from_shape((num_detections, attributes), frame.data()),
      Layout::Columns => ArrayView2::from_shape((attributes, num_detections), frame.data())
        .map(|columns| columns.reversed_axes()),
    }
    .map_err(|e| DetectError::malformed(e.to_string()))?
  };

  let rows = view.nrows();
  Ok((0..rows).filter_map(move |i| decode_row(view.index_axis_move(Axis(0), i), &options)))
}

/// 取最大分数的类别，分数相同时取序号较小者
fn argmax(scores: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
  scores
    .iter()
    .copied()
    .enumerate()
    .fold(None, |best, (index, score)| match best {
      Some((_, best_score)) if score <= best_score || score.is_nan() => best,
      _ if score.is_nan() => best,
      _ => Some((index, score)),
    })
}

fn decode_row(row: ArrayView1<'_, f32>, options: &DecodeOptions) -> Option<CandidateBox> {
  let num_classes = options.num_classes;
  let (class_index, confidence) = argmax(row.slice(s![4..4 + num_classes]))?;
  if confidence <= options.conf_threshold {
    return None;
  }

  // 先缩放到显示坐标，再旋转
  let cx = row[0] * options.scale.x;
  let cy = row[1] * options.scale.y;
  let w = row[2].max(0.0) * options.scale.x;
  let h = row[3].max(0.0) * options.scale.y;
  let angle = match options.detector {
    Detector::AxisAligned => 0.0,
    Detector::Oriented => row[4 + num_classes],
  };

  Some(CandidateBox {
    corners: decode_corners(cx, cy, w, h, angle),
    confidence,
    class_index,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::f32::consts::FRAC_PI_2;

  fn options(detector: Detector, num_classes: usize) -> DecodeOptions {
    DecodeOptions {
      detector,
      num_classes,
      scale: Scale::default(),
      layout: LayoutStrategy::Auto,
      conf_threshold: 0.35,
    }
  }

  fn assert_point(p: Point, x: f32, y: f32) {
    assert!((p.x - x).abs() < 1e-4 && (p.y - y).abs() < 1e-4, "{} != ({}, {})", p, x, y);
  }

  #[test]
  fn corners_without_rotation() {
    let c = decode_corners(10.0, 20.0, 4.0, 2.0, 0.0);
    assert_point(c[0], 8.0, 19.0);
    assert_point(c[1], 12.0, 19.0);
    assert_point(c[2], 12.0, 21.0);
    assert_point(c[3], 8.0, 21.0);
  }

  #[test]
  fn corners_rotated_quarter_turn() {
    let c = decode_corners(0.0, 0.0, 4.0, 2.0, FRAC_PI_2);
    assert_point(c[0], 1.0, -2.0);
    assert_point(c[1], 1.0, 2.0);
    assert_point(c[2], -1.0, 2.0);
    assert_point(c[3], -1.0, -2.0);
  }

  #[test]
  fn resolve_layouts() {
    assert_eq!(LayoutStrategy::Auto.resolve(&[1, 20, 8400], 20), Ok((Layout::Columns, 8400)));
    assert_eq!(LayoutStrategy::Auto.resolve(&[1, 8400, 20], 20), Ok((Layout::Rows, 8400)));
    assert_eq!(LayoutStrategy::Auto.resolve(&[20, 20], 20), Ok((Layout::Columns, 20)));
    assert_eq!(LayoutStrategy::Rows.resolve(&[20, 20], 20), Ok((Layout::Rows, 20)));
    assert_eq!(LayoutStrategy::Rows.resolve(&[60], 20), Ok((Layout::Rows, 3)));
    assert!(LayoutStrategy::Auto.resolve(&[60], 20).is_err());
    assert!(LayoutStrategy::Rows.resolve(&[1, 20, 8400], 20).is_err());
    assert!(LayoutStrategy::Auto.resolve(&[2, 20, 8400], 20).is_err());
    assert!(LayoutStrategy::Auto.resolve(&[1, 19, 8400], 20).is_err());
  }

  #[test]
  fn rows_and_columns_decode_the_same_boxes() {
    // 两个检测，两个类别：[cx, cy, w, h, s0, s1, angle]
    let rows = vec![
      10.0, 10.0, 4.0, 2.0, 0.9, 0.1, 0.0, //
      50.0, 40.0, 6.0, 6.0, 0.2, 0.6, 0.5,
    ];
    let mut columns = vec![0.0; rows.len()];
    for d in 0..2 {
      for a in 0..7 {
        columns[a * 2 + d] = rows[d * 7 + a];
      }
    }

    let by_rows: Vec<_> = decode_frame(&TensorFrame::new(vec![2, 7], rows), options(Detector::Oriented, 2))
      .unwrap()
      .collect();
    let by_columns: Vec<_> =
      decode_frame(&TensorFrame::new(vec![1, 7, 2], columns), options(Detector::Oriented, 2))
        .unwrap()
        .collect();

    assert_eq!(by_rows.len(), 2);
    assert_eq!(by_rows, by_columns);
    assert_eq!(by_rows[0].class_index, 0);
    assert_eq!(by_rows[1].class_index, 1);
    assert!((by_rows[1].confidence - 0.6).abs() < 1e-6);
  }

  #[test]
  fn confidence_must_exceed_threshold() {
    let data = vec![
      0.0, 0.0, 1.0, 1.0, 0.35, 0.0, //
      0.0, 0.0, 1.0, 1.0, 0.36, 0.0,
    ];
    let kept: Vec<_> = decode_frame(&TensorFrame::new(vec![2, 6], data), options(Detector::AxisAligned, 2))
      .unwrap()
      .collect();
    assert_eq!(kept.len(), 1);
    assert!((kept[0].confidence - 0.36).abs() < 1e-6);
  }

  #[test]
  fn argmax_ties_pick_first_class() {
    let data = vec![0.0, 0.0, 1.0, 1.0, 0.2, 0.7, 0.7, 0.0];
    let kept: Vec<_> = decode_frame(&TensorFrame::new(vec![1, 8], data), options(Detector::Oriented, 3))
      .unwrap()
      .collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].class_index, 1);
  }

  #[test]
  fn scaling_happens_before_rotation() {
    let mut opts = options(Detector::Oriented, 1);
    opts.scale = Scale { x: 2.0, y: 0.5 };
    let data = vec![10.0, 10.0, 4.0, 4.0, 0.9, FRAC_PI_2];
    let kept: Vec<_> = decode_frame(&TensorFrame::new(vec![1, 6], data), opts).unwrap().collect();
    // 缩放后中心 (20, 5)，尺寸 8x2，再旋转 90 度
    let expected = decode_corners(20.0, 5.0, 8.0, 2.0, FRAC_PI_2);
    for (got, want) in kept[0].corners.iter().zip(expected) {
      assert_point(*got, want.x, want.y);
    }
  }

  #[test]
  fn empty_frame_yields_nothing() {
    let frame = TensorFrame::new(vec![1, 20, 0], vec![]);
    assert_eq!(decode_frame(&frame, options(Detector::Oriented, 15)).unwrap().count(), 0);
  }

  #[test]
  fn oversized_shape_is_malformed() {
    let frame = TensorFrame::new(vec![1, 6, usize::MAX / 2], vec![0.0]);
    let err = decode_frame(&frame, options(Detector::Oriented, 1)).err();
    assert!(matches!(err, Some(DetectError::MalformedOutput(_))));
  }

  #[test]
  fn raw_scores_are_not_clamped() {
    let data = vec![
      0.0, 0.0, 1.0, 1.0, 2.5, 0.0, //
      9.0, 9.0, 1.0, 1.0, 1.5, 0.0,
    ];
    let kept: Vec<_> = decode_frame(&TensorFrame::new(vec![2, 6], data), options(Detector::Oriented, 1))
      .unwrap()
      .collect();
    let confidences: Vec<f32> = kept.iter().map(|c| c.confidence).collect();
    assert_eq!(confidences, vec![2.5, 1.5]);
  }

  #[test]
  fn data_length_mismatch_is_malformed() {
    let frame = TensorFrame::new(vec![1, 6, 2], vec![0.0; 5]);
    let err = decode_frame(&frame, options(Detector::Oriented, 1)).err();
    assert!(matches!(err, Some(DetectError::MalformedOutput(_))));
  }
}
