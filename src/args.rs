// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/args.rs - 检测参数配置
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

use std::path::PathBuf;

use clap::Args;

use crate::config::{
  ConfigError, CountPolicy, DEFAULT_IOU_THRESHOLD, DetectionConfig, Size, read_labels_file,
};
use crate::model::{Detector, LayoutStrategy};

/// 各个可执行程序共用的检测参数
#[derive(Args, Debug, Clone)]
pub struct DetectionArgs {
  /// 检测器种类
  #[arg(long, value_enum, default_value_t = Detector::Oriented)]
  pub detector: Detector,

  /// 模型输入尺寸
  #[arg(long, default_value = "1024x1024", value_name = "WxH")]
  pub model_size: Size,

  /// 显示尺寸，默认与模型输入尺寸相同
  #[arg(long, value_name = "WxH")]
  pub display_size: Option<Size>,

  /// 置信度阈值 (0.0 - 1.0)，只保留严格大于该值的检测
  #[arg(long, default_value = "0.35", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IoU 阈值 (0.0 - 1.0]
  #[arg(long, value_name = "THRESHOLD", conflicts_with = "iou_exponent")]
  pub iou_threshold: Option<f32>,

  /// 以 10^-N 给出 NMS IoU 阈值
  #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(0..=12))]
  pub iou_exponent: Option<u8>,

  /// 标签文件（JSON 字符串数组或每行一个），默认使用 DOTA v1.0 类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 模型输出的类别数，默认等于标签数量
  #[arg(long, value_name = "N")]
  pub num_classes: Option<usize>,

  /// 输出张量布局
  #[arg(long, value_enum, default_value_t = LayoutStrategy::Auto)]
  pub layout: LayoutStrategy,

  /// 只统计该类别的数量，默认统计全部
  #[arg(long, value_name = "LABEL")]
  pub count_class: Option<String>,
}

impl DetectionArgs {
  pub fn to_config(&self) -> Result<DetectionConfig, ConfigError> {
    let mut builder = DetectionConfig::builder()
      .model_size(self.model_size)
      .conf_threshold(self.confidence)
      .layout(self.layout);

    builder = match (self.iou_threshold, self.iou_exponent) {
      (Some(threshold), _) => builder.iou_threshold(threshold),
      (None, Some(exponent)) => builder.iou_exponent(exponent),
      (None, None) => builder.iou_threshold(DEFAULT_IOU_THRESHOLD),
    };
    if let Some(size) = self.display_size {
      builder = builder.display_size(size);
    }
    if let Some(path) = &self.labels {
      builder = builder.class_names(read_labels_file(path)?);
    }
    if let Some(num_classes) = self.num_classes {
      builder = builder.num_classes(num_classes);
    }
    if let Some(label) = &self.count_class {
      builder = builder.count_policy(CountPolicy::Class(label.clone()));
    }

    builder.build()
  }
}
