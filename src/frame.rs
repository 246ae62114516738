// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/frame.rs - 模型输出张量帧定义
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

use serde::{Deserialize, Serialize};

/// 一次推理产生的原始输出张量。
///
/// 构造时不校验形状与数据长度是否一致，交给解码阶段报告
/// [`DetectError::MalformedOutput`](crate::model::DetectError::MalformedOutput)，
/// 这样一帧数据异常只影响这一帧。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorFrame {
  #[serde(default)]
  index: u64,
  shape: Box<[usize]>,
  data: Box<[f32]>,
}

impl TensorFrame {
  pub fn new(shape: impl Into<Box<[usize]>>, data: impl Into<Box<[f32]>>) -> Self {
    Self {
      index: 0,
      shape: shape.into(),
      data: data.into(),
    }
  }

  pub fn with_index(mut self, index: u64) -> Self {
    self.index = index;
    self
  }

  /// 帧序号，由输入源按读取顺序分配
  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 没有任何检测：数据为空，且形状中至少有一个维度为 0（或没有给出形状）
  pub fn is_empty(&self) -> bool {
    self.data.is_empty() && (self.shape.is_empty() || self.shape.contains(&0))
  }
}
