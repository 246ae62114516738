// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/session.rs - 单帧检测流程
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

use tracing::{debug, warn};

use crate::config::{CountPolicy, DetectionConfig};
use crate::frame::TensorFrame;
use crate::model::{CandidateBox, DetectError, DetectionResult, Detector, decode_frame, nms};

/// 解码、置信度过滤、NMS 与分类计数。
///
/// 纯函数：所有配置都由参数给出，调用之间不保留状态。
pub fn detect_frame(
  detector: Detector,
  frame: &TensorFrame,
  config: &DetectionConfig,
) -> Result<DetectionResult, DetectError> {
  let candidates: Vec<CandidateBox> = decode_frame(frame, config.decode_options(detector))?.collect();
  let num_candidates = candidates.len();
  let kept = nms(candidates, config.iou_threshold(), |a, b| detector.iou(a, b));
  debug!(
    "第 {} 帧: {} 个候选框, NMS 后保留 {} 个",
    frame.index(),
    num_candidates,
    kept.len()
  );
  Ok(DetectionResult::tally(kept, config.class_names()))
}

/// 每帧完成后接收计数的回调
pub trait CountListener {
  fn on_count(&mut self, count: usize);
}

impl<F: FnMut(usize)> CountListener for F {
  fn on_count(&mut self, count: usize) {
    self(count)
  }
}

/// 不关心计数时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl CountListener for NoopListener {
  fn on_count(&mut self, _count: usize) {}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
  pub frames: u64,
  pub failed_frames: u64,
  pub detections: u64,
}

/// 面向帧循环的检测会话：单帧失败时返回空结果并继续
pub struct DetectionSession<L = NoopListener> {
  detector: Detector,
  listener: L,
  stats: SessionStats,
}

impl DetectionSession<NoopListener> {
  pub fn new(detector: Detector) -> Self {
    Self::with_listener(detector, NoopListener)
  }
}

impl<L: CountListener> DetectionSession<L> {
  pub fn with_listener(detector: Detector, listener: L) -> Self {
    Self {
      detector,
      listener,
      stats: SessionStats::default(),
    }
  }

  pub fn detector(&self) -> Detector {
    self.detector
  }

  pub fn stats(&self) -> SessionStats {
    self.stats
  }

  pub fn into_listener(self) -> L {
    self.listener
  }

  /// 处理一帧并通知计数监听者。
  ///
  /// 输出格式错误只影响当前帧：记录警告并返回所有计数为 0 的空结果。
  pub fn process(&mut self, frame: &TensorFrame, config: &DetectionConfig) -> DetectionResult {
    self.stats.frames += 1;
    let result = match detect_frame(self.detector, frame, config) {
      Ok(result) => result,
      Err(e) => {
        warn!("第 {} 帧检测失败, 跳过: {}", frame.index(), e);
        self.stats.failed_frames += 1;
        DetectionResult::empty(config.class_names())
      }
    };
    self.stats.detections += result.total_count as u64;

    let count = match config.count_policy() {
      CountPolicy::Total => result.total_count,
      CountPolicy::Class(label) => result.count_of(label),
    };
    self.listener.on_count(count);

    result
  }
}
