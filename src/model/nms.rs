// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use crate::model::CandidateBox;

/// 按类别的贪心非极大值抑制。
///
/// 候选框按置信度降序稳定排序（同分时保持输入顺序），依次接受剩余的最高分候选框，
/// 并丢弃与之同类别且 IoU 大于 `iou_threshold` 的候选框。不同类别互不抑制。
/// 最坏 O(n²)。
pub fn nms<F>(mut candidates: Vec<CandidateBox>, iou_threshold: f32, iou: F) -> Vec<CandidateBox>
where
  F: Fn(&CandidateBox, &CandidateBox) -> f32,
{
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut suppressed = vec![false; candidates.len()];
  let mut keep = Vec::new();

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    let best = candidates[i];
    keep.push(best);

    for (j, other) in candidates.iter().enumerate().skip(i + 1) {
      if suppressed[j] || other.class_index != best.class_index {
        continue;
      }
      if iou(&best, other) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  keep
}
