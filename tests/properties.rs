// 该文件是 Xiekuang （斜框） 项目的一部分。
// tests/properties.rs - 几何与 NMS 性质测试
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

use std::f32::consts::PI;

use proptest::prelude::*;
use xiekuang::geometry::{Point, Quad, clip_polygon, polygon_area, rotated_iou};
use xiekuang::model::{CandidateBox, Detector, decode_corners, nms};

fn quad() -> impl Strategy<Value = Quad> {
  (-100f32..100.0, -100f32..100.0, 1f32..50.0, 1f32..50.0, -PI..PI)
    .prop_map(|(cx, cy, w, h, angle)| decode_corners(cx, cy, w, h, angle))
}

fn candidate_sets() -> impl Strategy<Value = Vec<CandidateBox>> {
  prop::collection::vec(
    (0f32..60.0, 0f32..60.0, 5f32..30.0, 5f32..30.0, -PI..PI, 0usize..2, 0.01f32..1.0),
    0..24,
  )
  .prop_map(|rows| {
    rows
      .into_iter()
      .map(|(cx, cy, w, h, angle, class_index, confidence)| CandidateBox {
        corners: decode_corners(cx, cy, w, h, angle),
        confidence,
        class_index,
      })
      .collect()
  })
}

fn oriented(a: &CandidateBox, b: &CandidateBox) -> f32 {
  Detector::Oriented.iou(a, b)
}

proptest! {
  #[test]
  fn self_iou_is_one(a in quad()) {
    prop_assert!((rotated_iou(&a, &a) - 1.0).abs() < 1e-4);
  }

  #[test]
  fn iou_is_symmetric(a in quad(), b in quad()) {
    prop_assert!((rotated_iou(&a, &b) - rotated_iou(&b, &a)).abs() < 1e-3);
  }

  #[test]
  fn iou_stays_in_unit_interval(a in quad(), b in quad()) {
    let iou = rotated_iou(&a, &b);
    prop_assert!((0.0..=1.0).contains(&iou));
  }

  #[test]
  fn separated_boxes_have_zero_iou(
    a in quad(),
    w in 1f32..50.0,
    h in 1f32..50.0,
    angle in -PI..PI,
  ) {
    // 外接圆不相交
    let center = Point::new(
      a.iter().map(|p| p.x).sum::<f32>() / 4.0,
      a.iter().map(|p| p.y).sum::<f32>() / 4.0,
    );
    let reach = (a[0].x - a[2].x).hypot(a[0].y - a[2].y) / 2.0 + w.hypot(h) / 2.0 + 1.0;
    let b = decode_corners(center.x + reach, center.y, w, h, angle);
    prop_assert_eq!(rotated_iou(&a, &b), 0.0);
  }

  #[test]
  fn area_ignores_orientation_and_start(
    points in prop::collection::vec((-100f32..100.0, -100f32..100.0), 3..10),
    start in 0usize..10,
  ) {
    let polygon: Vec<Point> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    let area = polygon_area(&polygon);

    let mut reversed = polygon.clone();
    reversed.reverse();
    let mut rotated = polygon.clone();
    rotated.rotate_left(start % polygon.len());

    let tolerance = 1e-4 * area.max(1.0);
    prop_assert!((polygon_area(&reversed) - area).abs() <= tolerance);
    prop_assert!((polygon_area(&rotated) - area).abs() <= tolerance);
  }

  #[test]
  fn clipping_by_itself_keeps_area(a in quad()) {
    let area = polygon_area(&a);
    prop_assert!((polygon_area(&clip_polygon(&a, &a)) - area).abs() <= 1e-4 * area);
  }

  #[test]
  fn nms_is_idempotent(candidates in candidate_sets(), threshold in 0.05f32..1.0) {
    let once = nms(candidates, threshold, oriented);
    let twice = nms(once.clone(), threshold, oriented);
    prop_assert_eq!(once, twice);
  }

  #[test]
  fn nms_leaves_no_overlapping_pair(candidates in candidate_sets(), threshold in 0.05f32..1.0) {
    let kept = nms(candidates, threshold, oriented);
    for (i, a) in kept.iter().enumerate() {
      for b in kept.iter().skip(i + 1) {
        if a.class_index == b.class_index {
          prop_assert!(oriented(a, b) <= threshold);
        }
      }
    }
  }

  #[test]
  fn nms_first_pick_follows_highest_confidence(candidates in candidate_sets(), threshold in 0.05f32..1.0) {
    prop_assume!(candidates.len() >= 2);
    let top = |list: &[CandidateBox]| {
      list.iter().fold(None::<CandidateBox>, |best, c| match best {
        Some(b) if b.confidence >= c.confidence => Some(b),
        _ => Some(*c),
      })
    };

    let kept = nms(candidates.clone(), threshold, oriented);
    prop_assert_eq!(kept.first().copied(), top(&candidates));

    let best = top(&candidates).unwrap();
    let position = candidates.iter().position(|c| *c == best).unwrap();
    let mut rest = candidates.clone();
    rest.remove(position);
    let kept_rest = nms(rest.clone(), threshold, oriented);
    prop_assert_eq!(kept_rest.first().copied(), top(&rest));
  }
}
