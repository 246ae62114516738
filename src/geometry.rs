// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/geometry.rs - 旋转框几何运算
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

//! 凸多边形的裁剪、面积与旋转框 IoU。
//!
//! 约定：所有多边形按解码器给出的顺序（零旋转时为 左上、右上、右下、左下）遍历，
//! 在图像坐标系（y 轴向下）中，多边形内部位于每条有向边的“左侧”，即叉积非负。
//! 以其他绕向传入裁剪多边形时，裁剪结果为空或退化，这里不做运行时检查。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 二维点
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

impl fmt::Display for Point {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({:.2}, {:.2})", self.x, self.y)
  }
}

/// 首尾隐式相连的顶点序列
pub type Polygon = Vec<Point>;

/// 四个角点组成的旋转框
pub type Quad = [Point; 4];

/// 点 `point` 相对有向边 `edge_start -> edge_end` 的二维叉积
#[inline]
fn edge_cross(point: Point, edge_start: Point, edge_end: Point) -> f32 {
  (edge_end.x - edge_start.x) * (point.y - edge_start.y)
    - (edge_end.y - edge_start.y) * (point.x - edge_start.x)
}

/// 判断点是否位于有向边上或其左侧
#[inline]
pub fn is_inside(point: Point, edge_start: Point, edge_end: Point) -> bool {
  edge_cross(point, edge_start, edge_end) >= 0.0
}

/// 线段 `s-e` 与经过 `edge_start-edge_end` 的直线的交点。
///
/// 线段与直线平行时没有唯一交点，返回 `None`。
pub fn compute_intersection(s: Point, e: Point, edge_start: Point, edge_end: Point) -> Option<Point> {
  let cs = edge_cross(s, edge_start, edge_end);
  let ce = edge_cross(e, edge_start, edge_end);
  let denom = cs - ce;
  if denom == 0.0 || !denom.is_finite() {
    return None;
  }
  let t = cs / denom;
  Some(Point::new(s.x + t * (e.x - s.x), s.y + t * (e.y - s.y)))
}

/// Sutherland–Hodgman 多边形裁剪：用凸多边形 `clip` 裁剪 `subject`。
///
/// 两个输入都应为凸多边形且绕向一致；`clip` 不足三个顶点时没有面积，结果为空。
/// 任意一条边裁剪后为空即提前返回。
pub fn clip_polygon(subject: &[Point], clip: &[Point]) -> Polygon {
  if clip.len() < 3 {
    return Polygon::new();
  }

  let mut output: Polygon = subject.to_vec();
  for i in 0..clip.len() {
    if output.is_empty() {
      break;
    }
    let edge_start = clip[i];
    let edge_end = clip[(i + 1) % clip.len()];

    let input = std::mem::replace(&mut output, Polygon::with_capacity(subject.len() + clip.len()));
    let mut prev = input[input.len() - 1];
    let mut prev_inside = is_inside(prev, edge_start, edge_end);
    for &current in input.iter() {
      let current_inside = is_inside(current, edge_start, edge_end);
      if current_inside {
        if !prev_inside {
          output.push(compute_intersection(prev, current, edge_start, edge_end).unwrap_or(current));
        }
        output.push(current);
      } else if prev_inside {
        output.push(compute_intersection(prev, current, edge_start, edge_end).unwrap_or(prev));
      }
      prev = current;
      prev_inside = current_inside;
    }
  }

  output
}

/// 鞋带公式计算多边形面积（取绝对值），少于三个顶点时为 0
pub fn polygon_area(polygon: &[Point]) -> f32 {
  if polygon.len() < 3 {
    return 0.0;
  }
  let twice: f64 = polygon
    .iter()
    .zip(polygon.iter().cycle().skip(1))
    .map(|(p, q)| p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64)
    .sum();
  (twice.abs() * 0.5) as f32
}

/// 两个旋转框（凸多边形）的交并比，取值 [0, 1]。
///
/// 交集为空或并集面积非正（退化框）时返回 0。
pub fn rotated_iou(a: &[Point], b: &[Point]) -> f32 {
  let intersection = clip_polygon(a, b);
  if intersection.is_empty() {
    return 0.0;
  }
  let inter_area = polygon_area(&intersection);
  let union = polygon_area(a) + polygon_area(b) - inter_area;
  if union <= 0.0 {
    return 0.0;
  }
  (inter_area / union).clamp(0.0, 1.0)
}

/// 顶点集合的外接矩形 `[x_min, y_min, x_max, y_max]`
pub fn bounds(points: &[Point]) -> [f32; 4] {
  points.iter().fold(
    [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY],
    |[x_min, y_min, x_max, y_max], p| [x_min.min(p.x), y_min.min(p.y), x_max.max(p.x), y_max.max(p.y)],
  )
}

/// 按外接矩形计算的轴对齐 IoU
pub fn axis_aligned_iou(a: &[Point], b: &[Point]) -> f32 {
  let [ax1, ay1, ax2, ay2] = bounds(a);
  let [bx1, by1, bx2, by2] = bounds(b);

  let x1 = ax1.max(bx1);
  let y1 = ay1.max(by1);
  let x2 = ax2.min(bx2);
  let y2 = ay2.min(by2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (ax2 - ax1).max(0.0) * (ay2 - ay1).max(0.0);
  let area_b = (bx2 - bx1).max(0.0) * (by2 - by1).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    (intersection / union).clamp(0.0, 1.0)
  } else {
    0.0
  }
}
