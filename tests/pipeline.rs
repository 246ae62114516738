// 该文件是 Xiekuang （斜框） 项目的一部分。
// tests/pipeline.rs - 端到端检测流程测试
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

use url::Url;
use xiekuang::{
  DetectionConfig, Detector, FromUrl, SharedConfig, TensorFrame,
  config::Size,
  detect_frame,
  geometry::rotated_iou,
  input::InputWrapper,
  model::{CandidateBox, decode_corners, nms},
  output::OutputWrapper,
  session::DetectionSession,
  task::{ContinuousTask, Task},
};

fn config(names: &[&str]) -> DetectionConfig {
  DetectionConfig::builder()
    .class_names(names.iter().copied())
    .model_size(Size::new(100, 100))
    .iou_threshold(0.5)
    .build()
    .unwrap()
}

fn candidate(cx: f32, class_index: usize, confidence: f32) -> CandidateBox {
  CandidateBox {
    corners: decode_corners(cx, 0.0, 10.0, 10.0, 0.0),
    confidence,
    class_index,
  }
}

#[test]
fn shifted_square_iou_is_one_third() {
  let a = decode_corners(0.0, 0.0, 10.0, 10.0, 0.0);
  let b = decode_corners(5.0, 0.0, 10.0, 10.0, 0.0);
  assert!((rotated_iou(&a, &b) - 1.0 / 3.0).abs() < 1e-5);
}

#[test]
fn identical_boxes_of_different_classes_both_survive() {
  let kept = nms(
    vec![candidate(0.0, 0, 0.9), candidate(0.0, 1, 0.8)],
    0.1,
    |a, b| Detector::Oriented.iou(a, b),
  );
  assert_eq!(kept.len(), 2);
}

#[test]
fn greedy_suppression_keeps_distant_low_score_box() {
  // 中心距 2.5 时 IoU = 7.5 / 12.5 = 0.6，中心距 ~8.18 时 IoU ≈ 0.1
  let shift = 10.0 * (1.0 - 0.2 / 1.1);
  let kept = nms(
    vec![
      candidate(0.0, 0, 0.9),
      candidate(2.5, 0, 0.8),
      candidate(shift, 0, 0.3),
    ],
    0.5,
    |a, b| Detector::Oriented.iou(a, b),
  );
  let confidences: Vec<f32> = kept.iter().map(|c| c.confidence).collect();
  assert_eq!(confidences, vec![0.9, 0.3]);
}

#[test]
fn empty_buffer_gives_zero_counts() {
  let names = ["plane", "ship"];
  let frame = TensorFrame::new(vec![1, 7, 0], vec![]);
  let result = detect_frame(Detector::Oriented, &frame, &config(&names)).unwrap();
  assert!(result.boxes.is_empty());
  assert_eq!(result.total_count, 0);
  for name in names {
    assert_eq!(result.class_counts[name], 0);
  }
}

#[test]
fn tied_scores_pick_lower_class_index() {
  let frame = TensorFrame::new(vec![1, 7], vec![50.0, 50.0, 10.0, 10.0, 0.8, 0.8, 0.0]);
  let config = config(&["plane", "ship"])
    .to_builder()
    .layout(xiekuang::model::LayoutStrategy::Rows)
    .build()
    .unwrap();
  let result = detect_frame(Detector::Oriented, &frame, &config).unwrap();
  assert_eq!(result.boxes.len(), 1);
  assert_eq!(result.boxes[0].class_index, 0);
  assert_eq!(result.count_of("plane"), 1);
}

#[test]
fn axis_aligned_detector_shares_the_pipeline() {
  // 列布局，两个检测，每个 [cx, cy, w, h, s0, s1]
  let frame = TensorFrame::new(
    vec![1, 6, 2],
    vec![
      10.0, 12.0, //
      10.0, 10.0, //
      20.0, 20.0, //
      20.0, 20.0, //
      0.9, 0.8, //
      0.0, 0.0,
    ],
  );
  let result = detect_frame(Detector::AxisAligned, &frame, &config(&["car", "truck"])).unwrap();
  assert_eq!(result.total_count, 1);
  assert_eq!(result.boxes[0].confidence, 0.9);
}

#[test]
fn tensor_file_to_jsonl() {
  let dir = tempfile::tempdir().unwrap();
  let frames = dir.path().join("frames");
  std::fs::create_dir(&frames).unwrap();

  // 行布局: [cx, cy, w, h, s_plane, s_ship, angle]
  let rows: [&[f32]; 3] = [
    &[10.0, 10.0, 8.0, 4.0, 0.9, 0.1, 0.3, 40.0, 40.0, 8.0, 4.0, 0.1, 0.6, 0.0],
    &[],
    &[10.0, 10.0, 8.0, 4.0, 0.2, 0.1, 0.0, 40.0, 40.0, 8.0, 4.0, 0.1, 0.2, 0.0],
  ];
  for (i, values) in rows.iter().enumerate() {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(frames.join(format!("{:03}.bin", i)), bytes).unwrap();
  }

  let input_url = Url::parse(&format!("tensor://{}?shape=2,7", frames.display())).unwrap();
  let result_path = dir.path().join("result.jsonl");
  let output_url = Url::parse(&format!("jsonl://{}", result_path.display())).unwrap();

  let shared = SharedConfig::new(
    config(&["plane", "ship"])
      .to_builder()
      .layout(xiekuang::model::LayoutStrategy::Rows)
      .build()
      .unwrap(),
  );
  let mut counts = Vec::new();
  let session = DetectionSession::with_listener(Detector::Oriented, |n: usize| counts.push(n));
  let stats = ContinuousTask::default()
    .run_task(
      InputWrapper::from_url(&input_url).unwrap(),
      session,
      &shared,
      OutputWrapper::from_url(&output_url).unwrap(),
    )
    .unwrap();

  // 第二个文件为空数据但形状不含 0，按格式错误处理
  assert_eq!(stats.frames, 3);
  assert_eq!(stats.failed_frames, 1);
  assert_eq!(counts, vec![2, 0, 0]);

  let lines: Vec<serde_json::Value> = std::fs::read_to_string(&result_path)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  assert_eq!(lines.len(), 3);
  assert_eq!(lines[0]["frame"], 0);
  assert_eq!(lines[0]["class_counts"]["plane"], 1);
  assert_eq!(lines[0]["class_counts"]["ship"], 1);
  assert_eq!(lines[2]["frame"], 2);
  assert_eq!(lines[2]["total_count"], 0);
}

#[test]
fn unknown_schemes_are_rejected() {
  let url = Url::parse("rtsp://camera/stream").unwrap();
  assert!(InputWrapper::from_url(&url).is_err());
  assert!(OutputWrapper::from_url(&url).is_err());
}
