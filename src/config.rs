// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/config.rs - 检测配置
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

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{DecodeOptions, Detector, LayoutStrategy, Scale};

/// DOTA v1.0 数据集类别名称
pub const DOTA_V1_CLASSES: [&str; 15] = [
  "plane",
  "ship",
  "storage tank",
  "baseball diamond",
  "tennis court",
  "basketball court",
  "ground track field",
  "harbor",
  "bridge",
  "large vehicle",
  "small vehicle",
  "helicopter",
  "roundabout",
  "soccer ball field",
  "swimming pool",
];

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.35;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MODEL_SIZE: Size = Size::new(1024, 1024);

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("置信度阈值必须在 (0, 1) 之间, 实际为 {0}")]
  ConfidenceOutOfRange(f32),
  #[error("IoU 阈值必须在 (0, 1] 之间, 实际为 {0}")]
  IouOutOfRange(f32),
  #[error("尺寸必须为正: {0}")]
  EmptySize(Size),
  #[error("尺寸格式错误: {0}，应为 <宽>x<高>")]
  SizeFormat(String),
  #[error("类别标签为空")]
  NoLabels,
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 宽高
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
  pub width: u32,
  pub height: u32,
}

impl Size {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

impl fmt::Display for Size {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

impl FromStr for Size {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (w, h) = s
      .split_once(['x', 'X'])
      .ok_or_else(|| ConfigError::SizeFormat(s.to_string()))?;
    let parse = |v: &str| {
      v.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::SizeFormat(s.to_string()))
    };
    Ok(Size::new(parse(w)?, parse(h)?))
  }
}

/// 每帧回调给计数监听者的数值
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountPolicy {
  /// 所有保留框的数量
  #[default]
  Total,
  /// 单一类别的数量
  Class(String),
}

/// 一次检测调用使用的不可变配置
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionConfig {
  class_names: Vec<String>,
  num_classes: usize,
  conf_threshold: f32,
  iou_threshold: f32,
  model_size: Size,
  display_size: Size,
  layout: LayoutStrategy,
  count_policy: CountPolicy,
}

impl DetectionConfig {
  pub fn builder() -> DetectionConfigBuilder {
    DetectionConfigBuilder::default()
  }

  pub fn class_names(&self) -> &[String] {
    &self.class_names
  }

  /// 模型输出的类别数量，可以多于标签数量
  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn conf_threshold(&self) -> f32 {
    self.conf_threshold
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  pub fn model_size(&self) -> Size {
    self.model_size
  }

  pub fn display_size(&self) -> Size {
    self.display_size
  }

  pub fn layout(&self) -> LayoutStrategy {
    self.layout
  }

  pub fn count_policy(&self) -> &CountPolicy {
    &self.count_policy
  }

  /// 显示尺寸与模型输入尺寸之比
  pub fn scale(&self) -> Scale {
    Scale {
      x: self.display_size.width as f32 / self.model_size.width as f32,
      y: self.display_size.height as f32 / self.model_size.height as f32,
    }
  }

  pub fn decode_options(&self, detector: Detector) -> DecodeOptions {
    DecodeOptions {
      detector,
      num_classes: self.num_classes,
      scale: self.scale(),
      layout: self.layout,
      conf_threshold: self.conf_threshold,
    }
  }

  /// 以当前配置为起点修改
  pub fn to_builder(&self) -> DetectionConfigBuilder {
    DetectionConfigBuilder {
      class_names: Some(self.class_names.clone()),
      num_classes: Some(self.num_classes),
      conf_threshold: self.conf_threshold,
      iou_threshold: self.iou_threshold,
      model_size: self.model_size,
      display_size: Some(self.display_size),
      layout: self.layout,
      count_policy: self.count_policy.clone(),
    }
  }
}

impl Default for DetectionConfig {
  fn default() -> Self {
    let class_names: Vec<String> = DOTA_V1_CLASSES.iter().map(|s| s.to_string()).collect();
    Self {
      num_classes: class_names.len(),
      class_names,
      conf_threshold: DEFAULT_CONF_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      model_size: DEFAULT_MODEL_SIZE,
      display_size: DEFAULT_MODEL_SIZE,
      layout: LayoutStrategy::Auto,
      count_policy: CountPolicy::Total,
    }
  }
}

#[derive(Clone, Debug)]
pub struct DetectionConfigBuilder {
  class_names: Option<Vec<String>>,
  num_classes: Option<usize>,
  conf_threshold: f32,
  iou_threshold: f32,
  model_size: Size,
  display_size: Option<Size>,
  layout: LayoutStrategy,
  count_policy: CountPolicy,
}

impl Default for DetectionConfigBuilder {
  fn default() -> Self {
    Self {
      class_names: None,
      num_classes: None,
      conf_threshold: DEFAULT_CONF_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      model_size: DEFAULT_MODEL_SIZE,
      display_size: None,
      layout: LayoutStrategy::Auto,
      count_policy: CountPolicy::Total,
    }
  }
}

impl DetectionConfigBuilder {
  pub fn class_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.class_names = Some(names.into_iter().map(Into::into).collect());
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = Some(num_classes);
    self
  }

  pub fn conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  /// IoU 阈值取 `10^-exponent`
  pub fn iou_exponent(self, exponent: u8) -> Self {
    self.iou_threshold(10f32.powi(-(exponent as i32)))
  }

  pub fn model_size(mut self, size: Size) -> Self {
    self.model_size = size;
    self
  }

  /// 未设置时与模型输入尺寸相同
  pub fn display_size(mut self, size: Size) -> Self {
    self.display_size = Some(size);
    self
  }

  pub fn layout(mut self, layout: LayoutStrategy) -> Self {
    self.layout = layout;
    self
  }

  pub fn count_policy(mut self, policy: CountPolicy) -> Self {
    self.count_policy = policy;
    self
  }

  pub fn build(self) -> Result<DetectionConfig, ConfigError> {
    if !(self.conf_threshold > 0.0 && self.conf_threshold < 1.0) {
      return Err(ConfigError::ConfidenceOutOfRange(self.conf_threshold));
    }
    if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
      return Err(ConfigError::IouOutOfRange(self.iou_threshold));
    }
    let display_size = self.display_size.unwrap_or(self.model_size);
    for size in [self.model_size, display_size] {
      if size.is_empty() {
        return Err(ConfigError::EmptySize(size));
      }
    }

    let class_names = self
      .class_names
      .unwrap_or_else(|| DOTA_V1_CLASSES.iter().map(|s| s.to_string()).collect());
    let num_classes = self.num_classes.unwrap_or(class_names.len());
    if num_classes == 0 {
      return Err(ConfigError::NoLabels);
    }

    debug!(
      "检测配置: {} 个类别, 置信度阈值 {}, IoU 阈值 {:e}, 模型尺寸 {}, 显示尺寸 {}",
      num_classes, self.conf_threshold, self.iou_threshold, self.model_size, display_size
    );

    Ok(DetectionConfig {
      class_names,
      num_classes,
      conf_threshold: self.conf_threshold,
      iou_threshold: self.iou_threshold,
      model_size: self.model_size,
      display_size,
      layout: self.layout,
      count_policy: self.count_policy,
    })
  }
}

/// 读取标签文件：`.json` 为字符串数组，其他按行读取并忽略空行
pub fn read_labels_file(path: &Path) -> Result<Vec<String>, ConfigError> {
  info!("加载标签文件: {}", path.display());
  let content = std::fs::read_to_string(path)?;
  let labels: Vec<String> = if path.extension().is_some_and(|ext| ext == "json") {
    serde_json::from_str(&content)?
  } else {
    content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect()
  };
  if labels.is_empty() {
    return Err(ConfigError::NoLabels);
  }
  debug!("读取到 {} 个标签", labels.len());
  Ok(labels)
}

struct Versioned {
  version: u64,
  config: Arc<DetectionConfig>,
}

/// 带版本号的共享配置。
///
/// 每帧开始时取一次快照，之后的修改只影响下一帧，正在处理的帧始终看到同一份配置。
#[derive(Clone)]
pub struct SharedConfig {
  inner: Arc<RwLock<Versioned>>,
}

impl SharedConfig {
  pub fn new(config: DetectionConfig) -> Self {
    Self {
      inner: Arc::new(RwLock::new(Versioned {
        version: 0,
        config: Arc::new(config),
      })),
    }
  }

  /// 当前版本号与配置
  pub fn snapshot(&self) -> (u64, Arc<DetectionConfig>) {
    let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    (guard.version, Arc::clone(&guard.config))
  }

  pub fn version(&self) -> u64 {
    self.snapshot().0
  }

  /// 替换配置，返回新版本号
  pub fn replace(&self, config: DetectionConfig) -> u64 {
    let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    guard.version += 1;
    guard.config = Arc::new(config);
    info!("检测配置已更新到版本 {}", guard.version);
    guard.version
  }

  /// 基于当前配置修改；构建失败时保留原配置
  pub fn update<F>(&self, f: F) -> Result<u64, ConfigError>
  where
    F: FnOnce(DetectionConfigBuilder) -> DetectionConfigBuilder,
  {
    let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    let config = f(guard.config.to_builder()).build()?;
    guard.version += 1;
    guard.config = Arc::new(config);
    info!("检测配置已更新到版本 {}", guard.version);
    Ok(guard.version)
  }
}

impl fmt::Debug for SharedConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (version, config) = self.snapshot();
    f.debug_struct("SharedConfig")
      .field("version", &version)
      .field("config", &config)
      .finish()
  }
}
