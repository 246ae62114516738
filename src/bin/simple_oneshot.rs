// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use xiekuang::{
  FromUrl, SharedConfig,
  args::DetectionArgs,
  input::InputWrapper,
  output::OutputWrapper,
  session::DetectionSession,
  task::{OneShotTask, Task},
};

/// Xiekuang 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，例如 tensor:///data/out.bin?shape=1,20,21504 或 json:///data/out.json
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 log://、jsonl:///tmp/result.jsonl 或 record:///tmp/record
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  #[command(flatten)]
  pub detection: DetectionArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = SharedConfig::new(args.detection.to_config()?);
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let session = DetectionSession::new(args.detection.detector);

  let stats = OneShotTask.run_task(input, session, &config, output)?;
  info!("共检测到 {} 个目标", stats.detections);

  Ok(())
}
