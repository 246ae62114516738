// 该文件是 Xiekuang （斜框） 项目的一部分。
// src/task.rs - 帧循环任务
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

use std::sync::mpsc::Receiver;
use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::{
  config::SharedConfig,
  frame::TensorFrame,
  model::DetectionResult,
  output::Render,
  session::{CountListener, DetectionSession, SessionStats},
};

pub trait Task<I, L, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    session: DetectionSession<L>,
    config: &SharedConfig,
    output: O,
  ) -> Result<SessionStats, Self::Error>;
}

pub struct OneShotTask;

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = TensorFrame>,
  L: CountListener,
  O: Render<TensorFrame, DetectionResult, Error = RE>,
> Task<I, L, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut session: DetectionSession<L>,
    config: &SharedConfig,
    output: O,
  ) -> Result<SessionStats, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let (_, config) = config.snapshot();
    let now = std::time::Instant::now();
    let result = session.process(&frame, &config);
    let elapsed = now.elapsed();
    info!("检测完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(session.stats())
  }
}

/// 对同一帧重复检测，统计平均耗时
#[derive(Debug)]
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  /// 预热轮次，不计入平均耗时
  const WARMUP: usize = 2;

  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = TensorFrame>,
  L: CountListener,
  O: Render<TensorFrame, DetectionResult, Error = RE>,
> Task<I, L, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut session: DetectionSession<L>,
    config: &SharedConfig,
    output: O,
  ) -> Result<SessionStats, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let (_, config) = config.snapshot();
      let now = std::time::Instant::now();
      let result = session.process(&frame, &config);
      let elapsed = now.elapsed();
      info!("({})检测完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    let measured = if times.len() > Self::WARMUP {
      &times[Self::WARMUP..]
    } else {
      &times[..]
    };
    warn!(
      "平均检测时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len().max(1) as u32
    );

    Ok(session.stats())
  }
}

/// 逐帧处理输入，直到输入结束、达到指定帧数或收到停止信号
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到消息后在当前帧结束时退出
  pub fn with_stop_signal(mut self, stop: Receiver<()>) -> Self {
    self.stop = Some(stop);
    self
  }

  /// 安装 Ctrl-C 处理；30 秒内未退出则强制结束进程
  pub fn with_ctrlc(self) -> Result<Self, ctrlc::Error> {
    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(self.with_stop_signal(rx))
  }
}

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = TensorFrame>,
  L: CountListener,
  O: Render<TensorFrame, DetectionResult, Error = RE>,
> Task<I, L, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    mut session: DetectionSession<L>,
    config: &SharedConfig,
    output: O,
  ) -> Result<SessionStats, Self::Error> {
    info!("开始任务...");

    let mut frame_count = 0;
    let mut last_version = None;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_count += 1;
      // 每帧取一次快照，处理中途的配置修改从下一帧开始生效
      let (version, snapshot) = config.snapshot();
      if last_version.is_some_and(|v| v != version) {
        info!("第 {} 帧起使用配置版本 {}", frame.index(), version);
      }
      last_version = Some(version);

      let result = session.process(&frame, &snapshot);
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("第 {} 帧完成，耗时: {:.2?} / {:.2?}", frame.index(), elapsed_a, elapsed_b);

      if self.frame_number.is_some_and(|n| frame_count >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_count);
        break;
      }
      if self.stop.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(session.stats())
  }
}
