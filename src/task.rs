// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 解码任务循环
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

use std::{sync::mpsc::Receiver, thread, time::Duration};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;
    info!("输入张量获取成功，开始解码...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("解码完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧反复解码，用于测量耗时；前两次视为预热不计入平均值
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

const WARMUP_TIMES: usize = 2;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;
    info!("输入张量获取成功，开始解码...");
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})解码完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      info!("({})输出完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if times.len() > WARMUP_TIMES {
      warn!(
        "平均解码时间: {:.2?}",
        times.iter().skip(WARMUP_TIMES).sum::<Duration>() / (times.len() - WARMUP_TIMES) as u32
      );
    } else {
      warn!("重复次数 {} 过少，不统计平均解码时间", times.len());
    }

    Ok(())
  }
}

/// 逐帧处理输入；单帧解码失败时丢弃该帧并继续
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interruptible: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理，收到信号后结束循环
  pub fn interruptible(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }
}

fn install_interrupt_handler() -> anyhow::Result<Receiver<()>> {
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

  Ok(rx)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = if self.interruptible {
      Some(install_interrupt_handler()?)
    } else {
      None
    };

    let mut frame_index = 0usize;
    let mut dropped = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧张量", frame_index);
      match model.infer(&frame) {
        Ok(result) => {
          let elapsed_a = now.elapsed();
          output.render_result(&frame, &result)?;
          let elapsed_b = now.elapsed();
          info!("解码完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
        }
        Err(e) => {
          dropped += 1;
          warn!("第 {} 帧解码失败，丢弃: {}", frame_index, e);
        }
      }
      now = std::time::Instant::now();
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共 {} 帧，丢弃 {} 帧", frame_index, dropped);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{
    model::{DecodeConfig, DetectResult, PoseDecoder},
    tensor::RawTensor,
  };

  #[derive(Default)]
  struct Collect {
    frames: RefCell<Vec<usize>>,
  }

  impl Render<RawTensor, DetectResult> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, _frame: &RawTensor, result: &DetectResult) -> Result<(), Self::Error> {
      self.frames.borrow_mut().push(result.len());
      Ok(())
    }
  }

  struct Failing;

  impl Render<RawTensor, DetectResult> for Failing {
    type Error = std::io::Error;

    fn render_result(&self, _frame: &RawTensor, _result: &DetectResult) -> Result<(), Self::Error> {
      Err(std::io::Error::other("sink closed"))
    }
  }

  /// C = 8 (1 类, 1 个关键点), 单槽位
  fn frame(score: f32) -> RawTensor {
    RawTensor::with_layout(8, 1, vec![320.0, 320.0, 64.0, 64.0, score, 0.0, 0.0, 1.0])
  }

  fn broken_frame() -> RawTensor {
    RawTensor::with_layout(3, 1, vec![0.0; 3])
  }

  fn decoder() -> PoseDecoder {
    PoseDecoder::new(DecodeConfig::default().with_keypoints_num(1))
  }

  #[test]
  fn one_shot_uses_first_frame_only() {
    let collect = Collect::default();
    let input = vec![frame(0.9), frame(0.1)];
    OneShotTask
      .run_task(input.into_iter(), decoder(), &collect)
      .unwrap();
    assert_eq!(*collect.frames.borrow(), vec![1]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let collect = Collect::default();
    let result = OneShotTask.run_task(std::iter::empty::<RawTensor>(), decoder(), &collect);
    assert!(result.is_err());
  }

  #[test]
  fn one_shot_propagates_decode_errors() {
    let collect = Collect::default();
    let result = OneShotTask.run_task(std::iter::once(broken_frame()), decoder(), &collect);
    assert!(result.is_err());
    assert!(collect.frames.borrow().is_empty());
  }

  #[test]
  fn repeat_shot_renders_every_iteration() {
    let collect = Collect::default();
    RepeatShotTask::default()
      .with_times(5)
      .run_task(std::iter::once(frame(0.9)), decoder(), &collect)
      .unwrap();
    assert_eq!(collect.frames.borrow().len(), 5);
  }

  #[test]
  fn continuous_drops_broken_frames() {
    let collect = Collect::default();
    let input = vec![frame(0.9), broken_frame(), frame(0.1), frame(0.5)];
    ContinuousTask::default()
      .run_task(input.into_iter(), decoder(), &collect)
      .unwrap();
    assert_eq!(*collect.frames.borrow(), vec![1, 0, 1]);
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let collect = Collect::default();
    let input = std::iter::repeat_with(|| frame(0.9));
    ContinuousTask::default()
      .with_frame_number(Some(3))
      .run_task(input, decoder(), &collect)
      .unwrap();
    assert_eq!(collect.frames.borrow().len(), 3);
  }

  #[test]
  fn continuous_render_errors_are_fatal() {
    let result = ContinuousTask::default().run_task(std::iter::once(frame(0.9)), decoder(), Failing);
    assert!(result.is_err());
  }
}
