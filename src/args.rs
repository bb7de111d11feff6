// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 解码参数配置
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

use clap::Args;

use crate::model::{
  DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_RESOLUTION, DEFAULT_KEYPOINTS_DIM,
  DEFAULT_KEYPOINTS_NUM, DecodeConfig, PoseDecoder, is_valid_iou_threshold,
};

/// 解析 NMS IOU 阈值，只接受 (0, 1] 内的值
fn parse_iou_threshold(value: &str) -> Result<f32, String> {
  let threshold: f32 = value.parse().map_err(|e| format!("{}", e))?;
  if is_valid_iou_threshold(threshold) {
    Ok(threshold)
  } else {
    Err(format!("IOU 阈值必须在 (0, 1] 内, 实际为 {}", threshold))
  }
}

/// 解码参数
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
  /// 置信度阈值，类别分数必须严格大于该值
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 每个目标的关键点数量
  #[arg(long, default_value_t = DEFAULT_KEYPOINTS_NUM, value_name = "COUNT")]
  pub keypoints: usize,

  /// 每个关键点占用的通道数（2 表示无可见度通道）
  #[arg(long, default_value_t = DEFAULT_KEYPOINTS_DIM, value_name = "DIM")]
  pub keypoints_dim: usize,

  /// 模型输入分辨率
  #[arg(long, default_value_t = DEFAULT_INPUT_RESOLUTION, value_name = "PIXELS")]
  pub resolution: f32,

  /// 期望的类别数量（省略时由通道数推导）
  #[arg(long, value_name = "COUNT")]
  pub classes: Option<usize>,

  /// NMS IOU 阈值 (0.0 - 1.0)，省略时不做抑制
  #[arg(long, value_name = "THRESHOLD", value_parser = parse_iou_threshold)]
  pub nms_threshold: Option<f32>,
}

impl From<&DecodeArgs> for DecodeConfig {
  fn from(args: &DecodeArgs) -> Self {
    DecodeConfig::default()
      .with_confidence_threshold(args.confidence)
      .with_keypoints_num(args.keypoints)
      .with_keypoints_dim(args.keypoints_dim)
      .with_input_resolution(args.resolution)
      .with_num_classes(args.classes)
  }
}

impl From<&DecodeArgs> for PoseDecoder {
  fn from(args: &DecodeArgs) -> Self {
    PoseDecoder::new(DecodeConfig::from(args)).with_nms(args.nms_threshold)
  }
}
