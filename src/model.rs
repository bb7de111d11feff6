// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

pub const DEFAULT_KEYPOINTS_NUM: usize = 17;
pub const DEFAULT_KEYPOINTS_DIM: usize = 3;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_INPUT_RESOLUTION: f32 = 640.0;

/// 张量前 4 个通道为 cx, cy, w, h
pub const BOX_CHANNELS: usize = 4;

/// 解码参数，由模型的训练配置决定
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
  /// 每个目标的关键点数量
  pub keypoints_num: usize,
  /// 每个关键点占用的通道数（x, y, 可见度）
  pub keypoints_dim: usize,
  /// 置信度阈值，分数必须严格大于该值
  pub confidence_threshold: f32,
  /// 模型输入分辨率，用于坐标归一化
  pub input_resolution: f32,
  /// 期望的类别数量；为 None 时由通道数推导
  pub num_classes: Option<usize>,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      keypoints_num: DEFAULT_KEYPOINTS_NUM,
      keypoints_dim: DEFAULT_KEYPOINTS_DIM,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      input_resolution: DEFAULT_INPUT_RESOLUTION,
      num_classes: None,
    }
  }
}

impl DecodeConfig {
  pub fn with_keypoints_num(mut self, keypoints_num: usize) -> Self {
    self.keypoints_num = keypoints_num;
    self
  }

  pub fn with_keypoints_dim(mut self, keypoints_dim: usize) -> Self {
    self.keypoints_dim = keypoints_dim;
    self
  }

  pub fn with_confidence_threshold(mut self, confidence_threshold: f32) -> Self {
    self.confidence_threshold = confidence_threshold;
    self
  }

  pub fn with_input_resolution(mut self, input_resolution: f32) -> Self {
    self.input_resolution = input_resolution;
    self
  }

  pub fn with_num_classes(mut self, num_classes: Option<usize>) -> Self {
    self.num_classes = num_classes;
    self
  }

  /// 关键点部分占用的通道总数，溢出时返回 `None`
  pub fn keypoint_channels(&self) -> Option<usize> {
    self.keypoints_num.checked_mul(self.keypoints_dim)
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("张量形状无效: {0}")]
  InvalidShape(String),
  #[error("索引越界: 通道 {channel}, 槽位 {slot}, 张量为 {channels} x {slots}")]
  IndexOutOfRange {
    channel: usize,
    slot: usize,
    channels: usize,
    slots: usize,
  },
}

/// 归一化关键点；可见度仅在模型输出该通道时存在
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub visibility: Option<f32>,
}

/// 归一化边界框，y 轴已翻转（原点在左下）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  /// 交并比
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = (self.x + self.width).min(other.x + other.width);
    let y2 = (self.y + self.height).min(other.y + other.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  /// 来源槽位
  pub slot: usize,
  /// 得分最高的类别
  pub class_index: usize,
  /// 原始类别分数
  pub confidence: f32,
  pub bounding_box: BoundingBox,
  pub keypoints: Box<[Keypoint]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<'a> IntoIterator for &'a DetectResult {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

mod nms;
mod pose;
pub mod skeleton;

pub use self::nms::{is_valid_iou_threshold, nms};
pub use self::pose::{PoseDecoder, PoseDecoderUrlError, decode};
