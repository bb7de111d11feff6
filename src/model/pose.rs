// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/pose.rs - YOLO 姿态模型输出解码
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
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, query_value,
  model::{
    BOX_CHANNELS, BoundingBox, DecodeConfig, DecodeError, DetectResult, Detection, Keypoint, Model,
    is_valid_iou_threshold, nms,
  },
  tensor::RawTensor,
};

/// 校验张量形状与解码参数，返回类别数量
fn resolve_num_classes(tensor: &RawTensor, config: &DecodeConfig) -> Result<usize, DecodeError> {
  let [batch, channels, slots] = tensor.shape();

  if batch != 1 {
    return Err(DecodeError::InvalidShape(format!(
      "批大小必须为 1, 实际为 {}",
      batch
    )));
  }

  if config.keypoints_dim < 2 {
    return Err(DecodeError::InvalidShape(format!(
      "关键点维度至少为 2, 实际为 {}",
      config.keypoints_dim
    )));
  }

  if !config.input_resolution.is_finite() || config.input_resolution <= 0.0 {
    return Err(DecodeError::InvalidShape(format!(
      "输入分辨率无效: {}",
      config.input_resolution
    )));
  }

  if !config.confidence_threshold.is_finite() {
    return Err(DecodeError::InvalidShape(format!(
      "置信度阈值无效: {}",
      config.confidence_threshold
    )));
  }

  let reserved = config
    .keypoint_channels()
    .and_then(|n| n.checked_add(BOX_CHANNELS))
    .ok_or_else(|| {
      DecodeError::InvalidShape(format!(
        "关键点通道数溢出: {} x {}",
        config.keypoints_num, config.keypoints_dim
      ))
    })?;
  let num_classes = match channels.checked_sub(reserved) {
    Some(n) if n > 0 => n,
    _ => {
      return Err(DecodeError::InvalidShape(format!(
        "通道数 {} 不足以容纳 {} 个边界框通道和 {} x {} 个关键点通道",
        channels, BOX_CHANNELS, config.keypoints_num, config.keypoints_dim
      )));
    }
  };

  if let Some(expected) = config.num_classes
    && expected != num_classes
  {
    return Err(DecodeError::InvalidShape(format!(
      "期望 {} 个类别, 通道数 {} 推导出 {} 个",
      expected, channels, num_classes
    )));
  }

  let required = channels.checked_mul(slots).ok_or_else(|| {
    DecodeError::InvalidShape(format!("张量尺寸溢出: {} x {}", channels, slots))
  })?;
  if slots > 0 && tensor.as_slice().len() < required {
    return Err(DecodeError::IndexOutOfRange {
      channel: channels - 1,
      slot: slots - 1,
      channels,
      slots,
    });
  }

  Ok(num_classes)
}

/// 将 `[1, C, N]` 的原始输出解码为检测结果。
///
/// 每个槽位至多产生一个检测，结果按槽位顺序排列，不做排序或抑制。
/// 出错时不返回任何部分结果。
pub fn decode(tensor: &RawTensor, config: &DecodeConfig) -> Result<DetectResult, DecodeError> {
  let num_classes = resolve_num_classes(tensor, config)?;
  let slots = tensor.slots();
  let resolution = config.input_resolution;
  let keypoint_base = BOX_CHANNELS + num_classes;

  debug!(
    "解码张量: {} 个槽位, {} 个类别, {} 个关键点",
    slots, num_classes, config.keypoints_num
  );

  let mut items = Vec::new();

  for slot in 0..slots {
    let (score, class_index) = {
      let mut max_score = f32::NEG_INFINITY;
      let mut cls_idx = 0usize;
      for c in 0..num_classes {
        let score = tensor.at(BOX_CHANNELS + c, slot)?;
        if score > max_score {
          max_score = score;
          cls_idx = c;
        }
      }
      (max_score, cls_idx)
    };

    if score <= config.confidence_threshold {
      continue;
    }

    let cx = tensor.at(0, slot)?;
    let cy = tensor.at(1, slot)?;
    let w = tensor.at(2, slot)?;
    let h = tensor.at(3, slot)?;

    let x0 = cx - w / 2.0;
    let y0 = cy - h / 2.0;

    let bounding_box = BoundingBox {
      x: x0 / resolution,
      y: 1.0 - (y0 + h) / resolution,
      width: w / resolution,
      height: h / resolution,
    };

    let keypoints = (0..config.keypoints_num)
      .map(|k| {
        let base = keypoint_base + k * config.keypoints_dim;
        let kx = tensor.at(base, slot)?;
        let ky = tensor.at(base + 1, slot)?;
        let visibility = if config.keypoints_dim > 2 {
          Some(tensor.at(base + 2, slot)?)
        } else {
          None
        };
        Ok(Keypoint {
          x: kx / resolution,
          y: 1.0 - ky / resolution,
          visibility,
        })
      })
      .collect::<Result<Box<[Keypoint]>, DecodeError>>()?;

    items.push(Detection {
      slot,
      class_index,
      confidence: score,
      bounding_box,
      keypoints,
    });
  }

  debug!("检测到 {} 个目标", items.len());

  Ok(DetectResult::from(items))
}

#[derive(Error, Debug)]
pub enum PoseDecoderUrlError {
  #[error("URI 方案不匹配: 期望 '{0}', 实际 '{1}'")]
  SchemeMismatch(&'static str, String),
  #[error("参数 {0} 的值无效: {1}")]
  InvalidParameter(&'static str, String),
}

/// 以 [`Model`] 形式包装的解码器，可在任务循环中替代推理模型。
/// 设置了 NMS 阈值时，在解码之后再做非极大值抑制。
#[derive(Debug, Clone, Default)]
pub struct PoseDecoder {
  config: DecodeConfig,
  nms_threshold: Option<f32>,
}

impl PoseDecoder {
  pub fn new(config: DecodeConfig) -> Self {
    Self {
      config,
      nms_threshold: None,
    }
  }

  pub fn with_nms(mut self, nms_threshold: Option<f32>) -> Self {
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn config(&self) -> &DecodeConfig {
    &self.config
  }

  pub fn nms_threshold(&self) -> Option<f32> {
    self.nms_threshold
  }
}

impl From<DecodeConfig> for PoseDecoder {
  fn from(config: DecodeConfig) -> Self {
    Self::new(config)
  }
}

impl FromUrlWithScheme for PoseDecoder {
  const SCHEME: &'static str = "pose";
}

fn parameter<T: std::str::FromStr>(
  url: &Url,
  key: &'static str,
) -> Result<Option<T>, PoseDecoderUrlError> {
  query_value(url, key)
    .transpose()
    .map_err(|v| PoseDecoderUrlError::InvalidParameter(key, v))
}

impl FromUrl for PoseDecoder {
  type Error = PoseDecoderUrlError;

  /// `pose://?threshold=0.25&keypoints=17&dim=3&resolution=640&classes=1&nms=0.45`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(PoseDecoderUrlError::SchemeMismatch(
        Self::SCHEME,
        url.scheme().to_string(),
      ));
    }

    let mut config = DecodeConfig::default();
    if let Some(threshold) = parameter(url, "threshold")? {
      config = config.with_confidence_threshold(threshold);
    }
    if let Some(keypoints) = parameter(url, "keypoints")? {
      config = config.with_keypoints_num(keypoints);
    }
    if let Some(dim) = parameter(url, "dim")? {
      config = config.with_keypoints_dim(dim);
    }
    if let Some(resolution) = parameter(url, "resolution")? {
      config = config.with_input_resolution(resolution);
    }
    if let Some(classes) = parameter(url, "classes")? {
      config = config.with_num_classes(Some(classes));
    }

    let nms_threshold: Option<f32> = parameter(url, "nms")?;
    if let Some(threshold) = nms_threshold
      && !is_valid_iou_threshold(threshold)
    {
      return Err(PoseDecoderUrlError::InvalidParameter(
        "nms",
        threshold.to_string(),
      ));
    }

    debug!("解码参数: {:?}, NMS 阈值: {:?}", config, nms_threshold);
    Ok(Self::new(config).with_nms(nms_threshold))
  }
}

impl Model for PoseDecoder {
  type Input = RawTensor;
  type Output = DetectResult;
  type Error = DecodeError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let result = decode(input, &self.config)?;
    Ok(match self.nms_threshold {
      Some(threshold) => nms(result, threshold),
      None => result,
    })
  }
}
