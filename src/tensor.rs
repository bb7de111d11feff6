// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor.rs - 模型输出张量定义
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

use crate::model::DecodeError;

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("字节长度 {0} 不是 4 的整数倍")]
  InvalidByteLength(usize),
}

/// 模型原始输出，逻辑形状为 `[1, C, N]`，按通道优先存储：
/// 通道 `i`、槽位 `j` 的元素位于 `i * N + j`。
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
  shape: [usize; 3],
  data: Box<[f32]>,
}

impl RawTensor {
  /// 构造张量，不校验数据长度；长度问题由解码阶段报告
  pub fn new(shape: [usize; 3], data: impl Into<Box<[f32]>>) -> Self {
    Self {
      shape,
      data: data.into(),
    }
  }

  /// 以 `[1, channels, slots]` 形状构造
  pub fn with_layout(channels: usize, slots: usize, data: impl Into<Box<[f32]>>) -> Self {
    Self::new([1, channels, slots], data)
  }

  /// 从小端序 f32 字节流构造
  pub fn from_le_bytes(shape: [usize; 3], bytes: &[u8]) -> Result<Self, TensorError> {
    if bytes.len() % F32_BYTES != 0 {
      return Err(TensorError::InvalidByteLength(bytes.len()));
    }

    let data: Vec<f32> = bytes
      .chunks_exact(F32_BYTES)
      .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect();

    Ok(Self::new(shape, data))
  }

  pub fn shape(&self) -> [usize; 3] {
    self.shape
  }

  /// 通道数 C
  pub fn channels(&self) -> usize {
    self.shape[1]
  }

  /// 槽位数 N
  pub fn slots(&self) -> usize {
    self.shape[2]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 带边界检查地读取 (channel, slot) 处的值
  pub fn at(&self, channel: usize, slot: usize) -> Result<f32, DecodeError> {
    let (channels, slots) = (self.channels(), self.slots());
    if channel >= channels || slot >= slots {
      return Err(DecodeError::IndexOutOfRange {
        channel,
        slot,
        channels,
        slots,
      });
    }

    self
      .data
      .get(channel * slots + slot)
      .copied()
      .ok_or(DecodeError::IndexOutOfRange {
        channel,
        slot,
        channels,
        slots,
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channel_major_layout() {
    // C = 2, N = 3
    let tensor = RawTensor::with_layout(2, 3, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    assert_eq!(tensor.at(0, 2).unwrap(), 2.0);
    assert_eq!(tensor.at(1, 0).unwrap(), 10.0);
    assert_eq!(tensor.at(1, 2).unwrap(), 12.0);
  }

  #[test]
  fn out_of_range_reads_are_reported() {
    let tensor = RawTensor::with_layout(2, 3, vec![0.0; 6]);
    assert!(matches!(
      tensor.at(2, 0),
      Err(DecodeError::IndexOutOfRange { channel: 2, .. })
    ));
    assert!(matches!(
      tensor.at(0, 3),
      Err(DecodeError::IndexOutOfRange { slot: 3, .. })
    ));

    let short = RawTensor::with_layout(2, 3, vec![0.0; 4]);
    assert!(short.at(1, 2).is_err());
    assert!(short.at(1, 0).is_ok());
  }

  #[test]
  fn decodes_little_endian_bytes() {
    let bytes: Vec<u8> = [1.5f32, -2.0, 640.0]
      .iter()
      .flat_map(|v| v.to_le_bytes())
      .collect();
    let tensor = RawTensor::from_le_bytes([1, 3, 1], &bytes).unwrap();
    assert_eq!(tensor.as_slice(), &[1.5, -2.0, 640.0]);

    assert!(matches!(
      RawTensor::from_le_bytes([1, 1, 1], &bytes[..5]),
      Err(TensorError::InvalidByteLength(5))
    ));
  }
}
