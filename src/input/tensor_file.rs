// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/tensor_file.rs - 张量文件输入
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

use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, query_value,
  tensor::{RawTensor, TensorError},
  url_path,
};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("缺少参数: {0}")]
  MissingParameter(&'static str),
  #[error("参数 {0} 的值无效: {1}")]
  InvalidParameter(&'static str, String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
  #[error("{elements} 个元素无法按 {channels} 个通道排列")]
  LayoutMismatch { elements: usize, channels: usize },
}

/// 从 URL 查询参数中读取张量布局 `channels` 与可选的 `slots`
pub(crate) fn layout_from_url(url: &Url) -> Result<(usize, Option<usize>), TensorFileInputError> {
  let channels = query_value::<usize>(url, "channels")
    .ok_or(TensorFileInputError::MissingParameter("channels"))?
    .map_err(|v| TensorFileInputError::InvalidParameter("channels", v))?;
  if channels == 0 {
    return Err(TensorFileInputError::InvalidParameter(
      "channels",
      channels.to_string(),
    ));
  }

  let slots = query_value::<usize>(url, "slots")
    .transpose()
    .map_err(|v| TensorFileInputError::InvalidParameter("slots", v))?;

  Ok((channels, slots))
}

/// 读取小端序 f32 原始文件；未给出槽位数时按文件长度推导
pub fn load_tensor(
  path: impl AsRef<Path>,
  channels: usize,
  slots: Option<usize>,
) -> Result<RawTensor, TensorFileInputError> {
  let path = path.as_ref();
  let bytes = std::fs::read(path)?;
  debug!("读取张量文件 {}: {} 字节", path.display(), bytes.len());

  let elements = bytes.len() / std::mem::size_of::<f32>();
  let slots = match slots {
    Some(slots) => slots,
    None if elements % channels == 0 => elements / channels,
    None => {
      return Err(TensorFileInputError::LayoutMismatch { elements, channels });
    }
  };

  Ok(RawTensor::from_le_bytes([1, channels, slots], &bytes)?)
}

const TENSOR_FILE_SCHEME: &str = "tensor";

/// 单个张量文件，只产生一帧
pub struct TensorFileInput {
  tensor: Option<RawTensor>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = TENSOR_FILE_SCHEME;
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemaMismatch);
    }

    let (channels, slots) = layout_from_url(url)?;
    let path = url_path(url);
    let tensor = load_tensor(&path, channels, slots)?;
    info!("加载张量 {}: 形状 {:?}", path, tensor.shape());

    Ok(TensorFileInput {
      tensor: Some(tensor),
    })
  }
}

impl From<RawTensor> for TensorFileInput {
  fn from(tensor: RawTensor) -> Self {
    Self {
      tensor: Some(tensor),
    }
  }
}

impl Iterator for TensorFileInput {
  type Item = RawTensor;

  fn next(&mut self) -> Option<Self::Item> {
    self.tensor.take()
  }
}
