// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/tensor_dir.rs - 张量目录输入
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

use std::{collections::VecDeque, path::PathBuf};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::tensor_file::{TensorFileInputError, layout_from_url, load_tensor},
  tensor::RawTensor,
  url_path,
};

#[derive(Error, Debug)]
pub enum TensorDirInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("张量布局参数错误: {0}")]
  LayoutError(#[from] TensorFileInputError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

const TENSOR_EXTENSION: &str = "bin";

/// 目录中按文件名排序的 `*.bin` 张量序列，每个文件一帧
pub struct TensorDirInput {
  files: VecDeque<PathBuf>,
  channels: usize,
  slots: Option<usize>,
}

impl FromUrlWithScheme for TensorDirInput {
  const SCHEME: &'static str = "tensors";
}

impl FromUrl for TensorDirInput {
  type Error = TensorDirInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorDirInputError::SchemeMismatch);
    }

    let (channels, slots) = layout_from_url(url)?;
    let directory = PathBuf::from(url_path(url));

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && path.extension().is_some_and(|ext| ext == TENSOR_EXTENSION) {
        files.push(path);
      }
    }
    files.sort();

    info!(
      "张量目录 {}: 共 {} 个文件",
      directory.display(),
      files.len()
    );

    Ok(TensorDirInput {
      files: files.into(),
      channels,
      slots,
    })
  }
}

impl Iterator for TensorDirInput {
  type Item = RawTensor;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      match load_tensor(&path, self.channels, self.slots) {
        Ok(tensor) => return Some(tensor),
        Err(e) => {
          error!("跳过张量文件 {}: {}", path.display(), e);
        }
      }
    }
    None
  }

  /// 读取失败的文件会被跳过，因此只给出上界
  fn size_hint(&self) -> (usize, Option<usize>) {
    (0, Some(self.files.len()))
  }
}
