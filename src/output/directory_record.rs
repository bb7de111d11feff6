// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, skeleton::keypoint_name},
  output::Render,
  tensor::RawTensor,
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 文本记录格式：每个检测一行，`?keypoints` 时在其后追加关键点行
pub struct Record {
  pub with_keypoints: bool,
}

impl Record {
  pub fn format(&self, result: &DetectResult) -> String {
    let mut records = Vec::new();
    for item in result.iter() {
      let bbox = &item.bounding_box;
      records.push(format!(
        "{}, {}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        item.slot, item.class_index, item.confidence, bbox.x, bbox.y, bbox.width, bbox.height
      ));
      if self.with_keypoints {
        for (k, kp) in item.keypoints.iter().enumerate() {
          let name = keypoint_name(k).map(str::to_string).unwrap_or_else(|| k.to_string());
          let visibility = kp
            .visibility
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string());
          records.push(format!("  {}, {:.4}, {:.4}, {}", name, kp.x, kp.y, visibility));
        }
      }
    }
    records.join("\n")
  }

  pub fn record(&self, result: &DetectResult, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path, self.format(result))
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Record,
  frame_counters: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let with_keypoints = uri.query_pairs().any(|(k, _)| k == "keypoints");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_path(uri)),
      record: Record { with_keypoints },
      frame_counters: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = match self.frame_counters.lock() {
      Ok(counter) => counter,
      Err(poisoned) => poisoned.into_inner(),
    };
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.txt",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RawTensor, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, _frame: &RawTensor, result: &DetectResult) -> Result<(), Self::Error> {
    if self.always || !result.is_empty() {
      let path = self.frame_path(Utc::now())?;
      self.record.record(result, &path)?;
      debug!("记录检测结果: {}", path.display());
    }
    Ok(())
  }
}
