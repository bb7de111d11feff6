// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::Render,
  tensor::RawTensor,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 通过 tracing 打印检测结果；`log://?keypoints` 同时打印关键点
#[derive(Debug, Default)]
pub struct LogOutput {
  keypoints: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(LogOutput {
      keypoints: url.query_pairs().any(|(k, _)| k == "keypoints"),
    })
  }
}

impl Render<RawTensor, DetectResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, frame: &RawTensor, result: &DetectResult) -> Result<(), Self::Error> {
    info!(
      "张量 {:?}: 检测到 {} 个目标",
      frame.shape(),
      result.len()
    );
    for det in result {
      let bbox = &det.bounding_box;
      info!(
        "  - 槽位 {} 类别 {}: {:.2}% at ({:.4}, {:.4}, {:.4}x{:.4})",
        det.slot,
        det.class_index,
        det.confidence * 100.0,
        bbox.x,
        bbox.y,
        bbox.width,
        bbox.height
      );
      if self.keypoints {
        for (k, kp) in det.keypoints.iter().enumerate() {
          debug!("      关键点 {}: ({:.4}, {:.4}) {:?}", k, kp.x, kp.y, kp.visibility);
        }
      }
    }
    Ok(())
  }
}
