// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/json_file.rs - JSON 文件输出
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

use std::{io::Write, path::Path};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::Render,
  tensor::RawTensor,
  url_path,
};

#[derive(Error, Debug)]
pub enum JsonOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 将检测结果转换为 JSON 数组
pub fn detections_to_json(result: &DetectResult) -> Value {
  result
    .iter()
    .map(|det| {
      let keypoints: Vec<Value> = det
        .keypoints
        .iter()
        .map(|kp| json!({ "x": kp.x, "y": kp.y, "visibility": kp.visibility }))
        .collect();
      json!({
        "slot": det.slot,
        "class_index": det.class_index,
        "confidence": det.confidence,
        "bounding_box": {
          "x": det.bounding_box.x,
          "y": det.bounding_box.y,
          "width": det.bounding_box.width,
          "height": det.bounding_box.height,
        },
        "keypoints": keypoints,
      })
    })
    .collect()
}

/// `json:///path/out.json` 每帧覆盖写入；`?lines` 时每帧追加一行
pub struct JsonFileOutput {
  path: String,
  lines: bool,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(JsonFileOutput {
      path: url_path(uri),
      lines: uri.query_pairs().any(|(k, _)| k == "lines"),
    })
  }
}

impl JsonFileOutput {
  fn write_value(&self, value: &Value) -> Result<(), JsonOutputError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    if self.lines {
      let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&self.path)?;
      serde_json::to_writer(&mut file, value)?;
      file.write_all(b"\n")?;
    } else {
      let file = std::fs::File::create(&self.path)?;
      serde_json::to_writer_pretty(file, value)?;
    }

    debug!("保存检测结果到文件: {}", self.path);
    Ok(())
  }
}

impl Render<RawTensor, DetectResult> for JsonFileOutput {
  type Error = JsonOutputError;

  fn render_result(&self, frame: &RawTensor, result: &DetectResult) -> Result<(), Self::Error> {
    let value = if self.lines {
      json!({
        "shape": frame.shape(),
        "detections": detections_to_json(result),
      })
    } else {
      detections_to_json(result)
    };
    self.write_value(&value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BoundingBox, Detection, Keypoint};

  fn sample() -> DetectResult {
    DetectResult::from(vec![Detection {
      slot: 3,
      class_index: 0,
      confidence: 0.5,
      bounding_box: BoundingBox {
        x: 0.25,
        y: 0.5,
        width: 0.125,
        height: 0.0625,
      },
      keypoints: vec![
        Keypoint {
          x: 0.5,
          y: 0.75,
          visibility: Some(1.0),
        },
        Keypoint {
          x: 0.0,
          y: 1.0,
          visibility: None,
        },
      ]
      .into_boxed_slice(),
    }])
  }

  #[test]
  fn detections_serialize_as_plain_fields() {
    let value = detections_to_json(&sample());
    let det = &value[0];
    assert_eq!(det["slot"], 3);
    assert_eq!(det["class_index"], 0);
    assert_eq!(det["confidence"], 0.5);
    assert_eq!(det["bounding_box"]["width"], 0.125);
    assert_eq!(det["keypoints"][0]["y"], 0.75);
    assert_eq!(det["keypoints"][1]["visibility"], Value::Null);
  }

  #[test]
  fn line_mode_appends_one_document_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("result.jsonl");
    let url = Url::parse(&format!("json://{}?lines", path.display())).unwrap();
    let output = JsonFileOutput::from_url(&url).unwrap();

    let frame = RawTensor::with_layout(56, 0, Vec::<f32>::new());
    output.render_result(&frame, &sample()).unwrap();
    output.render_result(&frame, &DetectResult::default()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = text
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["shape"], json!([1, 56, 0]));
    assert_eq!(lines[0]["detections"].as_array().unwrap().len(), 1);
    assert!(lines[1]["detections"].as_array().unwrap().is_empty());
  }

  #[test]
  fn array_mode_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    let output = JsonFileOutput::from_url(&url).unwrap();

    let frame = RawTensor::with_layout(56, 0, Vec::<f32>::new());
    output.render_result(&frame, &sample()).unwrap();
    output.render_result(&frame, &DetectResult::default()).unwrap();

    let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value, json!([]));
  }
}
