// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/pipeline.rs - 输入、解码、输出全流程测试
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

use approx::assert_relative_eq;
use serde_json::Value;
use url::Url;

use shanan_pose::{
  FromUrl,
  input::InputWrapper,
  model::{DecodeConfig, Model, PoseDecoder, decode},
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
  tensor::RawTensor,
};

const CHANNELS: usize = 56;

/// 按 17 关键点、单类别布局生成张量；`scores` 决定每个槽位的类别分数
fn pose_tensor(scores: &[f32]) -> Vec<f32> {
  let slots = scores.len();
  let mut data = vec![0.0f32; CHANNELS * slots];
  for (j, &score) in scores.iter().enumerate() {
    data[j] = 320.0;
    data[slots + j] = 320.0;
    data[2 * slots + j] = 100.0;
    data[3 * slots + j] = 200.0;
    data[4 * slots + j] = score;
    for k in 0..17 {
      let base = 5 + k * 3;
      data[base * slots + j] = 32.0 * k as f32;
      data[(base + 1) * slots + j] = 64.0;
      data[(base + 2) * slots + j] = 0.5;
    }
  }
  data
}

fn write_tensor(path: &Path, data: &[f32]) {
  let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
  std::fs::write(path, bytes).unwrap();
}

#[test]
fn reference_geometry_through_public_api() {
  let data = pose_tensor(&[0.9, 0.1, 0.25]);
  let tensor = RawTensor::with_layout(CHANNELS, 3, data);

  let result = decode(&tensor, &DecodeConfig::default()).unwrap();
  assert_eq!(result.len(), 1);

  let det = &result.items[0];
  assert_eq!(det.slot, 0);
  assert_eq!(det.class_index, 0);
  assert_eq!(det.keypoints.len(), 17);
  assert_eq!(det.bounding_box.x, 0.421875);
  assert_eq!(det.bounding_box.width, 0.15625);
  assert_eq!(det.bounding_box.height, 0.3125);
  // 1 - (220 + 200) / 640
  assert_relative_eq!(det.bounding_box.y, 0.34375);
  assert_eq!(det.keypoints[10].x, 0.5);
  assert_relative_eq!(det.keypoints[10].y, 0.9);
  assert_eq!(det.keypoints[10].visibility, Some(0.5));
}

#[test]
fn single_file_to_json() {
  let dir = tempfile::tempdir().unwrap();
  let tensor_path = dir.path().join("frame.bin");
  write_tensor(&tensor_path, &pose_tensor(&[0.1, 0.8, 0.7]));
  let json_path = dir.path().join("result.json");

  let input = InputWrapper::from_url(
    &Url::parse(&format!("tensor://{}?channels={}", tensor_path.display(), CHANNELS)).unwrap(),
  )
  .unwrap();
  let model = PoseDecoder::from_url(&Url::parse("pose://?threshold=0.5").unwrap()).unwrap();
  let output =
    OutputWrapper::from_url(&Url::parse(&format!("json://{}", json_path.display())).unwrap())
      .unwrap();

  OneShotTask.run_task(input, model, output).unwrap();

  let value: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
  let detections = value.as_array().unwrap();
  assert_eq!(detections.len(), 2);
  assert_eq!(detections[0]["slot"], 1);
  assert_eq!(detections[1]["slot"], 2);
  assert_eq!(detections[0]["keypoints"].as_array().unwrap().len(), 17);
}

#[test]
fn directory_stream_drops_mismatched_frames() {
  let dir = tempfile::tempdir().unwrap();
  let frames = dir.path().join("frames");
  std::fs::create_dir(&frames).unwrap();
  write_tensor(&frames.join("0001.bin"), &pose_tensor(&[0.9, 0.9]));
  write_tensor(&frames.join("0002.bin"), &pose_tensor(&[0.1]));
  write_tensor(&frames.join("0003.bin"), &pose_tensor(&[0.3, 0.1, 0.6]));
  let json_path = dir.path().join("result.jsonl");

  let input = InputWrapper::from_url(
    &Url::parse(&format!("tensors://{}?channels={}", frames.display(), CHANNELS)).unwrap(),
  )
  .unwrap();
  // 要求两个类别，56 通道的张量全部解码失败
  let strict = PoseDecoder::new(DecodeConfig::default().with_num_classes(Some(2)));
  let output = OutputWrapper::from_url(
    &Url::parse(&format!("json://{}?lines", json_path.display())).unwrap(),
  )
  .unwrap();
  ContinuousTask::default()
    .run_task(input, strict, output)
    .unwrap();
  assert!(!json_path.exists());

  let input = InputWrapper::from_url(
    &Url::parse(&format!("tensors://{}?channels={}", frames.display(), CHANNELS)).unwrap(),
  )
  .unwrap();
  let output = OutputWrapper::from_url(
    &Url::parse(&format!("json://{}?lines", json_path.display())).unwrap(),
  )
  .unwrap();
  ContinuousTask::default()
    .run_task(input, PoseDecoder::default(), output)
    .unwrap();

  let counts: Vec<usize> = std::fs::read_to_string(&json_path)
    .unwrap()
    .lines()
    .map(|line| {
      let value: Value = serde_json::from_str(line).unwrap();
      value["detections"].as_array().unwrap().len()
    })
    .collect();
  assert_eq!(counts, vec![2, 0, 2]);
}

#[test]
fn decoder_is_a_model() {
  fn run<M: Model<Input = RawTensor>>(model: &M, tensor: &RawTensor) -> bool {
    model.infer(tensor).is_ok()
  }

  let tensor = RawTensor::with_layout(CHANNELS, 1, pose_tensor(&[0.9]));
  assert!(run(&PoseDecoder::default(), &tensor));
}
