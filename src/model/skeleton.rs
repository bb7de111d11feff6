// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/skeleton.rs - COCO 人体关键点与骨架
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

use crate::model::{Detection, Keypoint};

/// COCO 数据集 17 个关键点名称
pub const COCO_KEYPOINT_NAMES: [&str; 17] = [
  "nose",
  "left_eye",
  "right_eye",
  "left_ear",
  "right_ear",
  "left_shoulder",
  "right_shoulder",
  "left_elbow",
  "right_elbow",
  "left_wrist",
  "right_wrist",
  "left_hip",
  "right_hip",
  "left_knee",
  "right_knee",
  "left_ankle",
  "right_ankle",
];

/// 骨架连线（关键点索引对）
pub const COCO_SKELETON: [[usize; 2]; 19] = [
  [15, 13],
  [13, 11],
  [16, 14],
  [14, 12],
  [11, 12],
  [5, 11],
  [6, 12],
  [5, 6],
  [5, 7],
  [6, 8],
  [7, 9],
  [8, 10],
  [1, 2],
  [0, 1],
  [0, 2],
  [1, 3],
  [2, 4],
  [3, 5],
  [4, 6],
];

pub fn keypoint_name(index: usize) -> Option<&'static str> {
  COCO_KEYPOINT_NAMES.get(index).copied()
}

impl Detection {
  /// 按骨架取出连线两端的关键点，越界的索引对被跳过
  pub fn limbs<'a>(
    &'a self,
    skeleton: &'a [[usize; 2]],
  ) -> impl Iterator<Item = (&'a Keypoint, &'a Keypoint)> + 'a {
    skeleton
      .iter()
      .filter_map(|[a, b]| Some((self.keypoints.get(*a)?, self.keypoints.get(*b)?)))
  }
}
