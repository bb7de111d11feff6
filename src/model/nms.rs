// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use tracing::debug;

use crate::model::{DetectResult, Detection};

/// IoU 阈值须落在 (0, 1] 内，否则互不相交的框也会被抑制
pub fn is_valid_iou_threshold(iou_threshold: f32) -> bool {
  iou_threshold > 0.0 && iou_threshold <= 1.0
}

/// 同类别且 IoU 不小于阈值的检测只保留置信度最高者，保留下来的检测仍按槽位排列
pub fn nms(result: DetectResult, iou_threshold: f32) -> DetectResult {
  let before = result.len();
  let mut candidates: Vec<Detection> = result.items.into_vec();

  // 按置信度降序排序
  candidates.sort_by(|a, b| {
    b.confidence
      .partial_cmp(&a.confidence)
      .unwrap_or(Ordering::Equal)
      .then(a.slot.cmp(&b.slot))
  });

  let mut keep = vec![true; candidates.len()];
  for i in 0..candidates.len() {
    if !keep[i] {
      continue;
    }
    for j in (i + 1)..candidates.len() {
      if !keep[j] || candidates[i].class_index != candidates[j].class_index {
        continue;
      }
      if candidates[i].bounding_box.iou(&candidates[j].bounding_box) >= iou_threshold {
        keep[j] = false;
      }
    }
  }

  let mut items: Vec<Detection> = candidates
    .into_iter()
    .zip(keep)
    .filter_map(|(det, keep)| keep.then_some(det))
    .collect();
  items.sort_by_key(|det| det.slot);

  debug!("非极大值抑制: {} -> {}", before, items.len());

  DetectResult::from(items)
}
