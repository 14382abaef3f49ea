// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/extract.rs - 检测结果提取与标签关联
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

use crate::{
  labels::LabelTable,
  model::{Detection, DetectionSet, RawDetections},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
  #[error("类别索引越界: {class_id}, 标签表只有 {len} 项")]
  LabelIndexOutOfRange { class_id: usize, len: usize },
}

/// 保留 `score >= threshold` 的条目，顺序为（类别，类别内）出现顺序
pub fn extract(raw: &RawDetections, threshold: f32) -> DetectionSet {
  let mut set = DetectionSet::default();

  for (class_id, entries) in raw.classes.iter().enumerate() {
    for entry in entries {
      if entry.score >= threshold {
        set.push(Detection {
          class_id,
          label: None,
          score: entry.score,
          bbox: entry.bbox,
          absolute: None,
        });
      }
    }
  }

  debug!("阈值 {} 下保留 {} 个检测结果", threshold, set.len());
  set
}

pub fn attach_labels(set: &mut DetectionSet, labels: &LabelTable) -> Result<(), ExtractError> {
  for detection in set.iter_mut() {
    let Some(name) = labels.get(detection.class_id) else {
      error!(
        "模型输出类别 {} 超出标签表范围 ({})，模型与标签表不匹配",
        detection.class_id,
        labels.len()
      );
      return Err(ExtractError::LabelIndexOutOfRange {
        class_id: detection.class_id,
        len: labels.len(),
      });
    };
    detection.label = Some(name.to_string());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::RawBox;

  fn entry(score: f32) -> RawBox {
    RawBox {
      bbox: [0.1, 0.2, 0.3, 0.4],
      score,
    }
  }

  #[test]
  fn keeps_entries_at_or_above_threshold_in_order() {
    let raw = RawDetections::new(vec![
      vec![entry(0.9), entry(0.2)],
      vec![],
      vec![entry(0.6), entry(0.59), entry(0.75)],
    ]);

    let set = extract(&raw, 0.6);
    let kept: Vec<_> = set.iter().map(|d| (d.class_id, d.score)).collect();
    assert_eq!(kept, vec![(0, 0.9), (2, 0.6), (2, 0.75)]);
    assert_eq!(set.len(), 3);
    assert!(set.iter().all(|d| d.label.is_none() && d.absolute.is_none()));
  }

  #[test]
  fn count_matches_manual_count() {
    let scores = [0.05f32, 0.3, 0.45, 0.5, 0.55, 0.99, 1.0, 0.0];
    let raw = RawDetections::new(vec![
      scores.iter().map(|&s| entry(s)).collect(),
      scores.iter().rev().map(|&s| entry(s)).collect(),
    ]);
    for threshold in [0.0f32, 0.3, 0.5, 0.51, 1.0] {
      let expected = 2 * scores.iter().filter(|&&s| s >= threshold).count();
      assert_eq!(extract(&raw, threshold).len(), expected, "threshold {threshold}");
    }
  }

  #[test]
  fn empty_input_is_not_an_error() {
    assert!(extract(&RawDetections::default(), 0.5).is_empty());
    let raw = RawDetections::new(vec![vec![entry(0.1)], vec![entry(0.2)]]);
    assert_eq!(extract(&raw, 0.5).len(), 0);
  }

  #[test]
  fn labels_are_resolved_by_class() {
    let raw = RawDetections::new(vec![vec![], vec![entry(0.8)], vec![entry(0.7)]]);
    let mut set = extract(&raw, 0.5);
    let labels: LabelTable = ["person", "bicycle", "car"].into_iter().collect();

    attach_labels(&mut set, &labels).unwrap();
    assert_eq!(set.labels().collect::<Vec<_>>(), vec!["bicycle", "car"]);
  }

  #[test]
  fn class_outside_label_table_fails() {
    let raw = RawDetections::new(vec![vec![], vec![], vec![entry(0.8)]]);
    let mut set = extract(&raw, 0.5);
    let labels: LabelTable = ["person", "bicycle"].into_iter().collect();

    assert_eq!(
      attach_labels(&mut set, &labels),
      Err(ExtractError::LabelIndexOutOfRange { class_id: 2, len: 2 })
    );
  }
}
