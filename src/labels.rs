// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/labels.rs - 类别标签表
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
use tracing::info;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("读取标签文件失败 {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
}

/// 按类别索引排列的类别名称，启动时加载一次
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  names: Vec<String>,
}

impl LabelTable {
  /// 每行一个类别名称
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let table = Self::parse(&content);
    info!("加载标签文件 {}: {} 个类别", path.display(), table.len());
    Ok(table)
  }

  pub fn parse(content: &str) -> Self {
    Self {
      names: content.lines().map(str::to_string).collect(),
    }
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl<S: Into<String>> FromIterator<S> for LabelTable {
  fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
    Self {
      names: iter.into_iter().map(Into::into).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_one_name_per_line() {
    let table = LabelTable::parse("person\nbicycle\r\ncar\n");
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(1), Some("bicycle"));
    assert_eq!(table.get(2), Some("car"));
    assert_eq!(table.get(3), None);
  }

  #[test]
  fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coco.txt");
    std::fs::write(&path, "person\ncat\n").unwrap();

    let table = LabelTable::load(&path).unwrap();
    assert_eq!(table, ["person", "cat"].into_iter().collect::<LabelTable>());
    assert!(matches!(
      LabelTable::load(dir.path().join("missing.txt")),
      Err(LabelError::Io { .. })
    ));
  }
}
