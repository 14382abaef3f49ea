// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/registry.rs - 本地模型注册表
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

use std::{collections::BTreeMap, path::Path};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::ModelDescriptor;

#[derive(Error, Debug)]
pub enum RegistryError {
  #[error("读取模型目录失败 {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("模型名称重复: {0}")]
  DuplicateModel(String),
  #[error("模型名称为空: {0}")]
  EmptyModelId(String),
}

/// 模型标识到模型描述的映射，构建时完成校验
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
  models: BTreeMap<String, ModelDescriptor>,
}

/// 文件名去掉扩展名后，把 `.` 替换为 `_` 作为模型标识
pub fn model_id_from_file_name(file_name: &str, extension: &str) -> Option<String> {
  let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
  Some(stem.replace('.', "_"))
}

impl ModelRegistry {
  pub fn from_descriptors<I>(descriptors: I) -> Result<Self, RegistryError>
  where
    I: IntoIterator<Item = ModelDescriptor>,
  {
    let mut models = BTreeMap::new();
    for descriptor in descriptors {
      if descriptor.id.is_empty() {
        return Err(RegistryError::EmptyModelId(
          descriptor.path.display().to_string(),
        ));
      }
      if models.contains_key(&descriptor.id) {
        return Err(RegistryError::DuplicateModel(descriptor.id));
      }
      models.insert(descriptor.id.clone(), descriptor);
    }
    Ok(Self { models })
  }

  /// 扫描目录下扩展名为 `extension` 的模型文件
  pub fn scan_dir(dir: impl AsRef<Path>, extension: &str) -> Result<Self, RegistryError> {
    let dir = dir.as_ref();
    let io_error = |source| RegistryError::Io {
      path: dir.display().to_string(),
      source,
    };

    let mut descriptors = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
      let entry = entry.map_err(io_error)?;
      if !entry.file_type().map_err(io_error)?.is_file() {
        continue;
      }
      let file_name = entry.file_name();
      let Some(file_name) = file_name.to_str() else {
        warn!("跳过非 UTF-8 文件名: {:?}", entry.path());
        continue;
      };
      if let Some(id) = model_id_from_file_name(file_name, extension) {
        debug!("发现模型 {}: {}", id, entry.path().display());
        descriptors.push(ModelDescriptor {
          id,
          path: entry.path(),
        });
      }
    }

    let registry = Self::from_descriptors(descriptors)?;
    info!(
      "模型目录 {} 中共有 {} 个模型",
      dir.display(),
      registry.len()
    );
    Ok(registry)
  }

  pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
    self.models.get(id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.models.contains_key(id)
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.models.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.models.len()
  }

  pub fn is_empty(&self) -> bool {
    self.models.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn model_ids_from_file_names() {
    assert_eq!(
      model_id_from_file_name("yolov7e6.hef", "hef").as_deref(),
      Some("yolov7e6")
    );
    assert_eq!(
      model_id_from_file_name("yolov8.s.v2.hef", "hef").as_deref(),
      Some("yolov8_s_v2")
    );
    assert_eq!(model_id_from_file_name("coco.txt", "hef"), None);
    assert_eq!(model_id_from_file_name("modelhef", "hef"), None);
  }

  #[test]
  fn scan_dir_keeps_only_model_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("yolov7e6.hef"), b"").unwrap();
    std::fs::write(dir.path().join("yolov8.s.hef"), b"").unwrap();
    std::fs::write(dir.path().join("coco.txt"), b"person").unwrap();
    std::fs::create_dir(dir.path().join("nested.hef")).unwrap();

    let registry = ModelRegistry::scan_dir(dir.path(), "hef").unwrap();
    assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["yolov7e6", "yolov8_s"]);
    assert_eq!(
      registry.get("yolov8_s").map(|d| d.path.clone()),
      Some(dir.path().join("yolov8.s.hef"))
    );
    assert!(!registry.contains("nested"));
  }

  #[test]
  fn scan_missing_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ModelRegistry::scan_dir(dir.path().join("missing"), "hef"),
      Err(RegistryError::Io { .. })
    ));
  }

  #[test]
  fn duplicate_ids_are_rejected() {
    let descriptor = |id: &str, path: &str| ModelDescriptor {
      id: id.to_string(),
      path: PathBuf::from(path),
    };
    let result = ModelRegistry::from_descriptors([
      descriptor("yolo_s", "models/yolo_s.hef"),
      descriptor("yolo_s", "models/yolo.s.hef"),
    ]);
    assert!(matches!(result, Err(RegistryError::DuplicateModel(id)) if id == "yolo_s"));
  }
}
