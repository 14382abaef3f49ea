// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/model.rs - 模型与检测数据定义
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

use std::{path::PathBuf, time::Duration};

use crate::frame::RgbNhwcFrame;

/// 模型输入尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
  pub width: u32,
  pub height: u32,
}

impl InputShape {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

/// 模型注册表中的一项：模型标识与模型文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
  pub id: String,
  pub path: PathBuf,
}

/// 加速器原始输出中的一个条目
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
  pub bbox: [f32; 4], // [y_min, x_min, y_max, x_max]，相对模型输入归一化
  pub score: f32,
}

/// 加速器原始输出，按类别索引组织
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
  pub classes: Vec<Vec<RawBox>>,
}

impl RawDetections {
  pub fn new(classes: Vec<Vec<RawBox>>) -> Self {
    Self { classes }
  }

  pub fn is_empty(&self) -> bool {
    self.classes.iter().all(Vec::is_empty)
  }
}

impl From<Vec<Vec<RawBox>>> for RawDetections {
  fn from(classes: Vec<Vec<RawBox>>) -> Self {
    Self { classes }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: usize,
  pub label: Option<String>,
  pub score: f32,
  pub bbox: [f32; 4], // [y_min, x_min, y_max, x_max]
  pub absolute: Option<[i32; 4]>, // 原图像素坐标，顺序同 bbox
}

/// 一次推理中保留下来的检测结果，顺序即提取顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
  items: Vec<Detection>,
}

impl DetectionSet {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Detection> {
    self.items.iter_mut()
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.items.iter().filter_map(|d| d.label.as_deref())
  }

  pub(crate) fn push(&mut self, detection: Detection) {
    self.items.push(detection);
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

/// 硬件加速器驱动接口
///
/// 同一时刻只会有一个 `Model` 存活，由 [`crate::device::DeviceSession`] 独占持有；
/// 所有调用都在会话锁内进行，实现无需自行加锁。
pub trait Accelerator: Send {
  type Model: Send;
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(&mut self, descriptor: &ModelDescriptor) -> Result<Self::Model, Self::Error>;
  fn input_shape(&self, model: &Self::Model) -> InputShape;
  fn run(&mut self, model: &mut Self::Model, frame: &RgbNhwcFrame) -> Result<RawDetections, Self::Error>;
  fn release(&mut self, model: Self::Model) -> Result<(), Self::Error>;

  /// 卸载模型后等待硬件释放资源
  fn settle(&mut self, interval: Duration) {
    std::thread::sleep(interval);
  }
}
