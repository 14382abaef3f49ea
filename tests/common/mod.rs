// 该文件是 Lingjing （灵镜） 项目的一部分。
// tests/common/mod.rs - 集成测试公共夹具与加速器桩
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

#![allow(dead_code)]

use std::{
  io::Cursor,
  path::PathBuf,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

pub use lingjing::{
  ModelRegistry,
  frame::RgbNhwcFrame,
  model::{Accelerator, InputShape, ModelDescriptor, RawBox, RawDetections},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  Load(String),
  Run(String),
  Release(String),
  Settle(Duration),
}

#[derive(Error, Debug)]
#[error("stub accelerator: {0}")]
pub struct StubError(pub String);

/// 测试侧对加速器桩的控制与观测
#[derive(Default)]
pub struct StubControl {
  events: Mutex<Vec<Event>>,
  pub fail_load: Mutex<Option<String>>,
  pub fail_release: AtomicBool,
  pub fail_run: AtomicBool,
  pub output: Mutex<RawDetections>,
  pub run_delay: Mutex<Duration>,
  pub last_frame: Mutex<Option<RgbNhwcFrame>>,
  running: AtomicUsize,
  max_running: AtomicUsize,
}

impl StubControl {
  pub fn events(&self) -> Vec<Event> {
    self.events.lock().unwrap().clone()
  }

  pub fn clear_events(&self) {
    self.events.lock().unwrap().clear();
  }

  pub fn max_concurrent_runs(&self) -> usize {
    self.max_running.load(Ordering::SeqCst)
  }

  pub fn set_output(&self, output: RawDetections) {
    *self.output.lock().unwrap() = output;
  }

  fn push(&self, event: Event) {
    self.events.lock().unwrap().push(event);
  }
}

pub struct StubModel {
  id: String,
}

pub struct StubAccelerator {
  control: Arc<StubControl>,
  shape: InputShape,
}

impl Accelerator for StubAccelerator {
  type Model = StubModel;
  type Error = StubError;

  fn load(&mut self, descriptor: &ModelDescriptor) -> Result<Self::Model, Self::Error> {
    self.control.push(Event::Load(descriptor.id.clone()));
    if self.control.fail_load.lock().unwrap().as_deref() == Some(descriptor.id.as_str()) {
      return Err(StubError(format!("cannot load {}", descriptor.id)));
    }
    Ok(StubModel {
      id: descriptor.id.clone(),
    })
  }

  fn input_shape(&self, _model: &Self::Model) -> InputShape {
    self.shape
  }

  fn run(&mut self, model: &mut Self::Model, frame: &RgbNhwcFrame) -> Result<RawDetections, Self::Error> {
    let running = self.control.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.control.max_running.fetch_max(running, Ordering::SeqCst);
    let delay = *self.control.run_delay.lock().unwrap();
    if !delay.is_zero() {
      std::thread::sleep(delay);
    }
    self.control.push(Event::Run(model.id.clone()));
    *self.control.last_frame.lock().unwrap() = Some(frame.clone());
    self.control.running.fetch_sub(1, Ordering::SeqCst);

    if self.control.fail_run.load(Ordering::SeqCst) {
      return Err(StubError("inference failed".to_string()));
    }
    Ok(self.control.output.lock().unwrap().clone())
  }

  fn release(&mut self, model: Self::Model) -> Result<(), Self::Error> {
    self.control.push(Event::Release(model.id.clone()));
    if self.control.fail_release.load(Ordering::SeqCst) {
      return Err(StubError(format!("cannot release {}", model.id)));
    }
    Ok(())
  }

  fn settle(&mut self, interval: Duration) {
    self.control.push(Event::Settle(interval));
  }
}

pub fn stub_accelerator(width: u32, height: u32) -> (StubAccelerator, Arc<StubControl>) {
  let control = Arc::new(StubControl::default());
  let accelerator = StubAccelerator {
    control: control.clone(),
    shape: InputShape::new(width, height),
  };
  (accelerator, control)
}

pub fn registry(ids: &[&str]) -> ModelRegistry {
  ModelRegistry::from_descriptors(ids.iter().map(|id| ModelDescriptor {
    id: id.to_string(),
    path: PathBuf::from(format!("models/{id}.hef")),
  }))
  .unwrap()
}

pub fn raw_box(bbox: [f32; 4], score: f32) -> RawBox {
  RawBox { bbox, score }
}

pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb(color));
  let mut bytes = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
    .unwrap();
  bytes
}
