// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/device.rs - 加速器会话管理
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

use std::{
  fmt,
  sync::{Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::Config,
  frame::RgbNhwcFrame,
  model::{Accelerator, InputShape, RawDetections},
  registry::ModelRegistry,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
  Uninitialized,
  Ready,
  Stopped,
}

impl fmt::Display for SessionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SessionStatus::Uninitialized => write!(f, "未初始化"),
      SessionStatus::Ready => write!(f, "就绪"),
      SessionStatus::Stopped => write!(f, "已停止"),
    }
  }
}

#[derive(Error, Debug)]
pub enum DeviceError {
  #[error("模型不存在: {0}")]
  ModelNotFound(String),
  #[error("设备初始化失败, 模型 {model}: {source}")]
  DeviceInit { model: String, source: BoxError },
  #[error("模型切换失败 {from} -> {to}: {source}")]
  ModelSwitch {
    from: String,
    to: String,
    source: BoxError,
  },
  #[error("推理失败, 模型 {model}: {source}")]
  Inference { model: String, source: BoxError },
  #[error("释放模型失败 {model}: {source}")]
  Release { model: String, source: BoxError },
  #[error("设备状态为{0}, 需要重新启动")]
  NotReady(SessionStatus),
  #[error("设备已加载模型 {0}, 不能重复启动")]
  InvalidState(String),
}

impl DeviceError {
  /// 设备级错误：会话已停止，需要外部重新启动
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      DeviceError::DeviceInit { .. } | DeviceError::ModelSwitch { .. } | DeviceError::Release { .. }
    )
  }
}

/// 已加载到加速器上的模型
#[derive(Debug)]
pub struct ModelHandle<M> {
  id: String,
  model: M,
  shape: InputShape,
}

impl<M> ModelHandle<M> {
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn shape(&self) -> InputShape {
    self.shape
  }
}

enum SessionState<M> {
  Uninitialized,
  Ready(ModelHandle<M>),
  Stopped,
}

impl<M> SessionState<M> {
  fn status(&self) -> SessionStatus {
    match self {
      SessionState::Uninitialized => SessionStatus::Uninitialized,
      SessionState::Ready(_) => SessionStatus::Ready,
      SessionState::Stopped => SessionStatus::Stopped,
    }
  }
}

struct SessionInner<A: Accelerator> {
  accelerator: A,
  state: SessionState<A::Model>,
}

impl<A: Accelerator> SessionInner<A> {
  fn load(&mut self, registry: &ModelRegistry, id: &str) -> Result<ModelHandle<A::Model>, DeviceError> {
    let descriptor = registry
      .get(id)
      .ok_or_else(|| DeviceError::ModelNotFound(id.to_string()))?;
    info!("加载模型 {}: {}", id, descriptor.path.display());
    let model = self
      .accelerator
      .load(descriptor)
      .map_err(|e| DeviceError::DeviceInit {
        model: id.to_string(),
        source: Box::new(e),
      })?;
    let shape = self.accelerator.input_shape(&model);
    debug!("模型 {} 输入尺寸: {}x{}", id, shape.width, shape.height);
    Ok(ModelHandle {
      id: id.to_string(),
      model,
      shape,
    })
  }

  fn start(&mut self, registry: &ModelRegistry, id: &str) -> Result<(), DeviceError> {
    if let SessionState::Ready(handle) = &self.state {
      return Err(DeviceError::InvalidState(handle.id.clone()));
    }
    if !registry.contains(id) {
      return Err(DeviceError::ModelNotFound(id.to_string()));
    }

    info!("启动设备, 模型 {}", id);
    match self.load(registry, id) {
      Ok(handle) => {
        self.state = SessionState::Ready(handle);
        info!("设备启动完成");
        Ok(())
      }
      Err(e) => {
        error!("设备启动失败: {}", e);
        self.state = SessionState::Stopped;
        Err(e)
      }
    }
  }

  fn ensure(&mut self, registry: &ModelRegistry, settle: Duration, id: &str) -> Result<(), DeviceError> {
    let current = match std::mem::replace(&mut self.state, SessionState::Stopped) {
      SessionState::Ready(handle) if handle.id == id => {
        self.state = SessionState::Ready(handle);
        return Ok(());
      }
      SessionState::Ready(handle) if !registry.contains(id) => {
        self.state = SessionState::Ready(handle);
        return Err(DeviceError::ModelNotFound(id.to_string()));
      }
      SessionState::Ready(handle) => handle,
      other => {
        let status = other.status();
        self.state = other;
        return Err(DeviceError::NotReady(status));
      }
    };

    // 此后任何失败都让会话停留在 Stopped
    info!("切换模型 {} -> {}", current.id, id);
    let from = current.id;
    let switch_error = |source| DeviceError::ModelSwitch {
      from: from.clone(),
      to: id.to_string(),
      source,
    };

    if let Err(e) = self.accelerator.release(current.model) {
      let e = switch_error(Box::new(e) as BoxError);
      error!("{}", e);
      return Err(e);
    }
    debug!("等待硬件释放资源 {:?}", settle);
    self.accelerator.settle(settle);

    match self.load(registry, id) {
      Ok(handle) => {
        self.state = SessionState::Ready(handle);
        info!("模型已切换为 {}", id);
        Ok(())
      }
      Err(DeviceError::DeviceInit { source, .. }) => {
        let e = switch_error(source);
        error!("{}", e);
        Err(e)
      }
      Err(e) => {
        error!("{}", e);
        Err(e)
      }
    }
  }

  fn run(&mut self, frame: &RgbNhwcFrame) -> Result<RawDetections, DeviceError> {
    let status = self.state.status();
    let SessionInner { accelerator, state } = self;
    let SessionState::Ready(handle) = state else {
      return Err(DeviceError::NotReady(status));
    };
    accelerator
      .run(&mut handle.model, frame)
      .map_err(|e| {
        warn!("模型 {} 推理失败: {}", handle.id, e);
        DeviceError::Inference {
          model: handle.id.clone(),
          source: Box::new(e),
        }
      })
  }

  fn stop(&mut self) -> Result<(), DeviceError> {
    match std::mem::replace(&mut self.state, SessionState::Stopped) {
      SessionState::Ready(handle) => {
        info!("释放模型 {}", handle.id);
        self
          .accelerator
          .release(handle.model)
          .map_err(|e| DeviceError::Release {
            model: handle.id,
            source: Box::new(e),
          })
      }
      _ => Ok(()),
    }
  }
}

/// 独占硬件加速器的会话
///
/// 同一时刻最多加载一个模型；模型切换与推理都在同一把锁内完成，
/// 并发请求会阻塞等待，而不是交错访问设备。
pub struct DeviceSession<A: Accelerator> {
  registry: ModelRegistry,
  settle_interval: Duration,
  inner: Mutex<SessionInner<A>>,
}

impl<A: Accelerator> DeviceSession<A> {
  pub fn new(accelerator: A, registry: ModelRegistry, settle_interval: Duration) -> Self {
    Self {
      registry,
      settle_interval,
      inner: Mutex::new(SessionInner {
        accelerator,
        state: SessionState::Uninitialized,
      }),
    }
  }

  pub fn with_config(accelerator: A, registry: ModelRegistry, config: &Config) -> Self {
    Self::new(accelerator, registry, config.settle_interval)
  }

  fn lock(&self) -> MutexGuard<'_, SessionInner<A>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn registry(&self) -> &ModelRegistry {
    &self.registry
  }

  pub fn status(&self) -> SessionStatus {
    self.lock().state.status()
  }

  pub fn current_model(&self) -> Option<String> {
    match &self.lock().state {
      SessionState::Ready(handle) => Some(handle.id.clone()),
      _ => None,
    }
  }

  pub fn start(&self, model_id: &str) -> Result<(), DeviceError> {
    self.lock().start(&self.registry, model_id)
  }

  /// 确保加载的是 `model_id`，必要时释放当前模型、等待后重新加载
  pub fn ensure_model(&self, model_id: &str) -> Result<(), DeviceError> {
    self
      .lock()
      .ensure(&self.registry, self.settle_interval, model_id)
  }

  pub fn run_inference(&self, frame: &RgbNhwcFrame) -> Result<RawDetections, DeviceError> {
    self.lock().run(frame)
  }

  pub fn input_shape(&self) -> Result<InputShape, DeviceError> {
    match &self.lock().state {
      SessionState::Ready(handle) => Ok(handle.shape),
      state => Err(DeviceError::NotReady(state.status())),
    }
  }

  pub fn stop(&self) -> Result<(), DeviceError> {
    self.lock().stop()
  }

  /// 确保模型并持有设备锁，直到返回的租约被释放
  ///
  /// `model_id` 为 `None` 时使用加锁时已就绪的模型。
  pub fn acquire(&self, model_id: Option<&str>) -> Result<DeviceLease<'_, A>, DeviceError> {
    let mut guard = self.lock();
    let model_id = match (model_id, &guard.state) {
      (Some(id), _) => id.to_string(),
      (None, SessionState::Ready(handle)) => handle.id.clone(),
      (None, state) => return Err(DeviceError::NotReady(state.status())),
    };
    guard.ensure(&self.registry, self.settle_interval, &model_id)?;
    let shape = match &guard.state {
      SessionState::Ready(handle) => handle.shape,
      state => return Err(DeviceError::NotReady(state.status())),
    };
    Ok(DeviceLease {
      guard,
      model_id,
      shape,
    })
  }
}

impl<A: Accelerator> Drop for DeviceSession<A> {
  fn drop(&mut self) {
    let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
    if let SessionState::Ready(_) = inner.state {
      match inner.stop() {
        Ok(()) => info!("设备已释放"),
        Err(e) => error!("释放设备失败: {}", e),
      }
    }
  }
}

/// 持有设备锁期间对就绪模型的访问
pub struct DeviceLease<'a, A: Accelerator> {
  guard: MutexGuard<'a, SessionInner<A>>,
  model_id: String,
  shape: InputShape,
}

impl<A: Accelerator> DeviceLease<'_, A> {
  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn input_shape(&self) -> InputShape {
    self.shape
  }

  pub fn run(&mut self, frame: &RgbNhwcFrame) -> Result<RawDetections, DeviceError> {
    self.guard.run(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fatal_errors_are_device_level() {
    let source = || -> BoxError { "boom".into() };
    assert!(
      DeviceError::DeviceInit {
        model: "a".into(),
        source: source()
      }
      .is_fatal()
    );
    assert!(
      DeviceError::ModelSwitch {
        from: "a".into(),
        to: "b".into(),
        source: source()
      }
      .is_fatal()
    );
    assert!(
      !DeviceError::Inference {
        model: "a".into(),
        source: source()
      }
      .is_fatal()
    );
    assert!(!DeviceError::ModelNotFound("a".into()).is_fatal());
    assert!(!DeviceError::NotReady(SessionStatus::Stopped).is_fatal());
  }

  #[test]
  fn error_messages_name_the_models() {
    let e = DeviceError::ModelSwitch {
      from: "yolov7e6".into(),
      to: "yolov8s".into(),
      source: "load failed".into(),
    };
    assert_eq!(e.to_string(), "模型切换失败 yolov7e6 -> yolov8s: load failed");
    assert_eq!(
      DeviceError::NotReady(SessionStatus::Stopped).to_string(),
      "设备状态为已停止, 需要重新启动"
    );
  }
}
