// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/pipeline.rs - 推理流程编排
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
  path::{Path, PathBuf},
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  config::Config,
  device::{DeviceError, DeviceSession},
  extract::{self, ExtractError},
  frame::RgbNhwcFrame,
  geometry::{self, GeometryError},
  labels::LabelTable,
  model::{Accelerator, DetectionSet},
  response::{self, DetectResponse, ModuleInfo, Prediction},
  summary,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("图像解码失败: {0}")]
  InvalidImage(#[from] image::ImageError),
  #[error(transparent)]
  Geometry(#[from] GeometryError),
  #[error(transparent)]
  Device(#[from] DeviceError),
  #[error(transparent)]
  Labels(#[from] ExtractError),
  #[error("可视化失败: {0}")]
  Visualize(BoxError),
}

impl PipelineError {
  pub fn is_invalid_image(&self) -> bool {
    matches!(
      self,
      PipelineError::InvalidImage(_) | PipelineError::Geometry(GeometryError::InvalidImage { .. })
    )
  }

  /// 需要人工介入的错误：设备已停止，或模型与标签表不匹配
  pub fn is_fatal(&self) -> bool {
    match self {
      PipelineError::Device(e) => e.is_fatal(),
      PipelineError::Labels(_) => true,
      _ => false,
    }
  }
}

/// 把检测结果画到 letterbox 后的画布上并保存
pub trait Visualizer: Send + Sync {
  fn visualize(
    &self,
    canvas: &RgbNhwcFrame,
    detections: &DetectionSet,
    path: &Path,
  ) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InferRequest<'a> {
  pub image: &'a [u8],
  pub model: Option<&'a str>,
  pub threshold: Option<f32>,
  pub visualize: bool,
}

impl<'a> InferRequest<'a> {
  pub fn new(image: &'a [u8]) -> Self {
    Self {
      image,
      ..Default::default()
    }
  }

  pub fn model(mut self, model: &'a str) -> Self {
    self.model = Some(model);
    self
  }

  pub fn threshold(mut self, threshold: f32) -> Self {
    self.threshold = Some(threshold);
    self
  }

  pub fn visualize(mut self, visualize: bool) -> Self {
    self.visualize = visualize;
    self
  }
}

#[derive(Debug, Clone)]
pub struct InferenceOutcome {
  pub request_id: String,
  pub model_id: String,
  pub detections: DetectionSet,
  pub summary: String,
  /// 预处理加推理
  pub inference_time: Duration,
  pub process_time: Duration,
  pub image_path: Option<PathBuf>,
}

impl InferenceOutcome {
  pub fn to_response(&self) -> DetectResponse {
    DetectResponse {
      module: ModuleInfo::new(&self.request_id, &self.model_id),
      command: "detect".to_string(),
      success: true,
      code: 200,
      count: self.detections.len(),
      message: self.summary.clone(),
      predictions: self.detections.iter().map(Prediction::from).collect(),
      inference_ms: response::millis(self.inference_time),
      process_ms: response::millis(self.process_time),
      error: None,
      image_path: self.image_path.as_ref().map(|p| p.display().to_string()),
    }
  }
}

pub struct Pipeline<A: Accelerator> {
  session: DeviceSession<A>,
  labels: LabelTable,
  config: Config,
  visualizer: Option<Box<dyn Visualizer>>,
}

impl<A: Accelerator> Pipeline<A> {
  pub fn new(session: DeviceSession<A>, labels: LabelTable, config: Config) -> Self {
    Self {
      session,
      labels,
      config,
      visualizer: None,
    }
  }

  pub fn with_visualizer(mut self, visualizer: impl Visualizer + 'static) -> Self {
    self.visualizer = Some(Box::new(visualizer));
    self
  }

  pub fn session(&self) -> &DeviceSession<A> {
    &self.session
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn infer(&self, request: InferRequest<'_>) -> Result<InferenceOutcome, PipelineError> {
    self.run(Uuid::new_v4().to_string(), request)
  }

  fn run(&self, request_id: String, request: InferRequest<'_>) -> Result<InferenceOutcome, PipelineError> {
    let started = Instant::now();
    let threshold = request.threshold.unwrap_or(self.config.default_confidence);

    debug!("开始预处理图像");
    let decode_started = Instant::now();
    let image = image::load_from_memory(request.image)?.to_rgb8();
    let decode_time = decode_started.elapsed();

    // 未指定模型时沿用加锁时已就绪的模型
    let mut lease = self.session.acquire(request.model)?;
    let model_id = lease.model_id().to_string();
    let shape = lease.input_shape();
    let inference_started = Instant::now();
    let (canvas, context) = geometry::forward(&image, shape, self.config.padding_color)?;

    debug!("预处理完成, 开始推理");
    let raw = lease.run(&canvas)?;
    drop(lease);
    let inference_time = decode_time + inference_started.elapsed();

    let mut detections = extract::extract(&raw, threshold);
    for detection in detections.iter_mut() {
      detection.absolute = Some(geometry::inverse(
        &detection.bbox,
        &context,
        shape.width,
        shape.height,
      ));
    }
    extract::attach_labels(&mut detections, &self.labels)?;
    let summary = summary::compose(detections.labels(), self.config.summary_max_len);

    let image_path = if request.visualize {
      self.visualize(&request_id, &model_id, &canvas, &detections)?
    } else {
      None
    };

    Ok(InferenceOutcome {
      request_id,
      model_id,
      detections,
      summary,
      inference_time,
      process_time: started.elapsed(),
      image_path,
    })
  }

  fn visualize(
    &self,
    request_id: &str,
    model_id: &str,
    canvas: &RgbNhwcFrame,
    detections: &DetectionSet,
  ) -> Result<Option<PathBuf>, PipelineError> {
    let Some(visualizer) = &self.visualizer else {
      warn!("请求了可视化, 但未配置可视化输出");
      return Ok(None);
    };
    let path = self
      .config
      .output_images_dir
      .join(format!("{request_id}_{model_id}.jpg"));
    visualizer
      .visualize(canvas, detections, &path)
      .map_err(PipelineError::Visualize)?;
    Ok(Some(path))
  }

  /// 对调用方的入口：任何失败都转为结构化的失败响应
  pub fn detect(&self, request: InferRequest<'_>) -> DetectResponse {
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let model_id = request.model.unwrap_or(&self.config.default_model);

    match self.run(request_id.clone(), request) {
      Ok(outcome) => {
        let response = outcome.to_response();
        info!(
          "Request ID: {}; {}; 总耗时: {} ms; 推理耗时: {} ms",
          response.module.request_id, response.message, response.process_ms, response.inference_ms
        );
        response
      }
      Err(e) => {
        if e.is_fatal() {
          error!("Request ID: {}; 严重错误: {}", request_id, e);
        } else {
          warn!("Request ID: {}; 请求失败: {}", request_id, e);
        }
        DetectResponse::failure(ModuleInfo::new(request_id, model_id), e, started.elapsed())
      }
    }
  }
}
