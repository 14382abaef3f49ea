// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/response.rs - 面向调用方的结果记录
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

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Detection;

const EXECUTION_PROVIDER: &str = "TPU";
const PROCESSED_BY: &str = "localhost";

/// 所有响应共有的模块信息
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
  pub request_id: String,
  pub module_id: String,
  pub module_name: String,
  pub execution_provider: String,
  pub inference_device: String,
  pub processed_by: String,
  #[serde(rename = "canUseGPU")]
  pub can_use_gpu: bool,
}

impl ModuleInfo {
  pub fn new(request_id: impl Into<String>, model_id: &str) -> Self {
    Self {
      request_id: request_id.into(),
      module_id: format!("ObjectDetection{}", model_id.to_uppercase()),
      module_name: format!("Object Detection ({model_id})"),
      execution_provider: EXECUTION_PROVIDER.to_string(),
      inference_device: EXECUTION_PROVIDER.to_string(),
      processed_by: PROCESSED_BY.to_string(),
      can_use_gpu: false,
    }
  }
}

/// 单个检测框，坐标顺序为 (x_min, y_min, x_max, y_max)
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Prediction {
  pub confidence: f32,
  pub label: String,
  pub x_min: i32,
  pub y_min: i32,
  pub x_max: i32,
  pub y_max: i32,
}

impl From<&Detection> for Prediction {
  fn from(detection: &Detection) -> Self {
    // 内部顺序为 [y_min, x_min, y_max, x_max]
    let [y_min, x_min, y_max, x_max] = detection.absolute.unwrap_or_default();
    Self {
      confidence: detection.score,
      label: detection.label.clone().unwrap_or_default(),
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
  #[serde(flatten)]
  pub module: ModuleInfo,
  pub command: String,
  pub success: bool,
  pub code: u16,
  pub count: usize,
  pub message: String,
  pub predictions: Vec<Prediction>,
  pub inference_ms: u64,
  pub process_ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_path: Option<String>,
}

impl DetectResponse {
  pub fn failure(module: ModuleInfo, error: impl ToString, elapsed: Duration) -> Self {
    Self {
      module,
      command: "detect".to_string(),
      success: false,
      code: 400,
      count: 0,
      message: String::new(),
      predictions: Vec::new(),
      inference_ms: 0,
      process_ms: millis(elapsed),
      error: Some(error.to_string()),
      image_path: None,
    }
  }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelListResponse {
  #[serde(flatten)]
  pub module: ModuleInfo,
  pub command: String,
  pub success: bool,
  pub code: u16,
  pub models: Vec<String>,
  pub assets: Vec<String>,
  pub analysis_round_trip_ms: u64,
  #[serde(rename = "timestampUTC")]
  pub timestamp_utc: String,
}

impl ModelListResponse {
  pub fn new(module: ModuleInfo, models: Vec<String>, elapsed: Duration, now: DateTime<Utc>) -> Self {
    Self {
      module,
      command: "list-custom".to_string(),
      success: true,
      code: 200,
      assets: models.clone(),
      models,
      analysis_round_trip_ms: millis_ceil(elapsed),
      timestamp_utc: gmt_timestamp(now),
    }
  }
}

pub fn gmt_timestamp(now: DateTime<Utc>) -> String {
  now.format("%a, %d %b %Y %I:%M:%S GMT").to_string()
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
  elapsed.as_millis() as u64
}

pub(crate) fn millis_ceil(elapsed: Duration) -> u64 {
  elapsed.as_micros().div_ceil(1000) as u64
}
