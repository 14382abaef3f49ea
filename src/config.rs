// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/config.rs - 服务配置
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

use clap::Args;

use crate::{geometry::PADDING_COLOR, summary::DEFAULT_MAX_LEN};

/// 启动时构建一次，之后显式传入各组件
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub labels_path: PathBuf,
  pub model_dir: PathBuf,
  pub model_extension: String,
  pub default_model: String,
  pub default_confidence: f32,
  pub summary_max_len: usize,
  pub padding_color: [u8; 3],
  pub settle_interval: Duration,
  pub output_images_dir: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      labels_path: PathBuf::from("models/coco.txt"),
      model_dir: PathBuf::from("models"),
      model_extension: "hef".to_string(),
      default_model: "yolov7e6".to_string(),
      default_confidence: 0.6,
      summary_max_len: DEFAULT_MAX_LEN,
      padding_color: PADDING_COLOR,
      settle_interval: Duration::from_secs(1),
      output_images_dir: PathBuf::from("output_images"),
    }
  }
}

/// 配置相关的命令行参数
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
  /// 标签文件路径，每行一个类别
  #[arg(long, default_value = "models/coco.txt", value_name = "FILE")]
  pub labels: PathBuf,

  /// 模型目录
  #[arg(long, default_value = "models", value_name = "DIR")]
  pub model_dir: PathBuf,

  /// 模型文件扩展名
  #[arg(long, default_value = "hef", value_name = "EXT")]
  pub model_extension: String,

  /// 默认模型名称
  #[arg(long, default_value = "yolov7e6", value_name = "MODEL")]
  pub default_model: String,

  /// 默认置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.6", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 检测摘要最大长度（字符）
  #[arg(long, default_value_t = DEFAULT_MAX_LEN, value_name = "LEN")]
  pub summary_max_len: usize,

  /// 切换模型时等待硬件释放的时间（毫秒）
  #[arg(long, default_value = "1000", value_name = "MS")]
  pub settle_ms: u64,

  /// 可视化图像输出目录
  #[arg(long, default_value = "output_images", value_name = "DIR")]
  pub output_images: PathBuf,
}

impl From<ConfigArgs> for Config {
  fn from(args: ConfigArgs) -> Self {
    Self {
      labels_path: args.labels,
      model_dir: args.model_dir,
      model_extension: args.model_extension,
      default_model: args.default_model,
      default_confidence: args.confidence,
      summary_max_len: args.summary_max_len,
      settle_interval: Duration::from_millis(args.settle_ms),
      output_images_dir: args.output_images,
      ..Config::default()
    }
  }
}
