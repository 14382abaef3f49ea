// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/bin/model_list.rs - 列出本地可用模型
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use uuid::Uuid;

use lingjing::{
  Config, ConfigArgs, ModelRegistry,
  labels::LabelTable,
  response::{ModelListResponse, ModuleInfo},
};

/// Lingjing 模型列表
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub config: ConfigArgs,

  /// 以缩进格式输出 JSON
  #[arg(long)]
  pub pretty: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let started = std::time::Instant::now();
  let config = Config::from(args.config);

  info!("模型目录: {}", config.model_dir.display());
  info!("标签文件: {}", config.labels_path.display());

  let registry = ModelRegistry::scan_dir(&config.model_dir, &config.model_extension)
    .with_context(|| format!("无法扫描模型目录: {}", config.model_dir.display()))?;
  let labels = LabelTable::load(&config.labels_path)
    .with_context(|| format!("无法加载标签文件: {}", config.labels_path.display()))?;
  info!("共 {} 个类别", labels.len());

  if !registry.contains(&config.default_model) {
    warn!("默认模型 {} 不在模型目录中", config.default_model);
  }

  let response = ModelListResponse::new(
    ModuleInfo::new(Uuid::new_v4().to_string(), &config.default_model),
    registry.ids().map(str::to_string).collect(),
    started.elapsed(),
    chrono::Utc::now(),
  );

  let output = if args.pretty {
    serde_json::to_string_pretty(&response)?
  } else {
    serde_json::to_string(&response)?
  };
  println!("{output}");

  Ok(())
}
