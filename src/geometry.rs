// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/geometry.rs - Letterbox 变换及其逆变换
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

use image::{Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::{frame::RgbNhwcFrame, model::InputShape};

pub const PADDING_COLOR: [u8; 3] = [114, 114, 114];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImage { width: u32, height: u32 },
  #[error("模型输入尺寸无效: {width}x{height}")]
  InvalidModelShape { width: u32, height: u32 },
}

/// 单次推理的 letterbox 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformContext {
  pub scale: f64,
  pub resized_width: u32,
  pub resized_height: u32,
  pub pad_left: u32,
  pub pad_top: u32,
  pub image_width: u32,
  pub image_height: u32,
}

impl TransformContext {
  /// 计算把 `image_w x image_h` 等比缩放并居中放入模型输入所需的参数
  pub fn compute(
    image_w: u32,
    image_h: u32,
    model_w: u32,
    model_h: u32,
  ) -> Result<Self, GeometryError> {
    if image_w == 0 || image_h == 0 {
      return Err(GeometryError::InvalidImage {
        width: image_w,
        height: image_h,
      });
    }
    if model_w == 0 || model_h == 0 {
      return Err(GeometryError::InvalidModelShape {
        width: model_w,
        height: model_h,
      });
    }

    let scale = f64::min(
      model_w as f64 / image_w as f64,
      model_h as f64 / image_h as f64,
    );
    // 极端长宽比下缩放结果可能为 0，至少保留一个像素
    let resized_width = ((image_w as f64 * scale).floor() as u32).clamp(1, model_w);
    let resized_height = ((image_h as f64 * scale).floor() as u32).clamp(1, model_h);

    Ok(Self {
      scale,
      resized_width,
      resized_height,
      pad_left: (model_w - resized_width) / 2,
      pad_top: (model_h - resized_height) / 2,
      image_width: image_w,
      image_height: image_h,
    })
  }
}

/// 正向变换：缩放图像并贴到填充色画布中央
pub fn forward(
  image: &RgbImage,
  model: InputShape,
  padding: [u8; 3],
) -> Result<(RgbNhwcFrame, TransformContext), GeometryError> {
  let (image_w, image_h) = image.dimensions();
  let context = TransformContext::compute(image_w, image_h, model.width, model.height)?;
  debug!(
    "letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 填充 ({}, {})",
    image_w,
    image_h,
    context.resized_width,
    context.resized_height,
    context.scale,
    context.pad_left,
    context.pad_top
  );

  let resized = imageops::resize(
    image,
    context.resized_width,
    context.resized_height,
    imageops::FilterType::CatmullRom,
  );
  let mut canvas = RgbImage::from_pixel(model.width, model.height, Rgb(padding));
  imageops::replace(
    &mut canvas,
    &resized,
    context.pad_left as i64,
    context.pad_top as i64,
  );

  Ok((RgbNhwcFrame::from(canvas), context))
}

/// 逆变换：把归一化的 `[y_min, x_min, y_max, x_max]` 还原为原图像素坐标
///
/// 偶数下标是 y 方向，奇数下标是 x 方向；结果向零截断。
pub fn inverse(bbox: &[f32; 4], context: &TransformContext, model_w: u32, model_h: u32) -> [i32; 4] {
  let mut absolute = [0i32; 4];
  for (i, &coord) in bbox.iter().enumerate() {
    let value = if i % 2 == 0 {
      coord as f64 * model_h as f64 - context.pad_top as f64
    } else {
      coord as f64 * model_w as f64 - context.pad_left as f64
    };
    absolute[i] = (value / context.scale) as i32;
  }
  absolute
}
