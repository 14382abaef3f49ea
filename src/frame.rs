// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::RgbImage;

const RGB_CHANNELS: usize = 3;

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 送入加速器的 RGB 张量，按 NHWC（batch = 1）排布
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  pub fn with_shape(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * (width as usize) * (height as usize);
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let index = ((y as usize) * (self.width as usize) + (x as usize)) * RGB_CHANNELS;
    [self.data[index], self.data[index + 1], self.data[index + 2]]
  }

  /// 转回 `RgbImage`，供可视化使用
  pub fn to_rgb_image(&self) -> RgbImage {
    RgbImage::from_raw(self.width, self.height, self.data.to_vec())
      .unwrap_or_else(|| RgbImage::new(self.width, self.height))
  }
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    // RgbImage 的内存布局本身就是 HWC
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn from_image_keeps_hwc_layout() {
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(1, 0, Rgb([1, 2, 3]));
    image.put_pixel(0, 1, Rgb([4, 5, 6]));

    let frame = RgbNhwcFrame::from(image);
    assert_eq!(frame.width(), 2);
    assert_eq!(frame.height(), 2);
    assert_eq!(frame.as_nhwc().len(), 12);
    assert_eq!(frame.pixel(1, 0), [1, 2, 3]);
    assert_eq!(frame.pixel(0, 1), [4, 5, 6]);
    assert_eq!(&frame.as_nhwc()[3..6], &[1, 2, 3]);
  }

  #[test]
  fn with_shape_is_zeroed() {
    let frame = RgbNhwcFrame::with_shape(4, 3);
    assert_eq!(frame.as_nhwc().len(), 4 * 3 * 3);
    assert!(frame.as_nhwc().iter().all(|&v| v == 0));
    assert_eq!(frame.to_rgb_image().dimensions(), (4, 3));
  }
}
