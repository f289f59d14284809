// 该文件是 Mingjing （明镜） 项目的一部分。
// src/mask.rs - 二值掩码与概率图
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

use image::{GrayImage, ImageBuffer, Luma, imageops::FilterType};
use thiserror::Error;

/// 概率图二值化阈值，单阶段与两阶段模式共用
pub const BINARIZE_THRESHOLD: f32 = 0.5;

const MASK_ON: u8 = 255;
const MASK_OFF: u8 = 0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("尺寸无效: {0}x{1}")]
  EmptyShape(u32, u32),
}

/// 二值掩码，内部以 0/255 的 8 位灰度图保存
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
  data: GrayImage,
}

impl BinaryMask {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      data: GrayImage::new(width, height),
    }
  }

  pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
    Self {
      data: GrayImage::from_fn(width, height, |x, y| {
        Luma([if f(x, y) { MASK_ON } else { MASK_OFF }])
      }),
    }
  }

  /// 任意非零像素视为前景
  pub fn from_gray(image: &GrayImage) -> Self {
    Self::from_fn(image.width(), image.height(), |x, y| {
      image.get_pixel(x, y)[0] > 0
    })
  }

  pub fn width(&self) -> u32 {
    self.data.width()
  }

  pub fn height(&self) -> u32 {
    self.data.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.data.dimensions()
  }

  pub fn get(&self, x: u32, y: u32) -> bool {
    self.data.get_pixel(x, y)[0] > 0
  }

  pub fn set(&mut self, x: u32, y: u32, value: bool) {
    self
      .data
      .put_pixel(x, y, Luma([if value { MASK_ON } else { MASK_OFF }]));
  }

  /// 前景像素数
  pub fn count(&self) -> usize {
    self.data.as_raw().iter().filter(|&&v| v > 0).count()
  }

  pub fn is_empty(&self) -> bool {
    self.data.as_raw().iter().all(|&v| v == 0)
  }

  pub fn as_gray(&self) -> &GrayImage {
    &self.data
  }

  pub fn into_gray(self) -> GrayImage {
    self.data
  }

  /// 最近邻重采样到指定尺寸，保持二值不被插值
  pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
    if self.dimensions() == (width, height) {
      return self.clone();
    }
    Self {
      data: image::imageops::resize(&self.data, width, height, FilterType::Nearest),
    }
  }
}

/// 逐像素概率图，取值范围 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
  data: ImageBuffer<Luma<f32>, Vec<f32>>,
}

impl ProbabilityMap {
  pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, MaskError> {
    if width == 0 || height == 0 {
      return Err(MaskError::EmptyShape(width, height));
    }
    let expected = width as usize * height as usize;
    let actual = values.len();
    if expected != actual {
      return Err(MaskError::LengthMismatch { expected, actual });
    }
    let data = ImageBuffer::from_raw(width, height, values)
      .ok_or(MaskError::LengthMismatch { expected, actual })?;
    Ok(Self { data })
  }

  pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
    Self {
      data: ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)])),
    }
  }

  pub fn uniform(width: u32, height: u32, value: f32) -> Self {
    Self::from_fn(width, height, |_, _| value)
  }

  /// 由 8 位灰度图构造，按 v / 255 映射到 [0, 1]
  pub fn from_gray(image: &GrayImage) -> Self {
    Self::from_fn(image.width(), image.height(), |x, y| {
      image.get_pixel(x, y)[0] as f32 / 255.0
    })
  }

  pub fn width(&self) -> u32 {
    self.data.width()
  }

  pub fn height(&self) -> u32 {
    self.data.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.data.dimensions()
  }

  pub fn get(&self, x: u32, y: u32) -> f32 {
    self.data.get_pixel(x, y)[0]
  }

  pub fn values(&self) -> &[f32] {
    self.data.as_raw()
  }

  /// 将数值限制在 [0, 1]，非有限值视为 0
  pub fn clamped(mut self) -> Self {
    for Luma([v]) in self.data.pixels_mut() {
      *v = if v.is_finite() { (*v).clamp(0.0, 1.0) } else { 0.0 };
    }
    self
  }

  /// 双线性缩放到指定尺寸
  pub fn resize(&self, width: u32, height: u32) -> Self {
    if self.dimensions() == (width, height) {
      return self.clone();
    }
    Self {
      data: image::imageops::resize(&self.data, width, height, FilterType::Triangle),
    }
  }

  /// 严格大于阈值的像素为前景
  pub fn binarize(&self, threshold: f32) -> BinaryMask {
    BinaryMask::from_fn(self.width(), self.height(), |x, y| {
      self.get(x, y) > threshold
    })
  }

  /// 转为 8 位灰度图 (p * 255 截断)
  pub fn to_gray(&self) -> GrayImage {
    GrayImage::from_fn(self.width(), self.height(), |x, y| {
      Luma([(self.get(x, y).clamp(0.0, 1.0) * 255.0) as u8])
    })
  }
}
