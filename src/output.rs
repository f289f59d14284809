// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::Path;

use image::{GrayImage, RgbImage};

pub mod annotation;
pub mod draw;
pub mod store;

pub use self::annotation::{AnnotationRecord, ExportError, Shape, ShapeType, export_annotation};
pub use self::draw::{Draw, DrawError, blend_masks};
pub use self::store::{ArtifactPublisher, ArtifactStore, LocalPublisher, StoreError};

/// 渲染后的图像产物：单通道概率图/二值掩码，或叠加高亮的 RGB 图像
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedImage {
  Gray(GrayImage),
  Rgb(RgbImage),
}

impl RenderedImage {
  pub fn dimensions(&self) -> (u32, u32) {
    match self {
      RenderedImage::Gray(image) => image.dimensions(),
      RenderedImage::Rgb(image) => image.dimensions(),
    }
  }

  pub fn as_rgb(&self) -> Option<&RgbImage> {
    match self {
      RenderedImage::Rgb(image) => Some(image),
      RenderedImage::Gray(_) => None,
    }
  }

  pub fn as_gray(&self) -> Option<&GrayImage> {
    match self {
      RenderedImage::Gray(image) => Some(image),
      RenderedImage::Rgb(_) => None,
    }
  }

  /// 按扩展名推断格式保存
  pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
    match self {
      RenderedImage::Gray(image) => image.save(path),
      RenderedImage::Rgb(image) => image.save(path),
    }
  }
}
