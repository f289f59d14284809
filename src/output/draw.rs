// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output/draw.rs - 掩码高亮合成与检测框可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  geometry::CornerBox,
  mask::BinaryMask,
  model::{DetectItem, DetectResult},
};

/// 高亮颜色（紫蓝色）
pub const HIGHLIGHT_COLOR: [u8; 3] = [226, 43, 138];
/// 高亮不透明度
pub const HIGHLIGHT_ALPHA: f64 = 0.5;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: u32 = 2;
const TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

fn blend_channel(original: u8, highlight: u8) -> u8 {
  let v = (1.0 - HIGHLIGHT_ALPHA) * original as f64 + HIGHLIGHT_ALPHA * highlight as f64;
  v.round().clamp(0.0, 255.0) as u8
}

/// 将高亮色按固定透明度混合到任一掩码为前景的像素上。
///
/// 掩码先以最近邻方式重采样到图像分辨率；没有掩码覆盖的像素原样复制，
/// 输入图像不会被修改。
pub fn blend_masks(image: &RgbImage, masks: &[BinaryMask]) -> RgbImage {
  let (width, height) = image.dimensions();
  let mut output = image.clone();
  if masks.is_empty() {
    return output;
  }

  let masks: Vec<BinaryMask> = masks
    .iter()
    .map(|mask| mask.resize_nearest(width, height))
    .collect();

  let mut blended = 0usize;
  for (x, y, pixel) in output.enumerate_pixels_mut() {
    if !masks.iter().any(|mask| mask.get(x, y)) {
      continue;
    }
    let Rgb([r, g, b]) = *pixel;
    *pixel = Rgb([
      blend_channel(r, HIGHLIGHT_COLOR[0]),
      blend_channel(g, HIGHLIGHT_COLOR[1]),
      blend_channel(b, HIGHLIGHT_COLOR[2]),
    ]);
    blended += 1;
  }
  debug!("高亮像素数: {}", blended);

  output
}

/// 检测框与标签绘制器；未加载字体时只绘制边框
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  label_text_vertical_padding: i32,
  box_color: [u8; 3],
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      box_color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl std::fmt::Debug for Draw {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Draw")
      .field("font", &self.font.is_some())
      .field("font_size", &self.font_size)
      .field("box_color", &self.box_color)
      .field("thickness", &self.thickness)
      .finish()
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: &Path) -> Result<Self, DrawError> {
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(self.with_font(font))
  }

  pub fn with_box_color(mut self, color: [u8; 3]) -> Self {
    self.box_color = color;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 先混合掩码高亮，再在其上绘制检测框与标签
  pub fn composite(
    &self,
    image: &RgbImage,
    masks: &[BinaryMask],
    detections: Option<&DetectResult<CornerBox>>,
  ) -> RgbImage {
    let mut output = blend_masks(image, masks);
    if let Some(detections) = detections {
      self.draw_detections_on_image(&mut output, detections);
    }
    output
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<CornerBox>) {
    for DetectItem {
      bbox,
      score,
      phrase,
    } in result.iter()
    {
      self.draw_bbox_with_label(image, bbox, phrase, *score);
    }
  }

  // 边框裁剪到图像范围内，标签背景画在边框上方
  fn draw_bbox_with_label(&self, image: &mut RgbImage, bbox: &CornerBox, phrase: &str, score: f32) {
    let (w, h) = image.dimensions();
    let Some((x_min, y_min, x_max, y_max)) = bbox.clip_to(w, h) else {
      return;
    };
    let color = Rgb(self.box_color);

    for t in 0..self.thickness {
      let (x0, y0) = (x_min + t, y_min + t);
      let (x1, y1) = (x_max.saturating_sub(t), y_max.saturating_sub(t));
      if x0 > x1 || y0 > y1 {
        break;
      }
      let rect = Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0 + 1, y1 - y0 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", phrase, score);
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &label);
    let tab_height = text_height as i32 + 2 * self.label_text_vertical_padding;

    let label_x = x_min as i32;
    let label_y = (y_min as i32 - tab_height).max(0);
    let label_width = text_width.min(w - x_min);

    if label_width > 0 && tab_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, tab_height as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        font,
        &label,
      );
    }
  }
}
