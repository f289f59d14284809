// 该文件是 Mingjing （明镜） 项目的一部分。
// src/geometry.rs - 边界框格式转换
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  #[error("边界框包含非有限数值: {0:?}")]
  NonFinite([f32; 4]),
}

/// 检测器输出的归一化中心格式边界框，各分量相对于图像宽高，取值通常在 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

/// 像素坐标下的角点格式边界框 [x0, y0, x1, y1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerBox {
  pub x0: f32,
  pub y0: f32,
  pub x1: f32,
  pub y1: f32,
}

impl From<[f32; 4]> for CenterBox {
  fn from([cx, cy, w, h]: [f32; 4]) -> Self {
    Self { cx, cy, w, h }
  }
}

impl CenterBox {
  pub fn to_array(&self) -> [f32; 4] {
    [self.cx, self.cy, self.w, self.h]
  }

  /// 转换为图像像素坐标下的角点格式。
  ///
  /// 不做任何裁剪：超出图像范围的坐标原样保留，由渲染阶段负责裁剪。
  /// 只有非有限数值会被拒绝。
  pub fn to_corner(&self, width: u32, height: u32) -> Result<CornerBox, GeometryError> {
    if self.to_array().iter().any(|v| !v.is_finite()) {
      return Err(GeometryError::NonFinite(self.to_array()));
    }
    let (w, h) = (width as f32, height as f32);
    Ok(CornerBox {
      x0: (self.cx - self.w / 2.0) * w,
      y0: (self.cy - self.h / 2.0) * h,
      x1: (self.cx + self.w / 2.0) * w,
      y1: (self.cy + self.h / 2.0) * h,
    })
  }
}

impl CornerBox {
  pub fn to_array(&self) -> [f32; 4] {
    [self.x0, self.y0, self.x1, self.y1]
  }

  pub fn width(&self) -> f32 {
    self.x1 - self.x0
  }

  pub fn height(&self) -> f32 {
    self.y1 - self.y0
  }

  /// 裁剪到图像范围内的整数像素区间 (x_min, y_min, x_max, y_max)，闭区间。
  /// 与图像无交集时返回 None。
  pub fn clip_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if width == 0 || height == 0 {
      return None;
    }
    let (w, h) = (width as i64, height as i64);

    let x_min = (self.x0.floor() as i64).max(0);
    let y_min = (self.y0.floor() as i64).max(0);
    let x_max = (self.x1.ceil() as i64).min(w) - 1;
    let y_max = (self.y1.ceil() as i64).min(h) - 1;

    if x_min > x_max || y_min > y_max {
      return None;
    }

    Some((x_min as u32, y_min as u32, x_max as u32, y_max as u32))
  }
}
