// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/box_fill.rs - 以边界框填充区域作为掩码的预测器
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

use std::convert::Infallible;

use image::RgbImage;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, geometry::CornerBox, mask::BinaryMask, model::MaskPredictor,
};

#[derive(Error, Debug)]
pub enum BoxFillError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 将每个角点格式边界框裁剪到图像内并整体填充为前景
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxFillPredictor;

impl FromUrlWithScheme for BoxFillPredictor {
  const SCHEME: &'static str = "boxfill";
}

impl FromUrl for BoxFillPredictor {
  type Error = BoxFillError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BoxFillError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(BoxFillPredictor)
  }
}

impl MaskPredictor for BoxFillPredictor {
  type Error = Infallible;

  fn predict(&self, image: &RgbImage, boxes: &[CornerBox]) -> Result<Vec<BinaryMask>, Self::Error> {
    let (width, height) = image.dimensions();
    debug!("矩形填充 {} 个掩码", boxes.len());

    Ok(
      boxes
        .iter()
        .map(|bbox| match bbox.clip_to(width, height) {
          Some((x_min, y_min, x_max, y_max)) => BinaryMask::from_fn(width, height, |x, y| {
            (x_min..=x_max).contains(&x) && (y_min..=y_max).contains(&y)
          }),
          None => BinaryMask::new(width, height),
        })
        .collect(),
    )
  }
}
