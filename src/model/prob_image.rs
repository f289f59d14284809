// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/prob_image.rs - 从灰度图读取概率图的稠密打分器
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

use image::{GrayImage, ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  mask::ProbabilityMap,
  model::{DenseScorer, Prompt},
};

#[derive(Error, Debug)]
pub enum ProbabilityImageError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 使用预先计算好的 8 位灰度概率图（v / 255）作为打分结果，与提示词无关
#[derive(Debug, Clone)]
pub struct ProbabilityImageScorer {
  map: ProbabilityMap,
}

impl FromUrlWithScheme for ProbabilityImageScorer {
  const SCHEME: &'static str = "probmap";
}

impl FromUrl for ProbabilityImageScorer {
  type Error = ProbabilityImageError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ProbabilityImageError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    info!("加载概率图: {}", url.path());
    let gray = ImageReader::open(url.path())?.decode()?.into_luma8();
    Ok(Self::from_gray(&gray))
  }
}

impl ProbabilityImageScorer {
  pub fn new(map: ProbabilityMap) -> Self {
    Self { map }
  }

  pub fn from_gray(gray: &GrayImage) -> Self {
    Self {
      map: ProbabilityMap::from_gray(gray),
    }
  }
}

impl DenseScorer for ProbabilityImageScorer {
  type Error = Infallible;

  fn score(&self, _image: &RgbImage, prompt: &Prompt) -> Result<ProbabilityMap, Self::Error> {
    debug!(
      "概率图打分 \"{}\": {}x{}",
      prompt,
      self.map.width(),
      self.map.height()
    );
    Ok(self.map.clone())
  }
}

#[cfg(test)]
mod tests {
  use image::Luma;

  use super::*;

  #[test]
  fn maps_gray_levels_to_unit_range() {
    let gray = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
    let scorer = ProbabilityImageScorer::from_gray(&gray);
    let map = scorer
      .score(&RgbImage::new(2, 1), &Prompt::new("sky").unwrap())
      .unwrap();
    assert_eq!(map.get(0, 0), 0.0);
    assert_eq!(map.get(1, 0), 1.0);
  }

  #[test]
  fn rejects_wrong_scheme() {
    let url = Url::parse("replay:///tmp/x.json").unwrap();
    assert!(matches!(
      ProbabilityImageScorer::from_url(&url),
      Err(ProbabilityImageError::SchemeMismatch(_))
    ));
  }
}
