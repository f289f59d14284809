// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model.rs - 模型能力接口
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

use std::{fmt, sync::Arc};

use image::RgbImage;
use thiserror::Error;

use crate::{
  geometry::{CenterBox, CornerBox, GeometryError},
  mask::{BinaryMask, ProbabilityMap},
};

pub const DEFAULT_BOX_THRESHOLD: f32 = 0.3;
pub const DEFAULT_TEXT_THRESHOLD: f32 = 0.25;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
  #[error("提示词不能为空")]
  EmptyPrompt,
  #[error("阈值 {name} 无效: {value}，必须位于 [0, 1]")]
  InvalidThreshold { name: &'static str, value: f32 },
  #[error("未知的输出形式: {0}")]
  UnknownOutputKind(String),
}

/// 非空的文本提示词
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prompt(String);

impl Prompt {
  pub fn new(text: impl Into<String>) -> Result<Self, OptionsError> {
    let text = text.into();
    if text.trim().is_empty() {
      return Err(OptionsError::EmptyPrompt);
    }
    Ok(Self(text))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl AsRef<str> for Prompt {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Prompt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::str::FromStr for Prompt {
  type Err = OptionsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

/// 检测器置信度阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub box_threshold: f32,
  pub text_threshold: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      box_threshold: DEFAULT_BOX_THRESHOLD,
      text_threshold: DEFAULT_TEXT_THRESHOLD,
    }
  }
}

impl Thresholds {
  pub fn validate(&self) -> Result<(), OptionsError> {
    for (name, value) in [
      ("box_threshold", self.box_threshold),
      ("text_threshold", self.text_threshold),
    ] {
      if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(OptionsError::InvalidThreshold { name, value });
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<B> {
  pub bbox: B,
  pub score: f32,
  pub phrase: String,
}

/// 检测结果，条目顺序即检测器输出顺序，后续掩码按同一下标对齐
#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<B> {
  pub items: Box<[DetectItem<B>]>,
}

impl<B> DetectResult<B> {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<B>> {
    self.items.iter()
  }

  pub fn phrases(&self) -> Vec<String> {
    self.items.iter().map(|item| item.phrase.clone()).collect()
  }
}

impl<B: Copy> DetectResult<B> {
  pub fn boxes(&self) -> Vec<B> {
    self.items.iter().map(|item| item.bbox).collect()
  }
}

impl<B> From<Vec<DetectItem<B>>> for DetectResult<B> {
  fn from(items: Vec<DetectItem<B>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl DetectResult<CenterBox> {
  /// 逐个将中心格式边界框转换为图像像素坐标下的角点格式，保持顺序、分数与短语
  pub fn to_corner(&self, width: u32, height: u32) -> Result<DetectResult<CornerBox>, GeometryError> {
    let items = self
      .items
      .iter()
      .map(|item| {
        Ok(DetectItem {
          bbox: item.bbox.to_corner(width, height)?,
          score: item.score,
          phrase: item.phrase.clone(),
        })
      })
      .collect::<Result<Vec<_>, GeometryError>>()?;
    Ok(items.into())
  }
}

/// 文本提示检测器：返回与提示词匹配的候选框
pub trait PromptDetector: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 返回的每个条目的分数都应严格大于对应阈值；没有检测到目标时返回空结果
  fn detect(
    &self,
    image: &RgbImage,
    prompt: &Prompt,
    thresholds: Thresholds,
  ) -> Result<DetectResult<CenterBox>, Self::Error>;
}

/// 可提示的掩码预测器：每个角点格式边界框对应一个二值掩码
pub trait MaskPredictor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn predict(&self, image: &RgbImage, boxes: &[CornerBox]) -> Result<Vec<BinaryMask>, Self::Error>;
}

/// 稠密打分器：直接给出逐像素概率图
pub trait DenseScorer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn score(&self, image: &RgbImage, prompt: &Prompt) -> Result<ProbabilityMap, Self::Error>;
}

impl<T: PromptDetector + ?Sized> PromptDetector for Arc<T> {
  type Error = T::Error;

  fn detect(
    &self,
    image: &RgbImage,
    prompt: &Prompt,
    thresholds: Thresholds,
  ) -> Result<DetectResult<CenterBox>, Self::Error> {
    (**self).detect(image, prompt, thresholds)
  }
}

impl<T: MaskPredictor + ?Sized> MaskPredictor for Arc<T> {
  type Error = T::Error;

  fn predict(&self, image: &RgbImage, boxes: &[CornerBox]) -> Result<Vec<BinaryMask>, Self::Error> {
    (**self).predict(image, boxes)
  }
}

impl<T: DenseScorer + ?Sized> DenseScorer for Arc<T> {
  type Error = T::Error;

  fn score(&self, image: &RgbImage, prompt: &Prompt) -> Result<ProbabilityMap, Self::Error> {
    (**self).score(image, prompt)
  }
}

pub mod adapter;

#[cfg(feature = "offline_models")]
mod box_fill;
#[cfg(feature = "offline_models")]
mod prob_image;
#[cfg(feature = "offline_models")]
mod replay;

#[cfg(feature = "offline_models")]
pub use self::box_fill::{BoxFillError, BoxFillPredictor};
#[cfg(feature = "offline_models")]
pub use self::prob_image::{ProbabilityImageError, ProbabilityImageScorer};
#[cfg(feature = "offline_models")]
pub use self::replay::{RecordedDetection, RecordedDetector, RecordedDetectorError};
