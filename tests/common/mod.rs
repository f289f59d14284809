// 该文件是 Mingjing （明镜） 项目的一部分。
// tests/common/mod.rs - 测试用模型桩
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

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use thiserror::Error;

pub use mingjing::{
  BinaryMask, CenterBox, CornerBox, DetectItem, DetectResult, ProbabilityMap, Prompt, Thresholds,
  model::{DenseScorer, MaskPredictor, PromptDetector},
};

#[derive(Error, Debug)]
#[error("stub model failure")]
pub struct StubFailure;

/// 返回固定检测结果并记录调用次数
pub struct StubDetector {
  pub items: Vec<DetectItem<CenterBox>>,
  pub calls: AtomicUsize,
  pub fail: bool,
}

impl StubDetector {
  pub fn new(items: Vec<DetectItem<CenterBox>>) -> Self {
    Self {
      items,
      calls: AtomicUsize::new(0),
      fail: false,
    }
  }

  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Self::new(Vec::new())
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl PromptDetector for StubDetector {
  type Error = StubFailure;

  fn detect(
    &self,
    _image: &RgbImage,
    _prompt: &Prompt,
    _thresholds: Thresholds,
  ) -> Result<DetectResult<CenterBox>, StubFailure> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(StubFailure);
    }
    Ok(self.items.clone().into())
  }
}

/// 对每个框返回同一个预设掩码，可额外多返回若干个
pub struct StubPredictor {
  pub mask: BinaryMask,
  pub extra: usize,
  pub calls: AtomicUsize,
}

impl StubPredictor {
  pub fn new(mask: BinaryMask) -> Self {
    Self {
      mask,
      extra: 0,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl MaskPredictor for StubPredictor {
  type Error = StubFailure;

  fn predict(&self, _image: &RgbImage, boxes: &[CornerBox]) -> Result<Vec<BinaryMask>, StubFailure> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(vec![self.mask.clone(); boxes.len() + self.extra])
  }
}

/// 返回均匀概率图
pub struct UniformScorer {
  pub value: f32,
  pub size: (u32, u32),
  pub calls: AtomicUsize,
}

impl UniformScorer {
  pub fn new(value: f32, size: (u32, u32)) -> Self {
    Self {
      value,
      size,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl DenseScorer for UniformScorer {
  type Error = StubFailure;

  fn score(&self, _image: &RgbImage, _prompt: &Prompt) -> Result<ProbabilityMap, StubFailure> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(ProbabilityMap::uniform(self.size.0, self.size.1, self.value))
  }
}

pub fn cat_detection() -> DetectItem<CenterBox> {
  DetectItem {
    bbox: CenterBox::from([0.5, 0.5, 0.2, 0.2]),
    score: 0.9,
    phrase: "cat".to_string(),
  }
}

/// 100x100 图像中央 20x20 的前景
pub fn centered_square_mask() -> BinaryMask {
  BinaryMask::from_fn(100, 100, |x, y| (40..60).contains(&x) && (40..60).contains(&y))
}

pub fn test_image(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x ^ y) % 256) as u8])
  })
}

pub fn blended(pixel: Rgb<u8>) -> Rgb<u8> {
  let f = |o: u8, c: u8| (0.5 * o as f64 + 0.5 * c as f64).round().clamp(0.0, 255.0) as u8;
  Rgb([f(pixel[0], 226), f(pixel[1], 43), f(pixel[2], 138)])
}
