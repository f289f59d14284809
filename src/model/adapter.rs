// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/adapter.rs - 模型能力调用适配，保证输出满足契约
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

use std::fmt;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  geometry::{CenterBox, CornerBox},
  mask::{BinaryMask, ProbabilityMap},
  model::{DenseScorer, DetectResult, MaskPredictor, Prompt, PromptDetector, Thresholds},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Detector,
  MaskPredictor,
  DenseScorer,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Detector => f.write_str("检测器"),
      Stage::MaskPredictor => f.write_str("掩码预测器"),
      Stage::DenseScorer => f.write_str("稠密打分器"),
    }
  }
}

#[derive(Error, Debug)]
pub enum AdapterError {
  #[error("{stage}推理失败: {source}")]
  Inference {
    stage: Stage,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
  #[error("掩码数量与边界框数量不一致: 边界框 {boxes} 个, 掩码 {masks} 个")]
  MaskCountMismatch { boxes: usize, masks: usize },
  #[error("{stage}输出尺寸无效: {width}x{height}")]
  EmptyOutput { stage: Stage, width: u32, height: u32 },
}

impl AdapterError {
  fn inference<E: std::error::Error + Send + Sync + 'static>(stage: Stage) -> impl FnOnce(E) -> Self {
    move |e| AdapterError::Inference {
      stage,
      source: Box::new(e),
    }
  }
}

/// 调用检测器，并丢弃分数未超过框阈值的条目
pub fn detect<D: PromptDetector + ?Sized>(
  detector: &D,
  image: &RgbImage,
  prompt: &Prompt,
  thresholds: Thresholds,
) -> Result<DetectResult<CenterBox>, AdapterError> {
  let result = detector
    .detect(image, prompt, thresholds)
    .map_err(AdapterError::inference(Stage::Detector))?;

  let total = result.len();
  let items: Vec<_> = result
    .items
    .into_vec()
    .into_iter()
    .filter(|item| item.score > thresholds.box_threshold)
    .collect();

  if items.len() != total {
    warn!(
      "检测器返回了 {} 个未超过框阈值 {} 的条目，已丢弃",
      total - items.len(),
      thresholds.box_threshold
    );
  }
  debug!("检测到 {} 个候选框", items.len());

  Ok(items.into())
}

/// 调用掩码预测器。
///
/// 输入为空时直接返回空序列，不调用底层模型。返回的掩码数量必须与边界框一致，
/// 并被最近邻重采样到图像分辨率。
pub fn predict_masks<P: MaskPredictor + ?Sized>(
  predictor: &P,
  image: &RgbImage,
  boxes: &[CornerBox],
) -> Result<Vec<BinaryMask>, AdapterError> {
  if boxes.is_empty() {
    debug!("没有边界框，跳过掩码预测");
    return Ok(Vec::new());
  }

  let masks = predictor
    .predict(image, boxes)
    .map_err(AdapterError::inference(Stage::MaskPredictor))?;

  if masks.len() != boxes.len() {
    return Err(AdapterError::MaskCountMismatch {
      boxes: boxes.len(),
      masks: masks.len(),
    });
  }

  let (width, height) = image.dimensions();
  masks
    .into_iter()
    .map(|mask| {
      let (w, h) = mask.dimensions();
      if w == 0 || h == 0 {
        return Err(AdapterError::EmptyOutput {
          stage: Stage::MaskPredictor,
          width: w,
          height: h,
        });
      }
      Ok(mask.resize_nearest(width, height))
    })
    .collect()
}

/// 调用稠密打分器，输出缩放回图像分辨率并限制在 [0, 1]
pub fn score_dense<S: DenseScorer + ?Sized>(
  scorer: &S,
  image: &RgbImage,
  prompt: &Prompt,
) -> Result<ProbabilityMap, AdapterError> {
  let map = scorer
    .score(image, prompt)
    .map_err(AdapterError::inference(Stage::DenseScorer))?;

  let (w, h) = map.dimensions();
  if w == 0 || h == 0 {
    return Err(AdapterError::EmptyOutput {
      stage: Stage::DenseScorer,
      width: w,
      height: h,
    });
  }

  let (width, height) = image.dimensions();
  if (w, h) != (width, height) {
    debug!("概率图尺寸 {}x{} 缩放至 {}x{}", w, h, width, height);
  }
  Ok(map.resize(width, height).clamped())
}
