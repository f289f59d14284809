// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/replay.rs - 回放已记录检测结果的检测器
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
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::CenterBox,
  model::{DetectItem, DetectResult, Prompt, PromptDetector, Thresholds},
};

#[derive(Error, Debug)]
pub enum RecordedDetectorError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测记录解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 一条已记录的检测结果，bbox 为归一化中心格式 [cx, cy, w, h]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDetection {
  pub phrase: String,
  pub score: f32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phrase_score: Option<f32>,
  pub bbox: [f32; 4],
}

/// 从 JSON 文件回放检测结果，按两个阈值过滤，分数须严格大于阈值。
///
/// 未提供 `phrase_score` 的条目以 `score` 作为短语置信度。
#[derive(Debug, Clone)]
pub struct RecordedDetector {
  records: Vec<RecordedDetection>,
}

impl FromUrlWithScheme for RecordedDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for RecordedDetector {
  type Error = RecordedDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RecordedDetectorError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    info!("加载检测记录: {}", url.path());
    let data = std::fs::read_to_string(url.path())?;
    Self::from_json(&data)
  }
}

impl RecordedDetector {
  pub fn new(records: Vec<RecordedDetection>) -> Self {
    Self { records }
  }

  pub fn from_json(data: &str) -> Result<Self, RecordedDetectorError> {
    let records: Vec<RecordedDetection> = serde_json::from_str(data)?;
    debug!("检测记录条数: {}", records.len());
    Ok(Self { records })
  }

  pub fn records(&self) -> &[RecordedDetection] {
    &self.records
  }
}

impl PromptDetector for RecordedDetector {
  type Error = RecordedDetectorError;

  fn detect(
    &self,
    _image: &RgbImage,
    prompt: &Prompt,
    thresholds: Thresholds,
  ) -> Result<DetectResult<CenterBox>, Self::Error> {
    let items: Vec<_> = self
      .records
      .iter()
      .filter(|r| r.score > thresholds.box_threshold)
      .filter(|r| r.phrase_score.unwrap_or(r.score) > thresholds.text_threshold)
      .map(|r| DetectItem {
        bbox: CenterBox::from(r.bbox),
        score: r.score,
        phrase: r.phrase.clone(),
      })
      .collect();

    debug!(
      "回放检测 \"{}\": {} / {} 条满足阈值",
      prompt,
      items.len(),
      self.records.len()
    );
    Ok(items.into())
  }
}
