// 该文件是 Mingjing （明镜） 项目的一部分。
// src/pipeline.rs - 分割流程编排
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

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Instant};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  geometry::{CornerBox, GeometryError},
  mask::BINARIZE_THRESHOLD,
  model::{
    DenseScorer, DetectResult, MaskPredictor, OptionsError, Prompt, PromptDetector, Thresholds,
    adapter::{self, AdapterError, Stage},
  },
  output::{AnnotationRecord, Draw, ExportError, RenderedImage, blend_masks, export_annotation},
};

#[derive(Error, Debug)]
pub enum SegmentError {
  #[error("未知的模式: {0}")]
  UnknownMode(String),
  #[error("模式 {0} 未注册")]
  ModeNotRegistered(Mode),
  #[error("没有注册任何模式")]
  NoModesRegistered,
  #[error("参数错误: {0}")]
  InvalidOptions(#[from] OptionsError),
  #[error("边界框转换错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("{stage}推理失败: {source}")]
  Inference {
    stage: Stage,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
  #[error("{stage}输出尺寸无效: {width}x{height}")]
  InvalidOutput { stage: Stage, width: u32, height: u32 },
  #[error("掩码数量与边界框数量不一致: 边界框 {boxes} 个, 掩码 {masks} 个")]
  MaskCountMismatch { boxes: usize, masks: usize },
  #[error("标注导出错误: {0}")]
  Export(#[from] ExportError),
}

impl SegmentError {
  /// 配置类错误在调用任何模型之前即被拒绝
  pub fn is_config_error(&self) -> bool {
    matches!(
      self,
      SegmentError::UnknownMode(_)
        | SegmentError::ModeNotRegistered(_)
        | SegmentError::NoModesRegistered
        | SegmentError::InvalidOptions(_)
    )
  }
}

impl From<AdapterError> for SegmentError {
  fn from(err: AdapterError) -> Self {
    match err {
      AdapterError::Inference { stage, source } => SegmentError::Inference { stage, source },
      AdapterError::MaskCountMismatch { boxes, masks } => {
        SegmentError::MaskCountMismatch { boxes, masks }
      }
      AdapterError::EmptyOutput {
        stage,
        width,
        height,
      } => SegmentError::InvalidOutput {
        stage,
        width,
        height,
      },
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
  SingleStage,
  TwoStage,
}

impl Mode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Mode::SingleStage => "single_stage",
      Mode::TwoStage => "two_stage",
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Mode {
  type Err = SegmentError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "single_stage" | "clipseg" => Ok(Mode::SingleStage),
      "two_stage" | "lang_sam" => Ok(Mode::TwoStage),
      _ => Err(SegmentError::UnknownMode(s.to_string())),
    }
  }
}

/// 单阶段模式的输出形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleStageOutput {
  /// 灰度概率图
  Probability,
  /// 二值化掩码
  Binary,
  /// 原图叠加高亮
  #[default]
  Overlay,
}

impl FromStr for SingleStageOutput {
  type Err = OptionsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "probability" => Ok(SingleStageOutput::Probability),
      "binary" => Ok(SingleStageOutput::Binary),
      "overlay" => Ok(SingleStageOutput::Overlay),
      _ => Err(OptionsError::UnknownOutputKind(s.to_string())),
    }
  }
}

/// 两阶段模式的输出形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TwoStageOutput {
  Overlay,
  Annotation,
  #[default]
  Both,
}

impl TwoStageOutput {
  fn overlay(&self) -> bool {
    matches!(self, TwoStageOutput::Overlay | TwoStageOutput::Both)
  }

  fn annotation(&self) -> bool {
    matches!(self, TwoStageOutput::Annotation | TwoStageOutput::Both)
  }
}

impl FromStr for TwoStageOutput {
  type Err = OptionsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "overlay" => Ok(TwoStageOutput::Overlay),
      "annotation" => Ok(TwoStageOutput::Annotation),
      "both" => Ok(TwoStageOutput::Both),
      _ => Err(OptionsError::UnknownOutputKind(s.to_string())),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentOptions {
  pub thresholds: Thresholds,
  pub single_stage_output: SingleStageOutput,
  pub two_stage_output: TwoStageOutput,
  /// 写入标注记录的图像引用，仅作元数据
  pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SegmentationArtifact {
  pub mode: Mode,
  pub image: Option<RenderedImage>,
  pub annotation: Option<AnnotationRecord>,
  pub detections: Option<DetectResult<CornerBox>>,
}

/// 分割策略：每种模式实现同一接口
pub trait Segmenter: Send + Sync {
  fn mode(&self) -> Mode;

  fn segment(
    &self,
    image: &RgbImage,
    prompt: &Prompt,
    options: &SegmentOptions,
  ) -> Result<SegmentationArtifact, SegmentError>;
}

/// 单阶段：稠密打分 → 二值化 → 高亮
pub struct SingleStage<S> {
  scorer: S,
}

impl<S: DenseScorer> SingleStage<S> {
  pub fn new(scorer: S) -> Self {
    Self { scorer }
  }
}

impl<S: DenseScorer> Segmenter for SingleStage<S> {
  fn mode(&self) -> Mode {
    Mode::SingleStage
  }

  fn segment(
    &self,
    image: &RgbImage,
    prompt: &Prompt,
    options: &SegmentOptions,
  ) -> Result<SegmentationArtifact, SegmentError> {
    let map = adapter::score_dense(&self.scorer, image, prompt)?;

    let rendered = match options.single_stage_output {
      SingleStageOutput::Probability => RenderedImage::Gray(map.to_gray()),
      SingleStageOutput::Binary => {
        RenderedImage::Gray(map.binarize(BINARIZE_THRESHOLD).into_gray())
      }
      SingleStageOutput::Overlay => {
        let mask = map.binarize(BINARIZE_THRESHOLD);
        debug!("前景像素数: {}", mask.count());
        RenderedImage::Rgb(blend_masks(image, &[mask]))
      }
    };

    Ok(SegmentationArtifact {
      mode: Mode::SingleStage,
      image: Some(rendered),
      annotation: None,
      detections: None,
    })
  }
}

/// 两阶段：文本检测 → 框格式转换 → 掩码预测 → 高亮/标注
pub struct TwoStage<D, P> {
  detector: D,
  predictor: P,
  draw: Draw,
}

impl<D: PromptDetector, P: MaskPredictor> TwoStage<D, P> {
  pub fn new(detector: D, predictor: P) -> Self {
    Self {
      detector,
      predictor,
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }
}

impl<D: PromptDetector, P: MaskPredictor> Segmenter for TwoStage<D, P> {
  fn mode(&self) -> Mode {
    Mode::TwoStage
  }

  fn segment(
    &self,
    image: &RgbImage,
    prompt: &Prompt,
    options: &SegmentOptions,
  ) -> Result<SegmentationArtifact, SegmentError> {
    let (width, height) = image.dimensions();

    let detections =
      adapter::detect(&self.detector, image, prompt, options.thresholds)?.to_corner(width, height)?;
    for item in detections.iter() {
      debug!(
        "  - {}: {:.2}% at {:?}",
        item.phrase,
        item.score * 100.0,
        item.bbox.to_array()
      );
    }

    // 数量校验由适配层完成，此后 masks[i] 与 detections[i] 一一对应
    let masks = adapter::predict_masks(&self.predictor, image, &detections.boxes())?;
    info!("检测到 {} 个对象, 掩码 {} 个", detections.len(), masks.len());

    let output = options.two_stage_output;
    let rendered = output
      .overlay()
      .then(|| RenderedImage::Rgb(self.draw.composite(image, &masks, Some(&detections))));
    let annotation = if output.annotation() {
      Some(export_annotation(
        &masks,
        &detections.phrases(),
        width,
        height,
        options.image_path.as_deref(),
      )?)
    } else {
      None
    };

    Ok(SegmentationArtifact {
      mode: Mode::TwoStage,
      image: rendered,
      annotation,
      detections: Some(detections),
    })
  }
}

/// 模式到分割策略的映射，启动时构建一次，之后只读共享
pub struct Orchestrator {
  variants: HashMap<Mode, Arc<dyn Segmenter>>,
}

#[derive(Default)]
pub struct OrchestratorBuilder {
  variants: HashMap<Mode, Arc<dyn Segmenter>>,
}

impl OrchestratorBuilder {
  pub fn register(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
    let mode = segmenter.mode();
    if self.variants.insert(mode, segmenter).is_some() {
      debug!("模式 {} 被重复注册，使用最新的实现", mode);
    }
    self
  }

  pub fn single_stage<S: DenseScorer + 'static>(self, scorer: S) -> Self {
    self.register(Arc::new(SingleStage::new(scorer)))
  }

  pub fn two_stage<D, P>(self, detector: D, predictor: P, draw: Draw) -> Self
  where
    D: PromptDetector + 'static,
    P: MaskPredictor + 'static,
  {
    self.register(Arc::new(TwoStage::new(detector, predictor).with_draw(draw)))
  }

  pub fn build(self) -> Result<Orchestrator, SegmentError> {
    if self.variants.is_empty() {
      return Err(SegmentError::NoModesRegistered);
    }
    let mut modes: Vec<_> = self.variants.keys().map(Mode::as_str).collect();
    modes.sort_unstable();
    info!("已注册模式: {}", modes.join(", "));
    Ok(Orchestrator {
      variants: self.variants,
    })
  }
}

impl Orchestrator {
  pub fn builder() -> OrchestratorBuilder {
    OrchestratorBuilder::default()
  }

  pub fn supports(&self, mode: Mode) -> bool {
    self.variants.contains_key(&mode)
  }

  /// 解析模式与参数后执行；任何配置错误都在调用模型之前返回
  pub fn run(
    &self,
    mode: &str,
    image: &RgbImage,
    prompt: &str,
    options: &SegmentOptions,
  ) -> Result<SegmentationArtifact, SegmentError> {
    let mode: Mode = mode.parse()?;
    let prompt = Prompt::new(prompt)?;
    self.run_mode(mode, image, &prompt, options)
  }

  pub fn run_mode(
    &self,
    mode: Mode,
    image: &RgbImage,
    prompt: &Prompt,
    options: &SegmentOptions,
  ) -> Result<SegmentationArtifact, SegmentError> {
    let segmenter = self
      .variants
      .get(&mode)
      .ok_or(SegmentError::ModeNotRegistered(mode))?;
    options.thresholds.validate()?;

    info!(
      "开始分割: 模式 {}, 提示词 \"{}\", 图像 {}x{}",
      mode,
      prompt,
      image.width(),
      image.height()
    );
    let now = Instant::now();
    let artifact = segmenter.segment(image, prompt, options)?;
    info!("分割完成，耗时: {:.2?}", now.elapsed());

    Ok(artifact)
  }
}
