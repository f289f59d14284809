// 该文件是 Mingjing （明镜） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use mingjing::{
  FromUrl, Orchestrator, SegmentOptions, Thresholds,
  input::ImageFileInput,
  model::{BoxFillPredictor, ProbabilityImageScorer, RecordedDetector},
  output::{ArtifactPublisher, ArtifactStore, Draw, LocalPublisher},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("提示词: {}", args.prompt);
  info!("推理模式: {}", args.mode);
  info!("输出目录: {}", args.output.display());

  let mut builder = Orchestrator::builder();

  if let Some(url) = &args.scorer {
    info!("加载稠密打分器: {}", url);
    builder = builder.single_stage(ProbabilityImageScorer::from_url(url)?);
  }

  if let Some(url) = &args.detector {
    info!("加载检测器: {}", url);
    let detector = RecordedDetector::from_url(url)?;
    let predictor = match &args.predictor {
      Some(url) => BoxFillPredictor::from_url(url)?,
      None => BoxFillPredictor,
    };
    let draw = match &args.font {
      Some(path) => Draw::default().with_font_file(path)?,
      None => Draw::default(),
    };
    builder = builder.two_stage(detector, predictor, draw);
  }

  let orchestrator = builder.build()?;
  let input = ImageFileInput::from_url(&args.input)?;

  let options = SegmentOptions {
    thresholds: Thresholds {
      box_threshold: args.box_threshold,
      text_threshold: args.text_threshold,
    },
    single_stage_output: args.single_stage_output,
    two_stage_output: args.two_stage_output,
    image_path: Some(input.file_name().to_string()),
  };

  let artifact = orchestrator.run(&args.mode, input.image(), &args.prompt, &options)?;

  if let Some(detections) = &artifact.detections {
    for det in detections.iter() {
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}, {:.0})",
        det.phrase,
        det.score * 100.0,
        det.bbox.x0,
        det.bbox.y0,
        det.bbox.x1,
        det.bbox.y1
      );
    }
  }

  let store = ArtifactStore::new(&args.output).with_dated_directories(args.dated);
  for path in store.save_artifact(input.file_name(), &artifact)? {
    let reference = LocalPublisher.publish(&path)?;
    println!("{}", reference);
  }

  Ok(())
}
