// 该文件是 Mingjing （明镜） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use mingjing::{
  model::{DEFAULT_BOX_THRESHOLD, DEFAULT_TEXT_THRESHOLD},
  pipeline::{SingleStageOutput, TwoStageOutput},
};

/// Mingjing 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///data/cat.png
  /// 支持格式: *.png, *.jpg, *.jpeg, *.bmp
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 文本提示词
  #[arg(long, value_name = "TEXT")]
  pub prompt: String,

  /// 推理模式: single_stage (clipseg) 或 two_stage (lang_sam)
  #[arg(long, default_value = "two_stage", value_name = "MODE")]
  pub mode: String,

  /// 检测器，例如 replay:///data/detections.json
  #[arg(long, value_name = "MODEL")]
  pub detector: Option<Url>,

  /// 掩码预测器，例如 boxfill:///
  #[arg(long, value_name = "MODEL")]
  pub predictor: Option<Url>,

  /// 稠密打分器，例如 probmap:///data/cat_prob.png
  #[arg(long, value_name = "MODEL")]
  pub scorer: Option<Url>,

  /// 检测框置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_BOX_THRESHOLD, value_name = "THRESHOLD")]
  pub box_threshold: f32,

  /// 短语置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_TEXT_THRESHOLD, value_name = "THRESHOLD")]
  pub text_threshold: f32,

  /// 单阶段输出: probability, binary, overlay
  #[arg(long, default_value = "overlay", value_name = "KIND")]
  pub single_stage_output: SingleStageOutput,

  /// 两阶段输出: overlay, annotation, both
  #[arg(long, default_value = "both", value_name = "KIND")]
  pub two_stage_output: TwoStageOutput,

  /// 输出目录
  #[arg(long, default_value = "segmented", value_name = "DIR")]
  pub output: PathBuf,

  /// 按日期创建输出子目录
  #[arg(long)]
  pub dated: bool,

  /// 标签字体文件 (TTF/OTF)，不提供时只绘制边框
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}
