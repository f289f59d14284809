// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output/store.rs - 分割产物保存与发布
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

use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  output::{ExportError, RenderedImage},
  pipeline::SegmentationArtifact,
};

const ARTIFACT_PREFIX: &str = "segmented_";
const DEFAULT_IMAGE_EXTENSION: &str = "png";

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("标注导出错误: {0}")]
  ExportError(#[from] ExportError),
  #[error("源文件名无效: {0:?}")]
  InvalidSourceName(String),
  #[error("无法转换为文件 URL: {0}")]
  InvalidFileUrl(PathBuf),
}

/// 产物发布服务：接收本地产物路径，返回可公开访问的引用
pub trait ArtifactPublisher {
  type Error;
  fn publish(&self, path: &Path) -> Result<String, Self::Error>;
}

/// 本地发布：返回产物的 file:// URL
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPublisher;

impl ArtifactPublisher for LocalPublisher {
  type Error = StoreError;

  fn publish(&self, path: &Path) -> Result<String, Self::Error> {
    let absolute = std::fs::canonicalize(path)?;
    let url =
      Url::from_file_path(&absolute).map_err(|_| StoreError::InvalidFileUrl(absolute.clone()))?;
    Ok(url.to_string())
  }
}

/// 产物目录，文件名为 `segmented_<源文件名>`；可按日期分子目录
#[derive(Debug, Clone)]
pub struct ArtifactStore {
  directory: PathBuf,
  dated: bool,
}

impl ArtifactStore {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      dated: false,
    }
  }

  pub fn with_dated_directories(mut self, dated: bool) -> Self {
    self.dated = dated;
    self
  }

  fn target_directory(&self) -> Result<PathBuf, StoreError> {
    let directory = if self.dated {
      let now = Utc::now();
      self
        .directory
        .join(now.year().to_string())
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()))
    } else {
      self.directory.clone()
    };
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }
    Ok(directory)
  }

  fn source_parts(source_name: &str) -> Result<(String, Option<String>), StoreError> {
    let path = Path::new(source_name);
    let stem = path
      .file_stem()
      .and_then(|s| s.to_str())
      .filter(|s| !s.is_empty())
      .ok_or_else(|| StoreError::InvalidSourceName(source_name.to_string()))?;
    let extension = path
      .extension()
      .and_then(|s| s.to_str())
      .map(str::to_lowercase);
    Ok((stem.to_string(), extension))
  }

  /// 保存渲染图像，沿用源文件扩展名（缺省为 png）
  pub fn save_image(&self, source_name: &str, image: &RenderedImage) -> Result<PathBuf, StoreError> {
    let (stem, extension) = Self::source_parts(source_name)?;
    let extension = extension.unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string());
    let path = self
      .target_directory()?
      .join(format!("{}{}.{}", ARTIFACT_PREFIX, stem, extension));

    image.save(&path)?;
    info!("保存图像到文件: {}", path.display());
    Ok(path)
  }

  pub fn save_annotation(
    &self,
    source_name: &str,
    record: &crate::output::AnnotationRecord,
  ) -> Result<PathBuf, StoreError> {
    let (stem, _) = Self::source_parts(source_name)?;
    let path = self
      .target_directory()?
      .join(format!("{}{}.json", ARTIFACT_PREFIX, stem));

    record.write_json(&path)?;
    info!("保存标注到文件: {}", path.display());
    Ok(path)
  }

  /// 保存产物中的所有部分，返回写入的文件路径
  pub fn save_artifact(
    &self,
    source_name: &str,
    artifact: &SegmentationArtifact,
  ) -> Result<Vec<PathBuf>, StoreError> {
    let mut paths = Vec::new();
    if let Some(image) = &artifact.image {
      paths.push(self.save_image(source_name, image)?);
    }
    if let Some(record) = &artifact.annotation {
      paths.push(self.save_annotation(source_name, record)?);
    }
    if paths.is_empty() {
      warn!("产物为空，没有文件被保存");
    }
    Ok(paths)
  }
}
