// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output/annotation.rs - 掩码轮廓提取与 LabelMe 标注导出
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

use std::path::Path;

use image::{GrayImage, imageops};
use imageproc::{
  contours::{BorderType, find_contours},
  point::Point,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::mask::BinaryMask;

/// 面积严格小于该值的轮廓视为噪点丢弃（平方像素）
pub const MIN_CONTOUR_AREA: f64 = 100.0;
pub const LABELME_VERSION: &str = "4.5.6";

#[derive(Error, Debug)]
pub enum ExportError {
  #[error("标签数量与掩码数量不一致: 掩码 {masks} 个, 标签 {labels} 个")]
  LabelCountMismatch { masks: usize, labels: usize },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
  Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
  pub label: String,
  pub line_color: Option<Vec<u8>>,
  pub fill_color: Option<Vec<u8>>,
  pub points: Vec<[f32; 2]>,
  pub shape_type: ShapeType,
}

/// LabelMe 格式的标注记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
  pub version: String,
  pub image_height: u32,
  pub image_width: u32,
  pub image_path: Option<String>,
  pub flags: serde_json::Map<String, serde_json::Value>,
  pub shapes: Vec<Shape>,
}

impl AnnotationRecord {
  pub fn new(width: u32, height: u32, image_path: Option<String>) -> Self {
    Self {
      version: LABELME_VERSION.to_string(),
      image_height: height,
      image_width: width,
      image_path,
      flags: serde_json::Map::new(),
      shapes: Vec::new(),
    }
  }

  pub fn to_json_string(&self) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn from_json_str(data: &str) -> Result<Self, ExportError> {
    Ok(serde_json::from_str(data)?)
  }

  pub fn write_json(&self, path: &Path) -> Result<(), ExportError> {
    std::fs::write(path, self.to_json_string()?)?;
    debug!("标注写入: {}", path.display());
    Ok(())
  }
}

/// 多边形面积（鞋带公式）
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
  if points.len() < 3 {
    return 0.0;
  }
  let doubled: i64 = points
    .iter()
    .zip(points.iter().cycle().skip(1))
    .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
    .sum();
  (doubled as f64).abs() / 2.0
}

// 去掉水平、竖直、对角直线段中间的点，只保留拐点
fn compress_chain(mut points: Vec<Point<i32>>) -> Vec<Point<i32>> {
  points.dedup();
  if points.len() > 1 && points.first() == points.last() {
    points.pop();
  }
  let n = points.len();
  if n < 3 {
    return points;
  }

  let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());
  let kept: Vec<_> = (0..n)
    .filter(|&i| {
      let prev = points[(i + n - 1) % n];
      let next = points[(i + 1) % n];
      step(prev, points[i]) != step(points[i], next)
    })
    .map(|i| points[i])
    .collect();

  if kept.is_empty() { points } else { kept }
}

/// 提取二值掩码的最外层轮廓（不含孔洞，也不含孔洞内的嵌套区域），
/// 顶点顺序为边界跟踪顺序。
///
/// 掩码四周先补一圈背景再跟踪，否则从第 0 列开始的区域不会被识别为外边界。
pub fn external_contours(mask: &BinaryMask) -> Vec<Vec<Point<i32>>> {
  let (width, height) = mask.dimensions();
  let mut padded = GrayImage::new(width + 2, height + 2);
  imageops::replace(&mut padded, mask.as_gray(), 1, 1);

  find_contours::<i32>(&padded)
    .into_iter()
    .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    .map(|c| {
      let points = c
        .points
        .into_iter()
        .map(|p| Point::new(p.x - 1, p.y - 1))
        .collect();
      compress_chain(points)
    })
    .collect()
}

/// 为每个掩码导出面积不小于 [`MIN_CONTOUR_AREA`] 的多边形，标签按下标对应。
///
/// 尺寸与图像不同的掩码先以最近邻方式重采样。
pub fn export_annotation(
  masks: &[BinaryMask],
  labels: &[String],
  width: u32,
  height: u32,
  image_path: Option<&str>,
) -> Result<AnnotationRecord, ExportError> {
  if masks.len() != labels.len() {
    return Err(ExportError::LabelCountMismatch {
      masks: masks.len(),
      labels: labels.len(),
    });
  }

  let mut record = AnnotationRecord::new(width, height, image_path.map(str::to_string));
  for (index, (mask, label)) in masks.iter().zip(labels).enumerate() {
    let mask = mask.resize_nearest(width, height);
    let contours = external_contours(&mask);
    let total = contours.len();

    let shapes: Vec<Shape> = contours
      .into_iter()
      .filter(|contour| polygon_area(contour) >= MIN_CONTOUR_AREA)
      .map(|contour| Shape {
        label: label.clone(),
        line_color: None,
        fill_color: None,
        points: contour.iter().map(|p| [p.x as f32, p.y as f32]).collect(),
        shape_type: ShapeType::Polygon,
      })
      .collect();

    debug!(
      "掩码 {} ({}): 轮廓 {} 个, 保留 {} 个",
      index,
      label,
      total,
      shapes.len()
    );
    record.shapes.extend(shapes);
  }

  info!("导出多边形 {} 个", record.shapes.len());
  Ok(record)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn square(size: u32, offset: u32, side: u32) -> BinaryMask {
    BinaryMask::from_fn(size, size, |x, y| {
      (offset..offset + side).contains(&x) && (offset..offset + side).contains(&y)
    })
  }

  fn corners(shape: &Shape) -> Vec<[f32; 2]> {
    let mut points = shape.points.clone();
    points.sort_by(|a, b| a.partial_cmp(b).unwrap());
    points
  }

  #[test]
  fn area_at_threshold_is_kept() {
    // 11x11 像素，轮廓经过像素中心，面积恰为 10 * 10
    let mask = square(30, 5, 11);
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert_eq!(polygon_area(&contours[0]), MIN_CONTOUR_AREA);

    let record = export_annotation(&[mask], &["cat".to_string()], 30, 30, None).unwrap();
    assert_eq!(record.shapes.len(), 1);
  }

  #[test]
  fn area_below_threshold_is_dropped() {
    let mut mask = square(30, 5, 11);
    mask.set(15, 15, false);
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert!(polygon_area(&contours[0]) < MIN_CONTOUR_AREA);

    let record = export_annotation(&[mask], &["cat".to_string()], 30, 30, None).unwrap();
    assert!(record.shapes.is_empty());
  }

  #[test]
  fn regions_touching_the_left_edge_are_traced() {
    // 被画面左边缘截断的矩形：x 0..20, y 30..70
    let mask = BinaryMask::from_fn(100, 100, |x, y| x < 20 && (30..70).contains(&y));
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert_eq!(polygon_area(&contours[0]), 19.0 * 39.0);

    let record = export_annotation(&[mask], &["cat".to_string()], 100, 100, None).unwrap();
    assert_eq!(record.shapes.len(), 1);
    assert_eq!(
      corners(&record.shapes[0]),
      vec![[0.0, 30.0], [0.0, 69.0], [19.0, 30.0], [19.0, 69.0]]
    );
  }

  #[test]
  fn staircase_from_origin_is_traced() {
    let mask = BinaryMask::from_fn(40, 40, |x, y| x + y < 30);
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert!(contours[0].contains(&Point::new(0, 0)));
    assert!(polygon_area(&contours[0]) >= MIN_CONTOUR_AREA);
  }

  #[test]
  fn full_mask_gives_one_shape_along_the_border() {
    let mask = BinaryMask::from_fn(50, 40, |_, _| true);
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert_eq!(polygon_area(&contours[0]), 49.0 * 39.0);

    let record = export_annotation(&[mask], &["sky".to_string()], 50, 40, None).unwrap();
    assert_eq!(record.shapes.len(), 1);
    assert_eq!(
      corners(&record.shapes[0]),
      vec![[0.0, 0.0], [0.0, 39.0], [49.0, 0.0], [49.0, 39.0]]
    );
  }

  #[test]
  fn regions_touching_bottom_right_corner_are_traced() {
    let mask = BinaryMask::from_fn(60, 60, |x, y| x >= 40 && y >= 45);
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert_eq!(polygon_area(&contours[0]), 19.0 * 14.0);
  }

  #[test]
  fn square_is_reduced_to_corners() {
    let mask = square(100, 40, 20);
    let record = export_annotation(&[mask], &["cat".to_string()], 100, 100, Some("cat.png")).unwrap();
    assert_eq!(record.shapes.len(), 1);
    assert_eq!(
      corners(&record.shapes[0]),
      vec![[40.0, 40.0], [40.0, 59.0], [59.0, 40.0], [59.0, 59.0]]
    );
    assert_eq!(record.image_path.as_deref(), Some("cat.png"));
  }

  #[test]
  fn holes_and_nested_regions_are_ignored() {
    // 外框 40x40，中间挖去 20x20，孔洞中再放一个 12x12 的实心块
    let mask = BinaryMask::from_fn(60, 60, |x, y| {
      let outer = (5..45).contains(&x) && (5..45).contains(&y);
      let hole = (15..35).contains(&x) && (15..35).contains(&y);
      let inner = (19..31).contains(&x) && (19..31).contains(&y);
      (outer && !hole) || inner
    });
    let contours = external_contours(&mask);
    assert_eq!(contours.len(), 1);
    assert_eq!(polygon_area(&contours[0]), 39.0 * 39.0);
  }

  #[test]
  fn export_is_deterministic() {
    let mask = BinaryMask::from_fn(64, 64, |x, y| {
      let dx = x as i32 - 30;
      let dy = y as i32 - 28;
      dx * dx + dy * dy < 300 || (x > 50 && y > 50)
    });
    let labels = vec!["blob".to_string()];
    let first = export_annotation(&[mask.clone()], &labels, 64, 64, None).unwrap();
    let second = export_annotation(&[mask], &labels, 64, 64, None).unwrap();
    assert!(!first.shapes.is_empty());
    assert_eq!(first, second);
  }

  #[test]
  fn shapes_follow_mask_order_and_labels() {
    let masks = vec![square(100, 10, 15), square(100, 60, 30)];
    let labels = vec!["cat".to_string(), "dog".to_string()];
    let record = export_annotation(&masks, &labels, 100, 100, None).unwrap();
    let names: Vec<_> = record.shapes.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(names, vec!["cat", "dog"]);
  }

  #[test]
  fn label_count_must_match() {
    let err = export_annotation(&[square(20, 0, 5)], &[], 20, 20, None).unwrap_err();
    assert!(matches!(
      err,
      ExportError::LabelCountMismatch { masks: 1, labels: 0 }
    ));
  }

  #[test]
  fn empty_input_gives_empty_record() {
    let record = export_annotation(&[], &[], 100, 80, None).unwrap();
    assert!(record.shapes.is_empty());
    assert_eq!((record.image_width, record.image_height), (100, 80));
  }

  #[test]
  fn json_uses_labelme_schema() {
    let record =
      export_annotation(&[square(50, 10, 20)], &["cat".to_string()], 50, 50, None).unwrap();
    let value: serde_json::Value = serde_json::from_str(&record.to_json_string().unwrap()).unwrap();

    assert_eq!(value["version"], "4.5.6");
    assert_eq!(value["imageHeight"], 50);
    assert_eq!(value["imageWidth"], 50);
    assert!(value["imagePath"].is_null());
    assert_eq!(value["flags"], serde_json::json!({}));
    let shape = &value["shapes"][0];
    assert_eq!(shape["label"], "cat");
    assert!(shape["line_color"].is_null());
    assert!(shape["fill_color"].is_null());
    assert_eq!(shape["shape_type"], "polygon");
    assert_eq!(shape["points"].as_array().unwrap().len(), 4);

    let parsed = AnnotationRecord::from_json_str(&record.to_json_string().unwrap()).unwrap();
    assert_eq!(parsed, record);
  }
}
