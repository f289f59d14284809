// 该文件是 Mingjing （明镜） 项目的一部分。
// tests/offline.rs - 离线模型与产物保存测试
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

#![cfg(feature = "offline_models")]

mod common;

use std::path::Path;

use image::{GrayImage, Luma};
use url::Url;

use mingjing::{
  FromUrl, Orchestrator, SegmentOptions,
  input::ImageFileInput,
  model::{BoxFillPredictor, ProbabilityImageScorer, RecordedDetection, RecordedDetector},
  output::{AnnotationRecord, ArtifactPublisher, ArtifactStore, Draw, LocalPublisher},
};

use common::{blended, test_image};

fn url_with_scheme(scheme: &str, path: &Path) -> Url {
  let file_url = Url::from_file_path(path).unwrap();
  Url::parse(&file_url.as_str().replacen("file", scheme, 1)).unwrap()
}

#[test]
fn replayed_detections_end_to_end() {
  let dir = tempfile::tempdir().unwrap();

  let image_path = dir.path().join("cat.png");
  test_image(100, 100).save(&image_path).unwrap();

  let records_path = dir.path().join("detections.json");
  std::fs::write(
    &records_path,
    r#"[
      {"phrase": "cat", "score": 0.9, "bbox": [0.5, 0.5, 0.2, 0.2]},
      {"phrase": "dog", "score": 0.2, "bbox": [0.2, 0.2, 0.1, 0.1]},
      {"phrase": "hat", "score": 0.8, "phrase_score": 0.1, "bbox": [0.8, 0.8, 0.2, 0.2]}
    ]"#,
  )
  .unwrap();

  let detector = RecordedDetector::from_url(&url_with_scheme("replay", &records_path)).unwrap();
  let predictor = BoxFillPredictor::from_url(&Url::parse("boxfill:///").unwrap()).unwrap();
  let orchestrator = Orchestrator::builder()
    .two_stage(detector, predictor, Draw::default())
    .build()
    .unwrap();

  let input = ImageFileInput::from_url(&url_with_scheme("image", &image_path)).unwrap();
  let options = SegmentOptions {
    image_path: Some(input.file_name().to_string()),
    ..Default::default()
  };
  let artifact = orchestrator
    .run("two_stage", input.image(), "cat", &options)
    .unwrap();

  let detections = artifact.detections.as_ref().unwrap();
  assert_eq!(detections.phrases(), vec!["cat".to_string()]);

  let record = artifact.annotation.as_ref().unwrap();
  assert_eq!(record.shapes.len(), 1);
  assert_eq!(record.image_path.as_deref(), Some("cat.png"));

  let store = ArtifactStore::new(dir.path().join("segmented"));
  let paths = store.save_artifact(input.file_name(), &artifact).unwrap();
  let names: Vec<_> = paths
    .iter()
    .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
    .collect();
  assert_eq!(names, vec!["segmented_cat.png", "segmented_cat.json"]);

  let saved = std::fs::read_to_string(&paths[1]).unwrap();
  assert_eq!(&AnnotationRecord::from_json_str(&saved).unwrap(), record);

  let reference = LocalPublisher.publish(&paths[0]).unwrap();
  assert!(reference.starts_with("file://"));
  assert!(reference.ends_with("segmented_cat.png"));
}

#[test]
fn probability_image_drives_single_stage() {
  let dir = tempfile::tempdir().unwrap();

  // 左半部分为前景
  let map_path = dir.path().join("prob.png");
  GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 230 } else { 20 }]))
    .save(&map_path)
    .unwrap();

  let scorer = ProbabilityImageScorer::from_url(&url_with_scheme("probmap", &map_path)).unwrap();
  let orchestrator = Orchestrator::builder().single_stage(scorer).build().unwrap();

  let image = test_image(20, 10);
  let artifact = orchestrator
    .run("single_stage", &image, "sky", &SegmentOptions::default())
    .unwrap();
  let overlay = artifact.image.unwrap();
  let overlay = overlay.as_rgb().unwrap();

  assert_eq!(*overlay.get_pixel(2, 5), blended(*image.get_pixel(2, 5)));
  assert_eq!(*overlay.get_pixel(17, 5), *image.get_pixel(17, 5));
}

#[test]
fn box_clipped_at_left_edge_still_yields_a_polygon() {
  let detector = RecordedDetector::new(vec![RecordedDetection {
    phrase: "cat".to_string(),
    score: 0.9,
    phrase_score: None,
    bbox: [0.05, 0.5, 0.2, 0.4],
  }]);
  let orchestrator = Orchestrator::builder()
    .two_stage(detector, BoxFillPredictor, Draw::default())
    .build()
    .unwrap();

  let artifact = orchestrator
    .run("two_stage", &test_image(100, 100), "cat", &SegmentOptions::default())
    .unwrap();

  let record = artifact.annotation.unwrap();
  assert_eq!(record.shapes.len(), 1);
  let points = &record.shapes[0].points;
  assert_eq!(points.iter().map(|p| p[0]).fold(f32::MAX, f32::min), 0.0);
  assert!(points.iter().all(|p| (29.0..=70.0).contains(&p[1])));
}
