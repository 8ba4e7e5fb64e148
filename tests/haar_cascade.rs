mod common;

use common::{banded_image, fixture};
use face_analyzer::detector::cascade::HaarCascade;
use face_analyzer::{create_detector, DetectParams, DetectionError, FaceDetector, HaarDetector};
use image::{Rgb, RgbImage};

#[test]
fn loads_opencv_cascade_file() {
    let cascade = HaarCascade::load(&fixture("top_bright_cascade.xml")).unwrap();
    assert_eq!(cascade.window_size(), (24, 24));
    assert_eq!(cascade.stage_count(), 2);
}

#[test]
fn factory_builds_haar_backend() {
    let mut detector = create_detector("HAAR", &fixture("top_bright_cascade.xml")).unwrap();
    let image = banded_image(28, 28, 14, &[(0, 28)]);
    let regions = detector.detect(&image, &DetectParams::default()).unwrap();
    assert_eq!(regions.len(), 1);
    assert!(regions[0].x <= 4 && regions[0].y <= 4);
    assert_eq!((regions[0].width, regions[0].height), (24, 24));
}

#[test]
fn zero_min_neighbors_reports_every_window() {
    let detector = HaarDetector::from_file(&fixture("top_bright_cascade.xml")).unwrap();
    let gray = image::imageops::grayscale(&banded_image(28, 28, 14, &[(0, 28)]));
    let params = DetectParams {
        min_neighbors: 0,
        ..DetectParams::default()
    };
    // Offsets 0, 2 and 4 in both directions at the base scale.
    assert_eq!(detector.raw_candidates(&gray, &params).unwrap().len(), 9);
}

#[test]
fn low_contrast_face_is_found_like_a_high_contrast_one() {
    let mut detector = HaarDetector::from_file(&fixture("top_bright_cascade.xml")).unwrap();
    let params = DetectParams::default();
    let high = banded_image(28, 28, 14, &[(0, 28)]);
    let low = RgbImage::from_fn(28, 28, |_, y| if y < 14 { Rgb([135, 135, 135]) } else { Rgb([120, 120, 120]) });

    let expected = detector.detect(&high, &params).unwrap();
    let found = detector.detect(&low, &params).unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found, expected);
}

#[test]
fn missing_cascade_is_a_model_error() {
    let err = HaarDetector::from_file(&fixture("no_such_cascade.xml")).err().unwrap();
    assert!(matches!(err, DetectionError::Model { .. }));
}

#[test]
fn non_cascade_xml_is_a_model_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xml");
    std::fs::write(&path, "<opencv_storage><cascade><stageType>BOOST</stageType></cascade></opencv_storage>").unwrap();

    let err = HaarDetector::from_file(&path).err().unwrap();
    assert!(matches!(err, DetectionError::Model { .. }));
}
