use crate::domain::model::{round_to, DetectedObject, Detection, DetectionSet, VisionAssessment};
use crate::utils::error::{CompanionError, Result};
use crate::utils::validation::validate_range;
use std::path::Path;

const DOG_STRONG: f64 = 0.70;
const DOG_GREY: f64 = 0.60;
const CAR_VETO: f64 = 0.60;
const CAR_VETO_OVERRIDE: f64 = 0.85;
/// 狗的框至少要佔畫面 3%
const MIN_AREA_RATIO: f64 = 0.03;
const GREY_ZONE_AREA_RATIO: f64 = 0.06;

/// 讀取偵測器輸出的 JSON
pub fn load_detections<P: AsRef<Path>>(path: P) -> Result<DetectionSet> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CompanionError::MissingInputError {
            path: path.display().to_string(),
        },
        _ => CompanionError::IoError(e),
    })?;
    let set: DetectionSet = serde_json::from_str(&content)?;

    for (index, detection) in set.detections.iter().enumerate() {
        validate_range(
            &format!("detections[{}].confidence", index),
            detection.confidence,
            0.0,
            1.0,
        )?;
    }

    Ok(set)
}

/// 影像尺寸：偵測檔優先，否則讀取影像標頭
pub fn resolve_image_size(set: &DetectionSet, image_path: Option<&Path>) -> Result<(u32, u32)> {
    if let (Some(width), Some(height)) = (set.image_width, set.image_height) {
        return Ok((width, height));
    }

    match image_path {
        Some(path) if path.exists() => Ok(image::image_dimensions(path)?),
        Some(path) => Err(CompanionError::MissingInputError {
            path: path.display().to_string(),
        }),
        None => Err(CompanionError::ProcessingError {
            message: "Image size unknown: provide image_width/image_height or an image".to_string(),
        }),
    }
}

fn area_ratio(detection: &Detection, image_area: f64) -> f64 {
    let [x1, y1, x2, y2] = detection.bbox;
    let area = ((x2 - x1) * (y2 - y1)).max(0.0);
    area / image_area
}

/// 狗 / 車判斷：高信心直接成立，灰色地帶需要較大的框，明顯的車輛場景會否決
pub fn assess_detections(detections: &[Detection], width: u32, height: u32) -> Result<VisionAssessment> {
    let image_area = width as f64 * height as f64;
    if image_area <= 0.0 {
        return Err(CompanionError::ProcessingError {
            message: format!("Invalid image size {}x{}", width, height),
        });
    }

    let mut detected = Vec::with_capacity(detections.len());
    let mut dog_conf: f64 = 0.0;
    let mut best_area: f64 = 0.0;
    let mut car_conf: f64 = 0.0;

    for detection in detections {
        let ratio = area_ratio(detection, image_area);
        detected.push(DetectedObject {
            label: detection.label.clone(),
            confidence: round_to(detection.confidence, 3),
            area_ratio: round_to(ratio, 3),
        });

        match detection.label.as_str() {
            "dog" => {
                dog_conf = dog_conf.max(detection.confidence);
                best_area = best_area.max(ratio);
            }
            "car" => car_conf = car_conf.max(detection.confidence),
            _ => {}
        }
    }

    let mut dog_detected = (dog_conf >= DOG_STRONG && best_area >= MIN_AREA_RATIO)
        || (dog_conf >= DOG_GREY && best_area >= GREY_ZONE_AREA_RATIO);

    if car_conf >= CAR_VETO && dog_conf < CAR_VETO_OVERRIDE {
        dog_detected = false;
    }

    Ok(VisionAssessment {
        dog_detected,
        dog_conf: round_to(dog_conf, 3),
        car_conf: round_to(car_conf, 3),
        best_area_ratio: round_to(best_area, 3),
        detected,
        notes: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str, confidence: f64, bbox: [f64; 4]) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_strong_dog_is_detected() {
        let result = assess_detections(&[detection("dog", 0.91, [0.0, 0.0, 50.0, 40.0])], 100, 100).unwrap();
        assert!(result.dog_detected);
        assert_eq!(result.dog_conf, 0.91);
        assert_eq!(result.best_area_ratio, 0.2);
        assert_eq!(result.detected_classes(), vec!["dog"]);
    }

    #[test]
    fn test_tiny_strong_dog_is_rejected() {
        // 2% 的畫面
        let result = assess_detections(&[detection("dog", 0.95, [0.0, 0.0, 20.0, 10.0])], 100, 100).unwrap();
        assert!(!result.dog_detected);
    }

    #[test]
    fn test_grey_zone_needs_larger_box() {
        let small = assess_detections(&[detection("dog", 0.65, [0.0, 0.0, 10.0, 50.0])], 100, 100).unwrap();
        assert!(!small.dog_detected);

        let large = assess_detections(&[detection("dog", 0.65, [0.0, 0.0, 10.0, 70.0])], 100, 100).unwrap();
        assert!(large.dog_detected);
    }

    #[test]
    fn test_car_scene_vetoes_dog() {
        let detections = [
            detection("dog", 0.80, [0.0, 0.0, 50.0, 50.0]),
            detection("car", 0.75, [50.0, 50.0, 100.0, 100.0]),
        ];
        let vetoed = assess_detections(&detections, 100, 100).unwrap();
        assert!(!vetoed.dog_detected);
        assert_eq!(vetoed.car_conf, 0.75);

        let confident = [
            detection("dog", 0.90, [0.0, 0.0, 50.0, 50.0]),
            detection("car", 0.75, [50.0, 50.0, 100.0, 100.0]),
        ];
        assert!(assess_detections(&confident, 100, 100).unwrap().dog_detected);
    }

    #[test]
    fn test_inverted_box_has_zero_area() {
        let result = assess_detections(&[detection("dog", 0.9, [50.0, 0.0, 0.0, 50.0])], 100, 100).unwrap();
        assert_eq!(result.best_area_ratio, 0.0);
        assert!(!result.dog_detected);
    }

    #[test]
    fn test_no_detections() {
        let result = assess_detections(&[], 640, 480).unwrap();
        assert!(!result.dog_detected);
        assert_eq!(result.dog_conf, 0.0);
        assert!(result.detected.is_empty());
    }

    #[test]
    fn test_image_size_from_detection_set() {
        let set = DetectionSet {
            image_width: Some(640),
            image_height: Some(480),
            detections: Vec::new(),
        };
        assert_eq!(resolve_image_size(&set, None).unwrap(), (640, 480));
        assert!(resolve_image_size(&DetectionSet::default(), None).is_err());
    }

    #[test]
    fn test_zero_sized_image_is_rejected() {
        assert!(assess_detections(&[], 0, 480).is_err());
    }
}
