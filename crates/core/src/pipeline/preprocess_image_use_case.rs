use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::landmark_locator::LandmarkLocator;
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::pipeline::pipeline_logger::{
    PipelineLogger, METRIC_FACES, METRIC_FACES_DROPPED, METRIC_LANDMARK_COVERAGE,
};
use crate::preprocessing::annotate::annotate;
use crate::preprocessing::box_blur::box_blur;
use crate::preprocessing::clahe::{clahe, equalize_histogram, to_luma, ClaheParams};
use crate::preprocessing::face_normalizer::{normalize_faces, RemappedPoint};
use crate::preprocessing::median_blur::median_blur;
use crate::shared::detection_box::DetectionBox;
use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;
use crate::shared::preprocess_config::{Denoiser, Equalization, PreprocessConfig};

/// Everything produced for one input image.
///
/// `boxes`, `landmarks`, `crops` and `remapped` are parallel: entry `i` of
/// each describes the same face. Faces without landmarks are not included.
#[derive(Clone, Debug)]
pub struct PreprocessResult {
    /// Denoised input with face boxes and landmarks drawn on it.
    pub annotated: Frame,
    pub boxes: Vec<DetectionBox>,
    /// Landmarks in original-image coordinates.
    pub landmarks: Vec<LandmarkSet>,
    /// Gray, contrast-normalized crops at the canonical size.
    pub crops: Vec<Frame>,
    /// Landmarks in each crop's coordinate space.
    pub remapped: Vec<Vec<RemappedPoint>>,
}

impl PreprocessResult {
    pub fn face_count(&self) -> usize {
        self.crops.len()
    }
}

/// Single-image preprocessing: blur → detect → landmarks → contrast →
/// gray/scale normalization.
pub struct PreprocessImageUseCase {
    detector: Box<dyn FaceDetector>,
    locator: Box<dyn LandmarkLocator>,
    config: PreprocessConfig,
    logger: Box<dyn PipelineLogger>,
}

impl PreprocessImageUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        locator: Box<dyn LandmarkLocator>,
        config: PreprocessConfig,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, PreprocessError> {
        config.validate()?;
        Ok(Self {
            detector,
            locator,
            config,
            logger,
        })
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }

    /// Runs the full pipeline on one decoded image.
    ///
    /// Zero detected faces is a valid, empty result.
    pub fn execute(&mut self, image: &Frame) -> Result<PreprocessResult, Box<dyn std::error::Error>> {
        // 1. Denoise
        let t = Instant::now();
        let mut working = image.to_rgb()?;
        match self.config.denoise {
            Denoiser::Mean => box_blur(&mut working, self.config.blur_kernel)?,
            Denoiser::Median => median_blur(&mut working, self.config.blur_kernel)?,
        }
        self.record("denoise", t);

        // 2. Face boxes
        let t = Instant::now();
        let detected = self.detector.detect(&working)?;
        self.record("detect", t);
        self.logger
            .info(&format!("Number of faces detected: {}", detected.len()));

        // 3. Landmarks per face
        let t = Instant::now();
        let detected_count = detected.len();
        let mut faces: Vec<(DetectionBox, LandmarkSet)> = Vec::with_capacity(detected_count);
        for face in detected {
            if let Err(e) = face.validated() {
                log::warn!("Skipping face: {e}");
                continue;
            }
            match self.locator.locate(&working, &face)? {
                Some(landmarks) => {
                    self.logger
                        .metric(METRIC_LANDMARK_COVERAGE, landmarks.coverage(&face));
                    faces.push((face, landmarks));
                }
                None => log::warn!(
                    "No landmarks for face at ({}, {}, {}, {}); dropping it",
                    face.left,
                    face.top,
                    face.right,
                    face.bottom
                ),
            }
        }
        self.record("landmarks", t);

        // 4. Contrast
        let t = Instant::now();
        let mut contrasted = working.clone();
        match self.config.equalization {
            Equalization::Adaptive => clahe(
                &mut contrasted,
                ClaheParams {
                    clip_limit: self.config.clahe_clip_limit,
                    grid: self.config.clahe_grid,
                },
            )?,
            Equalization::Global => equalize_histogram(&mut contrasted)?,
        }
        self.record("contrast", t);

        // 5. Gray + scale normalization
        let t = Instant::now();
        let mut gray = to_luma(&contrasted)?;
        let normalized = normalize_faces(&mut gray, &faces, self.config.target_size())?;
        self.record("normalize", t);

        let (boxes, landmarks): (Vec<_>, Vec<_>) = faces.into_iter().unzip();
        let mut annotated = working;
        annotate(&mut annotated, &boxes, &landmarks)?;

        let (crops, remapped): (Vec<Frame>, Vec<Vec<RemappedPoint>>) = normalized
            .into_iter()
            .map(|face| (face.image, face.landmarks))
            .unzip();

        self.logger.metric(METRIC_FACES, boxes.len() as f64);
        self.logger
            .metric(METRIC_FACES_DROPPED, (detected_count - boxes.len()) as f64);
        Ok(PreprocessResult {
            annotated,
            boxes,
            landmarks,
            crops,
            remapped,
        })
    }

    fn record(&mut self, stage: &str, started: Instant) {
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        log::debug!("{stage} took {ms:.1}ms");
        self.logger.timing(stage, ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubDetector {
        boxes: Vec<DetectionBox>,
        seen: Arc<Mutex<Vec<Frame>>>,
    }

    impl StubDetector {
        fn new(boxes: Vec<DetectionBox>) -> Self {
            Self {
                boxes,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FaceDetector for StubDetector {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<Vec<DetectionBox>, Box<dyn std::error::Error>> {
            self.seen.lock().unwrap().push(frame.clone());
            Ok(self.boxes.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _: &Frame) -> Result<Vec<DetectionBox>, Box<dyn std::error::Error>> {
            Err("model exploded".into())
        }
    }

    /// Places a single landmark at the box center; boxes wider than
    /// `max_width` get no landmarks.
    struct CenterLocator {
        max_width: i32,
    }

    impl LandmarkLocator for CenterLocator {
        fn locate(
            &mut self,
            _frame: &Frame,
            face: &DetectionBox,
        ) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>> {
            if face.width() > self.max_width {
                return Ok(None);
            }
            let cx = (face.left + face.right) as f64 / 2.0;
            let cy = (face.top + face.bottom) as f64 / 2.0;
            Ok(Some(LandmarkSet::new(vec![(face.left as f64, face.top as f64), (cx, cy)])))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLogger {
        stages: Arc<Mutex<Vec<String>>>,
        metrics: Arc<Mutex<Vec<(String, f64)>>>,
    }

    impl PipelineLogger for RecordingLogger {
        fn progress(&mut self, _current: usize, _total: usize) {}
        fn timing(&mut self, stage: &str, _duration_ms: f64) {
            self.stages.lock().unwrap().push(stage.to_string());
        }
        fn metric(&mut self, name: &str, value: f64) {
            self.metrics.lock().unwrap().push((name.to_string(), value));
        }
        fn info(&mut self, _message: &str) {}
    }

    // --- Helpers ---

    fn make_image(w: u32, h: u32) -> Frame {
        let data = (0..h)
            .flat_map(|y| (0..w).flat_map(move |x| [(x % 256) as u8, (y % 256) as u8, 90]))
            .collect();
        Frame::new(data, w, h, 3)
    }

    fn use_case(detector: Box<dyn FaceDetector>) -> PreprocessImageUseCase {
        PreprocessImageUseCase::new(
            detector,
            Box::new(CenterLocator { max_width: 1000 }),
            PreprocessConfig::default(),
            Box::new(NullPipelineLogger),
        )
        .unwrap()
    }

    // --- Tests ---

    #[test]
    fn test_single_face_yields_one_of_each() {
        let mut uc = use_case(Box::new(StubDetector::new(vec![DetectionBox::new(
            10, 10, 110, 110,
        )])));

        let result = uc.execute(&make_image(200, 150)).unwrap();

        assert_eq!(result.boxes.len(), 1);
        assert_eq!(result.landmarks.len(), 1);
        assert_eq!(result.crops.len(), 1);
        assert_eq!(result.remapped.len(), 1);
        assert_eq!(result.face_count(), 1);
        assert_eq!(
            result.remapped[0],
            vec![RemappedPoint { x: 0, y: 0 }, RemappedPoint { x: 24, y: 24 }]
        );
        let crop = &result.crops[0];
        assert_eq!((crop.width(), crop.height(), crop.channels()), (48, 48, 1));
    }

    #[test]
    fn test_no_faces_is_empty_result() {
        let mut uc = use_case(Box::new(StubDetector::new(vec![])));
        let result = uc.execute(&make_image(64, 48)).unwrap();

        assert!(result.boxes.is_empty());
        assert!(result.landmarks.is_empty());
        assert!(result.crops.is_empty());
        assert!(result.remapped.is_empty());
        assert_eq!((result.annotated.width(), result.annotated.height()), (64, 48));
    }

    #[test]
    fn test_face_without_landmarks_is_dropped_everywhere() {
        let detector = StubDetector::new(vec![
            DetectionBox::new(0, 0, 40, 40),
            DetectionBox::new(50, 10, 150, 110), // too wide for the locator
        ]);
        let mut uc = PreprocessImageUseCase::new(
            Box::new(detector),
            Box::new(CenterLocator { max_width: 50 }),
            PreprocessConfig::default(),
            Box::new(NullPipelineLogger),
        )
        .unwrap();

        let result = uc.execute(&make_image(200, 150)).unwrap();
        assert_eq!(result.boxes, vec![DetectionBox::new(0, 0, 40, 40)]);
        assert_eq!(result.landmarks.len(), 1);
        assert_eq!(result.crops.len(), 1);
        assert_eq!(result.remapped.len(), 1);
    }

    #[test]
    fn test_degenerate_detection_is_skipped() {
        let mut uc = use_case(Box::new(StubDetector::new(vec![
            DetectionBox::new(30, 30, 30, 60),
            DetectionBox::new(20, 20, 60, 60),
        ])));
        let result = uc.execute(&make_image(100, 100)).unwrap();
        assert_eq!(result.boxes, vec![DetectionBox::new(20, 20, 60, 60)]);
    }

    #[test]
    fn test_target_size_from_config() {
        let config = PreprocessConfig {
            target_width: 64,
            target_height: 32,
            ..Default::default()
        };
        let mut uc = PreprocessImageUseCase::new(
            Box::new(StubDetector::new(vec![DetectionBox::new(0, 0, 80, 80)])),
            Box::new(CenterLocator { max_width: 1000 }),
            config,
            Box::new(NullPipelineLogger),
        )
        .unwrap();

        let result = uc.execute(&make_image(100, 100)).unwrap();
        assert_eq!((result.crops[0].width(), result.crops[0].height()), (64, 32));
        assert_eq!(result.remapped[0][1], RemappedPoint { x: 32, y: 16 });
    }

    #[test]
    fn test_detector_sees_blurred_image() {
        let mut image = Frame::new(vec![0u8; 11 * 11 * 3], 11, 11, 3);
        let center = (5 * 11 + 5) * 3;
        image.data_mut()[center..center + 3].fill(250);

        let detector = StubDetector::new(vec![]);
        let seen = detector.seen.clone();
        let mut uc = use_case(Box::new(detector));
        uc.execute(&image).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].data()[center], 10);
    }

    #[test]
    fn test_gray_input_is_accepted() {
        let image = Frame::new((0..100 * 100).map(|i| (i % 200) as u8).collect(), 100, 100, 1);
        let mut uc = use_case(Box::new(StubDetector::new(vec![DetectionBox::new(
            10, 10, 60, 60,
        )])));
        let result = uc.execute(&image).unwrap();
        assert_eq!(result.annotated.channels(), 3);
        assert_eq!(result.crops.len(), 1);
    }

    #[test]
    fn test_annotated_image_has_box_outline() {
        let mut uc = use_case(Box::new(StubDetector::new(vec![DetectionBox::new(
            10, 10, 110, 110,
        )])));
        let result = uc.execute(&make_image(200, 150)).unwrap();
        let a = result.annotated.as_ndarray();
        assert_eq!([a[[10, 50, 0]], a[[10, 50, 1]], a[[10, 50, 2]]], [0, 255, 0]);
    }

    #[test]
    fn test_all_stages_are_timed() {
        let logger = RecordingLogger::default();
        let stages = logger.stages.clone();
        let metrics = logger.metrics.clone();
        let mut uc = PreprocessImageUseCase::new(
            Box::new(StubDetector::new(vec![DetectionBox::new(0, 0, 40, 40)])),
            Box::new(CenterLocator { max_width: 1000 }),
            PreprocessConfig::default(),
            Box::new(logger),
        )
        .unwrap();

        uc.execute(&make_image(64, 64)).unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec!["denoise", "detect", "landmarks", "contrast", "normalize"]
        );
        assert!(metrics
            .lock()
            .unwrap()
            .contains(&(METRIC_FACES.to_string(), 1.0)));
    }

    #[test]
    fn test_dropped_faces_are_counted() {
        let logger = RecordingLogger::default();
        let metrics = logger.metrics.clone();
        let mut uc = PreprocessImageUseCase::new(
            Box::new(StubDetector::new(vec![
                DetectionBox::new(0, 0, 40, 40),
                DetectionBox::new(50, 10, 150, 110),
                DetectionBox::new(30, 30, 30, 60),
            ])),
            Box::new(CenterLocator { max_width: 50 }),
            PreprocessConfig::default(),
            Box::new(logger),
        )
        .unwrap();

        uc.execute(&make_image(200, 150)).unwrap();

        let metrics = metrics.lock().unwrap();
        assert!(metrics.contains(&(METRIC_FACES.to_string(), 1.0)));
        assert!(metrics.contains(&(METRIC_FACES_DROPPED.to_string(), 2.0)));
    }

    #[test]
    fn test_median_denoiser_removes_salt_before_detection() {
        let mut image = Frame::new(vec![60u8; 11 * 11 * 3], 11, 11, 3);
        let center = (5 * 11 + 5) * 3;
        image.data_mut()[center..center + 3].fill(255);

        let detector = StubDetector::new(vec![]);
        let seen = detector.seen.clone();
        let config = PreprocessConfig {
            denoise: Denoiser::Median,
            ..Default::default()
        };
        let mut uc = PreprocessImageUseCase::new(
            Box::new(detector),
            Box::new(CenterLocator { max_width: 1000 }),
            config,
            Box::new(NullPipelineLogger),
        )
        .unwrap();
        uc.execute(&image).unwrap();

        assert!(seen.lock().unwrap()[0].data().iter().all(|&v| v == 60));
    }

    #[test]
    fn test_global_equalization_produces_canonical_crops() {
        let config = PreprocessConfig {
            equalization: Equalization::Global,
            ..Default::default()
        };
        let mut uc = PreprocessImageUseCase::new(
            Box::new(StubDetector::new(vec![DetectionBox::new(10, 10, 110, 110)])),
            Box::new(CenterLocator { max_width: 1000 }),
            config,
            Box::new(NullPipelineLogger),
        )
        .unwrap();

        let result = uc.execute(&make_image(200, 150)).unwrap();
        assert_eq!((result.crops[0].width(), result.crops[0].height()), (48, 48));
        assert_eq!(result.remapped[0][1], RemappedPoint { x: 24, y: 24 });
    }

    #[test]
    fn test_detector_error_propagates() {
        let mut uc = use_case(Box::new(FailingDetector));
        let err = uc.execute(&make_image(32, 32)).unwrap_err();
        assert!(err.to_string().contains("model exploded"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PreprocessConfig {
            blur_kernel: 2,
            ..Default::default()
        };
        let result = PreprocessImageUseCase::new(
            Box::new(StubDetector::new(vec![])),
            Box::new(CenterLocator { max_width: 10 }),
            config,
            Box::new(NullPipelineLogger),
        );
        assert!(result.is_err());
    }
}
