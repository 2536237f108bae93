use std::collections::BTreeMap;
use std::time::Instant;

/// Faces kept for one image (detections that got landmarks).
pub const METRIC_FACES: &str = "faces";
/// Detections dropped for one image (degenerate box or no landmarks).
pub const METRIC_FACES_DROPPED: &str = "faces_dropped";
/// Fraction of a face's landmarks lying inside its detection box.
pub const METRIC_LANDMARK_COVERAGE: &str = "landmark_coverage";

/// Observer for preprocessing events, injected into the use case.
pub trait PipelineLogger: Send {
    /// Called once per finished image of a batch.
    fn progress(&mut self, current: usize, total: usize);

    /// Duration of one pipeline stage for one image.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// One sample of a named metric.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-batch report. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and range of a sample stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl SampleStats {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Batch logger for the CLI.
///
/// Keeps per-stage timing stats and per-face metrics, and prints a summary
/// with face counts and landmark coverage once the batch is done.
pub struct StdoutPipelineLogger {
    started: Instant,
    images: usize,
    stages: BTreeMap<String, SampleStats>,
    metrics: BTreeMap<String, SampleStats>,
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutPipelineLogger {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            images: 0,
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn stage(&self, name: &str) -> Option<&SampleStats> {
        self.stages.get(name)
    }

    pub fn metric_stats(&self, name: &str) -> Option<&SampleStats> {
        self.metrics.get(name)
    }

    /// Formatted batch report, or `None` before anything was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Preprocessed {} image(s) in {elapsed:.1}s",
            self.images
        )];

        let total = |name: &str| self.metrics.get(name).map_or(0.0, |s| s.sum);
        lines.push(format!(
            "  faces: {:.0} kept, {:.0} dropped",
            total(METRIC_FACES),
            total(METRIC_FACES_DROPPED)
        ));
        if let Some(cov) = self.metrics.get(METRIC_LANDMARK_COVERAGE) {
            lines.push(format!(
                "  landmark coverage: mean {:.2}, min {:.2} over {} face(s)",
                cov.mean(),
                cov.min,
                cov.count
            ));
        }

        let face_metrics = [METRIC_FACES, METRIC_FACES_DROPPED, METRIC_LANDMARK_COVERAGE];
        for (name, s) in &self.metrics {
            if face_metrics.contains(&name.as_str()) {
                continue;
            }
            lines.push(format!(
                "  {name}: mean {:.2}, min {:.2}, max {:.2}",
                s.mean(),
                s.min,
                s.max
            ));
        }

        for (stage, s) in &self.stages {
            lines.push(format!(
                "  {stage:10} avg {:7.1}ms  max {:7.1}ms",
                s.mean(),
                s.max
            ));
        }

        Some(lines.join("\n"))
    }
}

fn record(map: &mut BTreeMap<String, SampleStats>, name: &str, value: f64) {
    match map.get_mut(name) {
        Some(stats) => stats.add(value),
        None => {
            map.insert(name.to_string(), SampleStats::new(value));
        }
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.images = self.images.max(current);
        log::info!("Image {current}/{total} done");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.stages, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stage_stats_track_mean_and_max() {
        let mut logger = StdoutPipelineLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);

        let s = logger.stage("detect").unwrap();
        assert_eq!(s.count, 2);
        assert_relative_eq!(s.mean(), 30.0);
        assert_relative_eq!(s.max, 40.0);
        assert!(logger.stage("contrast").is_none());
    }

    #[test]
    fn test_summary_reports_kept_and_dropped_faces() {
        let mut logger = StdoutPipelineLogger::new();
        logger.metric(METRIC_FACES, 2.0);
        logger.metric(METRIC_FACES_DROPPED, 1.0);
        logger.metric(METRIC_FACES, 1.0);
        logger.metric(METRIC_FACES_DROPPED, 0.0);
        logger.progress(2, 2);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Preprocessed 2 image(s)"));
        assert!(summary.contains("faces: 3 kept, 1 dropped"));
        assert_eq!(logger.metric_stats(METRIC_FACES).unwrap().count, 2);
    }

    #[test]
    fn test_summary_reports_worst_landmark_coverage() {
        let mut logger = StdoutPipelineLogger::new();
        logger.metric(METRIC_LANDMARK_COVERAGE, 1.0);
        logger.metric(METRIC_LANDMARK_COVERAGE, 0.5);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("landmark coverage: mean 0.75, min 0.50 over 2 face(s)"));
    }

    #[test]
    fn test_summary_without_faces_still_lists_zero_counts() {
        let mut logger = StdoutPipelineLogger::new();
        logger.timing("blur", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("faces: 0 kept, 0 dropped"));
        assert!(!summary.contains("landmark coverage"));
        assert!(summary.contains("blur"));
    }

    #[test]
    fn test_other_metrics_listed_once() {
        let mut logger = StdoutPipelineLogger::new();
        logger.metric("score", 0.9);
        logger.metric(METRIC_FACES, 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("score: mean 0.90, min 0.90, max 0.90"));
        assert!(!summary.contains("faces: mean"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 1);
        logger.timing("detect", 1.0);
        logger.metric(METRIC_FACES, 1.0);
        logger.info("ignored");
        logger.summary();
    }
}
