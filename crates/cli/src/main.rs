use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde::Serialize;

use faceprep_core::detection::domain::face_detector::FaceDetector;
use faceprep_core::detection::domain::landmark_locator::LandmarkLocator;
use faceprep_core::detection::domain::landmark_set::LandmarkSet;
use faceprep_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use faceprep_core::detection::infrastructure::onnx_face_mesh_locator::{
    OnnxFaceMeshLocator, DEFAULT_PRESENCE_THRESHOLD,
};
use faceprep_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use faceprep_core::pipeline::preprocess_image_use_case::{
    PreprocessImageUseCase, PreprocessResult,
};
use faceprep_core::preprocessing::face_normalizer::RemappedPoint;
use faceprep_core::preprocessing::noise::add_salt_noise;
use faceprep_core::shared::constants::{
    BLAZEFACE_MODEL_NAME, FACE_MESH_MODEL_NAME, IMAGE_EXTENSIONS,
};
use faceprep_core::shared::detection_box::DetectionBox;
use faceprep_core::shared::frame::Frame;
use faceprep_core::shared::model_resolver;
use faceprep_core::shared::preprocess_config::{Denoiser, Equalization, PreprocessConfig};

/// Face crops and landmarks for expression-recognition datasets.
#[derive(Parser)]
#[command(name = "faceprep")]
struct Cli {
    /// Input image files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory; one subdirectory is written per input image.
    #[arg(short, long, default_value = "faceprep-out")]
    output: PathBuf,

    /// JSON file with preprocessing settings. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Denoising filter: mean or median.
    #[arg(long)]
    denoise: Option<String>,

    /// Denoising kernel size (odd, at most 255).
    #[arg(long)]
    blur_kernel: Option<usize>,

    /// Histogram equalization: adaptive (CLAHE) or global.
    #[arg(long)]
    equalize: Option<String>,

    /// CLAHE clip limit.
    #[arg(long)]
    clahe_clip_limit: Option<f64>,

    /// CLAHE tile grid size (NxN).
    #[arg(long)]
    clahe_grid: Option<usize>,

    /// Side length of the square face crops.
    #[arg(long)]
    target_size: Option<u32>,

    /// Face detection model file or name.
    #[arg(long, default_value = BLAZEFACE_MODEL_NAME)]
    detector_model: String,

    /// Face mesh model file or name.
    #[arg(long, default_value = FACE_MESH_MODEL_NAME)]
    landmark_model: String,

    /// Directory searched for models not found in the cache.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Download URL for the face detection model.
    #[arg(long)]
    detector_url: Option<String>,

    /// Download URL for the face mesh model.
    #[arg(long)]
    landmark_url: Option<String>,

    /// Add this many salt-noise pixels before preprocessing.
    #[arg(long)]
    noise: Option<usize>,

    /// Seed for --noise.
    #[arg(long, default_value = "0")]
    seed: u64,
}

/// Per-image record written to `landmarks.json`.
#[derive(Serialize)]
struct LandmarkReport<'a> {
    boxes: &'a [DetectionBox],
    landmarks: &'a [LandmarkSet],
    remapped: &'a [Vec<RemappedPoint>],
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let detector = build_detector(&cli, config.confidence)?;
    let locator = build_locator(&cli)?;
    let logger: Box<dyn PipelineLogger> = Box::new(StdoutPipelineLogger::new());
    let mut use_case = PreprocessImageUseCase::new(detector, locator, config, logger)?;

    let total = cli.inputs.len();
    let dir_names = output_dir_names(&cli.inputs);
    for (i, (input, dir_name)) in cli.inputs.iter().zip(&dir_names).enumerate() {
        let mut frame = read_frame(input)?;
        if let Some(count) = cli.noise {
            add_salt_noise(&mut frame, count, cli.seed);
        }

        let result = use_case.execute(&frame)?;
        let dest = cli.output.join(dir_name);
        write_result(&dest, &result)?;
        log::info!(
            "{}: {} face(s) written to {}",
            input.display(),
            result.face_count(),
            dest.display()
        );
        use_case.logger_mut().progress(i + 1, total);
    }

    use_case.logger().summary();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<PreprocessConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PreprocessConfig::load(path)?,
        None => PreprocessConfig::default(),
    };
    if let Some(v) = cli.confidence {
        config.confidence = v;
    }
    if let Some(v) = &cli.denoise {
        config.denoise = v.parse::<Denoiser>()?;
    }
    if let Some(v) = &cli.equalize {
        config.equalization = v.parse::<Equalization>()?;
    }
    if let Some(v) = cli.blur_kernel {
        config.blur_kernel = v;
    }
    if let Some(v) = cli.clahe_clip_limit {
        config.clahe_clip_limit = v;
    }
    if let Some(v) = cli.clahe_grid {
        config.clahe_grid = v;
    }
    if let Some(v) = cli.target_size {
        config.target_width = v;
        config.target_height = v;
    }
    config.validate()?;
    Ok(config)
}

fn build_detector(
    cli: &Cli,
    confidence: f64,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {}", cli.detector_model);
    let model_path = model_resolver::resolve(
        &cli.detector_model,
        cli.detector_url.as_deref(),
        cli.models_dir.as_deref(),
        Some(Box::new(|d, t| download_progress("face detection", d, t))),
    )?;
    Ok(Box::new(OnnxBlazefaceDetector::new(&model_path, confidence)?))
}

fn build_locator(cli: &Cli) -> Result<Box<dyn LandmarkLocator>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {}", cli.landmark_model);
    let model_path = model_resolver::resolve(
        &cli.landmark_model,
        cli.landmark_url.as_deref(),
        cli.models_dir.as_deref(),
        Some(Box::new(|d, t| download_progress("face mesh", d, t))),
    )?;
    Ok(Box::new(OnnxFaceMeshLocator::new(
        &model_path,
        DEFAULT_PRESENCE_THRESHOLD,
    )?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        if !is_image(input) {
            return Err(format!(
                "Unsupported input {}; expected one of: {}",
                input.display(),
                IMAGE_EXTENSIONS.join(", ")
            )
            .into());
        }
    }
    if cli.output.is_file() {
        return Err(format!("Output must be a directory: {}", cli.output.display()).into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn output_stem(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string()
}

/// One output subdirectory name per input, unique within the batch.
///
/// Inputs are named by file stem. Stems shared by several inputs get the
/// extension appended, and any name still taken gets a `_<n>` suffix.
fn output_dir_names(inputs: &[PathBuf]) -> Vec<String> {
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for input in inputs {
        *stem_counts.entry(output_stem(input)).or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = output_stem(input);
            let base = match input.extension().and_then(|e| e.to_str()) {
                Some(ext) if stem_counts[&stem] > 1 => format!("{stem}_{ext}"),
                _ => stem,
            };
            let mut name = base.clone();
            let mut n = 2;
            while taken.contains(&name) {
                name = format!("{base}_{n}");
                n += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn read_frame(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)?;
    let frame = match img.color().channel_count() {
        1 | 2 => Frame::from_gray_image(img.to_luma8()),
        _ => Frame::from_rgb_image(img.to_rgb8()),
    };
    Ok(frame)
}

fn write_result(dir: &Path, result: &PreprocessResult) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    result.annotated.to_rgb_image()?.save(dir.join("annotated.png"))?;
    for (n, crop) in result.crops.iter().enumerate() {
        crop.to_gray_image()?.save(dir.join(format!("face_{n}.png")))?;
    }

    let report = LandmarkReport {
        boxes: &result.boxes,
        landmarks: &result.landmarks,
        remapped: &result.remapped,
    };
    fs::write(
        dir.join("landmarks.json"),
        serde_json::to_string_pretty(&report)?,
    )?;
    Ok(())
}

fn download_progress(what: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {what} model... {pct}%");
    } else {
        eprint!("\rDownloading {what} model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("a/face.JPG")));
        assert!(is_image(Path::new("face.png")));
        assert!(!is_image(Path::new("clip.mp4")));
        assert!(!is_image(Path::new("noext")));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"blur_kernel": 3, "clahe_grid": 4}"#).unwrap();

        let cli = Cli::parse_from([
            "faceprep",
            "in.png",
            "--config",
            path.to_str().unwrap(),
            "--clahe-grid",
            "2",
            "--target-size",
            "64",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.blur_kernel, 3);
        assert_eq!(config.clahe_grid, 2);
        assert_eq!(config.target_size(), (64, 64));
    }

    #[test]
    fn test_filter_flags_select_denoiser_and_equalization() {
        let cli = Cli::parse_from([
            "faceprep",
            "in.png",
            "--denoise",
            "median",
            "--equalize",
            "global",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.denoise, Denoiser::Median);
        assert_eq!(config.equalization, Equalization::Global);
    }

    #[test]
    fn test_unknown_denoiser_rejected() {
        let cli = Cli::parse_from(["faceprep", "in.png", "--denoise", "gaussian"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_oversized_kernel_rejected() {
        let cli = Cli::parse_from(["faceprep", "in.png", "--blur-kernel", "4107"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_output_dirs_unique_for_shared_stems() {
        let inputs = [
            PathBuf::from("a/face.jpg"),
            PathBuf::from("b/face.png"),
            PathBuf::from("c/other.png"),
        ];
        assert_eq!(output_dir_names(&inputs), vec!["face_jpg", "face_png", "other"]);
    }

    #[test]
    fn test_output_dirs_unique_for_same_file_name() {
        let inputs = [
            PathBuf::from("a/face.png"),
            PathBuf::from("b/face.png"),
            PathBuf::from("face_png.jpg"),
        ];
        let names = output_dir_names(&inputs);
        assert_eq!(names, vec!["face_png", "face_png_2", "face_png_3"]);
    }

    #[test]
    fn test_output_dirs_skip_names_taken_by_suffixing() {
        let inputs = [
            PathBuf::from("a/face.png"),
            PathBuf::from("b/face.png"),
            PathBuf::from("face_png_2.jpg"),
        ];
        let names = output_dir_names(&inputs);
        assert_eq!(names, vec!["face_png", "face_png_2", "face_png_2_2"]);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::parse_from(["faceprep", "in.png", "--blur-kernel", "4"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_write_result_layout() {
        let dir = tempfile::tempdir().unwrap();
        let result = PreprocessResult {
            annotated: Frame::new(vec![0; 4 * 4 * 3], 4, 4, 3),
            boxes: vec![DetectionBox::new(0, 0, 4, 4)],
            landmarks: vec![LandmarkSet::new(vec![(2.0, 2.0)])],
            crops: vec![Frame::new(vec![0; 48 * 48], 48, 48, 1)],
            remapped: vec![vec![RemappedPoint { x: 24, y: 24 }]],
        };

        write_result(dir.path(), &result).unwrap();

        assert!(dir.path().join("annotated.png").is_file());
        assert!(dir.path().join("face_0.png").is_file());
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("landmarks.json")).unwrap())
                .unwrap();
        assert_eq!(json["remapped"][0][0]["x"], 24);
        assert_eq!(json["boxes"][0]["right"], 4);
    }

    #[test]
    fn test_read_frame_keeps_gray_single_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.png");
        image::GrayImage::from_pixel(5, 3, image::Luma([7])).save(&path).unwrap();

        let frame = read_frame(&path).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (5, 3, 1));
    }
}
