pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const FACE_MESH_MODEL_NAME: &str = "face_mesh.onnx";

/// Side length of the canonical face crop fed to the expression model.
pub const CANONICAL_SIZE: u32 = 48;

pub const DEFAULT_BLUR_KERNEL: usize = 5;
/// Largest accepted denoising window side.
pub const MAX_BLUR_KERNEL: usize = 255;
pub const DEFAULT_CLAHE_CLIP_LIMIT: f64 = 2.0;
pub const DEFAULT_CLAHE_GRID: usize = 8;

/// Face detection confidence used when the caller does not override it.
pub const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.2;

/// Landmark count produced by the face-mesh model.
pub const FACE_MESH_POINTS: usize = 468;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
