pub mod constants;
pub mod detection_box;
pub mod error;
pub mod frame;
pub mod model_resolver;
pub mod preprocess_config;
