pub mod pipeline_logger;
pub mod preprocess_image_use_case;
