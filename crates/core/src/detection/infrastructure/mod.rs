pub mod execution_provider;
pub mod math;
pub mod onnx_blazeface_detector;
pub mod onnx_face_mesh_locator;
