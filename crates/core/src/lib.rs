pub mod detection;
pub mod pipeline;
pub mod preprocessing;
pub mod shared;
