pub mod transform;
pub mod upload;
