pub mod camera;
pub mod depth;
pub mod error;
pub mod grid;
pub mod integrate;
pub mod mc;
pub mod raycast;
pub mod serialize;
pub mod voxel;

pub use camera::Camera;
pub use depth::DepthImage;
pub use error::{Error, Result};
pub use grid::{Dims, VoxelGrid};
pub use mc::Triangle;
pub use voxel::Voxel;
