//! Voxel Region Pipeline
//!
//! Runs the voxel kernels for one 64³ region on any [`GpuDevice`] through a
//! barrier-tracking render graph.
//!
//! ```text
//! ┌───────┐   ┌─────────┐   ┌─────────┐   ┌────────┐   ┌──────┐   ┌──────────┐   ┌──────┐
//! │ Noise ├──►│ Terrain ├──►│ Palette ├──►│ Bitmap ├──►│ Mesh ├──►│ Finalize ├──►│ Draw │
//! └───────┘   └─────────┘   └─────────┘   └────────┘   └──────┘   └──────────┘   └──────┘
//!  f32 grid    raw IDs      palette +      occupancy    quads      indirect       6 verts
//!                           packed idx     columns                 args           per quad
//! ```
//!
//! # Parts
//!
//! - [`RegionLayout`]: where every structure of the region lives in the heap
//! - [`passes`]: resources and passes of the region graph
//! - [`VoxelRenderer`]: heap, staging, pipeline cache and submission
//!
//! [`GpuDevice`]: crate::device::GpuDevice

pub mod types;

pub mod passes;
pub mod region;
pub mod renderer;

// Test utilities
#[cfg(test)]
pub mod test_utils;


// Re-exports
pub use passes::{build_region_graph, frame_for, StagePipelines, CONDITION_GREEDY};
pub use region::RegionLayout;
pub use renderer::VoxelRenderer;
pub use types::{ChunkSnapshot, RegionReport};
