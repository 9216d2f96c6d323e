//! voxel_gpu - GPU-resident voxel terrain pipeline
//!
//! Generates, compresses, meshes and draws 64³ voxel regions entirely in
//! device memory. Every stage is a compute kernel addressed through one
//! growable buffer-device-address heap and ordered by a render graph that
//! inserts the minimal set of barriers.
//!
//! # Features
//!
//! - **GPU heap**: bump allocation, growth with copy-forward, typed offsets
//! - **Staging belt**: host uploads recorded as copies before the graph
//! - **Render graph**: declared resource usages, automatic barrier batches,
//!   conditional passes, insertion or topological order
//! - **Pipeline cache**: compiled shaders keyed by source and specialization
//! - **Voxel kernels**: fBm noise, terrain, lock-free palette compression,
//!   occupancy bitmaps, simple and binary greedy meshing, indirect draw
//! - **Host device**: an in-process backend that runs the kernels on rayon
//!
//! # Example
//!
//! ```ignore
//! use glam::IVec3;
//! use voxel_gpu::{RendererConfig, VoxelRenderer};
//!
//! let mut renderer = VoxelRenderer::host(RendererConfig::default())?;
//! let report = renderer.generate_region(IVec3::ZERO)?;
//!
//! println!("{} quads, {} barriers", report.quads, report.barriers);
//! ```

mod flags;

pub mod config;
pub mod constants;
pub mod error;

// Device abstraction and the host backend
pub mod device;

// Memory management
pub mod heap;
pub mod staging;

// Barrier-tracking render graph
pub mod graph;

// Shader compilation and pipeline cache
pub mod shader;

// Voxel kernels and heap wire format
pub mod voxel;

// Region pipeline orchestration
pub mod pipeline;
pub use pipeline::{ChunkSnapshot, RegionReport, VoxelRenderer};

// Engine-agnostic metrics
pub mod metrics;

// Re-export commonly used items
pub use config::{
  MesherKind, NoiseSettings, PackWord, RendererConfig, TerrainMode, TerrainSettings,
};
pub use error::{ConfigError, DeviceError, GraphError, HeapError, PipelineError, RendererError};
pub use graph::ExecutionOrder;
pub use heap::{GpuHeap, HeapDesc, HeapOffset, HeapRange};
pub use staging::StagingBelt;
