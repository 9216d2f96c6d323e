//! Error types for each subsystem.
//!
//! Allocation failures are never retried. Capacity overflow in kernels is
//! not an error (quads past capacity are dropped, palette overflow collapses
//! to index 0) and never shows up here.

use thiserror::Error;

use crate::device::{BufferHandle, HazardKind, MemoryHandle, PipelineHandle};

/// Failures reported by a [`GpuDevice`](crate::device::GpuDevice) or its queue.
#[derive(Debug, Error)]
pub enum DeviceError {
  #[error("buffer creation failed for {size} bytes: {reason}")]
  BufferCreation { size: u64, reason: &'static str },

  #[error("out of device memory: requested {requested} bytes, {available} available")]
  OutOfDeviceMemory { requested: u64, available: u64 },

  #[error("memory type index {0} does not exist")]
  InvalidMemoryType(u32),

  #[error("unknown buffer {0:?}")]
  UnknownBuffer(BufferHandle),

  #[error("unknown memory allocation {0:?}")]
  UnknownMemory(MemoryHandle),

  #[error("unknown pipeline {0:?}")]
  UnknownPipeline(PipelineHandle),

  #[error("buffer {0:?} has no memory bound")]
  NotBound(BufferHandle),

  #[error("buffer {0:?} was not created with device-address usage")]
  NoDeviceAddress(BufferHandle),

  #[error("access of {len} bytes at offset {offset} exceeds buffer size {size}")]
  OutOfBounds { offset: u64, len: u64, size: u64 },

  #[error("dispatch recorded without a bound compute pipeline")]
  NoPipelineBound,

  #[error("memory fault at device address {address:#x} in pipeline `{pipeline}`")]
  MemoryFault { address: u64, pipeline: String },

  /// Only reported when hazard validation is enabled on the host device.
  #[error("{kind} hazard in `{command}` on {buffer:?} at byte {offset}")]
  Hazard {
    kind: HazardKind,
    command: String,
    buffer: BufferHandle,
    offset: u64,
  },
}

/// GPU heap failures.
#[derive(Debug, Error)]
pub enum HeapError {
  /// Buffer or memory allocation failed, or no memory type matched the
  /// requested properties (`source` is `None`).
  #[error("heap allocation of {size} bytes failed")]
  AllocationFailed {
    size: u64,
    #[source]
    source: Option<DeviceError>,
  },

  #[error("heap cannot grow while {0} submission(s) reference it")]
  InFlight(usize),

  #[error("heap out of capacity: {requested} bytes requested, {available} available")]
  OutOfCapacity { requested: u64, available: u64 },

  #[error("write of {len} bytes at offset {offset} exceeds heap capacity {capacity}")]
  WriteOutOfBounds { offset: u64, len: u64, capacity: u64 },

  #[error(transparent)]
  Device(#[from] DeviceError),
}

/// Render graph failures. Execution stops at the first one; states already
/// committed for earlier passes are kept.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("pass `{pass}` references unknown resource {resource}")]
  UnknownResource { pass: String, resource: u32 },

  #[error("pass `{pass}` requests conflicting layouts for image `{resource}`")]
  ConflictingLayouts { pass: String, resource: String },

  #[error("pass `{pass}` failed: {message}")]
  PassFailed { pass: String, message: String },

  #[error(transparent)]
  Device(#[from] DeviceError),
}

/// Shader compilation and pipeline creation failures.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("shader `{name}` failed to compile: {message}")]
  Compilation { name: String, message: String },

  #[error("shader `{name}` is a {actual:?} shader, expected {expected:?}")]
  WrongStage {
    name: String,
    expected: crate::shader::ShaderStage,
    actual: crate::shader::ShaderStage,
  },

  #[error("pipeline creation failed for `{name}`: {message}")]
  Creation { name: String, message: String },
}

/// Renderer configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse renderer config: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("invalid renderer config: {0}")]
  Invalid(String),
}

/// Top-level error of [`VoxelRenderer`](crate::pipeline::VoxelRenderer).
#[derive(Debug, Error)]
pub enum RendererError {
  #[error(transparent)]
  Heap(#[from] HeapError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  #[error(transparent)]
  Device(#[from] DeviceError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("no region has been generated yet")]
  NoRegion,
}
