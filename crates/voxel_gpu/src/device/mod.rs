//! Narrow interface to the graphics API.
//!
//! Everything above this module (heap, staging, graph, renderer) talks to
//! the GPU through [`GpuDevice`] and [`CommandContext`] only.
//!
//! ```text
//! ┌──────────────┐  create/bind/address   ┌──────────────────────┐
//! │ GpuHeap      │ ─────────────────────► │ GpuDevice            │
//! │ StagingBelt  │                        │   memory_types()     │
//! └──────────────┘                        │   begin_commands()   │
//! ┌──────────────┐  copy/fill/barrier/    │   submit()           │
//! │ RenderGraph  │  dispatch/draw         └──────────┬───────────┘
//! │ passes       │ ─────────────────────►  CommandContext
//! └──────────────┘
//! ```
//!
//! [`HostDevice`] is the in-process backend: device memory is atomic
//! 64-bit words and compute dispatches run kernels on the rayon pool.

mod dispatch;
mod hazard;
mod host;
mod memory;

pub(crate) use dispatch::run_dispatch;
pub use dispatch::{ComputeKernel, GlobalMemory, Invocation, VertexProgram, Workgroup};
pub use hazard::{HazardKind, HAZARD_WORD};
pub use host::{HostCommand, HostCommandBuffer, HostDevice, HostDeviceConfig};
pub use memory::MemoryBlock;

use crate::error::DeviceError;
use crate::flags::bitmask;
use crate::graph::BarrierBatch;

bitmask! {
  /// How a buffer may be used.
  pub struct BufferUsage {
    const TRANSFER_SRC = 1 << 0;
    const TRANSFER_DST = 1 << 1;
    const STORAGE = 1 << 2;
    const INDIRECT = 1 << 3;
    const DEVICE_ADDRESS = 1 << 4;
  }
}

bitmask! {
  /// Memory heap properties.
  pub struct MemoryProperties {
    const DEVICE_LOCAL = 1 << 0;
    const HOST_VISIBLE = 1 << 1;
    const HOST_COHERENT = 1 << 2;
  }
}

/// Opaque buffer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Opaque device memory handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryHandle(pub u32);

/// Opaque pipeline handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineHandle(pub u32);

/// Opaque image handle. Images only appear as render graph resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryType {
  pub properties: MemoryProperties,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequirements {
  pub size: u64,
  pub alignment: u64,
  /// Bit `i` set when memory type `i` is acceptable.
  pub type_bits: u32,
}

/// One region of a buffer-to-buffer copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferCopy {
  pub src_offset: u64,
  pub dst_offset: u64,
  pub size: u64,
}

/// Counters from one completed submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitReport {
  pub copies: u32,
  pub fills: u32,
  pub barrier_batches: u32,
  pub barriers: u32,
  pub dispatches: u32,
  pub workgroups: u64,
  pub draws: u32,
  pub vertices: u64,
}

/// Pick the first memory type allowed by `type_bits` that has every bit of
/// `required`.
pub fn find_memory_type(
  types: &[MemoryType],
  type_bits: u32,
  required: MemoryProperties,
) -> Option<u32> {
  types
    .iter()
    .enumerate()
    .find(|(i, ty)| type_bits & (1 << i) != 0 && ty.properties.contains(required))
    .map(|(i, _)| i as u32)
}

/// Device-level object management and queue submission.
///
/// Submission completes before `submit` returns; a returned report means the
/// fence has signalled.
pub trait GpuDevice: Send + Sync {
  type Commands: CommandContext;

  fn create_buffer(&self, size: u64, usage: BufferUsage) -> Result<BufferHandle, DeviceError>;
  fn memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements, DeviceError>;
  fn memory_types(&self) -> &[MemoryType];
  fn allocate_memory(&self, size: u64, type_index: u32) -> Result<MemoryHandle, DeviceError>;
  fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle)
    -> Result<(), DeviceError>;
  fn buffer_device_address(&self, buffer: BufferHandle) -> Result<u64, DeviceError>;

  /// Write through a host mapping of the buffer's memory.
  fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8])
    -> Result<(), DeviceError>;

  /// Read back through a host mapping of the buffer's memory.
  fn read_buffer(&self, buffer: BufferHandle, offset: u64, out: &mut [u8])
    -> Result<(), DeviceError>;

  fn destroy_buffer(&self, buffer: BufferHandle);
  fn free_memory(&self, memory: MemoryHandle);

  fn begin_commands(&self) -> Self::Commands;
  fn submit(&self, commands: Self::Commands) -> Result<SubmitReport, DeviceError>;
}

/// Command recording. Recording itself never fails; errors surface at submit.
pub trait CommandContext {
  fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]);
  /// Fill `size` bytes with a repeated `u32`. Offset and size are multiples of 4.
  fn fill_buffer(&mut self, dst: BufferHandle, offset: u64, size: u64, value: u32);
  fn pipeline_barrier(&mut self, batch: &BarrierBatch);
  fn bind_pipeline(&mut self, pipeline: PipelineHandle);
  fn push_constants(&mut self, data: &[u8]);
  fn dispatch(&mut self, x: u32, y: u32, z: u32);
  /// Draw with `{vertex_count, instance_count, first_vertex, first_instance}`
  /// read from `buffer` at `offset` when the command executes.
  fn draw_indirect(&mut self, buffer: BufferHandle, offset: u64);
}
