//! In-process GPU backend.
//!
//! Buffers get unique device-address ranges that are never reused, so a
//! reallocated buffer always reports a new address. Command buffers are
//! recorded as a list and executed in order by [`HostDevice::submit`],
//! which returns after the last command completes.
//!
//! With [`HostDeviceConfig::validate_hazards`] set, submission also checks
//! that every command is ordered behind earlier writes to the memory it
//! touches by a covering barrier (see the `hazard` module).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use glam::Vec3;
use rayon::prelude::*;

use super::dispatch::{run_dispatch, ComputeKernel, GlobalMemory, VertexProgram};
use super::hazard::{word_range, CommandAccess, HazardTracker};
use super::memory::MemoryBlock;
use super::{
  BufferCopy, BufferHandle, BufferUsage, CommandContext, GpuDevice, MemoryHandle,
  MemoryProperties, MemoryRequirements, MemoryType, PipelineHandle, SubmitReport,
};
use crate::error::{DeviceError, PipelineError};
use crate::graph::{BarrierBatch, StageFlags};
use crate::shader::{KernelLibrary, PipelineFactory, ShaderModule, Specialization};

/// First device address handed out.
const ADDRESS_BASE: u64 = 0x1_0000_0000;

/// Granularity of device-address reservations.
const ADDRESS_GRANULE: u64 = 1 << 16;

#[derive(Clone, Debug)]
pub struct HostDeviceConfig {
  /// Total bytes of device memory that may be allocated at once.
  pub memory_limit: u64,
  /// Alignment and size granularity reported in memory requirements.
  pub min_alignment: u64,
  /// Fail submissions that touch memory written by an earlier command
  /// without a covering barrier in between. Every shader access is logged.
  pub validate_hazards: bool,
}

impl Default for HostDeviceConfig {
  fn default() -> Self {
    Self {
      memory_limit: 1 << 30,
      min_alignment: 256,
      validate_hazards: false,
    }
  }
}

impl HostDeviceConfig {
  pub fn with_memory_limit(mut self, limit: u64) -> Self {
    self.memory_limit = limit;
    self
  }

  pub fn with_hazard_validation(mut self, enabled: bool) -> Self {
    self.validate_hazards = enabled;
    self
  }
}

struct HostBuffer {
  size: u64,
  usage: BufferUsage,
  address: u64,
  memory: Option<Arc<MemoryBlock>>,
}

#[derive(Clone)]
enum HostPipeline {
  Compute(Arc<dyn ComputeKernel>),
  Graphics(Arc<dyn VertexProgram>),
}

#[derive(Default)]
struct HostState {
  buffers: HashMap<BufferHandle, HostBuffer>,
  memories: HashMap<MemoryHandle, Arc<MemoryBlock>>,
  pipelines: HashMap<PipelineHandle, HostPipeline>,
  next_id: u32,
  next_address: u64,
  allocated: u64,
}

impl HostState {
  fn next_id(&mut self) -> u32 {
    self.next_id += 1;
    self.next_id
  }

  fn bound(&self, buffer: BufferHandle) -> Result<(&HostBuffer, Arc<MemoryBlock>), DeviceError> {
    let buf = self
      .buffers
      .get(&buffer)
      .ok_or(DeviceError::UnknownBuffer(buffer))?;
    let memory = buf.memory.clone().ok_or(DeviceError::NotBound(buffer))?;
    Ok((buf, memory))
  }
}

fn check_range(offset: u64, len: u64, size: u64) -> Result<(), DeviceError> {
  match offset.checked_add(len) {
    Some(end) if end <= size => Ok(()),
    _ => Err(DeviceError::OutOfBounds { offset, len, size }),
  }
}

/// Recorded host command.
#[derive(Clone, Debug)]
pub enum HostCommand {
  Copy {
    src: BufferHandle,
    dst: BufferHandle,
    regions: Vec<BufferCopy>,
  },
  Fill {
    dst: BufferHandle,
    offset: u64,
    size: u64,
    value: u32,
  },
  Barrier(BarrierBatch),
  BindPipeline(PipelineHandle),
  PushConstants(Vec<u8>),
  Dispatch([u32; 3]),
  DrawIndirect {
    buffer: BufferHandle,
    offset: u64,
  },
}

#[derive(Default, Debug)]
pub struct HostCommandBuffer {
  commands: Vec<HostCommand>,
}

impl HostCommandBuffer {
  pub fn commands(&self) -> &[HostCommand] {
    &self.commands
  }

  pub fn len(&self) -> usize {
    self.commands.len()
  }

  pub fn is_empty(&self) -> bool {
    self.commands.is_empty()
  }
}

impl CommandContext for HostCommandBuffer {
  fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
    self.commands.push(HostCommand::Copy {
      src,
      dst,
      regions: regions.to_vec(),
    });
  }

  fn fill_buffer(&mut self, dst: BufferHandle, offset: u64, size: u64, value: u32) {
    self.commands.push(HostCommand::Fill {
      dst,
      offset,
      size,
      value,
    });
  }

  fn pipeline_barrier(&mut self, batch: &BarrierBatch) {
    self.commands.push(HostCommand::Barrier(batch.clone()));
  }

  fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
    self.commands.push(HostCommand::BindPipeline(pipeline));
  }

  fn push_constants(&mut self, data: &[u8]) {
    self.commands.push(HostCommand::PushConstants(data.to_vec()));
  }

  fn dispatch(&mut self, x: u32, y: u32, z: u32) {
    self.commands.push(HostCommand::Dispatch([x, y, z]));
  }

  fn draw_indirect(&mut self, buffer: BufferHandle, offset: u64) {
    self.commands.push(HostCommand::DrawIndirect { buffer, offset });
  }
}

/// CPU device with atomic word memory and rayon-backed dispatch.
pub struct HostDevice {
  config: HostDeviceConfig,
  memory_types: Vec<MemoryType>,
  library: Arc<KernelLibrary>,
  state: Mutex<HostState>,
  last_draw_bounds: Mutex<Option<(Vec3, Vec3)>>,
}

impl HostDevice {
  pub fn new(config: HostDeviceConfig, library: Arc<KernelLibrary>) -> Self {
    let memory_types = vec![
      MemoryType {
        properties: MemoryProperties::DEVICE_LOCAL,
      },
      MemoryType {
        properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
      },
      MemoryType {
        properties: MemoryProperties::DEVICE_LOCAL
          | MemoryProperties::HOST_VISIBLE
          | MemoryProperties::HOST_COHERENT,
      },
    ];
    Self {
      config,
      memory_types,
      library,
      state: Mutex::new(HostState {
        next_address: ADDRESS_BASE,
        ..Default::default()
      }),
      last_draw_bounds: Mutex::new(None),
    }
  }

  pub fn library(&self) -> &Arc<KernelLibrary> {
    &self.library
  }

  /// Bytes of device memory currently allocated.
  pub fn allocated_bytes(&self) -> u64 {
    self.state.lock().unwrap().allocated
  }

  pub fn live_buffers(&self) -> usize {
    self.state.lock().unwrap().buffers.len()
  }

  /// World-space bounds of the vertices produced by the most recent draw.
  pub fn last_draw_bounds(&self) -> Option<(Vec3, Vec3)> {
    *self.last_draw_bounds.lock().unwrap()
  }

  fn register_pipeline(&self, pipeline: HostPipeline) -> PipelineHandle {
    let mut state = self.state.lock().unwrap();
    let handle = PipelineHandle(state.next_id());
    state.pipelines.insert(handle, pipeline);
    handle
  }

  fn snapshot(&self, tracked: bool) -> GlobalMemory {
    let state = self.state.lock().unwrap();
    let bound = state
      .buffers
      .iter()
      .filter_map(|(handle, b)| b.memory.clone().map(|m| (*handle, b.address, b.size, m)));
    if tracked {
      GlobalMemory::tracked(bound.collect())
    } else {
      GlobalMemory::new(bound.map(|(_, base, size, m)| (base, size, m)).collect())
    }
  }

  fn pipeline(&self, handle: PipelineHandle) -> Result<HostPipeline, DeviceError> {
    let state = self.state.lock().unwrap();
    state
      .pipelines
      .get(&handle)
      .cloned()
      .ok_or(DeviceError::UnknownPipeline(handle))
  }

  fn execute_copy(
    &self,
    src: BufferHandle,
    dst: BufferHandle,
    regions: &[BufferCopy],
  ) -> Result<(), DeviceError> {
    let (src_block, src_size, dst_block, dst_size) = {
      let state = self.state.lock().unwrap();
      let (s, sb) = state.bound(src)?;
      let (d, db) = state.bound(dst)?;
      (sb, s.size, db, d.size)
    };
    for region in regions {
      check_range(region.src_offset, region.size, src_size)?;
      check_range(region.dst_offset, region.size, dst_size)?;
      dst_block.copy_from(&src_block, region.src_offset, region.dst_offset, region.size);
    }
    Ok(())
  }

  fn execute_fill(
    &self,
    dst: BufferHandle,
    offset: u64,
    size: u64,
    value: u32,
  ) -> Result<(), DeviceError> {
    let (block, buffer_size) = {
      let state = self.state.lock().unwrap();
      let (d, db) = state.bound(dst)?;
      (db, d.size)
    };
    check_range(offset, size, buffer_size)?;
    block.fill_u32(offset, size, value);
    Ok(())
  }

  fn execute_draw(
    &self,
    program: &dyn VertexProgram,
    push: &[u8],
    buffer: BufferHandle,
    offset: u64,
    mut hazards: Option<(&mut HazardTracker, u32)>,
  ) -> Result<u64, DeviceError> {
    let mut args = [0u8; 16];
    if let Some((tracker, index)) = hazards.as_mut() {
      let access = CommandAccess {
        index: *index,
        name: program.name(),
        stage: StageFlags::DRAW_INDIRECT,
      };
      tracker.read(&access, buffer, word_range(offset, args.len() as u64))?;
    }
    self.read_buffer(buffer, offset, &mut args)?;
    let args: [u32; 4] = bytemuck::cast(args);
    let vertices = args[0] as u64 * args[1] as u64;

    let memory = self.snapshot(hazards.is_some());
    let bounds = (0..vertices)
      .into_par_iter()
      .map(|v| {
        let p = program.vertex(&memory, push, (v % args[0].max(1) as u64) as u32 + args[2]);
        (p.truncate(), p.truncate())
      })
      .reduce_with(|a, b| (a.0.min(b.0), a.1.max(b.1)));

    if let Some(address) = memory.fault() {
      return Err(DeviceError::MemoryFault {
        address,
        pipeline: program.name().to_string(),
      });
    }
    if let Some((tracker, index)) = hazards {
      let access = CommandAccess {
        index,
        name: program.name(),
        stage: StageFlags::VERTEX_SHADER,
      };
      tracker.shader(&access, &memory)?;
    }
    *self.last_draw_bounds.lock().unwrap() = bounds;
    Ok(vertices)
  }
}

impl GpuDevice for HostDevice {
  type Commands = HostCommandBuffer;

  fn create_buffer(&self, size: u64, usage: BufferUsage) -> Result<BufferHandle, DeviceError> {
    if size == 0 {
      return Err(DeviceError::BufferCreation {
        size,
        reason: "zero-sized buffer",
      });
    }
    let mut state = self.state.lock().unwrap();
    let handle = BufferHandle(state.next_id());
    let address = state.next_address;
    state.next_address += size.div_ceil(ADDRESS_GRANULE) * ADDRESS_GRANULE + ADDRESS_GRANULE;
    state.buffers.insert(
      handle,
      HostBuffer {
        size,
        usage,
        address,
        memory: None,
      },
    );
    Ok(handle)
  }

  fn memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements, DeviceError> {
    let state = self.state.lock().unwrap();
    let buf = state
      .buffers
      .get(&buffer)
      .ok_or(DeviceError::UnknownBuffer(buffer))?;
    let align = self.config.min_alignment;
    Ok(MemoryRequirements {
      size: buf.size.div_ceil(align) * align,
      alignment: align,
      type_bits: (1 << self.memory_types.len()) - 1,
    })
  }

  fn memory_types(&self) -> &[MemoryType] {
    &self.memory_types
  }

  fn allocate_memory(&self, size: u64, type_index: u32) -> Result<MemoryHandle, DeviceError> {
    if type_index as usize >= self.memory_types.len() {
      return Err(DeviceError::InvalidMemoryType(type_index));
    }
    let mut state = self.state.lock().unwrap();
    let available = self.config.memory_limit.saturating_sub(state.allocated);
    if size > available {
      return Err(DeviceError::OutOfDeviceMemory {
        requested: size,
        available,
      });
    }
    let handle = MemoryHandle(state.next_id());
    state.memories.insert(handle, Arc::new(MemoryBlock::new(size)));
    state.allocated += size;
    tracing::trace!(?handle, size, type_index, "allocated device memory");
    Ok(handle)
  }

  fn bind_buffer_memory(
    &self,
    buffer: BufferHandle,
    memory: MemoryHandle,
  ) -> Result<(), DeviceError> {
    let mut state = self.state.lock().unwrap();
    let block = state
      .memories
      .get(&memory)
      .cloned()
      .ok_or(DeviceError::UnknownMemory(memory))?;
    let buf = state
      .buffers
      .get_mut(&buffer)
      .ok_or(DeviceError::UnknownBuffer(buffer))?;
    check_range(0, buf.size, block.size())?;
    buf.memory = Some(block);
    Ok(())
  }

  fn buffer_device_address(&self, buffer: BufferHandle) -> Result<u64, DeviceError> {
    let state = self.state.lock().unwrap();
    let buf = state
      .buffers
      .get(&buffer)
      .ok_or(DeviceError::UnknownBuffer(buffer))?;
    if !buf.usage.contains(BufferUsage::DEVICE_ADDRESS) {
      return Err(DeviceError::NoDeviceAddress(buffer));
    }
    if buf.memory.is_none() {
      return Err(DeviceError::NotBound(buffer));
    }
    Ok(buf.address)
  }

  fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
    let state = self.state.lock().unwrap();
    let (buf, block) = state.bound(buffer)?;
    check_range(offset, data.len() as u64, buf.size)?;
    block.write_bytes(offset, data);
    Ok(())
  }

  fn read_buffer(&self, buffer: BufferHandle, offset: u64, out: &mut [u8]) -> Result<(), DeviceError> {
    let state = self.state.lock().unwrap();
    let (buf, block) = state.bound(buffer)?;
    check_range(offset, out.len() as u64, buf.size)?;
    block.read_bytes(offset, out);
    Ok(())
  }

  fn destroy_buffer(&self, buffer: BufferHandle) {
    self.state.lock().unwrap().buffers.remove(&buffer);
  }

  fn free_memory(&self, memory: MemoryHandle) {
    let mut state = self.state.lock().unwrap();
    if let Some(block) = state.memories.remove(&memory) {
      state.allocated = state.allocated.saturating_sub(block.size());
    }
  }

  fn begin_commands(&self) -> HostCommandBuffer {
    HostCommandBuffer::default()
  }

  #[cfg_attr(feature = "instrument", tracing::instrument(skip_all, name = "host::submit"))]
  fn submit(&self, commands: HostCommandBuffer) -> Result<SubmitReport, DeviceError> {
    let mut report = SubmitReport::default();
    let mut bound: Option<(PipelineHandle, HostPipeline)> = None;
    let mut push: Vec<u8> = Vec::new();
    let mut hazards = self.config.validate_hazards.then(HazardTracker::default);

    for (position, command) in commands.commands.into_iter().enumerate() {
      let index = position as u32 + 1;
      match command {
        HostCommand::Copy { src, dst, regions } => {
          if let Some(tracker) = hazards.as_mut() {
            let access = CommandAccess {
              index,
              name: "copy_buffer",
              stage: StageFlags::TRANSFER,
            };
            for region in &regions {
              tracker.read(&access, src, word_range(region.src_offset, region.size))?;
              tracker.write(&access, dst, word_range(region.dst_offset, region.size))?;
            }
          }
          self.execute_copy(src, dst, &regions)?;
          report.copies += 1;
        }
        HostCommand::Fill {
          dst,
          offset,
          size,
          value,
        } => {
          if let Some(tracker) = hazards.as_mut() {
            let access = CommandAccess {
              index,
              name: "fill_buffer",
              stage: StageFlags::TRANSFER,
            };
            tracker.write(&access, dst, word_range(offset, size))?;
          }
          self.execute_fill(dst, offset, size, value)?;
          report.fills += 1;
        }
        HostCommand::Barrier(batch) => {
          // Execution is already in order; only the hazard tracker cares.
          if let Some(tracker) = hazards.as_mut() {
            tracker.barrier(&batch);
          }
          report.barrier_batches += 1;
          report.barriers += batch.len() as u32;
        }
        HostCommand::BindPipeline(handle) => {
          bound = Some((handle, self.pipeline(handle)?));
        }
        HostCommand::PushConstants(data) => push = data,
        HostCommand::Dispatch(groups) => {
          let Some((_, HostPipeline::Compute(kernel))) = &bound else {
            return Err(DeviceError::NoPipelineBound);
          };
          let memory = self.snapshot(hazards.is_some());
          report.workgroups += run_dispatch(kernel.as_ref(), groups, &push, &memory);
          report.dispatches += 1;
          if let Some(address) = memory.fault() {
            return Err(DeviceError::MemoryFault {
              address,
              pipeline: kernel.name().to_string(),
            });
          }
          if let Some(tracker) = hazards.as_mut() {
            let access = CommandAccess {
              index,
              name: kernel.name(),
              stage: StageFlags::COMPUTE_SHADER,
            };
            tracker.shader(&access, &memory)?;
          }
        }
        HostCommand::DrawIndirect { buffer, offset } => {
          let Some((_, HostPipeline::Graphics(program))) = &bound else {
            return Err(DeviceError::NoPipelineBound);
          };
          let tracker = hazards.as_mut().map(|t| (t, index));
          report.vertices +=
            self.execute_draw(program.as_ref(), &push, buffer, offset, tracker)?;
          report.draws += 1;
        }
      }
    }

    tracing::trace!(?report, "submission complete");
    Ok(report)
  }
}

impl PipelineFactory for HostDevice {
  fn create_compute_pipeline(
    &self,
    module: &ShaderModule,
    specialization: &Specialization,
  ) -> Result<PipelineHandle, PipelineError> {
    let kernel = self.library.instantiate_compute(module, specialization)?;
    Ok(self.register_pipeline(HostPipeline::Compute(kernel)))
  }

  fn create_graphics_pipeline(
    &self,
    module: &ShaderModule,
    specialization: &Specialization,
  ) -> Result<PipelineHandle, PipelineError> {
    let program = self.library.instantiate_vertex(module, specialization)?;
    Ok(self.register_pipeline(HostPipeline::Graphics(program)))
  }

  fn destroy_pipeline(&self, pipeline: PipelineHandle) {
    self.state.lock().unwrap().pipelines.remove(&pipeline);
  }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
