//! Growable GPU-visible linear arena.
//!
//! ```text
//!  device address (cached until next growth)
//!  │
//!  ▼
//!  ┌────────┬──────────┬────────────────┬───────────────────┬──────────┐
//!  │ header │ palettes │ packed indices │ ...               │   free   │
//!  └────────┴──────────┴────────────────┴───────────────────┴──────────┘
//!  0                                                       cursor   capacity
//! ```
//!
//! Kernels see one 64-bit base address plus byte offsets. Offsets stay valid
//! across growth; raw addresses do not, which is why the address is cached
//! and dropped on every `grow`.
//!
//! Growth records a copy from the old buffer into the new one, then a
//! transfer barrier so later copies and fills see the copied bytes. The old
//! buffer and memory are kept on a retired list until the submission holding
//! that copy has completed and [`GpuHeap::collect_retired`] is called.
//! Growth is refused while any [`HeapUse`] token is alive.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::Pod;

use crate::device::{
  find_memory_type, BufferCopy, BufferHandle, BufferUsage, CommandContext, GpuDevice,
  MemoryHandle, MemoryProperties,
};
use crate::error::{DeviceError, HeapError};
use crate::graph::BarrierBatch;

/// Creation parameters of a heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapDesc {
  pub size: u64,
  pub usage: BufferUsage,
  pub memory: MemoryProperties,
}

impl HeapDesc {
  /// Device-local storage heap usable as copy source/target, indirect
  /// argument buffer and through its device address.
  pub fn device_local(size: u64) -> Self {
    Self {
      size,
      usage: BufferUsage::STORAGE
        | BufferUsage::TRANSFER_SRC
        | BufferUsage::TRANSFER_DST
        | BufferUsage::INDIRECT
        | BufferUsage::DEVICE_ADDRESS,
      memory: MemoryProperties::DEVICE_LOCAL,
    }
  }
}

// =============================================================================
// Offsets
// =============================================================================

/// Byte offset of a `T` inside the heap.
pub struct HeapOffset<T> {
  offset: u64,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for HeapOffset<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for HeapOffset<T> {}

impl<T> PartialEq for HeapOffset<T> {
  fn eq(&self, other: &Self) -> bool {
    self.offset == other.offset
  }
}

impl<T> Eq for HeapOffset<T> {}

impl<T> std::fmt::Debug for HeapOffset<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "HeapOffset<{}>({:#x})", std::any::type_name::<T>(), self.offset)
  }
}

impl<T> HeapOffset<T> {
  pub const fn new(offset: u64) -> Self {
    Self {
      offset,
      _marker: PhantomData,
    }
  }

  #[inline]
  pub const fn offset(self) -> u64 {
    self.offset
  }

  /// Device address of the value for a heap at `base`.
  #[inline]
  pub const fn resolve(self, base: u64) -> u64 {
    base + self.offset
  }

  /// Offset of element `index` in an array of `T` starting here.
  #[inline]
  pub const fn element(self, index: u64) -> Self {
    Self::new(self.offset + index * std::mem::size_of::<T>() as u64)
  }
}

/// Untyped byte range inside the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapRange {
  pub offset: u64,
  pub size: u64,
}

impl HeapRange {
  #[inline]
  pub const fn end(&self) -> u64 {
    self.offset + self.size
  }

  #[inline]
  pub const fn typed<T>(&self) -> HeapOffset<T> {
    HeapOffset::new(self.offset)
  }

  #[inline]
  pub const fn resolve(&self, base: u64) -> u64 {
    base + self.offset
  }

  /// Smallest range covering both.
  pub fn span(&self, other: &HeapRange) -> HeapRange {
    let start = self.offset.min(other.offset);
    let end = self.end().max(other.end());
    HeapRange {
      offset: start,
      size: end - start,
    }
  }
}

// =============================================================================
// Heap
// =============================================================================

/// Held for the lifetime of a submission that references the heap.
pub struct HeapUse {
  counter: Arc<AtomicUsize>,
}

impl Drop for HeapUse {
  fn drop(&mut self) {
    self.counter.fetch_sub(1, Ordering::AcqRel);
  }
}

/// Buffer plus the memory bound to it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Backing {
  pub(crate) buffer: BufferHandle,
  pub(crate) memory: MemoryHandle,
  pub(crate) capacity: u64,
}

pub(crate) fn allocate_backing<D: GpuDevice>(
  device: &D,
  desc: &HeapDesc,
  size: u64,
) -> Result<Backing, HeapError> {
  let failed = |source: Option<DeviceError>| HeapError::AllocationFailed { size, source };

  let buffer = device
    .create_buffer(size, desc.usage)
    .map_err(|e| failed(Some(e)))?;

  let requirements = match device.memory_requirements(buffer) {
    Ok(r) => r,
    Err(e) => {
      device.destroy_buffer(buffer);
      return Err(failed(Some(e)));
    }
  };

  let Some(type_index) =
    find_memory_type(device.memory_types(), requirements.type_bits, desc.memory)
  else {
    device.destroy_buffer(buffer);
    return Err(failed(None));
  };

  let memory = match device.allocate_memory(requirements.size, type_index) {
    Ok(m) => m,
    Err(e) => {
      device.destroy_buffer(buffer);
      return Err(failed(Some(e)));
    }
  };

  if let Err(e) = device.bind_buffer_memory(buffer, memory) {
    device.destroy_buffer(buffer);
    device.free_memory(memory);
    return Err(failed(Some(e)));
  }

  Ok(Backing {
    buffer,
    memory,
    capacity: size,
  })
}

/// Growable device-address-visible arena. Exclusively owned by its renderer.
pub struct GpuHeap<D: GpuDevice> {
  device: Arc<D>,
  desc: HeapDesc,
  current: Backing,
  address: Mutex<Option<u64>>,
  cursor: u64,
  in_flight: Arc<AtomicUsize>,
  retired: Vec<Backing>,
  generation: u32,
}

impl<D: GpuDevice> GpuHeap<D> {
  /// Create the buffer, pick a memory type matching `desc.memory`, allocate
  /// and bind.
  pub fn create(device: Arc<D>, desc: HeapDesc) -> Result<Self, HeapError> {
    let current = allocate_backing(device.as_ref(), &desc, desc.size)?;
    tracing::info!(size = desc.size, buffer = ?current.buffer, "created gpu heap");
    Ok(Self {
      device,
      desc,
      current,
      address: Mutex::new(None),
      cursor: 0,
      in_flight: Arc::new(AtomicUsize::new(0)),
      retired: Vec::new(),
      generation: 0,
    })
  }

  /// Base device address. Stable until the next successful `grow`.
  pub fn device_address(&self) -> Result<u64, HeapError> {
    let mut cached = self.address.lock().unwrap();
    if let Some(address) = *cached {
      return Ok(address);
    }
    let address = self.device.buffer_device_address(self.current.buffer)?;
    *cached = Some(address);
    Ok(address)
  }

  pub fn buffer(&self) -> BufferHandle {
    self.current.buffer
  }

  pub fn capacity(&self) -> u64 {
    self.current.capacity
  }

  /// Bytes handed out since the last `reset`.
  pub fn used(&self) -> u64 {
    self.cursor
  }

  /// Number of successful growths.
  pub fn generation(&self) -> u32 {
    self.generation
  }

  pub fn retired_count(&self) -> usize {
    self.retired.len()
  }

  /// Ensure capacity ≥ `new_min_size`, reallocating to
  /// `max(2 × capacity, new_min_size)` and recording a full copy of the old
  /// contents into `cmd`, followed by a transfer barrier on the new buffer.
  /// Returns whether a reallocation happened.
  #[cfg_attr(feature = "instrument", tracing::instrument(skip_all, name = "heap::grow"))]
  pub fn grow(&mut self, new_min_size: u64, cmd: &mut D::Commands) -> Result<bool, HeapError> {
    if self.current.capacity >= new_min_size {
      return Ok(false);
    }
    let users = self.in_flight.load(Ordering::Acquire);
    if users > 0 {
      return Err(HeapError::InFlight(users));
    }

    let new_capacity = (self.current.capacity * 2).max(new_min_size);
    let next = allocate_backing(self.device.as_ref(), &self.desc, new_capacity)?;
    cmd.copy_buffer(
      self.current.buffer,
      next.buffer,
      &[BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: self.current.capacity,
      }],
    );
    // Chained growth, staging and clears all land on the new buffer after this.
    cmd.pipeline_barrier(&BarrierBatch::after_transfer_writes(
      next.buffer,
      [(0, self.current.capacity)],
    ));

    tracing::info!(
      from = self.current.capacity,
      to = new_capacity,
      "growing gpu heap"
    );
    let old = std::mem::replace(&mut self.current, next);
    self.retired.push(old);
    *self.address.get_mut().unwrap() = None;
    self.generation += 1;
    Ok(true)
  }

  /// Bump-allocate `size` bytes aligned to `align` (a power of two).
  pub fn allocate(&mut self, size: u64, align: u64) -> Result<HeapRange, HeapError> {
    debug_assert!(align.is_power_of_two());
    let offset = self.cursor.next_multiple_of(align);
    let end = offset + size;
    if end > self.current.capacity {
      return Err(HeapError::OutOfCapacity {
        requested: size,
        available: self.current.capacity.saturating_sub(self.cursor),
      });
    }
    self.cursor = end;
    Ok(HeapRange { offset, size })
  }

  /// Like [`allocate`](Self::allocate), growing first when the range does
  /// not fit.
  pub fn allocate_growing(
    &mut self,
    size: u64,
    align: u64,
    cmd: &mut D::Commands,
  ) -> Result<HeapRange, HeapError> {
    let end = self.cursor.next_multiple_of(align) + size;
    self.grow(end, cmd)?;
    self.allocate(size, align)
  }

  /// Allocate room for `count` values of `T`, 8-byte aligned at least.
  pub fn allocate_array<T: Pod>(
    &mut self,
    count: u64,
    cmd: &mut D::Commands,
  ) -> Result<HeapOffset<T>, HeapError> {
    let align = (std::mem::align_of::<T>() as u64).max(8);
    let range = self.allocate_growing(std::mem::size_of::<T>() as u64 * count, align, cmd)?;
    Ok(range.typed())
  }

  /// Rewind the arena. Outstanding offsets become dangling.
  pub fn reset(&mut self) {
    self.cursor = 0;
  }

  /// Mark the heap as referenced by a submission.
  pub fn begin_use(&self) -> HeapUse {
    self.in_flight.fetch_add(1, Ordering::AcqRel);
    HeapUse {
      counter: self.in_flight.clone(),
    }
  }

  /// Release buffers replaced by `grow`. Call only after every submission
  /// recorded before the growth has completed.
  pub fn collect_retired(&mut self) -> usize {
    let count = self.retired.len();
    for backing in self.retired.drain(..) {
      self.device.destroy_buffer(backing.buffer);
      self.device.free_memory(backing.memory);
    }
    if count > 0 {
      tracing::debug!(count, "released retired heap buffers");
    }
    count
  }

  fn check_range(&self, offset: u64, len: u64) -> Result<(), HeapError> {
    match offset.checked_add(len) {
      Some(end) if end <= self.current.capacity => Ok(()),
      _ => Err(HeapError::WriteOutOfBounds {
        offset,
        len,
        capacity: self.current.capacity,
      }),
    }
  }

  /// Read back heap bytes through a host mapping.
  pub fn read_bytes(&self, offset: u64, out: &mut [u8]) -> Result<(), HeapError> {
    self.check_range(offset, out.len() as u64)?;
    self
      .device
      .read_buffer(self.current.buffer, offset, out)
      .map_err(HeapError::from)
  }

  pub fn read<T: Pod>(&self, at: HeapOffset<T>) -> Result<T, HeapError> {
    let mut value = T::zeroed();
    self.read_bytes(at.offset(), bytemuck::bytes_of_mut(&mut value))?;
    Ok(value)
  }

  pub fn read_array<T: Pod>(&self, at: HeapOffset<T>, count: usize) -> Result<Vec<T>, HeapError> {
    let mut values = vec![T::zeroed(); count];
    self.read_bytes(at.offset(), bytemuck::cast_slice_mut(&mut values))?;
    Ok(values)
  }

  /// Release the buffer and memory, including any retired backings.
  pub fn destroy(self) {
    drop(self);
  }
}

impl<D: GpuDevice> Drop for GpuHeap<D> {
  fn drop(&mut self) {
    self.collect_retired();
    self.device.destroy_buffer(self.current.buffer);
    self.device.free_memory(self.current.memory);
  }
}

#[cfg(test)]
#[path = "heap_test.rs"]
mod heap_test;
