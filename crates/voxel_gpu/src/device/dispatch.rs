//! Compute dispatch model for the host device.
//!
//! A dispatch is a grid of workgroups run in parallel on the rayon pool.
//! Inside a workgroup, invocations run phase by phase: every call to
//! [`Workgroup::invocations`] is one phase in which each invocation runs to
//! completion, and [`Workgroup::barrier`] marks the boundary between phases.
//! Control flow around barriers must be uniform across the workgroup, which
//! this model enforces structurally: a phase is entered by the whole group
//! or by none of it.
//!
//! ```text
//!  workgroup (0,0,0)           workgroup (1,0,0)         ... (rayon)
//!  ┌────────────────────┐      ┌────────────────────┐
//!  │ phase 0: lane 0..N │      │ phase 0: lane 0..N │
//!  │ ─── barrier ───────│      │ ─── barrier ───────│
//!  │ phase 1: lane 0..N │      │ phase 1: lane 0..N │
//!  └────────────────────┘      └────────────────────┘
//!        shared: [u64]               shared: [u64]
//!            │                            │
//!            └──────── GlobalMemory ──────┘   (atomics only across groups)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use glam::{UVec3, Vec4};
use rayon::prelude::*;

use super::hazard::{word_range, HAZARD_WORD};
use super::memory::MemoryBlock;
use super::BufferHandle;

/// A compute shader entry point.
pub trait ComputeKernel: Send + Sync {
  fn name(&self) -> &str;
  fn workgroup_size(&self) -> [u32; 3];

  /// Shared memory per workgroup, in 64-bit words.
  fn shared_words(&self) -> usize {
    0
  }

  fn run(&self, wg: &mut Workgroup<'_>);
}

/// A vertex stage: produces a clip/world position per vertex index.
pub trait VertexProgram: Send + Sync {
  fn name(&self) -> &str;
  fn vertex(&self, memory: &GlobalMemory, push: &[u8], vertex_index: u32) -> Vec4;
}

// =============================================================================
// Global memory
// =============================================================================

struct MappedRange {
  base: u64,
  size: u64,
  block: Arc<MemoryBlock>,
  marks: Option<AccessMarks>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Access {
  Read,
  Write,
  ReadWrite,
}

/// One bit per [`HAZARD_WORD`] of a buffer, for reads and for writes.
struct AccessMarks {
  buffer: BufferHandle,
  read: Box<[AtomicU64]>,
  written: Box<[AtomicU64]>,
}

impl AccessMarks {
  fn new(buffer: BufferHandle, size: u64) -> Self {
    let slots = size.div_ceil(HAZARD_WORD).div_ceil(64) as usize;
    let bits = || -> Box<[AtomicU64]> { (0..slots).map(|_| AtomicU64::new(0)).collect() };
    Self {
      buffer,
      read: bits(),
      written: bits(),
    }
  }

  #[inline]
  fn mark(&self, offset: u64, len: u64, access: Access) {
    if len == 0 {
      return;
    }
    for word in word_range(offset, len) {
      if access != Access::Write {
        set_bit(&self.read, word);
      }
      if access != Access::Read {
        set_bit(&self.written, word);
      }
    }
  }
}

#[inline]
fn set_bit(bits: &[AtomicU64], word: u64) {
  let slot = &bits[(word / 64) as usize];
  let bit = 1u64 << (word % 64);
  if slot.load(Ordering::Relaxed) & bit == 0 {
    slot.fetch_or(bit, Ordering::Relaxed);
  }
}

fn set_words(bits: &[AtomicU64]) -> Vec<u64> {
  let mut words = Vec::new();
  for (slot, value) in bits.iter().enumerate() {
    let mut value = value.load(Ordering::Acquire);
    while value != 0 {
      words.push(slot as u64 * 64 + value.trailing_zeros() as u64);
      value &= value - 1;
    }
  }
  words
}

/// Words of one buffer touched through a tracked [`GlobalMemory`].
pub(crate) struct TouchedBuffer {
  pub buffer: BufferHandle,
  pub read: Vec<u64>,
  pub written: Vec<u64>,
}

/// Device-address view of every bound buffer, captured at dispatch time.
///
/// Accesses outside any buffer read zero, drop writes and report CAS success
/// so kernels always run to completion; the first faulting address is kept
/// and surfaced as a submission error.
pub struct GlobalMemory {
  ranges: Vec<MappedRange>,
  fault: AtomicU64,
}

impl GlobalMemory {
  pub(crate) fn new(ranges: Vec<(u64, u64, Arc<MemoryBlock>)>) -> Self {
    Self::from_ranges(
      ranges
        .into_iter()
        .map(|(base, size, block)| MappedRange {
          base,
          size,
          block,
          marks: None,
        })
        .collect(),
    )
  }

  /// Like [`GlobalMemory::new`], but records which words of each buffer
  /// are read and written; see [`GlobalMemory::touched`].
  pub(crate) fn tracked(ranges: Vec<(BufferHandle, u64, u64, Arc<MemoryBlock>)>) -> Self {
    Self::from_ranges(
      ranges
        .into_iter()
        .map(|(buffer, base, size, block)| MappedRange {
          base,
          size,
          block,
          marks: Some(AccessMarks::new(buffer, size)),
        })
        .collect(),
    )
  }

  fn from_ranges(mut ranges: Vec<MappedRange>) -> Self {
    ranges.sort_by_key(|r| r.base);
    Self {
      ranges,
      fault: AtomicU64::new(0),
    }
  }

  #[inline]
  fn resolve(&self, address: u64, len: u64) -> Option<(&MappedRange, u64)> {
    let idx = self.ranges.partition_point(|r| r.base <= address);
    let range = self.ranges.get(idx.checked_sub(1)?)?;
    let offset = address - range.base;
    if offset + len <= range.size {
      Some((range, offset))
    } else {
      None
    }
  }

  /// Words touched so far, per tracked buffer with at least one access.
  pub(crate) fn touched(&self) -> Vec<TouchedBuffer> {
    self
      .ranges
      .iter()
      .filter_map(|r| r.marks.as_ref())
      .map(|marks| TouchedBuffer {
        buffer: marks.buffer,
        read: set_words(&marks.read),
        written: set_words(&marks.written),
      })
      .filter(|t| !t.read.is_empty() || !t.written.is_empty())
      .collect()
  }

  #[cold]
  fn record_fault(&self, address: u64) {
    let _ = self
      .fault
      .compare_exchange(0, address.max(1), Ordering::AcqRel, Ordering::Acquire);
  }

  /// First faulting address, if any access missed every buffer.
  pub fn fault(&self) -> Option<u64> {
    match self.fault.load(Ordering::Acquire) {
      0 => None,
      address => Some(address),
    }
  }

  #[inline]
  fn with<R>(
    &self,
    address: u64,
    len: u64,
    access: Access,
    fallback: R,
    f: impl FnOnce(&MemoryBlock, u64) -> R,
  ) -> R {
    match self.resolve(address, len) {
      Some((range, offset)) => {
        if let Some(marks) = &range.marks {
          marks.mark(offset, len, access);
        }
        f(&range.block, offset)
      }
      None => {
        self.record_fault(address);
        fallback
      }
    }
  }

  pub fn load_u32(&self, address: u64) -> u32 {
    self.with(address, 4, Access::Read, 0, |b, o| b.load_u32(o))
  }

  pub fn store_u32(&self, address: u64, value: u32) {
    self.with(address, 4, Access::Write, (), |b, o| b.store_u32(o, value))
  }

  pub fn fetch_add_u32(&self, address: u64, value: u32) -> u32 {
    self.with(address, 4, Access::ReadWrite, 0, |b, o| {
      b.fetch_add_u32(o, value)
    })
  }

  pub fn fetch_or_u32(&self, address: u64, value: u32) -> u32 {
    self.with(address, 4, Access::ReadWrite, 0, |b, o| {
      b.fetch_or_u32(o, value)
    })
  }

  pub fn compare_exchange_u32(&self, address: u64, current: u32, new: u32) -> Result<u32, u32> {
    self.with(address, 4, Access::ReadWrite, Ok(current), |b, o| {
      b.compare_exchange_u32(o, current, new)
    })
  }

  pub fn load_u64(&self, address: u64) -> u64 {
    self.with(address, 8, Access::Read, 0, |b, o| b.load_u64(o))
  }

  pub fn store_u64(&self, address: u64, value: u64) {
    self.with(address, 8, Access::Write, (), |b, o| b.store_u64(o, value))
  }

  pub fn fetch_or_u64(&self, address: u64, value: u64) -> u64 {
    self.with(address, 8, Access::ReadWrite, 0, |b, o| {
      b.fetch_or_u64(o, value)
    })
  }

  pub fn compare_exchange_u64(&self, address: u64, current: u64, new: u64) -> Result<u64, u64> {
    self.with(address, 8, Access::ReadWrite, Ok(current), |b, o| {
      b.compare_exchange_u64(o, current, new)
    })
  }

  #[inline]
  pub fn load_f32(&self, address: u64) -> f32 {
    f32::from_bits(self.load_u32(address))
  }

  #[inline]
  pub fn store_f32(&self, address: u64, value: f32) {
    self.store_u32(address, value.to_bits());
  }

  /// Read a plain-old-data struct.
  pub fn read<T: Pod>(&self, address: u64) -> T {
    let mut value = T::zeroed();
    let bytes = bytemuck::bytes_of_mut(&mut value);
    let len = bytes.len() as u64;
    self.with(address, len, Access::Read, (), |b, o| b.read_bytes(o, bytes));
    value
  }

  /// Write a plain-old-data struct. Not atomic as a whole.
  pub fn write<T: Pod>(&self, address: u64, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    self.with(address, bytes.len() as u64, Access::Write, (), |b, o| {
      b.write_bytes(o, bytes)
    })
  }
}

// =============================================================================
// Workgroup
// =============================================================================

/// Built-in IDs of one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invocation {
  pub local: UVec3,
  pub global: UVec3,
  pub workgroup: UVec3,
  /// Flattened local index (`gl_LocalInvocationIndex`).
  pub index: u32,
}

pub struct Workgroup<'a> {
  id: UVec3,
  size: UVec3,
  memory: &'a GlobalMemory,
  push: &'a [u8],
  shared: Vec<u64>,
  phases: u32,
}

impl<'a> Workgroup<'a> {
  pub fn new(
    id: UVec3,
    size: UVec3,
    memory: &'a GlobalMemory,
    push: &'a [u8],
    shared_words: usize,
  ) -> Self {
    Self {
      id,
      size,
      memory,
      push,
      shared: vec![0; shared_words],
      phases: 0,
    }
  }

  #[inline]
  pub fn id(&self) -> UVec3 {
    self.id
  }

  #[inline]
  pub fn size(&self) -> UVec3 {
    self.size
  }

  #[inline]
  pub fn invocation_count(&self) -> u32 {
    self.size.x * self.size.y * self.size.z
  }

  #[inline]
  pub fn memory(&self) -> &'a GlobalMemory {
    self.memory
  }

  /// Push constants reinterpreted as `T`; missing trailing bytes read as zero.
  pub fn push_constants<T: Pod>(&self) -> T {
    let mut value = T::zeroed();
    let bytes = bytemuck::bytes_of_mut(&mut value);
    let len = bytes.len().min(self.push.len());
    bytes[..len].copy_from_slice(&self.push[..len]);
    value
  }

  #[inline]
  pub fn shared(&self) -> &[u64] {
    &self.shared
  }

  /// Barriers executed so far.
  pub fn barrier_count(&self) -> u32 {
    self.phases
  }

  #[inline]
  fn invocation(&self, index: u32) -> Invocation {
    let local = UVec3::new(
      index % self.size.x,
      (index / self.size.x) % self.size.y,
      index / (self.size.x * self.size.y),
    );
    Invocation {
      local,
      global: self.id * self.size + local,
      workgroup: self.id,
      index,
    }
  }

  /// Run one phase over every invocation of the group.
  pub fn invocations(&mut self, mut f: impl FnMut(Invocation, &mut [u64])) {
    for index in 0..self.invocation_count() {
      let inv = self.invocation(index);
      f(inv, &mut self.shared);
    }
  }

  /// Run one phase in which only `lane` is active.
  pub fn single(&mut self, lane: u32, f: impl FnOnce(Invocation, &mut [u64])) {
    let inv = self.invocation(lane);
    f(inv, &mut self.shared);
  }

  /// Workgroup barrier: memory written in the previous phase is visible to
  /// every invocation in the next one.
  pub fn barrier(&mut self) {
    self.phases += 1;
  }

  /// Subgroup ballot over the whole group (at most 64 invocations).
  pub fn ballot(&mut self, mut predicate: impl FnMut(Invocation, &[u64]) -> bool) -> u64 {
    debug_assert!(self.invocation_count() <= 64, "ballot needs a single subgroup");
    let mut mask = 0u64;
    for index in 0..self.invocation_count() {
      let inv = self.invocation(index);
      if predicate(inv, &self.shared) {
        mask |= 1u64 << index;
      }
    }
    mask
  }
}

/// Run every workgroup of a dispatch.
pub(crate) fn run_dispatch(
  kernel: &dyn ComputeKernel,
  groups: [u32; 3],
  push: &[u8],
  memory: &GlobalMemory,
) -> u64 {
  let size = UVec3::from_array(kernel.workgroup_size());
  let [gx, gy, gz] = groups.map(u64::from);
  let total = gx * gy * gz;
  let shared_words = kernel.shared_words();

  (0..total).into_par_iter().for_each(|flat| {
    let id = UVec3::new(
      (flat % gx) as u32,
      ((flat / gx) % gy) as u32,
      (flat / (gx * gy)) as u32,
    );
    let mut wg = Workgroup::new(id, size, memory, push, shared_words);
    kernel.run(&mut wg);
  });

  total
}
