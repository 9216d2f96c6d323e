//! CPU → heap upload path.
//!
//! Writes are queued as `(heap offset, bytes)` pairs. `flush` packs every
//! pending write into one host-visible staging buffer and records a single
//! copy command with one region per write, followed by a transfer barrier
//! over the written ranges. Staging buffers stay alive until
//! [`StagingBelt::retire`] is called after the submission has completed.

use std::sync::Arc;

use bytemuck::Pod;

use crate::device::{BufferCopy, BufferUsage, CommandContext, GpuDevice, MemoryProperties};
use crate::error::HeapError;
use crate::graph::BarrierBatch;
use crate::heap::{allocate_backing, Backing, GpuHeap, HeapDesc, HeapOffset, HeapRange};

/// Staging copies are packed at this alignment.
const STAGING_ALIGN: u64 = 16;

struct PendingWrite {
  offset: u64,
  bytes: Vec<u8>,
}

/// Upload statistics of one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
  pub writes: usize,
  pub bytes: u64,
}

pub struct StagingBelt<D: GpuDevice> {
  device: Arc<D>,
  pending: Vec<PendingWrite>,
  in_flight: Vec<Backing>,
  total_bytes: u64,
}

impl<D: GpuDevice> StagingBelt<D> {
  pub fn new(device: Arc<D>) -> Self {
    Self {
      device,
      pending: Vec::new(),
      in_flight: Vec::new(),
      total_bytes: 0,
    }
  }

  /// Queue `bytes` for upload to the start of `range`.
  pub fn enqueue(&mut self, range: HeapRange, bytes: &[u8]) -> Result<(), HeapError> {
    if bytes.len() as u64 > range.size {
      return Err(HeapError::WriteOutOfBounds {
        offset: range.offset,
        len: bytes.len() as u64,
        capacity: range.end(),
      });
    }
    self.enqueue_at(range.offset, bytes);
    Ok(())
  }

  pub fn enqueue_value<T: Pod>(&mut self, at: HeapOffset<T>, value: &T) {
    self.enqueue_at(at.offset(), bytemuck::bytes_of(value));
  }

  pub fn enqueue_slice<T: Pod>(&mut self, at: HeapOffset<T>, values: &[T]) {
    self.enqueue_at(at.offset(), bytemuck::cast_slice(values));
  }

  fn enqueue_at(&mut self, offset: u64, bytes: &[u8]) {
    if bytes.is_empty() {
      return;
    }
    self.pending.push(PendingWrite {
      offset,
      bytes: bytes.to_vec(),
    });
  }

  pub fn pending(&self) -> usize {
    self.pending.len()
  }

  /// Staging buffers awaiting `retire`.
  pub fn in_flight(&self) -> usize {
    self.in_flight.len()
  }

  /// Bytes uploaded over the belt's lifetime.
  pub fn total_bytes(&self) -> u64 {
    self.total_bytes
  }

  /// Copy every pending write into the heap's current buffer.
  ///
  /// Must run after any heap growth recorded into the same command context,
  /// so the copies land in the buffer the following passes will use. Writes
  /// past the heap's end fail the whole flush and are discarded.
  #[cfg_attr(feature = "instrument", tracing::instrument(skip_all, name = "staging::flush"))]
  pub fn flush(
    &mut self,
    heap: &GpuHeap<D>,
    cmd: &mut D::Commands,
  ) -> Result<FlushStats, HeapError> {
    if self.pending.is_empty() {
      return Ok(FlushStats::default());
    }
    let pending = std::mem::take(&mut self.pending);

    let capacity = heap.capacity();
    let mut regions = Vec::with_capacity(pending.len());
    let mut cursor = 0u64;
    for write in &pending {
      let len = write.bytes.len() as u64;
      if write.offset + len > capacity {
        return Err(HeapError::WriteOutOfBounds {
          offset: write.offset,
          len,
          capacity,
        });
      }
      regions.push(BufferCopy {
        src_offset: cursor,
        dst_offset: write.offset,
        size: len,
      });
      cursor = (cursor + len).next_multiple_of(STAGING_ALIGN);
    }

    let desc = HeapDesc {
      size: cursor,
      usage: BufferUsage::TRANSFER_SRC,
      memory: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
    };
    let staging = allocate_backing(self.device.as_ref(), &desc, cursor)?;
    for (write, region) in pending.iter().zip(&regions) {
      if let Err(e) = self
        .device
        .write_buffer(staging.buffer, region.src_offset, &write.bytes)
      {
        self.device.destroy_buffer(staging.buffer);
        self.device.free_memory(staging.memory);
        return Err(e.into());
      }
    }

    cmd.copy_buffer(staging.buffer, heap.buffer(), &regions);
    cmd.pipeline_barrier(&BarrierBatch::after_transfer_writes(
      heap.buffer(),
      regions.iter().map(|r| (r.dst_offset, r.size)),
    ));
    self.in_flight.push(staging);

    let stats = FlushStats {
      writes: regions.len(),
      bytes: regions.iter().map(|r| r.size).sum(),
    };
    self.total_bytes += stats.bytes;
    tracing::trace!(writes = stats.writes, bytes = stats.bytes, "staged uploads");
    Ok(stats)
  }

  /// Release staging buffers of completed submissions.
  pub fn retire(&mut self) -> usize {
    let count = self.in_flight.len();
    for backing in self.in_flight.drain(..) {
      self.device.destroy_buffer(backing.buffer);
      self.device.free_memory(backing.memory);
    }
    count
  }
}

impl<D: GpuDevice> Drop for StagingBelt<D> {
  fn drop(&mut self) {
    self.retire();
  }
}

#[cfg(test)]
#[path = "staging_test.rs"]
mod staging_test;
