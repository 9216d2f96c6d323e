//! Submission-time synchronization check for the host device.
//!
//! Commands on the host device run strictly in order, so a missing barrier
//! never corrupts results here. On a real queue it would. With validation
//! on, every 8-byte word of every buffer remembers the last command that
//! wrote it until a barrier whose source scope covers that write. Any later
//! command touching a pending word fails the submission.
//!
//! ```text
//!  word state      Copy/Fill/Dispatch write   Barrier(src ⊇ writer)
//!  ─────────────── ─────────────────────────► ──────────────────────►
//!   visible              pending(cmd, stage)          visible
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use super::dispatch::GlobalMemory;
use super::BufferHandle;
use crate::error::DeviceError;
use crate::graph::{BarrierBatch, BarrierTarget, StageFlags};

/// Tracking granularity in bytes.
pub const HAZARD_WORD: u64 = 8;

/// Words covering `[offset, offset + size)`.
pub fn word_range(offset: u64, size: u64) -> Range<u64> {
  offset / HAZARD_WORD..(offset + size).div_ceil(HAZARD_WORD)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HazardKind {
  ReadAfterWrite,
  WriteAfterWrite,
}

impl fmt::Display for HazardKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::ReadAfterWrite => "read-after-write",
      Self::WriteAfterWrite => "write-after-write",
    })
  }
}

/// The command whose accesses are being checked.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandAccess<'a> {
  /// 1-based position in the command buffer.
  pub index: u32,
  pub name: &'a str,
  pub stage: StageFlags,
}

#[derive(Clone, Copy, Debug, Default)]
struct PendingWrite {
  /// 0 when no write is pending.
  command: u32,
  stage: StageFlags,
}

#[derive(Default)]
pub(crate) struct HazardTracker {
  buffers: HashMap<BufferHandle, Vec<PendingWrite>>,
}

impl HazardTracker {
  fn touch(
    &mut self,
    access: &CommandAccess<'_>,
    buffer: BufferHandle,
    words: impl IntoIterator<Item = u64>,
    write: bool,
  ) -> Result<(), DeviceError> {
    let shadow = self.buffers.entry(buffer).or_default();
    for word in words {
      let word_index = word as usize;
      if let Some(slot) = shadow.get(word_index) {
        if slot.command != 0 && slot.command != access.index {
          return Err(DeviceError::Hazard {
            kind: if write {
              HazardKind::WriteAfterWrite
            } else {
              HazardKind::ReadAfterWrite
            },
            command: access.name.to_string(),
            buffer,
            offset: word * HAZARD_WORD,
          });
        }
      }
      if write {
        if shadow.len() <= word_index {
          shadow.resize(word_index + 1, PendingWrite::default());
        }
        shadow[word_index] = PendingWrite {
          command: access.index,
          stage: access.stage,
        };
      }
    }
    Ok(())
  }

  pub fn read(
    &mut self,
    access: &CommandAccess<'_>,
    buffer: BufferHandle,
    words: impl IntoIterator<Item = u64>,
  ) -> Result<(), DeviceError> {
    self.touch(access, buffer, words, false)
  }

  pub fn write(
    &mut self,
    access: &CommandAccess<'_>,
    buffer: BufferHandle,
    words: impl IntoIterator<Item = u64>,
  ) -> Result<(), DeviceError> {
    self.touch(access, buffer, words, true)
  }

  /// Check and record every word a dispatch or draw touched in `memory`.
  pub fn shader(
    &mut self,
    access: &CommandAccess<'_>,
    memory: &GlobalMemory,
  ) -> Result<(), DeviceError> {
    for touched in memory.touched() {
      self.read(access, touched.buffer, touched.read)?;
      self.write(access, touched.buffer, touched.written)?;
    }
    Ok(())
  }

  /// Make pending writes covered by `batch` visible. A barrier covers a
  /// write when its source access includes a write and its source stages
  /// include the writer's stage.
  pub fn barrier(&mut self, batch: &BarrierBatch) {
    for barrier in batch.iter() {
      let BarrierTarget::Buffer {
        buffer,
        offset,
        size,
      } = barrier.target
      else {
        continue;
      };
      if !barrier.src.access.has_write() {
        continue;
      }
      let Some(shadow) = self.buffers.get_mut(&buffer) else {
        continue;
      };
      let src = barrier.src.stage;
      let words = word_range(offset, size);
      let end = (words.end as usize).min(shadow.len());
      let start = (words.start as usize).min(end);
      for slot in &mut shadow[start..end] {
        if slot.command != 0
          && (src.contains(slot.stage) || src.contains(StageFlags::ALL_COMMANDS))
        {
          *slot = PendingWrite::default();
        }
      }
    }
  }
}
