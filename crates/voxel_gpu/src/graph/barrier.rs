//! Barrier synthesis from resource state transitions.

use smallvec::SmallVec;

use super::resource::{Resource, ResourceDesc, ResourceId};
use super::resource_state::{ResourceState, StageFlags};
use crate::device::{BufferHandle, ImageHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierTarget {
  /// Whole-range buffer memory barrier.
  Buffer {
    buffer: BufferHandle,
    offset: u64,
    size: u64,
  },
  /// Whole-subresource image barrier with layout transition.
  Image { image: ImageHandle },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barrier {
  pub resource: ResourceId,
  pub target: BarrierTarget,
  pub src: ResourceState,
  pub dst: ResourceState,
}

impl Barrier {
  /// Barrier for moving `resource` to `required`, or `None` if its current
  /// state already matches.
  pub fn for_transition(
    id: ResourceId,
    resource: &Resource,
    required: &ResourceState,
  ) -> Option<Self> {
    if !resource.state.needs_barrier(required, resource.is_image()) {
      return None;
    }
    let target = match resource.desc {
      ResourceDesc::Buffer {
        buffer,
        offset,
        size,
      } => BarrierTarget::Buffer {
        buffer,
        offset,
        size,
      },
      ResourceDesc::Image { image } => BarrierTarget::Image { image },
    };
    Some(Self {
      resource: id,
      target,
      src: resource.state,
      dst: *required,
    })
  }

  /// Buffer range barrier not tied to a graph resource.
  pub fn buffer(
    buffer: BufferHandle,
    offset: u64,
    size: u64,
    src: ResourceState,
    dst: ResourceState,
  ) -> Self {
    Self {
      resource: ResourceId::UNTRACKED,
      target: BarrierTarget::Buffer {
        buffer,
        offset,
        size,
      },
      src,
      dst,
    }
  }

  pub fn is_layout_transition(&self) -> bool {
    matches!(self.target, BarrierTarget::Image { .. }) && self.src.layout != self.dst.layout
  }

  pub fn is_ownership_transfer(&self) -> bool {
    self.src.queue_family != self.dst.queue_family
  }
}

/// All barriers of one pass, recorded as a single barrier command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BarrierBatch {
  barriers: SmallVec<[Barrier; 4]>,
}

impl BarrierBatch {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes transfer writes to `ranges` of `buffer` visible to every later
  /// transfer, read or write.
  pub fn after_transfer_writes(
    buffer: BufferHandle,
    ranges: impl IntoIterator<Item = (u64, u64)>,
  ) -> Self {
    let mut batch = Self::new();
    for (offset, size) in ranges {
      batch.push(Barrier::buffer(
        buffer,
        offset,
        size,
        ResourceState::transfer_write(),
        ResourceState::transfer_read_write(),
      ));
    }
    batch
  }

  pub fn push(&mut self, barrier: Barrier) {
    self.barriers.push(barrier);
  }

  pub fn len(&self) -> usize {
    self.barriers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.barriers.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Barrier> {
    self.barriers.iter()
  }

  /// Union of source stages; `TOP_OF_PIPE` when empty.
  pub fn src_stages(&self) -> StageFlags {
    self
      .barriers
      .iter()
      .fold(StageFlags::NONE, |acc, b| acc | b.src.stage)
      .or_top()
  }

  /// Union of destination stages; `TOP_OF_PIPE` when empty.
  pub fn dst_stages(&self) -> StageFlags {
    self
      .barriers
      .iter()
      .fold(StageFlags::NONE, |acc, b| acc | b.dst.stage)
      .or_top()
  }
}

impl StageFlags {
  fn or_top(self) -> Self {
    if self.is_empty() {
      Self::TOP_OF_PIPE
    } else {
      self
    }
  }
}
