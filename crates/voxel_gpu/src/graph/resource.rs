//! Graph resources: whole images or buffer ranges with tracked state.

use super::resource_state::ResourceState;
use crate::device::{BufferHandle, ImageHandle};

/// Index of a resource within one graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
  /// Id carried by barriers recorded outside any graph.
  pub const UNTRACKED: Self = Self(u32::MAX);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
  Buffer,
  Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceDesc {
  /// A byte range of a buffer. Distinct ranges of one buffer are tracked
  /// independently.
  Buffer {
    buffer: BufferHandle,
    offset: u64,
    size: u64,
  },
  /// A whole image (all mips and layers).
  Image { image: ImageHandle },
}

impl ResourceDesc {
  pub fn buffer(buffer: BufferHandle, offset: u64, size: u64) -> Self {
    Self::Buffer {
      buffer,
      offset,
      size,
    }
  }

  pub fn image(image: ImageHandle) -> Self {
    Self::Image { image }
  }

  pub fn kind(&self) -> ResourceKind {
    match self {
      Self::Buffer { .. } => ResourceKind::Buffer,
      Self::Image { .. } => ResourceKind::Image,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Resource {
  pub name: String,
  pub desc: ResourceDesc,
  pub state: ResourceState,
}

impl Resource {
  pub fn is_image(&self) -> bool {
    self.desc.kind() == ResourceKind::Image
  }
}
