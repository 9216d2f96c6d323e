//! Synchronization state of a graph resource.

use crate::flags::bitmask;

bitmask! {
  /// Memory access types.
  pub struct AccessFlags {
    const SHADER_READ = 1 << 0;
    const SHADER_WRITE = 1 << 1;
    const TRANSFER_READ = 1 << 2;
    const TRANSFER_WRITE = 1 << 3;
    const INDIRECT_COMMAND_READ = 1 << 4;
    const COLOR_ATTACHMENT_READ = 1 << 5;
    const COLOR_ATTACHMENT_WRITE = 1 << 6;
    const HOST_READ = 1 << 7;
    const HOST_WRITE = 1 << 8;
  }
}

bitmask! {
  /// Pipeline stages.
  pub struct StageFlags {
    const TOP_OF_PIPE = 1 << 0;
    const DRAW_INDIRECT = 1 << 1;
    const VERTEX_SHADER = 1 << 2;
    const FRAGMENT_SHADER = 1 << 3;
    const COLOR_ATTACHMENT_OUTPUT = 1 << 4;
    const COMPUTE_SHADER = 1 << 5;
    const TRANSFER = 1 << 6;
    const HOST = 1 << 7;
    const ALL_COMMANDS = 1 << 8;
  }
}

impl AccessFlags {
  /// True when any bit denotes a write.
  pub const fn has_write(self) -> bool {
    self.intersects(
      Self::SHADER_WRITE
        .union(Self::TRANSFER_WRITE)
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::HOST_WRITE),
    )
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
  #[default]
  Undefined,
  General,
  ColorAttachment,
  ShaderReadOnly,
  TransferSrc,
  TransferDst,
  Present,
}

/// Queue family index meaning "no ownership".
pub const QUEUE_FAMILY_IGNORED: u32 = u32::MAX;

/// Last-known (or required) access, stage, layout and owning queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceState {
  pub access: AccessFlags,
  pub stage: StageFlags,
  /// Ignored for buffers.
  pub layout: ImageLayout,
  pub queue_family: u32,
}

impl Default for ResourceState {
  fn default() -> Self {
    Self::UNDEFINED
  }
}

impl ResourceState {
  /// Nothing has touched the resource yet.
  pub const UNDEFINED: Self = Self::new(AccessFlags::NONE, StageFlags::TOP_OF_PIPE);

  pub const fn new(access: AccessFlags, stage: StageFlags) -> Self {
    Self {
      access,
      stage,
      layout: ImageLayout::Undefined,
      queue_family: QUEUE_FAMILY_IGNORED,
    }
  }

  pub const fn compute_read() -> Self {
    Self::new(AccessFlags::SHADER_READ, StageFlags::COMPUTE_SHADER)
  }

  pub const fn compute_write() -> Self {
    Self::new(AccessFlags::SHADER_WRITE, StageFlags::COMPUTE_SHADER)
  }

  pub const fn compute_read_write() -> Self {
    Self::new(
      AccessFlags::SHADER_READ.union(AccessFlags::SHADER_WRITE),
      StageFlags::COMPUTE_SHADER,
    )
  }

  pub const fn transfer_read() -> Self {
    Self::new(AccessFlags::TRANSFER_READ, StageFlags::TRANSFER)
  }

  pub const fn transfer_write() -> Self {
    Self::new(AccessFlags::TRANSFER_WRITE, StageFlags::TRANSFER)
  }

  pub const fn transfer_read_write() -> Self {
    Self::new(
      AccessFlags::TRANSFER_READ.union(AccessFlags::TRANSFER_WRITE),
      StageFlags::TRANSFER,
    )
  }

  pub const fn indirect_read() -> Self {
    Self::new(AccessFlags::INDIRECT_COMMAND_READ, StageFlags::DRAW_INDIRECT)
  }

  pub const fn vertex_read() -> Self {
    Self::new(AccessFlags::SHADER_READ, StageFlags::VERTEX_SHADER)
  }

  pub const fn color_attachment() -> Self {
    Self::new(
      AccessFlags::COLOR_ATTACHMENT_WRITE,
      StageFlags::COLOR_ATTACHMENT_OUTPUT,
    )
    .with_layout(ImageLayout::ColorAttachment)
  }

  pub const fn with_layout(mut self, layout: ImageLayout) -> Self {
    self.layout = layout;
    self
  }

  pub const fn with_queue_family(mut self, queue_family: u32) -> Self {
    self.queue_family = queue_family;
    self
  }

  /// Combine two usages of the same resource within one pass.
  ///
  /// Returns `None` when both constrain the image layout differently.
  pub fn merge(self, other: Self) -> Option<Self> {
    let layout = match (self.layout, other.layout) {
      (a, b) if a == b => a,
      (ImageLayout::Undefined, b) => b,
      (a, ImageLayout::Undefined) => a,
      _ => return None,
    };
    let queue_family = if self.queue_family == QUEUE_FAMILY_IGNORED {
      other.queue_family
    } else {
      self.queue_family
    };
    Some(Self {
      access: self.access | other.access,
      stage: self.stage | other.stage,
      layout,
      queue_family,
    })
  }

  /// Whether moving from `self` to `required` needs a barrier.
  ///
  /// Layout only matters for images.
  pub fn needs_barrier(&self, required: &Self, is_image: bool) -> bool {
    self.access != required.access
      || self.stage != required.stage
      || (is_image && self.layout != required.layout)
      || self.queue_family != required.queue_family
  }
}

#[cfg(test)]
#[path = "resource_state_test.rs"]
mod resource_state_test;
