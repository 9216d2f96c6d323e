//! Pass declarations.

use smallvec::SmallVec;

use super::resource::ResourceId;
use super::resource_state::ResourceState;
use crate::error::GraphError;

/// Per-execution inputs handed to every pass callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameContext {
  pub frame_index: u64,
  /// Condition bits tested against each pass's [`PassCondition`].
  pub conditions: u32,
}

impl FrameContext {
  pub fn new(frame_index: u64) -> Self {
    Self {
      frame_index,
      conditions: 0,
    }
  }

  pub fn with_conditions(mut self, conditions: u32) -> Self {
    self.conditions = conditions;
    self
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
  Compute,
  Raster,
  Transfer,
}

/// Pass runs only when `frame.conditions & mask == value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassCondition {
  pub mask: u32,
  pub value: u32,
}

impl PassCondition {
  pub fn matches(&self, conditions: u32) -> bool {
    conditions & self.mask == self.value
  }
}

/// A resource a pass touches and the state it needs it in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceUsage {
  pub resource: ResourceId,
  pub state: ResourceState,
}

pub type PassCallback<'a, C> = Box<dyn FnMut(&mut C, &FrameContext) -> Result<(), GraphError> + 'a>;

/// A named unit of GPU work with ordered inputs and outputs.
pub struct Pass<'a, C> {
  name: String,
  kind: PassKind,
  inputs: SmallVec<[ResourceUsage; 4]>,
  outputs: SmallVec<[ResourceUsage; 4]>,
  condition: Option<PassCondition>,
  callback: Option<PassCallback<'a, C>>,
}

impl<'a, C> Pass<'a, C> {
  pub fn new(name: impl Into<String>, kind: PassKind) -> Self {
    Self {
      name: name.into(),
      kind,
      inputs: SmallVec::new(),
      outputs: SmallVec::new(),
      condition: None,
      callback: None,
    }
  }

  pub fn compute(name: impl Into<String>) -> Self {
    Self::new(name, PassKind::Compute)
  }

  pub fn raster(name: impl Into<String>) -> Self {
    Self::new(name, PassKind::Raster)
  }

  pub fn transfer(name: impl Into<String>) -> Self {
    Self::new(name, PassKind::Transfer)
  }

  /// Declare a read.
  pub fn reads(mut self, resource: ResourceId, state: ResourceState) -> Self {
    self.inputs.push(ResourceUsage { resource, state });
    self
  }

  /// Declare a write.
  pub fn writes(mut self, resource: ResourceId, state: ResourceState) -> Self {
    self.outputs.push(ResourceUsage { resource, state });
    self
  }

  /// Declare a read-modify-write (atomics, CAS loops). The usage lands in
  /// both inputs and outputs; barrier planning merges the two.
  pub fn reads_writes(self, resource: ResourceId, state: ResourceState) -> Self {
    self.reads(resource, state).writes(resource, state)
  }

  pub fn condition(mut self, mask: u32, value: u32) -> Self {
    self.condition = Some(PassCondition { mask, value });
    self
  }

  pub fn execute(
    mut self,
    callback: impl FnMut(&mut C, &FrameContext) -> Result<(), GraphError> + 'a,
  ) -> Self {
    self.callback = Some(Box::new(callback));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> PassKind {
    self.kind
  }

  pub fn inputs(&self) -> &[ResourceUsage] {
    &self.inputs
  }

  pub fn outputs(&self) -> &[ResourceUsage] {
    &self.outputs
  }

  pub(crate) fn is_enabled(&self, frame: &FrameContext) -> bool {
    self
      .condition
      .map_or(true, |c| c.matches(frame.conditions))
  }

  /// Inputs first, then outputs, in declaration order.
  pub(crate) fn usages(&self) -> impl Iterator<Item = &ResourceUsage> {
    self.inputs.iter().chain(self.outputs.iter())
  }

  pub(crate) fn writes_resource(&self, resource: ResourceId) -> bool {
    self.outputs.iter().any(|u| u.resource == resource)
  }

  pub(crate) fn touches(&self, resource: ResourceId) -> bool {
    self.usages().any(|u| u.resource == resource)
  }

  pub(crate) fn run(&mut self, cmd: &mut C, frame: &FrameContext) -> Result<(), GraphError> {
    match self.callback.as_mut() {
      Some(callback) => callback(cmd, frame),
      None => Ok(()),
    }
  }
}

impl<C> std::fmt::Debug for Pass<'_, C> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pass")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("inputs", &self.inputs)
      .field("outputs", &self.outputs)
      .field("condition", &self.condition)
      .finish()
  }
}
