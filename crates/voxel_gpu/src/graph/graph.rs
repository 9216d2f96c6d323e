//! Graph construction and execution.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use web_time::Instant;

use super::barrier::{Barrier, BarrierBatch};
use super::pass::{FrameContext, Pass, PassKind};
use super::resource::{Resource, ResourceDesc, ResourceId};
use super::resource_state::ResourceState;
use crate::device::CommandContext;
use crate::error::GraphError;

/// Index of a pass within one graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub u32);

/// How passes are ordered before execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOrder {
  /// Exactly as added.
  #[default]
  InsertionOrder,
  /// Kahn levels over declared hazards (RAW, WAR, WAW); passes of one level
  /// keep their insertion order.
  Topological,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphDesc {
  pub execution_order: ExecutionOrder,
  /// Keep a log of executed passes and emitted barriers.
  pub record_debug_info: bool,
}

impl GraphDesc {
  pub fn with_execution_order(mut self, order: ExecutionOrder) -> Self {
    self.execution_order = order;
    self
  }

  pub fn with_debug_info(mut self, enabled: bool) -> Self {
    self.record_debug_info = enabled;
    self
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebugEvent {
  Pass {
    name: String,
    kind: PassKind,
    barriers: usize,
  },
  Barrier {
    pass: String,
    resource: String,
    src: ResourceState,
    dst: ResourceState,
  },
  Skipped {
    name: String,
  },
}

/// Outcome of one [`RenderGraph::execute`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
  /// Executed passes, in order, with the barriers emitted before each.
  pub passes: Vec<(String, usize)>,
  pub skipped: Vec<String>,
  pub barriers: usize,
  pub barrier_batches: usize,
  /// Time spent recording, in microseconds.
  pub record_us: u64,
}

impl ExecutionReport {
  pub fn barriers_before(&self, pass: &str) -> Option<usize> {
    self
      .passes
      .iter()
      .find(|(name, _)| name == pass)
      .map(|(_, n)| *n)
  }
}

/// Declarative pass list with automatic barrier insertion.
///
/// ```text
/// for pass in order:
///   required = merge(inputs ++ outputs) per resource
///   batch    = { barrier(current → required) | states differ }
///   record   pipeline_barrier(batch)      (skipped when empty)
///   run      pass callback
///   commit   current = required
/// ```
pub struct RenderGraph<'a, C> {
  desc: GraphDesc,
  resources: Vec<Resource>,
  passes: Vec<Pass<'a, C>>,
  debug: Vec<DebugEvent>,
}

impl<'a, C: CommandContext> RenderGraph<'a, C> {
  pub fn new(desc: GraphDesc) -> Self {
    Self {
      desc,
      resources: Vec::new(),
      passes: Vec::new(),
      debug: Vec::new(),
    }
  }

  pub fn add_resource(
    &mut self,
    name: impl Into<String>,
    desc: ResourceDesc,
    initial_state: ResourceState,
  ) -> ResourceId {
    let id = ResourceId(self.resources.len() as u32);
    self.resources.push(Resource {
      name: name.into(),
      desc,
      state: initial_state,
    });
    id
  }

  pub fn add_pass(&mut self, pass: Pass<'a, C>) -> PassId {
    let id = PassId(self.passes.len() as u32);
    self.passes.push(pass);
    id
  }

  pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
    self.resources.get(id.0 as usize)
  }

  pub fn resource_state(&self, id: ResourceId) -> Option<ResourceState> {
    self.resource(id).map(|r| r.state)
  }

  pub fn pass_count(&self) -> usize {
    self.passes.len()
  }

  /// Pass indices in execution order.
  pub fn execution_order(&self) -> Vec<usize> {
    match self.desc.execution_order {
      ExecutionOrder::InsertionOrder => (0..self.passes.len()).collect(),
      ExecutionOrder::Topological => self.topological_order(),
    }
  }

  fn depends(&self, earlier: usize, later: usize) -> bool {
    let (a, b) = (&self.passes[earlier], &self.passes[later]);
    a.usages().any(|u| {
      b.touches(u.resource) && (a.writes_resource(u.resource) || b.writes_resource(u.resource))
    })
  }

  fn topological_order(&self) -> Vec<usize> {
    let n = self.passes.len();
    let mut successors: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
    let mut in_degree = vec![0usize; n];
    for later in 0..n {
      for earlier in 0..later {
        if self.depends(earlier, later) {
          successors[earlier].push(later);
          in_degree[later] += 1;
        }
      }
    }

    let mut order = Vec::with_capacity(n);
    let mut level: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    while !level.is_empty() {
      let mut next = Vec::new();
      for &p in &level {
        for &s in &successors[p] {
          in_degree[s] -= 1;
          if in_degree[s] == 0 {
            next.push(s);
          }
        }
      }
      order.extend_from_slice(&level);
      next.sort_unstable();
      level = next;
    }
    order
  }

  /// Merge every usage of the pass into one required state per resource.
  fn required_states(
    &self,
    pass: &Pass<'a, C>,
  ) -> Result<SmallVec<[(ResourceId, ResourceState); 8]>, GraphError> {
    let mut required: SmallVec<[(ResourceId, ResourceState); 8]> = SmallVec::new();
    for usage in pass.usages() {
      let Some(resource) = self.resource(usage.resource) else {
        return Err(GraphError::UnknownResource {
          pass: pass.name().to_string(),
          resource: usage.resource.0,
        });
      };
      match required.iter_mut().find(|(id, _)| *id == usage.resource) {
        Some((_, state)) => {
          *state = state
            .merge(usage.state)
            .ok_or_else(|| GraphError::ConflictingLayouts {
              pass: pass.name().to_string(),
              resource: resource.name.clone(),
            })?;
        }
        None => required.push((usage.resource, usage.state)),
      }
    }
    Ok(required)
  }

  /// Record every enabled pass into `cmd` with the barriers it needs.
  ///
  /// Stops at the first error; passes already recorded keep their committed
  /// states.
  #[cfg_attr(feature = "instrument", tracing::instrument(skip_all, name = "graph::execute"))]
  pub fn execute(
    &mut self,
    cmd: &mut C,
    frame: &FrameContext,
  ) -> Result<ExecutionReport, GraphError> {
    let start = Instant::now();
    let mut report = ExecutionReport::default();
    let record = self.desc.record_debug_info;

    for index in self.execution_order() {
      if !self.passes[index].is_enabled(frame) {
        let name = self.passes[index].name().to_string();
        tracing::debug!(pass = %name, conditions = frame.conditions, "pass skipped");
        if record {
          self.debug.push(DebugEvent::Skipped { name: name.clone() });
        }
        report.skipped.push(name);
        continue;
      }

      let required = self.required_states(&self.passes[index])?;

      let mut batch = BarrierBatch::new();
      for (id, state) in &required {
        let resource = &self.resources[id.0 as usize];
        if let Some(barrier) = Barrier::for_transition(*id, resource, state) {
          batch.push(barrier);
        }
      }

      let pass = &mut self.passes[index];
      if !batch.is_empty() {
        tracing::trace!(pass = pass.name(), barriers = batch.len(), "barrier batch");
        cmd.pipeline_barrier(&batch);
        report.barrier_batches += 1;
        report.barriers += batch.len();
      }

      tracing::debug!(pass = pass.name(), kind = ?pass.kind(), "recording pass");
      pass.run(cmd, frame)?;

      if record {
        self.debug.push(DebugEvent::Pass {
          name: pass.name().to_string(),
          kind: pass.kind(),
          barriers: batch.len(),
        });
        for barrier in batch.iter() {
          self.debug.push(DebugEvent::Barrier {
            pass: pass.name().to_string(),
            resource: self.resources[barrier.resource.0 as usize].name.clone(),
            src: barrier.src,
            dst: barrier.dst,
          });
        }
      }
      report.passes.push((pass.name().to_string(), batch.len()));

      for (id, state) in required {
        self.resources[id.0 as usize].state = state;
      }
    }

    report.record_us = start.elapsed().as_micros() as u64;
    Ok(report)
  }

  pub fn debug_info(&self) -> &[DebugEvent] {
    &self.debug
  }

  /// Human-readable dump of the debug log.
  pub fn debug_string(&self) -> String {
    let mut out = String::new();
    for event in &self.debug {
      let _ = match event {
        DebugEvent::Pass {
          name,
          kind,
          barriers,
        } => writeln!(out, "pass {name} ({kind:?}), {barriers} barrier(s)"),
        DebugEvent::Barrier {
          resource, src, dst, ..
        } => writeln!(
          out,
          "  {resource}: {:?}@{:?} -> {:?}@{:?}",
          src.access, src.stage, dst.access, dst.stage
        ),
        DebugEvent::Skipped { name } => writeln!(out, "skip {name}"),
      };
    }
    out
  }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
