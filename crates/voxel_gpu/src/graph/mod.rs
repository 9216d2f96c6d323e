//! Render/task graph with automatic resource state tracking.
//!
//! # Module Structure
//!
//! ```text
//! graph/
//! ├── resource_state.rs  AccessFlags, StageFlags, ImageLayout, ResourceState
//! ├── resource.rs        ResourceId, ResourceDesc (buffer range | image)
//! ├── barrier.rs         Barrier, BarrierBatch (one per pass)
//! ├── pass.rs            Pass builder: reads / writes / reads_writes / condition
//! └── graph.rs           RenderGraph: ordering, barrier insertion, execution
//! ```
//!
//! A barrier is emitted for a usage when access, stage or queue family
//! differ from the resource's last state, or, for images, when the layout
//! differs. Identical states emit nothing.

mod barrier;
#[allow(clippy::module_inception)]
mod graph;
mod pass;
mod resource;
mod resource_state;

pub use barrier::{Barrier, BarrierBatch, BarrierTarget};
pub use graph::{DebugEvent, ExecutionOrder, ExecutionReport, GraphDesc, PassId, RenderGraph};
pub use pass::{FrameContext, Pass, PassCallback, PassCondition, PassKind, ResourceUsage};
pub use resource::{Resource, ResourceDesc, ResourceId, ResourceKind};
pub use resource_state::{
  AccessFlags, ImageLayout, ResourceState, StageFlags, QUEUE_FAMILY_IGNORED,
};
