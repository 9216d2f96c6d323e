//! GPU-resident voxel pipeline: heap wire format and compute kernels.
//!
//! # Module Structure
//!
//! ```text
//! voxel/
//! ├── layout.rs     #[repr(C)] heap structs shared by CPU and kernels
//! ├── noise.rs      fBm noise grid
//! ├── terrain.rs    noise → raw block IDs
//! ├── palette.rs    per-chunk palette build + index packing
//! ├── bitpack.rs    packed index stream (device CAS splices, CPU decode)
//! ├── bitmap.rs     packed chunks → occupancy columns
//! ├── quad.rs       face masks and quad emission
//! ├── face_mesh.rs  one quad per face
//! ├── greedy.rs     binary greedy meshing
//! └── draw.rs       draw arguments and procedural quad vertices
//! ```
//!
//! # Stage Order
//!
//! ```text
//! noise ─► terrain ─► palette(build) ─► palette(pack) ─► bitmap ─► mesh ─► finalize ─► draw
//! ```

pub mod bitmap;
pub mod bitpack;
pub mod draw;
pub mod face_mesh;
pub mod greedy;
pub mod layout;
pub mod noise;
pub mod palette;
pub mod quad;
pub mod terrain;

use std::sync::Arc;

use crate::config::PackWord;
use crate::device::ComputeKernel;
use crate::shader::{KernelLibrary, Specialization};

pub use bitmap::BitmapKernel;
pub use bitpack::{decompress_chunk, CompressionStats};
pub use draw::{FinalizeKernel, QuadVertexProgram, VERTICES_PER_QUAD};
pub use face_mesh::FaceMeshKernel;
pub use greedy::GreedyMeshKernel;
pub use noise::{noise_dispatch, NoiseKernel};
pub use palette::{PaletteKernel, PalettePhase, SPEC_PACK_WORD, SPEC_PALETTE_PHASE};
pub use terrain::TerrainKernel;

// Entry point names.
pub const NOISE_KERNEL: &str = "voxel_noise";
pub const TERRAIN_KERNEL: &str = "voxel_terrain";
pub const PALETTE_KERNEL: &str = "palette_compress";
pub const BITMAP_KERNEL: &str = "occupancy_bitmap";
pub const FACE_MESH_KERNEL: &str = "face_mesh";
pub const GREEDY_MESH_KERNEL: &str = "greedy_mesh";
pub const FINALIZE_KERNEL: &str = "finalize_draw";
pub const QUAD_VERTEX: &str = "quad_vertex";

fn palette_kernel(spec: &Specialization) -> Result<Arc<dyn ComputeKernel>, String> {
  let phase = match spec.get(SPEC_PALETTE_PHASE).unwrap_or(0) {
    0 => PalettePhase::Build,
    1 => PalettePhase::Pack,
    other => return Err(format!("palette phase must be 0 or 1, got {other}")),
  };
  let word = match spec.get(SPEC_PACK_WORD).unwrap_or(32) {
    32 => PackWord::U32,
    64 => PackWord::U64,
    other => return Err(format!("pack word must be 32 or 64 bits, got {other}")),
  };
  Ok(Arc::new(PaletteKernel::new(phase, word)))
}

/// Every voxel pipeline entry point, ready for a host device.
pub fn kernel_library() -> KernelLibrary {
  let mut library = KernelLibrary::new();
  library
    .register_compute(NOISE_KERNEL, |_| Ok(Arc::new(NoiseKernel)))
    .register_compute(TERRAIN_KERNEL, |_| Ok(Arc::new(TerrainKernel)))
    .register_compute(PALETTE_KERNEL, palette_kernel)
    .register_compute(BITMAP_KERNEL, |_| Ok(Arc::new(BitmapKernel)))
    .register_compute(FACE_MESH_KERNEL, |_| Ok(Arc::new(FaceMeshKernel)))
    .register_compute(GREEDY_MESH_KERNEL, |_| Ok(Arc::new(GreedyMeshKernel)))
    .register_compute(FINALIZE_KERNEL, |_| Ok(Arc::new(FinalizeKernel)))
    .register_vertex(QUAD_VERTEX, |_| Ok(Arc::new(QuadVertexProgram)));
  library
}
