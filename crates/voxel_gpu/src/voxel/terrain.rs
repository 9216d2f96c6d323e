//! Terrain kernel: noise → raw per-chunk block IDs.
//!
//! ```text
//!  noise[64³] ──► classify ──► solid? ──yes──► raw[chunk][voxel] = block
//!                                  └───no───► (no write; buffer stays 0)
//! ```

use glam::{IVec3, UVec3};

use super::layout::{ChunkHeader, NoiseContext, PushConstants, RegionHeader, TerrainParams};
use super::TERRAIN_KERNEL;
use crate::config::TerrainMode;
use crate::constants::{
  chunk_voxel_index, region_chunk_index, region_voxel_index, AIR, CHUNK_SIZE, REGION_SIZE,
};
use crate::device::{ComputeKernel, Workgroup};

pub const TERRAIN_WORKGROUP: [u32; 3] = [4, 4, 4];

/// Angular frequency of the sine-wave test profile, per voxel.
const SINE_FREQUENCY: f32 = 0.2;

/// Block at `local` (region voxel) / `world`, or [`AIR`].
///
/// `noise` returns the noise value at a region voxel.
pub fn classify(
  params: &TerrainParams,
  noise: impl Fn(UVec3) -> f32,
  local: UVec3,
  world: IVec3,
) -> u32 {
  let y = world.y as f32;
  let surface_depth = params.surface_depth as f32;

  let depth = match TerrainMode::from_code(params.mode) {
    TerrainMode::Density3d => {
      let n = noise(local);
      let density = (n - 0.5) * params.height_scale - (y - params.height_offset) * params.squish;
      if density <= 0.0 {
        return AIR;
      }
      // Density units to voxels.
      density / params.squish.max(f32::EPSILON)
    }
    TerrainMode::Heightmap => {
      let n = noise(UVec3::new(local.x, 0, local.z));
      let height = params.height_offset + n * params.height_scale;
      if y >= height {
        return AIR;
      }
      height - y
    }
    TerrainMode::SineWave => {
      let wave = (world.x as f32 * SINE_FREQUENCY).sin() + (world.z as f32 * SINE_FREQUENCY).sin();
      let height = params.height_offset + params.height_scale * 0.25 * wave;
      if y >= height {
        return AIR;
      }
      height - y
    }
  };

  if depth <= surface_depth {
    params.surface_block
  } else {
    params.deep_block
  }
}

/// One invocation per region voxel; writes only solid voxels.
///
/// Push constants: `region` is the [`RegionHeader`], `params` the
/// [`TerrainParams`].
pub struct TerrainKernel;

impl ComputeKernel for TerrainKernel {
  fn name(&self) -> &str {
    TERRAIN_KERNEL
  }

  fn workgroup_size(&self) -> [u32; 3] {
    TERRAIN_WORKGROUP
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let pc: PushConstants = wg.push_constants();
    let memory = wg.memory();
    let region: RegionHeader = memory.read(pc.address(pc.region));
    let params: TerrainParams = memory.read(pc.address(pc.params));
    let noise_ctx: NoiseContext = memory.read(pc.address(region.noise));
    let origin = IVec3::from_array(region.world_origin());

    let noise_at = |p: UVec3| {
      let index = region_voxel_index(p.x, p.y, p.z) as u64;
      memory.load_f32(pc.address(noise_ctx.output + index * 4))
    };

    wg.invocations(|inv, _| {
      let g = inv.global;
      if g.cmpge(UVec3::splat(REGION_SIZE)).any() {
        return;
      }
      let block = classify(&params, noise_at, g, origin + g.as_ivec3());
      if block == AIR {
        return;
      }

      let c = g / CHUNK_SIZE;
      let l = g % CHUNK_SIZE;
      let chunk_index = region_chunk_index(c.x, c.y, c.z) as u64;
      let chunk_offset = memory.load_u64(pc.address(region.chunk_table + chunk_index * 8));
      let chunk: ChunkHeader = memory.read(pc.address(chunk_offset));
      let voxel = chunk_voxel_index(l.x, l.y, l.z) as u64;
      memory.store_u32(pc.address(chunk.raw + voxel * 4), block);
    });
  }
}

#[cfg(test)]
#[path = "terrain_test.rs"]
mod terrain_test;
