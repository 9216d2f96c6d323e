//! Renderer configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! initial_heap_size = 8388608
//! quad_capacity = 65536
//! execution_order = "insertion_order"
//! mesher = "greedy"
//! pack_word = "u32"
//!
//! [noise]
//! seed = 1
//! frequency = 0.02
//!
//! [terrain]
//! mode = "heightmap"
//! height_scale = 24.0
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::ExecutionOrder;
use voxel_noise::MAX_OCTAVES;

/// Face extraction kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MesherKind {
  /// One 1×1 quad per exposed face.
  Simple,
  /// Workgroup-cooperative rectangle merging.
  #[default]
  Greedy,
}

/// Word size of the bit-packed palette index stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackWord {
  #[default]
  U32,
  /// 64-bit words addressed through byte offsets; data aligned to 8.
  U64,
}

impl PackWord {
  pub const fn bits(self) -> u32 {
    match self {
      PackWord::U32 => 32,
      PackWord::U64 => 64,
    }
  }
}

/// Solid/air rule of the terrain kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainMode {
  /// 3D density: `(n - 0.5) * height_scale - (y - height_offset) * squish > 0`.
  Density3d,
  /// Column height from the noise at `y = 0`: `height_offset + n * height_scale`.
  #[default]
  Heightmap,
  /// Deterministic sine-wave height profile; ignores noise.
  SineWave,
}

impl TerrainMode {
  /// Code stored in the terrain parameter block.
  pub const fn code(self) -> u32 {
    match self {
      TerrainMode::Density3d => 0,
      TerrainMode::Heightmap => 1,
      TerrainMode::SineWave => 2,
    }
  }

  pub const fn from_code(code: u32) -> Self {
    match code {
      0 => TerrainMode::Density3d,
      2 => TerrainMode::SineWave,
      _ => TerrainMode::Heightmap,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseSettings {
  pub seed: i32,
  /// Clamped to 8.
  pub octaves: u32,
  pub scale: f32,
  pub frequency: f32,
  pub lacunarity: f32,
  pub persistence: f32,
}

impl Default for NoiseSettings {
  fn default() -> Self {
    Self {
      seed: 1,
      octaves: MAX_OCTAVES,
      scale: 1.0,
      frequency: 0.02,
      lacunarity: 2.0,
      persistence: 0.5,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainSettings {
  pub mode: TerrainMode,
  pub height_scale: f32,
  pub height_offset: f32,
  /// Vertical squish of the density field.
  pub squish: f32,
  /// Block written within `surface_depth` voxels of the surface.
  pub surface_block: u32,
  /// Block written below that.
  pub deep_block: u32,
  pub surface_depth: u32,
}

impl Default for TerrainSettings {
  fn default() -> Self {
    Self {
      mode: TerrainMode::Heightmap,
      height_scale: 24.0,
      height_offset: 16.0,
      squish: 0.05,
      surface_block: 1,
      deep_block: 1,
      surface_depth: 3,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
  /// Starting heap capacity in bytes. The heap grows on demand.
  pub initial_heap_size: u64,
  /// Quad slots per region; quads past this are dropped.
  pub quad_capacity: u32,
  pub execution_order: ExecutionOrder,
  pub mesher: MesherKind,
  pub pack_word: PackWord,
  /// Keep the graph's per-pass barrier log.
  pub record_debug_info: bool,
  pub noise: NoiseSettings,
  pub terrain: TerrainSettings,
}

impl Default for RendererConfig {
  fn default() -> Self {
    Self {
      initial_heap_size: 8 << 20,
      quad_capacity: crate::constants::DEFAULT_QUAD_CAPACITY,
      execution_order: ExecutionOrder::InsertionOrder,
      mesher: MesherKind::Greedy,
      pack_word: PackWord::U32,
      record_debug_info: false,
      noise: NoiseSettings::default(),
      terrain: TerrainSettings::default(),
    }
  }
}

impl RendererConfig {
  /// Parse and validate a TOML document.
  pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
    let config: RendererConfig = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.initial_heap_size == 0 {
      return Err(ConfigError::Invalid("initial_heap_size must be non-zero".into()));
    }
    if self.quad_capacity == 0 {
      return Err(ConfigError::Invalid("quad_capacity must be non-zero".into()));
    }
    if !(self.noise.scale.is_finite() && self.noise.frequency.is_finite()) {
      return Err(ConfigError::Invalid("noise scale and frequency must be finite".into()));
    }
    if !(0.0..=1.0).contains(&self.noise.persistence) {
      return Err(ConfigError::Invalid(format!(
        "noise persistence must be in [0, 1], got {}",
        self.noise.persistence
      )));
    }
    let t = &self.terrain;
    if t.surface_block == 0 || t.deep_block == 0 {
      return Err(ConfigError::Invalid(
        "solid block IDs must be non-zero (0 is air)".into(),
      ));
    }
    if t.surface_block >= u32::MAX || t.deep_block >= u32::MAX {
      return Err(ConfigError::Invalid("block ID u32::MAX is reserved".into()));
    }
    Ok(())
  }

  pub fn with_initial_heap_size(mut self, size: u64) -> Self {
    self.initial_heap_size = size;
    self
  }

  pub fn with_quad_capacity(mut self, capacity: u32) -> Self {
    self.quad_capacity = capacity;
    self
  }

  pub fn with_execution_order(mut self, order: ExecutionOrder) -> Self {
    self.execution_order = order;
    self
  }

  pub fn with_mesher(mut self, mesher: MesherKind) -> Self {
    self.mesher = mesher;
    self
  }

  pub fn with_pack_word(mut self, word: PackWord) -> Self {
    self.pack_word = word;
    self
  }

  pub fn with_debug_info(mut self, enabled: bool) -> Self {
    self.record_debug_info = enabled;
    self
  }

  pub fn with_noise(mut self, noise: NoiseSettings) -> Self {
    self.noise = noise;
    self
  }

  pub fn with_terrain(mut self, terrain: TerrainSettings) -> Self {
    self.terrain = terrain;
    self
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
