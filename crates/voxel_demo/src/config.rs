//! Demo configuration: which regions to generate and the renderer settings.

use std::path::Path;

use anyhow::{Context, Result};
use glam::IVec3;
use serde::Deserialize;
use voxel_gpu::RendererConfig;

/// Root configuration of the demo.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
  /// Region coordinates, generated in order.
  pub regions: Vec<[i32; 3]>,
  /// Chunks decoded per region for compression statistics.
  pub chunk_samples: u32,
  pub renderer: RendererConfig,
}

impl Default for DemoConfig {
  fn default() -> Self {
    Self {
      regions: vec![[0, 0, 0]],
      chunk_samples: 8,
      renderer: RendererConfig::default(),
    }
  }
}

impl DemoConfig {
  /// Load configuration from a TOML file.
  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Self::parse(&content)
  }

  pub fn parse(content: &str) -> Result<Self> {
    let config: DemoConfig =
      toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
    config
      .renderer
      .validate()
      .with_context(|| "Invalid renderer settings")?;
    if config.regions.is_empty() {
      anyhow::bail!("Config must list at least one region");
    }
    Ok(config)
  }

  /// Replace the region list with `count` regions in a row along +X.
  pub fn with_region_row(mut self, count: u32) -> Self {
    self.regions = (0..count as i32).map(|x| [x, 0, 0]).collect();
    self
  }

  pub fn with_seed(mut self, seed: i32) -> Self {
    self.renderer.noise.seed = seed;
    self
  }

  pub fn region_coords(&self) -> impl Iterator<Item = IVec3> + '_ {
    self.regions.iter().map(|&r| IVec3::from_array(r))
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
