//! Fractal Brownian motion over [`perlin3`](crate::perlin3).

use crate::perlin::perlin3;

/// Hard ceiling on octaves evaluated per sample.
pub const MAX_OCTAVES: u32 = 8;

/// Octaves stop once their amplitude falls below this.
pub const AMPLITUDE_CUTOFF: f32 = 0.001;

/// Octave stacking parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fbm {
  pub seed: i32,
  /// Requested octaves, clamped to [`MAX_OCTAVES`].
  pub octaves: u32,
  /// Frequency multiplier per octave.
  pub lacunarity: f32,
  /// Amplitude multiplier per octave.
  pub persistence: f32,
}

impl Default for Fbm {
  fn default() -> Self {
    Self {
      seed: 1,
      octaves: MAX_OCTAVES,
      lacunarity: 2.0,
      persistence: 0.5,
    }
  }
}

impl Fbm {
  pub fn with_seed(mut self, seed: i32) -> Self {
    self.seed = seed;
    self
  }

  pub fn with_octaves(mut self, octaves: u32) -> Self {
    self.octaves = octaves;
    self
  }

  pub fn with_lacunarity(mut self, lacunarity: f32) -> Self {
    self.lacunarity = lacunarity;
    self
  }

  pub fn with_persistence(mut self, persistence: f32) -> Self {
    self.persistence = persistence;
    self
  }

  /// Octaves that actually contribute for these parameters.
  pub fn effective_octaves(&self) -> u32 {
    let mut amplitude = 1.0f32;
    let mut count = 0;
    for _ in 0..self.octaves.min(MAX_OCTAVES) {
      if amplitude < AMPLITUDE_CUTOFF {
        break;
      }
      count += 1;
      amplitude *= self.persistence;
    }
    count
  }

  /// Sample the fractal at `p`, normalized by the total amplitude used.
  ///
  /// Octave `i` uses seed `seed + i`. Returns 0 when no octave contributes.
  pub fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
    let mut sum = 0.0f32;
    let mut total = 0.0f32;
    let mut amplitude = 1.0f32;
    let mut frequency = 1.0f32;

    for octave in 0..self.octaves.min(MAX_OCTAVES) {
      if amplitude < AMPLITUDE_CUTOFF {
        break;
      }
      let seed = self.seed.wrapping_add(octave as i32);
      sum += amplitude * perlin3(seed, x * frequency, y * frequency, z * frequency);
      total += amplitude;
      amplitude *= self.persistence;
      frequency *= self.lacunarity;
    }

    if total > 0.0 {
      sum / total
    } else {
      0.0
    }
  }
}

/// Fill a dense grid, X fastest: `index = z*sx*sy + y*sx + x`.
///
/// Sample position is `(cell + offset) * scale * frequency`.
pub fn fill_grid_3d(
  output: &mut [f32],
  fbm: &Fbm,
  offset: [i32; 3],
  size: [u32; 3],
  scale: f32,
  frequency: f32,
) {
  let [sx, sy, sz] = size.map(|s| s as usize);
  assert!(output.len() >= sx * sy * sz, "output too small for grid");
  let step = scale * frequency;

  for z in 0..sz {
    let pz = (z as i32 + offset[2]) as f32 * step;
    for y in 0..sy {
      let py = (y as i32 + offset[1]) as f32 * step;
      let row = z * sx * sy + y * sx;
      for x in 0..sx {
        let px = (x as i32 + offset[0]) as f32 * step;
        output[row + x] = fbm.sample(px, py, pz);
      }
    }
  }
}
