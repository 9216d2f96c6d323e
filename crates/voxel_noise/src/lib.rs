//! Seeded Perlin noise and fBm for voxel terrain.
//!
//! The same functions back the noise compute kernel and its CPU reference,
//! so a grid filled here is bit-identical to one produced by a dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ perlin.rs                                                   │
//! │   hash3()  ──► grad() (12 gradients in 16 slots)            │
//! │   fade()   ──► trilinear blend ──► perlin3() in [0, 1]      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ fbm.rs                                                      │
//! │   Fbm::sample()   octave i: seed + i, amp *= persistence,   │
//! │                   freq *= lacunarity, stop at amp < 0.001   │
//! │   fill_grid_3d()  dense X-fastest grid fill                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//! ```
//! use voxel_noise::{fill_grid_3d, Fbm};
//!
//! let fbm = Fbm::default().with_seed(1337).with_octaves(4);
//! let mut output = vec![0.0f32; 8 * 8 * 8];
//! fill_grid_3d(&mut output, &fbm, [0, 0, 0], [8, 8, 8], 1.0, 0.1);
//! assert!(output.iter().all(|v| (0.0..=1.0).contains(v)));
//! ```

mod fbm;
mod perlin;

pub use fbm::{fill_grid_3d, Fbm, AMPLITUDE_CUTOFF, MAX_OCTAVES};
pub use perlin::{fade, grad, hash3, perlin3, perlin3_signed};

#[cfg(test)]
mod tests {
  use super::*;

  fn reference_grid(fbm: &Fbm, offset: [i32; 3]) -> Vec<f32> {
    let mut output = vec![0.0f32; 8 * 8 * 8];
    fill_grid_3d(&mut output, fbm, offset, [8, 8, 8], 1.0, 0.1);
    output
  }

  #[test]
  fn test_fade_endpoints() {
    assert_eq!(fade(0.0), 0.0);
    assert_eq!(fade(1.0), 1.0);
    assert!((fade(0.5) - 0.5).abs() < 1e-6);
  }

  #[test]
  fn test_grad_uses_low_four_bits() {
    for h in 0..16u32 {
      assert_eq!(grad(h, 0.3, -0.7, 0.9), grad(h + 16 * 37, 0.3, -0.7, 0.9));
    }
  }

  #[test]
  fn test_perlin_zero_on_lattice() {
    // Gradient noise vanishes at integer lattice points.
    for (x, y, z) in [(0, 0, 0), (3, -2, 7), (-5, 4, 1)] {
      let n = perlin3_signed(42, x as f32, y as f32, z as f32);
      assert!(n.abs() < 1e-6, "lattice ({x},{y},{z}) gave {n}");
      assert!((perlin3(42, x as f32, y as f32, z as f32) - 0.5).abs() < 1e-6);
    }
  }

  #[test]
  fn test_perlin_in_unit_range() {
    for i in 0..1000 {
      let t = i as f32 * 0.173;
      let v = perlin3(7, t, t * 0.61, -t * 1.37);
      assert!((0.0..=1.0).contains(&v), "sample {i} out of range: {v}");
    }
  }

  #[test]
  fn test_seed_changes_output() {
    let a = perlin3(1, 0.37, 1.21, 2.53);
    let b = perlin3(2, 0.37, 1.21, 2.53);
    assert_ne!(a, b);
  }

  #[test]
  fn test_fbm_deterministic_grid() {
    let fbm = Fbm::default()
      .with_seed(1)
      .with_octaves(8)
      .with_lacunarity(2.0)
      .with_persistence(0.5);

    let first = reference_grid(&fbm, [0, 0, 0]);
    let second = reference_grid(&fbm, [0, 0, 0]);
    assert_eq!(
      first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
      second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
    );
    assert!(first.iter().any(|&v| v != first[0]), "grid is constant");
  }

  #[test]
  fn test_fbm_octave_clamp() {
    let many = Fbm::default().with_octaves(64);
    let eight = Fbm::default().with_octaves(MAX_OCTAVES);
    assert_eq!(many.sample(1.3, 2.7, 0.4), eight.sample(1.3, 2.7, 0.4));
  }

  #[test]
  fn test_fbm_amplitude_cutoff() {
    // 0.25^4 = 0.0039 is kept, 0.25^5 = 0.00098 falls below the cutoff.
    let fbm = Fbm::default().with_persistence(0.25);
    assert_eq!(fbm.effective_octaves(), 5);
    assert_eq!(Fbm::default().with_persistence(0.0).effective_octaves(), 1);
    assert_eq!(Fbm::default().with_octaves(0).sample(0.5, 0.5, 0.5), 0.0);
  }

  #[test]
  fn test_single_octave_matches_perlin() {
    let fbm = Fbm::default().with_seed(9).with_octaves(1);
    let p = (0.25, 1.75, -3.5);
    assert_eq!(fbm.sample(p.0, p.1, p.2), perlin3(9, p.0, p.1, p.2));
  }

  /// Adjacent grids must agree where they overlap so chunk seams line up.
  #[test]
  fn test_adjacent_grid_edge_coherency() {
    let fbm = Fbm::default().with_seed(1337).with_octaves(4);
    let a = reference_grid(&fbm, [0, 0, 0]);
    let b = reference_grid(&fbm, [4, 0, 0]);

    for z in 0..8 {
      for y in 0..8 {
        for x in 0..4 {
          let a_idx = z * 64 + y * 8 + (x + 4);
          let b_idx = z * 64 + y * 8 + x;
          assert_eq!(a[a_idx].to_bits(), b[b_idx].to_bits());
        }
      }
    }
  }
}
