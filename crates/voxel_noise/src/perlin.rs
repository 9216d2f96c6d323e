//! Seeded 3D gradient noise.

/// Integer mix-hash of a lattice corner.
///
/// Deterministic across platforms: only wrapping integer arithmetic.
#[inline]
pub fn hash3(seed: i32, x: i32, y: i32, z: i32) -> u32 {
  let mut h = (seed as u32)
    ^ (x as u32).wrapping_mul(0x8da6_b343)
    ^ (y as u32).wrapping_mul(0xd816_3841)
    ^ (z as u32).wrapping_mul(0xcb1a_b31f);
  h ^= h >> 15;
  h = h.wrapping_mul(0x2c1b_3c6d);
  h ^= h >> 12;
  h = h.wrapping_mul(0x297a_2d39);
  h ^= h >> 15;
  h
}

/// Dot product with one of the 12 cube-edge gradients.
///
/// The low 4 bits select the gradient; slots 12..16 repeat four of the
/// twelve so every hash value maps to a valid direction.
#[inline]
pub fn grad(hash: u32, x: f32, y: f32, z: f32) -> f32 {
  let h = hash & 15;
  let u = if h < 8 { x } else { y };
  let v = if h < 4 {
    y
  } else if h == 12 || h == 14 {
    x
  } else {
    z
  };
  let u = if h & 1 == 0 { u } else { -u };
  let v = if h & 2 == 0 { v } else { -v };
  u + v
}

/// Quintic smootherstep `t³(6t² − 15t + 10)`.
#[inline]
pub fn fade(t: f32) -> f32 {
  t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
  a + t * (b - a)
}

/// Raw Perlin noise in roughly `[-1, 1]`.
pub fn perlin3_signed(seed: i32, x: f32, y: f32, z: f32) -> f32 {
  let xf = x.floor();
  let yf = y.floor();
  let zf = z.floor();
  let (x0, y0, z0) = (xf as i32, yf as i32, zf as i32);
  let (x1, y1, z1) = (x0.wrapping_add(1), y0.wrapping_add(1), z0.wrapping_add(1));

  let (dx, dy, dz) = (x - xf, y - yf, z - zf);
  let (u, v, w) = (fade(dx), fade(dy), fade(dz));

  let n000 = grad(hash3(seed, x0, y0, z0), dx, dy, dz);
  let n100 = grad(hash3(seed, x1, y0, z0), dx - 1.0, dy, dz);
  let n010 = grad(hash3(seed, x0, y1, z0), dx, dy - 1.0, dz);
  let n110 = grad(hash3(seed, x1, y1, z0), dx - 1.0, dy - 1.0, dz);
  let n001 = grad(hash3(seed, x0, y0, z1), dx, dy, dz - 1.0);
  let n101 = grad(hash3(seed, x1, y0, z1), dx - 1.0, dy, dz - 1.0);
  let n011 = grad(hash3(seed, x0, y1, z1), dx, dy - 1.0, dz - 1.0);
  let n111 = grad(hash3(seed, x1, y1, z1), dx - 1.0, dy - 1.0, dz - 1.0);

  let x00 = lerp(n000, n100, u);
  let x10 = lerp(n010, n110, u);
  let x01 = lerp(n001, n101, u);
  let x11 = lerp(n011, n111, u);

  lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

/// Perlin noise remapped to `[0, 1]`.
#[inline]
pub fn perlin3(seed: i32, x: f32, y: f32, z: f32) -> f32 {
  (perlin3_signed(seed, x, y, z) * 0.5 + 0.5).clamp(0.0, 1.0)
}
