//! Device memory as 64-bit atomic words.
//!
//! 32-bit atomics operate on half of a word through a CAS loop on the
//! containing `u64`, so 32-bit and 64-bit views of the same bytes stay
//! coherent. Byte order is little-endian: byte `b` lives at bits
//! `(b % 8) * 8` of word `b / 8`.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct MemoryBlock {
  words: Box<[AtomicU64]>,
}

impl std::fmt::Debug for MemoryBlock {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MemoryBlock")
      .field("size", &self.size())
      .finish()
  }
}

#[inline(always)]
fn half_shift(byte: u64) -> u32 {
  ((byte & 4) * 8) as u32
}

impl MemoryBlock {
  /// Zero-initialized block of at least `size` bytes (rounded up to 8).
  pub fn new(size: u64) -> Self {
    let words = size.div_ceil(8) as usize;
    Self {
      words: (0..words).map(|_| AtomicU64::new(0)).collect(),
    }
  }

  /// Size in bytes.
  #[inline]
  pub fn size(&self) -> u64 {
    self.words.len() as u64 * 8
  }

  #[inline(always)]
  fn word(&self, byte: u64) -> &AtomicU64 {
    &self.words[(byte >> 3) as usize]
  }

  // ===========================================================================
  // 64-bit
  // ===========================================================================

  #[inline]
  pub fn load_u64(&self, byte: u64) -> u64 {
    debug_assert_eq!(byte & 7, 0);
    self.word(byte).load(Ordering::Acquire)
  }

  #[inline]
  pub fn store_u64(&self, byte: u64, value: u64) {
    debug_assert_eq!(byte & 7, 0);
    self.word(byte).store(value, Ordering::Release);
  }

  #[inline]
  pub fn fetch_or_u64(&self, byte: u64, value: u64) -> u64 {
    debug_assert_eq!(byte & 7, 0);
    self.word(byte).fetch_or(value, Ordering::AcqRel)
  }

  #[inline]
  pub fn compare_exchange_u64(&self, byte: u64, current: u64, new: u64) -> Result<u64, u64> {
    debug_assert_eq!(byte & 7, 0);
    self
      .word(byte)
      .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
  }

  // ===========================================================================
  // 32-bit
  // ===========================================================================

  #[inline]
  pub fn load_u32(&self, byte: u64) -> u32 {
    debug_assert_eq!(byte & 3, 0);
    (self.word(byte).load(Ordering::Acquire) >> half_shift(byte)) as u32
  }

  /// Atomically replace the 32-bit value at `byte` with `f(old)`, returning `old`.
  pub fn update_u32(&self, byte: u64, mut f: impl FnMut(u32) -> u32) -> u32 {
    debug_assert_eq!(byte & 3, 0);
    let shift = half_shift(byte);
    let mask = 0xFFFF_FFFFu64 << shift;
    let word = self.word(byte);
    let mut current = word.load(Ordering::Acquire);
    loop {
      let old = (current >> shift) as u32;
      let next = (current & !mask) | ((f(old) as u64) << shift);
      match word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => return old,
        Err(actual) => current = actual,
      }
    }
  }

  #[inline]
  pub fn store_u32(&self, byte: u64, value: u32) {
    self.update_u32(byte, |_| value);
  }

  #[inline]
  pub fn fetch_add_u32(&self, byte: u64, value: u32) -> u32 {
    self.update_u32(byte, |old| old.wrapping_add(value))
  }

  #[inline]
  pub fn fetch_or_u32(&self, byte: u64, value: u32) -> u32 {
    self.update_u32(byte, |old| old | value)
  }

  /// 32-bit CAS. Fails only when the addressed half differs from `current`;
  /// concurrent changes to the other half are retried internally.
  pub fn compare_exchange_u32(&self, byte: u64, current: u32, new: u32) -> Result<u32, u32> {
    debug_assert_eq!(byte & 3, 0);
    let shift = half_shift(byte);
    let mask = 0xFFFF_FFFFu64 << shift;
    let word = self.word(byte);
    let mut observed = word.load(Ordering::Acquire);
    loop {
      let old = (observed >> shift) as u32;
      if old != current {
        return Err(old);
      }
      let next = (observed & !mask) | ((new as u64) << shift);
      match word.compare_exchange_weak(observed, next, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => return Ok(old),
        Err(actual) => observed = actual,
      }
    }
  }

  // ===========================================================================
  // Bulk
  // ===========================================================================

  pub fn read_bytes(&self, byte: u64, out: &mut [u8]) {
    for (i, dst) in out.iter_mut().enumerate() {
      let b = byte + i as u64;
      *dst = (self.word(b).load(Ordering::Acquire) >> ((b & 7) * 8)) as u8;
    }
  }

  pub fn write_bytes(&self, byte: u64, data: &[u8]) {
    let mut i = 0usize;
    while i < data.len() {
      let b = byte + i as u64;
      if b & 7 == 0 && data.len() - i >= 8 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[i..i + 8]);
        self.word(b).store(u64::from_le_bytes(raw), Ordering::Release);
        i += 8;
        continue;
      }
      let shift = (b & 7) * 8;
      let value = data[i] as u64;
      let _ = self
        .word(b)
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
          Some((w & !(0xFF << shift)) | (value << shift))
        });
      i += 1;
    }
  }

  /// Fill `size` bytes at `byte` with a repeated 32-bit pattern.
  pub fn fill_u32(&self, byte: u64, size: u64, value: u32) {
    debug_assert_eq!(byte & 3, 0);
    debug_assert_eq!(size & 3, 0);
    let pattern = (value as u64) | ((value as u64) << 32);
    let mut at = byte;
    let end = byte + size;
    while at < end {
      if at & 7 == 0 && end - at >= 8 {
        self.word(at).store(pattern, Ordering::Release);
        at += 8;
      } else {
        self.store_u32(at, value);
        at += 4;
      }
    }
  }

  /// Copy `size` bytes from `src` into this block.
  pub fn copy_from(&self, src: &MemoryBlock, src_offset: u64, dst_offset: u64, size: u64) {
    if src_offset & 7 == 0 && dst_offset & 7 == 0 && size & 7 == 0 {
      for i in (0..size).step_by(8) {
        self.store_u64(dst_offset + i, src.load_u64(src_offset + i));
      }
    } else {
      let mut scratch = vec![0u8; size as usize];
      src.read_bytes(src_offset, &mut scratch);
      self.write_bytes(dst_offset, &scratch);
    }
  }
}
