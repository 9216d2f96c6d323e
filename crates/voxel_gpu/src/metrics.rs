//! Pipeline metrics collection.
//!
//! Feature-gated and runtime-toggled so disabled builds pay nothing.
//!
//! # Usage
//!
//! ```ignore
//! use voxel_gpu::metrics::{PipelineMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let report = renderer.generate_region(IVec3::ZERO)?;
//! metrics.record_region(&report);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::pipeline::RegionReport;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Rolling window of recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Iterate over values (oldest to newest).
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
  pub fn sum(&self) -> T {
    self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
  }
}

impl RollingWindow<u64> {
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = *self.buffer.iter().min()?;
    let max = *self.buffer.iter().max()?;
    Some((min, max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128)
  }
}

/// Per-region pipeline statistics.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
  // Timing (microseconds)
  pub record_timings: RollingWindow<u64>,
  pub submit_timings: RollingWindow<u64>,
  pub region_timings: RollingWindow<u64>,

  // Output
  pub quads_per_region: RollingWindow<u64>,
  pub barriers_per_region: RollingWindow<u64>,

  // Totals
  pub regions_generated: u64,
  pub total_quads: u64,
  pub dropped_quads: u64,
  pub heap_growths: u64,
  pub uploaded_bytes: u64,
}

impl PipelineMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    self.record_timings.clear();
    self.submit_timings.clear();
    self.region_timings.clear();
    self.quads_per_region.clear();
    self.barriers_per_region.clear();
    // Totals are cumulative.
  }

  pub fn record_region(&mut self, report: &RegionReport) {
    if !is_enabled() {
      return;
    }
    self.record_timings.push(report.record_us);
    self.submit_timings.push(report.submit_us);
    self.region_timings.push(report.total_us);
    self.quads_per_region.push(report.quads as u64);
    self.barriers_per_region.push(report.barriers as u64);

    self.regions_generated += 1;
    self.total_quads += report.quads as u64;
    self.dropped_quads += report.dropped_quads as u64;
    self.heap_growths += report.heap_grew as u64;
    self.uploaded_bytes += report.uploaded_bytes;
  }

  pub fn avg_region_us(&self) -> f64 {
    self.region_timings.average()
  }

  pub fn avg_quads(&self) -> f64 {
    self.quads_per_region.average()
  }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window() {
    let mut window = RollingWindow::new(3);
    assert!(window.is_empty());

    window.push(10u64);
    window.push(20);
    window.push(30);
    assert_eq!(window.sum(), 60);
    assert_eq!(window.average(), 20.0);

    // Oldest evicted
    window.push(40);
    assert_eq!(window.len(), 3);
    assert_eq!(window.min_max(), Some((20, 40)));
    assert_eq!(window.last(), Some(&40));
  }

  #[test]
  fn test_record_region() {
    let mut metrics = PipelineMetrics::new();
    let report = RegionReport {
      quads: 100,
      dropped_quads: 4,
      barriers: 9,
      heap_grew: true,
      uploaded_bytes: 1024,
      total_us: 500,
      ..RegionReport::default()
    };
    metrics.record_region(&report);
    metrics.record_region(&RegionReport {
      quads: 50,
      total_us: 300,
      ..RegionReport::default()
    });

    assert_eq!(metrics.regions_generated, 2);
    assert_eq!(metrics.total_quads, 150);
    assert_eq!(metrics.dropped_quads, 4);
    assert_eq!(metrics.heap_growths, 1);
    assert_eq!(metrics.avg_region_us(), 400.0);
    assert_eq!(metrics.avg_quads(), 75.0);

    metrics.reset();
    assert!(metrics.region_timings.is_empty());
    assert_eq!(metrics.regions_generated, 2);
  }
}
