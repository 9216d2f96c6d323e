//! Voxel terrain demo.
//!
//! Generates the configured regions on the host device and logs one report
//! per region plus a summary:
//!
//! ```text
//! region [0, 0, 0]: 3121 quads, 30 barriers in 9 batches, 7 dispatches, 0.91 ms record
//!   chunks: 8 sampled, avg 1.6 palette entries, 19.3x compression
//! ```

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::UVec3;
use voxel_gpu::constants::REGION_CHUNKS;
use voxel_gpu::{RegionReport, VoxelRenderer};

use config::DemoConfig;

/// Voxel terrain pipeline demo.
#[derive(Parser, Debug)]
#[command(name = "voxel_demo")]
#[command(about = "Generates voxel terrain regions and logs pipeline reports")]
struct Args {
  /// Path to configuration TOML file (defaults apply without one).
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Generate this many regions in a row along +X instead of the configured list.
  #[arg(short, long)]
  regions: Option<u32>,

  /// Override the noise seed.
  #[arg(short, long)]
  seed: Option<i32>,
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => {
      tracing::info!("Loading config from: {}", path.display());
      DemoConfig::load(path)?
    }
    None => DemoConfig::default(),
  };
  if let Some(count) = args.regions {
    config = config.with_region_row(count);
  }
  if let Some(seed) = args.seed {
    config = config.with_seed(seed);
  }

  let mut renderer =
    VoxelRenderer::host(config.renderer.clone()).context("Failed to create renderer")?;

  let mut reports = Vec::new();
  for coord in config.region_coords() {
    let report = renderer
      .generate_region(coord)
      .with_context(|| format!("Failed to generate region {coord}"))?;
    log_report(&report);
    log_chunks(&renderer, config.chunk_samples)?;
    reports.push(report);
  }

  log_summary(&renderer, &reports);
  Ok(())
}

fn log_report(report: &RegionReport) {
  tracing::info!(
    "region {}: {} quads, {} barriers in {} batches, {} dispatches, {:.2} ms record",
    report.coord,
    report.quads,
    report.barriers,
    report.barrier_batches,
    report.dispatches,
    report.record_us as f64 / 1000.0
  );
  if report.dropped_quads > 0 {
    tracing::warn!("  {} quads dropped past capacity", report.dropped_quads);
  }
  if report.heap_grew {
    tracing::info!("  heap grew to {} KiB", report.heap_capacity / 1024);
  }
}

/// Decode a diagonal of chunks and log their palette statistics.
fn log_chunks<D>(renderer: &VoxelRenderer<D>, samples: u32) -> Result<()>
where
  D: voxel_gpu::device::GpuDevice + voxel_gpu::shader::PipelineFactory,
{
  if samples == 0 {
    return Ok(());
  }
  let count = samples.min(REGION_CHUNKS);
  let mut entries = 0;
  let mut ratio = 0.0;
  for i in 0..count {
    let chunk = renderer.read_chunk(UVec3::splat(i))?;
    entries += chunk.stats.palette_entries;
    ratio += chunk.stats.ratio();
  }
  tracing::info!(
    "  chunks: {} sampled, avg {:.1} palette entries, {:.1}x compression",
    count,
    entries as f32 / count as f32,
    ratio / count as f32
  );
  Ok(())
}

fn log_summary<D>(renderer: &VoxelRenderer<D>, reports: &[RegionReport])
where
  D: voxel_gpu::device::GpuDevice + voxel_gpu::shader::PipelineFactory,
{
  let quads: u64 = reports.iter().map(|r| r.quads as u64).sum();
  let vertices: u64 = reports.iter().map(|r| r.vertices).sum();
  let total_us: u64 = reports.iter().map(|r| r.total_us).sum();
  let (hits, misses) = renderer.pipeline_cache_stats();

  tracing::info!(
    "{} regions: {} quads, {} vertices, {:.2} ms total",
    reports.len(),
    quads,
    vertices,
    total_us as f64 / 1000.0
  );
  tracing::info!(
    "heap {} KiB, pipelines {} built / {} reused",
    renderer.heap().capacity() / 1024,
    misses,
    hits
  );

  #[cfg(feature = "metrics")]
  {
    let metrics = renderer.metrics();
    tracing::info!(
      "metrics: avg region {:.2} ms, avg {:.0} quads",
      metrics.avg_region_us() / 1000.0,
      metrics.avg_quads()
    );
  }
}
