use super::*;
use crate::config::MesherKind;
use crate::pipeline::test_utils::{simple_renderer, test_config, test_renderer};
use crate::voxel::VERTICES_PER_QUAD;

#[test]
fn test_host_renderer_builds_every_pipeline() {
  let renderer = test_renderer(test_config());
  // Both palette phases are distinct specializations.
  assert_eq!(renderer.pipeline_cache_stats(), (0, 9));
  let p = renderer.pipelines();
  assert_ne!(p.palette_build, p.palette_pack);
  assert!(renderer.layout().is_none());
}

#[test]
fn test_invalid_config_is_rejected() {
  let result = VoxelRenderer::host(test_config().with_quad_capacity(0));
  assert!(matches!(result, Err(RendererError::Config(_))));
}

#[test]
fn test_readback_before_generate_fails() {
  let renderer = test_renderer(test_config());
  assert!(matches!(renderer.read_quads(), Err(RendererError::NoRegion)));
  assert!(matches!(renderer.read_draw_args(), Err(RendererError::NoRegion)));
  assert!(matches!(renderer.read_chunk(UVec3::ZERO), Err(RendererError::NoRegion)));
}

#[test]
fn test_greedy_region_report() {
  let mut renderer = test_renderer(test_config());
  let report = renderer.generate_region(IVec3::ZERO).unwrap();

  assert!(report.passes.iter().any(|p| p == "mesh_greedy"));
  assert!(!report.passes.iter().any(|p| p == "mesh_simple"));
  assert_eq!(report.passes.last().map(String::as_str), Some("draw"));
  // noise, terrain, two palette phases, bitmap, mesh, finalize
  assert_eq!(report.dispatches, 7);
  assert!(report.quads > 0);
  assert_eq!(report.dropped_quads, 0);
  assert_eq!(report.vertices, report.expected_vertices());
  assert!(report.heap_grew);
  assert!(report.uploaded_bytes > 0);

  let quads = renderer.read_quads().unwrap();
  assert_eq!(quads.len(), report.quads as usize);
}

#[test]
fn test_second_region_reuses_grown_heap() {
  let mut renderer = test_renderer(test_config());
  let first = renderer.generate_region(IVec3::ZERO).unwrap();
  let second = renderer.generate_region(IVec3::new(1, 0, 0)).unwrap();

  assert!(first.heap_grew);
  assert!(!second.heap_grew);
  assert_eq!(first.heap_capacity, second.heap_capacity);
  assert_eq!(renderer.layout().map(|l| l.coord), Some(IVec3::new(1, 0, 0)));
}

#[test]
fn test_chained_growth_keeps_every_access_ordered() {
  for mesher in [MesherKind::Greedy, MesherKind::Simple] {
    let config = test_config().with_initial_heap_size(4096).with_mesher(mesher);
    let mut renderer = test_renderer(config);
    let report = renderer.generate_region(IVec3::ZERO).unwrap();

    assert!(report.heap_grew);
    assert!(report.quads > 0);
    assert_eq!(report.vertices, report.expected_vertices());
    assert!(report.heap_capacity >= renderer.layout().unwrap().zeroed.end());
  }
}

#[test]
fn test_simple_mesher_runs_simple_pass() {
  let mut renderer = simple_renderer();
  assert_eq!(renderer.config().mesher, MesherKind::Simple);
  let report = renderer.generate_region(IVec3::ZERO).unwrap();

  assert!(report.passes.iter().any(|p| p == "mesh_simple"));
  assert!(!report.passes.iter().any(|p| p == "mesh_greedy"));
  assert_eq!(report.vertices, report.expected_vertices());
}

#[test]
fn test_quad_overflow_is_dropped_and_clamped() {
  let mut renderer = test_renderer(test_config().with_quad_capacity(64));
  let report = renderer.generate_region(IVec3::ZERO).unwrap();

  assert_eq!(report.quads, 64);
  assert!(report.dropped_quads > 0);
  let args = renderer.read_draw_args().unwrap();
  assert_eq!(args.vertex_count, 64 * VERTICES_PER_QUAD);
  assert_eq!(args.instance_count, 1);
  assert_eq!(renderer.read_quads().unwrap().len(), 64);
}

#[test]
fn test_debug_log_lists_passes() {
  let mut renderer = test_renderer(test_config().with_debug_info(true));
  renderer.generate_region(IVec3::ZERO).unwrap();

  let log = renderer.graph_log().unwrap();
  assert!(log.contains("pass clear"));
  assert!(log.contains("pass draw"));
  assert!(log.contains("skip mesh_simple"));
}

#[test]
fn test_empty_region_draws_nothing() {
  // Far above the sine-wave surface.
  let mut renderer = test_renderer(test_config());
  let report = renderer.generate_region(IVec3::new(0, 4, 0)).unwrap();

  assert_eq!(report.quads, 0);
  assert_eq!(report.vertices, 0);
  let chunk = renderer.read_chunk(UVec3::ZERO).unwrap();
  assert_eq!(chunk.palette, vec![0]);
  assert_eq!(chunk.solid_count(), 0);
}
