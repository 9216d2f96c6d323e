use super::*;
use voxel_gpu::{MesherKind, TerrainMode};

#[test]
fn test_empty_document_uses_defaults() {
  let config = DemoConfig::parse("").unwrap();
  assert_eq!(config.regions, vec![[0, 0, 0]]);
  assert_eq!(config.renderer, RendererConfig::default());
}

#[test]
fn test_bundled_demo_config_parses() {
  let config = DemoConfig::parse(include_str!("../demo.toml")).unwrap();
  assert_eq!(config.regions.len(), 4);
  assert_eq!(config.renderer.mesher, MesherKind::Greedy);
  assert_eq!(config.renderer.terrain.mode, TerrainMode::Heightmap);
  assert_eq!(config.renderer.noise.seed, 1337);
}

#[test]
fn test_empty_region_list_is_rejected() {
  assert!(DemoConfig::parse("regions = []").is_err());
}

#[test]
fn test_invalid_renderer_settings_are_rejected() {
  let source = "[renderer]\nquad_capacity = 0\n";
  assert!(DemoConfig::parse(source).is_err());
}

#[test]
fn test_overrides() {
  let config = DemoConfig::default().with_region_row(3).with_seed(7);
  let coords: Vec<IVec3> = config.region_coords().collect();
  assert_eq!(coords, vec![IVec3::ZERO, IVec3::X, IVec3::new(2, 0, 0)]);
  assert_eq!(config.renderer.noise.seed, 7);
}
