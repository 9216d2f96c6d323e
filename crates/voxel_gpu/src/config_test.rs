use super::*;

#[test]
fn test_empty_document_is_default() {
  let config = RendererConfig::from_toml_str("").unwrap();
  assert_eq!(config, RendererConfig::default());
}

#[test]
fn test_partial_document_keeps_other_defaults() {
  let config = RendererConfig::from_toml_str(
    r#"
    mesher = "simple"
    pack_word = "u64"
    execution_order = "topological"

    [noise]
    seed = 42

    [terrain]
    mode = "sine_wave"
    deep_block = 3
    "#,
  )
  .unwrap();
  assert_eq!(config.mesher, MesherKind::Simple);
  assert_eq!(config.pack_word, PackWord::U64);
  assert_eq!(config.execution_order, ExecutionOrder::Topological);
  assert_eq!(config.noise.seed, 42);
  assert_eq!(config.noise.octaves, 8);
  assert_eq!(config.terrain.mode, TerrainMode::SineWave);
  assert_eq!(config.terrain.deep_block, 3);
  assert_eq!(config.terrain.surface_block, 1);
}

#[test]
fn test_unknown_field_rejected() {
  let err = RendererConfig::from_toml_str("quad_capacty = 5").unwrap_err();
  assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_validation_errors() {
  let zero_quads = RendererConfig::default().with_quad_capacity(0);
  assert!(matches!(zero_quads.validate(), Err(ConfigError::Invalid(_))));

  let air_block = RendererConfig::default().with_terrain(TerrainSettings {
    surface_block: 0,
    ..TerrainSettings::default()
  });
  assert!(air_block.validate().is_err());

  let reserved_block = RendererConfig::default().with_terrain(TerrainSettings {
    deep_block: u32::MAX,
    ..TerrainSettings::default()
  });
  assert!(reserved_block.validate().is_err());

  let bad_persistence = RendererConfig::default().with_noise(NoiseSettings {
    persistence: 1.5,
    ..NoiseSettings::default()
  });
  assert!(bad_persistence.validate().is_err());

  assert!(RendererConfig::from_toml_str("initial_heap_size = 0").is_err());
}

#[test]
fn test_terrain_mode_codes() {
  for mode in [TerrainMode::Density3d, TerrainMode::Heightmap, TerrainMode::SineWave] {
    assert_eq!(TerrainMode::from_code(mode.code()), mode);
  }
  assert_eq!(PackWord::U64.bits(), 64);
}
