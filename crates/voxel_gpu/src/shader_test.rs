use super::*;
use crate::device::{CommandContext, GpuDevice, HostDevice, HostDeviceConfig, Workgroup};
use crate::error::DeviceError;

struct NopKernel {
  variant: u32,
}

impl ComputeKernel for NopKernel {
  fn name(&self) -> &str {
    "nop"
  }

  fn workgroup_size(&self) -> [u32; 3] {
    [self.variant.max(1), 1, 1]
  }

  fn run(&self, _wg: &mut Workgroup<'_>) {}
}

fn library() -> Arc<KernelLibrary> {
  let mut library = KernelLibrary::new();
  library.register_compute("nop", |spec| match spec.get(0).unwrap_or(1) {
    0 => Err("variant 0 is not supported".to_string()),
    variant => {
      let kernel: Arc<dyn ComputeKernel> = Arc::new(NopKernel { variant });
      Ok(kernel)
    }
  });
  Arc::new(library)
}

fn setup() -> (HostShaderCompiler, HostDevice) {
  let library = library();
  (
    HostShaderCompiler::new(library.clone()),
    HostDevice::new(HostDeviceConfig::default(), library),
  )
}

#[test]
fn test_specialization_is_sorted_and_replaces() {
  let a = Specialization::new().with(3, 30).with(1, 10).with(3, 31);
  let b = Specialization::new().with(1, 10).with(3, 31);
  assert_eq!(a, b);
  assert_eq!(a.get(3), Some(31));
  assert_eq!(a.get(2), None);
}

#[test]
fn test_compile_unknown_entry_point_fails() {
  let (compiler, _) = setup();
  let result = compiler.compile(&ShaderSource::compute("missing"));
  assert!(matches!(result, Err(PipelineError::Compilation { .. })));

  // Registered as compute only.
  let result = compiler.compile(&ShaderSource::vertex("nop"));
  assert!(matches!(result, Err(PipelineError::Compilation { .. })));
}

#[test]
fn test_wrong_stage_module_is_rejected() {
  let (compiler, device) = setup();
  let module = compiler.compile(&ShaderSource::compute("nop")).unwrap();
  let result = device.create_graphics_pipeline(&module, &Specialization::new());
  assert!(matches!(result, Err(PipelineError::WrongStage { .. })));
}

#[test]
fn test_cache_hits_same_key() {
  let (compiler, device) = setup();
  let mut cache = PipelineCache::new();
  let source = ShaderSource::compute("nop");
  let spec = Specialization::new().with(0, 4);

  let first = cache.get_or_create(&compiler, &device, &source, &spec).unwrap();
  let second = cache.get_or_create(&compiler, &device, &source, &spec).unwrap();
  assert_eq!(first, second);
  assert_eq!(cache.stats(), (1, 1));
  assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_separates_specializations() {
  let (compiler, device) = setup();
  let mut cache = PipelineCache::new();
  let source = ShaderSource::compute("nop");

  let a = cache
    .get_or_create(&compiler, &device, &source, &Specialization::new().with(0, 2))
    .unwrap();
  let b = cache
    .get_or_create(&compiler, &device, &source, &Specialization::new().with(0, 8))
    .unwrap();
  assert_ne!(a, b);
  assert_eq!(cache.stats(), (0, 2));
}

#[test]
fn test_failed_creation_is_not_cached() {
  let (compiler, device) = setup();
  let mut cache = PipelineCache::new();
  let source = ShaderSource::compute("nop");
  let bad = Specialization::new().with(0, 0);

  let result = cache.get_or_create(&compiler, &device, &source, &bad);
  assert!(matches!(result, Err(PipelineError::Creation { .. })));
  assert!(cache.is_empty());
}

#[test]
fn test_clear_destroys_pipelines() {
  let (compiler, device) = setup();
  let mut cache = PipelineCache::new();
  let source = ShaderSource::compute("nop");
  let handle = cache
    .get_or_create(&compiler, &device, &source, &Specialization::new())
    .unwrap();

  cache.clear(&device);
  assert!(cache.is_empty());

  // The destroyed handle can no longer be bound.
  let mut cmd = device.begin_commands();
  cmd.bind_pipeline(handle);
  assert!(matches!(device.submit(cmd), Err(DeviceError::UnknownPipeline(_))));
}
