use super::*;
use crate::shader::{HostShaderCompiler, ShaderCompiler, ShaderSource};
use crate::device::{HazardKind, Workgroup};

// =============================================================================
// Fixtures
// =============================================================================

/// Writes `global.x + 1` to `u32[global.x]` at the pushed address.
struct IotaKernel;

impl ComputeKernel for IotaKernel {
  fn name(&self) -> &str {
    "iota"
  }

  fn workgroup_size(&self) -> [u32; 3] {
    [8, 1, 1]
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let base: u64 = wg.push_constants();
    let memory = wg.memory();
    wg.invocations(|inv, _| {
      memory.store_u32(base + inv.global.x as u64 * 4, inv.global.x + 1);
    });
  }
}

fn device_with(config: HostDeviceConfig) -> HostDevice {
  let mut library = KernelLibrary::new();
  library.register_compute("iota", |_| Ok(Arc::new(IotaKernel)));
  HostDevice::new(config, Arc::new(library))
}

fn device() -> HostDevice {
  device_with(HostDeviceConfig::default())
}

fn validating_device() -> HostDevice {
  device_with(HostDeviceConfig::default().with_hazard_validation(true))
}

fn iota_pipeline(device: &HostDevice) -> PipelineHandle {
  let compiler = HostShaderCompiler::new(device.library().clone());
  let module = compiler.compile(&ShaderSource::compute("iota")).unwrap();
  device
    .create_compute_pipeline(&module, &Specialization::new())
    .unwrap()
}

fn bound_buffer(device: &HostDevice, size: u64) -> (BufferHandle, MemoryHandle) {
  let usage = BufferUsage::STORAGE
    | BufferUsage::TRANSFER_SRC
    | BufferUsage::TRANSFER_DST
    | BufferUsage::DEVICE_ADDRESS;
  let buffer = device.create_buffer(size, usage).unwrap();
  let requirements = device.memory_requirements(buffer).unwrap();
  let memory = device.allocate_memory(requirements.size, 0).unwrap();
  device.bind_buffer_memory(buffer, memory).unwrap();
  (buffer, memory)
}

fn read_u32s(device: &HostDevice, buffer: BufferHandle, count: usize) -> Vec<u32> {
  let mut bytes = vec![0u8; count * 4];
  device.read_buffer(buffer, 0, &mut bytes).unwrap();
  bytemuck::cast_slice(&bytes).to_vec()
}

// =============================================================================
// Buffers and memory
// =============================================================================

#[test]
fn test_zero_sized_buffer_is_rejected() {
  let device = device();
  let result = device.create_buffer(0, BufferUsage::STORAGE);
  assert!(matches!(result, Err(DeviceError::BufferCreation { .. })));
}

#[test]
fn test_device_addresses_are_never_reused() {
  let device = device();
  let (a, _) = bound_buffer(&device, 1024);
  let first = device.buffer_device_address(a).unwrap();
  device.destroy_buffer(a);

  let (b, _) = bound_buffer(&device, 1024);
  let second = device.buffer_device_address(b).unwrap();
  assert!(second > first);
  assert!(second >= first + 1024);
}

#[test]
fn test_address_requires_usage_and_binding() {
  let device = device();
  let plain = device.create_buffer(64, BufferUsage::STORAGE).unwrap();
  assert!(matches!(
    device.buffer_device_address(plain),
    Err(DeviceError::NoDeviceAddress(_))
  ));

  let unbound = device
    .create_buffer(64, BufferUsage::DEVICE_ADDRESS)
    .unwrap();
  assert!(matches!(
    device.buffer_device_address(unbound),
    Err(DeviceError::NotBound(_))
  ));
}

#[test]
fn test_memory_limit_is_enforced() {
  let device = HostDevice::new(
    HostDeviceConfig::default().with_memory_limit(4096),
    Arc::new(KernelLibrary::new()),
  );
  let first = device.allocate_memory(4096, 0).unwrap();
  assert!(matches!(
    device.allocate_memory(256, 0),
    Err(DeviceError::OutOfDeviceMemory { .. })
  ));

  device.free_memory(first);
  assert_eq!(device.allocated_bytes(), 0);
  assert!(device.allocate_memory(256, 0).is_ok());
}

#[test]
fn test_out_of_bounds_write_fails() {
  let device = device();
  let (buffer, _) = bound_buffer(&device, 64);
  let result = device.write_buffer(buffer, 60, &[0u8; 8]);
  assert!(matches!(result, Err(DeviceError::OutOfBounds { .. })));
}

// =============================================================================
// Submission
// =============================================================================

#[test]
fn test_copy_and_fill_execute_in_order() {
  let device = device();
  let (src, _) = bound_buffer(&device, 64);
  let (dst, _) = bound_buffer(&device, 64);
  let values: Vec<u32> = (0..16).collect();
  device
    .write_buffer(src, 0, bytemuck::cast_slice(&values))
    .unwrap();

  let mut cmd = device.begin_commands();
  cmd.fill_buffer(dst, 0, 64, 7);
  cmd.copy_buffer(
    src,
    dst,
    &[BufferCopy {
      src_offset: 0,
      dst_offset: 16,
      size: 16,
    }],
  );
  assert_eq!(cmd.len(), 2);
  let report = device.submit(cmd).unwrap();

  assert_eq!(report.fills, 1);
  assert_eq!(report.copies, 1);
  let out = read_u32s(&device, dst, 16);
  assert_eq!(&out[..4], &[7, 7, 7, 7]);
  assert_eq!(&out[4..8], &[0, 1, 2, 3]);
  assert!(out[8..].iter().all(|&v| v == 7));
}

#[test]
fn test_dispatch_runs_kernel_through_device_address() {
  let device = device();
  let (buffer, _) = bound_buffer(&device, 256);
  let base = device.buffer_device_address(buffer).unwrap();

  let compiler = HostShaderCompiler::new(device.library().clone());
  let module = compiler.compile(&ShaderSource::compute("iota")).unwrap();
  let pipeline = device
    .create_compute_pipeline(&module, &Specialization::new())
    .unwrap();

  let mut cmd = device.begin_commands();
  cmd.bind_pipeline(pipeline);
  cmd.push_constants(bytemuck::bytes_of(&base));
  cmd.dispatch(4, 1, 1);
  let report = device.submit(cmd).unwrap();

  assert_eq!(report.dispatches, 1);
  assert_eq!(report.workgroups, 4);
  let expected: Vec<u32> = (1..=32).collect();
  assert_eq!(read_u32s(&device, buffer, 32), expected);
}

#[test]
fn test_dispatch_without_pipeline_fails() {
  let device = device();
  let mut cmd = device.begin_commands();
  cmd.dispatch(1, 1, 1);
  assert!(matches!(device.submit(cmd), Err(DeviceError::NoPipelineBound)));
}

#[test]
fn test_stray_address_reports_memory_fault() {
  let device = device();
  let compiler = HostShaderCompiler::new(device.library().clone());
  let module = compiler.compile(&ShaderSource::compute("iota")).unwrap();
  let pipeline = device
    .create_compute_pipeline(&module, &Specialization::new())
    .unwrap();

  let mut cmd = device.begin_commands();
  cmd.bind_pipeline(pipeline);
  cmd.push_constants(bytemuck::bytes_of(&0x10u64));
  cmd.dispatch(1, 1, 1);
  let result = device.submit(cmd);
  assert!(matches!(result, Err(DeviceError::MemoryFault { .. })));
}

#[test]
fn test_barriers_are_counted() {
  use crate::graph::{Barrier, BarrierTarget, ResourceId, ResourceState};

  let device = device();
  let mut batch = BarrierBatch::new();
  batch.push(Barrier {
    resource: ResourceId(0),
    target: BarrierTarget::Buffer {
      buffer: BufferHandle(1),
      offset: 0,
      size: 64,
    },
    src: ResourceState::transfer_write(),
    dst: ResourceState::compute_read(),
  });

  let mut cmd = device.begin_commands();
  cmd.pipeline_barrier(&batch);
  let report = device.submit(cmd).unwrap();
  assert_eq!(report.barrier_batches, 1);
  assert_eq!(report.barriers, 1);
}

// =============================================================================
// Hazard validation
// =============================================================================

fn whole(size: u64) -> [BufferCopy; 1] {
  [BufferCopy {
    src_offset: 0,
    dst_offset: 0,
    size,
  }]
}

fn transfer_barrier(buffer: BufferHandle, src: crate::graph::ResourceState) -> BarrierBatch {
  let mut batch = BarrierBatch::new();
  batch.push(crate::graph::Barrier::buffer(
    buffer,
    0,
    256,
    src,
    crate::graph::ResourceState::transfer_read_write(),
  ));
  batch
}

#[test]
fn test_chained_copy_without_barrier_is_a_hazard() {
  let device = validating_device();
  let (a, _) = bound_buffer(&device, 256);
  let (b, _) = bound_buffer(&device, 256);
  let (c, _) = bound_buffer(&device, 256);

  let mut cmd = device.begin_commands();
  cmd.copy_buffer(a, b, &whole(256));
  cmd.copy_buffer(b, c, &whole(256));
  let err = device.submit(cmd).unwrap_err();
  assert!(matches!(
    err,
    DeviceError::Hazard {
      kind: HazardKind::ReadAfterWrite,
      buffer,
      offset: 0,
      ..
    } if buffer == b
  ));
}

#[test]
fn test_chained_copy_with_barrier_passes() {
  let device = validating_device();
  let (a, _) = bound_buffer(&device, 256);
  let (b, _) = bound_buffer(&device, 256);
  let (c, _) = bound_buffer(&device, 256);
  device.write_buffer(a, 0, &[5; 8]).unwrap();

  let mut cmd = device.begin_commands();
  cmd.copy_buffer(a, b, &whole(256));
  cmd.pipeline_barrier(&BarrierBatch::after_transfer_writes(b, [(0, 256)]));
  cmd.copy_buffer(b, c, &whole(256));
  device.submit(cmd).unwrap();

  let mut out = [0u8; 8];
  device.read_buffer(c, 0, &mut out).unwrap();
  assert_eq!(out, [5; 8]);
}

#[test]
fn test_fill_over_unordered_copy_is_a_hazard() {
  let device = validating_device();
  let (a, _) = bound_buffer(&device, 256);
  let (b, _) = bound_buffer(&device, 256);

  let mut cmd = device.begin_commands();
  cmd.copy_buffer(
    a,
    b,
    &[BufferCopy {
      src_offset: 0,
      dst_offset: 64,
      size: 32,
    }],
  );
  cmd.fill_buffer(b, 0, 256, 0);
  let err = device.submit(cmd).unwrap_err();
  assert!(matches!(
    err,
    DeviceError::Hazard {
      kind: HazardKind::WriteAfterWrite,
      offset: 64,
      ..
    }
  ));
}

#[test]
fn test_disjoint_writes_need_no_barrier() {
  let device = validating_device();
  let (buffer, _) = bound_buffer(&device, 256);
  let mut cmd = device.begin_commands();
  cmd.fill_buffer(buffer, 0, 128, 1);
  cmd.fill_buffer(buffer, 128, 128, 2);
  device.submit(cmd).unwrap();
}

#[test]
fn test_dispatch_over_unordered_fill_is_a_hazard() {
  let device = validating_device();
  let (buffer, _) = bound_buffer(&device, 256);
  let base = device.buffer_device_address(buffer).unwrap();
  let pipeline = iota_pipeline(&device);

  let record = |barrier: Option<BarrierBatch>| {
    let mut cmd = device.begin_commands();
    cmd.fill_buffer(buffer, 0, 256, 0);
    if let Some(batch) = &barrier {
      cmd.pipeline_barrier(batch);
    }
    cmd.bind_pipeline(pipeline);
    cmd.push_constants(bytemuck::bytes_of(&base));
    cmd.dispatch(1, 1, 1);
    cmd
  };

  let err = device.submit(record(None)).unwrap_err();
  assert!(matches!(
    &err,
    DeviceError::Hazard { kind: HazardKind::WriteAfterWrite, command, .. } if command == "iota"
  ));

  // A barrier whose source scope misses the transfer stage covers nothing.
  let wrong_stage = transfer_barrier(buffer, crate::graph::ResourceState::compute_write());
  assert!(matches!(
    device.submit(record(Some(wrong_stage))),
    Err(DeviceError::Hazard { .. })
  ));

  let ordered = transfer_barrier(buffer, crate::graph::ResourceState::transfer_write());
  device.submit(record(Some(ordered))).unwrap();
  assert_eq!(read_u32s(&device, buffer, 8), (1..=8).collect::<Vec<u32>>());
}

#[test]
fn test_copy_of_unordered_dispatch_output_is_a_hazard() {
  let device = validating_device();
  let (buffer, _) = bound_buffer(&device, 256);
  let (readback, _) = bound_buffer(&device, 256);
  let base = device.buffer_device_address(buffer).unwrap();
  let pipeline = iota_pipeline(&device);

  let mut cmd = device.begin_commands();
  cmd.bind_pipeline(pipeline);
  cmd.push_constants(bytemuck::bytes_of(&base));
  cmd.dispatch(1, 1, 1);
  cmd.copy_buffer(buffer, readback, &whole(256));
  let err = device.submit(cmd).unwrap_err();
  assert!(matches!(
    &err,
    DeviceError::Hazard { kind: HazardKind::ReadAfterWrite, command, offset: 0, .. }
      if command == "copy_buffer"
  ));
}
