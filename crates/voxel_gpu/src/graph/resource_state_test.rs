use super::*;

#[test]
fn test_identical_states_need_no_barrier() {
  let s = ResourceState::compute_read();
  assert!(!s.needs_barrier(&s, false));
  assert!(!s.needs_barrier(&s, true));
}

#[test]
fn test_access_or_stage_change_needs_barrier() {
  let write = ResourceState::compute_write();
  let read = ResourceState::compute_read();
  assert!(write.needs_barrier(&read, false));

  let vertex = ResourceState::vertex_read();
  assert!(read.needs_barrier(&vertex, false));
}

#[test]
fn test_layout_only_matters_for_images() {
  let a = ResourceState::compute_read().with_layout(ImageLayout::General);
  let b = ResourceState::compute_read().with_layout(ImageLayout::ShaderReadOnly);
  assert!(!a.needs_barrier(&b, false));
  assert!(a.needs_barrier(&b, true));
}

#[test]
fn test_queue_family_change_needs_barrier() {
  let a = ResourceState::compute_read().with_queue_family(0);
  let b = ResourceState::compute_read().with_queue_family(1);
  assert!(a.needs_barrier(&b, false));
}

#[test]
fn test_merge_unions_access_and_stage() {
  let merged = ResourceState::compute_read()
    .merge(ResourceState::compute_write())
    .unwrap();
  assert_eq!(merged, ResourceState::compute_read_write());

  let mixed = ResourceState::indirect_read()
    .merge(ResourceState::vertex_read())
    .unwrap();
  assert!(mixed.access.contains(AccessFlags::INDIRECT_COMMAND_READ));
  assert!(mixed.stage.contains(StageFlags::DRAW_INDIRECT | StageFlags::VERTEX_SHADER));
}

#[test]
fn test_merge_rejects_conflicting_layouts() {
  let a = ResourceState::compute_read().with_layout(ImageLayout::General);
  let b = ResourceState::compute_read().with_layout(ImageLayout::ShaderReadOnly);
  assert!(a.merge(b).is_none());
  let undefined = ResourceState::compute_read();
  assert_eq!(a.merge(undefined).unwrap().layout, ImageLayout::General);
}

#[test]
fn test_has_write() {
  assert!(ResourceState::compute_write().access.has_write());
  assert!(ResourceState::transfer_write().access.has_write());
  assert!(!ResourceState::compute_read().access.has_write());
  assert!(!AccessFlags::NONE.has_write());
}

#[test]
fn test_flags_debug_lists_names() {
  let flags = AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE;
  assert_eq!(format!("{flags:?}"), "AccessFlags(SHADER_READ | SHADER_WRITE)");
  assert_eq!(format!("{:?}", StageFlags::NONE), "StageFlags(NONE)");
}
