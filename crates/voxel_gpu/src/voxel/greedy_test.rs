use super::*;
use crate::pipeline::test_utils::{
  assert_exact_cover, face_coverage, solid_box, solid_noise, solid_sphere, RegionFixture,
};
use crate::voxel::quad::quad_faces;

const CAPACITY: u32 = 1 << 16;

#[test]
fn test_box_inside_one_tile_is_six_quads() {
  let fixture = RegionFixture::new(solid_box([1, 1, 1], [7, 6, 5]), CAPACITY);
  fixture.mesh(&GreedyMeshKernel);

  let quads = fixture.quads();
  assert_eq!(quads.len(), 6);
  assert_eq!(fixture.face_count(), 6);
  assert_exact_cover(&quads, &fixture.expected_faces());

  let top = quads.iter().find(|q| q.axis == 2).unwrap();
  assert_eq!(top.pos, [1, 5, 1]);
  assert_eq!(top.size, [6, 4]);
}

#[test]
fn test_sphere_exact_cover_across_tiles() {
  let fixture = RegionFixture::new(solid_sphere([32.0, 30.0, 33.0], 20.0), CAPACITY);
  fixture.mesh(&GreedyMeshKernel);

  let quads = fixture.quads();
  let faces = fixture.expected_faces();
  assert_exact_cover(&quads, &faces);
  assert!(quads.len() < faces.len());
}

#[test]
fn test_scattered_voxels_exact_cover() {
  let fixture = RegionFixture::new(solid_noise(7, 10), 1 << 18);
  fixture.mesh(&GreedyMeshKernel);
  assert_exact_cover(&fixture.quads(), &fixture.expected_faces());
}

#[test]
fn test_tracking_marks_every_face() {
  let fixture = RegionFixture::new(solid_sphere([20.0, 40.0, 12.0], 11.0), CAPACITY);
  fixture.mesh(&GreedyMeshKernel);

  let mut tracked = fixture.tracking_faces();
  let mut expected = fixture.expected_faces();
  tracked.sort_unstable();
  expected.sort_unstable();
  assert_eq!(tracked, expected);
}

#[test]
fn test_second_dispatch_emits_nothing() {
  let fixture = RegionFixture::new(solid_box([3, 9, 17], [40, 20, 30]), CAPACITY);
  fixture.mesh(&GreedyMeshKernel);
  let first = fixture.face_count();

  fixture.mesh(&GreedyMeshKernel);
  assert_eq!(fixture.face_count(), first);
}

#[test]
fn test_full_region_is_six_faces_of_quads() {
  let fixture = RegionFixture::new(|_, _, _| true, CAPACITY);
  fixture.mesh(&GreedyMeshKernel);

  let quads = fixture.quads();
  assert_exact_cover(&quads, &fixture.expected_faces());
  let area: u32 = quads.iter().map(|q| q.area()).sum();
  assert_eq!(area, 6 * 64 * 64);
}

#[test]
fn test_quads_past_capacity_are_dropped() {
  let fixture = RegionFixture::new(solid_noise(3, 20), 16);
  fixture.mesh(&GreedyMeshKernel);

  assert!(fixture.face_count() > 16);
  let quads = fixture.quads();
  assert_eq!(quads.len(), 16);

  let expected: std::collections::HashSet<_> = fixture.expected_faces().into_iter().collect();
  for quad in &quads {
    assert!(quad_faces(quad).all(|f| expected.contains(&f)));
  }
  assert!(face_coverage(&quads).values().all(|&n| n == 1));
}
