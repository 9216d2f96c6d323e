use super::*;
use crate::pipeline::test_utils::{assert_exact_cover, solid_box, solid_noise, RegionFixture};

const CAPACITY: u32 = 1 << 18;

#[test]
fn test_single_voxel_has_six_faces() {
  let fixture = RegionFixture::new(solid_box([10, 20, 30], [11, 21, 31]), CAPACITY);
  fixture.mesh(&FaceMeshKernel);

  let quads = fixture.quads();
  assert_eq!(quads.len(), 6);
  let mut dirs: Vec<u32> = quads.iter().map(|q| q.axis).collect();
  dirs.sort_unstable();
  assert_eq!(dirs, vec![0, 1, 2, 3, 4, 5]);
  assert!(quads.iter().all(|q| q.pos == [10, 20, 30] && q.size == [1, 1]));
}

#[test]
fn test_counter_matches_tracking_and_face_masks() {
  let fixture = RegionFixture::new(solid_noise(11, 10), CAPACITY);
  fixture.mesh(&FaceMeshKernel);

  let expected = fixture.expected_faces();
  let mut tracked = fixture.tracking_faces();
  let mut sorted = expected.clone();
  tracked.sort_unstable();
  sorted.sort_unstable();
  assert_eq!(tracked, sorted);
  assert_eq!(fixture.face_count() as usize, expected.len());
  assert_exact_cover(&fixture.quads(), &expected);
}

#[test]
fn test_thin_slab_keeps_both_faces() {
  // One voxel thick in Y: +Y and -Y faces share column bit 5.
  let fixture = RegionFixture::new(solid_box([0, 5, 0], [4, 6, 4]), CAPACITY);
  fixture.mesh(&FaceMeshKernel);

  let quads = fixture.quads();
  assert_eq!(quads.iter().filter(|q| q.axis == 2).count(), 16);
  assert_eq!(quads.iter().filter(|q| q.axis == 3).count(), 16);
  assert_exact_cover(&quads, &fixture.expected_faces());
}

#[test]
fn test_rerun_is_idempotent() {
  let fixture = RegionFixture::new(solid_box([2, 2, 2], [9, 9, 9]), CAPACITY);
  fixture.mesh(&FaceMeshKernel);
  let first = fixture.face_count();
  assert_eq!(first, 6 * 49);

  fixture.mesh(&FaceMeshKernel);
  assert_eq!(fixture.face_count(), first);
}
