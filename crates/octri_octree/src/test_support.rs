//! Mesh builders shared by the unit tests.

use std::sync::Arc;

use octri_core::Mesh;
use octri_math::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::TriangleSet;

/// Set with one unshared triangle per entry and UVs (0,0), (1,0), (0,1).
pub fn triangle_set_from(triangles: &[[Vec3; 3]]) -> TriangleSet {
    let positions: Vec<Vec3> = triangles.iter().flatten().copied().collect();
    let indices: Vec<u32> = (0..positions.len() as u32).collect();
    let uvs = triangles
        .iter()
        .flat_map(|_| [Vec2::ZERO, Vec2::X, Vec2::Y])
        .collect();

    TriangleSet::from_mesh(Arc::new(Mesh::new_with_uvs(positions, indices, uvs)))
        .expect("test mesh is valid")
}

/// `count` triangles with centers in [-10, 10]^3 and edges up to 2 units.
pub fn random_triangle_set(seed: u64, count: usize) -> TriangleSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let triangles: Vec<[Vec3; 3]> = (0..count)
        .map(|_| {
            let center = random_vec3(&mut rng, 10.0);
            [
                center + random_vec3(&mut rng, 1.0),
                center + random_vec3(&mut rng, 1.0),
                center + random_vec3(&mut rng, 1.0),
            ]
        })
        .collect();
    triangle_set_from(&triangles)
}

pub fn random_vec3(rng: &mut StdRng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-extent..=extent),
        rng.gen_range(-extent..=extent),
        rng.gen_range(-extent..=extent),
    )
}

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
