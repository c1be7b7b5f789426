//! Example: build an octree over a UV sphere and pick it with a fan of rays.
//!
//! Run with: cargo run --example pick_sphere -- [config.json]

use std::env;
use std::f32::consts::{PI, TAU};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use octri_core::Mesh;
use octri_math::{Vec2, Vec3};
use octri_octree::{intersect_rays, Octree, OctreeConfig, RaySegment, TriangleSet};

/// Unit sphere with `rings` latitude bands and `segments` longitude bands.
fn uv_sphere(rings: u32, segments: u32) -> Mesh {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let phi = u * TAU;
            positions.push(Vec3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            ));
            uvs.push(Vec2::new(u, v));
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    Mesh::new_with_uvs(positions, indices, uvs)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = match env::args().nth(1) {
        Some(path) => OctreeConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load octree config from {}", path))?,
        None => OctreeConfig::default(),
    };
    config.validate()?;

    let mesh = Arc::new(uv_sphere(64, 128));
    let set = Arc::new(TriangleSet::from_mesh(mesh).context("Sphere mesh is malformed")?);

    let start = Instant::now();
    let tree = Octree::new(set, config);
    println!(
        "Built octree: {} triangles, {} nodes, depth {} in {:.2?}",
        tree.len(),
        tree.node_count(),
        tree.depth(),
        start.elapsed()
    );
    octri_octree::check_structure(&tree)?;

    // Fan of rays from a point outside the sphere toward a grid on the far side
    let origin = Vec3::new(0.0, 0.0, -4.0);
    let mut segments = Vec::new();
    for y in 0..64 {
        for x in 0..64 {
            let target = Vec3::new(x as f32 / 31.5 - 1.0, y as f32 / 31.5 - 1.0, 4.0);
            segments.push(RaySegment::between(origin, target));
        }
    }

    let start = Instant::now();
    let hits = intersect_rays(&tree, &segments);
    let elapsed = start.elapsed();

    let found: Vec<_> = hits.iter().flatten().collect();
    println!(
        "Traced {} rays in {:.2?}: {} hits",
        segments.len(),
        elapsed,
        found.len()
    );
    if let Some(hit) = found.first() {
        println!(
            "  first hit: triangle {} at ({:.3}, {:.3}, {:.3}), uv ({:.3}, {:.3})",
            hit.triangle.0, hit.point.x, hit.point.y, hit.point.z, hit.tex_coord.x, hit.tex_coord.y
        );
    }

    Ok(())
}
