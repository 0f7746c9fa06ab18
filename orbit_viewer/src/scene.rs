//! Procedural scene for the viewer
//!
//! A ground grid, a textured floor, a central box and a sphere that orbits
//! it. Everything is generated so the viewer runs without asset files.

use std::f32::consts::{PI, TAU};

use frame_pipeline::prelude::*;
use frame_pipeline::render::lighting::Light;

/// Render item that the frame loop animates
pub const ORBITER: &str = "orbiter";

/// Material whose albedo pulses over time
pub const PULSE_MATERIAL: &str = "pulse";

/// Distance of the orbiter from the origin
pub const ORBIT_RADIUS: f32 = 4.0;

/// Line grid of `cells` x `cells` squares centered on the origin
pub fn grid(cells: u32, spacing: f32) -> (Vec<Vertex>, Vec<u32>) {
    let half = cells as f32 * spacing * 0.5;
    let up = [0.0, 1.0, 0.0];
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for line in 0..=cells {
        let offset = line as f32 * spacing - half;
        let base = vertices.len() as u32;
        vertices.push(Vertex::new([offset, 0.0, -half], up, [0.0, 0.0]));
        vertices.push(Vertex::new([offset, 0.0, half], up, [0.0, 1.0]));
        vertices.push(Vertex::new([-half, 0.0, offset], up, [0.0, 0.0]));
        vertices.push(Vertex::new([half, 0.0, offset], up, [1.0, 0.0]));
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// Flat square of side `size` in the XZ plane
pub fn floor(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        Vertex::new([-h, 0.0, -h], up, [0.0, 0.0]),
        Vertex::new([h, 0.0, -h], up, [4.0, 0.0]),
        Vertex::new([h, 0.0, h], up, [4.0, 4.0]),
        Vertex::new([-h, 0.0, h], up, [0.0, 4.0]),
    ];
    (vertices, vec![0, 2, 1, 0, 3, 2])
}

/// Axis-aligned box with per-face normals
pub fn cuboid(width: f32, height: f32, depth: f32) -> (Vec<Vertex>, Vec<u32>) {
    let (w, h, d) = (width * 0.5, height * 0.5, depth * 0.5);
    // (normal, four corners counter-clockwise seen from outside)
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]]),
        ([0.0, 0.0, -1.0], [[w, -h, -d], [-w, -h, -d], [-w, h, -d], [w, h, -d]]),
        ([1.0, 0.0, 0.0], [[w, -h, d], [w, -h, -d], [w, h, -d], [w, h, d]]),
        ([-1.0, 0.0, 0.0], [[-w, -h, -d], [-w, -h, d], [-w, h, d], [-w, h, -d]]),
        ([0.0, 1.0, 0.0], [[-w, h, d], [w, h, d], [w, h, -d], [-w, h, -d]]),
        ([0.0, -1.0, 0.0], [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]]),
    ];
    let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        for (corner, uv) in corners.iter().zip(uvs) {
            vertices.push(Vertex::new(*corner, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// UV sphere with `rings` latitude bands and `segments` longitude slices
pub fn sphere(radius: f32, rings: u32, segments: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let phi = v * PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let theta = u * TAU;
            let normal = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
            let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];
            vertices.push(Vertex::new(position, normal, [u, v]));
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment;
            let b = a + stride;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    (vertices, indices)
}

/// Where the orbiter sits `seconds` into the run
pub fn orbit_transform(seconds: f32) -> Transform {
    let angle = seconds * 0.8;
    let mut transform = Transform::from_translation(Vec3::new(
        ORBIT_RADIUS * angle.cos(),
        1.0 + 0.5 * (seconds * 2.0).sin(),
        ORBIT_RADIUS * angle.sin(),
    ));
    transform.rotate_y(-angle);
    transform
}

/// Pulsing albedo for [`PULSE_MATERIAL`]
pub fn pulse_params(seconds: f32) -> MaterialParams {
    let level = 0.5 + 0.5 * (seconds * 1.5).sin();
    MaterialParams::with_albedo([0.9, 0.3 + 0.6 * level, 0.2, 1.0])
}

/// Build meshes, materials, items and lights
pub fn build(texture: TextureData) -> RenderResult<SceneAssets> {
    let mut meshes = MeshBatchBuilder::new();
    let (vertices, indices) = grid(20, 1.0);
    meshes.add_mesh("grid", &vertices, &indices)?;
    let (vertices, indices) = floor(20.0);
    meshes.add_mesh("floor", &vertices, &indices)?;
    let (vertices, indices) = cuboid(1.5, 1.5, 1.5);
    meshes.add_mesh("box", &vertices, &indices)?;
    let (vertices, indices) = sphere(0.6, 12, 24);
    meshes.add_mesh("sphere", &vertices, &indices)?;

    let mut catalog = CatalogBuilder::new();
    catalog
        .add_texture("checker", texture)?
        .add_material("ground", MaterialDesc::default().with_texture("checker"))?
        .add_material("lines", MaterialDesc::new(MaterialParams::with_albedo([0.6, 0.6, 0.6, 1.0])))?
        .add_material(
            "stone",
            MaterialDesc::new(MaterialParams {
                roughness: 0.8,
                ..MaterialParams::with_albedo([0.55, 0.5, 0.45, 1.0])
            }),
        )?
        .add_material(PULSE_MATERIAL, MaterialDesc::new(pulse_params(0.0)))?
        .add_material(
            "glass",
            MaterialDesc::new(MaterialParams {
                refraction: 1.5,
                ..MaterialParams::with_albedo([0.4, 0.6, 0.9, 0.35])
            }),
        )?
        .add_item(
            RenderItemDesc::new("floor", "floor", "ground")
                .with_transform(Transform::from_translation(Vec3::new(0.0, -0.01, 0.0))),
        )?
        .add_item(
            RenderItemDesc::new("grid", "grid", "lines")
                .with_group(PipelineGroup::Line)
                .with_topology(Topology::LineList),
        )?
        .add_item(
            RenderItemDesc::new("pedestal", "box", "stone")
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.75, 0.0))),
        )?
        .add_item(RenderItemDesc::new(ORBITER, "sphere", PULSE_MATERIAL).with_transform(orbit_transform(0.0)))?
        .add_item(
            RenderItemDesc::new("shell", "sphere", "glass")
                .with_group(PipelineGroup::Transparent)
                .with_transform(
                    Transform::from_translation(Vec3::new(0.0, 2.2, 0.0)).with_scale(Vec3::new(1.2, 1.2, 1.2)),
                ),
        )?;

    let lighting = LightingEnvironment::default_scene()
        .add_light(Light::point(Vec3::new(0.0, 4.0, 0.0), Vec3::new(1.0, 0.9, 0.7), 2.0, 12.0));

    Ok(SceneAssets {
        meshes: meshes.build(),
        catalog,
        lighting,
    })
}
