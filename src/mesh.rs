use std::f32::consts::PI;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::AssetError;

/// Number of floats per interleaved vertex: `position.xyz normal.xyz uv.xy`.
pub const VERTEX_STRIDE: usize = 8;

/// Interleaved triangle mesh ready for upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn position(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) {
        self.vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z, uv.x, uv.y,
        ]);
    }
}

/// UV sphere with the same vertex layout as a `width x height` segmented
/// sphere in most 3D toolkits: `u` runs with longitude, `v` from the north
/// pole (0) to the south pole (1).
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut mesh = MeshData::default();

    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let normal = Vec3::new(
                -(u * 2.0 * PI).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * 2.0 * PI).sin() * (v * PI).sin(),
            );
            mesh.push_vertex(normal * radius, normal, Vec2::new(u, v));
        }
    }

    let row = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let a = y * row + x + 1;
            let b = y * row + x;
            let c = (y + 1) * row + x;
            let d = (y + 1) * row + x + 1;
            if y != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if y != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

/// One drawable piece of a model with its material base color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPart {
    pub mesh: MeshData,
    pub color: Vec4,
}

/// Decoded landmark model, flattened into model space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub parts: Vec<ModelPart>,
    pub bounds_center: Vec3,
    pub bounds_radius: f32,
}

impl ModelData {
    /// Decodes a binary glTF file. Every primitive of the default scene is
    /// baked with its node transform; glTF textures are ignored in favour of
    /// the material base color.
    pub fn from_glb(path: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let (document, buffers, _images) =
            gltf::import_slice(bytes).map_err(|source| AssetError::Model {
                path: path.to_string(),
                source,
            })?;

        let mut parts = Vec::new();
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                collect_node(&node, Mat4::IDENTITY, &buffers, &mut parts);
            }
        }

        if parts.is_empty() {
            return Err(AssetError::EmptyModel {
                path: path.to_string(),
            });
        }
        Ok(Self::from_parts(parts))
    }

    pub fn from_parts(parts: Vec<ModelPart>) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for part in &parts {
            for index in 0..part.mesh.vertex_count() {
                let p = part.mesh.position(index);
                min = min.min(p);
                max = max.max(p);
            }
        }
        let (bounds_center, bounds_radius) = if min.x <= max.x {
            let center = (min + max) * 0.5;
            let radius = parts
                .iter()
                .flat_map(|part| (0..part.mesh.vertex_count()).map(|i| part.mesh.position(i)))
                .map(|p| p.distance(center))
                .fold(0.0f32, f32::max);
            (center, radius)
        } else {
            (Vec3::ZERO, 0.0)
        };
        Self {
            parts,
            bounds_center,
            bounds_radius,
        }
    }
}

fn collect_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    parts: &mut Vec<ModelPart>,
) {
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            if let Some(part) = read_primitive(&primitive, world, buffers) {
                parts.push(part);
            }
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, parts);
    }
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
) -> Option<ModelPart> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
    let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from).collect();
    if positions.is_empty() {
        return None;
    }
    let normals: Option<Vec<Vec3>> = reader
        .read_normals()
        .map(|normals| normals.map(Vec3::from).collect());
    let uvs: Option<Vec<Vec2>> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().map(Vec2::from).collect());
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let mut mesh = MeshData::default();
    for (index, position) in positions.iter().enumerate() {
        let normal = normals
            .as_ref()
            .and_then(|normals| normals.get(index))
            .map(|n| (normal_matrix * *n).normalize_or_zero())
            .unwrap_or(Vec3::ZERO);
        let uv = uvs
            .as_ref()
            .and_then(|uvs| uvs.get(index))
            .copied()
            .unwrap_or(Vec2::ZERO);
        mesh.push_vertex(transform.transform_point3(*position), normal, uv);
    }
    mesh.indices = indices
        .into_iter()
        .filter(|&index| (index as usize) < positions.len())
        .collect();
    mesh.indices.truncate(mesh.indices.len() / 3 * 3);
    if normals.is_none() {
        compute_normals(&mut mesh);
    }

    let color = Vec4::from(
        primitive
            .material()
            .pbr_metallic_roughness()
            .base_color_factor(),
    );
    Some(ModelPart { mesh, color })
}

/// Fills vertex normals by accumulating area-weighted face normals.
fn compute_normals(mesh: &mut MeshData) {
    let mut accum = vec![Vec3::ZERO; mesh.vertex_count()];
    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let (p0, p1, p2) = (mesh.position(i0), mesh.position(i1), mesh.position(i2));
        let normal = (p1 - p0).cross(p2 - p0);
        accum[i0] += normal;
        accum[i1] += normal;
        accum[i2] += normal;
    }
    for (index, normal) in accum.into_iter().enumerate() {
        let normal = normal.normalize_or_zero();
        let base = index * VERTEX_STRIDE + 3;
        mesh.vertices[base..base + 3].copy_from_slice(&normal.to_array());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a binary glTF holding one unindexed triangle without normals.
    pub(crate) fn triangle_glb() -> Vec<u8> {
        let json = r#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"mesh":0,"translation":[0,0,1]}],"meshes":[{"primitives":[{"attributes":{"POSITION":0}}]}],"accessors":[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}],"bufferViews":[{"buffer":0,"byteLength":36}],"buffers":[{"byteLength":36}]}"#;
        let mut json_bytes = json.as_bytes().to_vec();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }
        let mut bin = Vec::new();
        for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        let total = 12 + 8 + json_bytes.len() + 8 + bin.len();

        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json_bytes);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let mesh = uv_sphere(5.0, 32, 32);
        assert_eq!(mesh.vertex_count(), 33 * 33);
        assert_eq!(mesh.indices.len(), (32 * 32 * 2 - 2 * 32) * 3);
        for index in 0..mesh.vertex_count() {
            assert!((mesh.position(index).length() - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn glb_triangle_gets_transform_and_normals() {
        let model = ModelData::from_glb("triangle.glb", &triangle_glb()).unwrap();
        assert_eq!(model.parts.len(), 1);
        let part = &model.parts[0];
        assert_eq!(part.mesh.indices, vec![0, 1, 2]);
        assert_eq!(part.mesh.position(1), Vec3::new(1.0, 0.0, 1.0));
        for chunk in part.mesh.vertices.chunks_exact(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal - Vec3::Z).length() < 1e-5);
        }
        assert_eq!(part.color, Vec4::ONE);
        assert!(model.bounds_radius > 0.0);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = ModelData::from_glb("broken.glb", b"not a model").unwrap_err();
        assert_eq!(err.path(), "broken.glb");
    }
}
