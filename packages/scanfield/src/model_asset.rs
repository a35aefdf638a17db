//! Model asset decoding.
//!
//! The character model ships as a binary glTF container. Every triangle
//! primitive reachable from the default scene is flattened into a single
//! vertex/index list with node transforms baked in, which is all the scene
//! renderer needs for one textured draw call.
//!
//! ## Normal Handling
//!
//! Provided normals are used when present. Normals are generated only when a
//! primitive lacks them, using area-weighted averaging of adjacent face normals.

use anyhow::{anyhow, Context, Result};
use glam::{Mat3, Mat4, Vec3};

use crate::gpu::mesh::Vertex;

/// Axis-aligned bounding box for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Compute bounding box from a set of vertices.
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        if vertices.is_empty() {
            return Self::default();
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        for v in vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }

        Self { min, max }
    }

    /// Get the center of the bounding box.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Get the dimensions of the bounding box.
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// A decoded model with geometry data ready for upload.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bounds: BoundingBox,
}

impl ModelData {
    /// Create a model from raw geometry data.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bounds = BoundingBox::from_vertices(&vertices);
        Self {
            vertices,
            indices,
            bounds,
        }
    }

    /// Decode a binary glTF (`.glb`) container.
    pub fn from_glb(bytes: &[u8]) -> Result<Self> {
        let (document, buffers, _images) =
            gltf::import_slice(bytes).context("failed to parse glTF container")?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| anyhow!("glTF container has no scenes"))?;

        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for node in scene.nodes() {
            collect_node(&node, Mat4::IDENTITY, &buffers, &mut vertices, &mut indices);
        }

        if vertices.is_empty() {
            return Err(anyhow!("glTF container contains no triangle geometry"));
        }

        Ok(Self::new(vertices, indices))
    }

    /// Vertical offset that centres the model on its bounding-box midpoint.
    ///
    /// Applied once at load time; the model never moves afterwards.
    pub fn centering_offset(&self) -> f32 {
        -self.bounds.size()[1] / 2.0
    }

    /// Get the number of triangles in the model.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping non-triangle primitive in mesh {:?}",
                    mesh.name().unwrap_or("<unnamed>")
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = match reader.read_positions() {
                Some(iter) => iter.collect(),
                None => continue,
            };
            let local_indices: Vec<u32> = reader
                .read_indices()
                .map(|i| i.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(iter) => iter.collect(),
                None => compute_vertex_normals(&positions, &local_indices),
            };
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|tc| tc.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

            let base = vertices.len() as u32;
            for (i, position) in positions.iter().enumerate() {
                let p = world.transform_point3(Vec3::from_array(*position));
                let n = (normal_matrix * Vec3::from_array(normals[i])).normalize_or_zero();
                let uv = uvs.get(i).copied().unwrap_or([0.0, 0.0]);
                vertices.push(Vertex::new(p.to_array(), n.to_array(), uv));
            }
            indices.extend(local_indices.iter().map(|idx| base + idx));
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, vertices, indices);
    }
}

/// Compute area-weighted vertex normals from face normals.
///
/// For each vertex, accumulates the (unnormalized) face normal of each adjacent triangle.
/// The resulting normal is normalized. This gives area-weighted averaging since
/// larger triangles contribute proportionally more to the normal.
fn compute_vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks(3) {
        if tri.len() != 3 {
            continue;
        }

        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);

        // Skip out-of-range triangles
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }

        let p0 = Vec3::from_array(positions[i0]);
        let p1 = Vec3::from_array(positions[i1]);
        let p2 = Vec3::from_array(positions[i2]);

        // Magnitude = 2 * triangle area
        let face_normal = (p1 - p0).cross(p2 - p0);

        for idx in [i0, i1, i2] {
            normals[idx] += face_normal;
        }
    }

    normals
        .into_iter()
        .map(|n| {
            if n.length() > 1e-6 {
                n.normalize().to_array()
            } else {
                // Degenerate normal, use Y-up as fallback
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_from_vertices() {
        let vertices = vec![
            Vertex::new([-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0; 2]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0; 2]),
            Vertex::new([0.0, 2.0, 0.0], [0.0, 1.0, 0.0], [0.0; 2]),
        ];

        let bounds = BoundingBox::from_vertices(&vertices);
        assert_eq!(bounds.min, [-1.0, 0.0, 0.0]);
        assert_eq!(bounds.max, [1.0, 2.0, 0.0]);
        assert_eq!(bounds.center(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_centering_offset_is_half_height() {
        let model = ModelData::new(
            vec![
                Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0; 2]),
                Vertex::new([1.0, 4.0, 0.0], [0.0, 0.0, 1.0], [0.0; 2]),
                Vertex::new([0.0, 3.0, 1.0], [0.0, 0.0, 1.0], [0.0; 2]),
            ],
            vec![0, 1, 2],
        );
        assert_eq!(model.centering_offset(), -1.5);
        assert_eq!(model.triangle_count(), 1);
    }

    #[test]
    fn test_generated_normals_face_outwards() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2]);
        for n in normals {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ModelData::from_glb(b"definitely not a glb").is_err());
    }
}
