//! The 3D scene: one centred model, a particle field and a fixed camera.
//!
//! This is pure CPU state. The GPU side lives in
//! [`crate::gpu::scene_renderer`] and reads from here each frame.

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::config::{LightSettings, ViewerConfig};
use crate::model_asset::{BoundingBox, ModelData};
use crate::particle_field::ParticleField;
use crate::post_processing::ViewportMetrics;

/// Placement of the model in world space.
///
/// Set once at construction and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPlacement {
    pub translation: [f32; 3],
    pub bounds: BoundingBox,
}

impl ModelPlacement {
    pub fn from_model(model: &ModelData) -> Self {
        Self {
            translation: [0.0, model.centering_offset(), 0.0],
            bounds: model.bounds,
        }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(Vec3::from_array(self.translation))
    }
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub camera: Camera,
    pub model: ModelPlacement,
    pub particles: ParticleField,
    pub lights: LightSettings,
}

impl SceneGraph {
    pub fn new(model: &ModelData, config: &ViewerConfig, metrics: &ViewportMetrics) -> Self {
        let camera = Camera::new(&config.camera, metrics.aspect());
        let particles = ParticleField::new(&config.particles, camera.frustum());
        let placement = ModelPlacement::from_model(model);

        log::info!(
            "Scene: {} triangles, model offset y={:.3}, {} particles",
            model.triangle_count(),
            placement.translation[1],
            particles.len()
        );

        Self {
            camera,
            model: placement,
            particles,
            lights: config.lights.clone(),
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.particles.update(dt);
    }

    /// Recompute the camera aspect and the frustum the particles wrap into.
    pub fn on_resize(&mut self, metrics: &ViewportMetrics) {
        self.camera.set_aspect(metrics.aspect());
        self.particles.on_resize(self.camera.frustum());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::mesh::Vertex;

    fn box_model() -> ModelData {
        let n = [0.0, 0.0, 1.0];
        ModelData::new(
            vec![
                Vertex::new([-1.0, 0.0, 0.0], n, [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], n, [1.0, 0.0]),
                Vertex::new([0.0, 2.0, 0.0], n, [0.5, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_model_is_centred_vertically() {
        let scene = SceneGraph::new(&box_model(), &ViewerConfig::default(), &ViewportMetrics::new(800, 600));
        assert_eq!(scene.model.translation, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_resize_updates_frustum_not_model() {
        let mut scene = SceneGraph::new(&box_model(), &ViewerConfig::default(), &ViewportMetrics::new(800, 800));
        let before = scene.particles.frustum();
        scene.on_resize(&ViewportMetrics::new(1600, 800));
        let after = scene.particles.frustum();

        assert_eq!(before.height, after.height);
        assert!((after.width - before.width * 2.0).abs() < 1e-4);
        assert_eq!(scene.model.translation, [0.0, -1.0, 0.0]);
        assert_eq!(scene.camera.aspect, 2.0);
    }
}
