//! Drifting point field in front of the model.
//!
//! Points are seeded once inside the camera frustum and then driven purely by
//! an accumulated clock: each frame their positions are recomputed from the
//! seed positions, their individual speeds and two slow oscillators, wrapped
//! into the current frustum extents. Resizing changes the extents the points
//! wrap into, not the points themselves.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::CameraFrustum;
use crate::config::ParticleSettings;

#[derive(Clone, Debug)]
pub struct ParticleField {
    /// Seed positions in group-local space.
    base: Vec<[f32; 3]>,
    speeds: Vec<f32>,
    /// Current positions in group-local space.
    positions: Vec<[f32; 3]>,
    frustum: CameraFrustum,
    elapsed: f32,
}

impl ParticleField {
    pub fn new(settings: &ParticleSettings, frustum: CameraFrustum) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed);

        let mut base = Vec::with_capacity(settings.count);
        let mut speeds = Vec::with_capacity(settings.count);
        for _ in 0..settings.count {
            let x = rng.gen::<f32>() * frustum.width;
            let y = rng.gen::<f32>() * frustum.height;
            let z = (rng.gen::<f32>() * 2.0 - 1.0) * (settings.depth / 2.0);
            base.push([x, y, z]);
            speeds.push(1.0 + rng.gen::<f32>() * settings.speed);
        }

        log::debug!(
            "Seeded {} particles in {:.2}x{:.2} frustum",
            settings.count,
            frustum.width,
            frustum.height
        );

        Self {
            positions: base.clone(),
            base,
            speeds,
            frustum,
            elapsed: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn frustum(&self) -> CameraFrustum {
        self.frustum
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    /// Advance the clock and recompute every position.
    pub fn update(&mut self, dt: f32) {
        self.elapsed += dt;

        let drift_x = (self.elapsed * 0.01).sin();
        let drift_y = self.elapsed.cos() * 0.01;
        let half_w = self.frustum.half_width();
        let half_h = self.frustum.half_height();

        for ((pos, base), speed) in self.positions.iter_mut().zip(&self.base).zip(&self.speeds) {
            pos[0] = wrap(base[0] * half_w + speed * (1.0 + drift_x * 4.0) * 0.1, self.frustum.width);
            pos[1] = wrap(base[1] * half_h + speed * (1.0 - drift_y * 4.0) * 0.1, self.frustum.height);
            pos[2] = base[2];
        }
    }

    /// Adopt new frustum extents. Seeds and speeds are kept.
    pub fn on_resize(&mut self, frustum: CameraFrustum) {
        self.frustum = frustum;
    }

    /// Translation applied to the whole group so the field is centred.
    pub fn group_offset(&self) -> [f32; 3] {
        [-self.frustum.half_width(), -self.frustum.half_height(), 0.0]
    }

    /// Positions relative to the group origin, each within `[0, extent)`.
    pub fn local_positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Positions with the group offset applied.
    pub fn world_positions(&self) -> Vec<[f32; 3]> {
        let [ox, oy, oz] = self.group_offset();
        self.positions
            .iter()
            .map(|p| [p[0] + ox, p[1] + oy, p[2] + oz])
            .collect()
    }
}

/// Euclidean remainder, pinned into `[0, extent)`.
fn wrap(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 {
        return 0.0;
    }
    let r = value.rem_euclid(extent);
    // rem_euclid can round up to exactly `extent` for tiny negative inputs.
    if r >= extent {
        0.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(count: usize) -> ParticleSettings {
        ParticleSettings {
            count,
            ..ParticleSettings::default()
        }
    }

    fn frustum(aspect: f32) -> CameraFrustum {
        CameraFrustum::from_perspective(45.0, aspect, 6.0)
    }

    #[test]
    fn test_positions_stay_within_frustum() {
        let mut field = ParticleField::new(&settings(200), frustum(16.0 / 9.0));
        for _ in 0..500 {
            field.update(0.37);
            let f = field.frustum();
            for p in field.local_positions() {
                assert!(p[0] >= 0.0 && p[0] < f.width, "x {} out of [0, {})", p[0], f.width);
                assert!(p[1] >= 0.0 && p[1] < f.height, "y {} out of [0, {})", p[1], f.height);
                assert!(p[2].abs() <= 1.5);
            }
        }
    }

    #[test]
    fn test_speeds_in_range() {
        let field = ParticleField::new(&settings(100), frustum(1.0));
        assert_eq!(field.len(), 100);
        assert!(field.speeds().iter().all(|s| (1.0..6.0).contains(s)));
    }

    #[test]
    fn test_same_seed_same_field() {
        let mut a = ParticleField::new(&settings(50), frustum(1.0));
        let mut b = ParticleField::new(&settings(50), frustum(1.0));
        a.update(1.0);
        b.update(1.0);
        assert_eq!(a.local_positions(), b.local_positions());
    }

    #[test]
    fn test_resize_keeps_seeds_and_wraps_into_new_extent() {
        let mut field = ParticleField::new(&settings(200), frustum(2.0));
        let speeds = field.speeds().to_vec();
        field.on_resize(frustum(0.5));
        assert_eq!(field.speeds(), speeds.as_slice());

        field.update(0.016);
        let width = field.frustum().width;
        assert!(field.local_positions().iter().all(|p| p[0] < width));
    }

    #[test]
    fn test_world_positions_are_centred() {
        let mut field = ParticleField::new(&settings(200), frustum(1.0));
        field.update(0.5);
        let half_w = field.frustum().half_width();
        for p in field.world_positions() {
            assert!(p[0] >= -half_w && p[0] < half_w);
        }
    }

    #[test]
    fn test_wrap_pins_negative_values() {
        assert_eq!(wrap(-1.0, 4.0), 3.0);
        assert_eq!(wrap(9.0, 4.0), 1.0);
        assert_eq!(wrap(-1e-9, 4.0), 0.0);
        assert_eq!(wrap(5.0, 0.0), 0.0);
    }
}
