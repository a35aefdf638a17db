//! Click ripples.
//!
//! Each click spawns a ring that grows with an ease-out curve and fades in
//! then out. Ripples are evaluated analytically in the fragment shader from a
//! fixed-size array in the uniform block, so no ripple texture is kept.

use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};

use super::ensure_positive;
use crate::post_processing::{wrong_params, EffectPass, Lifecycle, PassKind, PassParams, PassState, ViewportMetrics};

/// Capacity of the uniform array. The oldest ripple is dropped when full.
pub const MAX_RIPPLES: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct RippleParams {
    /// Age gained per second; a ripple expires past age 1.
    pub speed: f32,
    /// Age at which alpha peaks.
    pub peak: f32,
    pub distortion: [f32; 2],
}

impl RippleParams {
    fn validate(&self) -> Result<()> {
        ensure_positive("ripple", "speed", self.speed)?;
        if !(self.peak > 0.0 && self.peak < 1.0) {
            bail!("ripple pass: peak must be in (0, 1), got {}", self.peak);
        }
        Ok(())
    }
}

/// Quartic ease-out on `[0, 1]`.
pub fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(4)
}

/// Opacity at `age`: eased attack up to `peak`, then linear decay to 0 at 1.
pub fn ripple_alpha(age: f32, peak: f32) -> f32 {
    if age < peak {
        ease_out(age / peak)
    } else {
        1.0 - (age - peak) / (1.0 - peak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub age: f32,
    /// Click position in physical pixels.
    pub position: [f32; 2],
    /// Click position scaled to `0..255` per axis.
    pub color: [f32; 2],
}

impl Ripple {
    pub fn radius(&self, viewport_height: f32) -> f32 {
        viewport_height * ease_out(self.age)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RippleGpu {
    pub position: [f32; 2],
    pub color: [f32; 2],
    pub radius: f32,
    pub alpha: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RippleUniforms {
    pub distortion: [f32; 2],
    pub time: f32,
    pub count: u32,
    pub resolution: [f32; 2],
    pub _pad: [f32; 2],
    pub ripples: [RippleGpu; MAX_RIPPLES],
}

#[derive(Debug)]
pub struct RipplePass {
    lifecycle: Lifecycle,
    params: Option<RippleParams>,
    ripples: Vec<Ripple>,
    metrics: ViewportMetrics,
    time: f32,
}

impl RipplePass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::Ripple),
            params: None,
            ripples: Vec::new(),
            metrics: ViewportMetrics::new(1, 1),
            time: 0.0,
        }
    }

    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    pub fn uniforms(&self) -> RippleUniforms {
        let (distortion, peak) = self
            .params
            .as_ref()
            .map(|p| (p.distortion, p.peak))
            .unwrap_or(([0.0; 2], 0.5));
        let height = self.metrics.height as f32;

        let mut gpu = [RippleGpu::default(); MAX_RIPPLES];
        for (slot, ripple) in gpu.iter_mut().zip(&self.ripples) {
            *slot = RippleGpu {
                position: ripple.position,
                color: ripple.color,
                radius: ripple.radius(height),
                alpha: ripple_alpha(ripple.age, peak),
                _pad: [0.0; 2],
            };
        }

        RippleUniforms {
            distortion,
            time: self.time,
            count: self.ripples.len().min(MAX_RIPPLES) as u32,
            resolution: [self.metrics.width as f32, height],
            _pad: [0.0; 2],
            ripples: gpu,
        }
    }
}

impl Default for RipplePass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for RipplePass {
    fn kind(&self) -> PassKind {
        PassKind::Ripple
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        let PassParams::Ripple(params) = params else {
            return Err(wrong_params(PassKind::Ripple, params));
        };
        params.validate()?;
        self.lifecycle.configure()?;
        self.params = Some(params.clone());
        Ok(())
    }

    /// Drops every live ripple; their positions refer to the old size.
    fn on_resize(&mut self, metrics: &ViewportMetrics) -> Result<()> {
        self.lifecycle.ensure_configured("resize")?;
        self.metrics = *metrics;
        self.ripples.clear();
        Ok(())
    }

    fn update(&mut self, dt: f32) -> Result<()> {
        self.lifecycle.activate()?;
        let speed = self.params.as_ref().map(|p| p.speed).unwrap_or(0.0);
        self.time += dt;
        for ripple in &mut self.ripples {
            ripple.age += dt * speed;
        }
        self.ripples.retain(|r| r.age <= 1.0);
        Ok(())
    }

    fn accepts_pointer(&self) -> bool {
        true
    }

    fn on_click(&mut self, x: f32, y: f32) -> Result<()> {
        self.lifecycle.ensure_configured("click")?;
        if self.ripples.len() == MAX_RIPPLES {
            log::debug!("Ripple capacity reached; dropping oldest");
            self.ripples.remove(0);
        }
        self.ripples.push(Ripple {
            age: 0.0,
            position: [x, y],
            color: [
                x / self.metrics.width as f32 * 255.0,
                y / self.metrics.height as f32 * 255.0,
            ],
        });
        Ok(())
    }

    fn uniform_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.uniforms()).to_vec()
    }

    fn dispose(&mut self) -> Result<()> {
        self.ripples.clear();
        self.lifecycle.dispose()
    }
}
