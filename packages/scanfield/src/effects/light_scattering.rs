//! Volumetric light scattering ("god rays").
//!
//! Samples a half-resolution occlusion render along the ray towards the light
//! position and adds the accumulated glow to the chain input.

use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};

use super::ensure_positive;
use crate::post_processing::{
    wrong_params, AuxInput, EffectPass, Lifecycle, PassKind, PassParams, PassState, TargetId, TargetSpec,
    ViewportMetrics,
};

/// Upper bound on the shader's sample loop.
pub const MAX_SAMPLES: u32 = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct LightScatteringParams {
    /// Light position in normalized screen coordinates.
    pub light_position: [f32; 2],
    pub exposure: f32,
    pub density: f32,
    pub weight: f32,
    pub samples: u32,
}

impl LightScatteringParams {
    fn validate(&self) -> Result<()> {
        ensure_positive("light_scattering", "density", self.density)?;
        ensure_positive("light_scattering", "weight", self.weight)?;
        if !self.exposure.is_finite() || self.exposure < 0.0 {
            bail!("light_scattering pass: exposure must be non-negative");
        }
        if self.samples == 0 || self.samples > MAX_SAMPLES {
            bail!(
                "light_scattering pass: samples must be in 1..={}, got {}",
                MAX_SAMPLES,
                self.samples
            );
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightScatteringUniforms {
    pub light_position: [f32; 2],
    pub exposure: f32,
    pub density: f32,
    pub weight: f32,
    pub samples: u32,
    pub _pad: [f32; 2],
}

#[derive(Debug)]
pub struct LightScatteringPass {
    lifecycle: Lifecycle,
    params: Option<LightScatteringParams>,
}

impl LightScatteringPass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::LightScattering),
            params: None,
        }
    }

    pub fn uniforms(&self) -> LightScatteringUniforms {
        match &self.params {
            Some(p) => LightScatteringUniforms {
                light_position: p.light_position,
                exposure: p.exposure,
                density: p.density,
                weight: p.weight,
                samples: p.samples,
                _pad: [0.0; 2],
            },
            None => LightScatteringUniforms::default(),
        }
    }
}

impl Default for LightScatteringPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for LightScatteringPass {
    fn kind(&self) -> PassKind {
        PassKind::LightScattering
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        let PassParams::LightScattering(params) = params else {
            return Err(wrong_params(PassKind::LightScattering, params));
        };
        params.validate()?;
        self.lifecycle.configure()?;
        self.params = Some(params.clone());
        Ok(())
    }

    fn on_resize(&mut self, _metrics: &ViewportMetrics) -> Result<()> {
        self.lifecycle.ensure_configured("resize")
    }

    fn update(&mut self, _dt: f32) -> Result<()> {
        self.lifecycle.activate()
    }

    fn uniform_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.uniforms()).to_vec()
    }

    fn aux_inputs(&self) -> Vec<AuxInput> {
        vec![AuxInput::Color(TargetId::Occlusion)]
    }

    fn offscreen_targets(&self, metrics: &ViewportMetrics) -> Vec<TargetSpec> {
        vec![TargetSpec {
            id: TargetId::Occlusion,
            width: (metrics.width / 2).max(1),
            height: (metrics.height / 2).max(1),
            with_depth: true,
        }]
    }

    fn dispose(&mut self) -> Result<()> {
        self.lifecycle.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LightScatteringParams {
        LightScatteringParams {
            light_position: [0.5, 0.5],
            exposure: 0.2,
            density: 0.6,
            weight: 0.2,
            samples: 80,
        }
    }

    #[test]
    fn test_occlusion_target_is_half_size() {
        let pass = LightScatteringPass::new();
        let targets = pass.offscreen_targets(&ViewportMetrics::new(801, 3));
        assert_eq!((targets[0].width, targets[0].height), (400, 1));
    }

    #[test]
    fn test_rejects_zero_samples() {
        let mut bad = params();
        bad.samples = 0;
        let mut pass = LightScatteringPass::new();
        assert!(pass.configure(&PassParams::LightScattering(bad)).is_err());
        pass.configure(&PassParams::LightScattering(params())).unwrap();
        assert_eq!(pass.uniforms().samples, 80);
    }

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<LightScatteringUniforms>(), 32);
    }
}
