//! Fast approximate anti-aliasing.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};

use crate::post_processing::{wrong_params, EffectPass, Lifecycle, PassKind, PassParams, PassState, ViewportMetrics};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FxaaUniforms {
    /// Texel size: `1 / width`, `1 / height`.
    pub resolution: [f32; 2],
    pub _pad: [f32; 2],
}

#[derive(Debug)]
pub struct FxaaPass {
    lifecycle: Lifecycle,
    resolution: [f32; 2],
}

impl FxaaPass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::Fxaa),
            resolution: [1.0, 1.0],
        }
    }

    pub fn uniforms(&self) -> FxaaUniforms {
        FxaaUniforms {
            resolution: self.resolution,
            _pad: [0.0; 2],
        }
    }
}

impl Default for FxaaPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for FxaaPass {
    fn kind(&self) -> PassKind {
        PassKind::Fxaa
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        match params {
            PassParams::Fxaa => self.lifecycle.configure(),
            other => Err(wrong_params(PassKind::Fxaa, other)),
        }
    }

    fn on_resize(&mut self, metrics: &ViewportMetrics) -> Result<()> {
        self.lifecycle.ensure_configured("resize")?;
        self.resolution = [1.0 / metrics.width as f32, 1.0 / metrics.height as f32];
        Ok(())
    }

    fn update(&mut self, _dt: f32) -> Result<()> {
        self.lifecycle.activate()
    }

    fn uniform_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.uniforms()).to_vec()
    }

    fn dispose(&mut self) -> Result<()> {
        self.lifecycle.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_sets_texel_size() {
        let mut pass = FxaaPass::new();
        pass.configure(&PassParams::Fxaa).unwrap();
        pass.on_resize(&ViewportMetrics::new(400, 200)).unwrap();
        assert_eq!(pass.uniforms().resolution, [0.0025, 0.005]);
    }

    #[test]
    fn test_resize_before_configure_fails() {
        let mut pass = FxaaPass::new();
        assert!(pass.on_resize(&ViewportMetrics::new(4, 4)).is_err());
    }
}
