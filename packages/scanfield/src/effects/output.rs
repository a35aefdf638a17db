//! Final pass: exposure and presentation.

use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};

use crate::post_processing::{wrong_params, EffectPass, Lifecycle, PassKind, PassParams, PassState, ViewportMetrics};

#[derive(Debug, Clone, PartialEq)]
pub struct OutputParams {
    pub exposure: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct OutputUniforms {
    pub exposure: f32,
    pub _pad: [f32; 3],
}

#[derive(Debug)]
pub struct OutputPass {
    lifecycle: Lifecycle,
    exposure: f32,
}

impl OutputPass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::Output),
            exposure: 1.0,
        }
    }

    pub fn uniforms(&self) -> OutputUniforms {
        OutputUniforms {
            exposure: self.exposure,
            _pad: [0.0; 3],
        }
    }
}

impl Default for OutputPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for OutputPass {
    fn kind(&self) -> PassKind {
        PassKind::Output
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        let PassParams::Output(params) = params else {
            return Err(wrong_params(PassKind::Output, params));
        };
        if !params.exposure.is_finite() || params.exposure < 0.0 {
            bail!("output pass: exposure must be non-negative, got {}", params.exposure);
        }
        self.lifecycle.configure()?;
        self.exposure = params.exposure;
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

    fn dispose(&mut self) -> Result<()> {
        self.lifecycle.dispose()
    }
}
