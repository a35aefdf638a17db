//! Base scene render into the first chain target.
//!
//! The pass carries no uniforms; the scene renderer draws geometry straight
//! into `Color(0)`.

use anyhow::Result;

use crate::post_processing::{wrong_params, EffectPass, Lifecycle, PassKind, PassParams, PassState, ViewportMetrics};

#[derive(Debug)]
pub struct ScenePass {
    lifecycle: Lifecycle,
}

impl ScenePass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::Scene),
        }
    }
}

impl Default for ScenePass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for ScenePass {
    fn kind(&self) -> PassKind {
        PassKind::Scene
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        match params {
            PassParams::Scene => self.lifecycle.configure(),
            other => Err(wrong_params(PassKind::Scene, other)),
        }
    }

    fn on_resize(&mut self, _metrics: &ViewportMetrics) -> Result<()> {
        self.lifecycle.ensure_configured("resize")
    }

    fn update(&mut self, _dt: f32) -> Result<()> {
        self.lifecycle.activate()
    }

    fn uniform_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn dispose(&mut self) -> Result<()> {
        self.lifecycle.dispose()
    }
}
