//! Depth scanline.
//!
//! A band sweeps through linearised scene depth. The band position advances
//! with time and wraps at `period`.

use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};

use super::ensure_positive;
use crate::post_processing::{
    wrong_params, AuxInput, EffectPass, Lifecycle, PassKind, PassParams, PassState, TargetId, TargetSpec,
    ViewportMetrics,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ScanParams {
    /// Scan advance per second.
    pub speed: f32,
    pub period: f32,
    pub camera_near: f32,
    pub camera_far: f32,
}

impl ScanParams {
    fn validate(&self) -> Result<()> {
        ensure_positive("scan", "period", self.period)?;
        ensure_positive("scan", "camera_near", self.camera_near)?;
        if !self.speed.is_finite() || self.speed < 0.0 {
            bail!("scan pass: speed must be non-negative, got {}", self.speed);
        }
        if self.camera_far <= self.camera_near {
            bail!(
                "scan pass: camera_far ({}) must exceed camera_near ({})",
                self.camera_far,
                self.camera_near
            );
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ScanUniforms {
    pub camera_near: f32,
    pub camera_far: f32,
    pub scan: f32,
    pub _pad: f32,
}

#[derive(Debug)]
pub struct ScanPass {
    lifecycle: Lifecycle,
    params: Option<ScanParams>,
    scan: f32,
}

impl ScanPass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::Scan),
            params: None,
            scan: 0.0,
        }
    }

    /// Current band position in `[0, period)`.
    pub fn scan(&self) -> f32 {
        self.scan
    }

    pub fn uniforms(&self) -> ScanUniforms {
        let (near, far) = self
            .params
            .as_ref()
            .map(|p| (p.camera_near, p.camera_far))
            .unwrap_or((1.0, 1000.0));
        ScanUniforms {
            camera_near: near,
            camera_far: far,
            scan: self.scan,
            _pad: 0.0,
        }
    }
}

impl Default for ScanPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for ScanPass {
    fn kind(&self) -> PassKind {
        PassKind::Scan
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        let PassParams::Scan(params) = params else {
            return Err(wrong_params(PassKind::Scan, params));
        };
        params.validate()?;
        self.lifecycle.configure()?;
        self.params = Some(params.clone());
        Ok(())
    }

    fn on_resize(&mut self, _metrics: &ViewportMetrics) -> Result<()> {
        self.lifecycle.ensure_configured("resize")
    }

    fn update(&mut self, dt: f32) -> Result<()> {
        self.lifecycle.activate()?;
        if let Some(params) = &self.params {
            self.scan = (self.scan + dt * params.speed).rem_euclid(params.period);
        }
        Ok(())
    }

    fn uniform_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.uniforms()).to_vec()
    }

    fn aux_inputs(&self) -> Vec<AuxInput> {
        vec![AuxInput::Depth(TargetId::Depth)]
    }

    fn offscreen_targets(&self, metrics: &ViewportMetrics) -> Vec<TargetSpec> {
        vec![TargetSpec {
            id: TargetId::Depth,
            width: metrics.width,
            height: metrics.height,
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

    fn params() -> PassParams {
        PassParams::Scan(ScanParams {
            speed: 0.1,
            period: 0.5,
            camera_near: 3.0,
            camera_far: 8.0,
        })
    }

    #[test]
    fn test_scan_wraps_at_period() {
        let mut pass = ScanPass::new();
        pass.configure(&params()).unwrap();
        pass.update(2.0).unwrap();
        assert!((pass.scan() - 0.2).abs() < 1e-6);
        pass.update(3.5).unwrap();
        // 0.2 + 0.35 = 0.55 -> 0.05
        assert!((pass.scan() - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_update_before_configure_fails() {
        let mut pass = ScanPass::new();
        assert!(pass.update(0.016).is_err());
    }

    #[test]
    fn test_rejects_inverted_clip_planes() {
        let mut pass = ScanPass::new();
        let bad = PassParams::Scan(ScanParams {
            speed: 0.1,
            period: 0.5,
            camera_near: 8.0,
            camera_far: 3.0,
        });
        assert!(pass.configure(&bad).is_err());
        assert_eq!(pass.state(), PassState::Uninitialized);
    }

    #[test]
    fn test_rejects_foreign_params() {
        let mut pass = ScanPass::new();
        assert!(pass.configure(&PassParams::Fxaa).is_err());
    }

    #[test]
    fn test_uniforms_carry_clip_planes() {
        let mut pass = ScanPass::new();
        pass.configure(&params()).unwrap();
        let u = pass.uniforms();
        assert_eq!((u.camera_near, u.camera_far), (3.0, 8.0));
        assert_eq!(pass.uniform_bytes().len(), 16);
    }
}
