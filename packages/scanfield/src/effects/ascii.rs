//! Character-cell rendering.
//!
//! The scene is pre-rendered into a low-resolution target whose pixels map
//! onto a grid of screen cells; the shader then picks a glyph from a font
//! atlas for each cell based on the cell's brightness and depth.

use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};

use super::ensure_positive;
use crate::post_processing::{
    wrong_params, AuxInput, EffectPass, Lifecycle, PassKind, PassParams, PassState, TargetId, TargetSpec,
    ViewportMetrics,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AsciiParams {
    /// Manifest id of the glyph atlas image.
    pub font_texture_id: String,
    pub font_map_size: [f32; 2],
    pub font_char_size: [f32; 2],
    pub camera_near: f32,
    pub camera_far: f32,
}

impl AsciiParams {
    fn validate(&self) -> Result<()> {
        if self.font_texture_id.is_empty() {
            bail!("ascii pass: font_texture_id is empty");
        }
        for axis in 0..2 {
            ensure_positive("ascii", "font_map_size", self.font_map_size[axis])?;
            ensure_positive("ascii", "font_char_size", self.font_char_size[axis])?;
            if self.font_char_size[axis] > self.font_map_size[axis] {
                bail!(
                    "ascii pass: glyph cell {:?} larger than atlas {:?}",
                    self.font_char_size,
                    self.font_map_size
                );
            }
        }
        ensure_positive("ascii", "camera_near", self.camera_near)?;
        if self.camera_far <= self.camera_near {
            bail!("ascii pass: camera_far must exceed camera_near");
        }
        Ok(())
    }

    /// Glyphs per atlas row and column.
    pub fn font_char_count(&self) -> [f32; 2] {
        [
            self.font_map_size[0] / self.font_char_size[0],
            self.font_map_size[1] / self.font_char_size[1],
        ]
    }

    pub fn font_char_total_count(&self) -> f32 {
        let [x, y] = self.font_char_count();
        x.floor() * y.floor()
    }
}

/// How many character cells cover the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharGrid {
    /// Exact (fractional) cell count per axis.
    pub precise: [f32; 2],
    /// Cell count rounded up.
    pub ceil: [u32; 2],
}

impl CharGrid {
    pub fn for_viewport(metrics: &ViewportMetrics, cell: [f32; 2]) -> Self {
        let precise = [metrics.width as f32 / cell[0], metrics.height as f32 / cell[1]];
        Self {
            precise,
            ceil: [precise[0].ceil().max(1.0) as u32, precise[1].ceil().max(1.0) as u32],
        }
    }

    /// Low-res target size: the ceiled cell count, doubled for supersampling.
    pub fn target_size(&self) -> (u32, u32) {
        (self.ceil[0] * 2, self.ceil[1] * 2)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AsciiUniforms {
    pub font_char_count: [f32; 2],
    pub font_char_size: [f32; 2],
    pub render_char_count: [f32; 2],
    pub render_char_size: [f32; 2],
    pub font_char_total_count: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub _pad: f32,
}

#[derive(Debug)]
pub struct AsciiPass {
    lifecycle: Lifecycle,
    params: Option<AsciiParams>,
    grid: Option<CharGrid>,
}

impl AsciiPass {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(PassKind::Ascii),
            params: None,
            grid: None,
        }
    }

    pub fn grid(&self) -> Option<CharGrid> {
        self.grid
    }

    pub fn uniforms(&self) -> AsciiUniforms {
        let Some(params) = &self.params else {
            return AsciiUniforms::default();
        };
        let font_count = params.font_char_count();
        let (render_count, render_size) = match self.grid {
            Some(grid) => (grid.precise, [1.0 / grid.precise[0], 1.0 / grid.precise[1]]),
            None => ([1.0, 1.0], [1.0, 1.0]),
        };
        AsciiUniforms {
            font_char_count: font_count,
            font_char_size: [1.0 / font_count[0], 1.0 / font_count[1]],
            render_char_count: render_count,
            render_char_size: render_size,
            font_char_total_count: params.font_char_total_count(),
            camera_near: params.camera_near,
            camera_far: params.camera_far,
            _pad: 0.0,
        }
    }
}

impl Default for AsciiPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for AsciiPass {
    fn kind(&self) -> PassKind {
        PassKind::Ascii
    }

    fn state(&self) -> PassState {
        self.lifecycle.state()
    }

    fn configure(&mut self, params: &PassParams) -> Result<()> {
        let PassParams::Ascii(params) = params else {
            return Err(wrong_params(PassKind::Ascii, params));
        };
        params.validate()?;
        self.lifecycle.configure()?;
        self.params = Some(params.clone());
        Ok(())
    }

    fn on_resize(&mut self, metrics: &ViewportMetrics) -> Result<()> {
        self.lifecycle.ensure_configured("resize")?;
        if let Some(params) = &self.params {
            self.grid = Some(CharGrid::for_viewport(metrics, params.font_char_size));
        }
        Ok(())
    }

    fn update(&mut self, _dt: f32) -> Result<()> {
        self.lifecycle.activate()
    }

    fn uniform_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.uniforms()).to_vec()
    }

    fn aux_inputs(&self) -> Vec<AuxInput> {
        let font = self
            .params
            .as_ref()
            .map(|p| p.font_texture_id.clone())
            .unwrap_or_default();
        vec![
            AuxInput::Color(TargetId::LowRes),
            AuxInput::Depth(TargetId::LowRes),
            AuxInput::AssetTexture(font),
        ]
    }

    fn offscreen_targets(&self, metrics: &ViewportMetrics) -> Vec<TargetSpec> {
        let cell = self
            .params
            .as_ref()
            .map(|p| p.font_char_size)
            .unwrap_or([8.0, 8.0]);
        let (width, height) = CharGrid::for_viewport(metrics, cell).target_size();
        vec![TargetSpec {
            id: TargetId::LowRes,
            width,
            height,
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

    fn params() -> AsciiParams {
        AsciiParams {
            font_texture_id: "2".to_string(),
            font_map_size: [64.0, 64.0],
            font_char_size: [8.0, 8.0],
            camera_near: 3.0,
            camera_far: 8.0,
        }
    }

    #[test]
    fn test_font_metrics() {
        let p = params();
        assert_eq!(p.font_char_count(), [8.0, 8.0]);
        assert_eq!(p.font_char_total_count(), 64.0);
    }

    #[test]
    fn test_low_res_size_is_ceiled_and_doubled() {
        let grid = CharGrid::for_viewport(&ViewportMetrics::new(1001, 600), [8.0, 8.0]);
        assert_eq!(grid.ceil, [126, 75]);
        assert_eq!(grid.target_size(), (252, 150));
        assert!((grid.precise[0] - 125.125).abs() < 1e-4);
    }

    #[test]
    fn test_resize_updates_render_char_uniforms() {
        let mut pass = AsciiPass::new();
        pass.configure(&PassParams::Ascii(params())).unwrap();
        pass.on_resize(&ViewportMetrics::new(800, 400)).unwrap();
        let u = pass.uniforms();
        assert_eq!(u.render_char_count, [100.0, 50.0]);
        assert_eq!(u.render_char_size, [0.01, 0.02]);
        assert_eq!(u.font_char_size, [0.125, 0.125]);

        let targets = pass.offscreen_targets(&ViewportMetrics::new(800, 400));
        assert_eq!((targets[0].width, targets[0].height), (200, 100));
    }

    #[test]
    fn test_declares_font_and_low_res_inputs() {
        let mut pass = AsciiPass::new();
        pass.configure(&PassParams::Ascii(params())).unwrap();
        let aux = pass.aux_inputs();
        assert!(aux.contains(&AuxInput::Depth(TargetId::LowRes)));
        assert!(aux.contains(&AuxInput::AssetTexture("2".to_string())));
    }

    #[test]
    fn test_rejects_cell_larger_than_atlas() {
        let mut bad = params();
        bad.font_char_size = [128.0, 8.0];
        assert!(AsciiPass::new().configure(&PassParams::Ascii(bad)).is_err());
    }

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<AsciiUniforms>(), 48);
    }
}
