//! Post-processing pass chain.
//!
//! This module is GPU-free: it decides which passes run, in which order,
//! which render target each one reads and writes, and what every pass's
//! uniform block contains. [`crate::gpu::post_processor::PassExecutor`] turns
//! that description into draw calls.
//!
//! The chain order is fixed:
//!
//! ```text
//! Scene -> [Ascii] -> Scan -> Ripple -> [LightScattering] -> Fxaa -> Output
//! ```
//!
//! The scene pass writes `Color(0)`; every later pass reads the previous
//! pass's output and writes the other ping-pong target, except the last one,
//! which presents to the screen.

use std::collections::BTreeSet;

use anyhow::{bail, Result};

use crate::config::ViewerConfig;
use crate::effects::{
    ascii::{AsciiParams, AsciiPass},
    fxaa::FxaaPass,
    light_scattering::{LightScatteringParams, LightScatteringPass},
    output::{OutputParams, OutputPass},
    ripple::{RippleParams, RipplePass},
    scan::{ScanParams, ScanPass},
    scene::ScenePass,
};

// ============================================================================
// Viewport metrics
// ============================================================================

/// Live drawing-buffer size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportMetrics {
    pub width: u32,
    pub height: u32,
}

impl ViewportMetrics {
    /// Zero dimensions are clamped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

// ============================================================================
// Targets and links
// ============================================================================

/// Identifies a render target owned by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetId {
    /// Full-resolution scene render with depth, read by the scan pass.
    Depth,
    /// Character-cell resolution scene render, read by the ASCII pass.
    LowRes,
    /// Half-resolution scene render, read by light scattering.
    Occlusion,
    /// Ping-pong chain targets.
    Color(u8),
}

impl TargetId {
    /// Targets filled by rendering the scene before the chain runs.
    pub fn is_pre_render(&self) -> bool {
        matches!(self, TargetId::Depth | TargetId::LowRes | TargetId::Occlusion)
    }

    pub fn label(&self) -> String {
        match self {
            TargetId::Depth => "Depth Target".to_string(),
            TargetId::LowRes => "Low-Res Target".to_string(),
            TargetId::Occlusion => "Occlusion Target".to_string(),
            TargetId::Color(i) => format!("Chain Target {}", i),
        }
    }
}

/// Where a pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutput {
    Target(TargetId),
    Screen,
}

/// Extra textures a pass samples besides its chain input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxInput {
    Color(TargetId),
    Depth(TargetId),
    /// A preloaded image, by manifest id.
    AssetTexture(String),
}

impl AuxInput {
    pub fn target(&self) -> Option<TargetId> {
        match self {
            AuxInput::Color(id) | AuxInput::Depth(id) => Some(*id),
            AuxInput::AssetTexture(_) => None,
        }
    }
}

/// Size and attachments of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub id: TargetId,
    pub width: u32,
    pub height: u32,
    pub with_depth: bool,
}

/// One resolved step of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PassLink {
    pub kind: PassKind,
    /// `None` only for the scene pass.
    pub input: Option<TargetId>,
    pub output: PassOutput,
    pub aux: Vec<AuxInput>,
}

impl PassLink {
    pub fn presents(&self) -> bool {
        self.output == PassOutput::Screen
    }
}

/// What the executor does this frame, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    /// Scene pre-renders, all issued before the first chain pass.
    pub pre_renders: Vec<TargetId>,
    pub passes: Vec<PassKind>,
}

// ============================================================================
// Pass kinds, params and lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Scene,
    Ascii,
    Scan,
    Ripple,
    LightScattering,
    Fxaa,
    Output,
}

impl PassKind {
    pub fn name(&self) -> &'static str {
        match self {
            PassKind::Scene => "scene",
            PassKind::Ascii => "ascii",
            PassKind::Scan => "scan",
            PassKind::Ripple => "ripple",
            PassKind::LightScattering => "light_scattering",
            PassKind::Fxaa => "fxaa",
            PassKind::Output => "output",
        }
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed configuration for each pass kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PassParams {
    Scene,
    Ascii(AsciiParams),
    Scan(ScanParams),
    Ripple(RippleParams),
    LightScattering(LightScatteringParams),
    Fxaa,
    Output(OutputParams),
}

impl PassParams {
    pub fn kind(&self) -> PassKind {
        match self {
            PassParams::Scene => PassKind::Scene,
            PassParams::Ascii(_) => PassKind::Ascii,
            PassParams::Scan(_) => PassKind::Scan,
            PassParams::Ripple(_) => PassKind::Ripple,
            PassParams::LightScattering(_) => PassKind::LightScattering,
            PassParams::Fxaa => PassKind::Fxaa,
            PassParams::Output(_) => PassKind::Output,
        }
    }

    /// Build the params for `kind` from the viewer configuration.
    pub fn from_config(kind: PassKind, config: &ViewerConfig) -> Self {
        let effects = &config.effects;
        let camera = &config.camera;
        match kind {
            PassKind::Scene => PassParams::Scene,
            PassKind::Ascii => PassParams::Ascii(AsciiParams {
                font_texture_id: effects.ascii.font_texture_id.clone(),
                font_map_size: effects.ascii.font_map_size,
                font_char_size: effects.ascii.font_char_size,
                camera_near: camera.near,
                camera_far: camera.far,
            }),
            PassKind::Scan => PassParams::Scan(ScanParams {
                speed: effects.scan.speed,
                period: effects.scan.period,
                camera_near: camera.near,
                camera_far: camera.far,
            }),
            PassKind::Ripple => PassParams::Ripple(RippleParams {
                speed: effects.ripple.speed,
                peak: effects.ripple.peak,
                distortion: effects.ripple.distortion,
            }),
            PassKind::LightScattering => {
                let ls = &effects.light_scattering;
                PassParams::LightScattering(LightScatteringParams {
                    light_position: ls.light_position,
                    exposure: ls.exposure,
                    density: ls.density,
                    weight: ls.weight,
                    samples: ls.samples,
                })
            }
            PassKind::Fxaa => PassParams::Fxaa,
            PassKind::Output => PassParams::Output(OutputParams {
                exposure: effects.output.exposure,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Uninitialized,
    Configured,
    Active,
    Disposed,
}

/// State machine shared by every pass.
///
/// `Uninitialized -> Configured -> Active -> Disposed`. Updates require a
/// prior configure; resize and pointer input are accepted once configured;
/// nothing is accepted after dispose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    kind: PassKind,
    state: PassState,
}

impl Lifecycle {
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            state: PassState::Uninitialized,
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn configure(&mut self) -> Result<()> {
        match self.state {
            PassState::Disposed => bail!("{} pass: configure after dispose", self.kind),
            PassState::Uninitialized => self.state = PassState::Configured,
            PassState::Configured | PassState::Active => {}
        }
        Ok(())
    }

    /// Check that resize or pointer input is allowed.
    pub fn ensure_configured(&self, what: &str) -> Result<()> {
        match self.state {
            PassState::Configured | PassState::Active => Ok(()),
            PassState::Uninitialized => bail!("{} pass: {} before configure", self.kind, what),
            PassState::Disposed => bail!("{} pass: {} after dispose", self.kind, what),
        }
    }

    pub fn activate(&mut self) -> Result<()> {
        self.ensure_configured("update")?;
        self.state = PassState::Active;
        Ok(())
    }

    pub fn dispose(&mut self) -> Result<()> {
        if self.state == PassState::Disposed {
            bail!("{} pass: disposed twice", self.kind);
        }
        self.state = PassState::Disposed;
        Ok(())
    }
}

// ============================================================================
// EffectPass
// ============================================================================

/// Capability shared by every stage of the chain.
///
/// Passes never see each other or the GPU. They validate their own params,
/// track viewport size, advance their own clocks and serialize a uniform
/// block on request.
pub trait EffectPass {
    fn kind(&self) -> PassKind;

    fn state(&self) -> PassState;

    /// Validate and apply parameters. Params of another kind are rejected.
    fn configure(&mut self, params: &PassParams) -> Result<()>;

    fn on_resize(&mut self, metrics: &ViewportMetrics) -> Result<()>;

    fn update(&mut self, dt: f32) -> Result<()>;

    /// Whether the pass wants pointer events.
    fn accepts_pointer(&self) -> bool {
        false
    }

    /// Pointer click in physical pixels.
    fn on_click(&mut self, _x: f32, _y: f32) -> Result<()> {
        Ok(())
    }

    /// Uniform block contents; empty when the pass has none.
    fn uniform_bytes(&self) -> Vec<u8>;

    fn aux_inputs(&self) -> Vec<AuxInput> {
        Vec::new()
    }

    /// Private render targets this pass needs, sized for `metrics`.
    fn offscreen_targets(&self, _metrics: &ViewportMetrics) -> Vec<TargetSpec> {
        Vec::new()
    }

    fn dispose(&mut self) -> Result<()>;
}

/// Reject params meant for another pass.
pub(crate) fn wrong_params(expected: PassKind, params: &PassParams) -> anyhow::Error {
    anyhow::anyhow!(
        "{} pass cannot be configured with {} params",
        expected,
        params.kind()
    )
}

// ============================================================================
// Compositor
// ============================================================================

/// Owns the passes, their links and the render-target layout.
pub struct Compositor {
    passes: Vec<Box<dyn EffectPass>>,
    links: Vec<PassLink>,
    metrics: ViewportMetrics,
    targets: Vec<TargetSpec>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("links", &self.links)
            .field("metrics", &self.metrics)
            .field("targets", &self.targets)
            .finish()
    }
}

impl Compositor {
    /// The pass order for a configuration.
    pub fn chain_order(config: &ViewerConfig) -> Vec<PassKind> {
        let mut order = vec![PassKind::Scene];
        if config.effects.ascii.enabled {
            order.push(PassKind::Ascii);
        }
        order.push(PassKind::Scan);
        order.push(PassKind::Ripple);
        if config.effects.light_scattering.enabled {
            order.push(PassKind::LightScattering);
        }
        order.push(PassKind::Fxaa);
        order.push(PassKind::Output);
        order
    }

    /// Build, configure and size the standard chain.
    pub fn from_config(config: &ViewerConfig, metrics: ViewportMetrics) -> Result<Self> {
        let mut passes: Vec<Box<dyn EffectPass>> = Vec::new();
        for kind in Self::chain_order(config) {
            let mut pass = new_pass(kind);
            pass.configure(&PassParams::from_config(kind, config))?;
            passes.push(pass);
        }
        Self::new(passes, metrics)
    }

    /// Link configured passes into a chain and size everything for `metrics`.
    ///
    /// The first pass must be the scene pass, the last the output pass, and
    /// no kind may appear twice.
    pub fn new(passes: Vec<Box<dyn EffectPass>>, metrics: ViewportMetrics) -> Result<Self> {
        if passes.len() < 2 {
            bail!("a chain needs at least a scene and an output pass");
        }
        if passes[0].kind() != PassKind::Scene {
            bail!("chain must start with the scene pass, found {}", passes[0].kind());
        }
        let last = passes[passes.len() - 1].kind();
        if last != PassKind::Output {
            bail!("chain must end with the output pass, found {}", last);
        }
        let mut seen = std::collections::HashSet::new();
        for pass in &passes {
            if !seen.insert(pass.kind()) {
                bail!("{} pass appears twice in the chain", pass.kind());
            }
            if !matches!(pass.state(), PassState::Configured | PassState::Active) {
                bail!("{} pass must be configured before linking", pass.kind());
            }
        }

        let links = link_chain(&passes);
        log::info!(
            "Compositor chain: {}",
            links
                .iter()
                .map(|l| l.kind.name())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let mut compositor = Self {
            passes,
            links,
            metrics,
            targets: Vec::new(),
        };
        compositor.on_resize(metrics)?;
        Ok(compositor)
    }

    pub fn links(&self) -> &[PassLink] {
        &self.links
    }

    pub fn metrics(&self) -> ViewportMetrics {
        self.metrics
    }

    pub fn target_specs(&self) -> &[TargetSpec] {
        &self.targets
    }

    pub fn target_spec(&self, id: TargetId) -> Option<&TargetSpec> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn passes(&self) -> impl Iterator<Item = &dyn EffectPass> {
        self.passes.iter().map(|p| p.as_ref())
    }

    pub fn pass(&self, kind: PassKind) -> Option<&dyn EffectPass> {
        self.passes().find(|p| p.kind() == kind)
    }

    /// Propagate a resize to every pass in chain order, then resize the
    /// compositor's own targets.
    pub fn on_resize(&mut self, metrics: ViewportMetrics) -> Result<()> {
        self.metrics = metrics;
        for pass in &mut self.passes {
            pass.on_resize(&metrics)?;
        }
        self.targets = self.compute_targets();
        log::debug!(
            "Compositor resized to {}x{} ({} targets)",
            metrics.width,
            metrics.height,
            self.targets.len()
        );
        Ok(())
    }

    pub fn update(&mut self, dt: f32) -> Result<()> {
        for pass in &mut self.passes {
            pass.update(dt)?;
        }
        Ok(())
    }

    /// Forward a click to the passes that accept pointer input.
    pub fn on_click(&mut self, x: f32, y: f32) -> Result<()> {
        for pass in self.passes.iter_mut().filter(|p| p.accepts_pointer()) {
            pass.on_click(x, y)?;
        }
        Ok(())
    }

    /// Scene pre-renders every pass depends on, then the pass order.
    pub fn frame_plan(&self) -> FramePlan {
        let pre_renders: BTreeSet<TargetId> = self
            .links
            .iter()
            .flat_map(|l| l.aux.iter())
            .filter_map(AuxInput::target)
            .filter(TargetId::is_pre_render)
            .collect();
        FramePlan {
            pre_renders: pre_renders.into_iter().collect(),
            passes: self.links.iter().map(|l| l.kind).collect(),
        }
    }

    pub fn dispose(&mut self) -> Result<()> {
        for pass in &mut self.passes {
            pass.dispose()?;
        }
        Ok(())
    }

    fn compute_targets(&self) -> Vec<TargetSpec> {
        let mut targets: Vec<TargetSpec> = Vec::new();
        for pass in &self.passes {
            for spec in pass.offscreen_targets(&self.metrics) {
                if !targets.iter().any(|t| t.id == spec.id) {
                    targets.push(spec);
                }
            }
        }

        let mut chain_ids: Vec<TargetId> = self
            .links
            .iter()
            .filter_map(|l| match l.output {
                PassOutput::Target(id) => Some(id),
                PassOutput::Screen => None,
            })
            .collect();
        chain_ids.sort();
        chain_ids.dedup();
        for id in chain_ids {
            targets.push(TargetSpec {
                id,
                width: self.metrics.width,
                height: self.metrics.height,
                // The scene pass draws geometry into Color(0).
                with_depth: id == TargetId::Color(0),
            });
        }
        targets
    }
}

fn new_pass(kind: PassKind) -> Box<dyn EffectPass> {
    match kind {
        PassKind::Scene => Box::new(ScenePass::new()),
        PassKind::Ascii => Box::new(AsciiPass::new()),
        PassKind::Scan => Box::new(ScanPass::new()),
        PassKind::Ripple => Box::new(RipplePass::new()),
        PassKind::LightScattering => Box::new(LightScatteringPass::new()),
        PassKind::Fxaa => Box::new(FxaaPass::new()),
        PassKind::Output => Box::new(OutputPass::new()),
    }
}

fn link_chain(passes: &[Box<dyn EffectPass>]) -> Vec<PassLink> {
    let mut links = Vec::with_capacity(passes.len());
    let mut input = None;
    let mut ping = 0u8;
    for (i, pass) in passes.iter().enumerate() {
        let is_last = i == passes.len() - 1;
        let output = if is_last {
            PassOutput::Screen
        } else {
            PassOutput::Target(TargetId::Color(ping))
        };
        links.push(PassLink {
            kind: pass.kind(),
            input,
            output,
            aux: pass.aux_inputs(),
        });
        if !is_last {
            input = Some(TargetId::Color(ping));
            ping = 1 - ping;
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ascii: bool, light: bool) -> ViewerConfig {
        let mut config = ViewerConfig::default();
        config.effects.ascii.enabled = ascii;
        config.effects.light_scattering.enabled = light;
        config
    }

    #[test]
    fn test_default_chain_order() {
        let compositor = Compositor::from_config(&config(false, false), ViewportMetrics::new(800, 600)).unwrap();
        let kinds: Vec<_> = compositor.links().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![PassKind::Scene, PassKind::Scan, PassKind::Ripple, PassKind::Fxaa, PassKind::Output]
        );
    }

    #[test]
    fn test_optional_passes_are_inserted_in_place() {
        let order = Compositor::chain_order(&config(true, true));
        assert_eq!(
            order,
            vec![
                PassKind::Scene,
                PassKind::Ascii,
                PassKind::Scan,
                PassKind::Ripple,
                PassKind::LightScattering,
                PassKind::Fxaa,
                PassKind::Output
            ]
        );
    }

    #[test]
    fn test_links_ping_pong() {
        let compositor = Compositor::from_config(&config(false, false), ViewportMetrics::new(64, 64)).unwrap();
        let links = compositor.links();
        assert_eq!(links[0].input, None);
        assert_eq!(links[0].output, PassOutput::Target(TargetId::Color(0)));
        assert_eq!(links[1].input, Some(TargetId::Color(0)));
        assert_eq!(links[1].output, PassOutput::Target(TargetId::Color(1)));
        assert_eq!(links[2].input, Some(TargetId::Color(1)));
        assert_eq!(links[2].output, PassOutput::Target(TargetId::Color(0)));
        assert!(links.last().unwrap().presents());
        assert_eq!(links.iter().filter(|l| l.presents()).count(), 1);
    }

    #[test]
    fn test_frame_plan_pre_renders() {
        let plain = Compositor::from_config(&config(false, false), ViewportMetrics::new(64, 64)).unwrap();
        assert_eq!(plain.frame_plan().pre_renders, vec![TargetId::Depth]);

        let full = Compositor::from_config(&config(true, true), ViewportMetrics::new(64, 64)).unwrap();
        assert_eq!(
            full.frame_plan().pre_renders,
            vec![TargetId::Depth, TargetId::LowRes, TargetId::Occlusion]
        );
    }

    #[test]
    fn test_rejects_unconfigured_pass() {
        let passes: Vec<Box<dyn EffectPass>> = vec![Box::new(ScenePass::new()), Box::new(OutputPass::new())];
        assert!(Compositor::new(passes, ViewportMetrics::new(10, 10)).is_err());
    }

    #[test]
    fn test_rejects_chain_without_output_last() {
        let mut scene = ScenePass::new();
        scene.configure(&PassParams::Scene).unwrap();
        let mut fxaa = FxaaPass::new();
        fxaa.configure(&PassParams::Fxaa).unwrap();
        let passes: Vec<Box<dyn EffectPass>> = vec![Box::new(scene), Box::new(fxaa)];
        assert!(Compositor::new(passes, ViewportMetrics::new(10, 10)).is_err());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut lifecycle = Lifecycle::new(PassKind::Fxaa);
        assert!(lifecycle.activate().is_err());
        assert!(lifecycle.ensure_configured("resize").is_err());

        lifecycle.configure().unwrap();
        assert_eq!(lifecycle.state(), PassState::Configured);
        lifecycle.ensure_configured("resize").unwrap();

        lifecycle.activate().unwrap();
        assert_eq!(lifecycle.state(), PassState::Active);
        lifecycle.ensure_configured("resize").unwrap();

        lifecycle.dispose().unwrap();
        assert!(lifecycle.activate().is_err());
        assert!(lifecycle.configure().is_err());
        assert!(lifecycle.dispose().is_err());
    }

    #[test]
    fn test_dispose_stops_updates() {
        let mut compositor = Compositor::from_config(&config(false, false), ViewportMetrics::new(32, 32)).unwrap();
        compositor.update(0.016).unwrap();
        compositor.dispose().unwrap();
        assert!(compositor.update(0.016).is_err());
        assert!(compositor.on_resize(ViewportMetrics::new(16, 16)).is_err());
    }

    #[test]
    fn test_metrics_clamp_zero() {
        let metrics = ViewportMetrics::new(0, 0);
        assert_eq!((metrics.width, metrics.height), (1, 1));
        assert_eq!(metrics.aspect(), 1.0);
    }
}
