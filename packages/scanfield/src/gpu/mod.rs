pub mod mesh;
pub mod pipeline;
pub mod post_processor;
pub mod scene_renderer;
pub mod texture;

/// WGSL sources, embedded at compile time.
pub mod shaders {
    use crate::post_processing::PassKind;

    pub const SCENE: &str = include_str!("shader_scene.wgsl");
    pub const PARTICLES: &str = include_str!("shader_particles.wgsl");
    pub const ASCII: &str = include_str!("shader_post_ascii.wgsl");
    pub const SCAN: &str = include_str!("shader_post_scan.wgsl");
    pub const RIPPLE: &str = include_str!("shader_post_ripple.wgsl");
    pub const LIGHT_SCATTERING: &str = include_str!("shader_post_light_scattering.wgsl");
    pub const FXAA: &str = include_str!("shader_post_fxaa.wgsl");
    pub const OUTPUT: &str = include_str!("shader_post_blit.wgsl");

    /// Every shader with a display name, for validation.
    pub const ALL: &[(&str, &str)] = &[
        ("scene", SCENE),
        ("particles", PARTICLES),
        ("ascii", ASCII),
        ("scan", SCAN),
        ("ripple", RIPPLE),
        ("light_scattering", LIGHT_SCATTERING),
        ("fxaa", FXAA),
        ("output", OUTPUT),
    ];

    /// Fullscreen shader for a chain pass. The scene pass has none.
    pub fn source(kind: PassKind) -> Option<&'static str> {
        match kind {
            PassKind::Scene => None,
            PassKind::Ascii => Some(ASCII),
            PassKind::Scan => Some(SCAN),
            PassKind::Ripple => Some(RIPPLE),
            PassKind::LightScattering => Some(LIGHT_SCATTERING),
            PassKind::Fxaa => Some(FXAA),
            PassKind::Output => Some(OUTPUT),
        }
    }
}
