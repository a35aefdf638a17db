use scanfield::config::ViewerConfig;
use scanfield::post_processing::{
    AuxInput, Compositor, EffectPass, PassKind, PassOutput, TargetId, TargetSpec, ViewportMetrics,
};

fn config(ascii: bool, light: bool) -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.effects.ascii.enabled = ascii;
    config.effects.light_scattering.enabled = light;
    config
}

fn all_configs() -> Vec<ViewerConfig> {
    vec![
        config(false, false),
        config(true, false),
        config(false, true),
        config(true, true),
    ]
}

fn uniform_snapshot(compositor: &Compositor) -> Vec<(PassKind, Vec<u8>)> {
    compositor
        .passes()
        .map(|p| (p.kind(), p.uniform_bytes()))
        .collect()
}

#[test]
fn test_chain_invariants_hold_for_every_configuration() {
    for config in all_configs() {
        let compositor = Compositor::from_config(&config, ViewportMetrics::new(1280, 720)).unwrap();
        let links = compositor.links();

        assert_eq!(links.first().map(|l| l.kind), Some(PassKind::Scene));
        assert_eq!(links.last().map(|l| l.kind), Some(PassKind::Output));
        assert_eq!(links.iter().filter(|l| l.presents()).count(), 1);
        assert!(links.last().unwrap().presents());
        assert_eq!(links[0].input, None);

        for pair in links.windows(2) {
            let PassOutput::Target(written) = pair[0].output else {
                panic!("{:?} presents before the end of the chain", pair[0].kind);
            };
            assert_eq!(pair[1].input, Some(written));
            assert!(matches!(written, TargetId::Color(0) | TargetId::Color(1)));
            if let PassOutput::Target(next) = pair[1].output {
                assert_ne!(written, next, "{:?} reads and writes the same target", pair[1].kind);
            }
        }

        let plan = compositor.frame_plan();
        assert_eq!(plan.passes, Compositor::chain_order(&config));
        assert!(plan.pre_renders.contains(&TargetId::Depth));
        assert_eq!(plan.pre_renders.contains(&TargetId::LowRes), config.effects.ascii.enabled);
        assert_eq!(
            plan.pre_renders.contains(&TargetId::Occlusion),
            config.effects.light_scattering.enabled
        );

        for id in links.iter().flat_map(|l| l.aux.iter()).filter_map(AuxInput::target) {
            assert!(compositor.target_spec(id).is_some(), "no target allocated for {id:?}");
        }
    }
}

#[test]
fn test_pre_render_target_sizes() {
    let compositor = Compositor::from_config(&config(true, true), ViewportMetrics::new(1000, 601)).unwrap();

    let depth = compositor.target_spec(TargetId::Depth).unwrap();
    assert_eq!((depth.width, depth.height), (1000, 601));
    assert!(depth.with_depth);

    let occlusion = compositor.target_spec(TargetId::Occlusion).unwrap();
    assert_eq!((occlusion.width, occlusion.height), (500, 300));

    let color0 = compositor.target_spec(TargetId::Color(0)).unwrap();
    assert!(color0.with_depth);
    let color1 = compositor.target_spec(TargetId::Color(1)).unwrap();
    assert!(!color1.with_depth);
}

#[test]
fn test_resize_is_idempotent() {
    for config in all_configs() {
        let mut compositor = Compositor::from_config(&config, ViewportMetrics::new(800, 600)).unwrap();
        let specs: Vec<TargetSpec> = compositor.target_specs().to_vec();
        let uniforms = uniform_snapshot(&compositor);

        compositor.on_resize(ViewportMetrics::new(800, 600)).unwrap();
        assert_eq!(compositor.target_specs(), specs.as_slice());
        assert_eq!(uniform_snapshot(&compositor), uniforms);

        compositor.on_resize(ViewportMetrics::new(1920, 1080)).unwrap();
        assert_ne!(compositor.target_specs(), specs.as_slice());

        compositor.on_resize(ViewportMetrics::new(800, 600)).unwrap();
        assert_eq!(compositor.target_specs(), specs.as_slice());
        assert_eq!(uniform_snapshot(&compositor), uniforms);
    }
}

#[test]
fn test_click_only_touches_ripple_uniforms() {
    let mut compositor = Compositor::from_config(&config(false, false), ViewportMetrics::new(640, 480)).unwrap();
    let before = uniform_snapshot(&compositor);

    compositor.on_click(320.0, 240.0).unwrap();
    let after = uniform_snapshot(&compositor);

    for ((kind, old), (_, new)) in before.iter().zip(after.iter()) {
        if *kind == PassKind::Ripple {
            assert_ne!(old, new);
        } else {
            assert_eq!(old, new, "{kind:?} changed on click");
        }
    }
}

#[test]
fn test_resize_drops_pending_ripples() {
    let mut compositor = Compositor::from_config(&config(false, false), ViewportMetrics::new(640, 480)).unwrap();
    let before = uniform_snapshot(&compositor);

    compositor.on_click(10.0, 10.0).unwrap();
    compositor.on_click(600.0, 400.0).unwrap();
    compositor.on_resize(ViewportMetrics::new(640, 480)).unwrap();

    assert_eq!(uniform_snapshot(&compositor), before);
}
