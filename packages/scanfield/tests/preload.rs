mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scanfield::manifest::{MODEL_PATH, MODEL_TEXTURE_PATH};
use scanfield::preloader::Preloader;
use scanfield::progress::{ProgressDigits, RecordingProgressIndicator};

use common::{image_uri, standard_manifest, standard_source};

fn digits(hundreds: u8, tens: u8, ones: u8) -> ProgressDigits {
    ProgressDigits { hundreds, tens, ones }
}

#[test]
fn test_loads_every_item_and_reports_progress() {
    let source = standard_source(3);
    let manifest = standard_manifest(3);
    let mut indicator = RecordingProgressIndicator::default();
    let seen = Rc::new(RefCell::new(None));
    let calls = Rc::new(Cell::new(0));

    let seen_in = seen.clone();
    let calls_in = calls.clone();
    let store = pollster::block_on(
        Preloader::new(&source, &mut indicator)
            .on_loaded(move |store| {
                calls_in.set(calls_in.get() + 1);
                *seen_in.borrow_mut() = Some((store.textures().len(), store.model().is_some()));
            })
            .load_all(&manifest),
    )
    .unwrap();

    assert_eq!(
        indicator.history,
        vec![
            digits(0, 2, 0),
            digits(0, 4, 0),
            digits(0, 6, 0),
            digits(0, 8, 0),
            digits(1, 0, 0),
        ]
    );
    assert_eq!(calls.get(), 1);
    assert_eq!(*seen.borrow(), Some((3, true)));

    assert_eq!(store.textures().len(), 3);
    for id in ["0", "1", "2"] {
        let texture = store.texture(id).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
    }
    assert_eq!(store.model().unwrap().triangle_count(), 1);
    assert_eq!(store.model_texture().unwrap().width, 4);
    assert_eq!(source.fetch_count(), 5);
}

#[test]
fn test_empty_image_list_still_loads_model() {
    let source = standard_source(0);
    let manifest = standard_manifest(0);
    let mut indicator = RecordingProgressIndicator::default();

    let store = pollster::block_on(Preloader::new(&source, &mut indicator).load_all(&manifest)).unwrap();

    assert!(store.textures().is_empty());
    assert!(store.model().is_some());
    assert_eq!(indicator.history, vec![digits(0, 5, 0), digits(1, 0, 0)]);
}

#[test]
fn test_failed_image_aborts_without_callback() {
    let source = standard_source(3).failing(&image_uri(1));
    let manifest = standard_manifest(3);
    let mut indicator = RecordingProgressIndicator::default();
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();

    let result = pollster::block_on(
        Preloader::new(&source, &mut indicator)
            .on_loaded(move |_| flag.set(true))
            .load_all(&manifest),
    );

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("'1'"), "{message}");
    assert!(message.contains(&image_uri(1)), "{message}");
    assert!(!fired.get());
    assert!(indicator.history.last() != Some(&digits(1, 0, 0)));
}

#[test]
fn test_undecodable_model_aborts() {
    let source = standard_source(1).with_file(MODEL_PATH, b"not a model".to_vec());
    let manifest = standard_manifest(1);
    let mut indicator = RecordingProgressIndicator::default();

    let result = pollster::block_on(Preloader::new(&source, &mut indicator).load_all(&manifest));

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains(MODEL_PATH), "{message}");
}

#[test]
fn test_progress_is_monotonic_under_any_completion_order() {
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let images = rng.gen_range(1..8);

        let mut source = standard_source(images)
            .delayed(MODEL_PATH, rng.gen_range(0..6))
            .delayed(MODEL_TEXTURE_PATH, rng.gen_range(0..6));
        for i in 0..images {
            source = source.delayed(&image_uri(i), rng.gen_range(0..6));
        }
        let manifest = standard_manifest(images);
        let mut indicator = RecordingProgressIndicator::default();

        let store = pollster::block_on(Preloader::new(&source, &mut indicator).load_all(&manifest)).unwrap();

        let percents: Vec<u32> = indicator
            .history
            .iter()
            .map(|d| d.hundreds as u32 * 100 + d.tens as u32 * 10 + d.ones as u32)
            .collect();
        assert_eq!(percents.len(), images + 2, "seed {seed}");
        assert!(percents.windows(2).all(|w| w[0] < w[1]), "seed {seed}: {percents:?}");
        assert_eq!(percents.last(), Some(&100), "seed {seed}");
        assert_eq!(store.textures().len(), images);
    }
}
