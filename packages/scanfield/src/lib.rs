pub mod asset_source;
pub mod asset_store;
pub mod camera;
pub mod config;
pub mod effects;
pub mod gpu;
pub mod manifest;
pub mod model_asset;
pub mod particle_field;
pub mod post_processing;
pub mod preloader;
pub mod progress;
pub mod scene_graph;
pub mod viewport;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
