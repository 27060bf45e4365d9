//! flow-orbit
//!
//! A pointer-reactive showcase scene on wgpu with native and WASM support.
//! Two coloured point lights orbit a streamed glTF model; moving the pointer
//! drags a third light around and trades resolution for fill rate.
//!
//! High-level modules
//! - `config`: every constant of the scene, overridable in code
//! - `camera`: perspective camera and its uniform
//! - `data_structures`: scene graph, lights, materials, textures, geometry
//! - `interaction`, `orbit`: pure pointer and animation math
//! - `host`: what the scene needs from its window or page
//! - `resources`: texture and glTF loading
//! - `render`, `context`, `pipelines`: the wgpu forward renderer
//! - `controller`: mounts, animates and tears down the scene
//! - `flow`: the winit event loop tying it all together
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod controller;
pub mod data_structures;
pub mod flow;
pub mod host;
pub mod interaction;
pub mod orbit;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::SceneConfig;
pub use controller::SceneController;
pub use host::{Host, Viewport};
pub use render::Renderer;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    flow::run(SceneConfig::default()).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}
