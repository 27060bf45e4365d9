#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    flow_orbit::flow::run(flow_orbit::SceneConfig::default())
}

// The web build starts through the library's wasm entry point.
#[cfg(target_arch = "wasm32")]
fn main() {}
