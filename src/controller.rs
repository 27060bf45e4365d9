//! The scene controller.
//!
//! [`SceneController::mount`] builds the scene, attaches the renderer to the
//! host and starts the texture and model loads plus the frame loop. The host
//! then feeds it pointer moves ([`SceneController::on_pointer_move`]), frame
//! callbacks ([`SceneController::on_frame`]) and load wakeups
//! ([`SceneController::pump`]) until [`SceneController::dispose`] or drop.
//!
//! Loads run as abortable tasks on the host. Their results are queued and only
//! touch the scene inside `pump`, on the caller's thread; disposing aborts the
//! tasks and closes the queue so a late result is dropped.

use anyhow::Context;
use cgmath::{Rad, Vector3};
use futures::{
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
    future::{AbortHandle, abortable},
};

use crate::{
    camera::PerspectiveCamera,
    config::SceneConfig,
    data_structures::{
        light::Light,
        material::{Material, PhysicalMaterial},
        scene_graph::{NodeId, NodeKind, Scene, SceneNode},
        texture::{TextureData, TextureId},
    },
    host::{FrameRequest, Host, Listener, ListenerId, MaybeSend, SurfaceId, Task, task},
    interaction,
    orbit::Orbit,
    render::Renderer,
    resources::{AssetLoader, DecoderConfig},
};

/// A finished load waiting to be applied to the scene.
pub enum Loaded {
    Texture(TextureId, anyhow::Result<TextureData>),
    Model(anyhow::Result<SceneNode>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Disposed,
}

pub struct SceneController<H: Host> {
    host: H,
    config: SceneConfig,
    lifecycle: Lifecycle,
    scene: Scene,
    camera: PerspectiveCamera,
    renderer: H::Renderer,
    pixel_ratio: f32,
    surface: Option<SurfaceId>,
    listener: Option<ListenerId>,
    frame: Option<FrameRequest>,
    ambient: NodeId,
    primary: NodeId,
    warm: NodeId,
    cool: NodeId,
    warm_orbit: Orbit,
    cool_orbit: Orbit,
    texture: TextureId,
    model: Option<NodeId>,
    loads: Vec<AbortHandle>,
    completions: UnboundedReceiver<Loaded>,
}

impl<H: Host> SceneController<H> {
    pub fn mount(mut host: H, config: SceneConfig) -> anyhow::Result<Self> {
        let viewport = host.viewport();

        let mut scene = Scene::new(config.background);
        let camera = PerspectiveCamera::new(&config.camera, viewport.aspect());
        let pixel_ratio = config.renderer.initial_pixel_ratio;

        let mut renderer = host
            .create_renderer(&config.renderer)
            .context("Failed to create the renderer")?;
        renderer.set_size(viewport);
        renderer.set_pixel_ratio(pixel_ratio);
        let surface = host
            .append_surface(&renderer)
            .context("Failed to attach the render surface")?;

        let ambient = scene.add(SceneNode::light(
            "ambient",
            Light::ambient(&config.ambient),
            config.ambient.position,
        ));
        let listener = host.add_listener(Listener::PointerMove);
        let primary = scene.add(SceneNode::light(
            "primary",
            Light::point(&config.primary),
            config.primary.position,
        ));
        let warm = scene.add(SceneNode::light(
            "warm",
            Light::point(&config.warm),
            config.warm.position,
        ));
        let cool = scene.add(SceneNode::light(
            "cool",
            Light::point(&config.cool),
            config.cool.position,
        ));

        let (sender, completions) = mpsc::unbounded();
        let texture = scene.textures.reserve(&config.assets.texture);
        let texture_load = host.loader().load_texture(&config.assets.texture);
        let decoder = DecoderConfig::new(&config.assets.decoder);
        let model_load = host.loader().load_model(&config.assets.model, &decoder);
        let loads = vec![
            spawn_load(&mut host, texture_load, sender.clone(), move |result| {
                Loaded::Texture(texture, result)
            }),
            spawn_load(&mut host, model_load, sender, Loaded::Model),
        ];

        let frame = host.request_frame();

        log::info!(
            "Scene mounted at {}x{} (pixel ratio {pixel_ratio}); loading {} and {}",
            viewport.width,
            viewport.height,
            config.assets.texture,
            config.assets.model,
        );

        Ok(Self {
            warm_orbit: Orbit::new(&config.warm_orbit),
            cool_orbit: Orbit::new(&config.cool_orbit),
            host,
            config,
            lifecycle: Lifecycle::Running,
            scene,
            camera,
            renderer,
            pixel_ratio,
            surface: Some(surface),
            listener: Some(listener),
            frame: Some(frame),
            ambient,
            primary,
            warm,
            cool,
            texture,
            model: None,
            loads,
            completions,
        })
    }

    /// Pointer moved to client coordinates `(x, y)`.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if !self.is_running() || self.listener.is_none() {
            return;
        }
        let effect =
            interaction::map_pointer(x, y, self.host.viewport(), &self.config.pointer);
        self.pixel_ratio = effect.pixel_ratio;
        self.renderer.set_pixel_ratio(effect.pixel_ratio);
        self.set_position(self.primary, effect.light_position);
        self.render();
    }

    /// The host is ready to show the frame scheduled as `request`.
    pub fn on_frame(&mut self, request: FrameRequest) {
        if !self.is_running() {
            log::debug!("Dropping {request:?}: scene is disposed");
            return;
        }
        if self.frame != Some(request) {
            log::warn!("Dropping stale {request:?}, expected {:?}", self.frame);
            return;
        }
        self.frame = None;

        let warm = self.warm_orbit.advance();
        self.set_position(self.warm, warm);
        let cool = self.cool_orbit.advance();
        self.set_position(self.cool, cool);

        if let Some(node) = self.model.and_then(|id| self.scene.node_mut(id)) {
            node.transform.rotation.y += Rad(self.config.model.spin);
        }

        self.render();
        self.frame = Some(self.host.request_frame());
    }

    /// Apply every load that finished since the last call. Returns how many
    /// were applied.
    pub fn pump(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }
        let mut applied = 0;
        while let Ok(Some(loaded)) = self.completions.try_next() {
            self.apply(loaded);
            applied += 1;
        }
        applied
    }

    /// Cancel the frame loop, detach from the host and abort in-flight loads.
    /// Calling it again does nothing.
    pub fn dispose(&mut self) {
        if !self.is_running() {
            return;
        }
        self.lifecycle = Lifecycle::Disposed;
        if let Some(frame) = self.frame.take() {
            self.host.cancel_frame(frame);
        }
        if let Some(listener) = self.listener.take() {
            self.host.remove_listener(listener);
        }
        if let Some(surface) = self.surface.take() {
            self.host.remove_surface(surface);
        }
        let aborted = self.loads.len();
        for handle in self.loads.drain(..) {
            handle.abort();
        }
        self.completions.close();
        log::info!("Scene disposed ({aborted} load task(s) aborted)");
    }

    fn apply(&mut self, loaded: Loaded) {
        match loaded {
            Loaded::Texture(id, Ok(data)) => {
                log::info!("Texture {} loaded ({}x{})", data.label, data.width, data.height);
                self.scene.textures.fill(id, data);
                self.render();
            }
            Loaded::Texture(id, Err(err)) => {
                let source = self.scene.textures.source(id).unwrap_or("<unknown>");
                log::error!("Failed to load texture {source}: {err:#}");
            }
            Loaded::Model(Ok(mut model)) => {
                self.prepare_model(&mut model);
                log::info!(
                    "Model {} loaded with {} mesh(es)",
                    self.config.assets.model,
                    model.mesh_count()
                );
                self.model = Some(self.scene.add(model));
            }
            Loaded::Model(Err(err)) => {
                log::error!("Failed to load model {}: {err:#}", self.config.assets.model);
            }
        }
    }

    fn prepare_model(&self, model: &mut SceneNode) {
        let settings = &self.config.model;
        let texture = self.texture;
        model.traverse_mut(&mut |node| {
            if let NodeKind::Mesh(mesh) = &mut node.kind {
                mesh.receive_shadow = true;
                mesh.cast_shadow = false;
                mesh.material = Material::Physical(PhysicalMaterial {
                    map: Some(texture),
                    metalness: settings.metalness,
                    roughness: settings.roughness,
                    reflectivity: settings.reflectivity,
                    ..Default::default()
                });
            }
        });
        model.transform.set_uniform_scale(settings.scale);
        model.transform.position = settings.offset;
    }

    fn set_position(&mut self, id: NodeId, position: Vector3<f32>) {
        if let Some(node) = self.scene.node_mut(id) {
            node.transform.position = position;
        }
    }

    fn render(&mut self) {
        if let Err(err) = self.renderer.render(&self.scene, &self.camera) {
            log::error!("Render failed: {err:#}");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn renderer(&self) -> &H::Renderer {
        &self.renderer
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Resolution scale last handed to the renderer.
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn scheduled_frame(&self) -> Option<FrameRequest> {
        self.frame
    }

    pub fn ambient_light(&self) -> NodeId {
        self.ambient
    }

    pub fn primary_light(&self) -> NodeId {
        self.primary
    }

    pub fn warm_light(&self) -> NodeId {
        self.warm
    }

    pub fn cool_light(&self) -> NodeId {
        self.cool
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// The attached model, once its load has been pumped.
    pub fn model(&self) -> Option<NodeId> {
        self.model
    }

    pub fn position_of(&self, id: NodeId) -> Option<Vector3<f32>> {
        self.scene.node(id).map(|node| node.transform.position)
    }
}

impl<H: Host> Drop for SceneController<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn spawn_load<H, T, F>(
    host: &mut H,
    load: Task<anyhow::Result<T>>,
    sender: UnboundedSender<Loaded>,
    wrap: F,
) -> AbortHandle
where
    H: Host,
    T: MaybeSend + 'static,
    F: FnOnce(anyhow::Result<T>) -> Loaded + MaybeSend + 'static,
{
    let (load, handle) = abortable(load);
    host.spawn(task(async move {
        if let Ok(result) = load.await {
            // Fails only once the controller has been disposed.
            let _ = sender.unbounded_send(wrap(result));
        }
    }));
    handle
}
