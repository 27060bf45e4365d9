#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::Arc};

use flow_orbit::{
    Host, Renderer, SceneConfig, SceneController, Viewport,
    camera::PerspectiveCamera,
    config::RendererSettings,
    data_structures::{
        geometry::{Geometry, ModelVertex},
        material::Material,
        scene_graph::{Mesh, Scene, SceneNode},
        texture::TextureData,
    },
    host::{FrameRequest, Listener, ListenerId, SurfaceId, Task, task},
    resources::{AssetLoader, DecoderConfig},
};
use futures::{channel::oneshot, executor::LocalPool, task::LocalSpawnExt};

/// Everything the host observed, shared so it outlives the controller.
#[derive(Debug, Default)]
pub struct HostRecord {
    pub attached: Vec<SurfaceId>,
    pub removed: Vec<SurfaceId>,
    pub listeners: HashMap<ListenerId, Listener>,
    pub pending_frame: Option<FrameRequest>,
    pub cancelled_frames: Vec<FrameRequest>,
    pub renderer_settings: Option<RendererSettings>,
    pub spawned: usize,
}

impl HostRecord {
    pub fn has_listener(&self, listener: Listener) -> bool {
        self.listeners.values().any(|l| *l == listener)
    }
}

#[derive(Debug)]
pub struct RecordingRenderer {
    pub size: Option<Viewport>,
    pub pixel_ratio: f32,
    pub renders: usize,
    pub fail: bool,
    /// Ratio in effect for each render call.
    pub ratios: Vec<f32>,
    pub last_mesh_count: usize,
}

impl Renderer for RecordingRenderer {
    fn set_size(&mut self, viewport: Viewport) {
        self.size = Some(viewport);
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn render(&mut self, scene: &Scene, _camera: &PerspectiveCamera) -> anyhow::Result<()> {
        self.renders += 1;
        self.ratios.push(self.pixel_ratio);
        self.last_mesh_count = scene.mesh_count();
        if self.fail {
            anyhow::bail!("device lost");
        }
        Ok(())
    }
}

type Pending<T> = RefCell<Option<oneshot::Sender<anyhow::Result<T>>>>;

/// Loads that only finish when the test resolves them.
#[derive(Default)]
pub struct ScriptedLoader {
    texture: Pending<TextureData>,
    model: Pending<SceneNode>,
    pub texture_requests: RefCell<Vec<String>>,
    pub model_requests: RefCell<Vec<(String, DecoderConfig)>>,
}

impl ScriptedLoader {
    /// Returns false when nobody is waiting for the texture anymore.
    pub fn resolve_texture(&self, result: anyhow::Result<TextureData>) -> bool {
        self.texture
            .borrow_mut()
            .take()
            .is_some_and(|sender| sender.send(result).is_ok())
    }

    pub fn resolve_model(&self, result: anyhow::Result<SceneNode>) -> bool {
        self.model
            .borrow_mut()
            .take()
            .is_some_and(|sender| sender.send(result).is_ok())
    }
}

fn pending<T: Send + 'static>(slot: &Pending<T>) -> Task<anyhow::Result<T>> {
    let (sender, receiver) = oneshot::channel();
    *slot.borrow_mut() = Some(sender);
    task(async move {
        receiver
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("load was dropped")))
    })
}

impl AssetLoader for ScriptedLoader {
    fn load_texture(&self, path: &str) -> Task<anyhow::Result<TextureData>> {
        self.texture_requests.borrow_mut().push(path.to_string());
        pending(&self.texture)
    }

    fn load_model(&self, path: &str, decoder: &DecoderConfig) -> Task<anyhow::Result<SceneNode>> {
        self.model_requests
            .borrow_mut()
            .push((path.to_string(), decoder.clone()));
        pending(&self.model)
    }
}

/// A host without a window. Tasks run on a [`LocalPool`] that tests drive.
pub struct HeadlessHost {
    pub viewport: Viewport,
    pub record: Rc<RefCell<HostRecord>>,
    pub fail_renders: bool,
    pub fail_renderer_creation: bool,
    loader: ScriptedLoader,
    pool: LocalPool,
    next_id: u64,
}

impl HeadlessHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            record: Rc::new(RefCell::new(HostRecord::default())),
            fail_renders: false,
            fail_renderer_creation: false,
            loader: ScriptedLoader::default(),
            pool: LocalPool::new(),
            next_id: 0,
        }
    }

    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Hand out the live frame request, like a display refresh would.
    pub fn take_frame(&mut self) -> Option<FrameRequest> {
        self.record.borrow_mut().pending_frame.take()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for HeadlessHost {
    type Renderer = RecordingRenderer;
    type Loader = ScriptedLoader;

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_renderer(&mut self, settings: &RendererSettings) -> anyhow::Result<RecordingRenderer> {
        if self.fail_renderer_creation {
            anyhow::bail!("no adapter");
        }
        self.record.borrow_mut().renderer_settings = Some(settings.clone());
        Ok(RecordingRenderer {
            size: None,
            pixel_ratio: 1.0,
            renders: 0,
            fail: self.fail_renders,
            ratios: Vec::new(),
            last_mesh_count: 0,
        })
    }

    fn append_surface(&mut self, _renderer: &RecordingRenderer) -> anyhow::Result<SurfaceId> {
        let id = SurfaceId(self.next_id());
        self.record.borrow_mut().attached.push(id);
        Ok(id)
    }

    fn remove_surface(&mut self, surface: SurfaceId) {
        let mut record = self.record.borrow_mut();
        record.attached.retain(|s| *s != surface);
        record.removed.push(surface);
    }

    fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.record.borrow_mut().listeners.insert(id, listener);
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.record.borrow_mut().listeners.remove(&id);
    }

    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_id());
        self.record.borrow_mut().pending_frame = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let mut record = self.record.borrow_mut();
        if record.pending_frame == Some(request) {
            record.pending_frame = None;
        }
        record.cancelled_frames.push(request);
    }

    fn loader(&self) -> &ScriptedLoader {
        &self.loader
    }

    fn spawn(&mut self, task: Task<()>) {
        self.record.borrow_mut().spawned += 1;
        self.pool
            .spawner()
            .spawn_local(task)
            .expect("local pool is alive");
    }
}

pub type TestController = SceneController<HeadlessHost>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn mount(width: u32, height: u32) -> TestController {
    init_logger();
    let mut controller = SceneController::mount(HeadlessHost::new(width, height), SceneConfig::default())
        .expect("headless mount succeeds");
    controller.host_mut().run_until_stalled();
    controller
}

/// Deliver the scheduled frame, if any. Returns whether a frame was delivered.
pub fn tick(controller: &mut TestController) -> bool {
    match controller.host_mut().take_frame() {
        Some(frame) => {
            controller.on_frame(frame);
            true
        }
        None => false,
    }
}

/// Run background tasks, then apply whatever finished.
pub fn settle(controller: &mut TestController) -> usize {
    controller.host_mut().run_until_stalled();
    controller.pump()
}

/// Pointer move routed the way a window would: only while a listener is registered.
pub fn pointer(controller: &mut TestController, x: f32, y: f32) {
    let listening = controller
        .host()
        .record
        .borrow()
        .has_listener(Listener::PointerMove);
    if listening {
        controller.on_pointer_move(x, y);
    }
}

pub fn renders(controller: &TestController) -> usize {
    controller.renderer().renders
}

pub fn texture_data() -> TextureData {
    TextureData {
        label: "textures/marble.jpg".to_string(),
        width: 1,
        height: 1,
        rgba: vec![200, 200, 200, 255],
    }
}

fn triangle_mesh() -> Mesh {
    let vertices = vec![
        ModelVertex {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [0.0, 0.0],
        },
        ModelVertex {
            position: [1.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [1.0, 0.0],
        },
        ModelVertex {
            position: [0.0, 1.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [0.0, 1.0],
        },
    ];
    Mesh {
        geometry: Arc::new(Geometry::new(vertices, vec![0, 1, 2])),
        material: Material::Imported {
            base_color: [0.8, 0.8, 0.8, 1.0],
        },
        cast_shadow: true,
        receive_shadow: false,
    }
}

/// A statue with one top-level mesh and one nested in a group.
pub fn model() -> SceneNode {
    let mut root = SceneNode::group("models/statue.glb");
    let mut arm = SceneNode::group("arm");
    arm.add_child(SceneNode::mesh("hand", triangle_mesh()));
    root.add_child(SceneNode::mesh("body", triangle_mesh()));
    root.add_child(arm);
    root
}

pub fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}
