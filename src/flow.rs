//! Application event loop.
//!
//! [`run`] opens a window (a canvas on the web), acquires the GPU and mounts a
//! [`SceneController`] on a [`WinitHost`]. Window events are routed to the
//! controller:
//!
//! - `CursorMoved` goes to [`SceneController::on_pointer_move`] in logical pixels
//! - `RedrawRequested` delivers the scheduled frame to [`SceneController::on_frame`]
//! - finished load tasks wake the loop with [`FlowEvent::AssetReady`], which pumps
//! - `CloseRequested` disposes the controller and exits

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    config::{RendererSettings, SceneConfig},
    context::GpuContext,
    controller::SceneController,
    host::{FrameRequest, Host, Listener, ListenerId, SurfaceId, Task, Viewport},
    render::WgpuRenderer,
    resources::FileLoader,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

const TITLE: &str = "flow-orbit";
#[cfg(not(target_arch = "wasm32"))]
const NATIVE_SIZE: LogicalSize<u32> = LogicalSize::new(1024, 768);

pub enum FlowEvent {
    /// GPU acquisition finished (sent from `spawn_local` on the web).
    #[allow(dead_code)]
    GpuReady(anyhow::Result<GpuContext>),
    /// A background load finished; its result is waiting to be pumped.
    AssetReady,
}

impl std::fmt::Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GpuReady(result) => f
                .debug_tuple("GpuReady")
                .field(&result.as_ref().map(|_| "GpuContext"))
                .finish(),
            Self::AssetReady => f.write_str("AssetReady"),
        }
    }
}

/// [`Host`] backed by a winit window.
pub struct WinitHost {
    window: Arc<Window>,
    proxy: EventLoopProxy<FlowEvent>,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Handle,
    gpu: Option<GpuContext>,
    loader: FileLoader,
    listeners: HashMap<ListenerId, Listener>,
    surface: Option<SurfaceId>,
    pending_frame: Option<FrameRequest>,
    next_id: u64,
}

impl WinitHost {
    pub fn new(
        window: Arc<Window>,
        proxy: EventLoopProxy<FlowEvent>,
        #[cfg(not(target_arch = "wasm32"))] runtime: tokio::runtime::Handle,
        gpu: GpuContext,
    ) -> Self {
        Self {
            window,
            proxy,
            #[cfg(not(target_arch = "wasm32"))]
            runtime,
            gpu: Some(gpu),
            loader: FileLoader::new(),
            listeners: HashMap::new(),
            surface: None,
            pending_frame: None,
            next_id: 0,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn has_listener(&self, listener: Listener) -> bool {
        self.listeners.values().any(|l| *l == listener)
    }

    /// The live frame request, consumed by the redraw that serves it. `None`
    /// when the request was cancelled.
    pub fn take_frame(&mut self) -> Option<FrameRequest> {
        self.pending_frame.take()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for WinitHost {
    type Renderer = WgpuRenderer;
    type Loader = FileLoader;

    fn viewport(&self) -> Viewport {
        let size: LogicalSize<f64> = self.window.inner_size().to_logical(self.window.scale_factor());
        Viewport::new(size.width.round() as u32, size.height.round() as u32)
    }

    fn create_renderer(&mut self, settings: &RendererSettings) -> anyhow::Result<WgpuRenderer> {
        let ctx = self
            .gpu
            .take()
            .context("The GPU context is already owned by a renderer")?;
        Ok(WgpuRenderer::new(ctx, settings, self.viewport()))
    }

    fn append_surface(&mut self, renderer: &WgpuRenderer) -> anyhow::Result<SurfaceId> {
        #[cfg(not(target_arch = "wasm32"))]
        renderer.window().set_visible(true);
        #[cfg(target_arch = "wasm32")]
        attach_canvas(renderer.window())?;

        let id = SurfaceId(self.next_id());
        self.surface = Some(id);
        Ok(id)
    }

    fn remove_surface(&mut self, surface: SurfaceId) {
        if self.surface != Some(surface) {
            log::warn!("Ignoring removal of unknown {surface:?}");
            return;
        }
        self.surface = None;
        #[cfg(not(target_arch = "wasm32"))]
        self.window.set_visible(false);
        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;
            if let Some(canvas) = self.window.canvas() {
                canvas.remove();
            }
        }
    }

    fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.insert(id, listener);
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_id());
        self.pending_frame = Some(request);
        self.window.request_redraw();
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending_frame == Some(request) {
            self.pending_frame = None;
        }
    }

    fn loader(&self) -> &FileLoader {
        &self.loader
    }

    fn spawn(&mut self, task: Task<()>) {
        let proxy = self.proxy.clone();
        let wake = async move {
            task.await;
            // The loop is gone when the app is shutting down.
            let _ = proxy.send_event(FlowEvent::AssetReady);
        };
        #[cfg(not(target_arch = "wasm32"))]
        self.runtime.spawn(wake);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(wake);
    }
}

#[cfg(target_arch = "wasm32")]
fn attach_canvas(window: &Window) -> anyhow::Result<()> {
    use winit::platform::web::WindowExtWebSys;

    let canvas = window.canvas().context("Window has no canvas")?;
    let body = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.body())
        .context("Document has no body")?;
    body.append_child(&canvas)
        .map_err(|_| anyhow::anyhow!("Failed to append the canvas to the document"))?;
    Ok(())
}

pub struct App {
    config: SceneConfig,
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    window: Option<Arc<Window>>,
    controller: Option<SceneController<WinitHost>>,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime =
            tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
        Ok(Self {
            config,
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            window: None,
            controller: None,
        })
    }

    fn mount(&mut self, event_loop: &ActiveEventLoop, gpu: anyhow::Result<GpuContext>) {
        let Some(window) = self.window.clone() else {
            log::error!("GPU is ready but there is no window");
            return;
        };
        let host = gpu.map(|gpu| {
            WinitHost::new(
                window,
                self.proxy.clone(),
                #[cfg(not(target_arch = "wasm32"))]
                self.async_runtime.handle().clone(),
                gpu,
            )
        });
        match host.and_then(|host| SceneController::mount(host, self.config.clone())) {
            Ok(controller) => self.controller = Some(controller),
            Err(err) => {
                log::error!("Cannot start the scene: {err:#}");
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(TITLE);

        #[cfg(not(target_arch = "wasm32"))]
        {
            // Shown once the scene attaches its surface.
            window_attributes = window_attributes
                .with_inner_size(NATIVE_SIZE)
                .with_resizable(false)
                .with_visible(false);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let page = web_sys::window().unwrap_throw();
            let width = page.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(1024.0);
            let height = page.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(768.0);
            window_attributes = window_attributes.with_inner_size(LogicalSize::new(width, height));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create a window: {err}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let power_preference = self.config.renderer.power_preference;
        let gpu_future = GpuContext::new(window, power_preference);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let gpu = self.async_runtime.block_on(gpu_future);
            self.mount(event_loop, gpu);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let gpu = gpu_future.await;
                if proxy.send_event(FlowEvent::GpuReady(gpu)).is_err() {
                    log::error!("Event loop closed before the GPU was ready");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::GpuReady(gpu) => self.mount(event_loop, gpu),
            FlowEvent::AssetReady => {
                if let Some(controller) = &mut self.controller {
                    let applied = controller.pump();
                    log::debug!("Applied {applied} finished load(s)");
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut controller) = self.controller.take() {
                    controller.dispose();
                }
                event_loop.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let Some(controller) = &mut self.controller else {
                    return;
                };
                if !controller.host().has_listener(Listener::PointerMove) {
                    return;
                }
                let scale_factor = controller.host().window().scale_factor();
                let logical = position.to_logical::<f32>(scale_factor);
                controller.on_pointer_move(logical.x, logical.y);
            }
            WindowEvent::RedrawRequested => {
                if let Some(controller) = &mut self.controller {
                    if let Some(frame) = controller.host_mut().take_frame() {
                        controller.on_frame(frame);
                    }
                }
            }
            _ => {}
        }
    }
}

pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(log::Level::Info).is_err() {
            log::warn!("Logger was already initialized");
        }
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
