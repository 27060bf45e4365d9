//! The environment the scene lives in.
//!
//! A [`Host`] owns the window or document: it hands out a renderer, attaches
//! its surface, delivers pointer events to registered listeners, schedules
//! frames and runs background tasks. [`crate::flow::WinitHost`] is the bundled
//! implementation; tests drive the controller through a headless one.

use std::future::Future;

use crate::{config::RendererSettings, render::Renderer, resources::AssetLoader};

/// Size of the host viewport in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; a zero height is treated as one pixel.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle of one scheduled frame. Only the most recent request is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Events a controller can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Listener {
    /// Window-level pointer movement in client coordinates.
    PointerMove,
}

#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

/// A boxed background computation. Futures only need to be `Send` off the web.
#[cfg(not(target_arch = "wasm32"))]
pub type Task<T> = futures::future::BoxFuture<'static, T>;
#[cfg(target_arch = "wasm32")]
pub type Task<T> = futures::future::LocalBoxFuture<'static, T>;

pub fn task<F>(future: F) -> Task<F::Output>
where
    F: Future + MaybeSend + 'static,
{
    Box::pin(future)
}

pub trait Host {
    type Renderer: Renderer;
    type Loader: AssetLoader;

    fn viewport(&self) -> Viewport;

    fn create_renderer(&mut self, settings: &RendererSettings) -> anyhow::Result<Self::Renderer>;

    /// Attach the renderer's output to the page or window.
    fn append_surface(&mut self, renderer: &Self::Renderer) -> anyhow::Result<SurfaceId>;

    fn remove_surface(&mut self, surface: SurfaceId);

    fn add_listener(&mut self, listener: Listener) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);

    /// Schedule one frame. Replaces any earlier request.
    fn request_frame(&mut self) -> FrameRequest;

    fn cancel_frame(&mut self, request: FrameRequest);

    fn loader(&self) -> &Self::Loader;

    /// Run `task` to completion in the background. Hosts wake their event
    /// loop once it finishes so the controller can pump the result.
    fn spawn(&mut self, task: Task<()>);
}
