//! Event loop and frame pacing for Thalassa applications.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ash::vk;
use thalassa_gpu::GpuContextBuilder;
use thalassa_platform::WindowConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::ThalassaApp;
use crate::context::AppContext;
use crate::frame::Frame;

/// Surfaces smaller than this on either axis are skipped instead of drawn.
const MIN_DRAWABLE_EXTENT: u32 = 8;

/// Startup configuration for [`run_app`].
#[derive(Clone)]
pub struct AppConfig {
    /// Window title, also reported to the driver as the application name.
    pub title: String,
    /// Initial window width in logical pixels.
    pub width: u32,
    /// Initial window height in logical pixels.
    pub height: u32,
    /// Frame rate cap enforced by sleeping (`None` for uncapped).
    pub target_fps: Option<u32>,
    /// Prefer a vsynced present mode.
    pub vsync: bool,
    /// Enable Vulkan validation layers.
    pub validation: bool,
    /// Require sampler anisotropy from the device.
    pub anisotropy: bool,
}

impl AppConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            width: 1280,
            height: 720,
            target_fps: None,
            vsync: true,
            validation: cfg!(debug_assertions),
            anisotropy: false,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_anisotropy(mut self, anisotropy: bool) -> Self {
        self.anisotropy = anisotropy;
        self
    }
}

/// Run an application to completion.
///
/// Installs the tracing subscriber, creates the event loop and drives the
/// app until its window closes. Blocks until shutdown.
pub fn run_app<A: ThalassaApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
    };

    if let Err(e) = event_loop.run_app(&mut runner) {
        error!("Event loop error: {e}");
    }

    Ok(())
}

struct AppRunner<A: ThalassaApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
}

/// Live application state, created on the first `resumed` callback.
///
/// The app comes before the context so its drop glue, if any, runs while
/// the device still exists.
struct AppState<A: ThalassaApp> {
    app: A,
    ctx: AppContext,
    target_frame_time: Option<Duration>,
    last_frame_time: Instant,
    frame_count: u64,
    resized: bool,
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: ThalassaApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_config = WindowConfig::new(self.config.title.as_str())
            .with_size(self.config.width, self.config.height);
        let window = Arc::new(thalassa_platform::create_window(event_loop, &window_config)?);

        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .anisotropy(self.config.anisotropy)
            .build(window.as_ref())?;

        let mut ctx = AppContext::new(window, gpu, self.config.vsync)?;
        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Ok(AppState {
            app,
            ctx,
            target_frame_time,
            last_frame_time: Instant::now(),
            frame_count: 0,
            resized: false,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        })
    }
}

impl<A: ThalassaApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let (width, height) = thalassa_platform::drawable_size(&self.ctx.window);
        if width < MIN_DRAWABLE_EXTENT || height < MIN_DRAWABLE_EXTENT {
            // Minimized or degenerate surface. Keep polling, draw nothing.
            return Ok(());
        }

        if self.resized {
            self.recreate(width, height)?;
            self.resized = false;
        }

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        if dt > 0.0 {
            let fps = 1.0 / f64::from(dt);
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }

        self.app.update(&self.ctx, dt);

        let Some(command_buffer) = self.ctx.renderer.begin_frame()? else {
            // Swapchain went out of date at acquire. Rebuild on the next
            // redraw once the new size is known.
            self.resized = true;
            return Ok(());
        };

        self.ctx.renderer.begin_render_pass(command_buffer);
        let frame = Frame::new(
            command_buffer,
            self.ctx.renderer.frame_index(),
            dt,
            self.frame_count,
        );
        self.app.render(&self.ctx, &frame)?;
        self.ctx.renderer.end_render_pass(command_buffer);
        self.ctx.renderer.end_frame()?;

        self.frame_count += 1;

        if let Some(target) = self.target_frame_time {
            let elapsed = now.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn recreate(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        let extent = vk::Extent2D { width, height };
        self.ctx.renderer.recreate_swapchain(&self.ctx.gpu, extent)?;
        self.app.on_resize(&mut self.ctx, width, height)?;
        info!("Resized to {width}x{height}");
        Ok(())
    }

    fn cleanup(&mut self) {
        if self.frame_count > 0 {
            let avg_fps = self.fps_sum / self.frame_count as f64;
            info!("FPS statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.frame_count);
        }

        info!("Starting cleanup...");
        if let Err(e) = self.ctx.gpu.wait_idle() {
            error!("Failed to wait for device idle: {e}");
        }
        self.app.cleanup(&mut self.ctx);
        info!("Cleanup complete");
    }
}

impl<A: ThalassaApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");
        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render error: {e:#}");
                    }
                }
            }
            WindowEvent::Resized(_) => {
                if let Some(state) = &mut self.state {
                    state.resized = true;
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}
