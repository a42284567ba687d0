//! Application framework for the Thalassa engine.
//!
//! Implement [`ThalassaApp`] and hand it to [`run_app`]; the framework owns
//! the window, the GPU context, the frame lifecycle and the event loop.
//!
//! ```no_run
//! use thalassa_app::{run_app, AppConfig, AppContext, Frame, ThalassaApp};
//!
//! struct Demo;
//!
//! impl ThalassaApp for Demo {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(Demo)
//!     }
//!
//!     fn update(&mut self, _ctx: &AppContext, _dt: f32) {}
//!
//!     fn render(&mut self, _ctx: &AppContext, _frame: &Frame) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<Demo>(AppConfig::new("Demo"))
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;

pub use app::ThalassaApp;
pub use context::AppContext;
pub use frame::Frame;
pub use runner::{run_app, AppConfig};

pub use thalassa_gpu::{GpuContext, GpuContextBuilder};
pub use thalassa_render::{Camera, Renderer};
pub use winit::event::WindowEvent;
