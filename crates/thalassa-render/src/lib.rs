//! Frame lifecycle renderer for the Thalassa engine.
//!
//! This crate provides:
//! - The `Renderer` driving wait/acquire/record/submit/present
//! - Frame slot bookkeeping with panic-on-misuse transitions
//! - Camera and view math with GPU uniform layouts

pub mod camera;
pub mod error;
pub mod renderer;
pub mod schedule;

pub use camera::{Camera, CameraUniforms};
pub use error::{RenderError, Result};
pub use renderer::{Renderer, DEPTH_FORMAT};
pub use schedule::{FrameSchedule, MAX_FRAMES_IN_FLIGHT};
