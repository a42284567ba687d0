//! Platform abstraction for the Thalassa engine.
//!
//! Provides window creation and drawable-size queries via winit. The
//! returned `Window` carries the raw display/window handles that GPU
//! surface creation consumes.

use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Thalassa".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create a config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Allow or forbid resizing.
    #[must_use]
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}

/// Create a window on the running event loop.
pub fn create_window(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Window> {
    let attributes = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(config.resizable);

    let window = event_loop
        .create_window(attributes)
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

    tracing::debug!("Window created: {}x{}", config.width, config.height);
    Ok(window)
}

/// Drawable surface size in physical pixels.
///
/// Minimized windows report zero on at least one axis.
pub fn drawable_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_setters_chain() {
        let config = WindowConfig::new("Ocean")
            .with_size(800, 600)
            .with_resizable(false);

        assert_eq!(config.title, "Ocean");
        assert_eq!((config.width, config.height), (800, 600));
        assert!(!config.resizable);
    }

    #[test]
    fn config_defaults_to_a_hd_window() {
        let config = WindowConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.resizable);
    }
}
