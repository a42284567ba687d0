//! Thalassa Ocean Demo
//!
//! Renders an animated ocean surface as a subdivided plane displaced by
//! sine waves in the vertex shader, lit by three directional lights under
//! a gradient skybox. Drag with the left mouse button to orbit, scroll to
//! zoom.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p thalassa-ocean -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--size <N>`: Ocean plane side length in world units (default: 100)
//! - `--divisions <N>`: Grid divisions per side (default: 1024)
//! - `--seed <N>`: Noise texture seed (default: 7)
//! - `--exposure <N>`: Tone mapping exposure (default: 1.0)
//! - `-h, --help`: Print help message
//!
//! The SPIR-V binaries next to the GLSL sources are produced by
//! `shaders/compile.sh` and loaded at startup.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;
mod mesh;

use thalassa_app::{run_app, AppConfig};

use crate::app::OceanApp;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run_app::<OceanApp>(
        AppConfig::new("Thalassa - Ocean Demo")
            .with_size(WIDTH, HEIGHT)
            .with_anisotropy(true),
    )
}

fn print_help() {
    eprintln!(
        "Thalassa Ocean Demo

USAGE:
    cargo run -p thalassa-ocean -- [OPTIONS]

OPTIONS:
    --size <N>         Ocean plane side length in world units (default: 100)
    --divisions <N>    Grid divisions per side (default: 1024)
    --seed <N>         Noise texture seed (default: 7)
    --exposure <N>     Tone mapping exposure (default: 1.0)
    -h, --help         Print this help message

NOTE: Triangle count grows with the square of the divisions; values
      above 2048 put tens of millions of triangles through the vertex
      shader.

CONTROLS:
    Left mouse drag    Orbit the camera around the origin
    Scroll wheel       Zoom in and out

ENVIRONMENT VARIABLES:
    RUST_LOG           Set log level (e.g., info, debug, trace)"
    );
}
