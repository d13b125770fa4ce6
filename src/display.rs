use anyhow::{Context, Result};
use std::path::Path;

use crate::config::DisplayMode;

/// Show a saved result the way `output.display` asks for
pub fn show_image(path: &Path, mode: DisplayMode) {
    match mode {
        DisplayMode::Terminal => print_in_terminal(path),
        DisplayMode::Viewer => {
            if let Err(e) = open_in_viewer(path) {
                tracing::debug!("{:#}", e);
            }
        }
        DisplayMode::None => {}
    }
}

/// Render an image inline using viuer
pub fn print_in_terminal(path: &Path) {
    let conf = viuer::Config {
        width: Some(40),
        height: Some(30),
        absolute_offset: false,
        ..Default::default()
    };

    if let Err(e) = viuer::print_from_file(path, &conf) {
        tracing::debug!("Failed to display image in terminal: {}", e);
    }
}

/// Hand the image to the platform's default viewer
pub fn open_in_viewer(path: &Path) -> Result<()> {
    anyhow::ensure!(path.is_file(), "No image at {}", path.display());
    opener::open(path).context("Failed to open image viewer")
}
