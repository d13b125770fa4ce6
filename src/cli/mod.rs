pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "idphoto",
    version,
    about = "ID photo studio - swap the background of a portrait with Google Gemini",
    long_about = r#"ID photo studio - swap the background of a portrait with Google Gemini

Upload a portrait, pick a background (solid colors, studio templates, a cut-out,
or your own image) and let Gemini composite a professional ID photo.
Run without arguments to launch the interactive TUI.

SETUP:
  Set your API key via environment variable or config:
    export GEMINI_API_KEY=your-key-here
    idphoto config set api.key your-key-here

EXAMPLES:
  Replace the background with standard blue:
    idphoto process portrait.jpg --background blue

  Use your own background image:
    idphoto process portrait.jpg --custom beach.png

  List available backgrounds:
    idphoto backgrounds

  Launch interactive TUI:
    idphoto

OUTPUT FORMATS:
  --format text   Human-readable output (default)
  --format json   Machine-readable JSON
  --format quiet  Minimal output, just file paths"#,
    after_help = r#"CONFIGURATION:
  Config file: ~/.config/idphoto-cli/config.toml (Linux)

  Uploads must be images (JPG, PNG, WebP...) of at most 5MB.
  Results are saved as id-photo-<background>-<timestamp>.png"#
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replace the background of a portrait photo
    ///
    /// Sends the photo and the chosen background to Gemini and saves the
    /// resulting ID photo to the configured output directory.
    #[command(
        alias = "p",
        after_help = r#"EXAMPLES:
  Default background (from config, white out of the box):
    idphoto process me.jpg

  Creative template:
    idphoto process me.jpg --background office

  Cut-out on clean white:
    idphoto process me.jpg -b transparent

  Custom background image:
    idphoto process me.jpg --custom backdrop.jpg

  JSON output:
    idphoto process me.jpg --format json"#
    )]
    Process(commands::process::ProcessArgs),

    /// List the available backgrounds
    #[command(alias = "b")]
    Backgrounds(commands::backgrounds::BackgroundsArgs),

    /// View or modify configuration
    ///
    /// Manage the API key, model, default background and output settings.
    /// Changes are saved to the config file immediately.
    #[command(
        alias = "c",
        after_help = r#"EXAMPLES:
  Show all settings:
    idphoto config show

  Set values:
    idphoto config set api.key YOUR_API_KEY
    idphoto config set defaults.background blue
    idphoto config set output.directory ~/Pictures/idphoto

  Reset to defaults:
    idphoto config reset --force

AVAILABLE SETTINGS:
  api.key              - Gemini API key
  api.model            - Model used for generation
  api.base_url         - Gemini API base URL
  defaults.background  - Background used when none is given
  output.directory     - Where to save images
  output.display       - Display mode (terminal/viewer/none)"#
    )]
    Config(commands::config::ConfigArgs),
}
