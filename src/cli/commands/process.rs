use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::GeminiClient;
use crate::config::{Config, DisplayMode};
use crate::core::background::{self, BackgroundDescriptor};
use crate::core::{export, BackgroundGenerator, IdPhotoError, ImagePayload, Session, SessionPhase};
use crate::display;

#[derive(Args)]
pub struct ProcessArgs {
    /// Path to the portrait photo
    #[arg(required = true)]
    pub image: PathBuf,

    /// Background id (see `idphoto backgrounds`)
    #[arg(short, long)]
    pub background: Option<String>,

    /// Use your own background image instead of a built-in one
    #[arg(short, long, conflicts_with = "background")]
    pub custom: Option<PathBuf>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output directory for the result
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Don't save the result to disk
    #[arg(long)]
    pub no_save: bool,

    /// Output format (text, json, quiet)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Machine-readable summary for `--format json`
#[derive(Serialize)]
struct ProcessReport<'a> {
    status: SessionPhase,
    source: String,
    background: &'a str,
    kind: String,
    model: &'a str,
    output: Option<String>,
    error: Option<String>,
}

pub async fn run(args: ProcessArgs, config: &Config) -> Result<()> {
    if !config.has_api_key() {
        return Err(IdPhotoError::MissingCredential.into());
    }

    let mut config = config.clone();
    if let Some(model) = &args.model {
        config.api.model = model.clone();
    }
    let client = GeminiClient::from_config(&config);

    process_photo(args, &config, &client, client.model()).await
}

/// Load, generate and save one photo with the given backend
async fn process_photo(
    args: ProcessArgs,
    config: &Config,
    generator: &dyn BackgroundGenerator,
    model: &str,
) -> Result<()> {
    let image_path = args.image.canonicalize()
        .context("Image file not found")?;
    let subject = ImagePayload::load(&image_path).await
        .context("Failed to load image file")?;

    let (background, custom_image) = resolve_background(&args, config).await?;

    let mut session = Session::new(config.has_api_key());
    session.change_background(background, custom_image);
    let request = session
        .select_image(subject)
        .context("Generation did not start")?;

    // Show progress
    let pb = if args.format == "text" {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.yellow} {msg}")
                .unwrap(),
        );
        pb.set_message(format!(
            "Replacing background with {}...",
            request.background.display_name
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    session.run(generator, request).await;

    let state = session.state();
    let selected = state.selected_background.id;

    let mut report = ProcessReport {
        status: session.phase(),
        source: image_path.display().to_string(),
        background: selected,
        kind: state.selected_background.kind.to_string(),
        model,
        output: None,
        error: state.error_message.clone(),
    };

    let Some(processed) = &state.processed_image else {
        let message = state
            .error_message
            .clone()
            .unwrap_or_else(|| "Background replacement failed".to_string());

        if let Some(pb) = pb {
            pb.finish_with_message(format!("{} Background replacement failed", "✗".red()));
        }
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        // main reports the message
        anyhow::bail!(message);
    };

    if args.no_save {
        if let Some(pb) = &pb {
            pb.finish_with_message(format!("{} Done (not saved)", "✓".green()));
        }
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(());
    }

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));
    let path = export::save_result(&processed.image, processed.background_id, &output_dir)
        .await
        .context("Failed to save result")?;
    report.output = Some(path.display().to_string());

    if let Some(pb) = &pb {
        pb.finish_with_message(format!("{} ID photo saved", "✓".green()));
    }

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "quiet" => {
            println!("{}", path.display());
        }
        _ => {
            println!();
            println!("{}: {}", "Source".cyan().bold(), image_path.display());
            println!(
                "{}: {} ({})",
                "Background".cyan().bold(),
                state.selected_background.display_name,
                selected
            );
            println!("{}: {}", "Model".cyan().bold(), model);
            println!("{}: {}", "Status".cyan().bold(), "completed".green());
            println!();
            println!("{}:", "ID Photo".cyan().bold());
            println!("  {}", path.display());

            if config.output.display == DisplayMode::Terminal {
                println!();
            }
            display::show_image(&path, config.output.display);
        }
    }

    Ok(())
}

/// Pick the descriptor (and custom upload) from the arguments or the configured default
async fn resolve_background(
    args: &ProcessArgs,
    config: &Config,
) -> Result<(BackgroundDescriptor, Option<ImagePayload>)> {
    if let Some(custom_path) = &args.custom {
        let custom = ImagePayload::load(custom_path)
            .await
            .context("Failed to load custom background")?;
        return Ok((BackgroundDescriptor::custom_upload(), Some(custom)));
    }

    let id = args
        .background
        .as_deref()
        .unwrap_or(&config.defaults.background);
    let descriptor = background::find(id).with_context(|| {
        format!(
            "Unknown background '{}'. Valid values: {}",
            id,
            background::ids().join(", ")
        )
    })?;
    if descriptor.is_custom() {
        anyhow::bail!("The custom background needs an image, use --custom <path>");
    }
    Ok((descriptor, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// Answers every request with the same outcome
    struct FixedGenerator {
        failure: Option<&'static str>,
    }

    #[async_trait]
    impl BackgroundGenerator for FixedGenerator {
        async fn generate(
            &self,
            _subject: &ImagePayload,
            background: &BackgroundDescriptor,
            _custom_background: Option<&ImagePayload>,
        ) -> Result<ImagePayload, IdPhotoError> {
            match self.failure {
                Some(message) => Err(IdPhotoError::upstream(message)),
                None => Ok(ImagePayload::from_bytes(background.id.as_bytes(), "image/png")),
            }
        }
    }

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("portrait.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();
        path
    }

    fn args(image: PathBuf, output: &Path) -> ProcessArgs {
        ProcessArgs {
            image,
            background: Some("office".to_string()),
            custom: None,
            model: None,
            output: Some(output.to_path_buf()),
            no_save: false,
            format: "quiet".to_string(),
        }
    }

    fn config_with_key() -> Config {
        let mut config = Config::default();
        config.api.key = Some("key".to_string());
        config
    }

    #[tokio::test]
    async fn test_success_saves_into_output_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let generator = FixedGenerator { failure: None };

        process_photo(args(write_png(dir.path()), &out), &config_with_key(), &generator, "m")
            .await
            .unwrap();

        let saved: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(saved.len(), 1);
        let path = saved[0].as_ref().unwrap().path();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("id-photo-office-"));
        assert_eq!(std::fs::read(path).unwrap(), b"office");
    }

    #[tokio::test]
    async fn test_failure_is_reported_once_through_the_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let generator = FixedGenerator { failure: Some("Quota exceeded") };

        let err = process_photo(args(write_png(dir.path()), &out), &config_with_key(), &generator, "m")
            .await
            .unwrap_err();

        assert_eq!(format!("{:#}", err), "Quota exceeded");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_custom_background_entry_needs_a_path() {
        let dir = TempDir::new().unwrap();
        let mut args = args(write_png(dir.path()), dir.path());
        args.background = Some(background::CUSTOM_UPLOAD_ID.to_string());

        let err = resolve_background(&args, &config_with_key()).await.unwrap_err();
        assert!(err.to_string().contains("--custom"));
    }
}
