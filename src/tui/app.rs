use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, DisplayMode};
use crate::display;
use crate::core::background::{self, BackgroundDescriptor};
use crate::core::{
    export, BackgroundGenerator, GenerationRequest, IdPhotoError, ImagePayload, Session, SessionPhase,
};

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Background picker and session view
    Main,
    /// Path input mode
    Input,
    /// Settings screen
    Settings,
}

/// What the path being typed is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    SubjectPhoto,
    CustomBackground,
}

impl InputTarget {
    pub fn title(&self) -> &'static str {
        match self {
            InputTarget::SubjectPhoto => "Portrait photo path (Enter to open, Esc to cancel)",
            InputTarget::CustomBackground => "Background image path (Enter to upload, Esc to cancel)",
        }
    }
}

/// Settings field being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Model,
    DefaultBackground,
    OutputDirectory,
    Display,
}

impl SettingsField {
    pub fn all() -> &'static [SettingsField] {
        &[
            SettingsField::Model,
            SettingsField::DefaultBackground,
            SettingsField::OutputDirectory,
            SettingsField::Display,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::Model => "Model",
            SettingsField::DefaultBackground => "Default Background",
            SettingsField::OutputDirectory => "Output Directory",
            SettingsField::Display => "Display Mode",
        }
    }

    pub fn config_key(&self) -> &'static str {
        match self {
            SettingsField::Model => "api.model",
            SettingsField::DefaultBackground => "defaults.background",
            SettingsField::OutputDirectory => "output.directory",
            SettingsField::Display => "output.display",
        }
    }
}

/// Builds the generation backend from the current config
pub type GeneratorFactory = Box<dyn Fn(&Config) -> Arc<dyn BackgroundGenerator> + Send>;

/// Result of a spawned generation, delivered back to the event loop
pub struct GenerationOutcome {
    pub request_id: u64,
    pub result: Result<ImagePayload, IdPhotoError>,
}

/// TUI application state
pub struct App {
    /// Current mode
    pub mode: AppMode,

    /// Configuration
    pub config: Config,

    /// Session controller; the single owner of photo/result/selection state
    pub session: Session,

    /// Backend used for generations, rebuilt when the API settings change
    generator: Arc<dyn BackgroundGenerator>,
    make_generator: GeneratorFactory,

    /// Picker entries: the catalog followed by the custom upload
    pub backgrounds: Vec<BackgroundDescriptor>,

    /// Highlighted picker entry
    pub highlighted: usize,

    /// Current path input
    pub input: String,

    /// Cursor position in input
    pub cursor_pos: usize,

    /// What the input is for
    pub input_target: InputTarget,

    /// Where the subject photo came from
    pub subject_path: Option<PathBuf>,

    /// Where the custom background came from
    pub custom_path: Option<PathBuf>,

    /// Last saved result
    pub saved_path: Option<PathBuf>,

    /// Status message
    pub status_message: Option<String>,

    /// Local error message (rejected uploads, save failures)
    pub error_message: Option<String>,

    /// Whether to quit
    pub should_quit: bool,

    /// Whether config was changed
    pub config_changed: bool,

    /// Settings: selected field index
    pub settings_selected: usize,

    /// Settings: currently editing
    pub settings_editing: bool,

    /// Settings: edit buffer
    pub settings_edit_buffer: String,

    results_tx: async_channel::Sender<GenerationOutcome>,
    results_rx: async_channel::Receiver<GenerationOutcome>,
}

impl App {
    pub fn new(config: Config, make_generator: GeneratorFactory) -> Self {
        let mut backgrounds = background::list_backgrounds().to_vec();
        backgrounds.push(BackgroundDescriptor::custom_upload());

        let session = Session::new(config.has_api_key());
        let generator = make_generator(&config);
        let (results_tx, results_rx) = async_channel::unbounded();

        let mut app = Self {
            mode: AppMode::Main,
            config,
            session,
            generator,
            make_generator,
            backgrounds,
            highlighted: 0,
            input: String::new(),
            cursor_pos: 0,
            input_target: InputTarget::SubjectPhoto,
            subject_path: None,
            custom_path: None,
            saved_path: None,
            status_message: None,
            error_message: None,
            should_quit: false,
            config_changed: false,
            settings_selected: 0,
            settings_editing: false,
            settings_edit_buffer: String::new(),
            results_tx,
            results_rx,
        };
        app.select_configured_default();
        app
    }

    /// Pre-select `defaults.background`; without a photo nothing is generated
    fn select_configured_default(&mut self) {
        if let Some(default) = background::find(&self.config.defaults.background) {
            self.session.change_background(default, None);
        }
        self.highlighted = self
            .backgrounds
            .iter()
            .position(|b| b.id == self.session.state().selected_background.id)
            .unwrap_or(0);
    }

    /// Set status message
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.error_message = None;
    }

    /// Set error message
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error_message = Some(msg.into());
        self.status_message = None;
    }

    /// Clear messages
    pub fn clear_messages(&mut self) {
        self.status_message = None;
        self.error_message = None;
    }

    pub fn is_processing(&self) -> bool {
        self.session.phase() == SessionPhase::Processing
    }

    /// Move picker highlight up
    pub fn select_previous(&mut self) {
        if self.highlighted > 0 {
            self.highlighted -= 1;
        }
    }

    /// Move picker highlight down
    pub fn select_next(&mut self) {
        if self.highlighted < self.backgrounds.len().saturating_sub(1) {
            self.highlighted += 1;
        }
    }

    pub fn highlighted_background(&self) -> Option<&BackgroundDescriptor> {
        self.backgrounds.get(self.highlighted)
    }

    /// Start typing a path
    pub fn begin_input(&mut self, target: InputTarget) {
        self.input_target = target;
        self.input.clear();
        self.cursor_pos = 0;
        self.mode = AppMode::Input;
        self.clear_messages();
    }

    /// Load a portrait and kick off generation with the current selection
    pub async fn open_subject(&mut self, path: &Path) {
        if self.is_processing() {
            self.set_error("Please wait for the current generation to finish");
            return;
        }
        let image = match ImagePayload::load(path).await {
            Ok(image) => image,
            Err(e) => {
                self.set_error(e.to_string());
                return;
            }
        };

        self.subject_path = Some(path.to_path_buf());
        self.saved_path = None;
        let request = self.session.select_image(image);
        self.dispatch(request);
    }

    /// Load a custom background and switch to it
    pub async fn upload_custom(&mut self, path: &Path) {
        if self.is_processing() {
            self.set_error("Please wait for the current generation to finish");
            return;
        }
        let image = match ImagePayload::load(path).await {
            Ok(image) => image,
            Err(e) => {
                self.set_error(e.to_string());
                return;
            }
        };

        self.custom_path = Some(path.to_path_buf());
        self.highlighted = self.backgrounds.len() - 1;
        let request = self
            .session
            .change_background(BackgroundDescriptor::custom_upload(), Some(image));
        self.dispatch(request);
    }

    /// Apply the highlighted picker entry
    pub fn apply_highlighted(&mut self) {
        let Some(descriptor) = self.highlighted_background().cloned() else {
            return;
        };

        if descriptor.is_custom() && self.session.state().custom_background_image.is_none() {
            self.begin_input(InputTarget::CustomBackground);
            return;
        }

        let request = self.session.change_background(descriptor, None);
        self.dispatch(request);
    }

    pub fn regenerate(&mut self) {
        if self.session.state().original_image.is_none() {
            self.set_error("Open a portrait photo first (press o)");
            return;
        }
        let request = self.session.regenerate();
        self.dispatch(request);
    }

    /// Back to an empty session
    pub fn reset(&mut self) {
        self.session.reset();
        self.subject_path = None;
        self.custom_path = None;
        self.saved_path = None;
        self.select_configured_default();
        self.set_status("Session reset");
    }

    /// Write the current result to the output directory
    pub async fn save_result(&mut self) -> Result<()> {
        let Some(processed) = self.session.state().processed_image.clone() else {
            self.set_error("Nothing to save yet");
            return Ok(());
        };

        let output_dir = PathBuf::from(&self.config.output.directory);
        match export::save_result(&processed.image, processed.background_id, &output_dir).await {
            Ok(path) => {
                self.set_status(format!("Saved {}", path.display()));
                if self.config.output.display == DisplayMode::Viewer {
                    if let Err(e) = display::open_in_viewer(&path) {
                        tracing::debug!("{:#}", e);
                    }
                }
                self.saved_path = Some(path);
            }
            Err(e) => self.set_error(format!("Save failed: {}", e)),
        }
        Ok(())
    }

    /// Run a generation on a background task
    fn dispatch(&mut self, request: Option<GenerationRequest>) {
        let Some(request) = request else {
            if !self.session.has_credential() && self.session.state().original_image.is_some() {
                self.set_error("No API key configured, background replacement is disabled");
            }
            return;
        };

        self.set_status(format!(
            "Replacing background with {}...",
            request.background.display_name
        ));

        let generator = Arc::clone(&self.generator);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = request.execute(generator.as_ref()).await;
            let outcome = GenerationOutcome {
                request_id: request.id,
                result,
            };
            if tx.send(outcome).await.is_err() {
                tracing::debug!("Result receiver dropped");
            }
        });
    }

    /// Drain finished generations without blocking
    pub fn poll_results(&mut self) {
        while let Ok(outcome) = self.results_rx.try_recv() {
            self.apply_outcome(outcome);
        }
    }

    pub fn apply_outcome(&mut self, outcome: GenerationOutcome) {
        let succeeded = outcome.result.is_ok();
        if !self.session.complete(outcome.request_id, outcome.result) {
            return;
        }
        if succeeded {
            self.saved_path = None;
            self.set_status("Background replaced. Press w to save");
        } else {
            // The session error is shown in the photo panel
            self.clear_messages();
        }
    }

    /// Get current settings value
    pub fn get_settings_value(&self, field: &SettingsField) -> String {
        self.config.get(field.config_key()).unwrap_or_default()
    }

    /// Set settings value
    pub fn set_settings_value(&mut self, field: &SettingsField, value: &str) -> Result<()> {
        self.config.set(field.config_key(), value)?;
        self.config_changed = true;
        if matches!(field.config_key(), "api.model" | "api.base_url") {
            self.generator = (self.make_generator)(&self.config);
        }
        Ok(())
    }

    /// Get options for a settings field (if applicable)
    pub fn get_settings_options(&self, field: &SettingsField) -> Option<Vec<&'static str>> {
        match field {
            SettingsField::Model => Some(Config::models().to_vec()),
            SettingsField::DefaultBackground => Some(
                background::list_backgrounds().iter().map(|b| b.id).collect(),
            ),
            SettingsField::Display => Some(DisplayMode::variants().to_vec()),
            SettingsField::OutputDirectory => None,
        }
    }

    /// Cycle to next option for a settings field
    pub fn cycle_settings_option(&mut self, field: &SettingsField) -> Result<()> {
        if let Some(options) = self.get_settings_options(field) {
            let current = self.get_settings_value(field);
            let current_idx = options.iter().position(|&o| o == current).unwrap_or(0);
            let next_idx = (current_idx + 1) % options.len();
            self.set_settings_value(field, options[next_idx])?;
        }
        Ok(())
    }
}
