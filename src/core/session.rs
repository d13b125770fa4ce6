use serde::Serialize;
use uuid::Uuid;

use super::background::{default_background, BackgroundDescriptor};
use super::error::IdPhotoError;
use super::generator::BackgroundGenerator;
use super::payload::ImagePayload;

/// Coarse session state, derived from `ProcessingState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No subject photo
    Idle,
    /// Photo present, nothing in flight
    Ready,
    /// A generation request is in flight
    Processing,
    /// The last request failed, photo still present
    Error,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Ready => write!(f, "ready"),
            SessionPhase::Processing => write!(f, "processing"),
            SessionPhase::Error => write!(f, "error"),
        }
    }
}

/// A generated photo and the background that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub image: ImagePayload,
    pub background_id: &'static str,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone)]
pub struct ProcessingState {
    pub original_image: Option<ImagePayload>,
    pub processed_image: Option<ProcessedImage>,
    pub selected_background: BackgroundDescriptor,
    pub custom_background_image: Option<ImagePayload>,
    pub is_processing: bool,
    pub error_message: Option<String>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            original_image: None,
            processed_image: None,
            selected_background: default_background(),
            custom_background_image: None,
            is_processing: false,
            error_message: None,
        }
    }
}

/// A generation the caller must run and report back with `Session::complete`
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: u64,
    /// Short id for log correlation (e.g. "gen_1a2b3c4d")
    pub trace_id: String,
    pub subject: ImagePayload,
    pub background: BackgroundDescriptor,
    pub custom_background: Option<ImagePayload>,
}

impl GenerationRequest {
    /// Run the request against a generator
    pub async fn execute(
        &self,
        generator: &dyn BackgroundGenerator,
    ) -> Result<ImagePayload, IdPhotoError> {
        tracing::info!(
            "[{}] Generating with background '{}' ({})",
            self.trace_id,
            self.background.id,
            self.background.kind
        );
        generator
            .generate(&self.subject, &self.background, self.custom_background.as_ref())
            .await
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: u64,
    background_id: &'static str,
}

/// Owns the session state and sequences every transition.
///
/// Intents return a `GenerationRequest` when they start a generation. At most
/// one request is in flight: intents other than `reset` are rejected while
/// processing, and completions for anything but the in-flight id are dropped.
pub struct Session {
    state: ProcessingState,
    has_credential: bool,
    next_request_id: u64,
    in_flight: Option<InFlight>,
}

impl Session {
    pub fn new(has_credential: bool) -> Self {
        Self {
            state: ProcessingState::default(),
            has_credential,
            next_request_id: 1,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn has_credential(&self) -> bool {
        self.has_credential
    }

    pub fn phase(&self) -> SessionPhase {
        if self.state.original_image.is_none() {
            SessionPhase::Idle
        } else if self.state.is_processing {
            SessionPhase::Processing
        } else if self.state.error_message.is_some() {
            SessionPhase::Error
        } else {
            SessionPhase::Ready
        }
    }

    /// Whether the shown result was made with a different background than the selected one
    pub fn result_is_stale(&self) -> bool {
        self.state
            .processed_image
            .as_ref()
            .is_some_and(|p| p.background_id != self.state.selected_background.id)
    }

    /// New subject photo: drop the old result and generate with the current selection
    pub fn select_image(&mut self, image: ImagePayload) -> Option<GenerationRequest> {
        if self.reject_while_processing("select image") {
            return None;
        }

        self.state.original_image = Some(image);
        self.state.processed_image = None;
        self.state.error_message = None;
        self.begin()
    }

    /// Switch background. No-op when nothing actually changes.
    ///
    /// For the custom kind, `custom_image` replaces the stored upload; `None`
    /// keeps whatever was uploaded before.
    pub fn change_background(
        &mut self,
        background: BackgroundDescriptor,
        custom_image: Option<ImagePayload>,
    ) -> Option<GenerationRequest> {
        if self.reject_while_processing("change background") {
            return None;
        }

        let same_id = background.id == self.state.selected_background.id;
        let custom_changed = background.is_custom()
            && custom_image.is_some()
            && custom_image != self.state.custom_background_image;

        if same_id && !custom_changed {
            tracing::debug!("Background '{}' already selected", background.id);
            return None;
        }

        if background.is_custom() {
            if let Some(image) = custom_image {
                self.state.custom_background_image = Some(image);
            }
        }
        self.state.selected_background = background;

        if self.state.original_image.is_some() {
            self.begin()
        } else {
            None
        }
    }

    /// Run again with the current photo and selection
    pub fn regenerate(&mut self) -> Option<GenerationRequest> {
        if self.reject_while_processing("regenerate") {
            return None;
        }
        if self.state.original_image.is_none() {
            return None;
        }
        self.begin()
    }

    /// Back to a fresh session. Any in-flight result will be discarded.
    pub fn reset(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!("Reset abandons request {}", in_flight.id);
        }
        self.state = ProcessingState::default();
    }

    /// Record the outcome of a request. Returns false if the request was stale.
    pub fn complete(
        &mut self,
        request_id: u64,
        result: Result<ImagePayload, IdPhotoError>,
    ) -> bool {
        let in_flight = match self.in_flight {
            Some(in_flight) if in_flight.id == request_id => in_flight,
            _ => {
                tracing::debug!("Discarding result of stale request {}", request_id);
                return false;
            }
        };

        self.in_flight = None;
        self.state.is_processing = false;

        match result {
            Ok(image) => {
                self.state.processed_image = Some(ProcessedImage {
                    image,
                    background_id: in_flight.background_id,
                });
                self.state.error_message = None;
            }
            Err(e) => {
                tracing::warn!("Generation failed: {}", e);
                // The last successful result, if any, stays visible
                self.state.error_message = Some(e.to_string());
            }
        }
        true
    }

    /// Execute a request and apply its outcome. Returns true on success.
    pub async fn run(
        &mut self,
        generator: &dyn BackgroundGenerator,
        request: GenerationRequest,
    ) -> bool {
        let result = request.execute(generator).await;
        let succeeded = result.is_ok();
        self.complete(request.id, result) && succeeded
    }

    fn reject_while_processing(&self, action: &str) -> bool {
        if self.state.is_processing {
            tracing::warn!("Ignoring '{}' while a generation is in flight", action);
            true
        } else {
            false
        }
    }

    fn begin(&mut self) -> Option<GenerationRequest> {
        if !self.has_credential {
            tracing::debug!("No API key configured, skipping generation");
            return None;
        }
        let subject = self.state.original_image.clone()?;

        let id = self.next_request_id;
        self.next_request_id += 1;

        let background = self.state.selected_background.clone();
        let custom_background = if background.is_custom() {
            self.state.custom_background_image.clone()
        } else {
            None
        };

        self.state.is_processing = true;
        self.state.error_message = None;
        self.in_flight = Some(InFlight {
            id,
            background_id: background.id,
        });

        let uuid = Uuid::new_v4();
        Some(GenerationRequest {
            id,
            trace_id: format!("gen_{}", &uuid.to_string()[..8]),
            subject,
            background,
            custom_background,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::background::{find, list_backgrounds, CUSTOM_UPLOAD_ID};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned outcomes and counts calls
    struct ScriptedGenerator {
        outcomes: Mutex<VecDeque<Result<ImagePayload, IdPhotoError>>>,
        calls: AtomicUsize,
        last_custom: Mutex<Option<ImagePayload>>,
    }

    impl ScriptedGenerator {
        fn new(outcomes: Vec<Result<ImagePayload, IdPhotoError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                last_custom: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackgroundGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _subject: &ImagePayload,
            _background: &BackgroundDescriptor,
            custom_background: Option<&ImagePayload>,
        ) -> Result<ImagePayload, IdPhotoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_custom.lock().unwrap() = custom_background.cloned();
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(IdPhotoError::GenerationEmpty))
        }
    }

    fn photo(tag: &str) -> ImagePayload {
        ImagePayload::from_data_uri(format!("data:image/jpeg;base64,{}", tag))
    }

    fn result(tag: &str) -> ImagePayload {
        ImagePayload::png_from_base64(tag)
    }

    #[test]
    fn test_new_session_is_idle_with_default_background() {
        let session = Session::new(true);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.state().selected_background.id, "white");
        assert!(session.state().processed_image.is_none());
    }

    #[tokio::test]
    async fn test_select_image_generates_and_becomes_ready() {
        let generator = ScriptedGenerator::new(vec![Ok(result("R1"))]);
        let mut session = Session::new(true);

        let request = session.select_image(photo("P1")).expect("should start generation");
        assert_eq!(session.phase(), SessionPhase::Processing);
        assert_eq!(request.background.id, "white");
        assert!(request.trace_id.starts_with("gen_"));

        assert!(session.run(&generator, request).await);
        assert_eq!(session.phase(), SessionPhase::Ready);
        let processed = session.state().processed_image.as_ref().unwrap();
        assert_eq!(processed.image, result("R1"));
        assert_eq!(processed.background_id, "white");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_result() {
        let generator = ScriptedGenerator::new(vec![
            Ok(result("R1")),
            Err(IdPhotoError::upstream("service unavailable")),
        ]);
        let mut session = Session::new(true);

        let request = session.select_image(photo("P1")).unwrap();
        session.run(&generator, request).await;

        let request = session.change_background(find("blue").unwrap(), None).unwrap();
        assert!(!session.run(&generator, request).await);

        assert_eq!(session.phase(), SessionPhase::Error);
        assert_eq!(session.state().error_message.as_deref(), Some("service unavailable"));
        assert_eq!(session.state().original_image, Some(photo("P1")));
        assert_eq!(
            session.state().processed_image.as_ref().map(|p| &p.image),
            Some(&result("R1"))
        );
        assert!(session.result_is_stale());
    }

    #[tokio::test]
    async fn test_new_image_clears_result_and_error() {
        let generator = ScriptedGenerator::new(vec![Err(IdPhotoError::GenerationEmpty)]);
        let mut session = Session::new(true);

        let request = session.select_image(photo("P1")).unwrap();
        session.run(&generator, request).await;
        assert_eq!(session.phase(), SessionPhase::Error);

        let request = session.select_image(photo("P2"));
        assert!(request.is_some());
        assert!(session.state().error_message.is_none());
        assert!(session.state().processed_image.is_none());
    }

    #[tokio::test]
    async fn test_same_background_is_noop() {
        let generator = ScriptedGenerator::new(vec![Ok(result("R1"))]);
        let mut session = Session::new(true);
        let request = session.select_image(photo("P1")).unwrap();
        session.run(&generator, request).await;

        let before = session.state().clone();
        assert!(session.change_background(find("white").unwrap(), None).is_none());

        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.state().processed_image, before.processed_image);
        assert_eq!(session.state().selected_background, before.selected_background);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_custom_image_is_noop_but_new_upload_regenerates() {
        let generator = ScriptedGenerator::new(vec![Ok(result("R1")), Ok(result("R2")), Ok(result("R3"))]);
        let mut session = Session::new(true);
        let custom = BackgroundDescriptor::custom_upload();

        let request = session.select_image(photo("P1")).unwrap();
        session.run(&generator, request).await;

        let request = session
            .change_background(custom.clone(), Some(photo("BG1")))
            .expect("first upload should generate");
        assert_eq!(request.custom_background, Some(photo("BG1")));
        session.run(&generator, request).await;

        // Identical bytes, or no new upload at all, change nothing
        assert!(session.change_background(custom.clone(), Some(photo("BG1"))).is_none());
        assert!(session.change_background(custom.clone(), None).is_none());
        assert_eq!(generator.calls(), 2);

        let request = session
            .change_background(custom, Some(photo("BG2")))
            .expect("new upload should generate");
        session.run(&generator, request).await;
        assert_eq!(*generator.last_custom.lock().unwrap(), Some(photo("BG2")));
        assert_eq!(
            session.state().processed_image.as_ref().map(|p| p.background_id),
            Some(CUSTOM_UPLOAD_ID)
        );
    }

    #[test]
    fn test_change_background_without_image_only_selects() {
        let mut session = Session::new(true);
        assert!(session.change_background(find("city").unwrap(), None).is_none());
        assert_eq!(session.state().selected_background.id, "city");
        assert_eq!(session.phase(), SessionPhase::Idle);

        let request = session.select_image(photo("P1")).unwrap();
        assert_eq!(request.background.id, "city");
        assert!(request.custom_background.is_none());
    }

    #[test]
    fn test_custom_image_is_only_sent_for_custom_kind() {
        let mut session = Session::new(true);
        session.change_background(BackgroundDescriptor::custom_upload(), Some(photo("BG")));
        session.change_background(find("red").unwrap(), None);

        let request = session.select_image(photo("P1")).unwrap();
        assert!(request.custom_background.is_none());
        // The upload is kept for when the user switches back
        assert_eq!(session.state().custom_background_image, Some(photo("BG")));
    }

    #[test]
    fn test_intents_rejected_while_processing() {
        let mut session = Session::new(true);
        let first = session.select_image(photo("P1")).unwrap();

        assert!(session.change_background(find("blue").unwrap(), None).is_none());
        assert!(session.regenerate().is_none());
        assert!(session.select_image(photo("P2")).is_none());
        assert_eq!(session.state().selected_background.id, "white");
        assert_eq!(session.state().original_image, Some(photo("P1")));

        assert!(session.complete(first.id, Ok(result("R1"))));
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_regenerate_uses_current_selection() {
        let generator = ScriptedGenerator::new(vec![Ok(result("R1")), Ok(result("R2"))]);
        let mut session = Session::new(true);
        assert!(session.regenerate().is_none());

        let request = session.select_image(photo("P1")).unwrap();
        session.run(&generator, request).await;

        let request = session.regenerate().unwrap();
        assert_eq!(request.subject, photo("P1"));
        assert_eq!(request.background.id, "white");
        session.run(&generator, request).await;
        assert_eq!(
            session.state().processed_image.as_ref().map(|p| &p.image),
            Some(&result("R2"))
        );
    }

    #[test]
    fn test_missing_credential_short_circuits() {
        let mut session = Session::new(false);
        assert!(session.select_image(photo("P1")).is_none());
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.change_background(find("blue").unwrap(), None).is_none());
        assert_eq!(session.state().selected_background.id, "blue");
        assert!(session.regenerate().is_none());
        assert!(!session.state().is_processing);
    }

    #[test]
    fn test_reset_from_every_phase() {
        let mut idle = Session::new(true);
        idle.change_background(find("office").unwrap(), None);

        let mut processing = Session::new(true);
        processing.change_background(BackgroundDescriptor::custom_upload(), Some(photo("BG")));
        processing.select_image(photo("P1"));

        let mut ready = Session::new(true);
        let request = ready.select_image(photo("P1")).unwrap();
        ready.complete(request.id, Ok(result("R1")));

        let mut error = Session::new(true);
        let request = error.select_image(photo("P1")).unwrap();
        error.complete(request.id, Err(IdPhotoError::GenerationEmpty));
        assert_eq!(error.phase(), SessionPhase::Error);

        for mut session in [idle, processing, ready, error] {
            session.reset();
            let state = session.state();
            assert_eq!(session.phase(), SessionPhase::Idle);
            assert!(state.original_image.is_none());
            assert!(state.processed_image.is_none());
            assert!(state.error_message.is_none());
            assert!(state.custom_background_image.is_none());
            assert!(!state.is_processing);
            assert_eq!(state.selected_background, list_backgrounds()[0]);
        }
    }

    #[test]
    fn test_result_after_reset_is_discarded() {
        let mut session = Session::new(true);
        let request = session.select_image(photo("P1")).unwrap();
        session.reset();

        assert!(!session.complete(request.id, Ok(result("R1"))));
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.state().processed_image.is_none());
    }

    #[test]
    fn test_stale_request_id_is_discarded() {
        let mut session = Session::new(true);
        let first = session.select_image(photo("P1")).unwrap();
        session.complete(first.id, Ok(result("R1")));
        let second = session.regenerate().unwrap();

        assert!(!session.complete(first.id, Ok(result("late"))));
        assert_eq!(session.phase(), SessionPhase::Processing);
        assert!(session.complete(second.id, Ok(result("R2"))));
    }
}
