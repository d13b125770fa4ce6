pub mod background;
pub mod error;
pub mod export;
pub mod generator;
pub mod payload;
pub mod prompt;
pub mod session;

pub use background::{BackgroundDescriptor, BackgroundKind};
pub use error::IdPhotoError;
pub use generator::BackgroundGenerator;
pub use payload::ImagePayload;
pub use prompt::{build_prompt, PromptPart, PromptPlan};
pub use session::{GenerationRequest, Session, SessionPhase};
