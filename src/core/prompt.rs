use super::background::{BackgroundDescriptor, BackgroundKind};
use super::error::IdPhotoError;
use super::payload::{ImagePayload, FALLBACK_MIME_TYPE};

/// One entry of the ordered content sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    /// Base64 image data (no data-URI header) with its MIME type
    Image { mime_type: String, data: String },
    Text(String),
}

impl PromptPart {
    fn image(payload: &ImagePayload) -> Self {
        PromptPart::Image {
            mime_type: payload.mime_type().unwrap_or(FALLBACK_MIME_TYPE).to_string(),
            data: payload.base64_data().to_string(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, PromptPart::Image { .. })
    }
}

/// Instruction text plus the parts that carry it: `[subject, background?, text]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPlan {
    pub text: String,
    pub parts: Vec<PromptPart>,
}

impl PromptPlan {
    pub fn image_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_image()).count()
    }
}

const CUSTOM_INSTRUCTIONS: &str = "Use the first image as the subject (the person) and the second image as the background. \
Composite the person from the first image onto the background provided in the second image. \
The person should be centered and properly scaled so the result looks like a professional ID photo. \
Perform high-quality matting so hair strands and edges are clean. \
Do not distort the person's face.";

const CUTOUT_INSTRUCTIONS: &str = "Extract the person from the background of this portrait photo. \
Place them on a pure, solid white background (#FFFFFF) with no shadows, gradients or texture. \
Keep the edges, especially hair, extremely sharp and clean so the background is easy to remove later. \
Do not change the person's face, hair, or clothing.";

const PRESERVATION_INSTRUCTIONS: &str = "Maintain the person's edges perfectly, especially hair details. \
Do not change the person's face, hair, or clothing. \
The output must be a high-quality ID photo. \
Lighting on the person should look natural against the new background.";

/// Build the model instruction for a background choice.
///
/// Pure function: the same inputs always yield the same plan. A second image
/// part is only emitted for `custom` backgrounds, which require one.
pub fn build_prompt(
    background: &BackgroundDescriptor,
    subject: &ImagePayload,
    custom_background: Option<&ImagePayload>,
) -> Result<PromptPlan, IdPhotoError> {
    let mut parts = vec![PromptPart::image(subject)];

    let text = match background.kind {
        BackgroundKind::Custom => {
            let custom = custom_background.ok_or_else(|| {
                IdPhotoError::InvalidRequest(
                    "a custom background was selected but no background image was uploaded"
                        .to_string(),
                )
            })?;
            parts.push(PromptPart::image(custom));
            CUSTOM_INSTRUCTIONS.to_string()
        }
        // The service cannot be relied on for alpha output, so ask for a clean white cut-out
        BackgroundKind::Transparent => CUTOUT_INSTRUCTIONS.to_string(),
        BackgroundKind::Solid => format!(
            "Replace the background of this portrait photo with a solid {} color (hex: {}). {}",
            background.display_name, background.value, PRESERVATION_INSTRUCTIONS
        ),
        BackgroundKind::Template => format!(
            "Replace the background of this portrait photo with {}. {}",
            background.value, PRESERVATION_INSTRUCTIONS
        ),
    };

    parts.push(PromptPart::Text(text.clone()));
    Ok(PromptPlan { text, parts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::background::{find, list_backgrounds, BackgroundDescriptor};

    fn subject() -> ImagePayload {
        ImagePayload::from_data_uri("data:image/jpeg;base64,U1VCSkVDVA==")
    }

    fn backdrop() -> ImagePayload {
        ImagePayload::from_data_uri("data:image/png;base64,QkFDS0RST1A=")
    }

    #[test]
    fn test_catalog_entries_start_with_subject_and_end_with_text() {
        for bg in list_backgrounds() {
            // A stray custom image must not leak into non-custom prompts
            let plan = build_prompt(bg, &subject(), Some(&backdrop())).unwrap();

            assert_eq!(
                plan.parts.first(),
                Some(&PromptPart::Image {
                    mime_type: "image/jpeg".to_string(),
                    data: "U1VCSkVDVA==".to_string(),
                }),
                "{}",
                bg.id
            );
            match plan.parts.last() {
                Some(PromptPart::Text(text)) => assert!(!text.is_empty()),
                other => panic!("{} ended with {:?}", bg.id, other),
            }
            assert_eq!(plan.image_count(), 1, "{}", bg.id);
            assert_eq!(plan.parts.len(), 2);
        }
    }

    #[test]
    fn test_custom_sends_both_images_in_order() {
        let plan =
            build_prompt(&BackgroundDescriptor::custom_upload(), &subject(), Some(&backdrop())).unwrap();

        assert_eq!(plan.parts.len(), 3);
        assert!(matches!(&plan.parts[0], PromptPart::Image { data, .. } if data == "U1VCSkVDVA=="));
        assert!(matches!(
            &plan.parts[1],
            PromptPart::Image { data, mime_type } if data == "QkFDS0RST1A=" && mime_type == "image/png"
        ));
        assert_eq!(plan.parts[2], PromptPart::Text(plan.text.clone()));
        assert!(plan.text.contains("second image"));
    }

    #[test]
    fn test_custom_without_image_is_invalid() {
        let err = build_prompt(&BackgroundDescriptor::custom_upload(), &subject(), None).unwrap_err();
        assert!(matches!(err, IdPhotoError::InvalidRequest(_)));
    }

    #[test]
    fn test_solid_prompt_names_color_and_hex() {
        let blue = find("blue").unwrap();
        let plan = build_prompt(&blue, &subject(), None).unwrap();
        assert!(plan.text.contains("Standard Blue"));
        assert!(plan.text.contains("#438EDB"));
        assert!(plan.text.contains("hair"));
    }

    #[test]
    fn test_template_prompt_uses_scene_description() {
        let office = find("office").unwrap();
        let plan = build_prompt(&office, &subject(), None).unwrap();
        assert!(plan.text.contains("a blurred modern bright office background"));
    }

    #[test]
    fn test_transparent_asks_for_white_cutout() {
        let transparent = find("transparent").unwrap();
        let plan = build_prompt(&transparent, &subject(), None).unwrap();
        assert!(plan.text.contains("#FFFFFF"));
        assert!(plan.text.contains("sharp"));
    }

    #[test]
    fn test_bare_payload_defaults_to_jpeg() {
        let bare = ImagePayload::from_data_uri("U1VCSkVDVA==");
        let plan = build_prompt(&find("gray").unwrap(), &bare, None).unwrap();
        assert!(matches!(&plan.parts[0], PromptPart::Image { mime_type, .. } if mime_type == "image/jpeg"));
    }

    #[test]
    fn test_is_deterministic() {
        let red = find("red").unwrap();
        assert_eq!(
            build_prompt(&red, &subject(), None).unwrap(),
            build_prompt(&red, &subject(), None).unwrap()
        );
    }
}
