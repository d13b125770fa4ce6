use serde::{Deserialize, Serialize};

/// Fixed id of the single custom-upload descriptor
pub const CUSTOM_UPLOAD_ID: &str = "custom-upload";

/// What kind of background a descriptor asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    /// A flat color, `value` is a hex code
    Solid,
    /// A scene the model should synthesize, `value` is a description
    Template,
    /// A user-uploaded background image
    Custom,
    /// Subject cut-out (approximated with a clean white backdrop)
    Transparent,
}

impl std::fmt::Display for BackgroundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundKind::Solid => write!(f, "solid"),
            BackgroundKind::Template => write!(f, "template"),
            BackgroundKind::Custom => write!(f, "custom"),
            BackgroundKind::Transparent => write!(f, "transparent"),
        }
    }
}

/// Display group in the background picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundCategory {
    Standard,
    Creative,
}

impl BackgroundCategory {
    pub fn label(&self) -> &'static str {
        match self {
            BackgroundCategory::Standard => "Standard",
            BackgroundCategory::Creative => "Creative",
        }
    }
}

/// A selectable background
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundDescriptor {
    pub id: &'static str,
    pub kind: BackgroundKind,
    pub display_name: &'static str,
    pub value: &'static str,
    pub category: BackgroundCategory,
}

impl BackgroundDescriptor {
    const fn new(
        id: &'static str,
        kind: BackgroundKind,
        display_name: &'static str,
        value: &'static str,
        category: BackgroundCategory,
    ) -> Self {
        Self {
            id,
            kind,
            display_name,
            value,
            category,
        }
    }

    /// The placeholder descriptor shared by every custom upload
    pub fn custom_upload() -> Self {
        CUSTOM_UPLOAD.clone()
    }

    pub fn is_custom(&self) -> bool {
        self.kind == BackgroundKind::Custom
    }
}

static CATALOG: [BackgroundDescriptor; 9] = [
    // Standard solids
    BackgroundDescriptor::new("white", BackgroundKind::Solid, "White", "#FFFFFF", BackgroundCategory::Standard),
    BackgroundDescriptor::new(
        "transparent",
        BackgroundKind::Transparent,
        "Transparent / Cut-out",
        "transparent",
        BackgroundCategory::Standard,
    ),
    BackgroundDescriptor::new("blue", BackgroundKind::Solid, "Standard Blue", "#438EDB", BackgroundCategory::Standard),
    BackgroundDescriptor::new("red", BackgroundKind::Solid, "Standard Red", "#D9001B", BackgroundCategory::Standard),
    BackgroundDescriptor::new("gray", BackgroundKind::Solid, "Standard Gray", "#808080", BackgroundCategory::Standard),
    // Templates
    BackgroundDescriptor::new(
        "grad-blue",
        BackgroundKind::Template,
        "Gradient Blue",
        "a professional gradient blue studio background",
        BackgroundCategory::Creative,
    ),
    BackgroundDescriptor::new(
        "grad-gray",
        BackgroundKind::Template,
        "Gradient Gray",
        "a professional gradient gray studio background",
        BackgroundCategory::Creative,
    ),
    BackgroundDescriptor::new(
        "office",
        BackgroundKind::Template,
        "Blurred Office",
        "a blurred modern bright office background",
        BackgroundCategory::Creative,
    ),
    BackgroundDescriptor::new(
        "city",
        BackgroundKind::Template,
        "City Skyline",
        "a blurred city skyline background during daytime",
        BackgroundCategory::Creative,
    ),
];

static CUSTOM_UPLOAD: BackgroundDescriptor = BackgroundDescriptor::new(
    CUSTOM_UPLOAD_ID,
    BackgroundKind::Custom,
    "Custom Background",
    "custom",
    BackgroundCategory::Creative,
);

/// All built-in backgrounds, in display order
pub fn list_backgrounds() -> &'static [BackgroundDescriptor] {
    &CATALOG
}

/// Built-in backgrounds belonging to one display group
pub fn by_category(category: BackgroundCategory) -> impl Iterator<Item = &'static BackgroundDescriptor> {
    CATALOG.iter().filter(move |b| b.category == category)
}

/// The session default (first catalog entry, solid white)
pub fn default_background() -> BackgroundDescriptor {
    CATALOG[0].clone()
}

/// Look up a descriptor by id, including the custom-upload placeholder
pub fn find(id: &str) -> Option<BackgroundDescriptor> {
    if id == CUSTOM_UPLOAD_ID {
        return Some(BackgroundDescriptor::custom_upload());
    }
    CATALOG.iter().find(|b| b.id == id).cloned()
}

/// Ids accepted by `find`
pub fn ids() -> Vec<&'static str> {
    CATALOG
        .iter()
        .map(|b| b.id)
        .chain(std::iter::once(CUSTOM_UPLOAD_ID))
        .collect()
}
