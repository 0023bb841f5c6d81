//! Closed enumerations and the batch request shared by every component.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

fn parse_named<T: Copy>(
    kind: &'static str,
    value: &str,
    all: &[T],
    name: impl Fn(&T) -> &'static str,
) -> Result<T, ParseEnumError> {
    let wanted = value.trim();
    all.iter()
        .copied()
        .find(|v| name(v).eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ParseEnumError {
            kind,
            value: value.to_string(),
            expected: all.iter().map(|v| name(v)).collect::<Vec<_>>().join(", "),
        })
}

/// A publishing target. The set is closed; the result table holds exactly one
/// slot per variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Surface {
    LinkedIn,
    Twitter,
    Instagram,
    Threads,
}

impl Surface {
    pub const ALL: [Surface; 4] = [
        Surface::LinkedIn,
        Surface::Twitter,
        Surface::Instagram,
        Surface::Threads,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::LinkedIn => "LinkedIn",
            Surface::Twitter => "Twitter",
            Surface::Instagram => "Instagram",
            Surface::Threads => "Threads",
        }
    }

    /// Slot position in fixed-size per-surface tables.
    pub fn index(&self) -> usize {
        match self {
            Surface::LinkedIn => 0,
            Surface::Twitter => 1,
            Surface::Instagram => 2,
            Surface::Threads => 3,
        }
    }

    /// Aspect ratio the image provider must honor for this surface.
    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            Surface::LinkedIn | Surface::Twitter => "16:9",
            Surface::Instagram => "1:1",
            Surface::Threads => "3:4",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("surface", s, &Self::ALL, Surface::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tone {
    Professional,
    Witty,
    Urgent,
    Inspirational,
    Casual,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Professional,
        Tone::Witty,
        Tone::Urgent,
        Tone::Inspirational,
        Tone::Casual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "Professional",
            Tone::Witty => "Witty",
            Tone::Urgent => "Urgent",
            Tone::Inspirational => "Inspirational",
            Tone::Casual => "Casual",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("tone", s, &Self::ALL, Tone::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Portuguese,
    Japanese,
    Hindi,
    Chinese,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Portuguese,
        Language::Japanese,
        Language::Hindi,
        Language::Chinese,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Portuguese => "Portuguese",
            Language::Japanese => "Japanese",
            Language::Hindi => "Hindi",
            Language::Chinese => "Chinese",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("language", s, &Self::ALL, Language::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelTier {
    #[serde(rename = "flash-2.5")]
    Flash25,
    #[serde(rename = "pro-2.5")]
    Pro25,
    #[serde(rename = "pro-3.0")]
    Pro30,
}

impl ModelTier {
    pub const ALL: [ModelTier; 3] = [ModelTier::Flash25, ModelTier::Pro25, ModelTier::Pro30];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Flash25 => "flash-2.5",
            ModelTier::Pro25 => "pro-2.5",
            ModelTier::Pro30 => "pro-3.0",
        }
    }

    pub fn text_model(&self) -> &'static str {
        match self {
            ModelTier::Flash25 => "gemini-2.5-flash",
            ModelTier::Pro25 => "gemini-2.5-pro-preview-09-2025",
            ModelTier::Pro30 => "gemini-3-pro-preview",
        }
    }

    pub fn image_model(&self) -> &'static str {
        match self {
            ModelTier::Flash25 => "gemini-2.5-flash-image",
            ModelTier::Pro25 | ModelTier::Pro30 => "gemini-3-pro-image-preview",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("model tier", s, &Self::ALL, ModelTier::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RefinementAction {
    Shorten,
    Expand,
    Funnier,
    Rewrite,
}

impl RefinementAction {
    pub const ALL: [RefinementAction; 4] = [
        RefinementAction::Shorten,
        RefinementAction::Expand,
        RefinementAction::Funnier,
        RefinementAction::Rewrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementAction::Shorten => "shorten",
            RefinementAction::Expand => "expand",
            RefinementAction::Funnier => "funnier",
            RefinementAction::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for RefinementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RefinementAction {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_named("refinement action", s, &Self::ALL, RefinementAction::as_str)
    }
}

/// Settings a batch hands down to every pipeline it starts, and that later
/// refinements of the same output reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub tone: Tone,
    pub language: Language,
    pub model_tier: ModelTier,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tone: Tone::Professional,
            language: Language::English,
            model_tier: ModelTier::Flash25,
        }
    }
}

/// One user submission spanning one or more surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub topic: String,
    pub tone: Tone,
    pub language: Language,
    /// Free text; empty means no keyword constraint.
    pub keywords: String,
    /// Free text; empty means no brand-voice constraint.
    pub brand_voice: String,
    pub thread_mode: bool,
    pub model_tier: ModelTier,
    pub generate_images: bool,
    pub surfaces: BTreeSet<Surface>,
}

impl BatchRequest {
    pub fn new(topic: impl Into<String>, surfaces: impl IntoIterator<Item = Surface>) -> Self {
        let defaults = GenerationSettings::default();
        Self {
            topic: topic.into(),
            tone: defaults.tone,
            language: defaults.language,
            keywords: String::new(),
            brand_voice: String::new(),
            thread_mode: false,
            model_tier: defaults.model_tier,
            generate_images: true,
            surfaces: surfaces.into_iter().collect(),
        }
    }

    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            tone: self.tone,
            language: self.language,
            model_tier: self.model_tier,
        }
    }
}
