use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of named sections a case study is built from, in page
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Hero,
    Overview,
    Problem,
    Approach,
    Results,
    Gallery,
}

impl SectionKey {
    /// Every key, in page order.
    pub const ALL: [SectionKey; 6] = [
        SectionKey::Hero,
        SectionKey::Overview,
        SectionKey::Problem,
        SectionKey::Approach,
        SectionKey::Results,
        SectionKey::Gallery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Hero => "hero",
            SectionKey::Overview => "overview",
            SectionKey::Problem => "problem",
            SectionKey::Approach => "approach",
            SectionKey::Results => "results",
            SectionKey::Gallery => "gallery",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = UnknownSectionKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hero" => Ok(SectionKey::Hero),
            "overview" => Ok(SectionKey::Overview),
            "problem" => Ok(SectionKey::Problem),
            "approach" => Ok(SectionKey::Approach),
            "results" => Ok(SectionKey::Results),
            "gallery" => Ok(SectionKey::Gallery),
            other => Err(UnknownSectionKey(other.to_string())),
        }
    }
}

/// Error returned when a section name is not one of the known keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSectionKey(pub String);

impl fmt::Display for UnknownSectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown section key: {}", self.0)
    }
}

impl std::error::Error for UnknownSectionKey {}

/// One content section of a case study.
///
/// Disabling a section hides it from rendered output; the data stays.
/// Re-enabling brings the old content back untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub enabled: bool,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub media: Vec<String>,
}

impl Section {
    /// An enabled section with no content yet.
    pub fn enabled() -> Self {
        Section {
            enabled: true,
            ..Section::default()
        }
    }

    /// A disabled section with no content.
    pub fn disabled() -> Self {
        Section::default()
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_media(mut self, media: Vec<String>) -> Self {
        self.media = media;
        self
    }

    /// Same content, flipped visibility.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
