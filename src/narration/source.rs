//! Narration input: the plain text of one content item plus the language used
//! to pick transport strings and default voice filtering.

use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Languages the surrounding site is published in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentLanguage {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "ar")]
    Ar,
    #[serde(rename = "fa")]
    Fa,
}

impl ContentLanguage {
    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            ContentLanguage::En => "en",
            ContentLanguage::Ar => "ar",
            ContentLanguage::Fa => "fa",
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, ContentLanguage::Ar | ContentLanguage::Fa)
    }

    fn from_lingua(language: Language) -> Self {
        match language {
            Language::Arabic => ContentLanguage::Ar,
            Language::Persian => ContentLanguage::Fa,
            _ => ContentLanguage::En,
        }
    }
}

impl std::fmt::Display for ContentLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

fn detector() -> &'static LanguageDetector {
    static DETECTOR: OnceLock<LanguageDetector> = OnceLock::new();
    DETECTOR.get_or_init(|| {
        LanguageDetectorBuilder::from_languages(&[
            Language::English,
            Language::Arabic,
            Language::Persian,
        ])
        .build()
    })
}

/// Detect the content language. Falls back to English when undecided.
pub fn detect_language(text: &str) -> ContentLanguage {
    match detector().detect_language_of(text) {
        Some(language) => ContentLanguage::from_lingua(language),
        None => {
            tracing::debug!("could not detect content language, falling back to English");
            ContentLanguage::En
        }
    }
}

fn whitespace_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Strip markup from an HTML fragment and collapse whitespace.
pub fn extract_text_from_html(html: &str) -> String {
    let plain = html2text::from_read_with_decorator(
        html.as_bytes(),
        usize::MAX,
        html2text::render::text_renderer::TrivialDecorator::new(),
    );
    whitespace_run().replace_all(&plain, " ").trim().to_string()
}

// ── Narration Source ───────────────────────────────────

/// Immutable input of one narration session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationSource {
    /// Scopes persisted preferences.
    pub content_id: String,
    pub text: String,
    pub language: ContentLanguage,
}

impl NarrationSource {
    /// Plain text input; the language is detected from the text.
    pub fn from_text(content_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let language = if text.trim().is_empty() {
            ContentLanguage::default()
        } else {
            detect_language(&text)
        };
        Self {
            content_id: content_id.into(),
            text,
            language,
        }
    }

    pub fn from_html(content_id: impl Into<String>, html: &str) -> Self {
        Self::from_text(content_id, extract_text_from_html(html))
    }

    pub fn with_language(mut self, language: ContentLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
