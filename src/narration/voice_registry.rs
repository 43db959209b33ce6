use super::interface::VoiceProfile;
use super::source::ContentLanguage;

/// Ordered view over the voices a speech engine offers.
///
/// Keeps platform order (first registration wins on duplicate ids) so the
/// voice selector stays stable between renders.
#[derive(Debug, Clone, Default)]
pub struct VoiceRegistry {
    voices: Vec<VoiceProfile>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: Vec<VoiceProfile>) -> Self {
        let mut registry = Self::new();
        registry.register_all(profiles);
        registry
    }

    /// Register a voice profile. Ignored if the voice_id is already known.
    pub fn register(&mut self, profile: VoiceProfile) {
        if self.get(&profile.voice_id).is_none() {
            self.voices.push(profile);
        }
    }

    pub fn register_all(&mut self, profiles: Vec<VoiceProfile>) {
        for profile in profiles {
            self.register(profile);
        }
    }

    pub fn get(&self, voice_id: &str) -> Option<&VoiceProfile> {
        self.voices.iter().find(|v| v.voice_id == voice_id)
    }

    pub fn contains(&self, voice_id: &str) -> bool {
        self.get(voice_id).is_some()
    }

    pub fn list(&self) -> &[VoiceProfile] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Find voices by primary language code (e.g., "en", "fa").
    pub fn find_by_language(&self, lang: &str) -> Vec<&VoiceProfile> {
        self.voices
            .iter()
            .filter(|v| v.primary_language() == lang)
            .collect()
    }

    /// Voices suitable for narrating `language` content: those speaking the
    /// content language or English, in platform order, capped at `limit`.
    pub fn candidates_for(&self, language: ContentLanguage, limit: usize) -> Vec<&VoiceProfile> {
        self.voices
            .iter()
            .filter(|v| {
                let primary = v.primary_language();
                primary == language.code() || primary == "en"
            })
            .take(limit)
            .collect()
    }

    /// Resolve a requested voice against what the platform offers right now.
    /// Unknown or vanished voices fall back to the platform default (`None`).
    pub fn resolve(&self, requested: Option<&str>) -> Option<String> {
        let id = requested?;
        if self.contains(id) {
            Some(id.to_string())
        } else {
            tracing::debug!(voice_id = id, "selected voice unavailable, using platform default");
            None
        }
    }
}
