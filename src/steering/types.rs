use crate::client::{LinkButton, MediaKind};
use crate::error::RegistryError;
use serde::{Deserialize, Serialize};

// ── Forward mode ─────────────────────────────────────────────────

/// `Copy` re-emits content as a new message; `Forward` preserves the
/// "forwarded from" attribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    #[default]
    Copy,
    Forward,
}

// ── Task configuration ───────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_delay() -> f64 {
    1.0
}

fn default_retries() -> u32 {
    3
}

/// Configuration of one steering pipeline. Field names match the persisted
/// task-list record format, so existing `steering_tasks.json` files load
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub task_id: String,
    pub name: String,
    pub source_chat: String,
    pub target_chat: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_delay")]
    pub forward_delay: f64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub forward_mode: ForwardMode,

    // Message type filters
    #[serde(default = "default_true")]
    pub forward_text: bool,
    #[serde(default = "default_true")]
    pub forward_photos: bool,
    #[serde(default = "default_true")]
    pub forward_videos: bool,
    #[serde(default = "default_true")]
    pub forward_music: bool,
    #[serde(default = "default_true")]
    pub forward_audio: bool,
    #[serde(default = "default_true")]
    pub forward_voice: bool,
    #[serde(default = "default_true")]
    pub forward_video_messages: bool,
    #[serde(default = "default_true")]
    pub forward_files: bool,
    #[serde(default = "default_true")]
    pub forward_links: bool,
    #[serde(default = "default_true")]
    pub forward_gifs: bool,
    #[serde(default = "default_true")]
    pub forward_contacts: bool,
    #[serde(default = "default_true")]
    pub forward_locations: bool,
    #[serde(default = "default_true")]
    pub forward_polls: bool,
    #[serde(default = "default_true")]
    pub forward_stickers: bool,
    #[serde(default = "default_true")]
    pub forward_round: bool,
    #[serde(default = "default_true")]
    pub forward_games: bool,

    // Header / footer
    #[serde(default)]
    pub header_enabled: bool,
    #[serde(default)]
    pub footer_enabled: bool,
    #[serde(default)]
    pub header_text: String,
    #[serde(default)]
    pub footer_text: String,

    // Content filtering (comma-joined word lists)
    #[serde(default)]
    pub blacklist_enabled: bool,
    #[serde(default)]
    pub whitelist_enabled: bool,
    #[serde(default)]
    pub blacklist_words: String,
    #[serde(default)]
    pub whitelist_words: String,

    // Text cleaning
    #[serde(default)]
    pub clean_links: bool,
    #[serde(default)]
    pub clean_hashtags: bool,
    #[serde(default)]
    pub clean_formatting: bool,
    #[serde(default)]
    pub clean_empty_lines: bool,
    #[serde(default)]
    pub clean_lines_with_words: bool,
    #[serde(default)]
    pub clean_words_list: String,

    // Custom inline buttons (rendered only when both text and url are set)
    #[serde(default)]
    pub buttons_enabled: bool,
    #[serde(default)]
    pub button1_text: String,
    #[serde(default)]
    pub button1_url: String,
    #[serde(default)]
    pub button2_text: String,
    #[serde(default)]
    pub button2_url: String,
    #[serde(default)]
    pub button3_text: String,
    #[serde(default)]
    pub button3_url: String,

    // Link preview on copy-mode text sends
    #[serde(default = "default_true")]
    pub link_preview: bool,

    // Text replacement (comma-joined `old->new` rules)
    #[serde(default)]
    pub replacer_enabled: bool,
    #[serde(default)]
    pub replacements: String,
}

impl TaskConfig {
    pub fn new(
        task_id: impl Into<String>,
        name: impl Into<String>,
        source_chat: impl Into<String>,
        target_chat: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            source_chat: source_chat.into(),
            target_chat: target_chat.into(),
            enabled: true,
            forward_delay: default_delay(),
            max_retries: default_retries(),
            forward_mode: ForwardMode::default(),
            forward_text: true,
            forward_photos: true,
            forward_videos: true,
            forward_music: true,
            forward_audio: true,
            forward_voice: true,
            forward_video_messages: true,
            forward_files: true,
            forward_links: true,
            forward_gifs: true,
            forward_contacts: true,
            forward_locations: true,
            forward_polls: true,
            forward_stickers: true,
            forward_round: true,
            forward_games: true,
            header_enabled: false,
            footer_enabled: false,
            header_text: String::new(),
            footer_text: String::new(),
            blacklist_enabled: false,
            whitelist_enabled: false,
            blacklist_words: String::new(),
            whitelist_words: String::new(),
            clean_links: false,
            clean_hashtags: false,
            clean_formatting: false,
            clean_empty_lines: false,
            clean_lines_with_words: false,
            clean_words_list: String::new(),
            buttons_enabled: false,
            button1_text: String::new(),
            button1_url: String::new(),
            button2_text: String::new(),
            button2_url: String::new(),
            button3_text: String::new(),
            button3_url: String::new(),
            link_preview: true,
            replacer_enabled: false,
            replacements: String::new(),
        }
    }

    /// Per-media-type flag lookup. An exhaustive match keeps the dispatch a
    /// table, not reflection.
    pub fn forwards(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Photo => self.forward_photos,
            MediaKind::Video => self.forward_videos,
            MediaKind::Gif => self.forward_gifs,
            MediaKind::Sticker => self.forward_stickers,
            MediaKind::Voice => self.forward_voice,
            MediaKind::RoundVideo => self.forward_round,
            MediaKind::Music => self.forward_music,
            MediaKind::Audio => self.forward_audio,
            MediaKind::File => self.forward_files,
            MediaKind::Contact => self.forward_contacts,
            MediaKind::Location => self.forward_locations,
            MediaKind::Poll => self.forward_polls,
            MediaKind::Game => self.forward_games,
        }
    }

    /// Inline buttons with both text and url set, at most three.
    pub fn buttons(&self) -> Vec<LinkButton> {
        if !self.buttons_enabled {
            return Vec::new();
        }

        let pairs = [
            (&self.button1_text, &self.button1_url),
            (&self.button2_text, &self.button2_url),
            (&self.button3_text, &self.button3_url),
        ];

        pairs
            .into_iter()
            .filter(|(text, url)| !text.is_empty() && !url.is_empty())
            .map(|(text, url)| LinkButton {
                text: text.clone(),
                url: url.clone(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.task_id.trim().is_empty() {
            return Err(RegistryError::InvalidConfig("task_id is empty".into()));
        }
        if self.source_chat.trim().is_empty() {
            return Err(RegistryError::InvalidConfig("source_chat is empty".into()));
        }
        if self.target_chat.trim().is_empty() {
            return Err(RegistryError::InvalidConfig("target_chat is empty".into()));
        }
        if !self.forward_delay.is_finite() || self.forward_delay < 0.0 {
            return Err(RegistryError::InvalidConfig(format!(
                "forward_delay must be a non-negative number, got {}",
                self.forward_delay
            )));
        }
        Ok(())
    }
}

// ── Task patch ───────────────────────────────────────────────────

macro_rules! apply_fields {
    ($patch:ident, $config:ident, { $($field:ident),* $(,)? }) => {
        $(
            if let Some(value) = &$patch.$field {
                $config.$field = value.clone();
            }
        )*
    };
}

/// Partial update of a task's mutable fields. `task_id` is deliberately not
/// representable here; everything else merges over the current config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub source_chat: Option<String>,
    pub target_chat: Option<String>,
    pub enabled: Option<bool>,
    pub forward_delay: Option<f64>,
    pub max_retries: Option<u32>,
    pub forward_mode: Option<ForwardMode>,
    pub forward_text: Option<bool>,
    pub forward_photos: Option<bool>,
    pub forward_videos: Option<bool>,
    pub forward_music: Option<bool>,
    pub forward_audio: Option<bool>,
    pub forward_voice: Option<bool>,
    pub forward_video_messages: Option<bool>,
    pub forward_files: Option<bool>,
    pub forward_links: Option<bool>,
    pub forward_gifs: Option<bool>,
    pub forward_contacts: Option<bool>,
    pub forward_locations: Option<bool>,
    pub forward_polls: Option<bool>,
    pub forward_stickers: Option<bool>,
    pub forward_round: Option<bool>,
    pub forward_games: Option<bool>,
    pub header_enabled: Option<bool>,
    pub footer_enabled: Option<bool>,
    pub header_text: Option<String>,
    pub footer_text: Option<String>,
    pub blacklist_enabled: Option<bool>,
    pub whitelist_enabled: Option<bool>,
    pub blacklist_words: Option<String>,
    pub whitelist_words: Option<String>,
    pub clean_links: Option<bool>,
    pub clean_hashtags: Option<bool>,
    pub clean_formatting: Option<bool>,
    pub clean_empty_lines: Option<bool>,
    pub clean_lines_with_words: Option<bool>,
    pub clean_words_list: Option<String>,
    pub buttons_enabled: Option<bool>,
    pub button1_text: Option<String>,
    pub button1_url: Option<String>,
    pub button2_text: Option<String>,
    pub button2_url: Option<String>,
    pub button3_text: Option<String>,
    pub button3_url: Option<String>,
    pub link_preview: Option<bool>,
    pub replacer_enabled: Option<bool>,
    pub replacements: Option<String>,
}

impl TaskPatch {
    /// Merge into `config`, returning whether `source_chat` changed (the one
    /// field whose change requires a restart to take routing effect).
    pub fn apply(&self, config: &mut TaskConfig) -> bool {
        let source_changed = self
            .source_chat
            .as_ref()
            .is_some_and(|s| *s != config.source_chat);

        apply_fields!(self, config, {
            name,
            source_chat,
            target_chat,
            enabled,
            forward_delay,
            max_retries,
            forward_mode,
            forward_text,
            forward_photos,
            forward_videos,
            forward_music,
            forward_audio,
            forward_voice,
            forward_video_messages,
            forward_files,
            forward_links,
            forward_gifs,
            forward_contacts,
            forward_locations,
            forward_polls,
            forward_stickers,
            forward_round,
            forward_games,
            header_enabled,
            footer_enabled,
            header_text,
            footer_text,
            blacklist_enabled,
            whitelist_enabled,
            blacklist_words,
            whitelist_words,
            clean_links,
            clean_hashtags,
            clean_formatting,
            clean_empty_lines,
            clean_lines_with_words,
            clean_words_list,
            buttons_enabled,
            button1_text,
            button1_url,
            button2_text,
            button2_url,
            button3_text,
            button3_url,
            link_preview,
            replacer_enabled,
            replacements,
        });

        source_changed
    }
}
