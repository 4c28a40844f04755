use crate::client::{InboundMessage, MediaKind};
use crate::steering::types::TaskConfig;
use std::fmt;

/// Outcome of the filter pipeline. A rejected message is simply not
/// forwarded; it is never counted as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Pass,
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A blacklist word occurred in the text (the word is carried for logs).
    Blacklist(String),
    /// Whitelist enabled and no whitelist word occurred.
    Whitelist,
    /// The message's media kind is switched off for this task.
    Media(MediaKind),
    /// Plain text forwarding is switched off.
    PlainText,
    /// The text carries a link and link forwarding is switched off.
    Link,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blacklist(word) => write!(f, "blacklist word '{word}'"),
            Self::Whitelist => write!(f, "no whitelist word present"),
            Self::Media(kind) => write!(f, "media kind {kind:?} disabled"),
            Self::PlainText => write!(f, "plain text disabled"),
            Self::Link => write!(f, "links disabled"),
        }
    }
}

/// Split a comma-joined word list into trimmed, non-empty entries.
pub(crate) fn split_word_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|w| !w.is_empty())
}

/// Case-insensitive link detection over the URL patterns the protocol
/// produces: schemes, bare `www.` hosts, and protocol share links.
pub(crate) fn contains_link(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["http://", "https://", "www.", "t.me/"]
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Ordered, short-circuiting predicate chain: content filter, media-type
/// filter, link gate. Blacklist takes precedence over whitelist.
pub fn evaluate(config: &TaskConfig, message: &InboundMessage) -> FilterVerdict {
    let text = message.text.as_str();

    if !text.is_empty() {
        let lower = text.to_lowercase();

        if config.blacklist_enabled
            && let Some(word) = split_word_list(&config.blacklist_words)
                .find(|word| lower.contains(&word.to_lowercase()))
        {
            return FilterVerdict::Reject(RejectReason::Blacklist(word.to_string()));
        }

        if config.whitelist_enabled {
            let mut words = split_word_list(&config.whitelist_words).peekable();
            if words.peek().is_some()
                && !words.any(|word| lower.contains(&word.to_lowercase()))
            {
                return FilterVerdict::Reject(RejectReason::Whitelist);
            }
        }
    }

    match message.media {
        Some(kind) => {
            if !config.forwards(kind) {
                return FilterVerdict::Reject(RejectReason::Media(kind));
            }
        }
        None => {
            if !config.forward_text {
                return FilterVerdict::Reject(RejectReason::PlainText);
            }
        }
    }

    // Link gate applies on top of the per-kind flag, independent of it.
    if !config.forward_links && contains_link(text) {
        return FilterVerdict::Reject(RejectReason::Link);
    }

    FilterVerdict::Pass
}
