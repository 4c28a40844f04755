//! Pure text transforms applied to outgoing copy-mode text, in order:
//! replacement rules, per-line cleaning, header/footer composition. The
//! source message is never mutated; the same input always yields the same
//! output.

use crate::steering::filter::split_word_list;
use crate::steering::types::TaskConfig;

/// Run the full pipeline for one task over the outgoing text.
pub fn transform(config: &TaskConfig, text: &str) -> String {
    let mut out = text.to_string();

    if config.replacer_enabled && !config.replacements.is_empty() {
        out = apply_replacements(&config.replacements, &out);
    }

    out = clean_text(config, &out);
    compose(config, &out)
}

/// Apply comma-separated `old->new` rules in list order over the running
/// result. Matching is literal and case-sensitive; an empty right-hand side
/// deletes all occurrences of the left-hand side.
pub fn apply_replacements(rules: &str, text: &str) -> String {
    let mut out = text.to_string();

    for rule in rules.split(',') {
        let Some((old, new)) = rule.split_once("->") else {
            continue;
        };
        let old = old.trim();
        if old.is_empty() {
            continue;
        }
        out = out.replace(old, new.trim());
    }

    out
}

/// Per-line cleaning: drop blank lines and trigger-word lines when enabled,
/// then strip link runs, hashtag tokens, and markdown emphasis characters.
pub fn clean_text(config: &TaskConfig, text: &str) -> String {
    let trigger_words: Vec<&str> = if config.clean_lines_with_words {
        split_word_list(&config.clean_words_list).collect()
    } else {
        Vec::new()
    };

    let mut kept = Vec::new();

    for line in text.split('\n') {
        if config.clean_empty_lines && line.trim().is_empty() {
            continue;
        }
        if !trigger_words.is_empty() && trigger_words.iter().any(|word| line.contains(word)) {
            continue;
        }

        let mut line = line.to_string();
        if config.clean_links {
            line = strip_link_runs(&line);
        }
        if config.clean_hashtags {
            line = strip_hashtags(&line);
        }
        if config.clean_formatting {
            line.retain(|c| !matches!(c, '*' | '_' | '`' | '~'));
        }

        kept.push(line);
    }

    kept.join("\n")
}

/// Final text is header + body + footer (each when enabled and non-empty),
/// joined with blank lines. All-empty input legally yields an empty string.
pub fn compose(config: &TaskConfig, body: &str) -> String {
    let mut parts = Vec::new();

    if config.header_enabled && !config.header_text.is_empty() {
        parts.push(config.header_text.as_str());
    }
    if !body.is_empty() {
        parts.push(body);
    }
    if config.footer_enabled && !config.footer_text.is_empty() {
        parts.push(config.footer_text.as_str());
    }

    parts.join("\n\n")
}

const LINK_PREFIXES: [&str; 4] = ["http://", "https://", "t.me/", "www."];

/// Remove every run starting with a known link prefix up to the next
/// whitespace. `t.me/` and `www.` only count at a word boundary so words
/// merely containing them survive.
fn strip_link_runs(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    // Per-char lowercase keeps the two vectors index-aligned.
    let lower_chars: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let at_boundary = i == 0 || !lower_chars[i - 1].is_alphanumeric();
        let rest: String = lower_chars[i..].iter().collect();

        let matched = LINK_PREFIXES
            .iter()
            .any(|prefix| rest.starts_with(prefix))
            && at_boundary;

        if matched {
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Remove `#hashtag` tokens: a `#` followed by an alphanumeric/underscore run.
fn strip_hashtags(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '#'
            && i + 1 < chars.len()
            && (chars[i + 1].is_alphanumeric() || chars[i + 1] == '_')
        {
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}
