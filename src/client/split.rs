//! Splits outbound copy-mode text that exceeds the protocol's message-length
//! ceiling. Paragraphs are packed greedily into pieces; an oversized
//! paragraph is broken at line breaks, and an unbreakable run (a long URL,
//! say) is hard-split by characters.

/// Split `text` into pieces of at most `max_chars` characters each,
/// preserving the text byte-for-byte across the concatenation of the pieces.
#[must_use]
pub fn split_outbound(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut packer = Packer::new(max_chars);
    for paragraph in segments(text, "\n\n") {
        if paragraph.chars().count() <= max_chars {
            packer.push(paragraph);
            continue;
        }
        for line in segments(paragraph, "\n") {
            if line.chars().count() <= max_chars {
                packer.push(line);
            } else {
                packer.push_chars(line);
            }
        }
    }
    packer.finish()
}

/// Accumulates segments into pieces no longer than `max_chars`. A segment
/// that does not fit the current piece starts the next one; the caller
/// guarantees each pushed segment fits a piece on its own.
struct Packer {
    max_chars: usize,
    pieces: Vec<String>,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            pieces: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    fn push(&mut self, segment: &str) {
        let len = segment.chars().count();
        if self.current_len > 0 && self.current_len + len > self.max_chars {
            self.flush();
        }
        self.current.push_str(segment);
        self.current_len += len;
    }

    fn push_chars(&mut self, run: &str) {
        for ch in run.chars() {
            if self.current_len == self.max_chars {
                self.flush();
            }
            self.current.push(ch);
            self.current_len += 1;
        }
    }

    fn flush(&mut self) {
        if self.current_len > 0 {
            self.pieces.push(std::mem::take(&mut self.current));
            self.current_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.pieces
    }
}

/// Iterate over `text` split at `delimiter`, each segment keeping its
/// trailing delimiter so concatenation reproduces the input.
fn segments<'a>(text: &'a str, delimiter: &'a str) -> impl Iterator<Item = &'a str> {
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= text.len() {
            return None;
        }
        let segment = match text[start..].find(delimiter) {
            Some(pos) => &text[start..start + pos + delimiter.len()],
            None => &text[start..],
        };
        start += segment.len();
        Some(segment)
    })
}

#[cfg(test)]
mod tests {
    use super::split_outbound;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(split_outbound("hello", 10), vec!["hello"]);
        assert!(split_outbound("", 10).is_empty());
    }

    #[test]
    fn long_unbreakable_run_is_hard_split() {
        let text = "https://example.com/path".repeat(12);
        let pieces = split_outbound(&text, 40);
        assert!(pieces.iter().all(|p| p.chars().count() <= 40));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "first paragraph\n\nsecond paragraph";
        let pieces = split_outbound(text, 20);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], "first paragraph\n\n");
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn oversized_paragraph_breaks_at_lines() {
        let text = "one line\ntwo line\nthree line";
        let pieces = split_outbound(text, 20);
        assert!(pieces.iter().all(|p| p.chars().count() <= 20));
        // Pieces end on line breaks, not mid-line.
        assert!(pieces[0].ends_with('\n'));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn short_paragraphs_pack_into_one_piece() {
        let text = "aa\n\nbb\n\ncc\n\ndd";
        let pieces = split_outbound(text, 9);
        assert!(pieces.len() < 4);
        assert!(pieces.iter().all(|p| p.chars().count() <= 9));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn multibyte_counted_by_characters() {
        let text = "مرحبا بكم في القناة";
        let pieces = split_outbound(text, 5);
        assert!(pieces.iter().all(|p| p.chars().count() <= 5));
        assert_eq!(pieces.concat(), text);
    }
}
