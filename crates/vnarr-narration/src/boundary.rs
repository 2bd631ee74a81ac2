//! Boundary policies for splitting one text span.
//!
//! Both policies work on `char` slices so CJK text is measured per
//! character, not per byte.

use serde::{Deserialize, Serialize};

/// Characters that end a sentence.
pub const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// Characters that end a clause.
pub const CLAUSE_SEPARATORS: &[char] = &['，', ',', '；', ';'];

pub fn is_sentence_end(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

pub fn is_clause_end(c: char) -> bool {
    CLAUSE_SEPARATORS.contains(&c)
}

/// CJK ideographs, kana and hangul. Each one is a boundary on its own.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF      // hiragana, katakana
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xAC00..=0xD7AF    // hangul syllables
        | 0xF900..=0xFAFF    // CJK compatibility ideographs
        | 0x20000..=0x2FA1F  // supplementary ideographs
    )
}

/// Part of a Latin word run that must not be split.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() && !is_cjk(c)
}

/// Cutting between `chars[at - 1]` and `chars[at]` keeps words intact.
pub fn is_safe_cut(chars: &[char], at: usize) -> bool {
    if at == 0 || at >= chars.len() {
        return true;
    }
    !(is_word_char(chars[at - 1]) && is_word_char(chars[at]))
}

/// How a span longer than `max_chars` is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Scan a `[min_chars, max_chars]` window for the best cut, preferring
    /// sentence ends, then clause ends, then any word-safe position.
    #[default]
    Windowed,
    /// Split the whole span at sentence ends, else clause ends, else into
    /// fixed `max_chars` chunks. Pieces are not length-balanced.
    Sentence,
}

impl BoundaryPolicy {
    /// Split `chars` into pieces. Pieces are trimmed and never empty.
    pub fn split(&self, chars: &[char], max_chars: usize, min_chars: usize) -> Vec<String> {
        let max_chars = max_chars.max(1);
        if chars.len() <= max_chars {
            return collect_piece(chars).into_iter().collect();
        }
        match self {
            BoundaryPolicy::Windowed => split_windowed(chars, max_chars, min_chars.min(max_chars)),
            BoundaryPolicy::Sentence => split_sentences(chars, max_chars),
        }
    }
}

fn collect_piece(chars: &[char]) -> Option<String> {
    let piece: String = chars.iter().collect();
    let trimmed = piece.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

/// Best cut position in `[start + min, start + max]`, falling back to a forced cut at `start + max`.
///
/// `chars[start]` is never whitespace and every accepted cut follows a
/// non-whitespace char, so the trimmed piece is at least `min_chars` long.
fn find_cut(chars: &[char], start: usize, max_chars: usize, min_chars: usize) -> usize {
    let lo = start + min_chars.max(1);
    let hi = start + max_chars;
    let window = || (lo..=hi).rev();

    window()
        .find(|&at| is_sentence_end(chars[at - 1]))
        .or_else(|| window().find(|&at| is_clause_end(chars[at - 1])))
        .or_else(|| {
            window().find(|&at| !chars[at - 1].is_whitespace() && is_safe_cut(chars, at))
        })
        .unwrap_or(hi)
}

fn split_windowed(chars: &[char], max_chars: usize, min_chars: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut last_start = 0;
    let mut pos = skip_whitespace(chars, 0);

    while chars.len() - pos > max_chars {
        let cut = find_cut(chars, pos, max_chars, min_chars);
        if let Some(piece) = collect_piece(&chars[pos..cut]) {
            pieces.push(piece);
            last_start = pos;
        }
        pos = skip_whitespace(chars, cut);
    }

    let tail = &chars[pos..];
    let tail_len = tail.iter().filter(|c| !c.is_whitespace()).count();
    if tail_len == 0 {
        return pieces;
    }

    if tail_len < min_chars && !pieces.is_empty() {
        // Short tail joins the piece it follows.
        pieces.pop();
        pieces.extend(collect_piece(&chars[last_start..]));
    } else {
        pieces.extend(collect_piece(tail));
    }
    pieces
}

fn split_after(chars: &[char], is_boundary: fn(char) -> bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, &c) in chars.iter().enumerate() {
        if is_boundary(c) {
            pieces.extend(collect_piece(&chars[start..=i]));
            start = i + 1;
        }
    }
    pieces.extend(collect_piece(&chars[start..]));
    pieces
}

fn split_sentences(chars: &[char], max_chars: usize) -> Vec<String> {
    let sentences = split_after(chars, is_sentence_end);
    if sentences.len() > 1 {
        return sentences;
    }
    let clauses = split_after(chars, is_clause_end);
    if clauses.len() > 1 {
        return clauses;
    }
    chars.chunks(max_chars).filter_map(collect_piece).collect()
}
