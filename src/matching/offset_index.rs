//! Offset index builder
//!
//! Walks the concatenated OCR text with a single left-to-right cursor and
//! aligns every word, in page/reading order, to a `[start, end)` character
//! range. OCR words and `full_text` come from the same provider but may
//! disagree on whitespace and on individual glyphs; the three-stage walk
//! (exact, whitespace-normalized, fuzzy) tolerates that drift without ever
//! reordering or dropping a word.

use crate::domain::OcrResult;
use crate::matching::distance::levenshtein_bounded;

/// Maps one OCR word to its character position in `full_text`
///
/// `word_index` is the flat index across all pages in page/reading order.
/// Unresolved entries carry an empty range (`start == end`) at the cursor
/// position where alignment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordOffset {
    pub word_index: usize,
    /// 1-based page the word sits on
    pub page: u32,
    /// Starting character position in `full_text`
    pub start: usize,
    /// Ending character position (exclusive)
    pub end: usize,
    pub resolved: bool,
}

impl WordOffset {
    /// Check whether this word contains a character offset
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.resolved && self.start <= offset && offset < self.end
    }

    /// Check whether this word overlaps a half-open character range
    ///
    /// Unresolved entries (empty range) never overlap anything.
    pub fn overlaps_range(&self, start: usize, end: usize) -> bool {
        self.resolved && !(self.end <= start || end <= self.start)
    }
}

/// Characters skipped between words and collapsed during normalized
/// comparison: space, tab, newline, carriage return, form feed, NBSP.
fn is_space_like(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000C}' | '\u{00A0}')
}

/// Build the offset index for an OCR result
///
/// The output has exactly one entry per word, in the same page/reading
/// order, with monotonically nondecreasing starts. `fuzzy_word_threshold`
/// caps the edit distance accepted in the fuzzy stage; the effective bound
/// for a word is also capped at half the word's length.
pub fn build_offset_index(ocr: &OcrResult, fuzzy_word_threshold: usize) -> Vec<WordOffset> {
    let chars: Vec<char> = ocr.full_text.chars().collect();
    let n = chars.len();
    let mut index = Vec::with_capacity(ocr.word_count());
    let mut cursor = 0usize;
    let mut word_index = 0usize;

    for page in &ocr.pages {
        for word in &page.words {
            let word_chars: Vec<char> = word.text.chars().collect();

            // Skip whitespace-like characters at the cursor
            let mut c = cursor;
            while c < n && is_space_like(chars[c]) {
                c += 1;
            }
            cursor = c;

            let entry = align_word(&chars, c, &word_chars, fuzzy_word_threshold).map(
                |(start, end)| WordOffset {
                    word_index,
                    page: page.page_number,
                    start,
                    end,
                    resolved: true,
                },
            );

            match entry {
                Some(resolved) => {
                    cursor = resolved.end;
                    index.push(resolved);
                }
                None => {
                    tracing::debug!(
                        word = %word.text,
                        offset = c,
                        page = page.page_number,
                        "could not locate OCR word in full_text"
                    );
                    index.push(WordOffset {
                        word_index,
                        page: page.page_number,
                        start: c,
                        end: c,
                        resolved: false,
                    });
                }
            }
            word_index += 1;
        }
    }

    index
}

/// Try the three alignment stages for one word at cursor `c`.
fn align_word(
    chars: &[char],
    c: usize,
    word: &[char],
    fuzzy_word_threshold: usize,
) -> Option<(usize, usize)> {
    if word.is_empty() {
        return None;
    }
    let n = chars.len();
    let wlen = word.len();

    // Stage 1: exact match at the cursor
    if c + wlen <= n && chars[c..c + wlen] == *word {
        return Some((c, c + wlen));
    }

    // Stage 2: whitespace-normalized match, collapsing runs in both sides
    if let Some(consumed) = whitespace_normalized_match(&chars[c..], word) {
        return Some((c, c + consumed));
    }

    // Stage 3: fuzzy match within a bounded forward window
    let threshold = fuzzy_word_threshold.min(wlen / 2);
    let window = (2 * wlen).max(16);
    let mut best: Option<(usize, usize)> = None; // (distance, position)

    let last_start = (c + window).saturating_sub(wlen).min(n.saturating_sub(wlen));
    for p in c..=last_start {
        if p + wlen > n {
            break;
        }
        if let Some(distance) = levenshtein_bounded(word, &chars[p..p + wlen], threshold) {
            // Ties go to the earlier position
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, p));
                if distance == 0 {
                    break;
                }
            }
        }
    }

    best.map(|(_, p)| (p, p + wlen))
}

/// Compare `word` against the head of `text` while collapsing whitespace
/// runs in both to a single separator. Returns the number of text characters
/// consumed on success.
fn whitespace_normalized_match(text: &[char], word: &[char]) -> Option<usize> {
    let mut ti = 0usize;
    let mut wi = 0usize;

    while wi < word.len() {
        if is_space_like(word[wi]) {
            while wi < word.len() && is_space_like(word[wi]) {
                wi += 1;
            }
            if ti >= text.len() || !is_space_like(text[ti]) {
                return None;
            }
            while ti < text.len() && is_space_like(text[ti]) {
                ti += 1;
            }
        } else if ti < text.len() && text[ti] == word[wi] {
            ti += 1;
            wi += 1;
        } else {
            return None;
        }
    }

    Some(ti)
}
