//! Mock OCR provider for offline runs and tests
//!
//! Lays out a configurable text on synthetic pages with word-level bounding
//! boxes, optionally corrupting characters the way scanners do (`S -> 5`,
//! `O -> 0`, ...). Corruption only touches the word geometry side, never
//! `full_text`, which exercises the matcher's fuzzy recovery.

use crate::document::DocumentFormat;
use crate::domain::{BoundingBox, OcrPage, OcrResult, OcrWord, Result};
use crate::providers::OcrProvider;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LINE_HEIGHT: f64 = 30.0;
const WORD_HEIGHT: f64 = 20.0;
const CHAR_WIDTH: f64 = 12.0;
const WORD_GAP: f64 = 10.0;
const MARGIN_X: f64 = 100.0;
const MARGIN_Y: f64 = 200.0;

/// Deterministic OCR provider backed by a fixed text
pub struct MockOcrProvider {
    text: String,
    page_width: f64,
    page_height: f64,
    max_lines_per_page: usize,
    error_rate: f64,
    seed: u64,
}

impl MockOcrProvider {
    pub fn new() -> Self {
        Self {
            text: sample_medical_record().to_string(),
            page_width: 2550.0,
            page_height: 3300.0,
            max_lines_per_page: 15,
            error_rate: 0.0,
            seed: 0,
        }
    }

    /// Replace the built-in sample text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Probability in `[0, 1]` of corrupting a word
    pub fn with_error_rate(mut self, error_rate: f64, seed: u64) -> Self {
        self.error_rate = error_rate.clamp(0.0, 1.0);
        self.seed = seed;
        self
    }

    pub fn with_page_size(mut self, width: f64, height: f64) -> Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    fn generate_page(&self, page_number: u32, text: &str, rng: &mut StdRng) -> OcrPage {
        let mut words = Vec::new();
        let mut y = MARGIN_Y;

        for line in text.split('\n') {
            let mut x = MARGIN_X;
            for token in line.split_whitespace() {
                let ocr_text = self.maybe_corrupt(token, rng);
                let width = ocr_text.chars().count() as f64 * CHAR_WIDTH;
                let confidence = if ocr_text == token { 0.99 } else { 0.85 };
                words.push(OcrWord::new(
                    ocr_text,
                    confidence,
                    BoundingBox::pixel(page_number, x, y, width, WORD_HEIGHT),
                ));
                x += width + WORD_GAP;
            }
            y += LINE_HEIGHT;
        }

        OcrPage {
            page_number,
            width: self.page_width,
            height: self.page_height,
            words,
        }
    }

    /// Common scanner misreads, applied to one random character
    fn maybe_corrupt(&self, word: &str, rng: &mut StdRng) -> String {
        if word.chars().count() < 3 || rng.gen::<f64>() > self.error_rate {
            return word.to_string();
        }

        let substitute = |c: char| match c {
            'S' | 's' => Some('5'),
            'O' | 'o' => Some('0'),
            'I' => Some('1'),
            'i' => Some('l'),
            'G' | 'g' => Some('6'),
            _ => None,
        };

        let mut chars: Vec<char> = word.chars().collect();
        let pos = rng.gen_range(0..chars.len());
        if let Some(replacement) = substitute(chars[pos]) {
            chars[pos] = replacement;
        }
        chars.into_iter().collect()
    }
}

impl Default for MockOcrProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrProvider for MockOcrProvider {
    async fn analyze(
        &self,
        _document_bytes: &[u8],
        _format: DocumentFormat,
        _language: Option<&str>,
    ) -> Result<OcrResult> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let lines: Vec<&str> = self.text.split('\n').collect();
        let page_texts: Vec<String> = lines
            .chunks(self.max_lines_per_page)
            .map(|chunk| chunk.join("\n"))
            .collect();

        let pages = page_texts
            .iter()
            .enumerate()
            .map(|(i, text)| self.generate_page(i as u32 + 1, text, &mut rng))
            .collect();

        Ok(OcrResult {
            pages,
            full_text: page_texts.join("\n"),
        })
    }
}

/// Sample medical record with representative PHI, used when no text is
/// supplied
pub fn sample_medical_record() -> &'static str {
    "Patient: Samuel Grummons\n\
     DOB: 03/15/1985\n\
     MRN: 12345678\n\
     \n\
     Chief Complaint: Follow-up for routine consultation\n\
     \n\
     History of Present Illness:\n\
     Mr. Grummons is a 38-year-old male who presents today for follow-up\n\
     regarding his procedure performed on 06/22/2023. He reports\n\
     no complications and is doing well.\n\
     \n\
     Social History:\n\
     Patient works as a software engineer at TechCorp Inc. He lives at\n\
     123 Main Street, Boston, MA 02101. Contact phone: (617) 555-1234.\n\
     Email: samuel.grummons@email.com\n\
     \n\
     Insurance: Member ID: ABC123456789\n\
     \n\
     Attending Physician: Dr. Sarah Johnson, MD\n\
     Date of Service: 09/30/2023"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_words_align_with_full_text() {
        let provider = MockOcrProvider::new().with_text("John Smith\nDOB: 03/15/1985");
        let result = provider.analyze(&[], DocumentFormat::Tiff, None).await.unwrap();

        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.word_count(), 4);
        assert_eq!(result.full_text, "John Smith\nDOB: 03/15/1985");

        // Every word occurs in full_text in reading order
        let mut cursor = 0;
        for word in result.words() {
            let found = result.full_text[cursor..]
                .find(&word.text)
                .expect("word missing from full_text");
            cursor += found + word.text.len();
        }
    }

    #[tokio::test]
    async fn test_pagination() {
        let text = (0..40).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let provider = MockOcrProvider::new().with_text(text);
        let result = provider.analyze(&[], DocumentFormat::Tiff, None).await.unwrap();
        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.pages[0].page_number, 1);
        assert_eq!(result.pages[2].words.len(), 10);
    }

    #[tokio::test]
    async fn test_corruption_is_seeded_and_leaves_full_text_clean() {
        let provider = MockOcrProvider::new()
            .with_text("Samuel Grummons Samuel Grummons Samuel Grummons")
            .with_error_rate(1.0, 42);
        let a = provider.analyze(&[], DocumentFormat::Tiff, None).await.unwrap();
        let b = provider.analyze(&[], DocumentFormat::Tiff, None).await.unwrap();

        assert_eq!(a.full_text, "Samuel Grummons Samuel Grummons Samuel Grummons");
        let texts_a: Vec<_> = a.words().map(|w| w.text.clone()).collect();
        let texts_b: Vec<_> = b.words().map(|w| w.text.clone()).collect();
        assert_eq!(texts_a, texts_b);
    }

    #[tokio::test]
    async fn test_boxes_are_valid_pixel_space() {
        let provider = MockOcrProvider::new();
        let result = provider.analyze(&[], DocumentFormat::Tiff, None).await.unwrap();
        for word in result.words() {
            word.bounds.validate().unwrap();
        }
    }
}
