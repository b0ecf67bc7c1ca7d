use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::{Error, Result};

use super::Note;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;
const FOOTER_Y: f32 = 17.0;

const TITLE_SIZE: f32 = 20.0;
const DESCRIPTION_SIZE: f32 = 14.0;
const CONTENT_SIZE: f32 = 12.0;
const FOOTER_SIZE: f32 = 10.0;

/// Helvetica averages about half an em per glyph.
fn chars_per_line(font_size: f32) -> usize {
    let glyph_mm = font_size * 0.5 * 25.4 / 72.0;
    ((PAGE_WIDTH - 2.0 * MARGIN) / glyph_mm) as usize
}

/// Greedy word wrap. Words longer than a line are split.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();

            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }

    lines
}

struct Fonts {
    bold: IndirectFontRef,
    regular: IndirectFontRef,
    italic: IndirectFontRef,
}

struct Writer<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    /// Distance from the top of the page.
    y: f32,
}

impl Writer<'_> {
    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "notes");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = MARGIN;
    }

    fn text(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        if self.y + LINE_HEIGHT > PAGE_HEIGHT - MARGIN {
            self.new_page();
        }
        self.layer.use_text(text, size, Mm(MARGIN), Mm(PAGE_HEIGHT - self.y), font);
        self.y += LINE_HEIGHT;
    }

    fn footer(&self, text: &str, font: &IndirectFontRef) {
        self.layer.use_text(text, FOOTER_SIZE, Mm(MARGIN), Mm(FOOTER_Y), font);
    }

    fn note(&mut self, note: &Note, fonts: &Fonts) {
        for line in wrap(&note.title, chars_per_line(TITLE_SIZE)) {
            self.text(&line, TITLE_SIZE, &fonts.bold);
        }
        self.y += LINE_HEIGHT / 2.0;

        if let Some(description) = note.description.as_deref().filter(|d| !d.is_empty()) {
            for line in wrap(description, chars_per_line(DESCRIPTION_SIZE)) {
                self.text(&line, DESCRIPTION_SIZE, &fonts.regular);
            }
            self.y += LINE_HEIGHT / 2.0;
        }

        if let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) {
            for line in wrap(content, chars_per_line(CONTENT_SIZE)) {
                self.text(&line, CONTENT_SIZE, &fonts.regular);
            }
        }

        let last_updated = note.updated_at.unwrap_or(note.created_at);
        self.footer(&format!("Last updated: {}", last_updated.format("%Y-%m-%d")), &fonts.italic);
    }
}

/// Lays out each note from the top of a fresh page: title, description,
/// wrapped content and a "Last updated" footer.
pub fn render(notes: &[Note]) -> Result<Vec<u8>> {
    let title = match notes {
        [note] => note.title.clone(),
        _ => "Notes".to_string(),
    };
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "notes");

    let font = |font| doc.add_builtin_font(font).map_err(|e| Error::Unexpected(e.to_string()));
    let fonts = Fonts {
        bold: font(BuiltinFont::HelveticaBold)?,
        regular: font(BuiltinFont::Helvetica)?,
        italic: font(BuiltinFont::HelveticaOblique)?,
    };

    let mut writer = Writer {
        layer: doc.get_page(page).get_layer(layer),
        doc: &doc,
        y: MARGIN,
    };
    for (index, note) in notes.iter().enumerate() {
        if index > 0 {
            writer.new_page();
        }
        writer.note(note, &fonts);
    }

    doc.save_to_bytes().map_err(|e| Error::Unexpected(e.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn wrapping_keeps_words_together() {
        assert_eq!(wrap("one two three four", 9), vec!["one two", "three", "four"]);
        assert_eq!(wrap("first\n\nsecond", 20), vec!["first", "", "second"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn renders_a_pdf_document() {
        let note = Note {
            id: Uuid::now_v7(),
            user_id: None,
            organization_slug: "acme".into(),
            title: "Quarterly plan".into(),
            description: Some("Goals".into()),
            content: Some("word ".repeat(2_000)),
            is_public: false,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            updated_at: None,
        };

        let bytes = render(&[note.clone(), note]).unwrap();

        assert!(bytes.starts_with(b"%PDF"));
    }
}
