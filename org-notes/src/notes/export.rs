use std::fmt::Write as _;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::{pdf, Note};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
    Pdf,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

pub fn render(notes: &[Note], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(notes).map_err(|e| Error::App(e.into())),
        ExportFormat::Markdown => Ok(render_markdown(notes).into_bytes()),
        ExportFormat::Pdf => pdf::render(notes),
    }
}

fn render_markdown(notes: &[Note]) -> String {
    let mut output = String::new();

    for (index, note) in notes.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let _ = writeln!(output, "# {}", note.title);
        let _ = writeln!(output);
        if let Some(description) = note.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(output, "> {description}");
            let _ = writeln!(output);
        }
        if let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) {
            let _ = writeln!(output, "{content}");
            let _ = writeln!(output);
        }
        let _ = writeln!(output, "Created: {}", note.created_at.to_rfc3339());
        if let Some(updated_at) = note.updated_at {
            let _ = writeln!(output, "Last updated: {}", updated_at.to_rfc3339());
        }
    }

    output
}

/// A single note is named after its title, anything else after the export time.
pub fn file_name(notes: &[Note], format: ExportFormat, now: chrono::DateTime<chrono::Utc>) -> String {
    let stem = match notes {
        [note] => note
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect(),
        _ => format!("notes-export-{}", now.timestamp_millis()),
    };

    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn note(title: &str, description: Option<&str>) -> Note {
        Note {
            id: Uuid::now_v7(),
            user_id: None,
            organization_slug: "acme".into(),
            title: title.into(),
            description: description.map(Into::into),
            content: Some("Body text".into()),
            is_public: false,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn markdown_has_title_description_and_dates() {
        let rendered = render(&[note("Groceries", Some("weekly"))], ExportFormat::Markdown).unwrap();
        let rendered = String::from_utf8(rendered).unwrap();

        assert!(rendered.starts_with("# Groceries\n"));
        assert!(rendered.contains("> weekly"));
        assert!(rendered.contains("Body text"));
        assert!(rendered.contains("Created: 2024-05-01T12:00:00+00:00"));
        assert!(!rendered.contains("Last updated"));
    }

    #[test]
    fn json_is_the_note_list() {
        let notes = vec![note("a", None), note("b", None)];

        let rendered = render(&notes, ExportFormat::Json).unwrap();

        assert_eq!(serde_json::from_slice::<Vec<Note>>(&rendered).unwrap(), notes);
    }

    #[test]
    fn pdf_export_is_named_after_the_note() {
        let now = chrono::Utc::now();
        let notes = [note("Q3 Plan / Draft", Some("goals"))];

        let rendered = render(&notes, ExportFormat::Pdf).unwrap();

        assert!(rendered.starts_with(b"%PDF"));
        assert_eq!(file_name(&notes, ExportFormat::Pdf, now), "q3_plan___draft.pdf");
        assert_eq!(ExportFormat::Pdf.content_type(), "application/pdf");
    }

    #[test]
    fn file_names() {
        let now = chrono::Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        assert_eq!(
            file_name(&[note("My Note: 1", None)], ExportFormat::Markdown, now),
            "my_note__1.md"
        );
        assert_eq!(
            file_name(&[note("a", None), note("b", None)], ExportFormat::Json, now),
            "notes-export-1700000000000.json"
        );
    }
}
