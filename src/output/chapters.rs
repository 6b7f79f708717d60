//! FFMETADATA chapter sheets

use std::fmt::Write as _;

use crate::domain::model::Marker;

/// Markers and date tags for one output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterSheet {
    pub markers: Vec<Marker>,
    pub date_encoded: Option<String>,
    pub date_modified: Option<String>,
}

impl ChapterSheet {
    /// Render as an FFMETADATA1 document with millisecond chapters
    pub fn render(&self) -> String {
        let mut sheet = String::from(";FFMETADATA1\n");
        if let Some(date) = &self.date_encoded {
            let _ = writeln!(sheet, "date_encoded={}", escape(date));
        }
        if let Some(date) = &self.date_modified {
            let _ = writeln!(sheet, "date_modified={}", escape(date));
        }

        for marker in &self.markers {
            let start = marker.start.as_micros() / 1000;
            let end = (marker.end.as_micros() / 1000).max(start);
            let _ = write!(
                sheet,
                "\n[CHAPTER]\nTIMEBASE=1/1000\nSTART={}\nEND={}\ntitle={}\n",
                start,
                end,
                escape(&marker.name)
            );
        }
        sheet
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TimeSpec;

    #[test]
    fn test_render_chapters() {
        let sheet = ChapterSheet {
            markers: vec![
                Marker::at("kickoff", TimeSpec::from_seconds(5.0)),
                Marker::new("goal; 1=0", TimeSpec::from_seconds(12.5), TimeSpec::from_seconds(14.0)),
            ],
            date_encoded: Some("2024-01-02 10:00:00".into()),
            date_modified: None,
        };
        let text = sheet.render();
        assert!(text.starts_with(";FFMETADATA1\ndate_encoded=2024-01-02 10:00:00\n"));
        assert!(text.contains("[CHAPTER]\nTIMEBASE=1/1000\nSTART=5000\nEND=5000\ntitle=kickoff\n"));
        assert!(text.contains("START=12500\nEND=14000\ntitle=goal\\; 1\\=0\n"));
        assert!(!text.contains("date_modified"));
    }

    #[test]
    fn test_sheet_without_markers_is_header_only() {
        assert_eq!(ChapterSheet::default().render(), ";FFMETADATA1\n");
    }
}
