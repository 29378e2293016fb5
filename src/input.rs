//! Input record loading: JSONL and CSV sources.
//!
//! Normalizes tabular or line-delimited files into [`Record`]s. Malformed
//! lines are skipped with a warning and counted, in the same spirit as
//! triple validation: one bad row should not sink a batch.

use std::path::Path;

use crate::error::{InputError, InputResult};
use crate::pipeline::Record;

/// Supported input file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One JSON object per line with `id` and `text` string fields.
    Jsonl,
    /// Header-driven CSV with `id` and `text` columns.
    Csv,
}

impl std::str::FromStr for RecordFormat {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(RecordFormat::Jsonl),
            "csv" => Ok(RecordFormat::Csv),
            other => Err(InputError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl RecordFormat {
    /// Guess the format from a file extension, defaulting to JSONL.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => RecordFormat::Csv,
            _ => RecordFormat::Jsonl,
        }
    }
}

/// Records loaded from a file, plus how many lines were skipped.
#[derive(Debug)]
pub struct LoadOutcome {
    pub records: Vec<Record>,
    pub skipped: usize,
}

/// Load records from a file in the given (or path-inferred) format.
pub fn load_records(path: &Path, format: Option<RecordFormat>) -> InputResult<LoadOutcome> {
    let format = format.unwrap_or_else(|| RecordFormat::from_path(path));
    let raw = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let outcome = match format {
        RecordFormat::Jsonl => parse_jsonl(&raw),
        RecordFormat::Csv => parse_csv(&raw, path)?,
    };

    if outcome.records.is_empty() {
        return Err(InputError::NoRecords {
            path: path.to_path_buf(),
        });
    }

    tracing::info!(
        path = %path.display(),
        records = outcome.records.len(),
        skipped = outcome.skipped,
        "loaded input records"
    );
    Ok(outcome)
}

fn parse_jsonl(raw: &str) -> LoadOutcome {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) if !record.id.trim().is_empty() => records.push(record),
            Ok(_) => {
                tracing::warn!(line = lineno + 1, "record with empty id, skipping");
                skipped += 1;
            }
            Err(e) => {
                tracing::warn!(line = lineno + 1, error = %e, "malformed JSONL record, skipping");
                skipped += 1;
            }
        }
    }

    LoadOutcome { records, skipped }
}

fn parse_csv(raw: &str, path: &Path) -> InputResult<LoadOutcome> {
    let mut lines = raw.lines();
    let Some(header) = lines.next() else {
        return Ok(LoadOutcome {
            records: Vec::new(),
            skipped: 0,
        });
    };

    let columns = split_csv_line(header);
    let find = |name: &str| {
        columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    };
    let id_col = find("id").ok_or_else(|| InputError::MissingColumn {
        path: path.to_path_buf(),
        column: "id".into(),
    })?;
    let text_col = find("text").ok_or_else(|| InputError::MissingColumn {
        path: path.to_path_buf(),
        column: "text".into(),
    })?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (lineno, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let id = fields.get(id_col).map(|s| s.trim()).unwrap_or_default();
        let text = fields.get(text_col).cloned().unwrap_or_default();
        if id.is_empty() {
            tracing::warn!(line = lineno + 2, "CSV row with empty id, skipping");
            skipped += 1;
            continue;
        }

        // Remaining columns ride along as passthrough fields.
        let mut record = Record::new(id, text);
        for (i, column) in columns.iter().enumerate() {
            if i == id_col || i == text_col {
                continue;
            }
            if let Some(value) = fields.get(i) {
                record.extra.insert(
                    column.trim().to_string(),
                    serde_json::Value::String(value.clone()),
                );
            }
        }
        records.push(record);
    }

    Ok(LoadOutcome { records, skipped })
}

/// Split one CSV line, honoring double-quoted fields with `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonl_skips_malformed_lines() {
        let raw = concat!(
            "{\"id\": \"a\", \"text\": \"Alpha.\"}\n",
            "not json\n",
            "\n",
            "{\"id\": \"b\", \"text\": \"Beta.\", \"source\": \"wiki\"}\n",
        );
        let out = parse_jsonl(raw);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records[1].extra["source"], serde_json::json!("wiki"));
    }

    #[test]
    fn csv_parses_quoted_fields() {
        let raw = "id,text,tag\nr1,\"Alice, who knows Bob, left.\",news\n";
        let out = parse_csv(raw, Path::new("test.csv")).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].text, "Alice, who knows Bob, left.");
        assert_eq!(out.records[0].extra["tag"], serde_json::json!("news"));
    }

    #[test]
    fn csv_without_text_column_errors() {
        let raw = "id,body\nr1,hello\n";
        let err = parse_csv(raw, Path::new("test.csv")).unwrap_err();
        assert!(matches!(err, InputError::MissingColumn { .. }));
    }

    #[test]
    fn quoted_escapes_are_unescaped() {
        let fields = split_csv_line("a,\"say \"\"hi\"\"\",c");
        assert_eq!(fields, vec!["a", "say \"hi\"", "c"]);
    }

    #[test]
    fn format_inferred_from_extension() {
        assert_eq!(
            RecordFormat::from_path(Path::new("x.csv")),
            RecordFormat::Csv
        );
        assert_eq!(
            RecordFormat::from_path(Path::new("x.jsonl")),
            RecordFormat::Jsonl
        );
    }
}
