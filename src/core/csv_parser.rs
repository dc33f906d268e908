use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserMode {
    /// Quote-aware scanner with `""` escapes.
    #[default]
    Quoted,
    /// Legacy split on every comma, fields trimmed, no quote handling.
    Naive,
}

/// Parses a CSV document with the quote-aware scanner.
///
/// The first line is the header. Rows shorter than the header are padded with
/// empty strings, longer rows are truncated. Never fails: an unterminated quote
/// simply runs to the end of its line.
pub fn parse_csv(text: &str) -> Vec<Record> {
    parse_with_mode(text, ParserMode::Quoted)
}

pub fn parse_with_mode(text: &str, mode: ParserMode) -> Vec<Record> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let split: fn(&str) -> Vec<String> = match mode {
        ParserMode::Quoted => split_quoted,
        ParserMode::Naive => split_naive,
    };

    // Grist 匯出用 CRLF，行尾的 \r 要去掉
    let mut lines = trimmed
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let headers = match lines.next() {
        Some(header_line) => split(header_line),
        None => return Vec::new(),
    };

    lines
        .map(|line| {
            let values = split(line);
            headers
                .iter()
                .enumerate()
                .map(|(index, header)| {
                    let value = values.get(index).map(String::as_str).unwrap_or("");
                    (header.as_str(), value)
                })
                .collect::<Record>()
        })
        .collect()
}

/// Splits one line into fields, honouring double quotes.
pub fn split_quoted(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

pub fn split_naive(line: &str) -> Vec<String> {
    line.split(',').map(|field| field.trim().to_string()).collect()
}

/// Column names in the order the first record carries them.
pub fn headers_of(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|record| record.columns().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Writes records back out as CSV, quoting only where needed.
pub fn to_csv(headers: &[String], records: &[Record]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(headers)?;
    for record in records {
        writer.write_record(headers.iter().map(|h| record.text(h).into_owned()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))?;

    String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}
