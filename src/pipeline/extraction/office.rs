//! Non-OCR formats: Word documents, delimited tables, JSON and plain text.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

/// Paragraph text of a `.docx`, one paragraph per line. Table rows are
/// rendered as `| cell | cell |` lines so tabular lab results stay aligned.
pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::DocxParsing(format!("Not a DOCX archive: {e}")))?;

    let xml = {
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractionError::DocxParsing(format!("Missing word/document.xml: {e}")))?;
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        content
    };

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    // Runs carry their own significant whitespace
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut in_text = false;
    let mut cell_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:tc" => cell_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| ExtractionError::DocxParsing(err.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" if cell_depth > 0 => current.push(' '),
                b"w:p" => lines.push(std::mem::take(&mut current)),
                b"w:tc" => {
                    cell_depth = cell_depth.saturating_sub(1);
                    row_cells.push(current.trim().to_string());
                    current.clear();
                }
                b"w:tr" => {
                    lines.push(format!("| {} |", row_cells.join(" | ")));
                    row_cells.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::DocxParsing(format!(
                    "document.xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !current.trim().is_empty() {
        lines.push(current);
    }
    Ok(lines.join("\n"))
}

/// Flatten a delimited table into aligned text columns, header row first.
pub fn csv_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let content = String::from_utf8_lossy(bytes);
    let delimiter = sniff_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect();

    Ok(lines.join("\n"))
}

/// Pick the most frequent candidate delimiter on the first line.
fn sniff_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or_default();
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, first_line.matches(d as char).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Re-render a JSON document with 2-space indentation.
pub fn json_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn plain_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
