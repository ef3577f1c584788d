use std::path::Path;

use crate::models::FileKind;

/// Uploads above this size are refused outright.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Classify an upload by declared extension, falling back to magic bytes
/// when the extension is missing or unknown.
pub fn detect_file_kind(file_name: &str, bytes: &[u8]) -> FileKind {
    if bytes.len() > MAX_FILE_SIZE {
        return FileKind::Unsupported;
    }
    match kind_from_extension(file_name) {
        Some(kind) => kind,
        None => kind_from_magic(bytes),
    }
}

fn kind_from_extension(file_name: &str) -> Option<FileKind> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    match ext.as_str() {
        "pdf" => Some(FileKind::Pdf),
        "docx" | "doc" => Some(FileKind::Docx),
        "csv" => Some(FileKind::Csv),
        "json" => Some(FileKind::Json),
        "jpg" | "jpeg" | "png" | "tif" | "tiff" | "bmp" | "gif" => Some(FileKind::Image),
        "txt" => Some(FileKind::Text),
        _ => None,
    }
}

/// Detect file kind from magic bytes.
fn kind_from_magic(bytes: &[u8]) -> FileKind {
    match &bytes[..bytes.len().min(8)] {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => FileKind::Pdf,
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => FileKind::Image,
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => FileKind::Image,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => FileKind::Image,
        // ZIP container: the only one we accept is a Word document
        [0x50, 0x4B, 0x03, 0x04, ..] => FileKind::Docx,
        _ if looks_like_json(bytes) => FileKind::Json,
        _ if is_likely_text(bytes) => FileKind::Text,
        _ => FileKind::Unsupported,
    }
}

fn looks_like_json(bytes: &[u8]) -> bool {
    let head = bytes.iter().find(|b| !b.is_ascii_whitespace());
    matches!(head, Some(b'{') | Some(b'['))
        && serde_json::from_slice::<serde_json::Value>(bytes).is_ok()
}

/// UTF-8 with no control bytes besides whitespace, judged on the first 8 KB.
fn is_likely_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let sample = &bytes[..bytes.len().min(8192)];
    let text = match std::str::from_utf8(sample) {
        Ok(t) => t,
        // A multi-byte sequence cut at the sample boundary is fine
        Err(e) if e.valid_up_to() + 4 >= sample.len() => {
            match std::str::from_utf8(&sample[..e.valid_up_to()]) {
                Ok(t) => t,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_wins_when_known() {
        assert_eq!(detect_file_kind("report.PDF", b"anything"), FileKind::Pdf);
        assert_eq!(detect_file_kind("scan.jpeg", b""), FileKind::Image);
        assert_eq!(detect_file_kind("labs.csv", b"a,b"), FileKind::Csv);
        assert_eq!(detect_file_kind("notes.doc", b""), FileKind::Docx);
    }

    #[test]
    fn magic_bytes_for_unknown_extension() {
        assert_eq!(detect_file_kind("upload.bin", b"%PDF-1.7\n..."), FileKind::Pdf);
        assert_eq!(detect_file_kind("upload", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), FileKind::Image);
        assert_eq!(
            detect_file_kind("upload", &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            FileKind::Image
        );
        assert_eq!(detect_file_kind("upload", b"PK\x03\x04rest"), FileKind::Docx);
    }

    #[test]
    fn json_and_text_by_content() {
        assert_eq!(detect_file_kind("data", br#"{"Hemoglobin": 13}"#), FileKind::Json);
        assert_eq!(detect_file_kind("data", b"Hemoglobin: 13.2\n"), FileKind::Text);
    }

    #[test]
    fn binary_garbage_is_unsupported() {
        assert_eq!(detect_file_kind("blob.xyz", &[0x00, 0x01, 0x02, 0x03]), FileKind::Unsupported);
        assert_eq!(detect_file_kind("empty", b""), FileKind::Unsupported);
    }
}
