//! Uploaded resume documents to plain text.
//!
//! PDF text comes from `pdf-extract` and DOCX text from the paragraphs of
//! `word/document.xml`, both on the blocking pool. Plain text is decoded as
//! UTF-8 with a Latin-1 fallback. Legacy `.doc` files are refused.

use std::io::{Cursor, Read};

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

use crate::errors::AppError;

/// Uploads larger than this are refused before any parsing.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document type '{0}'; upload a PDF, DOCX or TXT file")]
    Unsupported(String),

    #[error("document is {0} bytes; the limit is {MAX_UPLOAD_BYTES}")]
    TooLarge(usize),

    #[error("could not read document text: {0}")]
    Unreadable(String),

    #[error("document contains no text")]
    Empty,
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Unsupported(_) | DocumentError::TooLarge(_) => {
                AppError::Validation(err.to_string())
            }
            DocumentError::Unreadable(_) | DocumentError::Empty => {
                AppError::UnprocessableEntity(err.to_string())
            }
        }
    }
}

/// Decides the document kind from the file name, then the content type.
pub fn detect_kind(
    file_name: Option<&str>,
    content_type: Option<&str>,
) -> Result<DocumentKind, DocumentError> {
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match (extension.as_deref(), content_type) {
        (Some("pdf"), _) | (None, Some("application/pdf")) => Ok(DocumentKind::Pdf),
        (Some("docx"), _) | (None, Some(DOCX_CONTENT_TYPE)) => Ok(DocumentKind::Docx),
        (Some("txt"), _) | (None, Some("text/plain")) => Ok(DocumentKind::Text),
        (Some(ext), _) => Err(DocumentError::Unsupported(format!(".{ext}"))),
        (None, Some(ct)) => Err(DocumentError::Unsupported(ct.to_string())),
        (None, None) => Err(DocumentError::Unsupported("unknown".to_string())),
    }
}

pub async fn document_text(data: Bytes, kind: DocumentKind) -> Result<String, DocumentError> {
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(DocumentError::TooLarge(data.len()));
    }

    let text = match kind {
        DocumentKind::Text => decode_text(&data),
        // pdf-extract is CPU-bound and may panic on malformed files.
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&data)
        })
        .await
        .map_err(|e| DocumentError::Unreadable(e.to_string()))?
        .map_err(|e| DocumentError::Unreadable(e.to_string()))?,
        DocumentKind::Docx => tokio::task::spawn_blocking(move || docx_text(&data))
            .await
            .map_err(|e| DocumentError::Unreadable(e.to_string()))??,
    };

    debug!("Extracted {} chars from {kind:?} upload", text.len());
    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(text)
}

fn docx_text(data: &[u8]) -> Result<String, DocumentError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| DocumentError::Unreadable(format!("not a DOCX archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DocumentError::Unreadable(format!("word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentError::Unreadable(format!("word/document.xml: {e}")))?;

    paragraph_text(&xml)
}

/// One line per `w:p`; text runs inside a paragraph are concatenated as-is.
fn paragraph_text(xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => lines.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => current.push('\n'),
                b"tab" => current.push('\t'),
                b"p" => lines.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| DocumentError::Unreadable(format!("XML parse error: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::Unreadable(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines.join("\n"))
}

fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte straight onto the same code point.
        Err(_) => data.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    #[test]
    fn test_detect_kind() {
        assert_eq!(
            detect_kind(Some("Resume.PDF"), None).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            detect_kind(None, Some("text/plain")).unwrap(),
            DocumentKind::Text
        );
        assert_eq!(
            detect_kind(Some("resume.docx"), None).unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(
            detect_kind(None, Some(DOCX_CONTENT_TYPE)).unwrap(),
            DocumentKind::Docx
        );
        assert!(matches!(
            detect_kind(Some("resume.doc"), None),
            Err(DocumentError::Unsupported(ext)) if ext == ".doc"
        ));
        assert!(detect_kind(None, None).is_err());
    }

    #[tokio::test]
    async fn test_text_upload_decodes_latin1_fallback() {
        let text = document_text(Bytes::from_static(b"Jos\xe9 Garc\xeda\nPython"), DocumentKind::Text)
            .await
            .unwrap();
        assert_eq!(text, "José García\nPython");
    }

    #[tokio::test]
    async fn test_blank_and_oversized_uploads_are_refused() {
        let blank = document_text(Bytes::from_static(b"  \n "), DocumentKind::Text).await;
        assert!(matches!(blank, Err(DocumentError::Empty)));

        let big = Bytes::from(vec![b'a'; MAX_UPLOAD_BYTES + 1]);
        let too_large = document_text(big, DocumentKind::Text).await;
        assert!(matches!(too_large, Err(DocumentError::TooLarge(_))));
    }

    fn docx(entry: &str, body: &str) -> Bytes {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(entry, options).unwrap();
        write!(
            writer,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
        .unwrap();
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    #[tokio::test]
    async fn test_docx_paragraphs_become_lines() {
        let data = docx(
            "word/document.xml",
            r#"<w:p><w:r><w:t>Priya Raman</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Skills: Python, </w:t></w:r><w:r><w:t>PyTorch &amp; LangChain</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>AI Engineer</w:t><w:tab/><w:t>2021 - 2024</w:t></w:r></w:p>"#,
        );
        let text = document_text(data, DocumentKind::Docx).await.unwrap();
        assert_eq!(
            text,
            "Priya Raman\nSkills: Python, PyTorch & LangChain\n\nAI Engineer\t2021 - 2024"
        );
    }

    #[tokio::test]
    async fn test_docx_without_document_part_is_unreadable() {
        let data = docx("word/styles.xml", "<w:p/>");
        let result = document_text(data, DocumentKind::Docx).await;
        assert!(matches!(result, Err(DocumentError::Unreadable(_))));

        let result = document_text(Bytes::from_static(b"PK not a zip"), DocumentKind::Docx).await;
        assert!(matches!(result, Err(DocumentError::Unreadable(_))));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_unreadable() {
        let result = document_text(Bytes::from_static(b"not a pdf"), DocumentKind::Pdf).await;
        assert!(matches!(result, Err(DocumentError::Unreadable(_))));
    }
}
