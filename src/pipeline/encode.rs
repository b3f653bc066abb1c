//! Payload encoding: file bytes → base64 `InlineData` tagged `application/pdf`.
//!
//! Gemini's `generateContent` accepts documents as inline parts
//! (`{"inlineData": {"mimeType": …, "data": …}}`), so the whole file is read
//! and encoded in one go. The `%PDF` header is checked here (within the first
//! 1024 bytes, the way PDF readers tolerate leading junk) so a renamed text
//! file fails with a clear error instead of an opaque 400 from the API.

use crate::error::VerifyError;
use crate::intake::{FileItem, FileSource, PDF_MIME};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A typed inline-data payload, serialised exactly as the Gemini wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Standard (padded) base64 of the file bytes.
    pub data: String,
}

/// Read a file's bytes in full.
pub async fn read_bytes(item: &FileItem) -> Result<Vec<u8>, VerifyError> {
    match &item.source {
        FileSource::Bytes(bytes) => Ok(bytes.to_vec()),
        FileSource::Path(path) => tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VerifyError::FileNotFound { path: path.clone() },
            std::io::ErrorKind::PermissionDenied => {
                VerifyError::PermissionDenied { path: path.clone() }
            }
            _ => VerifyError::ReadFailed {
                name: item.name.clone(),
                source: e,
            },
        }),
    }
}

/// The `%PDF` header must start within this many leading bytes.
pub const PDF_HEADER_WINDOW: usize = 1024;

/// Wrap raw PDF bytes as an inline payload.
pub fn encode_pdf(name: &str, bytes: &[u8]) -> Result<InlineData, VerifyError> {
    let head = &bytes[..bytes.len().min(PDF_HEADER_WINDOW + 3)];
    if !head.windows(4).any(|w| w == b"%PDF") {
        return Err(VerifyError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    let data = STANDARD.encode(bytes);
    debug!("Encoded {} → {} bytes base64", name, data.len());

    Ok(InlineData {
        mime_type: PDF_MIME.to_string(),
        data,
    })
}

/// Read and encode one batch item.
pub async fn encode_file(item: &FileItem) -> Result<InlineData, VerifyError> {
    let bytes = read_bytes(item).await?;
    encode_pdf(&item.name, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_small_pdf() {
        let data = encode_pdf("a.pdf", b"%PDF-1.7\n%%EOF").expect("encode should succeed");
        assert_eq!(data.mime_type, "application/pdf");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.7\n%%EOF");
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = encode_pdf("fake.pdf", b"hello world").unwrap_err();
        match err {
            VerifyError::NotAPdf { name, magic } => {
                assert_eq!(name, "fake.pdf");
                assert_eq!(magic, b"hell".to_vec());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_after_leading_junk_is_accepted() {
        let mut bytes = vec![b'\n'; 600];
        bytes.extend_from_slice(b"%PDF-1.5\n%%EOF");
        let data = encode_pdf("junk.pdf", &bytes).unwrap();
        assert_eq!(STANDARD.decode(&data.data).unwrap(), bytes);
    }

    #[test]
    fn header_past_the_window_is_rejected() {
        let mut bytes = vec![b' '; PDF_HEADER_WINDOW];
        bytes.extend_from_slice(b"%PDF-1.5");
        let err = encode_pdf("late.pdf", &bytes).unwrap_err();
        assert!(matches!(err, VerifyError::NotAPdf { .. }));
    }

    #[test]
    fn serialises_as_inline_data() {
        let data = InlineData {
            mime_type: PDF_MIME.into(),
            data: "JVBERg==".into(),
        };
        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v["mimeType"], "application/pdf");
        assert_eq!(v["data"], "JVBERg==");
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let item = FileItem::from_path("/definitely/not/here.pdf");
        let err = encode_file(&item).await.unwrap_err();
        assert!(matches!(err, VerifyError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn encodes_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 body").unwrap();

        let data = encode_file(&FileItem::from_path(&path)).await.unwrap();
        assert_eq!(STANDARD.decode(&data.data).unwrap(), b"%PDF-1.4 body");
    }
}
