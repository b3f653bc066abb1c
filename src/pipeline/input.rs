//! Input resolution: normalise a user-supplied path or URL to a [`FileItem`].
//!
//! Local paths are *not* read here; only their existence is checked, and the
//! declared MIME type comes from the extension. The bytes are read when the
//! file is extracted, so intake stays cheap and a file that disappears between
//! drop and processing fails the run rather than the drop.
//!
//! URLs are downloaded into memory. Their declared type is the response's
//! `Content-Type`, falling back to the URL's extension when the server sends
//! something generic.

use crate::error::VerifyError;
use crate::intake::{mime_from_extension, FileItem};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve one input string to a batch candidate.
pub async fn resolve_item(input: &str, timeout_secs: u64) -> Result<FileItem, VerifyError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve every input, failing on the first bad one.
pub async fn resolve_items<I, S>(inputs: I, timeout_secs: u64) -> Result<Vec<FileItem>, VerifyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut items = Vec::new();
    for input in inputs {
        items.push(resolve_item(input.as_ref(), timeout_secs).await?);
    }
    Ok(items)
}

fn resolve_local(path_str: &str) -> Result<FileItem, VerifyError> {
    if path_str.trim().is_empty() {
        return Err(VerifyError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let path = PathBuf::from(path_str);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(VerifyError::InvalidInput {
                input: path_str.to_string(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(VerifyError::PermissionDenied { path });
        }
        Err(_) => return Err(VerifyError::FileNotFound { path }),
    }

    debug!("Resolved local file: {}", path.display());
    Ok(FileItem::from_path(path))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<FileItem, VerifyError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| VerifyError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            VerifyError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            VerifyError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(VerifyError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mime_type = declared_mime(content_type.as_deref(), &name);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| VerifyError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes, {})", name, bytes.len(), mime_type);
    Ok(FileItem::from_bytes(name, mime_type, bytes.to_vec()))
}

/// MIME type from a `Content-Type` header value, ignoring parameters.
fn declared_mime(content_type: Option<&str>, name: &str) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    match essence.as_deref() {
        None | Some("application/octet-stream") | Some("binary/octet-stream") => {
            mime_from_extension(Path::new(name)).to_string()
        }
        Some(ct) => ct.to_string(),
    }
}

/// Extract a reasonable filename from the URL.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::PDF_MIME;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://host/files/passport.pdf?x=1"), "passport.pdf");
        assert_eq!(extract_filename("https://host/download/"), "downloaded.pdf");
    }

    #[test]
    fn content_type_wins_over_extension() {
        assert_eq!(declared_mime(Some("application/pdf; charset=binary"), "x.bin"), PDF_MIME);
        assert_eq!(declared_mime(Some("text/html"), "x.pdf"), "text/html");
        assert_eq!(declared_mime(Some("application/octet-stream"), "x.pdf"), PDF_MIME);
        assert_eq!(declared_mime(None, "x.pdf"), PDF_MIME);
    }

    #[test]
    fn local_file_resolves_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("licence.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let item = resolve_local(path.to_str().unwrap()).unwrap();
        assert_eq!(item.name, "licence.pdf");
        assert_eq!(item.mime_type, PDF_MIME);
    }

    #[test]
    fn missing_and_directory_inputs_fail() {
        assert!(matches!(
            resolve_local("/definitely/not/a/file.pdf"),
            Err(VerifyError::FileNotFound { .. })
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_local(dir.path().to_str().unwrap()),
            Err(VerifyError::InvalidInput { .. })
        ));
    }
}
