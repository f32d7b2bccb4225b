use bytes::Bytes;
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF";
/// Readers tolerate a little garbage before the header, so do we.
const PDF_HEADER_WINDOW: usize = 1024;

/// One uploaded document, as received. Read-only once acquired.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub size: usize,
    pub content: Bytes,
    pub mime_type: Option<String>,
}

impl InputFile {
    pub fn new(name: impl AsRef<str>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: sanitize_original_name(name.as_ref()),
            size: content.len(),
            content,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: String) -> Self {
        self.mime_type = Some(mime_type);
        self
    }

    pub fn is_pdf(&self) -> bool {
        let window = &self.content[..self.content.len().min(PDF_HEADER_WINDOW)];
        window
            .windows(PDF_MAGIC.len())
            .any(|candidate| candidate == PDF_MAGIC)
    }
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_original_name(raw: &str) -> String {
    // Browsers on Windows may send the full path with backslashes.
    let last = raw.rsplit(&['/', '\\'][..]).next().unwrap_or("");
    let candidate = Path::new(last)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = candidate.chars().filter(|c| !c.is_control()).collect();

    if cleaned.trim().is_empty() || cleaned == "." || cleaned == ".." {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}
