use std::path::Path;

use crate::errors::StreamError;

/// Largest report the server accepts.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A lab report file plus optional dietary preference tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    file_name: String,
    contents: bytes::Bytes,
    dietary_preferences: Vec<String>,
}

impl UploadRequest {
    /// Creates a validated upload from in-memory contents.
    pub fn new(
        file_name: impl Into<String>,
        contents: impl Into<bytes::Bytes>,
    ) -> Result<Self, StreamError> {
        let request = Self {
            file_name: file_name.into(),
            contents: contents.into(),
            dietary_preferences: Vec::new(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Reads and validates a report from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StreamError::Validation(format!("invalid report path: {}", path.display()))
            })?
            .to_string();
        let contents = tokio::fs::read(path).await.map_err(|e| {
            StreamError::Validation(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::new(file_name, contents)
    }

    /// Adds dietary preference tags (for example `vegetarian`, `dairy-free`).
    ///
    /// Tags are trimmed; empty tags are skipped.
    pub fn dietary_preferences<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dietary_preferences.extend(
            tags.into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty()),
        );
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Preferences as sent in the `dietary_preferences` form field.
    pub fn preferences_field(&self) -> String {
        self.dietary_preferences.join(",")
    }

    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, StreamError> {
        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::from(self.contents.clone()),
            self.contents.len() as u64,
        )
        .file_name(self.file_name.clone())
        .mime_str("application/pdf")
        .map_err(|e| StreamError::Validation(format!("invalid upload mime type: {e}")))?;
        Ok(reqwest::multipart::Form::new()
            .part("file", part)
            .text("dietary_preferences", self.preferences_field()))
    }

    fn validate(&self) -> Result<(), StreamError> {
        if !self.file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(StreamError::Validation(
                "only PDF files are accepted".into(),
            ));
        }
        if self.contents.is_empty() {
            return Err(StreamError::Validation("report file is empty".into()));
        }
        if self.contents.len() > MAX_UPLOAD_BYTES {
            return Err(StreamError::Validation(format!(
                "report is {} bytes; the limit is 10 MB",
                self.contents.len()
            )));
        }
        Ok(())
    }
}
