//! Inbound build documents and the outbound build response.
//!
//! The embedding HTTP layer hands this module raw bytes; everything that can
//! be rejected without touching the orchestrator is rejected here, as a
//! validation error mapping to a client-side outcome.

use crate::error::{Error, Result, StatusClass};
use crate::template::{trailing_name, Artifact};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

/// A build request: version identifier plus named configuration entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub version_id: String,
    #[serde(default)]
    pub configurations: Vec<Artifact>,
}

impl BuildRequest {
    /// Parse a JSON request body. Absent or malformed bodies and a missing
    /// version identifier are client errors; no orchestrator call is made
    /// for them.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(Error::Validation("empty request body".to_string()));
        }
        let request: BuildRequest = serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("malformed build request: {e}")))?;
        if request.version_id.trim().is_empty() {
            return Err(Error::Validation("missing version id".to_string()));
        }
        Ok(request)
    }
}

/// Expand an uploaded zip archive into configuration entries.
///
/// Entries are named by trailing filename only, so directory depth inside
/// the archive is irrelevant. Anything that isn't a readable zip fails with
/// the fixed "No zip files" message.
pub fn configurations_from_zip(bytes: &[u8]) -> Result<Vec<Artifact>> {
    if bytes.is_empty() {
        return Err(Error::Validation("No zip files".to_string()));
    }
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|_| Error::Validation("No zip files".to_string()))?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::Validation(format!("unreadable archive entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = trailing_name(entry.name()).to_string();
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| Error::Validation(format!("archive entry '{name}' is not text: {e}")))?;
        entries.push(Artifact { name, content });
    }
    Ok(entries)
}

/// The caller-visible build outcome document.
///
/// `{"message":"success","id":"<proxyId>"}` on success, `{"message":"<reason>"}`
/// with the matching status class otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl BuildResponse {
    pub fn success(proxy_id: impl Into<String>) -> Self {
        Self {
            message: "success".to_string(),
            id: Some(proxy_id.into()),
        }
    }

    /// Render a failure outcome. Returns the response document and the
    /// status class the transport should use.
    pub fn failure(error: &Error) -> (Self, StatusClass) {
        (
            Self {
                message: error.to_string(),
                id: None,
            },
            error.status(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buffer);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        buffer.into_inner()
    }

    #[test]
    fn parses_a_build_request() {
        let body = br#"{"versionId":"7.1","configurations":[{"name":"system-model.cfg.xml","content":"<template/>"}]}"#;
        let request = BuildRequest::from_json(body).unwrap();
        assert_eq!(request.version_id, "7.1");
        assert_eq!(request.configurations.len(), 1);
    }

    #[test]
    fn empty_body_is_a_validation_error() {
        let err = BuildRequest::from_json(b"").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.status(), StatusClass::BadRequest);
    }

    #[test]
    fn missing_version_id_is_a_validation_error() {
        let err = BuildRequest::from_json(br#"{"versionId":"","configurations":[]}"#).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = BuildRequest::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn zip_entries_are_named_by_trailing_filename() {
        let bytes = zip_of(&[
            ("configs/deep/system-model.cfg.xml", "<template/>"),
            ("extra.txt", "untouched"),
        ]);
        let entries = configurations_from_zip(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "system-model.cfg.xml");
        assert_eq!(entries[1].name, "extra.txt");
        assert_eq!(entries[1].content, "untouched");
    }

    #[test]
    fn non_zip_bytes_fail_with_fixed_message() {
        let err = configurations_from_zip(b"not an archive").unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: No zip files");

        let err = configurations_from_zip(b"").unwrap_err();
        assert!(err.to_string().contains("No zip files"));
    }

    #[test]
    fn success_response_shape() {
        let json = serde_json::to_value(BuildResponse::success("abc123")).unwrap();
        assert_eq!(json["message"], "success");
        assert_eq!(json["id"], "abc123");
    }

    #[test]
    fn failure_response_carries_reason_and_status() {
        let error = Error::Validation("missing version id".to_string());
        let (response, status) = BuildResponse::failure(&error);
        assert_eq!(status, StatusClass::BadRequest);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["message"].as_str().unwrap().contains("missing version id"));
        assert!(json.get("id").is_none());
    }
}
