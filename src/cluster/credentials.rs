//! Credential bundle extraction.
//!
//! The control plane delivers a cluster's credentials as a zip archive with
//! five fixed file names. Entries are matched by trailing filename so a
//! bundle that nests its files under a directory still extracts.

use super::TlsBundle;
use crate::error::{Error, Result};
use crate::template::trailing_name;
use std::collections::HashMap;
use std::io::{Cursor, Read};

pub const CA_CERT_FILE: &str = "ca.pem";
pub const CA_KEY_FILE: &str = "ca-key.pem";
pub const CLIENT_CERT_FILE: &str = "cert.pem";
pub const CLIENT_KEY_FILE: &str = "key.pem";
/// Environment/connection descriptor: `KEY=VALUE` lines, `DOCKER_HOST`
/// required.
pub const ENV_FILE: &str = "docker.env";

/// Everything extracted from one credential archive.
#[derive(Debug, Clone)]
pub struct ExtractedBundle {
    pub tls: TlsBundle,
    pub env: HashMap<String, String>,
    pub endpoint: String,
}

/// Extract the credential bundle from a zip archive.
///
/// The CA key is optional in the result; the other four files and a
/// `DOCKER_HOST` line in the descriptor are required, and their absence is a
/// provisioning failure (the control plane handed us an unusable bundle).
pub fn extract(archive_bytes: &[u8]) -> Result<ExtractedBundle> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| Error::Provision(format!("credential bundle is not a zip archive: {e}")))?;

    let mut files: HashMap<String, String> = HashMap::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::Provision(format!("unreadable credential archive entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = trailing_name(entry.name()).to_string();
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| Error::Provision(format!("credential file '{name}' unreadable: {e}")))?;
        files.insert(name, content);
    }

    let required = |name: &str| -> Result<String> {
        files
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Provision(format!("credential bundle is missing '{name}'")))
    };

    let tls = TlsBundle {
        ca_cert: required(CA_CERT_FILE)?,
        client_cert: required(CLIENT_CERT_FILE)?,
        client_key: required(CLIENT_KEY_FILE)?,
        ca_key: files.get(CA_KEY_FILE).cloned(),
    };

    let env = parse_env(&required(ENV_FILE)?);
    let endpoint = env.get("DOCKER_HOST").cloned().ok_or_else(|| {
        Error::Provision(format!("'{ENV_FILE}' has no DOCKER_HOST entry"))
    })?;

    Ok(ExtractedBundle {
        tls,
        env,
        endpoint,
    })
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments. Values keep
/// embedded `=` signs but lose surrounding quotes.
fn parse_env(content: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            env.insert(key.trim().to_string(), value.to_string());
        }
    }
    env
}
