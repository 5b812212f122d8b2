//! Configuration artifact generation.
//!
//! Pure transforms: a major version and a set of named entries go in, a set
//! of ready-to-deploy configuration documents comes out. Nothing in this
//! module touches the network or the filesystem.

pub mod documents;
pub mod topology;
pub mod version;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Topology document name (routing: listen address, origin destination).
pub const TOPOLOGY_DOCUMENT: &str = "system-model.cfg.xml";
/// Runtime-tuning document name (thread pools, cache sizing).
pub const RUNTIME_DOCUMENT: &str = "container.cfg.xml";
/// Logging document name (log targets and levels).
pub const LOGGING_DOCUMENT: &str = "logging.cfg.xml";

/// A named configuration document supplied to a container at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub content: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The trailing filename of an entry path. Directory depth is ignored when
/// matching recognized names, so `configs/system-model.cfg.xml` and
/// `system-model.cfg.xml` are the same entry.
pub fn trailing_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Produce the full artifact set for a provisioning request.
///
/// The three recognized names are regenerated from the supplied content (the
/// topology template is rewritten; runtime and logging are derived from the
/// major version alone). Every other entry passes through unmodified. The
/// three generated documents are always present in the output, whether or
/// not the caller supplied them.
pub fn merge_artifacts(user: &str, version_id: &str, entries: &[Artifact]) -> Result<Vec<Artifact>> {
    let major = version::major_version(version_id)?;

    let mut out = Vec::with_capacity(entries.len() + 3);
    let mut have_topology = false;
    let mut have_runtime = false;
    let mut have_logging = false;

    for entry in entries {
        match trailing_name(&entry.name) {
            TOPOLOGY_DOCUMENT => {
                out.push(Artifact::new(
                    TOPOLOGY_DOCUMENT,
                    topology_or_default(user, version_id, &entry.content)?,
                ));
                have_topology = true;
            }
            RUNTIME_DOCUMENT => {
                out.push(Artifact::new(
                    RUNTIME_DOCUMENT,
                    documents::runtime_document(major),
                ));
                have_runtime = true;
            }
            LOGGING_DOCUMENT => {
                out.push(Artifact::new(
                    LOGGING_DOCUMENT,
                    documents::logging_document(major),
                ));
                have_logging = true;
            }
            _ => out.push(entry.clone()),
        }
    }

    if !have_topology {
        out.push(Artifact::new(
            TOPOLOGY_DOCUMENT,
            topology::generate(user, version_id, topology::DEFAULT_TEMPLATE)?,
        ));
    }
    if !have_runtime {
        out.push(Artifact::new(
            RUNTIME_DOCUMENT,
            documents::runtime_document(major),
        ));
    }
    if !have_logging {
        out.push(Artifact::new(
            LOGGING_DOCUMENT,
            documents::logging_document(major),
        ));
    }

    Ok(out)
}

/// Rewrite the supplied topology template, falling back to the built-in
/// default document when the template is not well-formed XML. Provisioning is
/// never blocked on a cosmetic template issue.
fn topology_or_default(user: &str, version_id: &str, raw: &str) -> Result<String> {
    match topology::generate(user, version_id, raw) {
        Ok(doc) => Ok(doc),
        Err(crate::Error::Template(reason)) => {
            warn!(user, %reason, "malformed topology template, substituting default document");
            topology::generate(user, version_id, topology::DEFAULT_TEMPLATE)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_name_ignores_directory_depth() {
        assert_eq!(trailing_name("system-model.cfg.xml"), "system-model.cfg.xml");
        assert_eq!(
            trailing_name("deep/nested/dir/container.cfg.xml"),
            "container.cfg.xml"
        );
        assert_eq!(trailing_name("win\\style\\logging.cfg.xml"), "logging.cfg.xml");
    }

    #[test]
    fn merge_regenerates_recognized_and_passes_through_the_rest() {
        let entries = vec![
            Artifact::new("configs/system-model.cfg.xml", "<topology><listen port=\"9\"/></topology>"),
            Artifact::new("container.cfg.xml", "ignored, regenerated"),
            Artifact::new("logging.cfg.xml", "ignored, regenerated"),
            Artifact::new("extra.txt", "untouched bytes"),
        ];
        let artifacts = merge_artifacts("alice", "7.1", &entries).unwrap();

        assert_eq!(artifacts.len(), 4);
        let extra = artifacts.iter().find(|a| a.name == "extra.txt").unwrap();
        assert_eq!(extra.content, "untouched bytes");
        let runtime = artifacts.iter().find(|a| a.name == RUNTIME_DOCUMENT).unwrap();
        assert_ne!(runtime.content, "ignored, regenerated");
        assert!(runtime.content.contains("version=\"7\""));
    }

    #[test]
    fn merge_always_emits_the_three_generated_documents() {
        let artifacts = merge_artifacts("alice", "7.1", &[]).unwrap();
        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(artifacts.len(), 3);
        assert!(names.contains(&TOPOLOGY_DOCUMENT));
        assert!(names.contains(&RUNTIME_DOCUMENT));
        assert!(names.contains(&LOGGING_DOCUMENT));
    }

    #[test]
    fn merge_substitutes_default_for_malformed_topology_template() {
        let entries = vec![Artifact::new("system-model.cfg.xml", "<open><mismatched></open>")];
        let artifacts = merge_artifacts("alice", "7.1", &entries).unwrap();
        let topo = artifacts
            .iter()
            .find(|a| a.name == TOPOLOGY_DOCUMENT)
            .unwrap();
        assert!(topo.content.contains("destination"));
    }

    #[test]
    fn merge_fails_on_unparseable_version() {
        let err = merge_artifacts("alice", "beta.1", &[]).unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
    }
}
