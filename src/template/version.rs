use crate::error::{Error, Result};

/// Parse the major version out of a dotted version string.
///
/// The first dot-separated component must be an integer: `"7.1.0"` yields 7.
/// An empty string or a non-numeric leading component is a validation error,
/// since every generated document is keyed on the major version.
pub fn major_version(version_id: &str) -> Result<u32> {
    let major = version_id.split('.').next().unwrap_or_default().trim();
    if major.is_empty() {
        return Err(Error::Validation("missing version id".to_string()));
    }
    major.parse::<u32>().map_err(|_| {
        Error::Validation(format!(
            "version id '{version_id}' has no numeric major component"
        ))
    })
}
