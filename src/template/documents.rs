//! Runtime-tuning and logging document generators.
//!
//! Both documents are derived entirely from the major version; user-supplied
//! content for these names is discarded and regenerated so an instance never
//! boots with tuning the orchestrator didn't produce.

/// Directory inside an instance container where logs are written. The
/// tester reads the files back from here after a diagnostic request.
pub const LOG_DIR: &str = "/var/log/proxy-lab";

/// The three named logs captured by the instance tester.
pub const LOG_NAMES: [&str; 3] = ["access", "error", "service"];

/// Path of a named log file inside an instance container.
pub fn log_path(name: &str) -> String {
    format!("{LOG_DIR}/{name}.log")
}

/// Generate the runtime-tuning document for a major version.
pub fn runtime_document(major: u32) -> String {
    // Majors before 7 shipped a smaller default worker pool.
    let max_workers = if major >= 7 { 64 } else { 32 };
    format!(
        r#"<container version="{major}">
  <deployment-config connection-timeout="30000" read-timeout="30000"/>
  <worker-pool min="4" max="{max_workers}"/>
  <content-cache size-mb="256"/>
</container>
"#
    )
}

/// Generate the logging document for a major version.
pub fn logging_document(major: u32) -> String {
    let mut targets = String::new();
    for name in LOG_NAMES {
        targets.push_str(&format!(
            "  <log name=\"{name}\" path=\"{}\" level=\"info\"/>\n",
            log_path(name)
        ));
    }
    format!("<logging version=\"{major}\">\n{targets}</logging>\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_document_is_keyed_on_major() {
        let v7 = runtime_document(7);
        let v6 = runtime_document(6);
        assert!(v7.contains(r#"version="7""#));
        assert!(v7.contains(r#"max="64""#));
        assert!(v6.contains(r#"max="32""#));
    }

    #[test]
    fn logging_document_lists_all_three_logs() {
        let doc = logging_document(7);
        for name in LOG_NAMES {
            assert!(doc.contains(&log_path(name)), "missing {name} in: {doc}");
        }
    }
}
