//! Topology document generation.
//!
//! Takes a user-supplied system-model template and rewrites the addressing
//! inside it so the proxy listens on its managed port and forwards to the
//! orchestrator-managed origin. The rewrite is an event-stream pass: elements
//! we do not recognize are re-emitted untouched, so a template full of
//! vendor extensions still provisions. Only a document that fails to parse
//! at all is rejected.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

/// Network alias the origin container is linked under; topology documents
/// always address the origin through this name.
pub const ORIGIN_ALIAS: &str = "origin";
/// Port the origin backend serves on inside its container.
pub const ORIGIN_PORT: u16 = 8080;
/// Port the proxy instance listens on inside its container. Published to an
/// ephemeral host port at creation so the tester can reach it.
pub const PROXY_PORT: u16 = 8000;

/// Built-in topology template, used when the caller supplies none or when
/// the supplied template is not well-formed XML.
pub const DEFAULT_TEMPLATE: &str = r#"<system-model>
  <listen host="0.0.0.0" port="8000"/>
  <destination id="default" host="localhost" port="80" default="true"/>
</system-model>
"#;

/// Generate the topology document from a template.
///
/// `listen`/`listener` elements are pointed at the proxy's managed listen
/// port, `destination`/`origin` elements at the linked origin container.
/// Everything else passes through unchanged.
pub fn generate(user: &str, version_id: &str, raw: &str) -> Result<String> {
    debug!(user, version_id, "generating topology document");

    let mut reader = Reader::from_str(raw);
    let mut writer = Writer::new(Vec::new());

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let e = rewrite_element(&e)?;
                writer
                    .write_event(Event::Start(e))
                    .map_err(|err| Error::Template(err.to_string()))?;
            }
            Ok(Event::Empty(e)) => {
                let e = rewrite_element(&e)?;
                writer
                    .write_event(Event::Empty(e))
                    .map_err(|err| Error::Template(err.to_string()))?;
            }
            Ok(ev) => {
                writer
                    .write_event(ev)
                    .map_err(|err| Error::Template(err.to_string()))?;
            }
            Err(err) => {
                return Err(Error::Template(format!(
                    "malformed topology template: {err}"
                )))
            }
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|err| Error::Template(format!("topology document is not UTF-8: {err}")))
}

/// Rewrite the addressing attributes of a recognized element, or return the
/// element as-is when it is not one we manage.
fn rewrite_element<'a>(element: &BytesStart<'a>) -> Result<BytesStart<'a>> {
    let (host, port) = match element.local_name().as_ref() {
        b"destination" | b"origin" => (ORIGIN_ALIAS, ORIGIN_PORT),
        b"listen" | b"listener" => ("0.0.0.0", PROXY_PORT),
        _ => return Ok(element.to_owned()),
    };

    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rewritten = BytesStart::new(name);
    let port = port.to_string();

    for attr in element.attributes() {
        let attr = attr.map_err(|err| Error::Template(format!("bad attribute: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        match attr.key.as_ref() {
            b"host" | b"address" | b"hostname" => {
                rewritten.push_attribute((key.as_str(), host));
            }
            b"port" => {
                rewritten.push_attribute((key.as_str(), port.as_str()));
            }
            _ => {
                let value = attr
                    .unescape_value()
                    .map_err(|err| Error::Template(format!("bad attribute value: {err}")))?;
                rewritten.push_attribute((key.as_str(), value.as_ref()));
            }
        }
    }

    Ok(rewritten.into_owned())
}
