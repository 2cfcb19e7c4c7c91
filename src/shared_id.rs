//! `sharedId` encode/decode: the node reference handed out in place of a
//! full remote-object id.
//!
//! The current format is `f.<frameId>.d.<documentId>.e.<backendNodeId>`. A
//! legacy format, `<documentId>_element_<backendNodeId>`, is still accepted
//! for decoding but never produced.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedId {
    pub frame_id: Option<String>,
    pub document_id: String,
    pub backend_node_id: i64,
}

/// Builds the current-format `sharedId` for a node (`getSharedId`).
pub fn get_shared_id(frame_id: &str, document_id: &str, backend_node_id: i64) -> String {
    format!("f.{frame_id}.d.{document_id}.e.{backend_node_id}")
}

/// Parses either format; returns `None` ("no match") for anything malformed.
pub fn parse_shared_id(shared_id: &str) -> Option<SharedId> {
    parse_current(shared_id).or_else(|| parse_legacy(shared_id))
}

fn parse_current(shared_id: &str) -> Option<SharedId> {
    let rest = shared_id.strip_prefix("f.")?;
    let (frame_id, rest) = rest.split_once(".d.")?;
    let (document_id, backend) = rest.split_once(".e.")?;
    let backend_node_id: i64 = backend.parse().ok()?;
    if frame_id.is_empty() || document_id.is_empty() {
        return None;
    }
    Some(SharedId {
        frame_id: Some(frame_id.to_string()),
        document_id: document_id.to_string(),
        backend_node_id,
    })
}

fn parse_legacy(shared_id: &str) -> Option<SharedId> {
    let (document_id, backend) = shared_id.split_once("_element_")?;
    let backend_node_id: i64 = backend.parse().ok()?;
    if document_id.is_empty() {
        return None;
    }
    Some(SharedId {
        frame_id: None,
        document_id: document_id.to_string(),
        backend_node_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_format_round_trips() {
        let encoded = get_shared_id("frame1", "doc1", 42);
        assert_eq!(encoded, "f.frame1.d.doc1.e.42");
        let parsed = parse_shared_id(&encoded).unwrap();
        assert_eq!(parsed.frame_id.as_deref(), Some("frame1"));
        assert_eq!(parsed.document_id, "doc1");
        assert_eq!(parsed.backend_node_id, 42);
    }

    #[test]
    fn legacy_format_parses_with_no_frame_id() {
        let parsed = parse_shared_id("doc1_element_42").unwrap();
        assert_eq!(parsed.frame_id, None);
        assert_eq!(parsed.document_id, "doc1");
        assert_eq!(parsed.backend_node_id, 42);
    }

    #[test]
    fn malformed_strings_yield_no_match() {
        assert!(parse_shared_id("garbage").is_none());
        assert!(parse_shared_id("f.frame1.d.doc1.e.notanumber").is_none());
        assert!(parse_shared_id("f..d.doc1.e.1").is_none());
        assert!(parse_shared_id("").is_none());
    }
}
