use super::error::DocxError;
use crate::normalize::normalize_url;
use serde::{Deserialize, Serialize};

pub const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

/// A part's relationship sidecar: relationship IDs mapped to external
/// targets such as hyperlink URIs.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Relationships")]
pub struct Relationships {
    #[serde(rename = "@xmlns")]
    xmlns: String,
    #[serde(rename = "Relationship", default)]
    entries: Vec<Relationship>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Relationship {
    #[serde(rename = "@Id")]
    id: String,
    #[serde(rename = "@Type")]
    rel_type: String,
    #[serde(rename = "@Target")]
    target: String,
    #[serde(rename = "@TargetMode", skip_serializing_if = "Option::is_none")]
    target_mode: Option<String>,
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new()
    }
}

impl Relationships {
    /// Empty sidecar, for parts that had none.
    pub fn new() -> Self {
        Relationships {
            xmlns: RELATIONSHIPS_NS.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn parse(xml: &str) -> Result<Self, DocxError> {
        quick_xml::de::from_str(xml).map_err(|e| DocxError::Malformed(e.to_string()))
    }

    pub fn to_xml(&self) -> Result<String, DocxError> {
        let body = quick_xml::se::to_string(self).map_err(|e| DocxError::Malformed(e.to_string()))?;
        Ok(format!("{}{}", XML_DECL, body))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Relationship ID for an external hyperlink target, inserting a new
    /// entry when the URL is not present yet. URLs equal under
    /// normalization share one entry; the stored target keeps the form
    /// first seen.
    pub fn hyperlink_id(&mut self, url: &str) -> String {
        let wanted = normalize_url(url);
        if let Some(existing) = self
            .entries
            .iter()
            .find(|r| r.rel_type == HYPERLINK_REL_TYPE && normalize_url(&r.target) == wanted)
        {
            return existing.id.clone();
        }
        let id = self.next_id();
        self.entries.push(Relationship {
            id: id.clone(),
            rel_type: HYPERLINK_REL_TYPE.to_string(),
            target: url.to_string(),
            target_mode: Some("External".to_string()),
        });
        id
    }

    /// True iff some relationship entry has this ID.
    pub fn contains_id(&self, id: &str) -> bool {
        self.entries.iter().any(|r| r.id == id)
    }

    /// `rIdN` with N strictly greater than every existing numeric suffix.
    fn next_id(&self) -> String {
        let max = self
            .entries
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.org/a" TargetMode="External"/></Relationships>"#;

    #[test]
    fn parse_and_reuse_existing_hyperlinks() {
        let mut rels = Relationships::parse(SAMPLE).unwrap();
        assert_eq!(rels.len(), 2);
        // Normalized match reuses the entry.
        assert_eq!(rels.hyperlink_id("https://Example.org/a/"), "rId7");
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn new_ids_are_strictly_greater() {
        let mut rels = Relationships::parse(SAMPLE).unwrap();
        let id = rels.hyperlink_id("https://example.org/b");
        assert_eq!(id, "rId8");
        assert_eq!(rels.len(), 3);
        // Same URL again reuses the fresh entry.
        assert_eq!(rels.hyperlink_id("https://example.org/b"), "rId8");
    }

    #[test]
    fn roundtrip_keeps_declaration_and_namespace() {
        let rels = Relationships::parse(SAMPLE).unwrap();
        let xml = rels.to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains(RELATIONSHIPS_NS));
        let reparsed = Relationships::parse(&xml).unwrap();
        assert_eq!(reparsed.len(), 2);
        assert!(xml.contains("TargetMode=\"External\""));
    }

    #[test]
    fn empty_sidecar_starts_at_rid1() {
        let mut rels = Relationships::new();
        assert_eq!(rels.hyperlink_id("https://example.org"), "rId1");
    }
}
