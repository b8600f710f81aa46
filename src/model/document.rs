//! Document-level facts: outline, annotations and XMP metadata.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Title of the synthetic node holding the top-level outline entries.
pub const TOC_ROOT_TITLE: &str = "<root>";

/// One outline (bookmark) entry.
///
/// The engine guarantees a tree; children are owned, so a cycle cannot be
/// represented here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    #[serde(default)]
    pub title: String,

    /// Nesting level, 0 = top level. `None` for the synthetic root.
    #[serde(default)]
    pub level: Option<u32>,

    /// Target page (1-indexed).
    #[serde(default)]
    pub page: Option<u32>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, level: u32, page: Option<u32>) -> Self {
        Self {
            title: title.into(),
            level: Some(level),
            page,
            children: Vec::new(),
        }
    }

    /// The `<root>` node wrapping the top-level entries.
    pub fn root(children: Vec<TocEntry>) -> Self {
        Self {
            title: TOC_ROOT_TITLE.to_string(),
            level: None,
            page: None,
            children,
        }
    }

    pub fn is_root(&self) -> bool {
        self.level.is_none() && self.title == TOC_ROOT_TITLE
    }

    /// Number of entries below this node.
    pub fn total_entries(&self) -> usize {
        self.children.iter().map(|c| 1 + c.total_entries()).sum()
    }

    /// Depth-first walk over the descendants.
    pub fn walk(&self) -> Vec<&TocEntry> {
        fn visit<'a>(entry: &'a TocEntry, out: &mut Vec<&'a TocEntry>) {
            for child in &entry.children {
                out.push(child);
                visit(child, out);
            }
        }
        let mut out = Vec::new();
        visit(self, &mut out);
        out
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<TocEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TocEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Document annotations: form fields, language, metadata and outline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnnotations {
    #[serde(default)]
    pub form: Option<serde_json::Value>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub meta_xml: Option<String>,
    #[serde(default)]
    pub table_of_contents: Option<Vec<TocEntry>>,
}

impl DocumentAnnotations {
    pub fn is_empty(&self) -> bool {
        self.form.is_none()
            && self.language.is_none()
            && self.meta_xml.is_none()
            && self.table_of_contents.is_none()
    }
}

/// XMP metadata packet and the simple properties found in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub xml: String,
    /// Qualified property name (`dc:format`, `xmp:CreateDate`, ...) to value.
    pub data: BTreeMap<String, String>,
}

fn element_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([\w.-]+:[\w.-]+)(?:\s[^>]*)?>([^<]*)</([\w.-]+:[\w.-]+)>")
            .expect("static element pattern")
    })
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\s([\w.-]+:[\w.-]+)="([^"]*)""#).expect("static attribute pattern")
    })
}

fn list_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<([\w.-]+:[\w.-]+)>\s*<rdf:(?:Alt|Seq|Bag)>\s*<rdf:li[^>]*>([^<]*)</rdf:li>")
            .expect("static list pattern")
    })
}

impl PdfMetadata {
    /// Parse the simple properties out of an XMP packet.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        let xml = xml.into();
        let mut data = BTreeMap::new();

        for cap in attribute_regex().captures_iter(&xml) {
            let key = &cap[1];
            if key.starts_with("xmlns:") || key.starts_with("xml:") || key.starts_with("rdf:") {
                continue;
            }
            insert_value(&mut data, key, &cap[2]);
        }

        for cap in element_regex().captures_iter(&xml) {
            if cap[1] != cap[3] || cap[1].starts_with("rdf:") {
                continue;
            }
            insert_value(&mut data, &cap[1], &cap[2]);
        }

        // dc:title and friends wrap their value in rdf:Alt/Seq/Bag
        for cap in list_item_regex().captures_iter(&xml) {
            insert_value(&mut data, &cap[1], &cap[2]);
        }

        Self { xml, data }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("dc:title")
    }

    pub fn producer(&self) -> Option<&str> {
        self.get("pdf:Producer")
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.get("xmp:CreateDate").and_then(parse_xmp_date)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.get("xmp:ModifyDate").and_then(parse_xmp_date)
    }
}

fn insert_value(data: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        data.entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }
}

/// Parse an XMP date (ISO 8601, offset optional).
fn parse_xmp_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| {
            NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
                chrono::NaiveDate::parse_from_str(s, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}
