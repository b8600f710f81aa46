//! [`PdfEngine`] over the `lopdf` object model.

mod content;
mod fonts;
mod objects;
mod outline;
mod page;

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use lopdf::{Document, ObjectId};
use serde_json::{json, Value};

use self::fonts::FontCache;
use super::{DecodedPage, EngineSource, PdfEngine, RawPage};
use crate::detect;
use crate::error::{Error, Result};
use crate::parser::{DecodeConfig, DecodeMode};
use crate::timings::{page_key, TimingCollector, DECODE_DOCUMENT};

struct LoadedDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    /// Decoded fonts per page index.
    fonts: HashMap<usize, FontCache>,
}

/// Engine decoding pages with `lopdf`.
///
/// Documents stay parsed in memory until unloaded; per-page font decodes are
/// cached until the page is unloaded.
#[derive(Default)]
pub struct LopdfEngine {
    docs: BTreeMap<String, LoadedDocument>,
}

impl std::fmt::Debug for LopdfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfEngine")
            .field("documents", &self.docs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(source: EngineSource<'_>) -> Result<Document> {
        match source {
            EngineSource::Path(path) => {
                let format = detect::detect_format_from_path(path)?;
                log::debug!("{} detected in {}", format, path.display());
                Ok(Document::load(path)?)
            }
            EngineSource::Bytes(bytes) => {
                let format = detect::detect_format_from_bytes(bytes)?;
                log::debug!("{} detected in {} bytes", format, bytes.len());
                Ok(Document::load_mem(bytes)?)
            }
        }
    }

    fn decode(
        &mut self,
        handle: &str,
        page_index: usize,
        config: &DecodeConfig,
    ) -> Option<DecodedPage> {
        let loaded = self.docs.get_mut(handle)?;
        let page_id = *loaded.pages.get(page_index)?;
        let fonts = loaded.fonts.entry(page_index).or_default();
        match page::decode_page(&loaded.doc, page_id, page_index, fonts, config) {
            Ok(page) => Some(page),
            Err(e) => {
                log::warn!("failed to decode page {} of key={}: {}", page_index + 1, handle, e);
                None
            }
        }
    }
}

impl PdfEngine for LopdfEngine {
    fn load_document(
        &mut self,
        handle: &str,
        source: EngineSource<'_>,
        password: Option<&str>,
    ) -> bool {
        if self.docs.contains_key(handle) {
            log::debug!("key={} already loaded", handle);
            return true;
        }

        let doc = match Self::open(source) {
            Ok(doc) => doc,
            Err(Error::UnknownFormat) => {
                log::warn!("key={} is not a PDF", handle);
                return false;
            }
            Err(e) => {
                log::warn!("failed to parse key={}: {}", handle, e);
                return false;
            }
        };
        if password.is_some() && doc.is_encrypted() {
            log::warn!("password given for key={} but lopdf opens documents without it", handle);
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        log::info!("loaded key={} ({} pages)", handle, pages.len());
        self.docs.insert(
            handle.to_string(),
            LoadedDocument {
                doc,
                pages,
                fonts: HashMap::new(),
            },
        );
        true
    }

    fn unload_document(&mut self, handle: &str) -> bool {
        self.docs.remove(handle).is_some()
    }

    fn unload_page(&mut self, handle: &str, page_index: usize) -> bool {
        match self.docs.get_mut(handle) {
            Some(loaded) if page_index < loaded.pages.len() => {
                loaded.fonts.remove(&page_index);
                true
            }
            _ => false,
        }
    }

    fn is_loaded(&self, handle: &str) -> bool {
        self.docs.contains_key(handle)
    }

    fn number_of_pages(&self, handle: &str) -> Option<usize> {
        self.docs.get(handle).map(|d| d.pages.len())
    }

    fn decode_page(
        &mut self,
        handle: &str,
        page_index: usize,
        config: &DecodeConfig,
        mode: DecodeMode,
    ) -> Option<RawPage> {
        let page = self.decode(handle, page_index, config)?;
        Some(match mode {
            DecodeMode::Structured => RawPage::Structured(Box::new(page)),
            DecodeMode::Serialized => RawPage::Serialized(page.to_serialized()),
        })
    }

    fn decode_document(&mut self, handle: &str, config: &DecodeConfig) -> Option<Value> {
        let total = self.number_of_pages(handle)?;
        let start = Instant::now();
        let mut timings = TimingCollector::new();
        let mut pages = Vec::with_capacity(total);

        for index in 0..total {
            let page_start = Instant::now();
            let page = self.decode(handle, index, config)?;
            timings.add(page_key(index), page_start.elapsed().as_secs_f64());
            pages.push(page.to_serialized());
        }
        timings.add(DECODE_DOCUMENT, start.elapsed().as_secs_f64());

        Some(json!({
            "timings": timings.totals(),
            "pages": pages,
        }))
    }

    fn get_meta_xml(&self, handle: &str) -> Option<String> {
        outline::meta_xml(&self.docs.get(handle)?.doc)
    }

    fn get_table_of_contents(&self, handle: &str) -> Option<Value> {
        outline::table_of_contents(&self.docs.get(handle)?.doc)
    }

    fn get_annotations(&self, handle: &str) -> Option<Value> {
        Some(outline::annotations(&self.docs.get(handle)?.doc))
    }

    fn list_loaded_handles(&self) -> Vec<String> {
        self.docs.keys().cloned().collect()
    }
}
