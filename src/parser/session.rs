//! One loaded document: page cache and memoized document facts.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, Weak};

use rayon::prelude::*;
use serde_json::Value;

use super::options::{DecodeConfig, DecodeMode};
use crate::assemble::{Assembled, AssemblyReport, CellOrigin, PageAssembler};
use crate::engine::EngineRegistry;
use crate::error::{Error, Result};
use crate::model::{
    BoundaryType, DocumentAnnotations, PdfMetadata, SegmentedPage, TocEntry,
};
use crate::timings::Timings;

/// Logs fallback segmentation once per kind at `warn`, then at `debug`.
#[derive(Debug, Default)]
struct FallbackLog {
    words: bool,
    lines: bool,
}

impl FallbackLog {
    fn note(&mut self, handle: &str, page_no: usize, report: &AssemblyReport) {
        Self::note_kind(&mut self.words, "words", handle, page_no, report.words);
        Self::note_kind(&mut self.lines, "lines", handle, page_no, report.lines);
    }

    fn note_kind(warned: &mut bool, kind: &str, handle: &str, page_no: usize, origin: CellOrigin) {
        let message = match origin {
            CellOrigin::Derived => format!(
                "`{}` will be created for page {} of key={} in an inefficient way",
                kind, page_no, handle
            ),
            CellOrigin::Unavailable => format!(
                "`{}` requested for page {} of key={} but no char cells were kept",
                kind, page_no, handle
            ),
            CellOrigin::Engine | CellOrigin::NotRequested => return,
        };

        if *warned {
            log::debug!("{}", message);
        } else {
            log::warn!("{}", message);
            *warned = true;
        }
    }
}

/// A document loaded into the engine, and the pages decoded from it.
///
/// Pages are cached by page number until evicted through
/// [`unload_pages`](Self::unload_pages) or [`unload`](Self::unload). The
/// session does not own the engine: once its registry is gone, every
/// operation except `unload` fails with [`Error::State`].
#[derive(Debug)]
pub struct DocumentSession {
    handle: String,
    registry: Weak<EngineRegistry>,
    boundary: BoundaryType,
    assembler: PageAssembler,
    pages: BTreeMap<usize, Arc<SegmentedPage>>,
    meta: Option<Option<Arc<PdfMetadata>>>,
    toc: Option<Option<Arc<TocEntry>>>,
    annotations: Option<Option<Arc<DocumentAnnotations>>>,
    fallback_log: FallbackLog,
    unloaded: bool,
}

impl DocumentSession {
    pub(crate) fn new(
        handle: String,
        registry: &Arc<EngineRegistry>,
        boundary: BoundaryType,
        assembler: PageAssembler,
    ) -> Self {
        Self {
            handle,
            registry: Arc::downgrade(registry),
            boundary,
            assembler,
            pages: BTreeMap::new(),
            meta: None,
            toc: None,
            annotations: None,
            fallback_log: FallbackLog::default(),
            unloaded: false,
        }
    }

    /// Engine handle of this document.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Default page box for decodes that do not name one.
    pub fn boundary(&self) -> BoundaryType {
        self.boundary
    }

    fn registry(&self) -> Result<Arc<EngineRegistry>> {
        if self.unloaded {
            return Err(Error::not_loaded(&self.handle));
        }
        self.registry
            .upgrade()
            .ok_or_else(|| Error::not_loaded(&self.handle))
    }

    pub fn is_loaded(&self) -> bool {
        match self.registry() {
            Ok(registry) => registry.is_loaded(&self.handle).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub fn number_of_pages(&self) -> Result<usize> {
        self.registry()?
            .with_engine(|engine| engine.number_of_pages(&self.handle))?
            .ok_or_else(|| Error::not_loaded(&self.handle))
    }

    /// Config as sent to the engine: the page box is always explicit.
    fn effective(&self, config: &DecodeConfig) -> DecodeConfig {
        let mut config = config.clone();
        config.page_boundary.get_or_insert(self.boundary);
        config
    }

    fn check_page_no(&self, page_no: usize) -> Result<()> {
        let max = self.number_of_pages()?;
        if page_no < 1 || page_no > max {
            return Err(Error::page_out_of_range(page_no, &self.handle, max));
        }
        Ok(())
    }

    fn decode(&mut self, page_no: usize, mode: DecodeMode, config: &DecodeConfig) -> Result<Assembled> {
        self.check_page_no(page_no)?;
        let config = self.effective(config);
        let handle = self.handle.as_str();

        let raw = self
            .registry()?
            .with_engine(|engine| engine.decode_page(handle, page_no - 1, &config, mode))?
            .ok_or_else(|| {
                log::error!("engine returned no record for page {} of key={}", page_no, handle);
                Error::Decode(format!("no record for page {} of key={}", page_no, handle))
            })?;

        let assembled = self.assembler.assemble(raw, &config)?;
        self.fallback_log.note(&self.handle, page_no, &assembled.report);
        Ok(assembled)
    }

    /// Page `page_no` (1-based), decoded on first access and cached after.
    pub fn get_page(
        &mut self,
        page_no: usize,
        mode: DecodeMode,
        config: &DecodeConfig,
    ) -> Result<Arc<SegmentedPage>> {
        self.check_page_no(page_no)?;
        if let Some(page) = self.pages.get(&page_no) {
            return Ok(Arc::clone(page));
        }

        let page = Arc::new(self.decode(page_no, mode, config)?.page);
        self.pages.insert(page_no, Arc::clone(&page));
        Ok(page)
    }

    /// Fresh decode of `page_no` with the timings of this very call.
    ///
    /// Neither reads nor fills the page cache.
    pub fn get_page_with_timings(
        &mut self,
        page_no: usize,
        mode: DecodeMode,
        config: &DecodeConfig,
    ) -> Result<(SegmentedPage, Timings)> {
        let assembled = self.decode(page_no, mode, config)?;
        Ok((assembled.page, assembled.timings))
    }

    /// Decode every page in one engine call and cache all of them.
    ///
    /// Returns the document-level timings of the bulk call.
    pub fn load_all_pages(&mut self, config: &DecodeConfig) -> Result<Timings> {
        let config = self.effective(config);
        let handle = self.handle.as_str();

        let document = self
            .registry()?
            .with_engine(|engine| engine.decode_document(handle, &config))?
            .ok_or_else(|| Error::Decode(format!("no document record for key={}", handle)))?;
        let pages = document
            .get("pages")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::missing("pages"))?;

        let assembler = &self.assembler;
        let assembled = pages
            .par_iter()
            .enumerate()
            .map(|(i, page)| {
                let page_no = page
                    .get("page_number")
                    .and_then(Value::as_u64)
                    .map_or(i + 1, |n| n as usize);
                assembler
                    .assemble_serialized(page, &config)
                    .map(|a| (page_no, a))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("decoded {} pages of key={} in bulk", assembled.len(), self.handle);
        for (page_no, a) in assembled {
            self.fallback_log.note(&self.handle, page_no, &a.report);
            self.pages.insert(page_no, Arc::new(a.page));
        }

        let summed = match document.get("timings") {
            Some(t) => serde_json::from_value(t.clone())
                .map_err(|e| Error::ContractViolation(format!("malformed `timings`: {}", e)))?,
            None => BTreeMap::new(),
        };
        Ok(Timings::from_summed(summed))
    }

    /// Iterate pages `1..=N` through the cache.
    pub fn iterate_pages(&mut self, mode: DecodeMode, config: &DecodeConfig) -> Result<PageIter<'_>> {
        let total = self.number_of_pages()?;
        Ok(PageIter {
            session: self,
            next: 1,
            total,
            mode,
            config: config.clone(),
        })
    }

    /// Numbers of the pages currently cached, ascending.
    pub fn cached_pages(&self) -> Vec<usize> {
        self.pages.keys().copied().collect()
    }

    /// Evict cached pages in `[range.start, range.end)`.
    ///
    /// Returns how many pages were evicted.
    pub fn unload_pages(&mut self, range: Range<usize>) -> Result<usize> {
        let registry = self.registry()?;
        if range.start >= range.end {
            return Ok(0);
        }

        let evicted: Vec<usize> = self.pages.range(range).map(|(k, _)| *k).collect();
        let handle = self.handle.as_str();
        registry.with_engine(|engine| {
            for page_no in &evicted {
                if !engine.unload_page(handle, page_no - 1) {
                    log::debug!("engine kept no state for page {} of key={}", page_no, handle);
                }
            }
        })?;
        for page_no in &evicted {
            self.pages.remove(page_no);
        }
        Ok(evicted.len())
    }

    /// Release the document. `false` when it was already unloaded.
    pub fn unload(&mut self) -> bool {
        if self.unloaded {
            return false;
        }
        self.pages.clear();
        self.meta = None;
        self.toc = None;
        self.annotations = None;

        let released = match self.registry.upgrade() {
            Some(registry) => registry
                .with_engine(|engine| engine.unload_document(&self.handle))
                .unwrap_or(false),
            None => false,
        };
        self.unloaded = true;
        log::debug!("unloaded key={} (engine released: {})", self.handle, released);
        released
    }

    /// XMP metadata, `None` when the document has none.
    pub fn get_meta(&mut self) -> Result<Option<Arc<PdfMetadata>>> {
        if let Some(meta) = &self.meta {
            return Ok(meta.clone());
        }
        let xml = self
            .registry()?
            .with_engine(|engine| engine.get_meta_xml(&self.handle))?;
        let meta = xml.map(|xml| Arc::new(PdfMetadata::from_xml(xml)));
        self.meta = Some(meta.clone());
        Ok(meta)
    }

    /// Outline under a `<root>` node, `None` when the document has none.
    pub fn get_table_of_contents(&mut self) -> Result<Option<Arc<TocEntry>>> {
        if let Some(toc) = &self.toc {
            return Ok(toc.clone());
        }
        let value = self
            .registry()?
            .with_engine(|engine| engine.get_table_of_contents(&self.handle))?;
        let toc = value
            .map(|v| -> Result<Arc<TocEntry>> {
                let children: Vec<TocEntry> = serde_json::from_value(v).map_err(|e| {
                    Error::ContractViolation(format!("malformed table of contents: {}", e))
                })?;
                Ok(Arc::new(TocEntry::root(children)))
            })
            .transpose()?;
        self.toc = Some(toc.clone());
        Ok(toc)
    }

    pub fn get_annotations(&mut self) -> Result<Option<Arc<DocumentAnnotations>>> {
        if let Some(annotations) = &self.annotations {
            return Ok(annotations.clone());
        }
        let value = self
            .registry()?
            .with_engine(|engine| engine.get_annotations(&self.handle))?;
        let annotations = value
            .map(|v| -> Result<Arc<DocumentAnnotations>> {
                let a = serde_json::from_value(v).map_err(|e| {
                    Error::ContractViolation(format!("malformed annotations: {}", e))
                })?;
                Ok(Arc::new(a))
            })
            .transpose()?;
        self.annotations = Some(annotations.clone());
        Ok(annotations)
    }
}

/// Pages of a session in order, see [`DocumentSession::iterate_pages`].
pub struct PageIter<'s> {
    session: &'s mut DocumentSession,
    next: usize,
    total: usize,
    mode: DecodeMode,
    config: DecodeConfig,
}

impl Iterator for PageIter<'_> {
    type Item = Result<(usize, Arc<SegmentedPage>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.total {
            return None;
        }
        let page_no = self.next;
        self.next += 1;
        Some(
            self.session
                .get_page(page_no, self.mode, &self.config)
                .map(|page| (page_no, page)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total + 1).saturating_sub(self.next);
        (left, Some(left))
    }
}
