//! Document loading and per-document sessions.

mod options;
mod session;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

pub use options::{DecodeConfig, DecodeMode, LoadOptions};
pub use session::{DocumentSession, PageIter};

use crate::assemble::PageAssembler;
use crate::engine::{EngineRegistry, EngineSource, LopdfEngine, PdfEngine};
use crate::error::{Error, Result};
use crate::timings::{
    TimingCollector, PROCESS_DOCUMENT_FROM_BYTESIO, PROCESS_DOCUMENT_FROM_FILE,
};

/// Chunk size used when hashing a stream.
const HASH_CHUNK: usize = 8192;

/// Anything a document can be streamed from.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Where a document comes from.
pub enum DocumentSource<'a> {
    /// Handle is the path string.
    Path(&'a Path),
    /// Handle is the hex SHA-256 of the content, so equal bytes share it.
    Stream(&'a mut dyn ReadSeek),
}

impl<'a> DocumentSource<'a> {
    pub fn path<P: AsRef<Path> + ?Sized>(path: &'a P) -> Self {
        DocumentSource::Path(path.as_ref())
    }

    pub fn stream(reader: &'a mut dyn ReadSeek) -> Self {
        DocumentSource::Stream(reader)
    }
}

/// Read `reader` to the end, hashing as it goes, then seek back.
///
/// Returns the hex digest and the bytes read.
pub fn digest_stream(reader: &mut dyn ReadSeek) -> Result<(String, Vec<u8>)> {
    let start = reader.stream_position()?;
    let mut hasher = Sha256::new();
    let mut bytes = Vec::new();
    let mut chunk = [0u8; HASH_CHUNK];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
        bytes.extend_from_slice(&chunk[..n]);
    }

    reader.seek(SeekFrom::Start(start))?;
    Ok((hex::encode(hasher.finalize()), bytes))
}

/// Opens documents in an engine and hands out sessions over them.
///
/// # Example
///
/// ```no_run
/// use segpdf::{DecodeConfig, DecodeMode, DocumentParser, DocumentSource, LoadOptions};
///
/// let parser = DocumentParser::new();
/// let mut session = parser.load(DocumentSource::path("paper.pdf"), &LoadOptions::default())?;
/// let page = session.get_page(1, DecodeMode::Structured, &DecodeConfig::default())?;
/// println!("{}", page.text());
/// # Ok::<(), segpdf::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DocumentParser {
    registry: Arc<EngineRegistry>,
    assembler: PageAssembler,
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser {
    /// Parser backed by [`LopdfEngine`].
    pub fn new() -> Self {
        Self::with_engine(LopdfEngine::new())
    }

    pub fn with_engine<E: PdfEngine + 'static>(engine: E) -> Self {
        Self {
            registry: Arc::new(EngineRegistry::new(engine)),
            assembler: PageAssembler::new(),
        }
    }

    /// Replace the assembler, e.g. to plug in another sanitizer.
    pub fn with_assembler(mut self, assembler: PageAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Load a document and open a session over it.
    ///
    /// Eager options decode every page before returning.
    pub fn load(&self, source: DocumentSource<'_>, options: &LoadOptions) -> Result<DocumentSession> {
        let password = options.password.as_deref();
        let mut timings = TimingCollector::new();

        let (handle, loaded) = match source {
            DocumentSource::Path(path) => {
                let handle = path.to_string_lossy().into_owned();
                let loaded = timings.time(PROCESS_DOCUMENT_FROM_FILE, || {
                    self.registry.with_engine(|engine| {
                        engine.load_document(&handle, EngineSource::Path(path), password)
                    })
                })?;
                (handle, loaded)
            }
            DocumentSource::Stream(reader) => {
                let (handle, bytes) = digest_stream(reader)?;
                let loaded = timings.time(PROCESS_DOCUMENT_FROM_BYTESIO, || {
                    self.registry.with_engine(|engine| {
                        engine.load_document(&handle, EngineSource::Bytes(&bytes), password)
                    })
                })?;
                (handle, loaded)
            }
        };

        if !loaded {
            log::error!("engine failed to load key={}", handle);
            return Err(Error::Load(format!("key={}", handle)));
        }
        log::debug!(
            "loaded key={} in {:.3}s",
            handle,
            timings.totals().values().sum::<f64>()
        );

        let mut session = DocumentSession::new(
            handle,
            &self.registry,
            options.boundary_type,
            self.assembler.clone(),
        );
        if !options.lazy {
            if let Err(e) = session.load_all_pages(&DecodeConfig::default()) {
                log::error!("eager load of key={} failed: {}", session.handle(), e);
                session.unload();
                return Err(e);
            }
        }
        Ok(session)
    }

    /// Lazy, crop box, no password.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<DocumentSession> {
        self.load(DocumentSource::Path(path.as_ref()), &LoadOptions::default())
    }

    /// Handles of every document resident in the engine.
    pub fn list_loaded_keys(&self) -> Result<Vec<String>> {
        self.registry.list_loaded_handles()
    }
}
