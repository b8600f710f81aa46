//! Per-stage timing telemetry.
//!
//! Keys come in two flavours. Static keys name a fixed pipeline stage
//! (`decode_page`, `create_word_cells`, ...). Dynamic keys are parameterised
//! per occurrence, e.g. `decode_font: Helvetica` or `decoding page 3`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};

pub const DECODE_PAGE: &str = "decode_page";
pub const DECODE_DIMENSIONS: &str = "decode_dimensions";
pub const DECODE_RESOURCES: &str = "decode_resources";
pub const DECODE_GRPHS: &str = "decode_grphs";
pub const DECODE_FONTS: &str = "decode_fonts";
pub const DECODE_XOBJECTS: &str = "decode_xobjects";
pub const DECODE_CONTENTS: &str = "decode_contents";
pub const DECODE_ANNOTS: &str = "decode_annots";
pub const SANITISE_CONTENTS: &str = "sanitise_contents";
pub const CREATE_WORD_CELLS: &str = "create_word_cells";
pub const CREATE_LINE_CELLS: &str = "create_line_cells";
pub const DECODE_FONTS_TOTAL: &str = "decode_fonts_total";
pub const PROCESS_DOCUMENT_FROM_FILE: &str = "process_document_from_file";
pub const PROCESS_DOCUMENT_FROM_BYTESIO: &str = "process_document_from_bytesio";
pub const DECODE_DOCUMENT: &str = "decode_document";

/// The closed set of pipeline stage names.
pub const STATIC_TIMING_KEYS: &[&str] = &[
    DECODE_PAGE,
    DECODE_DIMENSIONS,
    DECODE_RESOURCES,
    DECODE_GRPHS,
    DECODE_FONTS,
    DECODE_XOBJECTS,
    DECODE_CONTENTS,
    DECODE_ANNOTS,
    SANITISE_CONTENTS,
    CREATE_WORD_CELLS,
    CREATE_LINE_CELLS,
    DECODE_FONTS_TOTAL,
    PROCESS_DOCUMENT_FROM_FILE,
    PROCESS_DOCUMENT_FROM_BYTESIO,
    DECODE_DOCUMENT,
];

/// Prefix of the per-font decode key.
pub const DECODE_FONT_PREFIX: &str = "decode_font: ";
/// Prefix of the per-page key emitted by bulk document decodes.
pub const DECODING_PAGE_PREFIX: &str = "decoding page ";
/// Prefix of the per-page decode key.
pub const DECODE_PAGE_PREFIX: &str = "decode_page ";

/// Whether `key` names one of the fixed pipeline stages.
pub fn is_static_timing_key(key: &str) -> bool {
    STATIC_TIMING_KEYS.contains(&key)
}

pub fn static_timing_keys() -> BTreeSet<&'static str> {
    STATIC_TIMING_KEYS.iter().copied().collect()
}

/// Key for the decode of a single font.
pub fn font_key(font_name: &str) -> String {
    format!("{}{}", DECODE_FONT_PREFIX, font_name)
}

/// Key for a single page inside a bulk document decode.
pub fn page_key(page_index: usize) -> String {
    format!("{}{}", DECODING_PAGE_PREFIX, page_index)
}

/// Accumulates elapsed seconds per key.
///
/// Every sample is appended to the key's raw list and added to its summed
/// total; repeated keys never overwrite.
#[derive(Debug, Clone, Default)]
pub struct TimingCollector {
    totals: BTreeMap<String, f64>,
    samples: BTreeMap<String, Vec<f64>>,
}

impl TimingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample for `key`.
    pub fn add(&mut self, key: impl Into<String>, seconds: f64) {
        let key = key.into();
        *self.totals.entry(key.clone()).or_insert(0.0) += seconds;
        self.samples.entry(key).or_default().push(seconds);
    }

    /// Run `f` and record its wall time under `key`.
    pub fn time<T>(&mut self, key: impl Into<String>, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.add(key, start.elapsed().as_secs_f64());
        out
    }

    /// Fold another collector's samples into this one.
    pub fn merge(&mut self, other: &TimingCollector) {
        for (key, samples) in &other.samples {
            for &s in samples {
                self.add(key.clone(), s);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn total_for(&self, key: &str) -> f64 {
        self.totals.get(key).copied().unwrap_or(0.0)
    }

    pub fn totals(&self) -> &BTreeMap<String, f64> {
        &self.totals
    }

    /// Summed values only, as the serialized pipeline reports them.
    pub fn summed(&self) -> Timings {
        Timings::from_summed(self.totals.clone())
    }

    /// Summed values plus raw samples.
    pub fn to_timings(&self) -> Timings {
        Timings {
            data: self.totals.clone(),
            raw_data: self.samples.clone(),
        }
    }
}

/// Timing snapshot returned alongside a freshly decoded page.
///
/// `raw_data` may lack a key that `data` has: the serialized pipeline only
/// reports summed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub data: BTreeMap<String, f64>,
    #[serde(default)]
    pub raw_data: BTreeMap<String, Vec<f64>>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_summed(data: BTreeMap<String, f64>) -> Self {
        Self {
            data,
            raw_data: BTreeMap::new(),
        }
    }

    /// Sum of every summed value, static and dynamic.
    pub fn total(&self) -> f64 {
        self.data.values().sum()
    }

    /// Summed seconds for `key`, 0.0 when absent.
    pub fn get(&self, key: &str) -> f64 {
        self.data.get(key).copied().unwrap_or(0.0)
    }

    /// Raw samples for `key`; empty when only the sum is known.
    pub fn get_all(&self, key: &str) -> &[f64] {
        self.raw_data.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_count(&self, key: &str) -> usize {
        self.get_all(key).len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn has_raw_samples(&self) -> bool {
        !self.raw_data.is_empty()
    }

    pub fn static_timings(&self) -> BTreeMap<&str, f64> {
        self.data
            .iter()
            .filter(|(k, _)| is_static_timing_key(k))
            .map(|(k, v)| (k.as_str(), *v))
            .collect()
    }

    pub fn dynamic_timings(&self) -> BTreeMap<&str, f64> {
        self.data
            .iter()
            .filter(|(k, _)| !is_static_timing_key(k))
            .map(|(k, v)| (k.as_str(), *v))
            .collect()
    }

    pub fn static_keys() -> BTreeSet<&'static str> {
        static_timing_keys()
    }
}
