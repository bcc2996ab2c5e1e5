//! # Raw Waveform File Reader - Core Library
//!
//! Reads binary circuit-simulation raw files: a text header describing the
//! variables, followed by a block of 64-bit floating-point samples.
//!
//! ## File Layout
//!
//! ```text
//! Flags: real
//! No. Variables: 3
//! No. Points: 1000
//! Variables:
//! 0\t\ttime\t\ts
//! 1\t\tin\t\tV
//! 2\t\tout\t\tV
//! Binary:
//! <num_points * num_variables f64 values, sample-major>
//! ```
//!
//! Complex files (`Flags: complex`) store every value as an adjacent
//! (real, imaginary) pair.
//!
//! ## Features
//!
//! - Header parsing with ASCII decoding and a Latin-1 fallback
//! - Selection by variable name or by column index
//! - Whole-file decoding through a memory map
//! - Chunked decoding that streams one sample point at a time
//! - Structured logging via `tracing` for diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rawwave_core::{list_variables, load_variables, ReadStrategy, Selection};
//!
//! let catalog = list_variables("simulation.raw").unwrap();
//! print!("{}", catalog);
//!
//! let data = load_variables(
//!     "simulation.raw",
//!     &Selection::names(["time", "out"]),
//!     ReadStrategy::Chunked,
//! )
//! .unwrap();
//! if let Some(out) = data.get("out") {
//!     println!("out: {} points", out.len());
//! }
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//!
//! let catalog = rawwave_core::list_variables("simulation.raw").unwrap();
//! ```

mod decoder;
mod header;
mod selection;
mod types;

use std::io::BufReader;
use std::path::Path;
use tracing::instrument;

// Re-export public types
pub use types::{
    // Metadata
    CatalogInfo,
    Encoding,
    VariableCatalog,
    // Results
    SignalMatrix,
    VectorData,
    VectorView,
    WaveformData,
    // Error types
    Result,
    WaveformError,
    // Constants
    VALUE_SIZE,
};

pub use selection::{ReadStrategy, Selection, SelectionItem};

// Re-export lower-level building blocks for advanced use
pub use decoder::decode;
pub use header::{decode_line, parse_header, LineDecoding, LINE_DECODINGS};

// ============================================================================
// Public API Functions
// ============================================================================

/// Read the header of a raw file.
///
/// # Returns
/// * `Ok((catalog, offset))` - Metadata and the byte offset of the binary block
/// * `Err(WaveformError)` - `FileNotFound` or `MalformedHeader`
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<(VariableCatalog, u64)> {
    let file = decoder::open_file(path.as_ref())?;
    header::parse_header(&mut BufReader::new(file))
}

/// List the variables of a raw file.
///
/// # Example
/// ```rust,no_run
/// let catalog = rawwave_core::list_variables("simulation.raw").unwrap();
/// for (name, unit) in catalog.names().iter().zip(catalog.units()) {
///     println!("{} [{}]", name, unit);
/// }
/// println!("{:?}", catalog.info());
/// ```
pub fn list_variables<P: AsRef<Path>>(path: P) -> Result<VariableCatalog> {
    read_header(path).map(|(catalog, _)| catalog)
}

/// Load the selected variables of a raw file.
///
/// A by-name selection yields [`WaveformData::ByName`], a by-index
/// selection yields [`WaveformData::ByIndex`] with rows in selection order.
/// Both strategies return identical values.
///
/// # Example
/// ```rust,no_run
/// use rawwave_core::{load_variables, ReadStrategy, Selection};
///
/// let selection = Selection::indices([0, 2]);
/// let data = load_variables("simulation.raw", &selection, ReadStrategy::WholeFile).unwrap();
/// let matrix = data.as_matrix().unwrap();
/// println!("shape: {:?}", matrix.shape());
/// ```
#[instrument(skip_all, fields(path = %path.as_ref().display(), %strategy))]
pub fn load_variables<P: AsRef<Path>>(
    path: P,
    selection: &Selection,
    strategy: ReadStrategy,
) -> Result<WaveformData> {
    let file = decoder::open_file(path.as_ref())?;
    let mut reader = BufReader::new(file);
    let (catalog, binary_offset) = header::parse_header(&mut reader)?;
    decoder::decode(
        reader.into_inner(),
        &catalog,
        binary_offset,
        selection,
        strategy,
    )
}
