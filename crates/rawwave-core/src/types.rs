//! Common types, errors, and constants for raw file operations

use num_complex::Complex64;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Size in bytes of one stored floating-point value
pub const VALUE_SIZE: usize = 8;

/// Sentinel line that switches from header to variable-list mode
pub const VARIABLES_MARKER: &str = "Variables:";
/// Sentinel line that ends the text header
pub const BINARY_MARKER: &str = "Binary:";

pub const FLAGS_KEY: &str = "Flags:";
pub const NUM_VARIABLES_KEY: &str = "No. Variables:";
pub const NUM_POINTS_KEY: &str = "No. Points:";

/// Field separator used on variable-list lines
pub const VARIABLE_FIELD_SEPARATOR: &str = "\t\t";

// ============================================================================
// Error Types
// ============================================================================

/// Error type for raw file reading operations
#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Variable \"{0}\" not contained in file")]
    UnknownVariable(String),

    #[error("Index of variable is out of bounds: {index} (file has {num_variables} variables)")]
    IndexOutOfRange { index: usize, num_variables: usize },

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Truncated data: expected {expected} bytes of binary data, found {found}")]
    TruncatedData { expected: u64, found: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaveformError {
    pub fn malformed<S: Into<String>>(s: S) -> Self {
        Self::MalformedHeader(s.into())
    }

    pub fn invalid_selection<S: Into<String>>(s: S) -> Self {
        Self::InvalidSelection(s.into())
    }
}

pub type Result<T> = std::result::Result<T, WaveformError>;

// ============================================================================
// Enums
// ============================================================================

/// Numeric encoding of the binary block, taken from the `Flags:` header line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// One f64 per value
    #[default]
    Real,
    /// Two adjacent f64 per value: real part, then imaginary part
    Complex,
}

impl Encoding {
    /// `"real"` selects [`Encoding::Real`]; any other flag is treated as complex.
    pub fn from_flag(flag: &str) -> Self {
        if flag == "real" {
            Encoding::Real
        } else {
            Encoding::Complex
        }
    }

    /// Number of stored f64 values per variable per sample
    #[inline]
    pub fn values_per_sample(self) -> usize {
        match self {
            Encoding::Real => 1,
            Encoding::Complex => 2,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Real => write!(f, "real"),
            Encoding::Complex => write!(f, "complex"),
        }
    }
}

/// Vector data - either real or complex
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl VectorData {
    /// Allocate an empty vector of the given encoding
    pub fn with_capacity(encoding: Encoding, capacity: usize) -> Self {
        match encoding {
            Encoding::Real => VectorData::Real(Vec::with_capacity(capacity)),
            Encoding::Complex => VectorData::Complex(Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorData::Real(v) => v.len(),
            VectorData::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, VectorData::Complex(_))
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            VectorData::Real(_) => Encoding::Real,
            VectorData::Complex(_) => Encoding::Complex,
        }
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            VectorData::Real(v) => Some(v),
            VectorData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[Complex64]> {
        match self {
            VectorData::Complex(v) => Some(v),
            VectorData::Real(_) => None,
        }
    }

    /// Borrow a contiguous range of this vector
    pub(crate) fn view(&self, range: std::ops::Range<usize>) -> VectorView<'_> {
        match self {
            VectorData::Real(v) => VectorView::Real(&v[range]),
            VectorData::Complex(v) => VectorView::Complex(&v[range]),
        }
    }
}

/// Borrowed row of a [`SignalMatrix`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorView<'a> {
    Real(&'a [f64]),
    Complex(&'a [Complex64]),
}

impl VectorView<'_> {
    pub fn len(&self) -> usize {
        match self {
            VectorView::Real(v) => v.len(),
            VectorView::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vector(&self) -> VectorData {
        match self {
            VectorView::Real(v) => VectorData::Real(v.to_vec()),
            VectorView::Complex(v) => VectorData::Complex(v.to_vec()),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Counts and encoding declared in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogInfo {
    pub encoding: Encoding,
    pub num_variables: usize,
    pub num_samples: usize,
}

/// Parsed header metadata of one raw file.
///
/// Column order of `names` is the column order of the binary block and
/// therefore defines index-based addressing.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableCatalog {
    names: Vec<String>,
    units: Vec<String>,
    info: CatalogInfo,
}

impl VariableCatalog {
    /// Build a catalog, checking that names, units and the declared count agree
    pub fn new(names: Vec<String>, units: Vec<String>, info: CatalogInfo) -> Result<Self> {
        if names.len() != units.len() {
            return Err(WaveformError::malformed(format!(
                "{} variable names but {} units",
                names.len(),
                units.len()
            )));
        }
        if names.len() != info.num_variables {
            return Err(WaveformError::malformed(format!(
                "header declares {} variables but lists {}",
                info.num_variables,
                names.len()
            )));
        }
        Ok(Self { names, units, info })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn info(&self) -> CatalogInfo {
        self.info
    }

    pub fn encoding(&self) -> Encoding {
        self.info.encoding
    }

    pub fn num_variables(&self) -> usize {
        self.info.num_variables
    }

    pub fn num_samples(&self) -> usize {
        self.info.num_samples
    }

    /// Column index of the first variable with this name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of f64 values stored in one sample point
    #[inline]
    pub fn sample_width(&self) -> usize {
        self.info.num_variables * self.info.encoding.values_per_sample()
    }

    /// Number of f64 values the binary block must hold.
    ///
    /// `None` if the declared dimensions overflow `usize`.
    pub fn payload_values(&self) -> Option<usize> {
        self.sample_width().checked_mul(self.info.num_samples)
    }

    /// Size in bytes the binary block must have.
    ///
    /// `None` if the declared dimensions overflow `u64`.
    pub fn payload_len(&self) -> Option<u64> {
        u64::try_from(self.payload_values()?)
            .ok()?
            .checked_mul(VALUE_SIZE as u64)
    }
}

impl fmt::Display for VariableCatalog {
    /// One line per variable: zero-padded index, name column, unit column
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index_width = self.names.len().saturating_sub(1).to_string().len();
        let name_width = self.names.iter().map(|n| n.len()).max().unwrap_or(0) + 2;
        let unit_width = self.units.iter().map(|u| u.len()).max().unwrap_or(0) + 2;

        for (i, (name, unit)) in self.names.iter().zip(&self.units).enumerate() {
            writeln!(
                f,
                "{:0iw$}  {:nw$} {:uw$}",
                i,
                name,
                unit,
                iw = index_width,
                nw = name_width,
                uw = unit_width
            )?;
        }
        Ok(())
    }
}

/// Row-major 2-D array of shape `(rows, num_samples)`
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMatrix {
    rows: usize,
    num_samples: usize,
    data: VectorData,
}

impl SignalMatrix {
    pub(crate) fn from_flat(rows: usize, num_samples: usize, data: VectorData) -> Self {
        debug_assert_eq!(data.len(), rows * num_samples);
        Self {
            rows,
            num_samples,
            data,
        }
    }

    /// Empty matrix with zero rows
    pub(crate) fn empty(encoding: Encoding, num_samples: usize) -> Self {
        Self::from_flat(0, num_samples, VectorData::with_capacity(encoding, 0))
    }

    /// `(rows, num_samples)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.num_samples)
    }

    pub fn encoding(&self) -> Encoding {
        self.data.encoding()
    }

    pub fn row(&self, index: usize) -> Option<VectorView<'_>> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.num_samples;
        Some(self.data.view(start..start + self.num_samples))
    }

    pub fn rows(&self) -> impl Iterator<Item = VectorView<'_>> + '_ {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    /// Flat row-major storage
    pub fn data(&self) -> &VectorData {
        &self.data
    }

    pub fn into_data(self) -> VectorData {
        self.data
    }
}

/// Result of a decode.
///
/// The variant follows the kind of selection: a by-name selection yields a
/// mapping, a by-index selection yields a matrix whose rows follow the
/// selection order.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformData {
    ByName(Vec<(String, VectorData)>),
    ByIndex(SignalMatrix),
}

impl WaveformData {
    /// Look up a by-name entry
    pub fn get(&self, name: &str) -> Option<&VectorData> {
        match self {
            WaveformData::ByName(entries) => entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
            WaveformData::ByIndex(_) => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&SignalMatrix> {
        match self {
            WaveformData::ByIndex(m) => Some(m),
            WaveformData::ByName(_) => None,
        }
    }

    /// Number of entries (by name) or rows (by index)
    pub fn len(&self) -> usize {
        match self {
            WaveformData::ByName(entries) => entries.len(),
            WaveformData::ByIndex(m) => m.rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(encoding: Encoding, num_variables: usize, num_samples: usize) -> CatalogInfo {
        CatalogInfo {
            encoding,
            num_variables,
            num_samples,
        }
    }

    #[test]
    fn test_encoding_from_flag() {
        assert_eq!(Encoding::from_flag("real"), Encoding::Real);
        assert_eq!(Encoding::from_flag("complex"), Encoding::Complex);
        assert_eq!(Encoding::from_flag("Real"), Encoding::Complex);
    }

    #[test]
    fn test_catalog_count_mismatch() {
        let result = VariableCatalog::new(
            vec!["time".into()],
            vec!["s".into()],
            info(Encoding::Real, 2, 10),
        );
        assert!(matches!(result, Err(WaveformError::MalformedHeader(_))));
    }

    #[test]
    fn test_catalog_payload_len() {
        let catalog = VariableCatalog::new(
            vec!["freq".into(), "out".into()],
            vec!["Hz".into(), "V".into()],
            info(Encoding::Complex, 2, 5),
        )
        .unwrap();
        assert_eq!(catalog.sample_width(), 4);
        assert_eq!(catalog.payload_values(), Some(20));
        assert_eq!(catalog.payload_len(), Some(160));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_catalog_payload_len_overflow() {
        let catalog = VariableCatalog::new(
            vec!["time".into(), "out".into()],
            vec!["s".into(), "V".into()],
            info(Encoding::Real, 2, 1 << 63),
        )
        .unwrap();
        assert_eq!(catalog.payload_values(), None);
        assert_eq!(catalog.payload_len(), None);

        let catalog = VariableCatalog::new(
            vec!["out".into()],
            vec!["V".into()],
            info(Encoding::Real, 1, 1 << 62),
        )
        .unwrap();
        assert_eq!(catalog.payload_values(), Some(1 << 62));
        assert_eq!(catalog.payload_len(), None);
    }

    #[test]
    fn test_catalog_position_first_match() {
        let catalog = VariableCatalog::new(
            vec!["a".into(), "b".into(), "a".into()],
            vec!["V".into(), "V".into(), "A".into()],
            info(Encoding::Real, 3, 1),
        )
        .unwrap();
        assert_eq!(catalog.position("a"), Some(0));
        assert_eq!(catalog.position("b"), Some(1));
        assert_eq!(catalog.position("c"), None);
    }

    #[test]
    fn test_catalog_display() {
        let catalog = VariableCatalog::new(
            vec!["time".into(), "v1".into()],
            vec!["s".into(), "V".into()],
            info(Encoding::Real, 2, 1),
        )
        .unwrap();
        let listing = catalog.to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines, vec!["0  time   s  ", "1  v1     V  "]);
    }

    #[test]
    fn test_matrix_rows() {
        let m = SignalMatrix::from_flat(2, 2, VectorData::Real(vec![1.0, 4.0, 2.0, 5.0]));
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.row(0), Some(VectorView::Real(&[1.0, 4.0])));
        assert_eq!(m.row(1), Some(VectorView::Real(&[2.0, 5.0])));
        assert_eq!(m.row(2), None);
        assert_eq!(m.rows().count(), 2);
    }

    #[test]
    fn test_waveform_data_get() {
        let data = WaveformData::ByName(vec![("v1".into(), VectorData::Real(vec![1.0]))]);
        assert_eq!(data.len(), 1);
        assert!(data.get("v1").is_some());
        assert!(data.get("v2").is_none());
        assert!(data.as_matrix().is_none());
    }
}
