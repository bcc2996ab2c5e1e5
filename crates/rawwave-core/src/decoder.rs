//! Binary block decoder
//!
//! The binary block stores sample points one after the other (sample-major):
//! every variable of sample 0, then every variable of sample 1, and so on.
//! Complex files store each value as an adjacent (real, imaginary) pair.
//!
//! Two strategies are available:
//! - [`ReadStrategy::WholeFile`] maps the file and decodes the full
//!   `num_variables x num_samples` grid before picking rows.
//! - [`ReadStrategy::Chunked`] reads one sample point at a time and keeps only
//!   the selected columns. Peak memory is O(selected * num_samples).

use crate::selection::{unique_names, ReadStrategy, Selection};
use crate::types::{
    Encoding, Result, SignalMatrix, VariableCatalog, VectorData, WaveformData, WaveformError,
    VALUE_SIZE,
};
use byteorder::{ByteOrder, NativeEndian, ReadBytesExt};
use memmap2::Mmap;
use num_complex::Complex64;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

/// Open a raw file for reading, reporting a missing path as `FileNotFound`
pub(crate) fn open_file(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(WaveformError::FileNotFound(path.display().to_string()));
    }
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => WaveformError::FileNotFound(path.display().to_string()),
        _ => WaveformError::Io(e),
    })
}

/// Decode the selected variables from the binary block of `file`.
///
/// `binary_offset` is the position of the first payload byte. The selection
/// is validated before the payload is touched and the payload size is checked
/// against the catalog before any value is decoded.
pub fn decode(
    file: File,
    catalog: &VariableCatalog,
    binary_offset: u64,
    selection: &Selection,
    strategy: ReadStrategy,
) -> Result<WaveformData> {
    let columns = selection.resolve(catalog)?;

    let payload_values = check_payload_len(&file, catalog, binary_offset)?;

    let num_samples = catalog.num_samples();
    let output_len = columns.len().checked_mul(num_samples).ok_or_else(|| {
        WaveformError::invalid_selection(format!(
            "{} rows of {} samples exceed addressable memory",
            columns.len(),
            num_samples
        ))
    })?;
    let matrix = if columns.is_empty() {
        SignalMatrix::empty(catalog.encoding(), num_samples)
    } else {
        debug!(
            %strategy,
            selected = columns.len(),
            samples = num_samples,
            "Decoding binary block"
        );
        match strategy {
            ReadStrategy::WholeFile => {
                decode_whole(&file, catalog, binary_offset, payload_values, &columns)?
            }
            ReadStrategy::Chunked => {
                decode_chunked(file, catalog, binary_offset, output_len, &columns)?
            }
        }
    };

    info!(
        rows = matrix.shape().0,
        samples = num_samples,
        "Decode complete"
    );

    Ok(into_waveform_data(selection, matrix))
}

/// Compare the bytes after `binary_offset` with the size the header implies.
///
/// Returns the number of f64 values in the payload.
fn check_payload_len(
    file: &File,
    catalog: &VariableCatalog,
    binary_offset: u64,
) -> Result<usize> {
    let (values, expected) = match (catalog.payload_values(), catalog.payload_len()) {
        (Some(values), Some(len)) => (values, len),
        _ => {
            return Err(WaveformError::malformed(format!(
                "{} variables x {} points ({}) overflow the addressable payload size",
                catalog.num_variables(),
                catalog.num_samples(),
                catalog.encoding()
            )))
        }
    };

    let file_len = file.metadata()?.len();
    if binary_offset > file_len {
        return Err(WaveformError::TruncatedData { expected, found: 0 });
    }
    let found = file_len - binary_offset;
    if found != expected {
        return Err(WaveformError::TruncatedData { expected, found });
    }
    Ok(values)
}

/// Attach names to matrix rows for by-name selections
fn into_waveform_data(selection: &Selection, matrix: SignalMatrix) -> WaveformData {
    match selection {
        Selection::Indices(_) => WaveformData::ByIndex(matrix),
        Selection::Names(names) => WaveformData::ByName(
            unique_names(names)
                .into_iter()
                .zip(matrix.rows())
                .map(|(name, row)| (name.clone(), row.to_vector()))
                .collect(),
        ),
    }
}

// ============================================================================
// WholeFile strategy
// ============================================================================

fn decode_whole(
    file: &File,
    catalog: &VariableCatalog,
    binary_offset: u64,
    payload_values: usize,
    columns: &[usize],
) -> Result<SignalMatrix> {
    // SAFETY: the file is opened read-only and the map is dropped before returning.
    let mmap = unsafe { Mmap::map(file)? };
    let byte_len = payload_values.saturating_mul(VALUE_SIZE);
    let payload = usize::try_from(binary_offset)
        .ok()
        .and_then(|start| mmap.get(start..start.checked_add(byte_len)?))
        .ok_or(WaveformError::TruncatedData {
            expected: byte_len as u64,
            found: (mmap.len() as u64).saturating_sub(binary_offset),
        })?;

    let mut flat = vec![0.0f64; payload_values];
    NativeEndian::read_f64_into(payload, &mut flat);

    let num_variables = catalog.num_variables();
    let num_samples = catalog.num_samples();

    let data = match catalog.encoding() {
        Encoding::Real => {
            let grid = transpose(&flat, num_variables, num_samples);
            VectorData::Real(select_rows(&grid, num_samples, columns))
        }
        Encoding::Complex => {
            let values = combine_complex(&flat);
            let grid = transpose(&values, num_variables, num_samples);
            VectorData::Complex(select_rows(&grid, num_samples, columns))
        }
    };

    Ok(SignalMatrix::from_flat(columns.len(), num_samples, data))
}

/// Pair interleaved `re, im, re, im, ...` values into complex numbers
fn combine_complex(flat: &[f64]) -> Vec<Complex64> {
    let re = flat.iter().step_by(2);
    let im = flat.iter().skip(1).step_by(2);
    re.zip(im).map(|(&re, &im)| Complex64::new(re, im)).collect()
}

/// Turn a sample-major `(num_samples, num_variables)` grid into a
/// variable-major `(num_variables, num_samples)` grid
fn transpose<T: Copy + Default>(values: &[T], num_variables: usize, num_samples: usize) -> Vec<T> {
    let mut grid = vec![T::default(); num_variables * num_samples];
    for (sample, point) in values.chunks_exact(num_variables).enumerate() {
        for (var, &value) in point.iter().enumerate() {
            grid[var * num_samples + sample] = value;
        }
    }
    grid
}

fn select_rows<T: Copy>(grid: &[T], num_samples: usize, columns: &[usize]) -> Vec<T> {
    let mut out = Vec::with_capacity(columns.len().saturating_mul(num_samples));
    for &col in columns {
        out.extend_from_slice(&grid[col * num_samples..(col + 1) * num_samples]);
    }
    out
}

// ============================================================================
// Chunked strategy
// ============================================================================

fn decode_chunked(
    file: File,
    catalog: &VariableCatalog,
    binary_offset: u64,
    output_len: usize,
    columns: &[usize],
) -> Result<SignalMatrix> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(binary_offset))?;

    let num_samples = catalog.num_samples();
    let data = match catalog.encoding() {
        Encoding::Real => VectorData::Real(read_columns(
            &mut reader,
            catalog,
            columns,
            output_len,
            |scratch, col| scratch[col],
        )?),
        Encoding::Complex => VectorData::Complex(read_columns(
            &mut reader,
            catalog,
            columns,
            output_len,
            |scratch, col| Complex64::new(scratch[2 * col], scratch[2 * col + 1]),
        )?),
    };

    Ok(SignalMatrix::from_flat(columns.len(), num_samples, data))
}

/// Read `num_samples` sample points, copying the selected columns into a
/// preallocated `(columns.len(), num_samples)` buffer of `output_len` values
fn read_columns<T, F>(
    reader: &mut BufReader<File>,
    catalog: &VariableCatalog,
    columns: &[usize],
    output_len: usize,
    value_at: F,
) -> Result<Vec<T>>
where
    T: Copy + Default,
    F: Fn(&[f64], usize) -> T,
{
    let num_samples = catalog.num_samples();
    let mut scratch = vec![0.0f64; catalog.sample_width()];
    let mut out = vec![T::default(); output_len];

    for sample in 0..num_samples {
        reader.read_f64_into::<NativeEndian>(&mut scratch)?;
        for (row, &col) in columns.iter().enumerate() {
            out[row * num_samples + sample] = value_at(&scratch, col);
        }
    }

    Ok(out)
}
