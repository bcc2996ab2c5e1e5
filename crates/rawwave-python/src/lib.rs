//! Python bindings for the raw waveform file reader
//!
//! This crate provides PyO3 bindings to expose rawwave-core to Python.

use numpy::ndarray::{Array1, Array2};
use numpy::IntoPyArray;
use pyo3::exceptions::{PyFileNotFoundError, PyIOError, PyIndexError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyString};
use rawwave_core::{
    self, ReadStrategy, Selection, SelectionItem, SignalMatrix, VectorData, WaveformData,
    WaveformError,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Error Conversion
// ============================================================================

fn to_py_err(e: WaveformError) -> PyErr {
    let msg = e.to_string();
    match e {
        WaveformError::FileNotFound(_) => PyFileNotFoundError::new_err(msg),
        WaveformError::UnknownVariable(_) => PyKeyError::new_err(msg),
        WaveformError::IndexOutOfRange { .. } => PyIndexError::new_err(msg),
        WaveformError::MalformedHeader(_)
        | WaveformError::InvalidSelection(_)
        | WaveformError::TruncatedData { .. } => PyValueError::new_err(msg),
        WaveformError::Io(_) => PyIOError::new_err(msg),
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn vector_to_numpy(py: Python, vector: VectorData) -> Py<PyAny> {
    match vector {
        VectorData::Real(v) => Array1::from_vec(v).into_pyarray(py).into_any().unbind(),
        VectorData::Complex(v) => Array1::from_vec(v).into_pyarray(py).into_any().unbind(),
    }
}

fn matrix_to_numpy(py: Python, matrix: SignalMatrix) -> PyResult<Py<PyAny>> {
    let shape = matrix.shape();
    let array = match matrix.into_data() {
        VectorData::Real(v) => Array2::from_shape_vec(shape, v)
            .map_err(|e| PyValueError::new_err(e.to_string()))?
            .into_pyarray(py)
            .into_any()
            .unbind(),
        VectorData::Complex(v) => Array2::from_shape_vec(shape, v)
            .map_err(|e| PyValueError::new_err(e.to_string()))?
            .into_pyarray(py)
            .into_any()
            .unbind(),
    };
    Ok(array)
}

/// Convert a Python list of names or of integer indices into a selection
fn extract_selection(variables: &Bound<'_, PyAny>) -> PyResult<Selection> {
    let mut items = Vec::new();
    for item in variables.try_iter()? {
        let item = item?;
        if let Ok(name) = item.downcast::<PyString>() {
            items.push(SelectionItem::Name(name.to_str()?.to_string()));
        } else if let Ok(index) = item.extract::<i64>() {
            let index = usize::try_from(index).map_err(|_| {
                PyIndexError::new_err(format!("Index of variable is out of bounds: {}", index))
            })?;
            items.push(SelectionItem::Index(index));
        } else {
            return Err(PyValueError::new_err(
                "\"variables\" must be either a list of strings or a list of integers",
            ));
        }
    }
    Selection::from_items(items).map_err(to_py_err)
}

// ============================================================================
// Python Functions
// ============================================================================

/// Get the variables contained in a raw file
///
/// Args:
///     filename: Path of the raw file
///
/// Returns:
///     (names, units, info) where info is a dict with keys
///     "datatype", "num_vars" and "num_samples"
#[pyfunction]
pub fn get_vars_list(
    py: Python,
    filename: &str,
) -> PyResult<(Vec<String>, Vec<String>, Py<PyDict>)> {
    let catalog = rawwave_core::list_variables(filename).map_err(to_py_err)?;

    let info = PyDict::new(py);
    info.set_item("datatype", catalog.encoding().to_string())?;
    info.set_item("num_vars", catalog.num_variables())?;
    info.set_item("num_samples", catalog.num_samples())?;

    Ok((
        catalog.names().to_vec(),
        catalog.units().to_vec(),
        info.unbind(),
    ))
}

/// Load variables from a raw file
///
/// Args:
///     filename: Path of the raw file
///     variables: List of variable names or list of integer indices
///     mode: "whole" to read the file at once, "chunk" to read one sample
///           point at a time keeping only the requested variables
///
/// Returns:
///     dict mapping each name to a 1-D array when variables are names,
///     otherwise a 2-D array of shape (len(variables), num_samples)
#[pyfunction]
#[pyo3(signature = (filename, variables, mode="whole"))]
pub fn load_vars(
    py: Python,
    filename: &str,
    variables: &Bound<'_, PyAny>,
    mode: &str,
) -> PyResult<Py<PyAny>> {
    let strategy: ReadStrategy = mode.parse().map_err(to_py_err)?;
    let selection = extract_selection(variables)?;

    let data = py
        .allow_threads(|| rawwave_core::load_variables(filename, &selection, strategy))
        .map_err(to_py_err)?;

    match data {
        WaveformData::ByName(entries) => {
            let dict = PyDict::new(py);
            for (name, vector) in entries {
                dict.set_item(name, vector_to_numpy(py, vector))?;
            }
            Ok(dict.into_any().unbind())
        }
        WaveformData::ByIndex(matrix) => matrix_to_numpy(py, matrix),
    }
}

/// Install a stderr log subscriber for the reader
///
/// Args:
///     level: tracing filter directive, e.g. "info" or "rawwave_core=debug"
///
/// Returns:
///     True if installed, False if a subscriber was already installed
#[pyfunction]
#[pyo3(signature = (level="info"))]
pub fn init_logging(level: &str) -> PyResult<bool> {
    let filter = EnvFilter::try_new(level).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(filter = level, "Logging initialized");
    }
    Ok(installed)
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
pub fn rawwave(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_vars_list, m)?)?;
    m.add_function(wrap_pyfunction!(load_vars, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
