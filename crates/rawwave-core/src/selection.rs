//! Variable selection and read strategy

use crate::types::{Result, VariableCatalog, WaveformError};
use std::fmt;
use std::str::FromStr;

/// One requested variable, by name or by column index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionItem {
    Name(String),
    Index(usize),
}

impl From<&str> for SelectionItem {
    fn from(name: &str) -> Self {
        SelectionItem::Name(name.to_string())
    }
}

impl From<String> for SelectionItem {
    fn from(name: String) -> Self {
        SelectionItem::Name(name)
    }
}

impl From<usize> for SelectionItem {
    fn from(index: usize) -> Self {
        SelectionItem::Index(index)
    }
}

/// Variables requested from a decode, in output order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Names(Vec<String>),
    Indices(Vec<usize>),
}

impl Selection {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        Selection::Indices(indices.into_iter().collect())
    }

    /// Build a selection from a list that must be homogeneous.
    ///
    /// An empty list is an empty by-index selection.
    pub fn from_items<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = SelectionItem>,
    {
        let mut names = Vec::new();
        let mut indices = Vec::new();
        for item in items {
            match item {
                SelectionItem::Name(n) => names.push(n),
                SelectionItem::Index(i) => indices.push(i),
            }
        }
        match (names.is_empty(), indices.is_empty()) {
            (false, false) => Err(WaveformError::invalid_selection(
                "variables must be either all names or all indices",
            )),
            (false, true) => Ok(Selection::Names(names)),
            _ => Ok(Selection::Indices(indices)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Names(v) => v.len(),
            Selection::Indices(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate against the catalog and resolve to column indices.
    ///
    /// Names resolve to their first position in the catalog. Repeated names
    /// resolve once, at their first occurrence in the selection.
    pub fn resolve(&self, catalog: &VariableCatalog) -> Result<Vec<usize>> {
        match self {
            Selection::Names(names) => {
                let mut columns = Vec::with_capacity(names.len());
                for name in unique_names(names) {
                    let col = catalog
                        .position(name)
                        .ok_or_else(|| WaveformError::UnknownVariable(name.clone()))?;
                    columns.push(col);
                }
                Ok(columns)
            }
            Selection::Indices(indices) => {
                let num_variables = catalog.num_variables();
                if let Some(&index) = indices.iter().find(|&&i| i >= num_variables) {
                    return Err(WaveformError::IndexOutOfRange {
                        index,
                        num_variables,
                    });
                }
                Ok(indices.clone())
            }
        }
    }
}

/// Names in first-occurrence order with repeats dropped
pub(crate) fn unique_names(names: &[String]) -> Vec<&String> {
    let mut seen = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// How the binary block is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// Load the whole block at once
    #[default]
    WholeFile,
    /// Stream one sample point at a time, keeping only selected columns
    Chunked,
}

impl FromStr for ReadStrategy {
    type Err = WaveformError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "whole" => Ok(ReadStrategy::WholeFile),
            "chunk" => Ok(ReadStrategy::Chunked),
            other => Err(WaveformError::invalid_selection(format!(
                "mode must be either \"whole\" or \"chunk\", got \"{}\"",
                other
            ))),
        }
    }
}

impl fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStrategy::WholeFile => write!(f, "whole"),
            ReadStrategy::Chunked => write!(f, "chunk"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CatalogInfo, Encoding};

    fn catalog() -> VariableCatalog {
        VariableCatalog::new(
            vec!["time".into(), "v1".into(), "v2".into(), "v1".into()],
            vec!["s".into(), "V".into(), "V".into(), "A".into()],
            CatalogInfo {
                encoding: Encoding::Real,
                num_variables: 4,
                num_samples: 3,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_from_items_homogeneous() {
        let sel =
            Selection::from_items(vec![SelectionItem::from("a"), SelectionItem::from("b")])
                .unwrap();
        assert_eq!(sel, Selection::names(["a", "b"]));

        let sel =
            Selection::from_items(vec![SelectionItem::Index(2), SelectionItem::Index(0)]).unwrap();
        assert_eq!(sel, Selection::indices([2, 0]));

        let sel = Selection::from_items(Vec::<SelectionItem>::new()).unwrap();
        assert!(sel.is_empty());
    }

    #[test]
    fn test_from_items_mixed() {
        let result = Selection::from_items(vec![SelectionItem::from("a"), SelectionItem::Index(1)]);
        assert!(matches!(result, Err(WaveformError::InvalidSelection(_))));
    }

    #[test]
    fn test_resolve_names_first_match() {
        let cols = Selection::names(["v2", "v1", "time"])
            .resolve(&catalog())
            .unwrap();
        assert_eq!(cols, vec![2, 1, 0]);
    }

    #[test]
    fn test_resolve_repeated_name_once() {
        let cols = Selection::names(["v1", "time", "v1"])
            .resolve(&catalog())
            .unwrap();
        assert_eq!(cols, vec![1, 0]);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let err = Selection::names(["v3"]).resolve(&catalog()).unwrap_err();
        assert!(matches!(err, WaveformError::UnknownVariable(ref n) if n == "v3"));
    }

    #[test]
    fn test_resolve_index_bounds() {
        assert_eq!(
            Selection::indices([3, 0, 3]).resolve(&catalog()).unwrap(),
            vec![3, 0, 3]
        );
        let err = Selection::indices([0, 4]).resolve(&catalog()).unwrap_err();
        assert!(matches!(
            err,
            WaveformError::IndexOutOfRange {
                index: 4,
                num_variables: 4
            }
        ));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("whole".parse::<ReadStrategy>().unwrap(), ReadStrategy::WholeFile);
        assert_eq!("chunk".parse::<ReadStrategy>().unwrap(), ReadStrategy::Chunked);
        assert!(matches!(
            "stream".parse::<ReadStrategy>(),
            Err(WaveformError::InvalidSelection(_))
        ));
        assert_eq!(ReadStrategy::Chunked.to_string(), "chunk");
    }
}
