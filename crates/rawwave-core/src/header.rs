//! Raw file text header parser
//!
//! Reads header lines up to the `Binary:` sentinel and produces the
//! [`VariableCatalog`] plus the byte offset of the binary block.

use crate::types::{
    CatalogInfo, Encoding, Result, VariableCatalog, WaveformError, BINARY_MARKER, FLAGS_KEY,
    NUM_POINTS_KEY, NUM_VARIABLES_KEY, VARIABLES_MARKER, VARIABLE_FIELD_SEPARATOR,
};
use std::io::BufRead;
use tracing::{info, trace};

// ============================================================================
// Line decoding
// ============================================================================

/// Text encoding attempted when decoding a header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDecoding {
    /// 7-bit ASCII, rejects any byte >= 0x80
    Ascii,
    /// ISO-8859-1, one byte per character, accepts every byte
    Latin1,
}

/// Decodings tried in order. The last entry never fails.
pub const LINE_DECODINGS: [LineDecoding; 2] = [LineDecoding::Ascii, LineDecoding::Latin1];

impl LineDecoding {
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            LineDecoding::Ascii => {
                if bytes.is_ascii() {
                    Some(bytes.iter().map(|&b| b as char).collect())
                } else {
                    None
                }
            }
            LineDecoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Decode one raw header line and strip trailing whitespace
pub fn decode_line(bytes: &[u8]) -> String {
    let mut text = String::new();
    for decoding in LINE_DECODINGS {
        if let Some(decoded) = decoding.decode(bytes) {
            if decoding != LineDecoding::Ascii {
                trace!(?decoding, "Header line decoded with fallback");
            }
            text = decoded;
            break;
        }
    }
    text.truncate(text.trim_end().len());
    text
}

// ============================================================================
// Header parsing
// ============================================================================

#[derive(Debug, Default)]
struct HeaderFields {
    encoding: Option<Encoding>,
    num_variables: Option<usize>,
    num_samples: Option<usize>,
    names: Vec<String>,
    units: Vec<String>,
}

impl HeaderFields {
    fn into_catalog(self) -> Result<VariableCatalog> {
        let num_variables = self
            .num_variables
            .ok_or_else(|| WaveformError::malformed("missing \"No. Variables:\" line"))?;
        let num_samples = self
            .num_samples
            .ok_or_else(|| WaveformError::malformed("missing \"No. Points:\" line"))?;

        VariableCatalog::new(
            self.names,
            self.units,
            CatalogInfo {
                encoding: self.encoding.unwrap_or_default(),
                num_variables,
                num_samples,
            },
        )
    }
}

/// Last whitespace-separated token of a header line
fn last_token(line: &str) -> &str {
    line.split_whitespace().next_back().unwrap_or("")
}

fn parse_count(line: &str, key: &str) -> Result<usize> {
    let token = last_token(line);
    token.parse().map_err(|_| {
        WaveformError::malformed(format!("invalid count \"{}\" on \"{}\" line", token, key))
    })
}

/// Split `<index>\t\t<name>\t\t<unit>` into (name, unit)
fn parse_variable_line(line: &str) -> Result<(String, String)> {
    let mut fields = line.split(VARIABLE_FIELD_SEPARATOR);
    let _index = fields.next();
    match (fields.next(), fields.next()) {
        (Some(name), Some(unit)) => Ok((name.to_string(), unit.to_string())),
        _ => Err(WaveformError::malformed(format!(
            "malformed variable line \"{}\"",
            line
        ))),
    }
}

/// Parse the text header.
///
/// Returns the catalog and the byte offset, counted from the start of
/// `reader`, of the first byte after the `Binary:` line.
pub fn parse_header<R: BufRead>(reader: &mut R) -> Result<(VariableCatalog, u64)> {
    let mut fields = HeaderFields::default();
    let mut buf = Vec::new();
    let mut offset = 0u64;
    let mut in_variables = false;

    loop {
        buf.clear();
        let bytes_read = reader.read_until(b'\n', &mut buf)?;
        if bytes_read == 0 {
            break;
        }
        offset += bytes_read as u64;

        let line = decode_line(&buf);

        if !in_variables {
            if line == VARIABLES_MARKER {
                trace!("Variable list begins");
                in_variables = true;
            } else if line.contains(FLAGS_KEY) {
                fields.encoding = Some(Encoding::from_flag(last_token(&line)));
            } else if line.contains(NUM_VARIABLES_KEY) {
                fields.num_variables = Some(parse_count(&line, NUM_VARIABLES_KEY)?);
            } else if line.contains(NUM_POINTS_KEY) {
                fields.num_samples = Some(parse_count(&line, NUM_POINTS_KEY)?);
            }
            continue;
        }

        if line == BINARY_MARKER {
            let catalog = fields.into_catalog()?;
            info!(
                variables = catalog.num_variables(),
                samples = catalog.num_samples(),
                encoding = %catalog.encoding(),
                binary_offset = offset,
                "Header parsed"
            );
            return Ok((catalog, offset));
        }

        let (name, unit) = parse_variable_line(&line)?;
        fields.names.push(name);
        fields.units.push(unit);
    }

    Err(WaveformError::malformed(
        "no \"Binary:\" section found in raw file",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(text: &str) -> Cursor<Vec<u8>> {
        Cursor::new(text.as_bytes().to_vec())
    }

    #[test]
    fn test_decode_line_ascii() {
        assert_eq!(decode_line(b"Flags: real \r\n"), "Flags: real");
    }

    #[test]
    fn test_decode_line_latin1_fallback() {
        assert_eq!(LineDecoding::Ascii.decode(b"\xb5A"), None);
        assert_eq!(decode_line(b"0\t\ti(r1)\t\t\xb5A\n"), "0\t\ti(r1)\t\t\u{b5}A");
    }

    #[test]
    fn test_parse_header_real() {
        let text = "Title: test\n\
                    Flags: real\n\
                    No. Variables: 2\n\
                    No. Points: 4\n\
                    Variables:\n\
                    0\t\ttime\t\ts\n\
                    1\t\tout\t\tV\n\
                    Binary:\n";
        let mut reader = header(text);
        let (catalog, offset) = parse_header(&mut reader).unwrap();

        assert_eq!(catalog.names(), ["time", "out"]);
        assert_eq!(catalog.units(), ["s", "V"]);
        assert_eq!(catalog.encoding(), Encoding::Real);
        assert_eq!(catalog.num_variables(), 2);
        assert_eq!(catalog.num_samples(), 4);
        assert_eq!(offset, text.len() as u64);
    }

    #[test]
    fn test_parse_header_complex_crlf() {
        let text = "Flags: complex\r\nNo. Points: 1\r\nNo. Variables: 1\r\nVariables:\r\n0\t\tfreq\t\tHz\r\nBinary:\r\n";
        let mut reader = header(text);
        let (catalog, offset) = parse_header(&mut reader).unwrap();

        assert_eq!(catalog.encoding(), Encoding::Complex);
        assert_eq!(catalog.names(), ["freq"]);
        assert_eq!(offset, text.len() as u64);
    }

    #[test]
    fn test_parse_header_offset_excludes_payload() {
        let mut bytes =
            b"No. Variables: 1\nNo. Points: 1\nVariables:\n0\t\tx\t\tV\nBinary:\n".to_vec();
        let header_len = bytes.len() as u64;
        bytes.extend_from_slice(&1.5f64.to_ne_bytes());

        let (catalog, offset) = parse_header(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(offset, header_len);
        assert_eq!(catalog.encoding(), Encoding::Real);
    }

    #[test]
    fn test_parse_header_missing_counts() {
        let text = "Flags: real\nNo. Variables: 1\nVariables:\n0\t\tx\t\tV\nBinary:\n";
        let result = parse_header(&mut header(text));
        assert!(matches!(result, Err(WaveformError::MalformedHeader(_))));
    }

    #[test]
    fn test_parse_header_bad_variable_line() {
        let text = "No. Variables: 1\nNo. Points: 1\nVariables:\n0 x V\nBinary:\n";
        let result = parse_header(&mut header(text));
        assert!(matches!(result, Err(WaveformError::MalformedHeader(_))));
    }

    #[test]
    fn test_parse_header_count_mismatch() {
        let text = "No. Variables: 2\nNo. Points: 1\nVariables:\n0\t\tx\t\tV\nBinary:\n";
        let result = parse_header(&mut header(text));
        assert!(matches!(result, Err(WaveformError::MalformedHeader(_))));
    }

    #[test]
    fn test_parse_header_no_binary_section() {
        let text = "No. Variables: 1\nNo. Points: 1\nVariables:\n0\t\tx\t\tV\n";
        let result = parse_header(&mut header(text));
        assert!(matches!(result, Err(WaveformError::MalformedHeader(_))));
    }

    #[test]
    fn test_parse_header_invalid_count() {
        let text = "No. Variables: many\n";
        let result = parse_header(&mut header(text));
        assert!(matches!(result, Err(WaveformError::MalformedHeader(_))));
    }
}
