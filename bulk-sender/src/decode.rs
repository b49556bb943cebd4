//! Decoding of contact files into a [`Table`].
//!
//! Contacts arrive either as raw CSV bytes or as the data URL a browser file
//! picker produces (`data:text/csv;base64,<payload>`). The first CSV record is
//! the header; cells are typed as integer, float, boolean, text or empty.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::errors::DecodeError;
use crate::table::{CellValue, Table};

const BOM: char = '\u{feff}';

/// Decoded header and rows, before the row-number column is added.
pub type Records = (Vec<String>, Vec<Vec<CellValue>>);

/// Decodes comma-separated bytes with a header record.
pub fn decode_csv(bytes: &[u8]) -> Result<Records, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        // Short rows are padded later; long rows are reported by the table.
        .flexible(true)
        .from_reader(bytes);

    let head: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if index == 0 {
                name.trim_start_matches(BOM).to_string()
            } else {
                name.to_string()
            }
        })
        .collect();
    if head.is_empty() || head.iter().all(|name| name.is_empty()) {
        return Err(DecodeError::EmptyInput);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(infer_cell).collect());
    }

    debug!(columns = head.len(), rows = rows.len(), "decoded csv");
    Ok((head, rows))
}

/// Extracts the file bytes from a browser upload.
///
/// Accepts `data:<mime>;base64,<payload>`; anything without a `data:` prefix
/// is rejected.
pub fn decode_upload(content: &str) -> Result<Vec<u8>, DecodeError> {
    let content = content.trim();
    let Some(rest) = content.strip_prefix("data:") else {
        return Err(DecodeError::MalformedUpload(
            "expected a data URL".to_string(),
        ));
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return Err(DecodeError::MalformedUpload(
            "missing ',' separator".to_string(),
        ));
    };
    if !meta.ends_with(";base64") {
        return Err(DecodeError::MalformedUpload(format!(
            "unsupported encoding '{meta}'"
        )));
    }
    Ok(STANDARD.decode(payload)?)
}

/// Decodes CSV bytes straight into a numbered contact table.
pub fn load_contacts(bytes: &[u8]) -> Result<Table, DecodeError> {
    let (head, rows) = decode_csv(bytes)?;
    Table::from_records(head, rows)
}

/// Types a raw CSV field.
///
/// Integers are only recognized in their canonical form, so phone numbers with
/// a leading `+` or `0` stay text and keep every digit.
pub fn infer_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    if let Ok(number) = trimmed.parse::<i64>() {
        if number.to_string() == trimmed {
            return CellValue::Integer(number);
        }
        return CellValue::Text(raw.to_string());
    }
    if looks_numeric(trimmed) {
        if let Ok(number) = trimmed.parse::<f64>() {
            return CellValue::Float(number);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => CellValue::Bool(true),
        "false" | "False" | "FALSE" => CellValue::Bool(false),
        _ => CellValue::Text(raw.to_string()),
    }
}

fn looks_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_csv_types_cells() {
        let csv = "Name,Surname,Phone,Score\njohn,smith,3331234567,1.5\n\"lee, ann\",,+39 02 1234,\n";
        let (head, rows) = decode_csv(csv.as_bytes()).unwrap();
        assert_eq!(head, ["Name", "Surname", "Phone", "Score"]);
        assert_eq!(
            rows[0],
            [
                CellValue::text("john"),
                CellValue::text("smith"),
                CellValue::Integer(3331234567),
                CellValue::Float(1.5)
            ]
        );
        assert_eq!(rows[1][0], CellValue::text("lee, ann"));
        assert_eq!(rows[1][1], CellValue::Empty);
        assert_eq!(rows[1][2], CellValue::text("+39 02 1234"));
        assert_eq!(rows[1][3], CellValue::Empty);
    }

    #[test]
    fn test_infer_keeps_phone_digits() {
        assert_eq!(infer_cell("0039333"), CellValue::text("0039333"));
        assert_eq!(infer_cell("+39333"), CellValue::text("+39333"));
        assert_eq!(infer_cell("-12"), CellValue::Integer(-12));
        assert_eq!(infer_cell("1e3"), CellValue::Float(1000.0));
        assert_eq!(infer_cell("Nan"), CellValue::text("Nan"));
        assert_eq!(infer_cell("inf"), CellValue::text("inf"));
        assert_eq!(infer_cell("TRUE"), CellValue::Bool(true));
        assert_eq!(infer_cell("  "), CellValue::Empty);
    }

    #[test]
    fn test_bom_is_stripped() {
        let (head, _) = decode_csv("\u{feff}Name,Phone\n".as_bytes()).unwrap();
        assert_eq!(head[0], "Name");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(decode_csv(b""), Err(DecodeError::EmptyInput)));
    }

    #[test]
    fn test_load_contacts_numbers_rows_and_pads() {
        let table = load_contacts(b"Name,Phone\nann,1\nbob\n").unwrap();
        assert_eq!(table.head(), ["NUM", "Name", "Phone"]);
        assert_eq!(table.rows()[1], [CellValue::text("3"), CellValue::text("bob"), CellValue::Empty]);
    }

    #[test]
    fn test_load_contacts_rejects_long_rows() {
        assert!(matches!(
            load_contacts(b"Name\nann,extra\n"),
            Err(DecodeError::RaggedRow { row: 2, .. })
        ));
    }

    #[test]
    fn test_decode_upload() {
        // "Name\nann\n"
        let bytes = decode_upload("data:text/csv;base64,TmFtZQphbm4K").unwrap();
        assert_eq!(bytes, b"Name\nann\n");
        assert!(matches!(
            decode_upload("Name,Phone"),
            Err(DecodeError::MalformedUpload(_))
        ));
        assert!(matches!(
            decode_upload("data:text/csv,Name"),
            Err(DecodeError::MalformedUpload(_))
        ));
        assert!(matches!(
            decode_upload("data:text/csv;base64,!!!"),
            Err(DecodeError::Base64(_))
        ));
    }
}
