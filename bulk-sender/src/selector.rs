//! Recipient selection: joins a range expression against the contact table
//! by column name and normalizes the chosen fields.

use crate::errors::SelectionError;
use crate::normalize::{name_field, phone_field};
use crate::range::parse_range;
use crate::table::{CellValue, Table, ROW_NUMBER_COLUMN};

/// How a selected column's values are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Capitalized per word; non-text values become absent.
    Name,
    /// Kept as a string; values that are neither text nor integer become absent.
    Phone,
}

/// One column the operator wants in the selected table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Header shown in the selected table and used by template placeholders.
    pub label: String,
    /// Column looked up in the contact table.
    pub source: String,
    pub kind: FieldKind,
}

impl ColumnSpec {
    pub fn name(source: impl Into<String>) -> Self {
        Self::new(source, FieldKind::Name)
    }

    pub fn phone(source: impl Into<String>) -> Self {
        Self::new(source, FieldKind::Phone)
    }

    fn new(source: impl Into<String>, kind: FieldKind) -> Self {
        let source = source.into();
        Self {
            label: source.clone(),
            source,
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn normalize(&self, value: &CellValue) -> Option<String> {
        match self.kind {
            FieldKind::Name => name_field(value),
            FieldKind::Phone => phone_field(value),
        }
    }
}

/// The filtered, normalized subset of the contact table used for sending.
///
/// Cells are `None` where a value was absent or not representable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedTable {
    head: Vec<String>,
    body: Vec<Vec<Option<String>>>,
}

impl SelectedTable {
    pub fn new(head: Vec<String>, body: Vec<Vec<Option<String>>>) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &[String] {
        &self.head
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.head.iter().position(|column| column == label)
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Option<String>>>) {
        (self.head, self.body)
    }
}

/// Selects the rows whose row number is named by `range_expr` and projects
/// them onto `columns`.
///
/// Every requested source column is resolved before any row is read, so a
/// bad column name never yields a partial table. Output rows keep the contact
/// table's order.
pub fn select(
    table: &Table,
    range_expr: &str,
    columns: &[ColumnSpec],
) -> Result<SelectedTable, SelectionError> {
    let recipients = parse_range(range_expr)?;

    if columns.is_empty() {
        return Err(SelectionError::EmptyColumnMap);
    }

    let resolved = columns
        .iter()
        .map(|spec| {
            table
                .column_index(&spec.source)
                .ok_or_else(|| SelectionError::ColumnNotFound(spec.source.clone()))
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let mut head = Vec::with_capacity(columns.len() + 1);
    head.push(ROW_NUMBER_COLUMN.to_string());
    head.extend(columns.iter().map(|spec| spec.label.clone()));

    let body = table
        .rows()
        .iter()
        .filter(|row| Table::row_number(row).is_some_and(|number| recipients.contains(number)))
        .map(|row| {
            let mut cells = Vec::with_capacity(columns.len() + 1);
            cells.push(row.first().map(CellValue::to_string));
            cells.extend(
                columns
                    .iter()
                    .zip(&resolved)
                    .map(|(spec, &index)| spec.normalize(&row[index])),
            );
            cells
        })
        .collect();

    Ok(SelectedTable { head, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ParseError;

    fn contacts() -> Table {
        Table::from_parts(
            vec!["NUM".into(), "Name".into(), "Phone".into()],
            vec![
                vec!["2".into(), "john smith".into(), "123".into()],
                vec!["3".into(), "jane".into(), "".into()],
                vec!["4".into(), CellValue::Integer(7), CellValue::Integer(3331234567)],
                vec!["5".into(), "ÉVA nagy".into(), CellValue::Float(1.5)],
            ],
        )
        .unwrap()
    }

    fn spec() -> Vec<ColumnSpec> {
        vec![ColumnSpec::name("Name"), ColumnSpec::phone("Phone")]
    }

    #[test]
    fn test_selects_single_row() {
        let selected = select(&contacts(), "2", &spec()).unwrap();
        assert_eq!(selected.head(), ["NUM", "Name", "Phone"]);
        assert_eq!(
            selected.rows(),
            [vec![
                Some("2".to_string()),
                Some("John Smith".to_string()),
                Some("123".to_string())
            ]]
        );
    }

    #[test]
    fn test_normalizes_absent_values() {
        let selected = select(&contacts(), "3-5", &spec()).unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(selected.rows()[0][2], None);
        assert_eq!(selected.rows()[1][1], None);
        assert_eq!(selected.rows()[1][2], Some("3331234567".to_string()));
        assert_eq!(selected.rows()[2][1], Some("Éva Nagy".to_string()));
        assert_eq!(selected.rows()[2][2], None);
    }

    #[test]
    fn test_keeps_table_order() {
        let selected = select(&contacts(), "5,2,4", &spec()).unwrap();
        let numbers: Vec<_> = selected.rows().iter().map(|row| row[0].clone().unwrap()).collect();
        assert_eq!(numbers, ["2", "4", "5"]);
    }

    #[test]
    fn test_rows_outside_table_are_ignored() {
        let selected = select(&contacts(), "1,40-50", &spec()).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_uses_operator_labels() {
        let columns = vec![
            ColumnSpec::name("Name").with_label("Nome"),
            ColumnSpec::phone("Phone").with_label("Telefono"),
        ];
        let selected = select(&contacts(), "2", &columns).unwrap();
        assert_eq!(selected.head(), ["NUM", "Nome", "Telefono"]);
        assert_eq!(selected.column_index("Telefono"), Some(2));
    }

    #[test]
    fn test_invalid_range_fails() {
        assert_eq!(
            select(&contacts(), "two", &spec()),
            Err(SelectionError::InvalidSelection(ParseError::InvalidNumber(
                "two".to_string()
            )))
        );
    }

    #[test]
    fn test_missing_column_fails_before_rows() {
        let columns = vec![ColumnSpec::name("Name"), ColumnSpec::phone("Mobile")];
        assert_eq!(
            select(&contacts(), "2-5", &columns),
            Err(SelectionError::ColumnNotFound("Mobile".to_string()))
        );
    }

    #[test]
    fn test_empty_column_map_fails() {
        assert_eq!(
            select(&contacts(), "2", &[]),
            Err(SelectionError::EmptyColumnMap)
        );
    }
}
