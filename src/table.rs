use std::fs::File;
use std::io::Read;

use calamine::{Data, Reader, open_workbook_auto};
use camino::{Utf8Path, Utf8PathBuf};

use crate::error::AtlasError;

const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "#N/A"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(value) if value.is_nan() => String::new(),
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Cell::Number(value) => value.to_string(),
            Cell::Text(value) => value.trim().to_string(),
            Cell::Bool(value) => value.to_string(),
        }
    }

    pub fn number(&self) -> Result<Option<f64>, String> {
        let value = match self {
            Cell::Empty => return Ok(None),
            Cell::Number(value) => *value,
            Cell::Bool(value) => f64::from(u8::from(*value)),
            Cell::Text(text) => {
                let trimmed = text.trim();
                if MISSING_TOKENS.contains(&trimmed) {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map_err(|_| text.clone())?
            }
        };
        Ok((!value.is_nan()).then_some(value))
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(value) => Cell::Number(*value as f64),
            Data::Float(value) => Cell::Number(*value),
            Data::Bool(value) => Cell::Bool(*value),
            Data::String(value) => Cell::Text(value.clone()),
            Data::DateTime(value) => Cell::Number(value.as_f64()),
            Data::DateTimeIso(value) | Data::DurationIso(value) => Cell::Text(value.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, AtlasError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::from_workbook(path),
            "csv" => {
                let file = File::open(path.as_std_path()).map_err(|err| AtlasError::SheetOpen {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })?;
                Self::from_csv_reader(path.as_str(), file)
            }
            _ => Err(AtlasError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_csv_reader<R: Read>(name: &str, reader: R) -> Result<Self, AtlasError> {
        let open_error = |err: csv::Error| AtlasError::SheetOpen {
            path: Utf8PathBuf::from(name),
            message: err.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(open_error)?
            .iter()
            .map(|header| header.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(open_error)?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if MISSING_TOKENS.contains(&field.trim()) {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }
        tracing::debug!(table = name, rows = rows.len(), "loaded csv table");
        Ok(Self::new(name, headers, rows))
    }

    fn from_workbook(path: &Utf8Path) -> Result<Self, AtlasError> {
        let open_error = |err: calamine::Error| AtlasError::SheetOpen {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        let mut workbook = open_workbook_auto(path.as_std_path()).map_err(open_error)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AtlasError::EmptyWorkbook(path.to_path_buf()))?;
        let range = workbook.worksheet_range(&sheet).map_err(open_error)?;

        let mut sheet_rows = range.rows();
        let headers = sheet_rows
            .next()
            .map(|row| row.iter().map(|cell| Cell::from(cell).text()).collect())
            .unwrap_or_default();
        let rows = sheet_rows
            .map(|row| row.iter().map(Cell::from).collect())
            .collect::<Vec<Vec<Cell>>>();
        tracing::debug!(table = %path, sheet = %sheet, rows = rows.len(), "loaded worksheet");
        Ok(Self::new(path.as_str(), headers, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolves every column up front so a bad header fails before any row
    /// is processed.
    pub fn require_columns(&self, columns: &[&str]) -> Result<Vec<usize>, AtlasError> {
        columns
            .iter()
            .map(|column| {
                self.headers
                    .iter()
                    .position(|header| header == column)
                    .ok_or_else(|| AtlasError::MissingColumn {
                        table: self.name.clone(),
                        column: column.to_string(),
                    })
            })
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(|(index, cells)| Row {
            table: self,
            // header occupies sheet row 1
            number: index + 2,
            cells,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    number: usize,
    cells: &'a [Cell],
}

impl Row<'_> {
    pub fn cell(&self, column: usize) -> &Cell {
        self.cells.get(column).unwrap_or(&Cell::Empty)
    }

    pub fn text(&self, column: usize) -> String {
        self.cell(column).text()
    }

    pub fn number_at(&self, column: usize) -> Result<Option<f64>, AtlasError> {
        self.cell(column)
            .number()
            .map_err(|value| AtlasError::CellType {
                row: self.number,
                column: self
                    .table
                    .headers
                    .get(column)
                    .cloned()
                    .unwrap_or_default(),
                value,
            })
    }
}

#[cfg(test)]
mod tests {
    use calamine::CellErrorType;

    use super::*;

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(2019.0).text(), "2019");
        assert_eq!(Cell::Number(1.5).text(), "1.5");
        assert_eq!(Cell::Number(f64::NAN).text(), "");
    }

    #[test]
    fn nan_and_empty_are_missing_numbers() {
        assert_eq!(Cell::Empty.number(), Ok(None));
        assert_eq!(Cell::Number(f64::NAN).number(), Ok(None));
        assert_eq!(Cell::Text("NaN".to_string()).number(), Ok(None));
        assert_eq!(Cell::Text(" 12.5 ".to_string()).number(), Ok(Some(12.5)));
        assert_eq!(
            Cell::Text("n/k".to_string()).number(),
            Err("n/k".to_string())
        );
    }

    #[test]
    fn workbook_cells_convert() {
        let error = Cell::from(&Data::Error(CellErrorType::NA));
        assert_eq!(error, Cell::Empty);
        assert_eq!(error.text(), "");
        assert_eq!(error.number(), Ok(None));

        let year = Cell::from(&Data::Int(2019));
        assert_eq!(year.text(), "2019");
        assert_eq!(year.number(), Ok(Some(2019.0)));

        let nan = Cell::from(&Data::Float(f64::NAN));
        assert_eq!(nan.text(), "");
        assert_eq!(nan.number(), Ok(None));

        let padded = Cell::from(&Data::String(" x ".to_string()));
        assert_eq!(padded.text(), "x");
        assert_eq!(padded.number(), Err(" x ".to_string()));
    }

    #[test]
    fn rows_report_sheet_position_on_bad_cells() {
        let table = Table::new(
            "prices.xlsx",
            vec!["outward".to_string(), "2015_price".to_string()],
            vec![
                vec![Cell::Text("SW1A".to_string()), Cell::Number(1.0)],
                vec![Cell::Text("E8".to_string()), Cell::Text("n/k".to_string())],
            ],
        );
        let rows = table.rows().collect::<Vec<_>>();
        assert_eq!(rows[0].number_at(1).unwrap(), Some(1.0));
        let err = rows[1].number_at(1).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::CellType { row: 3, ref column, ref value }
                if column == "2015_price" && value == "n/k"
        ));
    }
}
