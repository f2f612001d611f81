use crate::config::ColumnConfig;
use crate::sheet::{CellValue, Sheet};
use crate::types::Field;
use crate::Result;
use serde::Serialize;

/// One response row, read once at the start of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub row: u32,
    pub cells: Vec<CellValue>,
    #[serde(skip)]
    columns: ColumnConfig,
}

impl ResponseRecord {
    pub fn new(row: u32, cells: Vec<CellValue>, columns: ColumnConfig) -> Self {
        Self {
            row,
            cells,
            columns,
        }
    }

    pub fn read(sheet: &dyn Sheet, row: u32, columns: &ColumnConfig) -> Result<Self> {
        let cells = sheet.read_row(row, columns.width())?;
        Ok(Self::new(row, cells, columns.clone()))
    }

    pub fn value(&self, field: Field) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        let col = self.columns.column_of(field);
        col.checked_sub(1)
            .and_then(|i| self.cells.get(i as usize))
            .unwrap_or(&EMPTY)
    }

    /// Display text of a field, trimmed.
    pub fn text(&self, field: Field) -> String {
        self.value(field).to_string().trim().to_string()
    }

    pub fn donor_name(&self) -> String {
        self.text(Field::DonorName)
    }

    pub fn email(&self) -> String {
        self.text(Field::Email)
    }
}
