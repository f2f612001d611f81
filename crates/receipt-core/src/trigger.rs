use crate::config::ColumnConfig;
use crate::error::Result;
use crate::sheet::{CellValue, Grid, Sheet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A new form response landed on `row` of `sheet_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitEvent {
    pub sheet_name: String,
    pub row: u32,
}

/// Equips response rows with the trigger flag.
pub struct TriggerManager {
    sheet: Arc<dyn Sheet>,
    sheet_name: String,
    columns: ColumnConfig,
}

impl TriggerManager {
    pub fn new(sheet: Arc<dyn Sheet>, sheet_name: impl Into<String>, columns: ColumnConfig) -> Self {
        Self {
            sheet,
            sheet_name: sheet_name.into(),
            columns,
        }
    }

    /// Attach an unticked trigger flag to a freshly submitted row. Events from
    /// other sheets and header rows are ignored; returns whether a flag was set.
    pub fn on_form_submit(&self, event: &SubmitEvent) -> Result<bool> {
        if event.sheet_name != self.sheet_name || event.row < self.columns.first_data_row {
            tracing::debug!(sheet = %event.sheet_name, row = event.row, "submit event ignored");
            return Ok(false);
        }
        let (row, col) = (event.row, self.columns.trigger);
        self.sheet.update(&mut |g: &mut Grid| {
            let cell = g.cell_mut(row, col)?;
            cell.checkbox = true;
            cell.value = CellValue::Bool(false);
            Ok(())
        })?;
        tracing::info!(row, "trigger flag attached");
        Ok(true)
    }

    /// Give every data row that has a primary value but no trigger flag an
    /// unticked one. Existing flags are left alone, so repeated sweeps are
    /// no-ops. Returns the rows that were equipped.
    pub fn sweep(&self) -> Result<Vec<u32>> {
        let (first, primary, trigger) = (
            self.columns.first_data_row,
            self.columns.primary,
            self.columns.trigger,
        );
        let mut equipped = Vec::new();
        self.sheet.update(&mut |g: &mut Grid| {
            equipped.clear();
            for row in first..=g.last_row() {
                let has_flag = g.cell(row, trigger).map(|c| c.checkbox).unwrap_or(false);
                if has_flag || g.value(row, primary).is_empty() {
                    continue;
                }
                g.insert_checkbox(row, trigger)?;
                equipped.push(row);
            }
            Ok(())
        })?;
        tracing::info!(count = equipped.len(), "trigger sweep finished");
        Ok(equipped)
    }

    /// Manual repair entry point. Failures are logged, never returned.
    pub fn backfill(&self) {
        match self.sweep() {
            Ok(rows) => {
                for row in rows {
                    tracing::info!(row, "trigger flag backfilled");
                }
            }
            Err(e) => tracing::error!(error = %e, "trigger backfill failed"),
        }
    }
}
