//! Status cells: one document slot and one delivery slot per row.
//!
//! Writes are best effort. A failed status write is logged and dropped so it
//! can never replace the pipeline failure it was trying to report.

use crate::config::ColumnConfig;
use crate::error::{ReceiptError, Result, StatusWriteError};
use crate::sheet::{CellValue, Sheet};
use crate::types::{StageStatus, StatusSlot};
use std::sync::Arc;

pub struct StatusRecorder {
    sheet: Arc<dyn Sheet>,
    document_col: u32,
    delivery_col: u32,
}

impl StatusRecorder {
    pub fn new(sheet: Arc<dyn Sheet>, columns: &ColumnConfig) -> Self {
        Self {
            sheet,
            document_col: columns.document_status,
            delivery_col: columns.delivery_status,
        }
    }

    fn column(&self, slot: StatusSlot) -> u32 {
        match slot {
            StatusSlot::Document => self.document_col,
            StatusSlot::Delivery => self.delivery_col,
        }
    }

    /// Write `status` into `slot` on `row`, overwriting whatever was there.
    pub fn record(&self, row: u32, slot: StatusSlot, status: &StageStatus) {
        if let Err(e) = self.try_record(row, slot, status) {
            tracing::warn!(error = %e, "status write dropped");
        }
    }

    pub fn try_record(
        &self,
        row: u32,
        slot: StatusSlot,
        status: &StageStatus,
    ) -> std::result::Result<(), StatusWriteError> {
        self.write(row, slot, status)
            .map_err(|source| StatusWriteError { row, slot, source })
    }

    fn write(&self, row: u32, slot: StatusSlot, status: &StageStatus) -> Result<()> {
        let col = self.column(slot);
        let value = slot
            .text(status)
            .map(CellValue::Text)
            .unwrap_or(CellValue::Empty);
        self.sheet.set_value(row, col, value)?;
        if let Some(color) = status.color() {
            self.sheet.set_background(row, col, color.hex())?;
        }
        Ok(())
    }

    /// Current status of `slot` on `row`, parsed from the cell text.
    pub fn read(&self, row: u32, slot: StatusSlot) -> Result<StageStatus> {
        let cell = self.sheet.cell(row, self.column(slot))?;
        Ok(slot.parse(&cell.value.to_string()))
    }
}

/// Tracks one slot through a single run and refuses illegal transitions.
pub struct StageTracker<'a> {
    recorder: &'a StatusRecorder,
    row: u32,
    slot: StatusSlot,
    current: StageStatus,
}

impl<'a> StageTracker<'a> {
    pub fn new(recorder: &'a StatusRecorder, row: u32, slot: StatusSlot) -> Self {
        Self {
            recorder,
            row,
            slot,
            current: StageStatus::Idle,
        }
    }

    pub fn current(&self) -> &StageStatus {
        &self.current
    }

    pub fn advance(&mut self, next: StageStatus) -> Result<()> {
        if !self.current.can_transition_to(&next) {
            return Err(ReceiptError::InvalidTransition {
                slot: self.slot,
                from: self.current.clone(),
                to: next,
            });
        }
        self.recorder.record(self.row, self.slot, &next);
        self.current = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.advance(StageStatus::InProgress)
    }

    pub fn succeed(&mut self) -> Result<()> {
        self.advance(StageStatus::Succeeded)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.advance(StageStatus::Failed(reason.into()))
    }
}
