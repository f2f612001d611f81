use crate::pipeline::{PipelineController, RunReport};
use crate::sheet::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;

/// A cell on `sheet_name` was edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEvent {
    pub sheet_name: String,
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
    /// Value before the edit, when the host reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<CellValue>,
}

fn is_true(value: &CellValue) -> bool {
    match value {
        CellValue::Bool(b) => *b,
        CellValue::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "submission", rename_all = "snake_case")]
pub enum Submission {
    Ran(RunReport),
    /// Another run for the same row is still in flight; nothing was done.
    AlreadyRunning { row: u32 },
}

/// Entry point for trigger events. Runs execute on the caller's thread; at
/// most one run per row is in flight at a time, different rows run freely.
pub struct Dispatcher {
    controller: PipelineController,
    sheet_name: String,
    trigger_col: u32,
    first_data_row: u32,
    in_flight: Mutex<HashSet<u32>>,
}

struct RowGuard<'a> {
    set: &'a Mutex<HashSet<u32>>,
    row: u32,
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.row);
    }
}

impl Dispatcher {
    pub fn new(
        controller: PipelineController,
        sheet_name: impl Into<String>,
        trigger_col: u32,
        first_data_row: u32,
    ) -> Self {
        Self {
            controller,
            sheet_name: sheet_name.into(),
            trigger_col,
            first_data_row,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn controller(&self) -> &PipelineController {
        &self.controller
    }

    pub fn is_running(&self, row: u32) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&row)
    }

    fn claim(&self, row: u32) -> Option<RowGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(row) {
            return None;
        }
        Some(RowGuard {
            set: &self.in_flight,
            row,
        })
    }

    /// Run the pipeline for `row` unless a run for it is already in flight.
    pub fn submit(&self, row: u32) -> Submission {
        let Some(_guard) = self.claim(row) else {
            tracing::info!(row, "run already in flight, submission dropped");
            return Submission::AlreadyRunning { row };
        };
        Submission::Ran(self.controller.run(row))
    }

    /// Start a run when the trigger flag on a data row turns true. Any other
    /// edit returns `None`.
    pub fn on_edit(&self, event: &EditEvent) -> Option<Submission> {
        if event.sheet_name != self.sheet_name
            || event.col != self.trigger_col
            || event.row < self.first_data_row
            || !is_true(&event.value)
            || event.old_value.as_ref().is_some_and(is_true)
        {
            return None;
        }
        tracing::info!(row = event.row, "trigger flag set");
        Some(self.submit(event.row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, TemplateConfig};
    use crate::delivery::{DeliveryService, Mailer, OutgoingMail};
    use crate::render::{resolve_mappings, DocumentRenderer, RenderStrategy};
    use crate::sheet::{Grid, MemorySheet, Sheet};
    use crate::storage::DirStore;
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    struct Discard;

    impl Mailer for Discard {
        fn send(&self, _mail: &OutgoingMail) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Blocks inside render until the test releases it.
    struct Gate(Option<Arc<Barrier>>);

    impl RenderStrategy for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        fn render(&self, _filled: &Grid) -> anyhow::Result<Vec<u8>> {
            if let Some(b) = &self.0 {
                b.wait();
            }
            Ok(b"%PDF-1.4".to_vec())
        }
    }

    fn dispatcher(dir: &TempDir, gate: Option<Arc<Barrier>>) -> (Arc<MemorySheet>, Dispatcher) {
        let sheet = Arc::new(MemorySheet::new("Form Responses 1"));
        sheet.append_row(vec![CellValue::text("Timestamp")]).unwrap();
        for name in ["Kim", "Lee"] {
            sheet
                .append_row(vec![
                    CellValue::text("2026-10-01"),
                    CellValue::Empty,
                    CellValue::text(name),
                    CellValue::text("Acme"),
                    CellValue::text("kim@example.com"),
                    CellValue::text("General Fund"),
                    CellValue::Empty,
                    CellValue::Empty,
                    CellValue::Number(100.0),
                ])
                .unwrap();
        }
        let renderer = DocumentRenderer::new(
            Arc::new(MemorySheet::new("Document")),
            resolve_mappings(&TemplateConfig::default().fields).unwrap(),
            vec![Box::new(Gate(gate))],
            "receipt",
        );
        let controller = PipelineController::new(
            sheet.clone(),
            ColumnConfig::default(),
            renderer,
            Arc::new(DirStore::new(dir.path())),
            DeliveryService::new(Arc::new(Discard), "s", "b"),
        );
        (sheet, Dispatcher::new(controller, "Form Responses 1", 10, 2))
    }

    fn edit(sheet: &str, row: u32, col: u32, value: CellValue) -> EditEvent {
        EditEvent {
            sheet_name: sheet.to_string(),
            row,
            col,
            value,
            old_value: None,
        }
    }

    #[test]
    fn only_trigger_column_true_starts_a_run() {
        let dir = TempDir::new().unwrap();
        let (_sheet, d) = dispatcher(&dir, None);

        assert!(d.on_edit(&edit("Document", 2, 10, CellValue::Bool(true))).is_none());
        assert!(d.on_edit(&edit("Form Responses 1", 2, 9, CellValue::Bool(true))).is_none());
        assert!(d.on_edit(&edit("Form Responses 1", 2, 10, CellValue::Bool(false))).is_none());
        assert!(d.on_edit(&edit("Form Responses 1", 1, 10, CellValue::Bool(true))).is_none());

        let mut already = edit("Form Responses 1", 2, 10, CellValue::Bool(true));
        already.old_value = Some(CellValue::Bool(true));
        assert!(d.on_edit(&already).is_none());

        let ran = d.on_edit(&edit("Form Responses 1", 2, 10, CellValue::text("TRUE")));
        assert!(matches!(ran, Some(Submission::Ran(ref r)) if r.is_done()));
    }

    #[test]
    fn held_row_is_not_resubmitted() {
        let dir = TempDir::new().unwrap();
        let (sheet, d) = dispatcher(&dir, None);
        let guard = d.claim(2);
        assert!(guard.is_some());
        assert_eq!(d.submit(2), Submission::AlreadyRunning { row: 2 });
        assert_eq!(sheet.cell(2, 11).unwrap().value, CellValue::Empty);

        drop(guard);
        assert!(!d.is_running(2));
        assert!(matches!(d.submit(2), Submission::Ran(_)));
    }

    #[test]
    fn concurrent_submit_for_same_row_is_deduplicated() {
        let dir = TempDir::new().unwrap();
        let barrier = Arc::new(Barrier::new(2));
        let (_sheet, d) = dispatcher(&dir, Some(barrier.clone()));

        std::thread::scope(|s| {
            let first = s.spawn(|| d.submit(2));
            while !d.is_running(2) {
                std::thread::yield_now();
            }
            assert_eq!(d.submit(2), Submission::AlreadyRunning { row: 2 });
            barrier.wait();
            assert!(matches!(first.join().unwrap(), Submission::Ran(_)));
        });
        assert!(!d.is_running(2));
    }
}
