//! One run of the receipt pipeline for one response row.
//!
//! `Validating → Rendering → Storing → Delivering → Done`, with `Failed`
//! reachable from every stage. Every stage error ends up as a `Failed(reason)`
//! status on the row; [`PipelineController::run`] itself never fails.

use crate::config::ColumnConfig;
use crate::delivery::DeliveryService;
use crate::record::ResponseRecord;
use crate::render::DocumentRenderer;
use crate::sheet::Sheet;
use crate::status::{StageTracker, StatusRecorder};
use crate::storage::{FileStore, StoredFile};
use crate::types::{PipelineState, Stage, StageStatus, StatusSlot};
use crate::validate::validate;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a single run, for callers that want more than the status cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub row: u32,
    pub state: PipelineState,
    pub document: StageStatus,
    pub delivery: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<StoredFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl RunReport {
    pub fn is_done(&self) -> bool {
        self.state == PipelineState::Done
    }
}

pub struct PipelineController {
    responses: Arc<dyn Sheet>,
    columns: ColumnConfig,
    recorder: StatusRecorder,
    renderer: DocumentRenderer,
    store: Arc<dyn FileStore>,
    delivery: DeliveryService,
}

impl PipelineController {
    pub fn new(
        responses: Arc<dyn Sheet>,
        columns: ColumnConfig,
        renderer: DocumentRenderer,
        store: Arc<dyn FileStore>,
        delivery: DeliveryService,
    ) -> Self {
        let recorder = StatusRecorder::new(responses.clone(), &columns);
        Self {
            responses,
            columns,
            recorder,
            renderer,
            store,
            delivery,
        }
    }

    pub fn recorder(&self) -> &StatusRecorder {
        &self.recorder
    }

    pub fn renderer(&self) -> &DocumentRenderer {
        &self.renderer
    }

    /// Process `row` from validation through delivery.
    pub fn run(&self, row: u32) -> RunReport {
        let mut run = Run {
            row,
            document: StageTracker::new(&self.recorder, row, StatusSlot::Document),
            delivery: StageTracker::new(&self.recorder, row, StatusSlot::Delivery),
            stored: None,
            recipient: None,
        };

        let state = self.drive(&mut run);
        match &state {
            PipelineState::Failed { stage, reason } => {
                tracing::error!(row, %stage, reason = %reason, "pipeline failed");
            }
            PipelineState::Done => tracing::info!(row, "pipeline done"),
        }

        RunReport {
            row,
            state,
            document: run.document.current().clone(),
            delivery: run.delivery.current().clone(),
            stored: run.stored,
            recipient: run.recipient,
        }
    }

    fn drive(&self, run: &mut Run<'_>) -> PipelineState {
        let row = run.row;

        // Validating
        tracing::info!(row, stage = %Stage::Validating, "stage entered");
        checked(run.document.start());
        let record = match ResponseRecord::read(self.responses.as_ref(), row, &self.columns) {
            Ok(r) => r,
            Err(e) => return run.fail_document(Stage::Validating, e.to_string()),
        };
        if let Err(e) = validate(&record) {
            return run.fail_document(Stage::Validating, e.to_string());
        }

        // Rendering
        tracing::info!(row, stage = %Stage::Rendering, "stage entered");
        let artifact = match self.renderer.render(&record) {
            Ok(a) => a,
            Err(e) => return run.fail_document(Stage::Rendering, e.to_string()),
        };

        // Storing
        tracing::info!(row, stage = %Stage::Storing, file = %artifact.file_name, "stage entered");
        match self.store.create_file(&artifact.file_name, &artifact.bytes) {
            Ok(stored) => run.stored = Some(stored),
            Err(e) => return run.fail_document(Stage::Storing, e.to_string()),
        }
        checked(run.document.succeed());

        // Delivering
        tracing::info!(row, stage = %Stage::Delivering, "stage entered");
        checked(run.delivery.start());
        let email = record.email();
        match self.delivery.deliver(&email, &artifact) {
            Ok(receipt) => {
                run.recipient = Some(receipt.to);
                checked(run.delivery.succeed());
                PipelineState::Done
            }
            Err(e) => {
                let reason = e.to_string();
                checked(run.delivery.fail(reason.clone()));
                PipelineState::Failed {
                    stage: Stage::Delivering,
                    reason,
                }
            }
        }
    }
}

struct Run<'a> {
    row: u32,
    document: StageTracker<'a>,
    delivery: StageTracker<'a>,
    stored: Option<StoredFile>,
    recipient: Option<String>,
}

impl Run<'_> {
    fn fail_document(&mut self, stage: Stage, reason: String) -> PipelineState {
        checked(self.document.fail(reason.clone()));
        PipelineState::Failed { stage, reason }
    }
}

fn checked(transition: crate::Result<()>) {
    if let Err(e) = transition {
        tracing::error!(error = %e, "status transition rejected");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
