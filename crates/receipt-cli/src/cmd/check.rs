use crate::output::{print_json, print_table};
use anyhow::Context;
use receipt_core::dispatch::{EditEvent, Submission};
use receipt_core::pipeline::RunReport;
use receipt_core::sheet::{CellValue, Sheet};
use receipt_core::types::StageStatus;
use receipt_core::workspace::Workspace;
use std::path::Path;

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

pub fn check(root: &Path, row: u32, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root).context("failed to open workspace")?;
    let col = ws.config.columns.trigger;
    ensure_data_row(&ws, row)?;

    let before = ws
        .responses
        .cell(row, col)
        .with_context(|| format!("failed to read trigger flag on row {row}"))?;
    ws.responses
        .set_value(row, col, CellValue::Bool(true))
        .with_context(|| format!("failed to set trigger flag on row {row}"))?;

    let event = EditEvent {
        sheet_name: ws.responses_name().to_string(),
        row,
        col,
        value: CellValue::Bool(true),
        old_value: Some(before.value),
    };
    let Some(submission) = ws.dispatcher.on_edit(&event) else {
        anyhow::bail!("row {row} is already checked; run 'receipts uncheck {row}' first");
    };

    if json {
        return print_json(&submission);
    }
    match submission {
        Submission::Ran(report) => print_report(&report),
        Submission::AlreadyRunning { row } => println!("Row {row} is already being processed."),
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    print_table(
        &["ROW", "DOCUMENT", "DELIVERY", "FILE"],
        vec![vec![
            report.row.to_string(),
            describe(&report.document),
            describe(&report.delivery),
            report
                .stored
                .as_ref()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "-".to_string()),
        ]],
    );
}

pub(crate) fn describe(status: &StageStatus) -> String {
    match status {
        StageStatus::Failed(reason) => format!("failed: {reason}"),
        other => other.as_str().to_string(),
    }
}

// ---------------------------------------------------------------------------
// uncheck
// ---------------------------------------------------------------------------

pub fn uncheck(root: &Path, row: u32, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root).context("failed to open workspace")?;
    ensure_data_row(&ws, row)?;
    ws.responses
        .set_value(row, ws.config.columns.trigger, CellValue::Bool(false))
        .with_context(|| format!("failed to clear trigger flag on row {row}"))?;

    if json {
        print_json(&serde_json::json!({ "row": row, "checked": false }))?;
    } else {
        println!("Cleared trigger flag on row {row}.");
    }
    Ok(())
}

fn ensure_data_row(ws: &Workspace, row: u32) -> anyhow::Result<()> {
    let last = ws.responses.last_row()?;
    let first = ws.config.columns.first_data_row;
    if row < first || row > last {
        anyhow::bail!("row {row} is not a response row (responses are rows {first}..={last})");
    }
    Ok(())
}
