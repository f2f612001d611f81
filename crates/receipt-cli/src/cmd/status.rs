use crate::cmd::check::describe;
use crate::output::{print_json, print_table};
use anyhow::Context;
use receipt_core::record::ResponseRecord;
use receipt_core::sheet::Sheet;
use receipt_core::types::{StageStatus, StatusSlot};
use receipt_core::workspace::Workspace;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct RowStatus {
    row: u32,
    donor: String,
    email: String,
    checked: bool,
    document: StageStatus,
    delivery: StageStatus,
}

pub fn run(root: &Path, only: Option<u32>, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root).context("failed to open workspace")?;
    let columns = &ws.config.columns;
    let recorder = ws.dispatcher.controller().recorder();

    let last = ws.responses.last_row()?;
    let rows: Vec<u32> = match only {
        Some(row) => vec![row],
        None => (columns.first_data_row..=last).collect(),
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let record = ResponseRecord::read(ws.responses_sheet(), row, columns)
            .with_context(|| format!("failed to read row {row}"))?;
        out.push(RowStatus {
            row,
            donor: record.donor_name(),
            email: record.email(),
            checked: ws.responses.cell(row, columns.trigger)?.is_checked(),
            document: recorder.read(row, StatusSlot::Document)?,
            delivery: recorder.read(row, StatusSlot::Delivery)?,
        });
    }

    if json {
        return print_json(&out);
    }
    if out.is_empty() {
        println!("No responses yet.");
        return Ok(());
    }
    let table = out
        .iter()
        .map(|s| {
            vec![
                s.row.to_string(),
                s.donor.clone(),
                s.email.clone(),
                if s.checked { "x" } else { "" }.to_string(),
                describe(&s.document),
                describe(&s.delivery),
            ]
        })
        .collect();
    print_table(
        &["ROW", "DONOR", "EMAIL", "CHECKED", "DOCUMENT", "DELIVERY"],
        table,
    );
    Ok(())
}
