use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use receipt_core::sheet::{CellValue, Sheet};
use receipt_core::trigger::SubmitEvent;
use receipt_core::types::Field;
use receipt_core::workspace::Workspace;
use std::path::Path;

#[derive(Args)]
pub struct RespondArgs {
    /// Donor name
    #[arg(long)]
    pub name: String,

    /// Donor organization
    #[arg(long)]
    pub organization: String,

    /// Recipient address for the receipt
    #[arg(long)]
    pub email: String,

    /// Purpose of the donation
    #[arg(long)]
    pub purpose: String,

    /// Donation amount, stored as typed
    #[arg(long)]
    pub amount: String,
}

pub fn run(root: &Path, args: RespondArgs, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root).context("failed to open workspace")?;
    let columns = &ws.config.columns;

    let mut cells = vec![CellValue::Empty; columns.width() as usize];
    let mut put = |col: u32, value: CellValue| {
        if let Some(slot) = col.checked_sub(1).and_then(|i| cells.get_mut(i as usize)) {
            *slot = value;
        }
    };
    put(
        columns.primary,
        CellValue::text(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    for (field, value) in [
        (Field::DonorName, &args.name),
        (Field::DonorOrganization, &args.organization),
        (Field::Email, &args.email),
        (Field::Purpose, &args.purpose),
        (Field::Amount, &args.amount),
    ] {
        put(columns.column_of(field), CellValue::text(value.as_str()));
    }

    let row = ws
        .responses
        .append_row(cells)
        .context("failed to append response")?;
    ws.triggers
        .on_form_submit(&SubmitEvent {
            sheet_name: ws.responses_name().to_string(),
            row,
        })
        .context("failed to attach trigger flag")?;

    if json {
        print_json(&serde_json::json!({ "row": row }))?;
    } else {
        println!("Recorded response on row {row}. Run 'receipts check {row}' to send the receipt.");
    }
    Ok(())
}
