use crate::output::print_json;
use anyhow::Context;
use receipt_core::workspace::Workspace;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root).context("failed to open workspace")?;
    let rows = ws.triggers.sweep().context("trigger sweep failed")?;

    if json {
        return print_json(&serde_json::json!({ "equipped": rows }));
    }
    if rows.is_empty() {
        println!("Every response row already has a trigger flag.");
    } else {
        let list: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        println!("Attached trigger flags to rows: {}", list.join(", "));
    }
    Ok(())
}
