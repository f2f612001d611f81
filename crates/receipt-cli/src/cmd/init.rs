use crate::output::print_json;
use anyhow::Context;
use receipt_core::workspace;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let report = workspace::init(root)
        .with_context(|| format!("failed to initialize {}", root.display()))?;

    if json {
        return print_json(&report);
    }

    println!("Initializing receipts in: {}", root.display());
    for path in &report.created {
        println!("  created: {path}");
    }
    for path in &report.existing {
        println!("  exists:  {path}");
    }
    println!("\nNext: receipts respond --name ... then receipts check <row>");
    Ok(())
}
