//! On-disk receipts workspace: `.receipts/` under a root directory.
//!
//! [`init`] scaffolds the config, the response sheet and the document
//! template. [`Workspace::open`] wires the file-backed collaborators into a
//! ready [`Dispatcher`] and [`TriggerManager`].

use crate::config::{ColumnConfig, Config};
use crate::delivery::{DeliveryService, OutboxMailer};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::pipeline::PipelineController;
use crate::render::{DocumentRenderer, EnvTokenSource};
use crate::sheet::{CellValue, FileSheet, Grid, Sheet};
use crate::storage::DirStore;
use crate::trigger::TriggerManager;
use crate::types::Field;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct InitReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

impl InitReport {
    fn note(&mut self, written: bool, rel: &str) {
        if written {
            self.created.push(rel.to_string());
        } else {
            self.existing.push(rel.to_string());
        }
    }
}

/// Scaffold a workspace under `root`. Existing files are never overwritten.
pub fn init(root: &Path) -> Result<InitReport> {
    let mut report = InitReport::default();
    io::ensure_dir(&paths::receipts_dir(root))?;

    let config = if paths::config_path(root).exists() {
        report.note(false, paths::CONFIG_FILE);
        Config::load(root)?
    } else {
        let config = Config::default();
        config.save(root)?;
        report.note(true, paths::CONFIG_FILE);
        config
    };

    let responses = response_grid(&config.sheets.responses, &config.columns)?;
    let written = FileSheet::create_if_missing(&paths::responses_path(root), &responses)?;
    report.note(written, paths::RESPONSES_FILE);

    let template = template_grid(&config)?;
    let written = FileSheet::create_if_missing(&paths::template_path(root), &template)?;
    report.note(written, paths::TEMPLATE_FILE);

    for dir in [&config.storage.folder, &config.mail.outbox] {
        io::ensure_dir(&paths::resolve(root, dir))?;
    }
    Ok(report)
}

/// Response sheet with only its header row.
pub fn response_grid(name: &str, columns: &ColumnConfig) -> Result<Grid> {
    let mut grid = Grid::new(name);
    let headers = [
        (columns.primary, "Timestamp"),
        (columns.donor_name, "Donor name"),
        (columns.donor_organization, "Organization"),
        (columns.email, "Email"),
        (columns.purpose, "Purpose"),
        (columns.amount, "Amount"),
        (columns.trigger, "Send receipt"),
        (columns.document_status, "Document status"),
        (columns.delivery_status, "Email status"),
    ];
    for (col, label) in headers {
        if col > 0 {
            grid.set_value(1, col, CellValue::text(label))?;
        }
    }
    Ok(grid)
}

/// Document template with a title and a label left of each mapped cell.
fn template_grid(config: &Config) -> Result<Grid> {
    let mut grid = Grid::new(&config.sheets.document);
    grid.set_value(2, 4, CellValue::text("DONATION RECEIPT"))?;
    for m in &config.template.fields {
        let (row, col) = paths::parse_a1(&m.cell)?;
        if col > 1 {
            grid.set_value(row, col - 1, CellValue::text(label_for(m.field)))?;
        }
    }
    Ok(grid)
}

fn label_for(field: Field) -> &'static str {
    match field {
        Field::DonorName => "Name",
        Field::DonorOrganization => "Organization",
        Field::Email => "Email",
        Field::Purpose => "Purpose",
        Field::Amount => "Amount",
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub responses: Arc<FileSheet>,
    pub template: Arc<FileSheet>,
    pub store: Arc<DirStore>,
    pub outbox: Arc<OutboxMailer>,
    pub dispatcher: Dispatcher,
    pub triggers: TriggerManager,
}

impl Workspace {
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let responses = Arc::new(FileSheet::open(paths::responses_path(root))?);
        let template = Arc::new(FileSheet::open(paths::template_path(root))?);
        let store = Arc::new(DirStore::new(paths::resolve(root, &config.storage.folder)));
        let outbox = Arc::new(OutboxMailer::new(paths::resolve(root, &config.mail.outbox)));
        let token = Arc::new(EnvTokenSource {
            var: config.render.export.token_env.clone(),
        });

        let renderer = DocumentRenderer::from_config(
            &config.render,
            &config.template.fields,
            template.clone(),
            store.clone(),
            token,
        )?;
        let delivery = DeliveryService::new(
            outbox.clone(),
            config.mail.subject.clone(),
            config.mail.body.clone(),
        );
        let controller = PipelineController::new(
            responses.clone(),
            config.columns.clone(),
            renderer,
            store.clone(),
            delivery,
        );
        let dispatcher = Dispatcher::new(
            controller,
            config.sheets.responses.clone(),
            config.columns.trigger,
            config.columns.first_data_row,
        );
        let triggers = TriggerManager::new(
            responses.clone(),
            config.sheets.responses.clone(),
            config.columns.clone(),
        );

        tracing::debug!(root = %root.display(), "workspace opened");
        Ok(Self {
            root: root.to_path_buf(),
            config,
            responses,
            template,
            store,
            outbox,
            dispatcher,
            triggers,
        })
    }

    /// Name the host reports for the response sheet in trigger events.
    pub fn responses_name(&self) -> &str {
        &self.config.sheets.responses
    }

    pub fn responses_sheet(&self) -> &dyn Sheet {
        self.responses.as_ref()
    }
}
