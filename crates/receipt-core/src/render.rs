//! Receipt rendering.
//!
//! A run copies the template ([`Sheet::snapshot`]), writes the mapped fields
//! into the copy and hands the copy to an ordered list of
//! [`RenderStrategy`]s. The first strategy to produce bytes wins; if all of
//! them fail the returned [`RenderError`] lists every cause.

use crate::config::{
    ExportConfig, FieldMapping, HorizontalAlignment, PageFormat, RenderConfig, StrategyKind,
    VerticalAlignment,
};
use crate::error::{ReceiptError, RenderError, Result, StrategyFailure};
use crate::paths::parse_a1;
use crate::record::ResponseRecord;
use crate::sheet::{Grid, Sheet};
use crate::storage::{DocumentFormat, FileStore};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// RenderedArtifact
// ---------------------------------------------------------------------------

/// Receipt bytes plus the file name they will be stored and mailed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedArtifact {
    pub file_name: String,
    pub mime: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Strategy that produced the bytes.
    pub strategy: String,
}

/// `<prefix>_<donorName>_<epochMillis>.pdf`
pub fn artifact_file_name(prefix: &str, donor_name: &str, epoch_millis: i64) -> String {
    format!("{prefix}_{donor_name}_{epoch_millis}.pdf")
}

// ---------------------------------------------------------------------------
// Template filling
// ---------------------------------------------------------------------------

/// A field mapping with its `A1` reference resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMapping {
    pub mapping: FieldMapping,
    pub row: u32,
    pub col: u32,
}

pub fn resolve_mappings(fields: &[FieldMapping]) -> Result<Vec<ResolvedMapping>> {
    fields
        .iter()
        .map(|m| {
            let (row, col) = parse_a1(&m.cell)?;
            Ok(ResolvedMapping {
                mapping: m.clone(),
                row,
                col,
            })
        })
        .collect()
}

/// Write the record's mapped fields into `grid`.
pub fn fill_template(
    grid: &mut Grid,
    record: &ResponseRecord,
    mappings: &[ResolvedMapping],
) -> Result<()> {
    for m in mappings {
        grid.set_value(m.row, m.col, record.value(m.mapping.field).clone())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RenderStrategy
// ---------------------------------------------------------------------------

pub trait RenderStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce document bytes for the filled template copy.
    fn render(&self, filled: &Grid) -> anyhow::Result<Vec<u8>>;
}

/// Export the filled copy as a sheet blob, convert it through the file store,
/// then trash the intermediate.
pub struct ConversionStrategy {
    store: Arc<dyn FileStore>,
}

impl ConversionStrategy {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }
}

impl RenderStrategy for ConversionStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::Conversion.as_str()
    }

    fn render(&self, filled: &Grid) -> anyhow::Result<Vec<u8>> {
        let blob = serde_yaml::to_string(filled).context("failed to export template")?;
        let temp_name = format!("temp_sheet.{}", DocumentFormat::SheetExport.extension());
        let temp = self
            .store
            .create_file(&temp_name, blob.as_bytes())
            .context("failed to store template export")?;

        let converted = self.store.convert(&temp.id, DocumentFormat::Pdf);
        if let Err(e) = self.store.trash(&temp.id) {
            tracing::warn!(file = %temp.id, error = %e, "failed to discard template export");
        }
        converted.context("conversion to pdf failed")
    }
}

// ---------------------------------------------------------------------------
// Export URL fallback
// ---------------------------------------------------------------------------

/// Bearer credential supplied by the host.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> anyhow::Result<String>;
}

/// Reads the token from an environment variable at call time.
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    pub var: String,
}

impl TokenSource for EnvTokenSource {
    fn token(&self) -> anyhow::Result<String> {
        let value = std::env::var(&self.var)
            .with_context(|| format!("environment variable {} is not set", self.var))?;
        if value.trim().is_empty() {
            anyhow::bail!("environment variable {} is empty", self.var);
        }
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn token(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

fn horizontal(a: HorizontalAlignment) -> &'static str {
    match a {
        HorizontalAlignment::Left => "LEFT",
        HorizontalAlignment::Center => "CENTER",
        HorizontalAlignment::Right => "RIGHT",
    }
}

fn vertical(a: VerticalAlignment) -> &'static str {
    match a {
        VerticalAlignment::Top => "TOP",
        VerticalAlignment::Middle => "MIDDLE",
        VerticalAlignment::Bottom => "BOTTOM",
    }
}

/// Export URL for `spreadsheet_id`/`gid` carrying the page format.
pub fn export_url(base_url: &str, spreadsheet_id: &str, gid: u64, page: &PageFormat) -> String {
    format!(
        "{}/{}/export?exportFormat=pdf&format=pdf&gid={}&size={}&portrait={}&fitw={}\
         &top_margin={}&bottom_margin={}&left_margin={}&right_margin={}\
         &horizontal_alignment={}&vertical_alignment={}",
        base_url.trim_end_matches('/'),
        spreadsheet_id,
        gid,
        page.size,
        page.portrait,
        page.fit_width,
        page.top_margin,
        page.bottom_margin,
        page.left_margin,
        page.right_margin,
        horizontal(page.horizontal_alignment),
        vertical(page.vertical_alignment),
    )
}

/// Fetch the host's PDF export of the document sheet.
///
/// The host exports its own copy of the template, not ours, so the mapped
/// cells of the filled copy are written onto the shared `surface` first.
/// Write and fetch happen under `lock`, so two runs never interleave there.
pub struct ExportUrlStrategy {
    export: ExportConfig,
    surface: Arc<dyn Sheet>,
    mappings: Vec<ResolvedMapping>,
    token: Arc<dyn TokenSource>,
    client: reqwest::blocking::Client,
    lock: Mutex<()>,
}

impl ExportUrlStrategy {
    pub fn new(
        export: ExportConfig,
        surface: Arc<dyn Sheet>,
        mappings: Vec<ResolvedMapping>,
        token: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            export,
            surface,
            mappings,
            token,
            client: reqwest::blocking::Client::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn url(&self) -> String {
        export_url(
            &self.export.base_url,
            &self.export.spreadsheet_id,
            self.export.sheet_gid,
            &self.export.page,
        )
    }
}

impl RenderStrategy for ExportUrlStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::ExportUrl.as_str()
    }

    fn render(&self, filled: &Grid) -> anyhow::Result<Vec<u8>> {
        if self.export.spreadsheet_id.trim().is_empty() {
            anyhow::bail!("render.export.spreadsheet_id is not configured");
        }
        let token = self.token.token()?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        for m in &self.mappings {
            self.surface
                .set_value(m.row, m.col, filled.value(m.row, m.col))
                .with_context(|| format!("failed to write {} to the template", m.mapping.cell))?;
        }

        let url = self.url();
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .context("export request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("export request returned {status}");
        }
        let bytes = response.bytes().context("failed to read export body")?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// DocumentRenderer
// ---------------------------------------------------------------------------

pub struct DocumentRenderer {
    template: Arc<dyn Sheet>,
    mappings: Vec<ResolvedMapping>,
    strategies: Vec<Box<dyn RenderStrategy>>,
    file_name_prefix: String,
}

impl DocumentRenderer {
    pub fn new(
        template: Arc<dyn Sheet>,
        mappings: Vec<ResolvedMapping>,
        strategies: Vec<Box<dyn RenderStrategy>>,
        file_name_prefix: impl Into<String>,
    ) -> Self {
        Self {
            template,
            mappings,
            strategies,
            file_name_prefix: file_name_prefix.into(),
        }
    }

    /// Build the strategy list named by `config.strategies`, in order.
    pub fn from_config(
        config: &RenderConfig,
        fields: &[FieldMapping],
        template: Arc<dyn Sheet>,
        store: Arc<dyn FileStore>,
        token: Arc<dyn TokenSource>,
    ) -> Result<Self> {
        let mappings = resolve_mappings(fields)?;
        let strategies = config
            .strategies
            .iter()
            .map(|kind| -> Box<dyn RenderStrategy> {
                match kind {
                    StrategyKind::Conversion => Box::new(ConversionStrategy::new(store.clone())),
                    StrategyKind::ExportUrl => Box::new(ExportUrlStrategy::new(
                        config.export.clone(),
                        template.clone(),
                        mappings.clone(),
                        token.clone(),
                    )),
                }
            })
            .collect();
        Ok(Self::new(
            template,
            mappings,
            strategies,
            config.file_name_prefix.clone(),
        ))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Render `record` into a receipt. The shared template is only read.
    pub fn render(
        &self,
        record: &ResponseRecord,
    ) -> std::result::Result<RenderedArtifact, RenderError> {
        let mut filled = self.template.snapshot().map_err(|e| template_error(&e))?;
        fill_template(&mut filled, record, &self.mappings).map_err(|e| template_error(&e))?;

        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            match strategy.render(&filled) {
                Ok(bytes) => {
                    tracing::info!(
                        row = record.row,
                        strategy = strategy.name(),
                        bytes = bytes.len(),
                        "receipt rendered"
                    );
                    return Ok(RenderedArtifact {
                        file_name: artifact_file_name(
                            &self.file_name_prefix,
                            &record.donor_name(),
                            Utc::now().timestamp_millis(),
                        ),
                        mime: DocumentFormat::Pdf.mime(),
                        bytes,
                        strategy: strategy.name().to_string(),
                    });
                }
                Err(e) => {
                    let cause = format!("{e:#}");
                    tracing::warn!(
                        row = record.row,
                        strategy = strategy.name(),
                        error = %cause,
                        "render strategy failed"
                    );
                    attempts.push(StrategyFailure {
                        strategy: strategy.name().to_string(),
                        cause,
                    });
                }
            }
        }
        Err(RenderError { attempts })
    }
}

fn template_error(e: &ReceiptError) -> RenderError {
    RenderError {
        attempts: vec![StrategyFailure {
            strategy: "template".to_string(),
            cause: e.to_string(),
        }],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, TemplateConfig};
    use crate::sheet::{CellValue, MemorySheet};
    use crate::storage::DirStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Counting {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RenderStrategy for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn render(&self, filled: &Grid) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("{} unavailable", self.name);
            }
            Ok(filled.value(8, 3).to_string().into_bytes())
        }
    }

    fn record() -> ResponseRecord {
        let mut cells = vec![CellValue::Empty; 12];
        cells[2] = CellValue::text("Kim");
        cells[3] = CellValue::text("Acme");
        cells[4] = CellValue::text("kim@example.com");
        cells[5] = CellValue::text("General Fund");
        cells[8] = CellValue::text("50000");
        ResponseRecord::new(2, cells, ColumnConfig::default())
    }

    fn mappings() -> Vec<ResolvedMapping> {
        resolve_mappings(&TemplateConfig::default().fields).unwrap()
    }

    fn counting(name: &'static str, fail: bool) -> (Box<dyn RenderStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let s = Counting {
            name,
            calls: calls.clone(),
            fail,
        };
        (Box::new(s), calls)
    }

    #[test]
    fn file_name_format() {
        assert_eq!(
            artifact_file_name("receipt", "Kim", 1_700_000_000_000),
            "receipt_Kim_1700000000000.pdf"
        );
    }

    #[test]
    fn fill_writes_four_positions() {
        let mut grid = Grid::new("Document");
        fill_template(&mut grid, &record(), &mappings()).unwrap();
        assert_eq!(grid.value(8, 3), CellValue::text("Kim"));
        assert_eq!(grid.value(8, 8), CellValue::text("Acme"));
        assert_eq!(grid.value(9, 3), CellValue::text("General Fund"));
        assert_eq!(grid.value(24, 10), CellValue::text("50000"));
    }

    #[test]
    fn render_leaves_shared_template_untouched() {
        let template = Arc::new(MemorySheet::new("Document"));
        template.set_value(1, 1, CellValue::text("DONATION RECEIPT")).unwrap();
        let (primary, _) = counting("primary", false);
        let renderer = DocumentRenderer::new(template.clone(), mappings(), vec![primary], "receipt");

        let artifact = renderer.render(&record()).unwrap();
        assert_eq!(artifact.bytes, b"Kim");
        assert!(artifact.file_name.starts_with("receipt_Kim_"));
        assert_eq!(template.cell(8, 3).unwrap().value, CellValue::Empty);
    }

    #[test]
    fn fallback_runs_once_after_primary_fails() {
        let template = Arc::new(MemorySheet::new("Document"));
        let (primary, primary_calls) = counting("primary", true);
        let (fallback, fallback_calls) = counting("fallback", false);
        let renderer =
            DocumentRenderer::new(template, mappings(), vec![primary, fallback], "receipt");

        let artifact = renderer.render(&record()).unwrap();
        assert_eq!(artifact.strategy, "fallback");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fallback_skipped_when_primary_succeeds() {
        let template = Arc::new(MemorySheet::new("Document"));
        let (primary, _) = counting("primary", false);
        let (fallback, fallback_calls) = counting("fallback", false);
        let renderer =
            DocumentRenderer::new(template, mappings(), vec![primary, fallback], "receipt");
        renderer.render(&record()).unwrap();
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn render_error_lists_every_cause() {
        let template = Arc::new(MemorySheet::new("Document"));
        let (primary, _) = counting("primary", true);
        let (fallback, _) = counting("fallback", true);
        let renderer =
            DocumentRenderer::new(template, mappings(), vec![primary, fallback], "receipt");

        let err = renderer.render(&record()).unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert_eq!(err.attempts[0].strategy, "primary");
        assert_eq!(err.attempts[1].cause, "fallback unavailable");
        assert!(err.to_string().contains("primary: primary unavailable"));
    }

    #[test]
    fn conversion_strategy_discards_intermediate() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DirStore::new(dir.path()));
        let strategy = ConversionStrategy::new(store.clone());
        let mut grid = Grid::new("Document");
        fill_template(&mut grid, &record(), &mappings()).unwrap();

        let bytes = strategy.render(&grid).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn export_url_carries_page_format() {
        let url = export_url("https://sheets.test/d/", "abc", 7, &PageFormat::default());
        assert!(url.starts_with("https://sheets.test/d/abc/export?"));
        for part in [
            "format=pdf",
            "gid=7",
            "size=A4",
            "portrait=true",
            "fitw=true",
            "top_margin=0.75",
            "bottom_margin=0.75",
            "left_margin=0.7",
            "right_margin=0.7",
            "horizontal_alignment=CENTER",
            "vertical_alignment=TOP",
        ] {
            assert!(url.contains(part), "missing {part} in {url}");
        }
    }

    #[test]
    fn export_strategy_fetches_with_bearer_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/abc/export")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("size".into(), "A4".into()),
                mockito::Matcher::UrlEncoded("portrait".into(), "true".into()),
                mockito::Matcher::UrlEncoded("horizontal_alignment".into(), "CENTER".into()),
            ]))
            .match_header("authorization", "Bearer host-token")
            .with_status(200)
            .with_body("%PDF-1.4 exported")
            .create();

        let surface = Arc::new(MemorySheet::new("Document"));
        let export = ExportConfig {
            base_url: server.url(),
            spreadsheet_id: "abc".to_string(),
            ..ExportConfig::default()
        };
        let strategy = ExportUrlStrategy::new(
            export,
            surface.clone(),
            mappings(),
            Arc::new(StaticToken("host-token".to_string())),
        );
        let mut grid = Grid::new("Document");
        fill_template(&mut grid, &record(), &mappings()).unwrap();

        let bytes = strategy.render(&grid).unwrap();
        assert_eq!(bytes, b"%PDF-1.4 exported");
        assert_eq!(surface.cell(8, 3).unwrap().value, CellValue::text("Kim"));
        mock.assert();
    }

    #[test]
    fn export_strategy_reports_http_errors() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(403)
            .create();
        let export = ExportConfig {
            base_url: server.url(),
            spreadsheet_id: "abc".to_string(),
            ..ExportConfig::default()
        };
        let strategy = ExportUrlStrategy::new(
            export,
            Arc::new(MemorySheet::new("Document")),
            mappings(),
            Arc::new(StaticToken("t".to_string())),
        );
        let err = strategy.render(&Grid::new("Document")).unwrap_err();
        assert!(format!("{err:#}").contains("403"));
    }

    #[test]
    fn export_strategy_requires_spreadsheet_id() {
        let strategy = ExportUrlStrategy::new(
            ExportConfig::default(),
            Arc::new(MemorySheet::new("Document")),
            mappings(),
            Arc::new(StaticToken("t".to_string())),
        );
        assert!(strategy.render(&Grid::new("Document")).is_err());
    }

    #[test]
    fn env_token_missing_is_an_error() {
        let source = EnvTokenSource {
            var: "RECEIPTS_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
        };
        assert!(source.token().is_err());
    }
}
