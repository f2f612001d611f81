use crate::error::{ReceiptError, Result};
use crate::paths;
use crate::types::Field;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SheetsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default = "default_responses_sheet")]
    pub responses: String,
    #[serde(default = "default_document_sheet")]
    pub document: String,
}

fn default_responses_sheet() -> String {
    "Form Responses 1".to_string()
}

fn default_document_sheet() -> String {
    "Document".to_string()
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            responses: default_responses_sheet(),
            document: default_document_sheet(),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnConfig
// ---------------------------------------------------------------------------

/// 1-based column positions on the response sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Column that must hold data for the backfill sweep to equip a row.
    #[serde(default = "default_primary")]
    pub primary: u32,
    #[serde(default = "default_donor_name")]
    pub donor_name: u32,
    #[serde(default = "default_donor_organization")]
    pub donor_organization: u32,
    #[serde(default = "default_email")]
    pub email: u32,
    #[serde(default = "default_purpose")]
    pub purpose: u32,
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default = "default_trigger")]
    pub trigger: u32,
    #[serde(default = "default_document_status")]
    pub document_status: u32,
    #[serde(default = "default_delivery_status")]
    pub delivery_status: u32,
    #[serde(default = "default_first_data_row")]
    pub first_data_row: u32,
}

fn default_primary() -> u32 {
    1
}

fn default_donor_name() -> u32 {
    3
}

fn default_donor_organization() -> u32 {
    4
}

fn default_email() -> u32 {
    5
}

fn default_purpose() -> u32 {
    6
}

fn default_amount() -> u32 {
    9
}

fn default_trigger() -> u32 {
    10
}

fn default_document_status() -> u32 {
    11
}

fn default_delivery_status() -> u32 {
    12
}

fn default_first_data_row() -> u32 {
    2
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            donor_name: default_donor_name(),
            donor_organization: default_donor_organization(),
            email: default_email(),
            purpose: default_purpose(),
            amount: default_amount(),
            trigger: default_trigger(),
            document_status: default_document_status(),
            delivery_status: default_delivery_status(),
            first_data_row: default_first_data_row(),
        }
    }
}

impl ColumnConfig {
    pub fn column_of(&self, field: Field) -> u32 {
        match field {
            Field::DonorName => self.donor_name,
            Field::DonorOrganization => self.donor_organization,
            Field::Email => self.email,
            Field::Purpose => self.purpose,
            Field::Amount => self.amount,
        }
    }

    /// Number of columns a row read must cover.
    pub fn width(&self) -> u32 {
        [
            self.primary,
            self.donor_name,
            self.donor_organization,
            self.email,
            self.purpose,
            self.amount,
            self.trigger,
            self.document_status,
            self.delivery_status,
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// TemplateConfig
// ---------------------------------------------------------------------------

/// One entry of the static field → template position table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: Field,
    /// `A1` reference on the document template.
    pub cell: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_fields")]
    pub fields: Vec<FieldMapping>,
}

fn default_template_fields() -> Vec<FieldMapping> {
    [
        (Field::DonorName, "C8"),
        (Field::DonorOrganization, "H8"),
        (Field::Purpose, "C9"),
        (Field::Amount, "J24"),
    ]
    .into_iter()
    .map(|(field, cell)| FieldMapping {
        field,
        cell: cell.to_string(),
    })
    .collect()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            fields: default_template_fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// RenderConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Export the template, convert it through the file store, discard the intermediate.
    Conversion,
    /// Fetch a parameterized export URL with a bearer token.
    ExportUrl,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Conversion => "conversion",
            StrategyKind::ExportUrl => "export_url",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerticalAlignment {
    Top,
    Middle,
    Bottom,
}

/// Page layout requested from the export endpoint. Margins are in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    #[serde(default = "default_page_size")]
    pub size: String,
    #[serde(default = "default_true")]
    pub portrait: bool,
    #[serde(default = "default_true")]
    pub fit_width: bool,
    #[serde(default = "default_vertical_margin")]
    pub top_margin: f64,
    #[serde(default = "default_vertical_margin")]
    pub bottom_margin: f64,
    #[serde(default = "default_horizontal_margin")]
    pub left_margin: f64,
    #[serde(default = "default_horizontal_margin")]
    pub right_margin: f64,
    #[serde(default = "default_horizontal_alignment")]
    pub horizontal_alignment: HorizontalAlignment,
    #[serde(default = "default_vertical_alignment")]
    pub vertical_alignment: VerticalAlignment,
}

fn default_page_size() -> String {
    "A4".to_string()
}

fn default_true() -> bool {
    true
}

fn default_vertical_margin() -> f64 {
    0.75
}

fn default_horizontal_margin() -> f64 {
    0.7
}

fn default_horizontal_alignment() -> HorizontalAlignment {
    HorizontalAlignment::Center
}

fn default_vertical_alignment() -> VerticalAlignment {
    VerticalAlignment::Top
}

impl Default for PageFormat {
    fn default() -> Self {
        Self {
            size: default_page_size(),
            portrait: true,
            fit_width: true,
            top_margin: default_vertical_margin(),
            bottom_margin: default_vertical_margin(),
            left_margin: default_horizontal_margin(),
            right_margin: default_horizontal_margin(),
            horizontal_alignment: default_horizontal_alignment(),
            vertical_alignment: default_vertical_alignment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub sheet_gid: u64,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub page: PageFormat,
}

fn default_export_base_url() -> String {
    "https://docs.google.com/spreadsheets/d".to_string()
}

fn default_token_env() -> String {
    "RECEIPTS_OAUTH_TOKEN".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: default_export_base_url(),
            spreadsheet_id: String::new(),
            sheet_gid: 0,
            token_env: default_token_env(),
            page: PageFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_file_name_prefix")]
    pub file_name_prefix: String,
    /// Tried in order; the first success wins.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,
    #[serde(default)]
    pub export: ExportConfig,
}

fn default_file_name_prefix() -> String {
    "receipt".to_string()
}

fn default_strategies() -> Vec<StrategyKind> {
    vec![StrategyKind::Conversion, StrategyKind::ExportUrl]
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            file_name_prefix: default_file_name_prefix(),
            strategies: default_strategies(),
            export: ExportConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// MailConfig / StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_body")]
    pub body: String,
    /// Directory the outbox transport drops messages into.
    #[serde(default = "default_outbox")]
    pub outbox: String,
}

fn default_subject() -> String {
    "Your donation receipt".to_string()
}

fn default_body() -> String {
    "Hello,\n\nPlease find the donation receipt you requested attached to this message.\n\nThank you.\n"
        .to_string()
}

fn default_outbox() -> String {
    ".receipts/outbox".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            body: default_body(),
            outbox: default_outbox(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_folder")]
    pub folder: String,
}

fn default_storage_folder() -> String {
    ".receipts/drive".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            folder: default_storage_folder(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            sheets: SheetsConfig::default(),
            columns: ColumnConfig::default(),
            template: TemplateConfig::default(),
            render: RenderConfig::default(),
            mail: MailConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ReceiptError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let c = &self.columns;

        // 1. Every column must be addressable and used once.
        let named = [
            ("primary", c.primary),
            ("donor_name", c.donor_name),
            ("donor_organization", c.donor_organization),
            ("email", c.email),
            ("purpose", c.purpose),
            ("amount", c.amount),
            ("trigger", c.trigger),
            ("document_status", c.document_status),
            ("delivery_status", c.delivery_status),
        ];
        let mut seen: HashMap<u32, &str> = HashMap::new();
        for (name, col) in named {
            if col == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("columns.{name} is 0; columns start at 1"),
                });
                continue;
            }
            // primary may double as a data column
            if name == "primary" {
                continue;
            }
            if let Some(other) = seen.insert(col, name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("columns.{name} and columns.{other} share column {col}"),
                });
            }
        }
        if [c.trigger, c.document_status, c.delivery_status].contains(&c.primary) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "columns.primary ({}) collides with a trigger or status column",
                    c.primary
                ),
            });
        }
        if c.first_data_row < 2 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "columns.first_data_row < 2 treats the header row as a response"
                    .to_string(),
            });
        }

        // 2. Template positions must be A1 references, one per field.
        let mut mapped: HashMap<Field, usize> = HashMap::new();
        for m in &self.template.fields {
            if paths::parse_a1(&m.cell).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "template cell '{}' for {} is not an A1 reference",
                        m.cell,
                        m.field.as_str()
                    ),
                });
            }
            *mapped.entry(m.field).or_default() += 1;
        }
        for (field, count) in mapped {
            if count > 1 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("template maps {} {count} times", field.as_str()),
                });
            }
        }

        // 3. Rendering and mail.
        if self.render.strategies.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "render.strategies is empty; no receipt can be produced".to_string(),
            });
        }
        if self.render.strategies.contains(&StrategyKind::ExportUrl)
            && self.render.export.spreadsheet_id.trim().is_empty()
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "export_url strategy enabled but render.export.spreadsheet_id is empty"
                    .to_string(),
            });
        }
        if self.mail.subject.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "mail.subject is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
