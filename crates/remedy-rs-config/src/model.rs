//! Configuration schema for the complaint engine.

use serde::{Deserialize, Serialize};

/// Root config for the complaint engine and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemedyConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl RemedyConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> RemedyConfigBuilder {
        RemedyConfigBuilder::new()
    }
}

/// Builder for assembling a `RemedyConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct RemedyConfigBuilder {
    config: RemedyConfig,
}

impl RemedyConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: RemedyConfig::default(),
        }
    }

    /// Replace the conversation settings.
    pub fn conversation(mut self, conversation: ConversationConfig) -> Self {
        self.config.conversation = conversation;
        self
    }

    /// Replace the extraction settings.
    pub fn extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.config.extraction = extraction;
        self
    }

    /// Replace the sink settings.
    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.config.sink = sink;
        self
    }

    /// Replace the generator settings.
    pub fn generator(mut self, generator: GeneratorConfig) -> Self {
        self.config.generator = generator;
        self
    }

    /// Replace the session persistence settings.
    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the webhook server settings.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Finalize and return the built `RemedyConfig`.
    pub fn build(self) -> RemedyConfig {
        self.config
    }
}

/// Conversation history and duplicate-delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Number of most recent turns passed to the generator.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Identical text re-delivered within this window is dropped.
    #[serde(default = "default_text_window_ms")]
    pub text_window_ms: u64,
    /// Any image arriving within this window after the previous turn is dropped.
    #[serde(default = "default_image_window_ms")]
    pub image_window_ms: u64,
    /// An image with the previous image's media id is dropped within this window.
    #[serde(default = "default_same_media_window_ms")]
    pub same_media_window_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            text_window_ms: default_text_window_ms(),
            image_window_ms: default_image_window_ms(),
            same_media_window_ms: default_same_media_window_ms(),
        }
    }
}

fn default_history_window() -> usize {
    10
}

fn default_text_window_ms() -> u64 {
    2_000
}

fn default_image_window_ms() -> u64 {
    2_500
}

fn default_same_media_window_ms() -> u64 {
    60_000
}

/// Tunable boundaries for the free-text field heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Shortest accepted direct phone answer, in characters.
    #[serde(default = "default_phone_min_len")]
    pub phone_min_len: usize,
    /// Longest accepted direct phone answer, in characters.
    #[serde(default = "default_phone_max_len")]
    pub phone_max_len: usize,
    /// Digit count of an unlabelled phone token found anywhere in a message.
    #[serde(default = "default_bare_phone_digits")]
    pub bare_phone_digits: usize,
    /// City values that are known capture mistakes (compared case-insensitively).
    #[serde(default = "default_invalid_city_values")]
    pub invalid_city_values: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            phone_min_len: default_phone_min_len(),
            phone_max_len: default_phone_max_len(),
            bare_phone_digits: default_bare_phone_digits(),
            invalid_city_values: default_invalid_city_values(),
        }
    }
}

fn default_phone_min_len() -> usize {
    7
}

fn default_phone_max_len() -> usize {
    15
}

fn default_bare_phone_digits() -> usize {
    10
}

fn default_invalid_city_values() -> Vec<String> {
    vec![
        "contributivo".to_string(),
        "subsidiado".to_string(),
        "ese fue".to_string(),
    ]
}

/// Persistence sink selection and row schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// One of `jsonl`, `bigquery`, `none`.
    #[serde(default = "default_sink_provider")]
    pub provider: String,
    /// Output file for the `jsonl` provider.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    #[serde(default = "default_table_id")]
    pub table_id: String,
    /// Environment variable holding the BigQuery bearer token.
    #[serde(default = "default_sink_token_env")]
    pub token_env: String,
    /// Value written for missing or invalid columns.
    #[serde(default = "default_unavailable_marker")]
    pub unavailable_marker: String,
    /// Physical column names.
    #[serde(default)]
    pub columns: SinkColumns,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            provider: default_sink_provider(),
            path: None,
            project_id: None,
            dataset_id: default_dataset_id(),
            table_id: default_table_id(),
            token_env: default_sink_token_env(),
            unavailable_marker: default_unavailable_marker(),
            columns: SinkColumns::default(),
        }
    }
}

fn default_sink_provider() -> String {
    "jsonl".to_string()
}

fn default_dataset_id() -> String {
    "solutions2pharma_data".to_string()
}

fn default_table_id() -> String {
    "quejas".to_string()
}

fn default_sink_token_env() -> String {
    "BIGQUERY_ACCESS_TOKEN".to_string()
}

fn default_unavailable_marker() -> String {
    "No disponible".to_string()
}

/// Logical columns of a complaint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkColumn {
    ComplaintId,
    DocumentType,
    DocumentNumber,
    Patient,
    AttendingDate,
    Insurer,
    Doctor,
    Ips,
    Diagnosis,
    Medications,
    ImageUrl,
    MissingMedications,
    BirthDate,
    Phone,
    Regime,
    City,
    Address,
    Pharmacy,
}

impl SinkColumn {
    /// Every column, in row order.
    pub const ALL: [SinkColumn; 18] = [
        SinkColumn::ComplaintId,
        SinkColumn::DocumentType,
        SinkColumn::DocumentNumber,
        SinkColumn::Patient,
        SinkColumn::AttendingDate,
        SinkColumn::Insurer,
        SinkColumn::Doctor,
        SinkColumn::Ips,
        SinkColumn::Diagnosis,
        SinkColumn::Medications,
        SinkColumn::ImageUrl,
        SinkColumn::MissingMedications,
        SinkColumn::BirthDate,
        SinkColumn::Phone,
        SinkColumn::Regime,
        SinkColumn::City,
        SinkColumn::Address,
        SinkColumn::Pharmacy,
    ];

    /// Config key used under `sink.columns`.
    pub fn key(&self) -> &'static str {
        match self {
            SinkColumn::ComplaintId => "complaint_id",
            SinkColumn::DocumentType => "document_type",
            SinkColumn::DocumentNumber => "document_number",
            SinkColumn::Patient => "patient",
            SinkColumn::AttendingDate => "attending_date",
            SinkColumn::Insurer => "insurer",
            SinkColumn::Doctor => "doctor",
            SinkColumn::Ips => "ips",
            SinkColumn::Diagnosis => "diagnosis",
            SinkColumn::Medications => "medications",
            SinkColumn::ImageUrl => "image_url",
            SinkColumn::MissingMedications => "missing_medications",
            SinkColumn::BirthDate => "birth_date",
            SinkColumn::Phone => "phone",
            SinkColumn::Regime => "regime",
            SinkColumn::City => "city",
            SinkColumn::Address => "address",
            SinkColumn::Pharmacy => "pharmacy",
        }
    }
}

/// Physical column names of the sink table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SinkColumns {
    pub complaint_id: String,
    pub document_type: String,
    pub document_number: String,
    pub patient: String,
    pub attending_date: String,
    pub insurer: String,
    pub doctor: String,
    pub ips: String,
    pub diagnosis: String,
    pub medications: String,
    pub image_url: String,
    pub missing_medications: String,
    pub birth_date: String,
    pub phone: String,
    pub regime: String,
    pub city: String,
    pub address: String,
    pub pharmacy: String,
}

impl SinkColumns {
    /// Physical name for a logical column.
    pub fn name(&self, column: SinkColumn) -> &str {
        match column {
            SinkColumn::ComplaintId => &self.complaint_id,
            SinkColumn::DocumentType => &self.document_type,
            SinkColumn::DocumentNumber => &self.document_number,
            SinkColumn::Patient => &self.patient,
            SinkColumn::AttendingDate => &self.attending_date,
            SinkColumn::Insurer => &self.insurer,
            SinkColumn::Doctor => &self.doctor,
            SinkColumn::Ips => &self.ips,
            SinkColumn::Diagnosis => &self.diagnosis,
            SinkColumn::Medications => &self.medications,
            SinkColumn::ImageUrl => &self.image_url,
            SinkColumn::MissingMedications => &self.missing_medications,
            SinkColumn::BirthDate => &self.birth_date,
            SinkColumn::Phone => &self.phone,
            SinkColumn::Regime => &self.regime,
            SinkColumn::City => &self.city,
            SinkColumn::Address => &self.address,
            SinkColumn::Pharmacy => &self.pharmacy,
        }
    }
}

impl Default for SinkColumns {
    fn default() -> Self {
        Self {
            complaint_id: "PK".to_string(),
            document_type: "tipo_documento".to_string(),
            document_number: "numero_documento".to_string(),
            patient: "paciente".to_string(),
            attending_date: "fecha_atencion".to_string(),
            insurer: "eps".to_string(),
            doctor: "doctor".to_string(),
            ips: "ips".to_string(),
            diagnosis: "diagnostico".to_string(),
            medications: "medicamentos".to_string(),
            image_url: "image_url".to_string(),
            missing_medications: "no_entregado".to_string(),
            birth_date: "fecha_nacimiento".to_string(),
            phone: "telefono".to_string(),
            regime: "regimen".to_string(),
            city: "municipio".to_string(),
            address: "direccion".to_string(),
            pharmacy: "farmacia".to_string(),
        }
    }
}

/// Language model used for replies and prescription reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_provider")]
    pub provider: String,
    /// Chat completions endpoint.
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    /// Model used for prescription images; falls back to `model`.
    #[serde(default)]
    pub vision_model: Option<String>,
    #[serde(default = "default_generator_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra instructions appended to the generator context.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_generator_provider(),
            base_url: default_generator_base_url(),
            model: default_generator_model(),
            vision_model: None,
            api_key_env: default_generator_api_key_env(),
            timeout_secs: default_generator_timeout_secs(),
            instructions: None,
        }
    }
}

fn default_generator_provider() -> String {
    "openai".to_string()
}

fn default_generator_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_generator_model() -> String {
    "o4-mini".to_string()
}

fn default_generator_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_generator_timeout_secs() -> u64 {
    60
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<String>,
}

/// Webhook server and chat transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_bind")]
    pub bind: String,
    /// Environment variable holding the Telegram bot token.
    #[serde(default = "default_server_token_env")]
    pub token_env: String,
    #[serde(default = "default_server_api_base")]
    pub api_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_server_bind(),
            token_env: default_server_token_env(),
            api_base: default_server_api_base(),
        }
    }
}

fn default_server_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_server_token_env() -> String {
    "TELEGRAM_TOKEN".to_string()
}

fn default_server_api_base() -> String {
    "https://api.telegram.org".to_string()
}
