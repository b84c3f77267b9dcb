use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow cross-origin requests from browser frontends
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_allowed_models")]
    pub allowed_models: Vec<String>,
    /// Models matching this regex go to Anthropic, the rest to OpenRouter
    #[serde(default = "default_primary_pattern")]
    pub primary_pattern: String,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            allowed_models: default_allowed_models(),
            primary_pattern: default_primary_pattern(),
            anthropic: AnthropicConfig::default(),
            openrouter: OpenRouterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_version")]
    pub version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_anthropic_system_prompt")]
    pub system_prompt: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_anthropic_base_url(),
            version: default_anthropic_version(),
            max_tokens: default_max_tokens(),
            system_prompt: default_anthropic_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Sent as `X-Title`
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_openrouter_system_prompt")]
    pub system_prompt: String,
    /// Wait before asking for generation stats, which appear asynchronously
    #[serde(default = "default_stats_delay_ms")]
    pub stats_delay_ms: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openrouter_base_url(),
            referer: default_referer(),
            title: default_title(),
            max_tokens: default_max_tokens(),
            system_prompt: default_openrouter_system_prompt(),
            stats_delay_ms: default_stats_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub stock_price: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { stock_price: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_base_url")]
    pub base_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_silver_symbol")]
    pub symbol: String,
    #[serde(default = "default_analysis_range")]
    pub range: String,
    #[serde(default = "default_bins")]
    pub bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symbol: default_silver_symbol(),
            range: default_analysis_range(),
            bins: default_bins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_allowed_models() -> Vec<String> {
    [
        "claude-3-5-sonnet-20240620",
        "claude-3-opus-20240229",
        "claude-3-sonnet-20240229",
        "claude-3-haiku-20240307",
        "openai/gpt-4o",
        "openai/gpt-4o-mini",
        "google/gemini-pro-1.5",
        "meta-llama/llama-3.1-405b-instruct",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_primary_pattern() -> String {
    "claude".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_anthropic_system_prompt() -> String {
    "You are an AI assistant. Respond helpfully, but do not reproduce copyrighted material."
        .to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_referer() -> String {
    "http://localhost:3000".to_string()
}

fn default_title() -> String {
    "AI Chatbot".to_string()
}

fn default_openrouter_system_prompt() -> String {
    "You are an AI assistant.".to_string()
}

fn default_stats_delay_ms() -> u64 {
    2000
}

fn default_market_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_silver_symbol() -> String {
    "SI=F".to_string()
}

fn default_analysis_range() -> String {
    "10y".to_string()
}

fn default_bins() -> usize {
    50
}

fn default_storage_path() -> String {
    dirs::home_dir()
        .map(|h: std::path::PathBuf| {
            h.join(".chatrelay")
                .join("chat_history.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./chat_history.db".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
