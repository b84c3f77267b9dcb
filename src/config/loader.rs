use super::Config;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    // Perform environment variable substitution
    let config = substitute_env_vars(config);

    // Validate configuration
    validate_config(&config)?;

    Ok(config)
}

/// Replace `${VAR}` values with the environment variable, or `None` if unset.
fn resolve_env(value: Option<String>) -> Option<String> {
    match value {
        Some(v) if v.starts_with("${") && v.ends_with('}') => {
            let var_name = &v[2..v.len() - 1];
            std::env::var(var_name).ok()
        }
        other => other,
    }
}

fn substitute_env_vars(mut config: Config) -> Config {
    config.llm.anthropic.api_key = resolve_env(config.llm.anthropic.api_key.take());
    config.llm.openrouter.api_key = resolve_env(config.llm.openrouter.api_key.take());
    config
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.llm.allowed_models.is_empty() {
        anyhow::bail!("llm.allowed_models must list at least one model");
    }

    if !config
        .llm
        .allowed_models
        .iter()
        .any(|m| m == &config.llm.default_model)
    {
        anyhow::bail!(
            "Default model '{}' is not in llm.allowed_models",
            config.llm.default_model
        );
    }

    Regex::new(&config.llm.primary_pattern).with_context(|| {
        format!(
            "Invalid llm.primary_pattern: {}",
            config.llm.primary_pattern
        )
    })?;

    if config.analysis.bins == 0 {
        anyhow::bail!("analysis.bins must be greater than zero");
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        anyhow::bail!("Invalid log format: {}", config.logging.format);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("{}");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.llm.default_model, "claude-3-haiku-20240307");
        assert_eq!(config.llm.primary_pattern, "claude");
        assert_eq!(config.llm.openrouter.stats_delay_ms, 2000);
        assert_eq!(config.llm.anthropic.max_tokens, 2000);
        assert_eq!(config.analysis.symbol, "SI=F");
        assert_eq!(config.server.port, 5000);
        assert!(config.server.cors);
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("CHATRELAY_TEST_ANTHROPIC_KEY", "sk-ant-test");
        let file = write_config(
            r#"
llm:
  anthropic:
    api_key: "${CHATRELAY_TEST_ANTHROPIC_KEY}"
  openrouter:
    api_key: "${CHATRELAY_TEST_UNSET_VARIABLE}"
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.llm.anthropic.api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(config.llm.openrouter.api_key, None);
    }

    #[test]
    fn test_literal_key_is_kept() {
        let file = write_config(
            r#"
llm:
  openrouter:
    api_key: sk-or-literal
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.llm.openrouter.api_key.as_deref(),
            Some("sk-or-literal")
        );
    }

    #[test]
    fn test_default_model_must_be_allowed() {
        let file = write_config(
            r#"
llm:
  default_model: gpt-5
  allowed_models: [claude-3-haiku-20240307]
"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("gpt-5"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let file = write_config(
            r#"
llm:
  primary_pattern: "claude("
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_zero_bins_rejected() {
        let file = write_config("analysis:\n  bins: 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/chatrelay.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
