use serde::{Deserialize, Serialize};

use crate::tool::Tool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            server: ServerConfig::default(),
            output_directory: default_output_directory(),
            worker_count: default_worker_count(),
            ocr: OcrConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Ceiling for a whole multipart request body.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_request_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_bytes: default_max_request_bytes(),
            cors_origins: default_cors_origins(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["spa".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_max_pages() -> usize {
    100
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
            max_pages: default_max_pages(),
        }
    }
}

/// Validator limits for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLimits {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

fn default_max_files() -> usize {
    50
}

fn default_max_file_size_bytes() -> u64 {
    50 * 1024 * 1024
}

impl ToolLimits {
    pub fn pdf() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_extensions: vec!["pdf".to_string()],
            allowed_mime_types: vec!["application/pdf".to_string()],
        }
    }

    pub fn xlsx() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_extensions: vec!["xlsx".to_string()],
            allowed_mime_types: vec![
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                "application/zip".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "ToolLimits::pdf")]
    pub bank_statements: ToolLimits,
    #[serde(default = "ToolLimits::pdf")]
    pub tax_form: ToolLimits,
    #[serde(default = "ToolLimits::xlsx")]
    pub consolidator: ToolLimits,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bank_statements: ToolLimits::pdf(),
            tax_form: ToolLimits::pdf(),
            consolidator: ToolLimits::xlsx(),
        }
    }
}

impl ToolsConfig {
    pub fn limits(&self, tool: Tool) -> &ToolLimits {
        match tool {
            Tool::BankStatements => &self.bank_statements,
            Tool::TaxForm => &self.tax_form,
            Tool::Consolidator => &self.consolidator,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tool, &ToolLimits)> {
        Tool::ALL.into_iter().map(move |tool| (tool, self.limits(tool)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.output_directory, "output");
        assert!(config.worker_count > 0);
        assert!(config.ocr.enabled);
        assert_eq!(config.ocr.languages, vec!["spa"]);
        assert_eq!(config.tools.bank_statements.max_files, 50);
        assert_eq!(config.tools.consolidator.allowed_extensions, vec!["xlsx"]);
    }

    #[test]
    fn test_partial_tool_limits_keep_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "version": "1.0",
                "tools": {
                    "tax_form": {
                        "max_files": 5,
                        "allowed_extensions": ["pdf"],
                        "allowed_mime_types": ["application/pdf"]
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.tools.limits(Tool::TaxForm).max_files, 5);
        assert_eq!(
            config.tools.limits(Tool::TaxForm).max_file_size_bytes,
            50 * 1024 * 1024
        );
        assert_eq!(config.tools.limits(Tool::BankStatements), &ToolLimits::pdf());
    }

    #[test]
    fn test_log_format_parses_lowercase() {
        let server: ServerConfig = serde_json::from_str(r#"{"log_format": "json"}"#).unwrap();
        assert_eq!(server.log_format, LogFormat::Json);
    }
}
