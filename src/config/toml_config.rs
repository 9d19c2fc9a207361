use crate::core::ConfigProvider;
use crate::utils::error::{CtdError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_API_BASE_URL: &str =
    "https://ooinet.oceanobservatories.org/api/m2m/12576/sensor/inv";
pub const CRUISE_DATA_REPO: &str =
    "https://raw.githubusercontent.com/seagrinch/data-team-python/master/cruise_data";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub api: ApiConfig,
    pub sources: SourcesConfig,
    pub output: OutputConfig,
    pub convert: ConvertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: String,
    pub token: String,
    pub timeout_seconds: Option<u64>,
    pub limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            username: String::new(),
            token: String::new(),
            timeout_seconds: Some(120),
            limit: 10000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub mapping_table: String,
    pub cast_table: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            mapping_table: format!("{}/platform_CTDcast_mapping.csv", CRUISE_DATA_REPO),
            cast_table: format!("{}/cruise_CTDs.csv", CRUISE_DATA_REPO),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Leading path components dropped before mirroring a file's directories.
    pub strip_components: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            strip_components: 4,
        }
    }
}

impl ToolConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CtdError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CtdError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OOI_API_TOKEN})
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// Credentials are only needed for the remote data API.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.api.username.is_empty() || self.api.username.starts_with("${") {
            return Err(CtdError::MissingConfigError {
                field: "api.username".to_string(),
            });
        }
        if self.api.token.is_empty() || self.api.token.starts_with("${") {
            return Err(CtdError::MissingConfigError {
                field: "api.token".to_string(),
            });
        }
        Ok(())
    }
}

impl ConfigProvider for ToolConfig {
    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn mapping_table(&self) -> &str {
        &self.sources.mapping_table
    }

    fn cast_table(&self) -> &str {
        &self.sources.cast_table
    }

    fn api_base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    fn api_credentials(&self) -> (&str, &str) {
        (&self.api.username, &self.api.token)
    }

    fn request_limit(&self) -> usize {
        self.api.limit
    }

    fn request_timeout(&self) -> Option<std::time::Duration> {
        self.api.timeout_seconds.map(std::time::Duration::from_secs)
    }

    fn strip_components(&self) -> usize {
        self.convert.strip_components
    }
}

impl Validate for ToolConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;
        validation::validate_positive_number("api.limit", self.api.limit, 1)?;
        validation::validate_location("sources.mapping_table", &self.sources.mapping_table)?;
        validation::validate_location("sources.cast_table", &self.sources.cast_table)?;
        validation::validate_path("output.path", &self.output.path)?;
        Ok(())
    }
}
