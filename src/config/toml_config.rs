use crate::domain::model::ExecutionProfile;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{TourError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERPRETER: &str = "python";
pub const DEFAULT_PREVIEW_WIDTH: u32 = 400;
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 200;
pub const DEFAULT_STORE_LOCATION: &str = "./tour-store";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub application: ApplicationConfig,
    pub storage: StorageConfig,
    pub tiles: TilesConfig,
    pub preview: Option<PreviewConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub domain: String,
    pub path: Option<String>,
    pub active_profiles: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub tour_location: PathBuf,
    pub equirectangular_location: PathBuf,
    pub backup_location: Option<PathBuf>,
    pub store_location: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesConfig {
    pub system_command: Option<String>,
    pub interpreter: Option<String>,
    pub generate_script: String,
    pub nona: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TourError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: TomlConfig =
            toml::from_str(&processed_content).map_err(|e| TourError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        if config.storage.backup_location.is_none() {
            config.storage.backup_location = Some(std::env::temp_dir());
        }

        Ok(config)
    }

    /// 替換環境變數 (例如 ${TOUR_ROOT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TourError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_url("application.domain", &self.application.domain)?;

        validate_path(
            "storage.tour_location",
            &self.storage.tour_location.to_string_lossy(),
        )?;
        validate_path(
            "storage.equirectangular_location",
            &self.storage.equirectangular_location.to_string_lossy(),
        )?;

        validate_non_empty_string("tiles.generate_script", &self.tiles.generate_script)?;
        validate_non_empty_string("tiles.nona", &self.tiles.nona)?;

        if let Some(timeout) = self.tiles.timeout_seconds {
            validate_positive_number("tiles.timeout_seconds", timeout as usize, 1)?;
        }

        validate_positive_number("preview.width", self.preview_width() as usize, 1)?;
        validate_positive_number("preview.height", self.preview_height() as usize, 1)?;

        Ok(())
    }

    /// JSON 儲存目錄
    pub fn store_location(&self) -> PathBuf {
        self.storage
            .store_location
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_LOCATION))
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn domain(&self) -> &str {
        &self.application.domain
    }

    fn app_path(&self) -> &str {
        self.application.path.as_deref().unwrap_or("")
    }

    fn tour_location(&self) -> &Path {
        &self.storage.tour_location
    }

    fn equirectangular_location(&self) -> &Path {
        &self.storage.equirectangular_location
    }

    fn backup_location(&self) -> &Path {
        self.storage
            .backup_location
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
    }

    fn system_command(&self) -> &str {
        self.tiles.system_command.as_deref().unwrap_or("")
    }

    fn interpreter(&self) -> &str {
        self.tiles.interpreter.as_deref().unwrap_or(DEFAULT_INTERPRETER)
    }

    fn generate_script(&self) -> &str {
        &self.tiles.generate_script
    }

    fn nona(&self) -> &str {
        &self.tiles.nona
    }

    fn tile_timeout(&self) -> Option<Duration> {
        self.tiles.timeout_seconds.map(Duration::from_secs)
    }

    fn preview_width(&self) -> u32 {
        self.preview
            .as_ref()
            .and_then(|p| p.width)
            .unwrap_or(DEFAULT_PREVIEW_WIDTH)
    }

    fn preview_height(&self) -> u32 {
        self.preview
            .as_ref()
            .and_then(|p| p.height)
            .unwrap_or(DEFAULT_PREVIEW_HEIGHT)
    }

    fn execution_profile(&self) -> ExecutionProfile {
        ExecutionProfile::from_active_profiles(
            self.application.active_profiles.as_deref().unwrap_or(""),
        )
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
