use crate::variable::resolver::VariableResolver;
use crate::variable::types::{AppConfig, VariableContext};
use crate::{ApiChainError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 配置文件加载器，查找并读取 `apichain.toml`
pub struct ConfigLoader;

impl ConfigLoader {
    const CONFIG_FILE: &'static str = "apichain.toml";
    const DATA_DIR_ENV: &'static str = "APICHAIN_DATA_DIR";

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ApiChainError::ConfigError(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            ApiChainError::ConfigError(format!(
                "failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// 查找顺序:
    /// 1. 当前目录，然后逐级向上
    /// 2. `~/.config/apichain/`
    pub fn find() -> Option<PathBuf> {
        Self::find_in_ancestors().or_else(Self::find_in_user_dir)
    }

    /// 加载找到的第一个配置文件，找不到时使用默认配置
    /// `APICHAIN_DATA_DIR` 始终覆盖 `settings.data_dir`
    pub fn find_and_load() -> Result<AppConfig> {
        let mut config = match Self::find() {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::load_from_path(path)?
            }
            None => AppConfig::default(),
        };

        if let Ok(dir) = std::env::var(Self::DATA_DIR_ENV) {
            config.settings.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    fn find_in_ancestors() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn find_in_user_dir() -> Option<PathBuf> {
        let config_path = dirs::home_dir()?
            .join(".config")
            .join("apichain")
            .join(Self::CONFIG_FILE);

        config_path.exists().then_some(config_path)
    }

    /// 构建执行时的初始变量
    ///
    /// `env_name` 选择 `[environments.*]`，其中的值会展开 `${VAR}`；
    /// `cli_vars`（来自 `--var key=value`）优先级更高
    pub fn build_context(
        config: &AppConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> Result<VariableContext> {
        let mut context = VariableContext::new();

        if let Some(name) = env_name {
            let env = config.get_environment(name).ok_or_else(|| {
                ApiChainError::ConfigError(format!("environment '{}' is not defined", name))
            })?;
            for (key, value) in &env.variables {
                context.insert(key.clone(), VariableResolver::resolve_env_vars(value));
            }
        }

        for (key, value) in cli_vars {
            context.insert(key.clone(), value.clone());
        }

        Ok(context)
    }

    /// 解析命令行 `key=value` 参数
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_path() {
        let config_content = r#"
[settings]
data_dir = "/tmp/apichain-data"

[environments.dev]
base_url = "http://localhost:8080"
api_key = "dev-key"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = ConfigLoader::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.environments.len(), 1);
        assert_eq!(
            config.settings.data_dir,
            PathBuf::from("/tmp/apichain-data")
        );
    }

    #[test]
    fn test_load_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[settings\ntimeout_secs = ").unwrap();
        temp_file.flush().unwrap();

        let err = ConfigLoader::load_from_path(temp_file.path()).unwrap_err();
        assert!(matches!(err, ApiChainError::ConfigError(_)));
    }

    #[test]
    fn test_build_context() {
        let config_content = r#"
[environments.dev]
base_url = "http://localhost:8080"
token = "dev-token"
"#;
        let config: AppConfig = toml::from_str(config_content).unwrap();

        let context = ConfigLoader::build_context(&config, Some("dev"), &[]).unwrap();
        assert_eq!(context.get("base_url"), Some("http://localhost:8080"));
        assert_eq!(context.get("token"), Some("dev-token"));

        let cli_vars = vec![("token".to_string(), "custom-token".to_string())];
        let context = ConfigLoader::build_context(&config, Some("dev"), &cli_vars).unwrap();
        assert_eq!(context.get("token"), Some("custom-token"));
    }

    #[test]
    fn test_build_context_unknown_environment() {
        let config = AppConfig::default();
        assert!(ConfigLoader::build_context(&config, Some("staging"), &[]).is_err());
        assert!(
            ConfigLoader::build_context(&config, None, &[])
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_parse_cli_var() {
        assert_eq!(
            ConfigLoader::parse_cli_var("key=value"),
            Some(("key".to_string(), "value".to_string()))
        );
        assert_eq!(
            ConfigLoader::parse_cli_var("url=https://example.com?a=b"),
            Some(("url".to_string(), "https://example.com?a=b".to_string()))
        );
        assert_eq!(ConfigLoader::parse_cli_var("invalid"), None);
        assert_eq!(ConfigLoader::parse_cli_var("=value"), None);
    }
}
