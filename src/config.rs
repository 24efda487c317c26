use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 服务配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 外部处理器可执行文件
    pub processor_program: String,
    /// 放在 PDF 路径之前的固定参数（例如 `swift run manifest-processor`）
    pub processor_args: Vec<String>,
    /// 处理器工作目录
    pub processor_working_dir: Option<String>,
    /// 处理器超时（秒）
    pub processor_timeout_secs: u64,
    /// 临时上传目录，未设置时使用系统临时目录
    pub upload_dir: Option<String>,
    /// 单次上传的最大字节数
    pub max_upload_bytes: usize,
    /// 演示数据的固定随机种子
    pub demo_seed: Option<u64>,
    /// 是否显示详细日志（处理器输出预览）
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8182".to_string(),
            processor_program: ".build/debug/manifest-processor".to_string(),
            processor_args: Vec::new(),
            processor_working_dir: None,
            processor_timeout_secs: 120,
            upload_dir: None,
            max_upload_bytes: 100 * 1024 * 1024,
            demo_seed: None,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取 `MANIFEST_CONFIG` 指定的 TOML 文件（如果有），再叠加环境变量
    pub fn load() -> Result<Self> {
        match std::env::var("MANIFEST_CONFIG") {
            Ok(path) => Ok(Self::from_toml_file(Path::new(&path))?.with_env_overrides()),
            Err(_) => Ok(Self::from_env()),
        }
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            bind_addr: std::env::var("MANIFEST_BIND_ADDR").unwrap_or(self.bind_addr),
            processor_program: std::env::var("PROCESSOR_PROGRAM").unwrap_or(self.processor_program),
            processor_args: std::env::var("PROCESSOR_ARGS").ok().map(|v| v.split_whitespace().map(str::to_string).collect()).unwrap_or(self.processor_args),
            processor_working_dir: std::env::var("PROCESSOR_WORKDIR").ok().or(self.processor_working_dir),
            processor_timeout_secs: std::env::var("PROCESSOR_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.processor_timeout_secs),
            upload_dir: std::env::var("UPLOAD_DIR").ok().or(self.upload_dir),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_upload_bytes),
            demo_seed: std::env::var("DEMO_SEED").ok().and_then(|v| v.parse().ok()).or(self.demo_seed),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
        }
    }

    pub fn processor_timeout(&self) -> Duration {
        Duration::from_secs(self.processor_timeout_secs)
    }

    /// 实际使用的临时上传目录
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_partial_config_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            processor_program = "swift"
            processor_args = ["run", "manifest-processor"]
            processor_timeout_secs = 300
            demo_seed = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.processor_program, "swift");
        assert_eq!(config.processor_args, vec!["run", "manifest-processor"]);
        assert_eq!(config.processor_timeout(), Duration::from_secs(300));
        assert_eq!(config.demo_seed, Some(42));
        // 未出现的字段使用默认值
        assert_eq!(config.bind_addr, "127.0.0.1:8182");
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(Config::from_toml_str("processor_timeout_secs = \"soon\"").is_err());
    }

    /// 测试结束时清除设置过的环境变量
    struct EnvGuard(&'static [&'static str]);

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard(&[
            "MANIFEST_BIND_ADDR",
            "PROCESSOR_ARGS",
            "PROCESSOR_TIMEOUT_SECS",
            "DEMO_SEED",
            "VERBOSE_LOGGING",
        ]);
        std::env::set_var("MANIFEST_BIND_ADDR", "0.0.0.0:9000");
        std::env::set_var("PROCESSOR_ARGS", "run   manifest-processor");
        std::env::set_var("PROCESSOR_TIMEOUT_SECS", "30");
        std::env::set_var("DEMO_SEED", "not-a-number");
        std::env::set_var("VERBOSE_LOGGING", "true");

        let base = Config {
            demo_seed: Some(9),
            ..Config::default()
        };
        let config = base.with_env_overrides();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.processor_args, vec!["run", "manifest-processor"]);
        assert_eq!(config.processor_timeout(), Duration::from_secs(30));
        // 无法解析的值保留原配置
        assert_eq!(config.demo_seed, Some(9));
        assert!(config.verbose_logging);
        assert_eq!(config.processor_program, ".build/debug/manifest-processor");

        let from_env = Config::from_env();
        assert_eq!(from_env.bind_addr, "0.0.0.0:9000");
        assert_eq!(from_env.demo_seed, None);
    }

    #[test]
    fn test_upload_dir_falls_back_to_temp_dir() {
        let config = Config::default();
        assert_eq!(config.upload_dir(), std::env::temp_dir());
    }
}
