use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use configparser::ini::Ini;
use lazy_static::lazy_static;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use tokio::runtime::Runtime;

pub const CONFIG_FILE: &str = "config.ini";

/// 进度条最多分段数
pub const MAX_SEGMENTS: u64 = 100;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l:<5})} [{M}] {m}{n}";

/// 应用配置，来自 config.ini，缺省项使用默认值
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// 模拟编程的总时长
    pub duration: Duration,
    /// 进度刷新间隔
    pub tick_interval: Duration,
    /// 进度条分段数
    pub segments: usize,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(8000),
            tick_interval: Duration::from_millis(50),
            segments: 20,
            log_level: LevelFilter::Info,
            log_file: PathBuf::from("logs/meter-reset.log"),
        }
    }
}

/// 加载结果，warnings 记录被忽略的无效配置项
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub warnings: Vec<String>,
}

impl AppConfig {
    pub fn from_ini_str(content: &str) -> Result<LoadedConfig> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| anyhow!("解析配置失败: {}", e))?;
        Ok(Self::from_ini(&ini))
    }

    /// 读取配置文件，文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<LoadedConfig> {
        if !path.exists() {
            return Ok(LoadedConfig::default());
        }
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow!("读取配置文件 {:?} 失败: {}", path, e))?;
        Ok(Self::from_ini(&ini))
    }

    // 逐项校验，无效项保留默认值
    fn from_ini(ini: &Ini) -> LoadedConfig {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        if let Some(ms) = read_uint(ini, "simulation", "duration_ms", 1..=u64::MAX, &mut warnings) {
            config.duration = Duration::from_millis(ms);
        }
        if let Some(ms) = read_uint(ini, "simulation", "tick_interval_ms", 1..=u64::MAX, &mut warnings) {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(segments) = read_uint(ini, "display", "segments", 1..=MAX_SEGMENTS, &mut warnings) {
            config.segments = segments as usize;
        }
        if let Some(level) = ini.get("log", "level") {
            match level.trim().parse() {
                Ok(level) => config.log_level = level,
                Err(_) => warnings.push(format!("[log] level 无效: {}，使用默认值", level)),
            }
        }
        if let Some(file) = ini.get("log", "file") {
            let file = file.trim();
            if file.is_empty() {
                warnings.push("[log] file 为空，使用默认值".to_string());
            } else {
                config.log_file = PathBuf::from(file);
            }
        }

        LoadedConfig { config, warnings }
    }
}

fn read_uint(
    ini: &Ini,
    section: &str,
    key: &str,
    range: RangeInclusive<u64>,
    warnings: &mut Vec<String>,
) -> Option<u64> {
    match ini.getuint(section, key) {
        Ok(Some(value)) if range.contains(&value) => Some(value),
        Ok(Some(value)) => {
            warnings.push(format!(
                "[{}] {} = {} 超出范围 {}..={}，使用默认值",
                section,
                key,
                value,
                range.start(),
                range.end()
            ));
            None
        }
        Ok(None) => None,
        Err(e) => {
            warnings.push(format!("[{}] {} 无效: {}，使用默认值", section, key, e));
            None
        }
    }
}

lazy_static! {
    static ref RUNTIME: Runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("meter-reset-rt")
        .build()
        .expect("创建 tokio runtime 失败");
    static ref APP_CONFIG: RwLock<AppConfig> = RwLock::new(AppConfig::default());
}

static LOGGER_READY: AtomicBool = AtomicBool::new(false);

pub fn get_runtime() -> &'static Runtime {
    &RUNTIME
}

pub fn get_config() -> AppConfig {
    APP_CONFIG
        .read()
        .map(|config| config.clone())
        .unwrap_or_default()
}

/// 加载配置并初始化日志；日志只在第一次调用时安装
pub fn init_config() {
    let LoadedConfig {
        config,
        mut warnings,
    } = match AppConfig::load(Path::new(CONFIG_FILE)) {
        Ok(loaded) => loaded,
        Err(e) => LoadedConfig {
            config: AppConfig::default(),
            warnings: vec![format!("{:#}，使用默认配置", e)],
        },
    };

    warnings.extend(init_logging(&config));
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    log::info!(
        "配置: 时长 {:?}, 刷新间隔 {:?}, 分段 {}",
        config.duration,
        config.tick_interval,
        config.segments
    );

    if let Ok(mut global) = APP_CONFIG.write() {
        *global = config;
    }
}

/// 安装 log4rs，返回需要在日志就绪后输出的警告
fn init_logging(config: &AppConfig) -> Vec<String> {
    if LOGGER_READY.swap(true, Ordering::SeqCst) {
        return Vec::new();
    }

    match build_log_config(config) {
        Ok((log_config, warnings)) => {
            if let Err(e) = log4rs::init_config(log_config) {
                eprintln!("初始化日志失败: {}", e);
            }
            warnings
        }
        Err(e) => {
            eprintln!("初始化日志失败: {:#}", e);
            Vec::new()
        }
    }
}

// 日志文件打不开时只输出到控制台
fn build_log_config(config: &AppConfig) -> Result<(Config, Vec<String>)> {
    let mut warnings = Vec::new();

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    match FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&config.log_file)
    {
        Ok(file) => {
            builder = builder.appender(Appender::builder().build("file", Box::new(file)));
            root = root.appender("file");
        }
        Err(e) => warnings.push(format!(
            "无法打开日志文件 {:?}: {}，仅输出到控制台",
            config.log_file, e
        )),
    }

    let log_config = builder
        .build(root.build(config.log_level))
        .context("日志配置无效")?;
    Ok((log_config, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_empty() {
        let loaded = AppConfig::from_ini_str("").unwrap();
        assert_eq!(loaded.config, AppConfig::default());
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.config.duration, Duration::from_millis(8000));
        assert_eq!(loaded.config.tick_interval, Duration::from_millis(50));
        assert_eq!(loaded.config.segments, 20);
    }

    #[test]
    fn test_overrides() {
        let loaded = AppConfig::from_ini_str(
            "[simulation]\nduration_ms = 3000\ntick_interval_ms = 100\n\n[display]\nsegments = 10\n\n[log]\nlevel = debug\nfile = out/test.log\n",
        )
        .unwrap();
        let config = loaded.config;
        assert!(loaded.warnings.is_empty());
        assert_eq!(config.duration, Duration::from_millis(3000));
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.segments, 10);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.log_file, PathBuf::from("out/test.log"));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let cases = [
            "[simulation]\nduration_ms = 0\n",
            "[simulation]\ntick_interval_ms = -5\n",
            "[display]\nsegments = abc\n",
            "[display]\nsegments = 0\n",
            "[display]\nsegments = 100000000000\n",
            "[log]\nlevel = loud\n",
            "[log]\nfile =\n",
        ];
        for content in cases {
            let loaded = AppConfig::from_ini_str(content).unwrap();
            assert_eq!(loaded.config, AppConfig::default(), "{content}");
            assert_eq!(loaded.warnings.len(), 1, "{content}: {:?}", loaded.warnings);
        }
    }

    #[test]
    fn test_invalid_key_keeps_valid_ones() {
        let loaded = AppConfig::from_ini_str(
            "[simulation]\nduration_ms = 3000\ntick_interval_ms = 0\n\n[display]\nsegments = 0\n\n[log]\nlevel = debug\n",
        )
        .unwrap();
        let config = loaded.config;
        assert_eq!(config.duration, Duration::from_millis(3000));
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.segments, 20);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded.warnings[0].contains("tick_interval_ms"));
        assert!(loaded.warnings[1].contains("segments"));
    }

    #[test]
    fn test_segments_upper_bound() {
        let loaded = AppConfig::from_ini_str("[display]\nsegments = 100\n").unwrap();
        assert_eq!(loaded.config.segments, 100);
        assert!(loaded.warnings.is_empty());

        let loaded = AppConfig::from_ini_str("[display]\nsegments = 101\n").unwrap();
        assert_eq!(loaded.config.segments, 20);
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn test_load_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[simulation]").unwrap();
        writeln!(temp_file, "duration_ms = 5000").unwrap();
        writeln!(temp_file, "[display]").unwrap();
        writeln!(temp_file, "segments = 0").unwrap();

        let loaded = AppConfig::load(temp_file.path()).unwrap();
        assert_eq!(loaded.config.duration, Duration::from_millis(5000));
        assert_eq!(loaded.config.tick_interval, Duration::from_millis(50));
        assert_eq!(loaded.config.segments, 20);
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("missing.ini")).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_log_config_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            log_file: dir.path().join("logs").join("app.log"),
            ..AppConfig::default()
        };

        let (log_config, warnings) = build_log_config(&config).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(log_config.appenders().len(), 2);
        assert_eq!(log_config.root().appenders(), ["stdout", "file"]);
    }

    #[test]
    fn test_log_config_falls_back_to_console() {
        // 父路径是普通文件，日志文件无法创建
        let blocker = NamedTempFile::new().unwrap();
        let config = AppConfig {
            log_file: blocker.path().join("logs").join("app.log"),
            ..AppConfig::default()
        };

        let (log_config, warnings) = build_log_config(&config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("仅输出到控制台"));
        assert_eq!(log_config.appenders().len(), 1);
        assert_eq!(log_config.root().appenders(), ["stdout"]);
    }

    #[test]
    fn test_logger_installed_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            log_file: dir.path().join("app.log"),
            ..AppConfig::default()
        };
        init_logging(&config);
        assert!(LOGGER_READY.load(Ordering::SeqCst));

        // 第二次调用直接跳过，不会再尝试打开日志文件
        let blocker = NamedTempFile::new().unwrap();
        let unwritable = AppConfig {
            log_file: blocker.path().join("app.log"),
            ..AppConfig::default()
        };
        assert!(init_logging(&unwritable).is_empty());
    }
}
