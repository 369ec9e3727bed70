use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collector::{MetricCatalog, NamespacePattern};
use crate::pool::PoolConfig;

pub mod profile;
pub mod settings;

pub use profile::Profile;
pub use settings::{AgentConfig, AgentSettings, Credentials, SnmpVersion};

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_IDLE_SECS: u64 = 30 * 60;

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_idle() -> u64 {
    DEFAULT_IDLE_SECS
}

/// Настройки пула сессий
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Через сколько секунд простоя сессия закрывается
    #[serde(default = "default_idle")]
    pub idle_secs: u64,
    /// Период проверки, по умолчанию половина `idle_secs`
    pub reap_interval_secs: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            idle_secs: DEFAULT_IDLE_SECS,
            reap_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Адрес HTTP сервера, например `0.0.0.0:8080`
    pub listen: String,
}

/// Главная конфигурация приложения
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Опрашиваемые агенты
    #[serde(default)]
    pub agents: Vec<AgentSettings>,
    /// Файл описания метрик (JSON или YAML)
    pub metrics_file: PathBuf,
    /// Опрашиваемые пространства имен; пусто значит все метрики
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Период опроса (секунды)
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Таймаут по умолчанию для агентов без своего (секунды)
    pub timeout: Option<u64>,
    #[serde(default)]
    pub pool: PoolSettings,
    pub http: Option<HttpSettings>,
}

impl AppConfig {
    /// Путь к конфигурации из переменной окружения или по умолчанию
    pub fn config_path() -> PathBuf {
        env::var("SNMP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Загружает конфигурацию из YAML файла
    ///
    /// Относительный путь `metrics_file` считается от каталога конфигурации.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать файл: {}", path.display()))?;

        let mut config = Self::from_yaml(&content)?;

        if config.metrics_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.metrics_file = dir.join(&config.metrics_file);
            }
        }

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yml::from_str(content).context("Не удалось распарсить YAML")?;

        if config.interval_secs == 0 {
            anyhow::bail!("interval_secs должен быть больше нуля");
        }
        if config.pool.idle_secs == 0 {
            anyhow::bail!("pool.idle_secs должен быть больше нуля");
        }

        Ok(config)
    }

    /// Загружает описания метрик и строит каталог
    pub fn load_catalog(&self) -> Result<MetricCatalog> {
        let profile = Profile::load(&self.metrics_file)?;
        Ok(profile.into_catalog())
    }

    /// Получает timeout из переменной окружения или из настроек
    pub fn get_timeout(&self) -> Option<u64> {
        env::var("SNMP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(self.timeout)
    }

    /// Получает адрес HTTP сервера из переменной окружения или из настроек
    pub fn get_listen(&self) -> Option<String> {
        env::var("SNMP_LISTEN")
            .ok()
            .or_else(|| self.http.as_ref().map(|h| h.listen.clone()))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pool_config(&self) -> PoolConfig {
        let idle = Duration::from_secs(self.pool.idle_secs);
        match self.pool.reap_interval_secs.filter(|s| *s > 0) {
            Some(secs) => PoolConfig {
                idle_timeout: idle,
                reap_interval: Duration::from_secs(secs),
            },
            None => PoolConfig::with_idle_timeout(idle),
        }
    }

    /// Проверяет настройки всех агентов
    pub fn agents(&self) -> Result<Vec<AgentConfig>> {
        let timeout = self.get_timeout();
        self.agents
            .iter()
            .enumerate()
            .map(|(i, agent)| {
                agent
                    .validate(timeout)
                    .with_context(|| format!("Некорректные настройки агента #{}", i + 1))
            })
            .collect()
    }

    /// Шаблоны опрашиваемых пространств имен. Без явного списка
    /// опрашиваются все метрики каталога.
    pub fn patterns(&self, catalog: &MetricCatalog) -> Result<Vec<NamespacePattern>> {
        if self.namespaces.is_empty() {
            return catalog
                .definitions()
                .map(|metric| {
                    NamespacePattern::parse(&metric.key()).map_err(anyhow::Error::from)
                })
                .collect();
        }

        self.namespaces
            .iter()
            .map(|ns| NamespacePattern::parse(ns).map_err(anyhow::Error::from))
            .collect()
    }

    pub fn debug_config(&self) {
        info!(
            agents = self.agents.len(),
            metrics_file = %self.metrics_file.display(),
            namespaces = self.namespaces.len(),
            interval_secs = self.interval_secs,
            idle_secs = self.pool.idle_secs,
            listen = ?self.get_listen(),
            "конфигурация загружена"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"
metrics_file: metrics.yaml
interval_secs: 30
timeout: 3
namespaces:
  - /klassen/snmp/system/uptime
pool:
  idle_secs: 600
agents:
  - snmp_agent_name: core
    snmp_agent_address: 10.0.0.1
    snmp_version: v2c
    community: public
  - address: 10.0.0.2:1161
    snmp_version: v3
    user_name: monitor
    security_level: AuthPriv
    auth_protocol: SHA
    auth_password: authpass
    priv_protocol: AES
    priv_password: privpass
    timeout: 7
"#;

    #[test]
    fn test_from_yaml() {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert!(config.http.is_none());

        let pool = config.pool_config();
        assert_eq!(pool.idle_timeout, Duration::from_secs(600));
        assert_eq!(pool.reap_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_agents_get_defaults() {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        let agents = config.agents().unwrap();

        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].address, "10.0.0.1:161");
        assert_eq!(agents[1].name, "10.0.0.2:1161");
        assert_eq!(agents[1].timeout, Duration::from_secs(7));
        assert_eq!(agents[1].version, SnmpVersion::V3);
    }

    #[test]
    fn test_invalid_agent_is_reported() {
        let yaml = "metrics_file: m.yaml\nagents:\n  - address: 10.0.0.1\n    snmp_version: v5\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        let err = config.agents().unwrap_err();
        assert!(format!("{:#}", err).contains("v5"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(AppConfig::from_yaml("metrics_file: m.yaml\ninterval_secs: 0\n").is_err());
        assert!(AppConfig::from_yaml("interval_secs: 10\n").is_err());
    }

    #[test]
    fn test_load_resolves_metrics_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("metrics.yaml"),
            "- OID: 1.3.6.1.2.1.1.3.0\n  namespace:\n    - source: string\n      string: system\n    - source: string\n      string: uptime\n",
        )
        .unwrap();
        let mut file = std::fs::File::create(dir.path().join("config.yaml")).unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = AppConfig::load(dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.metrics_file, dir.path().join("metrics.yaml"));

        let catalog = config.load_catalog().unwrap();
        assert_eq!(catalog.len(), 1);

        let patterns = config.patterns(&catalog).unwrap();
        assert_eq!(patterns[0].to_string(), "/klassen/snmp/system/uptime");
    }

    #[test]
    fn test_all_metrics_polled_by_default() {
        let config = AppConfig::from_yaml("metrics_file: m.yaml\n").unwrap();
        let catalog = Profile::from_yaml(
            "- OID: 1.3.6.1.2.1.1.3.0\n  namespace:\n    - source: string\n      string: uptime\n- OID: 1.3.6.1.2.1.1.5.0\n  namespace:\n    - source: string\n      string: name\n",
        )
        .unwrap()
        .into_catalog();

        let patterns = config.patterns(&catalog).unwrap();
        assert_eq!(patterns.len(), 2);
    }
}
