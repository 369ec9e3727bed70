use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 161;
const DEFAULT_RETRIES: u32 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 5;

fn missing(parameter: &str) -> Error {
    Error::Config(format!(
        "Не задан обязательный параметр конфигурации ({})",
        parameter
    ))
}

fn incorrect(value: &str, parameter: &str, options: &[&str]) -> Error {
    Error::Config(format!(
        "Некорректное значение '{}' параметра {}, допустимые варианты: {:?}",
        value, parameter, options
    ))
}

/// Версия протокола SNMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    const OPTIONS: [&'static str; 3] = ["v1", "v2c", "v3"];
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpVersion::V1 => write!(f, "v1"),
            SnmpVersion::V2c => write!(f, "v2c"),
            SnmpVersion::V3 => write!(f, "v3"),
        }
    }
}

impl FromStr for SnmpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v1" => Ok(SnmpVersion::V1),
            "v2c" => Ok(SnmpVersion::V2c),
            "v3" => Ok(SnmpVersion::V3),
            _ => Err(incorrect(s, "snmp_version", &Self::OPTIONS)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl FromStr for SecurityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NoAuthNoPriv" => Ok(SecurityLevel::NoAuthNoPriv),
            "AuthNoPriv" => Ok(SecurityLevel::AuthNoPriv),
            "AuthPriv" => Ok(SecurityLevel::AuthPriv),
            _ => Err(incorrect(
                s,
                "security_level",
                &["NoAuthNoPriv", "AuthNoPriv", "AuthPriv"],
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocolName {
    Md5,
    Sha,
}

impl FromStr for AuthProtocolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MD5" => Ok(AuthProtocolName::Md5),
            "SHA" => Ok(AuthProtocolName::Sha),
            _ => Err(incorrect(s, "auth_protocol", &["MD5", "SHA"])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocolName {
    Des,
    Aes,
}

impl FromStr for PrivProtocolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DES" => Ok(PrivProtocolName::Des),
            "AES" => Ok(PrivProtocolName::Aes),
            _ => Err(incorrect(s, "priv_protocol", &["DES", "AES"])),
        }
    }
}

/// Учетные данные SNMPv3 (USM).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmCredentials {
    pub user_name: String,
    pub security_level: SecurityLevel,
    pub auth_protocol: AuthProtocolName,
    pub auth_password: String,
    pub priv_protocol: PrivProtocolName,
    pub priv_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// SNMPv1 и SNMPv2c
    Community { community: String },
    /// SNMPv3
    Usm(UsmCredentials),
}

/// Проверенная конфигурация агента. Сессии в пуле различаются по `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    /// Адрес вида `host:port`
    pub address: String,
    pub version: SnmpVersion,
    pub credentials: Credentials,
    pub retries: u32,
    pub timeout: Duration,
}

/// Настройки агента как они записаны в конфигурации.
///
/// Ключи совпадают со старым форматом (`snmp_agent_name`,
/// `snmp_agent_address`), короткие `name` и `address` тоже принимаются.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default, alias = "snmp_agent_name")]
    pub name: String,
    #[serde(default, alias = "snmp_agent_address")]
    pub address: String,
    #[serde(default)]
    pub snmp_version: String,
    #[serde(default)]
    pub community: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub security_level: String,
    #[serde(default)]
    pub auth_password: String,
    #[serde(default)]
    pub auth_protocol: String,
    #[serde(default)]
    pub priv_password: String,
    #[serde(default)]
    pub priv_protocol: String,
    /// Количество повторов при таймауте
    pub retries: Option<u32>,
    /// Таймаут для одного SNMP запроса (секунды)
    pub timeout: Option<u64>,
}

impl AgentSettings {
    /// Проверяет настройки и подставляет значения по умолчанию.
    ///
    /// `default_timeout` используется, если у агента таймаут не задан.
    pub fn validate(&self, default_timeout: Option<u64>) -> Result<AgentConfig> {
        if self.address.trim().is_empty() {
            return Err(missing("snmp_agent_address"));
        }
        if self.snmp_version.is_empty() {
            return Err(missing("snmp_version"));
        }
        let version: SnmpVersion = self.snmp_version.parse()?;

        let credentials = match version {
            SnmpVersion::V1 | SnmpVersion::V2c => {
                if self.community.is_empty() {
                    return Err(missing("community"));
                }
                Credentials::Community {
                    community: self.community.clone(),
                }
            }
            SnmpVersion::V3 => Credentials::Usm(self.usm_credentials()?),
        };

        let name = if self.name.is_empty() {
            self.address.clone()
        } else {
            self.name.clone()
        };

        let timeout = self
            .timeout
            .filter(|t| *t > 0)
            .or(default_timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(AgentConfig {
            name,
            address: normalize_address(&self.address),
            version,
            credentials,
            retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            timeout: Duration::from_secs(timeout),
        })
    }

    fn usm_credentials(&self) -> Result<UsmCredentials> {
        if self.user_name.is_empty() {
            return Err(missing("user_name"));
        }
        if self.security_level.is_empty() {
            return Err(missing("security_level"));
        }
        if self.auth_protocol.is_empty() {
            return Err(missing("auth_protocol"));
        }
        if self.priv_protocol.is_empty() {
            return Err(missing("priv_protocol"));
        }

        Ok(UsmCredentials {
            user_name: self.user_name.clone(),
            security_level: self.security_level.parse()?,
            auth_protocol: self.auth_protocol.parse()?,
            auth_password: self.auth_password.clone(),
            priv_protocol: self.priv_protocol.parse()?,
            priv_password: self.priv_password.clone(),
        })
    }
}

/// Дописывает стандартный порт 161, если он не указан.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();

    if address.starts_with('[') {
        return if address.contains("]:") {
            address.to_string()
        } else {
            format!("{}:{}", address, DEFAULT_PORT)
        };
    }

    match address.matches(':').count() {
        0 => format!("{}:{}", address, DEFAULT_PORT),
        1 => address.to_string(),
        // IPv6 без скобок
        _ => format!("[{}]:{}", address, DEFAULT_PORT),
    }
}
