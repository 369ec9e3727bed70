use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Pdu, Value};
use tokio::time::timeout;
use tracing::debug;

use crate::config::AgentConfig;
use crate::config::settings::{Credentials, UsmCredentials};
use crate::error::{Error, Result};

pub mod clients_enum;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
#[cfg(test)]
mod loopback;
pub mod oid;
pub mod traversal;
pub mod v2c;
pub mod v3;

pub use clients_enum::SnmpClient;
pub use oid::{ObjectId, parse_oid};
pub use traversal::traverse;
pub use v2c::SnmpClientV2c;
pub use v3::SnmpClientV3;

/// Тип значения SNMP, как его прислал агент.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpType {
    Integer,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Counter64,
    Opaque,
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Other(String),
}

impl fmt::Display for SnmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpType::Integer => write!(f, "Integer"),
            SnmpType::OctetString => write!(f, "OctetString"),
            SnmpType::ObjectIdentifier => write!(f, "ObjectIdentifier"),
            SnmpType::IpAddress => write!(f, "IpAddress"),
            SnmpType::Counter32 => write!(f, "Counter32"),
            SnmpType::Gauge32 => write!(f, "Gauge32"),
            SnmpType::TimeTicks => write!(f, "TimeTicks"),
            SnmpType::Counter64 => write!(f, "Counter64"),
            SnmpType::Opaque => write!(f, "Opaque"),
            SnmpType::Null => write!(f, "Null"),
            SnmpType::NoSuchObject => write!(f, "NoSuchObject"),
            SnmpType::NoSuchInstance => write!(f, "NoSuchInstance"),
            SnmpType::EndOfMibView => write!(f, "EndOfMibView"),
            SnmpType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Значение из ответа: тип и текстовое представление.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpValue {
    pub kind: SnmpType,
    pub text: String,
}

impl SnmpValue {
    pub fn new(kind: SnmpType, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn from_snmp(value: &Value<'_>) -> Self {
        match value {
            Value::Integer(v) => Self::new(SnmpType::Integer, v.to_string()),
            Value::OctetString(bytes) => Self::new(SnmpType::OctetString, render_octets(bytes)),
            Value::ObjectIdentifier(oid) => Self::new(SnmpType::ObjectIdentifier, oid.to_string()),
            Value::IpAddress(ip) => Self::new(SnmpType::IpAddress, Ipv4Addr::from(*ip).to_string()),
            Value::Counter32(v) => Self::new(SnmpType::Counter32, v.to_string()),
            Value::Unsigned32(v) => Self::new(SnmpType::Gauge32, v.to_string()),
            Value::Timeticks(v) => Self::new(SnmpType::TimeTicks, v.to_string()),
            Value::Counter64(v) => Self::new(SnmpType::Counter64, v.to_string()),
            Value::Opaque(bytes) => Self::new(SnmpType::Opaque, render_octets(bytes)),
            Value::Null => Self::new(SnmpType::Null, ""),
            Value::NoSuchObject => Self::new(SnmpType::NoSuchObject, ""),
            Value::NoSuchInstance => Self::new(SnmpType::NoSuchInstance, ""),
            Value::EndOfMibView => Self::new(SnmpType::EndOfMibView, ""),
            other => Self::new(SnmpType::Other("Unknown".to_string()), format!("{:?}", other)),
        }
    }

    /// Исключение v2c/v3 вместо значения (noSuchObject, endOfMibView, ...).
    pub fn is_exception(&self) -> bool {
        matches!(
            self.kind,
            SnmpType::NoSuchObject | SnmpType::NoSuchInstance | SnmpType::EndOfMibView
        )
    }
}

/// Текст, если байты являются UTF-8 без управляющих символов, иначе hex
/// через двоеточие (`00:1a:2b:ff`), как принято для MAC адресов.
pub fn render_octets(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Одна пара OID/значение из ответа агента.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: ObjectId,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: ObjectId, value: SnmpValue) -> Self {
        Self { oid, value }
    }
}

/// Открытый канал к одному агенту. Запросы по одному каналу не должны
/// перемежаться, поэтому все методы берут `&mut self`.
#[async_trait]
pub trait SnmpHandle: Send {
    /// GET одного OID.
    async fn get(&mut self, oid: &ObjectId) -> Result<VarBind>;

    /// GET-NEXT одного OID.
    async fn get_next(&mut self, oid: &ObjectId) -> Result<VarBind>;

    fn close(&mut self);
}

/// Фабрика каналов к агентам.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, agent: &AgentConfig) -> Result<Box<dyn SnmpHandle>>;
}

/// Таймаут и число повторов для одного запроса.
#[derive(Debug, Clone, Copy)]
pub struct RequestPolicy {
    pub timeout: Duration,
    pub retries: u32,
}

impl From<&AgentConfig> for RequestPolicy {
    fn from(agent: &AgentConfig) -> Self {
        Self {
            timeout: agent.timeout,
            retries: agent.retries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Get,
    GetNext,
}

/// Транспорт поверх `snmp2::AsyncSession` (UDP, v1/v2c/v3).
#[derive(Debug, Default, Clone)]
pub struct SnmpTransport;

#[async_trait]
impl Transport for SnmpTransport {
    async fn open(&self, agent: &AgentConfig) -> Result<Box<dyn SnmpHandle>> {
        let policy = RequestPolicy::from(agent);
        let client = match &agent.credentials {
            Credentials::Community { community } => {
                create_v2c_client(agent, community.as_bytes(), policy).await?
            }
            Credentials::Usm(usm) => create_v3_client(agent, usm, policy).await?,
        };
        Ok(Box::new(client))
    }
}

pub async fn create_v2c_client(
    agent: &AgentConfig,
    community: &[u8],
    policy: RequestPolicy,
) -> Result<SnmpClient> {
    let client = SnmpClientV2c::new(&agent.address, agent.version, community, policy)
        .await
        .map_err(|e| connection_error(agent, e))?;
    Ok(SnmpClient::V2c(client))
}

pub async fn create_v3_client(
    agent: &AgentConfig,
    usm: &UsmCredentials,
    policy: RequestPolicy,
) -> Result<SnmpClient> {
    let client = SnmpClientV3::new(&agent.address, usm, policy)
        .await
        .map_err(|e| connection_error(agent, e))?;
    Ok(SnmpClient::V3(client))
}

fn connection_error(agent: &AgentConfig, e: anyhow::Error) -> Error {
    Error::Connection {
        address: agent.address.clone(),
        reason: format!("{:#}", e),
    }
}

/// Достает единственный varbind из ответа и проверяет error-status.
pub(crate) fn varbind_from_pdu(requested: &ObjectId, pdu: Pdu<'_>) -> Result<VarBind> {
    if pdu.error_status != 0 {
        return Err(Error::Agent {
            oid: requested.to_string(),
            status: pdu.error_status,
        });
    }

    let (oid, value) = pdu.varbinds.into_iter().next().ok_or_else(|| Error::Transport {
        oid: requested.to_string(),
        reason: "SNMP ответ пустой".to_string(),
    })?;

    Ok(VarBind::new(ObjectId::from_snmp(&oid)?, SnmpValue::from_snmp(&value)))
}

/// Клиент, владеющий `AsyncSession`, которую можно пересоздать.
///
/// `AsyncSession` читает из сокета первый пришедший ответ и не пропускает
/// ответы с чужим request-id. После таймаута опоздавший ответ остается в
/// сокете, поэтому сессия заменяется новой с другим сокетом.
#[async_trait]
pub(crate) trait Reconnect: Send {
    fn session(&mut self) -> &mut AsyncSession;

    async fn reconnect(&mut self) -> anyhow::Result<()>;
}

/// Почему ответ не получен и сокет пришлось сменить.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lost {
    Timeout,
    StaleReply,
}

/// Выполняет один запрос с таймаутом и повторами.
///
/// Повторяются таймауты и ответы на чужой request-id, каждый раз через новый
/// сокет. Остальные сетевые ошибки и ответы с ошибкой от агента не
/// повторяются.
pub(crate) async fn request<C: Reconnect>(
    client: &mut C,
    oid: &ObjectId,
    kind: RequestKind,
    policy: RequestPolicy,
) -> Result<VarBind> {
    let target = oid.to_snmp()?;
    let mut attempt = 0;

    loop {
        let lost = {
            let session = client.session();
            let sent = match kind {
                RequestKind::Get => timeout(policy.timeout, session.get(&target)).await,
                RequestKind::GetNext => timeout(policy.timeout, session.getnext(&target)).await,
            };

            match sent {
                Ok(Ok(pdu)) => return varbind_from_pdu(oid, pdu),
                Ok(Err(snmp2::Error::RequestIdMismatch)) => Lost::StaleReply,
                Ok(Err(e)) => {
                    return Err(Error::Transport {
                        oid: oid.to_string(),
                        reason: format!("{:?}", e),
                    });
                }
                Err(_) => Lost::Timeout,
            }
        };

        client.reconnect().await.map_err(|e| Error::Transport {
            oid: oid.to_string(),
            reason: format!("не удалось пересоздать SNMP сессию: {:#}", e),
        })?;

        if attempt >= policy.retries {
            return Err(match lost {
                Lost::Timeout => Error::Timeout {
                    oid: oid.to_string(),
                    retries: policy.retries,
                },
                Lost::StaleReply => Error::Transport {
                    oid: oid.to_string(),
                    reason: "ответ на устаревший запрос".to_string(),
                },
            });
        }

        attempt += 1;
        debug!(oid = %oid, attempt, reason = ?lost, "SNMP ответ не получен, повтор через новый сокет");
    }
}
