//! SNMP агент в памяти.
//!
//! Отвечает на GET и GET-NEXT по отсортированной таблице OID, так же как
//! настоящий агент обходит свою MIB. Нужен для проверки обхода и сбора без
//! сети; неправильное поведение агента задается через
//! [`MemoryAgent::with_next_override`] и [`MemoryAgent::with_error`].

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ObjectId, SnmpHandle, SnmpType, SnmpValue, Transport, VarBind, parse_oid};
use crate::config::AgentConfig;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryAgent {
    mib: BTreeMap<ObjectId, SnmpValue>,
    next_overrides: HashMap<ObjectId, VarBind>,
    errors: HashMap<ObjectId, u32>,
    requests: AtomicUsize,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет значение. Некорректный OID в тестовых данных считается
    /// ошибкой программиста.
    pub fn with(mut self, oid: &str, kind: SnmpType, text: &str) -> Self {
        let oid = parse_oid(oid).unwrap_or_else(|e| panic!("{}", e));
        self.mib.insert(oid, SnmpValue::new(kind, text));
        self
    }

    /// GET-NEXT от `from` вернет `to` вместо следующего OID из таблицы.
    pub fn with_next_override(mut self, from: &str, to: &str, kind: SnmpType, text: &str) -> Self {
        let from = parse_oid(from).unwrap_or_else(|e| panic!("{}", e));
        let to = parse_oid(to).unwrap_or_else(|e| panic!("{}", e));
        self.next_overrides
            .insert(from, VarBind::new(to, SnmpValue::new(kind, text)));
        self
    }

    /// Любой запрос к `oid` получит ответ с указанным error-status.
    pub fn with_error(mut self, oid: &str, status: u32) -> Self {
        let oid = parse_oid(oid).unwrap_or_else(|e| panic!("{}", e));
        self.errors.insert(oid, status);
        self
    }

    /// Сколько запросов получил агент.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn check_error(&self, oid: &ObjectId) -> Result<()> {
        match self.errors.get(oid) {
            Some(status) => Err(Error::Agent {
                oid: oid.to_string(),
                status: *status,
            }),
            None => Ok(()),
        }
    }

    fn get(&self, oid: &ObjectId) -> Result<VarBind> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.check_error(oid)?;
        let value = self
            .mib
            .get(oid)
            .cloned()
            .unwrap_or_else(|| SnmpValue::new(SnmpType::NoSuchObject, ""));
        Ok(VarBind::new(oid.clone(), value))
    }

    fn get_next(&self, oid: &ObjectId) -> Result<VarBind> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.check_error(oid)?;
        if let Some(varbind) = self.next_overrides.get(oid) {
            return Ok(varbind.clone());
        }

        let next = self
            .mib
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next();

        Ok(match next {
            Some((next_oid, value)) => VarBind::new(next_oid.clone(), value.clone()),
            None => VarBind::new(oid.clone(), SnmpValue::new(SnmpType::EndOfMibView, "")),
        })
    }
}

/// Канал к [`MemoryAgent`].
pub struct MemoryHandle {
    agent: Arc<MemoryAgent>,
    address: String,
    closed: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl SnmpHandle for MemoryHandle {
    async fn get(&mut self, oid: &ObjectId) -> Result<VarBind> {
        if self.closed {
            return Err(Error::SessionClosed {
                address: self.address.clone(),
            });
        }
        // отдаем управление, чтобы параллельные задачи реально чередовались
        tokio::task::yield_now().await;
        self.agent.get(oid)
    }

    async fn get_next(&mut self, oid: &ObjectId) -> Result<VarBind> {
        if self.closed {
            return Err(Error::SessionClosed {
                address: self.address.clone(),
            });
        }
        tokio::task::yield_now().await;
        self.agent.get_next(oid)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Транспорт, раздающий каналы к агентам в памяти по адресу.
#[derive(Default)]
pub struct MemoryTransport {
    agents: Mutex<HashMap<String, Arc<MemoryAgent>>>,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует агента по адресу в виде `host:port`.
    pub fn with_agent(self, address: &str, agent: MemoryAgent) -> Self {
        self.agents
            .lock()
            .insert(address.to_string(), Arc::new(agent));
        self
    }

    pub fn agent(&self, address: &str) -> Option<Arc<MemoryAgent>> {
        self.agents.lock().get(address).cloned()
    }

    /// Сколько раз открывались каналы.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Сколько каналов закрыто.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Канал к агенту в обход пула.
    pub fn handle(&self, address: &str) -> Option<MemoryHandle> {
        self.agent(address).map(|agent| MemoryHandle {
            agent,
            address: address.to_string(),
            closed: false,
            closes: Arc::clone(&self.closes),
        })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, agent: &AgentConfig) -> Result<Box<dyn SnmpHandle>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match self.handle(&agent.address) {
            Some(handle) => Ok(Box::new(handle)),
            None => Err(Error::Connection {
                address: agent.address.clone(),
                reason: "агент не отвечает".to_string(),
            }),
        }
    }
}
