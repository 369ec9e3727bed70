//! Пул SNMP сессий.
//!
//! Одна сессия на адрес агента. Сессия открывается при первом запросе к
//! адресу и переиспользуется всеми последующими; фоновый reaper закрывает
//! сессии, которые простаивают дольше порога.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::snmp::{SnmpHandle, Transport};

/// Минимальный период проверки простоя.
pub const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Порог простоя и период проверки. Не меняются после создания пула.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub idle_timeout: Duration,
    pub reap_interval: Duration,
}

impl PoolConfig {
    /// Период проверки равен половине порога простоя, но не меньше
    /// [`MIN_REAP_INTERVAL`].
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            reap_interval: (idle_timeout / 2).max(MIN_REAP_INTERVAL),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_idle_timeout(Duration::from_secs(30 * 60))
    }
}

struct SessionState {
    handle: Box<dyn SnmpHandle>,
    last_used: Instant,
}

/// Открытая сессия с одним агентом.
///
/// Все запросы через сессию идут под ее мьютексом: параллельные запросы по
/// одному каналу перемежаться не должны.
pub struct Session {
    address: String,
    state: AsyncMutex<SessionState>,
}

impl Session {
    fn new(address: String, handle: Box<dyn SnmpHandle>) -> Self {
        Self {
            address,
            state: AsyncMutex::new(SessionState {
                handle,
                last_used: Instant::now(),
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Захватывает сессию на время серии запросов.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            state: self.state.lock().await,
        }
    }

    pub async fn last_used(&self) -> Instant {
        self.state.lock().await.last_used
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Эксклюзивный доступ к каналу сессии.
pub struct SessionGuard<'a> {
    state: MutexGuard<'a, SessionState>,
}

impl SessionGuard<'_> {
    pub fn handle(&mut self) -> &mut dyn SnmpHandle {
        self.state.handle.as_mut()
    }

    /// Отмечает успешное использование сессии.
    pub fn touch(&mut self) {
        self.state.last_used = Instant::now();
    }
}

/// Реестр сессий по адресу агента.
pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(transport: Arc<dyn Transport>, config: PoolConfig) -> Self {
        Self {
            transport,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Возвращает сессию для адреса агента, открывая ее при необходимости.
    ///
    /// Канал открывается без удержания блокировки реестра. Если другая
    /// задача успела зарегистрировать сессию раньше, лишний канал
    /// закрывается и возвращается уже зарегистрированная сессия.
    pub async fn acquire(&self, agent: &AgentConfig) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.lock().get(&agent.address) {
            return Ok(Arc::clone(session));
        }

        let mut handle = self
            .transport
            .open(agent)
            .await
            .map_err(|e| match e {
                Error::Connection { .. } => e,
                other => Error::Connection {
                    address: agent.address.clone(),
                    reason: other.to_string(),
                },
            })?;

        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(&agent.address) {
            debug!(address = %agent.address, "сессия уже открыта другой задачей, лишний канал закрыт");
            handle.close();
            return Ok(Arc::clone(existing));
        }

        let session = Arc::new(Session::new(agent.address.clone(), handle));
        sessions.insert(agent.address.clone(), Arc::clone(&session));
        info!(address = %agent.address, agent = %agent.name, "открыта SNMP сессия");
        Ok(session)
    }

    /// Закрывает и удаляет сессии, простаивающие дольше порога.
    ///
    /// Сессия, занятая запросами в момент проверки, пропускается.
    /// Возвращает число закрытых сессий.
    pub fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;
        let mut sessions = self.sessions.lock();
        let before = sessions.len();

        sessions.retain(|address, session| match session.state.try_lock() {
            Ok(mut state) if now.duration_since(state.last_used) > idle_timeout => {
                state.handle.close();
                info!(address = %address, "SNMP сессия закрыта по простою");
                false
            }
            Ok(_) => true,
            Err(_) => {
                debug!(address = %address, "сессия занята, пропускаем");
                true
            }
        });

        before - sessions.len()
    }

    /// Запускает фоновую проверку простаивающих сессий.
    pub fn start_reaper(self: &Arc<Self>) -> Reaper {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let pool = Arc::clone(self);
        let period = self.config.reap_interval.max(MIN_REAP_INTERVAL);

        let handle = tokio::spawn(async move {
            info!(
                idle_secs = pool.config.idle_timeout.as_secs(),
                interval_secs = period.as_secs(),
                "reaper SNMP сессий запущен"
            );

            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let closed = pool.reap_idle();
                        if closed > 0 {
                            debug!(closed, remaining = pool.len(), "проверка простоя завершена");
                        }
                    }
                }
            }

            info!("reaper SNMP сессий остановлен");
        });

        Reaper { token, handle }
    }

    /// Закрывает все сессии. Занятые сессии закрываются после завершения
    /// текущих запросов.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        let count = drained.len();

        for session in drained {
            session.state.lock().await.handle.close();
        }

        if count > 0 {
            info!(count, "все SNMP сессии закрыты");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.sessions.lock().keys().cloned().collect();
        addresses.sort();
        addresses
    }
}

/// Запущенный reaper. Останавливается явно через [`Reaper::stop`].
pub struct Reaper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reaper {
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "задача reaper завершилась с ошибкой");
        }
    }
}
