use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::pool::{ConnectionPool, Session};
use crate::snmp::traverse;

pub mod catalog;
pub mod convert;
pub mod namespace;
pub mod types;

pub use catalog::{MetricCatalog, MetricType};
pub use convert::{apply_scale, convert};
pub use namespace::{NamespacePattern, ResolvedNamespace, resolve};
pub use types::{
    CollectedValue, MetricDefinition, MetricValue, Mode, NamespaceElement, NamespacePart,
    TAG_AGENT_ADDRESS, TAG_AGENT_NAME, TAG_OID,
};

/// Коллектор метрик: пул сессий плюс каталог описаний.
#[derive(Clone)]
pub struct Collector {
    pool: Arc<ConnectionPool>,
    catalog: Arc<MetricCatalog>,
}

impl Collector {
    pub fn new(pool: Arc<ConnectionPool>, catalog: Arc<MetricCatalog>) -> Self {
        Self { pool, catalog }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Собирает метрики агента по списку запрошенных пространств имен.
    ///
    /// Шаблон, под который не попадает ни одна метрика, и ошибка
    /// подключения валят весь запрос. Ошибки отдельных метрик только
    /// логируются.
    pub async fn collect(
        &self,
        agent: &AgentConfig,
        patterns: &[NamespacePattern],
    ) -> Result<Vec<CollectedValue>> {
        let mut requests = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let definitions: Vec<MetricDefinition> =
                self.catalog.matching(pattern).into_iter().cloned().collect();
            if definitions.is_empty() {
                return Err(Error::UnsupportedNamespace(pattern.to_string()));
            }
            requests.push((pattern, definitions));
        }

        let session = self.pool.acquire(agent).await?;

        let mut collected = Vec::new();
        for (pattern, definitions) in requests {
            debug!(agent = %agent.name, namespace = %pattern, metrics = definitions.len(), "сбор метрик");
            collected.extend(collect_with_session(&session, definitions, pattern, agent).await);
        }

        Ok(collected)
    }
}

/// Собирает `definitions` через одну сессию, по задаче на метрику.
///
/// Задачи по очереди захватывают сессию на время своих запросов и
/// отпускают ее до конвертации. Ошибка одной метрики на остальные не
/// влияет; функция дожидается всех задач.
pub async fn collect_with_session(
    session: &Arc<Session>,
    definitions: Vec<MetricDefinition>,
    pattern: &NamespacePattern,
    agent: &AgentConfig,
) -> Vec<CollectedValue> {
    let output = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::with_capacity(definitions.len());

    for metric in definitions {
        let session = Arc::clone(session);
        let output = Arc::clone(&output);
        let pattern = pattern.clone();
        let agent = agent.clone();

        tasks.push(tokio::spawn(async move {
            if let Err(e) = collect_metric(&session, &metric, &pattern, &agent, &output).await {
                warn!(
                    agent = %agent.name,
                    namespace = %metric.key(),
                    error = %e,
                    "метрика не собрана"
                );
            }
        }));
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "задача сбора метрики завершилась аварийно");
        }
    }

    std::mem::take(&mut *output.lock())
}

async fn collect_metric(
    session: &Session,
    metric: &MetricDefinition,
    pattern: &NamespacePattern,
    agent: &AgentConfig,
    output: &Mutex<Vec<CollectedValue>>,
) -> Result<()> {
    let (results, resolved) = {
        let mut guard = session.lock().await;
        let results = traverse(guard.handle(), &metric.oid, metric.mode).await?;
        let resolved = resolve(guard.handle(), &results, metric).await?;
        guard.touch();
        (results, resolved)
    };

    let timestamp = Utc::now();
    let mut values = Vec::with_capacity(results.len());

    for (index, varbind) in results.into_iter().enumerate() {
        if varbind.value.is_exception() {
            warn!(oid = %varbind.oid, kind = %varbind.value.kind, "агент не вернул значение");
            continue;
        }

        let value = match convert(&varbind.value.text, &varbind.value.kind) {
            Ok(value) => apply_scale(value, metric.scale, metric.shift),
            Err(e) => {
                warn!(oid = %varbind.oid, error = %e, "значение пропущено");
                continue;
            }
        };

        let namespace = resolved.compose(metric, index);
        let segments: Vec<&str> = namespace.iter().map(|e| e.value.as_str()).collect();
        if !pattern.matches_segments(&segments) {
            continue;
        }

        let mut tags = BTreeMap::new();
        tags.insert(TAG_AGENT_NAME.to_string(), agent.name.clone());
        tags.insert(TAG_AGENT_ADDRESS.to_string(), agent.address.clone());
        tags.insert(TAG_OID.to_string(), varbind.oid.to_string());

        values.push(CollectedValue {
            namespace,
            value,
            oid: varbind.oid,
            unit: metric.unit.clone(),
            description: metric.description.clone(),
            tags,
            timestamp,
        });
    }

    output.lock().extend(values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::settings::AgentSettings;
    use crate::pool::PoolConfig;
    use crate::snmp::memory::{MemoryAgent, MemoryTransport};
    use crate::snmp::{SnmpType, parse_oid};

    const ADDRESS: &str = "10.0.0.1:161";

    fn agent() -> AgentConfig {
        AgentSettings {
            name: "core-switch".to_string(),
            address: "10.0.0.1".to_string(),
            snmp_version: "v2c".to_string(),
            community: "public".to_string(),
            ..Default::default()
        }
        .validate(None)
        .unwrap()
    }

    fn mib() -> MemoryAgent {
        MemoryAgent::new()
            .with("1.3.6.1.2.1.1.3.0", SnmpType::TimeTicks, "12345")
            .with("1.3.6.1.2.1.2.2.1.2.1", SnmpType::OctetString, "lo")
            .with("1.3.6.1.2.1.2.2.1.2.2", SnmpType::OctetString, "eth0")
            .with("1.3.6.1.2.1.2.2.1.10.1", SnmpType::Counter32, "100")
            .with("1.3.6.1.2.1.2.2.1.10.2", SnmpType::Counter32, "bogus")
            .with("1.3.6.1.2.1.2.2.1.16.1", SnmpType::Counter32, "10")
            .with("1.3.6.1.2.1.2.2.1.16.2", SnmpType::Counter32, "20")
            .with("1.3.6.1.2.1.31.1.1.1.1.1", SnmpType::OctetString, "lo")
    }

    fn interface_metric(oid: &str, name_oid: &str, leaf: &str) -> MetricDefinition {
        MetricDefinition::new(
            parse_oid(oid).unwrap(),
            Mode::Table,
            vec![
                NamespacePart::Literal("interface".to_string()),
                NamespacePart::Protocol {
                    oid: parse_oid(name_oid).unwrap(),
                    name: "name".to_string(),
                    description: "interface name".to_string(),
                },
                NamespacePart::Literal(leaf.to_string()),
            ],
        )
        .unwrap()
    }

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(vec![
            MetricDefinition::new(
                parse_oid("1.3.6.1.2.1.1.3.0").unwrap(),
                Mode::Single,
                vec![
                    NamespacePart::Literal("system".to_string()),
                    NamespacePart::Literal("uptime".to_string()),
                ],
            )
            .unwrap()
            .with_unit("ticks")
            .with_scale(0.5, 0.0),
            interface_metric("1.3.6.1.2.1.2.2.1.10", "1.3.6.1.2.1.2.2.1.2", "in_octets"),
            interface_metric("1.3.6.1.2.1.2.2.1.16", "1.3.6.1.2.1.2.2.1.2", "out_octets"),
            // ifName есть только для одного интерфейса из двух
            interface_metric("1.3.6.1.2.1.2.2.1.16", "1.3.6.1.2.1.31.1.1.1.1", "errors"),
        ])
    }

    fn collector() -> (Collector, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new().with_agent(ADDRESS, mib()));
        let pool = Arc::new(ConnectionPool::new(
            transport.clone(),
            PoolConfig::with_idle_timeout(Duration::from_secs(60)),
        ));
        (Collector::new(pool, Arc::new(catalog())), transport)
    }

    fn pattern(s: &str) -> NamespacePattern {
        NamespacePattern::parse(s).unwrap()
    }

    fn namespaces(values: &[CollectedValue]) -> Vec<String> {
        let mut out: Vec<String> = values.iter().map(|v| v.namespace_string()).collect();
        out.sort();
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failing_metric_does_not_abort_siblings() {
        let (collector, _) = collector();

        let values = collector
            .collect(&agent(), &[pattern("/klassen/snmp/interface/*/*")])
            .await
            .unwrap();

        // errors: несовпадение числа значений, in_octets/eth0: не число
        assert_eq!(
            namespaces(&values),
            vec![
                "/klassen/snmp/interface/eth0/out_octets",
                "/klassen/snmp/interface/lo/in_octets",
                "/klassen/snmp/interface/lo/out_octets",
            ]
        );
    }

    #[tokio::test]
    async fn test_values_are_scaled_and_tagged() {
        let (collector, _) = collector();

        let values = collector
            .collect(&agent(), &[pattern("/klassen/snmp/system/uptime")])
            .await
            .unwrap();

        assert_eq!(values.len(), 1);
        let uptime = &values[0];
        assert_eq!(uptime.value, MetricValue::Float(6172.5));
        assert_eq!(uptime.unit, "ticks");
        assert_eq!(uptime.tags[TAG_AGENT_NAME], "core-switch");
        assert_eq!(uptime.tags[TAG_AGENT_ADDRESS], ADDRESS);
        assert_eq!(uptime.tags[TAG_OID], "1.3.6.1.2.1.1.3.0");
    }

    #[tokio::test]
    async fn test_concrete_instance_is_filtered() {
        let (collector, _) = collector();

        let values = collector
            .collect(&agent(), &[pattern("/klassen/snmp/interface/eth0/out_octets")])
            .await
            .unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, MetricValue::Unsigned32(20));
        assert_eq!(values[0].namespace[3].name.as_deref(), Some("name"));
    }

    #[tokio::test]
    async fn test_unsupported_namespace_fails_before_connecting() {
        let (collector, transport) = collector();

        let err = collector
            .collect(
                &agent(),
                &[
                    pattern("/klassen/snmp/system/uptime"),
                    pattern("/klassen/snmp/memory/free"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedNamespace(_)));
        assert!(err.is_fatal());
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test]
    async fn test_connection_error_is_fatal() {
        let (collector, _) = collector();
        let mut unreachable = agent();
        unreachable.address = "10.0.0.99:161".to_string();

        let err = collector
            .collect(&unreachable, &[pattern("/klassen/snmp/system/uptime")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_used_only_bumped_on_success() {
        let (collector, _) = collector();
        let session = collector.pool().acquire(&agent()).await.unwrap();
        let created = session.last_used().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        let failing = collector
            .collect(&agent(), &[pattern("/klassen/snmp/interface/*/errors")])
            .await
            .unwrap();
        assert!(failing.is_empty());
        assert_eq!(session.last_used().await, created);

        collector
            .collect(&agent(), &[pattern("/klassen/snmp/system/uptime")])
            .await
            .unwrap();
        assert!(session.last_used().await > created);
    }
}
