use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::collector::types::{DYNAMIC_ELEMENT, join_namespace};
use crate::collector::{CollectedValue, MetricValue};
use crate::config::AgentConfig;

/// JSON структура результата одного опроса агента
#[derive(Debug, Clone, Serialize)]
pub struct CollectionJson {
    pub agent: String,
    pub address: String,
    pub timestamp: String,
    pub summary: CollectionSummary,
    pub values: Vec<ValueJson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Сколько разных метрик (по шаблону пространства имен) дали значения
    pub metrics: usize,
    pub values: usize,
    pub status: String, // "success" | "empty"
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueJson {
    pub namespace: String,
    pub metric: String,
    pub value: MetricValue,
    pub unit: String,
    pub description: String,
    pub oid: String,
    /// Динамические элементы: имя элемента -> значение
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub timestamp: String,
}

/// JSON форматтер для результатов сбора
pub struct JsonFormatter;

impl JsonFormatter {
    /// Конвертирует результат сбора в JSON структуру
    pub fn format_collection(agent: &AgentConfig, values: &[CollectedValue]) -> CollectionJson {
        let formatted: Vec<ValueJson> = values.iter().map(Self::format_value).collect();

        let metrics: BTreeSet<&str> = formatted.iter().map(|v| v.metric.as_str()).collect();
        let status = if formatted.is_empty() { "empty" } else { "success" };

        CollectionJson {
            agent: agent.name.clone(),
            address: agent.address.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: CollectionSummary {
                metrics: metrics.len(),
                values: formatted.len(),
                status: status.to_string(),
            },
            values: formatted,
        }
    }

    fn format_value(value: &CollectedValue) -> ValueJson {
        let template: Vec<&str> = value
            .namespace
            .iter()
            .map(|e| {
                if e.is_dynamic() {
                    DYNAMIC_ELEMENT
                } else {
                    e.value.as_str()
                }
            })
            .collect();

        let dynamic = value
            .namespace
            .iter()
            .filter_map(|e| e.name.as_ref().map(|name| (name.clone(), e.value.clone())))
            .collect();

        ValueJson {
            namespace: value.namespace_string(),
            metric: join_namespace(&template),
            value: value.value.clone(),
            unit: value.unit.clone(),
            description: value.description.clone(),
            oid: value.oid.to_string(),
            dynamic,
            tags: value.tags.clone(),
            timestamp: value.timestamp.to_rfc3339(),
        }
    }

    /// Сериализует результат в JSON строку
    pub fn to_json_string(agent: &AgentConfig, values: &[CollectedValue]) -> anyhow::Result<String> {
        let json = Self::format_collection(agent, values);
        serde_json::to_string_pretty(&json)
            .map_err(|e| anyhow::anyhow!("Ошибка сериализации в JSON: {}", e))
    }

    /// Сериализует результат в компактный JSON
    pub fn to_json_compact(agent: &AgentConfig, values: &[CollectedValue]) -> anyhow::Result<String> {
        let json = Self::format_collection(agent, values);
        serde_json::to_string(&json)
            .map_err(|e| anyhow::anyhow!("Ошибка сериализации в JSON: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{NamespaceElement, NamespacePart};
    use crate::config::AgentSettings;
    use crate::snmp::parse_oid;

    fn agent() -> AgentConfig {
        AgentSettings {
            name: "core".to_string(),
            address: "10.0.0.1".to_string(),
            snmp_version: "v2c".to_string(),
            community: "public".to_string(),
            ..Default::default()
        }
        .validate(None)
        .unwrap()
    }

    fn value(interface: &str, octets: u32) -> CollectedValue {
        let part = NamespacePart::Index {
            position: 10,
            name: "index".to_string(),
            description: "ifIndex".to_string(),
        };
        CollectedValue {
            namespace: vec![
                NamespaceElement::literal("klassen"),
                NamespaceElement::literal("snmp"),
                NamespaceElement::literal("interface"),
                NamespaceElement::dynamic(&part, interface),
                NamespaceElement::literal("in_octets"),
            ],
            value: MetricValue::Unsigned32(octets),
            oid: parse_oid(&format!("1.3.6.1.2.1.2.2.1.10.{}", interface)).unwrap(),
            unit: "B".to_string(),
            description: "Входящий трафик".to_string(),
            tags: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts_metrics_by_template() {
        let json = JsonFormatter::format_collection(&agent(), &[value("1", 100), value("2", 200)]);

        assert_eq!(json.address, "10.0.0.1:161");
        assert_eq!(json.summary.metrics, 1);
        assert_eq!(json.summary.values, 2);
        assert_eq!(json.summary.status, "success");
        assert_eq!(json.values[1].namespace, "/klassen/snmp/interface/2/in_octets");
        assert_eq!(json.values[1].metric, "/klassen/snmp/interface/*/in_octets");
        assert_eq!(json.values[1].dynamic["index"], "2");
    }

    #[test]
    fn test_empty_collection() {
        let json = JsonFormatter::format_collection(&agent(), &[]);
        assert_eq!(json.summary.status, "empty");
        assert_eq!(json.summary.metrics, 0);
    }

    #[test]
    fn test_compact_json() {
        let text = JsonFormatter::to_json_compact(&agent(), &[value("3", 42)]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed["agent"], "core");
        assert_eq!(parsed["values"][0]["value"], 42);
        assert_eq!(parsed["values"][0]["oid"], "1.3.6.1.2.1.2.2.1.10.3");
        assert!(!text.contains('\n'));
    }
}
