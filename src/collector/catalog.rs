use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::namespace::NamespacePattern;
use super::types::{MetricDefinition, NamespaceElement};

/// Описание типа метрики для выдачи списка доступных метрик.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricType {
    pub namespace: String,
    pub elements: Vec<NamespaceElement>,
    pub unit: String,
    pub description: String,
}

/// Каталог описаний метрик по шаблону пространства имен.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    metrics: BTreeMap<String, MetricDefinition>,
}

impl MetricCatalog {
    /// Строит каталог. При повторе ключа остается первое описание.
    pub fn new(definitions: impl IntoIterator<Item = MetricDefinition>) -> Self {
        let mut metrics = BTreeMap::new();

        for metric in definitions {
            let key = metric.key();
            if metrics.contains_key(&key) {
                warn!(namespace = %key, oid = %metric.oid, "повторное описание метрики пропущено");
                continue;
            }
            metrics.insert(key, metric);
        }

        Self { metrics }
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MetricDefinition> {
        self.metrics.get(key)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.values()
    }

    /// Описания, чей шаблон совпадает с `pattern`.
    pub fn matching(&self, pattern: &NamespacePattern) -> Vec<&MetricDefinition> {
        self.metrics
            .values()
            .filter(|metric| pattern.matches_template(&metric.template()))
            .collect()
    }

    pub fn metric_types(&self) -> Vec<MetricType> {
        self.metrics
            .iter()
            .map(|(key, metric)| MetricType {
                namespace: key.clone(),
                elements: NamespaceElement::template(metric),
                unit: metric.unit.clone(),
                description: metric.description.clone(),
            })
            .collect()
    }
}
