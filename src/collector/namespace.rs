//! Разрешение динамических элементов пространства имен.
//!
//! Для каждого динамического элемента строится последовательность
//! значений, выровненная по индексу с основными результатами метрики:
//! `values[i]` относится к `primary[i]`. Значения строятся заново при
//! каждом сборе и в описании метрики не хранятся.

use std::fmt;

use super::types::{
    DYNAMIC_ELEMENT, MetricDefinition, NAMESPACE_PREFIX, NAMESPACE_SEPARATOR, NamespaceElement,
    NamespacePart, join_namespace,
};
use crate::error::{Error, Result};
use crate::snmp::{SnmpHandle, VarBind, traverse};

/// Значения динамических элементов за один проход.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedNamespace {
    // по одному элементу на элемент пространства имен метрики, None для литералов
    parts: Vec<Option<Vec<String>>>,
}

impl ResolvedNamespace {
    /// Значения элемента `part` (по его номеру в описании метрики).
    pub fn values(&self, part: usize) -> Option<&[String]> {
        self.parts.get(part).and_then(|v| v.as_deref())
    }

    /// Полное пространство имен для `index`-го результата: префикс,
    /// литералы и значения динамических элементов.
    pub fn compose(&self, metric: &MetricDefinition, index: usize) -> Vec<NamespaceElement> {
        let prefix = NAMESPACE_PREFIX.iter().map(|s| NamespaceElement::literal(*s));

        let parts = metric.namespace.iter().enumerate().map(|(n, part)| match part {
            NamespacePart::Literal(value) => NamespaceElement::literal(value.clone()),
            dynamic => {
                let value = self
                    .values(n)
                    .and_then(|values| values.get(index))
                    .map(String::as_str)
                    .unwrap_or(DYNAMIC_ELEMENT);
                NamespaceElement::dynamic(dynamic, value)
            }
        });

        prefix.chain(parts).collect()
    }
}

/// Разрешает динамические элементы для основных результатов `primary`.
///
/// Элементы из протокола обходят свой OID в режиме метрики через ту же
/// сессию; число полученных значений обязано совпасть с числом основных
/// результатов. Элементы из индекса берут сегмент OID каждого результата
/// как есть.
pub async fn resolve(
    handle: &mut dyn SnmpHandle,
    primary: &[VarBind],
    metric: &MetricDefinition,
) -> Result<ResolvedNamespace> {
    let mut parts = Vec::with_capacity(metric.namespace.len());

    for part in &metric.namespace {
        let values = match part {
            NamespacePart::Literal(_) => {
                parts.push(None);
                continue;
            }
            NamespacePart::Protocol { oid, .. } => traverse(handle, oid, metric.mode)
                .await?
                .into_iter()
                .map(|vb| sanitize(&vb.value.text))
                .collect::<Vec<_>>(),
            NamespacePart::Index { position, .. } => primary
                .iter()
                .map(|vb| index_segment(part, *position, vb))
                .collect::<Result<Vec<_>>>()?,
        };

        if values.len() != primary.len() {
            return Err(Error::CountMismatch {
                part: part.name().to_string(),
                expected: primary.len(),
                actual: values.len(),
            });
        }
        parts.push(Some(values));
    }

    Ok(ResolvedNamespace { parts })
}

fn index_segment(part: &NamespacePart, position: usize, varbind: &VarBind) -> Result<String> {
    let segments = varbind.oid.segments();
    segments
        .get(position)
        .cloned()
        .ok_or_else(|| Error::IndexOutOfRange {
            part: part.name().to_string(),
            position,
            segments: segments.len(),
        })
}

/// Заменяет символы, недопустимые в сегменте пространства имен, на `_`.
pub fn sanitize(value: &str) -> String {
    let sanitized: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Шаблон запрашиваемого пространства имен.
///
/// Сегменты разделены `/`, `*` соответствует ровно одному сегменту.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePattern {
    segments: Vec<String>,
}

impl NamespacePattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim().trim_matches(NAMESPACE_SEPARATOR);
        if trimmed.is_empty() {
            return Err(Error::Config(format!(
                "Пустой шаблон пространства имен '{}'",
                pattern
            )));
        }

        Ok(Self {
            segments: trimmed
                .split(NAMESPACE_SEPARATOR)
                .map(str::to_string)
                .collect(),
        })
    }

    /// Шаблон, под который попадает любая метрика с таким числом сегментов.
    pub fn any(len: usize) -> Self {
        Self {
            segments: vec![DYNAMIC_ELEMENT.to_string(); len],
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Сопоставление с шаблоном метрики, где `*` стоит на месте
    /// динамических элементов. `*` с любой стороны совпадает с одним
    /// сегментом.
    pub fn matches_template<S: AsRef<str>>(&self, template: &[S]) -> bool {
        self.segments.len() == template.len()
            && self.segments.iter().zip(template).all(|(p, t)| {
                let t = t.as_ref();
                p == DYNAMIC_ELEMENT || t == DYNAMIC_ELEMENT || p == t
            })
    }

    /// Сопоставление с уже разрешенным пространством имен.
    pub fn matches_segments<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        self.segments.len() == segments.len()
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(p, s)| p == DYNAMIC_ELEMENT || p == s.as_ref())
    }
}

impl fmt::Display for NamespacePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_namespace(&self.segments))
    }
}
