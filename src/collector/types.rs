use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snmp::ObjectId;

/// Первые элементы пространства имен любой метрики.
pub const NAMESPACE_PREFIX: [&str; 2] = ["klassen", "snmp"];

pub const NAMESPACE_SEPARATOR: char = '/';

/// Отображение динамического элемента в шаблоне пространства имен.
pub const DYNAMIC_ELEMENT: &str = "*";

pub const TAG_AGENT_NAME: &str = "snmp_agent_name";
pub const TAG_AGENT_ADDRESS: &str = "snmp_agent_address";
pub const TAG_OID: &str = "oid";

/// Режим обхода дерева MIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Один GET
    #[default]
    Single,
    /// GET-NEXT по всему поддереву
    Walk,
    /// GET-NEXT только по прямым потомкам
    Table,
}

impl Mode {
    pub const OPTIONS: [&'static str; 3] = ["single", "walk", "table"];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Single => write!(f, "single"),
            Mode::Walk => write!(f, "walk"),
            Mode::Table => write!(f, "table"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Mode::Single),
            "walk" => Ok(Mode::Walk),
            "table" => Ok(Mode::Table),
            _ => Err(Error::Config(format!(
                "Некорректное значение '{}' параметра mode, допустимые варианты: {:?}",
                s,
                Mode::OPTIONS
            ))),
        }
    }
}

/// Элемент пространства имен метрики.
#[derive(Debug, Clone, PartialEq)]
pub enum NamespacePart {
    /// Фиксированная строка
    Literal(String),
    /// Значение берется отдельным обходом своего OID
    Protocol {
        oid: ObjectId,
        name: String,
        description: String,
    },
    /// Значение берется из элемента OID каждого результата (с нуля)
    Index {
        position: usize,
        name: String,
        description: String,
    },
}

impl NamespacePart {
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, NamespacePart::Literal(_))
    }

    /// Имя для сообщений об ошибках и для описания динамических элементов.
    pub fn name(&self) -> &str {
        match self {
            NamespacePart::Literal(value) => value,
            NamespacePart::Protocol { name, .. } | NamespacePart::Index { name, .. } => name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            NamespacePart::Literal(_) => None,
            NamespacePart::Protocol { description, .. }
            | NamespacePart::Index { description, .. } => Some(description),
        }
    }

    /// Сегмент шаблона: литерал как есть, динамический элемент как `*`.
    pub fn template_segment(&self) -> &str {
        match self {
            NamespacePart::Literal(value) => value,
            _ => DYNAMIC_ELEMENT,
        }
    }
}

/// Описание метрики. После загрузки не меняется.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub oid: ObjectId,
    pub mode: Mode,
    pub namespace: Vec<NamespacePart>,
    pub unit: String,
    pub description: String,
    pub scale: f64,
    pub shift: f64,
}

impl MetricDefinition {
    /// Последний элемент пространства имен обязан быть литералом.
    pub fn new(oid: ObjectId, mode: Mode, namespace: Vec<NamespacePart>) -> Result<Self> {
        match namespace.last() {
            None => {
                return Err(Error::Config(
                    "Отсутствует конфигурация пространства имен".to_string(),
                ));
            }
            Some(last) if last.is_dynamic() => {
                return Err(Error::Config(
                    "Последний элемент пространства имен должен иметь source `string`"
                        .to_string(),
                ));
            }
            Some(_) => {}
        }

        Ok(Self {
            oid,
            mode,
            namespace,
            unit: String::new(),
            description: String::new(),
            scale: 1.0,
            shift: 0.0,
        })
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_scale(mut self, scale: f64, shift: f64) -> Self {
        self.scale = scale;
        self.shift = shift;
        self
    }

    /// Шаблон пространства имен: префикс и элементы, динамические как `*`.
    pub fn template(&self) -> Vec<String> {
        NAMESPACE_PREFIX
            .iter()
            .copied()
            .chain(self.namespace.iter().map(NamespacePart::template_segment))
            .map(str::to_string)
            .collect()
    }

    /// Ключ метрики в каталоге, например `/klassen/snmp/if/*/octets`.
    pub fn key(&self) -> String {
        join_namespace(&self.template())
    }
}

/// Склеивает сегменты в строку с ведущим разделителем.
pub fn join_namespace<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push(NAMESPACE_SEPARATOR);
        out.push_str(segment.as_ref());
    }
    out
}

/// Значение метрики после конвертации и масштабирования.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Unsigned32(u32),
    Unsigned64(u64),
    Signed32(i32),
    Signed64(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Unsigned32(v) => write!(f, "{}", v),
            MetricValue::Unsigned64(v) => write!(f, "{}", v),
            MetricValue::Signed32(v) => write!(f, "{}", v),
            MetricValue::Signed64(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

/// Один элемент итогового пространства имен.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespaceElement {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NamespaceElement {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            name: None,
            description: None,
        }
    }

    pub fn dynamic(part: &NamespacePart, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            name: Some(part.name().to_string()),
            description: part.description().map(str::to_string),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.name.is_some()
    }

    /// Элементы шаблона метрики, динамические со значением `*`.
    pub fn template(metric: &MetricDefinition) -> Vec<Self> {
        NAMESPACE_PREFIX
            .iter()
            .map(|s| Self::literal(*s))
            .chain(metric.namespace.iter().map(|part| match part {
                NamespacePart::Literal(value) => Self::literal(value.clone()),
                dynamic => Self::dynamic(dynamic, DYNAMIC_ELEMENT),
            }))
            .collect()
    }
}

/// Собранное значение одной метрики.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedValue {
    pub namespace: Vec<NamespaceElement>,
    pub value: MetricValue,
    pub oid: ObjectId,
    pub unit: String,
    pub description: String,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl CollectedValue {
    pub fn segments(&self) -> Vec<&str> {
        self.namespace.iter().map(|e| e.value.as_str()).collect()
    }

    pub fn namespace_string(&self) -> String {
        join_namespace(&self.segments())
    }
}
