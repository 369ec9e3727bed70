use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::collector::types::{MetricDefinition, Mode, NamespacePart};
use crate::collector::MetricCatalog;
use crate::error::{Error, Result};
use crate::snmp::parse_oid;

const SOURCE_STRING: &str = "string";
const SOURCE_SNMP: &str = "snmp";
const SOURCE_INDEX: &str = "index";

/// Элемент пространства имен как он записан в файле.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceEntry {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub string: String,
    #[serde(default, rename = "OID")]
    pub oid: String,
    pub oid_part: Option<usize>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Описание метрики как оно записано в файле.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricEntry {
    #[serde(default, rename = "OID")]
    pub oid: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub namespace: Vec<NamespaceEntry>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    pub scale: Option<f64>,
    pub shift: Option<f64>,
}

/// Профиль: проверенные описания метрик из одного файла.
#[derive(Debug, Clone)]
pub struct Profile {
    pub metrics: Vec<MetricDefinition>,
}

impl Profile {
    /// Загружает файл описания метрик. `.json` читается как JSON,
    /// остальные файлы как YAML.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать файл: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let profile = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };

        profile.with_context(|| format!("Некорректный файл описания метрик {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        ensure_not_empty(content)?;
        let entries: Vec<MetricEntry> = serde_json::from_str(content).map_err(|e| {
            Error::Config(format!("Не удалось распарсить JSON: {}", e))
        })?;
        Self::from_entries(entries)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        ensure_not_empty(content)?;
        let entries: Vec<MetricEntry> = serde_yml::from_str(content).map_err(|e| {
            Error::Config(format!("Не удалось распарсить YAML: {}", e))
        })?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<MetricEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config("Файл описания метрик пуст".to_string()));
        }

        let metrics = entries
            .iter()
            .map(MetricEntry::validate)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { metrics })
    }

    pub fn into_catalog(self) -> MetricCatalog {
        MetricCatalog::new(self.metrics)
    }
}

fn ensure_not_empty(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::Config("Файл описания метрик пуст".to_string()));
    }
    Ok(())
}

fn missing(parameter: &str) -> Error {
    Error::Config(format!(
        "Не задан обязательный параметр конфигурации ({})",
        parameter
    ))
}

fn missing_in_namespace(parameter: &str) -> Error {
    Error::Config(format!(
        "Не найден параметр `{}` в элементе пространства имен",
        parameter
    ))
}

impl MetricEntry {
    /// Проверяет описание и подставляет значения по умолчанию.
    pub fn validate(&self) -> Result<MetricDefinition> {
        if self.namespace.is_empty() {
            return Err(missing("namespace"));
        }
        let namespace = self
            .namespace
            .iter()
            .map(NamespaceEntry::validate)
            .collect::<Result<Vec<_>>>()?;

        if self.oid.trim().is_empty() {
            return Err(missing("OID"));
        }
        let oid = parse_oid(&self.oid)?;

        let mode = if self.mode.is_empty() {
            Mode::default()
        } else {
            self.mode.parse()?
        };

        Ok(MetricDefinition::new(oid, mode, namespace)?
            .with_unit(self.unit.clone())
            .with_description(self.description.clone())
            .with_scale(self.scale.unwrap_or(1.0), self.shift.unwrap_or(0.0)))
    }
}

impl NamespaceEntry {
    pub fn validate(&self) -> Result<NamespacePart> {
        match self.source.as_str() {
            SOURCE_STRING => {
                if self.string.is_empty() {
                    return Err(missing_in_namespace("string"));
                }
                Ok(NamespacePart::Literal(self.string.clone()))
            }
            SOURCE_SNMP => {
                if self.oid.is_empty() {
                    return Err(missing_in_namespace("OID"));
                }
                let (name, description) = self.name_and_description()?;
                Ok(NamespacePart::Protocol {
                    oid: parse_oid(&self.oid)?,
                    name,
                    description,
                })
            }
            SOURCE_INDEX => {
                let position = self.oid_part.ok_or_else(|| missing_in_namespace("oid_part"))?;
                let (name, description) = self.name_and_description()?;
                Ok(NamespacePart::Index {
                    position,
                    name,
                    description,
                })
            }
            other => Err(Error::Config(format!(
                "Некорректное значение `source` ({}) в элементе пространства имен, допустимые варианты: {:?}",
                other,
                [SOURCE_STRING, SOURCE_SNMP, SOURCE_INDEX]
            ))),
        }
    }

    fn name_and_description(&self) -> Result<(String, String)> {
        if self.name.is_empty() {
            return Err(missing_in_namespace("name"));
        }
        if self.description.is_empty() {
            return Err(missing_in_namespace("description"));
        }
        Ok((self.name.clone(), self.description.clone()))
    }
}
