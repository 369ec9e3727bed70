use serde::Deserialize;

use crate::config::AgentSettings;

/// Запрос сбора по HTTP
#[derive(Debug, Deserialize)]
pub struct CollectRequest {
    pub agent: AgentSettings,
    /// Шаблоны пространств имен; пусто значит все метрики
    #[serde(default)]
    pub namespaces: Vec<String>,
}
