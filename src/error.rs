use crate::collector::types::Mode;

/// Ошибки движка сбора SNMP.
///
/// Варианты соответствуют областям действия ошибки: конфигурация и
/// подключение валят весь запрос, обход и разрешение пространства имен
/// относятся к одной метрике, конвертация к одному значению.
///
/// ```rust
/// use snmp_collector::error::Error;
///
/// let err = Error::CountMismatch {
///     part: "ifName".to_string(),
///     expected: 3,
///     actual: 2,
/// };
/// assert!(err.to_string().contains("3"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Отсутствующий или некорректный параметр конфигурации.
    #[error("Ошибка конфигурации: {0}")]
    Config(String),

    /// Не удалось открыть сессию с агентом.
    #[error("Не удалось подключиться к SNMP агенту {address}: {reason}")]
    Connection { address: String, reason: String },

    /// Агент ответил ненулевым error-status.
    #[error("SNMP агент вернул ошибку для {oid}: error-status={status}")]
    Agent { oid: String, status: u32 },

    /// Сетевая ошибка или ошибка транспорта.
    #[error("Ошибка транспорта для {oid}: {reason}")]
    Transport { oid: String, reason: String },

    /// Агент не ответил за отведенное время (с учетом повторов).
    #[error("Таймаут запроса {oid} после {retries} повторов")]
    Timeout { oid: String, retries: u32 },

    /// Сессия была закрыта пулом.
    #[error("Сессия с {address} закрыта")]
    SessionClosed { address: String },

    #[error("Невалидный OID: {0}")]
    InvalidOid(String),

    /// Ошибка обхода дерева, обернутая OID и режимом.
    #[error("Обход {oid} в режиме {mode} не удался: {source}")]
    Traversal {
        oid: String,
        mode: Mode,
        #[source]
        source: Box<Error>,
    },

    /// Число динамических значений не совпадает с числом результатов.
    #[error(
        "Элемент пространства имен '{part}': ожидалось {expected} значений, получено {actual}"
    )]
    CountMismatch {
        part: String,
        expected: usize,
        actual: usize,
    },

    /// Позиция `oid_part` выходит за пределы OID результата.
    #[error(
        "Элемент пространства имен '{part}': oid_part={position} вне OID из {segments} элементов"
    )]
    IndexOutOfRange {
        part: String,
        position: usize,
        segments: usize,
    },

    /// Текст не разбирается как число указанного SNMP типа.
    #[error("Не удалось преобразовать '{text}' в {type_tag}")]
    Conversion { text: String, type_tag: String },

    /// Запрошенное пространство имен не покрывается ни одной метрикой.
    #[error("Пространство имен '{0}' не поддерживается")]
    UnsupportedNamespace(String),
}

impl Error {
    /// Ошибки, которые валят весь запрос сбора, а не одну метрику.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Connection { .. } | Error::UnsupportedNamespace(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
