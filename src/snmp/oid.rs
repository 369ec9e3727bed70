use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use snmp2::Oid;

use crate::error::{Error, Result};

/// Владеющий OID: последовательность числовых элементов.
///
/// Строковая форма всегда без ведущей точки: `1.3.6.1.2.1.1.3.0`.
/// При разборе ведущие и замыкающие точки отбрасываются.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ObjectId(Vec<u64>);

impl ObjectId {
    pub fn new(parts: Vec<u64>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[u64] {
        &self.0
    }

    /// Количество элементов OID.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Лежит ли OID в поддереве `prefix` (включая сам `prefix`).
    pub fn starts_with(&self, prefix: &ObjectId) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Элементы OID в текстовом виде, как они идут в точечной записи.
    pub fn segments(&self) -> Vec<String> {
        self.0.iter().map(|p| p.to_string()).collect()
    }

    /// Конвертирует в `snmp2::Oid` для отправки запроса.
    pub fn to_snmp(&self) -> Result<Oid<'static>> {
        Oid::from(&self.0).map_err(|e| Error::InvalidOid(format!("{}: {:?}", self, e)))
    }

    /// Строит владеющий OID из ответа `snmp2`.
    pub fn from_snmp(oid: &Oid<'_>) -> Result<Self> {
        oid.to_string().parse()
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_matches('.');
        if trimmed.is_empty() {
            return Err(Error::InvalidOid(s.to_string()));
        }

        let parts: std::result::Result<Vec<u64>, _> =
            trimmed.split('.').map(|p| p.parse::<u64>()).collect();

        parts
            .map(ObjectId)
            .map_err(|e| Error::InvalidOid(format!("{}: {}", s, e)))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Лексикографический порядок по числовым элементам, как у get-next.
impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Парсит строку OID, допускает ведущую точку.
pub fn parse_oid(s: &str) -> Result<ObjectId> {
    s.parse()
}
