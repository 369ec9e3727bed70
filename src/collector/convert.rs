use tracing::warn;

use super::types::MetricValue;
use crate::error::{Error, Result};
use crate::snmp::SnmpType;

/// Приводит текст значения к типу метрики по SNMP типу.
///
/// Числовой текст, который не разбирается, дает ошибку; нулем такое
/// значение не подменяется.
pub fn convert(text: &str, kind: &SnmpType) -> Result<MetricValue> {
    let failed = || Error::Conversion {
        text: text.to_string(),
        type_tag: kind.to_string(),
    };

    match kind {
        SnmpType::Counter32 | SnmpType::Gauge32 | SnmpType::TimeTicks => text
            .trim()
            .parse::<u32>()
            .map(MetricValue::Unsigned32)
            .map_err(|_| failed()),
        SnmpType::Counter64 => text
            .trim()
            .parse::<u64>()
            .map(MetricValue::Unsigned64)
            .map_err(|_| failed()),
        SnmpType::Integer => text
            .trim()
            .parse::<i32>()
            .map(MetricValue::Signed32)
            .map_err(|_| failed()),
        SnmpType::OctetString | SnmpType::IpAddress | SnmpType::ObjectIdentifier => {
            Ok(MetricValue::Text(text.to_string()))
        }
        other => {
            warn!(data = %text, kind = %other, "неизвестный тип данных, значение возвращается строкой");
            Ok(MetricValue::Text(text.to_string()))
        }
    }
}

/// Применяет `value * scale + shift` к числовому значению.
///
/// При `scale == 1.0` и `shift == 0.0` значение возвращается как есть,
/// с исходным вариантом. Текст не масштабируется.
pub fn apply_scale(value: MetricValue, scale: f64, shift: f64) -> MetricValue {
    if scale == 1.0 && shift == 0.0 {
        return value;
    }

    let number = match value {
        MetricValue::Unsigned32(v) => f64::from(v),
        MetricValue::Unsigned64(v) => v as f64,
        MetricValue::Signed32(v) => f64::from(v),
        MetricValue::Signed64(v) => v as f64,
        MetricValue::Float(v) => v,
        MetricValue::Text(_) => return value,
    };

    MetricValue::Float(number * scale + shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_numeric_types() {
        assert_eq!(
            convert("100", &SnmpType::Counter32).unwrap(),
            MetricValue::Unsigned32(100)
        );
        assert_eq!(
            convert("4294967295", &SnmpType::Gauge32).unwrap(),
            MetricValue::Unsigned32(u32::MAX)
        );
        assert_eq!(
            convert("8589934592", &SnmpType::Counter64).unwrap(),
            MetricValue::Unsigned64(8_589_934_592)
        );
        assert_eq!(
            convert("-42", &SnmpType::Integer).unwrap(),
            MetricValue::Signed32(-42)
        );
    }

    #[test]
    fn test_convert_text_types() {
        assert_eq!(
            convert("eth0", &SnmpType::OctetString).unwrap(),
            MetricValue::Text("eth0".to_string())
        );
        assert_eq!(
            convert("10.0.0.1", &SnmpType::IpAddress).unwrap(),
            MetricValue::Text("10.0.0.1".to_string())
        );
        // неизвестный тип не ошибка
        assert_eq!(
            convert("\u{1}\u{2}", &SnmpType::Opaque).unwrap(),
            MetricValue::Text("\u{1}\u{2}".to_string())
        );
    }

    #[test]
    fn test_convert_failure_names_text_and_type() {
        let err = convert("abc", &SnmpType::Counter32).unwrap_err();
        match err {
            Error::Conversion { text, type_tag } => {
                assert_eq!(text, "abc");
                assert_eq!(type_tag, "Counter32");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // переполнение 32 бит тоже ошибка
        assert!(convert("4294967296", &SnmpType::Counter32).is_err());
        assert!(convert("", &SnmpType::Integer).is_err());
    }

    #[test]
    fn test_scale_and_shift() {
        let value = convert("100", &SnmpType::Counter32).unwrap();
        assert_eq!(apply_scale(value, 1.25, 2.0), MetricValue::Float(127.0));

        assert_eq!(
            apply_scale(MetricValue::Signed32(-10), 0.5, 0.0),
            MetricValue::Float(-5.0)
        );
        assert_eq!(
            apply_scale(MetricValue::Unsigned64(10), 1.0, 1.0),
            MetricValue::Float(11.0)
        );
    }

    #[test]
    fn test_identity_scale_keeps_variant() {
        let values = [
            MetricValue::Unsigned32(7),
            MetricValue::Unsigned64(7),
            MetricValue::Signed32(-7),
            MetricValue::Signed64(-7),
            MetricValue::Text("7".to_string()),
        ];
        for value in values {
            assert_eq!(apply_scale(value.clone(), 1.0, 0.0), value);
        }
    }

    #[test]
    fn test_text_never_scaled() {
        let text = MetricValue::Text("up".to_string());
        assert_eq!(apply_scale(text.clone(), 2.0, 3.0), text);
    }
}
