//! Typed partition values, decoded from the string encoded key values the metastore stores for
//! every partition.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schema::mapping::MAX_DECIMAL_PRECISION;
use crate::schema::type_info::{PrimitiveTypeInfo, TypeInfo};
use crate::{Error, HiveResult};

/// The value hive writes for a partition whose key is null
pub const DEFAULT_PARTITION_NAME: &str = "__HIVE_DEFAULT_PARTITION__";

/// Width of the two's complement encoding of a decimal's unscaled value
pub const DECIMAL_BYTE_WIDTH: usize = 16;

/// The value of one partition column for one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionValue {
    pub column: String,
    /// `None` for the default (null) partition
    pub value: Option<PartitionValueData>,
}

impl PartitionValue {
    pub fn new(column: impl Into<String>, value: PartitionValueData) -> Self {
        Self {
            column: column.into(),
            value: Some(value),
        }
    }

    pub fn unset(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: None,
        }
    }
}

/// Payload of a [`PartitionValue`]. Dates and timestamps are carried as milliseconds since the
/// epoch in a `Long`; decimals as the 16 byte big-endian two's complement of their unscaled value in
/// a `Binary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartitionValueData {
    Bit(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
}

/// Decode the raw value `raw` of partition column `column`, declared as `type_info`.
pub fn decode_partition_value(
    column: &str,
    type_info: &TypeInfo,
    raw: &str,
) -> HiveResult<PartitionValue> {
    if raw == DEFAULT_PARTITION_NAME {
        return Ok(PartitionValue::unset(column));
    }
    let ptype = match type_info {
        TypeInfo::Primitive(ptype) => ptype,
        other => return Err(Error::unsupported_data_type(other.category())),
    };
    let invalid = |reason: &dyn std::fmt::Display| {
        Error::invalid_partition_value(column, raw, reason.to_string())
    };
    let data = match ptype {
        PrimitiveTypeInfo::Binary => PartitionValueData::Binary(raw.as_bytes().to_vec()),
        PrimitiveTypeInfo::Boolean => PartitionValueData::Bit(raw.eq_ignore_ascii_case("true")),
        PrimitiveTypeInfo::Double => {
            PartitionValueData::Double(raw.trim().parse().map_err(|e| invalid(&e))?)
        }
        PrimitiveTypeInfo::Float => {
            PartitionValueData::Float(raw.trim().parse().map_err(|e| invalid(&e))?)
        }
        PrimitiveTypeInfo::Byte | PrimitiveTypeInfo::Short | PrimitiveTypeInfo::Int => {
            PartitionValueData::Int(raw.parse().map_err(|e| invalid(&e))?)
        }
        PrimitiveTypeInfo::Long => PartitionValueData::Long(raw.parse().map_err(|e| invalid(&e))?),
        PrimitiveTypeInfo::String | PrimitiveTypeInfo::Varchar(_) => {
            PartitionValueData::String(raw.to_string())
        }
        PrimitiveTypeInfo::Char(_) => PartitionValueData::String(raw.trim().to_string()),
        PrimitiveTypeInfo::Timestamp => {
            PartitionValueData::Long(timestamp_millis(raw).map_err(|e| invalid(&e))?)
        }
        PrimitiveTypeInfo::Date => {
            PartitionValueData::Long(date_millis(raw).map_err(|e| invalid(&e))?)
        }
        PrimitiveTypeInfo::Decimal { precision, scale } => {
            PartitionValueData::Binary(encode_decimal(column, raw, *precision, *scale)?)
        }
        other => return Err(Error::unsupported_data_type(other.category())),
    };
    Ok(PartitionValue::new(column, data))
}

/// Millis since the epoch of a JDBC formatted date, `yyyy-mm-dd`, taken as UTC midnight.
fn date_millis(raw: &str) -> Result<i64, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?;
    Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

/// Millis since the epoch of a JDBC formatted timestamp, `yyyy-mm-dd hh:mm:ss[.fffffffff]`,
/// taken as UTC.
fn timestamp_millis(raw: &str) -> Result<i64, chrono::ParseError> {
    let ts = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S%.f")?;
    Ok(ts.and_utc().timestamp_millis())
}

/// Encode a decimal partition value for a `decimal(precision, scale)` column: the value is rounded
/// half up to `scale` digits and its unscaled value written as sign extended, big-endian two's
/// complement of [`DECIMAL_BYTE_WIDTH`] bytes.
pub fn encode_decimal(column: &str, raw: &str, precision: u32, scale: u32) -> HiveResult<Vec<u8>> {
    if precision > MAX_DECIMAL_PRECISION {
        return Err(Error::UnsupportedDecimalPrecision(precision));
    }
    let parsed = BigDecimal::from_str(raw.trim())
        .map_err(|e| Error::invalid_partition_value(column, raw, e))?;
    let rounded = parsed.with_scale_round(i64::from(scale), RoundingMode::HalfUp);
    let (unscaled, _) = rounded.as_bigint_and_exponent();
    // the unscaled value of a zero still has one digit
    let digits = BigDecimal::from(unscaled.clone()).digits();
    if digits > u64::from(precision) {
        return Err(Error::invalid_partition_value(
            column,
            raw,
            format!("value does not fit decimal({precision},{scale})"),
        ));
    }
    sign_extend(&unscaled.to_signed_bytes_be()).ok_or_else(|| {
        Error::invalid_partition_value(
            column,
            raw,
            format!("unscaled value wider than {DECIMAL_BYTE_WIDTH} bytes"),
        )
    })
}

/// Sign extend a big-endian two's complement integer to [`DECIMAL_BYTE_WIDTH`] bytes.
fn sign_extend(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() > DECIMAL_BYTE_WIDTH {
        return None;
    }
    let fill = match bytes.first() {
        Some(b) if b & 0x80 != 0 => 0xFF,
        _ => 0x00,
    };
    let mut out = vec![fill; DECIMAL_BYTE_WIDTH - bytes.len()];
    out.extend_from_slice(bytes);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(type_string: &str, raw: &str) -> HiveResult<PartitionValue> {
        decode_partition_value("p", &type_string.parse().unwrap(), raw)
    }

    fn data(type_string: &str, raw: &str) -> PartitionValueData {
        decode(type_string, raw).unwrap().value.unwrap()
    }

    #[test]
    fn default_partition_is_unset() {
        for type_string in ["int", "string", "decimal(10,2)", "date"] {
            assert_eq!(
                decode(type_string, DEFAULT_PARTITION_NAME).unwrap(),
                PartitionValue::unset("p")
            );
        }
    }

    #[test]
    fn decode_primitives() {
        assert_eq!(data("boolean", "TRUE"), PartitionValueData::Bit(true));
        assert_eq!(data("boolean", "yes"), PartitionValueData::Bit(false));
        assert_eq!(data("tinyint", "-3"), PartitionValueData::Int(-3));
        assert_eq!(data("int", "42"), PartitionValueData::Int(42));
        assert_eq!(
            data("bigint", "9000000000"),
            PartitionValueData::Long(9_000_000_000)
        );
        assert_eq!(data("double", "1.5"), PartitionValueData::Double(1.5));
        assert_eq!(data("float", "0.25"), PartitionValueData::Float(0.25));
        assert_eq!(
            data("varchar(10)", " a "),
            PartitionValueData::String(" a ".to_string())
        );
        assert_eq!(
            data("char(5)", "ab   "),
            PartitionValueData::String("ab".to_string())
        );
        assert_eq!(
            data("binary", "ab"),
            PartitionValueData::Binary(b"ab".to_vec())
        );
    }

    #[test]
    fn decode_dates_and_timestamps() {
        assert_eq!(data("date", "1970-01-02"), PartitionValueData::Long(86_400_000));
        assert_eq!(
            data("timestamp", "1970-01-01 00:00:01.5"),
            PartitionValueData::Long(1_500)
        );
        assert_eq!(
            data("timestamp", "2020-02-29 12:00:00"),
            PartitionValueData::Long(1_582_977_600_000)
        );
        assert!(matches!(
            decode("date", "yesterday"),
            Err(Error::InvalidPartitionValue { .. })
        ));
    }

    #[test]
    fn decode_decimals() {
        assert_eq!(
            data("decimal(10,0)", "-1"),
            PartitionValueData::Binary(vec![0xFF; 16])
        );
        let mut expected = vec![0u8; 16];
        expected[15] = 0x7B;
        assert_eq!(
            data("decimal(5,2)", "1.23"),
            PartitionValueData::Binary(expected.clone())
        );
        // rounded half up to the declared scale
        assert_eq!(
            data("decimal(5,2)", "1.225"),
            PartitionValueData::Binary(expected)
        );
        // trailing zeros are kept by the declared scale
        let mut hundred = vec![0u8; 16];
        hundred[15] = 100;
        assert_eq!(
            data("decimal(5,2)", "1"),
            PartitionValueData::Binary(hundred)
        );
        let widest = "9".repeat(38);
        let PartitionValueData::Binary(bytes) = data("decimal(38,0)", &widest) else {
            panic!("expected binary");
        };
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 0x4B);
    }

    #[test]
    fn decimal_errors() {
        assert!(matches!(
            encode_decimal("p", "1", 39, 0),
            Err(Error::UnsupportedDecimalPrecision(39))
        ));
        assert!(matches!(
            decode("decimal(3,1)", "123.4"),
            Err(Error::InvalidPartitionValue { .. })
        ));
        assert!(matches!(
            decode("decimal(3,1)", "abc"),
            Err(Error::InvalidPartitionValue { .. })
        ));
    }

    #[test]
    fn unsupported_types() {
        let err = decode("array<int>", "1").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported Hive data type LIST.");
        let err = decode("interval_year_month", "1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported Hive data type INTERVAL_YEAR_MONTH."
        );
        assert!(matches!(
            decode("int", "one"),
            Err(Error::InvalidPartitionValue { .. })
        ));
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(&[0x80]).unwrap()[..15], [0xFF; 15]);
        assert_eq!(sign_extend(&[0x7F]).unwrap()[..15], [0x00; 15]);
        assert_eq!(sign_extend(&[]).unwrap(), vec![0u8; 16]);
        assert!(sign_extend(&[0; 17]).is_none());
    }
}
