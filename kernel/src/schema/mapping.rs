//! Mapping of hive column types onto engine types, with a bounded leaf column budget.

use tracing::debug;

use super::type_info::{PrimitiveTypeInfo, TypeInfo};
use super::{DataType, PrimitiveType, StructField};
use crate::utils::require;
use crate::{Error, HiveResult};

/// The widest decimal the engine can represent
pub const MAX_DECIMAL_PRECISION: u32 = 38;

/// Maps hive columns onto engine fields, counting the leaf columns of everything it maps. Data
/// columns and partition columns are meant to go through the same mapper so they share one budget.
#[derive(Debug)]
pub struct TypeMapper {
    max_leaf_columns: usize,
    leaf_count: usize,
}

impl TypeMapper {
    pub fn new(max_leaf_columns: usize) -> Self {
        Self {
            max_leaf_columns,
            leaf_count: 0,
        }
    }

    /// The number of leaf columns mapped so far.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Map a hive column to an engine field. Returns `Ok(None)` if the engine cannot represent the
    /// column's type, in which case the column should be skipped. Fails with
    /// [`Error::ColumnCountTooLarge`] once more leaf columns were mapped than the budget allows.
    pub fn map_field(&mut self, name: &str, type_info: &TypeInfo) -> HiveResult<Option<StructField>> {
        let Some(data_type) = map_type(type_info) else {
            debug!("Skipping column {name} of unsupported type {type_info}");
            return Ok(None);
        };
        self.leaf_count += data_type.leaf_count();
        require!(
            self.leaf_count <= self.max_leaf_columns,
            Error::ColumnCountTooLarge(self.max_leaf_columns)
        );
        Ok(Some(StructField::nullable(name, data_type)))
    }

    /// Parse `type_string` and map it, see [`TypeMapper::map_field`].
    pub fn map_column(&mut self, name: &str, type_string: &str) -> HiveResult<Option<StructField>> {
        let type_info: TypeInfo = type_string.parse()?;
        self.map_field(name, &type_info)
    }
}

fn map_type(type_info: &TypeInfo) -> Option<DataType> {
    match type_info {
        TypeInfo::Primitive(ptype) => map_primitive(ptype).map(DataType::Primitive),
        TypeInfo::List(element) => map_type(element).map(DataType::array),
        TypeInfo::Struct(fields) => {
            let children = fields
                .iter()
                .map(|(name, child)| map_type(child).map(|t| StructField::nullable(name, t)))
                .collect::<Option<Vec<_>>>()?;
            Some(DataType::struct_type(children))
        }
        TypeInfo::Map(_, _) | TypeInfo::Union(_) => None,
    }
}

fn map_primitive(ptype: &PrimitiveTypeInfo) -> Option<PrimitiveType> {
    let mapped = match ptype {
        PrimitiveTypeInfo::Boolean => PrimitiveType::Boolean,
        PrimitiveTypeInfo::Byte | PrimitiveTypeInfo::Short | PrimitiveTypeInfo::Int => {
            PrimitiveType::Integer
        }
        PrimitiveTypeInfo::Long => PrimitiveType::Long,
        PrimitiveTypeInfo::Float => PrimitiveType::Float,
        PrimitiveTypeInfo::Double => PrimitiveType::Double,
        PrimitiveTypeInfo::String | PrimitiveTypeInfo::Varchar(_) | PrimitiveTypeInfo::Char(_) => {
            PrimitiveType::String
        }
        PrimitiveTypeInfo::Binary => PrimitiveType::Binary,
        PrimitiveTypeInfo::Date => PrimitiveType::Date,
        PrimitiveTypeInfo::Timestamp => PrimitiveType::Timestamp,
        PrimitiveTypeInfo::Decimal { precision, scale } => {
            if *precision > MAX_DECIMAL_PRECISION {
                return None;
            }
            PrimitiveType::Decimal {
                precision: u8::try_from(*precision).ok()?,
                scale: u8::try_from(*scale).ok()?,
            }
        }
        PrimitiveTypeInfo::Void
        | PrimitiveTypeInfo::IntervalYearMonth
        | PrimitiveTypeInfo::IntervalDayTime => return None,
    };
    Some(mapped)
}
