//! Definitions and functions to create and manipulate the engine side schema of a dataset.
//!
//! Hive column types are parsed into [`type_info::TypeInfo`] and then mapped onto the types the
//! engine understands by [`mapping::TypeMapper`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub mod mapping;
pub mod type_info;

pub use mapping::TypeMapper;
pub use type_info::{PrimitiveTypeInfo, TypeInfo};

pub type Schema = StructType;
pub type SchemaRef = std::sync::Arc<StructType>;

/// Engine primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveType {
    Boolean,
    /// 32bit integer. Hive `tinyint` and `smallint` widen to it.
    Integer,
    Long,
    Float,
    Double,
    String,
    Binary,
    Date,
    /// Microsecond precision timestamp without a time zone
    Timestamp,
    Decimal { precision: u8, scale: u8 },
}

impl Display for PrimitiveType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::Binary => write!(f, "binary"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayType {
    pub element_type: DataType,
    pub contains_null: bool,
}

impl ArrayType {
    pub fn new(element_type: DataType, contains_null: bool) -> Self {
        Self {
            element_type,
            contains_null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataType {
    Primitive(PrimitiveType),
    Array(Box<ArrayType>),
    Struct(Box<StructType>),
}

impl DataType {
    pub const BOOLEAN: Self = DataType::Primitive(PrimitiveType::Boolean);
    pub const INTEGER: Self = DataType::Primitive(PrimitiveType::Integer);
    pub const LONG: Self = DataType::Primitive(PrimitiveType::Long);
    pub const FLOAT: Self = DataType::Primitive(PrimitiveType::Float);
    pub const DOUBLE: Self = DataType::Primitive(PrimitiveType::Double);
    pub const STRING: Self = DataType::Primitive(PrimitiveType::String);
    pub const BINARY: Self = DataType::Primitive(PrimitiveType::Binary);
    pub const DATE: Self = DataType::Primitive(PrimitiveType::Date);
    pub const TIMESTAMP: Self = DataType::Primitive(PrimitiveType::Timestamp);

    pub fn decimal(precision: u8, scale: u8) -> Self {
        DataType::Primitive(PrimitiveType::Decimal { precision, scale })
    }

    pub fn array(element_type: DataType) -> Self {
        DataType::Array(Box::new(ArrayType::new(element_type, true)))
    }

    pub fn struct_type(fields: impl IntoIterator<Item = StructField>) -> Self {
        DataType::Struct(Box::new(StructType::new(fields)))
    }

    /// The number of leaf (primitive) columns in this type. Arrays count the leaves of their
    /// element type; structs the leaves of all their fields.
    pub fn leaf_count(&self) -> usize {
        match self {
            DataType::Primitive(_) => 1,
            DataType::Array(array) => array.element_type.leaf_count(),
            DataType::Struct(st) => st.leaf_count(),
        }
    }

    /// Estimated in-memory size of one value of this type. `list_size` is the assumed number of
    /// elements of an array, `var_field_size` the assumed width of a string or binary value.
    pub fn estimated_size(&self, list_size: usize, var_field_size: usize) -> usize {
        match self {
            DataType::Primitive(ptype) => match ptype {
                PrimitiveType::Boolean => 1,
                PrimitiveType::Integer | PrimitiveType::Float => 4,
                PrimitiveType::Long
                | PrimitiveType::Double
                | PrimitiveType::Date
                | PrimitiveType::Timestamp => 8,
                PrimitiveType::Decimal { .. } => 16,
                PrimitiveType::String | PrimitiveType::Binary => var_field_size,
            },
            DataType::Array(array) => list_size.saturating_mul(
                array
                    .element_type
                    .estimated_size(list_size, var_field_size),
            ),
            DataType::Struct(st) => st.estimated_size(list_size, var_field_size),
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Primitive(ptype) => write!(f, "{ptype}"),
            DataType::Array(array) => write!(f, "array<{}>", array.element_type),
            DataType::Struct(st) => {
                write!(f, "struct<")?;
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, ">")
            }
        }
    }
}

impl From<PrimitiveType> for DataType {
    fn from(ptype: PrimitiveType) -> Self {
        DataType::Primitive(ptype)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructField {
    /// Name of this (possibly nested) column
    pub name: String,
    /// The data type of this field
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Denotes whether this Field can be null
    pub nullable: bool,
}

impl StructField {
    /// Creates a new field
    pub fn new(name: impl Into<String>, data_type: impl Into<DataType>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }

    /// Creates a new nullable field
    pub fn nullable(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self::new(name, data_type, true)
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// A struct is used to represent both the top-level schema of a dataset as well as struct columns
/// that contain nested columns. Field order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn new(fields: impl IntoIterator<Item = StructField>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn field(&self, name: impl AsRef<str>) -> Option<&StructField> {
        let name = name.as_ref();
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &StructField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.fields.iter().map(|f| f.data_type.leaf_count()).sum()
    }

    pub fn estimated_size(&self, list_size: usize, var_field_size: usize) -> usize {
        self.fields
            .iter()
            .map(|f| f.data_type.estimated_size(list_size, var_field_size))
            .fold(0, usize::saturating_add)
    }
}

/// Estimated size in bytes of one record of `schema`, never less than one.
pub fn estimate_record_size(schema: &Schema, list_size: usize, var_field_size: usize) -> usize {
    schema.estimated_size(list_size, var_field_size).max(1)
}
