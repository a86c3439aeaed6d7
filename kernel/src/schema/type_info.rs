//! Hive type descriptors and a parser for the type strings stored in the metastore
//! (`int`, `decimal(10,2)`, `array<struct<a:int,b:map<string,bigint>>>`, ...).

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use strum::{AsRefStr, Display as StrumDisplay};

use crate::{Error, HiveResult};

/// Precision hive assumes for a bare `decimal`
pub const DEFAULT_DECIMAL_PRECISION: u32 = 10;
/// Scale hive assumes for a bare `decimal` or `decimal(p)`
pub const DEFAULT_DECIMAL_SCALE: u32 = 0;

/// The top level category of a [`TypeInfo`]. Displayed the way hive names it in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Primitive,
    List,
    Map,
    Struct,
    Union,
}

/// Primitive category of a [`PrimitiveTypeInfo`], without type parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimitiveCategory {
    Void,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Varchar,
    Char,
    Date,
    Timestamp,
    Binary,
    Decimal,
    IntervalYearMonth,
    IntervalDayTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTypeInfo {
    Void,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Varchar(u32),
    Char(u32),
    Date,
    Timestamp,
    Binary,
    Decimal { precision: u32, scale: u32 },
    IntervalYearMonth,
    IntervalDayTime,
}

impl PrimitiveTypeInfo {
    pub fn category(&self) -> PrimitiveCategory {
        match self {
            Self::Void => PrimitiveCategory::Void,
            Self::Boolean => PrimitiveCategory::Boolean,
            Self::Byte => PrimitiveCategory::Byte,
            Self::Short => PrimitiveCategory::Short,
            Self::Int => PrimitiveCategory::Int,
            Self::Long => PrimitiveCategory::Long,
            Self::Float => PrimitiveCategory::Float,
            Self::Double => PrimitiveCategory::Double,
            Self::String => PrimitiveCategory::String,
            Self::Varchar(_) => PrimitiveCategory::Varchar,
            Self::Char(_) => PrimitiveCategory::Char,
            Self::Date => PrimitiveCategory::Date,
            Self::Timestamp => PrimitiveCategory::Timestamp,
            Self::Binary => PrimitiveCategory::Binary,
            Self::Decimal { .. } => PrimitiveCategory::Decimal,
            Self::IntervalYearMonth => PrimitiveCategory::IntervalYearMonth,
            Self::IntervalDayTime => PrimitiveCategory::IntervalDayTime,
        }
    }
}

impl Display for PrimitiveTypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Boolean => write!(f, "boolean"),
            Self::Byte => write!(f, "tinyint"),
            Self::Short => write!(f, "smallint"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "bigint"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::Varchar(len) => write!(f, "varchar({len})"),
            Self::Char(len) => write!(f, "char({len})"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Binary => write!(f, "binary"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::IntervalYearMonth => write!(f, "interval_year_month"),
            Self::IntervalDayTime => write!(f, "interval_day_time"),
        }
    }
}

/// A parsed hive column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Primitive(PrimitiveTypeInfo),
    List(Box<TypeInfo>),
    Map(Box<TypeInfo>, Box<TypeInfo>),
    Struct(Vec<(String, TypeInfo)>),
    Union(Vec<TypeInfo>),
}

impl TypeInfo {
    pub fn category(&self) -> Category {
        match self {
            Self::Primitive(_) => Category::Primitive,
            Self::List(_) => Category::List,
            Self::Map(_, _) => Category::Map,
            Self::Struct(_) => Category::Struct,
            Self::Union(_) => Category::Union,
        }
    }

    pub fn as_primitive_opt(&self) -> Option<&PrimitiveTypeInfo> {
        match self {
            Self::Primitive(ptype) => Some(ptype),
            _ => None,
        }
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(ptype) => write!(f, "{ptype}"),
            Self::List(element) => write!(f, "array<{element}>"),
            Self::Map(key, value) => write!(f, "map<{key},{value}>"),
            Self::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, (name, field_type)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{name}:{field_type}")?;
                }
                write!(f, ">")
            }
            Self::Union(members) => {
                write!(f, "uniontype<")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, ">")
            }
        }
    }
}

impl FromStr for TypeInfo {
    type Err = Error;

    fn from_str(type_string: &str) -> HiveResult<Self> {
        let tokens = tokenize(type_string);
        let mut parser = TypeParser {
            type_string,
            tokens,
            pos: 0,
        };
        let parsed = parser.parse_type()?;
        if let Some(extra) = parser.peek() {
            return Err(Error::invalid_type_string(
                type_string,
                format!("unexpected trailing token '{extra}'"),
            ));
        }
        Ok(parsed)
    }
}

/// Splits a type string into identifiers and the single character separators `<>(),:`.
fn tokenize(type_string: &str) -> Vec<&str> {
    let mut tokens = vec![];
    let mut start = None;
    for (i, c) in type_string.char_indices() {
        let is_ident = c.is_alphanumeric() || c == '_' || c == '.' || c == '$';
        match (is_ident, start) {
            (true, None) => start = Some(i),
            (true, Some(_)) => {}
            (false, Some(s)) => {
                tokens.push(&type_string[s..i]);
                start = None;
            }
            (false, None) => {}
        }
        if !is_ident && !c.is_whitespace() {
            tokens.push(&type_string[i..i + c.len_utf8()]);
        }
    }
    if let Some(s) = start {
        tokens.push(&type_string[s..]);
    }
    tokens
}

struct TypeParser<'a> {
    type_string: &'a str,
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> HiveResult<&'a str> {
        let token = self.peek().ok_or_else(|| {
            Error::invalid_type_string(self.type_string, "unexpected end of type string")
        })?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &str) -> HiveResult<()> {
        let token = self.next()?;
        if token != expected {
            return Err(Error::invalid_type_string(
                self.type_string,
                format!("expected '{expected}' but found '{token}'"),
            ));
        }
        Ok(())
    }

    fn number(&mut self) -> HiveResult<u32> {
        let token = self.next()?;
        token.parse().map_err(|_| {
            Error::invalid_type_string(self.type_string, format!("'{token}' is not a number"))
        })
    }

    /// Parses `(n)` or `(n,m)` following a parameterized type name, if present.
    fn parameters(&mut self) -> HiveResult<Vec<u32>> {
        if self.peek() != Some("(") {
            return Ok(vec![]);
        }
        self.expect("(")?;
        let mut params = vec![self.number()?];
        while self.peek() == Some(",") {
            self.expect(",")?;
            params.push(self.number()?);
        }
        self.expect(")")?;
        Ok(params)
    }

    fn parse_type(&mut self) -> HiveResult<TypeInfo> {
        let name = self.next()?;
        let primitive = match name.to_ascii_lowercase().as_str() {
            "void" => PrimitiveTypeInfo::Void,
            "boolean" => PrimitiveTypeInfo::Boolean,
            "tinyint" => PrimitiveTypeInfo::Byte,
            "smallint" => PrimitiveTypeInfo::Short,
            "int" | "integer" => PrimitiveTypeInfo::Int,
            "bigint" => PrimitiveTypeInfo::Long,
            "float" => PrimitiveTypeInfo::Float,
            "double" => PrimitiveTypeInfo::Double,
            "string" => PrimitiveTypeInfo::String,
            "date" => PrimitiveTypeInfo::Date,
            "timestamp" => PrimitiveTypeInfo::Timestamp,
            "binary" => PrimitiveTypeInfo::Binary,
            "interval_year_month" => PrimitiveTypeInfo::IntervalYearMonth,
            "interval_day_time" => PrimitiveTypeInfo::IntervalDayTime,
            "varchar" => PrimitiveTypeInfo::Varchar(self.single_length(name)?),
            "char" => PrimitiveTypeInfo::Char(self.single_length(name)?),
            "decimal" => self.decimal()?,
            "array" => {
                self.expect("<")?;
                let element = self.parse_type()?;
                self.expect(">")?;
                return Ok(TypeInfo::List(Box::new(element)));
            }
            "map" => {
                self.expect("<")?;
                let key = self.parse_type()?;
                self.expect(",")?;
                let value = self.parse_type()?;
                self.expect(">")?;
                return Ok(TypeInfo::Map(Box::new(key), Box::new(value)));
            }
            "struct" => return self.struct_fields().map(TypeInfo::Struct),
            "uniontype" => {
                self.expect("<")?;
                let mut members = vec![self.parse_type()?];
                while self.peek() == Some(",") {
                    self.expect(",")?;
                    members.push(self.parse_type()?);
                }
                self.expect(">")?;
                return Ok(TypeInfo::Union(members));
            }
            _ => {
                return Err(Error::invalid_type_string(
                    self.type_string,
                    format!("unknown type name '{name}'"),
                ))
            }
        };
        Ok(TypeInfo::Primitive(primitive))
    }

    fn single_length(&mut self, name: &str) -> HiveResult<u32> {
        match self.parameters()?.as_slice() {
            [len] => Ok(*len),
            _ => Err(Error::invalid_type_string(
                self.type_string,
                format!("{name} requires exactly one length parameter"),
            )),
        }
    }

    fn decimal(&mut self) -> HiveResult<PrimitiveTypeInfo> {
        let (precision, scale) = match self.parameters()?.as_slice() {
            [] => (DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE),
            [precision] => (*precision, DEFAULT_DECIMAL_SCALE),
            [precision, scale] => (*precision, *scale),
            _ => {
                return Err(Error::invalid_type_string(
                    self.type_string,
                    "decimal takes at most two parameters",
                ))
            }
        };
        if precision == 0 || scale > precision {
            return Err(Error::invalid_type_string(
                self.type_string,
                format!("invalid decimal precision/scale ({precision},{scale})"),
            ));
        }
        Ok(PrimitiveTypeInfo::Decimal { precision, scale })
    }

    fn struct_fields(&mut self) -> HiveResult<Vec<(String, TypeInfo)>> {
        self.expect("<")?;
        let mut fields = vec![];
        loop {
            let name = self.next()?;
            self.expect(":")?;
            fields.push((name.to_string(), self.parse_type()?));
            match self.next()? {
                "," => continue,
                ">" => return Ok(fields),
                other => {
                    return Err(Error::invalid_type_string(
                        self.type_string,
                        format!("expected ',' or '>' but found '{other}'"),
                    ))
                }
            }
        }
    }
}
