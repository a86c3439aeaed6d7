//! Definitions of errors that the hive kernel can encounter

use std::backtrace::{Backtrace, BacktraceStatus};
use std::num::{ParseFloatError, ParseIntError};

/// A [`std::result::Result`] that has the kernel [`Error`] as the error variant
pub type HiveResult<T, E = Error> = std::result::Result<T, E>;

/// All the types of errors that the kernel can run into
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// This is an error that includes a backtrace. To have a particular type of error include such
    /// backtrace (when RUST_BACKTRACE is set), add a variant here and construct it through
    /// [`Error::with_backtrace`].
    #[error("{source}\n{backtrace}")]
    Backtraced {
        source: Box<Self>,
        backtrace: Box<Backtrace>,
    },

    /// A generic error with a message
    #[error("Generic hive kernel error: {0}")]
    Generic(String),

    /// A generic error wrapping another error
    #[error("Generic error: {source}")]
    GenericError {
        /// Source error
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// An error performing IO
    #[error(transparent)]
    IOError(std::io::Error),

    /// An error talking to the metastore (not a "table not found")
    #[error("Hive metastore access failed: {0}")]
    MetastoreAccess(String),

    /// The table was visible while resolving the dataset path, but disappeared before the build
    #[error(
        "Initially found table {database}.{table} but then failed to retrieve from Hive metastore."
    )]
    TableDisappeared { database: String, table: String },

    /// The schema has more leaf columns than the configured budget allows
    #[error("Using datasets with more than {0} columns is currently disabled.")]
    ColumnCountTooLarge(usize),

    /// A hive type string could not be parsed
    #[error("Invalid hive type '{type_string}': {reason}")]
    InvalidTypeString { type_string: String, reason: String },

    /// A partition column has a data type we cannot turn into a partition value
    #[error("Unsupported Hive data type {0}.")]
    UnsupportedDataType(String),

    /// A decimal partition column is wider than the engine supports
    #[error(
        "Only decimals up to 38 digits in precision are supported. This Hive table has a partition value with precision of {0} digits."
    )]
    UnsupportedDecimalPrecision(u32),

    /// A partition value could not be parsed into its declared type
    #[error("Invalid value '{value}' for partition column {column}: {reason}")]
    InvalidPartitionValue {
        column: String,
        value: String,
        reason: String,
    },

    /// Neither an input format nor a storage handler was configured for a table or partition
    #[error("Unable to get Hive table InputFormat class. There is neither InputFormat class explicitly specified nor a StorageHandler class provided.")]
    MissingInputFormat,

    /// The split framework could not resolve a format by name
    #[error("Unknown input format or storage handler: {0}")]
    UnknownFormat(String),

    /// A table or partition location could not be used
    #[error("Invalid table location: {0}")]
    InvalidTableLocation(String),

    /// A file or directory that was expected to exist does not
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Split generation for one storage location failed
    #[error("Failure while trying to get splits for {description}: {source}")]
    SplitGeneration {
        description: String,
        source: Box<Self>,
    },

    /// Could not parse a url
    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Serializing or deserializing one of the opaque metadata blobs failed
    #[error(transparent)]
    MalformedJson(serde_json::Error),

    /// An error interacting with the object_store crate
    #[error(transparent)]
    ObjectStore(object_store::Error),

    /// An error converting a location into an object store path
    #[error("Object store path error: {0}")]
    ObjectStorePath(#[from] object_store::path::Error),

    /// An error parsing an integer
    #[error(transparent)]
    ParseIntError(ParseIntError),

    /// An error parsing a floating point number
    #[error(transparent)]
    ParseFloatError(ParseFloatError),
}

// Convenience constructors for Error types that take a String argument
impl Error {
    pub fn generic_err(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::GenericError {
            source: source.into(),
        }
    }

    pub fn generic(msg: impl ToString) -> Self {
        Self::Generic(msg.to_string())
    }

    pub fn file_not_found(path: impl ToString) -> Self {
        Self::FileNotFound(path.to_string())
    }

    pub fn metastore_access(msg: impl ToString) -> Self {
        Self::MetastoreAccess(msg.to_string())
    }

    pub fn invalid_table_location(location: impl ToString) -> Self {
        Self::InvalidTableLocation(location.to_string())
    }

    pub fn unsupported_data_type(category: impl ToString) -> Self {
        Self::UnsupportedDataType(category.to_string())
    }

    pub fn invalid_type_string(type_string: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidTypeString {
            type_string: type_string.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_partition_value(
        column: impl ToString,
        value: impl ToString,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidPartitionValue {
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn split_generation(description: impl ToString, source: Self) -> Self {
        Self::SplitGeneration {
            description: description.to_string(),
            source: Box::new(source),
        }
    }

    /// Strips the [`Error::Backtraced`] wrapper, if any.
    pub fn without_backtrace(self) -> Self {
        match self {
            Self::Backtraced { source, .. } => *source,
            err => err,
        }
    }

    pub fn with_backtrace(self) -> Self {
        let backtrace = Backtrace::capture();
        match backtrace.status() {
            BacktraceStatus::Captured => Self::Backtraced {
                source: Box::new(self),
                backtrace: Box::new(backtrace),
            },
            _ => self,
        }
    }
}

macro_rules! from_with_backtrace(
    ( $(($error_type: ty, $error_variant: ident)), * ) => {
        $(
            impl From<$error_type> for Error {
                fn from(value: $error_type) -> Self {
                    Self::$error_variant(value).with_backtrace()
                }
            }
        )*
    };
);

from_with_backtrace!(
    (serde_json::Error, MalformedJson),
    (std::io::Error, IOError),
    (ParseIntError, ParseIntError),
    (ParseFloatError, ParseFloatError)
);

impl From<object_store::Error> for Error {
    fn from(value: object_store::Error) -> Self {
        match value {
            object_store::Error::NotFound { path, .. } => Self::file_not_found(path),
            err => Self::ObjectStore(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_generation_message_names_the_location() {
        let err = Error::split_generation(
            "partition hdfs://nn/warehouse/t/ds=1",
            Error::file_not_found("hdfs://nn/warehouse/t/ds=1/000000_0"),
        );
        assert_eq!(
            err.to_string(),
            "Failure while trying to get splits for partition hdfs://nn/warehouse/t/ds=1: \
             File not found: hdfs://nn/warehouse/t/ds=1/000000_0"
        );
    }

    #[test]
    fn object_store_not_found_maps_to_file_not_found() {
        let err: Error = object_store::Error::NotFound {
            path: "a/b".to_string(),
            source: "missing".into(),
        }
        .into();
        assert!(matches!(err, Error::FileNotFound(path) if path == "a/b"));
    }
}
