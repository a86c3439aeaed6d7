//! Various utility functions/macros used throughout the kernel
use std::path::Path;

use url::Url;

use crate::{Error, HiveResult};

/// convenient way to return an error if a condition isn't true
macro_rules! require {
    ( $cond:expr, $err:expr ) => {
        if !($cond) {
            return Err($err);
        }
    };
}

pub(crate) use require;

/// Parse a metastore storage location into a URL. Locations are normally fully qualified
/// (`hdfs://nn:8020/warehouse/t`), but bare absolute paths are accepted as local paths.
pub(crate) fn parse_location(location: &str) -> HiveResult<Url> {
    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) if location.starts_with('/') => {
            Url::from_file_path(Path::new(location)).map_err(|_| {
                Error::invalid_table_location(format!(
                    "Could not construct a URL from path: {location}"
                ))
            })
        }
        Err(err) => Err(Error::invalid_table_location(format!(
            "{location} Error: {err}"
        ))),
    }
}

/// The path of `child` relative to `root`, without a leading separator. The root itself maps to
/// the empty string. Locations outside of `root` are returned whole.
pub(crate) fn relative_path(child: &Url, root: &Url) -> String {
    let root_path = root.path().trim_end_matches('/');
    let child_path = child.path();
    match child_path.strip_prefix(root_path) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            rest.trim_matches('/').to_string()
        }
        _ => child_path.to_string(),
    }
}

/// Append one path segment to `url`.
pub(crate) fn join_child(url: &Url, name: &str) -> HiveResult<Url> {
    let mut child = url.clone();
    child
        .path_segments_mut()
        .map_err(|_| Error::invalid_table_location(format!("{url} cannot be a base")))?
        .pop_if_empty()
        .push(name);
    Ok(child)
}

/// The directory containing `url`, ignoring a trailing separator.
pub(crate) fn parent(url: &Url) -> HiveResult<Url> {
    let mut parent = url.clone();
    parent
        .path_segments_mut()
        .map_err(|_| Error::invalid_table_location(format!("{url} cannot be a base")))?
        .pop_if_empty()
        .pop();
    Ok(parent)
}

/// The last path segment of `url`, ignoring a trailing separator.
pub(crate) fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()?.rev().find(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_locations() {
        let url = parse_location("hdfs://nn:8020/warehouse/t").unwrap();
        assert_eq!(url.scheme(), "hdfs");
        assert_eq!(url.path(), "/warehouse/t");

        let local = parse_location("/tmp/warehouse/t").unwrap();
        assert_eq!(local.scheme(), "file");
        assert_eq!(local.path(), "/tmp/warehouse/t");

        assert!(matches!(
            parse_location("not a location"),
            Err(Error::InvalidTableLocation(_))
        ));
    }

    #[test]
    fn relative_paths() {
        let root = Url::parse("hdfs://nn/warehouse/t").unwrap();
        let cases = [
            ("hdfs://nn/warehouse/t", ""),
            ("hdfs://nn/warehouse/t/", ""),
            ("hdfs://nn/warehouse/t/000000_0", "000000_0"),
            ("hdfs://nn/warehouse/t/ds=1/part-0", "ds=1/part-0"),
            ("hdfs://nn/warehouse/t2/part-0", "/warehouse/t2/part-0"),
        ];
        for (child, expected) in cases {
            let child = Url::parse(child).unwrap();
            assert_eq!(relative_path(&child, &root), expected, "{child}");
        }
        let root_with_slash = Url::parse("hdfs://nn/warehouse/t/").unwrap();
        let child = Url::parse("hdfs://nn/warehouse/t/a/b").unwrap();
        assert_eq!(relative_path(&child, &root_with_slash), "a/b");
    }

    #[test]
    fn navigate_paths() {
        let url = Url::parse("hdfs://nn/warehouse/t/base_0000005/bucket_00001").unwrap();
        let dir = parent(&url).unwrap();
        assert_eq!(dir.as_str(), "hdfs://nn/warehouse/t/base_0000005");
        assert_eq!(parent(&dir).unwrap().as_str(), "hdfs://nn/warehouse/t");
        assert_eq!(file_name(&url), Some("bucket_00001"));

        let trailing = Url::parse("hdfs://nn/warehouse/t/").unwrap();
        assert_eq!(
            join_child(&trailing, "delta_0000001_0000001").unwrap().as_str(),
            "hdfs://nn/warehouse/t/delta_0000001_0000001"
        );
        assert_eq!(file_name(&trailing), Some("t"));
    }
}
