//! File-stem naming for externalized array fields.
//!
//! When a dump writes each array field to a sibling file, the file name must
//! be stable and re-derivable on load. The stem is computed from the nearest
//! identifier in the ancestry plus the array field name; the backend codec
//! appends its fixed suffix.
//!
//! Two array fields that resolve to the same stem are not detected; the
//! second write overwrites the first.

use std::path::{Path, PathBuf};

use itertools::Itertools;

/// Strategy options for array-file naming.
#[derive(Clone, Copy, Debug)]
pub struct NamingOptions {
    /// Whether an identifier somewhere in the ancestry is required to name
    /// an array file. When `false`, a dotted chain of ancestor field names
    /// is used as a fallback.
    ///
    /// Defaults to `true`.
    pub require_identifier: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            require_identifier: true,
        }
    }
}

/// The naming inputs at one position in the tree, assembled by the dump
/// walker.
#[derive(Clone, Copy, Debug, Default)]
pub struct NamingContext<'a> {
    /// The owning record's own identifier value, if its class declares an
    /// identifier field.
    pub identifier: Option<&'a str>,
    /// The nearest identifier above the owning record.
    pub ancestor_identifier: Option<&'a str>,
    /// The field by which the owning record was reached from its parent.
    /// `None` at the root.
    pub enclosing_field: Option<&'a str>,
    /// The field names from the root to the owning record, for the
    /// no-identifier fallback.
    pub field_chain: &'a [String],
}

/// Compute the file stem for `field_name` under `context`.
///
/// Precedence, highest first:
/// 1. the owning record's own identifier: `{identifier}.{field_name}`;
/// 2. an ancestor identifier plus the field by which the owning record was
///    reached: `{ancestor}.{enclosing_field}.{field_name}`;
/// 3. an ancestor identifier alone: `{ancestor}.{field_name}`;
/// 4. no identifier anywhere: `{field_name}` at the root, or the dotted
///    field chain `{chain}.{field_name}` below it — but only when
///    `options.require_identifier` is `false`. Otherwise `None`.
#[must_use]
pub fn file_stem(field_name: &str, context: &NamingContext, options: &NamingOptions) -> Option<String> {
    if let Some(identifier) = context.identifier {
        Some(format!("{identifier}.{field_name}"))
    } else if let Some(ancestor) = context.ancestor_identifier {
        if let Some(enclosing) = context.enclosing_field {
            Some(format!("{ancestor}.{enclosing}.{field_name}"))
        } else {
            Some(format!("{ancestor}.{field_name}"))
        }
    } else if options.require_identifier {
        None
    } else if context.field_chain.is_empty() {
        Some(field_name.to_string())
    } else {
        Some(format!(
            "{}.{field_name}",
            context.field_chain.iter().join(".")
        ))
    }
}

/// Rewrite an absolute output directory relative to the current working
/// directory, using `..` components where the directory lies outside it.
/// Relative directories pass through unchanged.
#[must_use]
pub(crate) fn relative_output_dir(output_dir: &Path) -> PathBuf {
    if !output_dir.is_absolute() {
        return output_dir.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => pathdiff::diff_paths(output_dir, &cwd)
            .unwrap_or_else(|| output_dir.to_path_buf()),
        Err(_) => output_dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_identifier_wins() {
        let context = NamingContext {
            identifier: Some("my_temperature"),
            ancestor_identifier: Some("outer"),
            enclosing_field: Some("latitude_in_deg"),
            field_chain: &[],
        };
        assert_eq!(
            file_stem("values", &context, &NamingOptions::default()).as_deref(),
            Some("my_temperature.values")
        );
    }

    #[test]
    fn ancestor_identifier_includes_enclosing_field() {
        let context = NamingContext {
            identifier: None,
            ancestor_identifier: Some("my_temperature"),
            enclosing_field: Some("latitude_in_deg"),
            field_chain: &[],
        };
        assert_eq!(
            file_stem("values", &context, &NamingOptions::default()).as_deref(),
            Some("my_temperature.latitude_in_deg.values")
        );
    }

    #[test]
    fn ancestor_identifier_alone() {
        let context = NamingContext {
            identifier: None,
            ancestor_identifier: Some("my_temperature"),
            enclosing_field: None,
            field_chain: &[],
        };
        assert_eq!(
            file_stem("values", &context, &NamingOptions::default()).as_deref(),
            Some("my_temperature.values")
        );
    }

    #[test]
    fn missing_identifier_yields_none_when_required() {
        let context = NamingContext::default();
        assert_eq!(file_stem("values", &context, &NamingOptions::default()), None);
    }

    #[test]
    fn output_dirs_are_rewritten_relative_to_the_cwd() {
        assert_eq!(
            relative_output_dir(Path::new("out/arrays")),
            PathBuf::from("out/arrays")
        );
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(relative_output_dir(&cwd.join("out")), PathBuf::from("out"));
        if let Some(parent) = cwd.parent() {
            assert_eq!(relative_output_dir(parent), PathBuf::from(".."));
        }
    }

    #[test]
    fn field_chain_fallback() {
        let options = NamingOptions {
            require_identifier: false,
        };
        let context = NamingContext::default();
        assert_eq!(
            file_stem("values", &context, &options).as_deref(),
            Some("values")
        );

        let chain = vec!["station".to_string(), "series".to_string()];
        let context = NamingContext {
            field_chain: &chain,
            ..NamingContext::default()
        };
        assert_eq!(
            file_stem("values", &context, &options).as_deref(),
            Some("station.series.values")
        );
    }
}
