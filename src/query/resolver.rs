//! Splits raw query parameters into per-loader buckets.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::loaders::{LoaderRegistry, ParamBucket};
use crate::observability::metrics;

/// Parameter names owned by the explorer's widgets. These form the primary
/// loader's unprefixed namespace.
pub const WIDGET_PARAMETERS: &[&str] = &[
    "schedule",
    "step",
    "n_splits",
    "before",
    "after",
    "expand_limits",
    "show_removed",
    "data",
];

static EMPTY: ParamBucket = BTreeMap::new();

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedParameters {
    /// Widget parameters, unprefixed.
    pub primary: ParamBucket,

    /// `prefix → {stripped key → value}`.
    pub buckets: BTreeMap<String, ParamBucket>,

    /// Keys that matched no namespace.
    pub discarded: BTreeSet<String>,
}

impl ResolvedParameters {
    /// Bucket handed to the loader registered under `prefix`; `None` selects
    /// the primary loader.
    pub fn bucket_for(&self, prefix: Option<&str>) -> &ParamBucket {
        match prefix {
            None => &self.primary,
            Some(prefix) => self.buckets.get(prefix).unwrap_or(&EMPTY),
        }
    }
}

/// Resolve against the prefixes of `registry`.
pub fn resolve_params<K, V>(
    raw: impl IntoIterator<Item = (K, V)>,
    registry: &LoaderRegistry,
) -> ResolvedParameters
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    resolve_with_prefixes(raw, &registry.prefixes())
}

/// Resolve against an explicit prefix list. Prefixes are expected to be
/// prefix-free, as guaranteed by [`LoaderRegistry`].
pub fn resolve_with_prefixes<K, V>(
    raw: impl IntoIterator<Item = (K, V)>,
    prefixes: &[&str],
) -> ResolvedParameters
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut resolved = ResolvedParameters::default();

    for (key, value) in raw {
        let (key, value) = (key.as_ref(), value.as_ref());

        let matches: Vec<(&str, &str)> = prefixes
            .iter()
            .filter_map(|prefix| strip_namespace(key, prefix).map(|rest| (*prefix, rest)))
            .collect();

        match matches.as_slice() {
            [(prefix, rest)] => {
                resolved
                    .buckets
                    .entry(prefix.to_string())
                    .or_default()
                    .insert(rest.to_string(), value.to_string());
            }
            [] if WIDGET_PARAMETERS.contains(&key) => {
                resolved.primary.insert(key.to_string(), value.to_string());
            }
            [] => {
                resolved.discarded.insert(key.to_string());
            }
            _ => {
                tracing::error!(key = %key, "Query parameter matches more than one loader prefix");
                resolved.discarded.insert(key.to_string());
            }
        }
    }

    report_discarded(&resolved.discarded);
    resolved
}

/// Discard every parameter. Used when query processing is disabled.
pub fn rejected<K, V>(raw: impl IntoIterator<Item = (K, V)>) -> ResolvedParameters
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let discarded: BTreeSet<String> = raw.into_iter().map(|(k, _)| k.as_ref().to_string()).collect();
    if !discarded.is_empty() {
        tracing::warn!(
            count = discarded.len(),
            "Query parameter processing is disabled; ignoring all parameters"
        );
        metrics::record_discarded_params(discarded.len());
    }
    ResolvedParameters {
        discarded,
        ..Default::default()
    }
}

fn strip_namespace<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|rest| !rest.is_empty())
}

fn report_discarded(discarded: &BTreeSet<String>) {
    if discarded.is_empty() {
        return;
    }
    for key in discarded {
        tracing::warn!(key = %key, "Discarding query parameter with unknown prefix");
    }
    metrics::record_discarded_params(discarded.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_and_discards() {
        let raw = [("a_foo", "1"), ("b_bar", "2"), ("x_baz", "3")];
        let resolved = resolve_with_prefixes(raw, &["a", "b"]);

        let expected: BTreeMap<String, ParamBucket> = [
            ("a".to_string(), [("foo".to_string(), "1".to_string())].into()),
            ("b".to_string(), [("bar".to_string(), "2".to_string())].into()),
        ]
        .into();
        assert_eq!(resolved.buckets, expected);
        assert_eq!(resolved.discarded, ["x_baz".to_string()].into());
        assert!(resolved.primary.is_empty());
    }

    #[test]
    fn test_widget_parameters_go_to_primary() {
        let raw = [("step", "3"), ("n_splits", "2"), ("data", "sales"), ("gen_seed", "1")];
        let resolved = resolve_with_prefixes(raw, &["gen"]);

        assert_eq!(resolved.primary.len(), 3);
        assert_eq!(resolved.bucket_for(None).get("n_splits").map(String::as_str), Some("2"));
        assert_eq!(resolved.bucket_for(Some("gen")).get("seed").map(String::as_str), Some("1"));
        assert!(resolved.bucket_for(Some("other")).is_empty());
        assert!(resolved.discarded.is_empty());
    }

    #[test]
    fn test_bare_prefix_is_discarded() {
        let resolved = resolve_with_prefixes([("gen", "1"), ("gen_", "2"), ("generator", "3")], &["gen"]);
        assert!(resolved.buckets.is_empty());
        assert_eq!(resolved.discarded.len(), 3);
    }

    #[test]
    fn test_rejected_discards_everything() {
        let resolved = rejected([("step", "1"), ("gen_seed", "2")]);
        assert!(resolved.primary.is_empty());
        assert!(resolved.buckets.is_empty());
        assert_eq!(resolved.discarded.len(), 2);
    }
}
