//! Structural resolution.
//!
//! A [`Structure`] is a tree of maps and lists whose leaves are either
//! references to load or literal values to pass through. Resolving it loads
//! every reference concurrently and rebuilds the tree in its original
//! order. Literals are moved, never cloned, so shared handles keep their
//! identity.

use crate::reference::is_path_like;
use futures::future::{try_join_all, LocalBoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;

/// Input tree for a structural load.
#[derive(Debug, Clone, PartialEq)]
pub enum Structure<T> {
    /// A path or URL to load.
    Reference(String),
    /// A value passed through untouched.
    Literal(T),
    List(Vec<Structure<T>>),
    /// Ordered key/value entries.
    Map(Vec<(String, Structure<T>)>),
}

/// Output tree of a structural load.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<L, T> {
    /// The result of loading a reference.
    Loaded(L),
    Literal(T),
    List(Vec<Resolved<L, T>>),
    Map(Vec<(String, Resolved<L, T>)>),
}

impl<T> Structure<T> {
    /// Build a map from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Structure<T>)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn reference(reference: impl Into<String>) -> Self {
        Self::Reference(reference.into())
    }

    /// Number of references anywhere in the tree.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        match self {
            Self::Reference(_) => 1,
            Self::Literal(_) => 0,
            Self::List(items) => items.iter().map(Self::reference_count).sum(),
            Self::Map(entries) => entries.iter().map(|(_, v)| v.reference_count()).sum(),
        }
    }
}

impl Structure<Value> {
    /// Convert a JSON value, treating path-like strings as references.
    ///
    /// Objects and arrays are walked; every other value is a literal.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) if is_path_like(&s) => Self::Reference(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
            other => Self::Literal(other),
        }
    }
}

impl<L, T> Resolved<L, T> {
    /// Look up a map entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Look up a list item by index.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<&Self> {
        match self {
            Self::List(items) => items.get(index),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_loaded(&self) -> Option<&L> {
        match self {
            Self::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&T> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Map loaded leaves, keeping structure and literals.
    pub fn map_loaded<M>(self, f: &mut impl FnMut(L) -> M) -> Resolved<M, T> {
        match self {
            Self::Loaded(loaded) => Resolved::Loaded(f(loaded)),
            Self::Literal(value) => Resolved::Literal(value),
            Self::List(items) => {
                Resolved::List(items.into_iter().map(|i| i.map_loaded(f)).collect())
            }
            Self::Map(entries) => Resolved::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.map_loaded(f)))
                    .collect(),
            ),
        }
    }
}

/// Resolve every reference in `value` with `load`.
///
/// Siblings at each level are loaded concurrently; the first failure
/// aborts the whole call.
pub fn resolve_structure<'a, T, L, E, F, Fut>(
    value: Structure<T>,
    load: &'a F,
) -> LocalBoxFuture<'a, Result<Resolved<L, T>, E>>
where
    T: 'a,
    L: 'a,
    E: 'a,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<L, E>> + 'a,
{
    async move {
        match value {
            Structure::Reference(reference) => load(reference).await.map(Resolved::Loaded),
            Structure::Literal(literal) => Ok(Resolved::Literal(literal)),
            Structure::List(items) => {
                let resolved =
                    try_join_all(items.into_iter().map(|item| resolve_structure(item, load)))
                        .await?;
                Ok(Resolved::List(resolved))
            }
            Structure::Map(entries) => {
                let (keys, values): (Vec<String>, Vec<Structure<T>>) =
                    entries.into_iter().unzip();
                let resolved =
                    try_join_all(values.into_iter().map(|value| resolve_structure(value, load)))
                        .await?;
                Ok(Resolved::Map(keys.into_iter().zip(resolved).collect()))
            }
        }
    }
    .boxed_local()
}
