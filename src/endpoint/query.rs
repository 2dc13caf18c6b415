//! Access to request parameters as an unordered multimap.
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FromIterator;

/// Allows access to the query parameters in an url or a body.
///
/// Use one of the listed implementations below. Since those may be a bit
/// confusing due to their abundant use of generics, basically use any type
/// of map that maps 'str-likes' to a collection of other 'str-likes'.
/// Popular instances may be:
/// * `HashMap<String, String>`
/// * `HashMap<String, Vec<String>>`
///
/// You should generally not have to implement this trait yourself, and if
/// you do there are additional requirements on your implementation to
/// guarantee standard conformance. Therefore the trait is marked as
/// `unsafe`.
pub unsafe trait QueryParameter {
    /// Get the **unique** value associated with a key.
    ///
    /// If there are multiple values, return `None`. This is very important
    /// to guarantee conformance to the RFC. Afaik it prevents potentially
    /// subverting validation middleware, order dependent processing, or
    /// simple confusion between different components who parse the query
    /// string from different ends.
    fn unique_value(&self, key: &str) -> Option<Cow<str>>;

    /// Whether the key appears at all, regardless of how often.
    ///
    /// Together with `unique_value` this distinguishes the three states a
    /// parameter can be in: absent, present once, repeated.
    fn contains_key(&self, key: &str) -> bool;

    /// Guarantees that one can grab an owned copy.
    fn normalize(&self) -> NormalizedParameter;
}

/// The query parameter normal form.
///
/// When a request wants to give access to its query or body parameters by
/// reference, it can do so by a reference of the particular trait. But when
/// the representation of the query is not stored in the memory associated
/// with the request, it needs to be allocated to outlive the borrow on the
/// request. This allocation may as well perform the normalization into a
/// representation actually consumed by the backend.
///
/// Internally a hashmap but this may change due to optimizations.
#[derive(Clone, Debug, Default)]
pub struct NormalizedParameter {
    /// The value is `None` if the key appeared at least twice.
    inner: HashMap<Cow<'static, str>, Option<Cow<'static, str>>>,
}

impl NormalizedParameter {
    /// Create an empty map.
    pub fn new() -> Self {
        NormalizedParameter::default()
    }

    /// Insert a key-value-pair or mark the key as dead if already present.
    ///
    /// Since each key must appear at most once, we do not remove it from the
    /// map but instead mark the key as having a duplicate entry.
    pub fn insert_or_poison(&mut self, key: Cow<'static, str>, val: Cow<'static, str>) {
        let unique_val = Some(val);
        self.inner
            .entry(key)
            .and_modify(|val| *val = None)
            .or_insert(unique_val);
    }
}

unsafe impl QueryParameter for NormalizedParameter {
    fn unique_value(&self, key: &str) -> Option<Cow<str>> {
        self.inner
            .get(key)
            .and_then(|val| val.as_ref().map(Cow::as_ref).map(Cow::Borrowed))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    fn normalize(&self) -> NormalizedParameter {
        self.clone()
    }
}

impl<K, V> FromIterator<(K, V)> for NormalizedParameter
where
    K: Into<Cow<'static, str>>,
    V: Into<Cow<'static, str>>,
{
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
    {
        let mut target = NormalizedParameter::default();
        iter.into_iter()
            .for_each(|(k, v)| target.insert_or_poison(k.into(), v.into()));
        target
    }
}

/// Return a reference to a value in a collection if it is the only one.
///
/// For example, a vector of string like types returns a reference to its
/// first element if there are no others, else it returns `None`.
pub unsafe trait UniqueValue {
    /// Borrow the unique value reference.
    fn get_unique(&self) -> Option<&str>;

    /// Whether there is any value at all.
    fn is_present(&self) -> bool {
        true
    }
}

unsafe impl<K, V, S: BuildHasher> QueryParameter for HashMap<K, V, S>
where
    K: Borrow<str> + Eq + Hash,
    V: UniqueValue,
{
    fn unique_value(&self, key: &str) -> Option<Cow<str>> {
        self.get(key).and_then(V::get_unique).map(Cow::Borrowed)
    }

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).map(V::is_present).unwrap_or(false)
    }

    fn normalize(&self) -> NormalizedParameter {
        let inner = self
            .iter()
            .filter(|(_, val)| val.is_present())
            .map(|(key, val)| {
                (
                    Cow::Owned(key.borrow().to_string()),
                    val.get_unique().map(|value| Cow::Owned(value.to_string())),
                )
            })
            .collect();

        NormalizedParameter { inner }
    }
}

unsafe impl UniqueValue for String {
    fn get_unique(&self) -> Option<&str> {
        Some(self)
    }
}

unsafe impl<'a> UniqueValue for &'a str {
    fn get_unique(&self) -> Option<&str> {
        Some(self)
    }
}

unsafe impl<'a> UniqueValue for Cow<'a, str> {
    fn get_unique(&self) -> Option<&str> {
        Some(self.as_ref())
    }
}

unsafe impl<V: UniqueValue> UniqueValue for Vec<V> {
    fn get_unique(&self) -> Option<&str> {
        if self.len() > 1 {
            None
        } else {
            self.first().and_then(V::get_unique)
        }
    }

    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

/// Failure modes of reading a single parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterError {
    /// A required parameter did not appear (or had no value).
    Missing,

    /// The parameter appeared more than once.
    Repeated,
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterError::Missing => f.write_str("Parameter is missing"),
            ParameterError::Repeated => f.write_str("Parameter must not be repeated"),
        }
    }
}

/// Read a parameter that a request must carry exactly once.
///
/// Reading is free of side effects: calling this twice on the same input
/// yields the same result.
pub fn require<'a>(
    query: &'a dyn QueryParameter, key: &str,
) -> Result<Cow<'a, str>, ParameterError> {
    match query.unique_value(key) {
        Some(value) => Ok(value),
        None if query.contains_key(key) => Err(ParameterError::Repeated),
        None => Err(ParameterError::Missing),
    }
}

/// Read a parameter that may appear at most once.
///
/// An absent parameter is `Ok(None)`; a repeated one is still an error since
/// processing either occurrence could be turned against the other.
pub fn maybe<'a>(
    query: &'a dyn QueryParameter, key: &str,
) -> Result<Option<Cow<'a, str>>, ParameterError> {
    match query.unique_value(key) {
        Some(value) => Ok(Some(value)),
        None if query.contains_key(key) => Err(ParameterError::Repeated),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        map.insert("single".to_string(), vec!["value".to_string()]);
        map.insert(
            "repeated".to_string(),
            vec!["one".to_string(), "two".to_string()],
        );
        map.insert("empty".to_string(), vec![]);
        map
    }

    #[test]
    fn require_states() {
        let map = sample();
        assert_eq!(require(&map, "single").unwrap(), "value");
        assert_eq!(require(&map, "repeated"), Err(ParameterError::Repeated));
        assert_eq!(require(&map, "empty"), Err(ParameterError::Missing));
        assert_eq!(require(&map, "absent"), Err(ParameterError::Missing));
    }

    #[test]
    fn maybe_states() {
        let map = sample();
        assert_eq!(maybe(&map, "single").unwrap().unwrap(), "value");
        assert_eq!(maybe(&map, "repeated"), Err(ParameterError::Repeated));
        assert_eq!(maybe(&map, "absent"), Ok(None));
    }

    #[test]
    fn reading_is_idempotent() {
        let map = sample();
        assert_eq!(require(&map, "single"), require(&map, "single"));
        assert_eq!(require(&map, "repeated"), require(&map, "repeated"));
        assert_eq!(maybe(&map, "absent"), maybe(&map, "absent"));
    }

    #[test]
    fn poisoning_keeps_repeated_detectable() {
        let normalized: NormalizedParameter = vec![
            ("state", "first"),
            ("state", "second"),
            ("client_id", "app"),
        ]
        .into_iter()
        .collect();

        assert_eq!(require(&normalized, "client_id").unwrap(), "app");
        assert_eq!(require(&normalized, "state"), Err(ParameterError::Repeated));
        assert_eq!(maybe(&normalized, "state"), Err(ParameterError::Repeated));
    }

    #[test]
    fn normalization_survives_roundtrip() {
        let map = sample();
        let normalized = map.normalize();

        assert_eq!(require(&normalized, "single").unwrap(), "value");
        assert_eq!(require(&normalized, "repeated"), Err(ParameterError::Repeated));
        assert_eq!(maybe(&normalized, "empty"), Ok(None));
    }
}
