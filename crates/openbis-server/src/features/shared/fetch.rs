//! Guarded access to optionally loaded relations
//!
//! Relations are only loaded when the matching fetch option is set. The
//! result is wrapped in [`Fetched`], and reading a relation that was not
//! requested fails with [`ApiError::NotFetched`] instead of silently looking
//! empty.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    NotFetched,
    Value(T),
}

impl<T> Default for Fetched<T> {
    fn default() -> Self {
        Fetched::NotFetched
    }
}

impl<T> Fetched<T> {
    /// Wrap the value produced by `load` when `requested` is set
    pub fn when(requested: bool, load: impl FnOnce() -> T) -> Self {
        if requested {
            Fetched::Value(load())
        } else {
            Fetched::NotFetched
        }
    }

    /// Borrow the value; `what` names the relation in the error
    pub fn get(&self, what: &'static str) -> ApiResult<&T> {
        match self {
            Fetched::Value(value) => Ok(value),
            Fetched::NotFetched => Err(ApiError::NotFetched(what)),
        }
    }

    pub fn into_value(self, what: &'static str) -> ApiResult<T> {
        match self {
            Fetched::Value(value) => Ok(value),
            Fetched::NotFetched => Err(ApiError::NotFetched(what)),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Fetched::Value(_))
    }

    pub fn is_not_fetched(&self) -> bool {
        !self.is_fetched()
    }
}

impl<T: Serialize> Serialize for Fetched<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Fetched::Value(value) => value.serialize(serializer),
            Fetched::NotFetched => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Fetched<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Fetched::Value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        code: String,
        #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
        properties: Fetched<BTreeMap<String, String>>,
    }

    #[test]
    fn test_unfetched_access_fails() {
        let holder = Holder {
            code: "S1".into(),
            properties: Fetched::NotFetched,
        };
        let err = holder.properties.get("Properties").unwrap_err();
        assert!(matches!(err, ApiError::NotFetched("Properties")));
    }

    #[test]
    fn test_serialization_skips_unfetched() {
        let holder = Holder {
            code: "S1".into(),
            properties: Fetched::NotFetched,
        };
        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json, serde_json::json!({"code": "S1"}));

        let parsed: Holder = serde_json::from_value(json).unwrap();
        assert!(parsed.properties.is_not_fetched());
    }

    #[test]
    fn test_fetched_empty_value_is_not_an_error() {
        let parsed: Holder =
            serde_json::from_value(serde_json::json!({"code": "S1", "properties": {}})).unwrap();
        assert!(parsed.properties.get("Properties").unwrap().is_empty());
    }
}
