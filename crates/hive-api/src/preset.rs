use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// One-shot configuration pushed over HTTP before the worker is put to use.
///
/// Only the first document is kept; later attempts are rejected.
#[derive(Debug, Default)]
pub struct PresetStore {
    value: OnceLock<Value>,
}

impl PresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `raw` and keep it if nothing has been applied yet.
    pub fn apply_json(&self, raw: &[u8]) -> Result<(), ApiError> {
        if self.is_applied() {
            return Err(ApiError::PresetAlreadyApplied);
        }
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| ApiError::InvalidRequest(format!("malformed preset: {e}")))?;
        self.value
            .set(value)
            .map_err(|_| ApiError::PresetAlreadyApplied)
    }

    pub fn get(&self) -> Option<&Value> {
        self.value.get()
    }

    /// The applied document as `T`, if one was applied.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, ApiError>> {
        self.get().map(|value| {
            T::deserialize(value)
                .map_err(|e| ApiError::InvalidRequest(format!("unexpected preset shape: {e}")))
        })
    }

    pub fn is_applied(&self) -> bool {
        self.value.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Owner {
        owner: String,
    }

    #[test]
    fn keeps_only_the_first_document() {
        let store = PresetStore::new();
        store.apply_json(br#"{"owner":"a"}"#).unwrap();

        let err = store.apply_json(br#"{"owner":"b"}"#).unwrap_err();
        assert!(matches!(err, ApiError::PresetAlreadyApplied));
        assert_eq!(store.get(), Some(&json!({"owner": "a"})));
        assert_eq!(
            store.decode::<Owner>().unwrap().unwrap(),
            Owner { owner: "a".into() }
        );
    }

    #[test]
    fn malformed_json_leaves_store_empty() {
        let store = PresetStore::new();
        assert!(matches!(
            store.apply_json(b"{not json"),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(!store.is_applied());
        assert!(store.decode::<Owner>().is_none());
    }
}
