use crate::storage::{KeyedStore, StoreError, StoreKey};
use serde_yaml::{Mapping, Value};

/// Yes/no prompt supplied by whichever shell is driving a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSummary {
    Absent,
    Malformed,
    Items(usize),
    Value,
}

impl std::fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSummary::Absent => write!(f, "empty"),
            StoreSummary::Malformed => write!(f, "malformed"),
            StoreSummary::Items(n) => write!(f, "{} items", n),
            StoreSummary::Value => write!(f, "set"),
        }
    }
}

pub fn summarize(store: &KeyedStore, key: StoreKey) -> StoreSummary {
    let Some(raw) = store.raw(key) else {
        return StoreSummary::Absent;
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Array(items)) => StoreSummary::Items(items.len()),
        Ok(serde_json::Value::Object(map)) => StoreSummary::Items(map.len()),
        Ok(_) => StoreSummary::Value,
        Err(_) => StoreSummary::Malformed,
    }
}

/// Every owned store as YAML: decoded when valid, the raw text when not,
/// `null` when absent.
pub fn dump(store: &KeyedStore) -> Result<String, serde_yaml::Error> {
    let mut out = Mapping::new();
    for key in StoreKey::ALL {
        let value = match store.raw(key) {
            None => Value::Null,
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(json) => serde_yaml::to_value(json)?,
                Err(_) => Value::String(raw),
            },
        };
        out.insert(Value::String(key.suffix().to_string()), value);
    }
    serde_yaml::to_string(&out)
}

/// Returns `false` when the prompt was declined and nothing was removed.
pub fn clear_store(
    store: &KeyedStore,
    key: StoreKey,
    confirm: &mut dyn Confirm,
) -> Result<bool, StoreError> {
    if !confirm.confirm(&format!("Clear {}?", key.suffix())) {
        return Ok(false);
    }
    store.remove(key)?;
    tracing::info!(key = key.suffix(), "cleared store");
    Ok(true)
}

pub fn clear_all(store: &KeyedStore, confirm: &mut dyn Confirm) -> Result<bool, StoreError> {
    if !confirm.confirm("Are you sure you want to clear ALL data? This cannot be undone!") {
        return Ok(false);
    }
    store.clear()?;
    Ok(true)
}
