use crate::domain::time_block::RecordId;
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

pub const TIME_BLOCKS: &str = "time_blocks";
pub const TASKS: &str = "tasks";

/// The store owns the `id` field. No transaction spans several calls.
pub trait RecordStore: Send + Sync {
    fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, InfraError>;
    fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: RecordId,
    ) -> Result<Option<T>, InfraError>;
    fn add<T: Serialize>(&self, collection: &str, record: &T) -> Result<RecordId, InfraError>;
    fn update<T: Serialize>(&self, collection: &str, record: &T) -> Result<(), InfraError>;
    fn remove(&self, collection: &str, id: RecordId) -> Result<(), InfraError>;
}

pub(crate) fn encode_record<T: Serialize>(record: &T) -> Result<serde_json::Value, InfraError> {
    let value = serde_json::to_value(record)?;
    if !value.is_object() {
        return Err(InfraError::InvalidRecord(
            "records must serialize to JSON objects".to_string(),
        ));
    }
    Ok(value)
}

pub(crate) fn record_id(value: &serde_json::Value) -> Result<RecordId, InfraError> {
    value
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| InfraError::InvalidRecord("record has no id".to_string()))
}

pub(crate) fn decode_record<T: DeserializeOwned>(
    mut value: serde_json::Value,
    id: RecordId,
) -> Result<T, InfraError> {
    if let Some(object) = value.as_object_mut() {
        object.insert("id".to_string(), serde_json::Value::from(id));
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Default)]
struct InMemoryState {
    last_id: RecordId,
    collections: HashMap<String, BTreeMap<RecordId, serde_json::Value>>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryRecordStore {
    fn lock(&self) -> Result<MutexGuard<'_, InMemoryState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::Storage(format!("record store lock poisoned: {error}")))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, InfraError> {
        let state = self.lock()?;
        let Some(records) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        records
            .iter()
            .map(|(id, value)| decode_record(value.clone(), *id))
            .collect()
    }

    fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: RecordId,
    ) -> Result<Option<T>, InfraError> {
        let state = self.lock()?;
        state
            .collections
            .get(collection)
            .and_then(|records| records.get(&id))
            .map(|value| decode_record(value.clone(), id))
            .transpose()
    }

    fn add<T: Serialize>(&self, collection: &str, record: &T) -> Result<RecordId, InfraError> {
        let value = encode_record(record)?;
        let mut state = self.lock()?;
        state.last_id += 1;
        let id = state.last_id;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, value);
        Ok(id)
    }

    fn update<T: Serialize>(&self, collection: &str, record: &T) -> Result<(), InfraError> {
        let value = encode_record(record)?;
        let id = record_id(&value)?;
        let mut state = self.lock()?;
        let Some(slot) = state
            .collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(&id))
        else {
            return Err(InfraError::NotFound {
                collection: collection.to_string(),
                id,
            });
        };
        *slot = value;
        Ok(())
    }

    fn remove(&self, collection: &str, id: RecordId) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        if let Some(records) = state.collections.get_mut(collection) {
            records.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Task;

    #[test]
    fn add_assigns_ids_and_get_writes_them_back() {
        let store = InMemoryRecordStore::default();
        let first = store.add(TASKS, &Task::new("first")).expect("add");
        let second = store.add(TASKS, &Task::new("second")).expect("add");
        assert!(second > first);

        let loaded: Task = store.get(TASKS, second).expect("get").expect("exists");
        assert_eq!(loaded.id, Some(second));
        assert_eq!(loaded.title, "second");

        let all: Vec<Task> = store.get_all(TASKS).expect("get all");
        assert_eq!(
            all.iter().map(|task| task.id).collect::<Vec<_>>(),
            vec![Some(first), Some(second)]
        );
    }

    #[test]
    fn update_requires_existing_record() {
        let store = InMemoryRecordStore::default();
        let id = store.add(TASKS, &Task::new("draft")).expect("add");
        let mut task: Task = store.get(TASKS, id).expect("get").expect("exists");
        task.title = "final".to_string();
        store.update(TASKS, &task).expect("update");

        let loaded: Task = store.get(TASKS, id).expect("get").expect("exists");
        assert_eq!(loaded.title, "final");

        task.id = Some(999);
        assert!(matches!(
            store.update(TASKS, &task),
            Err(InfraError::NotFound { id: 999, .. })
        ));
        task.id = None;
        assert!(matches!(
            store.update(TASKS, &task),
            Err(InfraError::InvalidRecord(_))
        ));
    }

    #[test]
    fn remove_is_idempotent_and_collections_are_separate() {
        let store = InMemoryRecordStore::default();
        let id = store.add(TASKS, &Task::new("gone")).expect("add");
        assert!(store.get::<Task>(TIME_BLOCKS, id).expect("get").is_none());

        store.remove(TASKS, id).expect("remove");
        store.remove(TASKS, id).expect("remove again");
        assert!(store.get::<Task>(TASKS, id).expect("get").is_none());
        assert!(store.get_all::<Task>(TASKS).expect("get all").is_empty());
    }

    #[test]
    fn non_object_records_are_rejected() {
        let store = InMemoryRecordStore::default();
        assert!(matches!(
            store.add(TASKS, &"plain string"),
            Err(InfraError::InvalidRecord(_))
        ));
    }
}
