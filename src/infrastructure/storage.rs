use crate::domain::time_block::RecordId;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::record_store::{RecordStore, decode_record, encode_record, record_id};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    db_path: PathBuf,
}

impl SqliteRecordStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn parse_body(raw: &str) -> Result<serde_json::Value, InfraError> {
    serde_json::from_str(raw).map_err(InfraError::from)
}

impl RecordStore for SqliteRecordStore {
    fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare("SELECT id, body FROM records WHERE collection = ?1 ORDER BY id")?;
        let rows = statement
            .query_map(params![collection], |row| {
                Ok((row.get::<_, RecordId>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body)| decode_record(parse_body(&body)?, id))
            .collect()
    }

    fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: RecordId,
    ) -> Result<Option<T>, InfraError> {
        let connection = self.connect()?;
        let body: Option<String> = connection
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| decode_record(parse_body(&body)?, id))
            .transpose()
    }

    fn add<T: Serialize>(&self, collection: &str, record: &T) -> Result<RecordId, InfraError> {
        let mut value = encode_record(record)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("id");
        }
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO records (collection, body) VALUES (?1, ?2)",
            params![collection, value.to_string()],
        )?;
        Ok(connection.last_insert_rowid())
    }

    fn update<T: Serialize>(&self, collection: &str, record: &T) -> Result<(), InfraError> {
        let mut value = encode_record(record)?;
        let id = record_id(&value)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("id");
        }
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE records SET body = ?1 WHERE collection = ?2 AND id = ?3",
            params![value.to_string(), collection, id],
        )?;
        if changed == 0 {
            return Err(InfraError::NotFound {
                collection: collection.to_string(),
                id,
            });
        }
        Ok(())
    }

    fn remove(&self, collection: &str, id: RecordId) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(())
    }
}
