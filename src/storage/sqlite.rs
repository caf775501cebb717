//! Persistent storage backend over `SQLite` + sqlite-vec.
//!
//! Collection names are derived from the configured prefix plus an
//! entity-type suffix, and creation is idempotent. Every domain id maps to
//! a stable integer point key (a namespaced hash of the id string) used as
//! the rowid of both the payload table and the vec0 index; the domain id
//! itself is kept in the stored payload for exact reverse lookup.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rusqlite::OptionalExtension;
use rusqlite::types::Value;
use tokio_rusqlite::Connection;

use crate::core::config::MemoryConfig;
use crate::core::entry::MemoryEntry;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::ids::{ConversationId, EntryId, TopicId};
use crate::core::topic::Topic;
use crate::storage::backend::{ScoredEntry, SearchFilters, StorageBackend, StoreFuture};

/// Namespaces for point-key derivation, one per entity type.
const ENTRY_NAMESPACE: &str = "entry";
const TOPIC_NAMESPACE: &str = "topic";

/// Derive the stable point key for a domain id.
///
/// The hash is namespaced by entity type so an entry and a topic with the
/// same UUID can never collide, and masked to a non-negative i64 so it is
/// usable as a `SQLite` rowid.
#[must_use]
pub fn point_key(namespace: &str, id: &str) -> i64 {
    let mut hasher = DefaultHasher::new();
    namespace.hash(&mut hasher);
    id.hash(&mut hasher);

    #[allow(clippy::cast_possible_wrap)]
    let key = (hasher.finish() & 0x7fff_ffff_ffff_ffff) as i64;
    key
}

/// Sqlite-vec indexed backend for durable deployments.
pub struct SqliteVectorBackend {
    conn: Connection,
    entries_table: String,
    entries_vec_table: String,
    entry_topics_table: String,
    topics_table: String,
}

impl SqliteVectorBackend {
    /// Open the database and create collections if absent.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the sqlite-vec
    /// extension is missing.
    ///
    /// # Note
    /// [`crate::storage::init_sqlite_vec_extension`] must run before this.
    pub async fn new(config: &MemoryConfig) -> MemoryResult<Self> {
        let prefix = &config.storage.collection_prefix;
        let entries_table = format!("{prefix}_entries");
        let entries_vec_table = format!("{prefix}_entries_vec");
        let entry_topics_table = format!("{prefix}_entry_topics");
        let topics_table = format!("{prefix}_topics");

        let conn = Connection::open(&config.storage.sqlite_path).await?;

        conn.call(|conn| {
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))?;
            Ok(())
        })
        .await
        .map_err(|_| MemoryError::SqliteVecUnavailable)?;

        let ndims = config.embedding.ndims;
        let schema = format!(
            "CREATE TABLE IF NOT EXISTS {entries_table} (
                key INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL,
                turn_index INTEGER NOT NULL,
                ts INTEGER NOT NULL,
                speaker TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{entries_table}_conv
                ON {entries_table} (conversation_id, turn_index);
            CREATE TABLE IF NOT EXISTS {entry_topics_table} (
                entry_key INTEGER NOT NULL,
                topic_id TEXT NOT NULL,
                PRIMARY KEY (entry_key, topic_id)
            );
            CREATE TABLE IF NOT EXISTS {topics_table} (
                key INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                disabled INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS {entries_vec_table}
                USING vec0(embedding float[{ndims}] distance_metric=cosine);"
        );
        conn.call(move |conn| {
            conn.execute_batch(&schema)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            entries_table,
            entries_vec_table,
            entry_topics_table,
            topics_table,
        })
    }
}

impl StorageBackend for SqliteVectorBackend {
    fn upsert_entry(&self, entry: MemoryEntry) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            let table = self.entries_table.clone();
            let vec_table = self.entries_vec_table.clone();
            let links_table = self.entry_topics_table.clone();

            let key = point_key(ENTRY_NAMESPACE, &entry.id.to_string());
            let payload = serde_json::to_string(&entry)?;
            let embedding_json = if entry.embedding.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&entry.embedding)?)
            };
            let topic_ids: Vec<String> = entry
                .linked_topics
                .iter()
                .map(ToString::to_string)
                .collect();
            let id = entry.id.to_string();
            let conversation_id = entry.conversation_id.to_string();
            let turn_index = i64::try_from(entry.turn_index)
                .map_err(|_| MemoryError::InvalidEntry("turn index exceeds i64".to_string()))?;
            let ts = entry.timestamp.timestamp_millis();
            let speaker = entry.speaker.clone();

            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table}
                             (key, id, conversation_id, turn_index, ts, speaker, payload)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                        ),
                        rusqlite::params![
                            key,
                            id,
                            conversation_id,
                            turn_index,
                            ts,
                            speaker,
                            payload
                        ],
                    )?;

                    tx.execute(
                        &format!("DELETE FROM {vec_table} WHERE rowid = ?1"),
                        rusqlite::params![key],
                    )?;
                    if let Some(embedding_json) = embedding_json {
                        tx.execute(
                            &format!(
                                "INSERT INTO {vec_table} (rowid, embedding) VALUES (?1, ?2)"
                            ),
                            rusqlite::params![key, embedding_json],
                        )?;
                    }

                    tx.execute(
                        &format!("DELETE FROM {links_table} WHERE entry_key = ?1"),
                        rusqlite::params![key],
                    )?;
                    for topic_id in topic_ids {
                        tx.execute(
                            &format!(
                                "INSERT OR IGNORE INTO {links_table} (entry_key, topic_id)
                                 VALUES (?1, ?2)"
                            ),
                            rusqlite::params![key, topic_id],
                        )?;
                    }

                    tx.commit()?;
                    Ok(())
                })
                .await?;

            Ok(())
        })
    }

    fn get_entry(&self, id: EntryId) -> StoreFuture<'_, MemoryResult<Option<MemoryEntry>>> {
        Box::pin(async move {
            let table = self.entries_table.clone();
            let id = id.to_string();
            let payload = self
                .conn
                .call(move |conn| {
                    let payload = conn
                        .query_row(
                            &format!("SELECT payload FROM {table} WHERE id = ?1"),
                            rusqlite::params![id],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?;
                    Ok(payload)
                })
                .await?;

            match payload {
                Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
                None => Ok(None),
            }
        })
    }

    fn link_entries(&self, a: EntryId, b: EntryId) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            let table = self.entries_table.clone();
            let a_str = a.to_string();
            let b_str = b.to_string();

            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let select = format!("SELECT payload FROM {table} WHERE id = ?1");
                    let update = format!("UPDATE {table} SET payload = ?1 WHERE id = ?2");

                    for (own, other) in [(&a_str, b), (&b_str, a)] {
                        let payload = tx
                            .query_row(&select, rusqlite::params![own], |row| {
                                row.get::<_, String>(0)
                            })
                            .optional()?
                            .ok_or_else(|| {
                                tokio_rusqlite::Error::Other(Box::new(
                                    MemoryError::InvalidEntry(format!("unknown entry {own}")),
                                ))
                            })?;
                        let mut entry: MemoryEntry = serde_json::from_str(&payload)
                            .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                        entry.link_entry(other);
                        let payload = serde_json::to_string(&entry)
                            .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                        tx.execute(&update, rusqlite::params![payload, own])?;
                    }

                    tx.commit()?;
                    Ok(())
                })
                .await?;

            Ok(())
        })
    }

    fn search_entries(
        &self,
        query: Vec<f32>,
        k: usize,
        filters: Option<SearchFilters>,
    ) -> StoreFuture<'_, MemoryResult<Vec<ScoredEntry>>> {
        Box::pin(async move {
            if k == 0 {
                return Ok(Vec::new());
            }

            let table = self.entries_table.clone();
            let vec_table = self.entries_vec_table.clone();
            let links_table = self.entry_topics_table.clone();
            let query_json = serde_json::to_string(&query)?;
            let k_i64 = i64::try_from(k)
                .map_err(|_| MemoryError::InvalidConfig("k exceeds i64".to_string()))?;

            let rows = self
                .conn
                .call(move |conn| {
                    // Scalar and membership filters narrow the candidate keys
                    // first so ranking happens over the filtered set only.
                    let keys: Option<Vec<i64>> = match &filters {
                        Some(filters)
                            if filters.speaker.is_some()
                                || filters.topics_any.is_some()
                                || filters.time_range.is_some() =>
                        {
                            let mut sql = format!("SELECT key FROM {table} WHERE 1=1");
                            let mut params: Vec<Value> = Vec::new();

                            if let Some(speaker) = &filters.speaker {
                                sql.push_str(&format!(" AND speaker = ?{}", params.len() + 1));
                                params.push(Value::Text(speaker.clone()));
                            }
                            if let Some((from, to)) = &filters.time_range {
                                sql.push_str(&format!(
                                    " AND ts >= ?{} AND ts <= ?{}",
                                    params.len() + 1,
                                    params.len() + 2
                                ));
                                params.push(Value::Integer(from.timestamp_millis()));
                                params.push(Value::Integer(to.timestamp_millis()));
                            }
                            if let Some(topics) = &filters.topics_any {
                                if topics.is_empty() {
                                    return Ok(Vec::new());
                                }
                                let placeholders = (0..topics.len())
                                    .map(|i| format!("?{}", params.len() + i + 1))
                                    .collect::<Vec<_>>()
                                    .join(", ");
                                sql.push_str(&format!(
                                    " AND key IN (SELECT entry_key FROM {links_table}
                                      WHERE topic_id IN ({placeholders}))"
                                ));
                                params.extend(
                                    topics.iter().map(|id| Value::Text(id.to_string())),
                                );
                            }

                            let mut stmt = conn.prepare(&sql)?;
                            let keys = stmt
                                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                                    row.get::<_, i64>(0)
                                })?
                                .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                            Some(keys)
                        }
                        _ => None,
                    };

                    if let Some(keys) = &keys
                        && keys.is_empty()
                    {
                        return Ok(Vec::new());
                    }

                    let mut sql = format!(
                        "SELECT e.payload, v.distance
                         FROM {vec_table} v
                         JOIN {table} e ON e.key = v.rowid
                         WHERE v.embedding MATCH ?1 AND k = ?2"
                    );
                    let mut params: Vec<Value> =
                        vec![Value::Text(query_json), Value::Integer(k_i64)];
                    if let Some(keys) = keys {
                        let placeholders = (0..keys.len())
                            .map(|i| format!("?{}", i + 3))
                            .collect::<Vec<_>>()
                            .join(", ");
                        sql.push_str(&format!(" AND v.rowid IN ({placeholders})"));
                        params.extend(keys.into_iter().map(Value::Integer));
                    }
                    sql.push_str(" ORDER BY v.distance");

                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                            let payload: String = row.get(0)?;
                            let distance: f64 = row.get(1)?;
                            Ok((payload, distance))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut results = Vec::with_capacity(rows.len());
            for (payload, distance) in rows {
                let entry: MemoryEntry = serde_json::from_str(&payload)?;
                results.push(ScoredEntry {
                    similarity: 1.0 - distance,
                    entry,
                });
            }
            Ok(results)
        })
    }

    fn list_entries_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, MemoryResult<Vec<MemoryEntry>>> {
        Box::pin(async move {
            let table = self.entries_table.clone();
            let conversation = conversation_id.to_string();
            let payloads = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT payload FROM {table}
                         WHERE conversation_id = ?1
                         ORDER BY turn_index"
                    ))?;
                    let payloads = stmt
                        .query_map(rusqlite::params![conversation], |row| {
                            row.get::<_, String>(0)
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(payloads)
                })
                .await?;

            let mut entries = Vec::with_capacity(payloads.len());
            for payload in payloads {
                entries.push(serde_json::from_str(&payload)?);
            }
            Ok(entries)
        })
    }

    fn upsert_topic(&self, topic: Topic) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            let table = self.topics_table.clone();
            let key = point_key(TOPIC_NAMESPACE, &topic.id.to_string());
            let id = topic.id.to_string();
            let disabled = i64::from(topic.disabled);
            let payload = serde_json::to_string(&topic)?;

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table} (key, id, disabled, payload)
                             VALUES (?1, ?2, ?3, ?4)"
                        ),
                        rusqlite::params![key, id, disabled, payload],
                    )?;
                    Ok(())
                })
                .await?;

            Ok(())
        })
    }

    fn get_topic(&self, id: TopicId) -> StoreFuture<'_, MemoryResult<Option<Topic>>> {
        Box::pin(async move {
            let table = self.topics_table.clone();
            let id = id.to_string();
            let payload = self
                .conn
                .call(move |conn| {
                    let payload = conn
                        .query_row(
                            &format!("SELECT payload FROM {table} WHERE id = ?1"),
                            rusqlite::params![id],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?;
                    Ok(payload)
                })
                .await?;

            match payload {
                Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
                None => Ok(None),
            }
        })
    }

    fn list_topics(&self) -> StoreFuture<'_, MemoryResult<Vec<Topic>>> {
        Box::pin(async move {
            let table = self.topics_table.clone();
            let payloads = self
                .conn
                .call(move |conn| {
                    let mut stmt =
                        conn.prepare(&format!("SELECT payload FROM {table} ORDER BY key"))?;
                    let payloads = stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(payloads)
                })
                .await?;

            let mut topics = Vec::with_capacity(payloads.len());
            for payload in payloads {
                topics.push(serde_json::from_str(&payload)?);
            }
            Ok(topics)
        })
    }

    fn update_topic(&self, topic: Topic) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            let table = self.topics_table.clone();
            let topic_id = topic.id;
            let key = point_key(TOPIC_NAMESPACE, &topic.id.to_string());
            let disabled = i64::from(topic.disabled);
            let payload = serde_json::to_string(&topic)?;

            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!(
                            "UPDATE {table} SET disabled = ?1, payload = ?2 WHERE key = ?3"
                        ),
                        rusqlite::params![disabled, payload, key],
                    )?;
                    Ok(changed)
                })
                .await?;

            if changed == 0 {
                return Err(MemoryError::TopicNotFound(topic_id));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MemoryConfig;
    use crate::storage::sqlite_vec_loader::init_sqlite_vec_extension;
    use chrono::{Duration, Utc};
    use std::path::PathBuf;

    async fn memory_backend(ndims: usize) -> SqliteVectorBackend {
        init_sqlite_vec_extension();
        let mut config = MemoryConfig::default();
        config.embedding.ndims = ndims;
        config.storage.sqlite_path = PathBuf::from(":memory:");
        SqliteVectorBackend::new(&config).await.unwrap()
    }

    fn entry(
        conversation_id: ConversationId,
        turn_index: u64,
        speaker: &str,
        embedding: Vec<f32>,
    ) -> MemoryEntry {
        let mut entry =
            MemoryEntry::new(conversation_id, turn_index, speaker, "persisted text").unwrap();
        entry.embedding = embedding;
        entry
    }

    #[test]
    fn test_point_key_is_stable_and_namespaced() {
        let id = "0b5c1e8a-3f1d-4f4f-9d5a-111111111111";
        assert_eq!(point_key("entry", id), point_key("entry", id));
        assert_ne!(point_key("entry", id), point_key("topic", id));
        assert!(point_key("entry", id) >= 0);
    }

    #[tokio::test]
    async fn test_entry_roundtrip_preserves_domain_id() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        let e = entry(conv, 0, "user", vec![1.0, 0.0, 0.0, 0.0]);
        let id = e.id;
        store.upsert_entry(e.clone()).await.unwrap();
        let loaded = store.get_entry(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.text, e.text);
        assert_eq!(loaded.embedding, e.embedding);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        let mut e = entry(conv, 0, "user", vec![1.0, 0.0, 0.0, 0.0]);
        store.upsert_entry(e.clone()).await.unwrap();
        e.summary = "updated".to_string();
        store.upsert_entry(e.clone()).await.unwrap();

        let results = store
            .search_entries(vec![1.0, 0.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.summary, "updated");
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        let close = entry(conv, 0, "user", vec![1.0, 0.0, 0.0, 0.0]);
        let far = entry(conv, 1, "user", vec![0.0, 1.0, 0.0, 0.0]);
        let close_id = close.id;
        store.upsert_entry(close).await.unwrap();
        store.upsert_entry(far).await.unwrap();

        let results = store
            .search_entries(vec![1.0, 0.1, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.id, close_id);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_filters_match_ephemeral_semantics() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        let topic = TopicId::new();

        let mut matching = entry(conv, 0, "user", vec![1.0, 0.0, 0.0, 0.0]);
        matching.link_topic(topic);
        let matching_id = matching.id;
        let mut wrong_speaker = entry(conv, 1, "assistant", vec![1.0, 0.0, 0.0, 0.0]);
        wrong_speaker.link_topic(topic);
        let no_topic = entry(conv, 2, "user", vec![1.0, 0.0, 0.0, 0.0]);

        store.upsert_entry(matching).await.unwrap();
        store.upsert_entry(wrong_speaker).await.unwrap();
        store.upsert_entry(no_topic).await.unwrap();

        let filters = SearchFilters {
            speaker: Some("user".to_string()),
            topics_any: Some(vec![topic]),
            time_range: Some((Utc::now() - Duration::hours(1), Utc::now())),
        };
        let results = store
            .search_entries(vec![1.0, 0.0, 0.0, 0.0], 10, Some(filters))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, matching_id);
    }

    #[tokio::test]
    async fn test_link_entries_symmetric_in_payload() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        let a = entry(conv, 0, "user", vec![1.0, 0.0, 0.0, 0.0]);
        let b = entry(conv, 1, "assistant", vec![0.0, 1.0, 0.0, 0.0]);
        let (a_id, b_id) = (a.id, b.id);
        store.upsert_entry(a).await.unwrap();
        store.upsert_entry(b).await.unwrap();
        store.link_entries(a_id, b_id).await.unwrap();

        let a = store.get_entry(a_id).await.unwrap().unwrap();
        let b = store.get_entry(b_id).await.unwrap().unwrap();
        assert!(a.linked_entries.contains(&b_id));
        assert!(b.linked_entries.contains(&a_id));
    }

    #[tokio::test]
    async fn test_topic_update_requires_existence() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        let seed = entry(conv, 0, "user", vec![1.0, 0.0, 0.0, 0.0]);
        let topic = Topic::seeded("title", "summary", &seed, 0.1);

        assert!(matches!(
            store.update_topic(topic.clone()).await,
            Err(MemoryError::TopicNotFound(_))
        ));

        store.upsert_topic(topic.clone()).await.unwrap();
        let mut updated = topic.clone();
        updated.disabled = true;
        store.update_topic(updated).await.unwrap();
        let loaded = store.get_topic(topic.id).await.unwrap().unwrap();
        assert!(loaded.disabled);
    }

    #[tokio::test]
    async fn test_list_entries_ordered_by_turn_index() {
        let store = memory_backend(4).await;
        let conv = ConversationId::new();
        for index in [2u64, 0, 1] {
            store
                .upsert_entry(entry(conv, index, "user", vec![1.0, 0.0, 0.0, 0.0]))
                .await
                .unwrap();
        }
        let entries = store.list_entries_by_conversation(conv).await.unwrap();
        let indices: Vec<u64> = entries.iter().map(|e| e.turn_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
