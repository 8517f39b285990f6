//! Content store and language registry backed by SQLite

use crate::field::{ContentItem, FieldRef};
use crate::language::{ItemId, LanguageTag, TermId};
use crate::store::{ContentStore, LanguageRegistry, StoreError, StoreResult};
use crate::value::FieldValue;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        language TEXT NOT NULL,
        source_id INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_items_source ON items(source_id, language);

    CREATE TABLE IF NOT EXISTS fields (
        item_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (item_id, category, key)
    );

    CREATE TABLE IF NOT EXISTS blobs (
        item_id INTEGER NOT NULL,
        key TEXT NOT NULL,
        value BLOB NOT NULL,
        PRIMARY KEY (item_id, key)
    );

    CREATE TABLE IF NOT EXISTS terms (
        id INTEGER PRIMARY KEY,
        language TEXT NOT NULL,
        group_id INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_terms_group ON terms(group_id, language);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::with_connection(conn)?;
        info!(path = %db_path.display(), "content store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Add a new source item, starting a new translation group
    pub fn insert_source(&self, language: &LanguageTag) -> StoreResult<ItemId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO items (language, source_id) VALUES (?1, NULL)",
            params![language.as_str()],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute("UPDATE items SET source_id = ?1 WHERE id = ?1", params![id])?;
        tx.commit()?;
        debug!(item = id, %language, "inserted source item");
        Ok(ItemId(id as u64))
    }

    /// Register a taxonomy term as a member of term group `group`
    pub fn insert_term(&self, term: TermId, language: &LanguageTag, group: u64) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO terms (id, language, group_id) VALUES (?1, ?2, ?3)",
            params![term.0 as i64, language.as_str(), group as i64],
        )?;
        Ok(())
    }
}

fn parse_language(item: ItemId, raw: &str) -> StoreResult<LanguageTag> {
    LanguageTag::parse(raw).map_err(|e| StoreError::Corrupt {
        item,
        key: "language".to_string(),
        reason: e.to_string(),
    })
}

fn require_item(conn: &Connection, id: ItemId) -> StoreResult<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM items WHERE id = ?1",
            params![id.0 as i64],
            |row| row.get(0),
        )
        .optional()?;
    found.map(|_| ()).ok_or(StoreError::UnknownItem(id))
}

impl ContentStore for SqliteStore {
    fn item(&self, id: ItemId) -> StoreResult<Option<ContentItem>> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT language, source_id FROM items WHERE id = ?1",
                params![id.0 as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(language, source)| {
            Ok(ContentItem {
                id,
                language: parse_language(id, &language)?,
                source: ItemId(source as u64),
            })
        })
        .transpose()
    }

    fn field(&self, id: ItemId, field: &FieldRef) -> StoreResult<Option<FieldValue>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM fields WHERE item_id = ?1 AND category = ?2 AND key = ?3",
                params![id.0 as i64, field.category.to_string(), field.key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                item: id,
                key: field.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    fn set_field(&self, id: ItemId, field: &FieldRef, value: FieldValue) -> StoreResult<()> {
        let conn = self.conn.lock();
        require_item(&conn, id)?;
        let raw = serde_json::to_string(&value)?;
        conn.execute(
            "INSERT OR REPLACE INTO fields (item_id, category, key, value) VALUES (?1, ?2, ?3, ?4)",
            params![id.0 as i64, field.category.to_string(), field.key, raw],
        )?;
        Ok(())
    }

    fn delete_field(&self, id: ItemId, field: &FieldRef) -> StoreResult<()> {
        let conn = self.conn.lock();
        require_item(&conn, id)?;
        conn.execute(
            "DELETE FROM fields WHERE item_id = ?1 AND category = ?2 AND key = ?3",
            params![id.0 as i64, field.category.to_string(), field.key],
        )?;
        Ok(())
    }

    fn blob(&self, id: ItemId, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT value FROM blobs WHERE item_id = ?1 AND key = ?2",
                params![id.0 as i64, key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_blob(&self, id: ItemId, key: &str, blob: &[u8]) -> StoreResult<()> {
        let conn = self.conn.lock();
        require_item(&conn, id)?;
        conn.execute(
            "INSERT OR REPLACE INTO blobs (item_id, key, value) VALUES (?1, ?2, ?3)",
            params![id.0 as i64, key, blob],
        )?;
        Ok(())
    }

    fn delete_blob(&self, id: ItemId, key: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM blobs WHERE item_id = ?1 AND key = ?2",
            params![id.0 as i64, key],
        )?;
        Ok(())
    }
}

impl LanguageRegistry for SqliteStore {
    fn language_of(&self, id: ItemId) -> StoreResult<Option<LanguageTag>> {
        Ok(self.item(id)?.map(|item| item.language))
    }

    fn source_of(&self, id: ItemId) -> StoreResult<Option<ItemId>> {
        Ok(self.item(id)?.map(|item| item.source))
    }

    fn sibling(&self, id: ItemId, language: &LanguageTag) -> StoreResult<Option<ItemId>> {
        let conn = self.conn.lock();
        let sibling: Option<i64> = conn
            .query_row(
                "SELECT other.id FROM items AS this
                 JOIN items AS other ON other.source_id = this.source_id
                 WHERE this.id = ?1 AND other.language = ?2
                 ORDER BY other.id LIMIT 1",
                params![id.0 as i64, language.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sibling.map(|id| ItemId(id as u64)))
    }

    fn translations(&self, id: ItemId) -> StoreResult<Vec<(LanguageTag, ItemId)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT other.language, other.id FROM items AS this
             JOIN items AS other ON other.source_id = this.source_id
             WHERE this.id = ?1 AND other.id != ?1
             ORDER BY other.id",
        )?;
        let rows = stmt.query_map(params![id.0 as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut translations = Vec::new();
        for row in rows {
            let (language, other) = row?;
            let other = ItemId(other as u64);
            translations.push((parse_language(other, &language)?, other));
        }
        Ok(translations)
    }

    fn link_translation(&self, source: ItemId, language: &LanguageTag) -> StoreResult<ItemId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let group: Option<i64> = tx
            .query_row(
                "SELECT source_id FROM items WHERE id = ?1",
                params![source.0 as i64],
                |row| row.get(0),
            )
            .optional()?;
        let group = group.ok_or(StoreError::UnknownItem(source))?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM items WHERE source_id = ?1 AND language = ?2 ORDER BY id LIMIT 1",
                params![group, language.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(ItemId(existing as u64));
        }

        tx.execute(
            "INSERT INTO items (language, source_id) VALUES (?1, ?2)",
            params![language.as_str(), group],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        info!(source = %source, target = id, %language, "created translation item");
        Ok(ItemId(id as u64))
    }

    fn term_sibling(&self, term: TermId, language: &LanguageTag) -> StoreResult<Option<TermId>> {
        let conn = self.conn.lock();
        let sibling: Option<i64> = conn
            .query_row(
                "SELECT other.id FROM terms AS this
                 JOIN terms AS other ON other.group_id = this.group_id
                 WHERE this.id = ?1 AND other.language = ?2
                 ORDER BY other.id LIMIT 1",
                params![term.0 as i64, language.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sibling.map(|id| TermId(id as u64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(s: &str) -> LanguageTag {
        s.parse().unwrap()
    }

    #[test]
    fn test_source_and_translation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let en = store.insert_source(&tag("en")).unwrap();
        let de = store.link_translation(en, &tag("de")).unwrap();

        assert!(store.is_source(en).unwrap());
        assert!(!store.is_source(de).unwrap());
        assert_eq!(store.language_of(de).unwrap(), Some(tag("de")));
        assert_eq!(store.sibling(de, &tag("en")).unwrap(), Some(en));
        assert_eq!(store.link_translation(en, &tag("de")).unwrap(), de);
        assert_eq!(store.translations(en).unwrap(), vec![(tag("de"), de)]);
    }

    #[test]
    fn test_fields_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let en = store.insert_source(&tag("en")).unwrap();
        let value = FieldValue::new(json!({"lat": 1.0, "label": "Office"}));

        store.set_field(en, &FieldRef::keyed("location"), value.clone()).unwrap();
        assert_eq!(store.field(en, &FieldRef::keyed("location")).unwrap(), Some(value));
        assert_eq!(store.field(en, &FieldRef::title()).unwrap(), None);

        store.delete_field(en, &FieldRef::keyed("location")).unwrap();
        assert_eq!(store.field(en, &FieldRef::keyed("location")).unwrap(), None);
    }

    #[test]
    fn test_content_and_keyed_fields_are_distinct() {
        let store = SqliteStore::open_in_memory().unwrap();
        let en = store.insert_source(&tag("en")).unwrap();
        store.set_field(en, &FieldRef::title(), "Built-in".into()).unwrap();
        store.set_field(en, &FieldRef::keyed("title"), "Custom".into()).unwrap();
        assert_eq!(store.field(en, &FieldRef::title()).unwrap(), Some("Built-in".into()));
        assert_eq!(
            store.field(en, &FieldRef::keyed("title")).unwrap(),
            Some("Custom".into())
        );
    }

    #[test]
    fn test_writes_to_unknown_item_fail() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.set_blob(ItemId(5), "k", b"v"),
            Err(StoreError::UnknownItem(ItemId(5)))
        ));
        assert!(store.link_translation(ItemId(5), &tag("de")).is_err());
    }

    #[test]
    fn test_terms() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_term(TermId(3), &tag("en"), 1).unwrap();
        store.insert_term(TermId(4), &tag("fr"), 1).unwrap();
        assert_eq!(store.term_sibling(TermId(3), &tag("fr")).unwrap(), Some(TermId(4)));
        assert_eq!(store.term_sibling(TermId(3), &tag("de")).unwrap(), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.db");

        let en = {
            let store = SqliteStore::open(&path).unwrap();
            let en = store.insert_source(&tag("en")).unwrap();
            store.set_blob(en, "_marker", b"kept").unwrap();
            en
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.blob(en, "_marker").unwrap(), Some(b"kept".to_vec()));
    }
}
