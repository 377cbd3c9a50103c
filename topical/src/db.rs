use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Path that selects a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// Open a connection pool and make sure the schema exists.
///
/// An in-memory database only lives as long as its connection, so `:memory:`
/// gets a pool of exactly one connection.
pub fn open_pool(path: &str) -> Result<DbPool> {
    let (manager, max_size) = if path == MEMORY {
        (SqliteConnectionManager::memory(), 1)
    } else {
        (SqliteConnectionManager::file(path), 8)
    };
    let manager = manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    let conn = pool.get()?;
    init(&conn)?;
    Ok(pool)
}

/// Open a single connection without touching the schema, for maintenance
/// commands.
pub fn open(path: &str) -> Result<Connection> {
    let conn = if path == MEMORY {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Create tables and indexes if they are missing.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Drop every table owned by the application.
pub fn drop_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DROP INDEX IF EXISTS messages_topic_posted;
         DROP TABLE IF EXISTS messages;
         DROP TABLE IF EXISTS topics;",
    )?;
    Ok(())
}

/// Drop and recreate the schema, discarding all topics and messages.
pub fn reset(conn: &Connection) -> Result<()> {
    drop_all(conn)?;
    init(conn)
}

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  topic_id INTEGER NOT NULL REFERENCES topics(id),
  content TEXT NOT NULL,
  author_initials TEXT NOT NULL,
  author_theme INTEGER NOT NULL,
  posted INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_topic_posted ON messages(topic_id, posted);
"#;
