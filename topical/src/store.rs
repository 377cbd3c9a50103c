use crate::{
    content,
    db::DbPool,
    model::{Message, NewMessage, Topic, TopicSummary, User},
};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use time::OffsetDateTime;

/// Maximum number of topics shown on the list page.
pub const RECENT_TOPICS_LIMIT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("topic {0} does not exist")]
    TopicNotFound(i64),
    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Storage operations used by the request handlers.
pub trait TopicStore: Send + Sync {
    /// Topics with at least one message, most recently active first.
    fn recent_topics(&self) -> Result<Vec<TopicSummary>, StoreError>;

    /// A topic and its messages in posting order, content sanitized.
    fn topic(&self, id: i64) -> Result<Option<Topic>, StoreError>;

    fn create_topic(&self, title: &str) -> Result<Topic, StoreError>;

    fn create_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Create a topic and its opening message atomically.
    fn create_topic_with_message(
        &self,
        title: &str,
        content: &str,
        author: &User,
    ) -> Result<Topic, StoreError>;
}

/// [`TopicStore`] backed by a pool of SQLite connections.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn insert_topic(conn: &Connection, title: &str) -> Result<Topic, StoreError> {
    conn.execute("INSERT INTO topics (title) VALUES (?1)", [title])?;
    Ok(Topic {
        id: conn.last_insert_rowid(),
        title: title.into(),
        messages: Vec::new(),
    })
}

fn insert_message(conn: &Connection, message: NewMessage) -> Result<Message, StoreError> {
    let posted = OffsetDateTime::now_utc().unix_timestamp();
    let res = conn.execute(
        "INSERT INTO messages (topic_id, content, author_initials, author_theme, posted) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.topic_id,
            message.content,
            message.author.initials(),
            message.author.theme(),
            posted
        ],
    );
    match res {
        Ok(_) => Ok(Message {
            id: conn.last_insert_rowid(),
            topic_id: message.topic_id,
            content: message.content,
            author_initials: message.author.initials().into(),
            author_theme: message.author.theme(),
            posted,
        }),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Err(StoreError::TopicNotFound(message.topic_id))
        }
        Err(e) => Err(e.into()),
    }
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<TopicSummary> {
    Ok(TopicSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        message_count: row.get(2)?,
        author_initials: row.get(3)?,
        author_theme: row.get(4)?,
        last_posted: row.get(5)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        content: row.get(2)?,
        author_initials: row.get(3)?,
        author_theme: row.get(4)?,
        posted: row.get(5)?,
    })
}

impl TopicStore for SqliteStore {
    fn recent_topics(&self) -> Result<Vec<TopicSummary>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.title, COUNT(m.id),
                (SELECT author_initials FROM messages WHERE topic_id = t.id ORDER BY posted ASC, id ASC LIMIT 1),
                (SELECT author_theme FROM messages WHERE topic_id = t.id ORDER BY posted ASC, id ASC LIMIT 1),
                MAX(m.posted) AS last_posted,
                MAX(m.id) AS last_id
             FROM topics t
             INNER JOIN messages m ON m.topic_id = t.id
             GROUP BY t.id, t.title
             ORDER BY last_posted DESC, last_id DESC
             LIMIT ?1",
        )?;
        let topics = stmt
            .query_map([RECENT_TOPICS_LIMIT], row_to_summary)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(topics)
    }

    fn topic(&self, id: i64) -> Result<Option<Topic>, StoreError> {
        let conn = self.pool.get()?;
        let title: Option<String> = conn
            .query_row("SELECT title FROM topics WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(title) = title else { return Ok(None) };
        let mut stmt = conn.prepare(
            "SELECT id, topic_id, content, author_initials, author_theme, posted FROM messages WHERE topic_id = ?1 ORDER BY posted ASC, id ASC",
        )?;
        let messages = stmt
            .query_map([id], row_to_message)?
            .map(|m| {
                m.map(|mut m| {
                    m.content = content::render(&m.content);
                    m
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Topic {
            id,
            title,
            messages,
        }))
    }

    fn create_topic(&self, title: &str) -> Result<Topic, StoreError> {
        let conn = self.pool.get()?;
        insert_topic(&conn, title)
    }

    fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let conn = self.pool.get()?;
        insert_message(&conn, message)
    }

    fn create_topic_with_message(
        &self,
        title: &str,
        content: &str,
        author: &User,
    ) -> Result<Topic, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut topic = insert_topic(&tx, title)?;
        let message = insert_message(
            &tx,
            NewMessage {
                topic_id: topic.id,
                content: content.into(),
                author: author.clone(),
            },
        )?;
        tx.commit()?;
        topic.messages.push(message);
        Ok(topic)
    }
}
