//! SQLite data source over the bridge's store files.
//!
//! The bridge writes `messages.db` (tables `chats` and `messages`) and keeps
//! its session store in `whatsapp.db`, whose `whatsmeow_contacts` table is an
//! optional extra source of names. Both are opened read-only.
//!
//! Timestamps are compared as text. The bridge writes them as
//! `YYYY-MM-DD HH:MM:SS[.fff]±HH:MM`, so bounds are bound in the same layout.

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use super::{
    rank_contacts, ChatOrder, ChatQuery, MessageOrder, MessageQuery, MessageStore, MessageWindow,
    StoreCounts, StoreError,
};
use crate::model::{parse_timestamp, Chat, Contact, Jid, Message};

/// Connections per pool. Reads only, so a handful is plenty.
const POOL_MAX_CONNECTIONS: u32 = 4;

/// Row type for message queries:
/// id, chat_jid, sender, content, timestamp, is_from_me, media_type, chat_name.
type MessageRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
);

/// Row type for chat queries:
/// jid, name, last_message_time, last_message, last_sender, last_is_from_me.
type ChatRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
);

const MESSAGE_SELECT: &str = "SELECT m.id, m.chat_jid, m.sender, m.content, \
     CAST(m.timestamp AS TEXT), CAST(m.is_from_me AS INTEGER), m.media_type, c.name \
     FROM messages m LEFT JOIN chats c ON m.chat_jid = c.jid";

const CHAT_COLUMNS_WITH_LAST: &str = "c.jid, c.name, CAST(c.last_message_time AS TEXT), \
     (SELECT lm.content FROM messages lm WHERE lm.chat_jid = c.jid \
      ORDER BY lm.timestamp DESC, lm.id DESC LIMIT 1), \
     (SELECT lm.sender FROM messages lm WHERE lm.chat_jid = c.jid \
      ORDER BY lm.timestamp DESC, lm.id DESC LIMIT 1), \
     (SELECT CAST(lm.is_from_me AS INTEGER) FROM messages lm WHERE lm.chat_jid = c.jid \
      ORDER BY lm.timestamp DESC, lm.id DESC LIMIT 1)";

const CHAT_COLUMNS_META: &str =
    "c.jid, c.name, CAST(c.last_message_time AS TEXT), NULL, NULL, NULL";

const LAST_ACTIVE_ORDER: &str =
    " ORDER BY c.last_message_time IS NULL, c.last_message_time DESC, c.jid ASC";

const NAME_ORDER: &str = " ORDER BY LOWER(COALESCE(NULLIF(c.name, ''), c.jid)) ASC, c.jid ASC";

const CONTACT_NAME_EXPR: &str = "COALESCE(NULLIF(full_name, ''), NULLIF(push_name, ''), \
     NULLIF(first_name, ''), NULLIF(business_name, ''))";

/// Store reading the bridge's SQLite files.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    messages: SqlitePool,
    contacts: Option<SqlitePool>,
}

impl SqliteStore {
    /// Open the bridge databases read-only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if either file cannot be opened.
    pub async fn connect(
        messages_db: &Path,
        contacts_db: Option<&Path>,
    ) -> Result<Self, StoreError> {
        let messages = open_read_only(messages_db).await?;
        let contacts = match contacts_db {
            Some(path) => Some(open_read_only(path).await?),
            None => None,
        };
        info!(
            messages_db = %messages_db.display(),
            contacts_db = ?contacts_db,
            "bridge store opened"
        );
        Ok(Self { messages, contacts })
    }

    /// Wrap existing pools (used by tests with in-memory databases).
    pub fn from_pools(messages: SqlitePool, contacts: Option<SqlitePool>) -> Self {
        Self { messages, contacts }
    }

    async fn contact_name(&self, jid: &Jid) -> Result<Option<String>, StoreError> {
        let Some(pool) = &self.contacts else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {CONTACT_NAME_EXPR} FROM whatsmeow_contacts WHERE their_jid = ?1 LIMIT 1"
        );
        let row: Option<(Option<String>,)> = sqlx::query_as(&sql)
            .bind(jid.as_str())
            .fetch_optional(pool)
            .await?;
        Ok(row.and_then(|(name,)| name))
    }
}

async fn open_read_only(path: &Path) -> Result<SqlitePool, StoreError> {
    let opts = SqliteConnectOptions::new().filename(path).read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .connect_with(opts)
        .await?;
    Ok(pool)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn contains_pattern(text: &str) -> String {
    format!("%{}%", escape_like(&text.to_lowercase()))
}

fn qualified_pattern(user: &str) -> String {
    format!("{}@%", escape_like(user))
}

/// Bound in the bridge's text layout. `%.f` prints nothing for whole seconds,
/// and `+` sorts below `.`, so stored `...:SS+00:00` stays below `...:SS.5`.
fn db_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn message_from_row(row: MessageRow) -> Result<Message, StoreError> {
    let (id, chat_jid, sender, content, timestamp, is_from_me, media_type, chat_name) = row;
    let raw = timestamp.unwrap_or_default();
    let timestamp = parse_timestamp(&raw).ok_or_else(|| {
        StoreError::MalformedRow(format!("message {id} has unparseable timestamp {raw:?}"))
    })?;
    Ok(Message {
        id,
        timestamp,
        sender: sender.unwrap_or_default(),
        content: content.unwrap_or_default(),
        is_from_me: is_from_me.unwrap_or(0) != 0,
        chat_jid: Jid::from_raw(chat_jid),
        chat_name,
        media_type: media_type.filter(|m| !m.is_empty()),
    })
}

fn chat_from_row(row: ChatRow) -> Result<Chat, StoreError> {
    let (jid, name, last_time, last_message, last_sender, last_is_from_me) = row;
    let last_message_time = match last_time.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
            StoreError::MalformedRow(format!("chat {jid} has unparseable timestamp {raw:?}"))
        })?),
    };
    Ok(Chat {
        jid: Jid::from_raw(jid),
        name,
        last_message_time,
        last_message,
        last_sender,
        last_is_from_me: last_is_from_me.map(|v| v != 0),
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn find_chat(
        &self,
        jid: &Jid,
        include_last_message: bool,
    ) -> Result<Option<Chat>, StoreError> {
        let columns = if include_last_message {
            CHAT_COLUMNS_WITH_LAST
        } else {
            CHAT_COLUMNS_META
        };
        let sql = format!("SELECT {columns} FROM chats c WHERE c.jid = ?1");
        let row: Option<ChatRow> = sqlx::query_as(&sql)
            .bind(jid.as_str())
            .fetch_optional(&self.messages)
            .await?;
        row.map(chat_from_row).transpose()
    }

    async fn sender_name(&self, jid: &Jid) -> Result<Option<String>, StoreError> {
        let exact: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM chats WHERE jid = ?1 AND name IS NOT NULL AND name != '' LIMIT 1",
        )
        .bind(jid.as_str())
        .fetch_optional(&self.messages)
        .await?;
        if let Some((name,)) = exact {
            return Ok(Some(name));
        }

        if let Some(name) = self.contact_name(jid).await? {
            return Ok(Some(name));
        }

        let sibling: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM chats WHERE jid LIKE ?1 ESCAPE '\\' AND jid NOT LIKE '%@g.us' \
             AND name IS NOT NULL AND name != '' ORDER BY jid LIMIT 1",
        )
        .bind(qualified_pattern(jid.user()))
        .fetch_optional(&self.messages)
        .await?;
        if sibling.is_none() {
            debug!(jid = %jid, "no display name for address");
        }
        Ok(sibling.map(|(name,)| name))
    }

    async fn search_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(MESSAGE_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(after) = &query.after {
            qb.push(" AND m.timestamp >= ").push_bind(db_timestamp(after));
        }
        if let Some(before) = &query.before {
            qb.push(" AND m.timestamp < ").push_bind(db_timestamp(before));
        }
        if let Some(sender) = &query.sender {
            qb.push(" AND (m.sender = ")
                .push_bind(sender.user().to_owned())
                .push(" OR m.sender LIKE ")
                .push_bind(qualified_pattern(sender.user()))
                .push(" ESCAPE '\\')");
        }
        if let Some(chat) = &query.chat_jid {
            qb.push(" AND m.chat_jid = ")
                .push_bind(chat.as_str().to_owned());
        }
        if let Some(text) = &query.text {
            qb.push(" AND LOWER(m.content) LIKE ")
                .push_bind(contains_pattern(text))
                .push(" ESCAPE '\\'");
        }
        qb.push(match query.order {
            MessageOrder::Newest => " ORDER BY m.timestamp DESC, m.id DESC",
            MessageOrder::Oldest => " ORDER BY m.timestamp ASC, m.id ASC",
        });
        qb.push(" LIMIT ")
            .push_bind(to_i64(query.limit))
            .push(" OFFSET ")
            .push_bind(to_i64(query.offset));

        let rows: Vec<MessageRow> = qb.build_query_as().fetch_all(&self.messages).await?;
        debug!(rows = rows.len(), "message search");
        rows.into_iter().map(message_from_row).collect()
    }

    async fn message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1 LIMIT 1");
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.messages)
            .await?;
        row.map(message_from_row).transpose()
    }

    async fn messages_around(
        &self,
        anchor: &Message,
        before: usize,
        after: usize,
    ) -> Result<MessageWindow, StoreError> {
        let anchor_ts = "(SELECT a.timestamp FROM messages a WHERE a.id = ?2 AND a.chat_jid = ?1)";
        let before_sql = format!(
            "{MESSAGE_SELECT} WHERE m.chat_jid = ?1 \
             AND (m.timestamp < {anchor_ts} OR (m.timestamp = {anchor_ts} AND m.id < ?2)) \
             ORDER BY m.timestamp DESC, m.id DESC LIMIT ?3"
        );
        let after_sql = format!(
            "{MESSAGE_SELECT} WHERE m.chat_jid = ?1 \
             AND (m.timestamp > {anchor_ts} OR (m.timestamp = {anchor_ts} AND m.id > ?2)) \
             ORDER BY m.timestamp ASC, m.id ASC LIMIT ?3"
        );

        let earlier: Vec<MessageRow> = sqlx::query_as(&before_sql)
            .bind(anchor.chat_jid.as_str())
            .bind(&anchor.id)
            .bind(to_i64(before))
            .fetch_all(&self.messages)
            .await?;
        let later: Vec<MessageRow> = sqlx::query_as(&after_sql)
            .bind(anchor.chat_jid.as_str())
            .bind(&anchor.id)
            .bind(to_i64(after))
            .fetch_all(&self.messages)
            .await?;

        let mut before_msgs = earlier
            .into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        before_msgs.reverse();
        let after_msgs = later
            .into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MessageWindow {
            before: before_msgs,
            after: after_msgs,
        })
    }

    async fn list_chats(&self, query: &ChatQuery) -> Result<Vec<Chat>, StoreError> {
        let columns = if query.include_last_message {
            CHAT_COLUMNS_WITH_LAST
        } else {
            CHAT_COLUMNS_META
        };
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {columns} FROM chats c"));
        if let Some(text) = &query.text {
            let pattern = contains_pattern(text);
            qb.push(" WHERE (LOWER(c.name) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(c.jid) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        qb.push(match query.order {
            ChatOrder::LastActive => LAST_ACTIVE_ORDER,
            ChatOrder::Name => NAME_ORDER,
        });
        qb.push(" LIMIT ")
            .push_bind(to_i64(query.limit))
            .push(" OFFSET ")
            .push_bind(to_i64(query.offset));

        let rows: Vec<ChatRow> = qb.build_query_as().fetch_all(&self.messages).await?;
        rows.into_iter().map(chat_from_row).collect()
    }

    async fn chats_with_participant(
        &self,
        jid: &Jid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chat>, StoreError> {
        let sql = format!(
            "SELECT {CHAT_COLUMNS_WITH_LAST} FROM chats c WHERE c.jid = ?1 OR EXISTS \
             (SELECT 1 FROM messages m WHERE m.chat_jid = c.jid \
              AND (m.sender = ?2 OR m.sender LIKE ?3 ESCAPE '\\')){LAST_ACTIVE_ORDER} \
             LIMIT ?4 OFFSET ?5"
        );
        let rows: Vec<ChatRow> = sqlx::query_as(&sql)
            .bind(jid.as_str())
            .bind(jid.user())
            .bind(qualified_pattern(jid.user()))
            .bind(to_i64(limit))
            .bind(to_i64(offset))
            .fetch_all(&self.messages)
            .await?;
        rows.into_iter().map(chat_from_row).collect()
    }

    async fn last_interaction(&self, jid: &Jid) -> Result<Option<Message>, StoreError> {
        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.sender = ?1 OR m.sender LIKE ?2 ESCAPE '\\' \
             OR m.chat_jid = ?3 ORDER BY m.timestamp DESC, m.id DESC LIMIT 1"
        );
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(jid.user())
            .bind(qualified_pattern(jid.user()))
            .bind(jid.as_str())
            .fetch_optional(&self.messages)
            .await?;
        row.map(message_from_row).transpose()
    }

    async fn search_contacts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Contact>, StoreError> {
        let pattern = contains_pattern(query);
        let chat_sql = format!(
            "SELECT {CHAT_COLUMNS_META} FROM chats c \
             WHERE (LOWER(c.name) LIKE ?1 ESCAPE '\\' OR LOWER(c.jid) LIKE ?1 ESCAPE '\\') \
             AND c.jid NOT LIKE '%@g.us' \
             ORDER BY LOWER(COALESCE(NULLIF(c.name, ''), c.jid)) ASC LIMIT ?2"
        );
        let chat_rows: Vec<ChatRow> = sqlx::query_as(&chat_sql)
            .bind(pattern.clone())
            .bind(to_i64(limit))
            .fetch_all(&self.messages)
            .await?;

        let mut contacts: Vec<Contact> = Vec::new();
        for row in chat_rows {
            let chat = chat_from_row(row)?;
            contacts.push(Contact::from_jid(chat.jid, chat.name));
        }

        if let Some(pool) = &self.contacts {
            let sql = format!(
                "SELECT their_jid, {CONTACT_NAME_EXPR} FROM whatsmeow_contacts \
                 WHERE (LOWER(COALESCE(full_name, '')) LIKE ?1 ESCAPE '\\' \
                 OR LOWER(COALESCE(push_name, '')) LIKE ?1 ESCAPE '\\' \
                 OR LOWER(COALESCE(first_name, '')) LIKE ?1 ESCAPE '\\' \
                 OR LOWER(COALESCE(business_name, '')) LIKE ?1 ESCAPE '\\' \
                 OR LOWER(their_jid) LIKE ?1 ESCAPE '\\') \
                 AND their_jid NOT LIKE '%@g.us' LIMIT ?2"
            );
            let rows: Vec<(String, Option<String>)> = sqlx::query_as(&sql)
                .bind(pattern)
                .bind(to_i64(limit))
                .fetch_all(pool)
                .await?;
            for (jid, name) in rows {
                let jid = Jid::from_raw(jid);
                if contacts.iter().all(|c| c.jid != jid) {
                    contacts.push(Contact::from_jid(jid, name));
                }
            }
        }

        Ok(rank_contacts(contacts, limit))
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let (chats,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.messages)
            .await?;
        let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.messages)
            .await?;
        Ok(StoreCounts {
            chats: u64::try_from(chats).unwrap_or(0),
            messages: u64::try_from(messages).unwrap_or(0),
        })
    }
}
