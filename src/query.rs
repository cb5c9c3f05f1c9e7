//! Query engine: filtering, paging, context windows and serialization for
//! messages, chats and contacts.
//!
//! Page sizes are clamped to the caps in [`QueryLimits`] before the data
//! source is queried. Paging addresses matches only; context messages are
//! fetched afterwards around each match on the page and merged so that no
//! message appears twice.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identity::{IdentityError, IdentityResolver, ResolvedIdentity};
use crate::model::{
    parse_timestamp, sender_jid, ChatRecord, ContactRecord, Jid, Message, MessageRecord,
};
use crate::store::{
    ChatOrder, ChatQuery, MessageOrder, MessageQuery, MessageStore, MessageWindow, StoreError,
};

/// Errors from the query engine.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A time bound could not be parsed.
    #[error("invalid {field} timestamp: {value:?}")]
    InvalidTimestamp {
        /// Argument name (`after` or `before`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Identifier normalization failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The data source failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Caps and default page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Hard cap on `list_messages` page size.
    pub max_messages: usize,
    /// Hard cap on chat listing page size.
    pub max_chats: usize,
    /// `list_messages` page size when none is given.
    pub default_message_limit: usize,
    /// `list_chats` page size when none is given.
    pub default_chat_limit: usize,
    /// `get_contact_chats` page size when none is given.
    pub default_contact_chats_limit: usize,
    /// Maximum contacts returned by a search.
    pub max_contact_results: usize,
    /// Cap on each side of a context window.
    pub max_context_window: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_messages: 500,
            max_chats: 200,
            default_message_limit: 50,
            default_chat_limit: 50,
            default_contact_chats_limit: 20,
            max_contact_results: 50,
            max_context_window: 50,
        }
    }
}

/// Context window size for `get_message_context` when none is given.
pub const DEFAULT_MESSAGE_CONTEXT: usize = 5;

/// Arguments of `list_messages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListMessagesArgs {
    /// Inclusive lower bound, ISO-8601.
    pub after: Option<String>,
    /// Exclusive upper bound, ISO-8601.
    pub before: Option<String>,
    /// Sender identifier, resolved before comparison.
    pub sender_phone_number: Option<String>,
    /// Chat address.
    pub chat_jid: Option<String>,
    /// Content substring.
    pub query: Option<String>,
    /// Requested page size.
    pub limit: Option<usize>,
    /// Zero-based page.
    pub page: usize,
    /// Whether to decorate matches with surrounding messages.
    pub include_context: bool,
    /// Messages before each match.
    pub context_before: usize,
    /// Messages after each match.
    pub context_after: usize,
    /// Primary ordering.
    pub sort_by: MessageOrder,
}

impl Default for ListMessagesArgs {
    fn default() -> Self {
        Self {
            after: None,
            before: None,
            sender_phone_number: None,
            chat_jid: None,
            query: None,
            limit: None,
            page: 0,
            include_context: true,
            context_before: 1,
            context_after: 1,
            sort_by: MessageOrder::Newest,
        }
    }
}

/// Arguments of `list_chats`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListChatsArgs {
    /// Name or address substring.
    pub query: Option<String>,
    /// Requested page size.
    pub limit: Option<usize>,
    /// Zero-based page.
    pub page: usize,
    /// Whether to fill last-message fields.
    pub include_last_message: bool,
    /// Ordering.
    pub sort_by: ChatOrder,
}

impl Default for ListChatsArgs {
    fn default() -> Self {
        Self {
            query: None,
            limit: None,
            page: 0,
            include_last_message: true,
            sort_by: ChatOrder::LastActive,
        }
    }
}

/// A message with the messages immediately around it in its chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageContext {
    /// The requested message.
    pub message: MessageRecord,
    /// Preceding messages, chronological.
    pub before: Vec<MessageRecord>,
    /// Following messages, chronological.
    pub after: Vec<MessageRecord>,
}

/// Page size and offset for a request.
fn page_window(
    requested: Option<usize>,
    default: usize,
    cap: usize,
    page: usize,
) -> (usize, usize) {
    let limit = requested.unwrap_or(default).min(cap);
    (limit, page.saturating_mul(limit))
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_bound(
    field: &'static str,
    value: Option<&String>,
) -> Result<Option<chrono::NaiveDateTime>, QueryError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| QueryError::InvalidTimestamp {
                field,
                value: raw.to_owned(),
            }),
    }
}

/// Merge each match with its context window.
///
/// Matches keep their primary order. Each match becomes a group of
/// `before + match + after`; groups that share a message are merged into
/// the position of the earliest one. Within a group messages are
/// chronological and unique. The flag is `true` for context-only messages.
pub fn merge_context(matches: Vec<Message>, windows: Vec<MessageWindow>) -> Vec<(Message, bool)> {
    let match_keys: HashSet<(String, String)> = matches.iter().map(Message::key).collect();
    let mut groups: Vec<Vec<Message>> = Vec::new();

    for (anchor, window) in matches.into_iter().zip(windows) {
        let mut group = window.before;
        group.push(anchor);
        group.extend(window.after);
        let keys: HashSet<(String, String)> = group.iter().map(Message::key).collect();

        let overlapping: Vec<usize> = groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.iter().any(|m| keys.contains(&m.key())))
            .map(|(i, _)| i)
            .collect();

        let Some(&first) = overlapping.first() else {
            groups.push(normalize_group(group));
            continue;
        };
        let mut merged = Vec::new();
        for &i in overlapping.iter().rev() {
            merged.extend(groups.remove(i));
        }
        merged.extend(group);
        groups.insert(first, normalize_group(merged));
    }

    groups
        .into_iter()
        .flatten()
        .map(|m| {
            let is_context = !match_keys.contains(&m.key());
            (m, is_context)
        })
        .collect()
}

fn normalize_group(mut group: Vec<Message>) -> Vec<Message> {
    group.sort_by(|a, b| MessageOrder::Oldest.compare(a, b));
    let mut seen = HashSet::new();
    group.retain(|m| seen.insert(m.key()));
    group
}

/// Per-call sender-name memo.
struct SenderNames<'a> {
    store: &'a dyn MessageStore,
    cache: HashMap<Jid, Option<String>>,
}

impl<'a> SenderNames<'a> {
    fn new(store: &'a dyn MessageStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    async fn record(&mut self, msg: &Message) -> Result<MessageRecord, StoreError> {
        if msg.is_from_me {
            return Ok(MessageRecord::from_message(msg, None));
        }
        let jid = sender_jid(&msg.sender);
        let name = match self.cache.get(&jid) {
            Some(cached) => cached.clone(),
            None => {
                let found = self.store.sender_name(&jid).await?;
                self.cache.insert(jid, found.clone());
                found
            }
        };
        Ok(MessageRecord::from_message(msg, name.as_deref()))
    }
}

/// Answers the read-side tools against a [`MessageStore`].
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn MessageStore>,
    resolver: IdentityResolver,
    limits: QueryLimits,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Create an engine over a data source with the given limits.
    pub fn new(store: Arc<dyn MessageStore>, limits: QueryLimits) -> Self {
        Self {
            resolver: IdentityResolver::new(Arc::clone(&store)),
            store,
            limits,
        }
    }

    /// The configured limits.
    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Search messages with optional context decoration.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for unparseable time bounds, an unusable
    /// sender identifier, or a failing data source.
    pub async fn list_messages(
        &self,
        args: &ListMessagesArgs,
    ) -> Result<Vec<MessageRecord>, QueryError> {
        let after = parse_bound("after", args.after.as_ref())?;
        let before = parse_bound("before", args.before.as_ref())?;
        let sender = match non_blank(args.sender_phone_number.as_ref()) {
            Some(raw) => Some(self.resolver.normalize(raw).await?.jid),
            None => None,
        };
        let (limit, offset) = page_window(
            args.limit,
            self.limits.default_message_limit,
            self.limits.max_messages,
            args.page,
        );
        let query = MessageQuery {
            after,
            before,
            sender,
            chat_jid: non_blank(args.chat_jid.as_ref()).map(Jid::from_raw),
            text: non_blank(args.query.as_ref()).map(str::to_owned),
            order: args.sort_by,
            limit,
            offset,
        };

        let matches = self.store.search_messages(&query).await?;
        debug!(matches = matches.len(), limit, offset, "list_messages");

        let context_before = args.context_before.min(self.limits.max_context_window);
        let context_after = args.context_after.min(self.limits.max_context_window);
        let decorated = if args.include_context && (context_before > 0 || context_after > 0) {
            let mut windows = Vec::with_capacity(matches.len());
            for anchor in &matches {
                windows.push(
                    self.store
                        .messages_around(anchor, context_before, context_after)
                        .await?,
                );
            }
            merge_context(matches, windows)
        } else {
            matches.into_iter().map(|m| (m, false)).collect()
        };

        let mut names = SenderNames::new(self.store.as_ref());
        let mut records = Vec::with_capacity(decorated.len());
        for (msg, is_context) in &decorated {
            let record = names.record(msg).await?;
            records.push(if *is_context { record.as_context() } else { record });
        }
        Ok(records)
    }

    /// List chats.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Store`] if the data source fails.
    pub async fn list_chats(&self, args: &ListChatsArgs) -> Result<Vec<ChatRecord>, QueryError> {
        let (limit, offset) = page_window(
            args.limit,
            self.limits.default_chat_limit,
            self.limits.max_chats,
            args.page,
        );
        let query = ChatQuery {
            text: non_blank(args.query.as_ref()).map(str::to_owned),
            order: args.sort_by,
            include_last_message: args.include_last_message,
            limit,
            offset,
        };
        let chats = self.store.list_chats(&query).await?;
        Ok(chats.iter().map(ChatRecord::from).collect())
    }

    /// Look up one chat by address.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Store`] if the data source fails.
    pub async fn get_chat(
        &self,
        chat_jid: &str,
        include_last_message: bool,
    ) -> Result<Option<ChatRecord>, QueryError> {
        let jid = Jid::from_raw(chat_jid.trim());
        let chat = self.store.find_chat(&jid, include_last_message).await?;
        Ok(chat.as_ref().map(ChatRecord::from))
    }

    /// The direct chat for a contact identifier, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an unusable identifier or a failing store.
    pub async fn get_direct_chat_by_contact(
        &self,
        identifier: &str,
    ) -> Result<Option<ChatRecord>, QueryError> {
        let normalized = self.resolver.normalize(identifier).await?;
        if normalized.chat.is_none() || normalized.jid.is_group() {
            return Ok(None);
        }
        let chat = self.store.find_chat(&normalized.jid, true).await?;
        Ok(chat.as_ref().map(ChatRecord::from))
    }

    /// Chats involving a contact, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an unusable identifier or a failing store.
    pub async fn get_contact_chats(
        &self,
        identifier: &str,
        limit: Option<usize>,
        page: usize,
    ) -> Result<Vec<ChatRecord>, QueryError> {
        let jid = self.resolver.normalize(identifier).await?.jid;
        let (limit, offset) = page_window(
            limit,
            self.limits.default_contact_chats_limit,
            self.limits.max_chats,
            page,
        );
        let chats = self.store.chats_with_participant(&jid, limit, offset).await?;
        Ok(chats.iter().map(ChatRecord::from).collect())
    }

    /// Most recent message involving a contact.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an unusable identifier or a failing store.
    pub async fn get_last_interaction(
        &self,
        identifier: &str,
    ) -> Result<Option<MessageRecord>, QueryError> {
        let jid = self.resolver.normalize(identifier).await?.jid;
        let Some(msg) = self.store.last_interaction(&jid).await? else {
            return Ok(None);
        };
        let mut names = SenderNames::new(self.store.as_ref());
        Ok(Some(names.record(&msg).await?))
    }

    /// A message with up to `before`/`after` neighbours in its chat.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Store`] if the data source fails.
    pub async fn get_message_context(
        &self,
        message_id: &str,
        before: Option<usize>,
        after: Option<usize>,
    ) -> Result<Option<MessageContext>, QueryError> {
        let Some(anchor) = self.store.message_by_id(message_id).await? else {
            return Ok(None);
        };
        let cap = self.limits.max_context_window;
        let window = self
            .store
            .messages_around(
                &anchor,
                before.unwrap_or(DEFAULT_MESSAGE_CONTEXT).min(cap),
                after.unwrap_or(DEFAULT_MESSAGE_CONTEXT).min(cap),
            )
            .await?;

        let mut names = SenderNames::new(self.store.as_ref());
        let message = names.record(&anchor).await?;
        let mut before_records = Vec::with_capacity(window.before.len());
        for msg in &window.before {
            before_records.push(names.record(msg).await?.as_context());
        }
        let mut after_records = Vec::with_capacity(window.after.len());
        for msg in &window.after {
            after_records.push(names.record(msg).await?.as_context());
        }
        Ok(Some(MessageContext {
            message,
            before: before_records,
            after: after_records,
        }))
    }

    /// Contacts whose name or address contains `query`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Store`] if the data source fails.
    pub async fn search_contacts(&self, query: &str) -> Result<Vec<ContactRecord>, QueryError> {
        let contacts = self
            .store
            .search_contacts(query.trim(), self.limits.max_contact_results)
            .await?;
        Ok(contacts.iter().map(ContactRecord::from).collect())
    }

    /// Resolve an identifier to an address and display name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Identity`] for unusable input or a failing store.
    pub async fn get_contact(&self, identifier: &str) -> Result<ResolvedIdentity, QueryError> {
        Ok(self.resolver.resolve(identifier).await?)
    }
}
