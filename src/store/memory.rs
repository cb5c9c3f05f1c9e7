//! In-memory data source.
//!
//! Holds chats, messages and contacts in vectors and answers queries with
//! the predicates from [`super`]. Used for tests and for running the tool
//! surface without a bridge database.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    contains_ci, rank_contacts, sender_matches, ChatOrder, ChatQuery, MessageOrder, MessageQuery,
    MessageStore, MessageWindow, StoreCounts, StoreError,
};
use crate::model::{Chat, Contact, Jid, Message};

#[derive(Default)]
struct Records {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    contacts: Vec<Contact>,
}

/// Store backed by in-process vectors.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Records>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chat (keyed by address).
    pub async fn insert_chat(&self, chat: Chat) {
        let mut records = self.records.write().await;
        records.chats.retain(|c| c.jid != chat.jid);
        records.chats.push(chat);
    }

    /// Insert or replace a message (keyed by id and chat).
    pub async fn insert_message(&self, message: Message) {
        let mut records = self.records.write().await;
        let key = message.key();
        records.messages.retain(|m| m.key() != key);
        records.messages.push(message);
    }

    /// Insert or replace a contact (keyed by address).
    pub async fn insert_contact(&self, contact: Contact) {
        let mut records = self.records.write().await;
        records.contacts.retain(|c| c.jid != contact.jid);
        records.contacts.push(contact);
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl Records {
    fn chat_view(&self, chat: &Chat, include_last_message: bool) -> Chat {
        let mut view = chat.clone();
        let latest = self
            .messages
            .iter()
            .filter(|m| m.chat_jid == chat.jid)
            .max_by(|a, b| a.chrono_key().cmp(&b.chrono_key()));
        if let Some(last) = latest {
            view.last_message_time = view.last_message_time.max(Some(last.timestamp));
            if include_last_message {
                view.last_message = Some(last.content.clone());
                view.last_sender = Some(last.sender.clone());
                view.last_is_from_me = Some(last.is_from_me);
            }
        }
        if include_last_message {
            view
        } else {
            view.without_last_message()
        }
    }

    fn with_chat_name(&self, message: &Message) -> Message {
        let mut message = message.clone();
        if message.chat_name.is_none() {
            message.chat_name = self
                .chats
                .iter()
                .find(|c| c.jid == message.chat_jid)
                .and_then(|c| c.name.clone());
        }
        message
    }

    fn sorted_chats(&self, order: ChatOrder, include_last_message: bool) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self
            .chats
            .iter()
            .map(|c| self.chat_view(c, include_last_message))
            .collect();
        chats.sort_by(|a, b| order.compare(a, b));
        chats
    }
}

fn non_empty(name: Option<&String>) -> Option<String> {
    name.filter(|n| !n.is_empty()).cloned()
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn find_chat(
        &self,
        jid: &Jid,
        include_last_message: bool,
    ) -> Result<Option<Chat>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .chats
            .iter()
            .find(|c| c.jid == *jid)
            .map(|c| records.chat_view(c, include_last_message)))
    }

    async fn sender_name(&self, jid: &Jid) -> Result<Option<String>, StoreError> {
        let records = self.records.read().await;
        let exact_chat = records
            .chats
            .iter()
            .find(|c| c.jid == *jid)
            .and_then(|c| non_empty(c.name.as_ref()));
        if exact_chat.is_some() {
            return Ok(exact_chat);
        }
        let contact = records
            .contacts
            .iter()
            .find(|c| c.jid == *jid)
            .and_then(|c| non_empty(c.name.as_ref()));
        if contact.is_some() {
            return Ok(contact);
        }
        Ok(records
            .chats
            .iter()
            .filter(|c| !c.is_group() && c.jid.user() == jid.user())
            .find_map(|c| non_empty(c.name.as_ref())))
    }

    async fn search_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError> {
        let records = self.records.read().await;
        let mut matched: Vec<Message> = records
            .messages
            .iter()
            .filter(|m| query.matches(m))
            .map(|m| records.with_chat_name(m))
            .collect();
        matched.sort_by(|a, b| query.order.compare(a, b));
        Ok(matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| records.with_chat_name(m)))
    }

    async fn messages_around(
        &self,
        anchor: &Message,
        before: usize,
        after: usize,
    ) -> Result<MessageWindow, StoreError> {
        let records = self.records.read().await;
        let mut in_chat: Vec<Message> = records
            .messages
            .iter()
            .filter(|m| m.chat_jid == anchor.chat_jid)
            .map(|m| records.with_chat_name(m))
            .collect();
        in_chat.sort_by(|a, b| MessageOrder::Oldest.compare(a, b));

        let anchor_key = anchor.chrono_key();
        let earlier: Vec<Message> = in_chat
            .iter()
            .filter(|m| m.chrono_key() < anchor_key)
            .cloned()
            .collect();
        let skip = earlier.len().saturating_sub(before);
        let later = in_chat
            .iter()
            .filter(|m| m.chrono_key() > anchor_key)
            .take(after)
            .cloned()
            .collect();
        Ok(MessageWindow {
            before: earlier.into_iter().skip(skip).collect(),
            after: later,
        })
    }

    async fn list_chats(&self, query: &ChatQuery) -> Result<Vec<Chat>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .sorted_chats(query.order, query.include_last_message)
            .into_iter()
            .filter(|c| query.matches(c))
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn chats_with_participant(
        &self,
        jid: &Jid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chat>, StoreError> {
        let records = self.records.read().await;
        let involved: HashSet<&Jid> = records
            .messages
            .iter()
            .filter(|m| sender_matches(&m.sender, jid))
            .map(|m| &m.chat_jid)
            .collect();
        Ok(records
            .sorted_chats(ChatOrder::LastActive, true)
            .into_iter()
            .filter(|c| c.jid == *jid || involved.contains(&c.jid))
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn last_interaction(&self, jid: &Jid) -> Result<Option<Message>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .messages
            .iter()
            .filter(|m| sender_matches(&m.sender, jid) || m.chat_jid == *jid)
            .max_by(|a, b| a.chrono_key().cmp(&b.chrono_key()))
            .map(|m| records.with_chat_name(m)))
    }

    async fn search_contacts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Contact>, StoreError> {
        let records = self.records.read().await;
        let hit = |jid: &Jid, name: Option<&String>| {
            !jid.is_group()
                && (contains_ci(jid.as_str(), query)
                    || name.is_some_and(|n| contains_ci(n, query)))
        };
        let mut seen: HashSet<Jid> = HashSet::new();
        let mut contacts = Vec::new();
        for chat in records.chats.iter().filter(|c| hit(&c.jid, c.name.as_ref())) {
            if seen.insert(chat.jid.clone()) {
                contacts.push(Contact::from_jid(chat.jid.clone(), chat.name.clone()));
            }
        }
        for contact in records
            .contacts
            .iter()
            .filter(|c| hit(&c.jid, c.name.as_ref()))
        {
            if seen.insert(contact.jid.clone()) {
                contacts.push(contact.clone());
            }
        }
        Ok(rank_contacts(contacts, limit))
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let records = self.records.read().await;
        Ok(StoreCounts {
            chats: u64::try_from(records.chats.len()).unwrap_or(u64::MAX),
            messages: u64::try_from(records.messages.len()).unwrap_or(u64::MAX),
        })
    }
}
