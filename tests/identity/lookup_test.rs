//! Which store lookups the resolver makes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use whatsapp_mcp::identity::IdentityResolver;
use whatsapp_mcp::model::{Chat, Contact, Jid, Message};
use whatsapp_mcp::store::memory::MemoryStore;
use whatsapp_mcp::store::{
    ChatQuery, MessageQuery, MessageStore, MessageWindow, StoreCounts, StoreError,
};

/// Delegates to a [`MemoryStore`] and records every `find_chat` call.
struct RecordingStore {
    inner: MemoryStore,
    chat_lookups: Mutex<Vec<(String, bool)>>,
}

impl RecordingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            chat_lookups: Mutex::new(Vec::new()),
        }
    }

    fn chat_lookups(&self) -> Vec<(String, bool)> {
        self.chat_lookups
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for RecordingStore {
    async fn find_chat(
        &self,
        jid: &Jid,
        include_last_message: bool,
    ) -> Result<Option<Chat>, StoreError> {
        if let Ok(mut lookups) = self.chat_lookups.lock() {
            lookups.push((jid.as_str().to_owned(), include_last_message));
        }
        self.inner.find_chat(jid, include_last_message).await
    }

    async fn sender_name(&self, jid: &Jid) -> Result<Option<String>, StoreError> {
        self.inner.sender_name(jid).await
    }

    async fn search_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError> {
        self.inner.search_messages(query).await
    }

    async fn message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError> {
        self.inner.message_by_id(id).await
    }

    async fn messages_around(
        &self,
        anchor: &Message,
        before: usize,
        after: usize,
    ) -> Result<MessageWindow, StoreError> {
        self.inner.messages_around(anchor, before, after).await
    }

    async fn list_chats(&self, query: &ChatQuery) -> Result<Vec<Chat>, StoreError> {
        self.inner.list_chats(query).await
    }

    async fn chats_with_participant(
        &self,
        jid: &Jid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chat>, StoreError> {
        self.inner.chats_with_participant(jid, limit, offset).await
    }

    async fn last_interaction(&self, jid: &Jid) -> Result<Option<Message>, StoreError> {
        self.inner.last_interaction(jid).await
    }

    async fn search_contacts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Contact>, StoreError> {
        self.inner.search_contacts(query, limit).await
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.inner.counts().await
    }
}

async fn recording_store() -> Arc<RecordingStore> {
    let inner = MemoryStore::new();
    inner
        .insert_chat(Chat::new(
            Jid::from_raw("184125298348272@lid"),
            Some("Vicky".to_owned()),
        ))
        .await;
    inner
        .insert_chat(Chat::new(
            Jid::from_raw("12025551234@s.whatsapp.net"),
            Some("John Doe".to_owned()),
        ))
        .await;
    Arc::new(RecordingStore::new(inner))
}

#[tokio::test]
async fn chat_lookups_are_metadata_only() {
    let store = recording_store().await;
    let resolver = IdentityResolver::new(store.clone());

    for raw in [
        "12025551234",
        "184125298348272",
        "15550000000",
        "184125298348272@lid",
    ] {
        resolver.resolve(raw).await.expect("should resolve");
        resolver.normalize(raw).await.expect("should normalize");
    }

    let lookups = store.chat_lookups();
    assert!(!lookups.is_empty());
    assert!(
        lookups.iter().all(|(_, include_last)| !include_last),
        "resolver fetched last-message fields: {lookups:?}"
    );
}

#[tokio::test]
async fn digits_try_direct_before_linked_id() {
    let store = recording_store().await;
    let resolver = IdentityResolver::new(store.clone());

    resolver
        .normalize("184125298348272")
        .await
        .expect("should normalize");
    let jids: Vec<String> = store.chat_lookups().into_iter().map(|(j, _)| j).collect();
    assert_eq!(
        jids,
        vec![
            "184125298348272@s.whatsapp.net".to_owned(),
            "184125298348272@lid".to_owned(),
        ]
    );
}
