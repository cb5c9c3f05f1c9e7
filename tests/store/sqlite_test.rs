//! Tests for `src/store/sqlite.rs` against in-memory bridge databases.

use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use whatsapp_mcp::model::{Jid, Message};
use whatsapp_mcp::store::sqlite::SqliteStore;
use whatsapp_mcp::store::{ChatOrder, ChatQuery, MessageOrder, MessageQuery, MessageStore};

const JOHN: &str = "12025551234@s.whatsapp.net";
const FAMILY: &str = "120363000000000001@g.us";
const VICKY: &str = "184125298348272@lid";
const UNNAMED: &str = "15550000000@s.whatsapp.net";

const SEED: &str = r"
INSERT INTO chats (jid, name, last_message_time) VALUES
    ('12025551234@s.whatsapp.net', 'John Doe', '2024-01-15 10:05:00+00:00'),
    ('120363000000000001@g.us', 'Family', '2024-01-15 09:00:00+00:00'),
    ('184125298348272@lid', 'Vicky', '2024-01-14 08:00:00+00:00'),
    ('15550000000@s.whatsapp.net', NULL, NULL);

INSERT INTO messages (id, chat_jid, sender, content, timestamp, is_from_me, media_type) VALUES
    ('m1', '12025551234@s.whatsapp.net', '12025551234', 'Hi there', '2024-01-15 10:00:00+00:00', 0, ''),
    ('m2', '12025551234@s.whatsapp.net', '', 'Lunch tomorrow?', '2024-01-15 10:01:00+00:00', 1, ''),
    ('m3', '12025551234@s.whatsapp.net', '12025551234', 'Sure, lunch at noon', '2024-01-15 10:05:00+00:00', 0, 'image'),
    ('g1', '120363000000000001@g.us', '12025551234@s.whatsapp.net', 'Dinner on sunday', '2024-01-15 09:00:00+00:00', 0, ''),
    ('v1', '184125298348272@lid', '184125298348272@lid', 'hello 100% sure', '2024-01-14 08:00:00+00:00', 0, '');
";

const CONTACTS_SEED: &str = r"
INSERT INTO whatsmeow_contacts (our_jid, their_jid, first_name, full_name, push_name, business_name) VALUES
    ('me@s.whatsapp.net', '19998887777@s.whatsapp.net', 'Ali', 'Alice Smith', 'ali', NULL),
    ('me@s.whatsapp.net', '18880001111@s.whatsapp.net', NULL, '', 'Bobby', NULL),
    ('me@s.whatsapp.net', '120363999999999999@g.us', NULL, 'Alumni Group', NULL, NULL);
";

async fn memory_pool(schema: &str, seed: &str) -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("pool should connect");
    sqlx::raw_sql(schema)
        .execute(&pool)
        .await
        .expect("schema should apply");
    sqlx::raw_sql(seed)
        .execute(&pool)
        .await
        .expect("seed should apply");
    pool
}

async fn seeded_store() -> SqliteStore {
    let messages = memory_pool(include_str!("../../migrations/001_bridge_schema.sql"), SEED).await;
    SqliteStore::from_pools(messages, None)
}

async fn store_with_contacts() -> SqliteStore {
    let messages = memory_pool(include_str!("../../migrations/001_bridge_schema.sql"), SEED).await;
    let contacts = memory_pool(
        include_str!("../../migrations/002_bridge_contacts.sql"),
        CONTACTS_SEED,
    )
    .await;
    SqliteStore::from_pools(messages, Some(contacts))
}

fn query(order: MessageOrder) -> MessageQuery {
    MessageQuery {
        after: None,
        before: None,
        sender: None,
        chat_jid: None,
        text: None,
        order,
        limit: 50,
        offset: 0,
    }
}

fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

fn chat_query(order: ChatOrder) -> ChatQuery {
    ChatQuery {
        text: None,
        order,
        include_last_message: true,
        limit: 50,
        offset: 0,
    }
}

#[tokio::test]
async fn counts_rows() {
    let store = seeded_store().await;
    let counts = store.counts().await.expect("counts");
    assert_eq!(counts.chats, 4);
    assert_eq!(counts.messages, 5);
}

#[tokio::test]
async fn find_chat_with_and_without_last_message() {
    let store = seeded_store().await;
    let john = Jid::from_raw(JOHN);

    let full = store
        .find_chat(&john, true)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(full.name.as_deref(), Some("John Doe"));
    assert_eq!(full.last_message.as_deref(), Some("Sure, lunch at noon"));
    assert_eq!(full.last_sender.as_deref(), Some("12025551234"));
    assert_eq!(full.last_is_from_me, Some(false));
    assert_eq!(
        full.last_message_time,
        NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(10, 5, 0))
    );

    let meta = store
        .find_chat(&john, false)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(meta.last_message, None);
    assert_eq!(meta.last_is_from_me, None);
    assert_eq!(meta.last_message_time, full.last_message_time);

    let missing = store
        .find_chat(&Jid::from_raw("0@s.whatsapp.net"), true)
        .await
        .expect("query");
    assert!(missing.is_none());
}

#[tokio::test]
async fn text_search_is_case_insensitive_and_ordered() {
    let store = seeded_store().await;
    let mut q = query(MessageOrder::Newest);
    q.text = Some("LUNCH".to_owned());
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["m3", "m2"]);

    q.order = MessageOrder::Oldest;
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["m2", "m3"]);
}

#[tokio::test]
async fn like_wildcards_in_text_are_literal() {
    let store = seeded_store().await;
    let mut q = query(MessageOrder::Newest);
    q.text = Some("100%".to_owned());
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["v1"]);

    q.text = Some("_".to_owned());
    assert!(store.search_messages(&q).await.expect("query").is_empty());
}

#[tokio::test]
async fn sender_filter_matches_bare_and_qualified_senders() {
    let store = seeded_store().await;
    let mut q = query(MessageOrder::Newest);
    q.sender = Some(Jid::from_raw(JOHN));
    assert_eq!(
        ids(&store.search_messages(&q).await.expect("query")),
        vec!["m3", "m1", "g1"]
    );
}

#[tokio::test]
async fn time_bounds_are_half_open() {
    let store = seeded_store().await;
    let at = |h, m| NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(h, m, 0));
    let mut q = query(MessageOrder::Oldest);
    q.after = at(10, 1);
    q.before = at(10, 5);
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["m2"]);
}

#[tokio::test]
async fn sub_second_bounds_are_respected() {
    let store = seeded_store().await;
    let ten = |ms| {
        NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_milli_opt(10, 0, 0, ms))
    };
    let mut q = query(MessageOrder::Oldest);
    q.chat_jid = Some(Jid::from_raw(JOHN));

    q.after = ten(500);
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["m2", "m3"]);

    q.after = None;
    q.before = ten(1);
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["m1"]);
}

#[tokio::test]
async fn chat_filter_and_paging() {
    let store = seeded_store().await;
    let mut q = query(MessageOrder::Oldest);
    q.chat_jid = Some(Jid::from_raw(JOHN));
    q.limit = 2;
    q.offset = 1;
    assert_eq!(ids(&store.search_messages(&q).await.expect("query")), vec!["m2", "m3"]);
}

#[tokio::test]
async fn message_rows_are_converted() {
    let store = seeded_store().await;
    let m2 = store
        .message_by_id("m2")
        .await
        .expect("query")
        .expect("exists");
    assert!(m2.is_from_me);
    assert_eq!(m2.chat_name.as_deref(), Some("John Doe"));
    assert_eq!(m2.media_type, None);

    let m3 = store
        .message_by_id("m3")
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(m3.media_type.as_deref(), Some("image"));

    assert!(store.message_by_id("nope").await.expect("query").is_none());
}

#[tokio::test]
async fn window_around_anchor_stays_in_chat() {
    let store = seeded_store().await;
    let anchor = store
        .message_by_id("m2")
        .await
        .expect("query")
        .expect("exists");

    let window = store.messages_around(&anchor, 5, 5).await.expect("query");
    assert_eq!(ids(&window.before), vec!["m1"]);
    assert_eq!(ids(&window.after), vec!["m3"]);

    let empty = store.messages_around(&anchor, 0, 0).await.expect("query");
    assert!(empty.before.is_empty() && empty.after.is_empty());
}

#[tokio::test]
async fn chats_by_activity_and_name() {
    let store = seeded_store().await;
    let jids = |chats: Vec<whatsapp_mcp::model::Chat>| -> Vec<String> {
        chats.into_iter().map(|c| c.jid.as_str().to_owned()).collect()
    };

    let active = store
        .list_chats(&chat_query(ChatOrder::LastActive))
        .await
        .expect("query");
    assert_eq!(jids(active), vec![JOHN, FAMILY, VICKY, UNNAMED]);

    let named = store
        .list_chats(&chat_query(ChatOrder::Name))
        .await
        .expect("query");
    assert_eq!(jids(named), vec![UNNAMED, FAMILY, JOHN, VICKY]);

    let mut filtered = chat_query(ChatOrder::LastActive);
    filtered.text = Some("vic".to_owned());
    assert_eq!(
        jids(store.list_chats(&filtered).await.expect("query")),
        vec![VICKY]
    );
}

#[tokio::test]
async fn participant_chats_and_last_interaction() {
    let store = seeded_store().await;
    let john = Jid::from_raw(JOHN);

    let chats = store
        .chats_with_participant(&john, 10, 0)
        .await
        .expect("query");
    let jids: Vec<&str> = chats.iter().map(|c| c.jid.as_str()).collect();
    assert_eq!(jids, vec![JOHN, FAMILY]);

    let last = store
        .last_interaction(&john)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(last.id, "m3");

    let nobody = store
        .last_interaction(&Jid::from_raw("1@s.whatsapp.net"))
        .await
        .expect("query");
    assert!(nobody.is_none());
}

#[tokio::test]
async fn sender_names_from_chats() {
    let store = seeded_store().await;
    assert_eq!(
        store.sender_name(&Jid::from_raw(JOHN)).await.expect("query"),
        Some("John Doe".to_owned())
    );
    // Same local-part under another domain borrows the named chat.
    assert_eq!(
        store
            .sender_name(&Jid::from_raw("184125298348272@s.whatsapp.net"))
            .await
            .expect("query"),
        Some("Vicky".to_owned())
    );
    assert_eq!(
        store
            .sender_name(&Jid::from_raw(UNNAMED))
            .await
            .expect("query"),
        None
    );
}

#[tokio::test]
async fn sender_names_from_contacts_table() {
    let store = store_with_contacts().await;
    assert_eq!(
        store
            .sender_name(&Jid::from_raw("19998887777@s.whatsapp.net"))
            .await
            .expect("query"),
        Some("Alice Smith".to_owned())
    );
    assert_eq!(
        store
            .sender_name(&Jid::from_raw("18880001111@s.whatsapp.net"))
            .await
            .expect("query"),
        Some("Bobby".to_owned())
    );
}

#[tokio::test]
async fn contact_search_merges_sources_without_groups() {
    let store = store_with_contacts().await;

    let found = store.search_contacts("al", 10).await.expect("query");
    let jids: Vec<&str> = found.iter().map(|c| c.jid.as_str()).collect();
    assert_eq!(jids, vec!["19998887777@s.whatsapp.net"]);

    let doe = store.search_contacts("doe", 10).await.expect("query");
    assert_eq!(doe.len(), 1);
    assert_eq!(
        doe.first().and_then(|c| c.phone_number.as_deref()),
        Some("12025551234")
    );

    assert!(store
        .search_contacts("family", 10)
        .await
        .expect("query")
        .is_empty());
}
