//! Identifier resolution against an in-memory store.

use std::sync::Arc;

use serde_json::json;

use whatsapp_mcp::identity::{IdentityError, IdentityResolver};
use whatsapp_mcp::model::{Chat, Contact, Jid};
use whatsapp_mcp::store::memory::MemoryStore;

async fn resolver_with(chats: Vec<Chat>, contacts: Vec<Contact>) -> IdentityResolver {
    let store = MemoryStore::new();
    for chat in chats {
        store.insert_chat(chat).await;
    }
    for contact in contacts {
        store.insert_contact(contact).await;
    }
    IdentityResolver::new(Arc::new(store))
}

fn chat(jid: &str, name: Option<&str>) -> Chat {
    Chat::new(Jid::from_raw(jid), name.map(str::to_owned))
}

#[tokio::test]
async fn phone_digits_resolve_to_named_direct_chat() {
    let resolver = resolver_with(
        vec![chat("12025551234@s.whatsapp.net", Some("John Doe"))],
        vec![],
    )
    .await;

    let identity = resolver.resolve("12025551234").await.expect("should resolve");
    assert_eq!(identity.jid.as_str(), "12025551234@s.whatsapp.net");
    assert!(!identity.is_lid());
    assert_eq!(identity.phone_number(), Some("12025551234"));
    assert_eq!(identity.lid(), None);
    assert_eq!(identity.name, "John Doe");
    assert!(identity.resolved);

    let value = serde_json::to_value(&identity).expect("serializes");
    assert_eq!(
        value,
        json!({
            "jid": "12025551234@s.whatsapp.net",
            "is_lid": false,
            "phone_number": "12025551234",
            "lid": null,
            "name": "John Doe",
            "display_name": "John Doe",
            "resolved": true
        })
    );
}

#[tokio::test]
async fn digits_fall_back_to_linked_id_chat() {
    let resolver = resolver_with(vec![chat("184125298348272@lid", Some("Vicky"))], vec![]).await;

    let identity = resolver
        .resolve("184125298348272")
        .await
        .expect("should resolve");
    assert_eq!(identity.jid.as_str(), "184125298348272@lid");
    assert!(identity.is_lid());
    assert_eq!(identity.phone_number(), None);
    assert_eq!(identity.lid(), Some("184125298348272"));
    assert_eq!(identity.name, "Vicky");
    assert!(identity.resolved);
}

#[tokio::test]
async fn unknown_linked_id_is_unresolved() {
    let resolver = resolver_with(vec![], vec![]).await;

    let identity = resolver
        .resolve("184125298348272@lid")
        .await
        .expect("should resolve");
    assert!(!identity.resolved);
    assert_eq!(identity.name, "184125298348272");
    assert_eq!(identity.display_name, "184125298348272");
    assert!(identity.is_lid());
}

#[tokio::test]
async fn digits_without_any_chat_keep_direct_form() {
    let resolver = resolver_with(vec![], vec![]).await;

    let normalized = resolver
        .normalize("+1 202-555-9999")
        .await
        .expect("should normalize");
    assert_eq!(normalized.jid.as_str(), "12025559999@s.whatsapp.net");
    assert!(normalized.chat.is_none());
}

#[tokio::test]
async fn direct_chat_wins_over_linked_id_chat() {
    let resolver = resolver_with(
        vec![
            chat("5550001@lid", Some("Linked")),
            chat("5550001@s.whatsapp.net", Some("Direct")),
        ],
        vec![],
    )
    .await;

    let identity = resolver.resolve("5550001").await.expect("should resolve");
    assert_eq!(identity.jid.as_str(), "5550001@s.whatsapp.net");
    assert_eq!(identity.name, "Direct");
}

#[tokio::test]
async fn contact_name_used_when_chat_is_unnamed() {
    let jid = Jid::from_raw("4477001122@s.whatsapp.net");
    let resolver = resolver_with(
        vec![Chat::new(jid.clone(), None)],
        vec![Contact::from_jid(jid, Some("Priya".to_owned()))],
    )
    .await;

    let identity = resolver.resolve("4477001122").await.expect("should resolve");
    assert_eq!(identity.name, "Priya");
    assert!(identity.resolved);
}

#[tokio::test]
async fn chat_named_after_its_number_is_unresolved() {
    let resolver = resolver_with(
        vec![chat("4477001122@s.whatsapp.net", Some("4477001122"))],
        vec![],
    )
    .await;

    let identity = resolver.resolve("4477001122").await.expect("should resolve");
    assert!(!identity.resolved);
    assert_eq!(identity.name, "4477001122");
}

#[tokio::test]
async fn unusable_identifiers_are_rejected() {
    let resolver = resolver_with(vec![], vec![]).await;

    assert!(matches!(
        resolver.resolve("   ").await,
        Err(IdentityError::Empty(_))
    ));
    assert!(matches!(
        resolver.resolve("someone@").await,
        Err(IdentityError::InvalidAddress(_))
    ));
}

#[tokio::test]
async fn unfamiliar_domains_pass_through() {
    let resolver = resolver_with(
        vec![chat("120363000000000001@newsletter", Some("News"))],
        vec![],
    )
    .await;

    let news = resolver
        .resolve("120363000000000001@newsletter")
        .await
        .expect("should resolve");
    assert_eq!(news.jid.as_str(), "120363000000000001@newsletter");
    assert_eq!(news.name, "News");
    assert!(news.resolved);
    assert!(!news.is_lid());

    let broadcast = resolver
        .resolve("status@broadcast")
        .await
        .expect("should resolve");
    assert!(!broadcast.resolved);
    assert_eq!(broadcast.name, "status");
}
