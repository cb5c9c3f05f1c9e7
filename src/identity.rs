//! Identity resolution.
//!
//! Turns a caller-supplied identifier (raw phone digits, a linked-id, or a
//! fully qualified address) into a canonical [`Jid`] and decides whether a
//! real display name is known for it.
//!
//! Raw digits are tried as a direct address first and as a linked-id second;
//! when neither has a chat the direct form is kept. Chat lookups are
//! metadata-only. A sender-name lookup is always made for the chosen address
//! as a second name source.

use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::model::{Chat, Jid, JidDomain, JidError};
use crate::store::{MessageStore, StoreError};

/// Errors from identity resolution.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The identifier contained no digits and no `@`.
    #[error("identifier is empty or has no digits: {0:?}")]
    Empty(String),

    /// The identifier contained `@` but is not a well-formed address.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] JidError),

    /// The data source failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A caller-supplied identifier, classified by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Already a fully qualified address.
    Address(Jid),
    /// Digits only, with separators stripped.
    Digits(String),
}

impl Identifier {
    /// Classify raw input.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidAddress`] for a malformed `@` value
    /// and [`IdentityError::Empty`] when no digits remain after stripping.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.contains('@') {
            return Ok(Self::Address(Jid::parse(raw)?));
        }
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(IdentityError::Empty(raw.to_owned()));
        }
        Ok(Self::Digits(digits))
    }
}

/// Whether a resolved address is phone-backed or a linked-id.
///
/// Carrying the local-part in the variant keeps `phone_number` and `lid`
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    /// Any non-linked-id address; holds the phone (local-part).
    Phone(String),
    /// A linked-id address; holds the opaque id.
    Lid(String),
}

impl IdentityKind {
    fn of(jid: &Jid) -> Self {
        let user = jid.user().to_owned();
        if jid.is_lid() {
            Self::Lid(user)
        } else {
            Self::Phone(user)
        }
    }
}

/// Output of [`IdentityResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Chosen canonical address.
    pub jid: Jid,
    /// Phone or linked-id classification.
    pub kind: IdentityKind,
    /// Resolved name, or the local-part when unresolved.
    pub name: String,
    /// Best available label, even if it is only a mechanical fallback.
    pub display_name: String,
    /// True iff `name` is a real name and not a fallback.
    pub resolved: bool,
}

impl ResolvedIdentity {
    /// True iff the address is a linked-id.
    pub fn is_lid(&self) -> bool {
        matches!(self.kind, IdentityKind::Lid(_))
    }

    /// Phone number, present only for non-linked-id addresses.
    pub fn phone_number(&self) -> Option<&str> {
        match &self.kind {
            IdentityKind::Phone(p) => Some(p),
            IdentityKind::Lid(_) => None,
        }
    }

    /// Linked-id, present only for linked-id addresses.
    pub fn lid(&self) -> Option<&str> {
        match &self.kind {
            IdentityKind::Lid(l) => Some(l),
            IdentityKind::Phone(_) => None,
        }
    }
}

impl Serialize for ResolvedIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ResolvedIdentity", 7)?;
        s.serialize_field("jid", &self.jid)?;
        s.serialize_field("is_lid", &self.is_lid())?;
        s.serialize_field("phone_number", &self.phone_number())?;
        s.serialize_field("lid", &self.lid())?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("display_name", &self.display_name)?;
        s.serialize_field("resolved", &self.resolved)?;
        s.end()
    }
}

/// A normalized identifier: the chosen address and its chat, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Chosen canonical address.
    pub jid: Jid,
    /// Metadata-only chat for that address.
    pub chat: Option<Chat>,
}

/// Resolves identifiers against a [`MessageStore`].
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn MessageStore>,
}

impl IdentityResolver {
    /// Create a resolver over the given data source.
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Map an identifier to a canonical address, preferring whichever form
    /// has a chat.
    ///
    /// # Errors
    ///
    /// Returns an error for unusable input or a failing data source. A
    /// missing chat is not an error.
    pub async fn normalize(&self, raw: &str) -> Result<Normalized, IdentityError> {
        let digits = match Identifier::parse(raw)? {
            Identifier::Address(jid) => {
                let chat = self.store.find_chat(&jid, false).await?;
                return Ok(Normalized { jid, chat });
            }
            Identifier::Digits(digits) => digits,
        };

        let direct = Jid::from_parts(&digits, &JidDomain::Direct);
        if let Some(chat) = self.store.find_chat(&direct, false).await? {
            return Ok(Normalized {
                jid: direct,
                chat: Some(chat),
            });
        }

        let lid = Jid::from_parts(&digits, &JidDomain::Lid);
        if let Some(chat) = self.store.find_chat(&lid, false).await? {
            debug!(jid = %lid, "identifier matched a linked-id chat");
            return Ok(Normalized {
                jid: lid,
                chat: Some(chat),
            });
        }

        Ok(Normalized {
            jid: direct,
            chat: None,
        })
    }

    /// Resolve an identifier to an address plus best-effort name.
    ///
    /// # Errors
    ///
    /// Same as [`IdentityResolver::normalize`].
    pub async fn resolve(&self, raw: &str) -> Result<ResolvedIdentity, IdentityError> {
        let Normalized { jid, chat } = self.normalize(raw).await?;
        let sender_name = self.store.sender_name(&jid).await?;
        let chat_name = chat.and_then(|c| c.name);
        let identity = select_name(raw, jid, chat_name, sender_name);
        debug!(
            jid = %identity.jid,
            resolved = identity.resolved,
            "identifier resolved"
        );
        Ok(identity)
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

/// Pick a name for `jid`: the chat name first, then the sender name.
///
/// A candidate equal to the local-part, the raw input or the full address
/// is a fallback and never counts as resolved.
fn select_name(
    raw: &str,
    jid: Jid,
    chat_name: Option<String>,
    sender_name: Option<String>,
) -> ResolvedIdentity {
    let user = jid.user().to_owned();
    let candidates: Vec<String> = [chat_name, sender_name]
        .into_iter()
        .flatten()
        .filter(|n| !n.is_empty())
        .collect();
    let is_fallback = |n: &str| n == user || n == raw || n == jid.as_str();

    let chosen = candidates
        .iter()
        .find(|n| !is_fallback(n.as_str()))
        .cloned();

    let kind = IdentityKind::of(&jid);
    match chosen {
        Some(name) => ResolvedIdentity {
            display_name: name.clone(),
            name,
            resolved: true,
            jid,
            kind,
        },
        None => ResolvedIdentity {
            display_name: candidates.into_iter().next().unwrap_or_else(|| user.clone()),
            name: user,
            resolved: false,
            jid,
            kind,
        },
    }
}
