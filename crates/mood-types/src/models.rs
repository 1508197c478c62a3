use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::documents::{Document, FieldValue, Fields};

/// Opaque session identity handed over by the auth layer.
/// Profile and reaction documents are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public handle chosen at registration. Moods reference their uploader by
/// username, not by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Profiles --

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: Username,
    pub email: String,
    pub partner_username: Username,
    /// Id-based pairing link. Older profiles only carry `partner_username`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<UserId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileFields {
    username: Username,
    email: String,
    partner_username: Username,
    #[serde(default)]
    partner_id: Option<UserId>,
}

impl UserProfile {
    /// Decode a `users/<identity>` document.
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let fields: ProfileFields = serde_json::from_value(doc.fields.into())?;
        Ok(Self {
            id: UserId::new(doc.id),
            username: fields.username,
            email: fields.email,
            partner_username: fields.partner_username,
            partner_id: fields.partner_id,
        })
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("username".into(), FieldValue::set(self.username.as_str()));
        fields.insert("email".into(), FieldValue::set(self.email.as_str()));
        fields.insert(
            "partnerUsername".into(),
            FieldValue::set(self.partner_username.as_str()),
        );
        if let Some(partner_id) = &self.partner_id {
            fields.insert("partnerId".into(), FieldValue::set(partner_id.as_str()));
        }
        fields
    }

    pub fn has_partner(&self) -> bool {
        self.partner_id.is_some() || !self.partner_username.is_empty()
    }
}

// -- Moods --

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mood {
    pub id: String,
    pub emoji: String,
    pub caption: String,
    pub uploader: Username,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_media_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoodFields {
    emoji: String,
    caption: String,
    uploader: Username,
    #[serde(with = "chrono::serde::ts_microseconds")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    reaction_media_url: Option<String>,
}

impl Mood {
    /// Decode a `moods/<id>` document.
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let fields: MoodFields = serde_json::from_value(doc.fields.into())?;
        Ok(Self {
            id: doc.id,
            emoji: fields.emoji,
            caption: fields.caption,
            uploader: fields.uploader,
            timestamp: fields.timestamp,
            reaction_media_url: fields.reaction_media_url,
        })
    }
}

/// Caller-supplied part of a new mood. The uploader and timestamp are filled
/// in when the record is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodDraft {
    pub emoji: String,
    pub caption: String,
    pub reaction_media_url: Option<String>,
}

impl MoodDraft {
    pub fn new(emoji: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            caption: caption.into(),
            reaction_media_url: None,
        }
    }

    pub fn with_reaction(mut self, url: impl Into<String>) -> Self {
        self.reaction_media_url = Some(url.into());
        self
    }

    pub fn into_fields(self, uploader: &Username) -> Fields {
        let mut fields = Fields::new();
        fields.insert("emoji".into(), FieldValue::set(self.emoji));
        fields.insert("caption".into(), FieldValue::set(self.caption));
        fields.insert("uploader".into(), FieldValue::set(uploader.as_str()));
        fields.insert("timestamp".into(), FieldValue::ServerTimestamp);
        if let Some(url) = self.reaction_media_url {
            fields.insert("reactionMediaUrl".into(), FieldValue::set(url));
        }
        fields
    }
}

// -- Reactions --

/// One emoji's worth of reaction media, in upload order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: String,
    pub emoji: String,
    pub media_urls: Vec<String>,
}

impl Reaction {
    pub fn new(emoji: impl Into<String>, media_urls: Vec<String>) -> Self {
        let emoji = emoji.into();
        Self {
            id: emoji.clone(),
            emoji,
            media_urls,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media_urls.is_empty()
    }
}

/// A user's reaction cache: emoji -> reaction. Emojis with no media are never
/// present as keys.
pub type ReactionMap = BTreeMap<String, Reaction>;

// -- Uploads --

/// Where the bytes of a pending upload come from.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    /// An asset already on the local filesystem.
    File(PathBuf),
    /// An in-memory transferable, e.g. handed over by a media picker.
    Bytes { data: Vec<u8>, extension: String },
}

/// A locally captured asset on its way into the reaction cache. Lives only
/// for the duration of one upload.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub emoji: String,
    pub payload: MediaPayload,
}

impl PendingUpload {
    pub fn file(emoji: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            emoji: emoji.into(),
            payload: MediaPayload::File(path.into()),
        }
    }

    pub fn bytes(emoji: impl Into<String>, data: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            payload: MediaPayload::Bytes {
                data,
                extension: extension.into(),
            },
        }
    }

    /// File extension for the stored object. Falls back to `jpg`.
    pub fn extension(&self) -> String {
        let ext = match &self.payload {
            MediaPayload::File(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_string),
            MediaPayload::Bytes { extension, .. } => Some(extension.clone()),
        };
        ext.map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "jpg".to_string())
    }
}
