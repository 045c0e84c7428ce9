use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Server-assigned commit time of a stored document.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// Enums
// =============================================================================

/// The municipal department scoping the portal page and the router.
///
/// The set is closed. Parsing is lenient: anything unrecognised degrades to
/// [`DepartmentContext::Home`], the generic context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DepartmentContext {
    /// Portal homepage; generic welcome and fallback answers.
    #[default]
    Home,
    /// Local taxation.
    Tax,
    /// Vehicle registration, parking and permits.
    Vehicle,
    /// Unemployment, child care and community aid.
    Benefits,
    /// Housing authority programs.
    Housing,
    /// Waste collection and recycling.
    Waste,
}

impl DepartmentContext {
    /// Every member of the closed set, home first.
    pub const ALL: [DepartmentContext; 6] = [
        DepartmentContext::Home,
        DepartmentContext::Tax,
        DepartmentContext::Vehicle,
        DepartmentContext::Benefits,
        DepartmentContext::Housing,
        DepartmentContext::Waste,
    ];

    /// Stable identifier used in stored documents and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DepartmentContext::Home => "home",
            DepartmentContext::Tax => "tax",
            DepartmentContext::Vehicle => "vehicle",
            DepartmentContext::Benefits => "benefits",
            DepartmentContext::Housing => "housing",
            DepartmentContext::Waste => "waste",
        }
    }

    /// Strict lookup; `None` for identifiers outside the closed set.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(id.trim()))
    }

    /// Lenient lookup; unknown identifiers become `Home`.
    pub fn parse_lenient(id: &str) -> Self {
        Self::from_id(id).unwrap_or_else(|| {
            tracing::debug!(department = id, "Unknown department, using home context");
            DepartmentContext::Home
        })
    }

    /// Whether this is the generic homepage context.
    pub fn is_home(&self) -> bool {
        matches!(self, DepartmentContext::Home)
    }
}

impl fmt::Display for DepartmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DepartmentContext {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<DepartmentContext> for String {
    fn from(value: DepartmentContext) -> Self {
        value.as_str().to_string()
    }
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Icon shown on an action button.
///
/// The display layer maps each key to a glyph; [`IconKey::Unknown`] is the
/// documented default for keys it does not know.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IconKey {
    FileText,
    DollarSign,
    Car,
    FileCheck,
    Calendar,
    Home,
    MapPin,
    Landmark,
    Grid,
    Users,
    Phone,
    ExternalLink,
    Mail,
    Globe,
    Briefcase,
    CheckCircle,
    #[default]
    Unknown,
}

impl IconKey {
    const KNOWN: [IconKey; 16] = [
        IconKey::FileText,
        IconKey::DollarSign,
        IconKey::Car,
        IconKey::FileCheck,
        IconKey::Calendar,
        IconKey::Home,
        IconKey::MapPin,
        IconKey::Landmark,
        IconKey::Grid,
        IconKey::Users,
        IconKey::Phone,
        IconKey::ExternalLink,
        IconKey::Mail,
        IconKey::Globe,
        IconKey::Briefcase,
        IconKey::CheckCircle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IconKey::FileText => "file_text",
            IconKey::DollarSign => "dollar_sign",
            IconKey::Car => "car",
            IconKey::FileCheck => "file_check",
            IconKey::Calendar => "calendar",
            IconKey::Home => "home",
            IconKey::MapPin => "map_pin",
            IconKey::Landmark => "landmark",
            IconKey::Grid => "grid",
            IconKey::Users => "users",
            IconKey::Phone => "phone",
            IconKey::ExternalLink => "external_link",
            IconKey::Mail => "mail",
            IconKey::Globe => "globe",
            IconKey::Briefcase => "briefcase",
            IconKey::CheckCircle => "check_circle",
            IconKey::Unknown => "unknown",
        }
    }
}

impl From<String> for IconKey {
    fn from(value: String) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|k| k.as_str() == value)
            .unwrap_or(IconKey::Unknown)
    }
}

impl From<IconKey> for String {
    fn from(value: IconKey) -> Self {
        value.as_str().to_string()
    }
}

/// Colour emphasis for an action button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorHint {
    #[default]
    Primary,
    Positive,
    Neutral,
}

// =============================================================================
// Structured response
// =============================================================================

/// External-navigation button attached to an assistant reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionButton {
    pub label: String,
    pub icon_key: IconKey,
    #[serde(default)]
    pub color_hint: ColorHint,
    pub target_url: String,
}

impl ActionButton {
    pub fn new(label: &str, icon_key: IconKey, color_hint: ColorHint, target_url: &str) -> Self {
        Self {
            label: label.to_string(),
            icon_key,
            color_hint,
            target_url: target_url.to_string(),
        }
    }
}

/// Informational cross-link shown under a reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTopic {
    pub label: String,
    pub target_url: String,
}

impl RelatedTopic {
    pub fn new(label: &str, target_url: &str) -> Self {
        Self {
            label: label.to_string(),
            target_url: target_url.to_string(),
        }
    }
}

/// Department directory snippet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
}

impl ContactBlock {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none() && self.website.is_none() && self.hours.is_none()
    }
}

/// The router's reply payload.
///
/// `text` may contain `[label](url)` link spans; they are carried verbatim
/// and rendered by the display layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionButton>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_topics: Vec<RelatedTopic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_block: Option<ContactBlock>,
}

impl StructuredResponse {
    /// A text-only reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
            related_topics: Vec::new(),
            contact_block: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionButton>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_topics(mut self, topics: Vec<RelatedTopic>) -> Self {
        self.related_topics = topics;
        self
    }

    pub fn with_contact(mut self, contact: ContactBlock) -> Self {
        self.contact_block = if contact.is_empty() { None } else { Some(contact) };
        self
    }
}

// =============================================================================
// Sessions and identity
// =============================================================================

const SESSION_ID_LEN: usize = 7;
const SESSION_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Ephemeral per-load token partitioning one identity's history into
/// independent conversations. Held in memory only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh short random token.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let token = (0..SESSION_ID_LEN)
            .map(|_| SESSION_ALPHABET[rng.random_range(0..SESSION_ALPHABET.len())] as char)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved user identity from the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub anonymous: bool,
}

// =============================================================================
// Messages
// =============================================================================

/// Field set persisted for each message document.
///
/// `createdAt` is not part of the record: the store assigns it on commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StructuredResponse>,
    pub department_context: DepartmentContext,
    pub session_id: SessionId,
}

impl MessageRecord {
    pub fn user(content: &str, department: DepartmentContext, session_id: &SessionId) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            data: None,
            department_context: department,
            session_id: session_id.clone(),
        }
    }

    /// Assistant record whose `content` mirrors the response text.
    pub fn assistant(
        response: StructuredResponse,
        department: DepartmentContext,
        session_id: &SessionId,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: response.text.clone(),
            data: Some(response),
            department_context: department,
            session_id: session_id.clone(),
        }
    }
}

/// One immutable turn of a conversation, as read back from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_response: Option<StructuredResponse>,
    pub department_context: DepartmentContext,
    pub session_id: SessionId,
    /// `None` while the server timestamp is still pending.
    pub created_at: Option<Timestamp>,
}

impl Message {
    pub fn from_record(id: String, record: MessageRecord, created_at: Option<Timestamp>) -> Self {
        Self {
            id,
            role: record.role,
            content: record.content,
            structured_response: record.data,
            department_context: record.department_context,
            session_id: record.session_id,
            created_at,
        }
    }

    /// The rich payload, or `{text: content}` when none was stored.
    pub fn response(&self) -> StructuredResponse {
        self.structured_response
            .clone()
            .unwrap_or_else(|| StructuredResponse::text(self.content.clone()))
    }

    pub fn is_pending(&self) -> bool {
        self.created_at.is_none()
    }
}
