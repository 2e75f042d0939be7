use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============ Provider Records ============

/// A MailChimp audience ("list").
///
/// Only the fields we read are typed; everything else the provider sends is
/// kept in `extra` and written back out unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailingList {
    /// Provider identifier, e.g. "abc123".
    pub id: String,
    /// Display name of the list.
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Subscription state of a list member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
    Unsubscribed,
    Cleaned,
    Pending,
    Transactional,
    Archived,
    #[serde(other)]
    Unknown,
}

/// A list member as returned by `lists/{id}/members/{hash}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub email_address: String,
    /// Absent status is treated as unknown, which never counts as subscribed.
    #[serde(default = "unknown_status")]
    pub status: MemberStatus,
    #[serde(default)]
    pub interests: BTreeMap<String, bool>,
    #[serde(default)]
    pub merge_fields: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unknown_status() -> MemberStatus {
    MemberStatus::Unknown
}

/// An interest category ("group title") of a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestCategory {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub display_order: i64,
    /// Rendering hint from the provider: checkboxes, dropdown, radio, hidden.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single selectable interest within a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_order: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============ Collection Envelopes ============

#[derive(Debug, Clone, Deserialize)]
pub struct ListsResponse {
    #[serde(default)]
    pub lists: Vec<MailingList>,
    #[serde(default)]
    pub total_items: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MembersResponse {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub total_items: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestCategoriesResponse {
    #[serde(default)]
    pub categories: Vec<InterestCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestsResponse {
    #[serde(default)]
    pub interests: Vec<Interest>,
}

/// Only the count of a collection, as returned for `count=0` requests.
#[derive(Debug, Clone, Deserialize)]
pub struct TotalItems {
    #[serde(default)]
    pub total_items: usize,
}

// ============ Request Payloads ============

/// Optional extras sent along with a subscription.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscribeOptions {
    /// Merge fields such as FNAME / LNAME.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_fields: Option<Map<String, Value>>,
    /// Interest id -> selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_permissions: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MemberUpsert<'a> {
    pub email_address: &'a str,
    pub status: MemberStatus,
    #[serde(flatten)]
    pub options: &'a SubscribeOptions,
}

/// Deterministic member key: hex encoded MD5 of the lower-cased address.
pub fn subscriber_hash(email_address: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(email_address.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
