use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::domain::{ChatScope, MessagePayload};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Text-backed enums stored as their wire string.
macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum)]
pub enum ItemCategory {
    Electronics,
    #[serde(rename = "ID Card")]
    IdCard,
    #[serde(rename = "Wallet/Purse")]
    WalletPurse,
    Keys,
    Apparel,
    Books,
    Bags,
    Jewelry,
    #[serde(rename = "Water Bottle")]
    WaterBottle,
    Other,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 10] = [
        Self::Electronics,
        Self::IdCard,
        Self::WalletPurse,
        Self::Keys,
        Self::Apparel,
        Self::Books,
        Self::Bags,
        Self::Jewelry,
        Self::WaterBottle,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "Electronics",
            Self::IdCard => "ID Card",
            Self::WalletPurse => "Wallet/Purse",
            Self::Keys => "Keys",
            Self::Apparel => "Apparel",
            Self::Books => "Books",
            Self::Bags => "Bags",
            Self::Jewelry => "Jewelry",
            Self::WaterBottle => "Water Bottle",
            Self::Other => "Other",
        }
    }
}

impl FromStr for ItemCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("category", s))
    }
}

text_column!(ItemCategory);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Lost,
    Found,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Found => "found",
        }
    }
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(Self::Lost),
            "found" => Ok(Self::Found),
            other => Err(ParseEnumError::new("item type", other)),
        }
    }
}

text_column!(ItemType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    PendingClaim,
    PendingApproval,
    Returned,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingClaim => "pending_claim",
            Self::PendingApproval => "pending_approval",
            Self::Returned => "returned",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending_claim" => Ok(Self::PendingClaim),
            "pending_approval" => Ok(Self::PendingApproval),
            "returned" => Ok(Self::Returned),
            other => Err(ParseEnumError::new("item status", other)),
        }
    }
}

text_column!(ItemStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    PendingApproval,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl FromStr for ClaimStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "pending_approval" => Ok(Self::PendingApproval),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(ParseEnumError::new("claim status", other)),
        }
    }
}

text_column!(ClaimStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

text_column!(Role);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, async_graphql::SimpleObject)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, async_graphql::SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_answer: Option<String>,
    pub status: ItemStatus,
    pub reporter_id: String,
    pub reporter_name: String,
    pub location: Option<GeoPoint>,
    pub potential_match_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Item {
    /// Copy safe to show `viewer`: only the reporter sees the secret answer.
    pub fn visible_to(mut self, viewer_id: &str) -> Self {
        if self.reporter_id != viewer_id {
            self.secret_answer = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, async_graphql::SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    /// `None` once the reporter deleted the item; the snapshot below survives.
    pub item_id: Option<String>,
    pub claimer_id: String,
    pub finder_id: String,
    pub item_title: String,
    pub item_image_url: Option<String>,
    pub status: ClaimStatus,
    pub answer_attempt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.claimer_id == user_id || self.finder_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(skip)]
    pub scope: ChatScope,
    #[serde(flatten)]
    pub payload: MessagePayload,
    pub uid: String,
    pub user_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Monotonic per-channel ordering key
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub department: String,
    pub section: String,
    pub register_number: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Role,
    pub reputation_score: i64,
}
