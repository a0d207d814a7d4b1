use async_graphql::*;
use chrono::{DateTime, Utc};

use crate::auth::SessionUser;
use crate::claims::{ClaimDetail, ClaimRole};
use crate::db::models::{ChatMessage, Claim, GeoPoint, ItemCategory, ItemType, Role};
use crate::error::{AppError, AppResult};
use crate::items::ItemDraft;

/// The signed-in user with their campus profile
#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "User")]
pub struct UserObject {
    pub id: String,
    pub email: String,
    pub name: String,
    pub display_name: String,
    pub department: String,
    pub section: String,
    pub register_number: String,
    #[graphql(name = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Role,
    pub reputation_score: i64,
    pub is_admin: bool,
}

impl From<&SessionUser> for UserObject {
    fn from(user: &SessionUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.profile.name.clone(),
            display_name: user.display_name(),
            department: user.profile.department.clone(),
            section: user.profile.section.clone(),
            register_number: user.profile.register_number.clone(),
            photo_url: user.profile.photo_url.clone(),
            role: user.profile.role,
            reputation_score: user.profile.reputation_score,
            is_admin: user.is_admin,
        }
    }
}

/// A claim as the viewer may see it
#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "ClaimDetail")]
pub struct ClaimDetailObject {
    pub claim: Claim,
    pub viewer_role: ClaimRole,
    pub secret_question: Option<String>,
    /// Finder only
    pub secret_answer: Option<String>,
    /// Finder only; a hint, never a decision
    pub answer_matches: Option<bool>,
}

impl From<ClaimDetail> for ClaimDetailObject {
    fn from(detail: ClaimDetail) -> Self {
        Self {
            claim: detail.claim,
            viewer_role: detail.viewer_role,
            secret_question: detail.secret_question,
            secret_answer: detail.secret_answer,
            answer_matches: detail.answer_matches,
        }
    }
}

/// One chat message; exactly one of text, imageUrl, audioUrl is set
#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Message")]
pub struct MessageObject {
    pub id: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub uid: String,
    pub user_name: String,
    #[graphql(name = "photoURL")]
    pub photo_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub seq: i64,
}

impl From<ChatMessage> for MessageObject {
    fn from(message: ChatMessage) -> Self {
        Self {
            text: message.payload.text().map(str::to_string),
            image_url: message.payload.image_url().map(str::to_string),
            audio_url: message.payload.audio_url().map(str::to_string),
            id: message.id,
            uid: message.uid,
            user_name: message.user_name,
            photo_url: message.photo_url,
            timestamp: message.timestamp,
            seq: message.seq,
        }
    }
}

/// Input for reporting a lost or found item
#[derive(Debug, InputObject)]
pub struct CreateItemInput {
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    /// Required for found items, ignored for lost ones
    pub secret_question: Option<String>,
    pub secret_answer: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TryFrom<CreateItemInput> for ItemDraft {
    type Error = AppError;

    /// A location needs both coordinates or neither.
    fn try_from(input: CreateItemInput) -> AppResult<Self> {
        let location = match (input.latitude, input.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "Location needs both latitude and longitude".into(),
                ))
            }
        };

        Ok(Self {
            title: input.title,
            description: input.description,
            category: input.category.as_str().to_string(),
            item_type: input.item_type.as_str().to_string(),
            image_url: input.image_url,
            secret_question: input.secret_question,
            secret_answer: input.secret_answer,
            location,
        })
    }
}

/// Reporter edits; only these fields may change
#[derive(Debug, InputObject)]
pub struct UpdateItemInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
}
