use serde::{Deserialize, Serialize};

use crate::db::models::{GeoPoint, Item, ItemCategory, ItemStatus, ItemType};
use crate::error::{AppError, AppResult};

/// Which items a listing shows. Always newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFilter {
    All,
    Type(ItemType),
    StatusIn(Vec<ItemStatus>),
    Reporter(String),
}

impl ItemFilter {
    /// Feed tab for items that are being or have been handed back.
    pub fn claimed() -> Self {
        Self::StatusIn(vec![
            ItemStatus::PendingClaim,
            ItemStatus::PendingApproval,
            ItemStatus::Returned,
        ])
    }

    /// WHERE clause (possibly empty) and its positional arguments.
    pub(crate) fn to_sql(&self) -> (String, Vec<String>) {
        match self {
            Self::All => (String::new(), Vec::new()),
            Self::Type(item_type) => (
                "WHERE item_type = ?1".to_string(),
                vec![item_type.as_str().to_string()],
            ),
            // An empty set matches nothing rather than everything.
            Self::StatusIn(statuses) if statuses.is_empty() => ("WHERE 0".to_string(), Vec::new()),
            Self::StatusIn(statuses) => {
                let placeholders = (1..=statuses.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("WHERE status IN ({})", placeholders),
                    statuses.iter().map(|s| s.as_str().to_string()).collect(),
                )
            }
            Self::Reporter(user_id) => ("WHERE reporter_id = ?1".to_string(), vec![user_id.clone()]),
        }
    }
}

/// Listing query string: `?view=latest|claimed&type=lost|found&status=a,b`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemQuery {
    pub view: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub status: Option<String>,
}

impl ItemQuery {
    pub fn into_filter(self) -> AppResult<ItemFilter> {
        if let Some(item_type) = self.item_type.filter(|t| !t.is_empty()) {
            let item_type = item_type
                .parse()
                .map_err(|e| AppError::Validation(format!("{}", e)))?;
            return Ok(ItemFilter::Type(item_type));
        }

        if let Some(status) = self.status.filter(|s| !s.is_empty()) {
            let statuses = status
                .split(',')
                .map(|s| s.trim().parse::<ItemStatus>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::Validation(format!("{}", e)))?;
            return Ok(ItemFilter::StatusIn(statuses));
        }

        match self.view.as_deref() {
            None | Some("") | Some("latest") => Ok(ItemFilter::All),
            Some("claimed") => Ok(ItemFilter::claimed()),
            Some(other) => Err(AppError::Validation(format!("Unknown view: {}", other))),
        }
    }
}

/// Report form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub item_type: String,
    pub image_url: Option<String>,
    pub secret_question: Option<String>,
    pub secret_answer: Option<String>,
    pub location: Option<GeoPoint>,
}

/// A validated report, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    pub secret_question: Option<String>,
    pub secret_answer: Option<String>,
    pub location: Option<GeoPoint>,
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ItemDraft {
    pub fn validate(self) -> AppResult<NewItem> {
        let title = required(&self.title, "Title")?;
        let description = required(&self.description, "Description")?;
        let category = required(&self.category, "Category")?
            .parse::<ItemCategory>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let item_type = required(&self.item_type, "Item type")?
            .parse::<ItemType>()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        // Only found items carry a verification secret.
        let (secret_question, secret_answer) = match item_type {
            ItemType::Found => (
                Some(required(self.secret_question.as_deref().unwrap_or(""), "Secret question")?),
                Some(required(self.secret_answer.as_deref().unwrap_or(""), "Secret answer")?),
            ),
            ItemType::Lost => (None, None),
        };

        if let Some(location) = &self.location {
            if !location.is_valid() {
                return Err(AppError::Validation(
                    "Location must be a valid latitude/longitude".into(),
                ));
            }
        }

        Ok(NewItem {
            title,
            description,
            category,
            item_type,
            image_url: non_blank(self.image_url),
            secret_question,
            secret_answer,
            location: self.location,
        })
    }
}

/// Reporter edits: only these three fields may change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
}

impl ItemPatch {
    const EDITABLE: [&'static str; 3] = ["title", "description", "category"];

    pub fn from_json(value: serde_json::Value) -> AppResult<Self> {
        let serde_json::Value::Object(fields) = value else {
            return Err(AppError::Validation("Expected a JSON object".into()));
        };

        if let Some(field) = fields.keys().find(|k| !Self::EDITABLE.contains(&k.as_str())) {
            return Err(AppError::Validation(format!(
                "Field '{}' cannot be edited; only title, description and category",
                field
            )));
        }

        let text = |key: &str| -> AppResult<Option<String>> {
            match fields.get(key) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(AppError::Validation(format!("{} must be a string", key))),
            }
        };

        let category = text("category")?
            .map(|c| c.trim().parse::<ItemCategory>())
            .transpose()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Self::new(text("title")?, text("description")?, category)
    }

    /// Blank values are rejected; at least one field must be set.
    pub fn new(
        title: Option<String>,
        description: Option<String>,
        category: Option<ItemCategory>,
    ) -> AppResult<Self> {
        let patch = Self {
            title: title.map(|t| required(&t, "title")).transpose()?,
            description: description
                .map(|d| required(&d, "description"))
                .transpose()?,
            category,
        };

        if patch == Self::default() {
            return Err(AppError::Validation("Nothing to update".into()));
        }
        Ok(patch)
    }
}

/// A user's lost item linked to a found item that may be theirs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialMatch {
    pub lost_item_id: String,
    #[serde(rename = "match")]
    pub found_item: Item,
}
