use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Which channel a message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ChatScope {
    #[default]
    Global,
    Claim(String),
}

impl ChatScope {
    pub fn claim_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Claim(id) => Some(id),
        }
    }
}

impl fmt::Display for ChatScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Claim(id) => f.write_str(id),
        }
    }
}

/// Path segment form: `global` or a claim id.
impl FromStr for ChatScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Err(AppError::Validation("Channel scope is required".into())),
            "global" => Ok(Self::Global),
            id => Ok(Self::Claim(id.to_string())),
        }
    }
}

/// Exactly one payload per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePayload {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "imageUrl")]
    Image(String),
    #[serde(rename = "audioUrl")]
    Audio(String),
}

impl MessagePayload {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Image(url) => Some(url),
            _ => None,
        }
    }

    pub fn audio_url(&self) -> Option<&str> {
        match self {
            Self::Audio(url) => Some(url),
            _ => None,
        }
    }

    /// Rebuild from the three nullable columns.
    pub fn from_columns(
        text: Option<String>,
        image_url: Option<String>,
        audio_url: Option<String>,
    ) -> Option<Self> {
        match (text, image_url, audio_url) {
            (Some(text), None, None) => Some(Self::Text(text)),
            (None, Some(url), None) => Some(Self::Image(url)),
            (None, None, Some(url)) => Some(Self::Audio(url)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    /// Classify an uploaded file by its content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top = content_type.split('/').next()?.trim();
        match top {
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    pub fn payload(self, url: String) -> MessagePayload {
        match self {
            Self::Image => MessagePayload::Image(url),
            Self::Audio => MessagePayload::Audio(url),
        }
    }
}

/// Incoming message body as the client sends it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

impl MessageDraft {
    pub fn into_payload(self) -> Result<MessagePayload, AppError> {
        let text = self
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let image_url = self.image_url.filter(|u| !u.trim().is_empty());
        let audio_url = self.audio_url.filter(|u| !u.trim().is_empty());

        let present = [text.is_some(), image_url.is_some(), audio_url.is_some()]
            .into_iter()
            .filter(|p| *p)
            .count();

        match present {
            0 => Err(AppError::Validation(
                "Message needs text, an image or an audio clip".into(),
            )),
            1 => MessagePayload::from_columns(text, image_url, audio_url)
                .ok_or_else(|| AppError::Internal("payload classification".into())),
            _ => Err(AppError::Validation(
                "Message must carry exactly one of text, image or audio".into(),
            )),
        }
    }
}
