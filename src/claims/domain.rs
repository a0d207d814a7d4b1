// Claim state machine - pure transitions, no storage
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::models::{Claim, ClaimStatus, Item, ItemStatus};
use crate::error::AppError;

/// The finder's verdict on a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn claim_status(self) -> ClaimStatus {
        match self {
            Self::Approved => ClaimStatus::Approved,
            Self::Rejected => ClaimStatus::Rejected,
        }
    }

    /// Approved items go home; rejected ones are claimable again.
    pub fn item_status(self) -> ItemStatus {
        match self {
            Self::Approved => ItemStatus::Returned,
            Self::Rejected => ItemStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    Forbidden(String),
    InvalidTransition(String),
    EmptyAnswer,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden(msg) => write!(f, "{}", msg),
            Self::InvalidTransition(msg) => write!(f, "{}", msg),
            Self::EmptyAnswer => write!(f, "Answer is required"),
        }
    }
}

impl std::error::Error for TransitionError {}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Forbidden(msg) => AppError::Authorization(msg),
            TransitionError::InvalidTransition(msg) => AppError::InvalidState(msg),
            TransitionError::EmptyAnswer => AppError::Validation("Answer is required".into()),
        }
    }
}

/// Which side of a claim a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ClaimRole {
    Claimer,
    Finder,
}

impl Claim {
    pub fn role_of(&self, user_id: &str) -> Option<ClaimRole> {
        if self.claimer_id == user_id {
            Some(ClaimRole::Claimer)
        } else if self.finder_id == user_id {
            Some(ClaimRole::Finder)
        } else {
            None
        }
    }

    /// Transition: pending → pending_approval, by the claimer only
    pub fn submit_answer(
        self,
        actor_id: &str,
        attempt: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if self.claimer_id != actor_id {
            return Err(TransitionError::Forbidden(
                "Only the claimer can answer the secret question".into(),
            ));
        }
        if self.status != ClaimStatus::Pending {
            return Err(TransitionError::InvalidTransition(format!(
                "Cannot submit an answer while the claim is {}",
                self.status
            )));
        }
        let attempt = attempt.trim();
        if attempt.is_empty() {
            return Err(TransitionError::EmptyAnswer);
        }

        Ok(Self {
            status: ClaimStatus::PendingApproval,
            answer_attempt: Some(attempt.to_string()),
            updated_at: now,
            ..self
        })
    }

    /// Transition: pending_approval → approved | rejected, by the finder only
    pub fn resolve(
        self,
        actor_id: &str,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if self.finder_id != actor_id {
            return Err(TransitionError::Forbidden(
                "Only the finder can resolve this claim".into(),
            ));
        }
        if self.status != ClaimStatus::PendingApproval {
            return Err(TransitionError::InvalidTransition(format!(
                "Cannot resolve a claim that is {}",
                self.status
            )));
        }

        Ok(Self {
            status: decision.claim_status(),
            updated_at: now,
            ..self
        })
    }
}

/// Case-insensitive, ignoring surrounding whitespace. A hint for the
/// finder, never a decision.
pub fn answer_matches(secret_answer: &str, attempt: &str) -> bool {
    secret_answer.trim().to_lowercase() == attempt.trim().to_lowercase()
}

/// A claim as one of its two parties sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDetail {
    #[serde(flatten)]
    pub claim: Claim,
    pub viewer_role: ClaimRole,
    pub secret_question: Option<String>,
    /// Finder only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_answer: Option<String>,
    /// Finder only, once an answer was submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_matches: Option<bool>,
}

impl ClaimDetail {
    /// `item` is `None` when the reporter deleted it.
    pub fn for_viewer(
        claim: Claim,
        item: Option<&Item>,
        viewer_id: &str,
    ) -> Result<Self, TransitionError> {
        let viewer_role = claim.role_of(viewer_id).ok_or_else(|| {
            TransitionError::Forbidden("Only the claimer and finder can view this claim".into())
        })?;

        let secret_question = item.and_then(|i| i.secret_question.clone());
        let (secret_answer, answer_matches) = match viewer_role {
            ClaimRole::Finder => {
                let secret = item.and_then(|i| i.secret_answer.clone());
                let matches = secret
                    .as_deref()
                    .zip(claim.answer_attempt.as_deref())
                    .map(|(secret, attempt)| answer_matches(secret, attempt));
                (secret, matches)
            }
            ClaimRole::Claimer => (None, None),
        };

        Ok(Self {
            claim,
            viewer_role,
            secret_question,
            secret_answer,
            answer_matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ItemCategory, ItemType};

    fn pending_claim() -> Claim {
        let now = Utc::now();
        Claim {
            id: "c1".into(),
            item_id: Some("i1".into()),
            claimer_id: "claimer".into(),
            finder_id: "finder".into(),
            item_title: "Red Wallet".into(),
            item_image_url: None,
            status: ClaimStatus::Pending,
            answer_attempt: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn wallet() -> Item {
        Item {
            id: "i1".into(),
            title: "Red Wallet".into(),
            description: "Found by the library".into(),
            category: ItemCategory::WalletPurse,
            item_type: ItemType::Found,
            image_url: None,
            secret_question: Some("How much cash is inside?".into()),
            secret_answer: Some("5 dollars".into()),
            status: ItemStatus::PendingApproval,
            reporter_id: "finder".into(),
            reporter_name: "Finder".into(),
            location: None,
            potential_match_id: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn claimer_submits_answer() {
        let claim = pending_claim()
            .submit_answer("claimer", "  5 Dollars ", Utc::now())
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::PendingApproval);
        assert_eq!(claim.answer_attempt.as_deref(), Some("5 Dollars"));
    }

    #[test]
    fn only_claimer_can_submit() {
        let err = pending_claim()
            .submit_answer("finder", "5 dollars", Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden(_)));
        assert!(matches!(AppError::from(err), AppError::Authorization(_)));
    }

    #[test]
    fn blank_answer_is_rejected() {
        let err = pending_claim()
            .submit_answer("claimer", "   ", Utc::now())
            .unwrap_err();
        assert_eq!(err, TransitionError::EmptyAnswer);
        assert!(matches!(AppError::from(err), AppError::Validation(_)));
    }

    #[test]
    fn cannot_answer_twice() {
        let claim = pending_claim()
            .submit_answer("claimer", "5 dollars", Utc::now())
            .unwrap();
        let err = claim
            .submit_answer("claimer", "6 dollars", Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn resolve_requires_submitted_answer() {
        let err = pending_claim()
            .resolve("finder", Decision::Approved, Utc::now())
            .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::InvalidState(_)));
    }

    #[test]
    fn only_finder_can_resolve() {
        let claim = pending_claim()
            .submit_answer("claimer", "5 dollars", Utc::now())
            .unwrap();
        let err = claim
            .resolve("claimer", Decision::Approved, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden(_)));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for decision in [Decision::Approved, Decision::Rejected] {
            let resolved = pending_claim()
                .submit_answer("claimer", "5 dollars", Utc::now())
                .unwrap()
                .resolve("finder", decision, Utc::now())
                .unwrap();
            assert_eq!(resolved.status, decision.claim_status());
            assert!(resolved.status.is_terminal());

            let again = resolved.clone().resolve("finder", decision, Utc::now());
            assert!(matches!(again, Err(TransitionError::InvalidTransition(_))));
            let answer = resolved.submit_answer("claimer", "x", Utc::now());
            assert!(matches!(answer, Err(TransitionError::InvalidTransition(_))));
        }
    }

    #[test]
    fn decision_drives_item_status() {
        assert_eq!(Decision::Approved.item_status(), ItemStatus::Returned);
        assert_eq!(Decision::Rejected.item_status(), ItemStatus::Active);
    }

    #[test]
    fn answers_compare_case_insensitively() {
        assert!(answer_matches("Blue Backpack", "blue backpack"));
        assert!(answer_matches("5 dollars", " 5 Dollars"));
        assert!(!answer_matches("5 dollars", "6 dollars"));
    }

    #[test]
    fn finder_view_carries_hint() {
        let claim = pending_claim()
            .submit_answer("claimer", "5 Dollars", Utc::now())
            .unwrap();
        let item = wallet();

        let detail = ClaimDetail::for_viewer(claim, Some(&item), "finder").unwrap();
        assert_eq!(detail.viewer_role, ClaimRole::Finder);
        assert_eq!(detail.secret_answer.as_deref(), Some("5 dollars"));
        assert_eq!(detail.answer_matches, Some(true));
    }

    #[test]
    fn claimer_view_hides_secret() {
        let claim = pending_claim()
            .submit_answer("claimer", "5 Dollars", Utc::now())
            .unwrap();
        let item = wallet();

        let detail = ClaimDetail::for_viewer(claim, Some(&item), "claimer").unwrap();
        assert_eq!(detail.secret_answer, None);
        assert_eq!(detail.answer_matches, None);
        assert_eq!(detail.claim.answer_attempt.as_deref(), Some("5 Dollars"));

        let json = serde_json::to_value(&detail).unwrap();
        assert!(json.get("secretAnswer").is_none());
        assert_eq!(json["secretQuestion"], "How much cash is inside?");
        assert_eq!(json["itemTitle"], "Red Wallet");
    }

    #[test]
    fn outsiders_cannot_view() {
        let err = ClaimDetail::for_viewer(pending_claim(), None, "stranger").unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden(_)));
    }

    #[test]
    fn deleted_item_leaves_snapshot() {
        let mut claim = pending_claim();
        claim.item_id = None;
        let detail = ClaimDetail::for_viewer(claim, None, "finder").unwrap();
        assert_eq!(detail.secret_question, None);
        assert_eq!(detail.claim.item_title, "Red Wallet");
    }
}
