//! User feedback records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Feedback as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FeedbackDraft {
	/// Kind of feedback, e.g. "bug" or "idea".
	#[serde(rename = "type")]
	#[validate(length(min = 1, message = "type is required"))]
	pub kind: String,
	#[validate(length(min = 1, message = "message is required"))]
	pub message: String,
	/// Page the feedback was submitted from.
	#[validate(length(min = 1, message = "page is required"))]
	pub page: String,
}

/// A stored feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
	pub id: String,
	pub timestamp: DateTime<Utc>,
	#[serde(rename = "type")]
	pub kind: String,
	pub message: String,
	pub page: String,
}

impl Feedback {
	pub fn from_draft(draft: FeedbackDraft) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			timestamp: Utc::now(),
			kind: draft.kind,
			message: draft.message,
			page: draft.page,
		}
	}
}
