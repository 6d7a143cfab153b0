use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    Brand,
    Creator,
}

impl UserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKind::Brand => "brand",
            UserKind::Creator => "creator",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "brand" => Some(UserKind::Brand),
            "creator" => Some(UserKind::Creator),
            _ => None,
        }
    }
}

/// Per-creator state of involvement in one campaign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Prospect,
    Pending,
    Approved,
    Rejected,
    Active,
    Declined,
    ContentSubmitted,
    Done,
}

/// Named action that moves a participation record between statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    Reject,
    Decline,
    SubmitWork,
    AcceptWork,
}

impl ParticipationStatus {
    pub const ALL: [ParticipationStatus; 8] = [
        ParticipationStatus::Prospect,
        ParticipationStatus::Pending,
        ParticipationStatus::Approved,
        ParticipationStatus::Rejected,
        ParticipationStatus::Active,
        ParticipationStatus::Declined,
        ParticipationStatus::ContentSubmitted,
        ParticipationStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Prospect => "prospect",
            ParticipationStatus::Pending => "pending",
            ParticipationStatus::Approved => "approved",
            ParticipationStatus::Rejected => "rejected",
            ParticipationStatus::Active => "active",
            ParticipationStatus::Declined => "declined",
            ParticipationStatus::ContentSubmitted => "content_submitted",
            ParticipationStatus::Done => "done",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// The transition table. `None` means the action is not allowed from
    /// this status.
    pub fn apply(self, action: Action) -> Option<ParticipationStatus> {
        use Action::*;
        use ParticipationStatus::*;
        match (self, action) {
            (Prospect, Approve) | (Pending, Approve) | (Rejected, Approve) => Some(Approved),
            (Prospect, Reject) | (Pending, Reject) | (Approved, Reject) | (Active, Reject) => {
                Some(Rejected)
            }
            (Prospect, Decline) | (Approved, Decline) => Some(Declined),
            (Approved, SubmitWork) | (Active, SubmitWork) => Some(ContentSubmitted),
            (ContentSubmitted, AcceptWork) => Some(Done),
            _ => None,
        }
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Decline => "decline",
            Action::SubmitWork => "submit_work",
            Action::AcceptWork => "accept_work",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item of submitted work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: String,
    pub url: Option<String>,
    pub text: String,
    #[serde(default)]
    pub files: Vec<String>,
    /// External post identifier once published.
    pub urn: Option<String>,
    /// Set while an accepted item is being published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Participation record embedded in a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub creator_id: i64,
    pub status: ParticipationStatus,
    pub amount: i64,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    pub invoice_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(creator_id: i64, status: ParticipationStatus, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            creator_id,
            status,
            amount,
            content: Vec::new(),
            invoice_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(
            self.status,
            ParticipationStatus::Approved
                | ParticipationStatus::Active
                | ParticipationStatus::ContentSubmitted
                | ParticipationStatus::Done
        )
    }

    pub fn content_item(&self, content_id: Uuid) -> Option<&ContentItem> {
        self.content.iter().find(|c| c.id == content_id)
    }

    pub fn content_item_mut(&mut self, content_id: Uuid) -> Option<&mut ContentItem> {
        self.content.iter_mut().find(|c| c.id == content_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub brand_id: i64,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub budget: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub visible: bool,
    pub participants: Vec<Participant>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn participant(&self, creator_id: i64) -> Option<&Participant> {
        self.participants.iter().find(|p| p.creator_id == creator_id)
    }

    pub fn participant_mut(&mut self, creator_id: i64) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.creator_id == creator_id)
    }
}

/// Fields a brand supplies when creating or editing a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub budget: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Linked external publishing account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub member_id: String,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LinkedAccount {
    pub fn author_urn(&self) -> String {
        format!("urn:li:person:{}", self.member_id)
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub kind: UserKind,
    pub linkedin: Option<LinkedAccount>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub reviewer_id: i64,
    pub campaign_id: i64,
    pub rating: i64,
    pub review: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Publishing,
    Posted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Publishing => "publishing",
            PostStatus::Posted => "posted",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "publishing" => Some(PostStatus::Publishing),
            "posted" => Some(PostStatus::Posted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: i64,
    pub user_id: i64,
    pub scheduled_date: DateTime<Utc>,
    pub status: PostStatus,
    pub text: Option<String>,
    pub files: Vec<String>,
    pub kind: String,
    pub label: Option<String>,
    pub attempt: i32,
    pub external_id: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: i64,
    pub price: i64,
    pub total: i64,
    #[serde(default)]
    pub files: Vec<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub brand_id: i64,
    pub creator_id: i64,
    pub campaign_id: i64,
    pub items: Vec<InvoiceItem>,
    pub total_amount: i64,
    pub status: InvoiceStatus,
    pub order_id: Option<String>,
    pub payment_ref: Option<String>,
    pub date_issued: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutboxKind {
    Notify,
    Email,
}

impl OutboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::Notify => "notify",
            OutboxKind::Email => "email",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "notify" => Some(OutboxKind::Notify),
            "email" => Some(OutboxKind::Email),
            _ => None,
        }
    }
}

/// Side effect recorded in the outbox together with the state change that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    Notify {
        sender_id: i64,
        receiver_id: i64,
        message: String,
        link: Option<String>,
    },
    Email {
        to_email: String,
        to_name: String,
        template_id: i64,
        params: serde_json::Value,
    },
}

impl SideEffect {
    pub fn notify(
        sender_id: i64,
        receiver_id: i64,
        message: impl Into<String>,
        link: Option<&str>,
    ) -> Self {
        SideEffect::Notify {
            sender_id,
            receiver_id,
            message: message.into(),
            link: link.map(str::to_string),
        }
    }

    pub fn kind(&self) -> OutboxKind {
        match self {
            SideEffect::Notify { .. } => OutboxKind::Notify,
            SideEffect::Email { .. } => OutboxKind::Email,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxTask {
    pub id: i64,
    pub effect: SideEffect,
    pub attempt: i32,
    pub due_at: DateTime<Utc>,
}
