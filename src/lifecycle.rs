//! Campaign participation lifecycle.
//!
//! Every operation reads the campaign aggregate, mutates its participant list
//! in memory and writes it back guarded by the campaign `version`. Outbox
//! events produced by the operation are written in the same transaction. On a
//! stale version the operation is replayed against fresh state, so its
//! preconditions are always checked against what actually gets written.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config;
use crate::db::{self, Pool};
use crate::error::{LifecycleError, LifecycleResult};
use crate::invoice;
use crate::linkedin::{self, PublishedPost, PublishingService};
use crate::model::{
    Action, Campaign, CampaignDraft, ContentItem, Participant, ParticipationStatus, Review,
    SideEffect, User, UserKind,
};

const MAX_ATTEMPTS: usize = 3;

const ALREADY_APPLIED: &str = "Creator already applied to this campaign";
const ALREADY_SELECTED: &str = "Creator is already selected";
const ALREADY_ADDED: &str = "Creator is already part of this campaign";
const NOT_SELECTED: &str = "Creator is not selected for this campaign";
const NOT_LINKED: &str = "Creator has not linked their LinkedIn account";
const CONTENT_REQUIRED: &str = "A content or images are required";
const ALREADY_SUBMITTED: &str = "Content already submitted for this campaign";
const NOT_COMPLETED: &str = "Campaign is not completed yet";
const ALREADY_RATED: &str = "You have already rated this creator for this campaign";
const ALREADY_PUBLISHING: &str = "Content is already being published";

/// How long an accept claim blocks other accepts of the same item.
const ACCEPT_CLAIM_LEASE_MINUTES: i64 = 15;

/// Template name looked up in `mailer.templates` when work is accepted.
pub const WORK_ACCEPTED_TEMPLATE: &str = "work_accepted";

fn campaign_link(campaign_id: i64) -> String {
    format!("/dashboard/campaigns-details/{campaign_id}")
}

const BRAND_CAMPAIGNS_LINK: &str = "/dashboard/campaigns";

/// Work handed in by a creator, optionally tied to a campaign.
#[derive(Debug, Clone, Default)]
pub struct WorkSubmission {
    pub campaign_id: Option<i64>,
    pub kind: String,
    pub text: String,
    pub url: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Stored on the campaign, waiting for the brand to accept it.
    Submitted { content_id: Uuid },
    /// Independent work, published right away.
    Published(PublishedPost),
    /// The creator must link a publishing account first. Nothing was stored.
    NeedsAccountLink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptOutcome {
    pub invoice_id: i64,
    pub post: PublishedPost,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub is_owner: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignAnalytics {
    pub participants: usize,
    pub by_status: BTreeMap<String, usize>,
    pub content_items: usize,
    pub published_items: usize,
    pub committed_amount: i64,
}

#[derive(Clone)]
pub struct Lifecycle {
    pool: Pool,
    publisher: Arc<dyn PublishingService>,
    media_root: PathBuf,
    work_accepted_template: Option<i64>,
}

impl Lifecycle {
    pub fn new(pool: Pool, publisher: Arc<dyn PublishingService>, media_root: PathBuf) -> Self {
        Self {
            pool,
            publisher,
            media_root,
            work_accepted_template: None,
        }
    }

    /// Pick up the email templates configured for lifecycle events.
    pub fn with_mailer(mut self, cfg: &config::Mailer) -> Self {
        self.work_accepted_template = cfg.template(WORK_ACCEPTED_TEMPLATE);
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn load(&self, campaign_id: i64) -> LifecycleResult<Campaign> {
        db::load_campaign(&self.pool, campaign_id)
            .await?
            .ok_or(LifecycleError::NotFound("Campaign"))
    }

    async fn user(&self, user_id: i64, what: &'static str) -> LifecycleResult<User> {
        db::get_user(&self.pool, user_id)
            .await?
            .ok_or(LifecycleError::NotFound(what))
    }

    /// Version-guarded read-modify-write of the participant list.
    async fn mutate<T, F>(&self, campaign_id: i64, mut apply: F) -> LifecycleResult<T>
    where
        F: FnMut(&mut Campaign) -> LifecycleResult<(T, Vec<SideEffect>)>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut campaign = self.load(campaign_id).await?;
            let version = campaign.version;
            let (out, effects) = apply(&mut campaign)?;

            let mut tx = self.pool.begin().await?;
            if !db::save_participants_tx(&mut tx, campaign_id, version, &campaign.participants)
                .await?
            {
                tx.rollback().await?;
                debug!(campaign_id, attempt, "stale campaign version; retrying");
                continue;
            }
            let now = Utc::now();
            for effect in &effects {
                db::enqueue_outbox_tx(&mut tx, effect, now).await?;
            }
            tx.commit().await?;
            return Ok(out);
        }
        warn!(campaign_id, "giving up after repeated version conflicts");
        Err(LifecycleError::Conflict(campaign_id))
    }

    // -----------------------------------------------------------------------
    // campaigns

    #[instrument(skip(self, draft))]
    pub async fn create_campaign(
        &self,
        brand_id: i64,
        draft: &CampaignDraft,
    ) -> LifecycleResult<Campaign> {
        validate_draft(draft)?;
        let brand = self.user(brand_id, "Brand").await?;
        if brand.kind != UserKind::Brand {
            return Err(LifecycleError::validation("Only brands can create campaigns"));
        }
        let id = db::insert_campaign(&self.pool, brand_id, draft).await?;
        info!(campaign_id = id, "campaign created");
        self.load(id).await
    }

    pub async fn get_campaign(
        &self,
        campaign_id: i64,
        viewer_id: i64,
    ) -> LifecycleResult<CampaignView> {
        let campaign = self.load(campaign_id).await?;
        Ok(CampaignView {
            is_owner: campaign.brand_id == viewer_id,
            campaign,
        })
    }

    pub async fn list_brand_campaigns(&self, brand_id: i64) -> LifecycleResult<Vec<Campaign>> {
        Ok(db::list_campaigns_by_brand(&self.pool, brand_id).await?)
    }

    pub async fn list_creator_campaigns(&self, creator_id: i64) -> LifecycleResult<Vec<Campaign>> {
        Ok(db::list_campaigns_for_creator(&self.pool, creator_id).await?)
    }

    /// Visible campaigns creators can apply to, optionally narrowed to a tag.
    pub async fn list_open_campaigns(&self, tag: Option<&str>) -> LifecycleResult<Vec<Campaign>> {
        let tag = tag.map(str::trim).filter(|t| !t.is_empty());
        Ok(db::list_visible_campaigns(&self.pool, tag).await?)
    }

    #[instrument(skip(self, draft))]
    pub async fn update_campaign(
        &self,
        campaign_id: i64,
        brand_id: i64,
        draft: &CampaignDraft,
    ) -> LifecycleResult<Campaign> {
        validate_draft(draft)?;
        let campaign = self.load(campaign_id).await?;
        if campaign.brand_id != brand_id {
            return Err(LifecycleError::precondition(
                "Only the campaign owner can change it",
            ));
        }
        db::update_campaign_details(&self.pool, campaign_id, draft).await?;
        self.load(campaign_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_campaign(&self, campaign_id: i64, brand_id: i64) -> LifecycleResult<()> {
        if !db::delete_campaign(&self.pool, campaign_id, brand_id).await? {
            return Err(LifecycleError::NotFound("Campaign"));
        }
        info!(campaign_id, "campaign deleted");
        Ok(())
    }

    pub async fn analytics(&self, campaign_id: i64) -> LifecycleResult<CampaignAnalytics> {
        let campaign = self.load(campaign_id).await?;
        Ok(summarize(&campaign))
    }

    /// Reactions of a published post, read with the user's own token.
    pub async fn post_analytics(&self, user_id: i64, post_id: &str) -> LifecycleResult<Value> {
        let user = self.user(user_id, "User").await?;
        let account = user
            .linkedin
            .ok_or_else(|| LifecycleError::precondition(NOT_LINKED))?;
        self.publisher
            .get_reactions(&account.access_token, post_id)
            .await
            .map_err(LifecycleError::Integration)
    }

    // -----------------------------------------------------------------------
    // participation

    /// A creator asks to join. The record starts `pending`.
    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        campaign_id: i64,
        creator_id: i64,
        amount: i64,
    ) -> LifecycleResult<Participant> {
        validate_amount(amount)?;
        let creator = self.user(creator_id, "Creator").await?;
        let participant = self
            .mutate(campaign_id, |campaign| {
                if campaign.participant(creator_id).is_some() {
                    return Err(LifecycleError::AlreadyParticipating(ALREADY_APPLIED));
                }
                let p = Participant::new(creator_id, ParticipationStatus::Pending, amount);
                campaign.participants.push(p.clone());
                let effect = SideEffect::notify(
                    creator_id,
                    campaign.brand_id,
                    format!(
                        "The creator \"{}\" has applied to your campaign \"{}\"",
                        creator.name, campaign.title
                    ),
                    Some(BRAND_CAMPAIGNS_LINK),
                );
                Ok((p, vec![effect]))
            })
            .await?;
        info!(campaign_id, creator_id, "creator applied");
        Ok(participant)
    }

    /// The brand invites a creator. `initial` defaults to `prospect`.
    #[instrument(skip(self))]
    pub async fn add_creator(
        &self,
        campaign_id: i64,
        creator_id: i64,
        amount: i64,
        initial: Option<ParticipationStatus>,
    ) -> LifecycleResult<Participant> {
        let status = initial.unwrap_or(ParticipationStatus::Prospect);
        if !matches!(
            status,
            ParticipationStatus::Prospect | ParticipationStatus::Approved
        ) {
            return Err(LifecycleError::validation(
                "Initial status must be prospect or approved",
            ));
        }
        validate_amount(amount)?;
        self.user(creator_id, "Creator").await?;
        self.mutate(campaign_id, |campaign| {
            if campaign.participant(creator_id).is_some() {
                return Err(LifecycleError::AlreadyParticipating(ALREADY_ADDED));
            }
            let p = Participant::new(creator_id, status, amount);
            campaign.participants.push(p.clone());
            let link = campaign_link(campaign.id);
            let effect = SideEffect::notify(
                campaign.brand_id,
                creator_id,
                format!("You have been added to a campaign: {}", campaign.title),
                Some(link.as_str()),
            );
            Ok((p, vec![effect]))
        })
        .await
    }

    /// The brand selects a creator directly into `active`.
    #[instrument(skip(self))]
    pub async fn select_creator(
        &self,
        campaign_id: i64,
        creator_id: i64,
        amount: i64,
    ) -> LifecycleResult<Participant> {
        validate_amount(amount)?;
        self.user(creator_id, "Creator").await?;
        self.mutate(campaign_id, |campaign| {
            if campaign.participant(creator_id).is_some() {
                return Err(LifecycleError::AlreadyParticipating(ALREADY_SELECTED));
            }
            let p = Participant::new(creator_id, ParticipationStatus::Active, amount);
            campaign.participants.push(p.clone());
            Ok((p, Vec::new()))
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_creator(&self, campaign_id: i64, creator_id: i64) -> LifecycleResult<()> {
        self.mutate(campaign_id, |campaign| {
            let before = campaign.participants.len();
            campaign.participants.retain(|p| p.creator_id != creator_id);
            if campaign.participants.len() == before {
                return Err(LifecycleError::precondition(NOT_SELECTED));
            }
            Ok(((), Vec::new()))
        })
        .await
    }

    /// Change the agreed compensation of a record that is not finished.
    pub async fn set_amount(
        &self,
        campaign_id: i64,
        creator_id: i64,
        amount: i64,
    ) -> LifecycleResult<Participant> {
        validate_amount(amount)?;
        self.mutate(campaign_id, |campaign| {
            let p = campaign
                .participant_mut(creator_id)
                .ok_or_else(|| LifecycleError::precondition(NOT_SELECTED))?;
            if p.status == ParticipationStatus::Done {
                return Err(LifecycleError::precondition(
                    "Amount cannot change after the work is accepted",
                ));
            }
            p.amount = amount;
            p.updated_at = Utc::now();
            Ok((p.clone(), Vec::new()))
        })
        .await
    }

    /// The brand approves or rejects a record.
    #[instrument(skip(self))]
    pub async fn decide(
        &self,
        campaign_id: i64,
        creator_id: i64,
        approve: bool,
    ) -> LifecycleResult<Participant> {
        let action = if approve {
            Action::Approve
        } else {
            Action::Reject
        };
        self.mutate(campaign_id, |campaign| {
            let brand_id = campaign.brand_id;
            let link = campaign_link(campaign.id);
            let title = campaign.title.clone();
            let p = transition(campaign, creator_id, action)?;
            let verdict = if approve { "approved" } else { "rejected" };
            let effect = SideEffect::notify(
                brand_id,
                creator_id,
                format!("Your participation in the campaign \"{title}\" has been {verdict}"),
                Some(link.as_str()),
            );
            Ok((p, vec![effect]))
        })
        .await
    }

    /// A creator turns down an invitation.
    #[instrument(skip(self))]
    pub async fn decline(&self, campaign_id: i64, creator_id: i64) -> LifecycleResult<Participant> {
        let creator = self.user(creator_id, "Creator").await?;
        self.mutate(campaign_id, |campaign| {
            let brand_id = campaign.brand_id;
            let title = campaign.title.clone();
            let p = transition(campaign, creator_id, Action::Decline)?;
            let effect = SideEffect::notify(
                creator_id,
                brand_id,
                format!(
                    "The creator \"{}\" has declined the campaign \"{}\"",
                    creator.name, title
                ),
                Some(BRAND_CAMPAIGNS_LINK),
            );
            Ok((p, vec![effect]))
        })
        .await
    }

    /// Hand in work. Campaign work is stored for review; independent work is
    /// published immediately.
    #[instrument(skip(self, work))]
    pub async fn submit_work(
        &self,
        creator_id: i64,
        work: WorkSubmission,
    ) -> LifecycleResult<SubmitOutcome> {
        if work.text.trim().is_empty() && work.files.is_empty() {
            return Err(LifecycleError::validation(CONTENT_REQUIRED));
        }
        let creator = self.user(creator_id, "Creator").await?;
        let Some(account) = creator.linkedin.as_ref() else {
            info!(creator_id, "submission needs a linked account");
            return Ok(SubmitOutcome::NeedsAccountLink);
        };

        let Some(campaign_id) = work.campaign_id else {
            let post = linkedin::publish(
                self.publisher.as_ref(),
                &self.media_root,
                account,
                &work.text,
                &work.files,
            )
            .await
            .map_err(LifecycleError::Integration)?;
            return Ok(SubmitOutcome::Published(post));
        };

        let kind = if work.kind.trim().is_empty() {
            "post".to_string()
        } else {
            work.kind.clone()
        };
        let content_id = self
            .mutate(campaign_id, |campaign| {
                let brand_id = campaign.brand_id;
                let title = campaign.title.clone();
                let p = campaign
                    .participant_mut(creator_id)
                    .ok_or_else(|| LifecycleError::precondition(NOT_SELECTED))?;
                if !p.content.is_empty() {
                    return Err(LifecycleError::precondition(ALREADY_SUBMITTED));
                }
                let next = p.status.apply(Action::SubmitWork).ok_or(
                    LifecycleError::InvalidTransition {
                        from: p.status,
                        action: Action::SubmitWork,
                    },
                )?;
                let now = Utc::now();
                let item = ContentItem {
                    id: Uuid::new_v4(),
                    kind: kind.clone(),
                    url: work.url.clone(),
                    text: work.text.clone(),
                    files: work.files.clone(),
                    urn: None,
                    claimed_at: None,
                    created_at: now,
                };
                let content_id = item.id;
                p.content.push(item);
                p.status = next;
                p.updated_at = now;
                let effects = vec![
                    SideEffect::notify(
                        creator_id,
                        creator_id,
                        format!("You have submitted your work for the campaign \"{title}\""),
                        Some(campaign_link(campaign_id).as_str()),
                    ),
                    SideEffect::notify(
                        creator_id,
                        brand_id,
                        format!(
                            "The creator \"{}\" has submitted their work for the campaign \"{}\"",
                            creator.name, title
                        ),
                        Some(BRAND_CAMPAIGNS_LINK),
                    ),
                ];
                Ok((content_id, effects))
            })
            .await?;
        info!(campaign_id, creator_id, %content_id, "work submitted");
        Ok(SubmitOutcome::Submitted { content_id })
    }

    /// The brand accepts submitted work: publish it, finish the record and
    /// bill the brand.
    #[instrument(skip(self))]
    pub async fn accept_work(
        &self,
        campaign_id: i64,
        creator_id: i64,
        content_id: Uuid,
    ) -> LifecycleResult<AcceptOutcome> {
        let campaign = self.load(campaign_id).await?;
        accepted_content(&campaign, creator_id, content_id)?;
        let creator = self.user(creator_id, "Creator").await?;
        let account = creator
            .linkedin
            .as_ref()
            .ok_or_else(|| LifecycleError::precondition(NOT_LINKED))?;

        // Only the caller holding the claim publishes.
        let content = self
            .mutate(campaign_id, |campaign| {
                let now = Utc::now();
                let content = accepted_content(campaign, creator_id, content_id)?;
                if content
                    .claimed_at
                    .is_some_and(|at| now - at < Duration::minutes(ACCEPT_CLAIM_LEASE_MINUTES))
                {
                    return Err(LifecycleError::precondition(ALREADY_PUBLISHING));
                }
                if let Some(item) = campaign
                    .participant_mut(creator_id)
                    .and_then(|p| p.content_item_mut(content_id))
                {
                    item.claimed_at = Some(now);
                }
                Ok((content, Vec::new()))
            })
            .await?;

        let post = match linkedin::publish(
            self.publisher.as_ref(),
            &self.media_root,
            account,
            &content.text,
            &content.files,
        )
        .await
        {
            Ok(post) => post,
            Err(err) => {
                self.release_claim(campaign_id, creator_id, content_id).await;
                return Err(LifecycleError::Integration(err));
            }
        };
        info!(post_id = %post.id, "accepted work published");

        for attempt in 1..=MAX_ATTEMPTS {
            let mut campaign = self.load(campaign_id).await?;
            let version = campaign.version;
            let content = accepted_content(&campaign, creator_id, content_id)?;
            let now = Utc::now();

            let mut tx = self.pool.begin().await?;
            let Some(p) = campaign.participant(creator_id) else {
                return Err(LifecycleError::precondition(NOT_SELECTED));
            };
            let new_invoice = invoice::build_invoice(&campaign, p, &content, now);
            let invoice_id = db::insert_invoice_tx(&mut tx, &new_invoice).await?;

            let title = campaign.title.clone();
            let brand_id = campaign.brand_id;
            if let Some(p) = campaign.participant_mut(creator_id) {
                if let Some(item) = p.content_item_mut(content_id) {
                    item.urn = Some(post.id.clone());
                    item.url = Some(post.url.clone());
                    item.claimed_at = None;
                }
                p.status = ParticipationStatus::Done;
                p.invoice_id = Some(invoice_id);
                p.updated_at = now;
            }
            if !db::save_participants_tx(&mut tx, campaign_id, version, &campaign.participants)
                .await?
            {
                tx.rollback().await?;
                debug!(campaign_id, attempt, "stale campaign version; retrying");
                continue;
            }

            let mut effects = vec![SideEffect::notify(
                brand_id,
                creator_id,
                format!("Your work for the campaign \"{title}\" has been accepted"),
                Some(campaign_link(campaign_id).as_str()),
            )];
            if let Some(template_id) = self.work_accepted_template {
                effects.push(SideEffect::Email {
                    to_email: creator.email.clone(),
                    to_name: creator.name.clone(),
                    template_id,
                    params: json!({
                        "campaign": title,
                        "amount": new_invoice.total_amount,
                        "post_url": post.url,
                        "invoice_number": new_invoice.invoice_number,
                    }),
                });
            }
            for effect in &effects {
                db::enqueue_outbox_tx(&mut tx, effect, now).await?;
            }
            tx.commit().await?;
            info!(campaign_id, creator_id, invoice_id, "work accepted");
            return Ok(AcceptOutcome { invoice_id, post });
        }
        warn!(campaign_id, post_id = %post.id, "post published but acceptance could not be saved");
        Err(LifecycleError::Conflict(campaign_id))
    }

    async fn release_claim(&self, campaign_id: i64, creator_id: i64, content_id: Uuid) {
        let released = self
            .mutate(campaign_id, |campaign| {
                if let Some(item) = campaign
                    .participant_mut(creator_id)
                    .and_then(|p| p.content_item_mut(content_id))
                {
                    item.claimed_at = None;
                }
                Ok(((), Vec::new()))
            })
            .await;
        if let Err(err) = released {
            warn!(?err, campaign_id, %content_id, "failed to release content claim");
        }
    }

    /// A brand reviews a creator after the work is done. The review is stored
    /// on the creator.
    #[instrument(skip(self, review))]
    pub async fn rate_creator(
        &self,
        campaign_id: i64,
        reviewer_id: i64,
        creator_id: i64,
        rating: i64,
        review: &str,
    ) -> LifecycleResult<Review> {
        if !(1..=10).contains(&rating) {
            return Err(LifecycleError::validation("Rating must be between 1 and 10"));
        }
        let campaign = self.load(campaign_id).await?;
        let p = campaign
            .participant(creator_id)
            .ok_or_else(|| LifecycleError::precondition(NOT_SELECTED))?;
        if p.status != ParticipationStatus::Done {
            return Err(LifecycleError::precondition(NOT_COMPLETED));
        }
        self.user(creator_id, "Creator").await?;
        if db::has_review(&self.pool, creator_id, reviewer_id, campaign_id).await? {
            return Err(LifecycleError::precondition(ALREADY_RATED));
        }
        let review = Review {
            reviewer_id,
            campaign_id,
            rating,
            review: review.trim().to_string(),
        };
        if !db::insert_review(&self.pool, creator_id, &review).await? {
            return Err(LifecycleError::precondition(ALREADY_RATED));
        }
        Ok(review)
    }
}

/// Apply `action` to the record of `creator_id` through the transition table.
fn transition(
    campaign: &mut Campaign,
    creator_id: i64,
    action: Action,
) -> LifecycleResult<Participant> {
    let p = campaign
        .participant_mut(creator_id)
        .ok_or_else(|| LifecycleError::precondition(NOT_SELECTED))?;
    let next = p
        .status
        .apply(action)
        .ok_or(LifecycleError::InvalidTransition {
            from: p.status,
            action,
        })?;
    p.status = next;
    p.updated_at = Utc::now();
    Ok(p.clone())
}

/// The content item a brand may accept, checked against current state.
fn accepted_content(
    campaign: &Campaign,
    creator_id: i64,
    content_id: Uuid,
) -> LifecycleResult<ContentItem> {
    let p = campaign
        .participant(creator_id)
        .ok_or_else(|| LifecycleError::precondition(NOT_SELECTED))?;
    let item = p
        .content_item(content_id)
        .ok_or(LifecycleError::NotFound("Content"))?;
    if p.status.apply(Action::AcceptWork).is_none() {
        return Err(LifecycleError::InvalidTransition {
            from: p.status,
            action: Action::AcceptWork,
        });
    }
    if item.urn.is_some() {
        return Err(LifecycleError::precondition("Content is already published"));
    }
    Ok(item.clone())
}

fn summarize(campaign: &Campaign) -> CampaignAnalytics {
    let mut out = CampaignAnalytics {
        participants: campaign.participants.len(),
        ..Default::default()
    };
    for p in &campaign.participants {
        *out.by_status.entry(p.status.as_str().to_string()).or_default() += 1;
        out.content_items += p.content.len();
        out.published_items += p.content.iter().filter(|c| c.urn.is_some()).count();
        if p.is_approved() {
            out.committed_amount += p.amount;
        }
    }
    out
}

fn validate_amount(amount: i64) -> LifecycleResult<()> {
    if amount < 0 {
        return Err(LifecycleError::validation("Amount must not be negative"));
    }
    Ok(())
}

fn validate_draft(draft: &CampaignDraft) -> LifecycleResult<()> {
    if draft.title.trim().is_empty() {
        return Err(LifecycleError::validation("Title is required"));
    }
    if draft.budget < 0 {
        return Err(LifecycleError::validation("Budget must not be negative"));
    }
    if draft.end_date < draft.start_date {
        return Err(LifecycleError::validation(
            "End date must not be before start date",
        ));
    }
    Ok(())
}
