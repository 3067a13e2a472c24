//! Like toggling and deduplicated view counting.
//!
//! Neither operation is transactional. Like counts are recomputed from the
//! relation rows after every toggle, and view counting falls back to a plain
//! increment whenever the view log cannot be consulted.

use chrono::{DateTime, Duration, Utc};
use metrics::increment_counter;
use tracing::{debug, warn};

use crate::models::{Id, LikeState, LikeTarget, ViewKey, ViewOutcome, ViewRecord};
use crate::repo::{Repo, RepoError};

#[derive(thiserror::Error, Debug)]
pub enum EngagementError {
    #[error("authentication required")] Unauthenticated,
    #[error("not found")] NotFound,
    /// Store unreachable or misconfigured; safe to retry.
    #[error("transient store error: {0}")] Transient(String),
}

impl From<RepoError> for EngagementError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => EngagementError::NotFound,
            RepoError::Conflict => EngagementError::Transient("unexpected conflict".into()),
            RepoError::Unsupported(m) | RepoError::Internal(m) => EngagementError::Transient(m),
        }
    }
}

async fn ensure_target<R: Repo + ?Sized>(repo: &R, target: LikeTarget) -> Result<i64, RepoError> {
    match target {
        LikeTarget::Post(id) => repo.get_post(id).await.map(|p| p.like_count),
        LikeTarget::Comment(id) => repo.get_comment(id).await.map(|c| c.like_count),
    }
}

/// Reads the authoritative count from the relation rows and writes it back to the cached counter.
async fn refresh_like_count<R: Repo + ?Sized>(repo: &R, target: LikeTarget) -> Result<i64, RepoError> {
    let count = repo.count_likes(target).await?;
    match target {
        LikeTarget::Post(id) => repo.set_post_like_count(id, count).await?,
        LikeTarget::Comment(id) => repo.set_comment_like_count(id, count).await?,
    }
    Ok(count)
}

/// Flips the requester's like on `target`. A duplicate insert converges to `liked = true`.
pub async fn toggle_like<R: Repo + ?Sized>(
    repo: &R,
    target: LikeTarget,
    user_id: Option<&str>,
) -> Result<LikeState, EngagementError> {
    let user_id = user_id.ok_or(EngagementError::Unauthenticated)?;
    ensure_target(repo, target).await?;

    let liked = if repo.has_like(target, user_id).await? {
        if !repo.delete_like(target, user_id).await? {
            debug!(?target, user_id, "like already removed by a concurrent request");
        }
        false
    } else {
        match repo.insert_like(target, user_id).await {
            Ok(()) => true,
            Err(RepoError::Conflict) => {
                debug!(?target, user_id, "duplicate like insert collapsed");
                true
            }
            Err(e) => return Err(e.into()),
        }
    };

    let like_count = refresh_like_count(repo, target).await?;
    increment_counter!("medboard_likes_toggled_total", "target" => target.kind(), "liked" => if liked { "true" } else { "false" });
    Ok(LikeState { liked, like_count })
}

/// Read-only like state. Anonymous requesters are never `liked`.
pub async fn like_state<R: Repo + ?Sized>(
    repo: &R,
    target: LikeTarget,
    user_id: Option<&str>,
) -> Result<LikeState, EngagementError> {
    let like_count = ensure_target(repo, target).await?;
    let liked = match user_id {
        Some(u) => repo.has_like(target, u).await?,
        None => false,
    };
    Ok(LikeState { liked, like_count })
}

/// Counts post views at most once per user, and once per IP within `window`.
#[derive(Debug, Clone, Copy)]
pub struct ViewCounter {
    window: Duration,
}

impl ViewCounter {
    pub const DEFAULT_WINDOW_HOURS: i64 = 24;

    pub fn new(window: Duration) -> Self { Self { window } }

    pub fn window(&self) -> Duration { self.window }

    pub fn key_for(user_id: Option<&str>, ip: Option<&str>) -> Option<ViewKey> {
        match (user_id, ip) {
            (Some(u), _) => Some(ViewKey::User(u.to_string())),
            (None, Some(ip)) if !ip.is_empty() => Some(ViewKey::Ip(ip.to_string())),
            _ => None,
        }
    }

    pub async fn record<R: Repo + ?Sized>(
        &self,
        repo: &R,
        post_id: Id,
        user_id: Option<&str>,
        ip: Option<&str>,
    ) -> Result<ViewOutcome, EngagementError> {
        self.record_at(repo, post_id, user_id, ip, Utc::now()).await
    }

    pub async fn record_at<R: Repo + ?Sized>(
        &self,
        repo: &R,
        post_id: Id,
        user_id: Option<&str>,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ViewOutcome, EngagementError> {
        let post = repo.get_post(post_id).await?;

        let Some(key) = Self::key_for(user_id, ip) else {
            debug!(post_id, "view without user or address; counting without dedup");
            return self.count(repo, post_id, "degraded").await;
        };

        match self.is_duplicate(repo, post_id, &key, now).await {
            Ok(true) => {
                debug!(post_id, ?key, "duplicate view suppressed");
                increment_counter!("medboard_views_total", "outcome" => "suppressed");
                return Ok(ViewOutcome { counted: false, view_count: post.view_count });
            }
            Ok(false) => {}
            Err(e) => {
                warn!(post_id, error = %e, "view log unavailable; counting without dedup");
                return self.count(repo, post_id, "degraded").await;
            }
        }

        match repo.insert_view(ViewRecord::new(post_id, &key, now)).await {
            Ok(()) => self.count(repo, post_id, "counted").await,
            Err(RepoError::Conflict) => {
                // a concurrent request for the same key won the insert
                let current = repo.get_post(post_id).await?;
                increment_counter!("medboard_views_total", "outcome" => "suppressed");
                Ok(ViewOutcome { counted: false, view_count: current.view_count })
            }
            Err(e) => {
                warn!(post_id, error = %e, "view log insert failed; counting without dedup");
                self.count(repo, post_id, "degraded").await
            }
        }
    }

    async fn is_duplicate<R: Repo + ?Sized>(
        &self,
        repo: &R,
        post_id: Id,
        key: &ViewKey,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let last = repo.last_view(post_id, key).await?;
        Ok(match (key, last) {
            (_, None) => false,
            (ViewKey::User(_), Some(_)) => true,
            (ViewKey::Ip(_), Some(at)) => now.signed_duration_since(at) < self.window,
        })
    }

    async fn count<R: Repo + ?Sized>(&self, repo: &R, post_id: Id, outcome: &'static str) -> Result<ViewOutcome, EngagementError> {
        let view_count = repo.increment_view_count(post_id).await?;
        increment_counter!("medboard_views_total", "outcome" => outcome);
        Ok(ViewOutcome { counted: true, view_count })
    }
}

impl Default for ViewCounter {
    fn default() -> Self { Self::new(Duration::hours(Self::DEFAULT_WINDOW_HOURS)) }
}
