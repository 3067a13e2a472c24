//! Role classification and content visibility for posts.
//!
//! Both checks are table driven: the staff role set and the list of restricted
//! `board/sub_board` pairs come from configuration rather than literals.

use std::collections::HashSet;

use tracing::warn;

use crate::models::{Comment, Post, Profile};
use crate::repo::{ProfileRepo, RepoError};

pub const DEFAULT_STAFF_ROLES: &[&str] = &["manager", "admin_staff"];
pub const DEFAULT_RESTRICTED_SUB_BOARDS: &str = "*/qa";

/// Decides whether a user holds the staff capability.
#[derive(Debug, Clone)]
pub struct StaffPolicy {
    roles: HashSet<String>,
}

impl StaffPolicy {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { roles: roles.into_iter().map(|r| r.into().trim().to_lowercase()).filter(|r| !r.is_empty()).collect() }
    }

    /// Comma separated role list, e.g. `manager,admin_staff`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_staff_role(&self, role: &str) -> bool {
        self.roles.contains(&role.trim().to_lowercase())
    }

    /// Staff if the primary role or any secondary role is in the staff set.
    pub fn profile_is_staff(&self, profile: &Profile) -> bool {
        profile.role.as_deref().map_or(false, |r| self.is_staff_role(r))
            || profile.roles.iter().any(|r| self.is_staff_role(r))
    }

    /// Looks up the stored profile. Any failure, including a missing row, yields `false`.
    pub async fn is_staff<R>(&self, repo: &R, user_id: Option<&str>) -> bool
    where
        R: ProfileRepo + ?Sized,
    {
        let Some(user_id) = user_id else { return false };
        match repo.get_profile(user_id).await {
            Ok(profile) => self.profile_is_staff(&profile),
            Err(RepoError::NotFound) => false,
            Err(e) => {
                warn!(user_id, error = %e, "profile lookup failed; treating requester as non-staff");
                false
            }
        }
    }
}

impl Default for StaffPolicy {
    fn default() -> Self { Self::new(DEFAULT_STAFF_ROLES.iter().copied()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RestrictionRule {
    /// `None` matches every board.
    board: Option<String>,
    sub_board: String,
}

/// Classifies posts whose content only the author and staff may read.
#[derive(Debug, Clone)]
pub struct RestrictionPolicy {
    rules: Vec<RestrictionRule>,
}

impl RestrictionPolicy {
    /// Parses `board/sub_board` pairs separated by commas; `*` as board matches any board.
    /// Entries without a slash are read as a sub-board under any board.
    pub fn parse(list: &str) -> Self {
        let rules = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| match entry.split_once('/') {
                Some((board, sub)) => RestrictionRule {
                    board: (board.trim() != "*").then(|| board.trim().to_string()),
                    sub_board: sub.trim().to_string(),
                },
                None => RestrictionRule { board: None, sub_board: entry.to_string() },
            })
            .collect();
        Self { rules }
    }

    pub fn none() -> Self { Self { rules: Vec::new() } }

    pub fn is_restricted(&self, post: &Post) -> bool {
        let Some(sub) = post.sub_board.as_deref() else { return false };
        self.rules
            .iter()
            .any(|r| r.sub_board == sub && r.board.as_deref().map_or(true, |b| b == post.board))
    }
}

impl Default for RestrictionPolicy {
    fn default() -> Self { Self::parse(DEFAULT_RESTRICTED_SUB_BOARDS) }
}

/// Author or staff may read the full content.
pub fn can_view_content(post: &Post, requester_id: Option<&str>, requester_is_staff: bool) -> bool {
    requester_id.map_or(false, |id| id == post.author_id) || requester_is_staff
}

/// Everything needed to render a post for one requester, decided once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub restricted: bool,
    pub can_view_content: bool,
}

impl Visibility {
    pub fn evaluate(policy: &RestrictionPolicy, post: &Post, requester_id: Option<&str>, is_staff: bool) -> Self {
        let restricted = policy.is_restricted(post);
        Self { restricted, can_view_content: !restricted || can_view_content(post, requester_id, is_staff) }
    }

    pub fn show_comments(&self) -> bool { self.can_view_content }

    /// Withholds the body when the requester fails the gate.
    pub fn redact(&self, mut post: Post) -> Post {
        if !self.can_view_content {
            post.content = None;
        }
        post
    }

    pub fn comments(&self, comments: Vec<Comment>) -> Option<Vec<Comment>> {
        self.show_comments().then_some(comments)
    }
}
