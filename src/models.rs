use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;
/// Opaque subject issued by the identity provider.
pub type UserId = String;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub author_id: UserId,
    pub board: String,
    pub sub_board: Option<String>,
    pub category: Option<String>,
    pub title: String,
    /// `None` when the requester is not allowed to read a restricted post.
    pub content: Option<String>,
    pub is_question: bool,
    pub is_pinned: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[schema(skip)]
    pub deleted_at: Option<DateTime<Utc>>, // soft delete marker
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPost {
    pub board: String,
    pub sub_board: Option<String>,
    pub category: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_question: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub board: Option<String>,
    pub sub_board: Option<String>,
    pub category: Option<String>,
    pub is_question: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PostFilter {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, post: &Post) -> bool {
        post.deleted_at.is_none()
            && self.board.as_ref().map_or(true, |b| *b == post.board)
            && self.sub_board.as_ref().map_or(true, |s| post.sub_board.as_ref() == Some(s))
            && self.category.as_ref().map_or(true, |c| post.category.as_ref() == Some(c))
            && self.is_question.map_or(true, |q| q == post.is_question)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub author_id: UserId,
    pub parent_id: Option<Id>,
    pub content: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[schema(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateComment {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Profile {
    pub id: UserId,
    pub role: Option<String>,
    pub roles: Vec<String>,
    pub workplace_name: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self { id: id.into(), role: None, roles: Vec::new(), workplace_name: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum LikeTarget {
    Post(Id),
    Comment(Id),
}

impl LikeTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "post",
            LikeTarget::Comment(_) => "comment",
        }
    }
}

/// Identity used to detect a repeated view of the same post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKey {
    User(UserId),
    Ip(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ViewRecord {
    pub post_id: Id,
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

impl ViewRecord {
    pub fn new(post_id: Id, key: &ViewKey, viewed_at: DateTime<Utc>) -> Self {
        let (user_id, ip_address) = match key {
            ViewKey::User(u) => (Some(u.clone()), None),
            ViewKey::Ip(ip) => (None, Some(ip.clone())),
        };
        Self { post_id, user_id, ip_address, viewed_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OAuthTokens {
    pub user_id: UserId,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutcome {
    pub counted: bool,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostDetail {
    pub post: Post,
    pub can_view_content: bool,
    /// Omitted entirely for restricted posts the requester may not read.
    pub comments: Option<Vec<Comment>>,
}
