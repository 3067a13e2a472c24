use chrono::{DateTime, Utc};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    /// The backing table or feature is absent in this deployment.
    #[error("unsupported: {0}")] Unsupported(String),
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

/// Detail and listing queries never return soft-deleted rows.
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn list_posts(&self, filter: &PostFilter) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    async fn create_post(&self, author_id: &str, new: NewPost) -> RepoResult<Post>;
    async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post>;
    async fn set_pinned(&self, id: Id, pinned: bool) -> RepoResult<Post>;
    async fn soft_delete_post(&self, id: Id) -> RepoResult<()>;
    async fn set_post_like_count(&self, id: Id, count: i64) -> RepoResult<()>;
    /// Adds one view at the store and returns the new total.
    async fn increment_view_count(&self, id: Id) -> RepoResult<i64>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    async fn create_comment(&self, post_id: Id, author_id: &str, new: NewComment) -> RepoResult<Comment>;
    async fn update_comment(&self, id: Id, content: String) -> RepoResult<Comment>;
    async fn soft_delete_comment(&self, id: Id) -> RepoResult<()>;
    async fn set_comment_like_count(&self, id: Id, count: i64) -> RepoResult<()>;
}

#[async_trait]
pub trait LikeRepo: Send + Sync {
    async fn has_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<bool>;
    /// Fails with `Conflict` when the (target, user) row already exists.
    async fn insert_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<()>;
    /// Returns whether a row was removed.
    async fn delete_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<bool>;
    async fn count_likes(&self, target: LikeTarget) -> RepoResult<i64>;
}

#[async_trait]
pub trait ViewRepo: Send + Sync {
    async fn last_view(&self, post_id: Id, key: &ViewKey) -> RepoResult<Option<DateTime<Utc>>>;
    async fn insert_view(&self, record: ViewRecord) -> RepoResult<()>;
}

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> RepoResult<Profile>;
    async fn upsert_profile(&self, profile: Profile) -> RepoResult<Profile>;
}

#[async_trait]
pub trait OAuthTokenRepo: Send + Sync {
    async fn save_tokens(&self, tokens: OAuthTokens) -> RepoResult<()>;
    async fn get_tokens(&self, user_id: &str, provider: &str) -> RepoResult<OAuthTokens>;
    async fn delete_tokens(&self, user_id: &str) -> RepoResult<()>;
}

pub trait Repo: PostRepo + CommentRepo + LikeRepo + ViewRepo + ProfileRepo + OAuthTokenRepo {}

impl<T> Repo for T where T: PostRepo + CommentRepo + LikeRepo + ViewRepo + ProfileRepo + OAuthTokenRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default)]
    struct State {
        posts: HashMap<Id, Post>,
        comments: HashMap<Id, Comment>,
        likes: HashSet<(LikeTarget, UserId)>,
        views: Vec<ViewRecord>,
        profiles: HashMap<UserId, Profile>,
        tokens: HashMap<(UserId, String), OAuthTokens>,
        next_id: Id,
    }

    /// Process-local store used by tests and single-node development runs.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        view_log: bool,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), view_log: true }
        }

        /// A store whose view log table is missing, for exercising degraded counting.
        pub fn without_view_log() -> Self {
            Self { view_log: false, ..Self::new() }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        fn live_post(state: &mut State, id: Id) -> RepoResult<&mut Post> {
            state.posts.get_mut(&id).filter(|p| p.deleted_at.is_none()).ok_or(RepoError::NotFound)
        }

        fn post_is_live(state: &State, id: Id) -> bool {
            state.posts.get(&id).is_some_and(|p| p.deleted_at.is_none())
        }

        /// A comment is gone once it or its post is soft-deleted.
        fn comment_is_live(state: &State, comment: &Comment) -> bool {
            comment.deleted_at.is_none() && Self::post_is_live(state, comment.post_id)
        }

        fn live_comment(state: &mut State, id: Id) -> RepoResult<&mut Comment> {
            let snapshot: &State = state;
            let live = snapshot.comments.get(&id).is_some_and(|c| Self::comment_is_live(snapshot, c));
            if !live { return Err(RepoError::NotFound); }
            state.comments.get_mut(&id).ok_or(RepoError::NotFound)
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn list_posts(&self, filter: &PostFilter) -> RepoResult<Vec<Post>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.posts.values().filter(|p| filter.matches(p)).cloned().collect();
            // pinned first, then newest
            v.sort_by(|a, b| b.is_pinned.cmp(&a.is_pinned).then(b.created_at.cmp(&a.created_at)).then(b.id.cmp(&a.id)));
            Ok(v.into_iter().skip(filter.offset() as usize).take(filter.limit() as usize).collect())
        }
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            let s = self.read()?;
            s.posts.get(&id).filter(|p| p.deleted_at.is_none()).cloned().ok_or(RepoError::NotFound)
        }
        async fn create_post(&self, author_id: &str, new: NewPost) -> RepoResult<Post> {
            let mut s = self.write()?;
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let post = Post {
                id,
                author_id: author_id.to_string(),
                board: new.board,
                sub_board: new.sub_board,
                category: new.category,
                title: new.title,
                content: Some(new.content),
                is_question: new.is_question,
                is_pinned: false,
                view_count: 0,
                like_count: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            s.posts.insert(id, post.clone());
            Ok(post)
        }
        async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post> {
            let mut s = self.write()?;
            let post = Self::live_post(&mut s, id)?;
            if let Some(title) = upd.title { post.title = title; }
            if let Some(content) = upd.content { post.content = Some(content); }
            if let Some(category) = upd.category { post.category = Some(category); }
            post.updated_at = Utc::now();
            Ok(post.clone())
        }
        async fn set_pinned(&self, id: Id, pinned: bool) -> RepoResult<Post> {
            let mut s = self.write()?;
            let post = Self::live_post(&mut s, id)?;
            post.is_pinned = pinned;
            Ok(post.clone())
        }
        async fn soft_delete_post(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            Self::live_post(&mut s, id)?.deleted_at = Some(Utc::now());
            Ok(())
        }
        async fn set_post_like_count(&self, id: Id, count: i64) -> RepoResult<()> {
            let mut s = self.write()?;
            Self::live_post(&mut s, id)?.like_count = count;
            Ok(())
        }
        async fn increment_view_count(&self, id: Id) -> RepoResult<i64> {
            let mut s = self.write()?;
            let post = Self::live_post(&mut s, id)?;
            post.view_count += 1;
            Ok(post.view_count)
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.comments
                .values()
                .filter(|c| c.post_id == post_id && c.deleted_at.is_none())
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(v)
        }
        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let s = self.read()?;
            s.comments.get(&id).filter(|c| Self::comment_is_live(&s, c)).cloned().ok_or(RepoError::NotFound)
        }
        async fn create_comment(&self, post_id: Id, author_id: &str, new: NewComment) -> RepoResult<Comment> {
            let mut s = self.write()?;
            Self::live_post(&mut s, post_id)?;
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let comment = Comment {
                id,
                post_id,
                author_id: author_id.to_string(),
                parent_id: new.parent_id,
                content: new.content,
                like_count: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            s.comments.insert(id, comment.clone());
            Ok(comment)
        }
        async fn update_comment(&self, id: Id, content: String) -> RepoResult<Comment> {
            let mut s = self.write()?;
            let comment = Self::live_comment(&mut s, id)?;
            comment.content = content;
            comment.updated_at = Utc::now();
            Ok(comment.clone())
        }
        async fn soft_delete_comment(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            Self::live_comment(&mut s, id)?.deleted_at = Some(Utc::now());
            Ok(())
        }
        async fn set_comment_like_count(&self, id: Id, count: i64) -> RepoResult<()> {
            let mut s = self.write()?;
            Self::live_comment(&mut s, id)?.like_count = count;
            Ok(())
        }
    }

    #[async_trait]
    impl LikeRepo for InMemRepo {
        async fn has_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<bool> {
            let s = self.read()?;
            Ok(s.likes.contains(&(target, user_id.to_string())))
        }
        async fn insert_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<()> {
            let mut s = self.write()?;
            if !s.likes.insert((target, user_id.to_string())) {
                return Err(RepoError::Conflict);
            }
            Ok(())
        }
        async fn delete_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<bool> {
            let mut s = self.write()?;
            Ok(s.likes.remove(&(target, user_id.to_string())))
        }
        async fn count_likes(&self, target: LikeTarget) -> RepoResult<i64> {
            let s = self.read()?;
            Ok(s.likes.iter().filter(|(t, _)| *t == target).count() as i64)
        }
    }

    #[async_trait]
    impl ViewRepo for InMemRepo {
        async fn last_view(&self, post_id: Id, key: &ViewKey) -> RepoResult<Option<DateTime<Utc>>> {
            if !self.view_log { return Err(RepoError::Unsupported("post_views".into())); }
            let s = self.read()?;
            Ok(s.views
                .iter()
                .filter(|v| v.post_id == post_id && ViewKey::matches(key, v))
                .map(|v| v.viewed_at)
                .max())
        }
        async fn insert_view(&self, record: ViewRecord) -> RepoResult<()> {
            if !self.view_log { return Err(RepoError::Unsupported("post_views".into())); }
            let mut s = self.write()?;
            // mirrors the partial unique index on (post_id, user_id)
            if record.user_id.is_some()
                && s.views.iter().any(|v| v.post_id == record.post_id && v.user_id == record.user_id)
            {
                return Err(RepoError::Conflict);
            }
            s.views.push(record);
            Ok(())
        }
    }

    impl ViewKey {
        fn matches(&self, record: &ViewRecord) -> bool {
            match self {
                ViewKey::User(u) => record.user_id.as_ref() == Some(u),
                ViewKey::Ip(ip) => record.user_id.is_none() && record.ip_address.as_ref() == Some(ip),
            }
        }
    }

    #[async_trait]
    impl ProfileRepo for InMemRepo {
        async fn get_profile(&self, user_id: &str) -> RepoResult<Profile> {
            let s = self.read()?;
            s.profiles.get(user_id).cloned().ok_or(RepoError::NotFound)
        }
        async fn upsert_profile(&self, profile: Profile) -> RepoResult<Profile> {
            let mut s = self.write()?;
            s.profiles.insert(profile.id.clone(), profile.clone());
            Ok(profile)
        }
    }

    #[async_trait]
    impl OAuthTokenRepo for InMemRepo {
        async fn save_tokens(&self, tokens: OAuthTokens) -> RepoResult<()> {
            let mut s = self.write()?;
            s.tokens.insert((tokens.user_id.clone(), tokens.provider.clone()), tokens);
            Ok(())
        }
        async fn get_tokens(&self, user_id: &str, provider: &str) -> RepoResult<OAuthTokens> {
            let s = self.read()?;
            s.tokens.get(&(user_id.to_string(), provider.to_string())).cloned().ok_or(RepoError::NotFound)
        }
        async fn delete_tokens(&self, user_id: &str) -> RepoResult<()> {
            let mut s = self.write()?;
            s.tokens.retain(|(u, _), _| u != user_id);
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const POST_COLUMNS: &str = "id, author_id, board, sub_board, category, title, content, is_question, is_pinned, \
         view_count, like_count, created_at, updated_at, deleted_at";
    const COMMENT_COLUMNS: &str = "id, post_id, author_id, parent_id, content, like_count, created_at, updated_at, deleted_at";
    /// Comments of a soft-deleted post are treated as deleted.
    const LIVE_POST: &str = "EXISTS (SELECT 1 FROM posts WHERE posts.id = comments.post_id AND posts.deleted_at IS NULL)";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub fn pool(&self) -> &Pool<Postgres> { &self.pool }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => RepoError::Conflict,
                Some("42P01") => RepoError::Unsupported(db.message().to_string()),
                _ => RepoError::Internal(db.message().to_string()),
            },
            other => RepoError::Internal(other.to_string()),
        }
    }

    fn like_table(target: LikeTarget) -> (&'static str, &'static str, Id) {
        match target {
            LikeTarget::Post(id) => ("post_likes", "post_id", id),
            LikeTarget::Comment(id) => ("comment_likes", "comment_id", id),
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn list_posts(&self, filter: &PostFilter) -> RepoResult<Vec<Post>> {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE deleted_at IS NULL
                   AND ($1::text IS NULL OR board = $1)
                   AND ($2::text IS NULL OR sub_board = $2)
                   AND ($3::text IS NULL OR category = $3)
                   AND ($4::bool IS NULL OR is_question = $4)
                 ORDER BY is_pinned DESC, created_at DESC, id DESC
                 LIMIT $5 OFFSET $6"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(filter.board.as_ref())
                .bind(filter.sub_board.as_ref())
                .bind(filter.category.as_ref())
                .bind(filter.is_question)
                .bind(filter.limit())
                .bind(filter.offset())
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND deleted_at IS NULL");
            sqlx::query_as::<_, Post>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn create_post(&self, author_id: &str, new: NewPost) -> RepoResult<Post> {
            let sql = format!(
                "INSERT INTO posts (author_id, board, sub_board, category, title, content, is_question)
                 VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(author_id)
                .bind(&new.board)
                .bind(new.sub_board.as_ref())
                .bind(new.category.as_ref())
                .bind(&new.title)
                .bind(&new.content)
                .bind(new.is_question)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post> {
            let sql = format!(
                "UPDATE posts SET title = COALESCE($2, title), content = COALESCE($3, content),
                        category = COALESCE($4, category), updated_at = now()
                 WHERE id = $1 AND deleted_at IS NULL RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(id)
                .bind(upd.title.as_ref())
                .bind(upd.content.as_ref())
                .bind(upd.category.as_ref())
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn set_pinned(&self, id: Id, pinned: bool) -> RepoResult<Post> {
            let sql = format!("UPDATE posts SET is_pinned = $2 WHERE id = $1 AND deleted_at IS NULL RETURNING {POST_COLUMNS}");
            sqlx::query_as::<_, Post>(&sql).bind(id).bind(pinned).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn soft_delete_post(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE posts SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn set_post_like_count(&self, id: Id, count: i64) -> RepoResult<()> {
            let res = sqlx::query("UPDATE posts SET like_count = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id).bind(count).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn increment_view_count(&self, id: Id) -> RepoResult<i64> {
            let (count,): (i64,) = sqlx::query_as(
                "UPDATE posts SET view_count = view_count + 1 WHERE id = $1 AND deleted_at IS NULL RETURNING view_count"
            ).bind(id).fetch_one(&self.pool).await.map_err(map_err)?;
            Ok(count)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC, id ASC"
            );
            sqlx::query_as::<_, Comment>(&sql).bind(post_id).fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND deleted_at IS NULL AND {LIVE_POST}");
            sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn create_comment(&self, post_id: Id, author_id: &str, new: NewComment) -> RepoResult<Comment> {
            // guarded insert so a comment never lands on a deleted post
            let sql = format!(
                "INSERT INTO comments (post_id, author_id, parent_id, content)
                 SELECT $1, $2, $3, $4 WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1 AND deleted_at IS NULL)
                 RETURNING {COMMENT_COLUMNS}"
            );
            sqlx::query_as::<_, Comment>(&sql)
                .bind(post_id)
                .bind(author_id)
                .bind(new.parent_id)
                .bind(&new.content)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn update_comment(&self, id: Id, content: String) -> RepoResult<Comment> {
            let sql = format!(
                "UPDATE comments SET content = $2, updated_at = now() WHERE id = $1 AND deleted_at IS NULL AND {LIVE_POST} RETURNING {COMMENT_COLUMNS}"
            );
            sqlx::query_as::<_, Comment>(&sql).bind(id).bind(&content).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn soft_delete_comment(&self, id: Id) -> RepoResult<()> {
            let sql = format!("UPDATE comments SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL AND {LIVE_POST}");
            let res = sqlx::query(&sql).bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn set_comment_like_count(&self, id: Id, count: i64) -> RepoResult<()> {
            let sql = format!("UPDATE comments SET like_count = $2 WHERE id = $1 AND deleted_at IS NULL AND {LIVE_POST}");
            let res = sqlx::query(&sql).bind(id).bind(count).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl LikeRepo for PgRepo {
        async fn has_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<bool> {
            let (table, column, id) = like_table(target);
            let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = $1 AND user_id = $2)");
            let (exists,): (bool,) = sqlx::query_as(&sql).bind(id).bind(user_id).fetch_one(&self.pool).await.map_err(map_err)?;
            Ok(exists)
        }
        async fn insert_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<()> {
            let (table, column, id) = like_table(target);
            let sql = format!("INSERT INTO {table} ({column}, user_id) VALUES ($1, $2)");
            sqlx::query(&sql).bind(id).bind(user_id).execute(&self.pool).await.map_err(map_err)?;
            Ok(())
        }
        async fn delete_like(&self, target: LikeTarget, user_id: &str) -> RepoResult<bool> {
            let (table, column, id) = like_table(target);
            let sql = format!("DELETE FROM {table} WHERE {column} = $1 AND user_id = $2");
            let res = sqlx::query(&sql).bind(id).bind(user_id).execute(&self.pool).await.map_err(map_err)?;
            Ok(res.rows_affected() > 0)
        }
        async fn count_likes(&self, target: LikeTarget) -> RepoResult<i64> {
            let (table, column, id) = like_table(target);
            let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = $1");
            let (count,): (i64,) = sqlx::query_as(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)?;
            Ok(count)
        }
    }

    #[async_trait]
    impl ViewRepo for PgRepo {
        async fn last_view(&self, post_id: Id, key: &ViewKey) -> RepoResult<Option<DateTime<Utc>>> {
            let q = match key {
                ViewKey::User(u) => sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
                    "SELECT MAX(viewed_at) FROM post_views WHERE post_id = $1 AND user_id = $2"
                ).bind(post_id).bind(u),
                ViewKey::Ip(ip) => sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
                    "SELECT MAX(viewed_at) FROM post_views WHERE post_id = $1 AND user_id IS NULL AND ip_address = $2"
                ).bind(post_id).bind(ip),
            };
            let (last,) = q.fetch_one(&self.pool).await.map_err(map_err)?;
            Ok(last)
        }
        async fn insert_view(&self, record: ViewRecord) -> RepoResult<()> {
            sqlx::query("INSERT INTO post_views (post_id, user_id, ip_address, viewed_at) VALUES ($1,$2,$3,$4)")
                .bind(record.post_id)
                .bind(record.user_id.as_ref())
                .bind(record.ip_address.as_ref())
                .bind(record.viewed_at)
                .execute(&self.pool).await.map_err(map_err)?;
            Ok(())
        }
    }

    #[async_trait]
    impl ProfileRepo for PgRepo {
        async fn get_profile(&self, user_id: &str) -> RepoResult<Profile> {
            sqlx::query_as::<_, Profile>("SELECT id, role, roles, workplace_name FROM profiles WHERE id = $1")
                .bind(user_id).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn upsert_profile(&self, profile: Profile) -> RepoResult<Profile> {
            sqlx::query_as::<_, Profile>(
                "INSERT INTO profiles (id, role, roles, workplace_name) VALUES ($1,$2,$3,$4)
                 ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role, roles = EXCLUDED.roles,
                        workplace_name = EXCLUDED.workplace_name
                 RETURNING id, role, roles, workplace_name"
            )
            .bind(&profile.id)
            .bind(profile.role.as_ref())
            .bind(&profile.roles)
            .bind(profile.workplace_name.as_ref())
            .fetch_one(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl OAuthTokenRepo for PgRepo {
        async fn save_tokens(&self, tokens: OAuthTokens) -> RepoResult<()> {
            sqlx::query(
                "INSERT INTO oauth_tokens (user_id, provider, access_token, refresh_token, expires_at) VALUES ($1,$2,$3,$4,$5)
                 ON CONFLICT (user_id, provider) DO UPDATE SET access_token = EXCLUDED.access_token,
                        refresh_token = EXCLUDED.refresh_token, expires_at = EXCLUDED.expires_at"
            )
            .bind(&tokens.user_id)
            .bind(&tokens.provider)
            .bind(&tokens.access_token)
            .bind(tokens.refresh_token.as_ref())
            .bind(tokens.expires_at)
            .execute(&self.pool).await.map_err(map_err)?;
            Ok(())
        }
        async fn get_tokens(&self, user_id: &str, provider: &str) -> RepoResult<OAuthTokens> {
            sqlx::query_as::<_, OAuthTokens>(
                "SELECT user_id, provider, access_token, refresh_token, expires_at FROM oauth_tokens WHERE user_id = $1 AND provider = $2"
            ).bind(user_id).bind(provider).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_tokens(&self, user_id: &str) -> RepoResult<()> {
            sqlx::query("DELETE FROM oauth_tokens WHERE user_id = $1")
                .bind(user_id).execute(&self.pool).await.map_err(map_err)?;
            Ok(())
        }
    }
}
