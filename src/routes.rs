use std::net::IpAddr;
use std::sync::Arc;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Auth, JwtKeys, Requester};
use crate::config::AppConfig;
use crate::engagement::{self, ViewCounter};
use crate::error::ApiError;
use crate::models::*;
use crate::oauth::{OAuthClient, OAuthStateStore};
use crate::policy::{RestrictionPolicy, StaffPolicy, Visibility};
use crate::rate_limit::{InMemoryRateLimiter, RateAction, RateLimiterFacade};
use crate::repo::{Repo, RepoError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/posts")
                    .route(web::get().to(list_posts))
                    .route(web::post().to(create_post)),
            )
            .service(
                web::resource("/posts/{id}")
                    .route(web::get().to(get_post))
                    .route(web::patch().to(update_post))
                    .route(web::delete().to(delete_post)),
            )
            .service(web::resource("/posts/{id}/pin").route(web::post().to(pin_post)))
            .service(
                web::resource("/posts/{id}/like")
                    .route(web::get().to(get_post_like))
                    .route(web::post().to(toggle_post_like)),
            )
            .service(web::resource("/posts/{id}/view").route(web::post().to(record_view)))
            .service(
                web::resource("/posts/{id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(create_comment)),
            )
            .service(
                web::resource("/comments/{id}")
                    .route(web::patch().to(update_comment))
                    .route(web::delete().to(delete_comment)),
            )
            .service(
                web::resource("/comments/{id}/like")
                    .route(web::get().to(get_comment_like))
                    .route(web::post().to(toggle_comment_like)),
            )
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/auth/logout").route(web::post().to(logout)))
            .service(web::resource("/auth/oauth/login").route(web::get().to(oauth_login)))
            .service(web::resource("/auth/oauth/callback").route(web::get().to(oauth_callback)))
            .service(web::resource("/profiles/me").route(web::put().to(update_my_profile)))
            .service(web::resource("/admin/profiles/{user_id}/role").route(web::post().to(set_profile_role))),
    );
}

const TITLE_MAX: usize = 200;
const CONTENT_MAX: usize = 20_000;
const COMMENT_MAX: usize = 5_000;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub jwt: JwtKeys,
    pub staff: StaffPolicy,
    pub restrictions: RestrictionPolicy,
    pub views: ViewCounter,
    pub rate_limiter: Option<RateLimiterFacade>,
    pub oauth: Option<OAuthClient>,
    pub oauth_states: OAuthStateStore,
    pub frontend_url: String,
    pub trusted_proxies: Vec<IpAddr>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, cfg: &AppConfig) -> Self {
        Self {
            repo,
            jwt: JwtKeys::new(&cfg.jwt_secret),
            staff: cfg.staff.clone(),
            restrictions: cfg.restrictions.clone(),
            views: ViewCounter::new(cfg.view_window),
            rate_limiter: cfg.rate_limit.clone().map(|rl| RateLimiterFacade::new(InMemoryRateLimiter::new(), rl)),
            oauth: cfg.oauth.clone().map(OAuthClient::new),
            oauth_states: OAuthStateStore::default(),
            frontend_url: cfg.frontend_url.clone(),
            trusted_proxies: cfg.trusted_proxies.clone(),
        }
    }

    async fn is_staff(&self, user_id: Option<&str>) -> bool {
        self.staff.is_staff(&*self.repo, user_id).await
    }

    fn throttle(&self, action: RateAction, client: &str) -> Result<(), ApiError> {
        match &self.rate_limiter {
            Some(rl) if !rl.allow(action, client) => Err(ApiError::TooManyRequests),
            _ => Ok(()),
        }
    }

    /// Computes the gate once for this request.
    async fn visibility(&self, post: &Post, user_id: Option<&str>) -> Visibility {
        // staff lookup only matters for restricted posts
        if !self.restrictions.is_restricted(post) {
            return Visibility::evaluate(&self.restrictions, post, user_id, false);
        }
        let is_staff = self.is_staff(user_id).await;
        Visibility::evaluate(&self.restrictions, post, user_id, is_staff)
    }

    /// Comment likes follow the parent post's gate.
    async fn require_thread_visible(&self, comment_id: Id, user_id: Option<&str>) -> Result<(), ApiError> {
        let comment = self.repo.get_comment(comment_id).await?;
        let post = self.repo.get_post(comment.post_id).await?;
        if !self.visibility(&post, user_id).await.show_comments() {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

fn require_text(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    if len > max {
        return Err(ApiError::BadRequest(format!("{field} exceeds {max} characters")));
    }
    Ok(())
}

// ---------------- Posts -------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(
        ("board" = Option<String>, Query, description = "Board filter"),
        ("sub_board" = Option<String>, Query, description = "Sub-board filter"),
        ("category" = Option<String>, Query, description = "Category filter"),
        ("is_question" = Option<bool>, Query, description = "Question posts only"),
        ("limit" = Option<i64>, Query, description = "Page size (max 100)"),
        ("offset" = Option<i64>, Query, description = "Page offset")
    ),
    responses((status = 200, description = "Posts, pinned first; restricted content withheld", body = [Post]))
)]
pub async fn list_posts(
    requester: Requester,
    data: web::Data<AppState>,
    query: web::Query<PostFilter>,
) -> Result<HttpResponse, ApiError> {
    let posts = data.repo.list_posts(&query).await?;
    let user_id = requester.user_id();
    let is_staff = if posts.iter().any(|p| data.restrictions.is_restricted(p)) {
        data.is_staff(user_id).await
    } else {
        false
    };
    let posts: Vec<Post> = posts
        .into_iter()
        .map(|p| Visibility::evaluate(&data.restrictions, &p, user_id, is_staff).redact(p))
        .collect();
    Ok(HttpResponse::Ok().json(posts))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts",
    request_body = NewPost,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid title or content"),
        (status = 401, description = "Sign-in required"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn create_post(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewPost>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    require_text("board", &new.board, 50)?;
    require_text("title", &new.title, TITLE_MAX)?;
    require_text("content", &new.content, CONTENT_MAX)?;
    data.throttle(RateAction::Post, auth.user_id())?;
    let post = data.repo.create_post(auth.user_id(), new).await?;
    log::info!("post {} created on board '{}' by {}", post.id, post.board, post.author_id);
    Ok(HttpResponse::Created().json(post))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post with comments when visible", body = PostDetail),
        (status = 404, description = "Post not found or deleted")
    )
)]
pub async fn get_post(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    let vis = data.visibility(&post, requester.user_id()).await;
    let comments = if vis.show_comments() { data.repo.list_comments(post.id).await? } else { Vec::new() };
    Ok(HttpResponse::Ok().json(PostDetail {
        can_view_content: vis.can_view_content,
        comments: vis.comments(comments),
        post: vis.redact(post),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/posts/{id}",
    request_body = UpdatePost,
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post updated", body = Post),
        (status = 403, description = "Only the author may edit"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdatePost>,
) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    if post.author_id != auth.user_id() {
        return Err(ApiError::Forbidden);
    }
    let upd = payload.into_inner();
    if let Some(title) = &upd.title { require_text("title", title, TITLE_MAX)?; }
    if let Some(content) = &upd.content { require_text("content", content, CONTENT_MAX)?; }
    let post = data.repo.update_post(post.id, upd).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post soft-deleted"),
        (status = 403, description = "Neither author nor staff"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    if post.author_id != auth.user_id() && !data.is_staff(Some(auth.user_id())).await {
        return Err(ApiError::Forbidden);
    }
    data.repo.soft_delete_post(post.id).await?;
    log::info!("post {} soft-deleted by {}", post.id, auth.user_id());
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PinRequest {
    pub pinned: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/pin",
    request_body = PinRequest,
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Pin state updated", body = Post),
        (status = 403, description = "Staff only")
    )
)]
pub async fn pin_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<PinRequest>,
) -> Result<HttpResponse, ApiError> {
    if !data.is_staff(Some(auth.user_id())).await {
        return Err(ApiError::Forbidden);
    }
    let post = data.repo.set_pinned(path.into_inner(), payload.pinned).await?;
    Ok(HttpResponse::Ok().json(post))
}

// ---------------- Likes & views -----------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/like",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Current like state; anonymous callers get liked=false", body = LikeState),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post_like(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let state = engagement::like_state(&*data.repo, LikeTarget::Post(path.into_inner()), requester.user_id()).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/like",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeState),
        (status = 401, description = "Sign-in required"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn toggle_post_like(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    toggle(requester, data, LikeTarget::Post(path.into_inner())).await
}

#[utoipa::path(
    get,
    path = "/api/v1/comments/{id}/like",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Current like state", body = LikeState),
        (status = 403, description = "Comment on a restricted post")
    )
)]
pub async fn get_comment_like(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let comment_id = path.into_inner();
    data.require_thread_visible(comment_id, requester.user_id()).await?;
    let state = engagement::like_state(&*data.repo, LikeTarget::Comment(comment_id), requester.user_id()).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/like",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeState),
        (status = 401, description = "Sign-in required"),
        (status = 403, description = "Comment on a restricted post"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn toggle_comment_like(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    toggle(requester, data, LikeTarget::Comment(path.into_inner())).await
}

async fn toggle(requester: Requester, data: web::Data<AppState>, target: LikeTarget) -> Result<HttpResponse, ApiError> {
    let user_id = requester.user_id().ok_or(ApiError::Unauthenticated)?;
    if let LikeTarget::Comment(comment_id) = target {
        data.require_thread_visible(comment_id, Some(user_id)).await?;
    }
    data.throttle(RateAction::Like, user_id)?;
    let state = engagement::toggle_like(&*data.repo, target, Some(user_id)).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/view",
    params(("id" = i64, Path, description = "Post id")),
    responses((status = 200, description = "View recorded or suppressed; never fails", body = ViewOutcome))
)]
pub async fn record_view(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> HttpResponse {
    let post_id = path.into_inner();
    match data.views.record(&*data.repo, post_id, requester.user_id(), requester.ip()).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            log::warn!("view recording for post {post_id} skipped: {e}");
            let view_count = data.repo.get_post(post_id).await.map_or(0, |p| p.view_count);
            HttpResponse::Ok().json(ViewOutcome { counted: false, view_count })
        }
    }
}

// ---------------- Comments ----------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comments, oldest first", body = [Comment]),
        (status = 403, description = "Restricted post"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_comments(requester: Requester, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    if !data.visibility(&post, requester.user_id()).await.show_comments() {
        return Err(ApiError::Forbidden);
    }
    let comments = data.repo.list_comments(post.id).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/comments",
    request_body = NewComment,
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Invalid content or parent"),
        (status = 403, description = "Restricted post"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    if !data.visibility(&post, Some(auth.user_id())).await.can_view_content {
        return Err(ApiError::Forbidden);
    }
    let new = payload.into_inner();
    require_text("content", &new.content, COMMENT_MAX)?;
    if let Some(parent_id) = new.parent_id {
        let parent = match data.repo.get_comment(parent_id).await {
            Ok(c) => c,
            Err(RepoError::NotFound) => return Err(ApiError::BadRequest("parent comment not found".into())),
            Err(e) => return Err(e.into()),
        };
        if parent.post_id != post.id {
            return Err(ApiError::BadRequest("parent comment belongs to another post".into()));
        }
        if parent.parent_id.is_some() {
            return Err(ApiError::BadRequest("replies cannot be nested".into()));
        }
    }
    data.throttle(RateAction::Comment, auth.user_id())?;
    let comment = data.repo.create_comment(post.id, auth.user_id(), new).await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    patch,
    path = "/api/v1/comments/{id}",
    request_body = UpdateComment,
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 403, description = "Only the author may edit")
    )
)]
pub async fn update_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateComment>,
) -> Result<HttpResponse, ApiError> {
    let comment = data.repo.get_comment(path.into_inner()).await?;
    if comment.author_id != auth.user_id() {
        return Err(ApiError::Forbidden);
    }
    let content = payload.into_inner().content;
    require_text("content", &content, COMMENT_MAX)?;
    let comment = data.repo.update_comment(comment.id, content).await?;
    Ok(HttpResponse::Ok().json(comment))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Comment soft-deleted"),
        (status = 403, description = "Neither author nor staff")
    )
)]
pub async fn delete_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let comment = data.repo.get_comment(path.into_inner()).await?;
    if comment.author_id != auth.user_id() && !data.is_staff(Some(auth.user_id())).await {
        return Err(ApiError::Forbidden);
    }
    data.repo.soft_delete_comment(comment.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Identity & profiles -----------------------------

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub role: Option<String>,
    pub is_staff: bool,
    pub workplace_name: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user info", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let profile = match data.repo.get_profile(auth.user_id()).await {
        Ok(p) => p,
        Err(RepoError::NotFound) => Profile::new(auth.user_id()),
        Err(e) => return Err(e.into()),
    };
    Ok(HttpResponse::Ok().json(MeResponse {
        is_staff: data.staff.profile_is_staff(&profile),
        id: profile.id,
        role: profile.role,
        workplace_name: profile.workplace_name,
    }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub workplace_name: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_my_profile(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut profile = match data.repo.get_profile(auth.user_id()).await {
        Ok(p) => p,
        Err(RepoError::NotFound) => Profile::new(auth.user_id()),
        Err(e) => return Err(e.into()),
    };
    profile.workplace_name = payload.into_inner().workplace_name.filter(|w| !w.trim().is_empty());
    let profile = data.repo.upsert_profile(profile).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SetRoleRequest {
    pub role: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

fn valid_role(role: &str) -> bool {
    !role.is_empty() && role.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/profiles/{user_id}/role",
    request_body = SetRoleRequest,
    params(("user_id" = String, Path, description = "Target user id")),
    responses(
        (status = 200, description = "Role updated", body = Profile),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn set_profile_role(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<SetRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    if !data.is_staff(Some(auth.user_id())).await {
        return Err(ApiError::Forbidden);
    }
    let req = payload.into_inner();
    let role = req.role.trim().to_lowercase();
    if !valid_role(&role) || !req.roles.iter().all(|r| valid_role(r)) {
        return Err(ApiError::BadRequest(format!("invalid role '{}'", req.role)));
    }
    let user_id = path.into_inner();
    let mut profile = match data.repo.get_profile(&user_id).await {
        Ok(p) => p,
        Err(RepoError::NotFound) => Profile::new(user_id.clone()),
        Err(e) => return Err(e.into()),
    };
    profile.role = Some(role);
    profile.roles = req.roles;
    let profile = data.repo.upsert_profile(profile).await?;
    log::info!("role of {} set to {:?} by {}", profile.id, profile.role, auth.user_id());
    Ok(HttpResponse::Ok().json(profile))
}

// ---------------- OAuth -------------------------------------------

fn oauth_not_configured(stage: &str) -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(serde_json::json!({
        "error": "oauth_not_configured",
        "stage": stage,
        "message": "Set OAUTH_CLIENT_ID / OAUTH_CLIENT_SECRET to enable third-party login"
    }))
}

pub async fn oauth_login(data: web::Data<AppState>) -> HttpResponse {
    let Some(client) = &data.oauth else { return oauth_not_configured("login") };
    let state = data.oauth_states.issue();
    HttpResponse::Found()
        .insert_header(("Location", client.config().authorize_redirect(&state)))
        .finish()
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    code: String,
    state: String,
}

pub async fn oauth_callback(query: web::Query<OAuthCallback>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let Some(client) = &data.oauth else { return Ok(oauth_not_configured("callback")) };
    if !data.oauth_states.consume(&query.state) {
        return Err(ApiError::BadRequest("unknown or expired oauth state".into()));
    }
    let tokens = client.complete_login(&query.code).await.map_err(|e| {
        log::error!("oauth exchange failed: {e}");
        ApiError::Unavailable("login provider unavailable".into())
    })?;
    let user_id = tokens.user_id.clone();
    data.repo.save_tokens(tokens).await?;
    match data.repo.get_profile(&user_id).await {
        Ok(_) => {}
        Err(RepoError::NotFound) => { data.repo.upsert_profile(Profile::new(user_id.clone())).await?; }
        Err(e) => return Err(e.into()),
    }
    let jwt = data.jwt.issue(&user_id).map_err(|_| ApiError::Internal)?;
    log::info!("oauth login completed for {user_id}");
    Ok(HttpResponse::Found()
        .insert_header(("Location", format!("{}/?token={}", data.frontend_url, jwt)))
        .finish())
}

/// Tokens are stateless; signing out forgets the provider tokens held for the caller.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 204, description = "Provider tokens discarded"), (status = 401, description = "Unauthorized"))
)]
pub async fn logout(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_tokens(auth.user_id()).await?;
    Ok(HttpResponse::NoContent().finish())
}
