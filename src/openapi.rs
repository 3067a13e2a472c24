use crate::models::{Comment, LikeState, NewComment, NewPost, Post, PostDetail, Profile, UpdateComment, UpdatePost, ViewOutcome};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_posts,
        crate::routes::create_post,
        crate::routes::get_post,
        crate::routes::update_post,
        crate::routes::delete_post,
        crate::routes::pin_post,
        crate::routes::get_post_like,
        crate::routes::toggle_post_like,
        crate::routes::record_view,
        crate::routes::list_comments,
        crate::routes::create_comment,
        crate::routes::update_comment,
        crate::routes::delete_comment,
        crate::routes::get_comment_like,
        crate::routes::toggle_comment_like,
        crate::routes::auth_me,
        crate::routes::update_my_profile,
        crate::routes::set_profile_role,
        crate::routes::logout,
    ),
    components(schemas(
        Post, NewPost, UpdatePost, PostDetail, Comment, NewComment, UpdateComment,
        Profile, LikeState, ViewOutcome,
        crate::routes::PinRequest, crate::routes::MeResponse, crate::routes::SetRoleRequest,
        crate::routes::UpdateProfileRequest
    )),
    tags(
        (name = "posts", description = "Board posts"),
        (name = "comments", description = "Comment threads"),
        (name = "engagement", description = "Likes and views"),
        (name = "auth", description = "Sign-in, profiles and roles"),
    )
)]
pub struct ApiDoc;
