#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use medboard::models::Profile;
use medboard::repo::inmem::InMemRepo;
use medboard::repo::ProfileRepo;
use medboard::{config, AppConfig, AppState};
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

async fn state_with(repo: InMemRepo) -> AppState {
    let mut manager = Profile::new("staff1");
    manager.role = Some("manager".into());
    repo.upsert_profile(manager).await.unwrap();
    let mut doctor = Profile::new("u2");
    doctor.role = Some("doctor".into());
    repo.upsert_profile(doctor).await.unwrap();
    AppState::new(Arc::new(repo), &AppConfig::with_secret(SECRET))
}

fn bearer(state: &AppState, user: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", state.jwt.issue(user).unwrap()))
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data(web::Data::new($state.clone())).configure(config)).await
    };
}

macro_rules! create_post {
    ($app:expr, $state:expr, $user:expr, $body:expr) => {{
        let req = test::TestRequest::post().uri("/api/v1/posts").insert_header(bearer(&$state, $user)).set_json(&$body).to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), 201);
        let v: Value = test::read_body_json(resp).await;
        v
    }};
}

#[actix_web::test]
async fn post_like_and_view_flow() {
    let state = state_with(InMemRepo::new()).await;
    let app = app!(state);

    let post = create_post!(app, state, "u1", json!({"board":"doctor","sub_board":"free","title":"Hello","content":"First post"}));
    let id = post["id"].as_i64().unwrap();

    // anonymous like -> 401
    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/like")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // like, then unlike
    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/like")).insert_header(bearer(&state, "u2")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v, json!({"liked": true, "likeCount": 1}));

    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{id}/like")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v, json!({"liked": false, "likeCount": 1}));

    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/like")).insert_header(bearer(&state, "u2")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v, json!({"liked": false, "likeCount": 0}));

    // missing post -> 404
    let req = test::TestRequest::post().uri("/api/v1/posts/4242/like").insert_header(bearer(&state, "u2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // anonymous views from the same peer count once, whatever forwarding header they claim
    for (forwarded, expected) in [("1.1.1.1", true), ("2.2.2.2", false), ("3.3.3.3", false)] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/posts/{id}/view"))
            .peer_addr("198.51.100.9:40000".parse().unwrap())
            .insert_header(("x-forwarded-for", forwarded))
            .to_request();
        let v: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(v["counted"], expected);
        assert_eq!(v["viewCount"], 1);
    }

    // view of a missing post never fails the request
    let req = test::TestRequest::post().uri("/api/v1/posts/4242/view").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: Value = test::read_body_json(resp).await;
    assert_eq!(v, json!({"counted": false, "viewCount": 0}));
}

#[actix_web::test]
async fn restricted_qa_post_visibility() {
    let state = state_with(InMemRepo::new()).await;
    let app = app!(state);

    let post = create_post!(app, state, "u1", json!({"board":"doctor","sub_board":"qa","title":"Private question","content":"secret details","is_question":true}));
    let id = post["id"].as_i64().unwrap();

    // author comments on own inquiry
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{id}/comments"))
        .insert_header(bearer(&state, "u1"))
        .set_json(&json!({"content":"more context"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let own_comment: Value = test::read_body_json(resp).await;
    let comment_like = format!("/api/v1/comments/{}/like", own_comment["id"]);

    // staff sees everything
    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "staff1")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v["can_view_content"], true);
    assert_eq!(v["post"]["content"], "secret details");
    assert_eq!(v["comments"].as_array().unwrap().len(), 1);

    // regular member only sees the title
    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "u2")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v["can_view_content"], false);
    assert_eq!(v["post"]["title"], "Private question");
    assert!(v["post"]["content"].is_null());
    assert!(v["comments"].is_null());

    // anonymous listing withholds content too
    let req = test::TestRequest::get().uri("/api/v1/posts?board=doctor").to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert!(v[0]["content"].is_null());

    // comment thread and commenting are closed to other members
    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{id}/comments")).insert_header(bearer(&state, "u2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{id}/comments"))
        .insert_header(bearer(&state, "u2"))
        .set_json(&json!({"content":"me too"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    // outsiders cannot like or read likes on comments of the hidden thread
    let req = test::TestRequest::post().uri(&comment_like).insert_header(bearer(&state, "u2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::get().uri(&comment_like).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::post().uri(&comment_like).insert_header(bearer(&state, "staff1")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v, json!({"liked": true, "likeCount": 1}));
}

#[actix_web::test]
async fn comment_nesting_is_single_level() {
    let state = state_with(InMemRepo::new()).await;
    let app = app!(state);
    let post = create_post!(app, state, "u1", json!({"board":"nurse","title":"Rota","content":"Who swaps?"}));
    let id = post["id"].as_i64().unwrap();

    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/comments")).insert_header(bearer(&state, "u2"))
        .set_json(&json!({"content":"I can"})).to_request();
    let top: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/comments")).insert_header(bearer(&state, "u1"))
        .set_json(&json!({"content":"thanks","parent_id": top["id"]})).to_request();
    let reply: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(reply["parent_id"], top["id"]);

    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/comments")).insert_header(bearer(&state, "u2"))
        .set_json(&json!({"content":"np","parent_id": reply["id"]})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/comments")).insert_header(bearer(&state, "u2"))
        .set_json(&json!({"content":"   "})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // comment like
    let req = test::TestRequest::post().uri(&format!("/api/v1/comments/{}/like", top["id"])).insert_header(bearer(&state, "u1")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v, json!({"liked": true, "likeCount": 1}));

    // deleting a comment hides it from the thread
    let req = test::TestRequest::delete().uri(&format!("/api/v1/comments/{}", reply["id"])).insert_header(bearer(&state, "u2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::delete().uri(&format!("/api/v1/comments/{}", reply["id"])).insert_header(bearer(&state, "u1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{id}/comments")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn edit_pin_and_soft_delete_permissions() {
    let state = state_with(InMemRepo::new()).await;
    let app = app!(state);
    let post = create_post!(app, state, "u1", json!({"board":"notice","title":"Holiday hours","content":"Closed Monday"}));
    let id = post["id"].as_i64().unwrap();

    let req = test::TestRequest::patch().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "u2"))
        .set_json(&json!({"title":"hijack"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::patch().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "u1"))
        .set_json(&json!({"title":"Holiday hours (updated)"})).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v["title"], "Holiday hours (updated)");

    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/pin")).insert_header(bearer(&state, "u1"))
        .set_json(&json!({"pinned":true})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/pin")).insert_header(bearer(&state, "staff1"))
        .set_json(&json!({"pinned":true})).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v["is_pinned"], true);

    let req = test::TestRequest::delete().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "u2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::delete().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "staff1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    // gone from detail and listing
    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = test::TestRequest::get().uri("/api/v1/posts?board=notice").to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert!(v.as_array().unwrap().is_empty());
    let req = test::TestRequest::delete().uri(&format!("/api/v1/posts/{id}")).insert_header(bearer(&state, "staff1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn create_post_validation_and_auth() {
    let state = state_with(InMemRepo::new()).await;
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/v1/posts").set_json(&json!({"board":"jobs","title":"t","content":"c"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post().uri("/api/v1/posts").insert_header(("Authorization", "Bearer forged"))
        .set_json(&json!({"board":"jobs","title":"t","content":"c"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post().uri("/api/v1/posts").insert_header(bearer(&state, "u1"))
        .set_json(&json!({"board":"jobs","title":"","content":"c"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // invalid token on a read route is treated as anonymous
    let req = test::TestRequest::get().uri("/api/v1/posts").insert_header(("Authorization", "Bearer forged")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn me_and_role_assignment() {
    let state = state_with(InMemRepo::new()).await;
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/v1/auth/me").insert_header(bearer(&state, "newbie")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v, json!({"id":"newbie","role":null,"is_staff":false,"workplace_name":null}));

    let req = test::TestRequest::put().uri("/api/v1/profiles/me").insert_header(bearer(&state, "newbie"))
        .set_json(&json!({"workplace_name":"Sunrise Clinic"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // only staff may assign roles
    let req = test::TestRequest::post().uri("/api/v1/admin/profiles/newbie/role").insert_header(bearer(&state, "u2"))
        .set_json(&json!({"role":"manager"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::post().uri("/api/v1/admin/profiles/newbie/role").insert_header(bearer(&state, "staff1"))
        .set_json(&json!({"role":"Bad Role!"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
    let req = test::TestRequest::post().uri("/api/v1/admin/profiles/newbie/role").insert_header(bearer(&state, "staff1"))
        .set_json(&json!({"role":"admin_staff"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/api/v1/auth/me").insert_header(bearer(&state, "newbie")).to_request();
    let v: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(v["is_staff"], true);
    assert_eq!(v["workplace_name"], "Sunrise Clinic");
}
