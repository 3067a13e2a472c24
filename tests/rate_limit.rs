#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use medboard::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use medboard::repo::inmem::InMemRepo;
use medboard::{config, AppConfig, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::test]
async fn like_toggles_are_rate_limited_but_views_are_not() {
    let mut state = AppState::new(Arc::new(InMemRepo::new()), &AppConfig::with_secret("test-secret-must-be-32-bytes-long!!"));
    let cfg = RateLimitConfig {
        post: (10, Duration::from_secs(300)),
        comment: (10, Duration::from_secs(60)),
        like: (2, Duration::from_secs(60)),
    };
    state.rate_limiter = Some(RateLimiterFacade::new(InMemoryRateLimiter::new(), cfg));
    let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(config)).await;
    let token = state.jwt.issue("u1").unwrap();

    let req = test::TestRequest::post().uri("/api/v1/posts")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&json!({"board":"market","title":"Selling stethoscope","content":"Barely used"}))
        .to_request();
    let post: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let id = post["id"].as_i64().unwrap();

    for expected in [200, 200, 429] {
        let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/like"))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), expected);
    }

    for _ in 0..5 {
        let req = test::TestRequest::post().uri(&format!("/api/v1/posts/{id}/view"))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
