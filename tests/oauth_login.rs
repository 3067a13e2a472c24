#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use medboard::oauth::OAuthConfig;
use medboard::repo::inmem::InMemRepo;
use medboard::repo::{OAuthTokenRepo, ProfileRepo};
use medboard::{config, AppConfig, AppState};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

fn oauth_config(base: &str) -> OAuthConfig {
    OAuthConfig {
        provider: "kakao".into(),
        client_id: "client-123".into(),
        client_secret: "shh".into(),
        authorize_url: format!("{base}/oauth/authorize"),
        token_url: format!("{base}/oauth/token"),
        userinfo_url: format!("{base}/v2/user/me"),
        redirect_uri: "http://localhost:8080/api/v1/auth/oauth/callback".into(),
        scope: None,
    }
}

fn state_for(repo: InMemRepo, oauth: Option<OAuthConfig>) -> AppState {
    let mut cfg = AppConfig::with_secret(SECRET);
    cfg.frontend_url = "http://front.test".into();
    cfg.oauth = oauth;
    AppState::new(Arc::new(repo), &cfg)
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}

#[actix_web::test]
async fn code_exchange_persists_tokens_and_issues_jwt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc-1", "refresh_token": "ref-1", "expires_in": 3600, "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user/me"))
        .and(header("authorization", "Bearer acc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 987654 })))
        .mount(&server)
        .await;

    let repo = InMemRepo::new();
    let state = state_for(repo.clone(), Some(oauth_config(&server.uri())));
    let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(config)).await;

    let req = test::TestRequest::get().uri("/api/v1/auth/oauth/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("{}/oauth/authorize?client_id=client-123", server.uri())));
    let st = query_param(&location, "state").expect("state param");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/auth/oauth/callback?code=abc&state={st}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert!(location.starts_with("http://front.test/?token="));
    let token = query_param(&location, "token").unwrap();
    assert_eq!(state.jwt.verify(&token).unwrap().sub, "kakao:987654");

    let saved = repo.get_tokens("kakao:987654", "kakao").await.unwrap();
    assert_eq!(saved.access_token, "acc-1");
    assert_eq!(saved.refresh_token.as_deref(), Some("ref-1"));
    assert!(saved.expires_at.is_some());
    assert!(repo.get_profile("kakao:987654").await.is_ok());

    // state is single use
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/auth/oauth/callback?code=abc&state={st}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // logout forgets provider tokens
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/logout")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    assert!(repo.get_tokens("kakao:987654", "kakao").await.is_err());
}

#[actix_web::test]
async fn provider_failure_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let state = state_for(InMemRepo::new(), Some(oauth_config(&server.uri())));
    let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(config)).await;
    let st = state.oauth_states.issue();
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/auth/oauth/callback?code=bad&state={st}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 503);
}

#[actix_web::test]
async fn unconfigured_oauth_answers_503() {
    let state = state_for(InMemRepo::new(), None);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/v1/auth/oauth/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
    let v: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(v["error"], "oauth_not_configured");
}
