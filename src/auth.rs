use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::models::UserId;
use crate::routes::AppState;

pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Application user id.
    pub sub: String,
    pub exp: usize,
}

/// HS256 signing material shared by issuing and validation.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp().max(0) as usize;
        encode(&Header::default(), &Claims { sub: user_id.to_string(), exp }, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

fn keys(req: &HttpRequest) -> Option<&JwtKeys> {
    req.app_data::<web::Data<AppState>>().map(|s| &s.jwt)
}

/// Validated claims from the bearer token if one was sent.
fn bearer_claims(req: &HttpRequest, pl: &mut Payload) -> Option<Result<Claims, ApiError>> {
    let bearer = BearerAuth::from_request(req, pl).into_inner().ok()?;
    let Some(keys) = keys(req) else {
        log::error!("AppState missing from app data; cannot validate tokens");
        return Some(Err(ApiError::Internal));
    };
    Some(keys.verify(bearer.token()).map_err(|_| ApiError::Unauthenticated))
}

/// Extractor for handlers that require a signed-in user.
pub struct Auth(pub Claims);

impl Auth {
    pub fn user_id(&self) -> &str { &self.0.sub }
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        ready(match bearer_claims(req, pl) {
            Some(claims) => claims.map(Auth),
            None => Err(ApiError::Unauthenticated),
        })
    }
}

/// Who is asking: the signed-in user id, if any, plus the client address.
///
/// Never fails for anonymous callers; an invalid token is treated as no token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<UserId>,
    pub ip: Option<String>,
}

impl Requester {
    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }

    pub fn ip(&self) -> Option<&str> { self.ip.as_deref() }
}

/// The socket peer, or the forwarded client address when the peer is a trusted proxy.
fn client_ip(req: &HttpRequest) -> Option<String> {
    let peer = req.peer_addr()?.ip();
    let via_proxy = req
        .app_data::<web::Data<AppState>>()
        .is_some_and(|s| s.trusted_proxies.contains(&peer));
    if via_proxy {
        if let Some(raw) = req.connection_info().realip_remote_addr() {
            return Some(raw.parse::<SocketAddr>().map(|a| a.ip().to_string()).unwrap_or_else(|_| raw.to_string()));
        }
    }
    Some(peer.to_string())
}

impl FromRequest for Requester {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let user_id = match bearer_claims(req, pl) {
            Some(Ok(claims)) => Some(claims.sub),
            Some(Err(ApiError::Internal)) => return ready(Err(ApiError::Internal)),
            Some(Err(_)) => {
                log::debug!("ignoring invalid bearer token on optional-auth route");
                None
            }
            None => None,
        };
        ready(Ok(Requester { user_id, ip: client_ip(req) }))
    }
}
