use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Write actions subject to throttling. View recording is never throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAction {
    Post,
    Comment,
    Like,
}

/// Sliding window in-memory rate limiter (pod local).
#[derive(Clone, Default)]
pub struct InMemoryRateLimiter {
    hits: Arc<DashMap<(RateAction, String), VecDeque<Instant>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self { Self::default() }

    /// Records a hit for `client` and reports whether it fit inside the window.
    pub fn check_at(&self, action: RateAction, client: &str, limit: usize, window: Duration, now: Instant) -> bool {
        let mut hits = self.hits.entry((action, client.to_string())).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }
        if hits.len() >= limit {
            return false;
        }
        hits.push_back(now);
        true
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub post: (usize, Duration),
    pub comment: (usize, Duration),
    pub like: (usize, Duration),
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn rule(prefix: &str, limit: usize, secs: u64) -> (usize, Duration) {
            let limit = std::env::var(format!("RL_{prefix}_LIMIT")).ok().and_then(|v| v.parse().ok()).unwrap_or(limit);
            let secs = std::env::var(format!("RL_{prefix}_WINDOW")).ok().and_then(|v| v.parse().ok()).unwrap_or(secs);
            (limit, Duration::from_secs(secs))
        }
        Self {
            post: rule("POST", 5, 300),
            comment: rule("COMMENT", 20, 60),
            like: rule("LIKE", 60, 60),
        }
    }

    fn rule(&self, action: RateAction) -> (usize, Duration) {
        match action {
            RateAction::Post => self.post,
            RateAction::Comment => self.comment,
            RateAction::Like => self.like,
        }
    }
}

/// Handler-facing guard pairing the limiter with its per-action limits.
#[derive(Clone)]
pub struct RateLimiterFacade {
    limiter: InMemoryRateLimiter,
    cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }

    pub fn allow(&self, action: RateAction, client: &str) -> bool {
        let (limit, window) = self.cfg.rule(action);
        self.limiter.check_at(action, client, limit, window, Instant::now())
    }
}
