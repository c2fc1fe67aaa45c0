// src/session.rs

use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// How a stale session gets a new token pair. The REST client implements
/// this against `POST /auth/refresh`; tests inject counters.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

#[derive(Debug)]
struct SessionState {
    /// Bumped whenever the token pair is installed or cleared, so a request
    /// that saw a 401 can tell whether someone else already refreshed.
    generation: u64,
    tokens: Option<TokenPair>,
}

/// A snapshot a request holds while in flight.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub generation: u64,
    pub access_token: Option<String>,
}

/*
Session context, passed by dependency injection instead of living in a
global. Concurrent 401s coordinate through `gate`: the first task through
performs the one refresh, every waiter queued on the mutex then observes the
bumped generation and reuses the fresh token (or they all fail together once
the session clears).
*/
pub struct Session {
    state: StdMutex<SessionState>,
    gate: AsyncMutex<()>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(SessionState {
                generation: 0,
                tokens: None,
            }),
            gate: AsyncMutex::new(()),
        }
    }

    pub fn install(&self, tokens: TokenPair) {
        let mut state = self.state.lock().expect("session state poisoned");
        state.generation += 1;
        state.tokens = Some(tokens);
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("session state poisoned");
        state.generation += 1;
        state.tokens = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .lock()
            .expect("session state poisoned")
            .tokens
            .is_some()
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        let state = self.state.lock().expect("session state poisoned");
        TokenSnapshot {
            generation: state.generation,
            access_token: state.tokens.as_ref().map(|t| t.access_token.clone()),
        }
    }

    /// Called after a request came back 401. `seen_generation` is the
    /// generation the failed request was sent with. Returns the access token
    /// to retry with; at most one refresh runs per generation.
    pub async fn refresh_after_401(
        &self,
        seen_generation: u64,
        refresher: &dyn TokenRefresher,
    ) -> Result<String, ApiError> {
        let _guard = self.gate.lock().await;

        // Someone else refreshed (or cleared) while we waited in line.
        let refresh_token = {
            let state = self.state.lock().expect("session state poisoned");
            if state.generation != seen_generation {
                return match &state.tokens {
                    Some(t) => Ok(t.access_token.clone()),
                    None => Err(ApiError::SessionExpired),
                };
            }
            match &state.tokens {
                Some(t) => t.refresh_token.clone(),
                None => return Err(ApiError::SessionExpired),
            }
        };

        match refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                let access = pair.access_token.clone();
                self.install(pair);
                tracing::debug!("access token refreshed");
                Ok(access)
            }
            Err(err) => {
                tracing::warn!("token refresh failed: {err}");
                self.clear();
                Err(ApiError::SessionExpired)
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
