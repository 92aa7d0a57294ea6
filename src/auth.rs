//! Who is asking.
//!
//! The transport turns the `Authorization` header into a [`Claim`] through an
//! injected [`PrincipalExtractor`]; everything past the routes only sees the
//! resulting [`Context`] and asks it for a principal or a [`Viewer`].

use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::{RegisteredClaims, SignWithKey, VerifyWithKey};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use sha2::Sha256;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::db::{StoreError, StoreResult};
use crate::types::ApiError;
use crate::users::models::User;

/// What the request said about its principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Absent,
    Present(String),
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(i32),
}

#[derive(Debug, Clone)]
pub struct Context {
    claim: Claim,
    cancel: CancellationToken,
}

impl Context {
    pub fn new(claim: Claim) -> Self {
        Context {
            claim,
            cancel: CancellationToken::new(),
        }
    }

    pub fn anonymous() -> Self {
        Context::new(Claim::Absent)
    }

    pub fn for_user(id: i32) -> Self {
        Context::new(Claim::Present(id.to_string()))
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Called before every store round-trip.
    pub fn checkpoint(&self) -> Result<(), ApiError> {
        Ok(self.store_checkpoint()?)
    }

    /// `checkpoint` for code that speaks `StoreError`.
    pub fn store_checkpoint(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The acting user id, for operations that need one.
    pub fn require_principal(&self) -> Result<i32, ApiError> {
        match &self.claim {
            Claim::Absent => Err(ApiError::NoPrincipal),
            Claim::Invalid => Err(ApiError::MalformedPrincipal),
            Claim::Present(sub) => sub.parse::<i32>().map_err(|_| ApiError::MalformedPrincipal),
        }
    }

    /// Like `require_principal`, but a missing principal is the anonymous viewer.
    pub fn viewer(&self) -> Result<Viewer, ApiError> {
        match &self.claim {
            Claim::Absent => Ok(Viewer::Anonymous),
            _ => self.require_principal().map(Viewer::User),
        }
    }
}

pub trait PrincipalExtractor: Send + Sync {
    /// The principal id carried by `credential`, if it is acceptable.
    fn extract(&self, credential: &str) -> Option<String>;
}

/// HS256 tokens: `sub` is the user id, `exp` bounds their life.
pub struct JwtKeys {
    key: Hmac<Sha256>,
    ttl_secs: i64,
}

impl JwtKeys {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(JwtKeys {
            key: Hmac::new_from_slice(secret)?,
            ttl_secs,
        })
    }

    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let expiration = now.checked_add(self.ttl_secs).ok_or(ApiError::Internal)?;
        let claims = RegisteredClaims {
            subject: Some(user.id.to_string()),
            issued_at: Some(now as u64),
            expiration: Some(expiration.max(0) as u64),
            ..Default::default()
        };
        claims.sign_with_key(&self.key).map_err(|_| ApiError::Internal)
    }
}

impl PrincipalExtractor for JwtKeys {
    fn extract(&self, credential: &str) -> Option<String> {
        let claims: RegisteredClaims = credential.verify_with_key(&self.key).ok()?;
        let now = Utc::now().timestamp() as u64;
        match claims.expiration {
            Some(exp) if exp > now => claims.subject,
            _ => None,
        }
    }
}

/// Reads `Authorization: Token <jwt>` (or `Bearer`).
pub fn claim_from_header(header: Option<&str>, extractor: &dyn PrincipalExtractor) -> Claim {
    let header = match header {
        Some(header) => header.trim(),
        None => return Claim::Absent,
    };
    let token = header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim);
    match token.and_then(|token| extractor.extract(token)) {
        Some(sub) => Claim::Present(sub),
        None => Claim::Invalid,
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Context {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let header = request.headers().get_one("Authorization");
        let claim = match request.rocket().state::<App>() {
            Some(app) => claim_from_header(header, app.extractor()),
            None => Claim::Invalid,
        };
        Outcome::Success(Context::new(claim))
    }
}
