use std::collections::HashMap;
use std::fmt;

use log::error;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use serde_derive::Serialize;
use serde_json::{json, Value};

use crate::db::StoreError;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub trait Validate
where
    Self: Sized,
{
    fn validate(self) -> Result<Self, ValidationError>;
}

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Article,
    Comment,
    User,
}

impl Target {
    fn name(self) -> &'static str {
        match self {
            Target::Article => "article",
            Target::Comment => "comment",
            Target::User => "user",
        }
    }
}

/// Every way a request can fail. Nothing below the routes returns anything else.
#[derive(Debug)]
pub enum ApiError {
    NoPrincipal,
    MalformedPrincipal,
    MalformedId(Target),
    TargetNotFound(Target),
    PrincipalNotFound,
    NotOwner,
    NotContained,
    SelfAction(&'static str),
    Validation(ValidationError),
    Store(StoreError),
    Enrichment(StoreError),
    Cancelled,
    Internal,
}

/// Protocol-level outcome codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Unauthenticated,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Aborted,
    Cancelled,
    Internal,
}

impl Code {
    pub fn status(self) -> Status {
        match self {
            Code::Unauthenticated => Status::Unauthorized,
            Code::InvalidArgument => Status::UnprocessableEntity,
            Code::NotFound => Status::NotFound,
            Code::PermissionDenied => Status::Forbidden,
            Code::Aborted => Status::Conflict,
            // client closed request
            Code::Cancelled => Status::new(499),
            Code::Internal => Status::InternalServerError,
        }
    }
}

impl ApiError {
    pub fn code(&self) -> Code {
        match self {
            ApiError::NoPrincipal | ApiError::MalformedPrincipal => Code::Unauthenticated,
            ApiError::MalformedId(_)
            | ApiError::TargetNotFound(_)
            | ApiError::NotContained
            | ApiError::SelfAction(_)
            | ApiError::Validation(_) => Code::InvalidArgument,
            ApiError::PrincipalNotFound => Code::NotFound,
            ApiError::NotOwner => Code::PermissionDenied,
            ApiError::Store(_) | ApiError::Enrichment(_) => Code::Aborted,
            ApiError::Cancelled => Code::Cancelled,
            ApiError::Internal => Code::Internal,
        }
    }

    /// Client-facing message. Store failures never carry the backend's text.
    pub fn message(&self) -> String {
        match self {
            ApiError::NoPrincipal => "authentication required".into(),
            ApiError::MalformedPrincipal => "invalid token".into(),
            ApiError::MalformedId(target) => format!("invalid {} id", target.name()),
            ApiError::TargetNotFound(target) => format!("{} not found", target.name()),
            ApiError::PrincipalNotFound => "user not found".into(),
            ApiError::NotOwner => "forbidden".into(),
            ApiError::NotContained => "the comment is not in the article".into(),
            ApiError::SelfAction(msg) => (*msg).into(),
            ApiError::Validation(_) => "validation failed".into(),
            ApiError::Store(_) => "store failure".into(),
            ApiError::Enrichment(_) => "failed to resolve viewer flags".into(),
            ApiError::Cancelled => "request cancelled".into(),
            ApiError::Internal => "internal error".into(),
        }
    }

    /// Failure while computing viewer flags for one item of a list.
    pub fn enrichment(err: StoreError) -> ApiError {
        match err {
            StoreError::Cancelled => ApiError::Cancelled,
            other => ApiError::Enrichment(other),
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!({ "errors": errors }),
            other => json!({ "errors": { "body": [other.message()] } }),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.code(), self.message())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> ApiError {
        match err {
            StoreError::Cancelled => ApiError::Cancelled,
            other => ApiError::Store(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        self.0.entry(key.into()).or_default().push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            self.0.entry(key).or_default().extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self, key: &str) -> &[String] {
        self.0.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn try_respond(req: &Request, json: Value, status: Status) -> response::Result<'static> {
    Json(json)
        .respond_to(req)
        .and_then(|resp| Response::build_from(resp).status(status).ok())
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match &self {
            ApiError::Store(cause) | ApiError::Enrichment(cause) => {
                error!("{} {}: {}", req.method(), req.uri(), cause);
            }
            ApiError::Internal => error!("{} {}: internal error", req.method(), req.uri()),
            _ => {}
        }
        try_respond(req, self.body(), self.code().status())
    }
}
