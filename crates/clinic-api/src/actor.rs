//! Caller identity taken from request headers.
//!
//! Authentication happens in front of this router; the fronting layer sets
//! [`ACTOR_HEADER`] to the caller's national id and [`PRIVILEGE_HEADER`] to
//! `standard` or `elevated`.

use axum::{extract::FromRequestParts, http::request::Parts};
use clinic_core::person::{Actor, Privilege};

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-clinic-actor";
pub const PRIVILEGE_HEADER: &str = "x-clinic-privilege";

/// Extractor for the calling [`Actor`].
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let header = |name: &str| -> Result<Option<String>, ApiError> {
      parts
        .headers
        .get(name)
        .map(|v| {
          v.to_str()
            .map(|s| s.trim().to_owned())
            .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text")))
        })
        .transpose()
    };

    let person_id = header(ACTOR_HEADER)?
      .filter(|s| !s.is_empty())
      .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_HEADER} header")))?;

    let privilege = match header(PRIVILEGE_HEADER)?.as_deref().map(str::to_ascii_lowercase) {
      None => Privilege::Standard,
      Some(p) if p == "standard" => Privilege::Standard,
      Some(p) if p == "elevated" => Privilege::Elevated,
      Some(other) => {
        return Err(ApiError::BadRequest(format!("unknown privilege {other:?}")));
      }
    };

    Ok(Caller(Actor::new(person_id, privilege)))
  }
}
