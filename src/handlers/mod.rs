pub mod admin;
pub mod appointments;
pub mod calendar;
pub mod doctors;
pub mod health;
pub mod slots;

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Actor, AppointmentStatus, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Checks the gateway bearer token and reads the actor the identity layer
/// attached to the request.
pub fn authenticate(headers: &HeaderMap, expected_token: &str) -> Result<Actor, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let id = header(ACTOR_ID_HEADER).ok_or(AppError::Unauthorized)?;
    let role = header(ACTOR_ROLE_HEADER)
        .and_then(Role::parse)
        .ok_or(AppError::Unauthorized)?;

    Ok(Actor::new(id, role))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    pub fn parse(&self) -> Result<Option<AppointmentStatus>, AppError> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(raw) => AppointmentStatus::parse(raw)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status filter: {raw}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_authenticate_reads_actor() {
        let h = headers(&[
            ("authorization", "Bearer secret"),
            (ACTOR_ID_HEADER, "pat-1"),
            (ACTOR_ROLE_HEADER, "Patient"),
        ]);
        let actor = authenticate(&h, "secret").unwrap();
        assert_eq!(actor, Actor::patient("pat-1"));
    }

    #[test]
    fn test_authenticate_rejects_bad_token_or_actor() {
        let wrong = headers(&[
            ("authorization", "Bearer nope"),
            (ACTOR_ID_HEADER, "pat-1"),
            (ACTOR_ROLE_HEADER, "patient"),
        ]);
        assert!(matches!(authenticate(&wrong, "secret"), Err(AppError::Unauthorized)));

        let bad_role = headers(&[
            ("authorization", "Bearer secret"),
            (ACTOR_ID_HEADER, "pat-1"),
            (ACTOR_ROLE_HEADER, "nurse"),
        ]);
        assert!(matches!(authenticate(&bad_role, "secret"), Err(AppError::Unauthorized)));

        let no_id = headers(&[("authorization", "Bearer secret"), (ACTOR_ROLE_HEADER, "admin")]);
        assert!(matches!(authenticate(&no_id, "secret"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_status_query_parse() {
        let q = StatusQuery { status: Some("CONFIRMED".to_string()) };
        assert_eq!(q.parse().unwrap(), Some(AppointmentStatus::Confirmed));
        let q = StatusQuery { status: None };
        assert_eq!(q.parse().unwrap(), None);
        let q = StatusQuery { status: Some("bogus".to_string()) };
        assert!(q.parse().is_err());
    }
}
