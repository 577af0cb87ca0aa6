//! Authenticated-identity extractor.
//!
//! Authentication itself lives upstream; this service receives the already
//! verified identity as opaque headers and only authorizes operations between
//! the identities it is given.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Superuser,
    PetOwner,
    PetAdopter,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Superuser)
    }

    fn parse(value: &str) -> Option<Role> {
        match value {
            "SUPERUSER" => Some(Role::Superuser),
            "PET_OWNER" => Some(Role::PetOwner),
            "PET_ADOPTER" => Some(Role::PetAdopter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("missing or invalid identity header".to_string())
            })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| AppError::Unauthorized("missing or invalid role header".to_string()))?;

        Ok(AuthUser { user_id, role })
    }
}
