use crate::application_port::{ClaimsMapper, MappingError};
use crate::domain_model::{Claims, SubjectClaims, User};

const USERNAME_CLAIM: &str = "username";

/// Carries the username as a custom claim so requests can be served without a
/// repository lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserClaimsMapper;

impl ClaimsMapper<User> for UserClaimsMapper {
    fn pack(&self, user: &User) -> SubjectClaims {
        SubjectClaims::new(user.id.clone()).with(USERNAME_CLAIM, user.username.as_str())
    }

    fn unpack(&self, claims: &Claims) -> Result<User, MappingError> {
        let username = claims
            .custom(USERNAME_CLAIM)
            .and_then(|v| v.as_str())
            .ok_or_else(|| MappingError(format!("missing `{}` claim", USERNAME_CLAIM)))?;
        Ok(User::new(claims.subject.clone(), username))
    }
}
