use super::{Authenticatable, SubjectId};
use serde::{Deserialize, Serialize};

/// The subject type used by the bundled credential repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: SubjectId,
    pub username: String,
}

impl User {
    pub fn new(id: impl Into<SubjectId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

impl Authenticatable for User {
    fn subject_id(&self) -> SubjectId {
        self.id.clone()
    }
}
