use jsonwebtoken::jwk::JwkSet;
use serde::Serialize;

/// The `{"keys": [...]}` document listing public signing keys.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct JwkSetView(JwkSet);

impl From<&JwkSet> for JwkSetView {
    fn from(set: &JwkSet) -> Self {
        JwkSetView(set.clone())
    }
}

impl JwkSetView {
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys.iter().filter_map(|k| k.common.key_id.as_deref())
    }
}
