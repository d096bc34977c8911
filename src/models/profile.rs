use serde::{Deserialize, Serialize};

/// Internal billing identity.
///
/// Distinct from the authentication identity: one auth user may own several
/// profiles (e.g. a founder who also mentors). Incoming user ids are resolved
/// to a profile before any subscription write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub auth_user_id: String,
    pub role: String,
    pub country: Option<String>,
    pub created_at: i64,
}

/// Data required to create a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfile {
    pub auth_user_id: String,
    pub role: String,
    pub country: Option<String>,
}
