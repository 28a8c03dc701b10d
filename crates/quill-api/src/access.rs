use quill_types::models::UserRef;
use tracing::warn;

use crate::error::BlogError;

/// What an identity is allowed to do.
pub trait Capabilities {
    fn can_manage_posts(&self) -> bool;
}

impl Capabilities for UserRef {
    fn can_manage_posts(&self) -> bool {
        self.is_admin
    }
}

/// Gate for post mutations: passes only an identity holding the admin
/// capability, and fails with `Forbidden` before anything is touched.
pub fn ensure_admin<U: Capabilities>(identity: Option<&U>) -> Result<&U, BlogError> {
    match identity {
        Some(user) if user.can_manage_posts() => Ok(user),
        Some(_) => {
            warn!("Post management rejected for non-admin user");
            Err(BlogError::Forbidden)
        }
        None => {
            warn!("Post management rejected for anonymous visitor");
            Err(BlogError::Forbidden)
        }
    }
}
