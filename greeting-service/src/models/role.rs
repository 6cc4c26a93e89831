use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ReferenceEntity;

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_SYSOPS: &str = "ROLE_SYSOPS";

/// A privilege level. The role `code` is the authority granted to accounts holding it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub reference: ReferenceEntity,
}

impl Role {
    pub fn authority(&self) -> &str {
        &self.reference.code
    }
}
