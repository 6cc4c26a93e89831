use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Transactional, TransactionalEntity};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Greeting {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub entity: TransactionalEntity,
    pub text: String,
}

impl Greeting {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            entity: TransactionalEntity::new(),
            text: text.into(),
        }
    }
}

impl PartialEq for Greeting {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl Transactional for Greeting {
    const ENTITY_NAME: &'static str = "Greeting";

    fn entity(&self) -> &TransactionalEntity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut TransactionalEntity {
        &mut self.entity
    }
}
