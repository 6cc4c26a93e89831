use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Account;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGreetingRequest {
    #[validate(length(min = 1, max = 100, message = "Text must be 1 to 100 characters"))]
    pub text: String,
}

/// `version` is the version the client last read; a stale value is rejected with 409.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGreetingRequest {
    #[validate(length(min = 1, max = 100, message = "Text must be 1 to 100 characters"))]
    pub text: String,
    pub version: i32,
}

/// Account view without the credential hash.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Option<i64>,
    pub reference_id: String,
    pub username: String,
    pub enabled: bool,
    pub roles: Vec<String>,
    pub version: i32,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.entity.id,
            reference_id: account.entity.reference_id,
            username: account.username,
            enabled: account.enabled,
            roles: account
                .roles
                .into_iter()
                .map(|role| role.reference.code)
                .collect(),
            version: account.entity.version,
            created_by: account.entity.created_by,
            created_at: account.entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_text_bounds() {
        let valid = CreateGreetingRequest {
            text: "x".repeat(100),
        };
        assert!(valid.validate().is_ok());

        let empty = CreateGreetingRequest {
            text: String::new(),
        };
        assert!(empty.validate().is_err());

        let long = UpdateGreetingRequest {
            text: "x".repeat(101),
            version: 0,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn account_response_omits_password() {
        let account = Account::new("alice", "$argon2id$secret-hash");
        let json = serde_json::to_value(AccountResponse::from(account)).unwrap();

        assert_eq!(json["username"], "alice");
        assert!(json.get("password").is_none());
        assert!(!json.to_string().contains("secret-hash"));
    }
}
