pub mod auth;
pub mod request_context;

pub use auth::{basic_auth_middleware, parse_basic_authorization, require_user_role, AuthUser};
pub use request_context::{request_context_middleware, REQUEST_ID_HEADER};
