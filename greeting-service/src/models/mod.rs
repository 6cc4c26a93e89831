pub mod account;
pub mod greeting;
pub mod reference;
pub mod role;
pub mod transactional;

pub use account::Account;
pub use greeting::Greeting;
pub use reference::ReferenceEntity;
pub use role::Role;
pub use transactional::{AuditError, Transactional, TransactionalEntity};
