pub mod logging;

pub use logging::{TracingGuard, init_tracing};
