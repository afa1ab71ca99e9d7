// Middleware modules
pub mod identity;
pub mod logging;

// Export identity middleware components
pub use identity::{gateway_identity_middleware, UserIdentity};

// Export logging middleware
pub use logging::logging_middleware;
