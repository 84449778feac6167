pub mod loader;
pub mod service;
pub mod user;

pub use loader::{AuthConfigError, StaticAuthService};
pub use service::{AllowAllAuthService, AuthError, AuthService};
pub use user::{AuthUser, PrivilegeType};
