pub mod identity;
pub mod profile;
pub mod session;

pub use identity::{Credentials, IdentityProvider, Registration};
pub use profile::{ProfilePatch, SessionUser};
