pub mod license;
pub mod revoke;
pub mod session;

pub use license::License;
pub use revoke::Revoke;
pub use session::Session;
