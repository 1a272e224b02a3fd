pub mod audit;
pub mod error;
pub mod keys;
pub mod replay_window;
pub mod router;
pub mod signing;

pub use audit::{AuditEntry, AuditWriter, NullAuditWriter};
pub use error::RouterError;
pub use keys::KeyRegistry;
pub use replay_window::ReplayWindow;
pub use router::{Handler, Router};
pub use signing::{sign_envelope, verify_envelope};
