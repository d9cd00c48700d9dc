//! Session lifecycle and user identity for the gateway.
//! Keep the public surface thin and split implementation across sub-modules.

mod profile;
mod session;

pub use profile::UserProfile;
pub use session::{
    MemorySessionStore, Session, SessionManager, SessionRecord, SessionStore, SessionToken,
};
