//! gdap - debug adapter bridge for the Gideros player
//!
//! Sits between a DAP-speaking frontend (Content-Length framed JSON on
//! stdio) and the Gideros player (newline-delimited JSON over TCP) and
//! translates between the two:
//!
//! - local commands (`initialize`, `launch`, `attach`, `disconnect`)
//!   are handled by the bridge itself
//! - debugging commands (`next`, `continue`, `stackTrace`, ...) pass
//!   through to the player verbatim, and player traffic is relayed
//!   back re-framed but otherwise untouched

pub mod constants;
pub mod debuggee;
pub mod error;
pub mod frontend;
pub mod launcher;
pub mod listener;
pub mod protocol;
pub mod session;
pub mod template;

pub use debuggee::DebuggeeChannel;
pub use error::{Error, Result};
pub use frontend::FrontendChannel;
pub use launcher::ProcessHandle;
pub use listener::Listener;
pub use protocol::*;
pub use session::{SessionController, SessionState, TerminationSignal};
