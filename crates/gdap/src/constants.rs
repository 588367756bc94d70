//! Frontend protocol constants
//!
//! Centralizes the command names, event names and error codes used
//! throughout the bridge so dispatch and tests share one source of truth.

/// Frontend request command names handled locally
pub mod requests {
    /// Initialize the debug session, reply with capabilities
    pub const INITIALIZE: &str = "initialize";
    /// Start a local player process, then accept its connection
    pub const LAUNCH: &str = "launch";
    /// Accept a connection from an already-running player
    pub const ATTACH: &str = "attach";
    /// Tear the session down
    pub const DISCONNECT: &str = "disconnect";
}

/// Commands forwarded verbatim to the debuggee.
///
/// Lowercased for case-insensitive dispatch; the raw request text is
/// forwarded untouched, so casing on the wire is preserved.
pub const PASS_THROUGH: [&str; 10] = [
    "next",
    "continue",
    "stepin",
    "stepout",
    "stacktrace",
    "scopes",
    "variables",
    "threads",
    "setbreakpoints",
    "configurationdone",
];

/// Commands the bridge deliberately rejects (error 1020)
pub const UNSUPPORTED: [&str; 3] = ["pause", "evaluate", "source"];

/// Event names emitted to the frontend
pub mod events {
    /// Handshake with the player completed, configuration may begin
    pub const INITIALIZED: &str = "initialized";
    /// Session ended (disconnect, player hangup or process exit)
    pub const TERMINATED: &str = "terminated";
    /// Informational or error text for the frontend console
    pub const OUTPUT: &str = "output";
}

/// Output event categories
pub mod output_categories {
    pub const CONSOLE: &str = "console";
    pub const STDERR: &str = "stderr";
}

/// Error codes carried in error responses.
///
/// 1xxx codes are protocol-level, 3xxx codes are launch/validation
/// failures. Templates use `{name}` placeholders resolved from the
/// bound variables; see [`crate::template`].
pub mod error_codes {
    /// Command name not in the known set
    pub const UNRECOGNIZED_REQUEST: i64 = 1014;
    /// Command known but deliberately not supported by the bridge
    pub const NOT_SUPPORTED: i64 = 1020;
    /// Internal failure while processing a request; fatal
    pub const INTERNAL_ERROR: i64 = 1104;
    /// `workingDirectory` argument is empty
    pub const EMPTY_WORKING_DIRECTORY: i64 = 3003;
    /// `workingDirectory` does not exist
    pub const MISSING_WORKING_DIRECTORY: i64 = 3004;
    /// `executable` argument is empty
    pub const EMPTY_EXECUTABLE: i64 = 3005;
    /// `executable` does not exist
    pub const MISSING_EXECUTABLE: i64 = 3006;
    /// OS refused to start the process
    pub const PROCESS_START_FAILED: i64 = 3012;
}

/// Command name of the handshake message sent to the player right
/// after its connection is accepted
pub const WELCOME_COMMAND: &str = "welcome";

/// Poll interval for the process exit watcher
pub const EXIT_POLL_INTERVAL_MS: u64 = 200;
