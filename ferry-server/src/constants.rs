//! Server constants: operator messages, protocol reply text, and timing

use std::time::Duration;

// =============================================================================
// Timing
// =============================================================================

/// Bound on every blocking read in the command loop.
///
/// A read that times out merely re-checks the shutdown flag and retries, so
/// shutdown latency is at most one interval. This is not an idle disconnect.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-session cap on waiting for a spawned task during shutdown.
///
/// A peer wedged mid-transfer cannot hold `Server::run` open forever.
pub const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Limits
// =============================================================================

/// Failed LOGIN attempts allowed before the connection is closed.
pub const MAX_LOGIN_ATTEMPTS: u8 = 3;

/// Maximum length for usernames in characters.
pub const MAX_USERNAME_LENGTH: usize = 32;

// =============================================================================
// Paths
// =============================================================================

/// Directory name under the platform data dir.
pub const DATA_DIR_NAME: &str = "ferryd";

/// Storage root directory name.
pub const STORAGE_DIR_NAME: &str = "storage";

/// User store file name.
pub const USERS_FILE_NAME: &str = "users.json";

// =============================================================================
// Operator messages (stdout)
// =============================================================================

pub const MSG_BANNER: &str = "Ferry Server v";
pub const MSG_STORAGE: &str = "Storage root: ";
pub const MSG_USERS: &str = "User store: ";
pub const MSG_LISTENING: &str = "Listening on ";
pub const MSG_SHUTDOWN_RECEIVED: &str = "Shutdown signal received, closing sessions...";
pub const MSG_SHUTDOWN_COMPLETE: &str = "Server stopped";

// =============================================================================
// Operator errors (stderr)
// =============================================================================

pub const ERR_GENERIC: &str = "Error: ";
pub const ERR_NO_DATA_DIR: &str = "Could not determine platform data directory";
pub const ERR_STORAGE_INIT: &str = "Failed to initialize storage root: ";
pub const ERR_USERS_INIT: &str = "Failed to load user store: ";
pub const ERR_BIND_FAILED: &str = "Failed to bind to ";
pub const ERR_ACCEPT: &str = "Failed to accept connection: ";
pub const ERR_SESSION: &str = "Session error from ";
pub const WARN_SESSION_JOIN_TIMEOUT: &str = "Session did not exit within the join timeout";

// =============================================================================
// Protocol reply text (sent to the peer after ERROR| or SUCCESS|)
// =============================================================================

pub const MSG_LOGIN_OK: &str = "Login successful";
pub const MSG_SIGNUP_OK: &str = "Account created, please log in";

pub const ERR_UNKNOWN_COMMAND: &str = "Unknown command";
pub const ERR_NOT_AUTHENTICATED: &str = "Not authenticated";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const ERR_TOO_MANY_ATTEMPTS: &str = "Too many failed login attempts";
pub const ERR_LOGIN_FORMAT: &str = "Invalid login format, expected LOGIN|username|password";
pub const ERR_SIGNUP_FORMAT: &str = "Invalid signup format, expected SIGNUP|username|password";
pub const ERR_USERNAME_TAKEN: &str = "Username already taken";
pub const ERR_USERNAME_INVALID: &str = "Invalid username";

pub const ERR_MISSING_FILENAME: &str = "Missing filename";
pub const ERR_INVALID_FILENAME: &str = "Invalid filename";
pub const ERR_INVALID_SIZE: &str = "Invalid file size";
pub const ERR_INVALID_CHECKSUM: &str = "Invalid checksum line";
pub const ERR_CHECKSUM_MISMATCH: &str = "Checksum mismatch, upload discarded";
pub const ERR_UPLOAD_INCOMPLETE: &str = "Upload incomplete, partial file discarded";
pub const ERR_UNEXPECTED_REPLY: &str = "Unexpected reply, transfer aborted";
pub const ERR_NO_FILES: &str = "No files found";
pub const ERR_STORAGE_UNAVAILABLE: &str = "Storage unavailable";
