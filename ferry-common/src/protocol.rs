//! Wire protocol commands and reply tokens
//!
//! The control channel is line-oriented text. Requests take two shapes:
//! space-delimited (`VERSION 1.0`, `UPLOAD report.txt`) and pipe-delimited
//! (`LOGIN|alice|secret`). Replies are a bare token or `TOKEN|<detail>`.
//! Raw file bytes travel between control lines and never pass through the
//! parser.

// =============================================================================
// Reply tokens
// =============================================================================

/// Version handshake accepted.
pub const VERSION_OK: &str = "VERSION_OK";

/// Version handshake rejected; the server closes after sending this.
pub const VERSION_ERROR: &str = "VERSION_ERROR";

/// Generic success, optionally followed by `|<detail>`.
pub const SUCCESS: &str = "SUCCESS";

/// Generic failure, followed by `|<detail>`.
pub const ERROR: &str = "ERROR";

/// Upload may proceed under the requested name.
pub const FILENAME_OK: &str = "FILENAME_OK";

/// Upload renamed to avoid a collision; followed by `|<stored name>`.
pub const NEW_FILENAME: &str = "NEW_FILENAME";

/// Receiver is ready for the next step of a transfer.
pub const READY: &str = "READY";

/// Checksum line accepted.
pub const CHECKSUM_OK: &str = "CHECKSUM_OK";

/// Requested download target does not exist.
pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";

/// Unsolicited notice that the server is closing every session.
pub const SERVER_SHUTDOWN: &str = "SERVER_SHUTDOWN";

/// Prefix of the checksum exchange line (`CHECKSUM:<64 hex digits>`).
pub const CHECKSUM_PREFIX: &str = "CHECKSUM:";

/// Field separator for multi-field requests and replies.
pub const SEPARATOR: char = '|';

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LENGTH: usize = 64;

// =============================================================================
// Requests
// =============================================================================

/// A parsed request line.
///
/// Parsing never fails: unrecognized verbs come back as
/// [`Command::Unknown`], and recognized verbs with arguments that do not
/// fit their shape come back as [`Command::Malformed`] so the session can
/// answer precisely instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `VERSION <v>`. The argument is empty when the client sent none.
    Version(String),
    /// `LOGIN|<user>|<pass>`, both fields non-empty.
    Login { username: String, password: String },
    /// `SIGNUP|<user>|<pass>`, both fields non-empty.
    Signup { username: String, password: String },
    /// `UPLOAD <filename>`.
    Upload(String),
    /// `DOWNLOAD <filename>`.
    Download(String),
    /// `LIST`.
    List,
    /// A known verb whose arguments do not fit its shape.
    Malformed(Verb),
    /// An unrecognized verb.
    Unknown,
}

/// Request verbs, used to report which command was malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Version,
    Login,
    Signup,
    Upload,
    Download,
    List,
}

impl Command {
    /// Parse one request line.
    pub fn parse(line: &str) -> Self {
        let verb_end = line.find([' ', SEPARATOR]).unwrap_or(line.len());
        let (verb, rest) = line.split_at(verb_end);

        match verb {
            "VERSION" => Command::Version(rest.trim_start().to_string()),
            "LOGIN" => match credentials(rest) {
                Some((username, password)) => Command::Login { username, password },
                None => Command::Malformed(Verb::Login),
            },
            "SIGNUP" => match credentials(rest) {
                Some((username, password)) => Command::Signup { username, password },
                None => Command::Malformed(Verb::Signup),
            },
            "UPLOAD" => match filename(rest) {
                Some(name) => Command::Upload(name),
                None => Command::Malformed(Verb::Upload),
            },
            "DOWNLOAD" => match filename(rest) {
                Some(name) => Command::Download(name),
                None => Command::Malformed(Verb::Download),
            },
            "LIST" if rest.is_empty() => Command::List,
            "LIST" => Command::Malformed(Verb::List),
            _ => Command::Unknown,
        }
    }
}

/// Split `|<user>|<pass>` into its two fields.
fn credentials(rest: &str) -> Option<(String, String)> {
    let rest = rest.strip_prefix(SEPARATOR)?;
    let fields: Vec<&str> = rest.split(SEPARATOR).collect();
    let [username, password] = fields[..] else {
        return None;
    };
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

/// Extract the argument of a space-delimited request.
fn filename(rest: &str) -> Option<String> {
    let name = rest.strip_prefix(' ')?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

// =============================================================================
// Replies
// =============================================================================

/// Format a `SUCCESS|<detail>` reply.
pub fn success_reply(detail: &str) -> String {
    format!("{SUCCESS}{SEPARATOR}{detail}")
}

/// Format an `ERROR|<detail>` reply.
pub fn error_reply(detail: &str) -> String {
    format!("{ERROR}{SEPARATOR}{detail}")
}

/// Format the checksum exchange line.
pub fn checksum_line(hex_digest: &str) -> String {
    format!("{CHECKSUM_PREFIX}{hex_digest}")
}

/// Extract the digest from a `CHECKSUM:<hex>` line.
///
/// Returns `None` unless the prefix is present and the digest is exactly
/// 64 hex digits. Case is preserved; compare case-insensitively.
pub fn parse_checksum(line: &str) -> Option<&str> {
    let digest = line.strip_prefix(CHECKSUM_PREFIX)?.trim();
    if digest.len() != DIGEST_HEX_LENGTH || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(digest)
}

/// Split a reply line into its leading token and optional detail.
pub fn split_reply(line: &str) -> (&str, Option<&str>) {
    match line.split_once(SEPARATOR) {
        Some((token, detail)) => (token, Some(detail)),
        None => (line, None),
    }
}
