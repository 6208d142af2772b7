//! Per-connection session state machine
//!
//! Each accepted connection runs one session task driving the progression
//! VERSION_WAIT → AUTH_WAIT → ACTIVE → CLOSED. Every read in the command
//! loop is bounded by [`POLL_INTERVAL`] and raced against the shutdown
//! flag, so a session notices shutdown within one interval even while a
//! peer sits idle. Reads inside a transfer exchange are plain; a wedged
//! peer there is covered by the supervisor's bounded join.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::timeout;

use ferry_common::PROTOCOL_VERSION;
use ferry_common::framing::{LineReader, LineWriter};
use ferry_common::protocol::{
    Command, SERVER_SHUTDOWN, VERSION_ERROR, VERSION_OK, Verb, error_reply, success_reply,
};

use crate::constants::{
    ERR_LOGIN_FORMAT, ERR_MISSING_FILENAME, ERR_NOT_AUTHENTICATED, ERR_SIGNUP_FORMAT,
    ERR_TOO_MANY_ATTEMPTS, ERR_UNKNOWN_COMMAND, ERR_USERNAME_INVALID, ERR_USERNAME_TAKEN,
    MAX_LOGIN_ATTEMPTS, MSG_LOGIN_OK, MSG_SIGNUP_OK, POLL_INTERVAL,
};
use crate::registry::SessionRegistry;
use crate::transfers::{self, TransferContext};
use crate::users::{UserStore, validate_username};

/// Everything a session task needs besides its stream.
#[derive(Clone)]
pub struct SessionContext {
    pub users: UserStore,
    pub registry: SessionRegistry,
    pub shutdown: watch::Receiver<bool>,
    pub debug: bool,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    VersionWait,
    AuthWait,
    Active,
}

/// What a bounded command-loop read produced.
enum LineEvent {
    Line(String),
    Eof,
    Shutdown,
}

/// Run one session to completion.
///
/// Returns `Ok(())` on any orderly close (clean EOF, failed handshake,
/// exhausted login attempts, shutdown); `Err` only when the stream or the
/// disk failed underneath the session. The registry entry, if one was
/// made, is removed on every exit path.
pub async fn run_session<S>(
    stream: S,
    peer_addr: SocketAddr,
    conn_id: u64,
    ctx: SessionContext,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut session = Session {
        reader: LineReader::new(read_half),
        writer: LineWriter::new(write_half),
        peer_addr,
        conn_id,
        ctx,
        state: State::VersionWait,
        username: None,
        attempts_left: MAX_LOGIN_ATTEMPTS,
    };

    let result = session.run().await;
    session.ctx.registry.unregister(conn_id);

    if session.ctx.debug {
        match &result {
            Ok(()) => eprintln!("Session {conn_id} ({peer_addr}) closed"),
            Err(e) => eprintln!("Session {conn_id} ({peer_addr}) failed: {e}"),
        }
    }

    result
}

struct Session<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
    peer_addr: SocketAddr,
    conn_id: u64,
    ctx: SessionContext,
    state: State,
    username: Option<String>,
    attempts_left: u8,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn run(&mut self) -> io::Result<()> {
        loop {
            let line = match self.next_line().await? {
                LineEvent::Line(line) => line,
                LineEvent::Eof => return Ok(()),
                LineEvent::Shutdown => {
                    // A peer that never completed the handshake gets a
                    // plain close instead of a protocol notice
                    if self.state != State::VersionWait {
                        let _ = self.writer.write_line(SERVER_SHUTDOWN).await;
                    }
                    return Ok(());
                }
            };

            let proceed = match self.state {
                State::VersionWait => self.handle_version_wait(&line).await?,
                State::AuthWait => self.handle_auth_wait(&line).await?,
                State::Active => self.handle_active(&line).await?,
            };
            if !proceed {
                return Ok(());
            }
        }
    }

    /// Read the next command line, bounded by the poll interval and raced
    /// against the shutdown flag.
    ///
    /// A timed-out read merely re-checks the flag and tries again; it is
    /// not an idle disconnect.
    async fn next_line(&mut self) -> io::Result<LineEvent> {
        loop {
            tokio::select! {
                changed = self.ctx.shutdown.changed() => {
                    // A dropped sender counts as shutdown too
                    if changed.is_err() || *self.ctx.shutdown.borrow() {
                        return Ok(LineEvent::Shutdown);
                    }
                }
                result = timeout(POLL_INTERVAL, self.reader.read_line()) => {
                    match result {
                        Ok(Ok(Some(line))) => return Ok(LineEvent::Line(line)),
                        Ok(Ok(None)) => return Ok(LineEvent::Eof),
                        Ok(Err(e)) => return Err(e),
                        Err(_) => {
                            if *self.ctx.shutdown.borrow() {
                                return Ok(LineEvent::Shutdown);
                            }
                        }
                    }
                }
            }
        }
    }

    /// VERSION_WAIT: one shot at the handshake, no retry.
    async fn handle_version_wait(&mut self, line: &str) -> io::Result<bool> {
        match Command::parse(line) {
            Command::Version(v) if v == PROTOCOL_VERSION => {
                self.writer.write_line(VERSION_OK).await?;
                self.state = State::AuthWait;
                Ok(true)
            }
            _ => {
                self.writer.write_line(VERSION_ERROR).await?;
                Ok(false)
            }
        }
    }

    /// AUTH_WAIT: LOGIN advances, SIGNUP stays here, transfers are premature.
    async fn handle_auth_wait(&mut self, line: &str) -> io::Result<bool> {
        match Command::parse(line) {
            Command::Login { username, password } => self.login(&username, &password).await,
            Command::Signup { username, password } => {
                self.signup(&username, &password).await?;
                Ok(true)
            }
            Command::Malformed(Verb::Login) => {
                self.writer.write_line(&error_reply(ERR_LOGIN_FORMAT)).await?;
                Ok(true)
            }
            Command::Malformed(Verb::Signup) => {
                self.writer.write_line(&error_reply(ERR_SIGNUP_FORMAT)).await?;
                Ok(true)
            }
            Command::Upload(_)
            | Command::Download(_)
            | Command::List
            | Command::Malformed(Verb::Upload)
            | Command::Malformed(Verb::Download)
            | Command::Malformed(Verb::List) => {
                self.writer
                    .write_line(&error_reply(ERR_NOT_AUTHENTICATED))
                    .await?;
                Ok(true)
            }
            _ => {
                self.writer
                    .write_line(&error_reply(ERR_UNKNOWN_COMMAND))
                    .await?;
                Ok(true)
            }
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> io::Result<bool> {
        if self.ctx.users.verify(username, password).await {
            self.ctx.registry.register(self.conn_id, username);
            self.username = Some(username.to_string());
            self.state = State::Active;
            self.writer.write_line(&success_reply(MSG_LOGIN_OK)).await?;
            if self.ctx.debug {
                eprintln!(
                    "Session {} ({}): authenticated as '{username}'",
                    self.conn_id, self.peer_addr
                );
            }
            return Ok(true);
        }

        self.attempts_left -= 1;
        self.writer
            .write_line(&error_reply(&failed_login_message(self.attempts_left)))
            .await?;
        if self.attempts_left == 0 {
            self.writer
                .write_line(&error_reply(ERR_TOO_MANY_ATTEMPTS))
                .await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn signup(&mut self, username: &str, password: &str) -> io::Result<()> {
        // Usernames become storage directory names, so the charset is
        // checked before the store ever sees the request
        if !validate_username(username) {
            return self
                .writer
                .write_line(&error_reply(ERR_USERNAME_INVALID))
                .await;
        }

        if self.ctx.users.create(username, password).await? {
            self.writer.write_line(&success_reply(MSG_SIGNUP_OK)).await
        } else {
            self.writer
                .write_line(&error_reply(ERR_USERNAME_TAKEN))
                .await
        }
    }

    /// ACTIVE: transfers until the peer goes away.
    async fn handle_active(&mut self, line: &str) -> io::Result<bool> {
        if line.is_empty() {
            return Ok(false);
        }

        let username = self.username.as_deref().unwrap_or_default();
        let transfer_ctx = TransferContext {
            users: &self.ctx.users,
            username,
            peer_addr: self.peer_addr,
            debug: self.ctx.debug,
        };

        match Command::parse(line) {
            Command::Upload(name) => {
                transfers::upload::handle_upload(
                    &mut self.reader,
                    &mut self.writer,
                    &transfer_ctx,
                    &name,
                )
                .await?;
            }
            Command::Download(name) => {
                transfers::download::handle_download(
                    &mut self.reader,
                    &mut self.writer,
                    &transfer_ctx,
                    &name,
                )
                .await?;
            }
            Command::List => {
                transfers::list::handle_list(&mut self.reader, &mut self.writer, &transfer_ctx)
                    .await?;
            }
            Command::Malformed(Verb::Upload) | Command::Malformed(Verb::Download) => {
                self.writer
                    .write_line(&error_reply(ERR_MISSING_FILENAME))
                    .await?;
            }
            _ => {
                self.writer
                    .write_line(&error_reply(ERR_UNKNOWN_COMMAND))
                    .await?;
            }
        }
        Ok(true)
    }
}

/// Per-attempt login failure text carrying the remaining count.
fn failed_login_message(remaining: u8) -> String {
    let noun = if remaining == 1 { "attempt" } else { "attempts" };
    format!(
        "{}, {remaining} {noun} remaining",
        crate::constants::ERR_INVALID_CREDENTIALS
    )
}
