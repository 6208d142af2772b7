//! Connection supervisor
//!
//! Owns the listener and spawns one session task per accepted connection.
//! Shutdown is cooperative: the watch flag flips, the accept loop exits,
//! every session's bounded read observes the flag within one poll interval
//! and closes, and [`Server::run`] returns only after every spawned task
//! has been joined (bounded per task) or aborted.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::connection::{SessionContext, run_session};
use crate::constants::{
    ERR_ACCEPT, ERR_SESSION, MSG_SHUTDOWN_RECEIVED, SHUTDOWN_JOIN_TIMEOUT,
};
use crate::registry::SessionRegistry;
use crate::users::UserStore;

pub struct Server {
    listener: TcpListener,
    users: UserStore,
    registry: SessionRegistry,
    debug: bool,
}

impl Server {
    /// Bind the listener.
    pub async fn bind(addr: SocketAddr, users: UserStore, debug: bool) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            users,
            registry: SessionRegistry::new(),
            debug,
        })
    }

    /// The bound address; useful when binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The table of authenticated sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Accept connections until `shutdown` flips, then drain every session.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> io::Result<()> {
        let mut accept_shutdown = shutdown.clone();
        let mut handles: Vec<(SocketAddr, JoinHandle<()>)> = Vec::new();

        loop {
            tokio::select! {
                changed = accept_shutdown.changed() => {
                    if changed.is_err() || *accept_shutdown.borrow() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            handles.push((peer_addr, self.spawn_session(stream, peer_addr, &shutdown)));
                        }
                        Err(e) => {
                            eprintln!("{ERR_ACCEPT}{e}");
                        }
                    }
                }
            }
        }

        println!("{MSG_SHUTDOWN_RECEIVED}");

        // Sessions remove their own entries; the sweep catches any that
        // cannot (wedged mid-transfer and about to be aborted)
        for (conn_id, _) in self.registry.snapshot() {
            self.registry.unregister(conn_id);
        }
        drop(self.listener);

        for (peer_addr, handle) in handles {
            if timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await.is_err() {
                eprintln!(
                    "{} ({peer_addr})",
                    crate::constants::WARN_SESSION_JOIN_TIMEOUT
                );
            }
        }

        Ok(())
    }

    fn spawn_session(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
        shutdown: &watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let conn_id = self.registry.next_id();
        let ctx = SessionContext {
            users: self.users.clone(),
            registry: self.registry.clone(),
            shutdown: shutdown.clone(),
            debug: self.debug,
        };

        if self.debug {
            eprintln!("Session {conn_id}: connection from {peer_addr}");
        }

        tokio::spawn(async move {
            if let Err(e) = run_session(stream, peer_addr, conn_id, ctx).await {
                eprintln!("{ERR_SESSION}{peer_addr}: {e}");
            }
        })
    }
}
