//! Ferry File Transfer Server

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;

use ferry_server::args::Args;
use ferry_server::constants::*;
use ferry_server::files;
use ferry_server::server::Server;
use ferry_server::users::UserStore;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Print banner first
    println!("{}{}", MSG_BANNER, env!("CARGO_PKG_VERSION"));

    // Setup storage area and user store
    let storage_root = setup_storage(args.storage_root);
    let users = setup_users(args.users_file, &storage_root);

    // Setup network
    let addr = SocketAddr::new(args.bind, args.port);
    let server = match Server::bind(addr, users, args.debug).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{}{}: {}", ERR_BIND_FAILED, addr, e);
            std::process::exit(1);
        }
    };
    println!("{}{}", MSG_LISTENING, addr);

    // Setup graceful shutdown handling
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(true);
        // Keep the sender alive; sessions watch this channel until they exit
        std::future::pending::<()>().await;
    });

    if let Err(e) = server.run(shutdown_rx).await {
        eprintln!("{}{}", ERR_GENERIC, e);
        std::process::exit(1);
    }

    println!("{MSG_SHUTDOWN_COMPLETE}");
}

/// Setup the storage root, creating it if needed.
///
/// Returns the canonicalized path, ready for the containment checks the
/// transfer handlers perform.
fn setup_storage(storage_root: Option<PathBuf>) -> PathBuf {
    let root = storage_root.unwrap_or_else(|| match files::default_storage_root() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}{}", ERR_GENERIC, e);
            std::process::exit(1);
        }
    });

    let canonical_root = match files::init_storage_root(&root) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}{}", ERR_STORAGE_INIT, e);
            std::process::exit(1);
        }
    };

    println!("{}{}", MSG_STORAGE, canonical_root.display());
    canonical_root
}

/// Load the user store from disk (or start a fresh one).
fn setup_users(users_file: Option<PathBuf>, storage_root: &std::path::Path) -> UserStore {
    let users_file = users_file.unwrap_or_else(|| match default_users_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}{}", ERR_GENERIC, e);
            std::process::exit(1);
        }
    });

    let users = match UserStore::load(&users_file, storage_root, false) {
        Ok(users) => users,
        Err(e) => {
            eprintln!("{}{}", ERR_USERS_INIT, e);
            std::process::exit(1);
        }
    };

    println!("{}{}", MSG_USERS, users_file.display());
    users
}

/// Get the default users file path for the platform.
fn default_users_file() -> Result<PathBuf, String> {
    let data_dir = dirs::data_dir().ok_or_else(|| ERR_NO_DATA_DIR.to_string())?;
    Ok(data_dir.join(DATA_DIR_NAME).join(USERS_FILE_NAME))
}

/// Wait for a graceful shutdown signal (Ctrl+C, plus SIGTERM on Unix).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    }
}
