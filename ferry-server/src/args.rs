//! Command-line argument parsing

use clap::Parser;
use ferry_common::DEFAULT_PORT;
use std::net::IpAddr;
use std::path::PathBuf;

/// Get default storage root help text for current platform
fn default_storage_root_help() -> String {
    #[cfg(target_os = "linux")]
    return "Storage root directory (default: ~/.local/share/ferryd/storage/)".to_string();

    #[cfg(target_os = "macos")]
    return "Storage root directory (default: ~/Library/Application Support/ferryd/storage/)"
        .to_string();

    #[cfg(target_os = "windows")]
    return "Storage root directory (default: %APPDATA%\\ferryd\\storage\\)".to_string();

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "Storage root directory (overrides platform default)".to_string();
}

/// Get default users file help text for current platform
fn default_users_file_help() -> String {
    #[cfg(target_os = "linux")]
    return "User store file path (default: ~/.local/share/ferryd/users.json)".to_string();

    #[cfg(target_os = "macos")]
    return "User store file path (default: ~/Library/Application Support/ferryd/users.json)"
        .to_string();

    #[cfg(target_os = "windows")]
    return "User store file path (default: %APPDATA%\\ferryd\\users.json)".to_string();

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "User store file path (overrides platform default)".to_string();
}

/// Ferry File Transfer Server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to bind to (IPv4 or IPv6)
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Storage root directory (overrides platform default)
    #[arg(short = 's', long = "storage-root", help = default_storage_root_help())]
    pub storage_root: Option<PathBuf>,

    /// User store file path (overrides platform default)
    #[arg(short = 'u', long = "users-file", help = default_users_file_help())]
    pub users_file: Option<PathBuf>,

    /// Enable debug logging (shows session and transfer activity)
    #[arg(long, default_value = "false")]
    pub debug: bool,
}
