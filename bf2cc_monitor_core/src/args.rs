use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Remote console address, as host:port
    #[arg(long)]
    pub address: Option<String>,
    /// Remote console password
    #[arg(long)]
    pub password: Option<String>,
    /// Name to announce to the server after logging in
    #[arg(long)]
    pub admin_name: Option<String>,

    /// Use this config file instead of the default one
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Keep admins, aliases and snapshots in this directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Milliseconds between polls of the server
    #[arg(long)]
    pub interval_ms: Option<u64>,
    /// Give up instead of reconnecting when the connection drops
    #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
    pub no_reconnect: bool,
}
