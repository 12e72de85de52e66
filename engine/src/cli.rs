//! CLI interface for EcoAgent
//!
//! This module provides the command-line interface using clap's derive API.
//! It is a thin layer over the library: every command maps onto one handler.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EcoAgent returns assistant
///
/// Answers customer questions about product returns: eligibility checks,
/// return labels, return policies and general company knowledge.
#[derive(Parser, Debug)]
#[command(name = "ecoagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a single query
    Ask {
        /// The question to resolve
        query: String,
    },

    /// Interactive session (type "salir" to leave, /stats, /reset)
    Chat,

    /// Show the selected strategies and available capabilities
    Status,

    /// Show the most recent entries of the interaction log
    History {
        /// Number of entries to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}
