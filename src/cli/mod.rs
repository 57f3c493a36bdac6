//! CLI module - Command-line interface for authkeep
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// authkeep - user accounts and session tokens over SQLite
#[derive(Parser)]
#[command(name = "authkeep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the session purge job
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Apply pending schema migrations and exit
    Migrate,

    /// Delete revoked and expired sessions once
    Purge,

    /// Print row counts and integrity checks for the database
    #[command(alias = "health")]
    CheckDb {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a user; the password is read from AUTHKEEP_PASSWORD
    CreateUser {
        username: String,

        email: String,

        #[arg(long)]
        full_name: Option<String>,

        /// Grant admin privileges
        #[arg(long)]
        admin: bool,
    },
}

pub use commands::*;
