use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::preferences::PAGE_SIZE_OPTIONS;

/// token-console: manage API tokens of a one-api style console
#[derive(Parser)]
#[command(name = "token-console", version, about)]
pub struct Cli {
    /// Management API root (overrides CONSOLE_BASE_URL)
    #[arg(long, global = true, env = "CONSOLE_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List one page of tokens
    List {
        /// 0-based page index
        #[arg(long, default_value = "0")]
        page: u32,
        /// Page size (10, 20, 30, 50 or 100); remembered for the next run
        #[arg(long, value_parser = parse_page_size)]
        size: Option<u32>,
        #[arg(short, long, default_value = "")]
        keyword: String,
        /// Sort column (name, group, status, used_quota, remain_quota,
        /// created_time, expired_time, id)
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// View another account's tokens (root only)
        #[arg(long)]
        user: Option<i64>,
    },

    /// Delete a token
    Delete {
        id: i64,
        #[arg(long)]
        user: Option<i64>,
    },

    /// Enable or disable a token
    Status {
        id: i64,
        /// enabled | disabled
        status: String,
        #[arg(long)]
        user: Option<i64>,
    },

    /// Search accounts (root only)
    Users {
        #[arg(short, long, default_value = "")]
        keyword: String,
    },

    /// List the groups a token can be assigned to
    Groups,

    /// Consumption grouped by billing tag
    Billing {
        /// YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// YYYY-MM-DD
        #[arg(long)]
        end: String,
        /// Write the CSV export to this file instead of printing a summary
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

fn parse_page_size(raw: &str) -> Result<u32, String> {
    let size: u32 = raw.parse().map_err(|e| format!("{}", e))?;
    if PAGE_SIZE_OPTIONS.contains(&size) {
        Ok(size)
    } else {
        Err(format!("page size must be one of {:?}", PAGE_SIZE_OPTIONS))
    }
}
