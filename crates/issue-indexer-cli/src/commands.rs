use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "issue-indexer")]
#[command(about = "Catalogs magazine issue PDFs and gives them canonical names", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover issues, restore known ones from the registry and analyze the rest
    Scan {
        /// Folders or PDF files to scan (defaults to the configured root paths)
        paths: Vec<String>,
        /// Extra analysis rounds for entries that failed
        #[arg(long, default_value_t = 0)]
        retries: usize,
    },
    /// Apply suggested names to analyzed files
    Rename {
        /// Folders or PDF files the session covers
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Write an offline rename script instead of renaming
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
        /// Generate a POSIX shell script instead of a Windows batch file
        #[arg(long, conflicts_with = "python")]
        shell: bool,
        /// Generate a Python script that reads the registry file
        #[arg(long)]
        python: bool,
    },
    /// Override the suggested name of one file
    Edit {
        /// Original name, relative path or suggested name of the file
        file: String,
        new_name: String,
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<String>,
    },
    /// List cataloged issues
    List {
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<String>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        system: Option<String>,
        #[arg(long = "type", value_name = "TYPE")]
        content_type: Option<String>,
        /// Case-insensitive search over names, title, summary and edition
        #[arg(long)]
        search: Option<String>,
        /// Include entries still awaiting analysis
        #[arg(long)]
        all: bool,
    },
    /// Print configuration values
    PrintConfig,
    /// Forget every cataloged issue and delete the registry file
    Reset {
        #[arg(short, long)]
        yes: bool,
    },
}
