//! CLI Commands

pub mod balance;
pub mod deletekey;
pub mod genkey;
pub mod importkey;
pub mod listkey;
pub mod sendcoins;

use anyhow::Result;
use std::path::PathBuf;

use ankr_wallet::{PasswordFile, Prompter, TerminalPrompt, Wallet, WalletConfig};

/// Global options shared by every command
pub struct Context {
    pub home: PathBuf,
    pub password_file: Option<PathBuf>,
}

impl Context {
    /// Load the configuration and open the keystore directory
    pub fn open_wallet(&self) -> Result<Wallet> {
        let config = WalletConfig::load(&self.home)?;
        Ok(Wallet::open(config)?)
    }

    /// Password source: the password file if given, else the terminal
    pub fn prompter(&self, assume_yes: bool) -> Result<Box<dyn Prompter>> {
        match &self.password_file {
            Some(path) => Ok(Box::new(PasswordFile::load(path, assume_yes)?)),
            None => Ok(Box::new(TerminalPrompt::new(assume_yes))),
        }
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}
