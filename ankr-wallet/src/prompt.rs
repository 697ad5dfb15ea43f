//! Password and confirmation input

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Source of passwords and yes/no answers
pub trait Prompter: Send {
    /// Read a password. The returned buffer is wiped on drop.
    fn password(&mut self, prompt: &str) -> WalletResult<Zeroizing<String>>;

    /// Ask a yes/no question
    fn confirm(&mut self, message: &str) -> WalletResult<bool>;

    /// Read a new password twice and require both entries to match
    fn new_password(&mut self, prompt: &str) -> WalletResult<Zeroizing<String>> {
        let first = self.password(prompt)?;
        let second = self.password("Repeat the password: ")?;
        if *first != *second {
            return Err(WalletError::Prompt("passwords do not match".to_string()));
        }
        Ok(first)
    }
}

fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

fn read_confirmation(message: &str) -> WalletResult<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(is_yes(&input))
}

/// Interactive terminal input. Echo is disabled while a password is typed.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompter for TerminalPrompt {
    fn password(&mut self, prompt: &str) -> WalletResult<Zeroizing<String>> {
        rpassword::prompt_password(prompt)
            .map(Zeroizing::new)
            .map_err(|e| WalletError::Prompt(e.to_string()))
    }

    fn confirm(&mut self, message: &str) -> WalletResult<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        read_confirmation(message)
    }
}

/// Password read once from a file, for unattended use
pub struct PasswordFile {
    password: Zeroizing<String>,
    assume_yes: bool,
}

impl PasswordFile {
    /// Load the first line of `path` as the password
    pub fn load(path: &Path, assume_yes: bool) -> WalletResult<Self> {
        let content = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            WalletError::Prompt(format!("cannot read password file {}: {}", path.display(), e))
        })?);
        let line = content.lines().next().unwrap_or("");
        Ok(Self {
            password: Zeroizing::new(line.to_string()),
            assume_yes,
        })
    }
}

impl Prompter for PasswordFile {
    fn password(&mut self, _prompt: &str) -> WalletResult<Zeroizing<String>> {
        Ok(self.password.clone())
    }

    fn confirm(&mut self, message: &str) -> WalletResult<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        read_confirmation(message)
    }
}

impl std::fmt::Debug for PasswordFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordFile")
            .field("password", &"[REDACTED]")
            .field("assume_yes", &self.assume_yes)
            .finish()
    }
}

/// Canned answers, consumed in order
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    passwords: VecDeque<String>,
    answers: VecDeque<bool>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.passwords.push_back(password.to_string());
        self
    }

    pub fn with_answer(mut self, answer: bool) -> Self {
        self.answers.push_back(answer);
        self
    }

    /// Number of passwords not yet consumed
    pub fn remaining_passwords(&self) -> usize {
        self.passwords.len()
    }
}

impl Prompter for ScriptedPrompt {
    fn password(&mut self, _prompt: &str) -> WalletResult<Zeroizing<String>> {
        self.passwords
            .pop_front()
            .map(Zeroizing::new)
            .ok_or_else(|| WalletError::Prompt("no scripted password left".to_string()))
    }

    fn confirm(&mut self, _message: &str) -> WalletResult<bool> {
        self.answers
            .pop_front()
            .ok_or_else(|| WalletError::Prompt("no scripted answer left".to_string()))
    }
}
