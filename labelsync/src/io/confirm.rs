//! Confirmation before a label write.
//!
//! Runs started with `--yes` use [`AcceptAll`]; otherwise every eligible change
//! is put to the operator through [`TerminalConfirmer`]. Tests use scripted
//! confirmers from `test_support`.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

pub trait Confirmer {
    /// Ask whether the change described by `prompt` should be written.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Approves every change without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Confirmer for AcceptAll {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on stderr and reads the answer from stdin. Anything but yes declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let stdin = std::io::stdin();
        let stderr = std::io::stderr();
        ask(prompt, &mut stdin.lock(), &mut stderr.lock())
    }
}

fn ask<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{prompt} [y/N] ").context("write prompt")?;
    output.flush().context("flush prompt")?;
    let mut answer = String::new();
    // EOF reads as an empty answer, i.e. "no".
    input.read_line(&mut answer).context("read answer")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
