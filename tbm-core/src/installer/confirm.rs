//! Overwrite confirmation policies.
//!
//! Replacing an existing folder destination is destructive, so the installer
//! asks a [`ConfirmOverwrite`] first. The CLI uses [`StdinConfirm`]; batch
//! runs and tests plug in a fixed answer.

use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::warn;

/// Decides whether an existing destination may be deleted and replaced.
pub trait ConfirmOverwrite: Send + Sync {
    fn confirm_overwrite(&self, id: &str, destination: &Path) -> bool;
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl ConfirmOverwrite for StdinConfirm {
    fn confirm_overwrite(&self, id: &str, destination: &Path) -> bool {
        let stdin = io::stdin();
        let stdout = io::stdout();
        prompt(id, destination, &mut stdin.lock(), &mut stdout.lock())
    }
}

/// Always allows the overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl ConfirmOverwrite for AssumeYes {
    fn confirm_overwrite(&self, _id: &str, _destination: &Path) -> bool {
        true
    }
}

/// Never allows the overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl ConfirmOverwrite for AssumeNo {
    fn confirm_overwrite(&self, _id: &str, _destination: &Path) -> bool {
        false
    }
}

/// Writes the confirmation prompt and reads the answer.
///
/// Read errors and end of input count as "no".
fn prompt<R: BufRead, W: Write>(
    id: &str,
    destination: &Path,
    input: &mut R,
    output: &mut W,
) -> bool {
    let _ = write!(
        output,
        "[{id}]: confirm that {} is going to be deleted(y/n): ",
        destination.display()
    );
    let _ = output.flush();

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(_) => is_yes(&line),
        Err(e) => {
            warn!(package = %id, error = %e, "Failed to read confirmation");
            false
        }
    }
}

/// True for a case-insensitive `y`, ignoring surrounding whitespace.
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
