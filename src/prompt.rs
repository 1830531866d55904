//! Interactive terminal prompts: password entry, the continue question and
//! host-key confirmation.
//!
//! Every prompt writes to stderr so stdout stays free for piping, and every
//! prompt has a reader/writer-generic core that the tests drive directly.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use dljob_core::connector::HostKeyPrompt;
use dljob_core::download::resolve_local_path;
use dljob_core::{Credential, Job};
use tracing::warn;
use zeroize::Zeroizing;

/// Reads one line from the terminal as the secret for `username`.
///
/// Echo is turned off on a terminal; piped stdin is read as a plain line.
/// For `scp://` sources the secret is the base64 private key blob.
pub(crate) fn ask_password(username: &str, scheme: &str) -> Result<Credential> {
    let label = if scheme == "scp" {
        "Private key (base64): "
    } else {
        "Password: "
    };
    let stdin = io::stdin();
    let mut stderr = io::stderr();
    if !stdin.is_terminal() {
        return read_secret(&mut stdin.lock(), &mut stderr, label, username);
    }

    write!(stderr, "{label}").context("Failed to write password prompt")?;
    stderr.flush().context("Failed to flush password prompt")?;
    let secret = Zeroizing::new(
        rpassword::read_password().context("Failed to read password from terminal")?,
    );
    Ok(Credential::from_slice(username, secret.as_bytes()))
}

fn read_secret<R, W>(reader: &mut R, writer: &mut W, label: &str, username: &str) -> Result<Credential>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    write!(writer, "{label}").context("Failed to write password prompt")?;
    writer.flush().context("Failed to flush password prompt")?;

    let mut line = Zeroizing::new(String::new());
    reader
        .read_line(&mut line)
        .context("Failed to read password from terminal")?;
    let secret = line.trim_end_matches(['\r', '\n']);
    Ok(Credential::from_slice(username, secret.as_bytes()))
}

/// Shows where the first item will land and asks whether to start.
pub(crate) fn prompt_to_continue(job: &Job) -> Result<bool> {
    let stdin = io::stdin();
    let mut stderr = io::stderr();
    continue_with(job, &mut stdin.lock(), &mut stderr)
}

fn continue_with<R, W>(job: &Job, reader: &mut R, writer: &mut W) -> Result<bool>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    if let Some(first) = job.first_item() {
        match resolve_local_path(&first.path, &job.base_path(), job.target_dir()) {
            Ok(local) => writeln!(
                writer,
                "Remote file {} will be saved as {}",
                first.path,
                local.display()
            )?,
            Err(error) => warn!(path = %first.path, error = %error, "first item has no local path"),
        }
    }
    ask_yes_no(reader, writer, "continue? (y/n) ")
}

/// Asks a yes/no question; anything but `y`/`yes` is a no.
fn ask_yes_no<R, W>(reader: &mut R, writer: &mut W, question: &str) -> Result<bool>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    write!(writer, "{question}").context("Failed to write prompt")?;
    writer.flush().context("Failed to flush prompt")?;

    let mut answer = String::new();
    reader
        .read_line(&mut answer)
        .context("Failed to read answer from terminal")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Host-key confirmation on the controlling terminal.
#[derive(Debug, Default)]
pub(crate) struct TerminalHostKeyPrompt;

impl HostKeyPrompt for TerminalHostKeyPrompt {
    fn confirm(&self, host: &str, key_type: &str, fingerprint: &str) -> bool {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        let _ = writeln!(
            stderr,
            "The authenticity of host '{host}' can't be established.\n{key_type} key fingerprint is {fingerprint}."
        );
        match ask_yes_no(
            &mut stdin.lock(),
            &mut stderr,
            "Are you sure you want to continue connecting? (y/n) ",
        ) {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(host, error = %error, "host key prompt failed; rejecting");
                false
            }
        }
    }
}
