//! Starting the control server inside a freshly launched interpreter.
//!
//! This is the only synchronous exchange: the start command is typed into the interpreter's
//! terminal, and the caller waits, up to a bound, for the interpreter's prompt to come back.
//! Evaluation requests never go through here.
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use crate::{Error, Result};

/// Write `command` to the interpreter terminal and wait until `prompt` reappears
pub async fn start_server<T>(
    terminal: &mut T,
    command: &str,
    prompt: &str,
    bound: Duration,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    debug!("bootstrap - sending {command:?}");
    terminal.write_all(command.as_bytes()).await?;
    terminal.write_all(b"\n").await?;
    terminal.flush().await?;

    match timeout(bound, wait_for_prompt(terminal, prompt)).await {
        Ok(res) => res,
        Err(_) => Err(Error::BootstrapTimeout(bound)),
    }
}

/// Read from `output` until `prompt` has been seen
async fn wait_for_prompt<R>(output: &mut R, prompt: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let prompt = prompt.as_bytes();
    if prompt.is_empty() {
        return Ok(());
    }

    let mut seen: Vec<u8> = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    loop {
        let n = output.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::BootstrapEof);
        }
        seen.extend_from_slice(&buf[..n]);
        if seen.windows(prompt.len()).any(|w| w == prompt) {
            debug!("bootstrap - prompt reappeared");
            return Ok(());
        }
        // A prompt split across reads starts within the last prompt.len() - 1 bytes
        let keep = prompt.len() - 1;
        if seen.len() > keep {
            seen.drain(..seen.len() - keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn prompt_reappears() {
        let (mut local, remote) = tokio::io::duplex(1024);

        let interpreter = tokio::spawn(async move {
            let mut remote = BufReader::new(remote);
            let mut line = String::new();
            remote.read_line(&mut line).await.unwrap();
            let remote = remote.get_mut();
            remote.write_all(b"starting server...\njul").await.unwrap();
            remote.write_all(b"ia> ").await.unwrap();
            line
        });

        start_server(
            &mut local,
            "ReplWire.start(10011)",
            "julia> ",
            Duration::from_secs(1),
        )
        .await
        .expect("bootstrap should see prompt");

        assert_eq!(interpreter.await.unwrap(), "ReplWire.start(10011)\n");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_prompt() {
        let (mut local, _remote) = tokio::io::duplex(1024);

        assert_matches!(
            start_server(&mut local, "start()", "julia> ", Duration::from_secs(5)).await,
            Err(Error::BootstrapTimeout(bound)) if bound == Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn eof_before_prompt() {
        let (mut local, remote) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let mut remote = BufReader::new(remote);
            let mut line = String::new();
            remote.read_line(&mut line).await.unwrap();
            remote.get_mut().write_all(b"ERROR: crashed\n").await.unwrap();
        });

        assert_matches!(
            start_server(&mut local, "start()", "julia> ", Duration::from_secs(1)).await,
            Err(Error::BootstrapEof)
        );
    }
}
