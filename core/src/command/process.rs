//! Launching commands and reaping them once their output is consumed
//!
//! Launching a command returns an [`OutputHandle`] over the child's stdout
//! and spawns a reaper task. The reaper does not wait on the child straight
//! away: it blocks on a one-shot signal that fires when the handle is
//! released or dropped, and only then waits for the child to exit. The
//! dispatching task therefore never blocks on process teardown, and each
//! child is waited on exactly once.

use super::{CallerContext, CommandInvocation, ResolvedCommand};
use crate::error::CommandError;
use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Readable output of a running command and the point at which it is released.
///
/// Reading past release yields end-of-stream. Dropping an unreleased handle
/// releases it.
pub struct OutputHandle {
    reader: Option<Box<dyn AsyncRead + Send + Unpin>>,
    release: Option<oneshot::Sender<()>>,
}

impl OutputHandle {
    /// Wrap `reader`, returning the handle and the signal its release fires.
    pub fn new<R>(reader: R) -> (Self, oneshot::Receiver<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            reader: Some(Box::new(reader)),
            release: Some(tx),
        };
        (handle, rx)
    }

    /// Close the stream and let the command be reaped.
    pub fn release(mut self) {
        self.fire();
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    fn fire(&mut self) {
        // Close the pipe first so a child still writing sees EPIPE and exits.
        self.reader.take();
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

impl AsyncRead for OutputHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().reader.as_mut() {
            Some(reader) => Pin::new(reader).poll_read(cx, buf),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Positional arguments every command receives, in order: user mention,
/// channel name, sender, argument text, command name, user display name.
pub fn child_args<'a>(invocation: &'a CommandInvocation, caller: &'a CallerContext) -> [&'a str; 6] {
    [
        caller.user_mention.as_str(),
        caller.channel_name(),
        caller.sender(),
        invocation.args.as_str(),
        invocation.name.as_str(),
        caller.user_display_name.as_str(),
    ]
}

/// Start `resolved` from `dir`, with `dir` as its working directory.
///
/// Stderr goes to the host's stderr. A command that fails to start returns
/// [`CommandError::Launch`] and leaves nothing running.
pub fn launch(
    dir: &Path,
    resolved: &ResolvedCommand,
    invocation: &CommandInvocation,
    caller: &CallerContext,
) -> Result<OutputHandle, CommandError> {
    let command = resolved.file_name.clone();

    info!(
        "Command '{}' run in '{}' by '{}' with args '{}'",
        command,
        caller.channel_name(),
        caller.user_display_name,
        invocation.args
    );

    let program = std::path::absolute(dir.join(&command)).map_err(|source| CommandError::Launch {
        command: command.clone(),
        source,
    })?;

    let mut child = Command::new(program)
        .args(child_args(invocation, caller))
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| {
            error!("Failed to start command '{}': {}", command, source);
            CommandError::Launch {
                command: command.clone(),
                source,
            }
        })?;

    let stdout = child.stdout.take().ok_or_else(|| CommandError::Launch {
        command: command.clone(),
        source: io::Error::other("stdout was not piped"),
    })?;

    let (handle, released) = OutputHandle::new(stdout);
    spawn_reaper(command, child, released);

    Ok(handle)
}

fn spawn_reaper(command: String, mut child: Child, released: oneshot::Receiver<()>) {
    tokio::spawn(async move {
        // An Err here means the handle went away without firing, which is
        // still the consumer being done with it.
        let _ = released.await;

        match child.wait().await {
            Ok(status) if status.success() => debug!("Command {} exited", command),
            Ok(status) => warn!("Command {} failed: {}", command, status),
            Err(e) => error!("Command {} failed: {}", command, e),
        }
    });
}
