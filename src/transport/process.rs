//! Worker subprocess with piped stdio.
//!
//! - stdin/stdout: protocol messages, wrapped in a [`ShellChannel`]
//! - stderr: free-form diagnostics, forwarded line by line to `tracing`
//!
//! # Example
//!
//! ```ignore
//! use shellwire::transport::ShellProcess;
//! use shellwire::ChannelConfig;
//!
//! let (mut channel, process) = ShellProcess::spawn(&["python3", "-m", "my_bolt"], &ChannelConfig::default())?;
//! let pid = channel.connect(conf, context).await?;
//! ```

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::channel::ShellChannel;
use crate::config::ChannelConfig;
use crate::error::{Result, ShellError};

/// Channel over a subprocess's stdout and stdin.
pub type ProcessChannel = ShellChannel<ChildStdout, ChildStdin>;

/// Handle on a running worker. The process is killed when this is dropped.
pub struct ShellProcess {
    child: Child,
    stderr_task: Option<JoinHandle<()>>,
}

impl ShellProcess {
    /// Start `argv[0]` with the remaining arguments.
    ///
    /// Must be called from within a tokio runtime; the stderr forwarder runs
    /// as a spawned task.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `argv` is empty.
    /// - `Io` if the process cannot be started.
    pub fn spawn<S: AsRef<OsStr>>(
        argv: &[S],
        config: &ChannelConfig,
    ) -> Result<(ProcessChannel, ShellProcess)> {
        config.validate()?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ShellError::InvalidConfig("empty worker command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| not_captured("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| not_captured("stdout"))?;
        let stderr_task = child.stderr.take().map(|stderr| {
            let pid = child.id();
            tokio::spawn(forward_stderr(stderr, pid))
        });

        tracing::debug!(
            program = %program.as_ref().to_string_lossy(),
            pid = ?child.id(),
            "Spawned worker"
        );

        let process = ShellProcess { child, stderr_task };
        Ok((ShellChannel::new(stdout, stdin, config), process))
    }

    /// OS process id, while the process runs.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await?;
        if let Some(task) = self.stderr_task.take() {
            // Forwarder ends at EOF on stderr; a panic there is not ours to report.
            let _ = task.await;
        }
        Ok(status)
    }

    /// Kill the process and wait for it.
    pub async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}

fn not_captured(stream: &str) -> ShellError {
    ShellError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("worker {} was not captured", stream),
    ))
}

async fn forward_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(pid = ?pid, "worker stderr: {}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(pid = ?pid, "worker stderr closed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::protocol::TopologyContext;
    use crate::value::Map;

    #[tokio::test]
    async fn test_empty_argv() {
        let argv: [&str; 0] = [];
        let result = ShellProcess::spawn(&argv, &ChannelConfig::default());
        assert!(matches!(result, Err(ShellError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = ShellProcess::spawn(
            &["/nonexistent/shellwire-worker"],
            &ChannelConfig::default(),
        );
        assert!(matches!(result, Err(ShellError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handshake_with_shell_worker() {
        let script = r#"echo '{"pid": 99}'; echo end; echo 'starting up' >&2; cat > /dev/null"#;
        let config = ChannelConfig::new().serializer(Codec::Json);
        let (mut channel, mut process) = ShellProcess::spawn(&["sh", "-c", script], &config).unwrap();

        let pid = channel
            .connect(Map::new(), TopologyContext::new(1))
            .await
            .unwrap();
        assert_eq!(pid, 99);
        assert!(process.id().is_some());

        drop(channel);
        let status = process.wait().await.unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_exit_fails_handshake() {
        let config = ChannelConfig::new().serializer(Codec::Json);
        let (mut channel, mut process) = ShellProcess::spawn(&["true"], &config).unwrap();

        let err = channel
            .connect(Map::new(), TopologyContext::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ShellError::HandshakeFailed(_)), "{:?}", err);
        process.wait().await.unwrap();
    }
}
