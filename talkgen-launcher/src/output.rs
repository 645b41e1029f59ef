//! Forward engine stdout/stderr into the log
//!
//! Both pipes are drained continuously; an unread pipe fills up and stalls
//! the engine.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

/// Start forwarding tasks for whichever pipes the child has
pub fn forward_output(child: &mut Child, pid: u32) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        tasks.push(tokio::spawn(forward_lines(stdout, pid, "stdout")));
    }
    if let Some(stderr) = child.stderr.take() {
        tasks.push(tokio::spawn(forward_lines(stderr, pid, "stderr")));
    }
    tasks
}

async fn forward_lines<R>(reader: R, pid: u32, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::info!(target: "engine", pid, stream, "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(pid, stream, "Engine output stream closed: {}", e);
                break;
            }
        }
    }
}
