use crate::domain::ports::Transport;
use crate::domain::user::UserId;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Prints outbound messages, one `<user> <- <text>` entry per message.
///
/// Continuation lines of multi-line messages are indented. Images are written
/// to `image_dir` when one is set; otherwise only their size is printed.
pub struct ConsoleTransport {
    sink: Mutex<Box<dyn Write + Send>>,
    image_dir: Option<PathBuf>,
    sequence: AtomicU64,
}

impl ConsoleTransport {
    pub fn new(sink: Box<dyn Write + Send>, image_dir: Option<PathBuf>) -> Self {
        Self {
            sink: Mutex::new(sink),
            image_dir,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn stdout(image_dir: Option<PathBuf>) -> Self {
        Self::new(Box::new(std::io::stdout()), image_dir)
    }

    async fn print(&self, user: &UserId, line: &str) -> Result<()> {
        let mut sink = self.sink.lock().await;
        writeln!(sink, "{user} <- {}", line.replace('\n', "\n    "))
            .and_then(|()| sink.flush())
            .map_err(|e| GateError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(&self, user: &UserId, text: &str) -> Result<()> {
        self.print(user, text).await
    }

    async fn send_image(&self, user: &UserId, image: &[u8], caption: &str) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let label = match &self.image_dir {
            Some(dir) => {
                let path = dir.join(format!("{}-{sequence}.jpg", user.phone()));
                tokio::fs::write(&path, image)
                    .await
                    .map_err(|e| GateError::Transport(format!("{}: {e}", path.display())))?;
                format!("[image {}]", path.display())
            }
            None => format!("[image {} bytes]", image.len()),
        };
        self.print(user, &format!("{label} {caption}")).await
    }
}
