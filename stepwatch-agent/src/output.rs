//! Output backends for emitting snapshots.

use std::path::PathBuf;

use stepwatch_types::ActivitySnapshot;

/// Output destination for snapshots.
///
/// Configure where the agent should emit snapshots.
#[derive(Debug)]
pub enum Output {
    /// Write snapshots to a JSON file.
    ///
    /// The file is overwritten with each snapshot.
    File(PathBuf),

    /// Send snapshots to a TCP listener, such as the relay.
    ///
    /// Each snapshot is sent as one line of JSON over a fresh connection.
    Tcp(String),

    /// Send snapshots through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<ActivitySnapshot>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stepwatch_agent::Output;
    ///
    /// let output = Output::file("activity.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stepwatch_agent::Output;
    ///
    /// let output = Output::tcp("localhost:7450");
    /// ```
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<ActivitySnapshot>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Short label for log lines.
    pub(crate) fn describe(&self) -> String {
        match self {
            Output::File(path) => format!("file:{}", path.display()),
            Output::Tcp(addr) => format!("tcp:{}", addr),
            #[cfg(feature = "tokio")]
            Output::Channel(_) => "channel".to_string(),
        }
    }

    /// Emit a snapshot to this output.
    #[cfg(feature = "tokio")]
    pub(crate) async fn emit(&self, snapshot: &ActivitySnapshot) -> std::io::Result<()> {
        use std::io;

        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(snapshot)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                use tokio::io::AsyncWriteExt;
                use tokio::net::TcpStream;

                let mut stream = TcpStream::connect(addr).await?;
                let mut json = serde_json::to_string(snapshot)?;
                json.push('\n');
                stream.write_all(json.as_bytes()).await?;
                stream.shutdown().await?;
            }
            Output::Channel(tx) => {
                // Never block emission on a slow receiver
                tx.try_send(snapshot.clone()).map_err(|err| {
                    io::Error::new(io::ErrorKind::WouldBlock, err.to_string())
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn snapshot() -> ActivitySnapshot {
        ActivitySnapshot::builder()
            .timestamp_ms(1_700_000_000_000)
            .adapter("A", |a| a.channel("C", |c| c.workflow("W", |w| w.message_id("m1"))))
            .build()
    }

    #[tokio::test]
    async fn file_output_overwrites_with_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.json");
        let output = Output::file(&path);

        output.emit(&ActivitySnapshot::with_timestamp(1)).await.unwrap();
        output.emit(&snapshot()).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains('\n'));
        let parsed: ActivitySnapshot = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, snapshot());
    }

    #[tokio::test]
    async fn tcp_output_sends_one_json_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let output = Output::tcp(addr.to_string());

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await.unwrap()
        });

        output.emit(&snapshot()).await.unwrap();

        let line = accept.await.unwrap().unwrap();
        let parsed: ActivitySnapshot = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.workflow("W").unwrap().message_ids.len(), 1);
    }

    #[tokio::test]
    async fn tcp_output_reports_unreachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(Output::tcp(addr.to_string()).emit(&snapshot()).await.is_err());
    }

    #[tokio::test]
    async fn full_channel_does_not_block() {
        let (output, mut rx) = Output::channel(1);

        output.emit(&snapshot()).await.unwrap();
        let err = output.emit(&snapshot()).await.unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
        assert!(rx.recv().await.is_some());
    }

    #[test]
    fn describe_names_the_destination() {
        assert_eq!(Output::tcp("relay:7450").describe(), "tcp:relay:7450");
        assert_eq!(Output::file("a.json").describe(), "file:a.json");
    }
}
