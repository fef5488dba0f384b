//! TCP intake for agent snapshots.
//!
//! Agents connect and write newline-delimited JSON, one
//! `ActivitySnapshot` per line. Every parsed snapshot is pushed into a
//! channel; unparseable lines are logged and skipped.

use std::io;
use std::net::SocketAddr;

use stepwatch_types::ActivitySnapshot;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Longest snapshot line accepted from an agent, newline excluded.
pub const MAX_LINE_BYTES: u64 = 16 * 1024 * 1024;

/// Outcome of reading one agent stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Snapshots parsed and handed on.
    pub received: u64,
    /// Lines that were not a usable snapshot.
    pub rejected: u64,
}

/// Accepts agent connections and feeds their snapshots into a channel.
#[derive(Debug)]
pub struct SnapshotListener {
    listener: TcpListener,
}

impl SnapshotListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the receiving side of `tx` is dropped.
    ///
    /// Each connection is read on its own task.
    pub async fn run(self, tx: mpsc::Sender<ActivitySnapshot>) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "Listening for agent snapshots");

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = tx.closed() => break,
            };
            debug!(%peer, "Agent connected");

            let tx = tx.clone();
            tokio::spawn(async move {
                let source = peer.to_string();
                let stats = read_snapshots(stream, &source, &tx).await;
                debug!(
                    %peer,
                    received = stats.received,
                    rejected = stats.rejected,
                    "Agent disconnected"
                );
            });
        }

        Ok(())
    }
}

/// Read newline-delimited snapshots from `reader` until EOF.
///
/// Stops early if the receiver is gone, the stream fails, or a line runs
/// past [`MAX_LINE_BYTES`].
pub async fn read_snapshots<R>(
    reader: R,
    source: &str,
    tx: &mpsc::Sender<ActivitySnapshot>,
) -> StreamStats
where
    R: AsyncRead + Unpin,
{
    read_bounded(reader, source, tx, MAX_LINE_BYTES).await
}

async fn read_bounded<R>(
    reader: R,
    source: &str,
    tx: &mpsc::Sender<ActivitySnapshot>,
    max_line: u64,
) -> StreamStats
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut stats = StreamStats::default();

    loop {
        line.clear();
        // One byte of headroom for the newline
        match (&mut reader).take(max_line + 1).read_line(&mut line).await {
            Ok(0) => break,
            Ok(n) if n as u64 > max_line && !line.ends_with('\n') => {
                stats.rejected += 1;
                warn!(source, max_line, "Snapshot line too long, dropping agent stream");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ActivitySnapshot>(trimmed) {
                    Ok(snapshot) if !snapshot.version.is_compatible() => {
                        stats.rejected += 1;
                        warn!(
                            source,
                            major = snapshot.version.major,
                            "Skipping snapshot with incompatible schema version"
                        );
                    }
                    Ok(snapshot) => {
                        stats.received += 1;
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        stats.rejected += 1;
                        warn!(source, error = %e, "Skipping unparseable snapshot line");
                    }
                }
            }
            Err(e) => {
                warn!(source, error = %e, "Read error, dropping agent stream");
                break;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn sample_json() -> String {
        let snapshot = ActivitySnapshot::builder()
            .timestamp_ms(42)
            .adapter("A", |a| a.channel("C", |c| c.workflow("W", |w| w.message_id("m1"))))
            .build();
        serde_json::to_string(&snapshot).unwrap()
    }

    #[tokio::test]
    async fn test_read_multiple_snapshots() {
        let data = format!("{}\n{}\n", sample_json(), sample_json());
        let (tx, mut rx) = mpsc::channel(16);

        let stats = read_snapshots(Cursor::new(data), "test", &tx).await;

        assert_eq!(stats, StreamStats { received: 2, rejected: 0 });
        assert_eq!(rx.recv().await.unwrap().timestamp_ms, 42);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_json_is_skipped() {
        let data = format!("not valid json\n\n{}\n", sample_json());
        let (tx, mut rx) = mpsc::channel(16);

        let stats = read_snapshots(Cursor::new(data), "test", &tx).await;

        assert_eq!(stats, StreamStats { received: 1, rejected: 1 });
        assert!(rx.recv().await.unwrap().workflow("W").is_some());
    }

    #[tokio::test]
    async fn test_incompatible_version_is_skipped() {
        let data = r#"{"version":{"major":99,"minor":0},"timestamp_ms":1,"adapters":{}}"#;
        let (tx, mut rx) = mpsc::channel(16);

        let stats = read_snapshots(Cursor::new(format!("{}\n", data)), "test", &tx).await;

        assert_eq!(stats.rejected, 1);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_overlong_line_drops_the_stream() {
        let json = sample_json();
        let limit = json.len() as u64;
        let data = format!("{}\n{}\n{}\n", json, "x".repeat(json.len() * 2), json);
        let (tx, mut rx) = mpsc::channel(16);

        let stats = read_bounded(Cursor::new(data), "test", &tx, limit).await;

        assert_eq!(stats, StreamStats { received: 1, rejected: 1 });
        drop(tx);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_line_at_the_limit_is_accepted() {
        let json = sample_json();
        let limit = json.len() as u64;
        let (tx, _rx) = mpsc::channel(16);

        let data = format!("{}\n{}", json, json);

        let stats = read_bounded(Cursor::new(data), "test", &tx, limit).await;

        assert_eq!(stats, StreamStats { received: 2, rejected: 0 });
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let (tx, _rx) = mpsc::channel(16);
        let stats = read_snapshots(Cursor::new(""), "test", &tx).await;
        assert_eq!(stats, StreamStats::default());
    }

    #[tokio::test]
    async fn test_listener_accepts_agents() {
        let listener = SnapshotListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let server = tokio::spawn(listener.run(tx));

        for _ in 0..2 {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(format!("{}\n", sample_json()).as_bytes())
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        }

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());

        drop(rx);
        server.await.unwrap().unwrap();
    }
}
