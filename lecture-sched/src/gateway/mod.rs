/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Protocol gateway.
//!
//! ```text
//! TcpListener ──accept──► connection task ──line──► Request::parse ──► ScheduleEngine
//!      │                        ▲                                          │
//!      └─ semaphore cap         └──────────────── one reply line ◄─────────┘
//! ```
//!
//! Each accepted socket gets its own tokio task running a
//! read → dispatch → write loop.  A transport error ends that task only.
//!
//! # EARLY LECTURES contract
//! The shift job is detached onto the blocking pool and the client gets
//! [`SHIFT_ACK`] straight away.  The job's outcome is **never** written back
//! to the requesting client; it only appears in the log.  Callers that need
//! the outcome use [`ScheduleEngine::spawn_early_lectures`] directly.

pub mod protocol;

use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::engine::ScheduleEngine;
use protocol::{Action, Request, SHIFT_ACK, TERMINATE};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure that ends a single connection (`communication-fault`).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("client communication error: {0}")]
    Communication(#[from] std::io::Error),
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// What the connection loop should do after a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write the line and keep reading.
    Line(String),
    /// Write the line and close the connection.
    Close(String),
}

/// Turns one request line into a reply, running the engine operation.
///
/// `EARLY LECTURES` is started in the background and answered with
/// [`SHIFT_ACK`] before it completes; everything else is synchronous.
pub fn dispatch(engine: &Arc<ScheduleEngine>, peer: &str, line: &str) -> Reply {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => {
            debug!(peer, kind = e.kind(), "rejected request");
            return Reply::Line(e.to_string());
        }
    };

    let (action, day, time, room, module) = match request {
        Request::Stop => return Reply::Close(TERMINATE.to_string()),
        Request::Command {
            action,
            day,
            time,
            room,
            module,
        } => (action, day, time, room, module),
    };

    let reply = match action {
        Action::AddLecture => match engine.add_lecture(&day, &time, &room, &module) {
            Ok(ok) => ok.to_string(),
            Err(e) => {
                debug!(peer, kind = e.kind(), "add rejected");
                e.to_string()
            }
        },
        Action::RemoveLecture => match engine.remove_lecture(&day, &time) {
            Ok(ok) => ok.to_string(),
            Err(e) => {
                debug!(peer, kind = e.kind(), "remove rejected");
                e.to_string()
            }
        },
        Action::DisplaySchedule => engine.display_schedule().to_string(),
        Action::EarlyLectures => {
            start_early_lectures(engine, peer);
            SHIFT_ACK.to_string()
        }
    };
    Reply::Line(reply)
}

/// Detaches a shift run; progress goes to the log only.
fn start_early_lectures(engine: &Arc<ScheduleEngine>, peer: &str) {
    let handle = engine.spawn_early_lectures();
    let peer = peer.to_string();
    info!(peer = %peer, "EARLY LECTURES task started");

    tokio::spawn(async move {
        match handle.await {
            Ok(outcome) => info!(
                peer = %peer,
                changed = outcome.changed,
                days = outcome.days,
                "Finished EARLY LECTURES task: {outcome}"
            ),
            Err(e) => error!(peer = %peer, "EARLY LECTURES task failed: {e}"),
        }
    });
}

// ── Connection loop ───────────────────────────────────────────────────────────

/// Strips the `\n` / `\r\n` terminator and decodes the rest.
///
/// Invalid UTF-8 is replaced rather than rejected; such a line is a bad
/// request, not a transport fault.
fn decode_line(raw: &[u8]) -> std::borrow::Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

/// Serves one client until EOF, `STOP`, or a transport error.
///
/// Generic over the stream so tests can drive it with `tokio::io::duplex`.
pub async fn handle_connection<S>(
    stream: S,
    peer: &str,
    engine: Arc<ScheduleEngine>,
) -> Result<(), GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = decode_line(&buf);
        debug!(peer, request = %line, "client request");

        let (text, close) = match dispatch(&engine, peer, &line) {
            Reply::Line(text) => (text, false),
            Reply::Close(text) => (text, true),
        };

        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        if close {
            debug!(peer, "client sent STOP");
            break;
        }
    }

    writer.shutdown().await?;
    Ok(())
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Accept loop.  Runs until the listener task is dropped or aborted.
///
/// At most `max_connections` clients are served at once; further clients
/// wait in the kernel backlog until a slot frees up.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<ScheduleEngine>,
    max_connections: usize,
) -> Result<()> {
    let local = listener
        .local_addr()
        .context("Listener has no local address")?;
    let slots = Arc::new(Semaphore::new(max_connections.max(1)));

    info!(addr = %local, max_connections, "Server started. Waiting for clients...");

    loop {
        let permit = Arc::clone(&slots)
            .acquire_owned()
            .await
            .context("connection semaphore closed")?;

        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let peer = addr.to_string();
            info!(peer = %peer, "Client connected");

            match handle_connection(socket, &peer, engine).await {
                Ok(()) => info!(peer = %peer, "Client disconnected"),
                Err(e) => warn!(peer = %peer, "{e}"),
            }
            drop(permit);
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShiftConfig;
    use crate::lecture::GRID_SIZE;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};
    use std::time::Duration;
    use tokio::io::{DuplexStream, ReadBuf};
    use tokio::net::TcpStream;

    fn engine() -> Arc<ScheduleEngine> {
        Arc::new(
            ScheduleEngine::new(&ShiftConfig {
                workers: 2,
                sequential_threshold: 3,
            })
            .unwrap(),
        )
    }

    /// Sends `requests` over an in-memory stream and collects every reply.
    async fn converse(engine: Arc<ScheduleEngine>, requests: &[&str]) -> Vec<String> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(async move { handle_connection(server, "test", engine).await });

        let (reader, mut writer) = tokio::io::split(client);
        let mut replies = BufReader::new(reader).lines();
        let mut out = Vec::new();
        for req in requests {
            writer.write_all(format!("{req}\n").as_bytes()).await.unwrap();
            out.push(replies.next_line().await.unwrap().unwrap());
        }
        drop(writer);
        drop(replies);
        let _ = task.await.unwrap();
        out
    }

    // ── dispatch ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn scenario_add_conflict_remove() {
        let replies = converse(
            engine(),
            &[
                "ADD LECTURE|Monday|10:00|R101|CS101",
                "ADD LECTURE|Monday|10:00|R102|CS102",
                "REMOVE LECTURE|Monday|10:00||",
            ],
        )
        .await;

        assert_eq!(
            replies,
            vec![
                "Lecture scheduled: CS101 on Monday at 10:00 in room R101",
                "ERROR: Time slot already booked.",
                "Lecture removed and module 'CS101' removed from system.",
            ]
        );
    }

    #[tokio::test]
    async fn errors_keep_the_connection_open() {
        let replies = converse(
            engine(),
            &[
                "ADD LECTURE|Monday|10:00",
                "PLAN LECTURE|Monday|10:00|R1|CS1",
                "ADD LECTURE|Monday|10:15|R1|CS1",
                "REMOVE LECTURE|Monday|10:00||",
                "DISPLAY SCHEDULE||||",
            ],
        )
        .await;

        assert_eq!(replies[0], "ERROR: Invalid request format.");
        assert_eq!(replies[1], "Invalid action: PLAN LECTURE");
        assert_eq!(
            replies[2],
            "ERROR: Lectures must be on the hour (e.g., 14:00) in 24-hour format."
        );
        assert_eq!(replies[3], "ERROR: No lecture found at the specified time.");
        assert_eq!(replies[4], "No lectures scheduled.");
    }

    #[tokio::test]
    async fn display_is_a_single_line_of_45_entries() {
        let replies = converse(
            engine(),
            &[
                "add lecture|Tuesday|09:00|R1|CS101",
                "display schedule|x|x|x|x",
            ],
        )
        .await;

        let entries: Vec<&str> = replies[1].split(';').collect();
        assert_eq!(entries.len(), GRID_SIZE);
        assert_eq!(
            entries[9],
            "Module: CS101 | Day: Tuesday | Time: 09:00 | Room: R1"
        );
    }

    #[tokio::test]
    async fn stop_replies_terminate_and_closes() {
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move { handle_connection(server, "test", engine()).await });

        let (reader, mut writer) = tokio::io::split(client);
        let mut lines = BufReader::new(reader).lines();
        writer.write_all(b"stop\r\n").await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("TERMINATE"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn early_lectures_acks_before_result_and_still_runs() {
        let engine = engine();
        engine.add_lecture("Friday", "15:00", "R1", "CS101").unwrap();

        let replies = converse(Arc::clone(&engine), &["EARLY LECTURES||||"]).await;
        assert_eq!(replies, vec![SHIFT_ACK]);

        // The detached job finishes on its own.
        for _ in 0..100 {
            if engine.lecture_at("Friday", "09:00").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.lecture_at("Friday", "09:00").is_some());
        assert!(engine.lecture_at("Friday", "15:00").is_none());
    }

    // ── TCP ───────────────────────────────────────────────────────────────────

    async fn start_server(engine: Arc<ScheduleEngine>, cap: usize) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, engine, cap));
        addr
    }

    async fn request(addr: std::net::SocketAddr, line: &str) -> String {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        writer.write_all(format!("{line}\nSTOP\n").as_bytes()).await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("TERMINATE"));
        reply
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_clients_race_for_one_slot() {
        let engine = engine();
        let addr = start_server(Arc::clone(&engine), 64).await;

        let clients: Vec<_> = (0..24)
            .map(|i| {
                tokio::spawn(async move {
                    request(addr, &format!("ADD LECTURE|Wednesday|12:00|R{i}|CS101")).await
                })
            })
            .collect();

        let mut wins = 0;
        for c in clients {
            let reply = c.await.unwrap();
            if reply.starts_with("Lecture scheduled:") {
                wins += 1;
            } else {
                assert_eq!(reply, "ERROR: Time slot already booked.");
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(engine.lecture_count(), 1);
    }

    #[tokio::test]
    async fn connection_cap_queues_extra_clients() {
        let engine = engine();
        let addr = start_server(engine, 1).await;

        // First client holds the only slot.
        let first = TcpStream::connect(addr).await.unwrap();

        let waiting = tokio::spawn(request(addr, "DISPLAY SCHEDULE||||"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        drop(first);
        let reply = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "No lectures scheduled.");
    }

    #[tokio::test]
    async fn one_client_dropping_does_not_affect_another() {
        let engine = engine();
        let addr = start_server(engine, 8).await;

        let rude = TcpStream::connect(addr).await.unwrap();
        drop(rude);

        assert_eq!(
            request(addr, "ADD LECTURE|Monday|09:00|R1|CS1").await,
            "Lecture scheduled: CS1 on Monday at 09:00 in room R1"
        );
    }

    // ── transport faults ──────────────────────────────────────────────────────

    /// Reads normally, fails every write as if the peer reset the socket.
    struct ResetOnWrite {
        inner: DuplexStream,
    }

    impl AsyncRead for ResetOnWrite {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut TaskContext<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for ResetOnWrite {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn non_utf8_line_is_answered_and_session_continues() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(async move { handle_connection(server, "test", engine()).await });

        let (reader, mut writer) = tokio::io::split(client);
        let mut replies = BufReader::new(reader).lines();

        writer
            .write_all(b"ADD LECTURE|Monday|10:00|Salle \xe9|CS1\n")
            .await
            .unwrap();
        assert_eq!(
            replies.next_line().await.unwrap().as_deref(),
            Some("Lecture scheduled: CS1 on Monday at 10:00 in room Salle \u{FFFD}")
        );

        writer.write_all(b"\xff\xfe\r\n").await.unwrap();
        assert_eq!(
            replies.next_line().await.unwrap().as_deref(),
            Some("ERROR: Invalid request format.")
        );

        writer.write_all(b"DISPLAY SCHEDULE||||\n").await.unwrap();
        let grid = replies.next_line().await.unwrap().unwrap();
        assert_eq!(grid.split(';').count(), GRID_SIZE);

        writer.write_all(b"STOP\n").await.unwrap();
        assert_eq!(replies.next_line().await.unwrap().as_deref(), Some("TERMINATE"));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn write_fault_ends_only_the_faulty_session() {
        let engine = engine();

        let (mut client, server) = tokio::io::duplex(1024);
        let faulty = tokio::spawn(handle_connection(
            ResetOnWrite { inner: server },
            "faulty",
            Arc::clone(&engine),
        ));
        let healthy = tokio::spawn(converse(
            Arc::clone(&engine),
            &["ADD LECTURE|Tuesday|09:00|R2|CS2", "REMOVE LECTURE|Tuesday|09:00||"],
        ));

        client
            .write_all(b"ADD LECTURE|Monday|09:00|R1|CS1\n")
            .await
            .unwrap();
        let result = faulty.await.unwrap();
        assert!(matches!(result, Err(GatewayError::Communication(ref e))
            if e.kind() == io::ErrorKind::ConnectionReset));

        assert_eq!(
            healthy.await.unwrap(),
            vec![
                "Lecture scheduled: CS2 on Tuesday at 09:00 in room R2",
                "Lecture removed and module 'CS2' removed from system.",
            ]
        );

        // The request was applied before the reply failed; later clients see it.
        assert_eq!(
            converse(engine, &["REMOVE LECTURE|Monday|09:00||"]).await,
            vec!["Lecture removed and module 'CS1' removed from system."]
        );
    }
}
