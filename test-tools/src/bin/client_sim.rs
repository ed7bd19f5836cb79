/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Manual protocol client for lecture-sched.
//!
//! ```text
//! client-sim send "ADD LECTURE|Monday|10:00|R101|CS101" "DISPLAY SCHEDULE||||"
//! echo "EARLY LECTURES||||" | client-sim send
//! client-sim race --clients 50 --day Monday --time 11:00
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use lecture_sched::config::DEFAULT_PORT;
use lecture_sched::gateway::protocol::{Action, Request, TERMINATE};

#[derive(Debug, Parser)]
#[command(name = "client-sim", about = "lecture-sched protocol client (testing only)")]
struct Cli {
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Send request lines (arguments, or stdin when none) and print replies.
    Send { lines: Vec<String> },

    /// Open N connections that all try to book the same slot.
    Race {
        #[arg(short = 'n', long, default_value_t = 20)]
        clients: usize,
        #[arg(long, default_value = "Monday")]
        day: String,
        #[arg(long, default_value = "09:00")]
        time: String,
        #[arg(long, default_value = "RACE")]
        module: String,
    },
}

/// One request/reply exchange followed by the STOP handshake.
struct Session {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Session {
    async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Unable to connect to {addr}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn exchange(&mut self, line: &str) -> Result<String> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        match self.lines.next_line().await? {
            Some(reply) => Ok(reply),
            None => bail!("server closed the connection"),
        }
    }

    async fn stop(mut self) -> Result<()> {
        let reply = self.exchange(&Request::Stop.to_line()).await?;
        if reply != TERMINATE {
            warn!(reply = %reply, "unexpected reply to STOP");
        }
        Ok(())
    }
}

async fn run_send(addr: &str, mut lines: Vec<String>) -> Result<()> {
    if lines.is_empty() {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = stdin.next_line().await? {
            lines.push(line);
        }
    }

    let mut session = Session::connect(addr).await?;
    for line in &lines {
        let reply = session.exchange(line).await?;
        if line.to_uppercase().starts_with("DISPLAY SCHEDULE") {
            for cell in reply.split(';') {
                println!("{cell}");
            }
        } else {
            println!("{reply}");
        }
    }
    session.stop().await
}

async fn run_race(addr: &str, clients: usize, day: &str, time: &str, module: &str) -> Result<()> {
    let mut tasks = Vec::with_capacity(clients);
    for i in 0..clients {
        let addr = addr.to_string();
        let room = format!("R{i}");
        let line = Request::command(Action::AddLecture, day, time, &room, module).to_line();
        tasks.push(tokio::spawn(async move {
            let mut session = Session::connect(&addr).await?;
            let reply = session.exchange(&line).await?;
            session.stop().await?;
            anyhow::Ok(reply)
        }));
    }

    let mut wins = 0usize;
    let mut failures = 0usize;
    for task in tasks {
        match task.await? {
            Ok(reply) if reply.starts_with("Lecture scheduled:") => wins += 1,
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                warn!("client failed: {e:#}");
            }
        }
    }

    info!(clients, wins, failures, "race finished");
    println!("{wins} of {clients} clients booked {day} {time}");
    if wins > 1 {
        bail!("slot double-booked ({wins} winners)");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);

    match cli.mode {
        Mode::Send { lines } => run_send(&addr, lines).await,
        Mode::Race {
            clients,
            day,
            time,
            module,
        } => run_race(&addr, clients, &day, &time, &module).await,
    }
}
