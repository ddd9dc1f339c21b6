// ============================================================================
// tcpinfo - Demo Entry Point
// ============================================================================
//
// Opens a loopback listener (and, by default, a connected client/server
// pair), fetches a TCP_INFO snapshot for every socket and prints them as a
// JSON report.
//
// Usage:
//   tcpinfo [bind_addr] [--strict] [--no-client] [--compact]
//
//   bind_addr    Listener address (default 127.0.0.1:0, ephemeral port)
//   --strict     Fail on tcp_info length mismatch instead of partial output
//   --no-client  Only report the listening socket
//   --compact    Single-line JSON
//
// Environment:
//   RUST_LOG                 env_logger filter (default: warn)
//   TCPINFO_STRICT_LAYOUT=1  Same as --strict
//
// Architecture:
// - Main thread: set up sockets, keep them alive until all fetches finish
// - Worker threads: one fetch per socket (thread pool), results over a channel
//
// ============================================================================

use std::env;
use std::error::Error;
use std::net::{TcpListener, TcpStream};
use std::os::fd::RawFd;
use std::process;
use std::sync::mpsc;

use log::{error, info};
use serde::Serialize;
use threadpool::ThreadPool;

use tcpinfo::{
    DemoConfig, FetchOptions, LayoutMismatch, MismatchPolicy, TcpInfoSnapshot,
    fetch_tcp_info_with, resolve,
};

// ============================================================================
// REPORT STRUCTURES
// ============================================================================

/// Snapshot (or failure) for one demo socket
#[derive(Debug, Serialize)]
struct SocketReport {
    role: &'static str,
    descriptor: RawFd,
    #[serde(skip_serializing_if = "Option::is_none")]
    partial: Option<LayoutMismatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tcp_info: Option<TcpInfoSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Complete demo output
#[derive(Debug, Serialize)]
struct DemoReport {
    port: u16,
    mismatch_policy: MismatchPolicy,
    sockets: Vec<SocketReport>,
}

// ============================================================================
// FETCHING
// ============================================================================

/// Fetch every socket in parallel, results in input order
///
/// The sockets behind `targets` must stay open until this returns; the
/// caller owns them and only descriptors cross into the workers.
fn fetch_all(targets: &[(&'static str, RawFd)], options: FetchOptions) -> Vec<SocketReport> {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4);
    let thread_count = cpu_count.clamp(1, targets.len().max(1));
    let pool = ThreadPool::new(thread_count);
    let (tx, rx) = mpsc::channel();

    for (index, &(role, fd)) in targets.iter().enumerate() {
        let tx = tx.clone();
        pool.execute(move || {
            let result = fetch_tcp_info_with(fd, &options);
            // Receiver outlives the pool; a failed send means main is gone
            let _ = tx.send((index, role, fd, result));
        });
    }
    drop(tx);
    pool.join();

    let mut reports: Vec<(usize, SocketReport)> = rx
        .iter()
        .map(|(index, role, descriptor, result)| {
            let report = match result {
                Ok(snapshot) => SocketReport {
                    role,
                    descriptor,
                    partial: snapshot.mismatch(),
                    tcp_info: Some(snapshot),
                    error: None,
                },
                Err(e) => {
                    error!("{role} (fd {descriptor}): {e}");
                    SocketReport {
                        role,
                        descriptor,
                        partial: None,
                        tcp_info: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            (index, report)
        })
        .collect();

    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}

// ============================================================================
// MAIN
// ============================================================================

fn run(config: &DemoConfig) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(config.bind_addr)?;
    let local_addr = listener.local_addr()?;
    println!("Port is: {}", local_addr.port());

    let mut targets = vec![("listener", resolve(&listener)?)];

    // Keep both ends alive until every fetch is done
    let peers = if config.connect_client {
        let client = TcpStream::connect(local_addr)?;
        let (server, peer_addr) = listener.accept()?;
        info!("accepted loopback client from {peer_addr}");
        Some((client, server))
    } else {
        None
    };

    if let Some((client, server)) = &peers {
        targets.push(("client", resolve(client)?));
        targets.push(("server", resolve(server)?));
    }

    let sockets = fetch_all(&targets, config.fetch);
    let failures = sockets.iter().filter(|s| s.error.is_some()).count();

    let report = DemoReport {
        port: local_addr.port(),
        mismatch_policy: config.fetch.mismatch,
        sockets,
    };

    let json = if config.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");

    if failures > 0 {
        return Err(format!("{failures} of {} fetches failed", targets.len()).into());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let base = DemoConfig {
        fetch: FetchOptions::from_env(),
        ..DemoConfig::default()
    };

    let config = match DemoConfig::parse(env::args().skip(1), base) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            eprintln!("usage: tcpinfo [bind_addr] [--strict] [--no-client] [--compact]");
            process::exit(2);
        }
    };

    if let Err(e) = run(&config) {
        error!("{e}");
        process::exit(1);
    }
}
