//! Line-oriented terminal client.
//!
//! Demonstrates:
//! - Building a descriptor for a TCP, TLS or WebSocket target
//! - Subscribing with a closure observer
//! - Piping stdin lines into `send`, EOF into `close_send_channel`
//! - Stopping on Ctrl+C
//!
//! Usage:
//!   cargo run --example connect -- example.com 80
//!   cargo run --example connect -- example.com 443 --tls
//!   cargo run --example connect -- self-signed.local 8443 --tls --insecure
//!   cargo run --example connect -- --ws wss://echo.websocket.org/
//!   cargo run --example connect -- localhost 7 --encoding windows-1252 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

use common::Args;
use duplex_session::{ConnectionDescriptor, DescriptorBuilder, Error, FnObserver, Result, TransportSession};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let descriptor = descriptor_from(&args)?.build()?;
    println!("[*] {descriptor}");

    let finished = Arc::new(Notify::new());
    let signal = Arc::clone(&finished);
    let observer = FnObserver::new(
        |n| {
            let marker = if n.is_status {
                "[*]"
            } else if n.is_echo {
                "[>]"
            } else {
                "[<]"
            };
            println!("{marker} {}", n.text.trim_end_matches(['\r', '\n']));
        },
        move || signal.notify_one(),
    );

    let session = TransportSession::with_observer(descriptor, Arc::new(observer));
    session.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("[*] Ctrl+C, stopping");
                break;
            }
            _ = finished.notified() => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = session.send(format!("{line}\n")) {
                        println!("[!] {e}");
                    }
                }
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    match session.close_send_channel() {
                        Ok(()) | Err(Error::SendChannelClosed) => {}
                        Err(e) => println!("[!] {e}"),
                    }
                }
            },
        }
    }

    session.stop().await;
    Ok(())
}

/// Builds a descriptor from `--ws URI` or `HOST PORT`.
fn descriptor_from(args: &Args) -> Result<DescriptorBuilder> {
    let mut builder = match (&args.ws, args.positional.as_slice()) {
        (Some(uri), []) => ConnectionDescriptor::websocket(uri.as_str()),
        (None, [host, port]) => {
            let port = port
                .parse()
                .map_err(|_| Error::config(format!("invalid port: {port}")))?;
            ConnectionDescriptor::stream(host.as_str(), port).tls(args.tls)
        }
        _ => {
            return Err(Error::config(
                "usage: connect [--tls] [--insecure] [--encoding NAME] [--debug] (HOST PORT | --ws URI)",
            ));
        }
    };

    if args.insecure {
        builder = builder.ignore_certificate_errors(true);
    }
    if let Some(encoding) = &args.encoding {
        builder = builder.encoding(encoding.as_str());
    }
    Ok(builder)
}
