//! Echo relay: connects to a relay endpoint and answers `echo` and `help`.
//!
//! Run with:
//!   BOT_CLIENT_HOST=127.0.0.1 BOT_CLIENT_PORT=7000 \
//!     cargo run --example echo-relay --features peer
//!
//! Anything listening on the endpoint can then send `*2\n$4\necho\n$2\nhi\n`
//! and read the same frame back.

use portrelay::frame::Command;
use portrelay::peer::{handler_fn, PeerConfig, Relay, RelayPeer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let peer = RelayPeer::new(PeerConfig::default());

    peer.register_handler(
        "echo",
        handler_fn(|command: Command, relay: Relay| async move {
            if let Err(err) = relay.send(command).await {
                eprintln!("echo failed: {err}");
            }
        })
        .with_help("Sends the command back unchanged"),
    );

    let registry = peer.handlers().clone();
    peer.register_handler(
        "help",
        handler_fn(move |_: Command, relay: Relay| {
            let entries = registry.help_entries();
            async move {
                let lines = entries
                    .into_iter()
                    .map(|(name, help)| format!("{name}: {help}"));
                let _ = relay.send(Command::with_args("help", lines)).await;
            }
        })
        .with_help("Lists available commands"),
    );

    peer.on_unhandled(handler_fn(|command: Command, _: Relay| async move {
        eprintln!("no handler for {}", command.name());
    }));

    peer.start_with_retry("", "", 5).await?;
    eprintln!("connected; waiting for commands");

    peer.wait_for_disconnect().await?;
    eprintln!("remote closed the connection");
    peer.close().await;
    Ok(())
}
