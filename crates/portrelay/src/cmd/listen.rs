use portrelay_frame::Command as RelayCommand;
use portrelay_peer::{handler_fn, Relay};
use tokio::sync::mpsc;
use tracing::info;

use crate::cmd::{runtime, ListenArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_command, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    runtime()?.block_on(listen(args, format))
}

async fn listen(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let peer = args.connect.build_peer()?;
    let (tx, mut inbound) = mpsc::unbounded_channel();
    peer.on_unhandled(handler_fn(move |command: RelayCommand, _: Relay| {
        let _ = tx.send(command);
        async {}
    }));

    args.connect.start(&peer).await?;

    let source = args.connect.describe();
    let mut printed = 0usize;
    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            next = inbound.recv() => {
                let Some(command) = next else { break };
                print_command(&command, &source, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            _ = peer.wait_for_disconnect() => {
                // Print whatever was dispatched before the connection ended.
                while let Ok(command) = inbound.try_recv() {
                    print_command(&command, &source, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break;
                    }
                }
                info!(received = printed, "remote endpoint disconnected");
                break;
            }
        }
    }

    peer.close().await;
    Ok(SUCCESS)
}
