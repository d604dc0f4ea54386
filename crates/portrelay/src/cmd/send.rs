use std::time::Duration;

use portrelay_frame::Command as RelayCommand;
use portrelay_peer::{handler_fn, Relay};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cmd::{parse_duration, runtime, SendArgs};
use crate::exit::{peer_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_command, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    runtime()?.block_on(send(args, wait_timeout, format))
}

async fn send(args: SendArgs, wait_timeout: Duration, format: OutputFormat) -> CliResult<i32> {
    let peer = args.connect.build_peer()?;

    // Registered before connecting so a fast reply is not dropped.
    let (tx, mut replies) = mpsc::unbounded_channel();
    if args.wait {
        peer.on_unhandled(handler_fn(move |command: RelayCommand, _: Relay| {
            let _ = tx.send(command);
            async {}
        }));
    }

    args.connect.start(&peer).await?;

    let command = RelayCommand::with_args(args.name, args.args);
    debug!(command = command.name(), "sending command");
    let sent = async {
        peer.send_message(command).await?;
        peer.flush().await
    }
    .await;
    if let Err(err) = sent {
        peer.close().await;
        return Err(peer_error("send failed", err));
    }

    let result = if args.wait {
        wait_for_reply(&mut replies, wait_timeout)
            .await
            .map(|reply| print_command(&reply, &args.connect.describe(), format))
    } else {
        Ok(())
    };

    peer.close().await;
    result.map(|()| SUCCESS)
}

async fn wait_for_reply(
    replies: &mut mpsc::UnboundedReceiver<RelayCommand>,
    wait_timeout: Duration,
) -> CliResult<RelayCommand> {
    match tokio::time::timeout(wait_timeout, replies.recv()).await {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(CliError::new(
            FAILURE,
            "connection closed before a reply arrived",
        )),
        Err(_) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {wait_timeout:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wait_for_reply_times_out() {
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let err = wait_for_reply(&mut rx, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    #[tokio::test]
    async fn wait_for_reply_returns_first_command() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(RelayCommand::with_args("pong", ["1"])).unwrap();
        tx.send(RelayCommand::new("later")).unwrap();
        let reply = wait_for_reply(&mut rx, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.name(), "pong");
    }

    #[tokio::test]
    async fn wait_for_reply_reports_closed_connection() {
        let (tx, mut rx) = mpsc::unbounded_channel::<RelayCommand>();
        drop(tx);
        let err = wait_for_reply(&mut rx, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, FAILURE);
    }
}
