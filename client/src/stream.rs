use std::time::Duration;

use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc},
};
use tokio_tungstenite::{tungstenite, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::*;

use shared::interaction::{parse_server_message, Challenge, Command, ServerMessage};

const RECONNECT_DELAY: Duration = Duration::from_secs(10);

type StreamWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Keep a websocket to the challenge server open.
///
/// Commands sent on the returned sender are written to the server, decoded
/// challenges arrive on the returned receiver. The receiver closes when the
/// connection cannot be re-established within `max_retry` attempts or on
/// shutdown.
pub fn new_subscribe(
    url: String,
    max_retry: u32,
    mut notify_shutdown: broadcast::Receiver<()>,
) -> (mpsc::Sender<Command>, mpsc::Receiver<Challenge>) {
    let (reader_tx, reader_rx) = mpsc::channel(100);
    let (writer_tx, mut writer_rx) = mpsc::channel(100);

    tokio::spawn(async move {
        let mut retry = Retry::new(max_retry);
        'main: loop {
            let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, _)) => stream,
                Err(err) => {
                    error!("fail to connect to server: {err:#}");
                    if !retry.failed() {
                        error!("giving up after {} attempts", retry.attempts);
                        break 'main;
                    }
                    info!("retry...({}/{max_retry})", retry.attempts);
                    tokio::select! {
                        _ = notify_shutdown.recv() => break 'main,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                    continue;
                }
            };

            info!("ws connect to the server: {url}");

            let (mut write, mut read) = stream.split();

            match send_command(&mut write, &Command::GetCurrentChallenge {}).await {
                Err(err) => {
                    // the session died before it was usable, same as a failed connect
                    error!("{err:#}");
                    if !retry.failed() {
                        error!("giving up after {} attempts", retry.attempts);
                        break 'main;
                    }
                }
                Ok(()) => {
                    retry.reset();
                    loop {
                        if let Err(err) = tokio::select! {
                            _ = notify_shutdown.recv() => break 'main,
                            res = writer_rx.recv() => stream_write(res, &mut write).await,
                            res = read.next() => stream_read(res, &reader_tx, &mut write).await,
                        } {
                            // before shutdown signal, this should never happen.
                            if writer_rx.is_closed() || reader_tx.is_closed() {
                                error!("unrecoverable error: {err:#}");
                                break 'main;
                            }
                            error!("{err:#}");
                            break;
                        }
                    }
                }
            }

            error!("server disconnected, retries in {} seconds", RECONNECT_DELAY.as_secs());
            tokio::select! {
                _ = notify_shutdown.recv() => break 'main,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
        debug!("[stream] async thread shutdown");
    });

    (writer_tx, reader_rx)
}

/// Failed attempts since the last session that got its challenge request out.
struct Retry {
    attempts: u32,
    max_retry: u32,
}

impl Retry {
    fn new(max_retry: u32) -> Self {
        Self { attempts: 0, max_retry }
    }

    /// Count a failed attempt. Returns `false` once the budget is spent.
    fn failed(&mut self) -> bool {
        self.attempts += 1;
        self.attempts < self.max_retry
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }
}

async fn send_command(ws_tx: &mut StreamWriter, command: &Command) -> anyhow::Result<()> {
    let text = command.to_json()?;
    debug!("sending: {text}");
    ws_tx
        .send(Message::Text(text))
        .await
        .map_err(|err| anyhow::anyhow!("ws disconnection: {err:?}"))
}

/// receive the command and send to server
async fn stream_write(data: Option<Command>, ws_tx: &mut StreamWriter) -> anyhow::Result<()> {
    match data {
        None => anyhow::bail!("command channel closed"),
        Some(command) => send_command(ws_tx, &command).await,
    }
}

/// read data from stream and forward challenges to the miner
async fn stream_read(
    data: Option<Result<Message, tungstenite::Error>>,
    tx: &mpsc::Sender<Challenge>,
    ws_tx: &mut StreamWriter,
) -> anyhow::Result<()> {
    match data {
        None => anyhow::bail!("ws disconnection"),
        Some(Err(err)) => anyhow::bail!(err.to_string()),
        Some(Ok(message)) => {
            match message {
                Message::Text(text) => {
                    match parse_server_message(&text) {
                        Ok(ServerMessage::Challenge(challenge)) => {
                            if tx.send(challenge).await.is_err() {
                                anyhow::bail!("challenge channel closed")
                            }
                        }
                        Ok(ServerMessage::Other(value)) => info!("server message: {value}"),
                        Err(err) => warn!("fail to decode server message: {err}, message: {text}"),
                    }
                }
                Message::Ping(ping) => {
                    debug!("ping arrived");
                    ws_tx
                        .send(Message::Pong(ping))
                        .await
                        .map_err(|err| anyhow::anyhow!("fail to send pong: {err:?}"))?;
                }
                Message::Close(frame) => anyhow::bail!("server closed connection: {frame:?}"),
                _ => {}
            }
        }
    }
    Ok(())
}
