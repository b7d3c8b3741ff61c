use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::protocol::{ClientEvent, ServerEvent};

use super::{EventSink, Link};

#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl EventSink for ChannelHandle {
    fn emit(&mut self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("channel task gone, event dropped");
        }
    }
}

pub struct Channel {
    pub handle: ChannelHandle,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
    pub link: watch::Receiver<Link>,
    pub task: JoinHandle<()>,
}

/// Spawns the transport task; it runs until every [`ChannelHandle`] is dropped.
/// Events emitted while the socket is down are dropped.
pub fn spawn(url: String, reconnect_delay: Duration) -> Channel {
    let (tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, events) = mpsc::unbounded_channel();
    let (state_tx, link) = watch::channel(Link::offline(0));

    let task = tokio::spawn(run(url, reconnect_delay, out_rx, in_tx, state_tx));

    Channel {
        handle: ChannelHandle { tx },
        events,
        link,
        task,
    }
}

enum Ended {
    Disconnected,
    Closed,
}

async fn run(
    url: String,
    reconnect_delay: Duration,
    mut out_rx: mpsc::UnboundedReceiver<ClientEvent>,
    in_tx: mpsc::UnboundedSender<ServerEvent>,
    state_tx: watch::Sender<Link>,
) {
    let mut epoch = 0;
    loop {
        // nothing buffered while disconnected is delivered later
        loop {
            match out_rx.try_recv() {
                Ok(event) => tracing::debug!(?event, "not connected, event dropped"),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => return,
            }
        }

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!(%url, "connected");
                epoch += 1;
                state_tx.send_replace(Link::online(epoch));
                let ended = pump(stream, &mut out_rx, &in_tx).await;
                state_tx.send_replace(Link::offline(epoch));
                if let Ended::Closed = ended {
                    return;
                }
                tracing::warn!(%url, "disconnected");
            }
            Err(err) => tracing::warn!(%url, %err, "connect failed"),
        }

        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn pump<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    out_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    in_tx: &mpsc::UnboundedSender<ServerEvent>,
) -> Ended
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sender, mut receiver) = stream.split();

    loop {
        tokio::select! {
            outgoing = out_rx.recv() => {
                let Some(event) = outgoing else {
                    let _ = sender.send(Message::Close(None)).await;
                    return Ended::Closed;
                };
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(%err, "failed to encode event");
                        continue;
                    }
                };
                if let Err(err) = sender.send(Message::Text(frame)).await {
                    tracing::warn!(%err, "send failed");
                    return Ended::Disconnected;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if in_tx.send(event).is_err() {
                                return Ended::Closed;
                            }
                        }
                        Err(err) => tracing::debug!(%err, "skipping malformed frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => return Ended::Disconnected,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(%err, "read failed");
                        return Ended::Disconnected;
                    }
                }
            }
        }
    }
}
