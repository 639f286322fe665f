//! WebSocket wire protocol and connection loop.
//!
//! A tagged `ClientMessage` / `ServerMessage` pair (`#[serde(tag = "type")]`)
//! and a `handle_socket` loop built on `tokio::select!` over the split
//! socket stream and the engine's broadcast/targeted event channels.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::fanout::{PlayerEvent, SessionEvent};
use crate::engine::types::{OrderId, OrderType, ParticipantId, Side};
use crate::engine::EngineHandle;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession,
    Join { name: String },
    Leave,
    Start,
    SubmitOrder {
        product: String,
        side: Side,
        order_type: OrderType,
        qty: u64,
        #[serde(default)]
        price: Option<i64>,
    },
    CancelOrder { order_id: OrderId },
    Reset,
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack { command: String },
    Joined { participant_id: ParticipantId },
    Error { code: String, message: String },
    SessionEvent(SessionEvent),
    PlayerEvent(PlayerEvent),
    Pong,
}

impl ServerMessage {
    fn to_text(&self) -> Message {
        Message::Text(serde_json::to_string(self).expect("ServerMessage always serializes"))
    }
}

pub async fn handle_socket(socket: WebSocket, engine: EngineHandle) {
    let (mut sender, mut receiver) = socket.split();
    let mut broadcast_rx = engine.subscribe_broadcast();
    let mut player_rx: Option<tokio::sync::mpsc::UnboundedReceiver<PlayerEvent>> = None;
    let mut participant_id: Option<ParticipantId> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_text(&text, &engine, &mut sender, &mut player_rx, &mut participant_id).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(?err, "websocket error, closing connection");
                        break;
                    }
                    _ => {}
                }
            }

            event = broadcast_rx.recv() => {
                match event {
                    Ok(event) => {
                        let _ = sender.send(ServerMessage::SessionEvent(event).to_text()).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "websocket lagged behind session broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            event = recv_player_event(&mut player_rx), if player_rx.is_some() => {
                if let Some(event) = event {
                    let _ = sender.send(ServerMessage::PlayerEvent(event).to_text()).await;
                }
            }
        }
    }

    if let Some(pid) = participant_id {
        debug!(participant_id = %pid, "websocket closed, sweeping open orders");
        engine.disconnect(pid);
    }
}

async fn recv_player_event(rx: &mut Option<tokio::sync::mpsc::UnboundedReceiver<PlayerEvent>>) -> Option<PlayerEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_client_text(
    text: &str,
    engine: &EngineHandle,
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    player_rx: &mut Option<tokio::sync::mpsc::UnboundedReceiver<PlayerEvent>>,
    participant_id: &mut Option<ParticipantId>,
) {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    let message = match parsed {
        Ok(m) => m,
        Err(err) => {
            let _ = sender
                .send(ServerMessage::Error { code: "bad_request".into(), message: err.to_string() }.to_text())
                .await;
            return;
        }
    };

    let reply = match message {
        ClientMessage::Ping => {
            let _ = sender.send(ServerMessage::Pong.to_text()).await;
            return;
        }
        ClientMessage::CreateSession => engine.create_session().await.map(|_| ServerMessage::Ack {
            command: "create_session".into(),
        }),
        ClientMessage::Join { name } => match engine.join(name).await {
            Ok(participant) => {
                *participant_id = Some(participant.id);
                *player_rx = Some(engine.register_participant(participant.id));
                Ok(ServerMessage::Joined { participant_id: participant.id })
            }
            Err(err) => Err(err),
        },
        ClientMessage::Leave => {
            let Some(pid) = *participant_id else {
                let _ = sender.send(not_joined()).await;
                return;
            };
            engine.leave(pid).await.map(|_| ServerMessage::Ack { command: "leave".into() })
        }
        ClientMessage::Start => {
            let Some(pid) = *participant_id else {
                let _ = sender.send(not_joined()).await;
                return;
            };
            engine.start(pid).await.map(|_| ServerMessage::Ack { command: "start".into() })
        }
        ClientMessage::SubmitOrder { product, side, order_type, qty, price } => {
            let Some(pid) = *participant_id else {
                let _ = sender.send(not_joined()).await;
                return;
            };
            engine
                .submit_order(pid, product, side, order_type, qty, price)
                .await
                .map(|_| ServerMessage::Ack { command: "submit_order".into() })
        }
        ClientMessage::CancelOrder { order_id } => {
            let Some(pid) = *participant_id else {
                let _ = sender.send(not_joined()).await;
                return;
            };
            engine.cancel_order(pid, order_id).await.map(|_| ServerMessage::Ack { command: "cancel_order".into() })
        }
        ClientMessage::Reset => engine.reset().await.map(|_| ServerMessage::Ack { command: "reset".into() }),
    };

    let outgoing = match reply {
        Ok(msg) => msg,
        Err(err) => ServerMessage::Error { code: err.code().to_string(), message: err.to_string() },
    };
    let _ = sender.send(outgoing.to_text()).await;
}

fn not_joined() -> Message {
    ServerMessage::Error { code: "no_session".into(), message: "join a session before sending this command".into() }.to_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_parses_submit_order() {
        let json = r#"{"type":"submit_order","product":"bread","side":"buy","order_type":"limit","qty":5,"price":3}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SubmitOrder { product, side, order_type, qty, price } => {
                assert_eq!(product, "bread");
                assert_eq!(side, Side::Buy);
                assert_eq!(order_type, OrderType::Limit);
                assert_eq!(qty, 5);
                assert_eq!(price, Some(3));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn client_message_parses_join() {
        let json = r#"{"type":"join","name":"alice"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Join { name } if name == "alice"));
    }
}
