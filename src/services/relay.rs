//! The relay event loop. One task owns presence, busy state, call contexts and the call-log
//! dedup map; every event is handled to completion before the next one is taken.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::call_log::CallLogDeduplicator;
use super::delivery;
use super::presence::{ConnectionHandle, PresenceRegistry};
use super::signaling::{CallSignalingRelay, FinishedCall};
use super::typing::{relay_typing, TypingSignal};
use crate::error::{AppError, AppResult};
use crate::models::{ChatMessage, ClientEvent, ConnectionId, PresenceSnapshot};
use crate::repositories::{ConversationStore, UserStore};

/// Input to the event loop.
#[derive(Debug)]
pub enum RelayCommand {
    Connect {
        user_id: Option<Uuid>,
        handle: ConnectionHandle,
    },
    Disconnect {
        user_id: Option<Uuid>,
        conn_id: ConnectionId,
    },
    Client {
        user_id: Uuid,
        conn_id: ConnectionId,
        event: ClientEvent,
    },
    DeliverNew(ChatMessage),
    DeliverEdited(ChatMessage),
    DeliverCallLog(ChatMessage),
    Snapshot {
        reply: oneshot::Sender<PresenceSnapshot>,
    },
}

/// Cloneable sender side of the relay. Commands are processed in the order they are sent.
#[derive(Clone, Debug)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    fn send(&self, command: RelayCommand) -> AppResult<()> {
        self.tx.send(command).map_err(|_| AppError::RelayClosed)
    }

    pub fn connect(&self, user_id: Option<Uuid>, handle: ConnectionHandle) -> AppResult<()> {
        self.send(RelayCommand::Connect { user_id, handle })
    }

    pub fn disconnect(&self, user_id: Option<Uuid>, conn_id: ConnectionId) -> AppResult<()> {
        self.send(RelayCommand::Disconnect { user_id, conn_id })
    }

    pub fn client_event(&self, user_id: Uuid, conn_id: ConnectionId, event: ClientEvent) -> AppResult<()> {
        self.send(RelayCommand::Client {
            user_id,
            conn_id,
            event,
        })
    }

    pub fn deliver_new(&self, message: ChatMessage) -> AppResult<()> {
        self.send(RelayCommand::DeliverNew(message))
    }

    pub fn deliver_edited(&self, message: ChatMessage) -> AppResult<()> {
        self.send(RelayCommand::DeliverEdited(message))
    }

    pub fn deliver_call_log(&self, message: ChatMessage) -> AppResult<()> {
        self.send(RelayCommand::DeliverCallLog(message))
    }

    /// Online and busy sets after every command sent before this call.
    pub async fn snapshot(&self) -> AppResult<PresenceSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Snapshot { reply })?;
        rx.await.map_err(|_| AppError::RelayClosed)
    }
}

pub struct Relay {
    presence: PresenceRegistry,
    signaling: CallSignalingRelay,
    call_log: CallLogDeduplicator,
    rx: mpsc::UnboundedReceiver<RelayCommand>,
    // Weak so the loop stops once every external handle is dropped.
    weak_tx: mpsc::WeakUnboundedSender<RelayCommand>,
}

impl Relay {
    pub fn new(
        users: Arc<dyn UserStore>,
        conversations: Arc<dyn ConversationStore>,
        call_log_window: Duration,
    ) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = Self {
            presence: PresenceRegistry::new(),
            signaling: CallSignalingRelay::new(users),
            call_log: CallLogDeduplicator::new(call_log_window, conversations),
            rx,
            weak_tx: tx.downgrade(),
        };
        (relay, RelayHandle { tx })
    }

    /// Build the relay and run it on its own task.
    pub fn spawn(
        users: Arc<dyn UserStore>,
        conversations: Arc<dyn ConversationStore>,
        call_log_window: Duration,
    ) -> (RelayHandle, JoinHandle<()>) {
        let (relay, handle) = Self::new(users, conversations, call_log_window);
        (handle, tokio::spawn(relay.run()))
    }

    pub async fn run(mut self) {
        info!("relay started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
        }
        info!("relay stopped");
    }

    async fn handle(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Connect { user_id, handle } => self.on_connect(user_id, handle),
            RelayCommand::Disconnect { user_id, conn_id } => self.on_disconnect(user_id, &conn_id),
            RelayCommand::Client {
                user_id,
                conn_id,
                event,
            } => self.on_client_event(user_id, &conn_id, event).await,
            RelayCommand::DeliverNew(message) => {
                delivery::deliver_new(&self.presence, &message);
            }
            RelayCommand::DeliverEdited(message) => {
                delivery::deliver_edited(&self.presence, &message);
            }
            RelayCommand::DeliverCallLog(message) => {
                delivery::deliver_to_participants(&self.presence, &message);
            }
            RelayCommand::Snapshot { reply } => {
                let _ = reply.send(PresenceSnapshot {
                    online: self.presence.online_users(),
                    busy: self.signaling.busy().snapshot(),
                });
            }
        }
    }

    fn on_connect(&mut self, user_id: Option<Uuid>, handle: ConnectionHandle) {
        match user_id {
            Some(user_id) => {
                self.presence.register(user_id, handle);
            }
            None => {
                debug!(conn_id = %handle.id(), "anonymous connection");
                self.presence.attach(handle);
                self.presence.broadcast_online();
            }
        }
        self.signaling.busy().broadcast(&self.presence);
    }

    fn on_disconnect(&mut self, user_id: Option<Uuid>, conn_id: &ConnectionId) {
        let Some(user_id) = user_id else {
            self.presence.detach(conn_id);
            return;
        };
        if !self.presence.unregister(user_id, conn_id) {
            return;
        }
        for finished in self.signaling.disconnect(&self.presence, user_id) {
            self.log_call(finished);
        }
    }

    async fn on_client_event(&mut self, user_id: Uuid, conn_id: &ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Typing { data } => {
                relay_typing(&self.presence, user_id, data.receiver_id, TypingSignal::Started);
            }
            ClientEvent::StopTyping { data } => {
                relay_typing(&self.presence, user_id, data.receiver_id, TypingSignal::Stopped);
            }
            ClientEvent::CallOffer { data } => {
                self.signaling
                    .offer(&self.presence, conn_id, user_id, data)
                    .await;
            }
            ClientEvent::CallAnswer { data } => {
                self.signaling.answer(&self.presence, user_id, data);
            }
            ClientEvent::CallIceCandidate { data } => {
                self.signaling.ice_candidate(&self.presence, user_id, data);
            }
            ClientEvent::CallEnd { data } => {
                let finished = self
                    .signaling
                    .end(&self.presence, user_id, data.to, data.call_type);
                self.log_call(finished);
            }
            // Answered by the socket task without entering the loop.
            ClientEvent::Ping => {}
        }
    }

    fn log_call(&mut self, finished: FinishedCall) {
        let relay = self.weak_tx.upgrade().map(|tx| RelayHandle { tx });
        self.call_log.log_call_end(finished, relay);
    }
}
