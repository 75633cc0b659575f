//! Call signaling: offer/answer/ICE/end routing with busy and block admission control.
//!
//! A call context moves `OFFERED -> RINGING -> ACTIVE -> ENDED`. An offer that cannot be
//! delivered terminates as `UNAVAILABLE` (callee offline) or `BUSY` (callee in a call,
//! caller in another call, or a block between the two). Only `RINGING` and `ACTIVE`
//! contexts are stored; terminal states simply remove them.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::busy::BusyStateTracker;
use super::presence::PresenceRegistry;
use crate::models::{
    AnswerPayload, AnsweredCall, CallRejection, CallType, ConnectionId, EndedCall,
    IceCandidatePayload, IncomingCall, OfferPayload, PairKey, RelayedCandidate, ServerEvent,
};
use crate::repositories::{is_blocked_between, UserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Offer delivered to the callee, no answer yet.
    Ringing,
    /// Callee answered.
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Uuid,
    pub callee: Uuid,
    pub call_type: CallType,
    pub state: CallState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// `call:incoming` reached the callee.
    Ringing,
    Unavailable,
    Busy,
}

/// A call that just reached `ENDED`, as seen by the party that ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedCall {
    pub ended_by: Uuid,
    pub peer: Uuid,
    pub call_type: CallType,
    /// Whether the callee had answered.
    pub accepted: bool,
}

pub struct CallSignalingRelay {
    busy: BusyStateTracker,
    calls: HashMap<PairKey, CallContext>,
    users: Arc<dyn UserStore>,
}

impl CallSignalingRelay {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            busy: BusyStateTracker::new(),
            calls: HashMap::new(),
            users,
        }
    }

    pub fn busy(&self) -> &BusyStateTracker {
        &self.busy
    }

    pub fn is_busy(&self, user_id: Uuid) -> bool {
        self.busy.is_busy(user_id)
    }

    pub fn context(&self, a: Uuid, b: Uuid) -> Option<&CallContext> {
        self.calls.get(&PairKey::new(a, b))
    }

    /// Caller-side offer. The block check is awaited before anything is forwarded.
    ///
    /// A new offer between two parties that already share a context (ringing or answered) is a
    /// renegotiation: it skips the busy checks, is forwarded as `call:incoming`, and leaves the
    /// context's state untouched.
    #[instrument(skip(self, presence, payload), fields(to = %payload.to, call_type = %payload.call_type))]
    pub async fn offer(
        &mut self,
        presence: &PresenceRegistry,
        origin: &ConnectionId,
        from: Uuid,
        payload: OfferPayload,
    ) -> OfferOutcome {
        let to = payload.to;
        let call_type = payload.call_type;
        let rejection = CallRejection { to, call_type };

        if presence.lookup(to).is_none() {
            debug!(from = %from, "callee unreachable");
            presence.send_to_connection(origin, &ServerEvent::CallUnavailable { data: rejection });
            return OfferOutcome::Unavailable;
        }

        match is_blocked_between(self.users.as_ref(), from, to).await {
            Ok(true) => {
                info!(from = %from, "call rejected by block list");
                presence.send_to_connection(origin, &ServerEvent::CallBusy { data: rejection });
                return OfferOutcome::Busy;
            }
            Ok(false) => {}
            Err(e) => warn!(from = %from, error = %e, "block list lookup failed, treating as not blocked"),
        }

        let key = PairKey::new(from, to);
        let renegotiating = self.calls.contains_key(&key);
        if !renegotiating && (self.busy.is_busy(to) || self.engaged_elsewhere(from, to)) {
            debug!(from = %from, "call rejected, party already in a call");
            presence.send_to_connection(origin, &ServerEvent::CallBusy { data: rejection });
            return OfferOutcome::Busy;
        }

        self.busy.mark_busy(from);
        self.calls.entry(key).or_insert(CallContext {
            caller: from,
            callee: to,
            call_type,
            state: CallState::Ringing,
        });
        presence.send_to_user(
            to,
            &ServerEvent::CallIncoming {
                data: IncomingCall {
                    from,
                    offer: payload.offer,
                    caller: payload.caller,
                    call_type,
                },
            },
        );
        self.busy.broadcast(presence);
        info!(from = %from, renegotiating, "ringing");
        OfferOutcome::Ringing
    }

    /// Callee-side answer. Dropped when the caller is no longer connected.
    pub fn answer(&mut self, presence: &PresenceRegistry, from: Uuid, payload: AnswerPayload) -> bool {
        let to = payload.to;
        if presence.lookup(to).is_none() {
            debug!(from = %from, to = %to, "answer dropped, caller gone");
            return false;
        }

        self.busy.mark_busy(from);
        let call_type = payload.call_type;
        self.calls
            .entry(PairKey::new(from, to))
            .and_modify(|ctx| ctx.state = CallState::Active)
            .or_insert(CallContext {
                caller: to,
                callee: from,
                call_type,
                state: CallState::Active,
            });
        presence.send_to_user(
            to,
            &ServerEvent::CallAnswer {
                data: AnsweredCall {
                    from,
                    answer: payload.answer,
                    callee: payload.callee,
                    call_type,
                },
            },
        );
        self.busy.broadcast(presence);
        info!(from = %from, to = %to, call_type = %call_type, "call active");
        true
    }

    pub fn ice_candidate(
        &self,
        presence: &PresenceRegistry,
        from: Uuid,
        payload: IceCandidatePayload,
    ) -> bool {
        presence.send_to_user(
            payload.to,
            &ServerEvent::CallIceCandidate {
                data: RelayedCandidate {
                    from,
                    candidate: payload.candidate,
                },
            },
        )
    }

    /// Explicit hang-up. Always leaves both parties not busy, even if the peer is gone
    /// or the call was already over.
    pub fn end(
        &mut self,
        presence: &PresenceRegistry,
        from: Uuid,
        to: Uuid,
        call_type: CallType,
    ) -> FinishedCall {
        let finished = self.finish(presence, from, to, call_type);
        self.busy.broadcast(presence);
        finished
    }

    /// `user_id` lost its connection: end every call context it was part of.
    pub fn disconnect(&mut self, presence: &PresenceRegistry, user_id: Uuid) -> Vec<FinishedCall> {
        self.busy.clear_busy(user_id);
        let peers: Vec<(Uuid, CallType)> = self
            .calls
            .iter()
            .filter_map(|(key, ctx)| key.other(user_id).map(|peer| (peer, ctx.call_type)))
            .collect();
        let finished: Vec<FinishedCall> = peers
            .into_iter()
            .map(|(peer, call_type)| self.finish(presence, user_id, peer, call_type))
            .collect();
        if !finished.is_empty() {
            info!(user_id = %user_id, calls = finished.len(), "calls ended by disconnect");
        }
        self.busy.broadcast(presence);
        finished
    }

    fn finish(
        &mut self,
        presence: &PresenceRegistry,
        from: Uuid,
        to: Uuid,
        call_type: CallType,
    ) -> FinishedCall {
        self.busy.clear_busy(from);
        let context = self.calls.remove(&PairKey::new(from, to));
        let accepted = matches!(context, Some(ctx) if ctx.state == CallState::Active);
        if !presence.send_to_user(to, &ServerEvent::CallEnded { data: EndedCall { from } }) {
            debug!(from = %from, to = %to, "peer already gone");
        }
        self.busy.clear_busy(to);
        info!(from = %from, to = %to, accepted, "call ended");
        FinishedCall {
            ended_by: from,
            peer: to,
            call_type,
            accepted,
        }
    }

    /// `user_id` originated or accepted a call with someone other than `peer`.
    fn engaged_elsewhere(&self, user_id: Uuid, peer: Uuid) -> bool {
        self.busy.is_busy(user_id)
            && self
                .calls
                .keys()
                .any(|key| matches!(key.other(user_id), Some(other) if other != peer))
    }
}
