use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chanmux_frame::{is_reserved, ChannelId, ControlCommand, FrameConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, ChannelState};
use crate::control::{ControlMessage, Handoff, Route, RENDEZVOUS};
use crate::error::{MuxError, Result};
use crate::handler::Handler;

/// Whether the control loop keeps running after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Shutdown,
}

/// Registry entry. The input sender is dropped when the channel starts closing.
struct Slot {
    input: Option<mpsc::Sender<Handoff>>,
}

impl Slot {
    fn state(&self) -> ChannelState {
        if self.input.is_some() {
            ChannelState::Open
        } else {
            ChannelState::Closing
        }
    }
}

/// Single owner of the channel registry and the closing flag.
///
/// Every lifecycle transition happens here, one message at a time, so the
/// registry needs no locking.
pub(crate) struct ControlPlane<H> {
    registry: HashMap<ChannelId, Slot>,
    closing: bool,
    backlog: VecDeque<ControlMessage>,
    handler: Arc<H>,
    mailbox: mpsc::Sender<ControlMessage>,
    output: mpsc::Sender<Handoff>,
    frame_config: FrameConfig,
    opened: u64,
}

impl<H: Handler> ControlPlane<H> {
    pub(crate) fn new(
        handler: Arc<H>,
        mailbox: mpsc::Sender<ControlMessage>,
        output: mpsc::Sender<Handoff>,
        frame_config: FrameConfig,
    ) -> Self {
        Self {
            registry: HashMap::new(),
            closing: false,
            backlog: VecDeque::new(),
            handler,
            mailbox,
            output,
            frame_config,
            opened: 0,
        }
    }

    /// Process messages until the connection can be torn down.
    ///
    /// Self-messages queued while handling a message run before the next
    /// mailbox message. Returns the number of channels opened.
    pub(crate) async fn run(mut self, mut mailbox: mpsc::Receiver<ControlMessage>) -> u64 {
        info!("control plane starting");
        while let Some(message) = self.next_message(&mut mailbox).await {
            debug!(kind = message.kind(), ?message, "control message");
            match self.apply(message) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Shutdown) => break,
                Err(err) => warn!(error = %err, "control message dropped"),
            }
        }
        info!(opened = self.opened, "control plane stopped");
        self.opened
    }

    /// Backlog first, then the mailbox. The plane holds a mailbox sender of
    /// its own, so the mailbox stays open until `run` returns.
    async fn next_message(
        &mut self,
        mailbox: &mut mpsc::Receiver<ControlMessage>,
    ) -> Option<ControlMessage> {
        match self.backlog.pop_front() {
            Some(message) => Some(message),
            None => mailbox.recv().await,
        }
    }

    pub(crate) fn apply(&mut self, message: ControlMessage) -> Result<Flow> {
        match message {
            ControlMessage::Remote(ControlCommand::OpenChannel(id)) => {
                self.backlog.push_back(ControlMessage::OpenChannel(id));
                Ok(Flow::Continue)
            }
            ControlMessage::Route { id, reply } => {
                let route = match self.registry.get(&id) {
                    Some(Slot { input: Some(input) }) => Route::Deliver(input.clone()),
                    Some(Slot { input: None }) => Route::Closing,
                    None => Route::Unknown,
                };
                if reply.send(route).is_err() {
                    debug!(channel = id, "route requester went away");
                }
                Ok(Flow::Continue)
            }
            ControlMessage::OpenChannel(id) => self.open(id),
            ControlMessage::CloseChannel(id) => self.close(id),
            ControlMessage::FinishChannel(id) => self.finish(id),
            ControlMessage::TransportEnded => self.transport_ended(),
        }
    }

    fn open(&mut self, id: ChannelId) -> Result<Flow> {
        if is_reserved(id) {
            return Err(MuxError::ReservedChannelId(id));
        }
        if self.registry.contains_key(&id) {
            return Err(MuxError::DuplicateChannelId(id));
        }
        if self.closing {
            return Err(MuxError::ConnectionClosing(id));
        }

        let (input_tx, input_rx) = mpsc::channel(RENDEZVOUS);
        let channel = Channel::new(
            id,
            input_rx,
            self.output.clone(),
            self.mailbox.clone(),
            self.frame_config.clone(),
        );
        self.registry.insert(
            id,
            Slot {
                input: Some(input_tx),
            },
        );
        self.opened += 1;
        info!(channel = id, open = self.registry.len(), "channel opened");

        let handler = Arc::clone(&self.handler);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            // The inner task isolates handler panics so the finish always follows.
            let outcome = tokio::spawn(async move { handler.handle(channel).await }).await;
            if let Err(err) = outcome {
                error!(channel = id, error = %err, "channel handler failed");
            }
            if mailbox
                .send(ControlMessage::FinishChannel(id))
                .await
                .is_err()
            {
                debug!(channel = id, "control plane gone before finish");
            }
        });

        Ok(Flow::Continue)
    }

    fn close(&mut self, id: ChannelId) -> Result<Flow> {
        let slot = self
            .registry
            .get_mut(&id)
            .ok_or(MuxError::ChannelNotFound(id))?;
        match slot.input.take() {
            Some(_input) => info!(channel = id, "channel input closed"),
            None => debug!(channel = id, "channel already closing"),
        }
        Ok(Flow::Continue)
    }

    fn finish(&mut self, id: ChannelId) -> Result<Flow> {
        let slot = self
            .registry
            .remove(&id)
            .ok_or(MuxError::ChannelNotFound(id))?;
        info!(
            channel = id,
            state = %slot.state(),
            open = self.registry.len(),
            "channel finished"
        );
        Ok(self.shutdown_check())
    }

    fn transport_ended(&mut self) -> Result<Flow> {
        self.closing = true;
        let mut ids: Vec<ChannelId> = self.registry.keys().copied().collect();
        ids.sort_unstable();
        info!(open = ids.len(), "transport ended; closing channels");
        self.backlog
            .extend(ids.into_iter().map(ControlMessage::CloseChannel));
        Ok(self.shutdown_check())
    }

    fn shutdown_check(&self) -> Flow {
        if self.closing && self.registry.is_empty() {
            Flow::Shutdown
        } else {
            Flow::Continue
        }
    }

    #[cfg(test)]
    fn state_of(&self, id: ChannelId) -> Option<ChannelState> {
        self.registry.get(&id).map(Slot::state)
    }
}
