//! Lock-free channels between the interactive thread and the render thread.
//!
//! Two rtrb SPSC ring buffers: a command queue (interactive -> render) and
//! an event queue (render -> interactive). Neither side ever blocks.

use rtrb::{Consumer, Producer, RingBuffer};

use super::commands::{EngineCommand, EngineEvent};

/// Default capacity of the command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Default capacity of the event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Both directions of communication, before being split across threads.
pub struct EngineChannels {
    command_tx: Producer<EngineCommand>,
    command_rx: Consumer<EngineCommand>,
    event_tx: Producer<EngineEvent>,
    event_rx: Consumer<EngineEvent>,
}

impl EngineChannels {
    /// Creates channels with the given queue capacities.
    pub fn new(command_capacity: usize, event_capacity: usize) -> Self {
        let (command_tx, command_rx) = RingBuffer::new(command_capacity);
        let (event_tx, event_rx) = RingBuffer::new(event_capacity);
        Self {
            command_tx,
            command_rx,
            event_tx,
            event_rx,
        }
    }

    /// Creates channels with the default capacities.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY, DEFAULT_EVENT_CAPACITY)
    }

    /// Splits into the two thread-side handles.
    pub fn split(self) -> (InteractiveHandle, RenderHandle) {
        (
            InteractiveHandle {
                command_tx: self.command_tx,
                event_rx: self.event_rx,
            },
            RenderHandle {
                command_rx: self.command_rx,
                event_tx: self.event_tx,
            },
        )
    }
}

/// Interactive-thread side: sends commands, receives events.
pub struct InteractiveHandle {
    command_tx: Producer<EngineCommand>,
    event_rx: Consumer<EngineEvent>,
}

impl InteractiveHandle {
    /// Queues a command. Returns the command back if the queue is full;
    /// topology edits must not be silently lost.
    pub fn send_command(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.command_tx
            .push(cmd)
            .map_err(|rtrb::PushError::Full(cmd)| cmd)
    }

    /// Receives one pending event, if any.
    pub fn recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.pop().ok()
    }

    /// Drains all pending events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = EngineEvent> + '_ {
        std::iter::from_fn(|| self.recv_event())
    }

    /// Free slots remaining in the command queue.
    pub fn command_slots_available(&self) -> usize {
        self.command_tx.slots()
    }
}

/// Render-thread side: receives commands, sends events.
///
/// Every method is non-blocking and allocation-free.
pub struct RenderHandle {
    command_rx: Consumer<EngineCommand>,
    event_tx: Producer<EngineEvent>,
}

impl RenderHandle {
    /// Receives one pending command, if any.
    pub fn recv_command(&mut self) -> Option<EngineCommand> {
        self.command_rx.pop().ok()
    }

    /// Drains all pending commands through the handler, in send order.
    pub fn drain_commands<F>(&mut self, mut handler: F)
    where
        F: FnMut(EngineCommand),
    {
        while let Some(cmd) = self.recv_command() {
            handler(cmd);
        }
    }

    /// Queues an event, dropping it if the queue is full. Meter and load
    /// reports are periodic, so a dropped one is replaced moments later.
    pub fn send_event_lossy(&mut self, event: EngineEvent) {
        let _ = self.event_tx.push(event);
    }

    /// Number of commands waiting to be drained.
    pub fn commands_pending(&self) -> usize {
        self.command_rx.slots()
    }
}
