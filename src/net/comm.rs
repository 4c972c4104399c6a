//! Transport-independent communicator capabilities.

use super::message::Message;
use crate::types::Result;

/// Logical id naming one endpoint of a communicator topology.
pub type PeerId = i32;

/// Sending half of a point-to-point communicator.
pub trait Sender: Send {
    /// Registers `addr` under `recv_id`. Must precede [`Sender::connect`].
    fn add_receiver(&mut self, addr: &str, recv_id: PeerId) -> Result<()>;

    /// Opens every registered link. Fails as a whole if any link fails.
    fn connect(&mut self) -> Result<()>;

    /// Queues `msg` for `recv_id`, blocking while that link's queue is full.
    fn send(&self, msg: Message, recv_id: PeerId) -> Result<()>;

    /// Flushes queued messages and closes every link.
    fn finalize(&mut self) -> Result<()>;

    /// Transport name.
    fn transport(&self) -> &'static str;
}

/// Receiving half of a point-to-point communicator.
pub trait Receiver: Send {
    /// Binds `addr` and blocks until `num_sender` senders are connected.
    fn wait(&mut self, addr: &str, num_sender: usize) -> Result<()>;

    /// Next message from any sender, with the sender's id.
    fn recv(&self) -> Result<(Message, PeerId)>;

    /// Next message from `send_id`.
    fn recv_from(&self, send_id: PeerId) -> Result<Message>;

    /// Closes every link.
    fn finalize(&mut self) -> Result<()>;

    /// Transport name.
    fn transport(&self) -> &'static str;
}
