//! Point-to-point message transport between graph workers.
//!
//! The transport is split into a [`Sender`] that queues outgoing byte
//! messages per receiver and a [`Receiver`] that queues incoming messages
//! per sender. [`socket`] provides the TCP implementation. On top of the raw
//! messages, [`codec`] defines the array metadata and key/value headers and
//! [`transfer`] wires them into fixed send/receive sequences.

/// `socket://host:port` endpoint parsing.
pub mod addr;
/// Array metadata and key/value header wire formats.
pub mod codec;
/// Sender and receiver traits.
pub mod comm;
/// Transport messages with release callbacks.
pub mod message;
/// Transport tuning knobs.
pub mod options;
/// Byte-bounded blocking queue.
pub mod queue;
/// TCP sender and receiver.
pub mod socket;
/// Dense arrays exchanged between workers.
pub mod tensor;
/// Node-flow and key/value message sequences.
pub mod transfer;

pub use addr::Endpoint;
pub use codec::{ArrayMeta, KvStoreMsg, MessageKind};
pub use comm::{PeerId, Receiver, Sender};
pub use message::Message;
pub use options::{CommOptions, DEFAULT_QUEUE_CAPACITY};
pub use queue::MessageQueue;
pub use socket::{SocketReceiver, SocketSender};
pub use tensor::{DataType, Device, Tensor};
pub use transfer::{
    recv_kv_msg, recv_node_flow, send_end_signal, send_kv_msg, send_node_flow, NodeFlow,
    NodeFlowEvent,
};
