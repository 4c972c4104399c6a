//! Fixed message sequences built on a [`Sender`]/[`Receiver`] pair.
//!
//! A node flow is one [`ArrayMeta`] of kind `NodeFlow` followed by seven
//! raw int64 arrays. A key/value operation is a [`KvStoreMsg`] header and,
//! for kinds carrying tensors, an [`ArrayMeta`] plus the id array and the
//! value array (omitted for `Pull`). Receivers must consume the exact same
//! sequence from the same sender; there is no way to resynchronize.

use tracing::debug;

use super::codec::{ArrayMeta, KvStoreMsg, MessageKind};
use super::comm::{PeerId, Receiver, Sender};
use super::message::Message;
use super::tensor::{DataType, Tensor};
use crate::storage::{EdgeDir, ImmutableGraph};
use crate::types::{Result, StrataError};

const NODE_FLOW_ARRAYS: usize = 7;

/// A sampled subgraph plus its layer bookkeeping.
#[derive(Clone, Debug)]
pub struct NodeFlow {
    /// Flow graph; shipped through its in-edge CSR.
    pub graph: ImmutableGraph,
    /// Parent vertex id of each flow vertex (int64).
    pub node_mapping: Tensor,
    /// Parent edge id of each flow edge (int64).
    pub edge_mapping: Tensor,
    /// Vertex offset of each layer (int64).
    pub layer_offsets: Tensor,
    /// Edge offset of each flow block (int64).
    pub flow_offsets: Tensor,
}

/// Outcome of [`recv_node_flow`].
#[derive(Clone, Debug)]
pub enum NodeFlowEvent {
    /// A node flow arrived from the given sender.
    Flow(NodeFlow, PeerId),
    /// The given sender signalled the end of its stream.
    End(PeerId),
}

fn check_id_array(what: &str, tensor: &Tensor) -> Result<()> {
    if tensor.dtype() != DataType::INT64 || tensor.ndim() != 1 {
        return Err(StrataError::Precondition(format!(
            "{what} must be a one-dimensional int64 array"
        )));
    }
    Ok(())
}

fn send_tensor<S: Sender + ?Sized>(sender: &S, tensor: &Tensor, recv_id: PeerId) -> Result<()> {
    sender.send(Message::new(tensor.data().clone()), recv_id)
}

/// Ships `flow` to `recv_id`.
pub fn send_node_flow<S: Sender + ?Sized>(sender: &S, recv_id: PeerId, flow: &NodeFlow) -> Result<()> {
    check_id_array("node_mapping", &flow.node_mapping)?;
    check_id_array("edge_mapping", &flow.edge_mapping)?;
    check_id_array("layer_offsets", &flow.layer_offsets)?;
    check_id_array("flow_offsets", &flow.flow_offsets)?;
    let csr = flow.graph.in_csr();
    let indptr = Tensor::from_ids(csr.indptr())?;
    let indices = Tensor::from_ids(csr.indices())?;
    let edge_ids = Tensor::from_ids(csr.edge_ids())?;
    let arrays = [
        &flow.node_mapping,
        &flow.edge_mapping,
        &flow.layer_offsets,
        &flow.flow_offsets,
        &indptr,
        &indices,
        &edge_ids,
    ];

    let mut meta = ArrayMeta::new(MessageKind::NodeFlow);
    for tensor in arrays {
        meta.add_array(tensor);
    }
    sender.send(Message::new(meta.encode()?), recv_id)?;
    for tensor in arrays {
        send_tensor(sender, tensor, recv_id)?;
    }
    debug!(
        recv_id,
        vertices = flow.graph.num_vertices(),
        edges = flow.graph.num_edges(),
        "comm.transfer.node_flow_sent"
    );
    Ok(())
}

/// Tells `recv_id` that no more node flows follow.
pub fn send_end_signal<S: Sender + ?Sized>(sender: &S, recv_id: PeerId) -> Result<()> {
    let meta = ArrayMeta::new(MessageKind::Final);
    sender.send(Message::new(meta.encode()?), recv_id)
}

fn tensor_from_wire(dtype: DataType, shape: &[i64], msg: Message) -> Result<Tensor> {
    Tensor::new(dtype, shape.to_vec(), msg.into_bytes()).map_err(|err| match err {
        StrataError::Precondition(reason) => StrataError::Protocol(reason),
        other => other,
    })
}

fn one_dim(shape: &[i64]) -> Result<&[i64]> {
    if shape.len() == 1 {
        Ok(shape)
    } else {
        Err(StrataError::Protocol(format!(
            "expected a one-dimensional array, got shape {shape:?}"
        )))
    }
}

/// Receives the next node flow or end signal from any sender.
pub fn recv_node_flow<R: Receiver + ?Sized>(receiver: &R) -> Result<NodeFlowEvent> {
    let (msg, sender_id) = receiver.recv()?;
    let meta = ArrayMeta::decode(msg.data())?;
    drop(msg);
    match meta.kind() {
        MessageKind::NodeFlow => {}
        MessageKind::Final => return Ok(NodeFlowEvent::End(sender_id)),
        other => {
            return Err(StrataError::Protocol(format!(
                "unexpected {other:?} message in a node flow stream"
            )))
        }
    }
    if meta.array_count() != NODE_FLOW_ARRAYS {
        return Err(StrataError::Protocol(format!(
            "node flow describes {} arrays, expected {NODE_FLOW_ARRAYS}",
            meta.array_count()
        )));
    }
    let mut arrays = Vec::with_capacity(NODE_FLOW_ARRAYS);
    for shape in meta.shapes() {
        let msg = receiver.recv_from(sender_id)?;
        arrays.push(tensor_from_wire(DataType::INT64, one_dim(shape)?, msg)?);
    }
    let mut arrays = arrays.into_iter();
    let mut next = || {
        arrays
            .next()
            .ok_or_else(|| StrataError::Protocol("node flow array missing".into()))
    };
    let node_mapping = next()?;
    let edge_mapping = next()?;
    let layer_offsets = next()?;
    let flow_offsets = next()?;
    let indptr = next()?.to_ids()?;
    let indices = next()?.to_ids()?;
    let edge_ids = next()?.to_ids()?;
    let graph = ImmutableGraph::from_csr(indptr, indices, edge_ids, EdgeDir::In, None)?;
    debug!(
        sender_id,
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        "comm.transfer.node_flow_received"
    );
    Ok(NodeFlowEvent::Flow(
        NodeFlow {
            graph,
            node_mapping,
            edge_mapping,
            layer_offsets,
            flow_offsets,
        },
        sender_id,
    ))
}

/// Ships a key/value operation to `recv_id`.
pub fn send_kv_msg<S: Sender + ?Sized>(sender: &S, recv_id: PeerId, msg: &KvStoreMsg) -> Result<()> {
    let header = msg.encode_header()?;
    sender.send(Message::new(header), recv_id)?;
    if !msg.kind.carries_ids() {
        return Ok(());
    }
    let mut meta = ArrayMeta::new(msg.kind);
    let id = msg
        .id
        .as_ref()
        .ok_or_else(|| StrataError::Precondition(format!("{:?} requires ids", msg.kind)))?;
    check_id_array("id", id)?;
    meta.add_array(id);
    let data = match (&msg.data, msg.kind.carries_data()) {
        (Some(data), true) => {
            if data.dtype() != DataType::FLOAT32 || data.ndim() == 0 {
                return Err(StrataError::Precondition(
                    "values must be a float32 array with at least one dimension".into(),
                ));
            }
            meta.add_array(data);
            Some(data)
        }
        _ => None,
    };
    sender.send(Message::new(meta.encode()?), recv_id)?;
    send_tensor(sender, id, recv_id)?;
    if let Some(data) = data {
        send_tensor(sender, data, recv_id)?;
    }
    debug!(recv_id, kind = ?msg.kind, rank = msg.rank, "comm.transfer.kv_sent");
    Ok(())
}

/// Receives the next key/value operation from any sender.
pub fn recv_kv_msg<R: Receiver + ?Sized>(receiver: &R) -> Result<(KvStoreMsg, PeerId)> {
    let (head, sender_id) = receiver.recv()?;
    let mut msg = KvStoreMsg::decode_header(head.data())?;
    drop(head);
    if !msg.kind.carries_ids() {
        return Ok((msg, sender_id));
    }
    let meta = ArrayMeta::decode(receiver.recv_from(sender_id)?.data())?;
    if meta.kind() != msg.kind {
        return Err(StrataError::Protocol(format!(
            "array metadata of kind {:?} follows a {:?} header",
            meta.kind(),
            msg.kind
        )));
    }
    let expected = 1 + usize::from(msg.kind.carries_data());
    if meta.array_count() != expected {
        return Err(StrataError::Protocol(format!(
            "{:?} describes {} arrays, expected {expected}",
            msg.kind,
            meta.array_count()
        )));
    }
    let shapes = meta.shapes();
    let id = receiver.recv_from(sender_id)?;
    msg.id = Some(tensor_from_wire(DataType::INT64, one_dim(&shapes[0])?, id)?);
    if msg.kind.carries_data() {
        if shapes[1].is_empty() {
            return Err(StrataError::Protocol("value array has no dimensions".into()));
        }
        let data = receiver.recv_from(sender_id)?;
        msg.data = Some(tensor_from_wire(DataType::FLOAT32, &shapes[1], data)?);
    }
    debug!(sender_id, kind = ?msg.kind, rank = msg.rank, "comm.transfer.kv_received");
    Ok((msg, sender_id))
}
