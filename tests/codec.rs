#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use strata::net::{
    recv_kv_msg, recv_node_flow, send_end_signal, send_kv_msg, send_node_flow, ArrayMeta, DataType,
    Device, KvStoreMsg, Message, MessageKind, MessageQueue, NodeFlow, NodeFlowEvent, PeerId,
    Receiver, Sender, Tensor,
};
use strata::storage::ImmutableGraph;
use strata::{ErrorKind, Result, StrataError};

/// In-process link: everything sent comes back out of the same queue as peer 0.
struct Loopback {
    queue: Arc<MessageQueue>,
}

impl Loopback {
    fn new() -> Self {
        Self {
            queue: Arc::new(MessageQueue::new(1 << 20)),
        }
    }

    fn inject(&self, bytes: impl Into<bytes::Bytes>) {
        self.queue.push(Message::new(bytes)).unwrap();
    }
}

impl Sender for Loopback {
    fn add_receiver(&mut self, _addr: &str, _recv_id: PeerId) -> Result<()> {
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn send(&self, msg: Message, _recv_id: PeerId) -> Result<()> {
        self.queue.push(msg)
    }

    fn finalize(&mut self) -> Result<()> {
        self.queue.close();
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "loopback"
    }
}

impl Receiver for Loopback {
    fn wait(&mut self, _addr: &str, _num_sender: usize) -> Result<()> {
        Ok(())
    }

    fn recv(&self) -> Result<(Message, PeerId)> {
        self.recv_from(0).map(|msg| (msg, 0))
    }

    fn recv_from(&self, _send_id: PeerId) -> Result<Message> {
        self.queue
            .pop()
            .ok_or_else(|| StrataError::Transport("loopback closed".into()))
    }

    fn finalize(&mut self) -> Result<()> {
        self.queue.close();
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "loopback"
    }
}

fn emb_push() -> KvStoreMsg {
    let id = Tensor::from_ids(&[5]).unwrap();
    let data = Tensor::from_f32(vec![1, 2], &[1.0, 2.0]).unwrap();
    KvStoreMsg::push(2, "emb", id, data)
}

#[test]
fn array_meta_layout() {
    let bare = ArrayMeta::new(MessageKind::Final).encode().unwrap();
    assert_eq!(&bare[..], &1i32.to_ne_bytes());

    let mut meta = ArrayMeta::new(MessageKind::NodeFlow);
    meta.add_shape(vec![3]);
    meta.add_shape(vec![2, 2]);
    let bytes = meta.encode().unwrap();
    assert_eq!(bytes.len(), meta.encoded_len());
    assert_eq!(bytes.len(), 4 + 4 + 8 + 5 * 8);
    assert_eq!(&bytes[4..8], &2i32.to_ne_bytes());
    assert_eq!(&bytes[8..16], &5u64.to_ne_bytes());
    assert_eq!(ArrayMeta::decode(&bytes).unwrap(), meta);
}

#[test]
fn array_meta_rejects_malformed_bytes() {
    let mut meta = ArrayMeta::new(MessageKind::Push);
    meta.add_shape(vec![4]);
    let bytes = meta.encode().unwrap();

    let err = ArrayMeta::decode(&bytes[..bytes.len() - 3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);

    let mut trailing = bytes.to_vec();
    trailing.extend_from_slice(&[0, 0]);
    assert_eq!(ArrayMeta::decode(&trailing).unwrap_err().kind(), ErrorKind::Protocol);

    let err = ArrayMeta::decode(&99i32.to_ne_bytes()).unwrap_err();
    assert!(matches!(err, StrataError::Protocol(_)));
}

#[test]
fn kv_header_sections_follow_kind() {
    let push = emb_push();
    let header = push.encode_header().unwrap();
    assert_eq!(header.len(), 4 + 4 + 8 + 3);
    let decoded = KvStoreMsg::decode_header(&header).unwrap();
    assert_eq!(decoded.kind, MessageKind::Push);
    assert_eq!(decoded.rank, 2);
    assert_eq!(decoded.name.as_deref(), Some("emb"));
    assert!(decoded.id.is_none());

    let barrier = KvStoreMsg::barrier(7).encode_header().unwrap();
    assert_eq!(barrier.len(), 8);
    assert_eq!(KvStoreMsg::decode_header(&barrier).unwrap(), KvStoreMsg::barrier(7));

    let exchange = KvStoreMsg::id_exchange(1, "socket://10.0.0.1:50051");
    let decoded = KvStoreMsg::decode_header(&exchange.encode_header().unwrap()).unwrap();
    assert_eq!(decoded, exchange);

    let mut truncated = header.to_vec();
    truncated.pop();
    let err = KvStoreMsg::decode_header(&truncated).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn kv_validation_rejects_wrong_sections() {
    let mut pull = KvStoreMsg::pull(0, "emb", Tensor::from_i64(&[1]));
    pull.data = Some(Tensor::from_f32(vec![1], &[0.5]).unwrap());
    assert_eq!(pull.encode_header().unwrap_err().kind(), ErrorKind::Precondition);

    let mut push = emb_push();
    push.name = None;
    assert_eq!(push.validate().unwrap_err().kind(), ErrorKind::Precondition);

    let flow = KvStoreMsg {
        kind: MessageKind::NodeFlow,
        ..KvStoreMsg::final_msg(0)
    };
    assert!(flow.validate().is_err());

    let err = KvStoreMsg::with_values(
        MessageKind::Barrier,
        0,
        "x",
        Tensor::from_i64(&[1]),
        Tensor::from_f32(vec![1], &[1.0]).unwrap(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn tensors_check_layout_and_dtype() {
    let err = Tensor::from_f32(vec![2, 2], &[1.0, 2.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    let t = Tensor::from_i64(&[3, -1]);
    assert_eq!(t.dtype(), DataType::INT64);
    assert_eq!(t.device(), Device::Cpu);
    assert_eq!(t.num_elements(), 2);
    assert_eq!(t.to_ids().unwrap_err().kind(), ErrorKind::Protocol);
    assert_eq!(t.to_f32_vec().unwrap_err().kind(), ErrorKind::Precondition);
}

#[test]
fn push_message_survives_transfer() {
    let link = Loopback::new();
    let sent = emb_push();
    send_kv_msg(&link, 0, &sent).unwrap();
    assert_eq!(link.queue.len(), 4);

    let (received, sender) = recv_kv_msg(&link).unwrap();
    assert_eq!(sender, 0);
    assert_eq!(received, sent);
    let data = received.data.unwrap();
    assert_eq!(data.shape(), &[1, 2]);
    assert_eq!(data.to_f32_vec().unwrap(), vec![1.0, 2.0]);
    assert_eq!(received.id.unwrap().to_ids().unwrap(), vec![5]);
}

#[test]
fn pull_and_control_messages_transfer() {
    let link = Loopback::new();
    let pull = KvStoreMsg::pull(1, "emb", Tensor::from_ids(&[0, 4]).unwrap());
    send_kv_msg(&link, 0, &pull).unwrap();
    send_kv_msg(&link, 0, &KvStoreMsg::barrier(1)).unwrap();
    send_kv_msg(&link, 0, &KvStoreMsg::final_msg(1)).unwrap();
    assert_eq!(link.queue.len(), 3 + 1 + 1);

    assert_eq!(recv_kv_msg(&link).unwrap().0, pull);
    assert_eq!(recv_kv_msg(&link).unwrap().0.kind, MessageKind::Barrier);
    assert_eq!(recv_kv_msg(&link).unwrap().0.kind, MessageKind::Final);
}

#[test]
fn mismatched_array_metadata_is_a_protocol_error() {
    let link = Loopback::new();
    link.inject(emb_push().encode_header().unwrap());
    let mut meta = ArrayMeta::new(MessageKind::Pull);
    meta.add_shape(vec![1]);
    link.inject(meta.encode().unwrap());
    assert_eq!(recv_kv_msg(&link).unwrap_err().kind(), ErrorKind::Protocol);
}

#[test]
fn node_flow_survives_transfer() {
    let graph = ImmutableGraph::from_coo(3, &[0, 1, 0], &[2, 2, 1], None).unwrap();
    let flow = NodeFlow {
        graph,
        node_mapping: Tensor::from_i64(&[10, 11, 12]),
        edge_mapping: Tensor::from_i64(&[7, 8, 9]),
        layer_offsets: Tensor::from_i64(&[0, 2, 3]),
        flow_offsets: Tensor::from_i64(&[0, 3]),
    };
    let link = Loopback::new();
    send_node_flow(&link, 0, &flow).unwrap();
    send_end_signal(&link, 0).unwrap();
    assert_eq!(link.queue.len(), 1 + 7 + 1);

    let received = match recv_node_flow(&link).unwrap() {
        NodeFlowEvent::Flow(received, sender) => {
            assert_eq!(sender, 0);
            received
        }
        NodeFlowEvent::End(_) => panic!("expected a node flow"),
    };
    assert_eq!(received.node_mapping, flow.node_mapping);
    assert_eq!(received.edge_mapping, flow.edge_mapping);
    assert_eq!(received.layer_offsets, flow.layer_offsets);
    assert_eq!(received.flow_offsets, flow.flow_offsets);
    assert_eq!(received.graph.num_vertices(), 3);
    assert_eq!(received.graph.edges(true), flow.graph.edges(true));

    assert!(matches!(recv_node_flow(&link).unwrap(), NodeFlowEvent::End(0)));
}

#[test]
fn node_flow_stream_rejects_other_kinds() {
    let link = Loopback::new();
    link.inject(ArrayMeta::new(MessageKind::Barrier).encode().unwrap());
    assert_eq!(recv_node_flow(&link).unwrap_err().kind(), ErrorKind::Protocol);

    let mut short = ArrayMeta::new(MessageKind::NodeFlow);
    short.add_shape(vec![1]);
    link.inject(short.encode().unwrap());
    assert_eq!(recv_node_flow(&link).unwrap_err().kind(), ErrorKind::Protocol);
}

#[test]
fn node_flow_arrays_must_be_int64_vectors() {
    let graph = ImmutableGraph::from_coo(1, &[], &[], None).unwrap();
    let flow = NodeFlow {
        graph,
        node_mapping: Tensor::from_f32(vec![1], &[0.0]).unwrap(),
        edge_mapping: Tensor::from_i64(&[]),
        layer_offsets: Tensor::from_i64(&[0, 1]),
        flow_offsets: Tensor::from_i64(&[0]),
    };
    let link = Loopback::new();
    let err = send_node_flow(&link, 0, &flow).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(link.queue.is_empty());
}
