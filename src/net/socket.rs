//! TCP implementation of [`Sender`] and [`Receiver`].
//!
//! Every link starts with the sender's 4-byte logical id, followed by
//! frames of `[u64 len][len bytes]` in native byte order. Each link owns a
//! byte-bounded [`MessageQueue`]; a worker thread drains it into the socket
//! on the sending side and fills it from the socket on the receiving side.

use std::collections::BTreeMap;
use std::io::{self, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::addr::Endpoint;
use super::comm::{PeerId, Receiver, Sender};
use super::message::Message;
use super::options::CommOptions;
use super::queue::MessageQueue;
use crate::types::{Result, StrataError};

const TRANSPORT: &str = "socket";

struct OutLink {
    endpoint: Endpoint,
    queue: Arc<MessageQueue>,
    writer: Option<JoinHandle<Result<()>>>,
}

/// Sending side of the socket communicator.
pub struct SocketSender {
    sender_id: PeerId,
    options: CommOptions,
    pending: BTreeMap<PeerId, Endpoint>,
    links: BTreeMap<PeerId, OutLink>,
}

impl SocketSender {
    /// A sender that introduces itself as `sender_id` on every link.
    pub fn new(sender_id: PeerId, options: CommOptions) -> Self {
        Self {
            sender_id,
            options,
            pending: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    /// Logical id announced to receivers.
    pub fn sender_id(&self) -> PeerId {
        self.sender_id
    }

    fn open_link(&self, recv_id: PeerId, endpoint: &Endpoint) -> Result<OutLink> {
        let addr = endpoint.resolve()?;
        let mut stream = TcpStream::connect(addr).map_err(|err| StrataError::io("connect", err))?;
        stream
            .set_nodelay(self.options.tcp_nodelay)
            .map_err(|err| StrataError::io("set_nodelay", err))?;
        stream
            .write_all(&self.sender_id.to_ne_bytes())
            .map_err(|err| StrataError::io("handshake", err))?;
        let queue = Arc::new(MessageQueue::new(self.options.queue_capacity));
        let writer = {
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name(format!("strata-send-{recv_id}"))
                .spawn(move || write_loop(stream, &queue, recv_id))
                .map_err(|err| StrataError::io("spawn writer", err))?
        };
        info!(recv_id, addr = %endpoint, "comm.sender.connect");
        Ok(OutLink {
            endpoint: endpoint.clone(),
            queue,
            writer: Some(writer),
        })
    }

    fn close_links(&mut self) -> Result<()> {
        let mut first_err = None;
        for (recv_id, mut link) in std::mem::take(&mut self.links) {
            link.queue.close();
            if !link.queue.is_empty() {
                debug!(
                    recv_id,
                    queued = link.queue.len(),
                    "comm.sender.finalize.draining"
                );
            }
            let outcome = match link.writer.take().map(JoinHandle::join) {
                Some(Ok(result)) => result,
                Some(Err(_)) => Err(StrataError::Transport(format!(
                    "writer thread for receiver {recv_id} panicked"
                ))),
                None => Ok(()),
            };
            if let Err(err) = outcome {
                warn!(recv_id, addr = %link.endpoint, error = %err, "comm.sender.link_failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn write_loop(stream: TcpStream, queue: &MessageQueue, recv_id: PeerId) -> Result<()> {
    let outcome = drain_queue(&stream, queue);
    if outcome.is_err() {
        queue.close();
        while queue.try_pop().is_some() {}
    }
    let _ = stream.shutdown(Shutdown::Write);
    debug!(recv_id, ok = outcome.is_ok(), "comm.sender.writer_exit");
    outcome
}

fn drain_queue(stream: &TcpStream, queue: &MessageQueue) -> Result<()> {
    let mut out = BufWriter::new(stream);
    while let Some(msg) = queue.pop() {
        out.write_all(&(msg.len() as u64).to_ne_bytes())
            .and_then(|()| out.write_all(msg.data()))
            .map_err(|err| StrataError::io("send", err))?;
        if queue.is_empty() {
            out.flush().map_err(|err| StrataError::io("flush", err))?;
        }
        drop(msg);
    }
    out.flush().map_err(|err| StrataError::io("flush", err))
}

impl Sender for SocketSender {
    fn add_receiver(&mut self, addr: &str, recv_id: PeerId) -> Result<()> {
        if !self.links.is_empty() {
            return Err(StrataError::Precondition(
                "receivers must be added before connect".into(),
            ));
        }
        let endpoint: Endpoint = addr.parse()?;
        if self.pending.insert(recv_id, endpoint).is_some() {
            return Err(StrataError::Precondition(format!(
                "receiver {recv_id} registered twice"
            )));
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Err(StrataError::Precondition("no receivers registered".into()));
        }
        let targets: Vec<(PeerId, Endpoint)> = self
            .pending
            .iter()
            .map(|(&id, endpoint)| (id, endpoint.clone()))
            .collect();
        for (recv_id, endpoint) in targets {
            match self.open_link(recv_id, &endpoint) {
                Ok(link) => {
                    self.links.insert(recv_id, link);
                }
                Err(err) => {
                    warn!(recv_id, addr = %endpoint, error = %err, "comm.sender.connect_failed");
                    let _ = self.close_links();
                    return Err(err);
                }
            }
        }
        info!(links = self.links.len(), "comm.sender.connected");
        Ok(())
    }

    fn send(&self, msg: Message, recv_id: PeerId) -> Result<()> {
        let link = self.links.get(&recv_id).ok_or_else(|| {
            StrataError::Precondition(format!("receiver {recv_id} is not connected"))
        })?;
        link.queue.push(msg).map_err(|err| match err {
            StrataError::Transport(_) => {
                StrataError::Transport(format!("link to receiver {recv_id} is closed"))
            }
            other => other,
        })
    }

    fn finalize(&mut self) -> Result<()> {
        let links = self.links.len();
        let outcome = self.close_links();
        self.pending.clear();
        if links > 0 {
            info!(links, ok = outcome.is_ok(), "comm.sender.finalize");
        }
        outcome
    }

    fn transport(&self) -> &'static str {
        TRANSPORT
    }
}

impl Drop for SocketSender {
    fn drop(&mut self) {
        let _ = self.close_links();
    }
}

/// Wakes receivers waiting on any link.
#[derive(Default)]
struct Signal {
    generation: Mutex<u64>,
    cv: Condvar,
}

impl Signal {
    fn current(&self) -> u64 {
        *self.generation.lock()
    }

    fn bump(&self) {
        *self.generation.lock() += 1;
        self.cv.notify_all();
    }

    fn wait_past(&self, seen: u64) {
        let mut generation = self.generation.lock();
        while *generation == seen {
            self.cv.wait(&mut generation);
        }
    }
}

struct InLink {
    sender_id: PeerId,
    queue: Arc<MessageQueue>,
    failure: Arc<Mutex<Option<String>>>,
    stream: TcpStream,
    reader: Option<JoinHandle<()>>,
}

impl InLink {
    fn closed_error(&self) -> StrataError {
        match self.failure.lock().as_ref() {
            Some(reason) => StrataError::Transport(format!(
                "link from sender {} failed: {reason}",
                self.sender_id
            )),
            None => StrataError::Transport(format!(
                "sender {} closed the link",
                self.sender_id
            )),
        }
    }
}

/// Receiving side of the socket communicator.
pub struct SocketReceiver {
    options: CommOptions,
    listener: Option<TcpListener>,
    links: Vec<InLink>,
    signal: Arc<Signal>,
    next: AtomicUsize,
}

impl SocketReceiver {
    /// A receiver with no links.
    pub fn new(options: CommOptions) -> Self {
        Self {
            options,
            listener: None,
            links: Vec::new(),
            signal: Arc::new(Signal::default()),
            next: AtomicUsize::new(0),
        }
    }

    /// Binds the listening socket and returns the bound address.
    pub fn bind(&mut self, addr: &str) -> Result<SocketAddr> {
        let endpoint: Endpoint = addr.parse()?;
        let listener =
            TcpListener::bind(endpoint.resolve()?).map_err(|err| StrataError::io("bind", err))?;
        let local = listener
            .local_addr()
            .map_err(|err| StrataError::io("local_addr", err))?;
        info!(addr = %local, "comm.receiver.bind");
        self.listener = Some(listener);
        Ok(local)
    }

    /// Accepts `num_sender` links on the bound socket.
    pub fn accept(&mut self, num_sender: usize) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| StrataError::Precondition("receiver is not bound".into()))?;
        for _ in 0..num_sender {
            let (mut stream, peer) = listener
                .accept()
                .map_err(|err| StrataError::io("accept", err))?;
            stream
                .set_nodelay(self.options.tcp_nodelay)
                .map_err(|err| StrataError::io("set_nodelay", err))?;
            let mut raw = [0u8; 4];
            stream
                .read_exact(&mut raw)
                .map_err(|err| StrataError::io("handshake", err))?;
            let sender_id = PeerId::from_ne_bytes(raw);
            if self.links.iter().any(|l| l.sender_id == sender_id) {
                let _ = stream.shutdown(Shutdown::Both);
                return Err(StrataError::Transport(format!(
                    "sender id {sender_id} connected twice"
                )));
            }
            let link = self.spawn_reader(stream, sender_id)?;
            self.links.push(link);
            info!(sender_id, peer = %peer, "comm.receiver.accepted");
        }
        self.links.sort_by_key(|l| l.sender_id);
        Ok(())
    }

    fn spawn_reader(&self, stream: TcpStream, sender_id: PeerId) -> Result<InLink> {
        let queue = Arc::new(MessageQueue::new(self.options.queue_capacity));
        let failure = Arc::new(Mutex::new(None));
        let read_half = stream
            .try_clone()
            .map_err(|err| StrataError::io("clone stream", err))?;
        let reader = {
            let queue = Arc::clone(&queue);
            let failure = Arc::clone(&failure);
            let signal = Arc::clone(&self.signal);
            let limit = self.options.frame_limit();
            thread::Builder::new()
                .name(format!("strata-recv-{sender_id}"))
                .spawn(move || {
                    if let Err(err) = read_loop(read_half, &queue, &signal, limit) {
                        warn!(sender_id, error = %err, "comm.receiver.link_failed");
                        *failure.lock() = Some(err.to_string());
                    }
                    queue.close();
                    signal.bump();
                    debug!(sender_id, "comm.receiver.reader_exit");
                })
                .map_err(|err| StrataError::io("spawn reader", err))?
        };
        Ok(InLink {
            sender_id,
            queue,
            failure,
            stream,
            reader: Some(reader),
        })
    }

    /// Ids of the connected senders, ascending.
    pub fn sender_ids(&self) -> Vec<PeerId> {
        self.links.iter().map(|l| l.sender_id).collect()
    }

    fn close_links(&mut self) {
        for link in &self.links {
            link.queue.close();
            let _ = link.stream.shutdown(Shutdown::Both);
        }
        for link in &mut self.links {
            if let Some(reader) = link.reader.take() {
                let _ = reader.join();
            }
        }
        self.links.clear();
        self.listener = None;
    }
}

fn read_loop(
    mut stream: TcpStream,
    queue: &MessageQueue,
    signal: &Signal,
    frame_limit: usize,
) -> Result<()> {
    loop {
        let mut header = [0u8; 8];
        match read_frame_header(&mut stream, &mut header) {
            Ok(false) => return Ok(()),
            Ok(true) => {}
            Err(err) => return Err(StrataError::io("recv", err)),
        }
        let len = u64::from_ne_bytes(header);
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= frame_limit)
            .ok_or_else(|| {
                StrataError::Protocol(format!(
                    "frame of {len} bytes exceeds the limit of {frame_limit}"
                ))
            })?;
        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .map_err(|err| StrataError::io("recv", err))?;
        if let Err(err) = queue.push(Message::new(payload)) {
            if queue.is_closed() {
                return Ok(());
            }
            return Err(err);
        }
        signal.bump();
    }
}

/// Fills `header`; returns `false` on a clean end of stream before any byte.
fn read_frame_header(stream: &mut TcpStream, header: &mut [u8; 8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < header.len() {
        match stream.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

impl Receiver for SocketReceiver {
    fn wait(&mut self, addr: &str, num_sender: usize) -> Result<()> {
        self.bind(addr)?;
        self.accept(num_sender)
    }

    fn recv(&self) -> Result<(Message, PeerId)> {
        if self.links.is_empty() {
            return Err(StrataError::Precondition(
                "receiver has no connected senders".into(),
            ));
        }
        let n = self.links.len();
        loop {
            let seen = self.signal.current();
            let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
            let mut finished = 0;
            for k in 0..n {
                let link = &self.links[(start + k) % n];
                if let Some(msg) = link.queue.try_pop() {
                    return Ok((msg, link.sender_id));
                }
                if link.queue.is_finished() {
                    if link.failure.lock().is_some() {
                        return Err(link.closed_error());
                    }
                    finished += 1;
                }
            }
            if finished == n {
                return Err(StrataError::Transport(
                    "every sender has closed its link".into(),
                ));
            }
            self.signal.wait_past(seen);
        }
    }

    fn recv_from(&self, send_id: PeerId) -> Result<Message> {
        let link = self
            .links
            .iter()
            .find(|l| l.sender_id == send_id)
            .ok_or_else(|| {
                StrataError::Precondition(format!("sender {send_id} is not connected"))
            })?;
        link.queue.pop().ok_or_else(|| link.closed_error())
    }

    fn finalize(&mut self) -> Result<()> {
        let links = self.links.len();
        self.close_links();
        info!(links, "comm.receiver.finalize");
        Ok(())
    }

    fn transport(&self) -> &'static str {
        TRANSPORT
    }
}

impl Drop for SocketReceiver {
    fn drop(&mut self) {
        self.close_links();
    }
}
