//! A msgpack-RPC session with the host over a pair of byte streams.

use crate::host::{Host, MethodHandler, MethodTable, RpcError};
use crate::protocol::{error_message, error_value, read_message, write_message, Message, Value};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use vimlink_core::recover;

type Reply = (Value, Value);

/// Calls waiting for a reply, shared with the reader thread.
#[derive(Default)]
struct Pending {
    waiters: Mutex<HashMap<u64, Sender<Reply>>>,
    closed: AtomicBool,
}

impl Pending {
    /// Register a waiter. `None` once the reader is gone.
    fn insert(&self, id: u64) -> Option<Receiver<Reply>> {
        let (tx, rx) = channel::bounded(1);
        self.waiters.lock().insert(id, tx);
        // Checked after inserting; see `close`.
        if self.closed.load(Ordering::SeqCst) {
            self.waiters.lock().remove(&id);
            return None;
        }
        Some(rx)
    }

    fn remove(&self, id: u64) -> Option<Sender<Reply>> {
        self.waiters.lock().remove(&id)
    }

    /// Flag first, then drop every sender, so a waiter inserted concurrently
    /// either sees the flag or gets dropped here.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.waiters.lock().clear();
    }
}

/// Session over one bidirectional channel.
///
/// A background thread reads every incoming message. Replies are routed to the
/// thread waiting on them; host requests and notifications are queued for the
/// dispatch thread: the thread that created the session, or the one that last
/// called [`Session::run`]. Host requests are handled strictly one at a time.
pub struct Session {
    writer: Mutex<Box<dyn Write + Send>>,
    pending: Arc<Pending>,
    inbound: Receiver<Message>,
    next_id: AtomicU64,
    methods: MethodTable,
    dispatch_thread: Mutex<Option<ThreadId>>,
}

impl Session {
    pub fn new(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> std::io::Result<Self> {
        let pending = Arc::new(Pending::default());
        let (inbound_tx, inbound) = channel::unbounded();
        let reader_pending = pending.clone();
        thread::Builder::new()
            .name("vimlink-rpc-reader".into())
            .spawn(move || read_loop(BufReader::new(reader), reader_pending, inbound_tx))?;

        Ok(Self {
            writer: Mutex::new(Box::new(BufWriter::new(writer))),
            pending,
            inbound,
            next_id: AtomicU64::new(1),
            methods: MethodTable::new(),
            dispatch_thread: Mutex::new(Some(thread::current().id())),
        })
    }

    /// Talk to the host over this process's stdin/stdout, the way an
    /// RPC job started by the editor is wired.
    pub fn stdio() -> std::io::Result<Self> {
        Self::new(std::io::stdin(), std::io::stdout())
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Serve host requests on the calling thread until the host closes the
    /// channel.
    pub fn run(&self) {
        *self.dispatch_thread.lock() = Some(thread::current().id());
        tracing::info!("RPC session started");
        while let Ok(message) = self.inbound.recv() {
            self.dispatch(message);
        }
        tracing::info!("Host closed the RPC channel");
    }

    fn is_dispatch_thread(&self) -> bool {
        *self.dispatch_thread.lock() == Some(thread::current().id())
    }

    fn send(&self, message: Message) -> Result<(), RpcError> {
        let mut writer = self.writer.lock();
        write_message(&mut *writer, message).map_err(RpcError::from)
    }

    /// Wait for a reply on the dispatch thread. While blocked in `rpcrequest`
    /// the host may call back into this process, so keep serving inbound
    /// requests until the reply shows up.
    fn wait_dispatching(&self, reply: &Receiver<Reply>) -> Result<Reply, RpcError> {
        loop {
            channel::select! {
                recv(reply) -> msg => return msg.map_err(|_| RpcError::Disconnected),
                recv(self.inbound) -> msg => match msg {
                    Ok(message) => self.dispatch(message),
                    Err(_) => return reply.try_recv().map_err(|_| RpcError::Disconnected),
                },
            }
        }
    }

    fn dispatch(&self, message: Message) {
        match message {
            Message::Request { id, method, params } => {
                let (error, result) = match self.invoke(&method, params) {
                    Ok(value) => (Value::Nil, value),
                    Err(message) => (error_value(message), Value::Nil),
                };
                if let Err(err) = self.send(Message::Response { id, error, result }) {
                    tracing::error!(method = %method, error = %err, "Failed to answer host request");
                }
            }
            Message::Notification { method, params } => {
                if let Err(message) = self.invoke(&method, params) {
                    tracing::debug!(method = %method, error = %message, "Notification handler failed");
                }
            }
            Message::Response { id, .. } => {
                tracing::warn!(id, "Response reached the dispatch queue");
            }
        }
    }

    fn invoke(&self, method: &str, params: Vec<Value>) -> Result<Value, String> {
        let Some(handler) = self.methods.get(method) else {
            tracing::warn!(method, "Host invoked an unknown method");
            return Err(format!("unknown method {method}"));
        };
        recover(method, || handler(params))
            .unwrap_or_else(|| Err(format!("{method} panicked")))
    }
}

impl Host for Session {
    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let rx = self.pending.insert(id).ok_or(RpcError::Disconnected)?;

        let request = Message::Request {
            id,
            method: method.to_string(),
            params: args,
        };
        if let Err(err) = self.send(request) {
            self.pending.remove(id);
            return Err(err);
        }

        let (error, result) = if self.is_dispatch_thread() {
            self.wait_dispatching(&rx)?
        } else {
            rx.recv().map_err(|_| RpcError::Disconnected)?
        };

        if error.is_nil() {
            Ok(result)
        } else {
            Err(RpcError::Remote {
                method: method.to_string(),
                message: error_message(&error),
            })
        }
    }

    fn register(&self, method: &str, handler: MethodHandler) {
        self.methods.insert(method, handler);
    }
}

fn read_loop(mut reader: impl Read, pending: Arc<Pending>, inbound: Sender<Message>) {
    loop {
        match read_message(&mut reader) {
            Ok(Some(Message::Response { id, error, result })) => {
                let waiter = pending.remove(id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send((error, result));
                    }
                    None => tracing::warn!(id, "Reply for unknown request"),
                }
            }
            Ok(Some(message)) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "Dropping RPC channel after read failure");
                break;
            }
        }
    }
    // Dropping the senders fails every outstanding call with `Disconnected`.
    pending.close();
}
