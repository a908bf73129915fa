pub mod discovery;
pub mod protocol;

pub use discovery::PortFilter;
pub use protocol::*;

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam_channel as xch;
use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::config::SerialCfg;
use crate::connection::{ConnectionState, SharedConnectionState};
use crate::error::{LinkError, Result};
use crate::pubsub::Publisher;

pub const DEFAULT_BAUD: u32 = 9600;
const READ_CHUNK: usize = 256;
const IDLE_BACKOFF: Duration = Duration::from_millis(10);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions{
    pub baud_rate: u32,
    /// Bounds how long a blocked read can hide the stop flag.
    pub read_timeout: Duration,
    /// Writer's queue poll; bounds how long an idle writer hides the stop flag.
    pub write_poll: Duration,
    pub queue_capacity: usize,
}

impl Default for LinkOptions{
    fn default() -> Self{
        LinkOptions{
            baud_rate: DEFAULT_BAUD,
            read_timeout: Duration::from_millis(100),
            write_poll: Duration::from_millis(20),
            queue_capacity: 64,
        }
    }
}

impl From<&SerialCfg> for LinkOptions{
    fn from(cfg: &SerialCfg) -> Self{
        LinkOptions{
            baud_rate: cfg.baud_rate,
            read_timeout: Duration::from_millis(cfg.read_timeout_ms),
            write_poll: Duration::from_millis(cfg.write_poll_ms),
            queue_capacity: cfg.queue_capacity,
        }
    }
}

/// Producer handle onto the writer's queue. Cheap to clone. A handle for a
/// link that never opened accepts and discards everything, so nothing piles
/// up while the peer is absent.
#[derive(Debug, Clone)]
pub struct LinkSender{
    tx: Option<xch::Sender<OutboundMessage>>,
}

impl LinkSender{
    pub fn disconnected() -> Self{
        LinkSender{ tx: None }
    }

    pub fn is_connected(&self) -> bool{
        self.tx.is_some()
    }

    /// Queues one command for the writer. Returns whether it was accepted.
    /// A full queue drops the new command rather than blocking the caller.
    pub fn handle_data(&self, msg: OutboundMessage) -> bool{
        let Some(tx) = &self.tx else{
            tracing::trace!("link not open, command discarded");
            return false;
        };

        match tx.try_send(msg){
            Ok(()) => true,
            Err(xch::TrySendError::Full(_)) =>{
                tracing::warn!(capacity = ?tx.capacity(), "outbound queue full, command dropped");
                false
            }
            Err(xch::TrySendError::Disconnected(_)) =>{
                tracing::debug!("writer gone, command discarded");
                false
            }
        }
    }
}

/// Bounded FIFO between command producers and the writer worker.
pub fn outbound_queue(capacity: usize) -> (LinkSender, xch::Receiver<OutboundMessage>){
    let (tx, rx) = xch::bounded(capacity.max(1));
    (LinkSender{ tx: Some(tx) }, rx)
}

struct Worker{
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker{
    fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("rov-{}", name))
            .spawn(move || body(flag))
            .map_err(|source| LinkError::Spawn{ worker: name, source })?;

        Ok(Worker{
            name,
            stop,
            handle: Some(handle),
        })
    }

    fn signal(&self){
        self.stop.store(true, Ordering::SeqCst);
    }

    fn join(&mut self){
        if let Some(handle) = self.handle.take(){
            if handle.join().is_err(){
                tracing::warn!(worker = self.name, "worker panicked during shutdown");
            } else{
                tracing::trace!(worker = self.name, "worker joined");
            }
        }
    }
}

/// Owns the connection to the microcontroller and its two workers.
///
/// The reader and writer each hold their own handle onto the port. Both
/// handles drop inside their worker threads, so joining the workers is what
/// releases the port.
pub struct SerialLink{
    port_name: Option<String>,
    state: SharedConnectionState,
    sender: LinkSender,
    reader: Option<Worker>,
    writer: Option<Worker>,
}

impl SerialLink{
    /// A link with no peer. Hand-offs are discarded.
    pub fn unopened() -> Self{
        Self::unopened_with(SharedConnectionState::default())
    }

    fn unopened_with(state: SharedConnectionState) -> Self{
        state.set(ConnectionState::Disconnected);
        SerialLink{
            port_name: None,
            state,
            sender: LinkSender::disconnected(),
            reader: None,
            writer: None,
        }
    }

    /// Discovers and opens the peer. Never fails: any problem is logged and
    /// an unopened link comes back.
    pub fn connect(filter: &PortFilter, options: LinkOptions, telemetry: Publisher<InboundTelemetry>) -> Self{
        Self::connect_tracked(filter, options, telemetry, SharedConnectionState::default())
    }

    /// Like [`SerialLink::connect`], reporting progress through `state`: it
    /// reads Connecting during discovery and open, then Connected or
    /// Disconnected. The returned link keeps sharing `state`.
    pub fn connect_tracked(
        filter: &PortFilter,
        options: LinkOptions,
        telemetry: Publisher<InboundTelemetry>,
        state: SharedConnectionState,
    ) -> Self{
        state.set(ConnectionState::Connecting);
        let ports = match filter{
            PortFilter::Explicit(_) | PortFilter::Unsupported(_) => Vec::new(),
            PortFilter::Prefix(_) => match discovery::available_ports(){
                Ok(ports) => ports,
                Err(e) =>{
                    tracing::error!(error = %e, "serial port enumeration failed");
                    Vec::new()
                }
            },
        };
        tracing::debug!(?ports, "available ports");

        let Some(port_name) = filter.select(ports.iter().map(String::as_str)) else{
            tracing::error!(?filter, "microcontroller port not found, link left unopened");
            return Self::unopened_with(state);
        };

        match Self::open_tracked(&port_name, options, telemetry, state.clone()){
            Ok(link) => link,
            Err(e) =>{
                tracing::error!(error = %e, "failed to bring up serial link, link left unopened");
                Self::unopened_with(state)
            }
        }
    }

    /// Opens `port_name` at 8N1 with DTR asserted and starts both workers.
    pub fn open(port_name: &str, options: LinkOptions, telemetry: Publisher<InboundTelemetry>) -> Result<Self>{
        Self::open_tracked(port_name, options, telemetry, SharedConnectionState::default())
    }

    fn open_tracked(
        port_name: &str,
        options: LinkOptions,
        telemetry: Publisher<InboundTelemetry>,
        state: SharedConnectionState,
    ) -> Result<Self>{
        state.set(ConnectionState::Connecting);
        tracing::info!(port = %port_name, baud = options.baud_rate, "opening serial port");

        let mut port = serialport::new(port_name, options.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(options.read_timeout)
            .open()
            .map_err(|source|{
                state.set(ConnectionState::Disconnected);
                LinkError::Open{ port: port_name.to_string(), source }
            })?;

        if let Err(e) = port.write_data_terminal_ready(true){
            tracing::warn!(port = %port_name, error = %e, "could not assert DTR");
        }

        let read_half: Box<dyn SerialPort> = port
            .try_clone()
            .map_err(|source|{
                state.set(ConnectionState::Disconnected);
                LinkError::Clone{ port: port_name.to_string(), source }
            })?;

        Self::start(port_name, read_half, port, options, telemetry, state)
    }

    /// Starts the workers over any byte source and sink.
    pub fn from_io<R, W>(
        label: &str,
        source: R,
        sink: W,
        options: LinkOptions,
        telemetry: Publisher<InboundTelemetry>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::start(label, source, sink, options, telemetry, SharedConnectionState::new(ConnectionState::Connecting))
    }

    fn start<R, W>(
        label: &str,
        source: R,
        sink: W,
        options: LinkOptions,
        telemetry: Publisher<InboundTelemetry>,
        state: SharedConnectionState,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (sender, rx) = outbound_queue(options.queue_capacity);

        let mut reader = match Worker::spawn("reader", move |stop| read_loop(source, telemetry, stop)){
            Ok(reader) => reader,
            Err(e) =>{
                state.set(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        let poll = options.write_poll;
        let writer = match Worker::spawn("writer", move |stop| write_loop(sink, rx, stop, poll)){
            Ok(writer) => writer,
            Err(e) =>{
                reader.signal();
                reader.join();
                state.set(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        state.set(ConnectionState::Connected);
        tracing::info!(port = %label, "serial link ready");

        Ok(SerialLink{
            port_name: Some(label.to_string()),
            state,
            sender,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn port_name(&self) -> Option<&str>{
        self.port_name.as_deref()
    }

    pub fn state(&self) -> ConnectionState{
        self.state.get()
    }

    pub fn shared_state(&self) -> SharedConnectionState{
        self.state.clone()
    }

    pub fn sender(&self) -> LinkSender{
        self.sender.clone()
    }

    pub fn handle_data(&self, msg: OutboundMessage) -> bool{
        self.sender.handle_data(msg)
    }

    /// Stops and joins both workers. The reader notices within one read
    /// timeout, the writer within one queue poll.
    pub fn shutdown(&mut self){
        if self.reader.is_none() && self.writer.is_none(){
            return;
        }

        for worker in [&self.reader, &self.writer].into_iter().flatten(){
            worker.signal();
        }
        self.sender = LinkSender::disconnected();

        if let Some(mut writer) = self.writer.take(){
            writer.join();
        }
        if let Some(mut reader) = self.reader.take(){
            reader.join();
        }

        self.state.set(ConnectionState::Disconnected);
        tracing::info!(port = ?self.port_name, "serial link closed");
    }
}

impl Drop for SerialLink{
    fn drop(&mut self){
        self.shutdown();
    }
}

fn read_loop<R: Read>(mut source: R, telemetry: Publisher<InboundTelemetry>, stop: Arc<AtomicBool>){
    let mut assembler = LineAssembler::new();
    let mut read_buf = [0u8; READ_CHUNK];

    while !stop.load(Ordering::SeqCst){
        match source.read(&mut read_buf){
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) =>{
                assembler.extend(&read_buf[..n]);
                while let Some(line) = assembler.next_line(){
                    match line.and_then(|bytes| decode_line(&bytes)){
                        Ok(Some(msg)) =>{
                            telemetry.publish(msg);
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "dropping malformed telemetry line"),
                    }
                }
            }
            Err(ref e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
            ) => {}
            Err(e) =>{
                tracing::error!(error = %e, "serial read failed");
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    tracing::debug!("reader exiting");
}

fn write_loop<W: Write>(mut sink: W, rx: xch::Receiver<OutboundMessage>, stop: Arc<AtomicBool>, poll: Duration){
    while !stop.load(Ordering::SeqCst){
        let msg = match rx.recv_timeout(poll){
            Ok(msg) => msg,
            Err(xch::RecvTimeoutError::Timeout) => continue,
            Err(xch::RecvTimeoutError::Disconnected) =>{
                tracing::debug!("all command producers gone");
                break;
            }
        };

        let frame = match msg.encode(){
            Ok(frame) => frame,
            Err(e) =>{
                tracing::error!(error = %e, "failed to encode command, dropped");
                continue;
            }
        };

        if let Err(e) = sink.write_all(&frame).and_then(|_| sink.flush()){
            tracing::error!(error = %e, "serial write failed, command dropped");
        }
    }
    tracing::debug!("writer exiting");
}
