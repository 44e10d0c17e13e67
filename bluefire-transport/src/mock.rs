//! Scripted in-memory transport for tests
//!
//! Each PSM gets a queue of scripted outcomes. Channels replay their steps in
//! order and report `Received::Timeout` once the script runs out; listeners do
//! the same with accept attempts. Everything that happens is appended to a
//! shared event log so tests can assert on call order.
//!
//! ```ignore
//! let mock = MockTransport::new();
//! mock.script_listener(
//!     Psm::INTERRUPT,
//!     ScriptedListener::new(Psm::INTERRUPT)
//!         .timeouts(3)
//!         .accept(ScriptedChannel::new(Psm::INTERRUPT).data(&[0xA1, 0, 2, 0])),
//! );
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::types::{BdAddr, Psm, Received};
use crate::{Channel, Listener, Transport};

/// Something observable the mock did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Connect(Psm),
    Listen(Psm),
    AcceptTimeout(Psm),
    Accepted(Psm),
    Receive(Psm),
    Shutdown(Psm),
}

type EventLog = Arc<Mutex<Vec<MockEvent>>>;

enum RecvStep {
    Data(Vec<u8>),
    Timeout,
    PeerClosed,
    Interrupted,
    Fail(io::ErrorKind),
}

/// A channel that replays a fixed script of receive outcomes
pub struct ScriptedChannel {
    psm: Psm,
    steps: VecDeque<RecvStep>,
    reset_on_shutdown: bool,
    log: Option<EventLog>,
}

impl ScriptedChannel {
    pub fn new(psm: Psm) -> Self {
        Self {
            psm,
            steps: VecDeque::new(),
            reset_on_shutdown: false,
            log: None,
        }
    }

    /// Deliver one message
    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.steps.push_back(RecvStep::Data(bytes.to_vec()));
        self
    }

    /// Time out `n` times in a row
    pub fn timeouts(mut self, n: usize) -> Self {
        self.steps.extend((0..n).map(|_| RecvStep::Timeout));
        self
    }

    /// Report an orderly close from the remote side
    pub fn peer_closed(mut self) -> Self {
        self.steps.push_back(RecvStep::PeerClosed);
        self
    }

    /// Return early as if a signal arrived
    pub fn interrupted(mut self) -> Self {
        self.steps.push_back(RecvStep::Interrupted);
        self
    }

    /// Fail the receive with an OS error of the given kind
    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.steps.push_back(RecvStep::Fail(kind));
        self
    }

    /// Make `shutdown()` report that the peer already reset the link
    pub fn reset_on_shutdown(mut self) -> Self {
        self.reset_on_shutdown = true;
        self
    }

    fn record(&self, event: MockEvent) {
        if let Some(log) = &self.log {
            log.lock().push(event);
        }
    }
}

impl Channel for ScriptedChannel {
    fn psm(&self) -> Psm {
        self.psm
    }

    fn receive(&mut self, _timeout: Duration) -> Result<Received, TransportError> {
        self.record(MockEvent::Receive(self.psm));
        match self.steps.pop_front() {
            Some(RecvStep::Data(bytes)) => Ok(Received::Data(bytes)),
            Some(RecvStep::Timeout) | None => Ok(Received::Timeout),
            Some(RecvStep::PeerClosed) => Ok(Received::PeerClosed),
            Some(RecvStep::Interrupted) => Ok(Received::Interrupted),
            Some(RecvStep::Fail(kind)) => Err(TransportError::from(io::Error::from(kind))),
        }
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        self.record(MockEvent::Shutdown(self.psm));
        if self.reset_on_shutdown {
            Err(TransportError::PeerReset)
        } else {
            Ok(())
        }
    }
}

enum AcceptStep {
    Timeout,
    Accept(ScriptedChannel),
    Fail(io::ErrorKind),
}

/// A listener that replays a fixed script of accept outcomes
pub struct ScriptedListener {
    psm: Psm,
    steps: VecDeque<AcceptStep>,
    log: Option<EventLog>,
}

impl ScriptedListener {
    pub fn new(psm: Psm) -> Self {
        Self {
            psm,
            steps: VecDeque::new(),
            log: None,
        }
    }

    /// Time out `n` accept attempts in a row
    pub fn timeouts(mut self, n: usize) -> Self {
        self.steps.extend((0..n).map(|_| AcceptStep::Timeout));
        self
    }

    /// Hand out `channel` on the next accept attempt
    pub fn accept(mut self, channel: ScriptedChannel) -> Self {
        self.steps.push_back(AcceptStep::Accept(channel));
        self
    }

    /// Fail the next accept attempt
    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.steps.push_back(AcceptStep::Fail(kind));
        self
    }

    fn record(&self, event: MockEvent) {
        if let Some(log) = &self.log {
            log.lock().push(event);
        }
    }
}

impl Listener for ScriptedListener {
    fn psm(&self) -> Psm {
        self.psm
    }

    fn accept(&mut self, _timeout: Duration) -> Result<Option<Box<dyn Channel>>, TransportError> {
        match self.steps.pop_front() {
            Some(AcceptStep::Accept(mut channel)) => {
                self.record(MockEvent::Accepted(self.psm));
                channel.log = self.log.clone();
                Ok(Some(Box::new(channel)))
            }
            Some(AcceptStep::Timeout) | None => {
                self.record(MockEvent::AcceptTimeout(self.psm));
                Ok(None)
            }
            Some(AcceptStep::Fail(kind)) => Err(TransportError::AcceptFailed {
                psm: self.psm,
                source: io::Error::from(kind),
            }),
        }
    }
}

#[derive(Default)]
struct Scripts {
    connect: HashMap<Psm, VecDeque<Result<ScriptedChannel, io::ErrorKind>>>,
    listen: HashMap<Psm, VecDeque<Result<ScriptedListener, io::ErrorKind>>>,
}

/// Scripted transport; unscripted connects are refused and unscripted
/// listens fail with `AddrInUse`
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<Scripts>,
    log: EventLog,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a channel for the next `connect` on `psm`
    pub fn script_connect(&self, psm: Psm, channel: ScriptedChannel) {
        self.scripts
            .lock()
            .connect
            .entry(psm)
            .or_default()
            .push_back(Ok(channel));
    }

    /// Make the next `connect` on `psm` fail
    pub fn script_connect_error(&self, psm: Psm, kind: io::ErrorKind) {
        self.scripts
            .lock()
            .connect
            .entry(psm)
            .or_default()
            .push_back(Err(kind));
    }

    /// Queue a listener for the next `listen` on `psm`
    pub fn script_listener(&self, psm: Psm, listener: ScriptedListener) {
        self.scripts
            .lock()
            .listen
            .entry(psm)
            .or_default()
            .push_back(Ok(listener));
    }

    /// Make the next `listen` on `psm` fail
    pub fn script_listen_error(&self, psm: Psm, kind: io::ErrorKind) {
        self.scripts
            .lock()
            .listen
            .entry(psm)
            .or_default()
            .push_back(Err(kind));
    }

    /// Snapshot of everything that happened so far
    pub fn events(&self) -> Vec<MockEvent> {
        self.log.lock().clone()
    }

    /// Number of logged events matching `event`
    pub fn count(&self, event: &MockEvent) -> usize {
        self.log.lock().iter().filter(|e| *e == event).count()
    }
}

impl Transport for MockTransport {
    fn connect(&self, _addr: &BdAddr, psm: Psm) -> Result<Box<dyn Channel>, TransportError> {
        self.log.lock().push(MockEvent::Connect(psm));
        let next = self
            .scripts
            .lock()
            .connect
            .get_mut(&psm)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(Ok(mut channel)) => {
                channel.log = Some(Arc::clone(&self.log));
                Ok(Box::new(channel))
            }
            Some(Err(kind)) => Err(TransportError::ConnectFailed {
                psm,
                source: io::Error::from(kind),
            }),
            None => Err(TransportError::ConnectFailed {
                psm,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        }
    }

    fn listen(&self, _addr: &BdAddr, psm: Psm) -> Result<Box<dyn Listener>, TransportError> {
        self.log.lock().push(MockEvent::Listen(psm));
        let next = self
            .scripts
            .lock()
            .listen
            .get_mut(&psm)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(Ok(mut listener)) => {
                listener.log = Some(Arc::clone(&self.log));
                Ok(Box::new(listener))
            }
            Some(Err(kind)) => Err(TransportError::ListenFailed {
                psm,
                source: io::Error::from(kind),
            }),
            None => Err(TransportError::ListenFailed {
                psm,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
