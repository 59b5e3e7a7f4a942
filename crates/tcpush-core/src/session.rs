//! Transfer sessions and their lifecycle
//!
//! A [`TransferSession`] owns exactly one connection and one file for the
//! length of one data loop. Running the session consumes it, so it can't be
//! reused, and both handles are dropped (closed) on every return path.
//!
//! [`SessionState`] models the lifecycle shared by both peers:
//!
//! ```text
//! Idle ──> Connecting ──┐
//!   │                   ├──> Transferring ──> Closed(Success | Failed)
//!   └────> Listening ───┘
//! ```
//!
//! Any non-terminal state may go straight to `Closed(Failed)`. No state is
//! re-entered and `Closed` is terminal.

use std::fs::File;
use std::net::{SocketAddr, TcpStream};

use tracing::{debug, warn};

use crate::copy::CopyError;
use crate::io::Transport;
use crate::progress::TransferProgressTracker;
use crate::types::ByteCount;

/// How a closed session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

/// Lifecycle state of one sender or receiver invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Listening,
    Transferring,
    Closed(Outcome),
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed(_))
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Connecting) | (Idle, Listening) => true,
            (Connecting, Transferring) | (Listening, Transferring) => true,
            (Transferring, Closed(_)) => true,
            (Idle | Connecting | Listening, Closed(Outcome::Failed)) => true,
            _ => false,
        }
    }
}

/// Walks one invocation through [`SessionState`], logging each step.
#[derive(Debug)]
pub struct StateTracker {
    role: &'static str,
    state: SessionState,
}

impl StateTracker {
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`. Illegal transitions are a programming error.
    pub fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "{}: illegal transition {:?} -> {:?}",
            self.role,
            self.state,
            next
        );
        debug!("{}: {:?} -> {:?}", self.role, self.state, next);
        self.state = next;
    }

    /// Close with the outcome of the invocation
    pub fn finish(&mut self, success: bool) {
        if self.state.is_terminal() {
            return;
        }
        let outcome = if success {
            Outcome::Success
        } else {
            Outcome::Failed
        };
        self.advance(SessionState::Closed(outcome));
    }
}

/// One connection plus one file, for exactly one transfer
pub struct TransferSession<'t> {
    transport: &'t dyn Transport,
    stream: TcpStream,
    file: File,
    peer: SocketAddr,
    chunk_size: usize,
}

impl<'t> TransferSession<'t> {
    pub fn new(
        transport: &'t dyn Transport,
        stream: TcpStream,
        file: File,
        peer: SocketAddr,
        chunk_size: usize,
    ) -> Self {
        Self {
            transport,
            stream,
            file,
            peer,
            chunk_size,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Push the whole file to the peer, then shut down the write half so the
    /// peer sees end of stream.
    pub fn send(mut self, tracker: &mut TransferProgressTracker) -> Result<ByteCount, CopyError> {
        let sent = self
            .transport
            .send(&mut self.file, &mut self.stream, self.chunk_size, tracker)?;

        let TransferSession {
            transport,
            stream,
            file,
            peer,
            ..
        } = self;
        drop(file);
        if let Err(e) = transport.close(stream) {
            // Every byte was already handed to the kernel; the peer decides what it got.
            warn!("closing connection to {} failed: {}", peer, e);
        }
        Ok(sent)
    }

    /// Write everything the peer sends into the file until it closes the connection.
    pub fn receive(
        mut self,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError> {
        self.transport
            .receive(&mut self.stream, &mut self.file, self.chunk_size, tracker)
    }
}
