//! Environment worker threads and their runner-side handles.
//!
//! Each worker owns exactly one environment, built inside the worker
//! thread by a shared factory so the environment itself never crosses a
//! thread boundary. The worker loop receives a [`WorkerCommand`], executes
//! it, and sends back exactly one [`WorkerResponse`] over a bounded(1)
//! reply channel. It runs until it is told to close or the command
//! channel is dropped.
//!
//! Workers are threads of the runner's process. A panicking environment
//! only takes down its own thread and surfaces as a disconnect, but an
//! environment that aborts the process or crashes in native code takes
//! the runner with it. Wrap such environments in their own process behind
//! an [`Environment`] adapter.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use skirmish_core::{
    EnvError, Environment, ObservationKind, ResetReply, StepReply, WorkerCommand, WorkerResponse,
    WorkerSeed,
};

// ── Error type ──────────────────────────────────────────────────

/// Errors from a single worker's request/response channel.
#[derive(Debug, PartialEq)]
pub enum WorkerError {
    /// A request was sent while an earlier one is still unanswered.
    RequestPending {
        /// Worker rank.
        rank: usize,
        /// Protocol name of the unanswered request.
        pending: &'static str,
    },
    /// `recv` was called with no request in flight.
    NoRequestPending {
        /// Worker rank.
        rank: usize,
    },
    /// The worker thread is gone (exited or panicked).
    Disconnected {
        /// Worker rank.
        rank: usize,
    },
    /// No reply arrived within the configured timeout.
    Timeout {
        /// Worker rank.
        rank: usize,
        /// How long the caller waited.
        waited: Duration,
    },
    /// The environment factory failed inside the worker thread.
    Startup {
        /// Worker rank.
        rank: usize,
        /// The factory's error.
        error: EnvError,
    },
    /// The worker replied with the wrong response kind.
    Protocol {
        /// Worker rank.
        rank: usize,
        /// Response kind the caller expected.
        expected: &'static str,
        /// Response kind actually received.
        got: &'static str,
    },
    /// The worker thread could not be spawned.
    SpawnFailed {
        /// Worker rank.
        rank: usize,
        /// OS error description.
        reason: String,
    },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestPending { rank, pending } => {
                write!(f, "worker {rank}: '{pending}' request still pending")
            }
            Self::NoRequestPending { rank } => write!(f, "worker {rank}: no request pending"),
            Self::Disconnected { rank } => write!(f, "worker {rank}: disconnected"),
            Self::Timeout { rank, waited } => {
                write!(f, "worker {rank}: no reply after {waited:?}")
            }
            Self::Startup { rank, error } => {
                write!(f, "worker {rank}: environment startup failed: {error}")
            }
            Self::Protocol {
                rank,
                expected,
                got,
            } => write!(f, "worker {rank}: expected '{expected}' reply, got '{got}'"),
            Self::SpawnFailed { rank, reason } => {
                write!(f, "worker {rank}: thread spawn failed: {reason}")
            }
        }
    }
}

impl Error for WorkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Startup { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ── Worker loop ─────────────────────────────────────────────────

/// Thread body: build the environment, report readiness, serve commands.
fn worker_main<E, F>(
    seed: WorkerSeed,
    kind: ObservationKind,
    factory: Arc<F>,
    cmd_rx: Receiver<WorkerCommand>,
    resp_tx: Sender<WorkerResponse>,
) where
    E: Environment,
    F: Fn(WorkerSeed) -> Result<E, EnvError>,
{
    let env = match (*factory)(seed) {
        Ok(env) => env,
        Err(e) => {
            let _ = resp_tx.send(WorkerResponse::Failed(e));
            return;
        }
    };
    if resp_tx.send(WorkerResponse::Ready).is_err() {
        return;
    }
    worker_loop(env, kind, cmd_rx, resp_tx);
}

/// Serve commands until `Close` or until the command channel is dropped.
///
/// The environment is closed exactly once on either exit path.
fn worker_loop<E: Environment>(
    mut env: E,
    kind: ObservationKind,
    cmd_rx: Receiver<WorkerCommand>,
    resp_tx: Sender<WorkerResponse>,
) {
    let mut closed = false;
    while let Ok(cmd) = cmd_rx.recv() {
        let response = match cmd {
            WorkerCommand::Reset(options) => match env.reset(&options) {
                Ok(()) => WorkerResponse::Reset(ResetReply {
                    observation: env.observe(kind),
                    scenario: env.scenario(),
                }),
                Err(e) => WorkerResponse::Failed(e),
            },
            WorkerCommand::Step(actions) => match env.step(&actions) {
                Ok(outcome) => WorkerResponse::Step(StepReply {
                    reward: outcome.reward,
                    terminated: outcome.terminated,
                    info: outcome.info,
                    observation: env.observe(kind),
                }),
                Err(e) => WorkerResponse::Failed(e),
            },
            WorkerCommand::GetStats => WorkerResponse::Stats(env.stats()),
            WorkerCommand::GetEnvInfo => WorkerResponse::EnvInfo(env.env_info()),
            WorkerCommand::Close => {
                env.close();
                closed = true;
                WorkerResponse::Closed
            }
        };
        if resp_tx.send(response).is_err() || closed {
            break;
        }
    }
    if !closed {
        env.close();
    }
}

// ── WorkerHandle ────────────────────────────────────────────────

/// Runner-side endpoint of one worker thread.
///
/// Enforces the one-request-in-flight rule: [`send`](Self::send) fails
/// while an earlier request is unanswered, and [`recv`](Self::recv) fails
/// when nothing was asked.
pub struct WorkerHandle {
    rank: usize,
    cmd_tx: Option<Sender<WorkerCommand>>,
    resp_rx: Receiver<WorkerResponse>,
    thread: Option<JoinHandle<()>>,
    pending: Option<&'static str>,
}

impl WorkerHandle {
    /// Spawn a worker thread named `skirmish-worker-{rank}`.
    ///
    /// Returns as soon as the thread is running; the environment is built
    /// asynchronously. Call [`wait_ready`](Self::wait_ready) before sending
    /// commands.
    pub fn spawn<E, F>(
        seed: WorkerSeed,
        kind: ObservationKind,
        factory: Arc<F>,
    ) -> Result<Self, WorkerError>
    where
        E: Environment + 'static,
        F: Fn(WorkerSeed) -> Result<E, EnvError> + Send + Sync + 'static,
    {
        let rank = seed.rank;
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(1);
        let (resp_tx, resp_rx) = crossbeam_channel::bounded(1);
        let thread = thread::Builder::new()
            .name(format!("skirmish-worker-{rank}"))
            .spawn(move || worker_main(seed, kind, factory, cmd_rx, resp_tx))
            .map_err(|e| WorkerError::SpawnFailed {
                rank,
                reason: e.to_string(),
            })?;
        Ok(Self {
            rank,
            cmd_tx: Some(cmd_tx),
            resp_rx,
            thread: Some(thread),
            pending: Some("ready"),
        })
    }

    /// Worker rank (equal to the batch slot it serves).
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether a request is awaiting its reply.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_none()
    }

    /// Block until the worker reports that its environment is built.
    pub fn wait_ready(&mut self, timeout: Option<Duration>) -> Result<(), WorkerError> {
        match self.recv(timeout)? {
            WorkerResponse::Ready => Ok(()),
            WorkerResponse::Failed(error) => Err(WorkerError::Startup {
                rank: self.rank,
                error,
            }),
            other => Err(WorkerError::Protocol {
                rank: self.rank,
                expected: "ready",
                got: other.name(),
            }),
        }
    }

    /// Send a command without waiting for the reply.
    pub fn send(&mut self, cmd: WorkerCommand) -> Result<(), WorkerError> {
        if let Some(pending) = self.pending {
            return Err(WorkerError::RequestPending {
                rank: self.rank,
                pending,
            });
        }
        let tx = self
            .cmd_tx
            .as_ref()
            .ok_or(WorkerError::Disconnected { rank: self.rank })?;
        let name = cmd.name();
        tx.send(cmd)
            .map_err(|_| WorkerError::Disconnected { rank: self.rank })?;
        self.pending = Some(name);
        Ok(())
    }

    /// Receive the reply to the request in flight.
    ///
    /// On timeout the request stays pending; its reply may still arrive.
    pub fn recv(&mut self, timeout: Option<Duration>) -> Result<WorkerResponse, WorkerError> {
        if self.pending.is_none() {
            return Err(WorkerError::NoRequestPending { rank: self.rank });
        }
        let rank = self.rank;
        let response = match timeout {
            None => self
                .resp_rx
                .recv()
                .map_err(|_| WorkerError::Disconnected { rank })?,
            Some(waited) => self.resp_rx.recv_timeout(waited).map_err(|e| match e {
                RecvTimeoutError::Timeout => WorkerError::Timeout { rank, waited },
                RecvTimeoutError::Disconnected => WorkerError::Disconnected { rank },
            })?,
        };
        self.pending = None;
        Ok(response)
    }

    /// Send a command and wait for its reply.
    pub fn request(
        &mut self,
        cmd: WorkerCommand,
        timeout: Option<Duration>,
    ) -> Result<WorkerResponse, WorkerError> {
        self.send(cmd)?;
        self.recv(timeout)
    }

    /// Close the environment and join the worker thread.
    ///
    /// A reply still in flight is drained first. The thread is not joined
    /// if the worker stopped answering, so a hung environment cannot block
    /// the caller past the timeout. Closing twice is a no-op.
    pub fn close(&mut self, timeout: Option<Duration>) -> Result<(), WorkerError> {
        if self.cmd_tx.is_none() {
            return Ok(());
        }
        let result = self.close_inner(timeout);
        self.cmd_tx = None;
        if let Some(thread) = self.thread.take() {
            if !matches!(result, Err(WorkerError::Timeout { .. })) && thread.join().is_err() {
                tracing::warn!(rank = self.rank, "worker thread panicked");
            }
        }
        result
    }

    fn close_inner(&mut self, timeout: Option<Duration>) -> Result<(), WorkerError> {
        if self.pending.is_some() {
            self.recv(timeout)?;
        }
        match self.request(WorkerCommand::Close, timeout)? {
            WorkerResponse::Closed => Ok(()),
            other => Err(WorkerError::Protocol {
                rank: self.rank,
                expected: "closed",
                got: other.name(),
            }),
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("rank", &self.rank)
            .field("pending", &self.pending)
            .field("closed", &self.is_closed())
            .finish()
    }
}
