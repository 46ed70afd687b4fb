//! Two-stage shutdown: the first request drains, the second one escalates.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A termination request from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Interrupt,
}

impl core::fmt::Display for Signal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Signal::Terminate => "SIGTERM",
            Signal::Interrupt => "SIGINT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownStage {
    #[default]
    Running,
    /// Finish the current cycle, drain the queue, then stop.
    Requested,
    /// Stop now, without draining.
    Escalated,
}

/// Shared shutdown state.
///
/// Cheap to clone; every clone observes the same stage. Stages only move
/// forward.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    stage: Arc<watch::Sender<ShutdownStage>>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        let (stage, _) = watch::channel(ShutdownStage::Running);
        Self {
            stage: Arc::new(stage),
        }
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> ShutdownStage {
        *self.stage.borrow()
    }

    pub fn is_requested(&self) -> bool {
        self.stage() != ShutdownStage::Running
    }

    pub fn is_escalated(&self) -> bool {
        self.stage() == ShutdownStage::Escalated
    }

    /// Record a signal and return the stage it moved us to.
    ///
    /// The first signal of either kind requests a graceful shutdown; any
    /// later one escalates.
    pub fn notify(&self, signal: Signal) -> ShutdownStage {
        let mut next = ShutdownStage::Running;
        self.stage.send_modify(|stage| {
            *stage = match *stage {
                ShutdownStage::Running => ShutdownStage::Requested,
                ShutdownStage::Requested | ShutdownStage::Escalated => ShutdownStage::Escalated,
            };
            next = *stage;
        });

        match next {
            ShutdownStage::Requested => {
                info!(signal = %signal, "received signal, initiating graceful shutdown")
            }
            _ => warn!(signal = %signal, "second signal received, exiting immediately"),
        }
        next
    }

    /// Resolves once a shutdown has been requested (or escalated).
    pub async fn requested(&self) {
        self.wait_for(|stage| stage != ShutdownStage::Running).await;
    }

    /// Resolves once a shutdown has escalated.
    pub async fn escalated(&self) {
        self.wait_for(|stage| stage == ShutdownStage::Escalated).await;
    }

    async fn wait_for(&self, done: impl Fn(ShutdownStage) -> bool) {
        let mut rx = self.stage.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stage| done(*stage)).await;
    }

    /// Forward SIGTERM / SIGINT to [`notify`](Self::notify) until escalation.
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        let coordinator = self.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut terminate = signal(SignalKind::terminate())?;
            let mut interrupt = signal(SignalKind::interrupt())?;
            Ok(tokio::spawn(async move {
                loop {
                    let received = tokio::select! {
                        Some(()) = terminate.recv() => Signal::Terminate,
                        Some(()) = interrupt.recv() => Signal::Interrupt,
                        else => break,
                    };
                    if coordinator.notify(received) == ShutdownStage::Escalated {
                        break;
                    }
                }
            }))
        }

        #[cfg(not(unix))]
        {
            Ok(tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if coordinator.notify(Signal::Interrupt) == ShutdownStage::Escalated {
                        break;
                    }
                }
            }))
        }
    }
}
