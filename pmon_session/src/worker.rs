// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Worker-thread pool driving per-entity monitoring loops.

use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use pmon_decode::ProfileTable;

/// Logical id of a monitored entity (a CPU for system-wide sessions, a
/// task slot otherwise).
pub type EntityId = u32;

/// Control messages delivered to worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Start monitoring an entity on this worker.
    AddEntity(EntityId),

    /// Stop monitoring an entity and release its resources.
    RemoveEntity(EntityId),

    /// Finish the current iteration and exit.
    Terminate,
}

/// Why the session stopped. The first recorded reason wins; later ones
/// are ignored so the root cause is reported, not the cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuitReason {
    /// Still running.
    None,

    /// The monitored workload or timeout completed normally.
    Finished,

    /// The user interrupted the session.
    Interrupted,

    /// A per-entity setup or decode failure stopped the session.
    EntityError,
}

/// A pool of worker threads, one per monitored entity group, each fed by
/// its own control channel.
///
/// In aggregate mode all workers share one profile table behind a single
/// mutex, held only across individual `record` calls and the final
/// reduce; otherwise each worker owns its table and no locking happens
/// on the sampling path.
pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Control>>,
    handles: Vec<thread::JoinHandle<()>>,
    quit: Arc<Mutex<QuitReason>>,
    shared_profile: Option<Arc<Mutex<ProfileTable>>>,
}

impl WorkerPool {
    /// Spawns `workers` threads running `handler(worker_index, control)`
    /// for every message until [`Control::Terminate`].
    ///
    /// `shared_profile` is the aggregate-mode table, or `None` when each
    /// worker accumulates privately.
    pub fn spawn<H>(
        workers: usize,
        shared_profile: Option<Arc<Mutex<ProfileTable>>>,
        handler: H,
    ) -> WorkerPool
    where
        H: Fn(usize, Control) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let quit = Arc::new(Mutex::new(QuitReason::None));
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (sender, receiver) = mpsc::channel::<Control>();
            let handler = Arc::clone(&handler);
            handles.push(thread::spawn(move || {
                // A closed channel means the pool was dropped; exit quietly.
                while let Ok(control) = receiver.recv() {
                    handler(index, control);
                    if control == Control::Terminate {
                        break;
                    }
                }
            }));
            senders.push(sender);
        }

        return WorkerPool {
            senders,
            handles,
            quit,
            shared_profile,
        };
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        return self.senders.len();
    }

    /// The aggregate-mode profile table, when one is shared.
    pub fn shared_profile(&self) -> Option<&Arc<Mutex<ProfileTable>>> {
        return self.shared_profile.as_ref();
    }

    /// Sends a control message to one worker. Returns false if the
    /// worker already exited.
    pub fn send(&self, worker: usize, control: Control) -> bool {
        return self.senders[worker].send(control).is_ok();
    }

    /// Records why the session is stopping. Only the first reason is
    /// kept.
    pub fn set_quit_reason(&self, reason: QuitReason) {
        let mut quit = self.quit.lock().unwrap();
        if *quit == QuitReason::None {
            *quit = reason;
        }
    }

    /// The recorded stop reason.
    pub fn quit_reason(&self) -> QuitReason {
        return *self.quit.lock().unwrap();
    }

    /// Sends [`Control::Terminate`] everywhere and joins every thread.
    pub fn shutdown(mut self) -> QuitReason {
        for sender in &self.senders {
            // Ignore workers that already exited.
            let _ = sender.send(Control::Terminate);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked during shutdown");
            }
        }
        return self.quit_reason();
    }
}
