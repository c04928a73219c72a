//! Background reader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use digimesh_api::ReadOutcome;
use tracing::{debug, trace, warn};

use crate::module::MeshModule;

/// Thread that polls the module and forwards every non-empty read pass.
pub struct ReadLoop {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReadLoop {
    /// Start reading. The thread sleeps `poll_interval` whenever a pass
    /// produced nothing; read errors are logged and the loop carries on.
    pub fn spawn(module: Arc<MeshModule>, poll_interval: Duration) -> (ReadLoop, Receiver<ReadOutcome>) {
        let (tx, rx) = unbounded();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = stop_flag.clone();

        let handle = thread::Builder::new()
            .name("digimesh-read".to_string())
            .spawn(move || {
                debug!("read loop started");
                while !thread_stop.load(Ordering::Relaxed) {
                    match module.read_serial() {
                        Ok(outcome) if !outcome.is_empty() => {
                            if tx.send(outcome).is_err() {
                                trace!("receiver dropped");
                                break;
                            }
                        }
                        Ok(_) => thread::sleep(poll_interval),
                        Err(e) => {
                            warn!("could not read serial: {}", e);
                            thread::sleep(poll_interval);
                        }
                    }
                }
                debug!("read loop stopped");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to spawn read loop: {}", e);
                None
            }
        };
        (ReadLoop { stop_flag, handle }, rx)
    }

    /// Whether the thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReadLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
