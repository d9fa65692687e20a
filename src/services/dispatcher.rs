//! Hand-off of notifications to the main (UI) execution context.
//!
//! Producers post boxed closures and continue immediately. A single consumer,
//! [`MainLoop`], runs them one at a time in the order they were posted.

use tokio::sync::mpsc;

/// A unit of work to run on the main context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Posts work to another execution context without waiting for it.
pub trait Dispatcher: Send + Sync {
    fn post(&self, task: Task);
}

/// Producer side of a [`MainLoop`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MainLoopHandle {
    tx: mpsc::UnboundedSender<Task>,
}

impl Dispatcher for MainLoopHandle {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::trace!("Main loop is gone, dropping notification");
        }
    }
}

/// Single-consumer task queue standing in for the UI thread.
///
/// The loop ends once every [`MainLoopHandle`] has been dropped and the queue
/// is drained.
#[derive(Debug)]
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl MainLoop {
    pub fn new() -> (MainLoopHandle, MainLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MainLoopHandle { tx }, MainLoop { rx })
    }

    /// Runs tasks until all handles are dropped. Returns how many ran.
    pub async fn run(mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.rx.recv().await {
            task();
            ran += 1;
        }
        ran
    }

    /// Blocking variant of [`MainLoop::run`] for a dedicated thread.
    ///
    /// Panics if called from inside an async runtime.
    pub fn run_blocking(mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.rx.blocking_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs whatever is queued right now and returns, e.g. once per frame.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}
