//! Asynchronous mode: one worker thread draining a FIFO task queue.
//!
//! # Design
//! Tasks travel over an unbounded crossbeam channel to a single named worker
//! thread, which runs them one at a time through the shared `Engine`.
//! Shutdown uses a second channel: dropping its sender wakes the worker
//! even while the task queue is empty. Before it drops that sender,
//! shutdown raises the engine's `StopFlag`. The in-flight request observes
//! the flag through its cancellation predicate. The worker checks the flag
//! before each queued task, so tasks still waiting are discarded and their
//! callbacks never run.
//!
//! User code runs on the worker through the logger, the progress callback
//! and the response callback. A panic in any of them is caught and logged.
//! The worker moves on to the next task. When the panic comes from the
//! logger or the progress callback, the request has no outcome and its
//! response callback is dropped without running.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, unbounded, Receiver, Sender};

use crate::cancel::StopFlag;
use crate::engine::Engine;
use crate::http::{HttpResponse, RequestArgs};

/// Receives the outcome of a queued request on the worker thread.
pub type ResponseCallback = Box<dyn FnOnce(HttpResponse) + Send + 'static>;

const WORKER_NAME: &str = "wirehttp-worker";

struct Task {
    args: RequestArgs,
    on_response: ResponseCallback,
}

pub struct Dispatcher {
    tasks: Sender<Task>,
    shutdown: Option<Sender<()>>,
    stop: StopFlag,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the worker. `engine` must have been built with `stop`.
    pub fn spawn(engine: Arc<Engine>, stop: StopFlag) -> io::Result<Self> {
        let (tasks, task_rx) = unbounded();
        let (shutdown, shutdown_rx) = unbounded();
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker_loop(&engine, &task_rx, &shutdown_rx))?;

        Ok(Self {
            tasks,
            shutdown: Some(shutdown),
            stop,
            worker: Some(worker),
        })
    }

    /// Queue a request. Returns `false` once shutdown has begun.
    pub fn enqueue(&self, args: RequestArgs, on_response: ResponseCallback) -> bool {
        if self.stop.is_raised() {
            return false;
        }
        self.tasks.send(Task { args, on_response }).is_ok()
    }

    /// Number of tasks waiting; the one being executed is not counted.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    fn shutdown(&mut self) {
        self.stop.raise();
        drop(self.shutdown.take());

        let Some(worker) = self.worker.take() else {
            return;
        };
        // A callback can drop the last client handle from the worker itself.
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            tracing::error!("dispatcher worker panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(engine: &Engine, tasks: &Receiver<Task>, shutdown: &Receiver<()>) {
    tracing::debug!("dispatcher worker started");
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(tasks) -> task => {
                let Ok(task) = task else { break };
                if engine.stop_flag().is_raised() {
                    break;
                }
                run_task(engine, task);
            }
        }
    }
    let dropped = tasks.len();
    if dropped > 0 {
        tracing::debug!(dropped, "discarding queued requests on shutdown");
    }
    tracing::debug!("dispatcher worker stopped");
}

fn run_task(engine: &Engine, task: Task) {
    let Task { args, on_response } = task;
    let request = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.request(&args.url, args.method, &args.body, &args)
    }));
    let Ok(response) = request else {
        tracing::error!(url = %args.url, "request callback panicked, dropping task");
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(move || on_response(response))).is_err() {
        tracing::error!(url = %args.url, "response callback panicked");
    }
}
