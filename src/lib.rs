//! Generates replies to screenshots of text conversations in a requested tone.
//!
//! The crate is split along the request path: [`payload`] turns an image and a
//! tone into a prompt and a base64 image, [`client`] sends both to Gemini and
//! classifies the answer, [`pipeline`] joins the two, and [`ReplyEngine`]
//! runs the pipeline on a worker thread so that a UI can poll for the result
//! while showing a busy indicator. [`shell`] is the HTTP front end.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod shell;

pub use client::GeminiClient;
pub use config::{Credential, GeminiConfig};
pub use error::{ConfigError, ReplyError, ScheduleError};
pub use payload::{ImageAsset, InlineImage, MimeType, SUPPORTED_TONES, build_prompt, encode_image};
pub use pipeline::{ReplyMetadata, ReplyPipeline, ReplyRequest};

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

// Type alias to simplify complex types
type EngineReceiver<M> = Arc<
    Mutex<
        mpsc::Receiver<
            ReplyEngineResponse<
                <<M as ReplyModel>::Request as RequestMetadata>::Metadata,
                <M as ReplyModel>::Response,
                <M as ReplyModel>::Error,
            >,
        >,
    >,
>;

/// Something that turns a request into a reply, e.g. [`ReplyPipeline`].
pub trait ReplyModel {
    /// The request type that the model accepts.
    type Request;
    /// The response type that the model returns.
    type Response;
    /// The error type returned when a request fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handles one request. Failures are handed back to the caller and do not
    /// stop the engine.
    fn run(&mut self, request: Self::Request) -> Result<Self::Response, Self::Error>;
}

/// Current state of the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplyEngineState {
    /// Ready to accept a request.
    Idle,
    /// A request is in flight.
    Processing,
}

impl ReplyEngineState {
    /// Lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyEngineState::Idle => "idle",
            ReplyEngineState::Processing => "processing",
        }
    }
}

/// Extracts lightweight metadata from a request so the engine can report on
/// it without keeping the image around.
pub trait RequestMetadata {
    /// What survives the request, e.g. the tone.
    type Metadata: Send + 'static;

    /// Snapshot taken when the request is scheduled.
    fn metadata(&self) -> Self::Metadata;
}

struct ReplyEngineRequest<Req> {
    id: u64,
    request: Req,
}

/// A finished request together with its timing.
pub struct ReplyEngineResponse<Metadata, Res, Err> {
    /// Identifier returned by [`ReplyEngine::schedule`].
    pub id: u64,
    /// When the model started working on the request.
    pub start_time: Instant,
    /// How long the model took.
    pub duration: Duration,
    /// Metadata extracted from the original request.
    pub request_metadata: Metadata,
    /// What the model produced.
    pub outcome: Result<Res, Err>,
}

/// Result of polling the engine.
pub enum ReplyEngineResult<M: ReplyModel + Send + 'static>
where
    M::Request: RequestMetadata,
{
    /// A request finished, successfully or not.
    Ready(ReplyEngineResponse<<M::Request as RequestMetadata>::Metadata, M::Response, M::Error>),
    /// Nothing to collect yet; carries the current state.
    Empty(ReplyEngineState),
    /// The worker is gone.
    Error(String),
}

/// Runs a [`ReplyModel`] on a dedicated thread, one request at a time.
///
/// [`schedule`](Self::schedule) refuses new work while a request is in
/// flight, so a double submit from the UI never produces two remote calls.
/// Results are collected with [`try_poll_response`](Self::try_poll_response).
pub struct ReplyEngine<M: ReplyModel + Send + 'static>
where
    M::Request: Send + RequestMetadata + 'static,
    M::Response: Send + 'static,
{
    state: Arc<Mutex<ReplyEngineState>>,
    req_tx: Option<mpsc::Sender<ReplyEngineRequest<M::Request>>>,
    rep_rx: EngineReceiver<M>,
    worker_handle: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<M: ReplyModel + Send + 'static> ReplyEngine<M>
where
    M::Request: Send + RequestMetadata + 'static,
    M::Response: Send + 'static,
{
    /// Moves the model onto a new worker thread.
    pub fn new(mut model: M) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<ReplyEngineRequest<M::Request>>();
        let (rep_tx, rep_rx) = mpsc::channel::<
            ReplyEngineResponse<<M::Request as RequestMetadata>::Metadata, M::Response, M::Error>,
        >();
        let state = Arc::new(Mutex::new(ReplyEngineState::Idle));

        let worker_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    log::debug!("Running reply request {}", req.id);

                    let request_metadata = req.request.metadata();
                    let start_time = Instant::now();

                    let outcome = model.run(req.request);

                    log::debug!(
                        "Reply request {} finished in {:?} (ok: {})",
                        req.id,
                        start_time.elapsed(),
                        outcome.is_ok()
                    );

                    let _ = rep_tx.send(ReplyEngineResponse {
                        id: req.id,
                        start_time,
                        duration: start_time.elapsed(),
                        request_metadata,
                        outcome,
                    });

                    // idle only once the response can be polled
                    *lock(&state) = ReplyEngineState::Idle;
                }
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            rep_rx: Arc::new(Mutex::new(rep_rx)),
            worker_handle: Some(worker_handle),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Current state of the worker.
    pub fn state(&self) -> ReplyEngineState {
        lock(&self.state).clone()
    }

    /// Collects a finished request without blocking.
    pub fn try_poll_response(&self) -> ReplyEngineResult<M> {
        let received = lock(&self.rep_rx).try_recv();
        match received {
            Ok(response) => ReplyEngineResult::Ready(response),
            Err(mpsc::TryRecvError::Empty) => ReplyEngineResult::Empty(self.state()),
            Err(mpsc::TryRecvError::Disconnected) => {
                log::error!("Response channel disconnected");
                ReplyEngineResult::Error("Response channel disconnected".to_string())
            }
        }
    }

    /// Queues a request and returns its id.
    ///
    /// Fails with [`ScheduleError::Busy`] while another request is in flight.
    /// Results of earlier requests that were never polled are dropped.
    pub fn schedule(&self, request: M::Request) -> Result<u64, ScheduleError> {
        let tx = self.req_tx.as_ref().ok_or(ScheduleError::Stopped)?;

        let mut state = lock(&self.state);
        if *state == ReplyEngineState::Processing {
            return Err(ScheduleError::Busy);
        }

        {
            let rep_rx = lock(&self.rep_rx);
            while let Ok(stale) = rep_rx.try_recv() {
                log::debug!("Dropping uncollected result of request {}", stale.id);
            }
        }

        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        tx.send(ReplyEngineRequest { id, request })
            .map_err(|_| ScheduleError::Stopped)?;
        *state = ReplyEngineState::Processing;

        Ok(id)
    }

    /// Closes the request channel and waits for the worker to finish.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

impl<M: ReplyModel + Send + 'static> Drop for ReplyEngine<M>
where
    M::Request: Send + RequestMetadata + 'static,
    M::Response: Send + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestRequest(String);

    impl RequestMetadata for TestRequest {
        type Metadata = String;

        fn metadata(&self) -> String {
            self.0.clone()
        }
    }

    /// Waits for a signal on `gate` before answering each request.
    struct GatedModel {
        gate: mpsc::Receiver<()>,
    }

    impl ReplyModel for GatedModel {
        type Request = TestRequest;
        type Response = String;
        type Error = std::io::Error;

        fn run(&mut self, request: TestRequest) -> Result<String, std::io::Error> {
            let _ = self.gate.recv();
            if request.0 == "fail" {
                Err(std::io::Error::other("model failure"))
            } else {
                Ok(format!("reply to {}", request.0))
            }
        }
    }

    fn gated_engine() -> (ReplyEngine<GatedModel>, mpsc::Sender<()>) {
        let (gate_tx, gate) = mpsc::channel();
        (ReplyEngine::new(GatedModel { gate }), gate_tx)
    }

    fn wait_for_ready(
        engine: &ReplyEngine<GatedModel>,
    ) -> ReplyEngineResponse<String, String, std::io::Error> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match engine.try_poll_response() {
                ReplyEngineResult::Ready(response) => return response,
                ReplyEngineResult::Empty(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5))
                }
                ReplyEngineResult::Empty(state) => panic!("timed out in state {state:?}"),
                ReplyEngineResult::Error(e) => panic!("engine error: {e}"),
            }
        }
    }

    fn wait_for_idle(engine: &ReplyEngine<GatedModel>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.state() != ReplyEngineState::Idle {
            assert!(Instant::now() < deadline, "engine never went idle");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn starts_idle_with_nothing_to_poll() {
        let (engine, _gate) = gated_engine();
        assert_eq!(engine.state(), ReplyEngineState::Idle);
        assert!(matches!(
            engine.try_poll_response(),
            ReplyEngineResult::Empty(ReplyEngineState::Idle)
        ));
    }

    #[test]
    fn rejects_second_request_while_processing() {
        let (engine, gate) = gated_engine();

        let first = engine.schedule(TestRequest("hi".into())).unwrap();
        assert_eq!(engine.state(), ReplyEngineState::Processing);
        assert!(matches!(
            engine.schedule(TestRequest("again".into())),
            Err(ScheduleError::Busy)
        ));

        gate.send(()).unwrap();
        let response = wait_for_ready(&engine);
        assert_eq!(response.id, first);
        assert_eq!(response.request_metadata, "hi");
        assert_eq!(response.outcome.unwrap(), "reply to hi");

        wait_for_idle(&engine);
        let second = engine.schedule(TestRequest("again".into())).unwrap();
        assert!(second > first);
        gate.send(()).unwrap();
        assert_eq!(wait_for_ready(&engine).outcome.unwrap(), "reply to again");
    }

    #[test]
    fn model_failure_is_delivered_and_engine_keeps_running() {
        let (engine, gate) = gated_engine();

        engine.schedule(TestRequest("fail".into())).unwrap();
        gate.send(()).unwrap();
        let err = wait_for_ready(&engine).outcome.unwrap_err();
        assert_eq!(err.to_string(), "model failure");

        wait_for_idle(&engine);
        engine.schedule(TestRequest("retry".into())).unwrap();
        gate.send(()).unwrap();
        assert_eq!(wait_for_ready(&engine).outcome.unwrap(), "reply to retry");
    }

    #[test]
    fn uncollected_result_is_dropped_on_next_schedule() {
        let (engine, gate) = gated_engine();

        engine.schedule(TestRequest("old".into())).unwrap();
        gate.send(()).unwrap();
        wait_for_idle(&engine);

        let id = engine.schedule(TestRequest("new".into())).unwrap();
        gate.send(()).unwrap();
        let response = wait_for_ready(&engine);
        assert_eq!(response.id, id);
        assert_eq!(response.request_metadata, "new");
    }

    #[test]
    fn stopped_engine_refuses_work() {
        let (mut engine, _gate) = gated_engine();
        engine.stop();
        assert!(matches!(
            engine.schedule(TestRequest("late".into())),
            Err(ScheduleError::Stopped)
        ));
    }
}
