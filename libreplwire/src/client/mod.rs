//! Client for an interpreter's control server.
//!
//! One task per [Client] owns the [Connection] and the table of in-flight requests. Handles
//! talk to it over a channel, so registering a request and dispatching responses are
//! serialized through the same event loop.

mod completion;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub use self::completion::{Callbacks, Completion, Failure, Ticket};
use crate::config::{Config, ErrorDisplay};
use crate::connection::Connection;
use crate::editor::{ContextId, Editor, Progress, Selection};
use crate::escape::quote;
use crate::namespace::{NamespacePath, NamespaceSpec};
use crate::request::{Request, RequestId};
use crate::response::Response;
use crate::stage::{self, StagedFile, Stager};
use crate::tracker::Tracker;
use crate::{Error, Result};

/// Handle for client
pub struct Client {
    /// Sender half to send messages to shared task
    hdl_tx: mpsc::Sender<Event>,
    /// Cancellation token to shutdown async task
    cancel: CancellationToken,
    stager: Stager,
    inline_limit: usize,
    editor: Arc<dyn Editor>,
    session: String,
}

/// Messages processed by event loop
#[derive(Debug)]
enum Event {
    /// Register and send a request
    SendRequest {
        req: Request,
        inflight: Inflight,
        registered_tx: oneshot::Sender<Result<()>>,
    },
    /// Response received from remote
    RecvResponse(Response),
    /// Query ids of in-flight requests
    Outstanding(oneshot::Sender<Vec<RequestId>>),
}

/// Metadata of a request awaiting its terminal response
#[derive(Debug)]
struct Inflight {
    /// Context request was sent from
    origin: ContextId,
    callbacks: Callbacks,
    done_tx: oneshot::Sender<Completion>,
    staged: Option<StagedFile>,
}

/// The state of active [Client]
struct State {
    /// The connection to interpreter
    conn: Connection,
    /// Requests awaiting terminal response
    tracker: Tracker<Inflight>,
    editor: Arc<dyn Editor>,
    error_display: ErrorDisplay,
    /// Name of session, used for its diagnostic surface
    session: String,
}

impl Client {
    /// Create new client over connection to interpreter
    pub fn new(conn: Connection, editor: Arc<dyn Editor>, config: &Config) -> Self {
        let (hdl_tx, hdl_rx) = mpsc::channel(config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let session = conn.peer().to_string();

        let state = State::new(conn, editor.clone(), config.error_display);
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            match run(state, hdl_rx, cancel_clone).await {
                Ok(()) => debug!("client terminated"),
                Err(Error::ConnectionClosed) => debug!("client terminated - remote closed"),
                Err(e) => error!("Client terminated with err - {e}"),
            }
        });

        Self {
            hdl_tx,
            cancel,
            stager: config.stager(),
            inline_limit: config.inline_limit,
            editor,
            session,
        }
    }

    /// Name of the session this client belongs to
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Evaluate `text` in namespace `ns`, inlined into the request
    pub async fn send_text(
        &self,
        ctx: &ContextId,
        ns: &NamespaceSpec,
        text: &str,
        callbacks: Callbacks,
    ) -> Result<Ticket> {
        let namespace = ns.resolve()?;
        self.dispatch(ctx, namespace, text.to_string(), callbacks, None)
            .await
    }

    /// Evaluate `text` in namespace `ns` by way of a staged scratch file
    pub async fn send_text_staged(
        &self,
        ctx: &ContextId,
        ns: &NamespaceSpec,
        text: &str,
        callbacks: Callbacks,
    ) -> Result<Ticket> {
        let namespace = ns.resolve()?;
        let (loader, staged) = self.stager.stage(text)?;
        self.dispatch(ctx, namespace, loader, callbacks, Some(staged))
            .await
    }

    /// Evaluate `text`, staging it if it spans lines or exceeds the inline limit
    pub async fn send_auto(
        &self,
        ctx: &ContextId,
        ns: &NamespaceSpec,
        text: &str,
        callbacks: Callbacks,
    ) -> Result<Ticket> {
        if text.contains('\n') || text.len() > self.inline_limit {
            self.send_text_staged(ctx, ns, text, callbacks).await
        } else {
            self.send_text(ctx, ns, text, callbacks).await
        }
    }

    /// Load and evaluate the file at `path` in namespace `ns`
    pub async fn send_file(
        &self,
        ctx: &ContextId,
        ns: &NamespaceSpec,
        path: &Path,
        callbacks: Callbacks,
    ) -> Result<Ticket> {
        let namespace = ns.resolve()?;
        self.dispatch(ctx, namespace, stage::load_instruction(path), callbacks, None)
            .await
    }

    /// Evaluate text selected in the editor
    pub async fn send_selection(
        &self,
        ctx: &ContextId,
        selection: &Selection,
        callbacks: Callbacks,
    ) -> Result<Ticket> {
        self.editor.flash_region(ctx, &selection.range);
        self.send_auto(ctx, &selection.namespace, &selection.text, callbacks)
            .await
    }

    /// Activate the package environment at `path`
    pub async fn activate_project(
        &self,
        ctx: &ContextId,
        path: &Path,
        callbacks: Callbacks,
    ) -> Result<Ticket> {
        let code = format!("import Pkg; Pkg.activate({})", quote(&path.to_string_lossy()));
        self.send_text(ctx, &NamespaceSpec::Default, &code, callbacks)
            .await
    }

    /// Ids of requests still awaiting a response
    pub async fn outstanding(&self) -> Result<Vec<RequestId>> {
        let (tx, rx) = oneshot::channel();
        self.hdl_tx
            .send(Event::Outstanding(tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Whether client task has terminated
    pub fn is_closed(&self) -> bool {
        self.hdl_tx.is_closed()
    }

    /// Detect if client has terminated
    pub async fn closed(&self) {
        self.hdl_tx.closed().await
    }

    /// Initiate Shutdown. The future completes once every outstanding request is completed.
    pub async fn shutdown(&self) {
        debug!("shutdown - start");
        self.cancel.cancel();
        self.hdl_tx.closed().await; // wait until rx drop in `run`
        debug!("shutdown - done");
    }

    async fn dispatch(
        &self,
        ctx: &ContextId,
        namespace: NamespacePath,
        code: String,
        callbacks: Callbacks,
        staged: Option<StagedFile>,
    ) -> Result<Ticket> {
        let req = Request::new(namespace, code);
        let id = req.id.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let (registered_tx, registered_rx) = oneshot::channel();
        let inflight = Inflight {
            origin: ctx.clone(),
            callbacks,
            done_tx,
            staged,
        };

        self.hdl_tx
            .send(Event::SendRequest {
                req,
                inflight,
                registered_tx,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        registered_rx.await.map_err(|_| Error::ConnectionClosed)??;

        Ok(Ticket::new(id, done_rx))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Run client task over command channel and connection
async fn run(
    mut state: State,
    mut hdl_rx: mpsc::Receiver<Event>,
    cancel: CancellationToken,
) -> Result<()> {
    let res = loop {
        let ev = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            Some(e) = hdl_rx.recv() => e,
            msg = state.conn.recv() => match msg {
                Some(Ok(resp)) => Event::RecvResponse(resp),
                Some(Err(e)) => break Err(Error::IO(e)),
                None => break Err(Error::ConnectionClosed),
            },
        };
        if let Err(e) = state.handle_event(ev).await {
            break Err(e);
        }
    };
    // Handles wait on channel closing, so drain first
    state.teardown().await;
    drop(hdl_rx);
    res
}

impl State {
    fn new(conn: Connection, editor: Arc<dyn Editor>, error_display: ErrorDisplay) -> Self {
        let session = conn.peer().to_string();
        Self {
            conn,
            tracker: Tracker::new(),
            editor,
            error_display,
            session,
        }
    }

    async fn handle_event(&mut self, e: Event) -> Result<()> {
        match e {
            Event::SendRequest {
                req,
                inflight,
                registered_tx,
            } => self.handle_request(req, inflight, registered_tx).await,
            Event::RecvResponse(resp) => {
                self.handle_response(resp);
                Ok(())
            }
            Event::Outstanding(tx) => {
                let _ = tx.send(self.tracker.ids());
                Ok(())
            }
        }
    }

    /// Register request, then write it out
    async fn handle_request(
        &mut self,
        req: Request,
        inflight: Inflight,
        registered_tx: oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        let origin = inflight.origin.clone();
        if let Err(e) = self.tracker.register(req.id.clone(), inflight) {
            error!("Refusing to send request - {e}");
            let _ = registered_tx.send(Err(e));
            return Ok(());
        }
        self.editor.notify_progress(&origin, Progress::Started);

        if let Err(e) = self.conn.send(&req).await {
            if let Some(inflight) = self.tracker.complete(&req.id) {
                inflight.finish(&*self.editor, Err(Failure::ConnectionClosed));
            }
            let _ = registered_tx.send(Err(Error::ConnectionClosed));
            return Err(e.into());
        }

        let _ = registered_tx.send(Ok(()));
        Ok(())
    }

    /// Dispatch a response event to the request it belongs to
    fn handle_response(&mut self, resp: Response) {
        match resp {
            Response::Success { id } => match self.tracker.complete(&id) {
                Some(inflight) => inflight.finish(&*self.editor, Ok(())),
                None => debug!("ignoring success for unknown request {id}"),
            },
            Response::Failure { id, message, stack } => match self.tracker.complete(&id) {
                Some(inflight) => {
                    let failure = Failure::Eval { message, stack };
                    self.display_failure(&inflight.origin, &failure);
                    inflight.finish(&*self.editor, Err(failure));
                }
                None => debug!("ignoring failure for unknown request {id}"),
            },
            Response::Unrecognized { raw, reason } => {
                let e = Error::ProtocolDecodeError(reason);
                warn!("{e} - {raw:?}");
            }
        }
    }

    fn display_failure(&self, origin: &ContextId, failure: &Failure) {
        match self.error_display {
            ErrorDisplay::Diagnostics => self
                .editor
                .render_diagnostic(&self.session, &failure.to_string()),
            ErrorDisplay::Notification => self.editor.notify(origin, failure.message()),
        }
    }

    /// Complete every outstanding request with [Failure::ConnectionClosed] and close connection
    async fn teardown(mut self) {
        for (id, inflight) in self.tracker.drain() {
            debug!("request {id} closed before response");
            inflight.finish(&*self.editor, Err(Failure::ConnectionClosed));
        }
        if let Err(e) = self.conn.shutdown().await {
            debug!("connection shutdown failed - {e}");
        }
    }
}

impl Inflight {
    /// Run callbacks, release staged payload, stop progress, and resolve ticket
    fn finish(self, editor: &dyn Editor, completion: Completion) {
        self.callbacks.run(&completion);
        if let Some(staged) = self.staged {
            staged.release();
        }
        editor.notify_progress(&self.origin, Progress::Stopped);
        let _ = self.done_tx.send(completion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Editor recording every call it receives
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Editor for Recorder {
        fn notify_progress(&self, ctx: &ContextId, progress: Progress) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("progress {ctx} {progress:?}"));
        }

        fn render_diagnostic(&self, session: &str, text: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("diagnostic {session} {text}"));
        }

        fn notify(&self, ctx: &ContextId, message: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("notify {ctx} {message}"));
        }
    }

    fn state_fixture(error_display: ErrorDisplay) -> (State, Arc<Recorder>) {
        let (conn, _remote) = Connection::pair();
        let recorder = Arc::new(Recorder::default());
        let state = State::new(conn, recorder.clone(), error_display);
        (state, recorder)
    }

    /// Track a request directly, bypassing the wire
    fn track(
        state: &mut State,
        id: &str,
        ctx: &str,
        callbacks: Callbacks,
    ) -> oneshot::Receiver<Completion> {
        let (done_tx, done_rx) = oneshot::channel();
        state
            .tracker
            .register(
                RequestId::from(id),
                Inflight {
                    origin: ContextId::from(ctx),
                    callbacks,
                    done_tx,
                    staged: None,
                },
            )
            .unwrap();
        done_rx
    }

    #[tokio::test]
    async fn success_completes_once() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Diagnostics);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let mut done = track(
            &mut state,
            "00000001",
            "buf",
            Callbacks::new().on_success(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let success = Response::Success {
            id: RequestId::from("00000001"),
        };
        state.handle_response(success.clone());
        state.handle_response(success);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(done.try_recv().unwrap(), Ok(()));
        assert!(state.tracker.is_empty());
        assert_eq!(recorder.calls(), vec!["progress buf Stopped"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn unknown_id_is_inert() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Diagnostics);
        let mut done = track(&mut state, "00000001", "buf", Callbacks::new());

        state.handle_response(Response::Success {
            id: RequestId::from("ffffffff"),
        });
        state.handle_response(Response::Failure {
            id: RequestId::from("fffffffe"),
            message: "late".to_string(),
            stack: vec![],
        });

        assert_eq!(state.tracker.len(), 1);
        assert!(done.try_recv().is_err(), "tracked request should be untouched");
        assert!(recorder.calls().is_empty());
        assert!(logs_contain("unknown request ffffffff"));
    }

    #[tokio::test]
    async fn failure_renders_diagnostic_before_callback() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Diagnostics);
        let seen = Arc::new(Mutex::new(vec![]));
        let seen_clone = seen.clone();
        let recorder_clone = recorder.clone();
        let mut done = track(
            &mut state,
            "00000001",
            "buf",
            Callbacks::new().on_failure(move |failure| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((failure.clone(), recorder_clone.calls()));
            }),
        );

        state.handle_response(Response::Failure {
            id: RequestId::from("00000001"),
            message: "UndefVarError: z not defined".to_string(),
            stack: vec!["at line 3".to_string()],
        });

        let expected = Failure::Eval {
            message: "UndefVarError: z not defined".to_string(),
            stack: vec!["at line 3".to_string()],
        };
        let diagnostic = "diagnostic pair UndefVarError: z not defined\nat line 3".to_string();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(expected.clone(), vec![diagnostic.clone()])],
            "failure callback should run once, after diagnostic is populated"
        );
        assert_eq!(done.try_recv().unwrap(), Err(expected));
        assert_eq!(
            recorder.calls(),
            vec![diagnostic, "progress buf Stopped".to_string()]
        );
    }

    #[tokio::test]
    async fn failure_notification_display() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Notification);
        let _done = track(&mut state, "00000001", "buf", Callbacks::new());

        state.handle_response(Response::Failure {
            id: RequestId::from("00000001"),
            message: "boom".to_string(),
            stack: vec!["frame".to_string()],
        });

        assert_eq!(
            recorder.calls(),
            vec!["notify buf boom", "progress buf Stopped"]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn unrecognized_is_logged() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Diagnostics);
        let _done = track(&mut state, "00000001", "buf", Callbacks::new());

        state.handle_response(Response::parse("(bogus)"));

        assert_eq!(state.tracker.len(), 1);
        assert!(recorder.calls().is_empty());
        assert!(logs_contain("Failed to decode response"));
    }

    #[tokio::test]
    async fn side_effects_scoped_to_origin() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Notification);
        let _a = track(&mut state, "0000000a", "buf-a", Callbacks::new());
        let _b = track(&mut state, "0000000b", "buf-b", Callbacks::new());

        state.handle_response(Response::Failure {
            id: RequestId::from("0000000b"),
            message: "boom".to_string(),
            stack: vec![],
        });
        state.handle_response(Response::Success {
            id: RequestId::from("0000000a"),
        });

        assert_eq!(
            recorder.calls(),
            vec![
                "notify buf-b boom",
                "progress buf-b Stopped",
                "progress buf-a Stopped"
            ]
        );
    }

    #[tokio::test]
    async fn teardown_drains() {
        let (mut state, recorder) = state_fixture(ErrorDisplay::Diagnostics);
        let closed = Arc::new(AtomicUsize::new(0));
        let mut tickets = vec![];
        for i in 0..3 {
            let closed = closed.clone();
            tickets.push(track(
                &mut state,
                &format!("{i:08x}"),
                "buf",
                Callbacks::new().on_failure(move |failure| {
                    assert_eq!(failure, &Failure::ConnectionClosed);
                    closed.fetch_add(1, Ordering::SeqCst);
                }),
            ));
        }

        state.teardown().await;

        assert_eq!(closed.load(Ordering::SeqCst), 3);
        for mut done in tickets {
            assert_eq!(done.try_recv().unwrap(), Err(Failure::ConnectionClosed));
        }
        assert_eq!(recorder.calls().len(), 3, "progress should stop for each request");
    }
}
