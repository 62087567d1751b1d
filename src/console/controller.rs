//! Console state machine.
//!
//! All state mutation happens on the task running `run_console`. Backend
//! calls are spawned and report completion over the event channel; each list
//! fetch carries the generation token it was issued under, and a completion
//! is applied only if it is still the newest fetch and the controller has
//! not been disposed. A superseded completion is discarded silently, success
//! and failure alike.

use crate::api::{ApiError, SnapshotApi};
use crate::model::{ChainSnapshot, RunOutcome};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Refresh,
    TriggerRun,
    SetAdminKey(String),
    Quit,
}

/// Completions reported by spawned backend calls.
#[derive(Debug)]
enum ConsoleEvent {
    ListFinished {
        /// Fetch generation at issue time; stale completions are discarded.
        token: u64,
        result: Result<Vec<ChainSnapshot>, ApiError>,
    },
    TriggerFinished {
        result: Result<RunOutcome, ApiError>,
    },
}

/// Observable console state, published to the UI as a snapshot after every change.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConsoleState {
    /// Snapshot rows in server order (most recent first).
    pub items: Vec<ChainSnapshot>,
    /// True while the newest list fetch is outstanding.
    pub loading: bool,
    /// Operator-facing message from the most recent failed operation.
    pub error: Option<String>,
    /// Outcome of the most recent successful run-now trigger.
    pub last_run: Option<RunOutcome>,
    /// Operator-entered credential. Read at the moment a trigger is issued,
    /// never persisted anywhere.
    pub admin_key: String,
}

struct ConsoleController {
    api: Arc<dyn SnapshotApi>,
    event_tx: UnboundedSender<ConsoleEvent>,
    state: ConsoleState,
    limit: u32,
    /// Generation of the most recently issued list fetch.
    fetch_token: u64,
    disposed: bool,
}

impl ConsoleController {
    fn new(api: Arc<dyn SnapshotApi>, limit: u32) -> (Self, UnboundedReceiver<ConsoleEvent>) {
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Self {
                api,
                event_tx,
                state: ConsoleState::default(),
                limit,
                fetch_token: 0,
                disposed: false,
            },
            event_rx,
        )
    }

    fn state(&self) -> &ConsoleState {
        &self.state
    }

    fn set_admin_key(&mut self, key: String) {
        self.state.admin_key = key;
    }

    /// Start a list fetch. Safe to call while a previous fetch is still
    /// outstanding; the newest fetch wins regardless of completion order.
    fn refresh(&mut self) {
        if self.disposed {
            return;
        }
        self.state.error = None;
        self.state.loading = true;
        self.fetch_token += 1;
        let token = self.fetch_token;
        let api = self.api.clone();
        let tx = self.event_tx.clone();
        let limit = self.limit;
        tokio::spawn(async move {
            let result = api.list_snapshots(limit).await;
            let _ = tx.send(ConsoleEvent::ListFinished { token, result });
        });
    }

    /// Start a run-now trigger with the current admin key (trimmed; empty
    /// means unauthenticated).
    fn trigger_run(&mut self) {
        if self.disposed {
            return;
        }
        self.state.error = None;
        self.state.last_run = None;
        let key = self.state.admin_key.trim();
        let key = (!key.is_empty()).then(|| key.to_string());
        let api = self.api.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.trigger_run(key.as_deref()).await;
            let _ = tx.send(ConsoleEvent::TriggerFinished { result });
        });
    }

    /// Apply a completion. Stale or post-dispose completions are dropped
    /// without touching state; a discarded failure is not surfaced either.
    fn handle_event(&mut self, ev: ConsoleEvent) {
        if self.disposed {
            return;
        }
        match ev {
            ConsoleEvent::ListFinished { token, result } => {
                if token != self.fetch_token {
                    return;
                }
                self.state.loading = false;
                match result {
                    Ok(items) => {
                        self.state.items = items;
                        self.state.error = None;
                    }
                    // Keep the previous rows visible on failure.
                    Err(e) => self.state.error = Some(e.to_string()),
                }
            }
            ConsoleEvent::TriggerFinished { result } => match result {
                Ok(outcome) => {
                    self.state.last_run = Some(outcome);
                    // Pick up whatever the run inserted.
                    self.refresh();
                }
                Err(e) => self.state.error = Some(e.to_string()),
            },
        }
    }

    /// Invalidate every outstanding completion. In-flight requests are not
    /// aborted at the transport level; their results simply no longer apply.
    fn dispose(&mut self) {
        self.disposed = true;
    }
}

/// Own the controller on the async side: apply UI commands and fetch
/// completions, publishing a state snapshot after every change.
pub(crate) async fn run_console(
    api: Arc<dyn SnapshotApi>,
    limit: u32,
    initial_key: Option<String>,
    refresh_on_launch: bool,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
    state_tx: UnboundedSender<ConsoleState>,
) {
    let (mut console, mut event_rx) = ConsoleController::new(api, limit);
    if let Some(key) = initial_key {
        console.set_admin_key(key);
    }
    if refresh_on_launch {
        console.refresh();
    }
    let _ = state_tx.send(console.state().clone());

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(UiCommand::Refresh) => console.refresh(),
                Some(UiCommand::TriggerRun) => console.trigger_run(),
                Some(UiCommand::SetAdminKey(key)) => console.set_admin_key(key),
                Some(UiCommand::Quit) | None => {
                    console.dispose();
                    break;
                }
            },
            // The controller holds a sender, so recv() never yields None here.
            Some(ev) = event_rx.recv() => console.handle_event(ev),
        }
        let _ = state_tx.send(console.state().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InsertedCapture;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Scripted backend: list calls block on pre-registered gates so tests
    /// control completion order; trigger calls record the credential they
    /// were invoked with.
    #[derive(Default)]
    struct ScriptedApi {
        list_gates: Mutex<VecDeque<oneshot::Receiver<Result<Vec<ChainSnapshot>, ApiError>>>>,
        list_calls: AtomicUsize,
        trigger_results: Mutex<VecDeque<Result<RunOutcome, ApiError>>>,
        trigger_keys: Mutex<Vec<Option<String>>>,
    }

    #[async_trait::async_trait]
    impl SnapshotApi for ScriptedApi {
        async fn list_snapshots(&self, _limit: u32) -> Result<Vec<ChainSnapshot>, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self
                .list_gates
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected list call");
            gate.await.expect("gate dropped")
        }

        async fn trigger_run(&self, api_key: Option<&str>) -> Result<RunOutcome, ApiError> {
            self.trigger_keys
                .lock()
                .unwrap()
                .push(api_key.map(str::to_string));
            self.trigger_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected trigger call")
        }
    }

    type ListGate = oneshot::Sender<Result<Vec<ChainSnapshot>, ApiError>>;

    fn gate(api: &ScriptedApi) -> ListGate {
        let (tx, rx) = oneshot::channel();
        api.list_gates.lock().unwrap().push_back(rx);
        tx
    }

    fn snap(id: i64) -> ChainSnapshot {
        ChainSnapshot {
            snapshot_id: id,
            ts: format!("2026-02-06T15:0{id}:00Z"),
            underlying: "SPX".into(),
            target_dte: 5,
            expiration: "2026-02-11".into(),
            checksum: format!("{id:032x}"),
        }
    }

    fn run_outcome(inserted: Vec<InsertedCapture>) -> RunOutcome {
        RunOutcome {
            skipped: false,
            reason: None,
            now_et: "2026-02-06T10:15:00-05:00".into(),
            inserted,
        }
    }

    fn capture() -> InsertedCapture {
        InsertedCapture {
            target_dte: 5,
            expiration: "2026-02-11".into(),
            actual_dte_days: 5,
            checksum: "cafecafecafecafe".into(),
        }
    }

    #[tokio::test]
    async fn refresh_success_replaces_rows_and_clears_error() {
        let api = Arc::new(ScriptedApi::default());
        let g = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.refresh();
        assert!(console.state().loading);
        assert!(console.state().error.is_none());

        g.send(Ok(vec![snap(1), snap(2)])).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        assert!(!console.state().loading);
        assert_eq!(console.state().items, vec![snap(1), snap(2)]);
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_status_and_keeps_previous_rows() {
        let api = Arc::new(ScriptedApi::default());
        let g1 = gate(&api);
        let g2 = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.refresh();
        g1.send(Ok(vec![snap(1)])).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        console.refresh();
        g2.send(Err(ApiError::Status { status: 500 })).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        let state = console.state();
        assert!(!state.loading);
        assert!(state.error.as_deref().unwrap().contains("500"));
        // Last good view stays visible.
        assert_eq!(state.items, vec![snap(1)]);
    }

    #[tokio::test]
    async fn starting_an_operation_clears_the_previous_error() {
        let api = Arc::new(ScriptedApi::default());
        let g1 = gate(&api);
        let _g2 = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.refresh();
        g1.send(Err(ApiError::Status { status: 502 })).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);
        assert!(console.state().error.is_some());
        // Nothing had loaded yet, so the failed first load leaves no rows.
        assert!(console.state().items.is_empty());

        console.refresh();
        assert!(console.state().error.is_none());
        assert!(console.state().loading);
    }

    #[tokio::test]
    async fn later_refresh_wins_over_slow_earlier_fetch() {
        let api = Arc::new(ScriptedApi::default());
        let gate_a = gate(&api);
        let gate_b = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        // Let each spawned fetch reach its gate before issuing the next, so
        // gate A belongs to fetch A and gate B to fetch B.
        console.refresh();
        tokio::task::yield_now().await;
        console.refresh();
        tokio::task::yield_now().await;

        // B resolves first and is applied.
        gate_b.send(Ok(vec![snap(2)])).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);
        assert!(!console.state().loading);
        assert_eq!(console.state().items, vec![snap(2)]);

        // A resolves late; its completion must change nothing.
        gate_a.send(Ok(vec![snap(1)])).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);
        assert_eq!(console.state().items, vec![snap(2)]);
        assert!(console.state().error.is_none());
        assert!(!console.state().loading);
    }

    #[tokio::test]
    async fn stale_failure_is_discarded_silently() {
        let api = Arc::new(ScriptedApi::default());
        let gate_a = gate(&api);
        let gate_b = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.refresh();
        tokio::task::yield_now().await;
        console.refresh();
        tokio::task::yield_now().await;

        gate_b.send(Ok(vec![snap(2)])).unwrap();
        console.handle_event(event_rx.recv().await.unwrap());

        gate_a.send(Err(ApiError::Status { status: 500 })).unwrap();
        console.handle_event(event_rx.recv().await.unwrap());

        assert!(console.state().error.is_none());
        assert_eq!(console.state().items, vec![snap(2)]);
    }

    #[tokio::test]
    async fn disposed_console_ignores_late_completions() {
        let api = Arc::new(ScriptedApi::default());
        let g = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.refresh();
        tokio::task::yield_now().await;
        console.dispose();

        g.send(Ok(vec![snap(1)])).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        assert!(console.state().items.is_empty());
        assert!(console.state().error.is_none());
    }

    #[tokio::test]
    async fn successful_trigger_stores_outcome_then_refreshes_once() {
        let api = Arc::new(ScriptedApi::default());
        api.trigger_results
            .lock()
            .unwrap()
            .push_back(Ok(run_outcome(vec![capture()])));
        let g = gate(&api);
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.trigger_run();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        let last_run = console.state().last_run.as_ref().unwrap();
        assert_eq!(last_run.inserted, vec![capture()]);
        assert!(console.state().loading);

        g.send(Ok(vec![snap(3)])).unwrap();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        assert_eq!(console.state().items, vec![snap(3)]);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_trigger_sets_error_and_does_not_refresh() {
        let api = Arc::new(ScriptedApi::default());
        api.trigger_results
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Status { status: 401 }));
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.trigger_run();
        let ev = event_rx.recv().await.unwrap();
        console.handle_event(ev);

        assert!(console.state().error.as_deref().unwrap().contains("401"));
        assert!(console.state().last_run.is_none());
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn admin_key_is_trimmed_and_blank_means_unauthenticated() {
        let api = Arc::new(ScriptedApi::default());
        {
            let mut results = api.trigger_results.lock().unwrap();
            results.push_back(Err(ApiError::Status { status: 401 }));
            results.push_back(Err(ApiError::Status { status: 401 }));
        }
        let (mut console, mut event_rx) = ConsoleController::new(api.clone(), 50);

        console.set_admin_key("   ".into());
        console.trigger_run();
        console.handle_event(event_rx.recv().await.unwrap());

        console.set_admin_key("  hunter2  ".into());
        console.trigger_run();
        console.handle_event(event_rx.recv().await.unwrap());

        let keys = api.trigger_keys.lock().unwrap();
        assert_eq!(*keys, vec![None, Some("hunter2".to_string())]);
    }
}
