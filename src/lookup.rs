//! Debounced account lookup for the impersonation picker.
//!
//! Only elevated viewers get a running lookup task. The task issues one
//! lookup with an empty keyword on start, then waits for keystrokes; each
//! keystroke restarts the quiet-period timer and only the settled keyword
//! is sent. Dropping the [`UserLookup`] (or calling
//! [`UserLookup::disable`]) aborts the task along with any pending timer.
//! Lookup failures are logged and otherwise ignored: the option list just
//! stays as it was.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::gateway::TokenGateway;
use crate::models::user::{UserOption, Viewer};

/// Published after every lookup transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupState {
    pub options: Vec<UserOption>,
    pub loading: bool,
    /// Keyword of the latest lookup sent.
    pub keyword: String,
}

pub struct UserLookup {
    input_tx: Option<mpsc::UnboundedSender<String>>,
    state_rx: watch::Receiver<LookupState>,
    task: Option<JoinHandle<()>>,
}

impl UserLookup {
    pub fn spawn(viewer: Viewer, gateway: Arc<dyn TokenGateway>, debounce: Duration) -> Self {
        // An enabled lookup starts with its initial request in flight.
        let (state_tx, state_rx) = watch::channel(LookupState {
            loading: viewer.is_elevated(),
            ..LookupState::default()
        });
        if !viewer.is_elevated() {
            return Self {
                input_tx: None,
                state_rx,
                task: None,
            };
        }

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(gateway, debounce, input_rx, state_tx));
        Self {
            input_tx: Some(input_tx),
            state_rx,
            task: Some(task),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task.is_some()
    }

    /// Feed the current text of the lookup field.
    pub fn input(&self, keyword: &str) {
        if let Some(tx) = &self.input_tx {
            let _ = tx.send(keyword.to_string());
        }
    }

    pub fn state(&self) -> LookupState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LookupState> {
        self.state_rx.clone()
    }

    /// Stop looking up, e.g. after the viewer lost the elevated role.
    pub fn disable(&mut self) {
        self.input_tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for UserLookup {
    fn drop(&mut self) {
        self.disable();
    }
}

async fn run(
    gateway: Arc<dyn TokenGateway>,
    debounce: Duration,
    mut input_rx: mpsc::UnboundedReceiver<String>,
    state_tx: watch::Sender<LookupState>,
) {
    lookup(gateway.as_ref(), "", &state_tx).await;

    let mut pending: Option<String> = None;
    loop {
        match pending.take() {
            None => match input_rx.recv().await {
                Some(keyword) => pending = Some(keyword),
                None => break,
            },
            Some(keyword) => {
                tokio::select! {
                    next = input_rx.recv() => match next {
                        Some(newer) => pending = Some(newer),
                        None => break,
                    },
                    _ = tokio::time::sleep(debounce) => {
                        lookup(gateway.as_ref(), &keyword, &state_tx).await;
                    }
                }
            }
        }
    }
    tracing::debug!("user lookup input closed");
}

async fn lookup(gateway: &dyn TokenGateway, keyword: &str, state_tx: &watch::Sender<LookupState>) {
    state_tx.send_modify(|s| {
        s.loading = true;
        s.keyword = keyword.to_string();
    });

    match gateway.list_users(keyword).await {
        Ok(options) => {
            tracing::debug!(keyword, count = options.len(), "user lookup finished");
            state_tx.send_modify(|s| {
                s.options = options;
                s.loading = false;
            });
        }
        Err(e) => {
            tracing::warn!(keyword, error = %e, "user lookup failed");
            state_tx.send_modify(|s| s.loading = false);
        }
    }
}
