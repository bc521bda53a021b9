//! Token list controller.
//!
//! Operator events mutate [`ListState`] synchronously and push a
//! [`RefetchReason`] onto an explicit queue. The queue is drained either by
//! [`TokenListController::settle`], which coalesces everything queued into
//! one fetch cycle and awaits it, or by [`TokenListController::spawn_fetch`],
//! which runs the cycle on a background task and hands the completion back
//! through a channel. Each cycle carries a sequence number; completions of
//! superseded cycles are dropped, so the table only ever shows the answer
//! to the most recently issued request.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::actions::{ActionOutcome, RowActions};
use crate::errors::ConsoleError;
use crate::gateway::TokenGateway;
use crate::models::envelope::Page;
use crate::models::group::{group_options, GroupOption};
use crate::models::token::{Token, TokenStatus};
use crate::models::user::{UserOption, Viewer};
use crate::notification::Notifier;
use crate::preferences::{PreferenceStore, PAGE_SIZE_OPTIONS};
use crate::scope::QueryScope;

use super::state::{
    visible_columns, Column, FetchOutcome, FetchTicket, ListQuery, ListResult, ListState,
    VIEW_NAME,
};

/// Why a refetch was queued. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchReason {
    Initial,
    Sort,
    Page,
    PageSize,
    Search,
    Target,
    Refresh,
}

/// Create/edit dialog collaborator. `token_id == 0` means create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorState {
    pub open: bool,
    pub token_id: i64,
}

type Completion = (FetchTicket, Result<Page<Token>, ConsoleError>);

pub struct TokenListController {
    state: ListState,
    viewer: Viewer,
    gateway: Arc<dyn TokenGateway>,
    prefs: Arc<dyn PreferenceStore>,
    notifier: Arc<dyn Notifier>,
    actions: RowActions,
    editor: EditorState,
    refetch_tx: mpsc::UnboundedSender<RefetchReason>,
    refetch_rx: mpsc::UnboundedReceiver<RefetchReason>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl TokenListController {
    /// Build the view state. The page size preference is read here, once,
    /// and the initial load is queued.
    pub fn new(
        viewer: Viewer,
        gateway: Arc<dyn TokenGateway>,
        prefs: Arc<dyn PreferenceStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let page_size = prefs.page_size_or_default(VIEW_NAME);
        let (refetch_tx, refetch_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let actions = RowActions::new(gateway.clone(), notifier.clone());

        let controller = Self {
            state: ListState::new(page_size),
            viewer,
            gateway,
            prefs,
            notifier,
            actions,
            editor: EditorState::default(),
            refetch_tx,
            refetch_rx,
            completion_tx,
            completion_rx,
        };
        controller.request_refetch(RefetchReason::Initial);
        controller
    }

    fn request_refetch(&self, reason: RefetchReason) {
        // The receiver lives in `self`, so this cannot fail while we exist.
        let _ = self.refetch_tx.send(reason);
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn query(&self) -> &ListQuery {
        &self.state.query
    }

    pub fn result(&self) -> &ListResult {
        &self.state.result
    }

    pub fn rows(&self) -> &[Token] {
        &self.state.result.rows
    }

    pub fn total_count(&self) -> u64 {
        self.state.result.total_count
    }

    pub fn page_count(&self) -> u64 {
        self.state.result.page_count(self.state.query.page_size)
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn scope(&self) -> QueryScope {
        self.state.query.scope(&self.viewer)
    }

    pub fn columns(&self) -> Vec<Column> {
        visible_columns(&self.viewer)
    }

    pub fn editor(&self) -> EditorState {
        self.editor
    }

    // ── Operator events ─────────────────────────────────────────

    pub fn set_sort(&mut self, column_id: &str) {
        if self.state.query.set_sort(column_id) {
            self.request_refetch(RefetchReason::Sort);
        }
    }

    pub fn set_page(&mut self, page: u32) {
        if self.state.query.set_page(page) {
            self.request_refetch(RefetchReason::Page);
        }
    }

    /// Only sizes the pager offers are accepted; anything else is ignored
    /// and not persisted.
    pub fn set_page_size(&mut self, size: u32) {
        if !PAGE_SIZE_OPTIONS.contains(&size) {
            tracing::warn!(size, options = ?PAGE_SIZE_OPTIONS, "ignoring unsupported page size");
            return;
        }
        let changed = self.state.query.set_page_size(size);
        if let Err(e) = self.prefs.save_page_size(VIEW_NAME, size) {
            tracing::warn!(size, error = %e, "failed to persist page size");
        }
        if changed {
            self.request_refetch(RefetchReason::PageSize);
        }
    }

    pub fn submit_search(&mut self, raw_keyword: &str) {
        if self.state.query.submit_search(raw_keyword) {
            self.request_refetch(RefetchReason::Search);
        }
    }

    /// Returns false when the viewer may not look at other accounts.
    pub fn select_target(&mut self, target: Option<UserOption>) -> bool {
        if !self.viewer.is_elevated() {
            tracing::warn!("impersonation target ignored: viewer lacks the elevated role");
            return false;
        }
        if let Some(user) = &target {
            tracing::info!(user_id = user.id, username = %user.username, "viewing tokens on behalf of user");
        }
        if self.state.query.select_target(target) {
            self.request_refetch(RefetchReason::Target);
        }
        true
    }

    /// Dismiss the impersonation chip.
    pub fn clear_target(&mut self) -> bool {
        self.select_target(None)
    }

    /// Reset the sort to id/desc and reload under the current filters,
    /// even when nothing else changed.
    pub fn refresh(&mut self) {
        self.state.query.reset_sort();
        self.request_refetch(RefetchReason::Refresh);
    }

    pub fn open_editor(&mut self, token_id: i64) {
        self.editor = EditorState {
            open: true,
            token_id,
        };
    }

    /// Close the dialog; a successful save reloads the list.
    pub fn close_editor(&mut self, saved: bool) {
        self.editor = EditorState::default();
        if saved {
            self.refresh();
        }
    }

    // ── Fetch cycle ─────────────────────────────────────────────

    pub fn has_pending_refetch(&self) -> bool {
        !self.refetch_rx.is_empty()
    }

    fn drain_refetch_queue(&mut self) -> Vec<RefetchReason> {
        let mut reasons = Vec::new();
        while let Ok(reason) = self.refetch_rx.try_recv() {
            reasons.push(reason);
        }
        reasons
    }

    /// Run one fetch cycle if anything is queued. Returns whether a request
    /// was issued.
    pub async fn settle(&mut self) -> bool {
        let reasons = self.drain_refetch_queue();
        if reasons.is_empty() {
            return false;
        }
        let ticket = self.state.begin_fetch(&self.viewer);
        tracing::debug!(seq = ticket.seq, ?reasons, "starting fetch cycle");
        let result = self.gateway.list_tokens(ticket.scope, &ticket.params).await;
        self.apply(ticket, result);
        true
    }

    /// Issue the queued cycle on a background task. Returns its sequence
    /// number, or `None` when nothing was queued. The completion is always
    /// delivered, as a failure if the request task panicked.
    pub fn spawn_fetch(&mut self) -> Option<u64> {
        let reasons = self.drain_refetch_queue();
        if reasons.is_empty() {
            return None;
        }
        let ticket = self.state.begin_fetch(&self.viewer);
        let seq = ticket.seq;
        tracing::debug!(seq, ?reasons, "spawning fetch cycle");

        let gateway = self.gateway.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let scope = ticket.scope;
            let params = ticket.params.clone();
            let result = tokio::spawn(async move { gateway.list_tokens(scope, &params).await })
                .await
                .unwrap_or_else(|e| Err(e.into()));
            let _ = tx.send((ticket, result));
        });
        Some(seq)
    }

    /// Wait for the next background completion and apply it. Returns the
    /// sequence number of the completion and whether it was applied.
    pub async fn apply_next_completion(&mut self) -> Option<(u64, bool)> {
        let (ticket, result) = self.completion_rx.recv().await?;
        let seq = ticket.seq;
        let applied = self.apply(ticket, result);
        Some((seq, applied))
    }

    fn apply(&mut self, ticket: FetchTicket, result: Result<Page<Token>, ConsoleError>) -> bool {
        match self.state.complete_fetch(&ticket, result) {
            FetchOutcome::Applied => {
                tracing::info!(
                    seq = ticket.seq,
                    total = self.state.result.total_count,
                    rows = self.state.result.rows.len(),
                    "token list updated"
                );
                true
            }
            FetchOutcome::Failed(e) => {
                tracing::warn!(seq = ticket.seq, error = %e, "token list fetch failed, keeping previous rows");
                self.notifier.error(&e.user_message());
                false
            }
            FetchOutcome::Stale => {
                tracing::debug!(
                    seq = ticket.seq,
                    latest = self.state.latest_seq(),
                    "dropping stale token list response"
                );
                false
            }
        }
    }

    // ── Row actions ─────────────────────────────────────────────

    /// Delete a token in the current scope. Success queues a refresh.
    pub async fn delete_token(&mut self, id: i64) -> ActionOutcome {
        let outcome = self.actions.delete(self.scope(), id).await;
        if outcome.success {
            self.refresh();
        }
        outcome
    }

    /// Change a token's status in the current scope. Success patches the
    /// visible row instead of reloading the page.
    pub async fn set_token_status(&mut self, id: i64, status: TokenStatus) -> ActionOutcome {
        let outcome = self.actions.set_status(self.scope(), id, status).await;
        if outcome.success && !self.state.result.patch_status(id, status) {
            tracing::debug!(id, "status changed for a token that is not on this page");
        }
        outcome
    }

    /// Group choices for the editor. Failures leave the picker empty.
    pub async fn group_options(&self) -> Vec<GroupOption> {
        match self.gateway.list_groups().await {
            Ok(groups) => group_options(&groups),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load user groups");
                Vec::new()
            }
        }
    }
}
