//! Token list controller against a mocked management API.
//!
//! Covers the fetch cycle (query shape, scope routing, stale-response
//! handling, error tolerance) and the row actions wired through it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use token_console::config::{parse_base_url, Config};
use token_console::gateway::HttpGateway;
use token_console::list::{SortColumn, SortDirection, TokenListController};
use token_console::models::token::TokenStatus;
use token_console::models::user::{Role, UserOption, Viewer};
use token_console::notification::{ChannelNotifier, Notice, NoticeLevel};
use token_console::preferences::{MemoryPreferenceStore, PreferenceStore};
use token_console::scope::QueryScope;

fn token_rows(ids: impl IntoIterator<Item = i64>) -> Vec<Value> {
    ids.into_iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("key-{}", id),
                "group": "default",
                "status": 1,
                "used_quota": 0,
                "remain_quota": 1000,
                "unlimited_quota": false,
                "created_time": 1_700_000_000,
                "expired_time": -1
            })
        })
        .collect()
}

fn page_body(total: u64, ids: impl IntoIterator<Item = i64>) -> Value {
    json!({
        "success": true,
        "message": "",
        "data": { "total_count": total, "data": token_rows(ids) }
    })
}

fn ok_body() -> Value {
    json!({ "success": true, "message": "" })
}

struct Harness {
    list: TokenListController,
    notices: UnboundedReceiver<Notice>,
    prefs: Arc<MemoryPreferenceStore>,
}

fn harness(server: &MockServer, role: Role) -> Harness {
    harness_with_prefs(server, role, MemoryPreferenceStore::new())
}

fn harness_with_prefs(server: &MockServer, role: Role, prefs: MemoryPreferenceStore) -> Harness {
    let cfg = Config::new(parse_base_url(&server.uri()).unwrap());
    let gateway = Arc::new(HttpGateway::new(&cfg).unwrap());
    let prefs = Arc::new(prefs);
    let (notifier, notices) = ChannelNotifier::new();
    let list = TokenListController::new(
        Viewer::new(role),
        gateway,
        prefs.clone(),
        Arc::new(notifier),
    );
    Harness {
        list,
        notices,
        prefs,
    }
}

fn carol() -> UserOption {
    UserOption {
        id: 42,
        username: "carol".into(),
        display_name: "Carol".into(),
    }
}

mod fetch_cycle {
    use super::*;

    /// Initial load: page 1, default size, empty keyword, newest first.
    #[tokio::test]
    async fn test_initial_load_and_page_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("page", "1"))
            .and(query_param("size", "10"))
            .and(query_param("keyword", ""))
            .and(query_param("order", "-id"))
            .and(query_param_is_missing("user_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(25, 1..=10)))
            .expect(1)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        assert!(h.list.has_pending_refetch());
        assert!(h.list.settle().await);

        assert_eq!(h.list.rows().len(), 10);
        assert_eq!(h.list.total_count(), 25);
        assert_eq!(h.list.page_count(), 3);
        assert!(!h.list.is_loading());
        assert!(h.notices.try_recv().is_err());

        // Nothing queued, nothing sent.
        assert!(!h.list.settle().await);
    }

    #[tokio::test]
    async fn test_search_keyword_is_trimmed_and_page_reset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("keyword", "prod key"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, [5])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("keyword", ""))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(40, 1..=10)))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;
        h.list.set_page(2);
        h.list.settle().await;
        assert_eq!(h.list.query().page, 2);

        h.list.submit_search("  prod key  ");
        assert_eq!(h.list.query().page, 0);
        h.list.settle().await;
        assert_eq!(h.list.query().keyword, "prod key");
        assert_eq!(h.list.rows().len(), 1);
        assert_eq!(h.list.rows()[0].id, 5);
    }

    /// Events queued before a settle collapse into one request built from
    /// the final state.
    #[tokio::test]
    async fn test_queued_events_coalesce_into_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("order", "-name"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(3, [3, 2, 1])))
            .expect(1)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.set_sort("name");
        h.list.set_sort("name");
        h.list.set_sort("");
        assert!(h.list.settle().await);

        assert_eq!(h.list.query().sort.column, Some(SortColumn::Name));
        assert_eq!(h.list.query().sort.direction, SortDirection::Desc);
        assert_eq!(h.list.rows().len(), 3);
    }

    #[tokio::test]
    async fn test_page_size_is_persisted_and_resets_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(100, 1..=10)))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;
        for size in [20, 50, 30] {
            h.list.set_page(3);
            h.list.set_page_size(size);
            assert_eq!(h.list.query().page, 0);
        }
        assert_eq!(h.prefs.page_size("token"), Some(30));
        assert_eq!(h.list.query().page_size, 30);
        h.list.settle().await;
        assert_eq!(h.list.page_count(), 4);
    }

    #[tokio::test]
    async fn test_unsupported_page_size_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(40, 1..=10)))
            .expect(2)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;
        h.list.set_page(2);
        h.list.settle().await;

        for size in [0, 25, 1000] {
            h.list.set_page_size(size);
        }
        assert_eq!(h.list.query().page_size, 10);
        assert_eq!(h.list.query().page, 2);
        assert_eq!(h.prefs.page_size("token"), None);
        assert!(!h.list.has_pending_refetch());
    }

    #[tokio::test]
    async fn test_stored_page_size_is_used_on_first_load() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("size", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, [])))
            .expect(1)
            .mount(&server)
            .await;

        let prefs = MemoryPreferenceStore::new();
        prefs.save_page_size("token", 50).unwrap();
        let mut h = harness_with_prefs(&server, Role::Common, prefs);
        h.list.settle().await;
        assert_eq!(h.list.query().page_size, 50);
    }

    /// A failed reload keeps the rows on screen and tells the operator.
    #[tokio::test]
    async fn test_transport_failure_keeps_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, [1, 2])))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;
        assert_eq!(h.list.rows().len(), 2);

        // Nothing mounted any more: every request now gets a 404.
        server.reset().await;
        h.list.refresh();
        h.list.settle().await;

        let notice = h.notices.try_recv().expect("error notice");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("404"), "got: {}", notice.message);
        assert_eq!(h.list.rows().len(), 2);
        assert_eq!(h.list.total_count(), 2);
        assert!(!h.list.is_loading());
    }

    #[tokio::test]
    async fn test_server_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "message": "无权进行此操作" })),
            )
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;
        let notice = h.notices.try_recv().unwrap();
        assert_eq!(notice.message, "无权进行此操作");
        assert!(h.list.rows().is_empty());
        assert!(!h.list.is_loading());
    }

    /// Two cycles in flight, the older one answers last: the table must
    /// still show the newer answer.
    #[tokio::test]
    async fn test_out_of_order_responses_keep_latest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("order", "-id"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(99, 1..=10))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("order", "name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, [77])))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        let first = h.list.spawn_fetch().unwrap();
        h.list.set_sort("name");
        let second = h.list.spawn_fetch().unwrap();
        assert!(second > first);
        assert!(h.list.is_loading());

        assert_eq!(h.list.apply_next_completion().await, Some((second, true)));
        assert!(!h.list.is_loading());
        assert_eq!(h.list.apply_next_completion().await, Some((first, false)));

        assert_eq!(h.list.total_count(), 1);
        assert_eq!(h.list.rows()[0].id, 77);
    }
}

mod scope_routing {
    use super::*;

    #[tokio::test]
    async fn test_target_routes_to_admin_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(30, 1..=10)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/admin/"))
            .and(query_param("user_id", "42"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, [7, 8])))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/token/admin/7"))
            .and(query_param("user_id", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/admin/"))
            .and(query_param("user_id", "42"))
            .and(query_param("order", "-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, [8])))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Root);
        h.list.settle().await;
        h.list.set_page(2);

        assert!(h.list.select_target(Some(carol())));
        assert_eq!(h.list.query().page, 0);
        assert_eq!(h.list.scope(), QueryScope::OnBehalfOf(42));
        h.list.settle().await;
        assert_eq!(h.list.total_count(), 2);

        let outcome = h.list.delete_token(7).await;
        assert!(outcome.success);
        h.list.settle().await;
        assert_eq!(h.list.rows().len(), 1);

        h.list.set_page(1);
        assert!(h.list.clear_target());
        assert_eq!(h.list.query().page, 0);
        assert_eq!(h.list.scope(), QueryScope::Own);
        h.list.settle().await;
        assert_eq!(h.list.total_count(), 30);
    }

    #[tokio::test]
    async fn test_status_toggle_on_behalf_of_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, [])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/admin/"))
            .and(query_param("user_id", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, [5, 6])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/token/admin/"))
            .and(query_param("status_only", "true"))
            .and(query_param("user_id", "42"))
            .and(body_json(json!({ "id": 6, "status": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(0)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Root);
        assert!(h.list.select_target(Some(carol())));
        h.list.settle().await;

        let outcome = h.list.set_token_status(6, TokenStatus::Disabled).await;
        assert!(outcome.success);
        let row = h.list.rows().iter().find(|t| t.id == 6).unwrap();
        assert_eq!(row.status, TokenStatus::Disabled);
        assert!(!h.list.has_pending_refetch());
    }

    #[tokio::test]
    async fn test_non_elevated_viewer_cannot_pick_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/admin/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, [])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0, [])))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Admin);
        assert!(!h.list.select_target(Some(carol())));
        assert!(h.list.query().target.is_none());
        h.list.settle().await;
        assert_eq!(h.list.scope(), QueryScope::Own);
    }
}

mod row_actions {
    use super::*;

    #[tokio::test]
    async fn test_delete_refetches_with_same_filters_and_default_sort() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("order", "name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(3, [6, 7, 8])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/token/7"))
            .and(query_param_is_missing("user_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("order", "-id"))
            .and(query_param("keyword", "prod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, [8, 6])))
            .expect(1)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.submit_search("prod");
        h.list.set_sort("name");
        h.list.settle().await;
        assert_eq!(h.list.rows().len(), 3);

        let outcome = h.list.delete_token(7).await;
        assert!(outcome.success);
        assert_eq!(h.notices.try_recv().unwrap().level, NoticeLevel::Success);
        assert!(h.list.has_pending_refetch());

        assert!(h.list.settle().await);
        assert_eq!(h.list.query().sort.column, Some(SortColumn::Id));
        assert_eq!(h.list.query().sort.direction, SortDirection::Desc);
        assert_eq!(h.list.query().keyword, "prod");
        assert_eq!(h.list.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_status_toggle_patches_row_without_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(3, [1, 2, 3])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/token/"))
            .and(query_param("status_only", "true"))
            .and(body_json(json!({ "id": 3, "status": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;

        let outcome = h.list.set_token_status(3, TokenStatus::Disabled).await;
        assert!(outcome.success);
        assert_eq!(h.notices.try_recv().unwrap().level, NoticeLevel::Success);
        assert!(!h.list.has_pending_refetch());
        assert!(!h.list.settle().await);

        let row = h.list.rows().iter().find(|t| t.id == 3).unwrap();
        assert_eq!(row.status, TokenStatus::Disabled);
    }

    #[tokio::test]
    async fn test_rejected_delete_reports_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/token/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "message": "token not found" })),
            )
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        let outcome = h.list.delete_token(9).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "token not found");
        let notice = h.notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "token not found");
    }

    #[tokio::test]
    async fn test_transport_error_still_returns_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        let outcome = h.list.set_token_status(3, TokenStatus::Enabled).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("502"), "got: {}", outcome.message);
        assert_eq!(h.notices.try_recv().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_editor_save_triggers_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token/"))
            .and(query_param("order", "-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, [1])))
            .expect(2)
            .mount(&server)
            .await;

        let mut h = harness(&server, Role::Common);
        h.list.settle().await;

        h.list.open_editor(0);
        assert!(h.list.editor().open);
        assert_eq!(h.list.editor().token_id, 0);

        h.list.close_editor(false);
        assert!(!h.list.editor().open);
        assert!(!h.list.has_pending_refetch());

        h.list.open_editor(1);
        h.list.close_editor(true);
        assert!(h.list.settle().await);
    }
}

mod groups {
    use super::*;

    #[tokio::test]
    async fn test_group_options_loaded_from_map() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_group_map"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "",
                "data": {
                    "default": { "symbol": "default", "name": "Default", "ratio": 1 },
                    "svip": { "symbol": "svip", "name": "SVIP", "ratio": 0.5 }
                }
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Role::Common);
        let options = h.list.group_options().await;
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].value, "svip");
        assert_eq!(options[1].label, "SVIP (ratio: 0.5)");
    }

    #[tokio::test]
    async fn test_group_failure_yields_empty_options() {
        let server = MockServer::start().await;
        let h = harness(&server, Role::Common);
        assert!(h.list.group_options().await.is_empty());
    }
}

mod background_fetch {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use token_console::billing::DateRange;
    use token_console::errors::ConsoleError;
    use token_console::gateway::{ListParams, TokenGateway};
    use token_console::models::billing::BillingTagReport;
    use token_console::models::envelope::{ApiEnvelope, Page};
    use token_console::models::group::UserGroup;
    use token_console::models::token::Token;

    use super::*;

    /// Gateway whose list call panics mid-request.
    struct BrokenGateway;

    #[async_trait]
    impl TokenGateway for BrokenGateway {
        async fn list_tokens(
            &self,
            _scope: QueryScope,
            _params: &ListParams,
        ) -> Result<Page<Token>, ConsoleError> {
            panic!("connection pool poisoned");
        }

        async fn delete_token(
            &self,
            _scope: QueryScope,
            _id: i64,
        ) -> Result<ApiEnvelope<Value>, ConsoleError> {
            Err(ConsoleError::api("unused"))
        }

        async fn update_token_status(
            &self,
            _scope: QueryScope,
            _id: i64,
            _status: TokenStatus,
        ) -> Result<ApiEnvelope<Value>, ConsoleError> {
            Err(ConsoleError::api("unused"))
        }

        async fn list_users(&self, _keyword: &str) -> Result<Vec<UserOption>, ConsoleError> {
            Err(ConsoleError::api("unused"))
        }

        async fn list_groups(&self) -> Result<HashMap<String, UserGroup>, ConsoleError> {
            Err(ConsoleError::api("unused"))
        }

        async fn billing_tag_report(
            &self,
            _range: &DateRange,
        ) -> Result<BillingTagReport, ConsoleError> {
            Err(ConsoleError::api("unused"))
        }

        async fn export_billing_tag_csv(
            &self,
            _range: &DateRange,
        ) -> Result<Vec<u8>, ConsoleError> {
            Err(ConsoleError::api("unused"))
        }
    }

    #[tokio::test]
    async fn test_panicking_request_still_completes_the_cycle() {
        let (notifier, mut notices) = ChannelNotifier::new();
        let mut list = TokenListController::new(
            Viewer::new(Role::Common),
            Arc::new(BrokenGateway),
            Arc::new(MemoryPreferenceStore::new()),
            Arc::new(notifier),
        );

        let seq = list.spawn_fetch().unwrap();
        assert!(list.is_loading());

        let (done, applied) =
            tokio::time::timeout(Duration::from_secs(5), list.apply_next_completion())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(done, seq);
        assert!(!applied);
        assert!(!list.is_loading());

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("request task failed"));
    }
}
