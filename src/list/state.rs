//! Pure list state. Every mutation reports whether the visible page is now
//! out of date; the controller turns that into a refetch request.

use crate::errors::ConsoleError;
use crate::gateway::ListParams;
use crate::models::envelope::Page;
use crate::models::token::{Token, TokenStatus};
use crate::models::user::{UserOption, Viewer};
use crate::scope::QueryScope;

/// Preference key of the token list.
pub const VIEW_NAME: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Columns the server accepts as a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Name,
    Group,
    Status,
    UsedQuota,
    RemainQuota,
    CreatedTime,
    ExpiredTime,
}

impl SortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Name => "name",
            SortColumn::Group => "group",
            SortColumn::Status => "status",
            SortColumn::UsedQuota => "used_quota",
            SortColumn::RemainQuota => "remain_quota",
            SortColumn::CreatedTime => "created_time",
            SortColumn::ExpiredTime => "expired_time",
        }
    }

    /// `None` for empty, unknown and non-sortable column ids.
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "id" => Some(SortColumn::Id),
            "name" => Some(SortColumn::Name),
            "group" => Some(SortColumn::Group),
            "status" => Some(SortColumn::Status),
            "used_quota" => Some(SortColumn::UsedQuota),
            "remain_quota" => Some(SortColumn::RemainQuota),
            "created_time" => Some(SortColumn::CreatedTime),
            "expired_time" => Some(SortColumn::ExpiredTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: Option<SortColumn>,
    pub direction: SortDirection,
}

impl Default for Sort {
    /// Newest first.
    fn default() -> Self {
        Self {
            column: Some(SortColumn::Id),
            direction: SortDirection::Desc,
        }
    }
}

impl Sort {
    /// Wire form: `id`, `-id`, or nothing when unsorted.
    pub fn wire(&self) -> Option<String> {
        self.column.map(|c| match self.direction {
            SortDirection::Asc => c.as_str().to_string(),
            SortDirection::Desc => format!("-{}", c.as_str()),
        })
    }
}

/// Table-head column description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub id: &'static str,
    pub label: &'static str,
    pub sortable: bool,
    pub admin_only: bool,
}

pub const COLUMNS: [Column; 9] = [
    Column { id: "name", label: "Name", sortable: true, admin_only: false },
    Column { id: "group", label: "Group", sortable: true, admin_only: false },
    Column { id: "billing_tag", label: "Billing tag", sortable: false, admin_only: true },
    Column { id: "status", label: "Status", sortable: true, admin_only: false },
    Column { id: "used_quota", label: "Used", sortable: true, admin_only: false },
    Column { id: "remain_quota", label: "Remaining", sortable: true, admin_only: false },
    Column { id: "created_time", label: "Created", sortable: true, admin_only: false },
    Column { id: "expired_time", label: "Expires", sortable: true, admin_only: false },
    Column { id: "action", label: "Actions", sortable: false, admin_only: false },
];

pub fn visible_columns(viewer: &Viewer) -> Vec<Column> {
    COLUMNS
        .iter()
        .filter(|c| !c.admin_only || viewer.is_admin())
        .copied()
        .collect()
}

/// Filter, sort and pagination the operator has chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 0-based.
    pub page: u32,
    pub page_size: u32,
    pub sort: Sort,
    /// Always stored trimmed.
    pub keyword: String,
    pub target: Option<UserOption>,
}

impl ListQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
            sort: Sort::default(),
            keyword: String::new(),
            target: None,
        }
    }

    /// Header click. Same column flips direction, a new column starts
    /// ascending. Empty or non-sortable ids are ignored.
    pub fn set_sort(&mut self, column_id: &str) -> bool {
        let Some(column) = SortColumn::parse(column_id) else {
            return false;
        };
        let currently_asc =
            self.sort.column == Some(column) && self.sort.direction == SortDirection::Asc;
        self.sort = Sort {
            column: Some(column),
            direction: if currently_asc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        };
        true
    }

    /// No bound check: the server owns the total.
    pub fn set_page(&mut self, page: u32) -> bool {
        let changed = self.page != page;
        self.page = page;
        changed
    }

    pub fn set_page_size(&mut self, size: u32) -> bool {
        if size == 0 {
            return false;
        }
        let changed = self.page_size != size || self.page != 0;
        self.page_size = size;
        self.page = 0;
        changed
    }

    pub fn submit_search(&mut self, raw: &str) -> bool {
        let keyword = raw.trim();
        let changed = self.keyword != keyword || self.page != 0;
        self.keyword = keyword.to_string();
        self.page = 0;
        changed
    }

    pub fn select_target(&mut self, target: Option<UserOption>) -> bool {
        let changed = self.target != target || self.page != 0;
        self.target = target;
        self.page = 0;
        changed
    }

    pub fn reset_sort(&mut self) {
        self.sort = Sort::default();
    }

    pub fn scope(&self, viewer: &Viewer) -> QueryScope {
        QueryScope::resolve(viewer, self.target.as_ref())
    }

    pub fn params(&self) -> ListParams {
        ListParams {
            page: self.page.saturating_add(1),
            size: self.page_size,
            keyword: self.keyword.trim().to_string(),
            order: self.sort.wire(),
        }
    }
}

/// The page currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResult {
    pub total_count: u64,
    pub rows: Vec<Token>,
}

impl ListResult {
    /// Count and rows always move together.
    pub fn replace(&mut self, page: Page<Token>) {
        *self = ListResult {
            total_count: page.total_count,
            rows: page.data,
        };
    }

    pub fn page_count(&self, page_size: u32) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(u64::from(page_size))
    }

    /// Returns false when the row is not on this page.
    pub fn patch_status(&mut self, id: i64, status: TokenStatus) -> bool {
        match self.rows.iter_mut().find(|t| t.id == id) {
            Some(token) => {
                token.status = status;
                true
            }
            None => false,
        }
    }
}

/// Issued request of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub scope: QueryScope,
    pub params: ListParams,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Applied,
    /// Rows were kept; the error still has to reach the operator.
    Failed(ConsoleError),
    /// A newer cycle was issued after this one; the response was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub query: ListQuery,
    pub result: ListResult,
    pub loading: bool,
    issued: u64,
}

impl ListState {
    pub fn new(page_size: u32) -> Self {
        Self {
            query: ListQuery::new(page_size),
            result: ListResult::default(),
            loading: false,
            issued: 0,
        }
    }

    pub fn latest_seq(&self) -> u64 {
        self.issued
    }

    pub fn begin_fetch(&mut self, viewer: &Viewer) -> FetchTicket {
        self.issued += 1;
        self.loading = true;
        FetchTicket {
            seq: self.issued,
            scope: self.query.scope(viewer),
            params: self.query.params(),
        }
    }

    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Page<Token>, ConsoleError>,
    ) -> FetchOutcome {
        if ticket.seq != self.issued {
            return FetchOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.result.replace(page);
                FetchOutcome::Applied
            }
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}
