//! Token list: query/result state and the controller that keeps the
//! displayed page in step with it.

pub mod controller;
pub mod state;

pub use controller::{EditorState, RefetchReason, TokenListController};
pub use state::{
    visible_columns, Column, FetchOutcome, FetchTicket, ListQuery, ListResult, ListState, Sort,
    SortColumn, SortDirection, COLUMNS, VIEW_NAME,
};
