pub mod store;

pub use store::{ListLogsParams, ListLogsResult, append_log, list_logs};
