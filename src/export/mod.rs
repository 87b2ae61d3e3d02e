//! Table exporters.
//!
//! Two placement policies share one row pipeline:
//!
//! - **Snapshot** ([`export_table`]): every row, rebuilt in memory and
//!   atomically swapped in on every run.
//! - **Incremental** ([`export_incremental`]): only rows past a watermark,
//!   written fresh on the first run and added after the existing content
//!   afterwards.
//!
//! Either way rows are scanned one at a time, normalized, and serialized as
//! one compact JSON object per line. When a shadow table is in play its rows
//! are merged in by ordering key ([`merge_by_key`]).

mod incremental;
mod merge;
mod source;
mod table;

pub use incremental::export_incremental;
pub use merge::merge_by_key;
pub use source::RowSource;
pub use table::{encode_jsonl, export_table, Jsonl};
