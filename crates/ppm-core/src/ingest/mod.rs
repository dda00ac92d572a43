//! Log ingestion: from a tabular event log file to sentinel-bounded,
//! per-case ordered traces.

pub mod reader;
pub mod source;
pub mod table;
pub mod trace;

pub use reader::LogReader;
pub use source::SourceKind;
pub use table::RawTable;
pub use trace::{CaseTrace, Event, EventLog, EventType, Transition, END, START, SYSTEM_USER};
