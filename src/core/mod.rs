pub mod comparator;
pub mod engine;
pub mod planner;
pub mod scanner;
pub mod selection;
pub mod transfer;

pub use comparator::{ComparisonRecord, FileComparator, FileStatus, Side, StatusSummary};
pub use engine::{Analysis, SyncConfig, SyncEngine, SyncReport, SyncStatus};
pub use planner::{CopyTask, ReasonTag, SyncDirection, SyncPlanner, SyncRequest, SyncRoots};
pub use scanner::{FileScanner, ScanConfig, ScanMap};
pub use selection::parse_selection;
pub use transfer::{copy_file, CopyOutcome};
