pub mod builtins;
pub mod classify;
pub mod config;
pub mod error;
pub mod patterns;
pub mod region;
pub mod rules;
pub mod snapshot;
pub mod tree;

pub use builtins::{
    BuiltinIgnores, PatternLayer, get_builtin_ignore_patterns, get_default_system_prompt,
};
pub use classify::{ExclusionMatcher, should_exclude};
pub use config::Config;
pub use error::{AppError, Result};
pub use patterns::{PatternSet, PatternStore, SavedPatterns};
pub use region::{Placement, TaggedRegion};
pub use rules::{RulesOptions, RulesOutcome, find_project_root, update_rules};
pub use snapshot::{SnapshotDocument, SnapshotOptions, SnapshotSummary, create_snapshot};
pub use tree::{WalkedEntry, generate_tree};
