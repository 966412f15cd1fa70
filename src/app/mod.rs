mod annotation;
mod collapse;
mod navigation;
mod state;

pub use annotation::{
    comment_counts_by_file, commented_lines, jump_to_unresolved, toggle_resolved,
    AnnotationSession, ComposerState,
};
pub use collapse::CollapseRules;
pub use navigation::{compute_targets, find_file, NavigationEngine, NavigationRequest, NavigationTarget};
pub use state::ReviewState;
