use super::annotation::{self, AnnotationSession};
use super::collapse::CollapseRules;
use super::navigation::{NavigationEngine, NavigationRequest, NavigationTarget};
use crate::config::ReviewConfig;
use crate::diff::{join_diff_sources, parse_diff};
use crate::review::{
    serialize_review, CommentStatus, CommentTag, MessageOptions, ReviewComment, ReviewMessage,
    ReviewRequest,
};
use std::collections::{HashMap, HashSet};

/// Everything one open diff view needs: the parsed model with its cursor,
/// the mark/composer, and the latest comment snapshot pushed from outside.
///
/// Mutations of comments never happen here. They leave as [`ReviewRequest`]s
/// and come back through [`ReviewState::update_comments`].
#[derive(Debug)]
pub struct ReviewState {
    session_id: String,
    raw_diff: String,
    nav: NavigationEngine,
    annotations: AnnotationSession,
    comments: Vec<ReviewComment>,
    options: MessageOptions,
}

impl ReviewState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            raw_diff: String::new(),
            nav: NavigationEngine::new(true),
            annotations: AnnotationSession::new(),
            comments: Vec::new(),
            options: MessageOptions::default(),
        }
    }

    pub fn from_config(session_id: impl Into<String>, config: &ReviewConfig) -> Self {
        let mut state = Self::new(session_id);
        state.nav = NavigationEngine::new(config.navigation.follow)
            .with_collapse_rules(CollapseRules::new(&config.navigation.auto_collapse));
        state.options = MessageOptions {
            include_code_context: config.review.include_code_context,
        };
        state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn nav(&self) -> &NavigationEngine {
        &self.nav
    }

    pub fn nav_mut(&mut self) -> &mut NavigationEngine {
        &mut self.nav
    }

    pub fn annotations(&self) -> &AnnotationSession {
        &self.annotations
    }

    pub fn comments(&self) -> &[ReviewComment] {
        &self.comments
    }

    // ── Inputs ──

    /// Re-parse the model from the full diff text. Unchanged text is ignored.
    pub fn update_diff(&mut self, raw: &str) {
        if raw == self.raw_diff {
            return;
        }
        self.raw_diff = raw.to_string();
        self.nav.set_files(parse_diff(raw));
    }

    /// Re-parse from accumulated per-turn diffs plus the live diff
    pub fn update_sources<S: AsRef<str>>(&mut self, accumulated: &[S], live: Option<&str>) {
        let joined = join_diff_sources(accumulated, live);
        self.update_diff(&joined);
    }

    pub fn update_comments(&mut self, comments: Vec<ReviewComment>) {
        tracing::debug!(count = comments.len(), "comment snapshot updated");
        self.comments = comments;
    }

    /// Finished sessions stop follow mode from chasing new files
    pub fn set_session_active(&mut self, active: bool) {
        self.nav.set_session_active(active);
    }

    pub fn request_navigation(&mut self, target: impl Into<String>, line: Option<usize>) -> bool {
        self.nav.request_navigation(NavigationRequest::new(target, line))
    }

    // ── Composer ──

    pub fn set_mark(&mut self) -> bool {
        self.annotations.set_mark(&self.nav)
    }

    pub fn clear_mark(&mut self) {
        self.annotations.clear_mark();
    }

    pub fn open_composer(&mut self) -> bool {
        self.annotations.open_composer(&self.nav)
    }

    pub fn set_draft(&mut self, body: impl Into<String>, tag: Option<CommentTag>) {
        self.annotations.set_body(body);
        self.annotations.set_tag(tag);
    }

    pub fn cancel_composer(&mut self) {
        self.annotations.cancel();
    }

    pub fn submit_comment(&mut self) -> Option<ReviewRequest> {
        self.annotations.submit()
    }

    // ── Comments ──

    pub fn toggle_resolved(&self, id: &str) -> Option<ReviewRequest> {
        annotation::toggle_resolved(&self.comments, id)
    }

    /// New-side number of the cursor line, if it is one
    pub fn cursor_line_number(&self) -> Option<usize> {
        let Some(NavigationTarget::Line { file, hunk, line }) = self.nav.current_target() else {
            return None;
        };
        self.nav.files().get(file)?.line(hunk, line)?.new_num
    }

    /// Comments covering the cursor line, oldest first
    pub fn comments_at_cursor(&self) -> Vec<&ReviewComment> {
        let Some(NavigationTarget::Line { file, hunk, line }) = self.nav.current_target() else {
            return Vec::new();
        };
        let Some(diff) = self.nav.files().get(file) else {
            return Vec::new();
        };
        let Some(line_num) = diff.line(hunk, line).and_then(|l| l.new_num) else {
            return Vec::new();
        };
        self.comments
            .iter()
            .filter(|c| c.file_path == diff.path() && c.covers(line_num))
            .collect()
    }

    /// Toggle the first comment on the cursor line
    pub fn toggle_resolved_at_cursor(&self) -> Option<ReviewRequest> {
        let id = self.comments_at_cursor().first()?.id.clone();
        self.toggle_resolved(&id)
    }

    pub fn next_unresolved(&mut self) -> bool {
        annotation::jump_to_unresolved(&mut self.nav, &self.comments, true)
    }

    pub fn prev_unresolved(&mut self) -> bool {
        annotation::jump_to_unresolved(&mut self.nav, &self.comments, false)
    }

    pub fn comment_counts(&self) -> HashMap<String, usize> {
        annotation::comment_counts_by_file(&self.comments)
    }

    pub fn commented_lines(&self, file_path: &str) -> HashSet<usize> {
        match self.nav.files().iter().find(|f| f.path() == file_path) {
            Some(file) => annotation::commented_lines(&self.comments, file),
            None => HashSet::new(),
        }
    }

    pub fn open_comment_count(&self) -> usize {
        self.comments.iter().filter(|c| c.is_open()).count()
    }

    // ── Review message ──

    pub fn review_message(&self, selection: Option<&[String]>) -> Option<ReviewMessage> {
        serialize_review(&self.comments, self.nav.files(), selection, &self.options)
    }

    /// Requests for sending the review: the message, then a resolve for every
    /// comment it includes. Empty when no comment qualifies.
    pub fn send_review(&self, selection: Option<&[String]>) -> Vec<ReviewRequest> {
        let Some(message) = self.review_message(selection) else {
            return Vec::new();
        };
        tracing::debug!(comments = message.comment_ids.len(), "sending review");
        let mut requests = vec![ReviewRequest::SendMessage {
            session_id: self.session_id.clone(),
            text: message.text,
        }];
        requests.extend(message.comment_ids.into_iter().map(|id| ReviewRequest::SetCommentStatus {
            id,
            status: CommentStatus::Resolved,
        }));
        requests
    }
}
