//! Toolkit-independent view models for the events screen.
//!
//! Each view owns only presentation state (form inputs, which comments were
//! liked this session) and hands every data operation to [`EventBoard`].
//! `render` produces plain text lines, which is what the CLI prints.

use std::collections::HashSet;

use shared::{
    domain::{CommentId, EventId},
    protocol::{EventSummary, UpsertEventRequest},
};
use tracing::debug;

use crate::{
    board::EventBoard,
    comments::{parse_timestamp, Comment, CommentThread},
    ClientError, Result,
};

const SKELETON_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardIntent {
    Like(EventId),
    Edit(EventDraft),
    ViewComments(EventId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCardView {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub img_link: String,
    pub number_of_likes: u64,
    pub comment_count: usize,
}

impl EventCardView {
    pub fn new(event: &EventSummary, comment_count: usize) -> Self {
        Self {
            id: event.uqid.clone(),
            name: event.name.clone(),
            description: event.description.clone(),
            img_link: event.img_link.clone(),
            number_of_likes: event.number_of_likes,
            comment_count,
        }
    }

    pub fn like_label(&self) -> String {
        format!("Like ({})", self.number_of_likes)
    }

    pub fn comments_label(&self) -> String {
        format!("Comments ({})", self.comment_count)
    }

    pub fn like(&self) -> CardIntent {
        CardIntent::Like(self.id.clone())
    }

    pub fn edit(&self) -> CardIntent {
        CardIntent::Edit(EventDraft {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            img_link: self.img_link.clone(),
        })
    }

    pub fn view_comments(&self) -> CardIntent {
        CardIntent::ViewComments(self.id.clone())
    }

    pub fn render(&self) -> Vec<String> {
        vec![
            format!("{} [{}]", self.name, self.id),
            format!("  {}", self.description),
            format!("  image: {}", self.img_link),
            format!("  {}  {}", self.like_label(), self.comments_label()),
        ]
    }
}

/// Form contents of the create/edit dialog. An id means edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub id: Option<EventId>,
    pub name: String,
    pub description: String,
    pub img_link: String,
}

impl EventDraft {
    pub fn is_edit(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.description.is_empty() && !self.img_link.is_empty()
    }

    pub fn to_request(&self) -> UpsertEventRequest {
        UpsertEventRequest {
            uqid: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            img_link: self.img_link.clone(),
        }
    }
}

impl From<&EventSummary> for EventDraft {
    fn from(event: &EventSummary) -> Self {
        Self {
            id: Some(event.uqid.clone()),
            name: event.name.clone(),
            description: event.description.clone(),
            img_link: event.img_link.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventDialog {
    open: bool,
    draft: EventDraft,
}

impl EventDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_for_create(&mut self) {
        self.draft = EventDraft::default();
        self.open = true;
    }

    pub fn open_for_edit(&mut self, draft: EventDraft) {
        self.draft = draft;
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn draft(&self) -> &EventDraft {
        &self.draft
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_img_link(&mut self, img_link: impl Into<String>) {
        self.draft.img_link = img_link.into();
    }

    pub fn title(&self) -> &'static str {
        if self.draft.is_edit() {
            "Edit Event"
        } else {
            "Create New Event"
        }
    }

    pub fn save_label(&self) -> &'static str {
        if self.draft.is_edit() {
            "Update Event"
        } else {
            "Create Event"
        }
    }

    pub fn can_save(&self) -> bool {
        self.draft.is_complete()
    }

    /// Submits the draft. On success the draft is cleared and the dialog
    /// closes; on failure both are left as they were.
    pub async fn save(&mut self, board: &EventBoard) -> Result<Option<EventSummary>> {
        if !self.can_save() {
            return Err(ClientError::Validation(
                "name, description and image link are required",
            ));
        }
        let saved = board.save_event(self.draft.to_request()).await?;
        self.draft = EventDraft::default();
        self.open = false;
        Ok(saved)
    }

    pub fn render(&self) -> Vec<String> {
        let field = |label: &str, value: &str| format!("  {label:<12} {value}");
        vec![
            self.title().to_string(),
            field("Name", &self.draft.name),
            field("Description", &self.draft.description),
            field("Image URL", &self.draft.img_link),
            format!(
                "  [{}]{}",
                self.save_label(),
                if self.can_save() { "" } else { " (disabled)" }
            ),
        ]
    }
}

/// Comments dialog state. The liked set lives for the lifetime of the view
/// only; it is not persisted anywhere.
#[derive(Debug, Clone, Default)]
pub struct EventCommentsView {
    author: String,
    text: String,
    liked: HashSet<CommentId>,
}

impl EventCommentsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn can_submit(&self) -> bool {
        !self.author.trim().is_empty() && !self.text.trim().is_empty()
    }

    pub fn can_like(&self, comment_id: &CommentId) -> bool {
        !self.liked.contains(comment_id)
    }

    /// Posts the comment on the board's selected event and clears the inputs.
    pub async fn submit(&mut self, board: &EventBoard) -> Result<()> {
        if !self.can_submit() {
            debug!("comment submission skipped: missing author or text");
            return Err(ClientError::Validation("author and comment text are required"));
        }
        board.add_comment(&self.author, &self.text).await?;
        self.author.clear();
        self.text.clear();
        Ok(())
    }

    /// Likes a comment once per session. Returns false when it was already
    /// liked through this view.
    pub async fn like(&mut self, board: &EventBoard, comment_id: &CommentId) -> Result<bool> {
        if !self.can_like(comment_id) {
            return Ok(false);
        }
        board.like_comment(comment_id).await?;
        self.liked.insert(comment_id.clone());
        Ok(true)
    }

    pub async fn load_more(&self, board: &EventBoard) -> Result<bool> {
        board.load_more_comments().await
    }

    pub fn render(&self, event: &EventSummary, thread: &CommentThread) -> Vec<String> {
        let mut lines = vec![format!("Comments on \"{}\"", event.name)];
        if thread.is_empty() {
            lines.push("  No comments yet. Be the first to comment!".to_string());
            return lines;
        }
        for comment in thread.comments() {
            lines.extend(self.render_comment(comment));
        }
        if thread.has_more() {
            lines.push("  [Load More Comments]".to_string());
        }
        lines
    }

    fn render_comment(&self, comment: &Comment) -> Vec<String> {
        let author = if comment.user.is_empty() {
            "Anonymous"
        } else {
            comment.user.as_str()
        };
        let liked = if self.can_like(&comment.id) {
            ""
        } else {
            " (liked)"
        };
        vec![
            format!("  {author} [{}]", comment.id),
            format!("    {}", comment.text),
            format!(
                "    {}  👍 {}{liked}",
                format_comment_date(&comment.created_at),
                comment.number_of_likes
            ),
        ]
    }
}

/// `May 1, 2024, 12:30 PM`, or "Unknown date" when the value does not parse.
pub fn format_comment_date(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|ts| ts.format("%b %-d, %Y, %I:%M %p").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

pub struct EventListView;

impl EventListView {
    pub async fn cards(board: &EventBoard) -> Vec<EventCardView> {
        let mut cards = Vec::new();
        for event in board.events().await {
            let count = board.comment_count(&event.uqid).await;
            cards.push(EventCardView::new(&event, count));
        }
        cards
    }

    pub async fn render(board: &EventBoard) -> Vec<String> {
        if board.is_loading().await {
            return vec!["  ...".to_string(); SKELETON_ROWS];
        }
        let cards = Self::cards(board).await;
        if cards.is_empty() {
            return vec!["No events found.".to_string()];
        }
        let mut lines = Vec::new();
        for card in cards {
            lines.extend(card.render());
            lines.push(String::new());
        }
        lines.pop();
        lines
    }

    /// Routes a card intent the way the list screen does: likes go straight
    /// to the board, edits open the dialog, comments open the thread.
    pub async fn handle(
        board: &EventBoard,
        dialog: &mut EventDialog,
        intent: CardIntent,
    ) -> Result<()> {
        match intent {
            CardIntent::Like(event_id) => board.like_event(&event_id).await,
            CardIntent::Edit(draft) => {
                dialog.open_for_edit(draft);
                Ok(())
            }
            CardIntent::ViewComments(event_id) => {
                board.open_comments(&event_id).await.map(|_| ())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
