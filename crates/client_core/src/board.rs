//! Client-side state for the events screen: the event list, the event whose
//! comments are open, and the comment threads of every listed event.
//!
//! All data comes from the server. Every mutation is followed by a re-fetch
//! rather than a local patch.

use std::sync::Arc;

use futures::future::join_all;
use shared::{
    domain::{CommentId, EventId},
    protocol::{AddCommentRequest, EventSummary, UpsertEventRequest},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    comments::{Comment, CommentStore, CommentThread, FetchMode},
    ClientError, EventsApi, Result,
};

#[derive(Default)]
struct BoardState {
    events: Vec<EventSummary>,
    refreshes_in_flight: usize,
    selected: Option<EventId>,
    comments: CommentStore,
}

pub struct EventBoard {
    api: Arc<dyn EventsApi>,
    prefetch_comments: bool,
    inner: Mutex<BoardState>,
}

impl EventBoard {
    pub fn new(api: Arc<dyn EventsApi>) -> Self {
        Self {
            api,
            prefetch_comments: true,
            inner: Mutex::new(BoardState::default()),
        }
    }

    /// Whether a refresh also loads the first comment page of every event.
    pub fn with_comment_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch_comments = enabled;
        self
    }

    pub fn api(&self) -> &Arc<dyn EventsApi> {
        &self.api
    }

    pub async fn events(&self) -> Vec<EventSummary> {
        self.inner.lock().await.events.clone()
    }

    pub async fn event(&self, event_id: &EventId) -> Option<EventSummary> {
        self.inner
            .lock()
            .await
            .events
            .iter()
            .find(|event| &event.uqid == event_id)
            .cloned()
    }

    /// True while at least one refresh is running.
    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.refreshes_in_flight > 0
    }

    pub async fn selected_event_id(&self) -> Option<EventId> {
        self.inner.lock().await.selected.clone()
    }

    pub async fn selected_event(&self) -> Option<EventSummary> {
        let state = self.inner.lock().await;
        let selected = state.selected.as_ref()?;
        state
            .events
            .iter()
            .find(|event| &event.uqid == selected)
            .cloned()
    }

    pub async fn thread(&self, event_id: &EventId) -> CommentThread {
        self.inner
            .lock()
            .await
            .comments
            .thread(event_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn comments(&self, event_id: &EventId) -> Vec<Comment> {
        self.thread(event_id).await.comments().to_vec()
    }

    /// Number of comments loaded so far for the event.
    pub async fn comment_count(&self, event_id: &EventId) -> usize {
        self.inner
            .lock()
            .await
            .comments
            .thread(event_id)
            .map_or(0, CommentThread::len)
    }

    /// Reloads the event list. Comments embedded in the listing seed threads
    /// that were never fetched; the first comment page of each event is then
    /// prefetched concurrently. A failed prefetch is logged and skipped.
    pub async fn refresh_events(&self) -> Result<()> {
        self.inner.lock().await.refreshes_in_flight += 1;
        let result = self.load_events().await;
        let mut state = self.inner.lock().await;
        state.refreshes_in_flight = state.refreshes_in_flight.saturating_sub(1);
        result
    }

    async fn load_events(&self) -> Result<()> {
        let Some(mut events) = self.api.list_events().await? else {
            return Ok(());
        };
        info!(count = events.len(), "fetched events");

        let event_ids: Vec<EventId> = events.iter().map(|event| event.uqid.clone()).collect();
        {
            let mut state = self.inner.lock().await;
            state.comments.retain_events(&event_ids);
            for event in &mut events {
                let embedded: Vec<Comment> = std::mem::take(&mut event.comments)
                    .into_iter()
                    .map(|record| Comment::from_record(&event.uqid, record))
                    .collect();
                if !embedded.is_empty() || event.total_comments.is_some() {
                    state
                        .comments
                        .thread_mut(&event.uqid)
                        .seed(embedded, event.total_comments);
                }
            }
            let selection_gone = state
                .selected
                .as_ref()
                .is_some_and(|selected| !event_ids.contains(selected));
            if selection_gone {
                debug!("selected event is gone; closing comments");
                state.selected = None;
            }
            state.events = events;
        }

        if self.prefetch_comments {
            join_all(event_ids.iter().map(|event_id| async move {
                if let Err(err) = self.fetch_comments(event_id, FetchMode::Replace).await {
                    warn!(event_id = %event_id, "failed to prefetch comments: {err}");
                }
            }))
            .await;
        }
        Ok(())
    }

    /// Fetches one comment page for the event. Returns whether the page was
    /// applied; it is not when there are no further pages to append, when
    /// the server redirected, or when a newer fetch for the same event was
    /// issued while this one was in flight.
    pub async fn fetch_comments(&self, event_id: &EventId, mode: FetchMode) -> Result<bool> {
        let ticket = {
            let mut state = self.inner.lock().await;
            match state.comments.begin_fetch(event_id, mode) {
                Some(ticket) => ticket,
                None => {
                    debug!(event_id = %event_id, "no further comment pages");
                    return Ok(false);
                }
            }
        };
        debug!(
            event_id = %event_id,
            seq = ticket.seq,
            cursor = ?ticket.cursor,
            "fetching comments"
        );

        let Some(page) = self
            .api
            .get_comments(event_id, ticket.cursor.as_deref())
            .await?
        else {
            return Ok(false);
        };
        let received = page.comments.len();
        let applied = self.inner.lock().await.comments.apply(&ticket, page);
        if applied {
            debug!(event_id = %event_id, received, "applied comment page");
        }
        Ok(applied)
    }

    /// Creates the event when the request has no id, updates it otherwise.
    pub async fn save_event(&self, request: UpsertEventRequest) -> Result<Option<EventSummary>> {
        let saved = self.api.upsert_event(&request).await?;
        if saved.is_some() {
            self.refresh_events().await?;
        }
        Ok(saved)
    }

    pub async fn like_event(&self, event_id: &EventId) -> Result<()> {
        if self.api.like_event(event_id).await?.is_some() {
            self.refresh_events().await?;
        }
        Ok(())
    }

    /// Selects the event for the comments view and loads its first page.
    pub async fn open_comments(&self, event_id: &EventId) -> Result<bool> {
        self.inner.lock().await.selected = Some(event_id.clone());
        self.fetch_comments(event_id, FetchMode::Replace).await
    }

    pub async fn close_comments(&self) {
        self.inner.lock().await.selected = None;
    }

    pub async fn load_more_comments(&self) -> Result<bool> {
        let event_id = self.require_selection().await?;
        self.fetch_comments(&event_id, FetchMode::Append).await
    }

    /// Posts a comment on the selected event, then reloads its first page.
    /// Once the post succeeded a failed reload is only logged.
    pub async fn add_comment(&self, author: &str, text: &str) -> Result<()> {
        let event_id = self.require_selection().await?;
        let request = AddCommentRequest {
            uqid: event_id.clone(),
            user: author.to_string(),
            text: text.to_string(),
        };
        if let Some(response) = self.api.add_comment(&request).await? {
            debug!(event_id = %event_id, comment_id = ?response.comment_uqid, "comment added");
            self.reload_thread(&event_id).await;
        }
        Ok(())
    }

    /// Likes a comment, then reloads the first page of the thread it belongs
    /// to (the selected event when the comment is not loaded anywhere). A
    /// failed reload is logged and does not fail the like.
    pub async fn like_comment(&self, comment_id: &CommentId) -> Result<()> {
        if self.api.like_comment(comment_id).await?.is_none() {
            return Ok(());
        }
        let owner = {
            let state = self.inner.lock().await;
            state
                .events
                .iter()
                .map(|event| &event.uqid)
                .find(|event_id| {
                    state
                        .comments
                        .thread(event_id)
                        .is_some_and(|thread| thread.comment(comment_id).is_some())
                })
                .or(state.selected.as_ref())
                .cloned()
        };
        if let Some(event_id) = owner {
            self.reload_thread(&event_id).await;
        }
        Ok(())
    }

    async fn reload_thread(&self, event_id: &EventId) {
        if let Err(err) = self.fetch_comments(event_id, FetchMode::Replace).await {
            warn!(event_id = %event_id, "failed to reload comments: {err}");
        }
    }

    async fn require_selection(&self) -> Result<EventId> {
        self.inner
            .lock()
            .await
            .selected
            .clone()
            .ok_or(ClientError::NoSelection)
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
