//! Comment pagination state, kept once per event.
//!
//! Every view that shows comments reads from [`CommentStore`]; there is no
//! second copy to keep in sync. Each fetch is issued a [`FetchTicket`] with a
//! per-event sequence number and only the response to the latest ticket is
//! applied, so a slow page can never overwrite a newer one.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use shared::{
    domain::{CommentId, EventId},
    protocol::{CommentPageResponse, CommentRecord},
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub event_id: EventId,
    pub user: String,
    pub text: String,
    pub created_at: String,
    pub number_of_likes: u64,
}

impl Comment {
    /// Normalizes a wire record: a missing or empty `created_at` becomes the
    /// current time and a missing like count becomes zero.
    pub fn from_record(event_id: &EventId, record: CommentRecord) -> Self {
        let created_at = record
            .created_at
            .filter(|ts| !ts.trim().is_empty())
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        Self {
            id: record.uqid,
            event_id: record.event_uqid.unwrap_or_else(|| event_id.clone()),
            user: record.user,
            text: record.text,
            created_at,
            number_of_likes: record.number_of_likes.unwrap_or(0),
        }
    }

    /// Accepts RFC 3339 as well as naive ISO timestamps, which are read as UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub total: Option<u64>,
}

impl CommentPage {
    pub fn from_response(event_id: &EventId, response: CommentPageResponse) -> Self {
        let next_cursor = response.next_cursor.filter(|cursor| !cursor.is_empty());
        let pagination = response.pagination.unwrap_or_default();
        Self {
            comments: response
                .comments
                .into_iter()
                .map(|record| Comment::from_record(event_id, record))
                .collect(),
            has_more: next_cursor.is_some() || pagination.has_more,
            next_cursor,
            total: pagination.total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Start over from the first page.
    Replace,
    /// Continue from the stored cursor.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub event_id: EventId,
    pub seq: u64,
    pub cursor: Option<String>,
}

impl FetchTicket {
    pub fn appends(&self) -> bool {
        self.cursor.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentThread {
    comments: Vec<Comment>,
    next_cursor: Option<String>,
    has_more: bool,
    total: Option<u64>,
    latest_seq: u64,
    loaded: bool,
}

impl CommentThread {
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == id)
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Issues the next ticket. `Append` yields nothing when the server
    /// reported no further pages. The stored cursor is left alone until a
    /// page is applied, so a failed fetch keeps the thread as it was.
    pub fn begin_fetch(&mut self, event_id: &EventId, mode: FetchMode) -> Option<FetchTicket> {
        let cursor = match mode {
            FetchMode::Replace => None,
            FetchMode::Append => Some(self.next_cursor.clone()?),
        };
        self.latest_seq += 1;
        Some(FetchTicket {
            event_id: event_id.clone(),
            seq: self.latest_seq,
            cursor,
        })
    }

    /// Applies a page fetched with `ticket`. Returns false when a newer fetch
    /// has been issued since, in which case the page is dropped.
    pub fn apply(&mut self, ticket: &FetchTicket, page: CommentPage) -> bool {
        if ticket.seq != self.latest_seq {
            debug!(
                event_id = %ticket.event_id,
                seq = ticket.seq,
                latest = self.latest_seq,
                "dropping stale comment page"
            );
            return false;
        }

        if ticket.appends() {
            self.comments.extend(page.comments);
        } else {
            self.comments = page.comments;
        }
        self.next_cursor = page.next_cursor;
        self.has_more = page.has_more;
        self.total = page.total.or(self.total);
        self.loaded = true;
        true
    }

    /// Seeds comments embedded in an event listing. Ignored once a page has
    /// been fetched for this thread.
    pub fn seed(&mut self, comments: Vec<Comment>, total: Option<u64>) {
        if self.loaded {
            return;
        }
        self.comments = comments;
        self.total = total.or(self.total);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    threads: HashMap<EventId, CommentThread>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread(&self, event_id: &EventId) -> Option<&CommentThread> {
        self.threads.get(event_id)
    }

    pub fn thread_mut(&mut self, event_id: &EventId) -> &mut CommentThread {
        self.threads.entry(event_id.clone()).or_default()
    }

    pub fn begin_fetch(&mut self, event_id: &EventId, mode: FetchMode) -> Option<FetchTicket> {
        self.thread_mut(event_id).begin_fetch(event_id, mode)
    }

    pub fn apply(&mut self, ticket: &FetchTicket, page: CommentPage) -> bool {
        self.thread_mut(&ticket.event_id).apply(ticket, page)
    }

    /// Drops threads of events that are no longer listed.
    pub fn retain_events<'a>(&mut self, event_ids: impl IntoIterator<Item = &'a EventId>) {
        let keep: HashSet<&EventId> = event_ids.into_iter().collect();
        self.threads.retain(|event_id, _| keep.contains(event_id));
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/comments_tests.rs"]
mod tests;
