//! Wiki side of the reconciliation: move log and page lookups.
//!
//! [`EventFeed`] and [`PageDirectory`] decouple the orchestration from the live
//! API. [`MediaWiki`] implements both against one language edition; tests
//! use the in-memory wiki from `test_support`.

use std::collections::VecDeque;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::cursor::{Position, is_after};
use crate::core::types::{MoveEvent, PageStatus};
use crate::io::mediawiki::ApiClient;

/// API cap for `lelimit`/`bllimit` for ordinary accounts.
const PAGE_SIZE: usize = 500;

/// Lazy sequence of move events.
pub type MoveEvents<'a> = Box<dyn Iterator<Item = Result<MoveEvent>> + 'a>;

pub trait EventFeed {
    /// Move events strictly after `since`, oldest first, at most `limit` of them.
    fn move_events<'a>(&'a self, since: Option<&Position>, limit: usize) -> MoveEvents<'a>;
}

pub trait PageDirectory {
    fn page_status(&self, title: &str) -> Result<PageStatus>;
    /// Titles of all pages redirecting to `title`.
    fn redirects_to(&self, title: &str) -> Result<Vec<String>>;
}

/// One language edition of the wiki, reached through its action API.
pub struct MediaWiki {
    client: ApiClient,
    namespace: i64,
}

impl MediaWiki {
    /// `namespace` restricts the move log to pages moved out of that namespace.
    pub fn new(client: ApiClient, namespace: i64) -> Self {
        Self { client, namespace }
    }

    fn fetch_moves(
        &self,
        since: Option<&str>,
        limit: usize,
        cont: Option<&str>,
    ) -> Result<(Vec<MoveEvent>, Option<String>)> {
        let namespace = self.namespace.to_string();
        let limit = limit.clamp(1, PAGE_SIZE).to_string();
        let mut params = vec![
            ("action", "query"),
            ("list", "logevents"),
            ("letype", "move"),
            ("ledir", "newer"),
            ("leprop", "title|timestamp|details"),
            ("lenamespace", namespace.as_str()),
            ("lelimit", limit.as_str()),
        ];
        if let Some(since) = since {
            params.push(("lestart", since));
        }
        if let Some(cont) = cont {
            params.push(("lecontinue", cont));
            params.push(("continue", "-||"));
        }
        let body = self.client.get(&params).context("fetch move log")?;
        parse_move_log(&body)
    }
}

impl EventFeed for MediaWiki {
    fn move_events<'a>(&'a self, since: Option<&Position>, limit: usize) -> MoveEvents<'a> {
        Box::new(MoveLogPager {
            wiki: self,
            since: since.cloned(),
            cont: None,
            buffer: VecDeque::new(),
            remaining: limit,
            exhausted: false,
        })
    }
}

impl PageDirectory for MediaWiki {
    #[instrument(skip(self))]
    fn page_status(&self, title: &str) -> Result<PageStatus> {
        let body = self
            .client
            .get(&[
                ("action", "query"),
                ("prop", "info"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .with_context(|| format!("fetch page info for {title}"))?;
        parse_page_status(&body, title)
    }

    #[instrument(skip(self))]
    fn redirects_to(&self, title: &str) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let mut cont: Option<String> = None;
        loop {
            let mut params = vec![
                ("action", "query"),
                ("list", "backlinks"),
                ("bltitle", title),
                ("blfilterredir", "redirects"),
                ("bllimit", "max"),
            ];
            if let Some(cont) = cont.as_deref() {
                params.push(("blcontinue", cont));
                params.push(("continue", "-||"));
            }
            let body = self
                .client
                .get(&params)
                .with_context(|| format!("fetch redirects to {title}"))?;
            let (page, next) = parse_backlinks(&body)?;
            titles.extend(page);
            match next {
                Some(next) => cont = Some(next),
                None => break,
            }
        }
        debug!(count = titles.len(), "redirects fetched");
        Ok(titles)
    }
}

/// Pages through `list=logevents` on demand.
struct MoveLogPager<'a> {
    wiki: &'a MediaWiki,
    since: Option<Position>,
    cont: Option<String>,
    buffer: VecDeque<MoveEvent>,
    remaining: usize,
    exhausted: bool,
}

impl MoveLogPager<'_> {
    fn refill(&mut self) -> Result<()> {
        let start = self.since.as_ref().map(|since| since.timestamp.as_str());
        let (events, cont) = self
            .wiki
            .fetch_moves(start, self.remaining, self.cont.as_deref())?;
        // `lestart` is inclusive and only has second precision; drop what the
        // cursor already covers.
        self.buffer.extend(
            events
                .into_iter()
                .filter(|event| is_after(self.since.as_ref(), &event.position())),
        );
        self.exhausted = cont.is_none();
        self.cont = cont;
        Ok(())
    }
}

impl Iterator for MoveLogPager<'_> {
    type Item = Result<MoveEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.refill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        let event = self.buffer.pop_front()?;
        self.remaining -= 1;
        Some(Ok(event))
    }
}

/// Parse a `list=logevents` response (formatversion 2).
///
/// Entries whose details were suppressed are dropped.
pub fn parse_move_log(body: &Value) -> Result<(Vec<MoveEvent>, Option<String>)> {
    let entries = body
        .pointer("/query/logevents")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("move log response has no query.logevents"))?;
    let events = entries.iter().filter_map(parse_move_entry).collect();
    let cont = body
        .pointer("/continue/lecontinue")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok((events, cont))
}

fn parse_move_entry(entry: &Value) -> Option<MoveEvent> {
    Some(MoveEvent {
        log_id: entry.get("logid")?.as_u64()?,
        timestamp: entry.get("timestamp")?.as_str()?.to_string(),
        source: entry.get("title")?.as_str()?.to_string(),
        target: entry.pointer("/params/target_title")?.as_str()?.to_string(),
        target_namespace: entry.pointer("/params/target_ns")?.as_i64()?,
    })
}

/// Parse a `prop=info&redirects=1` response for a single title.
pub fn parse_page_status(body: &Value, title: &str) -> Result<PageStatus> {
    let query = body
        .get("query")
        .ok_or_else(|| anyhow!("page info response has no query"))?;
    let requested = normalized_title(query, title);
    let redirect = query
        .get("redirects")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|r| r.get("from").and_then(Value::as_str) == Some(requested.as_str()));
    if let Some(redirect) = redirect {
        let target = redirect
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("redirect entry for {title} has no target"))?;
        return Ok(PageStatus::Redirect {
            target: target.to_string(),
        });
    }
    let page = query
        .get("pages")
        .and_then(Value::as_array)
        .and_then(|pages| pages.first())
        .ok_or_else(|| anyhow!("page info response has no pages for {title}"))?;
    let flagged = |key: &str| page.get(key).and_then(Value::as_bool).unwrap_or(false);
    if flagged("missing") || flagged("invalid") {
        return Ok(PageStatus::Missing);
    }
    Ok(PageStatus::Article)
}

fn normalized_title(query: &Value, title: &str) -> String {
    query
        .get("normalized")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|n| n.get("from").and_then(Value::as_str) == Some(title))
        .and_then(|n| n.get("to").and_then(Value::as_str))
        .unwrap_or(title)
        .to_string()
}

/// Parse a `list=backlinks` response into titles and the continuation token.
pub fn parse_backlinks(body: &Value) -> Result<(Vec<String>, Option<String>)> {
    let links = body
        .pointer("/query/backlinks")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("backlinks response has no query.backlinks"))?;
    let titles = links
        .iter()
        .filter_map(|link| link.get("title").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    let cont = body
        .pointer("/continue/blcontinue")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok((titles, cont))
}
