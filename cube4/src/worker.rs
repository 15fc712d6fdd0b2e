//! Asynchronous boundary around the search.
//!
//! A request is moved onto tokio's blocking pool and the caller waits at most
//! the request's own budget plus a grace margin. A search that overruns is
//! left to finish on its own thread; its reply is simply never read.
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::protocol::{handle_request, SearchRequest, SearchResponse};
use crate::search::HARD_CEILING_MS;

pub const DEFAULT_GRACE: Duration = Duration::from_millis(100);

pub type SearchHandler = Arc<dyn Fn(SearchRequest) -> SearchResponse + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerReply {
    Reply(SearchResponse),
    TimedOut,
    Failed(String),
}

#[derive(Clone)]
pub struct SearchWorker {
    handler: SearchHandler,
    grace: Duration,
}

impl Default for SearchWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SearchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchWorker")
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl SearchWorker {
    pub fn new() -> Self {
        Self::with_handler(handle_request)
    }

    /// Worker running an arbitrary handler in place of the engine.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(SearchRequest) -> SearchResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Time the caller is prepared to wait for `request`.
    pub fn deadline_for(&self, request: &SearchRequest) -> Duration {
        let budget = request
            .time_limit_ms
            .min(request.hard_limit_ms)
            .min(HARD_CEILING_MS);
        Duration::from_millis(budget) + self.grace
    }

    pub async fn search(&self, request: SearchRequest) -> WorkerReply {
        let wait = self.deadline_for(&request);
        let handler = Arc::clone(&self.handler);
        let task = tokio::task::spawn_blocking(move || handler(request));
        match tokio::time::timeout(wait, task).await {
            Ok(Ok(response)) => WorkerReply::Reply(response),
            Ok(Err(err)) => {
                warn!(%err, "search task failed");
                WorkerReply::Failed(err.to_string())
            }
            Err(_) => {
                warn!(wait_ms = wait.as_millis() as u64, "search timed out");
                WorkerReply::TimedOut
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::search::SearchOptions;
    use crate::{Column, Player};

    fn request(time_limit_ms: u64) -> SearchRequest {
        let mut board = Board::new();
        board.make_move(Column::new(2, 2), Player::Red).unwrap();
        let options = SearchOptions {
            time_limit_ms,
            max_depth: 2,
            ..SearchOptions::default()
        };
        SearchRequest::new(&board, Player::Blue, options)
    }

    #[tokio::test]
    async fn engine_reply_comes_back() {
        let worker = SearchWorker::new();
        match worker.search(request(200)).await {
            WorkerReply::Reply(response) => {
                assert!(response.error.is_none());
                assert!(response.mv.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_handler_times_out() {
        let worker = SearchWorker::with_handler(|_| {
            std::thread::sleep(Duration::from_millis(400));
            SearchResponse {
                mv: None,
                depth: 0,
                error: None,
            }
        })
        .with_grace(Duration::from_millis(20));
        assert_eq!(worker.search(request(10)).await, WorkerReply::TimedOut);
    }

    #[tokio::test]
    async fn panicking_handler_is_reported() {
        let worker = SearchWorker::with_handler(|_| panic!("engine blew up"));
        assert!(matches!(worker.search(request(50)).await, WorkerReply::Failed(_)));
    }

    #[test]
    fn wait_is_capped_by_the_ceiling() {
        let worker = SearchWorker::new();
        let mut req = request(90_000);
        req.hard_limit_ms = 120_000;
        assert_eq!(
            worker.deadline_for(&req),
            Duration::from_millis(HARD_CEILING_MS) + DEFAULT_GRACE
        );
    }
}
