use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::AppResult;
use crate::store::feed::Change;

type Snapshot<T> = Box<dyn Fn() -> AppResult<Vec<T>> + Send + Sync>;

/// A standing query. Yields the full current result set once, then again
/// after every change it is interested in, until unsubscribed or dropped.
pub struct LiveQuery<T> {
    rx: Option<broadcast::Receiver<Change>>,
    interest: Vec<Change>,
    snapshot: Snapshot<T>,
    primed: bool,
}

impl<T: Send + 'static> LiveQuery<T> {
    pub fn new(
        rx: broadcast::Receiver<Change>,
        interest: Vec<Change>,
        snapshot: impl Fn() -> AppResult<Vec<T>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            rx: Some(rx),
            interest,
            snapshot: Box::new(snapshot),
            primed: false,
        }
    }

    /// Next full snapshot; `None` once unsubscribed or the feed is gone.
    pub async fn next(&mut self) -> Option<AppResult<Vec<T>>> {
        let rx = self.rx.as_mut()?;

        if !self.primed {
            self.primed = true;
            return Some((self.snapshot)());
        }

        let closed = loop {
            match rx.recv().await {
                Ok(change) if self.interest.contains(&change) => break false,
                Ok(_) => continue,
                // Missed some changes; a fresh snapshot covers all of them.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Live query lagged, re-reading");
                    break false;
                }
                Err(RecvError::Closed) => break true,
            }
        };

        if closed {
            self.rx = None;
            return None;
        }
        Some((self.snapshot)())
    }

    /// Stop delivery and release the feed receiver. Safe to call repeatedly.
    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            tracing::debug!("Live query unsubscribed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    pub fn into_stream(self) -> impl Stream<Item = AppResult<Vec<T>>> + Send {
        futures::stream::unfold(self, |mut live| async move {
            live.next().await.map(|snapshot| (snapshot, live))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChangeFeed;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready};

    fn counting_query(feed: &ChangeFeed, interest: Vec<Change>) -> LiveQuery<usize> {
        let counter = Arc::new(AtomicUsize::new(0));
        LiveQuery::new(feed.watch(), interest, move || {
            Ok(vec![counter.fetch_add(1, Ordering::SeqCst)])
        })
    }

    #[tokio::test]
    async fn first_delivery_is_immediate_snapshot() {
        let feed = ChangeFeed::new(8);
        let mut live = counting_query(&feed, vec![Change::Items]);
        assert_eq!(live.next().await.unwrap().unwrap(), vec![0]);
    }

    #[test]
    fn waits_for_an_interesting_change() {
        let feed = ChangeFeed::new(8);
        let mut live = counting_query(&feed, vec![Change::Items]);

        let mut first = tokio_test::task::spawn(live.next());
        assert_eq!(assert_ready!(first.poll()).unwrap().unwrap(), vec![0]);
        drop(first);

        let mut next = tokio_test::task::spawn(live.next());
        assert_pending!(next.poll());

        feed.publish(Change::Claims);
        assert_pending!(next.poll());

        feed.publish(Change::Items);
        assert!(next.is_woken());
        assert_eq!(assert_ready!(next.poll()).unwrap().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_releases_receiver() {
        let feed = ChangeFeed::new(8);
        let mut live = counting_query(&feed, vec![Change::Items]);
        assert_eq!(feed.watcher_count(), 1);

        live.unsubscribe();
        live.unsubscribe();

        assert!(!live.is_active());
        assert_eq!(feed.watcher_count(), 0);
        assert!(live.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_receiver_gets_one_fresh_snapshot() {
        let feed = ChangeFeed::new(2);
        let mut live = counting_query(&feed, vec![Change::Items]);
        live.next().await.unwrap().unwrap();

        for _ in 0..5 {
            feed.publish(Change::Items);
        }

        assert_eq!(live.next().await.unwrap().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn stream_ends_when_feed_is_dropped() {
        let feed = ChangeFeed::new(8);
        let live = counting_query(&feed, vec![Change::Items]);
        let mut stream = Box::pin(live.into_stream());

        assert_eq!(stream.next().await.unwrap().unwrap(), vec![0]);
        feed.publish(Change::Items);
        assert_eq!(stream.next().await.unwrap().unwrap(), vec![1]);

        drop(feed);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn scoped_message_changes_are_distinguished() {
        use crate::chat::domain::ChatScope;

        let feed = ChangeFeed::new(8);
        let scope = ChatScope::Claim("c1".into());
        let mut live = counting_query(&feed, vec![Change::Messages(scope)]);
        live.next().await.unwrap().unwrap();

        feed.publish(Change::Messages(ChatScope::Global));
        feed.publish(Change::Messages(ChatScope::Claim("c1".into())));

        assert_eq!(live.next().await.unwrap().unwrap(), vec![1]);
    }
}
