//! Lazy iteration over paged list responses
//!
//! List endpoints return one page at a time with an optional link to the next
//! page. [`paginate`] hides page boundaries behind a stream of items. The
//! stream is consumed by value, so a listing cannot be restarted; call the
//! list operation again for a fresh one.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::future::Future;

use crate::error::{CoreError, Result};

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    /// A page with no continuation
    pub fn last(value: Vec<T>) -> Self {
        Self {
            value,
            next_link: None,
        }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Turn a page fetcher into a lazy stream of items
///
/// `fetch` is called with `None` for the first page and with the previous
/// page's `next_link` afterwards. No request is made until the stream is
/// polled. The stream ends after a page without a next link, or right after
/// yielding the first error.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> BoxStream<'a, Result<T>>
where
    T: Send + 'a,
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>>> + Send + 'a,
{
    stream::try_unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let link = match cursor {
            Cursor::Start => None,
            Cursor::Next(link) => Some(link),
            Cursor::Done => return Ok::<_, CoreError>(None),
        };
        let page = fetch(link).await?;
        let next = match page.next_link {
            Some(link) if !link.is_empty() => Cursor::Next(link),
            _ => Cursor::Done,
        };
        Ok::<_, CoreError>(Some((page.value, (fetch, next))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, CoreError>)))
    .try_flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_flattens_pages_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let items: Vec<u32> = paginate(move |link: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match link.as_deref() {
                    None => Page {
                        value: vec![1, 2],
                        next_link: Some("page-2".to_string()),
                    },
                    Some("page-2") => Page {
                        value: vec![],
                        next_link: Some("page-3".to_string()),
                    },
                    Some(_) => Page::last(vec![3]),
                })
            }
        })
        .try_collect()
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let stream = paginate(move |_link: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Page::<u32>::last(vec![])) }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_next_link_ends_stream() {
        let items: Vec<u32> = paginate(|_link: Option<String>| async {
            Ok(Page {
                value: vec![9],
                next_link: Some(String::new()),
            })
        })
        .try_collect()
        .await
        .unwrap();
        assert_eq!(items, vec![9]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let mut stream = paginate(|link: Option<String>| async move {
            match link {
                None => Ok(Page {
                    value: vec![1u32],
                    next_link: Some("next".to_string()),
                }),
                Some(_) => Err(CoreError::Connection("reset".to_string())),
            }
        });

        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_page_deserializes_arm_shape() {
        let page: Page<u32> = serde_json::from_str(r#"{"value":[1,2],"nextLink":"x"}"#).unwrap();
        assert_eq!(page.value, vec![1, 2]);
        assert_eq!(page.next_link.as_deref(), Some("x"));

        let empty: Page<u32> = serde_json::from_str("{}").unwrap();
        assert!(empty.value.is_empty());
        assert!(empty.next_link.is_none());
    }
}
