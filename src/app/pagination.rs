//! Continuation-token pagination shared by every list call.

use std::future::Future;

/// One page of a token-paginated API response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<&str>) -> Self {
        Self {
            items,
            next_token: next_token.map(String::from),
        }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Fetch pages until the API stops returning a continuation token.
///
/// `fetch` is called once per page with the token of the previous page (`None` first). An
/// empty token ends the loop like a missing one.
pub async fn collect_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = fetch(token.take()).await?;
        items.extend(page.items);
        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    Ok(items)
}

/// Like [`collect_pages`] but only keeps the number of items
pub async fn count_pages<T, E, F, Fut>(mut fetch: F) -> Result<u64, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut count = 0u64;
    let mut token: Option<String> = None;

    loop {
        let page = fetch(token.take()).await?;
        count += page.items.len() as u64;
        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    Ok(count)
}
