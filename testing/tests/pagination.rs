//! Pagination sequences driven through `MockRequester`.

#![allow(clippy::unwrap_used)]

use composable_request_core::{
    BearerToken, Composable, Expecting, PageState, Paginated, Receivable, Request, RequestError,
    Unlockable, Wrapper,
};
use composable_request_testing::MockRequester;
use futures::StreamExt;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Answers `{"page": <cursor>}`.
fn echo_cursor() -> MockRequester {
    MockRequester::new(|request| {
        let cursor = request
            .url
            .query_pairs()
            .find(|(name, _)| name == "l")
            .map_or_else(String::new, |(_, value)| value.into_owned());
        Ok(format!(r#"{{"page": "{cursor}"}}"#).into_bytes())
    })
}

fn feed() -> Request {
    Request::new("https://api.example.com").append("feed")
}

/// Follows one page after another, forever.
fn endless(outcome: &Result<Wrapper, RequestError>) -> Option<String> {
    let page = outcome.as_ref().ok()?["page"].as_str()?.to_string();
    Some(format!("{page}+"))
}

#[tokio::test]
async fn test_three_pulls_then_clean_termination() {
    let requester = echo_cursor();
    let outcomes: Vec<_> = feed()
        .paginating("l", Some("a"), |outcome| {
            match outcome.as_ref().ok()?["page"].as_str()? {
                "a" => Some("b".to_string()),
                "b" => Some("c".to_string()),
                _ => None,
            }
        })
        .requested(requester.clone())
        .stream()
        .collect()
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(
        requester.query_values("l"),
        [Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]
    );
}

#[tokio::test]
async fn test_failures_are_forwarded_without_terminating() {
    let requester = MockRequester::sequence([
        Ok(br#"{"page": "a"}"#.to_vec()),
        Err(RequestError::custom("rate limited")),
        Ok(br#"{"page": "c"}"#.to_vec()),
    ]);
    let outcomes: Vec<_> = feed()
        .paginating("l", Some("a"), |outcome| match outcome {
            Ok(page) if page["page"].as_str() == Some("c") => None,
            Ok(_) => Some("b".to_string()),
            Err(_) => Some("c".to_string()),
        })
        .requested(requester.clone())
        .stream()
        .collect()
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[1].is_err());
    assert_eq!(
        requester.query_values("l"),
        [Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]
    );
}

#[tokio::test]
async fn test_pages_are_pulled_strictly_one_after_another() {
    let requester = echo_cursor().with_delay(Duration::from_millis(5));
    let mut pages = feed()
        .expecting::<Wrapper>()
        .paginating("l", Some("x"), endless)
        .pages(Arc::new(requester.clone()));

    for expected in 1..=3 {
        assert!(pages.next().await.unwrap().is_ok());
        assert_eq!(requester.count(), expected);
    }
    assert_eq!(
        pages.state(),
        PageState::Pending(Some("x+++".to_string()))
    );
}

#[tokio::test]
async fn test_cancelled_subscription_stops_pulling() {
    let requester = echo_cursor().with_delay(Duration::from_millis(20));
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let subscription = feed()
        .paginating("l", Some("x"), endless)
        .requested(requester.clone())
        .subscribe(move |outcome| {
            let _ = sender.send(outcome.is_ok());
        });

    assert_eq!(receiver.recv().await, Some(true));
    subscription.cancel();
    assert!(subscription.is_cancelled());
    subscription.join().await.unwrap();

    let pulled = requester.count();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(requester.count(), pulled);
    assert!(pulled <= 2);
}

#[tokio::test]
async fn test_handle_terminates_from_another_task() {
    let requester = echo_cursor();
    let mut pages = feed()
        .expecting::<Wrapper>()
        .paginating("l", Some("x"), endless)
        .pages(Arc::new(requester.clone()));
    let handle = pages.handle();

    pages.next().await.unwrap().unwrap();
    tokio::spawn(async move { handle.terminate() }).await.unwrap();

    assert!(pages.next().await.is_none());
    assert_eq!(pages.state(), PageState::Terminated);
    assert_eq!(requester.count(), 1);
}

#[tokio::test]
async fn test_unlocked_pagination_authenticates_every_page() {
    let requester = echo_cursor();
    let paginated: Paginated<Request, Wrapper> = feed()
        .locking()
        .paginating("l", Some("a"), |outcome| {
            (outcome.as_ref().ok()?["page"].as_str()? == "a").then(|| "b".to_string())
        })
        .unlocking(&BearerToken::new("t"));
    let outcomes: Vec<_> = paginated.requested(requester.clone()).stream().collect().await;

    assert_eq!(outcomes.len(), 2);
    assert!(requester
        .requests()
        .iter()
        .all(|request| request.header_fields["Authorization"] == "Bearer t"));
}

proptest! {
    #[test]
    fn prop_bounded_consumption_pulls_exactly_n(n in 1_usize..24) {
        let requester = echo_cursor();
        let outcomes: Vec<_> = tokio_test::block_on(
            feed()
                .paginating("l", Some("x"), endless)
                .requested(requester.clone())
                .stream()
                .take(n)
                .collect(),
        );
        prop_assert_eq!(outcomes.len(), n);
        prop_assert_eq!(requester.count(), n);
    }
}
