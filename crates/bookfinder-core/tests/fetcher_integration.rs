//! Integration tests for the [`ResultFetcher`].
//!
//! These tests drive the fetcher with a [`MockSearch`] backend whose latency
//! is set per query string, under a paused Tokio clock so ordering is
//! deterministic.

use std::sync::Arc;
use std::time::Duration;

use bookfinder_core::conditions::{BasicSearch, SearchField};
use bookfinder_core::mock::{MockResponse, MockSearch};
use bookfinder_core::orchestrator::{FetchEvent, FetchOutcome, SEARCH_FAILED};
use bookfinder_core::pagination::Pagination;
use bookfinder_core::record::SearchResponse;
use bookfinder_core::selection::MemoryClipboard;
use bookfinder_core::{FetchUpdate, ResultFetcher};
use tokio_util::sync::CancellationToken;

const QUERY_A: &str = "fields=title&queries=a&fuzzies=true";
const QUERY_B: &str = "fields=title&queries=b&fuzzies=true";

fn titles(view: &bookfinder_core::ResultsView) -> Vec<String> {
    view.items()
        .iter()
        .map(|i| i.record.display_title().to_string())
        .collect()
}

fn fetcher(mock: MockSearch) -> (ResultFetcher, Arc<MockSearch>) {
    let mock = Arc::new(mock);
    let fetcher = ResultFetcher::new(mock.clone(), &CancellationToken::new());
    (fetcher, mock)
}

#[tokio::test(start_paused = true)]
async fn single_search_is_applied() {
    let (mut fetcher, mock) = fetcher(
        MockSearch::new(MockResponse::Status(404)).route(
            QUERY_A,
            MockResponse::titles("main", &["Dune", "Emma"], 3),
            Some(Duration::from_millis(20)),
        ),
    );

    fetcher.set_query(QUERY_A);
    assert!(fetcher.view().is_loading());
    assert_eq!(fetcher.next_update().await, Some(FetchUpdate::Applied));

    let view = fetcher.view();
    assert!(!view.is_loading());
    assert_eq!(titles(view), vec!["Dune", "Emma"]);
    assert_eq!(view.meta().total_pages, 3);
    assert_eq!(view.error(), None);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn superseded_request_never_shows() {
    let (mut fetcher, mock) = fetcher(
        MockSearch::new(MockResponse::Status(404))
            .route(
                QUERY_A,
                MockResponse::titles("main", &["from A"], 1),
                Some(Duration::from_millis(500)),
            )
            .route(
                QUERY_B,
                MockResponse::titles("main", &["from B"], 1),
                Some(Duration::from_millis(10)),
            ),
    );

    fetcher.set_query(QUERY_A);
    fetcher.set_query(QUERY_B);
    assert_eq!(fetcher.next_update().await, Some(FetchUpdate::Applied));
    assert_eq!(titles(fetcher.view()), vec!["from B"]);

    // Let A's configured latency elapse; nothing is pending and the view holds.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fetcher.next_update().await, None);
    assert_eq!(titles(fetcher.view()), vec!["from B"]);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn late_response_from_older_generation_is_discarded() {
    let (mut fetcher, _mock) = fetcher(
        MockSearch::new(MockResponse::titles("main", &["current"], 1)),
    );

    fetcher.set_query(QUERY_A);
    let stale_generation = fetcher.generation();
    fetcher.set_query(QUERY_B);
    assert_eq!(fetcher.next_update().await, Some(FetchUpdate::Applied));

    let stale = FetchEvent {
        generation: stale_generation,
        query: QUERY_A.to_string(),
        outcome: FetchOutcome::Loaded(SearchResponse::default()),
    };
    assert_eq!(fetcher.apply(stale), FetchUpdate::Discarded);
    assert_eq!(titles(fetcher.view()), vec!["current"]);
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_previous_records() {
    let (mut fetcher, _mock) = fetcher(
        MockSearch::new(MockResponse::Status(500))
            .route(QUERY_A, MockResponse::titles("main", &["kept"], 1), None),
    );

    fetcher.set_query(QUERY_A);
    assert_eq!(fetcher.next_update().await, Some(FetchUpdate::Applied));

    fetcher.set_query(QUERY_B);
    assert_eq!(
        fetcher.next_update().await,
        Some(FetchUpdate::Failed(SEARCH_FAILED.to_string()))
    );
    assert_eq!(fetcher.view().error(), Some(SEARCH_FAILED));
    assert!(!fetcher.view().is_loading());
    assert_eq!(titles(fetcher.view()), vec!["kept"]);
}

#[tokio::test(start_paused = true)]
async fn decode_failure_is_reported_once() {
    let (mut fetcher, _mock) = fetcher(MockSearch::new(MockResponse::Garbage("<html>".into())));
    fetcher.set_query(QUERY_A);
    assert_eq!(
        fetcher.next_update().await,
        Some(FetchUpdate::Failed(SEARCH_FAILED.to_string()))
    );
    assert!(fetcher.view().items().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_query_stays_idle() {
    let (mut fetcher, mock) = fetcher(MockSearch::new(MockResponse::Status(500)));
    fetcher.set_query("");
    assert!(!fetcher.has_pending());
    assert_eq!(fetcher.next_update().await, None);
    assert_eq!(mock.call_count(), 0);
    assert_eq!(fetcher.view().error(), None);
}

#[tokio::test(start_paused = true)]
async fn unchanged_query_is_not_reissued() {
    let (mut fetcher, mock) = fetcher(MockSearch::new(MockResponse::titles("m", &["x"], 1)));
    fetcher.set_query(QUERY_A);
    fetcher.next_update().await;
    fetcher.set_query(QUERY_A);
    assert!(!fetcher.has_pending());
    fetcher.refresh();
    assert_eq!(fetcher.next_update().await, Some(FetchUpdate::Applied));
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_request() {
    let (mut fetcher, _mock) = fetcher(
        MockSearch::new(MockResponse::Status(404)).route(
            QUERY_A,
            MockResponse::titles("main", &["never"], 1),
            Some(Duration::from_secs(5)),
        ),
    );

    fetcher.set_query(QUERY_A);
    fetcher.shutdown();
    assert_eq!(fetcher.next_update().await, None);
    assert!(fetcher.view().items().is_empty());

    fetcher.set_query(QUERY_B);
    assert!(!fetcher.has_pending());
    assert_eq!(fetcher.query(), QUERY_A);
    assert_eq!(fetcher.params().get_all("queries"), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn parent_token_tears_down_fetcher() {
    let parent = CancellationToken::new();
    let mock = Arc::new(MockSearch::new(MockResponse::titles("m", &["x"], 1)).route(
        QUERY_A,
        MockResponse::titles("m", &["slow"], 1),
        Some(Duration::from_secs(5)),
    ));
    let mut fetcher = ResultFetcher::new(mock, &parent);
    fetcher.set_query(QUERY_A);
    parent.cancel();
    assert_eq!(fetcher.next_update().await, None);
}

#[tokio::test(start_paused = true)]
async fn new_results_clear_selection_and_filenames() {
    let (mut fetcher, _mock) = fetcher(
        MockSearch::new(MockResponse::Status(404))
            .route(QUERY_A, MockResponse::titles("main", &["Dune", "Dune"], 1), None)
            .route(QUERY_B, MockResponse::titles("main", &["Dune"], 1), None),
    );

    fetcher.set_query(QUERY_A);
    fetcher.next_update().await;
    let selection = fetcher.view_mut().selection_mut();
    selection.select_all();
    let mut clip = MemoryClipboard::default();
    let outcome = selection.export_selected(&mut clip).unwrap();
    assert_eq!(outcome.text, "Dune.pdf\nDune(2).pdf");

    fetcher.set_query(QUERY_B);
    fetcher.next_update().await;
    let selection = fetcher.view_mut().selection_mut();
    assert!(!selection.is_selected("main-0"));
    assert!(!selection.is_selected("main-1"));

    selection.toggle("main-0");
    let outcome = selection.export_selected(&mut clip).unwrap();
    assert_eq!(outcome.text, "Dune.pdf");
}

#[tokio::test(start_paused = true)]
async fn paging_reissues_with_other_params_intact() {
    let basic = BasicSearch {
        field: SearchField::Title,
        query: "dune".into(),
        fuzzy: true,
    };
    let params = basic.submit(&["a.db".into(), "b.db".into()]).unwrap();
    let first = params.to_query_string();
    let paged = format!("{first}&page=2");

    let (mut fetcher, mock) = fetcher(
        MockSearch::new(MockResponse::Status(404))
            .route(&first, MockResponse::titles("main", &["p1"], 4), None)
            .route(&paged, MockResponse::titles("main", &["p2"], 4), None),
    );

    fetcher.set_query(first);
    fetcher.next_update().await;
    let pagination = Pagination::new(&fetcher.params(), fetcher.view().meta().total_pages);
    assert_eq!(pagination.current_page(), 1);

    let next = pagination.jump_to("2").unwrap();
    fetcher.set_query(next.to_query_string());
    assert_eq!(fetcher.next_update().await, Some(FetchUpdate::Applied));
    assert_eq!(titles(fetcher.view()), vec!["p2"]);
    assert_eq!(mock.call_count(), 2);
}
