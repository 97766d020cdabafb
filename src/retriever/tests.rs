use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::transport::tests::{Fault, MockEntrez};
use crate::util::tests::setup_tracing;

fn taxon() -> TaxonId {
    TaxonId::parse("9685").unwrap()
}

fn retriever(api: MockEntrez, filter: LengthFilter, options: FetchOptions) -> Retriever<MockEntrez> {
    setup_tracing();
    Retriever::new(api, filter, options, CancellationToken::new())
}

fn lengths(records: &[SequenceRecord]) -> Vec<u64> {
    records.iter().map(|r| r.length).collect()
}

#[tokio::test]
async fn test_fetch_before_search() {
    let retriever = retriever(
        MockEntrez::with_lengths(&[100]),
        LengthFilter::default(),
        FetchOptions::default(),
    );
    let err = retriever.fetch_and_filter(200).await.unwrap_err();
    assert!(matches!(err, RetrievalError::NoActiveSession));
    assert!(retriever.api.fetches.lock().is_empty());
}

#[tokio::test]
async fn test_search_opens_session() {
    let mut retriever = retriever(
        MockEntrez::with_lengths(&[100, 200]),
        LengthFilter::default(),
        FetchOptions::default(),
    );
    assert!(retriever.session().is_none());
    assert_eq!(retriever.search(&taxon()).await.unwrap(), 2);

    let session = retriever.session().unwrap();
    assert_eq!(session.total_count, 2);
    assert_eq!(session.handle, retriever.api.handle);
    assert_eq!(
        *retriever.api.searches.lock(),
        vec![("nucleotide".to_owned(), "txid9685[Organism]".to_owned())]
    );
}

#[tokio::test]
async fn test_zero_matches_issue_no_fetches() {
    let mut retriever = retriever(
        MockEntrez::new(vec![]),
        LengthFilter::default(),
        FetchOptions::default(),
    );
    assert_eq!(retriever.search(&taxon()).await.unwrap(), 0);
    assert!(retriever.fetch_and_filter(200).await.unwrap().is_empty());
    assert!(retriever.api.fetches.lock().is_empty());
}

#[tokio::test]
async fn test_end_to_end_filter() {
    let mut retriever = retriever(
        MockEntrez::with_lengths(&[50, 2000, 800]),
        LengthFilter::new(100, 1500),
        FetchOptions::default(),
    );
    assert_eq!(retriever.search(&taxon()).await.unwrap(), 3);
    let records = retriever.fetch_and_filter(200).await.unwrap();
    assert_eq!(lengths(&records), vec![800]);
    assert_eq!(records[0].identifier, "MK000003.1");
    assert_eq!(records[0].description, "Test sequence 3");
    assert_eq!(
        retriever.api.fetches.lock()[0].1,
        Window { offset: 0, size: 3 }
    );
}

#[tokio::test]
async fn test_limit_bounds_windows() {
    let mut retriever = retriever(
        MockEntrez::with_lengths(&vec![500; 250]),
        LengthFilter::default(),
        FetchOptions::default(),
    );
    retriever.search(&taxon()).await.unwrap();
    let records = retriever.fetch_and_filter(200).await.unwrap();
    assert_eq!(records.len(), 200);
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100]);
}

#[tokio::test]
async fn test_every_page_replays_session() {
    let mut retriever = retriever(
        MockEntrez::with_lengths(&vec![500; 731]),
        LengthFilter::default(),
        FetchOptions::default(),
    );
    retriever.search(&taxon()).await.unwrap();
    retriever.fetch_and_filter(1000).await.unwrap();

    let fetches = retriever.api.fetches.lock();
    assert_eq!(fetches.len(), 8);
    assert!(fetches
        .iter()
        .all(|(handle, _)| *handle == retriever.api.handle));
    let offsets: Vec<u64> = fetches.iter().map(|(_, w)| w.offset).collect();
    assert_eq!(offsets, (0..731).step_by(100).collect::<Vec<_>>());
    assert_eq!(fetches.last().unwrap().1.size, 31);
}

#[tokio::test]
async fn test_short_pages_dont_stop_the_plan() {
    // Server claims 300 matches but only 150 are left by the time pages are fetched
    let records = (0..150)
        .map(|i| SequenceRecord::new(format!("OR{i:06}.1"), 1000 + i, "shrinking"))
        .collect();
    let mut retriever = retriever(
        MockEntrez::with_count(300, records),
        LengthFilter::default(),
        FetchOptions::default(),
    );
    assert_eq!(retriever.search(&taxon()).await.unwrap(), 300);
    let records = retriever.fetch_and_filter(300).await.unwrap();
    assert_eq!(records.len(), 150);
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100, 200]);
}

#[tokio::test]
async fn test_concurrent_pages_keep_server_order() {
    let all_lengths: Vec<u64> = (1..=450).collect();
    let mut retriever = retriever(
        MockEntrez::with_lengths(&all_lengths),
        LengthFilter::default(),
        FetchOptions {
            concurrency: 4,
            ..Default::default()
        },
    );
    retriever.search(&taxon()).await.unwrap();
    let records = retriever.fetch_and_filter(1000).await.unwrap();
    assert_eq!(lengths(&records), all_lengths);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_retried() {
    let api = MockEntrez::with_lengths(&vec![500; 200]);
    api.inject(100, Fault::Transport);
    api.inject(100, Fault::Transport);
    let mut retriever = retriever(api, LengthFilter::default(), FetchOptions::default());
    retriever.search(&taxon()).await.unwrap();

    let start = tokio::time::Instant::now();
    let records = retriever.fetch_and_filter(200).await.unwrap();
    assert_eq!(records.len(), 200);
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100, 100, 100]);
    // 1s + 2s of backoff
    assert!(tokio::time::Instant::now() - start >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let api = MockEntrez::with_lengths(&vec![500; 200]);
    for _ in 0..3 {
        api.inject(0, Fault::Transport);
    }
    let mut retriever = retriever(api, LengthFilter::default(), FetchOptions::default());
    retriever.search(&taxon()).await.unwrap();

    let err = retriever.fetch_and_filter(200).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Transport { endpoint: "efetch", .. }));
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 0, 0]);
}

#[tokio::test]
async fn test_bad_page_aborts_retrieval() {
    let api = MockEntrez::with_lengths(&vec![500; 300]);
    api.inject(100, Fault::Garbage);
    let mut retriever = retriever(api, LengthFilter::default(), FetchOptions::default());
    retriever.search(&taxon()).await.unwrap();

    let err = retriever.fetch_and_filter(300).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Parse { offset: 100, .. }));
    // Parse failures are never retried and no later page is requested
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100]);
}

#[tokio::test]
async fn test_bad_page_skipped_on_request() {
    let api = MockEntrez::with_lengths(&vec![500; 300]);
    api.inject(100, Fault::Garbage);
    let options = FetchOptions {
        skip_bad_pages: true,
        ..Default::default()
    };
    let mut retriever = retriever(api, LengthFilter::default(), options);
    retriever.search(&taxon()).await.unwrap();

    let records = retriever.fetch_and_filter(300).await.unwrap();
    assert_eq!(records.len(), 200);
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100, 200]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline() {
    let mut api = MockEntrez::with_lengths(&vec![500; 300]);
    api.fetch_delay = Some(Duration::from_secs(10));
    let options = FetchOptions {
        deadline: Some(Duration::from_secs(15)),
        ..Default::default()
    };
    let mut retriever = retriever(api, LengthFilter::default(), options);
    retriever.search(&taxon()).await.unwrap();

    let err = retriever.fetch_and_filter(300).await.unwrap_err();
    assert!(matches!(err, RetrievalError::DeadlineExceeded(d) if d == Duration::from_secs(15)));
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100]);
}

#[tokio::test]
async fn test_cancelled() {
    let cancellation_token = CancellationToken::new();
    let mut retriever = Retriever::new(
        MockEntrez::with_lengths(&[100]),
        LengthFilter::default(),
        FetchOptions::default(),
        cancellation_token.clone(),
    );
    cancellation_token.cancel();
    let err = retriever.search(&taxon()).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Cancelled));
    assert!(retriever.session().is_none());
}

#[tokio::test]
async fn test_overlong_pages_are_truncated() {
    let all_lengths: Vec<u64> = (1..=250).collect();
    let mut api = MockEntrez::with_lengths(&all_lengths);
    api.page_overflow = 10;
    let mut retriever = retriever(api, LengthFilter::default(), FetchOptions::default());
    retriever.search(&taxon()).await.unwrap();

    let records = retriever.fetch_and_filter(150).await.unwrap();
    assert_eq!(records.len(), 150);
    assert_eq!(lengths(&records), all_lengths[..150].to_vec());
    assert_eq!(
        retriever.api.fetches.lock().iter().map(|(_, w)| *w).collect::<Vec<_>>(),
        vec![
            Window { offset: 0, size: 100 },
            Window { offset: 100, size: 50 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_while_fetching() {
    setup_tracing();
    let mut api = MockEntrez::with_lengths(&vec![500; 300]);
    api.fetch_delay = Some(Duration::from_secs(10));
    let cancellation_token = CancellationToken::new();
    let mut retriever = Retriever::new(
        api,
        LengthFilter::default(),
        FetchOptions::default(),
        cancellation_token.clone(),
    );
    retriever.search(&taxon()).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        cancellation_token.cancel();
    });
    let start = tokio::time::Instant::now();
    let err = retriever.fetch_and_filter(300).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Cancelled));
    assert!(tokio::time::Instant::now() - start < Duration::from_secs(20));
    // The second page was in flight and the third never started
    assert_eq!(retriever.api.fetched_offsets(), vec![0, 100]);
}
