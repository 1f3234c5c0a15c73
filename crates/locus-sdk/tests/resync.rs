//! Session resync tests
//!
//! These exercise the path from a broken delta stream back to a consistent
//! working copy: full sync, delta sync through `syncUrl`, relocation, and
//! the failure modes in between.

use locus_core::{Locus, SequenceDescriptor, SocketEvent};
use locus_sdk::{
    Client, ClientConfig, EventTransport, LocusEvent, LocusSession, MemoryFetcher,
    MemoryTransport, ParserStatus, SdkError, SyncConfig, SyncOutcome,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

const URL: &str = "https://locus.example/loci/1";
const MOVED_URL: &str = "https://locus.example/loci/2";
const SYNC_URL: &str = "https://locus.example/loci/1/sync";

fn full_at(url: &str, seq: u64) -> Locus {
    Locus::new(url, SequenceDescriptor::from_entries([seq]))
}

fn delta_at(url: &str, base: u64, seq: u64) -> Locus {
    full_at(url, seq).with_base(SequenceDescriptor::from_entries([base]))
}

fn envelope(delta: &Locus) -> Value {
    serde_json::to_value(SocketEvent::delta(delta).unwrap()).unwrap()
}

fn setup(initial: Locus) -> (Arc<MemoryFetcher>, LocusSession<MemoryFetcher>) {
    let fetcher = Arc::new(MemoryFetcher::new());
    let session = LocusSession::new("meeting-1", URL, fetcher.clone(), SyncConfig::default());
    session.initial_setup(initial.to_value().unwrap()).unwrap();
    (fetcher, session)
}

fn drain(rx: &mut broadcast::Receiver<LocusEvent>) -> Vec<LocusEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn terminal(session: &LocusSession<MemoryFetcher>) -> Option<u64> {
    session.working_copy().and_then(|w| w.sequence.terminal())
}

// ============================================================================
// Desync recovery
// ============================================================================

#[tokio::test]
async fn test_gap_triggers_full_sync() {
    let (fetcher, session) = setup(full_at(URL, 10));
    fetcher.set_response(URL, full_at(URL, 20).to_value().unwrap());
    let mut rx = session.subscribe();

    session
        .handle_socket_event(envelope(&delta_at(URL, 5, 20)))
        .await
        .unwrap();
    session
        .handle_socket_event(envelope(&delta_at(URL, 20, 21)))
        .await
        .unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            LocusEvent::Desync { sequence: Some(20) },
            LocusEvent::SyncCompleted { outcome: SyncOutcome::Full },
            LocusEvent::DeltaApplied { sequence: Some(21) },
        ]
    );
    assert_eq!(fetcher.requests(), vec![URL.to_string()]);
    assert_eq!(terminal(&session), Some(21));
    assert_eq!(session.stats().desyncs, 1);
}

#[tokio::test]
async fn test_sync_url_delta_is_preferred() {
    let (fetcher, session) = setup(full_at(URL, 10).with_sync_url(SYNC_URL));
    fetcher.set_response(SYNC_URL, delta_at(URL, 10, 25).to_value().unwrap());
    let mut rx = session.subscribe();

    session
        .handle_socket_event(envelope(&delta_at(URL, 5, 20)))
        .await
        .unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            LocusEvent::Desync { sequence: Some(20) },
            LocusEvent::SyncCompleted { outcome: SyncOutcome::Delta },
            LocusEvent::DeltaApplied { sequence: Some(25) },
        ]
    );
    assert_eq!(fetcher.requests(), vec![SYNC_URL.to_string()]);
    assert_eq!(terminal(&session), Some(25));
}

#[tokio::test]
async fn test_failed_delta_sync_falls_back_to_full() {
    let (fetcher, session) = setup(full_at(URL, 10).with_sync_url(SYNC_URL));
    fetcher.fail(SYNC_URL);
    fetcher.set_response(URL, full_at(URL, 40).to_value().unwrap());

    session
        .handle_socket_event(envelope(&delta_at(URL, 5, 20)))
        .await
        .unwrap();

    assert_eq!(fetcher.requests(), vec![SYNC_URL.to_string(), URL.to_string()]);
    assert_eq!(terminal(&session), Some(40));
    assert_eq!(session.status(), ParserStatus::Idle);
}

#[tokio::test]
async fn test_failed_full_sync_is_reported() {
    let (fetcher, session) = setup(full_at(URL, 10));
    fetcher.fail(URL);
    let mut rx = session.subscribe();

    let result = session
        .handle_socket_event(envelope(&delta_at(URL, 5, 20)))
        .await;

    assert!(matches!(result, Err(SdkError::SyncFailed(_))));
    let events = drain(&mut rx);
    assert_eq!(events[0], LocusEvent::Desync { sequence: Some(20) });
    assert!(matches!(events[1], LocusEvent::SyncFailed { .. }));
    assert_eq!(session.status(), ParserStatus::Paused);
    assert_eq!(terminal(&session), Some(10));
}

#[tokio::test]
async fn test_repeated_desync_gives_up() {
    let (fetcher, session) = setup(full_at(URL, 10).with_sync_url(SYNC_URL));
    // the catch-up delta is itself broken
    fetcher.set_response(SYNC_URL, delta_at(URL, 1, 30).to_value().unwrap());

    let result = session
        .handle_socket_event(envelope(&delta_at(URL, 5, 20)))
        .await;

    assert!(matches!(result, Err(SdkError::SyncFailed(_))));
    assert_eq!(fetcher.request_count(), 3);
}

// ============================================================================
// Relocation
// ============================================================================

#[tokio::test]
async fn test_relocation_updates_url_and_resyncs() {
    let client = Client::new_with_memory_fetcher(ClientConfig::default());
    let session = client.create_session("meeting-1", URL);
    session.initial_setup(full_at(URL, 10).to_value().unwrap()).unwrap();
    client
        .fetcher()
        .set_response(MOVED_URL, full_at(MOVED_URL, 31).to_value().unwrap());
    let mut rx = session.subscribe();

    let moved = full_at(MOVED_URL, 30)
        .with_base(SequenceDescriptor::from_entries([999]))
        .with_field("replaces", serde_json::json!([{ "locusUrl": URL }]));
    client.dispatch(envelope(&moved)).await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            LocusEvent::UrlChanged {
                from: URL.to_string(),
                to: MOVED_URL.to_string()
            },
            LocusEvent::SyncCompleted { outcome: SyncOutcome::Full },
        ]
    );
    assert_eq!(session.locus_url(), MOVED_URL);
    assert_eq!(terminal(&session), Some(31));
    assert!(client.find_by_locus_url(URL).is_none());
    assert!(client.find_by_locus_url(MOVED_URL).is_some());

    // later events for the new URL route to the same session
    client
        .dispatch(envelope(&delta_at(MOVED_URL, 31, 32)))
        .await
        .unwrap();
    assert_eq!(terminal(&session), Some(32));
}

// ============================================================================
// Transport loop
// ============================================================================

#[tokio::test]
async fn test_run_consumes_until_closed() {
    let (_fetcher, session) = setup(full_at(URL, 1));
    let transport = MemoryTransport::new(64);
    let events = transport.subscribe().unwrap();

    for seq in 2..=10 {
        transport.deliver(envelope(&delta_at(URL, seq - 1, seq))).await.unwrap();
    }
    transport.deliver(serde_json::json!("not an envelope")).await.unwrap();
    transport.close().await;

    session.run(events).await.unwrap();

    assert_eq!(terminal(&session), Some(10));
    assert_eq!(session.stats().adopted, 9);
}

#[tokio::test]
async fn test_chaotic_delivery_converges() {
    let last = 120u64;
    let (fetcher, session) = setup(full_at(URL, 1));
    fetcher.set_response(URL, full_at(URL, last).to_value().unwrap());

    let mut rng = StdRng::seed_from_u64(42);
    let mut stream: Vec<Locus> = Vec::new();
    for seq in 2..=last {
        // drop roughly one in ten, duplicate roughly one in five
        if rng.gen_bool(0.1) {
            continue;
        }
        stream.push(delta_at(URL, seq - 1, seq));
        if rng.gen_bool(0.2) {
            stream.push(delta_at(URL, seq - 1, seq));
        }
    }
    // reorder within small windows, the way a busy socket would
    for window in stream.chunks_mut(4) {
        window.shuffle(&mut rng);
    }
    // make sure the last revision is announced
    stream.push(delta_at(URL, 1, last));

    for delta in &stream {
        session.handle_socket_event(envelope(delta)).await.unwrap();
    }

    assert_eq!(terminal(&session), Some(last));
    assert_eq!(session.status(), ParserStatus::Idle);
}
