use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use locus_core::{Locus, LocusEventType, SequenceDescriptor, SocketEvent};
use locus_sdk::{
    Client, ClientConfig, EventTransport, LocusSession, MemoryFetcher, MemoryTransport,
    SyncConfigBuilder,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::warn;

pub const ORIGIN_URL: &str = "https://locus.example/loci/origin";
pub const MOVED_URL: &str = "https://locus.example/loci/moved";

/// Socket behaviour for a simulation run
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Probability of an event being dropped (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability of an event being delivered twice (0.0 - 1.0)
    pub dup_rate: f64,
    /// Probability of an event overtaking its predecessor (0.0 - 1.0)
    pub reorder_rate: f64,
}

impl ChaosConfig {
    pub fn perfect() -> Self {
        Self {
            loss_rate: 0.0,
            dup_rate: 0.0,
            reorder_rate: 0.0,
        }
    }

    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Self::perfect()
        }
    }

    /// Every problem at once
    pub fn chaotic() -> Self {
        Self {
            loss_rate: 0.05,
            dup_rate: 0.2,
            reorder_rate: 0.3,
        }
    }
}

/// Statistics collected during a simulation run
#[derive(Clone, Debug)]
pub struct SimulationStats {
    pub label: String,
    pub events_sent: usize,
    pub events_delivered: usize,
    pub adopted: u64,
    pub relocations: u64,
    pub ignored: u64,
    pub held: u64,
    pub desyncs: u64,
    pub resync_fetches: usize,
    pub final_sequence: Option<u64>,
    pub final_url: String,
    pub converged: bool,
    pub total_time: Duration,
}

impl SimulationStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  {:<58}║", self.label);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Events Sent:               {:>30} ║", self.events_sent);
        println!("║  Events Delivered:          {:>30} ║", self.events_delivered);
        println!("║  Deltas Adopted:            {:>30} ║", self.adopted);
        println!("║  Relocations:               {:>30} ║", self.relocations);
        println!("║  Deltas Ignored:            {:>30} ║", self.ignored);
        println!("║  Deltas Held:               {:>30} ║", self.held);
        println!("║  Desyncs:                   {:>30} ║", self.desyncs);
        println!("║  Resync Fetches:            {:>30} ║", self.resync_fetches);
        println!("║  Final Sequence:            {:>30} ║", self.final_sequence.map_or("-".to_string(), |s| s.to_string()));
        println!("║  Converged:                 {:>30} ║", if self.converged { "yes" } else { "NO" });
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// The server's view: an initial full Locus and the deltas that follow it.
///
/// Halfway through, the Locus moves to [`MOVED_URL`]; the relocating delta
/// names a base the client has never seen.
pub fn server_history(num_deltas: u64) -> (Locus, Vec<Locus>) {
    let initial = Locus::new(ORIGIN_URL, SequenceDescriptor::from_entries([1]));
    let relocate_at = num_deltas / 2 + 1;

    let deltas = (2..=num_deltas + 1)
        .map(|seq| {
            let url = if seq >= relocate_at { MOVED_URL } else { ORIGIN_URL };
            let base = if seq == relocate_at { seq + 1000 } else { seq - 1 };
            Locus::new(url, SequenceDescriptor::from_entries([seq]))
                .with_base(SequenceDescriptor::from_entries([base]))
                .with_field("participants", Value::from(seq % 7))
        })
        .collect();

    (initial, deltas)
}

/// Deliver `deltas` as socket envelopes through a lossy, duplicating,
/// reordering channel.
fn chaotic_socket(
    deltas: Vec<Locus>,
    config: ChaosConfig,
    seed: u64,
) -> impl Stream<Item = Value> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut overtaken: Option<Value> = None;

        for delta in deltas {
            if rng.gen_bool(config.loss_rate) {
                continue;
            }
            let Ok(event) = SocketEvent::delta(&delta) else {
                continue;
            };
            let Ok(envelope) = serde_json::to_value(event) else {
                continue;
            };

            if overtaken.is_none() && rng.gen_bool(config.reorder_rate) {
                overtaken = Some(envelope);
                continue;
            }

            if rng.gen_bool(config.dup_rate) {
                yield envelope.clone();
            }
            yield envelope;

            if let Some(late) = overtaken.take() {
                yield late;
            }
        }

        if let Some(late) = overtaken.take() {
            yield late;
        }
    }
}

fn seed_session(session: &LocusSession<MemoryFetcher>, initial: &Locus) -> locus_sdk::Result<()> {
    session.initial_setup(initial.to_value()?)
}

/// Replay a server history through a chaotic socket into one session.
pub async fn simulate(
    label: &str,
    num_deltas: u64,
    chaos: ChaosConfig,
    seed: u64,
) -> SimulationStats {
    let start = Instant::now();
    let (initial, deltas) = server_history(num_deltas);
    let Some(latest) = deltas.last().cloned() else {
        return SimulationStats::empty(label);
    };
    let latest = Locus {
        base_sequence: None,
        ..latest
    };

    let config = ClientConfig {
        sync: SyncConfigBuilder::new().event_buffer(4096).build(),
        ..Default::default()
    };
    let client = Client::new_with_memory_fetcher(config);
    // either URL answers with the server's latest state
    for url in [ORIGIN_URL, MOVED_URL] {
        if let Ok(body) = latest.to_value() {
            client.fetcher().set_response(url, body);
        }
    }

    let session = client.create_session("simulated-meeting", ORIGIN_URL);
    if let Err(err) = seed_session(&session, &initial) {
        warn!(label, error = %err, "could not seed simulated session");
        return SimulationStats::empty(label);
    }

    let transport = MemoryTransport::new(256);
    let Ok(events) = transport.subscribe() else {
        return SimulationStats::empty(label);
    };

    let events_sent = deltas.len();
    let producer = async {
        let mut delivered = 0usize;
        let mut socket = Box::pin(chaotic_socket(deltas, chaos, seed));
        while let Some(envelope) = socket.next().await {
            if transport.deliver(envelope).await.is_err() {
                break;
            }
            delivered += 1;
        }

        // participant events carry the full Locus, so the server state
        // reaches the client even when the last deltas were lost
        if let Ok(event) = SocketEvent::full(LocusEventType::ParticipantUpdated, &latest) {
            if let Ok(envelope) = serde_json::to_value(event) {
                let _ = transport.deliver(envelope).await;
            }
        }
        transport.close().await;
        delivered
    };

    let (events_delivered, outcome) = tokio::join!(producer, session.run(events));
    if let Err(err) = outcome {
        println!("  session stopped: {}", err);
    }

    let stats = session.stats();
    let working_copy = session.working_copy();
    let final_sequence = working_copy.as_ref().and_then(|w| w.sequence.terminal());
    let final_url = session.locus_url();

    SimulationStats {
        label: label.to_string(),
        events_sent,
        events_delivered,
        adopted: stats.adopted,
        relocations: stats.relocations,
        ignored: stats.discarded,
        held: stats.held,
        desyncs: stats.desyncs,
        resync_fetches: client.fetcher().request_count(),
        converged: final_sequence == latest.sequence.terminal() && final_url == latest.url,
        final_sequence,
        final_url,
        total_time: start.elapsed(),
    }
}

impl SimulationStats {
    fn empty(label: &str) -> Self {
        Self {
            label: label.to_string(),
            events_sent: 0,
            events_delivered: 0,
            adopted: 0,
            relocations: 0,
            ignored: 0,
            held: 0,
            desyncs: 0,
            resync_fetches: 0,
            final_sequence: None,
            final_url: String::new(),
            converged: false,
            total_time: Duration::ZERO,
        }
    }
}
