use crate::{DiscoverTeams, SyncMetrics, Team, TeamCache, TeamSync, Teams};
use anyhow::{anyhow, Result};
use maplit::hashmap;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tobac_core::TeamLookup;
use tokio::time;

const INTERVAL: time::Duration = time::Duration::from_secs(600);
const TIMEOUT: time::Duration = time::Duration::from_secs(5);

/// Serves scripted responses, repeating the last one once the script runs out.
#[derive(Clone, Default)]
struct Scripted(Arc<Inner>);

#[derive(Default)]
struct Inner {
    responses: Mutex<VecDeque<Response>>,
    calls: AtomicUsize,
}

#[derive(Clone)]
enum Response {
    Teams(Teams),
    Fail,
    Hang,
}

#[async_trait::async_trait]
impl DiscoverTeams for Scripted {
    async fn fetch_teams(&self) -> Result<Teams> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        let rsp = {
            let mut responses = self.0.responses.lock();
            if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            }
        };
        match rsp.unwrap_or(Response::Fail) {
            Response::Teams(teams) => Ok(teams),
            Response::Fail => Err(anyhow!("directory unavailable")),
            Response::Hang => {
                time::sleep(time::Duration::MAX).await;
                unreachable!("sleep must not complete")
            }
        }
    }
}

impl Scripted {
    fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        let inner = Inner {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        };
        Self(Arc::new(inner))
    }

    fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }
}

fn mk_team(id: &str) -> Team {
    Team {
        id: id.to_string(),
        group_id: format!("{id}-group"),
        display_name: id.to_uppercase(),
        description: String::new(),
    }
}

fn teams(ids: &[&str]) -> Teams {
    ids.iter().map(|id| (id.to_string(), mk_team(id))).collect()
}

fn mk_sync(discover: Scripted) -> (TeamSync<Scripted>, Arc<TeamCache>, SyncMetrics) {
    let cache = TeamCache::shared();
    let metrics = SyncMetrics::register(&mut Default::default());
    let sync = TeamSync::new(discover, cache.clone(), metrics.clone());
    (sync, cache, metrics)
}

#[test]
fn cold_cache_knows_no_teams() {
    let cache = TeamCache::default();
    assert!(cache.is_empty());
    assert_eq!(cache.get("aura"), Team::default());
    assert!(!cache.lookup("aura").is_valid());
}

#[test]
fn replace_swaps_whole_snapshot() {
    let cache = TeamCache::default();
    assert_eq!(cache.replace(teams(&["aura", "nais"])), 2);
    assert_eq!(cache.get("aura"), mk_team("aura"));

    let snapshot = hashmap! { "tobac".to_string() => mk_team("tobac") };
    assert_eq!(cache.replace(snapshot.into_iter().collect()), 1);
    assert_eq!(cache.len(), 1);
    assert!(!cache.get("aura").is_valid());
    assert!(cache.get("tobac").is_valid());
}

#[test]
fn readers_never_observe_a_partial_snapshot() {
    const GENERATIONS: u64 = 500;

    fn generation(n: u64) -> Teams {
        ["aura", "nais"]
            .into_iter()
            .map(|id| {
                let team = Team {
                    id: id.to_string(),
                    group_id: format!("{id}-{n}"),
                    display_name: id.to_uppercase(),
                    description: n.to_string(),
                };
                (id.to_string(), team)
            })
            .collect()
    }

    let cache = TeamCache::shared();
    cache.replace(generation(0));

    std::thread::scope(|s| {
        let readers = (0..4)
            .map(|_| {
                let cache = cache.clone();
                s.spawn(move || {
                    let mut last = 0;
                    loop {
                        assert_eq!(cache.len(), 2);
                        let team = cache.get("aura");
                        assert!(team.is_valid(), "{:?}", team);
                        let n = team.description.parse::<u64>().expect("generation");
                        assert_eq!(team.group_id, format!("aura-{n}"));
                        assert!(n >= last, "generation went back from {last} to {n}");
                        last = n;
                        if n == GENERATIONS {
                            return;
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for n in 1..=GENERATIONS {
            assert_eq!(cache.replace(generation(n)), 2);
        }
        for reader in readers {
            reader.join().expect("reader must not panic");
        }
    });
}

#[tokio::test(start_paused = true)]
async fn sync_populates_cache() {
    let _tracing = init_tracing();
    let (sync, cache, metrics) = mk_sync(Scripted::new([Response::Teams(teams(&["aura"]))]));

    sync.sync(TIMEOUT).await;

    assert_eq!(cache.get("aura"), mk_team("aura"));
    assert_eq!(metrics.attempts("success"), 1);
    assert_eq!(metrics.attempts("failure"), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_sync_retains_snapshot() {
    let _tracing = init_tracing();
    let (sync, cache, metrics) = mk_sync(Scripted::new([
        Response::Teams(teams(&["aura", "nais"])),
        Response::Fail,
    ]));

    sync.sync(TIMEOUT).await;
    sync.sync(TIMEOUT).await;
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("aura"), mk_team("aura"));

    // Repeated failures behave exactly like a single failure.
    for _ in 0..5 {
        sync.sync(TIMEOUT).await;
    }
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("nais"), mk_team("nais"));
    assert_eq!(metrics.attempts("success"), 1);
    assert_eq!(metrics.attempts("failure"), 6);
}

#[tokio::test(start_paused = true)]
async fn refresh_times_out() {
    let _tracing = init_tracing();
    let (sync, cache, metrics) = mk_sync(Scripted::new([
        Response::Teams(teams(&["aura"])),
        Response::Hang,
    ]));
    sync.sync(TIMEOUT).await;

    let start = time::Instant::now();
    let error = sync
        .refresh(TIMEOUT)
        .await
        .expect_err("refresh must time out");
    assert!(start.elapsed() >= TIMEOUT);
    assert!(error.to_string().contains("did not respond"), "{}", error);

    sync.sync(TIMEOUT).await;
    assert_eq!(cache.get("aura"), mk_team("aura"));
    assert_eq!(metrics.attempts("failure"), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_does_not_touch_cache() {
    let (sync, cache, _) = mk_sync(Scripted::new([Response::Teams(teams(&["aura"]))]));
    let fetched = sync.refresh(TIMEOUT).await.expect("refresh must succeed");
    assert_eq!(fetched.len(), 1);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_refreshes_every_interval_until_shutdown() {
    let _tracing = init_tracing();
    let discover = Scripted::new([
        Response::Teams(teams(&["aura"])),
        Response::Fail,
        Response::Teams(teams(&["aura", "nais"])),
    ]);
    let (sync, cache, _) = mk_sync(discover.clone());

    let (signal, shutdown) = drain::channel();
    let task = tokio::spawn(sync.run(INTERVAL, TIMEOUT, shutdown.signaled()));

    // The first refresh happens immediately.
    time::sleep(time::Duration::from_secs(1)).await;
    assert_eq!(discover.calls(), 1);
    assert_eq!(cache.len(), 1);

    // The second fails and the snapshot is retained.
    time::sleep(INTERVAL).await;
    assert_eq!(discover.calls(), 2);
    assert_eq!(cache.len(), 1);

    // The loop keeps going after a failure.
    time::sleep(INTERVAL).await;
    assert_eq!(discover.calls(), 3);
    assert_eq!(cache.len(), 2);

    signal.drain().await;
    tokio_test::assert_ok!(task.await);

    time::sleep(INTERVAL * 3).await;
    assert_eq!(discover.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_refresh_does_not_delay_next_tick() {
    let discover = Scripted::new([Response::Hang, Response::Teams(teams(&["aura"]))]);
    let (sync, cache, _) = mk_sync(discover.clone());
    let (signal, shutdown) = drain::channel();
    let task = tokio::spawn(sync.run(INTERVAL, TIMEOUT, shutdown.signaled()));

    // The first attempt hangs until the timeout; the next one still starts one interval after
    // the first one started.
    time::sleep(INTERVAL + time::Duration::from_secs(1)).await;
    assert_eq!(discover.calls(), 2);
    assert_eq!(cache.len(), 1);

    signal.drain().await;
    tokio_test::assert_ok!(task.await);
}

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .finish(),
    )
}
