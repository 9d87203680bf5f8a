//! Per-leader periodic ticks.
//!
//! Every leader gets exactly one task that fires every `tick_interval`,
//! starting immediately. A firing moves the leader, emits its event, then
//! walks the cars attached to it and lets each close the gap. Since a
//! leader only ever has one task, its ticks never overlap; ticks of
//! different leaders run concurrently, bounded per city by a semaphore.
//!
//! Followers can themselves be followed. The cascade walks the follower
//! tree depth-first, one car lock at a time, each car reacting to the car
//! it follows: when that car moved, a distant follower takes the cell it
//! left; when it held its cell, a distant follower pulls up next to it.

use std::sync::Arc;
use std::time::Duration;

use citysim_types::{CarId, Position};
use rand::Rng;
use rand::rngs::SmallRng;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::car::Car;
use crate::movement::Grid;
use crate::registry::{CarRegistry, SharedCar};
use crate::telemetry::TelemetryEmitter;

/// Grace period for aborted tasks to unwind after a drain timed out.
const ABORT_GRACE: Duration = Duration::from_millis(250);

/// Everything a tick needs besides the leader itself.
#[derive(Debug)]
pub struct TickContext {
    /// Bounds of the city.
    pub grid: Grid,
    /// The city's cars, used to resolve follower ids.
    pub registry: Arc<CarRegistry>,
    /// Where detection events go.
    pub emitter: Arc<TelemetryEmitter>,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Followers visited by the cascade.
    pub followers_visited: usize,
    /// Followers that actually moved.
    pub followers_moved: usize,
}

/// Run one tick for `leader`.
///
/// The leader's lock is held for the whole tick, so a follower attaching
/// itself concurrently either lands before the cascade starts or waits
/// for the next tick.
pub async fn run_tick<R: Rng + ?Sized>(leader: &Mutex<Car>, ctx: &TickContext, rng: &mut R) -> TickReport {
    let mut leader = leader.lock().await;
    leader.advance(ctx.grid, rng);
    ctx.emitter.emit(&leader).await;

    let mut report = TickReport::default();
    // Car ahead: its position and, if it moved this tick, the cell it left.
    let mut pending: Vec<(Position, Option<Position>, Vec<CarId>)> = vec![(
        leader.position,
        Some(leader.previous_position),
        leader.followers.iter().cloned().collect(),
    )];

    while let Some((ahead, ahead_left, followers)) = pending.pop() {
        for id in followers {
            let Some(follower) = ctx.registry.get(&id).await else {
                warn!(vin = %id, "follower missing from registry, skipping");
                continue;
            };
            let mut follower = follower.lock().await;
            report.followers_visited = report.followers_visited.saturating_add(1);
            let moved = match ahead_left {
                Some(left) => follower.follow(ahead, left),
                None => follower.close_in(ahead),
            };
            if moved {
                report.followers_moved = report.followers_moved.saturating_add(1);
            }
            ctx.emitter.emit(&follower).await;
            if !follower.followers.is_empty() {
                pending.push((
                    follower.position,
                    moved.then_some(follower.previous_position),
                    follower.followers.iter().cloned().collect(),
                ));
            }
        }
    }

    trace!(
        vin = %leader.vin,
        position = %leader.position,
        followers_visited = report.followers_visited,
        followers_moved = report.followers_moved,
        "tick complete"
    );
    report
}

/// Outcome of [`Scheduler::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Leader tasks that were running when the drain started.
    pub tasks: usize,
    /// Whether the drain hit its deadline and had to abort tasks.
    pub timed_out: bool,
}

/// Runs the leader tasks of one city.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    permits: Arc<Semaphore>,
    stop: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl Scheduler {
    /// Create a scheduler firing every `interval` with at most `workers`
    /// ticks of this city in flight at once.
    pub fn new(interval: Duration, workers: usize) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            interval,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            stop,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Whether [`Scheduler::shutdown`] has been called.
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Number of leader tasks still registered.
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Start the periodic task of a leader.
    ///
    /// Returns `false` (and starts nothing) once the scheduler is stopped.
    pub async fn register(&self, leader: SharedCar, ctx: Arc<TickContext>, rng: SmallRng) -> bool {
        let mut tasks = self.tasks.lock().await;
        if self.is_stopped() {
            return false;
        }
        let stop = self.stop.subscribe();
        let permits = Arc::clone(&self.permits);
        tasks.spawn(leader_loop(leader, ctx, rng, self.interval, permits, stop));
        true
    }

    /// Stop accepting work and wait for in-flight ticks.
    ///
    /// Waits at most `timeout`; tasks still running after that are aborted
    /// so shutdown always terminates.
    pub async fn shutdown(&self, timeout: Duration) -> DrainReport {
        let mut tasks = {
            let mut guard = self.tasks.lock().await;
            self.stop.send_replace(true);
            std::mem::take(&mut *guard)
        };
        self.permits.close();

        let count = tasks.len();
        let drained = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_ok() {
            debug!(tasks = count, "scheduler drained");
            return DrainReport { tasks: count, timed_out: false };
        }

        warn!(
            tasks = count,
            still_running = tasks.len(),
            timeout_ms = timeout.as_millis(),
            "scheduler drain timed out, aborting remaining ticks"
        );
        tasks.abort_all();
        let reaped = tokio::time::timeout(ABORT_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if reaped.is_err() {
            warn!(still_running = tasks.len(), "aborted ticks did not unwind in time");
        }
        DrainReport { tasks: count, timed_out: true }
    }
}

/// Body of a leader task.
async fn leader_loop(
    leader: SharedCar,
    ctx: Arc<TickContext>,
    mut rng: SmallRng,
    period: Duration,
    permits: Arc<Semaphore>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let Ok(_permit) = permits.acquire().await else {
            break;
        };
        if *stop.borrow() {
            break;
        }
        run_tick(&leader, &ctx, &mut rng).await;
    }

    let vin = leader.lock().await.vin.clone();
    info!(vin = %vin, "leader task stopped");
}
