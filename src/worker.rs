//! Parallel coordination: racing workers over decorrelated offset
//! regions until the first discovery, a timeout, or cancellation.
//!
//! Workers share exactly three things: a write-once discovery slot, the
//! cancellation flag, and a monotonic attempt counter.  There are no
//! locks; per-worker buffers are privately owned, and the only
//! synchronization cost is one flag load per batch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::edwards::CompressedEdwardsY;
use crate::errors::Error;
use crate::prefix::Matcher;
use crate::search::{search, KeyKind};

/// Default number of candidates per batch.
///
/// Larger batches amortize the per-batch inversion better but enlarge
/// the working set and the worst-case cancellation latency (one batch).
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// A winning candidate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Discovery {
    /// Offset from the starting key, in units of `B₈`; the matching
    /// secret scalar is `start_secret + 8 * offset`.
    pub offset: u128,
    /// The candidate public key: an Edwards y-coordinate with the sign
    /// bit cleared, or a Montgomery u-coordinate in client mode.
    pub public_key: [u8; 32],
}

/// Tuning knobs for a parallel search.
#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Which key encoding is being searched.
    pub kind: KeyKind,
    /// Candidates per batch; must be positive and even.
    pub batch_size: usize,
    /// Worker thread count; defaults to the available parallelism.
    pub workers: Option<usize>,
    /// Give up after this long without a match.
    pub timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> SearchOptions {
        SearchOptions {
            kind: KeyKind::Service,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: None,
            timeout: None,
        }
    }
}

/// Race worker threads over the keyspace until one finds a candidate
/// accepted by `matcher`.
///
/// Each worker draws a random 64-bit starting offset to decorrelate its
/// region from the others and runs [`search`] with a shared cancellation
/// flag.  The first discovery wins; later discoveries racing in the same
/// batch are discarded.  Returns the winning discovery, if any, and the
/// total number of candidates examined across all workers.
///
/// Exhaustion (timeout before any discovery) is not an error: the
/// discovery is simply `None`.
pub fn search_parallel(
    start_public_key: &[u8; 32],
    matcher: &Matcher,
    options: &SearchOptions,
) -> Result<(Option<Discovery>, u64), Error> {
    // Validate up front, so the workers themselves cannot fail.
    if options.batch_size == 0 || options.batch_size % 2 != 0 {
        return Err(Error::InvalidBatchSize(options.batch_size));
    }
    if CompressedEdwardsY(*start_public_key).decompress().is_none() {
        return Err(Error::InvalidPublicKey);
    }

    let workers = options
        .workers
        .unwrap_or_else(|| thread::available_parallelism().map_or(1, |n| n.get()))
        .max(1);

    let cancel = AtomicBool::new(false);
    let attempts = AtomicU64::new(0);
    let winner: OnceLock<Discovery> = OnceLock::new();

    thread::scope(|s| {
        for worker in 0..workers {
            let cancel = &cancel;
            let attempts = &attempts;
            let winner = &winner;
            s.spawn(move || {
                // Decorrelate this worker's region of the offset space.
                let start_offset = OsRng.next_u64() as u128;
                debug!("worker {worker} starting at offset {start_offset:#018x}");
                let examined = search(
                    start_public_key,
                    start_offset,
                    options.batch_size,
                    options.kind,
                    cancel,
                    |candidate| matcher.matches(candidate),
                    |public_key, offset| {
                        // The slot is written before cancellation is
                        // raised, so the winner is visible to the joiner.
                        if winner.set(Discovery { offset, public_key }).is_ok() {
                            cancel.store(true, Ordering::Release);
                        }
                    },
                )
                .expect("search parameters were validated before spawning");
                attempts.fetch_add(examined, Ordering::Relaxed);
                debug!("worker {worker} stopped after {examined} candidates");
            });
        }

        if let Some(timeout) = options.timeout {
            let cancel = &cancel;
            s.spawn(move || {
                let deadline = Instant::now() + timeout;
                // Sleep in slices so this thread also winds down promptly
                // when a worker finds a key first.
                loop {
                    if cancel.load(Ordering::Acquire) {
                        break;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("deadline reached, cancelling workers");
                        cancel.store(true, Ordering::Release);
                        break;
                    }
                    thread::sleep((deadline - now).min(Duration::from_millis(25)));
                }
            });
        }
    });

    Ok((winner.get().cloned(), attempts.load(Ordering::Relaxed)))
}
