//! Retrieve an extended data square given only its header.
//!
//! # Overview
//!
//! Any one quadrant of a square determines the rest. A [Retriever] picks a quadrant at
//! random, fetches its shares from a [Store] by walking the row trees committed to in the
//! header, repairs the full square from it, and checks every row and column of the result
//! against the header. A quadrant that cannot be fetched is excluded and another is tried,
//! until all four have failed.
//!
//! Every byte read from the store is checked against the hash that addressed it, so a store
//! can withhold data but never substitute it. If the repaired square does not match the
//! header, the committed data was not a valid extension and retrieval fails with a
//! [ByzantineProof] that anyone holding the header can check.
//!
//! All store requests, across every retrieval sharing a [Retriever], run through a single
//! [Pool] bounded by [Config::concurrency].
//!
//! # Example
//!
//! ```rust
//! use commonware_availability::{
//!     retriever::{Config, Retriever},
//!     store::{batch_size, import_shares, Memory},
//!     Share, SHARE_SIZE,
//! };
//! use commonware_runtime::{deterministic, Runner, Signaler};
//!
//! let executor = deterministic::Runner::default();
//! executor.start(|context| async move {
//!     // Import a square
//!     let store = Memory::default();
//!     let original: Vec<Share> = (0..4u8)
//!         .map(|i| Share::new(vec![i; SHARE_SIZE]).unwrap())
//!         .collect();
//!     let (eds, dah) = import_shares(&store, original, batch_size(4)).await.unwrap();
//!
//!     // Retrieve it back
//!     let (_signaler, signal) = Signaler::new();
//!     let retriever = Retriever::new(context, store, Config::default());
//!     let retrieved = retriever.retrieve(&dah, &signal).await.unwrap();
//!     assert_eq!(retrieved, eds);
//! });
//! ```

use crate::{
    byzantine::{self, ByzantineProof},
    header::{self, DataAvailabilityHeader},
    pool::{self, Pool},
    repair::{self, repair},
    sampler::Sampler,
    square::{ExtendedDataSquare, Quadrant},
    store::Store,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Metrics, Signal};
use commonware_utils::hex;
use futures::future;
use std::{num::NonZeroUsize, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

mod fetcher;
mod metrics;
use metrics::Outcome;

/// Largest original width of a square.
pub const MAX_SQUARE_SIZE: usize = 128;

/// Largest extended width of a square.
pub const MAX_WIDTH: usize = 2 * MAX_SQUARE_SIZE;

/// Configuration for a [Retriever].
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of store requests in flight, across all retrievals.
    pub concurrency: NonZeroUsize,

    /// Largest width of a square that will be retrieved, at most [MAX_WIDTH].
    pub max_width: usize,

    /// Maximum time to spend fetching a single quadrant before trying another.
    pub attempt_timeout: Option<Duration>,

    /// Maximum time to spend on a retrieval before giving up.
    pub timeout: Option<Duration>,

    /// Seed for quadrant selection. If unset, each retrieval seeds itself from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::new(MAX_SQUARE_SIZE * MAX_SQUARE_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            max_width: MAX_WIDTH,
            attempt_timeout: None,
            timeout: None,
            seed: None,
        }
    }
}

/// Errors that can occur during retrieval.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] header::Error),
    #[error("not available after {attempts} attempts")]
    NotAvailable { attempts: usize },
    #[error("decode error: {0}")]
    Decode(#[from] repair::Error),
    #[error("byzantine {:?} {}", .0.axis, .0.index)]
    Byzantine(Box<ByzantineProof>),
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    fn outcome(&self) -> Outcome {
        match self {
            Self::InvalidHeader(_) => Outcome::InvalidHeader,
            Self::NotAvailable { .. } => Outcome::NotAvailable,
            Self::Decode(_) => Outcome::Decode,
            Self::Byzantine(_) => Outcome::Byzantine,
            Self::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Sleep for `duration`, or forever if there is none.
async fn sleep_for<E: Clock>(context: &E, duration: Option<Duration>) {
    match duration {
        Some(duration) => context.sleep(duration).await,
        None => future::pending().await,
    }
}

/// Retrieves squares from a [Store].
///
/// Clones share the same store, [Pool], and metrics.
#[derive(Clone)]
pub struct Retriever<E: Clock + Metrics, S: Store> {
    context: E,
    store: S,
    pool: Pool,
    config: Config,
    metrics: Arc<metrics::Metrics>,
}

impl<E: Clock + Metrics, S: Store> Retriever<E, S> {
    /// Create a retriever reading from `store`.
    ///
    /// Metrics are registered with `context` under the `retriever` label. A
    /// [Config::max_width] above [MAX_WIDTH] is lowered to it.
    pub fn new(context: E, store: S, mut config: Config) -> Self {
        if config.max_width > MAX_WIDTH {
            warn!(
                max_width = config.max_width,
                limit = MAX_WIDTH,
                "max width exceeds limit"
            );
            config.max_width = MAX_WIDTH;
        }
        let context = context.with_label("retriever");
        let pool = Pool::new(config.concurrency);
        let metrics = metrics::Metrics::init(&context, pool.active().clone());
        Self {
            context,
            store,
            pool,
            config,
            metrics: Arc::new(metrics),
        }
    }

    /// Largest width of a square this retriever accepts.
    pub fn max_width(&self) -> usize {
        self.config.max_width
    }

    /// Retrieve the square committed to by `dah`.
    ///
    /// Returns [Error::Cancelled] if `stop` fires or [Config::timeout] elapses first. A
    /// `stop` whose [commonware_runtime::Signaler] is dropped never fires.
    pub async fn retrieve(
        &self,
        dah: &DataAvailabilityHeader,
        stop: &Signal,
    ) -> Result<ExtendedDataSquare, Error> {
        let start = self.context.current();
        let result = self.run(dah, stop).await;
        let header = hex(&dah.hash());
        match &result {
            Ok(_) => {
                self.metrics.record(Outcome::Available);
                let elapsed = self
                    .context
                    .current()
                    .duration_since(start)
                    .unwrap_or_default();
                self.metrics.duration.observe(elapsed.as_secs_f64());
                debug!(%header, width = dah.width(), "retrieved square");
            }
            Err(err) => {
                self.metrics.record(err.outcome());
                debug!(%header, ?err, "retrieval failed");
            }
        }
        result
    }

    async fn run(
        &self,
        dah: &DataAvailabilityHeader,
        stop: &Signal,
    ) -> Result<ExtendedDataSquare, Error> {
        dah.validate(self.config.max_width)?;

        // Stop on the signal or once the deadline passes
        let result;
        select! {
            _ = pool::stopped(stop) => {
                result = Err(Error::Cancelled);
            },
            _ = sleep_for(&self.context, self.config.timeout) => {
                warn!(timeout = ?self.config.timeout, "retrieval timed out");
                result = Err(Error::Cancelled);
            },
            attempt = self.attempts(dah, stop) => {
                result = attempt;
            },
        }
        result
    }

    async fn attempts(
        &self,
        dah: &DataAvailabilityHeader,
        stop: &Signal,
    ) -> Result<ExtendedDataSquare, Error> {
        let width = dah.width();
        let k = width / 2;
        let mut sampler = match self.config.seed {
            Some(seed) => Sampler::seeded(seed),
            None => Sampler::from_entropy(),
        };

        let mut excluded = Vec::with_capacity(Quadrant::ALL.len());
        let mut attempts = 0;
        loop {
            // The smallest squares have a single share per quadrant: start with the original
            let quadrant = if width == 2 && excluded.is_empty() {
                Quadrant::TopLeft
            } else {
                match sampler.pick(&excluded) {
                    Some(quadrant) => quadrant,
                    None => {
                        warn!(attempts, "every quadrant failed");
                        return Err(Error::NotAvailable { attempts });
                    }
                }
            };
            attempts += 1;
            self.metrics.attempts.inc();
            debug!(?quadrant, attempt = attempts, "fetching quadrant");

            let fetched = match self.fetch(dah, quadrant, stop).await {
                Ok(fetched) => fetched,
                Err(fetcher::Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    debug!(?quadrant, ?err, "unable to fetch quadrant");
                    self.metrics.fetch_failures.inc();
                    excluded.push(quadrant);
                    continue;
                }
            };

            let eds = repair(quadrant, k, fetched.shares)?;
            match byzantine::verify(&eds, dah, &fetched.sample) {
                Ok(()) => return Ok(eds),
                Err(byzantine::Error::Byzantine(proof)) => return Err(Error::Byzantine(proof)),
                Err(byzantine::Error::Inconclusive { rows, cols }) => {
                    warn!(?quadrant, ?rows, ?cols, "unable to prove mismatching square");
                    excluded.push(quadrant);
                }
            }
        }
    }

    async fn fetch(
        &self,
        dah: &DataAvailabilityHeader,
        quadrant: Quadrant,
        stop: &Signal,
    ) -> Result<fetcher::Fetched, fetcher::Error> {
        let result;
        select! {
            fetched = fetcher::quadrant(
                &self.store,
                &self.pool,
                &self.metrics,
                dah,
                quadrant,
                stop,
            ) => {
                result = fetched;
            },
            _ = sleep_for(&self.context, self.config.attempt_timeout) => {
                result = Err(fetcher::Error::Timeout);
            },
        }
        result
    }
}
