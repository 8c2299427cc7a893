//! Concurrent descriptor retrieval.
//!
//! All descriptors needing a fetch go through one structured batch: a
//! bounded worker pool downloads, digest-verifies and parses each one, and
//! the first failure cancels the rest. Cancellation is best-effort — a task
//! already mid-transfer runs to completion — but the batch always waits for
//! every task to settle before propagating the first-observed error, so no
//! background work outlives the call and no partial result set escapes.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use super::Metafile;
use crate::error::{Result, UpdateError};
use crate::hash::HashFunction;
use crate::manifest::loader::{self, resolve_relative};
use crate::manifest::Document;
use crate::transport::Transport;

/// Worker cap for descriptor fetches.
pub(crate) const DEFAULT_CONCURRENCY: usize = 12;

/// Descriptors are small; 8K is generous.
const METAFILE_LIMIT: usize = 8 * loader::K;

/// One descriptor to fetch: its index path and expected digest, already
/// normalized.
#[derive(Debug, Clone)]
pub(crate) struct MetafileRequest {
    pub path: String,
    pub hex: String,
}

/// Fetches, verifies and parses a batch of descriptors.
///
/// Returns every descriptor on success, in no particular order, or the
/// first-observed failure with all siblings cancelled.
pub(crate) async fn fetch_all(
    transport: Arc<dyn Transport>,
    base_url: &str,
    func: HashFunction,
    requests: Vec<MetafileRequest>,
    concurrency: usize,
) -> Result<Vec<Metafile>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let cancel = CancellationToken::new();
    let mut tasks: JoinSet<Option<Result<Metafile>>> = JoinSet::new();

    for request in requests {
        let transport = Arc::clone(&transport);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let url = resolve_relative(base_url, &request.path);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("fetch semaphore never closes");
            // A failed sibling has already decided this batch's fate.
            if cancel.is_cancelled() {
                return None;
            }
            let context = url.clone();
            match task::spawn_blocking(move || fetch_one(transport.as_ref(), &url, func, request))
                .await
            {
                Ok(result) => Some(result),
                Err(e) => Some(Err(UpdateError::Transport {
                    url: context,
                    detail: format!("descriptor fetch task failed: {e}"),
                })),
            }
        });
    }

    let mut fetched = Vec::new();
    let mut first_failure: Option<UpdateError> = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => Some(Err(UpdateError::Transport {
                url: base_url.to_string(),
                detail: format!("descriptor fetch task failed: {e}"),
            })),
        };
        match outcome {
            Some(Ok(metafile)) => fetched.push(metafile),
            Some(Err(e)) => {
                if first_failure.is_none() {
                    cancel.cancel();
                    first_failure = Some(e);
                }
            }
            None => {}
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => Ok(fetched),
    }
}

fn fetch_one(
    transport: &dyn Transport,
    url: &str,
    func: HashFunction,
    request: MetafileRequest,
) -> Result<Metafile> {
    let body = loader::load_hash_verified(transport, url, METAFILE_LIMIT, func, &request.hex)?;
    let document = Document::parse(url, &body)?;
    Ok(Metafile::new(
        request.path,
        func.doublet(&request.hex),
        document,
    ))
}
