//! Grace hash join over two indexes.
//!
//! # Phases
//! ```text
//!   left ──select──▶ temp HashIndex L ─┐
//!                                      ├─ equalize depths ─▶ zip directories
//!   right ─select──▶ temp HashIndex R ─┘                        │
//!                                            unique (Lpn, Rpn) pairs
//!                                                   │
//!                        ┌──────────────┬───────────┴──┬──────────────┐
//!                        ▼              ▼              ▼              ▼
//!                     probe          probe          probe          probe
//!                        └──────────────┴──── mpsc ──┴──────────────┘
//!                                                   │
//!                                               results
//! ```
//! Partitioning and equalization run on the calling thread. Probes run as
//! tasks on the current Tokio runtime, so a full result channel suspends them
//! rather than blocking a thread. Their bucket reads go to the blocking pool.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::buffer::Pager;
use crate::common::{Error, IndexConfig, JoinConfig, PageId, Result};
use crate::failpoint;
use crate::index::hash::meta_path;
use crate::index::{Entry, HashBucket, HashEntry, HashIndex, HashTable, Index};
use crate::join::{BloomFilter, TaskGroup, PROBE_FAILPOINT};

/// One join match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPair {
    pub left: HashEntry,
    pub right: HashEntry,
}

/// A running join.
///
/// Drain `results` until it yields `None` (or cancel with `cancel`), then
/// `group.wait()` for the outcome, then `cleanup.run()` to remove the
/// temporary indexes. [`JoinOutput::collect`] does all three.
#[derive(Debug)]
pub struct JoinOutput {
    pub results: mpsc::Receiver<EntryPair>,
    pub cancel: CancellationToken,
    pub group: TaskGroup,
    pub cleanup: Cleanup,
}

impl JoinOutput {
    /// Gather every result, wait for the probes and clean up.
    ///
    /// Cleanup runs even when a probe failed; the probe error wins.
    pub async fn collect(mut self) -> Result<Vec<EntryPair>> {
        let mut pairs = Vec::new();
        while let Some(pair) = self.results.recv().await {
            pairs.push(pair);
        }
        let waited = self.group.wait().await;
        let cleaned = self.cleanup.run();
        waited?;
        cleaned?;
        Ok(pairs)
    }
}

/// Closes the temporary indexes of a join and deletes their files.
///
/// Running it twice is harmless. If it was never run, it runs on drop and
/// logs any failure.
#[derive(Debug, Default)]
pub struct Cleanup {
    indexes: Vec<HashIndex>,
}

impl Cleanup {
    /// Files this cleanup will remove.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.indexes
            .iter()
            .flat_map(|index| [index.path().to_path_buf(), index.meta_path()])
            .collect()
    }

    pub fn run(&mut self) -> Result<()> {
        let mut first_error = None;
        for index in self.indexes.drain(..) {
            if let Err(e) = index.close() {
                first_error.get_or_insert(e);
            }
            for path in [index.path().to_path_buf(), index.meta_path()] {
                if let Err(e) = remove_if_exists(&path) {
                    first_error.get_or_insert(e);
                }
            }
            debug!(path = ?index.path(), "removed temporary index");
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if self.indexes.is_empty() {
            return;
        }
        if let Err(e) = self.run() {
            warn!(error = %e, "join cleanup on drop failed");
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Join `left` and `right` with the default [`JoinConfig`].
///
/// `join_on_left_key` picks the left entries' keys (or values, if `false`)
/// as the join attribute; likewise for the right. Results keep each entry's
/// original orientation.
///
/// Must be called from within a Tokio runtime.
///
/// # Example
/// ```no_run
/// # use gracedb::index::HashIndex;
/// # use gracedb::common::IndexConfig;
/// # async fn demo(left: HashIndex, right: HashIndex) -> gracedb::Result<()> {
/// let output = gracedb::join(&left, &right, true, true)?;
/// for pair in output.collect().await? {
///     println!("{:?} = {:?}", pair.left, pair.right);
/// }
/// # Ok(())
/// # }
/// ```
pub fn join<L, R>(
    left: &L,
    right: &R,
    join_on_left_key: bool,
    join_on_right_key: bool,
) -> Result<JoinOutput>
where
    L: Index + ?Sized,
    R: Index + ?Sized,
{
    join_with_config(
        left,
        right,
        join_on_left_key,
        join_on_right_key,
        JoinConfig::default(),
    )
}

/// [`join`] with explicit tunables.
///
/// # Errors
/// - `Error::NoRuntime` outside a Tokio runtime
/// - anything building the temporary indexes returns; files created so far
///   are removed before returning
pub fn join_with_config<L, R>(
    left: &L,
    right: &R,
    join_on_left_key: bool,
    join_on_right_key: bool,
    config: JoinConfig,
) -> Result<JoinOutput>
where
    L: Index + ?Sized,
    R: Index + ?Sized,
{
    config.validate()?;
    let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;

    // Partition.
    let mut cleanup = Cleanup::default();
    build_hash_index(left.table(), join_on_left_key, &config.index, &mut cleanup)?;
    build_hash_index(right.table(), join_on_right_key, &config.index, &mut cleanup)?;

    let (left_slot, right_slot) = cleanup.indexes.split_at_mut(1);
    let left_table = left_slot[0].table_mut();
    let right_table = right_slot[0].table_mut();
    equalize_depths(left_table, right_table)?;
    debug!(
        global_depth = left_table.global_depth(),
        "partitioned join inputs"
    );

    // Probe.
    let cancel = CancellationToken::new();
    let (results, receiver) = mpsc::channel(config.channel_capacity);
    let permits = (config.index.pager.frame_count / 2).max(1);
    let ctx = Arc::new(ProbeContext {
        left: left_table.pager().clone(),
        right: right_table.pager().clone(),
        join_on_left_key,
        join_on_right_key,
        filter_size: config.filter_size,
        cancel: cancel.clone(),
        permits: Arc::new(Semaphore::new(permits)),
        results,
    });

    let mut group = TaskGroup::new(cancel.clone());
    for (left_pn, right_pn) in unique_bucket_pairs(left_table, right_table) {
        group.spawn_on(probe_buckets(Arc::clone(&ctx), left_pn, right_pn), &handle);
    }
    debug!(probes = group.len(), "probe tasks spawned");

    Ok(JoinOutput {
        results: receiver,
        cancel,
        group,
        cleanup,
    })
}

/// Copy every entry of `source` into a new temporary index, keyed by the
/// entry's key or (if `use_key` is false) its value. The index is handed to
/// `cleanup` even when filling it fails.
fn build_hash_index(
    source: &HashTable,
    use_key: bool,
    config: &IndexConfig,
    cleanup: &mut Cleanup,
) -> Result<()> {
    let path = temp_db_path()?;
    let mut index = match HashIndex::open(&path, *config) {
        Ok(index) => index,
        Err(e) => {
            for path in [path.clone(), meta_path(&path)] {
                if let Err(err) = remove_if_exists(&path) {
                    warn!(path = ?path, error = %err, "could not remove temporary index");
                }
            }
            return Err(e);
        }
    };
    let filled = fill_index(&mut index, source, use_key);
    cleanup.indexes.push(index);
    filled
}

fn fill_index(index: &mut HashIndex, source: &HashTable, use_key: bool) -> Result<()> {
    let entries = source.select()?;
    for entry in &entries {
        let entry = if use_key { *entry } else { entry.swapped() };
        index.insert(entry.key(), entry.value())?;
    }
    debug!(path = ?index.path(), entries = entries.len(), use_key, "built temporary index");
    Ok(())
}

fn temp_db_path() -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("gracedb-")
        .suffix(".db")
        .tempfile()?;
    file.into_temp_path().keep().map_err(|e| Error::Io(e.error))
}

/// Double the shallower directory until both have the same global depth.
fn equalize_depths(left: &mut HashTable, right: &mut HashTable) -> Result<()> {
    while left.global_depth() < right.global_depth() {
        left.extend_table()?;
    }
    while right.global_depth() < left.global_depth() {
        right.extend_table()?;
    }
    Ok(())
}

/// Walk both directories in lockstep, yielding each `(left, right)` bucket
/// pair once however many slots alias it.
fn unique_bucket_pairs(left: &HashTable, right: &HashTable) -> Vec<(PageId, PageId)> {
    debug_assert_eq!(left.global_depth(), right.global_depth());
    let mut seen = HashSet::new();
    left.buckets()
        .iter()
        .copied()
        .zip(right.buckets().iter().copied())
        .filter(|pair| seen.insert(*pair))
        .collect()
}

/// State shared by the probe tasks of one join.
struct ProbeContext {
    left: Pager,
    right: Pager,
    join_on_left_key: bool,
    join_on_right_key: bool,
    filter_size: u64,
    cancel: CancellationToken,
    /// Bounds how many probes hold bucket pages at once, so the temporary
    /// pagers never run out of frames.
    permits: Arc<Semaphore>,
    results: mpsc::Sender<EntryPair>,
}

impl ProbeContext {
    /// Read both buckets' entries. Pages are unpinned on every path.
    fn read_buckets(
        &self,
        left_pn: PageId,
        right_pn: PageId,
    ) -> Result<(Vec<HashEntry>, Vec<HashEntry>)> {
        let left = HashBucket::new(self.left.get_page(left_pn)?);
        let right = HashBucket::new(self.right.get_page(right_pn)?);
        failpoint::maybe_fail(PROBE_FAILPOINT)?;

        let entries = (left.entries()?, right.entries()?);
        left.release()?;
        right.release()?;
        Ok(entries)
    }

    /// Undo the key/value swap made while partitioning.
    fn pair(&self, left: HashEntry, right: HashEntry) -> EntryPair {
        EntryPair {
            left: if self.join_on_left_key { left } else { left.swapped() },
            right: if self.join_on_right_key { right } else { right.swapped() },
        }
    }
}

async fn probe_buckets(ctx: Arc<ProbeContext>, left_pn: PageId, right_pn: PageId) -> Result<()> {
    let permit = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
        permit = Arc::clone(&ctx.permits).acquire_owned() => {
            permit.map_err(|_| Error::Cancelled)?
        }
    };
    // Page reads take the pager lock and may hit disk; keep them off the
    // runtime's workers. The pins never leave the blocking closure.
    let reader = Arc::clone(&ctx);
    let (left_entries, right_entries) =
        tokio::task::spawn_blocking(move || reader.read_buckets(left_pn, right_pn))
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))??;
    drop(permit);

    let mut filter = BloomFilter::new(ctx.filter_size);
    for entry in &right_entries {
        filter.insert(entry.key());
    }

    let mut emitted = 0usize;
    for left in left_entries.iter().filter(|e| filter.contains(e.key())) {
        for right in right_entries.iter().filter(|e| e.key() == left.key()) {
            let pair = ctx.pair(*left, *right);
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                sent = ctx.results.send(pair) => sent.map_err(|_| Error::Cancelled)?,
            }
            emitted += 1;
        }
    }

    trace!(left = %left_pn, right = %right_pn, emitted, "probe finished");
    Ok(())
}
