use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    config::DEFAULT_SEARCH_WORKERS,
    error::{Error, Result},
};

/// Fixed-size worker pool that finds files by extension under a root.
///
/// Directories are handed out through a shared work queue, so each directory
/// is read by exactly one worker and every match is reported once. The call
/// blocks until all workers have drained the queue.
#[derive(Debug, Clone, Copy)]
pub struct ParallelSearch {
    workers: usize,
}

impl Default for ParallelSearch {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_WORKERS)
    }
}

impl ParallelSearch {
    /// Creates a pool description with `workers` threads
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// Number of worker threads used per search
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Collects every file under `root` whose name ends with `extension`.
    ///
    /// The suffix match is exact and case-sensitive. Unreadable directories
    /// are skipped with a warning rather than failing the search.
    pub fn search(&self, root: impl AsRef<Path>, extension: &str) -> Result<BTreeSet<PathBuf>> {
        let root = root.as_ref();
        if self.workers == 0 {
            return Err(Error::InvalidSearch("worker count must be at least 1".to_string()));
        }
        if !root.is_dir() {
            return Err(Error::InvalidSearch(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        tracing::debug!(root = %root.display(), extension, workers = self.workers, "Starting parallel search");

        let (tx, rx) = crossbeam_channel::unbounded();
        let pending = AtomicUsize::new(1);
        tx.send(Some(root.to_path_buf()))
            .map_err(|_| Error::InvalidSearch("work queue closed before start".to_string()))?;

        let partials: Vec<Vec<PathBuf>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|id| {
                    let worker = Worker {
                        id,
                        pool_size: self.workers,
                        extension,
                        queue: tx.clone(),
                        jobs: rx.clone(),
                        pending: &pending,
                    };
                    scope.spawn(move || worker.run())
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|handle| match handle.join() {
                    Ok(found) => Some(found),
                    Err(_) => {
                        tracing::error!("Search worker panicked, its partial results are lost");
                        None
                    }
                })
                .collect()
        });

        let results: BTreeSet<PathBuf> = partials.into_iter().flatten().collect();
        tracing::info!(root = %root.display(), extension, matches = results.len(), "Parallel search complete");
        Ok(results)
    }
}

/// One member of the pool. `None` on the queue tells the worker to stop.
struct Worker<'a> {
    id:        usize,
    pool_size: usize,
    extension: &'a str,
    queue:     Sender<Option<PathBuf>>,
    jobs:      Receiver<Option<PathBuf>>,
    pending:   &'a AtomicUsize,
}

impl Worker<'_> {
    fn run(self) -> Vec<PathBuf> {
        let mut found = Vec::new();

        while let Ok(Some(dir)) = self.jobs.recv() {
            scan_dir(&dir, self.extension, &mut found, |subdir| {
                self.pending.fetch_add(1, Ordering::AcqRel);
                // The receiving half lives as long as this worker does
                let _ = self.queue.send(Some(subdir));
            });

            // Last directory in flight: wake every worker so they can exit
            if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                for _ in 0..self.pool_size {
                    let _ = self.queue.send(None);
                }
            }
        }

        tracing::debug!(worker = self.id, matches = found.len(), "Search worker finished");
        found
    }
}

/// Single-threaded recursive search with the same matching rules as
/// [`ParallelSearch::search`]. Results are in traversal order.
pub fn find_files_recursively(root: impl AsRef<Path>, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.as_ref().to_path_buf()];

    while let Some(dir) = stack.pop() {
        scan_dir(&dir, extension, &mut found, |subdir| stack.push(subdir));
    }
    found
}

/// Read one directory: matching files go into `found`, subdirectories to `descend`.
fn scan_dir(dir: &Path, extension: &str, found: &mut Vec<PathBuf>, mut descend: impl FnMut(PathBuf)) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();

        if file_type.is_dir() {
            descend(path);
            continue;
        }

        // Links to directories are listed but never followed
        if file_type.is_symlink() && fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
            continue;
        }

        if entry
            .file_name()
            .as_encoded_bytes()
            .ends_with(extension.as_bytes())
        {
            found.push(path);
        }
    }
}
