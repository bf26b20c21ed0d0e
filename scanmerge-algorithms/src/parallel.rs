//! Worker pool for the merge pipeline
//!
//! Each merge builds its own rayon pool so that the worker count of one
//! merge never leaks into another or into the global pool.

use rayon::{ThreadPool, ThreadPoolBuilder};
use scanmerge_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of merge workers: half the logical CPUs, at least one
pub fn default_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Thread name prefix
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: default_workers(),
            thread_name_prefix: "scanmerge-merge".to_string(),
        }
    }
}

impl PoolConfig {
    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Build the pool
    ///
    /// # Errors
    /// `InvalidParameter` for zero threads, `Task` if the threads cannot be
    /// spawned.
    pub fn build(&self) -> Result<ThreadPool> {
        if self.num_threads == 0 {
            return Err(Error::InvalidParameter(
                "worker count must be at least 1".to_string(),
            ));
        }

        let mut builder = ThreadPoolBuilder::new().num_threads(self.num_threads);

        if !self.thread_name_prefix.is_empty() {
            let prefix = self.thread_name_prefix.clone();
            builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
        }

        builder
            .build()
            .map_err(|e| Error::Task(format!("Failed to create thread pool: {}", e)))
    }
}
