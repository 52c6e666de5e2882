//! Worker thread configuration and the request worker pool
//!
//! Requests are serviced by a fixed set of OS threads. Each worker owns a
//! [`HandleCache`] and runs jobs to completion against its own handle; callers
//! only ever see the job's result, delivered over a oneshot channel.

use crate::container::DataSource;
use crate::engine::Engine;
use crate::errors::{NcJsonError, Result};
use crate::handles::{HandleCache, Opener};
use crate::netcdf_io::NetcdfFile;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub num_workers: usize,
    pub thread_name: String,
}

impl WorkerConfig {
    /// Create a configuration; `None` uses every available CPU core.
    pub fn new(num_workers: Option<usize>) -> Self {
        Self {
            num_workers: num_workers.unwrap_or_else(num_cpus::get).max(1),
            thread_name: "ncjson-worker".to_string(),
        }
    }

    /// Create a configuration that uses all available CPU cores
    pub fn all_cores() -> Self {
        Self::new(None)
    }

    /// Create a configuration that uses a specific number of workers
    pub fn with_workers(num_workers: usize) -> Self {
        Self::new(Some(num_workers))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::all_cores()
    }
}

type Job<H> = Box<dyn FnOnce(Result<&H>) + Send>;

/// Fixed pool of threads, each confined to its own handle
pub struct WorkerPool<H> {
    sender: Option<mpsc::Sender<Job<H>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<S: DataSource + 'static> WorkerPool<Engine<S>> {
    /// Pool whose workers build engines with `open`.
    pub fn for_engines<F>(config: &WorkerConfig, source: impl Into<PathBuf>, open: F) -> Result<Self>
    where
        F: Fn(&Path) -> Result<S> + Send + Sync + 'static,
    {
        let opener: Opener<Engine<S>> = Arc::new(move |path: &Path| open(path).map(Engine::new));
        Self::spawn(config, source, opener)
    }
}

impl WorkerPool<Engine<NetcdfFile>> {
    /// Pool serving one NetCDF file.
    pub fn for_file(config: &WorkerConfig, path: impl Into<PathBuf>) -> Result<Self> {
        Self::for_engines(config, path, |p: &Path| NetcdfFile::open(p))
    }
}

impl<H: 'static> WorkerPool<H> {
    /// Start `config.num_workers` named worker threads.
    pub fn spawn(config: &WorkerConfig, source: impl Into<PathBuf>, opener: Opener<H>) -> Result<Self> {
        let source = source.into();
        let (sender, receiver) = mpsc::channel::<Job<H>>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(config.num_workers);
        for index in 0..config.num_workers {
            let receiver = Arc::clone(&receiver);
            let opener = Arc::clone(&opener);
            let source = source.clone();
            let worker = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, index))
                .spawn(move || worker_loop(receiver, HandleCache::new(source, opener)))?;
            workers.push(worker);
        }

        info!(
            workers = config.num_workers,
            source = %source.display(),
            "Started worker pool"
        );
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run `job` on some worker against that worker's own handle.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(job)?
            .await
            .map_err(|_| NcJsonError::Worker("worker dropped the request".to_string()))?
    }

    /// Blocking variant of [`WorkerPool::run`] for callers outside a runtime.
    pub fn run_blocking<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(job)?
            .blocking_recv()
            .map_err(|_| NcJsonError::Worker("worker dropped the request".to_string()))?
    }

    fn submit<F, T>(&self, job: F) -> Result<oneshot::Receiver<Result<T>>>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job<H> = Box::new(move |handle: Result<&H>| {
            // The caller may have gone away; nothing to do then.
            let _ = reply.send(handle.and_then(job));
        });
        self.sender
            .as_ref()
            .ok_or_else(|| NcJsonError::Worker("pool is shut down".to_string()))?
            .send(job)
            .map_err(|_| NcJsonError::Worker("pool is shut down".to_string()))?;
        Ok(response)
    }
}

impl<H> Drop for WorkerPool<H> {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop<H>(receiver: Arc<Mutex<mpsc::Receiver<Job<H>>>>, mut cache: HandleCache<H>) {
    loop {
        let next = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        let Ok(job) = next else {
            break;
        };

        let handle = cache.get_instance_for_current_thread();
        if panic::catch_unwind(AssertUnwindSafe(|| job(handle))).is_err() {
            error!(thread = ?thread::current().name(), "Job panicked; request dropped");
        }
    }
    debug!(
        thread = ?thread::current().name(),
        opens = cache.opens(),
        "Worker exiting"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::ThreadId;

    fn counting_pool(workers: usize) -> (WorkerPool<ThreadId>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&opens);
        let opener: Opener<ThreadId> = Arc::new(move |_: &Path| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(thread::current().id())
        });
        let pool = WorkerPool::spawn(&WorkerConfig::with_workers(workers), "data.nc", opener).unwrap();
        (pool, opens)
    }

    #[test]
    fn test_worker_config() {
        assert_eq!(WorkerConfig::with_workers(4).num_workers, 4);
        assert_eq!(WorkerConfig::with_workers(0).num_workers, 1);
        assert!(WorkerConfig::all_cores().num_workers > 0);
    }

    #[test]
    fn test_single_worker_opens_once() {
        let (pool, opens) = counting_pool(1);
        for _ in 0..5 {
            let owner = pool
                .run_blocking(|handle| {
                    assert_eq!(*handle, thread::current().id());
                    Ok(*handle)
                })
                .unwrap();
            assert_ne!(owner, thread::current().id());
        }
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handles_never_exceed_workers() {
        let (pool, opens) = counting_pool(3);
        for _ in 0..30 {
            pool.run_blocking(|handle| {
                assert_eq!(*handle, thread::current().id());
                Ok(())
            })
            .unwrap();
        }
        assert!(opens.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_job_errors_are_returned() {
        let (pool, _) = counting_pool(1);
        let err = pool
            .run_blocking(|_| -> Result<()> { Err(NcJsonError::invalid_argument("nope")) })
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let (pool, _) = counting_pool(1);
        let err = pool
            .run_blocking(|_| -> Result<()> { panic!("boom") })
            .unwrap_err();
        assert!(matches!(err, NcJsonError::Worker(_)));
        assert!(pool.run_blocking(|_| Ok(1)).is_ok());
    }

    #[test]
    fn test_async_run() {
        let (pool, opens) = counting_pool(2);
        let value = tokio_test::block_on(pool.run(|_| Ok(21 * 2))).unwrap();
        assert_eq!(value, 42);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }
}
