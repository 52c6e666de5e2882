//! Thread-confined handle cache
//!
//! libnetcdf handles must not be used from more than one thread. Each worker
//! owns one [`HandleCache`], which opens a handle for the calling thread on
//! first use and keeps it for the rest of the worker's life. The cache is
//! neither `Send` nor `Sync`, so a handle it hands out cannot reach another
//! thread.

use crate::errors::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info};

/// Shared constructor for per-thread handles
pub type Opener<H> = Arc<dyn Fn(&Path) -> Result<H> + Send + Sync>;

/// Lazily opened handles keyed by the owning thread
pub struct HandleCache<H> {
    source: PathBuf,
    opener: Opener<H>,
    handles: HashMap<ThreadId, H>,
    opens: usize,
    _confined: PhantomData<Rc<()>>,
}

impl<H> HandleCache<H> {
    pub fn new(source: impl Into<PathBuf>, opener: Opener<H>) -> Self {
        Self {
            source: source.into(),
            opener,
            handles: HashMap::new(),
            opens: 0,
            _confined: PhantomData,
        }
    }

    /// The handle for the calling thread, opening it on first use.
    ///
    /// A failed open is not cached; the next call tries again.
    pub fn get_instance_for_current_thread(&mut self) -> Result<&H> {
        let current = thread::current();
        match self.handles.entry(current.id()) {
            Entry::Occupied(entry) => {
                debug!(thread = ?current.name(), "Re-using handle already opened for thread");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                info!(
                    thread = ?current.name(),
                    source = %self.source.display(),
                    "Opening new handle for thread"
                );
                let handle = (self.opener)(&self.source)?;
                self.opens += 1;
                Ok(entry.insert(handle))
            }
        }
    }

    /// Number of successful opens performed by this cache
    pub fn opens(&self) -> usize {
        self.opens
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NcJsonError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_second_call_reuses_handle() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let opener: Opener<usize> = Arc::new(move |_: &Path| Ok(seen.fetch_add(1, Ordering::SeqCst)));

        let mut cache = HandleCache::new("data.nc", opener);
        let first: *const usize = cache.get_instance_for_current_thread().unwrap();
        let second: *const usize = cache.get_instance_for_current_thread().unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(cache.opens(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_open_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let opener: Opener<&'static str> = Arc::new(move |_: &Path| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(NcJsonError::Worker("transient".into()))
            } else {
                Ok("open")
            }
        });

        let mut cache = HandleCache::new("data.nc", opener);
        assert!(cache.get_instance_for_current_thread().is_err());
        assert_eq!(cache.opens(), 0);
        assert_eq!(*cache.get_instance_for_current_thread().unwrap(), "open");
        assert_eq!(cache.opens(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_each_thread_opens_its_own() {
        let counter = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let seen = Arc::clone(&counter);
                thread::spawn(move || {
                    let opener: Opener<ThreadId> = Arc::new(move |_: &Path| {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(thread::current().id())
                    });
                    let mut cache = HandleCache::new("data.nc", opener);
                    let owner = *cache.get_instance_for_current_thread().unwrap();
                    cache.get_instance_for_current_thread().unwrap();
                    assert_eq!(owner, thread::current().id());
                    cache.opens()
                })
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap(), 1);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
