//! Client-side progress sync support.
//!
//! The server persists one position per book (see the progress handlers);
//! these helpers are the piece embedded in reader clients: a trailing-edge
//! debouncer that collapses bursts of page turns into at most one write per
//! window, and an on-device fallback cache for writes that failed on the
//! network, replayed on the next successful sync.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One position update: locator plus completion percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Position locator (EPUB CFI), opaque to this system.
    pub cfi: String,
    /// Completion percentage in [0, 100].
    pub percentage: f64,
}

/// Validate a completion percentage. NaN and out-of-range values are
/// rejected so stored records always stay inside [0, 100].
pub fn validate_percentage(percentage: f64) -> Result<()> {
    if percentage.is_nan() || !(0.0..=100.0).contains(&percentage) {
        return Err(AppError::Validation(format!(
            "Percentage must be a number between 0 and 100, got {}",
            percentage
        )));
    }
    Ok(())
}

/// Trailing-edge debouncer for progress writes.
///
/// Every navigation event is recorded; nothing is written until the window
/// elapses, at which point the latest recorded update is flushed. A burst
/// of events therefore produces exactly one write, last value winning.
#[derive(Debug)]
pub struct ProgressDebouncer {
    window: Duration,
    pending: Option<ProgressUpdate>,
    deadline: Option<Instant>,
}

impl ProgressDebouncer {
    /// Create a debouncer with the given flush window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    /// Record an update, overwriting any pending one. The first record of
    /// a burst arms the flush deadline; later records do not push it back.
    pub fn record(&mut self, update: ProgressUpdate, now: Instant) {
        self.pending = Some(update);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// Take the pending update if the window has elapsed.
    pub fn flush_due(&mut self, now: Instant) -> Option<ProgressUpdate> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Whether an update is waiting to be flushed.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// On-device cache for progress writes that failed on the network.
///
/// One JSON file per book under the cache directory; `take` removes the
/// file so each cached update is replayed at most once.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Open the cache, creating its directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, book_id: &str) -> Result<PathBuf> {
        if book_id.is_empty()
            || !book_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(AppError::Validation(format!("Invalid book id: {}", book_id)));
        }
        Ok(self.dir.join(format!("{}.json", book_id)))
    }

    /// Save an update that could not be written to the server.
    pub fn save(&self, book_id: &str, update: &ProgressUpdate) -> Result<()> {
        let path = self.path_for(book_id)?;
        let json = serde_json::to_string(update)
            .map_err(|e| AppError::Internal(format!("Failed to encode update: {}", e)))?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// Take the cached update for a book, removing it from the cache.
    pub fn take(&self, book_id: &str) -> Result<Option<ProgressUpdate>> {
        let path = self.path_for(book_id)?;
        let json = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        std::fs::remove_file(&path)?;

        let update = serde_json::from_str(&json)
            .map_err(|e| AppError::Internal(format!("Failed to decode cached update: {}", e)))?;
        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(cfi: &str, percentage: f64) -> ProgressUpdate {
        ProgressUpdate {
            cfi: cfi.to_string(),
            percentage,
        }
    }

    #[test]
    fn percentage_validation() {
        assert!(validate_percentage(0.0).is_ok());
        assert!(validate_percentage(55.0).is_ok());
        assert!(validate_percentage(100.0).is_ok());
        assert!(validate_percentage(150.0).is_err());
        assert!(validate_percentage(-1.0).is_err());
        assert!(validate_percentage(f64::NAN).is_err());
    }

    #[test]
    fn debouncer_collapses_burst_to_last_value() {
        let mut deb = ProgressDebouncer::new(Duration::from_secs(1));
        let t0 = Instant::now();

        deb.record(update("epubcfi(/6/2!/4/2)", 10.0), t0);
        deb.record(update("epubcfi(/6/4!/4/2)", 12.0), t0 + Duration::from_millis(100));

        // Nothing flushes inside the window.
        assert_eq!(deb.flush_due(t0 + Duration::from_millis(500)), None);

        // One write after the window, last value winning.
        let flushed = deb.flush_due(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(flushed.cfi, "epubcfi(/6/4!/4/2)");
        assert_eq!(flushed.percentage, 12.0);

        // Nothing left.
        assert_eq!(deb.flush_due(t0 + Duration::from_secs(2)), None);
        assert!(!deb.has_pending());
    }

    #[test]
    fn debouncer_rearms_after_flush() {
        let mut deb = ProgressDebouncer::new(Duration::from_secs(1));
        let t0 = Instant::now();

        deb.record(update("a", 1.0), t0);
        assert!(deb.flush_due(t0 + Duration::from_secs(1)).is_some());

        // A later burst arms a fresh deadline relative to its own start.
        let t1 = t0 + Duration::from_secs(5);
        deb.record(update("b", 2.0), t1);
        assert_eq!(deb.flush_due(t1 + Duration::from_millis(900)), None);
        assert_eq!(deb.flush_due(t1 + Duration::from_secs(1)).unwrap().cfi, "b");
    }

    #[test]
    fn local_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::open(dir.path()).unwrap();

        assert!(cache.take("book-1").unwrap().is_none());

        cache.save("book-1", &update("epubcfi(/6/4!/4/2)", 55.0)).unwrap();
        let cached = cache.take("book-1").unwrap().unwrap();
        assert_eq!(cached.cfi, "epubcfi(/6/4!/4/2)");
        assert_eq!(cached.percentage, 55.0);

        // Taken once, gone after.
        assert!(cache.take("book-1").unwrap().is_none());
    }

    #[test]
    fn local_cache_rejects_bad_ids() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::open(dir.path()).unwrap();

        assert!(cache.save("../evil", &update("a", 1.0)).is_err());
        assert!(cache.save("", &update("a", 1.0)).is_err());
    }
}
