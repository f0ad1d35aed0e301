//! Proxy directory: catalogue loading, selection, quarantine, persistence.

use crate::config::AcquireConfig;
use crate::proxy::{CatalogueRow, Provenance, ProxyRecord};
use crate::stats::{UsageSnapshot, UsageStats};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Built-in endpoints used when the catalogue is missing or yields nothing.
/// These have no catalogue row and are never written back on persist.
const FALLBACK_ENDPOINTS: &[&str] = &[
    "socks5://184.178.172.25:15291",
    "socks5://72.195.34.58:4145",
    "socks5://98.178.72.21:10919",
    "socks5://192.111.137.35:4145",
    "socks5://174.77.111.196:4145",
    "socks5://208.102.51.6:58208",
    "socks5://68.71.249.153:48606",
    "socks5://199.58.185.9:4145",
];

/// Combined point-in-time view of the directory and its usage counters.
#[derive(Debug, Clone)]
pub struct DirectoryStats {
    /// All records in the directory.
    pub total_proxies: usize,
    /// Records currently outside the quarantine set.
    pub available_proxies: usize,
    /// Records currently quarantined.
    pub quarantined: usize,
    /// Request counters.
    pub usage: UsageSnapshot,
}

struct DirectoryState {
    /// All records, ascending by measured latency. Endpoint URIs are unique.
    records: Vec<ProxyRecord>,
    /// Endpoint URIs excluded from selection for the rest of the run.
    quarantine: HashSet<String>,
}

/// A directory of proxy endpoints with health tracking and persistence.
///
/// One mutex guards all mutable state; selection and mark-bad take it
/// briefly, the HTTP call itself always happens outside the lock.
pub struct ProxyDirectory {
    inner: Mutex<DirectoryState>,
    stats: UsageStats,
    /// Configuration the directory was created with.
    pub config: AcquireConfig,
}

impl ProxyDirectory {
    /// Load a directory from the configured catalogue, degrading to the
    /// built-in fallback list on any I/O or parse failure.
    pub fn new(config: AcquireConfig) -> Self {
        let records = load_records(&config);
        Self {
            inner: Mutex::new(DirectoryState {
                records,
                quarantine: HashSet::new(),
            }),
            stats: UsageStats::default(),
            config,
        }
    }

    /// Clear quarantine and health state, then re-read the catalogue.
    /// Returns the new record count. Used after the catalogue is refreshed
    /// out-of-band.
    pub fn reload(&self) -> usize {
        info!("Reloading proxy catalogue from {:?}", self.config.catalogue_path);
        let records = load_records(&self.config);
        let count = records.len();
        let mut state = self.inner.lock();
        state.quarantine.clear();
        state.records = records;
        info!("Reloaded {} proxy endpoints", count);
        count
    }

    /// Choose one live endpoint, or `None` only when the directory itself is
    /// empty. With `prefer_fast`, picks from the fastest third of candidates
    /// with the configured bias probability.
    pub fn select(&self, prefer_fast: bool) -> Option<ProxyRecord> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if state.records.is_empty() {
            warn!("No proxy endpoints loaded");
            return None;
        }

        let mut candidates: Vec<&ProxyRecord> = state
            .records
            .iter()
            .filter(|r| !state.quarantine.contains(&r.endpoint))
            .collect();

        if candidates.is_empty() {
            // Liveness over strict quarantine: an empty candidate set clears
            // the quarantine instead of starving the caller.
            warn!("All proxy endpoints quarantined, clearing quarantine set");
            state.quarantine.clear();
            candidates = state.records.iter().collect();
        }

        if candidates.len() < self.config.min_available_floor {
            warn!(
                "Running low on proxies: {} available (floor: {})",
                candidates.len(),
                self.config.min_available_floor
            );
        }

        let mut rng = rand::rng();
        let chosen = if prefer_fast && rng.random_bool(self.config.fast_bias) {
            // Records are kept sorted ascending by latency, so the fastest
            // third is a prefix.
            let top = (candidates.len() / 3).max(1);
            candidates[..top].choose(&mut rng)
        } else {
            candidates.choose(&mut rng)
        };

        chosen.map(|r| (*r).clone())
    }

    /// Quarantine an endpoint and flip its record to failed. Idempotent: a
    /// second call for the same endpoint is a no-op. Persists the catalogue
    /// when the record came from it; a persist failure never fails the mark.
    ///
    /// The rewrite happens under the state mutex so concurrent marks on a
    /// shared directory serialize their snapshots and temp-file writes.
    pub fn mark_bad(&self, endpoint: &str) {
        let mut state = self.inner.lock();
        if endpoint.is_empty() || state.quarantine.contains(endpoint) {
            return;
        }
        state.quarantine.insert(endpoint.to_string());
        self.stats.record_marked_bad();

        let remaining = state
            .records
            .iter()
            .filter(|r| !state.quarantine.contains(&r.endpoint))
            .count();
        info!(
            "Marked proxy as bad: {} ({} quarantined, {} remaining)",
            endpoint,
            state.quarantine.len(),
            remaining
        );

        let mut from_catalogue = false;
        if let Some(record) = state.records.iter_mut().find(|r| r.endpoint == endpoint) {
            record.mark_failed();
            from_catalogue = record.provenance == Provenance::Catalogue;
        }
        if from_catalogue {
            let rows = catalogue_rows(&state.records);
            if let Err(e) = write_catalogue(&self.config.catalogue_path, &rows) {
                error!("Failed to persist proxy catalogue: {}", e);
            }
        }
    }

    /// Atomically rewrite the catalogue with the current record states.
    /// Only catalogue-sourced records are written; a directory running
    /// purely on fallback endpoints writes nothing. Held under the state
    /// mutex, like the mark-bad rewrite, so writers never interleave.
    pub fn persist(&self) -> io::Result<()> {
        let state = self.inner.lock();
        let rows = catalogue_rows(&state.records);
        if rows.is_empty() {
            warn!("No catalogue-sourced proxies to persist (all from fallback)");
            return Ok(());
        }
        write_catalogue(&self.config.catalogue_path, &rows)
    }

    /// (total, available) endpoint counts.
    pub fn counts(&self) -> (usize, usize) {
        let state = self.inner.lock();
        let total = state.records.len();
        let available = state
            .records
            .iter()
            .filter(|r| !state.quarantine.contains(&r.endpoint))
            .count();
        (total, available)
    }

    /// Usage counters, written by the fetcher and `mark_bad`.
    pub fn usage(&self) -> &UsageStats {
        &self.stats
    }

    /// Empty the record set so tests can exercise the no-endpoints path.
    #[cfg(test)]
    pub(crate) fn clear_records_for_test(&self) {
        self.inner.lock().records.clear();
    }

    /// Combined directory and usage snapshot.
    pub fn stats(&self) -> DirectoryStats {
        let (total, available) = self.counts();
        DirectoryStats {
            total_proxies: total,
            available_proxies: available,
            quarantined: total - available,
            usage: self.stats.snapshot(),
        }
    }
}

/// Rows for every catalogue-sourced record, in directory order.
fn catalogue_rows(records: &[ProxyRecord]) -> Vec<CatalogueRow> {
    records.iter().filter_map(|r| r.row.clone()).collect()
}

/// Read eligible records from the catalogue, ascending by latency.
/// Non-throwing: every failure path degrades to the fallback list.
fn load_records(config: &AcquireConfig) -> Vec<ProxyRecord> {
    let path = &config.catalogue_path;
    if !path.exists() {
        warn!("Proxy catalogue not found: {:?}", path);
        return load_fallback(config);
    }

    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Error opening proxy catalogue {:?}: {}", path, e);
            return load_fallback(config);
        }
    };

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for result in reader.deserialize::<CatalogueRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                debug!("Skipping malformed catalogue row: {}", e);
                continue;
            }
        };
        // A catalogue written without a status column counts as working.
        let status = row.status.trim();
        if !status.is_empty() && status != "working" {
            continue;
        }
        if let Some(record) = ProxyRecord::from_row(row, config.max_requests_per_second) {
            if seen.insert(record.endpoint.clone()) {
                records.push(record);
            }
        }
    }

    if records.is_empty() {
        warn!("No working proxies found in catalogue: {:?}", path);
        return load_fallback(config);
    }

    records.sort_by(|a, b| {
        a.latency_ms
            .partial_cmp(&b.latency_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    info!(
        "Loaded {} working proxies from {:?} (fastest: {} at {}ms)",
        records.len(),
        path,
        records[0].endpoint,
        records[0].latency_ms
    );
    records
}

fn load_fallback(config: &AcquireConfig) -> Vec<ProxyRecord> {
    let records: Vec<ProxyRecord> = FALLBACK_ENDPOINTS
        .iter()
        .filter_map(|e| ProxyRecord::from_fallback(e, config.max_requests_per_second))
        .collect();
    warn!("Using {} built-in fallback proxies", records.len());
    records
}

/// Atomic catalogue rewrite: backup best-effort, write a temp file, rename
/// it over the original.
fn write_catalogue(path: &Path, rows: &[CatalogueRow]) -> io::Result<()> {
    if path.exists() {
        let backup = path.with_extension("csv.backup");
        if let Err(e) = fs::copy(path, &backup) {
            warn!("Could not back up proxy catalogue: {}", e);
        }
    }

    let temp = path.with_extension("csv.tmp");
    let result = (|| -> io::Result<()> {
        let mut writer = csv::Writer::from_path(&temp).map_err(io::Error::other)?;
        for row in rows {
            writer.serialize(row).map_err(io::Error::other)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&temp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    } else {
        let working = rows.iter().filter(|r| r.status == "working").count();
        info!(
            "Persisted proxy catalogue to {:?} (working: {}, failed: {})",
            path,
            working,
            rows.len() - working
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyStatus;
    use std::io::Write;

    fn catalogue(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("working_proxies.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "ip,port,country,city,isp,response_time_ms,status,tested_at"
        )
        .unwrap();
        write!(file, "{}", body).unwrap();
        path
    }

    fn config_for(path: std::path::PathBuf) -> AcquireConfig {
        AcquireConfig::builder()
            .catalogue_path(path)
            .min_available_floor(0)
            .build()
    }

    const THREE_ROWS: &str = "\
10.0.0.1,1080,US,Denver,NetA,300,working,2025-06-01T00:00:00Z
10.0.0.2,1080,DE,Berlin,NetB,120,working,2025-06-01T00:00:00Z
10.0.0.3,1080,FR,Paris,NetC,80,failed,2025-06-01T00:00:00Z
";

    #[test]
    fn load_sorts_ascending_and_skips_failed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ProxyDirectory::new(config_for(catalogue(&dir, THREE_ROWS)));

        let (total, available) = directory.counts();
        assert_eq!(total, 2); // the failed row is ineligible
        assert_eq!(available, 2);

        // Fastest first under full bias.
        let cfg = AcquireConfig::builder()
            .catalogue_path(dir.path().join("working_proxies.csv"))
            .min_available_floor(0)
            .fast_bias(1.0)
            .build();
        let directory = ProxyDirectory::new(cfg);
        let picked = directory.select(true).unwrap();
        assert_eq!(picked.endpoint, "socks5://10.0.0.2:1080");
    }

    #[test]
    fn missing_catalogue_degrades_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ProxyDirectory::new(config_for(dir.path().join("absent.csv")));
        let (total, _) = directory.counts();
        assert_eq!(total, FALLBACK_ENDPOINTS.len());
        let record = directory.select(false).unwrap();
        assert_eq!(record.provenance, Provenance::Fallback);
    }

    #[test]
    fn malformed_rows_are_skipped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
,1080,US,Denver,NetA,300,working,
10.0.0.2,,DE,Berlin,NetB,120,working,
10.0.0.3,1080,FR,Paris,NetC,80,working,
";
        let directory = ProxyDirectory::new(config_for(catalogue(&dir, body)));
        let (total, _) = directory.counts();
        assert_eq!(total, 1);
    }

    #[test]
    fn duplicate_identities_collapse_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
10.0.0.1,1080,US,Denver,NetA,300,working,
10.0.0.1,1080,US,Denver,NetA,250,working,
";
        let directory = ProxyDirectory::new(config_for(catalogue(&dir, body)));
        let (total, _) = directory.counts();
        assert_eq!(total, 1);
    }

    #[test]
    fn mark_bad_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ProxyDirectory::new(config_for(catalogue(&dir, THREE_ROWS)));

        directory.mark_bad("socks5://10.0.0.1:1080");
        directory.mark_bad("socks5://10.0.0.1:1080");

        let stats = directory.stats();
        assert_eq!(stats.usage.proxies_marked_bad, 1);
        assert_eq!(stats.available_proxies, 1);
        assert_eq!(stats.quarantined, 1);
    }

    #[test]
    fn quarantining_everything_self_heals_on_select() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ProxyDirectory::new(config_for(catalogue(&dir, THREE_ROWS)));

        directory.mark_bad("socks5://10.0.0.1:1080");
        directory.mark_bad("socks5://10.0.0.2:1080");
        let (_, available) = directory.counts();
        assert_eq!(available, 0);

        // Selection still returns a candidate and the quarantine is cleared.
        assert!(directory.select(true).is_some());
        let (_, available) = directory.counts();
        assert_eq!(available, 2);
    }

    #[test]
    fn select_none_only_when_directory_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = catalogue(&dir, THREE_ROWS);
        let directory = ProxyDirectory::new(config_for(path));
        {
            let mut state = directory.inner.lock();
            state.records.clear();
        }
        assert!(directory.select(true).is_none());
        assert!(directory.select(false).is_none());
    }

    #[test]
    fn persist_round_trip_excludes_marked_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = catalogue(&dir, THREE_ROWS);
        let directory = ProxyDirectory::new(config_for(path.clone()));

        // mark_bad on a catalogue record persists automatically.
        directory.mark_bad("socks5://10.0.0.2:1080");

        let reloaded = ProxyDirectory::new(config_for(path.clone()));
        let (total, _) = reloaded.counts();
        assert_eq!(total, 1);
        let survivor = reloaded.select(false).unwrap();
        assert_eq!(survivor.endpoint, "socks5://10.0.0.1:1080");
        assert_eq!(survivor.status, ProxyStatus::Working);
        // Opaque fields survived the rewrite.
        let row = survivor.row.as_ref().unwrap();
        assert_eq!(row.city, "Denver");
        assert_eq!(row.tested_at, "2025-06-01T00:00:00Z");

        // Backup of the prior file was attempted.
        assert!(path.with_extension("csv.backup").exists());
    }

    #[test]
    fn concurrent_marks_never_lose_a_persisted_failure() {
        use std::sync::Arc;
        use std::thread;

        let all_working = "\
10.0.0.1,1080,US,Denver,NetA,300,working,
10.0.0.2,1080,DE,Berlin,NetB,120,working,
10.0.0.3,1080,FR,Paris,NetC,80,working,
";
        // The race window is narrow, so hammer it.
        for round in 0..50 {
            let dir = tempfile::tempdir().unwrap();
            let path = catalogue(&dir, all_working);
            let directory = Arc::new(ProxyDirectory::new(config_for(path.clone())));

            let first = Arc::clone(&directory);
            let second = Arc::clone(&directory);
            let t1 = thread::spawn(move || first.mark_bad("socks5://10.0.0.1:1080"));
            let t2 = thread::spawn(move || second.mark_bad("socks5://10.0.0.2:1080"));
            t1.join().unwrap();
            t2.join().unwrap();

            let reloaded = ProxyDirectory::new(config_for(path));
            let (total, _) = reloaded.counts();
            assert_eq!(total, 1, "round {}: a rewrite dropped a failed mark", round);
            let survivor = reloaded.select(false).unwrap();
            assert_eq!(survivor.endpoint, "socks5://10.0.0.3:1080");
        }
    }

    #[test]
    fn reload_clears_quarantine_and_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let path = catalogue(&dir, THREE_ROWS);
        let directory = ProxyDirectory::new(config_for(path.clone()));

        directory.mark_bad("socks5://10.0.0.1:1080");
        // mark_bad rewrote the catalogue, so a reload sees one working row.
        let count = directory.reload();
        assert_eq!(count, 1);
        let stats = directory.stats();
        assert_eq!(stats.quarantined, 0);
    }

    #[test]
    fn fallback_records_are_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let directory = ProxyDirectory::new(config_for(path.clone()));
        directory.mark_bad("socks5://184.178.172.25:15291");
        directory.persist().unwrap();
        assert!(!path.exists());
    }
}
