use crate::{
    codegen,
    error::StoreError,
    models::{LinkRecord, LinkStats, Snapshot},
};
use parking_lot::Mutex;
use std::collections::HashMap;

// ── State ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct State {
    long_to_short: HashMap<String, String>,
    short_to_record: HashMap<String, LinkRecord>,
    counter: u64,
    /// Set on every mutation, cleared when a snapshot is taken for flushing.
    dirty: bool,
}

impl State {
    /// Consume counter values until one encodes to a code that is not taken.
    ///
    /// A consistent store never loops more than once; the loop only matters
    /// when a snapshot carried a counter that lags behind its own codes.
    fn next_code(&mut self) -> Result<String, StoreError> {
        loop {
            self.counter = self
                .counter
                .checked_add(1)
                .ok_or(StoreError::CounterExhausted)?;
            let code = codegen::encode(self.counter);
            if !self.short_to_record.contains_key(&code) {
                return Ok(code);
            }
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut long_to_short: Vec<(String, String)> = self
            .long_to_short
            .iter()
            .map(|(long, short)| (long.clone(), short.clone()))
            .collect();
        long_to_short.sort();

        let mut short_to_record: Vec<(String, LinkRecord)> = self
            .short_to_record
            .iter()
            .map(|(short, record)| (short.clone(), record.clone()))
            .collect();
        short_to_record.sort_by(|a, b| a.0.cmp(&b.0));

        Snapshot {
            long_to_short,
            short_to_record,
            counter: self.counter,
        }
    }
}

// ── Link Store ─────────────────────────────────────────────────────────────

/// In-memory two-way mapping between long URLs and short codes.
///
/// Both maps, the counter and the dirty flag live behind a single mutex, so
/// every shorten / resolve is applied as one unit and a snapshot never sees
/// one map updated without the other. Entries are never removed.
#[derive(Debug, Default)]
pub struct LinkStore {
    state: Mutex<State>,
}

impl LinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted snapshot.
    ///
    /// `short_to_record` is authoritative: the long → short index is rebuilt
    /// from it and persisted pairs that disagree are dropped. If two records
    /// share a long URL, the shorter (then alphabetically smaller) code wins
    /// the index slot; both codes keep resolving. The restored store is clean.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let Snapshot {
            long_to_short: persisted_pairs,
            short_to_record,
            counter,
        } = snapshot;

        let short_to_record: HashMap<String, LinkRecord> = short_to_record.into_iter().collect();

        let mut codes: Vec<&String> = short_to_record.keys().collect();
        codes.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let mut long_to_short = HashMap::with_capacity(short_to_record.len());
        for code in codes {
            let long_url = &short_to_record[code].long_url;
            if long_to_short.contains_key(long_url) {
                tracing::warn!(
                    short_code = %code,
                    long_url = %long_url,
                    "Snapshot has more than one code for the same URL"
                );
                continue;
            }
            long_to_short.insert(long_url.clone(), code.clone());
        }

        let dropped = persisted_pairs
            .iter()
            .filter(|(long, short)| long_to_short.get(long) != Some(short))
            .count();
        if dropped > 0 || persisted_pairs.len() != long_to_short.len() {
            tracing::warn!(
                dropped,
                persisted = persisted_pairs.len(),
                rebuilt = long_to_short.len(),
                "Snapshot long → short index disagreed with its records; rebuilt from records"
            );
        }

        Self {
            state: Mutex::new(State {
                long_to_short,
                short_to_record,
                counter,
                dirty: false,
            }),
        }
    }

    /// Return the short code for `long_url`, creating one if needed.
    ///
    /// The URL is trimmed before validation and stored trimmed. Shortening
    /// a URL that is already known returns its existing code without
    /// consuming a counter value or touching its click count.
    pub fn shorten(&self, long_url: &str) -> Result<String, StoreError> {
        let url = long_url.trim();
        if !is_valid_url(url) {
            return Err(StoreError::InvalidUrl(long_url.to_owned()));
        }

        let mut state = self.state.lock();
        if let Some(code) = state.long_to_short.get(url) {
            return Ok(code.clone());
        }

        let code = state.next_code()?;
        let record = LinkRecord::new(url, now_millis());
        state.long_to_short.insert(url.to_owned(), code.clone());
        state.short_to_record.insert(code.clone(), record);
        state.dirty = true;

        Ok(code)
    }

    /// Look up a short code and count the visit.
    ///
    /// Returns `None` without touching any state when the code is unknown.
    pub fn resolve(&self, code: &str) -> Option<String> {
        let mut state = self.state.lock();
        let record = state.short_to_record.get_mut(code)?;
        record.clicks = record.clicks.saturating_add(1);
        let long_url = record.long_url.clone();
        state.dirty = true;
        Some(long_url)
    }

    /// Look up a short code without counting a visit.
    pub fn stats(&self, code: &str) -> Option<LinkStats> {
        let state = self.state.lock();
        state.short_to_record.get(code).map(|record| LinkStats {
            short_code: code.to_owned(),
            long_url: record.long_url.clone(),
            clicks: record.clicks,
            created_at: record.created_at,
        })
    }

    /// Last counter value issued (0 when nothing has been shortened).
    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }

    /// Number of links held.
    pub fn len(&self) -> usize {
        self.state.lock().short_to_record.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn mark_dirty(&self) {
        self.state.lock().dirty = true;
    }

    /// Copy the full state and clear the dirty flag in one step.
    pub fn take_snapshot(&self) -> Snapshot {
        let mut state = self.state.lock();
        state.dirty = false;
        state.to_snapshot()
    }

    /// Like [`take_snapshot`](Self::take_snapshot), but only when there are
    /// unsaved changes.
    pub fn take_dirty_snapshot(&self) -> Option<Snapshot> {
        let mut state = self.state.lock();
        if !state.dirty {
            return None;
        }
        state.dirty = false;
        Some(state.to_snapshot())
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Accepts `http://` or `https://` followed by at least one character.
/// Expects an already-trimmed string.
pub fn is_valid_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
