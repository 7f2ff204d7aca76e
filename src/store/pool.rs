use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::limits::*;
use crate::model::{Event, PoolState, PoolSummary, SeatId, SeatRecord};
use crate::wal::Wal;

use super::{SeatStore, StoreError, normalize_city};

pub type SharedPoolState = Arc<RwLock<PoolState>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// WAL-backed in-memory seat store. One `PoolState` per city behind its own
/// RwLock: finds take read snapshots, the conditional transition takes the
/// write lock, so commits on one city serialize while other cities proceed
/// in parallel. Every mutation is WAL-appended before it is applied.
pub struct PoolStore {
    pools: DashMap<String, SharedPoolState>,
    wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply an event directly to a PoolState (no locking — caller holds the lock).
fn apply_to_pool(pool: &mut PoolState, event: &Event) {
    match event {
        Event::SeatsAdded { id_nos, .. } => {
            for &id_no in id_nos {
                pool.insert_seat(id_no);
            }
        }
        Event::RangeBooked { start, end, .. } => {
            pool.book_range(*start, *end);
        }
        // PoolCreated is handled at the DashMap level, not here
        Event::PoolCreated { .. } => {}
    }
}

impl PoolStore {
    pub fn open(wal_path: &Path) -> io::Result<Self> {
        let events = Wal::replay(wal_path)?;
        let wal = Wal::open(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            pools: DashMap::new(),
            wal_tx,
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never use blocking_write here because open may
        // run inside an async context.
        for event in &events {
            match event {
                Event::PoolCreated { city, id_nos } => {
                    let mut pool = PoolState::new(city.clone());
                    for &id_no in id_nos {
                        pool.insert_seat(id_no);
                    }
                    store.pools.insert(city.clone(), Arc::new(RwLock::new(pool)));
                }
                other => {
                    if let Some(entry) = store.pools.get(other.city()) {
                        let pool = entry.value().clone();
                        let mut guard = pool.try_write().expect("replay: uncontended write");
                        apply_to_pool(&mut guard, other);
                    }
                }
            }
        }

        metrics::gauge!(crate::observability::POOLS_ACTIVE).set(store.pools.len() as f64);
        Ok(store)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    fn get_pool(&self, city: &str) -> Option<SharedPoolState> {
        self.pools.get(city).map(|e| e.value().clone())
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state: one PoolCreated per pool plus one
    /// RangeBooked per maximal booked run.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let mut events = Vec::new();
        let mut cities: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();
        cities.sort();

        for city in cities {
            let Some(pool) = self.get_pool(&city) else {
                continue;
            };
            let guard = pool.read().await;
            events.push(Event::PoolCreated {
                city: guard.city.clone(),
                id_nos: guard.seats.keys().copied().collect(),
            });
            for (start, end) in guard.booked_runs() {
                events.push(Event::RangeBooked {
                    booking_ref: Ulid::new(),
                    city: guard.city.clone(),
                    start,
                    end,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl SeatStore for PoolStore {
    async fn list_seats(&self, city: &str) -> Result<Vec<SeatRecord>, StoreError> {
        let city = normalize_city(city)?;
        let pool = self
            .get_pool(&city)
            .ok_or(StoreError::PoolNotFound(city))?;
        let guard = pool.read().await;
        Ok(guard.records())
    }

    async fn conditional_book(
        &self,
        city: &str,
        id_min: SeatId,
        id_max: SeatId,
        booking_ref: Ulid,
    ) -> Result<u64, StoreError> {
        let city = normalize_city(city)?;
        let pool = self
            .get_pool(&city)
            .ok_or(StoreError::PoolNotFound(city.clone()))?;

        // Write lock held across the WAL append: the transition is atomic
        // relative to every other conditional_book on this pool, and state is
        // re-checked here, not trusted from any earlier snapshot.
        let mut guard = pool.write().await;
        if guard.bookable_in_range(id_min, id_max) == 0 {
            return Ok(0);
        }
        let event = Event::RangeBooked {
            booking_ref,
            city,
            start: id_min,
            end: id_max,
        };
        self.wal_append(&event).await?;
        Ok(guard.book_range(id_min, id_max))
    }

    async fn create_pool(&self, city: &str, id_nos: &[SeatId]) -> Result<String, StoreError> {
        let city = normalize_city(city)?;
        if self.pools.len() >= MAX_POOLS {
            return Err(StoreError::LimitExceeded("too many pools"));
        }
        if id_nos.len() > MAX_SEED_BATCH {
            return Err(StoreError::LimitExceeded("seed batch too large"));
        }

        let mut ids = id_nos.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() > MAX_SEATS_PER_POOL {
            return Err(StoreError::LimitExceeded("too many seats in pool"));
        }

        // Reserve the key before the WAL await: a concurrent create for the
        // same city must lose with PoolExists, not silently replace this
        // pool. The write guard stays held until the seats are applied so
        // readers never observe a half-built pool.
        let pool: SharedPoolState = Arc::new(RwLock::new(PoolState::new(city.clone())));
        let mut guard = pool
            .clone()
            .try_write_owned()
            .expect("new pool: uncontended write");
        match self.pools.entry(city.clone()) {
            Entry::Occupied(_) => return Err(StoreError::PoolExists(city)),
            Entry::Vacant(slot) => {
                slot.insert(pool);
            }
        }

        let event = Event::PoolCreated {
            city: city.clone(),
            id_nos: ids.clone(),
        };
        if let Err(e) = self.wal_append(&event).await {
            self.pools.remove(&city);
            return Err(e);
        }

        for id_no in ids {
            guard.insert_seat(id_no);
        }
        drop(guard);
        metrics::gauge!(crate::observability::POOLS_ACTIVE).set(self.pools.len() as f64);
        Ok(city)
    }

    async fn add_seats(&self, city: &str, id_nos: &[SeatId]) -> Result<u64, StoreError> {
        let city = normalize_city(city)?;
        if id_nos.len() > MAX_SEED_BATCH {
            return Err(StoreError::LimitExceeded("seed batch too large"));
        }
        let pool = self
            .get_pool(&city)
            .ok_or(StoreError::PoolNotFound(city.clone()))?;

        let mut guard = pool.write().await;

        let mut ids = id_nos.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids.retain(|id_no| !guard.seats.contains_key(id_no));
        if ids.is_empty() {
            return Ok(0);
        }
        if guard.seats.len() + ids.len() > MAX_SEATS_PER_POOL {
            return Err(StoreError::LimitExceeded("too many seats in pool"));
        }

        let added = ids.len() as u64;
        let event = Event::SeatsAdded { city, id_nos: ids };
        self.wal_append(&event).await?;
        apply_to_pool(&mut guard, &event);
        Ok(added)
    }

    async fn pool_summaries(&self) -> Result<Vec<PoolSummary>, StoreError> {
        let mut summaries = Vec::with_capacity(self.pools.len());
        let pools: Vec<SharedPoolState> = self.pools.iter().map(|e| e.value().clone()).collect();
        for pool in pools {
            let guard = pool.read().await;
            summaries.push(guard.summary());
        }
        summaries.sort_by(|a, b| a.city.cmp(&b.city));
        Ok(summaries)
    }
}
