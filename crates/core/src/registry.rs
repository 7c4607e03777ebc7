use dashmap::DashMap;
use mediasoup::router::RouterOptions;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::codecs::media_codecs;
use crate::error::{CoreError, CoreResult};
use crate::room::Room;
use crate::worker_pool::WorkerPool;

/// Process-wide mapping `roomId -> Room`.
///
/// `get_or_create` is safe under concurrent callers for the same room id:
/// every caller registers (or finds) a `OnceCell` for that id through a
/// single synchronous `DashMap` operation, then races to initialize it.
/// Exactly one caller's Router-creation future actually runs; the rest
/// observe its result — a room exists the instant the first caller
/// registers its cell, before the Router is actually created.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<OnceCell<Arc<Room>>>>,
    worker_pool: Arc<WorkerPool>,
}

impl RoomRegistry {
    pub fn new(worker_pool: Arc<WorkerPool>) -> Self {
        Self {
            rooms: DashMap::new(),
            worker_pool,
        }
    }

    /// `getOrCreate(roomId)`: idempotent. Selects a worker, creates a
    /// Router configured with the fixed codec set, and inserts the Room.
    pub async fn get_or_create(&self, room_id: &str) -> CoreResult<Arc<Room>> {
        let cell = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| async {
            let worker = self.worker_pool.next_worker();
            let router_options = RouterOptions::new(media_codecs());
            let router = worker.create_router(router_options).await.map_err(|e| {
                CoreError::EngineFailed(format!("failed to create router: {e}"))
            })?;

            info!(room_id, "room created");
            Ok(Arc::new(Room::new(room_id.to_string(), router)))
        })
        .await
        .cloned()
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).and_then(|cell| cell.get().cloned())
    }

    /// Number of mediasoup workers backing this registry's rooms.
    pub fn worker_count(&self) -> usize {
        self.worker_pool.worker_count()
    }

    /// Removes the registry entry for a room whose peer set has just
    /// become empty. The caller must have already removed the departing
    /// peer from `room.peers` before calling this, and must hold no other
    /// reference to the Room once this returns — dropping the last `Arc`
    /// closes the Router.
    pub fn remove_if_empty(&self, room: &Arc<Room>) {
        if room.peer_count() == 0 {
            self.rooms.remove(&room.id);
            info!(room_id = %room.id, "room removed");
        }
    }
}
