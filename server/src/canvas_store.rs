use std::collections::HashMap;
use system::{CanvasSnapshot, RoomId};

/// Latest drawing snapshot per room. Writes overwrite unconditionally.
pub trait CanvasStore: Send {
    fn set(&mut self, room_id: &RoomId, snapshot: CanvasSnapshot);
    fn get(&self, room_id: &RoomId) -> Option<&CanvasSnapshot>;
    fn clear(&mut self, room_id: &RoomId);

    /// Drops the snapshot of a room nobody is in anymore.
    fn evict(&mut self, room_id: &RoomId) {
        self.clear(room_id)
    }
}

#[derive(Default)]
pub struct MemoryCanvasStore {
    snapshots: HashMap<RoomId, CanvasSnapshot>,
}

impl MemoryCanvasStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CanvasStore for MemoryCanvasStore {
    fn set(&mut self, room_id: &RoomId, snapshot: CanvasSnapshot) {
        self.snapshots.insert(room_id.clone(), snapshot);
    }

    fn get(&self, room_id: &RoomId) -> Option<&CanvasSnapshot> {
        self.snapshots.get(room_id)
    }

    fn clear(&mut self, room_id: &RoomId) {
        self.snapshots.remove(room_id);
    }
}
