use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use system::{Credential, RoomId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: RoomId,
    pub credential: Credential,
}

impl Room {
    pub fn new(room_id: RoomId, credential: Credential) -> Self {
        Self {
            room_id,
            credential,
        }
    }

    pub fn accepts(&self, credential: &Credential) -> bool {
        &self.credential == credential
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room `{0}` already exists")]
    DuplicateKey(RoomId),
    #[error("room store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("room record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("room store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("room directory unavailable")]
    Unavailable(#[source] StoreError),
}

/// Durable room records keyed by room id.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn find_by_room_id(&self, room_id: &RoomId) -> Result<Option<Room>, StoreError>;

    /// Fails with [`StoreError::DuplicateKey`] when a record for the id exists.
    async fn insert(&self, room: Room) -> Result<(), StoreError>;
}

pub struct RoomDirectory {
    store: Box<dyn RoomStore>,
}

impl RoomDirectory {
    pub fn new(store: impl RoomStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub async fn lookup(&self, room_id: &RoomId) -> Result<Option<Room>, DirectoryError> {
        self.store
            .find_by_room_id(room_id)
            .await
            .map_err(DirectoryError::Unavailable)
    }

    /// Returns the existing room unchanged, or records a new one with `credential`.
    pub async fn create_if_absent(
        &self,
        room_id: &RoomId,
        credential: &Credential,
    ) -> Result<Room, DirectoryError> {
        if let Some(room) = self.lookup(room_id).await? {
            return Ok(room);
        }

        let room = Room::new(room_id.clone(), credential.clone());
        match self.store.insert(room.clone()).await {
            Ok(()) => {
                log::info!("Room {} created", room_id);
                Ok(room)
            }
            // Lost a race against another joiner; theirs is the credential now.
            Err(StoreError::DuplicateKey(_)) => match self.lookup(room_id).await? {
                Some(room) => Ok(room),
                None => Err(DirectoryError::Unavailable(StoreError::Unavailable(
                    format!("room {} vanished after duplicate insert", room_id),
                ))),
            },
            Err(e) => Err(DirectoryError::Unavailable(e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Room>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn find_by_room_id(&self, room_id: &RoomId) -> Result<Option<Room>, StoreError> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| StoreError::Unavailable("room map poisoned".into()))?;
        Ok(rooms.get(room_id).cloned())
    }

    async fn insert(&self, room: Room) -> Result<(), StoreError> {
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| StoreError::Unavailable("room map poisoned".into()))?;
        if rooms.contains_key(&room.room_id) {
            return Err(StoreError::DuplicateKey(room.room_id));
        }
        rooms.insert(room.room_id.clone(), room);
        Ok(())
    }
}
