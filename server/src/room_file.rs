use crate::room_directory::{Room, RoomStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use system::RoomId;
use tokio::fs;
use uuid::Uuid;

/// Keeps one `<uuid>.room.json` file per room inside a directory.
///
/// The file name is a v5 uuid of the room id, so arbitrary ids never touch the
/// file system as paths. New records are written to a temporary file and then
/// hard-linked into place, which fails if the name is already taken.
pub struct FileRoomStore {
    dir: PathBuf,
}

impl FileRoomStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        log::info!("Room records stored in {}", dir.display());
        Ok(Self { dir })
    }

    fn record_path(&self, room_id: &RoomId) -> PathBuf {
        let file_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, room_id.as_str().as_bytes());
        self.dir.join(format!("{}.room.json", file_id))
    }
}

#[async_trait]
impl RoomStore for FileRoomStore {
    async fn find_by_room_id(&self, room_id: &RoomId) -> Result<Option<Room>, StoreError> {
        let content = match fs::read(self.record_path(room_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let room: Room = serde_json::from_slice(&content)?;
        if &room.room_id != room_id {
            return Err(StoreError::Unavailable(format!(
                "record for {} holds room {}",
                room_id, room.room_id
            )));
        }
        Ok(Some(room))
    }

    async fn insert(&self, room: Room) -> Result<(), StoreError> {
        let path = self.record_path(&room.room_id);
        let tmp_path = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, serde_json::to_vec(&room)?).await?;

        let linked = fs::hard_link(&tmp_path, &path).await;
        if let Err(e) = fs::remove_file(&tmp_path).await {
            log::warn!("Failed to remove {}: {}", tmp_path.display(), e);
        }
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::DuplicateKey(room.room_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
