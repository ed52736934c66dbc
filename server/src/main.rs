use actix_cors::Cors;
use actix_web::{App, HttpServer};
use anyhow::Context;

use server::canvas_store::MemoryCanvasStore;
use server::config::ServerConfig;
use server::handlers;
use server::room_directory::{MemoryRoomStore, RoomDirectory};
use server::room_file::FileRoomStore;
use server::server::spawn_server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env()?;
    let directory = match &config.rooms_dir {
        Some(dir) => RoomDirectory::new(
            FileRoomStore::open(dir)
                .await
                .with_context(|| format!("cannot open room store at {}", dir.display()))?,
        ),
        None => {
            log::warn!("WHITEBOARD_ROOMS_DIR is not set, rooms are kept in memory only");
            RoomDirectory::new(MemoryRoomStore::new())
        }
    };

    let srv_tx = spawn_server(directory, Box::new(MemoryCanvasStore::new()));

    let bind = config.bind;
    log::info!("Listening on {}", bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .data(srv_tx.clone())
            .data(config.clone())
            .configure(handlers::root)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
