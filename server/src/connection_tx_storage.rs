use crate::connection::ConnectionEvent;
use std::collections::HashMap;
use system::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Never waits: a connection that cannot keep up loses the event, the
    /// others are unaffected.
    pub fn send(&mut self, to: ConnectionId, message: ConnectionEvent) {
        if let Some(tx) = self.connection_txs.get_mut(&to) {
            match tx.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) => {
                    log::warn!("Connection {} is lagging, dropped {:?}", to, message);
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("Connection {} already closed", to);
                }
            }
        } else {
            log::debug!("No connection {} to send to", to);
        }
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(&connection_id)
    }
}
