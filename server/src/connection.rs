use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc::{error::TrySendError, Receiver};
use tokio::sync::oneshot;

use system::{
    decode_command, encode_event, ClientCommand, ConnectionId, IdentifiableCommand,
    IdentifiableEvent, JoinReply, ServerEvent,
};

use crate::config::ServerConfig;
use crate::connection_tx_storage::ConnectionTx;
use crate::server::ServerTx;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    IdentifiableCommand {
        from: ConnectionId,
        command: IdentifiableCommand,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    IdentifiableEvent(IdentifiableEvent),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    /// The server has not assigned an id yet; frames wait here.
    Idle(Vec<IdentifiableCommand>),
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
    buffer: usize,
    idle_timeout: Option<Duration>,
    heartbeat_interval: Duration,
    last_heartbeat: Instant,
    /// Dropped with the actor, which tells the relay task to report the disconnect.
    _alive: Option<oneshot::Sender<()>>,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, config: &ServerConfig) -> Self {
        Self {
            state: ConnectionState::Idle(Vec::new()),
            srv_tx,
            buffer: config.connection_buffer,
            idle_timeout: config.idle_timeout,
            heartbeat_interval: config.heartbeat_interval,
            last_heartbeat: Instant::now(),
            _alive: None,
        }
    }

    fn ingress(&mut self, bytes: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        self.last_heartbeat = Instant::now();
        log::debug!("Ingress size: {}", bytes.len());
        let command = match decode_command(bytes) {
            Ok(command) => command,
            Err(e) => {
                log::debug!("Dropping frame: {}", e);
                return;
            }
        };
        log::debug!("Ingress {:?}", command);
        match &mut self.state {
            ConnectionState::Idle(pending) => pending.push(command),
            ConnectionState::Connected(from) => {
                let from = *from;
                self.forward(from, command, ctx);
            }
        }
    }

    fn forward(
        &mut self,
        from: ConnectionId,
        command: IdentifiableCommand,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let rejected = match self
            .srv_tx
            .try_send(ConnectionCommand::IdentifiableCommand { from, command })
        {
            Ok(()) => return,
            Err(TrySendError::Full(rejected)) => {
                log::warn!("Server queue is full, dropped command of connection {}", from);
                rejected
            }
            Err(TrySendError::Closed(rejected)) => {
                log::warn!("Server is gone, dropped command of connection {}", from);
                rejected
            }
        };
        if let ConnectionCommand::IdentifiableCommand { command, .. } = rejected {
            if let Some(event) = rejection_reply(&command) {
                self.egress(event, ctx);
            }
        }
    }

    fn egress(&self, event: IdentifiableEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match encode_event(&event) {
            Ok(text) => ctx.text(text),
            Err(e) => log::error!("Failed to encode {:?}: {}", event, e),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = match self.idle_timeout {
            Some(timeout) => timeout,
            None => return,
        };
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > timeout {
                log::info!("Closing idle connection");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(self.buffer);

        if let Err(e) = self.srv_tx.try_send(ConnectionCommand::Connect { tx }) {
            log::error!("Server is not accepting connections: {}", e);
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();
        let (alive, actor_gone) = oneshot::channel();
        self._alive = Some(alive);
        let srv_tx = self.srv_tx.clone();

        tokio::spawn(async move {
            log::debug!("connection green thread - started");
            relay_events(rx, actor_gone, srv_tx, move |event| {
                addr.do_send(ConnectionActorMessage(event)).is_ok()
            })
            .await;
            log::debug!("connection green thread - terminated");
        });

        self.start_heartbeat(ctx);
    }
}

/// Hands server events to the actor until either side goes away, then
/// reports the disconnect of the id the server assigned.
async fn relay_events(
    mut rx: Receiver<ConnectionEvent>,
    mut actor_gone: oneshot::Receiver<()>,
    mut srv_tx: ServerTx,
    deliver: impl Fn(ConnectionEvent) -> bool,
) {
    let mut connection_id = None;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    if let ConnectionEvent::Connected { connection_id: id } = &event {
                        connection_id = Some(*id);
                    }
                    if !deliver(event) {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut actor_gone => break,
        }
    }
    if connection_id.is_none() {
        // The actor went away before its id arrived.
        while let Some(event) = rx.recv().await {
            if let ConnectionEvent::Connected { connection_id: id } = event {
                connection_id = Some(id);
                break;
            }
        }
    }
    if let Some(from) = connection_id {
        let _ = srv_tx.send(ConnectionCommand::Disconnect { from }).await;
    }
}

/// Reply owed to a client whose command never reached the server.
fn rejection_reply(command: &IdentifiableCommand) -> Option<IdentifiableEvent> {
    match command.command {
        ClientCommand::JoinRoom(_) => Some(IdentifiableEvent::by_myself(
            command.ack,
            ServerEvent::JoinResult(JoinReply::denied("Server error")),
        )),
        _ => None,
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => self.last_heartbeat = Instant::now(),
            Ok(ws::Message::Text(text)) => self.ingress(text.as_bytes(), ctx),
            Ok(ws::Message::Binary(bin)) => self.ingress(&bin, ctx),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(e) => {
                log::warn!("Websocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let connection_event = msg.0;
        log::debug!("Egress {:?}", connection_event);
        match connection_event {
            ConnectionEvent::Connected { connection_id } => {
                let state =
                    std::mem::replace(&mut self.state, ConnectionState::Connected(connection_id));
                if let ConnectionState::Idle(pending) = state {
                    for command in pending {
                        self.forward(connection_id, command, ctx);
                    }
                }
            }
            ConnectionEvent::IdentifiableEvent(event) => self.egress(event, ctx),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor::new(srv_tx.get_ref().clone(), config.get_ref()),
        &req,
        stream,
    )
}
