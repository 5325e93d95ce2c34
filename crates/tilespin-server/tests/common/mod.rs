use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tilespin_core::net::messages::{
    AssetPublishedMsg, ClientMessage, InitAckMsg, RotateMsg, ServerMessage, StartRoundMsg,
};
use tilespin_core::net::protocol::{decode_server_message, encode_client_message};
use tilespin_core::{GameSession, PlayerId, Puzzle};

use tilespin_server::build_app_with;
use tilespin_server::config::ServerConfig;
use tilespin_server::session_manager::SessionManager;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.limits.ws_rate_limit_per_sec = 1000.0;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub asset_dir: tempfile::TempDir,
    _web_root: tempfile::TempDir,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Default limits, except a rate limit high enough that solving a whole
    /// puzzle in a burst is never throttled.
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    pub async fn with_max_connections(max: usize) -> Self {
        let mut config = test_config();
        config.limits.max_ws_connections = max;
        Self::from_config(config).await
    }

    pub async fn with_max_upload(max: usize) -> Self {
        let mut config = test_config();
        config.assets.max_upload_bytes = max;
        Self::from_config(config).await
    }

    /// Start a server on an ephemeral port with private asset and web
    /// directories and a deterministic session.
    pub async fn from_config(mut config: ServerConfig) -> Self {
        let asset_dir = tempfile::tempdir().unwrap();
        let web_root = tempfile::tempdir().unwrap();
        std::fs::write(web_root.path().join("index.html"), "<h1>tilespin</h1>").unwrap();
        config.assets.dir = asset_dir.path().to_string_lossy().into_owned();
        config.web_root = web_root.path().to_string_lossy().into_owned();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let manager = SessionManager::with_session(GameSession::with_seed(7));
        let (app, _state) = build_app_with(config, manager);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            asset_dir,
            _web_root: web_root,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn observer_url(&self) -> String {
        format!("ws://{}/ws?role=observer", self.addr)
    }

    /// Whether the file behind a public `/assets/...` URL is on disk.
    pub fn asset_stored(&self, asset_url: &str) -> bool {
        let file_name = asset_url.trim_start_matches("/assets/");
        self.asset_dir.path().join(file_name).is_file()
    }

    pub fn stored_asset_count(&self) -> usize {
        std::fs::read_dir(self.asset_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Connect as a player and consume the init-ack and the leaderboard that
/// follows it. Returns the ack.
pub async fn ws_join(server: &TestServer) -> (WsStream, InitAckMsg) {
    let mut stream = ws_connect(&server.ws_url()).await;
    let ack = expect_init_ack(&mut stream).await;
    assert!(matches!(
        ws_read_server_msg(&mut stream).await,
        ServerMessage::Leaderboard(_)
    ));
    (stream, ack)
}

/// Connect as an observer and consume its init-ack and leaderboard.
pub async fn ws_observe(server: &TestServer) -> (WsStream, InitAckMsg) {
    let mut stream = ws_connect(&server.observer_url()).await;
    let ack = expect_init_ack(&mut stream).await;
    assert!(matches!(
        ws_read_server_msg(&mut stream).await,
        ServerMessage::Leaderboard(_)
    ));
    (stream, ack)
}

pub async fn expect_init_ack(stream: &mut WsStream) -> InitAckMsg {
    match ws_read_server_msg(stream).await {
        ServerMessage::InitAck(ack) => ack,
        other => panic!("Expected InitAck, got: {other:?}"),
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read messages until one matches `pred`, returning it.
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

/// Read until nothing arrives for `quiet_ms`, returning everything seen.
pub async fn ws_drain(stream: &mut WsStream, quiet_ms: u64) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Some(data) = ws_try_read_raw(stream, quiet_ms).await {
        out.push(decode_server_message(&data).unwrap());
    }
    out
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

pub async fn ws_publish_asset(stream: &mut WsStream, asset_url: &str) {
    let msg = ClientMessage::AssetPublished(AssetPublishedMsg {
        asset_url: asset_url.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
}

pub async fn ws_start_round(stream: &mut WsStream) {
    ws_send_client_msg(stream, &ClientMessage::StartRound(StartRoundMsg {})).await;
}

pub async fn ws_rotate(stream: &mut WsStream, player_id: PlayerId, tile_index: u32) {
    let msg = ClientMessage::Rotate(RotateMsg {
        player_id,
        tile_index,
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Read until this player's puzzle-update arrives.
pub async fn ws_expect_puzzle(stream: &mut WsStream) -> Puzzle {
    match ws_read_until(stream, |m| matches!(m, ServerMessage::PuzzleUpdate(_))).await {
        ServerMessage::PuzzleUpdate(update) => update.puzzle,
        _ => unreachable!(),
    }
}

/// Every (tile, repeat) rotation needed to bring `puzzle` to solved.
pub fn solving_moves(puzzle: &Puzzle) -> Vec<u32> {
    let mut moves = Vec::new();
    for (index, &value) in puzzle.rotations().iter().enumerate() {
        for _ in 0..(4 - value) % 4 {
            moves.push(index as u32);
        }
    }
    moves
}
