//! End-to-end tests against an in-process deck server.
//!
//! The mock server speaks the real wire protocol over axum websockets:
//! snapshots broadcast to every viewer, count pulls answered directly, and
//! pongs that can be muted to simulate a dead peer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::any;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use decksync_client::{
    ClientConfig, ConnectionUpdate, Event, ServerError, SessionClient, StateUpdate, Subscription,
};
use decksync_core::{
    ActionKind, Card, ConnectionStatus, GameState, Intent, LastAction, ReconnectPolicy, ServerEvent,
};

const TIMEOUT: Duration = Duration::from_secs(5);

// ── Mock deck server ──

struct DeckServerState {
    initial_deck: Vec<Card>,
    game: Mutex<GameState>,
    viewers: AtomicU32,
    total_upgrades: AtomicU32,
    respond_pongs: AtomicBool,
    received: Mutex<Vec<serde_json::Value>>,
    updates: broadcast::Sender<String>,
}

struct DeckServer {
    addr: SocketAddr,
    state: Arc<DeckServerState>,
}

impl DeckServer {
    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn viewers(&self) -> u32 {
        self.state.viewers.load(Ordering::SeqCst)
    }

    fn upgrades(&self) -> u32 {
        self.state.total_upgrades.load(Ordering::SeqCst)
    }

    fn received_of_type(&self, frame_type: &str) -> usize {
        self.state
            .received
            .lock()
            .iter()
            .filter(|value| value.get("type").and_then(|t| t.as_str()) == Some(frame_type))
            .count()
    }

    fn clear_received(&self) {
        self.state.received.lock().clear();
    }

    fn mute_pongs(&self) {
        self.state.respond_pongs.store(false, Ordering::SeqCst);
    }

    /// Broadcast an arbitrary snapshot to every connected viewer.
    fn push_state(&self, snapshot: &GameState) {
        let frame = serde_json::to_string(&ServerEvent::StateUpdate(snapshot.clone())).unwrap();
        let _ = self.state.updates.send(frame);
    }

    /// Broadcast a user-visible error to every connected viewer.
    fn push_error(&self, message: &str) {
        let frame = serde_json::to_string(&ServerEvent::Error {
            message: message.to_string(),
        })
        .unwrap();
        let _ = self.state.updates.send(frame);
    }
}

fn card(id: &str, name: &str) -> Card {
    Card {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{name} description"),
        image_url: "https://picsum.photos/id/1/400/300".to_string(),
        attributes: HashMap::new(),
    }
}

fn initial_deck() -> Vec<Card> {
    vec![
        card("card-1", "Dragon"),
        card("card-2", "Goblin"),
        card("card-3", "Knight"),
    ]
}

fn fresh_game(deck: &[Card]) -> GameState {
    GameState {
        cards: deck.to_vec(),
        drawn_cards: vec![],
        discard_pile: vec![],
        peeked_cards: vec![],
        last_action: LastAction::default(),
    }
}

async fn boot_server() -> DeckServer {
    let deck = initial_deck();
    let (updates, _) = broadcast::channel(64);
    let state = Arc::new(DeckServerState {
        game: Mutex::new(fresh_game(&deck)),
        initial_deck: deck,
        viewers: AtomicU32::new(0),
        total_upgrades: AtomicU32::new(0),
        respond_pongs: AtomicBool::new(true),
        received: Mutex::new(Vec::new()),
        updates,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/ws", any(upgrade_handler))
        .with_state(Arc::clone(&state));
    drop(tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    }));

    DeckServer { addr, state }
}

async fn upgrade_handler(
    State(state): State<Arc<DeckServerState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| viewer_session(socket, state))
}

fn encode(event: &ServerEvent) -> String {
    serde_json::to_string(event).unwrap()
}

fn broadcast_count(state: &DeckServerState) {
    let connections = state.viewers.load(Ordering::SeqCst);
    let _ = state.updates.send(encode(&ServerEvent::ConnectionUpdate { connections }));
}

fn broadcast_snapshot(state: &DeckServerState) {
    let snapshot = state.game.lock().clone();
    let _ = state.updates.send(encode(&ServerEvent::StateUpdate(snapshot)));
}

fn apply_draw(game: &mut GameState) -> Result<(), String> {
    if game.cards.is_empty() {
        return Err("No cards left to draw".to_string());
    }
    let drawn = game.cards.remove(0);
    game.drawn_cards.push(drawn.clone());
    game.last_action = LastAction {
        kind: ActionKind::Draw,
        card: Some(drawn),
    };
    Ok(())
}

async fn viewer_session(socket: WebSocket, state: Arc<DeckServerState>) {
    let _ = state.total_upgrades.fetch_add(1, Ordering::SeqCst);
    let _ = state.viewers.fetch_add(1, Ordering::SeqCst);
    let mut updates = state.updates.subscribe();
    broadcast_count(&state);

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(frame) => {
                        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            frame = ws_rx.next() => {
                let Some(Ok(Message::Text(text))) = frame else { break };
                let Ok(value) = serde_json::from_str::<serde_json::Value>(text.as_str()) else {
                    continue;
                };
                state.received.lock().push(value.clone());
                let reply = handle_frame(&state, &value);
                if let Some(reply) = reply {
                    if ws_tx.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let _ = state.viewers.fetch_sub(1, Ordering::SeqCst);
    broadcast_count(&state);
}

/// Returns a direct reply frame for this socket, if the message calls for
/// one. State changes broadcast to everyone as a side effect.
fn handle_frame(state: &DeckServerState, value: &serde_json::Value) -> Option<String> {
    let frame_type = value.get("type").and_then(|t| t.as_str())?;
    match frame_type {
        "ping" => state
            .respond_pongs
            .load(Ordering::SeqCst)
            .then(|| encode(&ServerEvent::Pong)),
        "getConnectionCount" | "requestConnectionCount" => {
            let connections = state.viewers.load(Ordering::SeqCst);
            Some(encode(&ServerEvent::ConnectionUpdate { connections }))
        }
        "message" => {
            let intent = value
                .get("payload")
                .and_then(|payload| payload.get("type"))
                .and_then(|t| t.as_str())?;
            let error = match intent {
                "draw" => apply_draw(&mut state.game.lock()).err(),
                "reset" => {
                    *state.game.lock() = fresh_game(&state.initial_deck);
                    None
                }
                // Anything else just re-broadcasts the authoritative state.
                _ => None,
            };
            if let Some(message) = error {
                return Some(encode(&ServerEvent::Error { message }));
            }
            broadcast_snapshot(state);
            None
        }
        _ => None,
    }
}

// ── Client helpers ──

fn fast_config(url: String) -> ClientConfig {
    ClientConfig {
        url,
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 500,
        },
        keepalive_interval_ms: 200,
        poll_interval_ms: 200,
        connect_timeout_ms: 2000,
    }
}

fn subscribe_channel<E>(
    client: &SessionClient,
) -> (Subscription, mpsc::UnboundedReceiver<E::Payload>)
where
    E: Event,
    E::Payload: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = client.subscribe::<E>(move |payload| {
        let _ = tx.send(payload.clone());
    });
    (subscription, rx)
}

async fn next_payload<P>(rx: &mut mpsc::UnboundedReceiver<P>) -> P {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting until {what}");
}

async fn connected_client(server: &DeckServer) -> SessionClient {
    let client = SessionClient::new(fast_config(server.url()));
    client.connect();
    {
        let client = client.clone();
        wait_until("the client is connected", move || {
            client.connection_state().status == ConnectionStatus::Connected
        })
        .await;
    }
    client
}

// ── Tests ──

#[tokio::test]
async fn connecting_pulls_the_viewer_count_immediately() {
    let server = boot_server().await;
    let client = SessionClient::new(fast_config(server.url()));
    let (_sub, mut counts) = subscribe_channel::<ConnectionUpdate>(&client);

    client.connect();
    assert_eq!(next_payload(&mut counts).await, 1);
    {
        let server_ref = &server;
        wait_until("the count pull reaches the server", move || {
            server_ref.received_of_type("getConnectionCount") == 1
        })
        .await;
    }
    assert_eq!(client.connection_state().active_connections, 1);
}

#[tokio::test]
async fn a_draw_intent_round_trips_into_a_snapshot() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    let (_sub, mut snapshots) = subscribe_channel::<StateUpdate>(&client);

    client.send(Intent::Draw);

    let snapshot = next_payload(&mut snapshots).await;
    assert_eq!(snapshot.cards.len(), 2);
    assert_eq!(snapshot.drawn_cards.len(), 1);
    assert_eq!(snapshot.drawn_cards[0].id, "card-1");
    assert_eq!(snapshot.last_action.kind, ActionKind::Draw);
    assert_eq!(client.latest_state(), Some(snapshot));
}

#[tokio::test]
async fn pushed_snapshots_replace_the_previous_one_wholesale() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    let (_sub, mut snapshots) = subscribe_channel::<StateUpdate>(&client);

    let first = fresh_game(&[card("card-1", "Dragon"), card("card-2", "Goblin")]);
    let second = fresh_game(&[card("card-9", "Wizard")]);
    server.push_state(&first);
    assert_eq!(next_payload(&mut snapshots).await, first);

    server.push_state(&second);
    let replacement = next_payload(&mut snapshots).await;
    assert_eq!(replacement, second);
    assert!(replacement.cards.iter().all(|c| c.id != "card-1"));
    assert_eq!(client.latest_state(), Some(second));
}

#[tokio::test]
async fn a_second_viewer_raises_the_count_for_the_first() {
    let server = boot_server().await;
    let first = connected_client(&server).await;
    let (_sub, mut counts) = subscribe_channel::<ConnectionUpdate>(&first);

    let second = connected_client(&server).await;
    {
        let mut latest = 0;
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        while latest != 2 {
            assert!(tokio::time::Instant::now() < deadline, "never saw a count of 2");
            latest = next_payload(&mut counts).await;
        }
    }
    second.disconnect();
}

#[tokio::test]
async fn server_errors_pass_through_verbatim() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    let (_sub, mut errors) = subscribe_channel::<ServerError>(&client);

    server.push_error("Deck is being reshuffled");
    assert_eq!(next_payload(&mut errors).await, "Deck is being reshuffled");
    assert_eq!(
        client.connection_state().last_error.as_deref(),
        Some("Deck is being reshuffled")
    );
}

#[tokio::test]
async fn an_empty_deck_draw_reports_a_server_error() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    let (_sub, mut errors) = subscribe_channel::<ServerError>(&client);
    let (_snap_sub, mut snapshots) = subscribe_channel::<StateUpdate>(&client);

    for _ in 0..3 {
        client.send(Intent::Draw);
        let _ = next_payload(&mut snapshots).await;
    }
    client.send(Intent::Draw);
    assert_eq!(next_payload(&mut errors).await, "No cards left to draw");
}

#[tokio::test]
async fn disconnect_closes_the_socket_and_goes_quiet() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    {
        let server_ref = &server;
        wait_until("the server sees one viewer", move || server_ref.viewers() == 1).await;
    }

    client.disconnect();
    {
        let server_ref = &server;
        wait_until("the socket is closed", move || server_ref.viewers() == 0).await;
    }
    assert_eq!(client.connection_state().status, ConnectionStatus::Disconnected);

    // With every timer cancelled, the wire stays silent.
    server.clear_received();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.received_of_type("requestConnectionCount"), 0);
    assert_eq!(server.received_of_type("ping"), 0);
}

#[tokio::test]
async fn send_after_disconnect_drops_the_intent_but_reconnects() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    client.disconnect();
    {
        let server_ref = &server;
        wait_until("the socket is closed", move || server_ref.viewers() == 0).await;
    }
    server.clear_received();

    client.send(Intent::Draw);
    {
        let client = client.clone();
        wait_until("the client reconnects", move || {
            client.connection_state().status == ConnectionStatus::Connected
        })
        .await;
    }
    // The reconnect pulled a fresh count, but the dropped intent never
    // made it onto the wire.
    assert_eq!(server.received_of_type("message"), 0);
    assert!(client.latest_state().is_none());
}

#[tokio::test]
async fn keepalive_pings_flow_while_connected() {
    let server = boot_server().await;
    let client = connected_client(&server).await;

    {
        let server_ref = &server;
        wait_until("two keepalive pings arrive", move || {
            server_ref.received_of_type("ping") >= 2
        })
        .await;
    }
    assert_eq!(client.connection_state().status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn count_polls_recur_on_their_own_cadence() {
    let server = boot_server().await;
    let _client = connected_client(&server).await;

    let server_ref = &server;
    wait_until("two periodic count pulls arrive", move || {
        server_ref.received_of_type("requestConnectionCount") >= 2
    })
    .await;
}

#[tokio::test]
async fn count_polls_park_on_disconnect_and_resume_on_reconnect() {
    let server = boot_server().await;
    let client = connected_client(&server).await;
    {
        let server_ref = &server;
        wait_until("a periodic count pull arrives", move || {
            server_ref.received_of_type("requestConnectionCount") >= 1
        })
        .await;
    }

    client.disconnect();
    {
        let server_ref = &server;
        wait_until("the socket is closed", move || server_ref.viewers() == 0).await;
    }
    server.clear_received();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.received_of_type("requestConnectionCount"), 0);

    // A fresh connect re-arms the poll and the cadence picks back up.
    client.connect();
    let server_ref = &server;
    wait_until("count pulls resume on the new connection", move || {
        server_ref.received_of_type("requestConnectionCount") >= 2
    })
    .await;
}

#[tokio::test]
async fn a_server_that_stops_answering_pings_gets_reconnected_to() {
    let server = boot_server().await;
    server.mute_pongs();
    let client = connected_client(&server).await;

    // The keepalive deadline trips and the client dials again.
    {
        let server_ref = &server;
        wait_until("a second websocket upgrade happens", move || {
            server_ref.upgrades() >= 2
        })
        .await;
    }
    client.disconnect();
}
