//! End-to-end presence scenarios through the server driver.
//!
//! Exercises the full login/disconnect lifecycle the way the runtime drives
//! it: multiple tabs per user, presence broadcast edges, and offline-receiver
//! chat echo.

use parley_proto::{ChatMessage, ClientFrame, ServerFrame, TypingNotice};
use parley_server::{DriverConfig, ServerAction, ServerDriver, ServerEvent};

fn accept(driver: &mut ServerDriver, session_id: u64) {
    driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
}

fn login(driver: &mut ServerDriver, session_id: u64, user_id: &str) -> Vec<ServerAction> {
    driver
        .process_event(ServerEvent::FrameReceived {
            session_id,
            frame: ClientFrame::Login { user_id: user_id.to_string() },
        })
        .unwrap()
}

fn close(driver: &mut ServerDriver, session_id: u64) -> Vec<ServerAction> {
    driver
        .process_event(ServerEvent::ConnectionClosed {
            session_id,
            reason: "connection closed".to_string(),
        })
        .unwrap()
}

fn broadcasts(actions: &[ServerAction]) -> Vec<ServerFrame> {
    actions
        .iter()
        .filter_map(|a| match a {
            ServerAction::Broadcast { frame } => Some(frame.clone()),
            _ => None,
        })
        .collect()
}

fn sends(actions: &[ServerAction]) -> Vec<(u64, ServerFrame)> {
    let mut sends: Vec<_> = actions
        .iter()
        .filter_map(|a| match a {
            ServerAction::SendToSession { session_id, frame } => {
                Some((*session_id, frame.clone()))
            },
            _ => None,
        })
        .collect();
    sends.sort_by_key(|(session_id, _)| *session_id);
    sends
}

#[test]
fn multi_tab_presence_lifecycle() {
    let mut driver = ServerDriver::new(DriverConfig::default());

    // An unrelated observer is connected throughout.
    accept(&mut driver, 100);
    login(&mut driver, 100, "observer");

    // u1 connects with one handle and announces its identity: one broadcast.
    accept(&mut driver, 1);
    let actions = login(&mut driver, 1, "u1");
    assert_eq!(broadcasts(&actions), vec![ServerFrame::UserOnline { user_id: "u1".to_string() }]);

    // u1 opens a second connection and announces again: no second broadcast.
    accept(&mut driver, 2);
    let actions = login(&mut driver, 2, "u1");
    assert!(broadcasts(&actions).is_empty());

    // u1 closes the first connection: still online via the second, silence.
    let actions = close(&mut driver, 1);
    assert!(broadcasts(&actions).is_empty());
    assert!(driver.is_online("u1"));

    // u1 closes the second connection: exactly one offline broadcast.
    let actions = close(&mut driver, 2);
    assert_eq!(broadcasts(&actions), vec![ServerFrame::UserOffline {
        user_id: "u1".to_string(),
    }]);
    assert!(!driver.is_online("u1"));
}

#[test]
fn chat_to_offline_receiver_echoes_to_both_sender_tabs() {
    let mut driver = ServerDriver::new(DriverConfig::default());

    accept(&mut driver, 1);
    accept(&mut driver, 2);
    login(&mut driver, 1, "u1");
    login(&mut driver, 2, "u1");

    let msg = ChatMessage {
        sender_id: "u1".to_string(),
        receiver_id: "u2".to_string(),
        text: "hi".to_string(),
        timestamp: 1000,
    };

    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 1,
            frame: ClientFrame::Chat(msg.clone()),
        })
        .unwrap();

    // Both of u1's tabs receive the event; nothing goes to u2, no error.
    assert_eq!(sends(&actions), vec![
        (1, ServerFrame::Chat(msg.clone())),
        (2, ServerFrame::Chat(msg)),
    ]);
}

#[test]
fn typing_reaches_exactly_the_target_connection() {
    let mut driver = ServerDriver::new(DriverConfig::default());

    accept(&mut driver, 1);
    accept(&mut driver, 2);
    accept(&mut driver, 3);
    login(&mut driver, 1, "u1");
    login(&mut driver, 2, "u1");
    login(&mut driver, 3, "u2");

    let notice = TypingNotice { from: "u1".to_string(), to: "u2".to_string() };

    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 1,
            frame: ClientFrame::Typing(notice.clone()),
        })
        .unwrap();

    // Only u2's connection; u1's own other tab gets nothing.
    assert_eq!(sends(&actions), vec![(3, ServerFrame::Typing(notice))]);
}

#[test]
fn disconnect_without_login_never_broadcasts() {
    let mut driver = ServerDriver::new(DriverConfig::default());

    accept(&mut driver, 100);
    login(&mut driver, 100, "observer");

    accept(&mut driver, 1);
    let actions = close(&mut driver, 1);

    assert!(broadcasts(&actions).is_empty());
}
