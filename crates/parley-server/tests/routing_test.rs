//! Routing isolation tests: frames reach exactly the intended connections.

use parley_proto::{ChatMessage, ClientFrame, ServerFrame, TypingNotice};
use parley_server::{DriverConfig, ServerAction, ServerDriver, ServerEvent};

fn driver_with_users(users: &[(&str, &[u64])]) -> ServerDriver {
    let mut driver = ServerDriver::new(DriverConfig::default());
    for (user_id, sessions) in users {
        for &session_id in *sessions {
            driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
            driver
                .process_event(ServerEvent::FrameReceived {
                    session_id,
                    frame: ClientFrame::Login { user_id: (*user_id).to_string() },
                })
                .unwrap();
        }
    }
    driver
}

fn send_targets(actions: &[ServerAction]) -> Vec<u64> {
    let mut targets: Vec<_> = actions
        .iter()
        .filter_map(|a| match a {
            ServerAction::SendToSession { session_id, .. } => Some(*session_id),
            _ => None,
        })
        .collect();
    targets.sort_unstable();
    targets
}

#[test]
fn chat_delivers_to_participants_and_nobody_else() {
    let mut driver = driver_with_users(&[("u1", &[1, 2]), ("u2", &[3]), ("u3", &[4, 5])]);

    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 1,
            frame: ClientFrame::Chat(ChatMessage {
                sender_id: "u1".to_string(),
                receiver_id: "u2".to_string(),
                text: "hi".to_string(),
                timestamp: 1000,
            }),
        })
        .unwrap();

    // Every handle of u1 and u2; no handle of u3.
    assert_eq!(send_targets(&actions), vec![1, 2, 3]);
}

#[test]
fn chat_payload_is_forwarded_verbatim() {
    let mut driver = driver_with_users(&[("u1", &[1]), ("u2", &[2])]);

    let msg = ChatMessage {
        sender_id: "u1".to_string(),
        receiver_id: "u2".to_string(),
        text: "exact text, untouched ✓".to_string(),
        timestamp: 1_723_456_789_012,
    };

    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 1,
            frame: ClientFrame::Chat(msg.clone()),
        })
        .unwrap();

    for action in &actions {
        if let ServerAction::SendToSession { frame, .. } = action {
            assert_eq!(frame, &ServerFrame::Chat(msg.clone()));
        }
    }
}

#[test]
fn typing_never_echoes_to_the_sender() {
    let mut driver = driver_with_users(&[("u1", &[1, 2]), ("u2", &[3])]);

    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 1,
            frame: ClientFrame::Typing(TypingNotice {
                from: "u1".to_string(),
                to: "u2".to_string(),
            }),
        })
        .unwrap();

    assert_eq!(send_targets(&actions), vec![3]);
}

#[test]
fn typing_to_offline_user_goes_nowhere() {
    let mut driver = driver_with_users(&[("u1", &[1])]);

    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 1,
            frame: ClientFrame::Typing(TypingNotice {
                from: "u1".to_string(),
                to: "u2".to_string(),
            }),
        })
        .unwrap();

    assert!(send_targets(&actions).is_empty());
}

#[test]
fn presence_broadcast_does_not_target_individual_sessions() {
    let mut driver = driver_with_users(&[("u1", &[1])]);

    driver.process_event(ServerEvent::ConnectionAccepted { session_id: 2 }).unwrap();
    let actions = driver
        .process_event(ServerEvent::FrameReceived {
            session_id: 2,
            frame: ClientFrame::Login { user_id: "u2".to_string() },
        })
        .unwrap();

    // Presence goes out as a broadcast to every live handle, not as
    // per-session sends.
    assert!(send_targets(&actions).is_empty());
    assert!(actions.iter().any(|a| matches!(
        a,
        ServerAction::Broadcast { frame: ServerFrame::UserOnline { .. } }
    )));
}
