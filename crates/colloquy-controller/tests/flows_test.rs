mod common;

use colloquy_controller::{
    CancellationToken, ControllerConfig, ConversationController, DropReason, SendOutcome,
    StreamTargetAllocator,
};
use colloquy_store::Mutation;
use colloquy_types::{ChatError, Message, Sender};
use common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn assert_idle(h: &Harness) {
    h.store.read(|s| {
        assert!(!s.is_loading(), "loading left set");
        assert!(!s.is_typing(), "typing left set");
        assert!(s.streaming_target().is_none(), "stream target left open");
    });
    assert!(!h.controller.is_reply_in_flight());
}

#[tokio::test]
async fn test_load_threads_empty() {
    let h = harness(ControllerConfig::default());
    h.service.on_list_threads(Ok(Vec::new()));

    h.controller.load_threads().await.unwrap();

    h.store.read(|s| {
        assert!(s.all_threads().is_empty());
        assert_eq!(s.current_thread_id(), None);
        assert_eq!(s.error(), None);
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_load_threads_selects_first_when_none_selected() {
    let h = harness(ControllerConfig::default());
    h.service
        .on_list_threads(Ok(vec![thread(4, "a", vec![]), thread(9, "b", vec![])]));

    h.controller.load_threads().await.unwrap();

    assert_eq!(h.store.read(|s| s.current_thread_id()), Some(4));
    assert_eq!(h.store.read(|s| s.thread_count()), 2);
}

#[tokio::test]
async fn test_load_threads_keeps_existing_selection() {
    let h = harness_with_threads(
        ControllerConfig::default(),
        vec![thread(4, "a", vec![]), thread(9, "b", vec![])],
    );
    h.store
        .commit(Mutation::SetCurrentThreadId(Some(9)))
        .unwrap();
    h.service
        .on_list_threads(Ok(vec![thread(4, "a", vec![]), thread(9, "b", vec![])]));

    h.controller.load_threads().await.unwrap();

    assert_eq!(h.store.read(|s| s.current_thread_id()), Some(9));
}

#[tokio::test]
async fn test_load_threads_failure_clears_threads() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(4, "a", vec![])]);
    h.service
        .on_list_threads(Err(ChatError::transport(Some(500), "Internal Server Error")));

    let err = h.controller.load_threads().await.unwrap_err();

    assert!(matches!(err, ChatError::Transport { status: Some(500), .. }));
    h.store.read(|s| {
        assert!(s.all_threads().is_empty());
        assert_eq!(s.current_thread_id(), None);
        assert!(s.error().unwrap().starts_with("Failed to load threads"));
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_create_thread_selects_and_refreshes() {
    let h = harness(ControllerConfig::default());
    let first = Message::user(1, "Where should I go?", at(0));
    h.service.on_create_thread(Ok(thread(7, "Trip planning", vec![first.clone()])));
    h.service.on_list_messages(Ok(vec![
        first,
        Message::assistant(2, "Somewhere warm?", at(10)),
    ]));

    let created = h
        .controller
        .create_thread("Trip planning", "Where should I go?")
        .await
        .unwrap();

    assert_eq!(created, Some(7));
    h.store.read(|s| {
        assert_eq!(s.current_thread_id(), Some(7));
        assert_eq!(s.thread_count(), 1);
        assert_eq!(s.thread(7).unwrap().messages.len(), 2);
    });
    assert_eq!(
        h.service.calls(),
        vec![
            Call::CreateThread("Trip planning".into(), "Where should I go?".into()),
            Call::ListMessages(7),
        ]
    );
    assert_idle(&h);
}

#[tokio::test]
async fn test_create_thread_blank_title_and_blank_message() {
    let h = harness(ControllerConfig::default());

    assert_eq!(h.controller.create_thread("Anything", "   ").await.unwrap(), None);
    assert!(h.service.calls().is_empty());

    h.service.on_create_thread(Ok(thread(1, "New conversation", vec![])));
    h.service.on_list_messages(Ok(vec![]));
    h.controller.create_thread("  ", "Hi").await.unwrap();
    assert_eq!(
        h.service.calls()[0],
        Call::CreateThread("New conversation".into(), "Hi".into())
    );
}

#[tokio::test]
async fn test_create_thread_rejects_id_behind_store() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(9, "latest", vec![])]);
    h.service.on_create_thread(Ok(thread(2, "stale", vec![])));

    let created = h.controller.create_thread("stale", "Hi").await;

    assert!(matches!(created, Err(ChatError::Validation(_))));
    h.store.read(|s| {
        assert_eq!(s.thread_count(), 1);
        assert_eq!(s.current_thread_id(), Some(9));
        assert!(s.error().unwrap().starts_with("Failed to create thread"));
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_create_thread_failure_sets_error() {
    let h = harness(ControllerConfig::default());
    h.service
        .on_create_thread(Err(ChatError::transport(None, "connection refused")));

    assert!(h.controller.create_thread("t", "Hi").await.is_err());

    h.store.read(|s| {
        assert_eq!(s.thread_count(), 0);
        assert!(s.error().unwrap().contains("connection refused"));
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_send_message_atomic() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service
        .on_send_assistant(Ok(Message::assistant(6, "Understood", at(20))));

    let outcome = h.controller.send_message("Hello").await.unwrap();

    assert_eq!(
        outcome,
        SendOutcome::Replied {
            thread_id: 3,
            user_message_id: 5,
            reply_message_id: 6
        }
    );
    let ids: Vec<_> = h
        .store
        .read(|s| s.thread(3).unwrap().messages.iter().map(|m| m.id).collect());
    assert_eq!(ids, vec![5, 6]);
    assert_eq!(
        h.service.calls()[1],
        Call::SendAssistant(3, "Understood \"Hello\". How can I help you with that?".into())
    );
    assert_idle(&h);
}

#[tokio::test(start_paused = true)]
async fn test_typing_holds_until_reply_resolves() {
    let config = ControllerConfig::default().with_reply_delay(Duration::from_millis(1500));
    let h = harness_with_threads(config, vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service
        .on_send_assistant(Ok(Message::assistant(6, "Understood", at(20))));

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.send_message("Hello").await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    h.store.read(|s| {
        assert!(s.is_typing());
        assert!(s.thread(3).unwrap().message(5).is_some());
        assert!(s.thread(3).unwrap().message(6).is_none());
    });

    task.await.unwrap().unwrap();
    assert!(h.store.read(|s| s.thread(3).unwrap().message(6).is_some()));
    assert_idle(&h);
}

#[tokio::test]
async fn test_assistant_failure_keeps_user_message() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service
        .on_send_assistant(Err(ChatError::transport(Some(502), "Bad Gateway")));

    assert!(h.controller.send_message("Hello").await.is_err());

    h.store.read(|s| {
        assert_eq!(s.thread(3).unwrap().messages.len(), 1);
        assert!(s.error().unwrap().starts_with("Failed to get assistant reply"));
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_user_send_failure_makes_no_reply_request() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service
        .on_send_user(Err(ChatError::transport(None, "connection refused")));

    assert!(h.controller.send_message_streaming("Hello").await.is_err());

    assert_eq!(h.service.calls(), vec![Call::SendUser(3, "Hello".into())]);
    assert!(h.store.read(|s| s.thread(3).unwrap().messages.is_empty()));
    assert_idle(&h);
}

#[tokio::test]
async fn test_send_without_current_thread_is_noop() {
    let h = harness(ControllerConfig::default());
    h.store
        .commit(Mutation::SetThreads(vec![thread(3, "t", vec![])]))
        .unwrap();
    let before = h.store.snapshot();

    let atomic = h.controller.send_message("Hello").await.unwrap();
    let streamed = h.controller.send_message_streaming("Hello").await.unwrap();

    assert_eq!(atomic, SendOutcome::Dropped(DropReason::NoCurrentThread));
    assert_eq!(streamed, SendOutcome::Dropped(DropReason::NoCurrentThread));
    assert!(h.service.calls().is_empty());
    assert_eq!(h.store.snapshot(), before);
}

#[tokio::test]
async fn test_blank_text_is_dropped_silently() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.store
        .commit(Mutation::SetError(Some("earlier".into())))
        .unwrap();
    let before = h.store.snapshot();

    let outcome = h.controller.send_message(" \n\t ").await.unwrap();

    assert_eq!(outcome, SendOutcome::Dropped(DropReason::EmptyText));
    assert!(h.service.calls().is_empty());
    assert_eq!(h.store.snapshot(), before);
}

#[tokio::test]
async fn test_streaming_reply_transitions_in_order() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    let seen = Arc::new(Mutex::new(Vec::new()));
    h.service.on_stream(StreamScript::Observed {
        chunks: text_chunks(&["Hi", " there", "!"]),
        store: h.store.clone(),
        thread_id: 3,
        message_id: 6,
        seen: seen.clone(),
    });

    let outcome = h.controller.send_message_streaming("Hello").await.unwrap();

    assert_eq!(outcome.reply_message_id(), Some(6));
    assert_eq!(*seen.lock().unwrap(), vec!["", "Hi", "Hi there"]);
    h.store.read(|s| {
        let reply = s.thread(3).unwrap().message(6).unwrap();
        assert_eq!(reply.text, "Hi there!");
        assert_eq!(reply.sender, Sender::Assistant);
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_streamed_reply_is_sealed_after_completion() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service
        .on_stream(StreamScript::Chunks(text_chunks(&["Hi there!"])));

    h.controller.send_message_streaming("Hello").await.unwrap();

    let late = h.store.commit(Mutation::ReplaceMessageText {
        thread_id: 3,
        message_id: 6,
        text: "rewritten".into(),
    });
    assert!(matches!(late, Err(ChatError::MessageSealed { .. })));
    assert_eq!(
        h.store.read(|s| s.thread(3).unwrap().message(6).unwrap().text.clone()),
        "Hi there!"
    );
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_partial_text() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service.on_stream(StreamScript::Chunks(vec![
        Ok(b"Hi".to_vec()),
        Err(ChatError::Stream("connection reset".into())),
    ]));

    let err = h.controller.send_message_streaming("Hello").await.unwrap_err();

    assert!(matches!(err, ChatError::Stream(_)));
    h.store.read(|s| {
        assert_eq!(s.thread(3).unwrap().message(6).unwrap().text, "Hi");
        assert!(s.error().is_some());
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_stream_open_failure_leaves_empty_placeholder() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service
        .on_stream(StreamScript::FailOpen(ChatError::transport(Some(503), "Service Unavailable")));

    let err = h.controller.send_message_streaming("Hello").await.unwrap_err();

    assert!(matches!(err, ChatError::Transport { status: Some(503), .. }));
    assert_eq!(
        h.store.read(|s| s.thread(3).unwrap().message(6).unwrap().text.clone()),
        ""
    );
    assert_idle(&h);
}

#[tokio::test(start_paused = true)]
async fn test_stream_open_timeout_clears_typing() {
    let config = ControllerConfig::default().with_open_timeout(Duration::from_secs(5));
    let h = harness_with_threads(config, vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service.on_stream(StreamScript::HangOpen);

    let err = h.controller.send_message_streaming("Hello").await.unwrap_err();

    assert!(matches!(err, ChatError::Transport { status: None, .. }));
    assert!(h.store.read(|s| s.error().is_some()));
    assert_idle(&h);
}

#[tokio::test]
async fn test_abandoned_stream_keeps_partial_text() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    let gate = Arc::new(Notify::new());
    h.service.on_stream(StreamScript::Gated {
        before: text_chunks(&["Hi"]),
        gate: gate.clone(),
        after: text_chunks(&[" there"]),
    });

    let cancel = CancellationToken::new();
    let controller = h.controller.clone();
    let token = cancel.clone();
    let task =
        tokio::spawn(async move { controller.send_message_streaming_with("Hello", token).await });

    while h
        .store
        .read(|s| s.thread(3).and_then(|t| t.message(6)).map(|m| m.text.clone()))
        .as_deref()
        != Some("Hi")
    {
        tokio::task::yield_now().await;
    }
    cancel.cancel();
    gate.notify_one();

    let outcome = task.await.unwrap().unwrap();

    assert!(matches!(outcome, SendOutcome::Abandoned { reply_message_id: 6, .. }));
    h.store.read(|s| {
        assert_eq!(s.thread(3).unwrap().message(6).unwrap().text, "Hi");
        assert_eq!(s.error(), None);
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_second_send_rejected_while_reply_in_flight() {
    let h = harness_with_threads(
        ControllerConfig::default(),
        vec![thread(3, "t", vec![]), thread(4, "u", vec![])],
    );
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    let gate = Arc::new(Notify::new());
    h.service.on_stream(StreamScript::Gated {
        before: text_chunks(&["Hi"]),
        gate: gate.clone(),
        after: text_chunks(&["!"]),
    });

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.send_message_streaming("Hello").await });
    while !h.store.read(|s| s.is_typing()) {
        tokio::task::yield_now().await;
    }

    let same_thread = h.controller.send_message("Again").await.unwrap();
    h.store
        .commit(Mutation::SetCurrentThreadId(Some(4)))
        .unwrap();
    let other_thread = h.controller.send_message_streaming("Elsewhere").await.unwrap();

    assert_eq!(same_thread, SendOutcome::Dropped(DropReason::ReplyInFlight));
    assert_eq!(other_thread, SendOutcome::Dropped(DropReason::ReplyInFlight));

    gate.notify_one();
    task.await.unwrap().unwrap();

    let sends = h
        .service
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::SendUser(..)))
        .count();
    assert_eq!(sends, 1);
    assert_eq!(
        h.store.read(|s| s.thread(3).unwrap().message(6).unwrap().text.clone()),
        "Hi!"
    );
    assert_idle(&h);
}

#[tokio::test]
async fn test_controllers_sharing_a_store_stream_one_at_a_time() {
    let h = harness_with_threads(
        ControllerConfig::default(),
        vec![thread(3, "t", vec![]), thread(4, "u", vec![])],
    );
    let other_service = ScriptedService::new();
    let other = ConversationController::new(
        h.store.clone(),
        other_service.clone(),
        ControllerConfig::default(),
    );
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    let gate = Arc::new(Notify::new());
    h.service.on_stream(StreamScript::Gated {
        before: text_chunks(&["Hi"]),
        gate: gate.clone(),
        after: text_chunks(&[" there"]),
    });

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.send_message_streaming("Hello").await });
    while !h.store.read(|s| s.is_typing()) {
        tokio::task::yield_now().await;
    }

    h.store
        .commit(Mutation::SetCurrentThreadId(Some(4)))
        .unwrap();
    let second = other.send_message_streaming("B").await.unwrap();
    assert_eq!(second, SendOutcome::Dropped(DropReason::ReplyInFlight));
    assert!(other_service.calls().is_empty());

    gate.notify_one();
    let first = first.await.unwrap().unwrap();

    assert!(matches!(first, SendOutcome::Replied { thread_id: 3, reply_message_id: 6, .. }));
    h.store.read(|s| {
        assert_eq!(s.thread(3).unwrap().message(6).unwrap().text, "Hi there");
        assert!(s.thread(4).unwrap().messages.is_empty());
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_store_refuses_stream_opened_after_admission() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    let other_service = ScriptedService::new();
    let other = ConversationController::new(
        h.store.clone(),
        other_service.clone(),
        ControllerConfig::default(),
    );

    let user_gate = Arc::new(Notify::new());
    other_service.hold_send_user(user_gate.clone());
    other_service.on_send_user(Ok(Message::user(7, "B", at(30))));
    let late = tokio::spawn(async move { other.send_message_streaming("B").await });
    while other_service.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    let stream_gate = Arc::new(Notify::new());
    h.service.on_stream(StreamScript::Gated {
        before: text_chunks(&["Hi"]),
        gate: stream_gate.clone(),
        after: text_chunks(&[" there"]),
    });
    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.send_message_streaming("Hello").await });
    while h.store.read(|s| s.streaming_target().is_none()) {
        tokio::task::yield_now().await;
    }

    user_gate.notify_one();
    let late = late.await.unwrap().unwrap();
    assert_eq!(late, SendOutcome::Dropped(DropReason::ReplyInFlight));
    assert!(!other_service.calls().iter().any(|c| matches!(c, Call::Stream(..))));

    stream_gate.notify_one();
    first.await.unwrap().unwrap();

    h.store.read(|s| {
        let thread = s.thread(3).unwrap();
        assert_eq!(thread.message(6).unwrap().text, "Hi there");
        assert!(thread.message(7).is_some());
        assert!(thread.message(8).is_none());
        assert_eq!(s.error(), None);
    });
    assert_idle(&h);
}

#[tokio::test]
async fn test_reply_stays_on_thread_captured_at_send() {
    let h = harness_with_threads(
        ControllerConfig::default(),
        vec![thread(3, "t", vec![]), thread(4, "u", vec![])],
    );
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    let gate = Arc::new(Notify::new());
    h.service.on_stream(StreamScript::Gated {
        before: text_chunks(&["Hi"]),
        gate: gate.clone(),
        after: text_chunks(&[" there"]),
    });

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.send_message_streaming("Hello").await });
    while !h.store.read(|s| s.is_typing()) {
        tokio::task::yield_now().await;
    }
    h.store
        .commit(Mutation::SetCurrentThreadId(Some(4)))
        .unwrap();
    gate.notify_one();
    task.await.unwrap().unwrap();

    h.store.read(|s| {
        assert_eq!(s.thread(3).unwrap().message(6).unwrap().text, "Hi there");
        assert!(s.thread(4).unwrap().messages.is_empty());
    });
}

#[tokio::test]
async fn test_local_namespace_placeholder() {
    let config = ControllerConfig::default().with_stream_target(StreamTargetAllocator::LocalNamespace);
    let h = harness_with_threads(config, vec![thread(3, "t", vec![])]);
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service.on_stream(StreamScript::Chunks(text_chunks(&["Hi"])));

    let outcome = h.controller.send_message_streaming("Hello").await.unwrap();

    assert_eq!(outcome.reply_message_id(), Some(-1));
    assert_eq!(
        h.store.read(|s| s.thread(3).unwrap().message(-1).unwrap().text.clone()),
        "Hi"
    );
}

#[tokio::test]
async fn test_successful_send_clears_previous_error() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.store
        .commit(Mutation::SetError(Some("Failed to load threads: boom".into())))
        .unwrap();
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service
        .on_send_assistant(Ok(Message::assistant(6, "Understood", at(20))));

    h.controller.send_message("Hello").await.unwrap();

    assert_eq!(h.store.read(|s| s.error().map(str::to_string)), None);
}

#[tokio::test]
async fn test_updated_at_follows_store_clock() {
    let h = harness_with_threads(ControllerConfig::default(), vec![thread(3, "t", vec![])]);
    h.clock.set(at(50_000));
    h.service.on_send_user(Ok(Message::user(5, "Hello", at(10))));
    h.service.on_stream(StreamScript::Chunks(text_chunks(&["Hi"])));

    h.controller.send_message_streaming("Hello").await.unwrap();

    h.store.read(|s| {
        let thread = s.thread(3).unwrap();
        assert_eq!(thread.updated_at, at(50_000));
        assert_eq!(thread.message(6).unwrap().timestamp, at(50_000));
    });
}
