//! Integration tests for the edit session

mod support;

use blockspace_editor::{
    BlockType, ClientMessage, DropPosition, EditableSurface, EditorConfig, EditorError,
    KeyOutcome, Role, ServerMessage, StyleFlag, TextSurface,
};
use std::time::Duration;
use support::*;

#[tokio::test(start_paused = true)]
async fn test_delete_last_block_is_refused_locally() {
    let mut h = open(vec![text(1, 0, "only")]).await;
    let before = h.session.blocks().to_vec();

    let result = h.session.delete_block(1);
    h.session.settle().await;

    assert_eq!(result, Err(EditorError::LastBlock(1)));
    assert_eq!(h.session.blocks(), &before[..]);
    assert_eq!(h.gateway.count_calls("delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_focuses_previous_block() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b"), text(3, 2, "c")]).await;

    assert_eq!(h.session.delete_block(2), Ok(1));
    h.session.settle().await;

    assert_eq!(h.session.store().ids(), vec![1, 3]);
    assert!(h.gateway.block(2).is_none());
    assert!(h
        .connector
        .sent()
        .contains(&ClientMessage::BlockDeleted { block_id: 2 }));
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_restores_block() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b"), text(3, 2, "c")]).await;
    h.gateway.fail_deletes(true);

    h.session.delete_block(2).unwrap();
    assert_eq!(h.session.store().ids(), vec![1, 3]);

    h.session.settle().await;
    assert_eq!(h.session.store().ids(), vec![1, 2, 3]);
    assert_eq!(h.session.take_notices().len(), 1);
    assert!(h.connector.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_backspace_at_start_of_second_block_merges() {
    let mut h = open(vec![text(1, 0, "first"), text(2, 1, "second")]).await;
    let mut surface = TextSurface::new("second");

    let outcome = h.session.press_backspace(2, &mut surface).unwrap();

    assert_eq!(outcome, KeyOutcome::MergeWithPrevious);
    assert_eq!(contents(&h.session), vec!["firstsecond"]);
    let focus = h.session.focus().unwrap();
    assert_eq!(focus.block_id, 1);
    assert_eq!(focus.caret, 5);

    h.session.settle().await;
    assert_eq!(h.gateway.blocks(1).len(), 1);
    assert_eq!(h.gateway.block(1).unwrap().content, "firstsecond");
    assert_eq!(h.gateway.calls(), vec!["list 1", "update 1", "delete 2"]);

    let sent = h.connector.sent();
    assert!(sent.contains(&ClientMessage::BlockDeleted { block_id: 2 }));
    assert!(sent
        .iter()
        .any(|m| matches!(m, ClientMessage::BlockUpdated { block_id: 1, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_merge_uses_pending_content_of_previous_block() {
    let mut h = open(vec![text(1, 0, "fir"), text(2, 1, "second")]).await;

    h.session.edit_content(1, "first").unwrap();
    let mut surface = TextSurface::new("second");
    h.session.press_backspace(2, &mut surface).unwrap();

    assert_eq!(contents(&h.session), vec!["firstsecond"]);
    assert_eq!(h.session.focus().unwrap().caret, 5);
    assert_eq!(h.session.pending_content(1), None);
}

#[tokio::test(start_paused = true)]
async fn test_merge_update_failure_rolls_back() {
    let mut h = open(vec![text(1, 0, "first"), text(2, 1, "second")]).await;
    h.gateway.fail_updates(true);

    let mut surface = TextSurface::new("second");
    h.session.press_backspace(2, &mut surface).unwrap();
    h.session.settle().await;

    assert_eq!(contents(&h.session), vec!["first", "second"]);
    assert_eq!(h.gateway.count_calls("delete"), 0);

    let notices = h.session.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0].error, EditorError::Persistence(_)));
}

#[tokio::test(start_paused = true)]
async fn test_merge_delete_failure_reloads_space() {
    let mut h = open(vec![text(1, 0, "first"), text(2, 1, "second")]).await;
    h.gateway.fail_deletes(true);

    let mut surface = TextSurface::new("second");
    h.session.press_backspace(2, &mut surface).unwrap();
    assert_eq!(h.session.blocks().len(), 1);

    h.session.settle().await;

    // Ground truth from the gateway: the update landed, the delete did not
    assert_eq!(contents(&h.session), vec!["firstsecond", "second"]);
    assert_eq!(h.gateway.count_calls("list"), 2);
    assert!(h.session.take_notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_inconsistent_merge_is_not_announced_as_delete() {
    let mut h = open(vec![text(1, 0, "first"), text(2, 1, "second")]).await;
    h.gateway.fail_deletes(true);

    let mut surface = TextSurface::new("second");
    h.session.press_backspace(2, &mut surface).unwrap();
    h.session.settle().await;

    assert!(!h
        .connector
        .sent()
        .contains(&ClientMessage::BlockDeleted { block_id: 2 }));
    assert_eq!(h.session.store().ids(), vec![1, 2]);
    assert_eq!(h.gateway.count_calls("list"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_merge_into_list_drops_sandwiched_blank_line() {
    let mut h = open(vec![
        typed(1, 0, BlockType::BulletList, "• a\n\n"),
        typed(2, 1, BlockType::BulletList, "• b"),
    ])
    .await;

    let mut surface = TextSurface::new("• b");
    h.session.press_backspace(2, &mut surface).unwrap();

    assert_eq!(contents(&h.session), vec!["• a\n• b"]);
    assert_eq!(h.session.focus().unwrap().caret, 4);

    h.session.settle().await;
    assert_eq!(h.gateway.block(1).unwrap().content, "• a\n• b");
}

#[tokio::test(start_paused = true)]
async fn test_own_echo_does_not_mutate_state() {
    let mut h = open(vec![text(1, 0, "local")]).await;
    let before = h.session.blocks().to_vec();

    h.connector.push(&ServerMessage::BlockUpdated {
        block_id: 1,
        changes: blockspace_editor::BlockPatch::content("echoed"),
        actor_id: ME,
        actor_username: Some("me".into()),
    });
    h.session.settle().await;

    assert_eq!(h.session.blocks(), &before[..]);
}

#[tokio::test(start_paused = true)]
async fn test_peer_update_is_applied() {
    let mut h = open(vec![text(1, 0, "local")]).await;

    h.connector.push(&ServerMessage::BlockUpdated {
        block_id: 1,
        changes: blockspace_editor::BlockPatch::content("remote"),
        actor_id: PEER,
        actor_username: Some("ann".into()),
    });
    h.session.settle().await;

    assert_eq!(contents(&h.session), vec!["remote"]);
}

#[tokio::test(start_paused = true)]
async fn test_peer_reorder_refetches_full_list() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b"), text(3, 2, "c")]).await;

    h.gateway
        .set_blocks(vec![text(3, 0, "c"), text(1, 1, "a"), text(2, 2, "b")]);
    h.connector.push(&ServerMessage::BlocksReordered {
        space_id: 1,
        // Deliberately wrong: the payload is never trusted
        block_ids: vec![2, 1, 3],
        actor_id: PEER,
        actor_username: None,
    });
    h.session.settle().await;

    assert_eq!(h.session.store().ids(), vec![3, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_peer_delete_of_last_block_resyncs() {
    let mut h = open(vec![text(1, 0, "only")]).await;
    h.gateway.set_blocks(vec![text(7, 0, "fresh")]);

    h.connector.push(&ServerMessage::BlockDeleted {
        block_id: 1,
        actor_id: PEER,
        actor_username: None,
    });
    h.session.settle().await;

    assert_eq!(h.session.store().ids(), vec![7]);
}

#[tokio::test(start_paused = true)]
async fn test_enter_at_end_of_bullet_block() {
    let mut h = open(vec![
        typed(1, 0, BlockType::BulletList, "• one"),
        typed(2, 1, BlockType::BulletList, "• two"),
    ])
    .await;

    let mut surface = TextSurface::at_end("• two");
    let outcome = h.session.press_enter(2, &mut surface).unwrap();

    assert_eq!(outcome, KeyOutcome::Edited);
    assert_eq!(surface.get_text(), "• two\n• ");
    assert_eq!(h.session.pending_content(2), Some("• two\n• "));

    h.session.settle().await;
    assert_eq!(contents(&h.session), vec!["• one", "• two\n• "]);
    assert_eq!(h.gateway.blocks(1).len(), 2);
    assert_eq!(h.gateway.count_calls("create"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_change_type_numbered_to_text() {
    let mut h = open(vec![typed(5, 0, BlockType::NumberedList, "1. a\n2. b")]).await;

    h.session.change_type(5, BlockType::Text).unwrap();
    assert_eq!(h.session.block(5).unwrap().content, "a\nb");

    h.session.settle().await;
    let stored = h.gateway.block(5).unwrap();
    assert_eq!(stored.content, "a\nb");
    assert_eq!(stored.block_type, BlockType::Text);
}

#[tokio::test(start_paused = true)]
async fn test_drag_block_above_first() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b"), text(3, 2, "c")]).await;

    h.session.drop_block(3, 1, DropPosition::Above).unwrap();

    assert_eq!(h.session.store().ids(), vec![3, 1, 2]);
    let orders: Vec<i64> = h.session.blocks().iter().map(|b| b.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    h.session.settle().await;
    let server: Vec<i64> = h.gateway.blocks(1).iter().map(|b| b.id).collect();
    assert_eq!(server, vec![3, 1, 2]);
    assert_eq!(h.gateway.count_calls("refresh"), 1);
    assert!(h
        .connector
        .sent()
        .iter()
        .any(|m| matches!(m, ClientMessage::BlocksReordered { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reorder_restores_order() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b"), text(3, 2, "c")]).await;
    h.gateway.fail_updates(true);

    h.session.drop_block(3, 1, DropPosition::Above).unwrap();
    h.session.settle().await;

    assert_eq!(h.session.store().ids(), vec![1, 2, 3]);
    assert_eq!(h.session.take_notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_keystrokes_coalesce_into_one_write() {
    let mut h = open(vec![text(1, 0, "")]).await;

    for content in ["h", "he", "hel", "hell", "hello"] {
        h.session.edit_content(1, content).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(h.gateway.count_calls("update"), 0);

    h.session.settle().await;
    assert_eq!(h.gateway.count_calls("update"), 1);
    assert_eq!(h.gateway.block(1).unwrap().content, "hello");
    assert_eq!(contents(&h.session), vec!["hello"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_keeps_concurrent_remote_edit() {
    let mut h = open(vec![text(1, 0, "original")]).await;
    h.gateway.fail_updates(true);

    h.session.toggle_style(1, StyleFlag::Bold).unwrap();
    assert!(h.session.block(1).unwrap().bold);

    h.session.handle_message(ServerMessage::BlockUpdated {
        block_id: 1,
        changes: blockspace_editor::BlockPatch::content("remote"),
        actor_id: PEER,
        actor_username: None,
    });
    h.session.settle().await;

    let block = h.session.block(1).unwrap();
    assert!(!block.bold);
    assert_eq!(block.content, "remote");
    assert_eq!(h.session.take_notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_edits_and_drops_late_results() {
    let blocks = vec![
        text(1, 0, "one"),
        text(2, 1, "two"),
        blockspace_editor::Block::new(20, 2, BlockType::Text, "other space", 0),
    ];
    let mut h = open(blocks).await;
    h.gateway.set_latency(Duration::from_secs(1));
    h.gateway.fail_updates(true);

    h.session.edit_content(1, "typed").unwrap();
    h.session.toggle_style(2, StyleFlag::Italic).unwrap();

    h.session.switch_space(2).await.unwrap();
    assert_eq!(h.session.store().ids(), vec![20]);
    assert_eq!(h.session.in_flight(), 0);

    // Let the stale call finish and hand its failed result back
    tokio::time::sleep(Duration::from_secs(2)).await;
    let processed = tokio::time::timeout(Duration::from_secs(5), h.session.process_next()).await;
    assert_eq!(processed, Ok(true));

    assert_eq!(contents(&h.session), vec!["other space"]);
    assert!(h.session.take_notices().is_empty());
    assert_eq!(h.session.in_flight(), 0);

    // Only the style write was ever issued; the debounced content was dropped
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.gateway.count_calls("update"), 1);
    assert!(h.gateway.calls().contains(&"update 2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_visitor_cannot_mutate() {
    let mut h = open_with(
        vec![text(1, 0, "read only"), text(2, 1, "b")],
        FakeConnector::with_role(Role::Visitor),
        EditorConfig::default(),
    )
    .await;

    assert_eq!(h.session.role(), Role::Visitor);
    assert!(matches!(
        h.session.edit_content(1, "x"),
        Err(EditorError::PermissionDenied(_))
    ));
    assert!(matches!(
        h.session.delete_block(2),
        Err(EditorError::PermissionDenied(_))
    ));
    assert!(matches!(
        h.session.drop_block(2, 1, DropPosition::Above),
        Err(EditorError::PermissionDenied(_))
    ));

    let mut surface = TextSurface::at_end("read only");
    assert!(h.session.press_enter(1, &mut surface).is_err());
    assert_eq!(surface.get_text(), "read only");

    h.session.settle().await;
    assert_eq!(contents(&h.session), vec!["read only", "b"]);
    assert_eq!(h.gateway.calls(), vec!["list 1"]);
}

#[tokio::test(start_paused = true)]
async fn test_remote_create_and_presence() {
    let mut h = open(vec![text(1, 0, "a")]).await;

    h.connector.push(&ServerMessage::UserJoined {
        user_id: PEER,
        username: "ann".into(),
    });
    h.connector.push(&ServerMessage::BlockCreated {
        block: text(9, 1, "from ann"),
        actor_id: PEER,
        actor_username: Some("ann".into()),
    });
    h.connector.push(&ServerMessage::CursorPosition {
        block_id: 9,
        position: 3,
        user_id: PEER,
        username: "ann".into(),
    });
    h.session.settle().await;

    assert_eq!(contents(&h.session), vec!["a", "from ann"]);
    let ann = h.session.presence().get(PEER).unwrap();
    assert_eq!(ann.cursor, Some((9, 3)));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped() {
    let mut h = open(vec![text(1, 0, "a")]).await;

    h.connector.push_raw("{ not json");
    h.connector.push_raw(r#"{"type":"block_teleported"}"#);
    h.session.settle().await;

    assert_eq!(contents(&h.session), vec!["a"]);
    assert!(h.session.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_split_text_block() {
    let mut h = open(vec![text(1, 0, "hello world"), text(2, 1, "tail")]).await;
    let mut surface = TextSurface::new("hello world").with_caret(5);

    let created = h.session.split_block(1, &mut surface).await.unwrap();
    assert_eq!(surface.get_text(), "hello");
    assert_eq!(created.content, " world");

    h.session.settle().await;
    assert_eq!(contents(&h.session), vec!["hello", " world", "tail"]);
    let orders: Vec<i64> = h.session.blocks().iter().map(|b| b.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert_eq!(h.session.focus().unwrap().block_id, created.id);
}

#[tokio::test(start_paused = true)]
async fn test_split_bullet_block_keeps_type() {
    let mut h = open(vec![typed(1, 0, BlockType::BulletList, "• a\n• b")]).await;
    let mut surface = TextSurface::new("• a\n• b").with_caret(6);

    let created = h.session.split_block(1, &mut surface).await.unwrap();
    h.session.settle().await;

    assert_eq!(created.block_type, BlockType::BulletList);
    assert_eq!(contents(&h.session), vec!["• a\n• ", "• b"]);
}

#[tokio::test(start_paused = true)]
async fn test_split_list_block_drops_sandwiched_blank_line() {
    let content = "• a\n\n• b\n• c";
    let mut h = open(vec![typed(1, 0, BlockType::BulletList, content)]).await;
    let mut surface = TextSurface::new(content).with_caret(9);

    h.session.split_block(1, &mut surface).await.unwrap();
    h.session.settle().await;

    assert_eq!(surface.get_text(), "• a\n• b");
    assert_eq!(contents(&h.session), vec!["• a\n• b", "• c"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_leaves_store_untouched() {
    let mut h = open(vec![text(1, 0, "a")]).await;
    h.gateway.fail_creates(true);

    let result = h.session.append_block().await;

    assert!(matches!(result, Err(EditorError::Persistence(_))));
    assert_eq!(h.session.store().ids(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_append_block_goes_last() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b")]).await;

    let block = h.session.append_block().await.unwrap();

    assert_eq!(block.order, 2);
    assert_eq!(h.session.store().ids(), vec![1, 2, block.id]);
    assert!(h
        .connector
        .sent()
        .iter()
        .any(|m| matches!(m, ClientMessage::BlockCreated { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_backspace_emptying_list_converts_to_text() {
    let mut h = open(vec![
        text(1, 0, "intro"),
        typed(2, 1, BlockType::BulletList, "• "),
    ])
    .await;
    let mut surface = TextSurface::at_end("• ");

    let outcome = h.session.press_backspace(2, &mut surface).unwrap();
    h.session.settle().await;

    assert_eq!(outcome, KeyOutcome::ExitList);
    let block = h.session.block(2).unwrap();
    assert_eq!(block.block_type, BlockType::Text);
    assert_eq!(block.content, "");
    assert_eq!(h.gateway.block(2).unwrap().block_type, BlockType::Text);
}

#[tokio::test(start_paused = true)]
async fn test_notifications_can_be_disabled() {
    let config = EditorConfig {
        notify_peers: false,
        ..EditorConfig::default()
    };
    let mut h = open_with(vec![text(1, 0, "a")], FakeConnector::new(), config).await;

    h.session.set_size(1, blockspace_editor::TextSize::Large).unwrap();
    h.session.settle().await;

    assert!(h.connector.sent().is_empty());
    assert_eq!(h.gateway.block(1).unwrap().size, blockspace_editor::TextSize::Large);
}

#[tokio::test(start_paused = true)]
async fn test_write_in_flight_survives_stale_resync() {
    let mut h = open(vec![text(1, 0, "a"), text(2, 1, "b")]).await;
    h.gateway.set_latency(Duration::from_millis(50));

    // The re-fetch reads the gateway before the style write lands there
    h.session.handle_message(ServerMessage::BlocksReordered {
        space_id: 1,
        block_ids: vec![1, 2],
        actor_id: PEER,
        actor_username: None,
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.session.toggle_style(1, StyleFlag::Bold).unwrap();
    h.session.settle().await;

    assert!(h.gateway.block(1).unwrap().bold);
    assert!(h.session.block(1).unwrap().bold);
    assert!(h.session.take_notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flat_legacy_update_frame_is_applied() {
    let mut h = open(vec![text(5, 0, "old")]).await;

    h.session.handle_frame(
        r#"{"type":"block_updated","block_id":5,"content":"new","updated_by":2,"updated_by_username":"ann","timestamp":"2024-01-01T00:00:00"}"#,
    );

    assert_eq!(contents(&h.session), vec!["new"]);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_list_strips_mixed_markers() {
    let mut h = open(vec![typed(1, 0, BlockType::BulletList, "• a\nb\n• c")]).await;

    h.session.toggle_list(1, BlockType::BulletList).unwrap();
    h.session.settle().await;

    let block = h.session.block(1).unwrap();
    assert_eq!(block.block_type, BlockType::Text);
    assert_eq!(block.content, "a\nb\nc");
    assert_eq!(h.gateway.block(1).unwrap().content, "a\nb\nc");
}

#[tokio::test(start_paused = true)]
async fn test_toggle_list_numbers_unmarked_lines() {
    let mut h = open(vec![text(1, 0, "a\n• b")]).await;

    h.session.toggle_list(1, BlockType::NumberedList).unwrap();
    h.session.settle().await;

    let block = h.session.block(1).unwrap();
    assert_eq!(block.block_type, BlockType::NumberedList);
    assert_eq!(block.content, "1. a\n2. b");
    assert!(matches!(
        h.session.toggle_list(1, BlockType::Heading),
        Err(EditorError::NotAList(BlockType::Heading))
    ));
}
