// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use work_queue_core::{
    ClientEvent, ProtocolMessage, StaticWorkSource, WorkCoordinator, WorkerAction, WorkerId,
};

fn coordinator(work: &[&str]) -> WorkCoordinator {
    WorkCoordinator::new(work.iter().map(|w| w.to_string()))
}

fn message(worker_id: WorkerId, message: ProtocolMessage) -> ClientEvent {
    ClientEvent::MessageReceived {
        worker_id,
        payload: message.encode(),
    }
}

fn heartbeat(worker_id: WorkerId) -> ClientEvent {
    message(worker_id, ProtocolMessage::Heartbeat)
}

fn result(worker_id: WorkerId, count: u64) -> ClientEvent {
    message(worker_id, ProtocolMessage::Result(count))
}

fn work(item: &str) -> WorkerAction {
    WorkerAction::SendMessage(ProtocolMessage::Work(item.to_string()).encode())
}

/// Queue plus assignments, sorted, for conservation checks
fn outstanding(coordinator: &WorkCoordinator, workers: &[WorkerId]) -> Vec<String> {
    let mut items: Vec<String> = coordinator.work_left().map(String::from).collect();
    items.extend(
        workers
            .iter()
            .filter_map(|id| coordinator.assigned(*id))
            .map(String::from),
    );
    items.sort();
    items
}

// ============================================================
// work queue operations
// ============================================================

#[test]
fn test_assign_work_pops_in_fifo_order() {
    let mut coordinator = coordinator(&["a", "b", "c"]);

    assert_eq!(coordinator.assign_work(0), Some("a".to_string()));
    assert_eq!(coordinator.assign_work(1), Some("b".to_string()));
    assert_eq!(coordinator.assigned(0), Some("a"));
    assert_eq!(coordinator.assigned(1), Some("b"));
    assert_eq!(coordinator.queue_len(), 1);
}

#[test]
fn test_assign_work_never_double_books_a_worker() {
    let mut coordinator = coordinator(&["a", "b"]);

    assert_eq!(coordinator.assign_work(7), Some("a".to_string()));
    assert_eq!(coordinator.assign_work(7), None);
    assert_eq!(coordinator.assigned(7), Some("a"));
    assert_eq!(coordinator.assigned_count(), 1);
    assert_eq!(coordinator.queue_len(), 1);
}

#[test]
fn test_assign_work_on_empty_queue() {
    let mut coordinator = coordinator(&[]);

    assert_eq!(coordinator.assign_work(0), None);
    assert_eq!(coordinator.assigned(0), None);
}

#[test]
fn test_finish_work_is_idempotent() {
    let mut coordinator = coordinator(&["a"]);
    coordinator.assign_work(0);

    coordinator.finish_work(0);
    coordinator.finish_work(0);
    coordinator.finish_work(3);

    assert_eq!(coordinator.assigned(0), None);
    assert!(coordinator.work_finished());
}

#[test]
fn test_remove_worker_requeues_at_tail() {
    let mut coordinator = coordinator(&["a", "b", "c"]);
    coordinator.assign_work(0);

    coordinator.remove_worker(0);

    let queue: Vec<&str> = coordinator.work_left().collect();
    assert_eq!(queue, vec!["b", "c", "a"]);
    assert_eq!(coordinator.assigned(0), None);
}

#[test]
fn test_remove_worker_without_assignment_is_noop() {
    let mut coordinator = coordinator(&["a"]);

    coordinator.remove_worker(4);
    coordinator.remove_worker(4);

    let queue: Vec<&str> = coordinator.work_left().collect();
    assert_eq!(queue, vec!["a"]);
}

#[test]
fn test_work_conserved_across_operations() {
    let mut coordinator = coordinator(&["a", "b", "c", "d"]);
    let workers = [0, 1, 2];
    let mut expected = vec!["a", "b", "c", "d"];

    coordinator.assign_work(0);
    coordinator.assign_work(1);
    assert_eq!(outstanding(&coordinator, &workers), expected);

    coordinator.remove_worker(0);
    assert_eq!(outstanding(&coordinator, &workers), expected);

    coordinator.assign_work(2);
    coordinator.assign_work(0);
    assert_eq!(outstanding(&coordinator, &workers), expected);

    let finished = coordinator.assigned(1).map(String::from);
    coordinator.finish_work(1);
    expected.retain(|item| Some(item.to_string()) != finished);
    assert_eq!(outstanding(&coordinator, &workers), expected);

    coordinator.remove_worker(2);
    coordinator.remove_worker(0);
    assert_eq!(outstanding(&coordinator, &workers), expected);
}

#[test]
fn test_heartbeat_counts_per_worker() {
    let mut coordinator = coordinator(&[]);

    assert_eq!(coordinator.heartbeat(0), 1);
    assert_eq!(coordinator.heartbeat(0), 2);
    assert_eq!(coordinator.heartbeat(1), 1);
    assert_eq!(coordinator.heartbeats(0), 2);
    assert_eq!(coordinator.heartbeats(9), 0);
}

#[test]
fn test_from_source_keeps_order() {
    let source = StaticWorkSource::new(["x", "y", "z"]);
    let coordinator = WorkCoordinator::from_source(&source).unwrap();

    let queue: Vec<&str> = coordinator.work_left().collect();
    assert_eq!(queue, vec!["x", "y", "z"]);
}

// ============================================================
// decide
// ============================================================

#[test]
fn test_decide_connected_is_noop() {
    let mut coordinator = coordinator(&["a"]);

    assert_eq!(
        coordinator.decide(ClientEvent::Connected { worker_id: 0 }),
        WorkerAction::Noop
    );
    assert_eq!(coordinator.queue_len(), 1);
}

#[test]
fn test_decide_first_heartbeat_grants_nothing() {
    let mut coordinator = coordinator(&["a"]);

    assert_eq!(coordinator.decide(heartbeat(0)), WorkerAction::Noop);
    assert_eq!(coordinator.assigned(0), None);
}

#[test]
fn test_decide_second_heartbeat_grants_one_item() {
    let mut coordinator = coordinator(&["a", "b"]);

    coordinator.decide(heartbeat(0));
    assert_eq!(coordinator.decide(heartbeat(0)), work("a"));
    assert_eq!(coordinator.decide(heartbeat(0)), WorkerAction::Noop);
    assert_eq!(coordinator.decide(heartbeat(0)), WorkerAction::Noop);
    assert_eq!(coordinator.assigned(0), Some("a"));
    assert_eq!(coordinator.queue_len(), 1);
}

#[test]
fn test_decide_ignores_undecodable_and_work_messages() {
    let mut coordinator = coordinator(&["a"]);

    let garbage = ClientEvent::MessageReceived {
        worker_id: 0,
        payload: b"??".to_vec(),
    };
    assert_eq!(coordinator.decide(garbage), WorkerAction::Noop);
    assert_eq!(
        coordinator.decide(message(0, ProtocolMessage::Work("a".to_string()))),
        WorkerAction::Noop
    );
    assert_eq!(coordinator.queue_len(), 1);
    assert_eq!(coordinator.aggregate(), 0);
}

#[test]
fn test_decide_result_adds_to_aggregate_and_hands_out_next() {
    let mut coordinator = coordinator(&["a", "b"]);
    coordinator.decide(heartbeat(0));
    coordinator.decide(heartbeat(0));

    assert_eq!(coordinator.decide(result(0, 5)), work("b"));
    assert_eq!(coordinator.aggregate(), 5);
    assert_eq!(coordinator.assigned(0), Some("b"));
}

#[test]
fn test_decide_result_without_more_work_is_noop() {
    let mut coordinator = coordinator(&["a", "b"]);
    coordinator.decide(heartbeat(0));
    coordinator.decide(heartbeat(0));
    coordinator.decide(heartbeat(1));
    coordinator.decide(heartbeat(1));

    assert_eq!(coordinator.decide(result(0, 1)), WorkerAction::Noop);
    assert!(!coordinator.work_finished());
}

#[test]
fn test_decide_disconnect_requeues_and_forgets_heartbeats() {
    let mut coordinator = coordinator(&["a", "b"]);
    coordinator.decide(heartbeat(0));
    coordinator.decide(heartbeat(0));

    assert_eq!(
        coordinator.decide(ClientEvent::Disconnected { worker_id: 0 }),
        WorkerAction::Noop
    );
    let queue: Vec<&str> = coordinator.work_left().collect();
    assert_eq!(queue, vec!["b", "a"]);
    assert_eq!(coordinator.assigned(0), None);
    assert_eq!(coordinator.heartbeats(0), 0);
}

#[test]
fn test_decide_exit_once_finished() {
    let mut coordinator = coordinator(&[]);

    assert!(coordinator.work_finished());
    assert_eq!(
        coordinator.decide(ClientEvent::Connected { worker_id: 0 }),
        WorkerAction::Exit
    );
    assert_eq!(coordinator.decide(heartbeat(0)), WorkerAction::Exit);
    assert_eq!(coordinator.decide(result(0, 3)), WorkerAction::Exit);
    assert_eq!(
        coordinator.decide(ClientEvent::Disconnected { worker_id: 0 }),
        WorkerAction::Exit
    );
    assert_eq!(coordinator.aggregate(), 0);
}

// ============================================================
// scenarios
// ============================================================

#[test]
fn test_scenario_single_worker_drains_queue() {
    let mut coordinator = coordinator(&["a", "b"]);

    assert_eq!(
        coordinator.decide(ClientEvent::Connected { worker_id: 0 }),
        WorkerAction::Noop
    );
    assert_eq!(coordinator.decide(heartbeat(0)), WorkerAction::Noop);
    assert_eq!(coordinator.decide(heartbeat(0)), work("a"));

    assert_eq!(coordinator.decide(result(0, 3)), work("b"));
    assert_eq!(coordinator.aggregate(), 3);

    assert_eq!(coordinator.decide(result(0, 4)), WorkerAction::Exit);
    assert_eq!(coordinator.aggregate(), 7);
    assert!(coordinator.work_finished());
    assert_eq!(coordinator.decide(heartbeat(0)), WorkerAction::Exit);
}

#[test]
fn test_scenario_lost_worker_item_is_reassigned() {
    let mut coordinator = coordinator(&["a", "b"]);

    coordinator.decide(heartbeat(1));
    assert_eq!(coordinator.decide(heartbeat(1)), work("a"));
    coordinator.decide(heartbeat(2));
    assert_eq!(coordinator.decide(heartbeat(2)), work("b"));

    coordinator.decide(ClientEvent::Disconnected { worker_id: 1 });
    let queue: Vec<&str> = coordinator.work_left().collect();
    assert_eq!(queue, vec!["a"]);
    assert_eq!(coordinator.assigned(1), None);

    assert_eq!(coordinator.decide(result(2, 10)), work("a"));
    assert_eq!(coordinator.decide(result(2, 20)), WorkerAction::Exit);
    assert_eq!(coordinator.aggregate(), 30);
}

#[test]
fn test_scenario_timed_out_item_goes_to_next_worker() {
    let mut coordinator = coordinator(&["a"]);
    coordinator.decide(heartbeat(0));
    assert_eq!(coordinator.decide(heartbeat(0)), work("a"));

    // Worker 0 times out, worker 1 picks the item up again
    coordinator.decide(ClientEvent::Disconnected { worker_id: 0 });
    coordinator.decide(heartbeat(1));
    assert_eq!(coordinator.decide(heartbeat(1)), work("a"));

    assert_eq!(coordinator.decide(result(1, 2)), WorkerAction::Exit);
    assert_eq!(coordinator.aggregate(), 2);
}
