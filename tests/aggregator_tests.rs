//! Call-tree reconstruction scenarios.
//!
//! Each test feeds a hand-written event stream through a session
//! aggregator and asserts the shape of the resulting aggregated tree:
//! statement labels, hit counts, and parent/child structure. The
//! streams cover well-formed traces, repeated calls that must merge,
//! and malformed traces missing start or stop events.

use altrace_studio::aggregator::{
    CallTree, EventKind, EventSubType, NodeId, ProfilerEvent, SessionAggregator,
    START_EVENT_IS_MISSING, STOP_EVENT_IS_MISSING,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn al(kind: EventKind, name: &str) -> ProfilerEvent {
    ProfilerEvent {
        session_id: 1,
        kind,
        sub_type: EventSubType::AlEvent,
        object_type: Arc::from("CodeUnit"),
        object_id: 1,
        line_no: 0,
        statement: Arc::from(name),
        timestamp_msec: 0.0,
    }
}

fn al_start(name: &str) -> ProfilerEvent {
    al(EventKind::StartMethod, name)
}

fn al_stop(name: &str) -> ProfilerEvent {
    al(EventKind::StopMethod, name)
}

fn al_stmt(name: &str) -> ProfilerEvent {
    al(EventKind::Statement, name)
}

fn non_al(kind: EventKind, sub_type: EventSubType, name: &str) -> ProfilerEvent {
    ProfilerEvent {
        session_id: 1,
        kind,
        sub_type,
        object_type: Arc::from(""),
        object_id: 0,
        line_no: 0,
        statement: Arc::from(name),
        timestamp_msec: 0.0,
    }
}

fn sql_start(name: &str) -> ProfilerEvent {
    non_al(EventKind::StartMethod, EventSubType::SqlEvent, name)
}

fn sql_stop(name: &str) -> ProfilerEvent {
    non_al(EventKind::StopMethod, EventSubType::SqlEvent, name)
}

fn sys_start(name: &str) -> ProfilerEvent {
    non_al(EventKind::StartMethod, EventSubType::SystemEvent, name)
}

fn sys_stop(name: &str) -> ProfilerEvent {
    non_al(EventKind::StopMethod, EventSubType::SystemEvent, name)
}

/// Feed the events with sequential timestamps and finalize the tree.
fn run(events: Vec<ProfilerEvent>) -> SessionAggregator {
    let mut aggregator = SessionAggregator::new(1, 0.0);
    for (index, mut event) in events.into_iter().enumerate() {
        event.timestamp_msec = index as f64;
        aggregator.apply(event);
    }
    aggregator.finish_aggregation(true);
    aggregator
}

/// Expected shape of one aggregated node.
struct Expect {
    statement: String,
    hit_count: u32,
    children: Vec<Expect>,
}

fn n(statement: impl Into<String>, hit_count: u32, children: Vec<Expect>) -> Expect {
    Expect {
        statement: statement.into(),
        hit_count,
        children,
    }
}

fn assert_node(tree: &CallTree, id: NodeId, expected: &Expect) {
    let node = tree.node(id);
    assert_eq!(&*node.statement, expected.statement);
    assert_eq!(
        node.hit_count, expected.hit_count,
        "hit count of {:?}",
        expected.statement
    );

    let children = tree.children(id);
    assert_eq!(
        children.len(),
        expected.children.len(),
        "children of {:?}",
        expected.statement
    );
    for (&child, expect) in children.iter().zip(&expected.children) {
        assert_node(tree, child, expect);
    }
}

fn assert_tree(aggregator: &SessionAggregator, expected: &[Expect]) {
    let tree = aggregator.tree();
    let children = tree.children(tree.root());
    assert_eq!(children.len(), expected.len(), "children of the root");
    for (&child, expect) in children.iter().zip(expected) {
        assert_node(tree, child, expect);
    }
}

// foo();
// SQL QUERY
//
// foo()
//     var1 += 1;
#[test]
fn test_sql_query_after_function_call() {
    let aggregator = run(vec![
        al_stmt("foo"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
        sql_start("SQL"),
        sql_stop("SQL"),
    ]);

    assert_tree(
        &aggregator,
        &[
            n("foo", 1, vec![n("var1 += 1", 1, vec![])]),
            n("SQL", 1, vec![]),
        ],
    );
}

// OpenConnection - Start
// foo();
// SQL QUERY
// OpenConnection - Stop
//
// foo()
//     var1 += 1;
#[test]
fn test_al_method_nested_into_system_call() {
    let aggregator = run(vec![
        sys_start("OpenConnection"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
        sql_start("SQL"),
        sql_stop("SQL"),
        sys_stop("OpenConnection"),
    ]);

    assert_tree(
        &aggregator,
        &[n(
            "OpenConnection",
            1,
            vec![
                n("foo", 1, vec![n("var1 += 1", 1, vec![])]),
                n("SQL", 1, vec![]),
            ],
        )],
    );
}

// Same as above, followed by two stop events whose starts were lost.
// Each stray stop must leave a zero-duration marker and nothing else.
#[test]
fn test_stray_stops_leave_missing_start_markers() {
    let aggregator = run(vec![
        sys_start("OpenConnection"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
        sql_start("SQL"),
        sql_stop("SQL"),
        al_stop("foo1"),
        al_stop("foo2"),
        sys_stop("OpenConnection"),
    ]);

    assert_tree(
        &aggregator,
        &[n(
            "OpenConnection",
            1,
            vec![
                n("foo", 1, vec![n("var1 += 1", 1, vec![])]),
                n("SQL", 1, vec![]),
                n(format!("{START_EVENT_IS_MISSING}foo1"), 1, vec![]),
                n(format!("{START_EVENT_IS_MISSING}foo2"), 1, vec![]),
            ],
        )],
    );
}

// SQL QUERY1 - Start
// SQL QUERY2 - Start
// SQL QUERY2 - Stop
//
// SQL calls cannot nest, so the second start proves the first query's
// stop was lost.
#[test]
fn test_missing_sql_stop_followed_by_sql_event() {
    let aggregator = run(vec![
        sql_start("SQL1"),
        sql_start("SQL2"),
        sql_stop("SQL2"),
    ]);

    assert_tree(
        &aggregator,
        &[
            n("SQL1", 1, vec![]),
            n(format!("{STOP_EVENT_IS_MISSING}SQL1"), 1, vec![]),
            n("SQL2", 1, vec![]),
        ],
    );
}

// SQL QUERY1 - Start
// AL Event - Start
// AL Event - Stop
#[test]
fn test_missing_sql_stop_followed_by_al_event() {
    let aggregator = run(vec![sql_start("SQL1"), al_start("AL"), al_stop("AL")]);

    assert_tree(
        &aggregator,
        &[
            n("SQL1", 1, vec![]),
            n(format!("{STOP_EVENT_IS_MISSING}SQL1"), 1, vec![]),
            n("AL", 1, vec![]),
        ],
    );
}

// OpenConnection - Start. AL event
// SQL QUERY1
// SQL QUERY2
// OpenConnection - Stop. AL event
#[test]
fn test_two_sql_queries_nested_into_al_call() {
    let aggregator = run(vec![
        al_start("OpenConnection"),
        sql_start("SQL1"),
        sql_stop("SQL1"),
        sql_start("SQL2"),
        sql_stop("SQL2"),
        al_stop("OpenConnection"),
    ]);

    assert_tree(
        &aggregator,
        &[n(
            "OpenConnection",
            1,
            vec![n("SQL1", 1, vec![]), n("SQL2", 1, vec![])],
        )],
    );
}

// OpenConnection - Start
// SQL QUERY1
// SQL QUERY2
// OpenConnection - Stop
#[test]
fn test_two_sql_queries_nested_into_system_call() {
    let aggregator = run(vec![
        sys_start("OpenConnection"),
        sql_start("SQL1"),
        sql_stop("SQL1"),
        sql_start("SQL2"),
        sql_stop("SQL2"),
        sys_stop("OpenConnection"),
    ]);

    assert_tree(
        &aggregator,
        &[n(
            "OpenConnection",
            1,
            vec![n("SQL1", 1, vec![]), n("SQL2", 1, vec![])],
        )],
    );
}

// foo();
// foo();
//
// foo()
//     var1 += 1;
//
// The second call must merge into the node created by the first one.
#[test]
fn test_repeated_function_statement_merges() {
    let aggregator = run(vec![
        al_stmt("foo"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
        al_stmt("foo"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
    ]);

    assert_tree(
        &aggregator,
        &[n("foo", 2, vec![n("var1 += 1", 2, vec![])])],
    );

    // Timestamps are sequential, so each of the two occurrences of foo
    // spans three units.
    let tree = aggregator.tree();
    let foo = tree.children(tree.root())[0];
    assert_eq!(tree.node(foo).duration_msec, 6.0);
    assert_eq!(tree.node(foo).min_duration_msec, 3.0);
    assert_eq!(tree.node(foo).max_duration_msec, 3.0);
}

/// One iteration of the FOR loop body in the nested-functions trace.
fn push_loop_iteration(events: &mut Vec<ProfilerEvent>) {
    events.extend([
        al_stmt("foo"),
        al_start("foo"),
        al_stmt("SELECTLATESTVERSION"),
        al_stmt("r.FINDFIRST"),
        sql_start("SELECT"),
        sql_stop("SELECT"),
        al_stmt("var1 += 1"),
        al_stmt("SLEEP(1000)"),
        al_stmt("foo1"),
        al_start("foo1"),
        al_stmt("foo2"),
        al_start("foo2"),
        al_stmt("var1 += 1"),
        al_stmt("MESSAGE('Hi!')"),
        al_stop("foo2"),
        al_stmt("var1 += 1"),
        al_stop("foo1"),
        al_stop("foo"),
    ]);
}

// FOR i:= 1 TO 3 DO
//     foo();
//
// foo()
//     SELECTLATESTVERSION;
//     r.FINDFIRST;
//     var1 += 1;
//     SLEEP(1000);
//     foo1;
//
// foo1()
//     foo2;
//     var1 += 1;
//
// foo2()
//     var1 += 1;
//     MESSAGE('Hi!');
#[test]
fn test_nested_functions_in_a_loop() {
    let mut events = vec![al_stmt("FOR i:= 1"), al_stmt("3")];
    push_loop_iteration(&mut events);
    push_loop_iteration(&mut events);
    push_loop_iteration(&mut events);

    let aggregator = run(events);

    assert_tree(
        &aggregator,
        &[
            n("FOR i:= 1", 1, vec![]),
            n("3", 1, vec![]),
            n(
                "foo",
                3,
                vec![
                    n("SELECTLATESTVERSION", 3, vec![]),
                    n("r.FINDFIRST", 3, vec![n("SELECT", 3, vec![])]),
                    n("var1 += 1", 3, vec![]),
                    n("SLEEP(1000)", 3, vec![]),
                    n(
                        "foo1",
                        3,
                        vec![
                            n(
                                "foo2",
                                3,
                                vec![n("var1 += 1", 3, vec![]), n("MESSAGE('Hi!')", 3, vec![])],
                            ),
                            n("var1 += 1", 3, vec![]),
                        ],
                    ),
                ],
            ),
        ],
    );
}

// IF predicate1 OR predicate2 THEN
//     i := 0;
//
// Both predicate calls collapse into the IF statement node; their
// bodies become its children.
#[test]
fn test_short_circuit_predicates_collapse_into_statement() {
    let aggregator = run(vec![
        al_stmt("IF predicate1 OR predicate2"),
        al_start("predicate1"),
        al_stmt("p1 += 1"),
        al_stmt("EXIT(FALSE)"),
        al_stop("predicate1"),
        al_start("predicate2"),
        al_stmt("p2 += 1"),
        al_stmt("EXIT(TRUE)"),
        al_stop("predicate2"),
        al_stmt("i := 0"),
    ]);

    assert_tree(
        &aggregator,
        &[
            n(
                "IF predicate1 OR predicate2",
                1,
                vec![
                    n("p1 += 1", 1, vec![]),
                    n("EXIT(FALSE)", 1, vec![]),
                    n("p2 += 1", 1, vec![]),
                    n("EXIT(TRUE)", 1, vec![]),
                ],
            ),
            n("i := 0", 1, vec![]),
        ],
    );
}

// Two top-level actions, back to back. The second start event must
// close the first method instead of nesting inside it.
#[test]
fn test_two_root_methods() {
    let aggregator = run(vec![
        al_start("Clear Codeunit 1 calls - OnAction"),
        al_stmt("codeUnit1Call := FALSE"),
        al_stmt("EXIT"),
        al_stop("Clear Codeunit 1 calls - OnAction"),
        al_start("Stop - OnAction"),
        al_stmt("ProfilerStarted := FALSE"),
        al_stmt("SLEEP(5000)"),
    ]);

    assert_tree(
        &aggregator,
        &[
            n(
                "Clear Codeunit 1 calls - OnAction",
                1,
                vec![
                    n("codeUnit1Call := FALSE", 1, vec![]),
                    n("EXIT", 1, vec![]),
                ],
            ),
            n(
                "Stop - OnAction",
                1,
                vec![
                    n("ProfilerStarted := FALSE", 1, vec![]),
                    n("SLEEP(5000)", 1, vec![]),
                ],
            ),
        ],
    );
}

// RootMethod; // 1
// RootMethod; // 2
//
// RootMethod()
//     rec1.DELETEALL;  // issues a call to foo() the first time only
//     rec2.DELETEALL;
//
// foo()
//     var1 += 1;
//
// The same statement is executed twice but only the first execution
// issues a method call; both executions still merge into one node.
#[test]
fn test_same_statement_called_twice_with_and_without_call() {
    let aggregator = run(vec![
        al_start("RootMethod"),
        al_stmt("rec1.DELETEALL"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
        al_stmt("rec2.DELETEALL"),
        al_stop("RootMethod"),
        al_start("RootMethod"),
        al_stmt("rec1.DELETEALL"),
        al_stmt("rec2.DELETEALL"),
        al_stop("RootMethod"),
    ]);

    assert_tree(
        &aggregator,
        &[n(
            "RootMethod",
            2,
            vec![
                n("rec1.DELETEALL", 2, vec![n("var1 += 1", 1, vec![])]),
                n("rec2.DELETEALL", 2, vec![]),
            ],
        )],
    );
}

#[test]
fn test_threshold_prunes_fast_statements() {
    let mut aggregator = SessionAggregator::new(1, 5.0);

    let feed = |aggregator: &mut SessionAggregator, mut event: ProfilerEvent, ts: f64| {
        event.timestamp_msec = ts;
        aggregator.apply(event);
    };

    feed(&mut aggregator, al_start("OnRun"), 0.0);
    feed(&mut aggregator, al_stmt("fast"), 1.0);
    feed(&mut aggregator, al_stmt("slow"), 2.0);
    feed(&mut aggregator, al_stop("OnRun"), 50.0);
    aggregator.finish_aggregation(true);

    // "fast" ran for 1 ms and falls below the 5 ms threshold.
    assert_tree(&aggregator, &[n("OnRun", 1, vec![n("slow", 1, vec![])])]);
}

#[test]
fn test_flatten_reports_nodes_in_execution_order() {
    let mut aggregator = run(vec![
        al_stmt("foo"),
        al_start("foo"),
        al_stmt("var1 += 1"),
        al_stop("foo"),
        sql_start("SQL"),
        sql_stop("SQL"),
    ]);

    let flattened: Vec<(String, u32)> = aggregator
        .flatten_call_tree()
        .map(|view| (view.node().statement.to_string(), view.depth()))
        .collect();

    assert_eq!(
        flattened,
        vec![
            ("Session 1".to_string(), 0),
            ("foo".to_string(), 1),
            ("var1 += 1".to_string(), 2),
            ("SQL".to_string(), 1),
        ],
    );
}
