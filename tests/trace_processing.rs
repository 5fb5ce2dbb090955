//! End-to-end processing of synthetic COBOL runtime traces.

use cobtrace::linkage::{EXECUTION_PATH, LINKAGE, SQL_STATEMENTS};
use cobtrace::trace::models::StatTag;
use cobtrace::{
    source, CallKind, CobolTraceProcessor, FrameId, ProcessorConfig, StatementId, TraceError,
    TraceRun,
};

/// Format one trace line the way the runtime writes it.
fn line(n: u64, body: &str) -> String {
    format!("10:00:{:02}.{:03} {n} 0.{n:03} 0.001 {body}", n / 1000, n % 1000)
}

fn trace(bodies: &[&str]) -> String {
    bodies
        .iter()
        .enumerate()
        .map(|(i, body)| line(i as u64 + 1, body) + "\n")
        .collect()
}

fn run_trace(bodies: &[&str]) -> TraceRun {
    source::process_str(&trace(bodies), ProcessorConfig::default()).unwrap()
}

fn assert_well_formed(run: &TraceRun) {
    for (index, frame) in run.frames().iter().enumerate() {
        let id = FrameId(index);
        if let Some(stop) = frame.stop_line() {
            assert!(stop >= frame.start_line, "frame {index} stops before it starts");
        }
        assert!(
            run.ancestors(id).all(|a| a != id),
            "frame {index} is its own ancestor"
        );
        match frame.parent() {
            Some(parent) => {
                let count = run
                    .frame(parent)
                    .children()
                    .iter()
                    .filter(|&&c| c == id)
                    .count();
                assert_eq!(count, 1, "frame {index} listed {count} times by its parent");
                assert!(!run.is_root(id));
            }
            None => assert!(run.is_root(id), "frame {index} is detached"),
        }
    }
}

#[test]
fn test_single_program_with_bound_select() {
    let run = run_trace(&[
        ">>> start Nest=00 FuncA",
        "#3 RC=0 COM Stmt=SELECT X FROM T WHERE K = :1",
        "#3 Bind-1, type=SQLPSTD, length=4, value=1",
        "<<< end Nest=00 FuncA Dur=0.02",
    ]);

    assert_eq!(run.roots().len(), 1);
    let root = run.frame(run.roots()[0]);
    assert_eq!(root.function, "FuncA");
    assert_eq!(root.duration, 0.02);
    assert_eq!(root.stop_line(), Some(4));

    assert_eq!(root.children().len(), 1);
    let sql = run.frame(root.children()[0]);
    assert_eq!(sql.kind, CallKind::CobolSql);
    assert_eq!(sql.key.cursor(), Some(3));

    let statement = run.statement(sql.statement.unwrap());
    assert_eq!(statement.binds.len(), 1);
    assert_eq!(statement.binds[0].type_tag, "SQLPSTD");
    assert_eq!(statement.binds[0].length(), Some(4));
    assert_eq!(statement.binds[0].value, "1");

    assert_eq!(
        run.statistic(EXECUTION_PATH, "Error Calls").unwrap().value,
        "0"
    );
    assert_eq!(
        run.statistic(EXECUTION_PATH, "Total Calls").unwrap().value,
        "2"
    );
    let depth = run.statistic(EXECUTION_PATH, "Maximum Call Depth").unwrap();
    assert_eq!(depth.value, "2");
    assert_eq!(depth.tag, Some(StatTag::Frame(root.children()[0])));
    assert_well_formed(&run);
}

#[test]
fn test_statement_error_marks_only_its_ancestors() {
    let run = run_trace(&[
        ">>> start Nest=01 FuncA",
        ">>> start Nest=02 FuncB",
        "#2 RC=0 COM Stmt=UPDATE PS_JOB SET X = :1 WHERE EMPLID = :2",
        "#2 RC=942 EPO error pos=7",
        "#2 RC=942 ERR rtncd=942 msg=table or view does not exist",
        "<<< end Nest=02 FuncB",
        ">>> start Nest=02 FuncC",
        "<<< end Nest=02 FuncC",
        "<<< end Nest=01 FuncA",
    ]);

    let by_name = |name: &str| {
        run.frames()
            .iter()
            .find(|f| f.function == name)
            .unwrap()
    };
    assert!(by_name("FuncA").has_error);
    assert!(by_name("FuncB").has_error);
    assert!(!by_name("FuncC").has_error);

    let statement = &run.statements()[0];
    assert!(statement.is_error);
    let error = statement.error.as_ref().unwrap();
    assert_eq!(error.position, Some(7));
    assert_eq!(error.return_code, Some(942));
    assert_eq!(
        error.message.as_deref(),
        Some("table or view does not exist")
    );

    assert_eq!(
        run.statistic(EXECUTION_PATH, "Error Calls").unwrap().value,
        "3"
    );
    assert_eq!(run.sql_by_where.len(), 1);
    assert!(run.sql_by_where[0].has_error);
    assert_well_formed(&run);
}

#[test]
fn test_reexecution_error_stays_under_its_own_root() {
    let run = run_trace(&[
        ">>> start Nest=00 FuncA",
        "#3 RC=0 COM Stmt=SELECT A FROM T WHERE K = :1",
        "#3 Bind-1, type=SQLPSTD, length=4, value=1",
        "<<< end Nest=00 FuncA",
        ">>> start Nest=00 FuncB",
        "#4 RC=0 COM Stmt=SELECT B FROM U",
        "#3 RC=0 Commit",
        "#3 RC=942 EPO error pos=7",
        "<<< end Nest=00 FuncB",
    ]);

    assert_eq!(run.roots().len(), 2);
    let (func_a, func_b) = (run.roots()[0], run.roots()[1]);
    assert_eq!(run.frame(func_a).function, "FuncA");
    assert_eq!(run.frame(func_b).function, "FuncB");

    // Both executions of cursor 3 share one statement, now at line 7.
    let first = run.frame(func_a).children()[0];
    let again = run
        .frames()
        .iter()
        .position(|f| f.start_line == 7)
        .map(FrameId)
        .unwrap();
    assert_eq!(run.statements()[0].line_number, 7);
    assert!(run.statements()[0].is_error);

    assert_eq!(run.frame(again).statement, Some(StatementId(0)));
    assert!(run.frame(again).has_error);
    assert!(run.frame(func_b).has_error);

    assert_eq!(run.frame(first).statement, None);
    assert!(!run.frame(first).has_error);
    assert!(!run.frame(func_a).has_error);

    assert_eq!(
        run.statistic(LINKAGE, "Unresolved SQL Frames").unwrap().value,
        "1"
    );
    assert_eq!(
        run.statistic(EXECUTION_PATH, "Error Calls").unwrap().value,
        "2"
    );
    assert_well_formed(&run);
}

#[test]
fn test_cursor_reuse_creates_distinct_statements() {
    let run = run_trace(&[
        ">>> start Nest=01 FuncA",
        "#3 RC=0 COM Stmt=SELECT A FROM T WHERE K = :1",
        "#3 Bind-1, type=SQLPSTD, length=4, value=1",
        "#3 Bind-2, type=SQLPSTD, length=4, value=2",
        "#3 RC=0 COM Stmt=SELECT B FROM T WHERE K = :1",
        "#3 Bind-1, type=SQLPSTD, length=4, value=9",
        "<<< end Nest=01 FuncA",
    ]);

    let statements = run.statements();
    assert_eq!(statements.len(), 2);
    assert_ne!(statements[0].id, statements[1].id);
    assert_eq!(
        statements[0]
            .binds
            .iter()
            .map(|b| b.value.as_str())
            .collect::<Vec<_>>(),
        vec!["1", "2"]
    );
    assert_eq!(statements[1].binds.len(), 1);
    assert_eq!(statements[1].binds[0].value, "9");

    // The second execution on cursor 3 closed the first as a sibling.
    let root = run.frame(run.roots()[0]);
    assert_eq!(root.children().len(), 2);
    assert_eq!(run.frame(root.children()[0]).stop_line(), Some(5));
    assert_well_formed(&run);
}

#[test]
fn test_stack_traces_attach_with_one_line_slack() {
    let text = trace(&[
        ">>> start Nest=01 FuncA",
        ">>> start Nest=02 FuncB",
        "<<< end Nest=02 FuncB",
        ">>> start Nest=02 FuncC",
        "<<< end Nest=02 FuncC",
        "<<< end Nest=01 FuncA",
    ]);

    let mut run = TraceRun::new();
    let in_b = run.add_stack_trace(3, "failure in FuncB");
    let after_a = run.add_stack_trace(7, "printed after FuncA returned");
    let lost = run.add_stack_trace(10, "no frame here");

    let mut processor = CobolTraceProcessor::default();
    source::process_reader(&mut processor, &mut run, text.as_bytes()).unwrap();

    let frame_named = |name: &str| {
        FrameId(
            run.frames()
                .iter()
                .position(|f| f.function == name)
                .unwrap(),
        )
    };
    let (a, b, c) = (
        frame_named("FuncA"),
        frame_named("FuncB"),
        frame_named("FuncC"),
    );

    assert_eq!(run.stack_traces[in_b].frame, Some(b));
    assert_eq!(run.stack_traces[after_a].frame, Some(a));
    assert_eq!(run.stack_traces[lost].frame, None);
    assert_eq!(run.stack_traces.len(), 3);
    assert_eq!(run.frame(b).stack_trace, Some(in_b));

    assert!(run.frame(a).has_error);
    assert!(run.frame(b).has_error);
    assert!(!run.frame(c).has_error);
    assert_eq!(
        run.statistic(LINKAGE, "Unresolved Stack Traces")
            .unwrap()
            .value,
        "1"
    );
}

#[test]
fn test_mixed_trace_is_well_formed() {
    let run = run_trace(&[
        "PSAPPSRV started",
        ">>> start Nest=01 Main",
        "GETSTMT Stmt=PSJOB_S",
        "#1 RC=0 COM Stmt=SELECT EMPLID FROM PS_JOB WHERE EFFDT <= :1 ORDER BY 1",
        "#1 Bind-1, type=SQLPSTD, length=10, value=2024-01-01",
        "#1 RC=0 Fetch",
        "#1 RC=0 Fetch",
        ">>> call Nest=02 Helper",
        "#2 RC=0 CEX Stmt=DELETE FROM PS_TEMP WHERE ID = :1",
        "#2 Bind-1, type=SQLPSPD, precision=8, scale=0, value=42",
        "<<< end Nest=02 Helper",
        ">>> start-ext Nest=03 Remote",
        "#1 RC=0 Commit",
        "<<< end-ext Nest=03 Remote Dur=1.5",
        "#1 RC=0 Disconnect",
        "<<< end Nest=01 Main Dur=2",
    ]);

    assert_well_formed(&run);
    assert_eq!(run.roots().len(), 1);

    let kinds: Vec<CallKind> = run.frames().iter().map(|f| f.kind).collect();
    assert!(kinds.contains(&CallKind::Call));
    assert!(kinds.contains(&CallKind::External));

    let select = &run.statements()[0];
    assert_eq!(select.name.as_deref(), Some("PSJOB_S"));
    assert_eq!(select.fetch_count, 2);
    assert_eq!(select.tables(), ["PS_JOB"]);

    let delete = &run.statements()[1];
    assert_eq!(delete.binds[0].precision(), Some(8));
    assert_eq!(delete.from_clause(), "PS_TEMP");

    assert_eq!(
        run.statistic(SQL_STATEMENTS, "Total Count").unwrap().value,
        "2"
    );
    let fetches = run.statistic(SQL_STATEMENTS, "Most Fetches").unwrap();
    assert_eq!(fetches.value, "2");
    assert!(run.frames().iter().all(|f| !f.is_open()));
}

#[test]
fn test_unmatched_end_halts_the_run() {
    let err = source::process_str(
        &trace(&[">>> start Nest=01 FuncA", "<<< end Nest=09 Nobody"]),
        ProcessorConfig::default(),
    )
    .unwrap_err();

    match err {
        TraceError::UnmatchedEnd {
            nest,
            function,
            line_number,
        } => {
            assert_eq!(nest, "09");
            assert_eq!(function, "Nobody");
            assert_eq!(line_number, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_independent_runs_in_parallel() {
    let text = trace(&[
        ">>> start Nest=01 FuncA",
        "#1 RC=0 COM Stmt=SELECT 1 FROM DUAL",
        "<<< end Nest=01 FuncA",
    ]);

    let runs: Vec<TraceRun> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| source::process_str(&text, ProcessorConfig::default())))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    for run in &runs {
        assert_eq!(run.frames().len(), 2);
        assert_eq!(run.frames()[0].id, runs[0].frames()[0].id);
        assert_eq!(run.statements()[0].sql_id(), "bunvx480ynf57");
    }
}
