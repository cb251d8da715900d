//! Session-level scheduling tests.
//!
//! These drive a [`Session`] through an in-memory executor so they can count
//! executions and observe which thread ran each command.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, SystemTime};

use boson::{Config, Deps, Error, Executor, Invocation, Outcome, Session, WaitGroup};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// In-memory executor recording `(key, thread)` for every execution.
///
/// `fail` exits unsuccessfully and opens the gate, `crash` opens the gate and
/// panics, and `hold` blocks until the gate is open.
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<(String, ThreadId)>>>,
    gate: Arc<AtomicBool>,
}

impl Recorder {
    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.calls.lock().iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }

    fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Executor for Recorder {
    fn execute(&self, invocation: &Invocation) -> boson::Result<()> {
        self.calls
            .lock()
            .push((invocation.key(), thread::current().id()));
        match invocation.program() {
            "fail" => {
                self.gate.store(true, Ordering::SeqCst);
                Err(Error::CommandFailed {
                    invocation: invocation.key(),
                    status: "exit status: 2".into(),
                })
            }
            "crash" => {
                self.gate.store(true, Ordering::SeqCst);
                panic!("executor crashed on `{}`", invocation.key());
            }
            "hold" => {
                while !self.gate.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn config(dir: &Path, jobs: usize) -> Config {
    Config {
        jobs,
        ledger: dir.join(".boson-ledger"),
        ..Config::default()
    }
}

fn touch(path: &Path, offset_secs: i64) {
    let file = File::create(path).unwrap();
    let delta = Duration::from_secs(offset_secs.unsigned_abs());
    let when = if offset_secs < 0 {
        SystemTime::now() - delta
    } else {
        SystemTime::now() + delta
    };
    file.set_modified(when).unwrap();
}

// ---------------------------------------------------------------------------
// Synchronous runs
// ---------------------------------------------------------------------------

#[test]
fn commands_without_dependencies_run_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), recorder.clone()).unwrap();

    for _ in 0..2 {
        let out = session
            .run(Invocation::new("echo").arg("hi"), Deps::None)
            .unwrap();
        assert_eq!(out, Outcome::Executed);
    }
    assert_eq!(recorder.keys(), ["echo hi", "echo hi"]);
    session.close().unwrap();
}

#[test]
fn compile_step_skips_until_source_is_touched() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.c");
    touch(&src, -60);

    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 2), recorder.clone()).unwrap();
    let cc = || Invocation::new("cc").args(["-c", "a.c", "-o", "a.o"]);

    assert_eq!(session.run(cc(), Deps::paths([&src])).unwrap(), Outcome::Executed);
    assert_eq!(session.run(cc(), Deps::paths([&src])).unwrap(), Outcome::UpToDate);
    touch(&src, 60);
    assert_eq!(session.run(cc(), Deps::paths([&src])).unwrap(), Outcome::Executed);

    assert_eq!(recorder.count(), 2);
    session.close().unwrap();
}

#[test]
fn ledger_survives_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.c");
    touch(&src, -60);
    let cc = || Invocation::new("cc").args(["-c", "a.c", "-o", "a.o"]);

    let first = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), first.clone()).unwrap();
    session.run(cc(), Deps::paths([&src])).unwrap();
    session.close().unwrap();
    assert_eq!(first.count(), 1);

    let stored = std::fs::read_to_string(dir.path().join(".boson-ledger")).unwrap();
    assert!(stored.starts_with("cc -c a.c -o a.o "), "{stored:?}");

    let second = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), second.clone()).unwrap();
    assert_eq!(session.run(cc(), Deps::paths([&src])).unwrap(), Outcome::UpToDate);
    session.close().unwrap();
    assert_eq!(second.count(), 0);
}

// ---------------------------------------------------------------------------
// Async runs and wait groups
// ---------------------------------------------------------------------------

#[test]
fn wait_runs_every_task_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 3), recorder.clone()).unwrap();

    let group = WaitGroup::new();
    for i in 0..20 {
        session
            .run_async(&group, Invocation::new("job").arg(i.to_string()), Deps::None)
            .unwrap();
    }
    session.wait(&group).unwrap();

    assert!(group.is_done());
    assert_eq!(group.pending(), 0);
    let mut want: Vec<_> = (0..20).map(|i| format!("job {i}")).collect();
    want.sort();
    assert_eq!(recorder.keys(), want);
    session.close().unwrap();
}

/// Blocks commands executed on worker threads until the issuing thread has
/// executed one itself.
struct IssuerGate {
    issuer: ThreadId,
    issuer_ran: AtomicBool,
    runs: Mutex<Vec<(String, ThreadId)>>,
}

impl Executor for IssuerGate {
    fn execute(&self, invocation: &Invocation) -> boson::Result<()> {
        let me = thread::current().id();
        if me == self.issuer {
            self.issuer_ran.store(true, Ordering::SeqCst);
        } else {
            while !self.issuer_ran.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        self.runs.lock().push((invocation.key(), me));
        Ok(())
    }
}

#[test]
fn issuer_assists_a_single_worker() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(IssuerGate {
        issuer: thread::current().id(),
        issuer_ran: AtomicBool::new(false),
        runs: Mutex::new(Vec::new()),
    });
    let session = Session::with_executor(&config(dir.path(), 1), Arc::clone(&gate)).unwrap();
    assert_eq!(session.workers(), 1);

    let group = WaitGroup::new();
    for i in 0..5 {
        session
            .run_async(&group, Invocation::new("task").arg(i.to_string()), Deps::None)
            .unwrap();
    }
    session.wait(&group).unwrap();
    assert_eq!(group.pending(), 0);

    let runs = gate.runs.lock().clone();
    let mut keys: Vec<_> = runs.iter().map(|(k, _)| k.clone()).collect();
    keys.sort();
    assert_eq!(keys, ["task 0", "task 1", "task 2", "task 3", "task 4"]);
    assert!(
        runs.iter().any(|(_, id)| *id == gate.issuer),
        "issuing thread never assisted"
    );
    session.close().unwrap();
}

#[test]
fn identical_async_commands_build_once() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("gen.in");
    touch(&src, -60);

    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 4), recorder.clone()).unwrap();
    let group = WaitGroup::new();
    for _ in 0..8 {
        session
            .run_async(&group, Invocation::new("gen").arg("gen.in"), Deps::paths([&src]))
            .unwrap();
    }
    session.wait(&group).unwrap();

    assert_eq!(recorder.keys(), ["gen gen.in"]);
    session.close().unwrap();
}

#[test]
fn many_issuers_share_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 2), recorder.clone()).unwrap();
    let done = AtomicUsize::new(0);

    thread::scope(|s| {
        for t in 0..4 {
            let session = &session;
            let done = &done;
            s.spawn(move || {
                let group = WaitGroup::new();
                for i in 0..5 {
                    session
                        .run_async(&group, Invocation::new(format!("t{t}")).arg(i.to_string()), Deps::None)
                        .unwrap();
                }
                session.wait(&group).unwrap();
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    assert_eq!(done.load(Ordering::SeqCst), 4);
    assert_eq!(recorder.count(), 20);
    session.close().unwrap();
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

#[test]
fn failing_task_aborts_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), recorder.clone()).unwrap();

    let group = WaitGroup::new();
    session
        .run_async(&group, Invocation::new("fail"), Deps::None)
        .unwrap();
    session.wait(&group).unwrap_err();

    let err = session
        .run_async(&group, Invocation::new("echo"), Deps::None)
        .unwrap_err();
    assert!(matches!(err, Error::Aborted { .. }), "{err}");
    assert_eq!(group.pending(), 0);

    let err = session.run(Invocation::new("echo"), Deps::None).unwrap_err();
    match err {
        Error::Aborted { cause } => assert!(cause.contains("`fail`"), "{cause}"),
        other => panic!("expected abort, got {other}"),
    }
    assert_eq!(recorder.keys(), ["fail"]);
    session.close().unwrap();
}

#[test]
fn queued_tasks_are_discarded_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), recorder.clone()).unwrap();

    // Park the only worker inside `hold` so the issuer drains the queue.
    let group = WaitGroup::new();
    session
        .run_async(&group, Invocation::new("hold"), Deps::None)
        .unwrap();
    while recorder.count() == 0 {
        thread::yield_now();
    }

    for i in 0..50 {
        session
            .run_async(&group, Invocation::new("ok").arg(i.to_string()), Deps::None)
            .unwrap();
    }
    // Newest first: `fail` is the next command picked up.
    session
        .run_async(&group, Invocation::new("fail"), Deps::None)
        .unwrap();

    let err = session.wait(&group).unwrap_err();
    assert!(matches!(err, Error::Aborted { .. }), "{err}");
    assert_eq!(group.pending(), 0);
    assert_eq!(recorder.keys(), ["fail", "hold"]);
    session.close().unwrap();
}

#[test]
fn panicking_executor_on_worker_aborts_instead_of_hanging() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("gen.in");
    touch(&src, -60);

    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), recorder.clone()).unwrap();

    let group = WaitGroup::new();
    session
        .run_async(&group, Invocation::new("crash"), Deps::paths([&src]))
        .unwrap();
    while recorder.count() == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    match session.wait(&group).unwrap_err() {
        Error::Aborted { cause } => assert!(cause.contains("`crash` panicked"), "{cause}"),
        other => panic!("expected abort, got {other}"),
    }
    assert_eq!(group.pending(), 0);

    let record = &session.ledger().records()[0];
    assert_eq!(record.state, boson::EntryState::Complete);
    assert_eq!(record.last_success, None);

    // The worker caught the panic, so joining it succeeds.
    session.close().unwrap();
}

#[test]
fn panicking_executor_while_assisting_counts_the_task_down() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 1), recorder.clone()).unwrap();

    let group = WaitGroup::new();
    session
        .run_async(&group, Invocation::new("hold"), Deps::None)
        .unwrap();
    while recorder.count() == 0 {
        thread::yield_now();
    }
    session
        .run_async(&group, Invocation::new("crash"), Deps::None)
        .unwrap();

    let err = session.wait(&group).unwrap_err();
    assert!(matches!(err, Error::Aborted { .. }), "{err}");
    assert_eq!(group.pending(), 0);
    assert_eq!(recorder.keys(), ["crash", "hold"]);
    session.close().unwrap();
}

#[test]
fn dropping_without_close_stops_workers_and_skips_save() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.c");
    touch(&src, -60);

    let recorder = Recorder::default();
    let session = Session::with_executor(&config(dir.path(), 2), recorder.clone()).unwrap();
    let group = WaitGroup::new();
    session
        .run_async(&group, Invocation::new("cc").arg("a.c"), Deps::paths([&src]))
        .unwrap();
    session.wait(&group).unwrap();
    drop(session);

    assert_eq!(recorder.count(), 1);
    assert!(!dir.path().join(".boson-ledger").exists());
}
