use ::std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    thread,
    time::Duration,
};

use ::resampla_tasks::*;

type Job<'a> = FnTask<Box<dyn FnOnce(&TaskContext) -> Result<(), String> + Send + 'a>>;

fn job<'a>(f: impl FnOnce(&TaskContext) -> Result<(), String> + Send + 'a) -> Job<'a> { FnTask(Box::new(f)) }

#[test]
fn dependencies_run_before_dependents() {
    let executor = Executor::new(4).unwrap();
    let log = Mutex::new(Vec::new());
    let mut queue = DependentTaskQueue::new();
    let mut layer = Vec::new();
    for i in 0..4 {
        let log = &log;
        layer.push(queue.push(job(move |_| {
            thread::sleep(Duration::from_millis(2));
            log.lock().unwrap().push(("first", i));
            Ok(())
        })));
    }
    for i in 0..4 {
        let log = &log;
        queue
            .push_dependent(
                job(move |_| {
                    log.lock().unwrap().push(("second", i));
                    Ok(())
                }),
                [layer[i]],
            )
            .unwrap();
    }
    let mut reported = Vec::new();
    let summary = executor.run(queue, &CancelToken::new(), |done, total| reported.push((done, total))).unwrap();
    assert_eq!(summary.completed, 8);
    assert_eq!(summary.total, 8);
    assert_eq!(reported.len(), 8);
    assert_eq!(reported.last(), Some(&(8, 8)));

    let log = log.into_inner().unwrap();
    for i in 0..4 {
        let first = log.iter().position(|e| *e == ("first", i)).unwrap();
        let second = log.iter().position(|e| *e == ("second", i)).unwrap();
        assert!(first < second, "{:?}", log);
    }
}

#[test]
fn in_flight_tasks_are_bounded_by_thread_count() {
    let executor = Executor::new(2).unwrap();
    assert_eq!(executor.threads(), 2);
    let running = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let mut queue = DependentTaskQueue::new();
    for _ in 0..16 {
        let (running, peak) = (&running, &peak);
        queue.push(job(move |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }));
    }
    executor.run(queue, &CancelToken::new(), |_, _| {}).unwrap();
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(executor.active_tasks(), 0);
}

#[test]
fn failure_halts_remaining_tasks() {
    let executor = Executor::new(1).unwrap();
    let ran = AtomicUsize::new(0);
    let mut queue = DependentTaskQueue::new();
    let bad = queue.push(job(|_| Err("boom".to_owned())));
    for _ in 0..4 {
        let ran = &ran;
        queue
            .push_dependent(
                job(move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                [bad],
            )
            .unwrap();
    }
    match executor.run(queue, &CancelToken::new(), |_, _| {}) {
        Err(RunError::Failed(msg)) => assert_eq!(msg, "boom"),
        other => panic!("unexpected result {:?}", other.map(|s| s.completed)),
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(executor.active_tasks(), 0);
}

#[test]
fn panicking_task_is_reported() {
    let executor = Executor::new(2).unwrap();
    let mut queue = DependentTaskQueue::new();
    queue.push(job(|_| panic!("worker exploded")));
    let err = executor.run(queue, &CancelToken::new(), |_, _| {}).unwrap_err();
    match err {
        RunError::Panicked(msg) => assert!(msg.contains("worker exploded")),
        other => panic!("unexpected error {}", other),
    }
    // the pool survives a panicking task
    let mut queue = DependentTaskQueue::new();
    queue.push(job(|_| Ok(())));
    assert!(executor.run(queue, &CancelToken::new(), |_, _| {}).is_ok());
}

#[test]
fn cancellation_stops_scheduling() {
    let executor = Executor::new(2).unwrap();
    let cancel = CancelToken::new();
    let ran = AtomicUsize::new(0);
    let mut queue = DependentTaskQueue::new();
    let mut prev = None;
    for _ in 0..32 {
        let ran = &ran;
        let task = job(move |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        prev = Some(match prev {
            None => queue.push(task),
            Some(p) => queue.push_dependent(task, [p]).unwrap(),
        });
    }
    let err = executor
        .run(queue, &cancel, |done, _| {
            if done == 1 {
                cancel.cancel();
            }
        })
        .unwrap_err();
    assert!(err.is_interrupted());
    assert!(ran.load(Ordering::SeqCst) < 32);
    assert_eq!(executor.active_tasks(), 0);
}

#[test]
fn running_tasks_observe_stop_request() {
    let executor = Executor::new(2).unwrap();
    let cancel = CancelToken::new();
    let mut queue = DependentTaskQueue::new();
    let token = cancel.clone();
    queue.push(job(move |ctx| {
        token.cancel();
        // spin until the context reports the cancellation
        while !ctx.should_stop() {
            thread::yield_now();
        }
        Ok(())
    }));
    assert!(executor.run(queue, &cancel, |_, _| {}).unwrap_err().is_interrupted());
}

#[test]
fn empty_queue_finishes_immediately() {
    let executor = Executor::new(0).unwrap();
    assert!(executor.threads() >= 1);
    let summary = executor.run(DependentTaskQueue::<Job<'_>>::new(), &CancelToken::new(), |_, _| unreachable!()).unwrap();
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.total, 0);
}
