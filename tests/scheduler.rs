use kqio::net::resolve;
use kqio::time::sleep;
use kqio::{RuntimeBuilder, Task, yield_now};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn spawned_tasks_run_in_submission_order() {
    let mut rt = RuntimeBuilder::new().build();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    rt.block_on(async {
        let mut handles = Vec::new();
        for i in 0..5u32 {
            let order = order.clone();
            handles.push(Task::spawn(async move {
                order.lock().unwrap().push(i);
            }));
        }
        for handle in handles {
            handle.await;
        }
    });

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn yield_now_lets_other_tasks_run_first() {
    let mut rt = RuntimeBuilder::new().build();
    let counter = Arc::new(AtomicUsize::new(0));

    rt.block_on(async {
        let seen = counter.clone();
        let observer = Task::spawn(async move {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        // After one yield the spawned task must have had its turn.
        yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        observer.await;
    });
}

#[test]
fn task_results_flow_through_join_handles() {
    let mut rt = RuntimeBuilder::new().build();

    let value = rt.block_on(async {
        let handle = Task::spawn(async {
            sleep(Duration::from_millis(5)).await;
            21 * 2
        });
        handle.await
    });

    assert_eq!(value, 42);
}

#[test]
fn a_task_observes_its_own_operations_in_order() {
    let mut rt = RuntimeBuilder::new().build();
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));

    rt.block_on(async {
        let log2 = log.clone();
        let handle = Task::spawn(async move {
            log2.lock().unwrap().push("before");
            sleep(Duration::from_millis(10)).await;
            log2.lock().unwrap().push("after");
        });

        log.lock().unwrap().push("spawned");
        handle.await;
    });

    assert_eq!(*log.lock().unwrap(), vec!["spawned", "before", "after"]);
}

#[test]
fn localhost_resolves_to_a_loopback_address() {
    let mut rt = RuntimeBuilder::new().build();

    rt.block_on(async {
        let reply = resolve("localhost", 8080, None).await.unwrap();
        assert!(reply.rc >= 1, "no addresses resolved");
        assert!(reply.addrs.iter().all(|a| a.port() == 8080));
        assert!(reply.addrs.iter().any(|a| match a.ip() {
            IpAddr::V4(ip) => ip.is_loopback(),
            IpAddr::V6(ip) => ip.is_loopback(),
        }));
    });
}
