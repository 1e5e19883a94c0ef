use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use anyhow::Result;

// poll the registry the way a front end would, once per "re-run"
async fn wait_until_complete<T>(registry: &TaskRegistry<T>, key: &str)
where
    T: Clone + Send + Sync + 'static,
{
    for _ in 0..500 {
        if registry.is_complete(key) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not complete in time", key);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_runs_work_and_stores_result() -> Result<()> {
    let registry: TaskRegistry<String> = TaskRegistry::new();

    let submission = registry.submit("echo:1", async { anyhow::Ok("done".to_string()) });
    assert_eq!(submission, Submission::Started);

    wait_until_complete(&registry, "echo:1").await;
    assert!(!registry.is_running("echo:1"));
    assert_eq!(registry.get_result("echo:1"), Some("done".to_string()));
    assert_eq!(registry.get_error("echo:1"), None);
    assert_eq!(registry.snapshot("echo:1"), TaskSnapshot::Done("done".to_string()));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_work_stores_error_only() -> Result<()> {
    let registry: TaskRegistry<u32> = TaskRegistry::new();

    registry.submit("fail:1", async { Err(anyhow::anyhow!("engine exploded")) });
    wait_until_complete(&registry, "fail:1").await;

    assert_eq!(
        registry.snapshot("fail:1"),
        TaskSnapshot::Failed("engine exploded".to_string())
    );
    assert_eq!(registry.get_result("fail:1"), None);
    assert_eq!(registry.get_error("fail:1").as_deref(), Some("engine exploded"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_work_is_trapped() -> Result<()> {
    let registry: TaskRegistry<u32> = TaskRegistry::new();

    registry.submit("panic:1", async {
        if true {
            panic!("boom");
        }
        anyhow::Ok(1)
    });
    wait_until_complete(&registry, "panic:1").await;

    let error = registry.get_error("panic:1").expect("error recorded");
    assert!(error.contains("boom"), "unexpected error: {}", error);
    assert_eq!(registry.get_result("panic:1"), None);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_flight_while_running() -> Result<()> {
    let registry: TaskRegistry<usize> = TaskRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    let work = |calls: Arc<AtomicUsize>, release: Arc<Notify>| async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        release.notified().await;
        anyhow::Ok(n)
    };

    let first = registry.submit("slow:1", work(calls.clone(), release.clone()));
    let second = registry.submit("slow:1", work(calls.clone(), release.clone()));
    assert_eq!(first, Submission::Started);
    assert_eq!(second, Submission::AlreadyRunning);
    assert!(registry.is_running("slow:1"));
    assert!(!registry.is_complete("slow:1"));
    assert_eq!(registry.get_result("slow:1"), None);
    assert_eq!(registry.get_error("slow:1"), None);

    release.notify_one();
    wait_until_complete(&registry, "slow:1").await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.get_result("slow:1"), Some(1));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_terminal_key_requires_clear_before_resubmit() -> Result<()> {
    let registry: TaskRegistry<u32> = TaskRegistry::new();

    registry.submit("once:1", async { anyhow::Ok(1) });
    wait_until_complete(&registry, "once:1").await;

    let again = registry.submit("once:1", async { anyhow::Ok(2) });
    assert_eq!(again, Submission::AwaitingAcknowledgement);
    assert_eq!(registry.get_result("once:1"), Some(1));

    assert!(registry.clear("once:1"));
    assert!(!registry.is_running("once:1"));
    assert!(!registry.is_complete("once:1"));
    assert_eq!(registry.snapshot("once:1"), TaskSnapshot::Absent);

    assert_eq!(registry.submit("once:1", async { anyhow::Ok(2) }), Submission::Started);
    wait_until_complete(&registry, "once:1").await;
    assert_eq!(registry.get_result("once:1"), Some(2));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_distinct_keys_run_concurrently() -> Result<()> {
    let registry: TaskRegistry<&'static str> = TaskRegistry::new();
    let release = Arc::new(Notify::new());

    let gate = release.clone();
    registry.submit("a", async move {
        gate.notified().await;
        anyhow::Ok("a")
    });
    registry.submit("b", async { anyhow::Ok("b") });

    wait_until_complete(&registry, "b").await;
    assert!(registry.is_running("a"));
    assert_eq!(
        registry.stats(),
        TaskStats { running: 1, completed: 1, failed: 0 }
    );

    release.notify_one();
    wait_until_complete(&registry, "a").await;
    assert_eq!(registry.get_result("a"), Some("a"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_worker_does_not_overwrite_resubmission() -> Result<()> {
    let registry: TaskRegistry<u32> = TaskRegistry::new();
    let release = Arc::new(Notify::new());

    let gate = release.clone();
    registry.submit("stuck:1", async move {
        gate.notified().await;
        anyhow::Ok(1)
    });
    assert!(registry.clear("stuck:1"));

    let blocker = Arc::new(Notify::new());
    let gate = blocker.clone();
    let submission = registry.submit("stuck:1", async move {
        gate.notified().await;
        anyhow::Ok(2)
    });
    assert_eq!(submission, Submission::Started);

    release.notify_one();
    sleep(Duration::from_millis(50)).await;
    assert!(registry.is_running("stuck:1"));

    blocker.notify_one();
    wait_until_complete(&registry, "stuck:1").await;
    assert_eq!(registry.get_result("stuck:1"), Some(2));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_terminal_transition_is_published() -> Result<()> {
    let registry: TaskRegistry<u32> = TaskRegistry::new();
    let mut events = registry.subscribe();

    registry.submit("event:1", async { Err(anyhow::anyhow!("nope")) });

    let event = timeout(Duration::from_secs(5), events.recv()).await??;
    assert_eq!(
        event,
        TaskEvent::Failed { key: "event:1".to_string(), error: "nope".to_string() }
    );
    assert!(registry.is_complete(event.key()));

    Ok(())
}
