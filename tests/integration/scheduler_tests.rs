// Scheduler lifecycle, immediate-cycle dispatch and overlap suppression.

use std::sync::Arc;

use pricewarden::scheduler::ScanScheduler;

use super::*;

#[tokio::test]
async fn test_scheduler_start_and_shutdown() -> anyhow::Result<()> {
    let harness = create_test_harness().await?;
    let mut scheduler =
        ScanScheduler::new(Arc::clone(&harness.monitor), harness.config.scheduler.clone()).await?;

    scheduler.start().await?;
    assert!(!scheduler.is_cycle_running());
    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_run_cycle_now_updates_stats() -> anyhow::Result<()> {
    let harness = create_test_harness().await?;

    let url = "https://shop.example/item/widget-1";
    harness
        .fetcher
        .script(url, vec![ScriptedResponse::Price("5.00")])
        .await;
    harness
        .store
        .save(tracked_product("widget-1", url, "50.00"))
        .await?;

    let scheduler =
        ScanScheduler::new(Arc::clone(&harness.monitor), harness.config.scheduler.clone()).await?;

    let outcome = scheduler.run_cycle_now().await?;
    assert_eq!(outcome.checked, 1);
    assert_eq!(outcome.alerts, 1);

    let stats = scheduler.stats().await;
    assert_eq!(stats.cycles_started, 1);
    assert_eq!(stats.cycles_skipped, 0);
    assert_eq!(stats.products_checked, 1);
    assert_eq!(stats.alerts_sent, 1);
    assert!(stats.last_cycle_started.is_some());
    Ok(())
}

#[tokio::test]
async fn test_overlapping_cycle_is_rejected() -> anyhow::Result<()> {
    let harness = create_test_harness().await?;

    // One product that burns the whole retry budget keeps the cycle busy.
    let url = "https://shop.example/item/slow-1";
    harness
        .fetcher
        .script(url, vec![ScriptedResponse::MissingPrice])
        .await;
    harness
        .store
        .save(tracked_product("slow-1", url, "50.00"))
        .await?;

    let scheduler = Arc::new(
        ScanScheduler::new(Arc::clone(&harness.monitor), harness.config.scheduler.clone()).await?,
    );

    let busy = Arc::clone(&scheduler);
    let first = tokio::spawn(async move { busy.run_cycle_now().await });

    let cycle_started = wait_for_condition(
        || {
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.is_cycle_running() }
        },
        1_000,
    )
    .await;
    assert!(cycle_started);

    let second = scheduler.run_cycle_now().await;
    assert!(second.is_err(), "overlapping cycle must be suppressed");

    let outcome = first.await??;
    assert_eq!(outcome.skipped, 1);
    assert!(!scheduler.is_cycle_running());
    Ok(())
}
