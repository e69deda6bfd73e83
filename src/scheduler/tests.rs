//! Tests for the scheduler module.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, TimeZone, Utc, Weekday};
use tokio::time::sleep;

use super::trigger::normalize_cron;
use super::*;
use crate::Error;

fn mins(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn counting_job(runs: Arc<AtomicU32>, fail: bool) -> Arc<dyn Job> {
    job_fn(move || {
        let runs = Arc::clone(&runs);
        async move {
            let n = runs.fetch_add(1, Ordering::SeqCst) + 1;
            if fail {
                Err(Error::runtime(format!("run {n} failed")))
            } else {
                Ok(())
            }
        }
    })
}

// -- triggers ----------------------------------------------------------

#[test]
fn test_cron_spec_defaults_finer_fields_to_zero() {
    assert_eq!(
        CronSpec::new().hour(0).to_expression().unwrap(),
        "0 0 0 * * *"
    );
    assert_eq!(
        CronSpec::new().day_of_week(Weekday::Sun).to_expression().unwrap(),
        "0 0 0 * * Sun"
    );
    assert_eq!(
        CronSpec::new()
            .day_of_week(Weekday::Mon)
            .hour(1)
            .to_expression()
            .unwrap(),
        "0 0 1 * * Mon"
    );
    assert_eq!(
        CronSpec::new().minute(30).to_expression().unwrap(),
        "0 30 * * * *"
    );
}

#[test]
fn test_cron_spec_rejects_empty_and_out_of_range() {
    assert!(CronSpec::new().to_expression().is_err());
    assert!(CronSpec::new().minute(60).to_expression().is_err());
    assert!(CronSpec::new().hour(24).to_expression().is_err());
}

#[test]
fn test_normalize_cron_5_to_6_fields() {
    assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
    assert_eq!(normalize_cron("  0 6 * * 1-5 "), "0 0 6 * * 1-5");
    assert_eq!(normalize_cron("0 */15 * * * *"), "0 */15 * * * *");
}

#[test]
fn test_daily_midnight_next_fire() {
    let trigger = CronTrigger::from_spec(&CronSpec::new().hour(0)).unwrap();
    let after = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
    assert_eq!(
        trigger.next_after(after, utc()).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_cron_is_evaluated_in_scheduler_timezone() {
    let trigger = CronTrigger::from_spec(&CronSpec::new().hour(0)).unwrap();
    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
    let after = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
    assert_eq!(
        trigger.next_after(after, plus_two).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap()
    );
}

#[test]
fn test_weekly_triggers_land_on_their_weekday() {
    let sunday = CronTrigger::from_spec(&CronSpec::new().day_of_week(Weekday::Sun)).unwrap();
    let wednesday_noon = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();
    assert_eq!(
        sunday.next_after(wednesday_noon, utc()).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
    );

    let monday_one =
        CronTrigger::from_spec(&CronSpec::new().day_of_week(Weekday::Mon).hour(1)).unwrap();
    let sunday_noon = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    assert_eq!(
        monday_one.next_after(sunday_noon, utc()).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 11, 1, 0, 0).unwrap()
    );
}

#[test]
fn test_five_field_expression_is_accepted() {
    let trigger = CronTrigger::parse("30 6 * * Mon-Fri").unwrap();
    let friday_morning = Utc.with_ymd_and_hms(2024, 3, 8, 7, 0, 0).unwrap();
    assert_eq!(
        trigger.next_after(friday_morning, utc()).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 11, 6, 30, 0).unwrap()
    );
}

#[test]
fn test_invalid_cron_expression_is_a_configuration_error() {
    let err = Trigger::cron_expr("not a cron").unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_trigger_display() {
    assert_eq!(Trigger::every_minutes(60).unwrap().to_string(), "every 60m");
    assert_eq!(
        Trigger::interval(Duration::from_millis(1500)).unwrap().to_string(),
        "every 1500ms"
    );
    assert_eq!(
        Trigger::cron(CronSpec::new().hour(0)).unwrap().to_string(),
        "cron '0 0 0 * * *'"
    );
    assert!(Trigger::interval(Duration::ZERO).is_err());
}

// -- registration ------------------------------------------------------

#[test]
fn test_duplicate_job_id_is_rejected() {
    let scheduler = Scheduler::utc();
    let runs = Arc::new(AtomicU32::new(0));
    scheduler
        .register("valuation", Trigger::every_minutes(120).unwrap(), counting_job(runs.clone(), false))
        .unwrap();
    let err = scheduler
        .register("valuation", Trigger::every_minutes(5).unwrap(), counting_job(runs, false))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(scheduler.jobs().len(), 1);
}

#[test]
fn test_start_outside_runtime_fails() {
    let scheduler = Scheduler::utc();
    assert!(scheduler.start().is_err());
    assert!(!scheduler.is_running());
}

#[test]
fn test_jobs_are_listed_by_id() {
    let scheduler = Scheduler::utc();
    let runs = Arc::new(AtomicU32::new(0));
    for id in ["valuation", "availability", "trend_discovery"] {
        scheduler
            .register(id, Trigger::every_minutes(60).unwrap(), counting_job(runs.clone(), false))
            .unwrap();
    }
    let ids: Vec<String> = scheduler.jobs().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec!["availability", "trend_discovery", "valuation"]);
    assert!(scheduler.set_enabled("missing", false).is_err());
}

// -- firing ------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_interval_job_first_fires_one_period_after_registration() {
    let scheduler = Scheduler::utc();
    let runs = Arc::new(AtomicU32::new(0));
    scheduler
        .register("trends", Trigger::every_minutes(60).unwrap(), counting_job(runs.clone(), false))
        .unwrap();
    scheduler.start().unwrap();

    sleep(mins(59)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    sleep(mins(2)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    sleep(mins(60)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    let info = scheduler.job("trends").unwrap();
    assert_eq!(info.runs, 2);
    assert_eq!(info.failures, 0);
    assert!(info.last_run_at.is_some());
    assert!(info.next_run_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failing_job_keeps_firing() {
    let scheduler = Scheduler::utc();
    let runs = Arc::new(AtomicU32::new(0));
    scheduler
        .register("flaky", Trigger::every_minutes(60).unwrap(), counting_job(runs.clone(), true))
        .unwrap();
    scheduler.start().unwrap();

    sleep(mins(61)).await;
    let info = scheduler.job("flaky").unwrap();
    assert_eq!(info.failures, 1);
    assert!(info.last_error.unwrap().contains("run 1 failed"));

    sleep(mins(60)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.job("flaky").unwrap().failures, 2);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_job_is_contained() {
    let scheduler = Scheduler::utc();
    let runs = Arc::new(AtomicU32::new(0));
    let job_runs = Arc::clone(&runs);
    scheduler
        .register(
            "explodes_once",
            Trigger::every_minutes(10).unwrap(),
            job_fn(move || {
                let runs = Arc::clone(&job_runs);
                async move {
                    if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("first run explodes");
                    }
                    Ok(())
                }
            }),
        )
        .unwrap();

    let healthy = Arc::new(AtomicU32::new(0));
    scheduler
        .register("healthy", Trigger::every_minutes(10).unwrap(), counting_job(healthy.clone(), false))
        .unwrap();
    scheduler.start().unwrap();

    sleep(mins(21)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(healthy.load(Ordering::SeqCst), 2);

    let info = scheduler.job("explodes_once").unwrap();
    assert_eq!(info.failures, 1);
    assert!(info.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_fire_is_skipped() {
    let scheduler = Scheduler::utc();
    let started = Arc::new(AtomicU32::new(0));
    let job_started = Arc::clone(&started);
    scheduler
        .register(
            "slow",
            Trigger::every_minutes(60).unwrap(),
            job_fn(move || {
                let started = Arc::clone(&job_started);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    sleep(mins(90)).await;
                    Ok(())
                }
            }),
        )
        .unwrap();
    scheduler.start().unwrap();

    // runs 60..150; the 120 fire finds it busy
    sleep(mins(121)).await;
    let info = scheduler.job("slow").unwrap();
    assert!(info.running);
    assert_eq!(info.skipped, 1);
    assert_eq!(started.load(Ordering::SeqCst), 1);

    sleep(mins(64)).await;
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.job("slow").unwrap().runs, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_fires_but_not_running_jobs() {
    let scheduler = Scheduler::utc();
    let started = Arc::new(AtomicU32::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let (job_started, job_finished) = (Arc::clone(&started), Arc::clone(&finished));
    scheduler
        .register(
            "export",
            Trigger::every_minutes(60).unwrap(),
            job_fn(move || {
                let started = Arc::clone(&job_started);
                let finished = Arc::clone(&job_finished);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    sleep(mins(10)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .unwrap();
    scheduler.start().unwrap();

    sleep(mins(61)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    scheduler.shutdown();
    assert!(!scheduler.is_running());

    sleep(mins(300)).await;
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert!(scheduler.start().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_job_does_not_run() {
    let scheduler = Scheduler::utc();
    let runs = Arc::new(AtomicU32::new(0));
    scheduler
        .register("monitoring", Trigger::every_minutes(60).unwrap(), counting_job(runs.clone(), false))
        .unwrap();
    scheduler.set_enabled("monitoring", false).unwrap();
    scheduler.start().unwrap();

    sleep(mins(61)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(!scheduler.job("monitoring").unwrap().enabled);

    scheduler.set_enabled("monitoring", true).unwrap();
    sleep(mins(60)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_job_registered_after_start_counts_from_registration() {
    let scheduler = Scheduler::utc();
    scheduler.start().unwrap();

    sleep(mins(30)).await;
    let runs = Arc::new(AtomicU32::new(0));
    scheduler
        .register("late", Trigger::every_minutes(60).unwrap(), counting_job(runs.clone(), false))
        .unwrap();

    sleep(mins(59)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    sleep(mins(2)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

// -- clock -------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_tokio_clock_follows_paused_time() {
    let start = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 0).unwrap();
    let clock = TokioClock::starting_at(start);
    assert_eq!(clock.now(), start);

    tokio::time::advance(Duration::from_secs(90)).await;
    assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 30).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_daily_cron_fires_at_midnight_of_injected_clock() {
    let start = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 0).unwrap();
    let scheduler = Scheduler::utc().with_clock(Arc::new(TokioClock::starting_at(start)));
    let runs = Arc::new(AtomicU32::new(0));
    scheduler
        .register("backordering", Trigger::cron(CronSpec::new().hour(0)).unwrap(), counting_job(runs.clone(), false))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_secs(59)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let info = scheduler.job("backordering").unwrap();
    assert_eq!(info.last_run_at, Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()));
    assert_eq!(info.next_run_at, Some(Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap()));
}
