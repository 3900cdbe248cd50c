//! # Integration Test Flows
//!
//! Drives the scheduler against the loopback engine and the host file
//! system, the way `cf-runtime` does.
//!
//! ## Flows Tested:
//!
//! 1. **Commanded playback**: pending → active → history, file delivered
//! 2. **Start failures**: rejected offers retire the record and the channel moves on
//! 3. **Inbound**: a peer's file is tracked from allocation to uplink history
//! 4. **Priority**: pending files start in priority order
//! 5. **Polling**: closed files in an enabled poll directory are sent and deleted
//! 6. **Auto-suspend**: each file is suspended after EOF, the next file starts
//! 7. **Directives and snapshots**: cancel by file name, queue dumps

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use cf_scheduler::{
        ConditionCode, DirectiveVerb, EntityId, PlaybackQueue, PollSelector, Preserve, QueueRef,
        SchedulerApi, TransactionId, TransactionStatus, TransferClass, UplinkQueue,
    };
    use rand::seq::SliceRandom;
    use std::fs;
    use std::time::Duration;

    // =============================================================================
    // COMMANDED PLAYBACK
    // =============================================================================

    #[test]
    fn test_commanded_file_delivered() {
        let mut harness = Harness::new();
        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let source = harness.write_source("img.raw", &payload);

        let request = harness.request(&source, "/down/img.raw", 5);
        harness.scheduler.enqueue_playback(request).unwrap();
        assert_eq!(harness.len(PlaybackQueue::Pending), 1);

        harness.run_until_idle(20);

        assert_eq!(fs::read(harness.delivered("/down/img.raw")).unwrap(), payload);
        let history = harness.records(PlaybackQueue::History);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, TransactionStatus::Success);
        assert_eq!(history[0].trans_num, 1);

        let hk = harness.scheduler.housekeeping();
        let channel = &hk.channels[0];
        assert_eq!(channel.counters.success, 1);
        assert_eq!(channel.counters.files_sent, 1);
        // Metadata, four segments, EOF.
        assert_eq!(channel.counters.pdus_sent, 6);
        assert!(!channel.blasting);
        assert_eq!(hk.command_counter, 1);
        assert!(fs::metadata(&source).is_ok());
    }

    #[test]
    fn test_delete_preserve_removes_source() {
        let mut harness = Harness::new();
        let source = harness.write_source("log.txt", b"line\n");
        let mut request = harness.request(&source, "/log.txt", 5);
        request.preserve = Preserve::Delete;

        harness.scheduler.enqueue_playback(request).unwrap();
        harness.run_until_idle(20);

        assert!(harness.delivered("/log.txt").exists());
        assert!(fs::metadata(&source).is_err());
    }

    #[test]
    fn test_rejected_offer_retires_and_channel_moves_on() {
        let mut harness = Harness::new();
        let missing = format!("{}/src/missing.dat", harness.dir.path().display());
        let present = harness.write_source("present.dat", b"ok");

        let first = harness.request(&missing, "/missing.dat", 1);
        let second = harness.request(&present, "/present.dat", 2);
        harness.scheduler.enqueue_playback(first).unwrap();
        harness.scheduler.enqueue_playback(second).unwrap();

        harness.run_until_idle(20);

        let history = harness.records(PlaybackQueue::History);
        let failed = history
            .iter()
            .find(|r| r.source_file == missing)
            .unwrap();
        assert_eq!(failed.status, TransactionStatus::PutRequestFailed);
        assert_eq!(failed.trans_num, 0);
        assert!(harness.delivered("/present.dat").exists());

        let hk = harness.scheduler.housekeeping();
        assert_eq!(hk.channels[0].counters.failed, 1);
        assert_eq!(hk.channels[0].counters.success, 1);
    }

    #[test]
    fn test_duplicate_enqueue_rejected() {
        let mut harness = Harness::new();
        let source = harness.write_source("dup.dat", b"x");

        let request = harness.request(&source, "/dup.dat", 5);
        harness.scheduler.enqueue_playback(request.clone()).unwrap();
        assert!(harness.scheduler.enqueue_playback(request).is_err());

        let hk = harness.scheduler.housekeeping();
        assert_eq!(hk.command_counter, 1);
        assert_eq!(hk.error_counter, 1);
    }

    // =============================================================================
    // INBOUND
    // =============================================================================

    #[test]
    fn test_incoming_file_tracked_to_history() {
        let mut harness = Harness::new();
        let id = TransactionId::new(EntityId::new(0, 23), 41);
        harness.scheduler.engine_mut().receive_file(
            id,
            TransferClass::Acknowledged,
            "/gnd/table.tbl",
            "/cf/table.tbl",
            vec![0xAB; 700],
        );

        harness.run_until_idle(10);

        assert_eq!(fs::read(harness.delivered("/cf/table.tbl")).unwrap().len(), 700);
        let history = harness
            .scheduler
            .records_in(QueueRef::Uplink(UplinkQueue::History))
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_id(), id);
        assert_eq!(history[0].status, TransactionStatus::Success);
        assert_eq!(history[0].source_file, "/gnd/table.tbl");

        let hk = harness.scheduler.housekeeping();
        assert_eq!(hk.uplink.success, 1);
        assert_eq!(hk.uplink.metadata_received, 1);
        assert_eq!(hk.uplink.last_file_uplinked, "/cf/table.tbl");
        // EOF ack and Finished go out on the class 2 response channel.
        assert_eq!(hk.channels[0].counters.pdus_sent, 2);

        let found = harness.scheduler.find_by_transaction_id(&id).unwrap();
        assert_eq!(found.queue, QueueRef::Uplink(UplinkQueue::History));
    }

    // =============================================================================
    // PRIORITY
    // =============================================================================

    #[test]
    fn test_pending_files_start_in_priority_order() {
        let mut harness = Harness::new();
        harness.scheduler.set_dequeue(0, false).unwrap();

        let mut priorities: Vec<u8> = (0..6).collect();
        priorities.shuffle(&mut rand::thread_rng());
        for priority in &priorities {
            let source = harness.write_source(&format!("p{priority}.dat"), &[*priority; 40]);
            let request = harness.request(&source, &format!("/p{priority}.dat"), *priority);
            harness.scheduler.enqueue_playback(request).unwrap();
        }

        let queued: Vec<u8> = harness
            .records(PlaybackQueue::Pending)
            .iter()
            .map(|r| r.priority)
            .collect();
        assert_eq!(queued, vec![0, 1, 2, 3, 4, 5]);

        harness.scheduler.set_dequeue(0, true).unwrap();
        harness.run_until_idle(60);

        // The loopback engine numbers transactions in the order they start.
        let mut history = harness.records(PlaybackQueue::History);
        history.sort_by_key(|r| r.trans_num);
        let started: Vec<u8> = history.iter().map(|r| r.priority).collect();
        assert_eq!(started, vec![0, 1, 2, 3, 4, 5]);
    }

    // =============================================================================
    // HISTORY
    // =============================================================================

    #[test]
    fn test_history_keeps_newest_entries() {
        let mut harness = Harness::with_config(|config| {
            config.channels[0].history_depth = 2;
        });

        for n in 1..=4u8 {
            let source = harness.write_source(&format!("h{n}.dat"), &[n; 8]);
            let request = harness.request(&source, &format!("/h{n}.dat"), 5);
            harness.scheduler.enqueue_playback(request).unwrap();
            harness.run_until_idle(20);
        }

        let kept: Vec<u32> = harness
            .records(PlaybackQueue::History)
            .iter()
            .map(|r| r.trans_num)
            .collect();
        assert_eq!(kept, vec![3, 4]);
        assert_eq!(harness.scheduler.pool().live(), 2);
    }

    // =============================================================================
    // POLLING
    // =============================================================================

    #[test]
    fn test_poll_directory_sends_closed_files() {
        let mut harness = Harness::new();
        harness.write_poll("a.dat", b"aaaa");
        harness.write_poll("b.dat", b"bbbb");
        let writing = harness.write_poll("c.dat", b"cc");
        harness.scheduler.files().mark_open(&writing);

        // Disabled slots are never scanned.
        harness.run(3);
        assert!(harness.is_idle());
        assert!(harness.records(PlaybackQueue::History).is_empty());

        harness
            .scheduler
            .set_poll(0, PollSelector::All, true)
            .unwrap();
        harness.run(2);
        harness.scheduler.set_poll(0, PollSelector::Slot(0), false).unwrap();
        harness.run_until_idle(30);

        assert!(harness.delivered("/polled/a.dat").exists());
        assert!(harness.delivered("/polled/b.dat").exists());
        assert!(!harness.delivered("/polled/c.dat").exists());
        let remaining: Vec<String> = fs::read_dir(harness.dir.path().join("poll"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["c.dat".to_string()]);

        harness.scheduler.files().mark_closed(&writing);
        harness
            .scheduler
            .set_poll(0, PollSelector::Slot(0), true)
            .unwrap();
        harness.run(2);
        harness.run_until_idle(30);
        assert!(harness.delivered("/polled/c.dat").exists());

        let history = harness.records(PlaybackQueue::History);
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|r| r.priority == 3));
    }

    // =============================================================================
    // AUTO-SUSPEND
    // =============================================================================

    #[test]
    fn test_auto_suspend_holds_blasted_files() {
        let mut harness = Harness::with_config(|config| {
            config.auto_suspend_enabled = true;
        });
        let first = harness.write_source("first.dat", b"one");
        let second = harness.write_source("second.dat", b"two");
        let request = harness.request(&first, "/first.dat", 1);
        harness.scheduler.enqueue_playback(request).unwrap();
        let request = harness.request(&second, "/second.dat", 2);
        harness.scheduler.enqueue_playback(request).unwrap();

        harness.run(10);

        // Each file is suspended after its EOF; the channel still moved on.
        assert_eq!(harness.len(PlaybackQueue::Pending), 0);
        assert_eq!(harness.len(PlaybackQueue::Active), 2);
        for source in [&first, &second] {
            let status = harness.scheduler.quick_status(source).unwrap();
            assert_eq!(status.status, "ACTIVE/SUSPENDED");
        }
        assert!(!harness.scheduler.housekeeping().channels[0].blasting);
        assert!(!harness.delivered("/first.dat").exists());
        assert!(!harness.delivered("/second.dat").exists());

        harness.scheduler.set_auto_suspend(false);
        harness
            .scheduler
            .request_directive(DirectiveVerb::Resume, "all")
            .unwrap();
        harness.run_until_idle(20);

        assert!(harness.delivered("/first.dat").exists());
        assert!(harness.delivered("/second.dat").exists());
        assert_eq!(harness.records(PlaybackQueue::History).len(), 2);
    }

    // =============================================================================
    // DIRECTIVES AND SNAPSHOTS
    // =============================================================================

    #[test]
    fn test_cancel_by_file_name() {
        let mut harness = Harness::new();
        let source = harness.write_source("big.dat", &vec![1u8; 512 * 20]);
        let request = harness.request(&source, "/big.dat", 5);
        harness.scheduler.enqueue_playback(request).unwrap();

        harness.tick();
        assert_eq!(harness.len(PlaybackQueue::Active), 1);
        assert!(harness.scheduler.housekeeping().channels[0].blasting);

        harness
            .scheduler
            .request_directive(DirectiveVerb::Cancel, &source)
            .unwrap();
        harness.run_until_idle(5);

        let history = harness.records(PlaybackQueue::History);
        assert_eq!(history[0].status, TransactionStatus::Cancelled);
        assert_eq!(history[0].condition, ConditionCode::CancelRequestReceived);
        let hk = harness.scheduler.housekeeping();
        assert_eq!(hk.faults.cancel_requests, 1);
        assert_eq!(hk.app.last_failed_trans, "0.24_1");
        assert!(!harness.delivered("/big.dat").exists());
    }

    #[test]
    fn test_history_snapshot_written() {
        let mut harness = Harness::new();
        for n in 1..=3u8 {
            let source = harness.write_source(&format!("s{n}.dat"), &[n]);
            let request = harness.request(&source, &format!("/s{n}.dat"), 5);
            harness.scheduler.enqueue_playback(request).unwrap();
        }
        harness.run_until_idle(30);

        let dump = format!("{}/history.dat", harness.dir.path().display());
        let written = harness
            .scheduler
            .write_queue_info(QueueRef::playback(0, PlaybackQueue::History), Some(&dump))
            .unwrap();
        assert_eq!(written, 3);
        assert!(fs::metadata(&dump).unwrap().len() > 0);
    }

    // =============================================================================
    // RUNTIME LOOP
    // =============================================================================

    #[tokio::test]
    async fn test_interval_loop_delivers() {
        let mut harness = Harness::new();
        let source = harness.write_source("tick.dat", b"ticked");
        let request = harness.request(&source, "/tick.dat", 5);
        harness.scheduler.enqueue_playback(request).unwrap();

        let mut ticker = tokio::time::interval(Duration::from_millis(1));
        for _ in 0..10 {
            ticker.tick().await;
            harness.tick();
        }

        assert!(harness.is_idle());
        assert_eq!(fs::read(harness.delivered("/tick.dat")).unwrap(), b"ticked");
    }
}
