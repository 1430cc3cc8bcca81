//! Integration tests for the ingest / transfer pipeline
//!
//! These run a real transfer thread against the recording mock transport.
//! The gated variant holds every commit until the test releases it, which
//! pins the pipeline in its in-flight phase deterministically.

mod common;

use common::builders::MappingBuilder;
use common::mock_helpers::{
    create_gated_controller, create_test_controller, test_geometry, wait_until_idle,
};
use common::{rgb_frame, settle_time, test_timeout};
use pixelbridge::config::DeviceConfig;
use pixelbridge::device::{ChannelController, DeviceRegistry, Disposition, TransferEvent};
use pixelbridge::opc::OpcMessage;
use pixelbridge::transport::MockTransport;
use pixelbridge::{IngestError, PipelinePhase};
use std::time::Duration;

#[test]
fn test_unsupported_channel_leaves_back_buffer_untouched() {
    let map = MappingBuilder::new().range(0, 8).build();
    let (controller, handle) = create_test_controller(&map);

    let first = rgb_frame(8, |i| i as u8 + 1);
    controller.ingest(0, &first).unwrap();
    assert!(handle.wait_for_frames(1, test_timeout()));

    let result = controller.ingest(1, &rgb_frame(8, |_| 0xEE));
    assert_eq!(result, Err(IngestError::UnsupportedChannel(1)));
    assert_eq!(controller.back_buffer().unwrap(), first);

    std::thread::sleep(settle_time());
    assert_eq!(handle.frame_count(), 1);
    assert_eq!(controller.stats().ingest_rejected, 1);
}

#[test]
fn test_publishes_during_transfer_coalesce_into_one() {
    let map = MappingBuilder::new().range(0, 8).build();
    let (controller, handle, gate) = create_gated_controller(&map);

    let a = rgb_frame(8, |_| 0xA0);
    let b = rgb_frame(8, |_| 0xB0);
    let c = rgb_frame(8, |_| 0xC0);

    controller.ingest(0, &a).unwrap();
    assert!(handle.wait_for_commits_started(1, test_timeout()));
    assert_eq!(controller.phase(), PipelinePhase::InFlight);

    controller.ingest(0, &b).unwrap();
    assert_eq!(controller.phase(), PipelinePhase::Pending);
    controller.ingest(0, &c).unwrap();
    assert_eq!(controller.phase(), PipelinePhase::Pending);

    // Finish the first transfer; the follow-up starts without another publish
    gate.send(()).unwrap();
    assert!(handle.wait_for_commits_started(2, test_timeout()));
    gate.send(()).unwrap();
    assert!(handle.wait_for_frames(2, test_timeout()));
    assert!(wait_until_idle(&controller, test_timeout()));

    std::thread::sleep(settle_time());
    let frames = handle.frames();
    assert_eq!(frames.len(), 2, "expected exactly one follow-up transfer");
    assert_eq!(handle.commits_started(), 2);
    assert_eq!(frames[0].channel(0).unwrap(), a.as_slice());
    assert_eq!(frames[1].channel(0).unwrap(), c.as_slice());

    let stats = controller.stats();
    assert_eq!(stats.frames_deferred, 1);
    assert_eq!(stats.frames_coalesced, 1);
    assert_eq!(stats.frames_sent, 2);
}

#[test]
fn test_latest_frame_wins_under_load() {
    let map = MappingBuilder::new().range(0, 32).build();
    let transport = MockTransport::new().with_push_delay(Duration::from_millis(2));
    let handle = transport.handle();
    let mut controller =
        ChannelController::new("generic", "slow", test_geometry(), Box::new(transport), 64);
    controller.configure(&map).unwrap();
    controller.start().unwrap();

    const BURST: usize = 50;
    for n in 0..BURST {
        controller.ingest(0, &rgb_frame(32, |_| n as u8)).unwrap();
    }
    assert!(handle.wait_for_frames(1, test_timeout()));
    assert!(wait_until_idle(&controller, Duration::from_secs(5)));

    let frames = handle.frames();
    assert!(frames.len() <= BURST);
    let last = frames.last().unwrap();
    let expected = (BURST - 1) as u8;
    for channel in 0..4 {
        assert!(last.channel(channel).unwrap().iter().all(|&b| b == expected));
    }
    assert_eq!(handle.max_concurrent_transfers(), 1);

    let stats = controller.stats();
    assert_eq!(
        stats.frames_published + stats.frames_deferred + stats.frames_coalesced,
        BURST as u64
    );
}

#[test]
fn test_shutdown_waits_for_in_flight_transfer() {
    let map = MappingBuilder::new().range(0, 4).build();
    let (mut controller, handle, gate) = create_gated_controller(&map);
    let events = pixelbridge::device::LedDevice::events(&controller);

    controller.ingest(0, &rgb_frame(4, |_| 7)).unwrap();
    assert!(handle.wait_for_commits_started(1, test_timeout()));

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(settle_time());
        gate.send(()).unwrap();
    });
    controller.shutdown().unwrap();
    releaser.join().unwrap();

    assert!(!controller.is_running());
    assert_eq!(handle.frame_count(), 1);
    assert!(matches!(
        events.recv_timeout(test_timeout()).unwrap(),
        TransferEvent::FrameSent { sequence: 1, .. }
    ));
    assert!(matches!(
        events.recv_timeout(test_timeout()).unwrap(),
        TransferEvent::Stopped
    ));
}

#[test]
fn test_reconfigure_during_transfer() {
    let old_map = MappingBuilder::new().range(0, 8).build();
    let (mut controller, handle, gate) = create_gated_controller(&old_map);

    controller.ingest(0, &rgb_frame(8, |_| 1)).unwrap();
    assert!(handle.wait_for_commits_started(1, test_timeout()));

    // Channel 1, slots 3..0
    let new_map = MappingBuilder::new().range(11, -4).build();
    controller.configure(&new_map).unwrap();
    assert_eq!(controller.back_buffer().unwrap(), vec![0; 12]);

    let fresh = [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
    controller.ingest(0, &fresh).unwrap();
    assert_eq!(controller.phase(), PipelinePhase::Pending);

    gate.send(()).unwrap();
    assert!(handle.wait_for_commits_started(2, test_timeout()));
    gate.send(()).unwrap();
    assert!(handle.wait_for_frames(2, test_timeout()));
    assert!(wait_until_idle(&controller, test_timeout()));

    let frames = handle.frames();
    assert!(frames[0].channel(0).is_some());

    // Channel 0 lost its mapping and is blanked on the hardware
    let second = &frames[1];
    assert!(second.channel(0).unwrap().iter().all(|&b| b == 0));
    let ch1 = second.channel(1).unwrap();
    assert_eq!(&ch1[..12], &[4, 4, 4, 3, 3, 3, 2, 2, 2, 1, 1, 1]);
    assert!(ch1[12..].iter().all(|&b| b == 0));
}

#[test]
fn test_reconfigure_blanks_channels_dropped_from_mapping() {
    let map = MappingBuilder::new().range(0, 8).build();
    let (mut controller, handle) = create_test_controller(&map);
    let events = pixelbridge::device::LedDevice::events(&controller);

    controller.ingest(0, &rgb_frame(8, |_| 0xFF)).unwrap();
    assert!(handle.wait_for_frames(1, test_timeout()));
    assert!(wait_until_idle(&controller, test_timeout()));

    // Only channel 1 from now on
    controller
        .configure(&MappingBuilder::new().range(8, 8).build())
        .unwrap();
    controller.ingest(0, &rgb_frame(8, |_| 0x11)).unwrap();
    assert!(handle.wait_for_frames(2, test_timeout()));
    assert!(wait_until_idle(&controller, test_timeout()));

    let frames = handle.frames();
    let second = &frames[1];
    assert!(second.channel(0).unwrap().iter().all(|&b| b == 0));
    assert!(second.channel(1).unwrap().iter().all(|&b| b == 0x11));

    // Once blanked, channel 0 is left alone
    controller.ingest(0, &rgb_frame(8, |_| 0x22)).unwrap();
    assert!(handle.wait_for_frames(3, test_timeout()));
    assert!(wait_until_idle(&controller, test_timeout()));
    let third = &handle.frames()[2];
    assert!(third.channel(0).is_none());
    assert!(third.channel(1).unwrap().iter().all(|&b| b == 0x22));

    let channels: Vec<usize> = events
        .try_iter()
        .filter_map(|event| match event {
            TransferEvent::FrameSent { channels, .. } => Some(channels),
            _ => None,
        })
        .collect();
    assert_eq!(channels, vec![1, 2, 1]);
}

#[test]
fn test_transport_failure_does_not_stop_task() {
    let map = MappingBuilder::new().range(0, 2).build();
    let (controller, handle) = create_test_controller(&map);
    let events = pixelbridge::device::LedDevice::events(&controller);
    handle.fail_next(1);

    controller.ingest(0, &rgb_frame(2, |_| 1)).unwrap();
    match events.recv_timeout(test_timeout()).unwrap() {
        TransferEvent::TransportFailed { sequence, .. } => assert_eq!(sequence, 1),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(wait_until_idle(&controller, test_timeout()));

    controller.ingest(0, &rgb_frame(2, |_| 2)).unwrap();
    match events.recv_timeout(test_timeout()).unwrap() {
        TransferEvent::FrameSent {
            sequence, channels, ..
        } => {
            assert_eq!(sequence, 2);
            assert_eq!(channels, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(wait_until_idle(&controller, test_timeout()));

    let stats = controller.stats();
    assert_eq!(stats.frames_failed, 1);
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(handle.frame_count(), 1);
}

#[test]
fn test_full_event_queue_counts_drops() {
    let map = MappingBuilder::new().range(0, 1).build();
    let transport = MockTransport::new();
    let handle = transport.handle();
    let mut controller =
        ChannelController::new("generic", "tiny", test_geometry(), Box::new(transport), 1);
    controller.configure(&map).unwrap();
    controller.start().unwrap();

    for n in 1..=3 {
        controller.ingest(0, &[n; 3]).unwrap();
        assert!(handle.wait_for_frames(n as usize, test_timeout()));
        assert!(wait_until_idle(&controller, test_timeout()));
    }

    assert_eq!(controller.stats().dropped_events, 2);
}

#[test]
fn test_innocore_end_to_end_through_registry() {
    let transport = MockTransport::new();
    let handle = transport.handle();
    let mut device = DeviceRegistry::with_builtin()
        .create(&DeviceConfig::new("innocore"), Box::new(transport))
        .unwrap();

    let map = MappingBuilder::new().range(0, 70).build();
    device.load_mapping(&map).unwrap();
    device.open().unwrap();

    let frame = rgb_frame(70, |i| i as u8);
    let disposition = device
        .write_message(&OpcMessage::set_pixels(0, frame.clone()))
        .unwrap();
    assert_eq!(disposition, Disposition::Applied);
    assert!(handle.wait_for_frames(1, test_timeout()));

    let sent = &handle.frames()[0];
    assert_eq!(sent.channel(0).unwrap(), &frame[..64 * 3]);
    let ch1 = sent.channel(1).unwrap();
    assert_eq!(&ch1[..6 * 3], &frame[64 * 3..]);
    assert!(ch1[6 * 3..].iter().all(|&b| b == 0));
    assert!(sent.channel(2).is_none());

    let description = device.describe();
    assert!(description.running);
    assert!(description.opened_at.is_some());
    assert_eq!(description.output_channels, vec![0, 1]);

    device.close().unwrap();
    assert!(!device.describe().running);
}

#[test]
fn test_failed_mapping_reports_not_ready() {
    let mut device = DeviceRegistry::with_builtin()
        .create(&DeviceConfig::new("innocore"), Box::new(MockTransport::new()))
        .unwrap();
    device.open().unwrap();

    // Slot 5 walking backward 10 pixels runs off channel 0 into channel -1
    let map = MappingBuilder::new().range(5, -10).build();
    assert!(device.load_mapping(&map).is_err());

    let result = device.write_message(&OpcMessage::set_pixels(0, vec![1, 2, 3]));
    assert_eq!(result, Err(IngestError::NotReady));

    let description = device.describe();
    assert!(!description.mapping_available);
    assert!(description
        .last_mapping_error
        .unwrap()
        .contains("channel -1"));
}
