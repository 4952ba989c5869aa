use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::tsf::{
    CaptureRequest, CaptureStateMachine, ClockTranslator, FirmwareStatus, HostClock,
};

fn machine_with(trigger: Arc<dyn CaptureTrigger>) -> Arc<CaptureStateMachine> {
    Arc::new(CaptureStateMachine::new(
        Arc::new(ClockTranslator::default()),
        trigger,
        Arc::new(ManualHostClock::new(0)),
    ))
}

#[test]
fn test_manual_clock_moves_only_when_told() {
    let clock = ManualHostClock::new(100);
    assert_eq!(clock.now_nanos(), 100);
    clock.advance(50);
    assert_eq!(clock.now_nanos(), 150);
    clock.set(7);
    assert_eq!(clock.now_nanos(), 7);
}

#[test]
fn test_recording_trigger_records_calls() {
    let trigger = Arc::new(RecordingTrigger::new());
    let machine = machine_with(trigger.clone());

    let pending = machine
        .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)).with_gpio(Some(3)))
        .unwrap();

    let calls = trigger.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].gpio, Some(3));
    assert_eq!(trigger.last_token(), Some(pending.token()));
}

#[test]
fn test_recording_trigger_failing() {
    let trigger = RecordingTrigger::new();
    trigger.set_failing(true);
    let machine = machine_with(Arc::new(trigger));

    let result =
        machine.arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)).with_gpio(Some(9)));
    assert!(matches!(result, Err(crate::TsfError::GpioResetFailed(_))));
}

#[tokio::test]
async fn test_recording_trigger_channel() {
    let (trigger, mut rx) = RecordingTrigger::with_channel();
    let machine = machine_with(Arc::new(trigger));

    let pending = machine
        .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)))
        .unwrap();
    let call = rx.recv().await.unwrap();
    assert_eq!(call.token, pending.token());
}

#[tokio::test]
async fn test_firmware_sim_latches_simulated_tsf() {
    let clock = Arc::new(ManualHostClock::new(2_000_000));
    let (sim, mut events) = FirmwareSimulator::new(clock.clone(), 1000, 10);
    let machine = machine_with(Arc::new(sim));

    let pending = machine
        .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)))
        .unwrap();
    let event = events.recv().await.unwrap();

    assert_eq!(event.token, pending.token());
    assert_eq!(event.radio_time, 10 + 2_000);
    assert_eq!(event.status, FirmwareStatus::Success);
}

#[tokio::test]
async fn test_firmware_sim_script() {
    let clock = Arc::new(ManualHostClock::new(0));
    let (sim, mut events) = FirmwareSimulator::new(clock, 1000, 0);
    sim.push_behavior(FirmwareBehavior::Duplicate);
    sim.push_behavior(FirmwareBehavior::Fail(7));
    let sim = Arc::new(sim);
    let machine = machine_with(sim.clone());

    let first = machine.arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)));
    let first = first.unwrap();
    let a = events.recv().await.unwrap();
    let b = events.recv().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.token, first.token());

    machine.on_capture_event(a);
    let second = machine
        .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)))
        .unwrap();
    let c = events.recv().await.unwrap();
    assert_eq!(c.token, second.token());
    assert_eq!(c.status, FirmwareStatus::Failed(7));
}

#[tokio::test(start_paused = true)]
async fn test_firmware_sim_delay() {
    let clock = Arc::new(ManualHostClock::new(0));
    let (sim, mut events) = FirmwareSimulator::new(clock, 1000, 0);
    let sim = sim.with_delay(Duration::from_millis(300));
    let machine = machine_with(Arc::new(sim));

    let _pending = machine
        .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)))
        .unwrap();
    assert!(events.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(301)).await;
    assert!(events.try_recv().is_ok());
}

#[test]
fn test_packet_records_timestamp() {
    let mut packet = TestPacket::new(b"ptp");
    assert!(packet.timestamp.is_none());
    packet.set_timestamp(PacketTimestamp {
        host_time: 42,
        radio_time: None,
    });
    assert_eq!(packet.timestamp.unwrap().host_time, 42);
}
