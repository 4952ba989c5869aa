use std::sync::Arc;
use std::time::Duration;

use crate::error::{TriggerError, TsfError};
use crate::interface::TsfInterface;
use crate::testing::{FirmwareBehavior, FirmwareSimulator, ManualHostClock, RecordingTrigger};
use crate::tsf::capture::CaptureRequest;
use crate::tsf::query::{TsfCommand, TsfGetState, TsfOperation, TsfResponse};
use crate::types::{ConnectionState, InterfaceRole, SyncOptions, TsfConfig};

const START_NANOS: u64 = 2_000_000;

fn config(options: SyncOptions) -> TsfConfig {
    TsfConfig::builder()
        .gpio_pin(17)
        .capture_timeout(Duration::from_millis(200))
        .ptp_options(options)
        .build()
}

/// Interface wired to a firmware simulator whose events are pumped back in.
fn simulated(
    role: InterfaceRole,
    options: SyncOptions,
) -> (Arc<TsfInterface>, Arc<FirmwareSimulator>, Arc<ManualHostClock>) {
    let clock = Arc::new(ManualHostClock::new(START_NANOS));
    let (sim, mut events) = FirmwareSimulator::new(clock.clone(), 1000, 10);
    let sim = Arc::new(sim);
    let iface = Arc::new(
        TsfInterface::with_host_clock("wlan0", role, config(options), sim.clone(), clock.clone())
            .unwrap(),
    );
    let pump = Arc::downgrade(&iface);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(iface) = pump.upgrade() else { break };
            iface.on_capture_event(event);
        }
    });
    (iface, sim, clock)
}

fn connected(iface: &TsfInterface) {
    iface.init();
    iface.on_connection_state_change(ConnectionState::Associated, ConnectionState::Connected);
}

// ===== Query path gating =====

#[tokio::test]
async fn test_not_initialized() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    iface.on_connection_state_change(ConnectionState::Associated, ConnectionState::Connected);

    assert_eq!(iface.get_tsf().state, TsfGetState::NotReady);
    assert_eq!(iface.capture_tsf(None).await.state, TsfGetState::NotReady);
}

#[tokio::test]
async fn test_disabled_in_ptp_mode() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::TX);
    connected(&iface);

    assert_eq!(iface.get_tsf().state, TsfGetState::DisabledByTsfPlus);
    assert_eq!(
        iface.capture_tsf(None).await.state,
        TsfGetState::DisabledByTsfPlus
    );
}

#[tokio::test]
async fn test_station_not_connected() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    iface.init();

    let response = iface.capture_tsf(None).await;
    assert_eq!(response.state, TsfGetState::StaNotConnectedNoTsf);
    assert_eq!(response.value, None);
    assert_eq!(iface.capture().stats().armed, 0);
}

#[tokio::test]
async fn test_soft_ap_not_started() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::SoftAp, SyncOptions::empty());
    iface.init();
    assert_eq!(iface.get_tsf().state, TsfGetState::SapNotStartedNoTsf);
}

#[tokio::test]
async fn test_associated_is_not_connected() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    iface.init();
    iface.on_connection_state_change(ConnectionState::NotConnected, ConnectionState::Associated);
    assert_eq!(iface.get_tsf().state, TsfGetState::StaNotConnectedNoTsf);
}

// ===== GET =====

#[tokio::test]
async fn test_get_before_any_capture() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);

    let response = iface.get_tsf();
    assert_eq!(response.state, TsfGetState::NotReady);
    assert_eq!(response.value, None);
    // GET never arms the hardware.
    assert_eq!(iface.capture().stats().armed, 0);
}

#[tokio::test]
async fn test_get_while_capturing() {
    let clock = Arc::new(ManualHostClock::new(START_NANOS));
    let iface = TsfInterface::with_host_clock(
        "wlan0",
        InterfaceRole::Station,
        config(SyncOptions::empty()),
        Arc::new(RecordingTrigger::new()),
        clock,
    )
    .unwrap();
    connected(&iface);
    iface.translator().update_anchor(10, START_NANOS);

    let _pending = iface
        .capture()
        .arm_capture(crate::tsf::CaptureRequest::one_shot(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(iface.get_tsf().state, TsfGetState::CurrentInCapState);
}

// ===== SET =====

#[tokio::test]
async fn test_capture_returns_latched_value() {
    let (iface, _sim, clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);

    let response = iface.capture_tsf(None).await;
    assert_eq!(response.state, TsfGetState::Return);
    assert_eq!(response.value, Some(10 + START_NANOS / 1000));

    // GET extrapolates from the new anchor.
    assert_eq!(iface.get_tsf().value, Some(2010));
    clock.advance(5_000);
    let response = iface.get_tsf();
    assert_eq!(response.state, TsfGetState::Return);
    assert_eq!(response.value, Some(2015));
}

#[tokio::test]
async fn test_capture_uses_configured_gpio_unless_overridden() {
    let (trigger, mut calls) = RecordingTrigger::with_channel();
    let iface = Arc::new(
        TsfInterface::with_host_clock(
            "wlan0",
            InterfaceRole::Station,
            config(SyncOptions::empty()),
            Arc::new(trigger),
            Arc::new(ManualHostClock::new(START_NANOS)),
        )
        .unwrap(),
    );
    connected(&iface);

    let pump = Arc::clone(&iface);
    tokio::spawn(async move {
        while let Some(call) = calls.recv().await {
            pump.on_capture_event(crate::tsf::CaptureEvent {
                token: call.token,
                radio_time: u64::from(call.gpio.unwrap_or_default()),
                status: crate::tsf::FirmwareStatus::Success,
            });
        }
    });

    assert_eq!(iface.capture_tsf(None).await.value, Some(17));
    assert_eq!(iface.capture_tsf(Some(4)).await.value, Some(4));
}

#[tokio::test]
async fn test_capture_firmware_failure() {
    let (iface, sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);
    sim.push_behavior(FirmwareBehavior::Fail(2));

    let response = iface.capture_tsf(None).await;
    assert_eq!(response.state, TsfGetState::CaptureFail);
    assert_eq!(iface.get_tsf().state, TsfGetState::NotReady);
}

#[tokio::test(start_paused = true)]
async fn test_capture_firmware_silent() {
    let (iface, sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);
    sim.push_behavior(FirmwareBehavior::Drop);

    let response = iface.capture_tsf(None).await;
    assert_eq!(response.state, TsfGetState::NotReturnedByFw);
    assert!(!iface.capture().is_capturing());

    // Hardware recovers on the next request.
    assert_eq!(iface.capture_tsf(None).await.state, TsfGetState::Return);
}

#[tokio::test]
async fn test_capture_gpio_reset_failure() {
    let trigger = Arc::new(RecordingTrigger::new());
    trigger.set_failing(true);
    let iface = TsfInterface::with_host_clock(
        "wlan0",
        InterfaceRole::Station,
        config(SyncOptions::empty()),
        trigger,
        Arc::new(ManualHostClock::new(START_NANOS)),
    )
    .unwrap();
    connected(&iface);

    assert_eq!(
        iface.capture_tsf(None).await.state,
        TsfGetState::ResetGpioFail
    );
    assert!(!iface.capture().is_capturing());
}

#[tokio::test]
async fn test_vendor_command_dispatch() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);

    let get = iface.handle_tsf_cmd(TsfCommand::get()).await;
    assert_eq!(get.state, TsfGetState::NotReady);

    let set = iface
        .handle_tsf_cmd(TsfCommand {
            operation: TsfOperation::Set,
            target_gpio: Some(5),
        })
        .await;
    assert_eq!(set.state, TsfGetState::Return);

    let get = iface.handle_tsf_cmd(TsfCommand::get()).await;
    assert_eq!(get, set);
}

#[tokio::test]
async fn test_deinit_makes_queries_not_ready() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);
    assert_eq!(iface.capture_tsf(None).await.state, TsfGetState::Return);

    iface.deinit();
    assert_eq!(iface.get_tsf().state, TsfGetState::NotReady);
    assert!(!iface.translator().is_ready());
}

#[tokio::test]
async fn test_no_capture_after_deinit() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);
    iface.deinit();

    let armed = iface.capture().stats().armed;
    assert!(matches!(
        iface
            .capture()
            .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1))),
        Err(TsfError::NotReady)
    ));
    assert_eq!(iface.capture().stats().armed, armed);

    // Nothing reached the firmware, so nothing can land in the anchor.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!iface.translator().is_ready());
}

#[tokio::test]
async fn test_disconnect_blocks_captures_until_reconnect() {
    let (iface, _sim, _clock) = simulated(InterfaceRole::Station, SyncOptions::empty());
    connected(&iface);
    iface.on_connection_state_change(ConnectionState::Connected, ConnectionState::NotConnected);

    assert!(iface
        .capture()
        .arm_capture(CaptureRequest::one_shot(Duration::from_secs(1)))
        .is_err());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!iface.translator().is_ready());

    iface.on_connection_state_change(ConnectionState::NotConnected, ConnectionState::Connected);
    assert_eq!(iface.capture_tsf(None).await.state, TsfGetState::Return);
    assert!(iface.translator().is_ready());
}

// ===== Response encoding =====

#[test]
fn test_response_words() {
    let response = TsfResponse {
        state: TsfGetState::Return,
        value: Some(0x0000_0001_8000_0002),
    };
    assert_eq!(response.to_words(), [0, 0x8000_0002, 1]);

    let response = TsfResponse {
        state: TsfGetState::DisabledByTsfPlus,
        value: None,
    };
    assert_eq!(response.to_words(), [9, 0, 0]);
}

#[test]
fn test_state_codes() {
    assert_eq!(TsfGetState::Return.code(), 0);
    assert_eq!(TsfGetState::StaNotConnectedNoTsf.code(), 1);
    assert_eq!(TsfGetState::CurrentInCapState.code(), 3);
    assert_eq!(TsfGetState::SapNotStartedNoTsf.code(), 7);
    assert_eq!(TsfGetState::NotReady.code(), 8);
}

#[test]
fn test_error_mapping() {
    let cases = [
        (TsfError::AnchorNotReady, TsfGetState::NotReady),
        (TsfError::NotReady, TsfGetState::NotReady),
        (TsfError::AlreadyCapturing, TsfGetState::CurrentInCapState),
        (
            TsfError::CaptureTimeout {
                duration: Duration::from_secs(1),
            },
            TsfGetState::NotReturnedByFw,
        ),
        (
            TsfError::CaptureFailed { status: 1 },
            TsfGetState::CaptureFail,
        ),
        (
            TsfError::GpioResetFailed(TriggerError::GpioReset { pin: 3 }),
            TsfGetState::ResetGpioFail,
        ),
        (TsfError::CaptureAborted, TsfGetState::GetFail),
        (TsfError::DisabledByMode, TsfGetState::DisabledByTsfPlus),
        (
            TsfError::NotConnected {
                role: InterfaceRole::SoftAp,
            },
            TsfGetState::SapNotStartedNoTsf,
        ),
    ];
    for (err, state) in &cases {
        assert_eq!(TsfGetState::from(err), *state, "{err}");
    }
}

#[test]
fn test_response_serializes() {
    let response = TsfResponse {
        state: TsfGetState::Return,
        value: Some(42),
    };
    let json = serde_json::to_value(response).unwrap();
    assert_eq!(json["state"], "Return");
    assert_eq!(json["value"], 42);
}
