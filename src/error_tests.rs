use crate::error::*;
use crate::types::InterfaceRole;
use std::time::Duration;

#[test]
fn test_error_display() {
    let err = TsfError::CaptureTimeout {
        duration: Duration::from_millis(500),
    };
    assert_eq!(err.to_string(), "capture timed out after 500ms");

    let err = TsfError::CaptureFailed { status: 4 };
    assert_eq!(err.to_string(), "capture failed: firmware status 4");

    let err = TsfError::NotConnected {
        role: InterfaceRole::SoftAp,
    };
    assert_eq!(err.to_string(), "SoftAp has no active link");
}

#[test]
fn test_error_is_recoverable() {
    assert!(TsfError::AlreadyCapturing.is_recoverable());
    assert!(TsfError::AnchorNotReady.is_recoverable());
    assert!(TsfError::CaptureAborted.is_recoverable());

    assert!(!TsfError::DisabledByMode.is_recoverable());
    assert!(!TsfError::Unsupported.is_recoverable());
}

#[test]
fn test_error_is_firmware_failure() {
    assert!(TsfError::CaptureFailed { status: 1 }.is_firmware_failure());
    assert!(
        TsfError::CaptureTimeout {
            duration: Duration::from_secs(1)
        }
        .is_firmware_failure()
    );
    assert!(!TsfError::GpioResetFailed(TriggerError::GpioReset { pin: 2 }).is_firmware_failure());
}

#[test]
fn test_gpio_error_keeps_source() {
    use std::error::Error as _;

    let err = TsfError::GpioResetFailed(TriggerError::GpioReset { pin: 17 });
    assert_eq!(err.to_string(), "GPIO reset failed: GPIO 17 reset failed");
    assert_eq!(
        err.source().map(ToString::to_string),
        Some("GPIO 17 reset failed".to_string())
    );
}

#[test]
fn test_error_from_config() {
    let config_err = ConfigError::InvalidValue {
        field: "tick_nanos",
        message: "must be non-zero".to_string(),
    };
    let err: TsfError = config_err.into();

    assert!(matches!(err, TsfError::Config(_)));
    assert_eq!(
        err.to_string(),
        "config error: invalid value for tick_nanos: must be non-zero"
    );
}

#[test]
fn test_config_error_from_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: ConfigError = json_err.into();
    assert!(matches!(err, ConfigError::Parse(_)));
}
