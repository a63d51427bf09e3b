//! DAB 0.1 command topics

pub const APPLICATIONS_LIST: &str = "dab/applications/list";
pub const APPLICATIONS_LAUNCH: &str = "dab/applications/launch";
pub const APPLICATIONS_LAUNCH_WITH_CONTENT: &str = "dab/applications/launch-with-content";
pub const APPLICATIONS_EXIT: &str = "dab/applications/exit";
pub const APPLICATIONS_GET_STATE: &str = "dab/applications/get-state";

pub const SYSTEM_RESTART: &str = "dab/system/restart";
pub const SYSTEM_LANGUAGE_LIST: &str = "dab/system/language/list";
pub const SYSTEM_LANGUAGE_GET: &str = "dab/system/language/get";
pub const SYSTEM_LANGUAGE_SET: &str = "dab/system/language/set";

pub const DEVICE_TELEMETRY_START: &str = "dab/device-telemetry/start";
pub const DEVICE_TELEMETRY_STOP: &str = "dab/device-telemetry/stop";
pub const APP_TELEMETRY_START: &str = "dab/app-telemetry/start";
pub const APP_TELEMETRY_STOP: &str = "dab/app-telemetry/stop";

pub const INPUT_KEY_PRESS: &str = "dab/input/key-press";
pub const INPUT_LONG_KEY_PRESS: &str = "dab/input/long-key-press";

pub const HEALTH_CHECK: &str = "dab/health-check/get";

// Retained announcements
pub const DEVICE_INFO: &str = "dab/device/info";
pub const VERSION: &str = "dab/version";

/// Every request topic a DAB 0.1 device answers
pub const COMMANDS: [&str; 16] = [
    APPLICATIONS_LIST,
    APPLICATIONS_LAUNCH,
    APPLICATIONS_LAUNCH_WITH_CONTENT,
    APPLICATIONS_EXIT,
    APPLICATIONS_GET_STATE,
    SYSTEM_RESTART,
    SYSTEM_LANGUAGE_LIST,
    SYSTEM_LANGUAGE_GET,
    SYSTEM_LANGUAGE_SET,
    DEVICE_TELEMETRY_START,
    DEVICE_TELEMETRY_STOP,
    APP_TELEMETRY_START,
    APP_TELEMETRY_STOP,
    INPUT_KEY_PRESS,
    INPUT_LONG_KEY_PRESS,
    HEALTH_CHECK,
];
