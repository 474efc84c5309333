//! Backend constants and defaults

/// Register written to trigger the inclinometer reset (taratura)
pub const RESET_REGISTER: &str = "COM_Digil2_Conf_Incl_Taratura";

/// Value written to [`RESET_REGISTER`]
pub const RESET_VALUE: &str = "1";

/// Substring identifying the reset register in the commands log
pub const RESET_REGISTER_MARKER: &str = "Incl_Taratura";

/// Hours of command history read by the queue check
pub const DEFAULT_QUEUE_HOURS: u32 = 24;

/// Peripheral addressed by `set_value` commands
pub const RESET_PERIPHERAL: &str = "sjb";

/// Inclinometer alarm flag
pub const ALARM_REGISTER: &str = "ALG_Digil2_Alm_Incl";

/// X-axis inclination average
pub const INC_X_REGISTER: &str = "SENS_Digil2_Inc_X.avg";

/// Y-axis inclination average
pub const INC_Y_REGISTER: &str = "SENS_Digil2_Inc_Y.avg";

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "https://digil-back-end-onesait.servizi.prv";

/// Token lifetime when the auth response carries no `expires_in` (seconds)
pub const TOKEN_LIFETIME_SECS: u64 = 300;

/// Refresh this many seconds before the token expires
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 30;

/// Default number of concurrent device workers
pub const DEFAULT_WORKERS: usize = 87;

/// Default pause between attempts on an unreachable device (seconds)
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 30;

/// Default retry window for master devices (minutes)
pub const DEFAULT_MASTER_WINDOW_MINS: u64 = 10;

/// Default retry window for slave devices (minutes)
pub const DEFAULT_SLAVE_WINDOW_MINS: u64 = 20;

/// Default per-request timeout for commands (seconds)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Default per-request timeout for reads (seconds)
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Maximum |avg| accepted on each inclination axis
pub const DEFAULT_TOLERANCE: f64 = 0.20;

/// Placeholder shipped in the sample environment file
pub const SECRET_PLACEHOLDER: &str = "YOUR_CLIENT_SECRET_HERE";
