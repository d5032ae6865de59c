//! # Logger
//!
//! Optional diagnostic log. Each run truncates `fontpatch.log` in the user's home directory and writes one
//! timestamped line per event. If the file can't be created the run carries on without a log.

use std::{env, fs::File, path::PathBuf, time::SystemTime};

use lazy_static::lazy_static;
use log::LevelFilter;

/// Name of the log file
pub const LOG_FILE_NAME: &str = "fontpatch.log";

/// Environment variable naming the user's home directory
#[cfg(windows)]
const HOME_VAR: &str = "USERPROFILE";
/// Environment variable naming the user's home directory
#[cfg(not(windows))]
const HOME_VAR: &str = "HOME";

lazy_static! {
    /// Where the log goes for this process
    pub static ref LOG_PATH: PathBuf = log_path(env::var_os(HOME_VAR).map(PathBuf::from));
}

/// Log file inside `home`, or inside the temp directory if there is no home
fn log_path(home: Option<PathBuf>) -> PathBuf {
    home.filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(env::temp_dir)
        .join(LOG_FILE_NAME)
}

/// Installs the file logger. Returns `false` if there is no log for this run.
pub fn init() -> bool {
    let file = match File::create(&*LOG_PATH) {
        Ok(file) => file,
        Err(_) => return false,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .chain(file)
        .apply()
        .is_ok()
}
