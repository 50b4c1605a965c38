use clap::Args;
use serde::Serialize;
use simple_error::{SimpleResult, bail};

#[derive(Args, Serialize)]
pub struct SharedSettings {
    /// Number of threads passed to each external tool (minigraph, vg pack, vg call)
    #[arg(long = "threads", value_name = "THREAD_COUNT", default_value_t = 2)]
    pub thread_count: usize,

    /// Number of SVs to validate concurrently
    ///
    /// Each worker runs the full external tool pipeline for one SV at a time, so the total thread
    /// demand is approximately workers x threads.
    ///
    #[arg(long = "workers", value_name = "WORKER_COUNT", default_value_t = 1)]
    pub worker_count: usize,

    /// Overwrite an existing output directory
    #[arg(long)]
    pub clobber: bool,

    /// Turn on extra debug logging
    ///
    /// This option enables extra logging intended for debugging only, including the command line
    /// of every external tool invocation.
    ///
    #[arg(long)]
    pub debug: bool,
}

pub fn validate_and_fix_shared_settings(settings: SharedSettings) -> SimpleResult<SharedSettings> {
    if settings.thread_count == 0 {
        bail!("--threads argument must be greater than 0");
    }
    if settings.worker_count == 0 {
        bail!("--workers argument must be greater than 0");
    }

    Ok(settings)
}

/// Total number of threads which may be running in external tools at once
///
pub fn get_max_tool_thread_demand(settings: &SharedSettings) -> usize {
    settings.thread_count * settings.worker_count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_settings(thread_count: usize, worker_count: usize) -> SharedSettings {
        SharedSettings {
            thread_count,
            worker_count,
            clobber: false,
            debug: false,
        }
    }

    #[test]
    fn test_validate_and_fix_shared_settings() {
        assert!(validate_and_fix_shared_settings(get_test_settings(2, 1)).is_ok());
        assert!(validate_and_fix_shared_settings(get_test_settings(0, 1)).is_err());
        assert!(validate_and_fix_shared_settings(get_test_settings(2, 0)).is_err());
    }

    #[test]
    fn test_get_max_tool_thread_demand() {
        assert_eq!(get_max_tool_thread_demand(&get_test_settings(4, 3)), 12);
    }
}
