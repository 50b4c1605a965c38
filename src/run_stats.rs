//! Track stats for the whole svvalidate run
//!

use std::collections::BTreeMap;
use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use unwrap::unwrap;

use crate::tool_runner::Stage;
use crate::validate_sv::{SVValidationResult, ValidationScore};

pub const RUN_STATS_FILENAME: &str = "run.stats.json";

#[derive(Default, Deserialize, Serialize)]
pub struct ValidateRunStats {
    pub input_record_count: usize,

    /// Variants selected for validation based on allele size
    pub selected_sv_count: usize,

    pub scored_sv_count: usize,

    /// SVs where all stages completed but no allele depth evidence was found
    pub uncallable_sv_count: usize,

    /// SVs which failed at any stage, indexed by the failing stage
    pub stage_failures: BTreeMap<Stage, usize>,

    pub cleanup_failure_count: usize,

    pub total_validation_time_secs: f64,
}

impl ValidateRunStats {
    pub fn add_sv_result(&mut self, result: &SVValidationResult) {
        self.selected_sv_count += 1;
        match (result.failed_stage, result.score) {
            (Some(stage), _) => *self.stage_failures.entry(stage).or_insert(0) += 1,
            (None, ValidationScore::Scored(_)) => self.scored_sv_count += 1,
            (None, ValidationScore::Uncallable) => self.uncallable_sv_count += 1,
        }
        self.cleanup_failure_count += result.cleanup_failure_count;
        self.total_validation_time_secs += result.duration.as_secs_f64();
    }

    pub fn stage_failure_count(&self) -> usize {
        self.stage_failures.values().sum()
    }
}

/// Write run_stats structure out in json format
pub fn write_validate_run_stats(output_dir: &Utf8Path, run_stats: &ValidateRunStats) {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create run statistics json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, &run_stats).unwrap();
}
