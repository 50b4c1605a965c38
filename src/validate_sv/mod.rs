//! Validation of a single SV by re-genotyping it against a local variation graph
//!
//! The pipeline for each SV is:
//! 1. Plan the graph and read windows around the SV
//! 2. Build the local graph containing the SV, and export it to GFA
//! 3. Extract reads from the read window
//! 4. Align the reads to the local graph
//! 5. Pack graph coverage and genotype the SV
//! 6. Reduce the genotype allele depths to a validation score
//! 7. Remove the SV's intermediate files
//!
//! Any external tool failure is contained to the SV being validated, which is then reported as
//! uncallable.
//!

mod aligner;
mod genotyper;
mod graph_builder;
mod read_extractor;
mod score;

#[cfg(test)]
pub mod test_utils;

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};

use self::aligner::align_reads_to_graph;
use self::genotyper::genotype_sv;
use self::graph_builder::build_local_graph;
use self::read_extractor::extract_region_reads;
use self::score::get_validation_score;
pub use self::score::ValidationScore;
use crate::artifacts::{Artifact, ArtifactNamespace, RetentionPolicy, clean_artifacts};
use crate::os_utils::remove_file_if_present;
use crate::region::plan_sv_regions;
use crate::sv_candidate::SVCandidate;
use crate::tool_runner::{
    ExternalTools, Stage, StageError, StageResult, ToolInvocation, ToolRunner, get_log_tail,
};

/// Number of stage log lines reported when a stage fails
const STAGE_FAILURE_LOG_LINES: usize = 10;

/// Tools and artifact namespace shared by all stages for one SV
pub(super) struct StageContext<'a> {
    pub tools: &'a ExternalTools,
    pub runner: &'a dyn ToolRunner,
    pub namespace: &'a ArtifactNamespace,
}

impl StageContext<'_> {
    pub fn run(&self, invocation: &ToolInvocation) -> StageResult<()> {
        self.runner
            .run(invocation, &self.namespace.path(Artifact::StageLog))
    }
}

pub struct SVValidationSettings {
    pub graph_flank_size: i64,
    pub read_flank_size: i64,
    pub retention_policy: RetentionPolicy,
}

/// Everything needed to validate any SV, shared read-only by all worker threads
///
pub struct SVValidationContext<'a> {
    pub settings: SVValidationSettings,
    pub tools: ExternalTools,
    pub runner: &'a dyn ToolRunner,
    pub ref_filename: String,
    pub bam_filename: String,

    /// Directory for all SV artifact namespaces
    pub artifact_dir: Utf8PathBuf,
}

#[derive(Clone)]
pub struct SVValidationResult {
    pub score: ValidationScore,

    /// Set if the SV was reported as uncallable because an external stage failed
    pub failed_stage: Option<Stage>,

    /// Count of intermediate files which could not be deleted
    pub cleanup_failure_count: usize,

    pub duration: Duration,
}

fn run_sv_validation_stages(
    context: &SVValidationContext,
    sv: &SVCandidate,
    namespace: &ArtifactNamespace,
) -> StageResult<ValidationScore> {
    let stage_context = StageContext {
        tools: &context.tools,
        runner: context.runner,
        namespace,
    };
    let regions = plan_sv_regions(
        sv,
        context.settings.graph_flank_size,
        context.settings.read_flank_size,
    );
    debug!(
        "SV '{}': graph region {}, read region {}",
        sv.id(),
        regions.graph,
        regions.reads
    );

    build_local_graph(&stage_context, &context.ref_filename, sv, &regions.graph)?;
    extract_region_reads(&stage_context, &context.bam_filename, &regions.reads)?;
    align_reads_to_graph(&stage_context)?;
    genotype_sv(&stage_context)?;
    get_validation_score(&namespace.path(Artifact::CalledVcf))
}

fn report_stage_failure(sv: &SVCandidate, log_filename: &Utf8Path, error: &StageError) {
    warn!(
        "Validation failed for SV '{}' at {}:{}. {error}",
        sv.id(),
        sv.chrom(),
        sv.start() + 1
    );
    for line in get_log_tail(log_filename, STAGE_FAILURE_LOG_LINES) {
        warn!("  {line}");
    }
}

/// Validate one SV and clean up its intermediate files according to the retention policy
///
/// All stage failures are absorbed here, so this always returns a score for the SV.
///
pub fn validate_sv(context: &SVValidationContext, sv: &SVCandidate) -> SVValidationResult {
    let start = Instant::now();
    let namespace = ArtifactNamespace::new(&context.artifact_dir, sv.id());
    let log_filename = namespace.path(Artifact::StageLog);

    // Clear any stage log left from an earlier run, which would otherwise be appended to
    if let Err(e) = remove_file_if_present(&log_filename) {
        warn!("Unable to remove stage log file for SV '{}': '{log_filename}': {e}", sv.id());
    }

    let (score, failed_stage) = match run_sv_validation_stages(context, sv, &namespace) {
        Ok(score) => (score, None),
        Err(e) => {
            report_stage_failure(sv, &log_filename, &e);
            (ValidationScore::Uncallable, Some(e.stage))
        }
    };

    if failed_stage.is_none() {
        match score {
            ValidationScore::Scored(x) => {
                info!("Validated SV '{}' with score {x:.4}", sv.id())
            }
            ValidationScore::Uncallable => {
                debug!("SV '{}' is uncallable in the local graph", sv.id())
            }
        }
    }

    let cleanup_failure_count = if context
        .settings
        .retention_policy
        .retain(failed_stage.is_some())
    {
        0
    } else {
        clean_artifacts(&namespace)
    };

    SVValidationResult {
        score,
        failed_stage,
        cleanup_failure_count,
        duration: start.elapsed(),
    }
}
