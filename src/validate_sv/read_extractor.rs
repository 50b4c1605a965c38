use super::StageContext;
use crate::artifacts::Artifact;
use crate::region::RegionWindow;
use crate::tool_runner::{Stage, StageResult, ToolInvocation};

/// Extract all reads overlapping the read window as FASTA
///
/// An empty window is not an error, and produces empty SAM and FASTA artifacts.
///
pub(super) fn extract_region_reads(
    stage_context: &StageContext,
    bam_filename: &str,
    read_region: &RegionWindow,
) -> StageResult<()> {
    let ns = stage_context.namespace;
    let samtools = stage_context.tools.samtools.as_str();
    let sam_filename = ns.path(Artifact::ReadSam);
    let region_str = read_region.to_region_str();

    stage_context.run(
        &ToolInvocation::new(
            Stage::ExtractReads,
            samtools,
            &["view", "-h", bam_filename, region_str.as_str()],
        )
        .stdout_to(&sam_filename),
    )?;

    stage_context.run(
        &ToolInvocation::new(Stage::ConvertReads, samtools, &["fasta", sam_filename.as_str()])
            .stdout_to(&ns.path(Artifact::ReadFasta)),
    )
}
