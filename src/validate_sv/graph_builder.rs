use super::StageContext;
use crate::artifacts::Artifact;
use crate::region::RegionWindow;
use crate::sv_candidate::SVCandidate;
use crate::tool_runner::{Stage, StageError, StageResult, ToolInvocation};
use crate::vcf_utils::{bgzip_file, build_tabix_index, write_single_variant_vcf};

/// Write the single-SV VCF, and its compressed and tabix-indexed copy
///
fn write_indexed_single_sv_vcf(stage_context: &StageContext, sv: &SVCandidate) -> StageResult<()> {
    let stage = Stage::PrepareVariant;
    let ns = stage_context.namespace;
    let vcf_filename = ns.path(Artifact::SingleSvVcf);
    let vcf_gz_filename = ns.path(Artifact::SingleSvVcfGz);

    write_single_variant_vcf(
        &vcf_filename,
        sv.chrom(),
        sv.start() + 1,
        sv.ref_allele(),
        sv.alt_allele(),
    )
    .map_err(|e| StageError::new(stage, e.to_string()))?;

    bgzip_file(&vcf_filename, &vcf_gz_filename)
        .map_err(|e| StageError::new(stage, e.to_string()))?;

    build_tabix_index(&vcf_gz_filename).map_err(|e| StageError::new(stage, e.to_string()))
}

/// Build the local variation graph containing the SV over the graph window, and export it to GFA
/// for read alignment
///
pub(super) fn build_local_graph(
    stage_context: &StageContext,
    ref_filename: &str,
    sv: &SVCandidate,
    graph_region: &RegionWindow,
) -> StageResult<()> {
    write_indexed_single_sv_vcf(stage_context, sv)?;

    let ns = stage_context.namespace;
    let vg = stage_context.tools.vg.as_str();
    let vcf_gz_filename = ns.path(Artifact::SingleSvVcfGz);
    let graph_filename = ns.path(Artifact::Graph);
    let region_str = graph_region.to_region_str();

    stage_context.run(
        &ToolInvocation::new(
            Stage::ConstructGraph,
            vg,
            &[
                "construct",
                "-a",
                "-m",
                "1024",
                "-S",
                "-r",
                ref_filename,
                "-v",
                vcf_gz_filename.as_str(),
                "-R",
                region_str.as_str(),
            ],
        )
        .stdout_to(&graph_filename),
    )?;

    stage_context.run(
        &ToolInvocation::new(
            Stage::ExportGraph,
            vg,
            &["convert", "-f", graph_filename.as_str()],
        )
        .stdout_to(&ns.path(Artifact::GraphGfa)),
    )
}
