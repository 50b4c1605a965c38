use super::StageContext;
use crate::artifacts::Artifact;
use crate::tool_runner::{Stage, StageResult, ToolInvocation};

/// Pack read coverage over the local graph, then genotype the SV from that coverage
///
/// The single-SV VCF is passed to the caller so that the call is made at the SV site only.
///
pub(super) fn genotype_sv(stage_context: &StageContext) -> StageResult<()> {
    let ns = stage_context.namespace;
    let vg = stage_context.tools.vg.as_str();
    let thread_count = stage_context.tools.thread_count.to_string();
    let graph_filename = ns.path(Artifact::Graph);
    let pack_filename = ns.path(Artifact::CoveragePack);
    let gaf_filename = ns.path(Artifact::ReadGaf);
    let vcf_filename = ns.path(Artifact::SingleSvVcf);

    stage_context.run(&ToolInvocation::new(
        Stage::PackCoverage,
        vg,
        &[
            "pack",
            "-t",
            thread_count.as_str(),
            "-e",
            "-x",
            graph_filename.as_str(),
            "-o",
            pack_filename.as_str(),
            "-a",
            gaf_filename.as_str(),
        ],
    ))?;

    stage_context.run(
        &ToolInvocation::new(
            Stage::CallGenotype,
            vg,
            &[
                "call",
                "-t",
                thread_count.as_str(),
                "-k",
                pack_filename.as_str(),
                "-v",
                vcf_filename.as_str(),
                graph_filename.as_str(),
            ],
        )
        .stdout_to(&ns.path(Artifact::CalledVcf)),
    )
}
