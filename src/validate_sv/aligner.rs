use super::StageContext;
use crate::artifacts::Artifact;
use crate::tool_runner::{Stage, StageResult, ToolInvocation};

/// Align the extracted reads to the GFA export of the local graph
///
pub(super) fn align_reads_to_graph(stage_context: &StageContext) -> StageResult<()> {
    let ns = stage_context.namespace;
    let thread_count = stage_context.tools.thread_count.to_string();
    let gfa_filename = ns.path(Artifact::GraphGfa);
    let fasta_filename = ns.path(Artifact::ReadFasta);

    stage_context.run(
        &ToolInvocation::new(
            Stage::AlignReads,
            &stage_context.tools.minigraph,
            &[
                "-t",
                thread_count.as_str(),
                "-c",
                gfa_filename.as_str(),
                fasta_filename.as_str(),
            ],
        )
        .stdout_to(&ns.path(Artifact::ReadGaf)),
    )
}
