//! Test doubles for the external tool stages
//!

use std::io::Write;
use std::sync::Mutex;

use camino::Utf8Path;

use crate::tool_runner::{Stage, StageError, StageResult, ToolInvocation, ToolRunner};

/// Write a genotype call VCF as produced by `vg call`, with one record per AD value
///
pub fn write_called_vcf(filename: &Utf8Path, ad_values: &[&str]) {
    let mut f = std::fs::File::create(filename).unwrap();
    writeln!(f, "##fileformat=VCFv4.2").unwrap();
    writeln!(f, "##contig=<ID=chr1,length=1000000>").unwrap();
    writeln!(
        f,
        "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">"
    )
    .unwrap();
    writeln!(
        f,
        "##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths for the ref and alt alleles in the order listed\">"
    )
    .unwrap();
    writeln!(
        f,
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE"
    )
    .unwrap();
    for (index, ad) in ad_values.iter().enumerate() {
        writeln!(
            f,
            "chr1\t{}\t.\tA\tAACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT\t30\tPASS\t.\tGT:AD\t0/1:{ad}",
            1000 + index
        )
        .unwrap();
    }
}

/// Stands in for the external tools, writing a placeholder for each stage output and a
/// genotype call file with a fixed AD value
///
pub struct FakeToolRunner {
    /// AD value written to the genotype call file, or no record if None
    call_ad: Option<String>,

    /// Stage which exits with an error
    fail_stage: Option<Stage>,

    /// Program and arguments of every invocation run, in order
    invocation_log: Mutex<Vec<(Stage, Vec<String>)>>,
}

impl FakeToolRunner {
    pub fn new(call_ad: Option<&str>) -> Self {
        Self {
            call_ad: call_ad.map(|x| x.to_string()),
            fail_stage: None,
            invocation_log: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            call_ad: Some("0,10".to_string()),
            fail_stage: Some(stage),
            invocation_log: Mutex::new(Vec::new()),
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.invocation_log
            .lock()
            .unwrap()
            .iter()
            .map(|(stage, _)| *stage)
            .collect()
    }

    /// Program followed by arguments for the first invocation of the given stage
    pub fn invocation_args(&self, stage: Stage) -> Vec<String> {
        self.invocation_log
            .lock()
            .unwrap()
            .iter()
            .find(|(x, _)| *x == stage)
            .map(|(_, args)| args.clone())
            .unwrap_or_default()
    }
}

impl ToolRunner for FakeToolRunner {
    fn run(&self, invocation: &ToolInvocation, log_filename: &Utf8Path) -> StageResult<()> {
        let args = std::iter::once(invocation.program.clone())
            .chain(invocation.args.iter().cloned())
            .collect();
        self.invocation_log
            .lock()
            .unwrap()
            .push((invocation.stage, args));

        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_filename)
            .map_err(|e| StageError::new(invocation.stage, format!("Can't open stage log: {e}")))?;
        writeln!(log_file, "## {}: {}", invocation.stage, invocation.cmdline()).unwrap();

        if self.fail_stage == Some(invocation.stage) {
            writeln!(log_file, "fake tool error").unwrap();
            return Err(StageError::new(invocation.stage, "exited with status 1"));
        }

        // The pack stage writes its output through the '-o' argument
        if invocation.stage == Stage::PackCoverage {
            let pos = invocation.args.iter().position(|x| x == "-o").unwrap();
            std::fs::write(&invocation.args[pos + 1], "pack").unwrap();
        }

        if let Some(filename) = &invocation.stdout_filename {
            if invocation.stage == Stage::CallGenotype {
                match &self.call_ad {
                    Some(ad) => write_called_vcf(filename, &[ad.as_str()]),
                    None => write_called_vcf(filename, &[]),
                }
            } else {
                std::fs::write(filename, invocation.stage.to_string()).unwrap();
            }
        }
        Ok(())
    }
}
