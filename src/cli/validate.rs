use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use serde::Serialize;
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::utils::{canonicalize_string_path, check_required_filename};
use crate::region::{GRAPH_FLANK_SIZE, READ_FLANK_SIZE};

pub const SETTINGS_FILENAME: &str = "validate.settings.json";

/// Default name of the annotated VCF, written to the output directory unless --output is given
pub const DEFAULT_OUTPUT_VCF_FILENAME: &str = "validated.vcf.gz";

#[derive(Args, Serialize)]
pub struct ValidateSettings {
    /// Directory for the log, run statistics and all per-SV intermediate files (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_output"))]
    pub output_dir: Utf8PathBuf,

    /// Alignment file for the sample in BAM or CRAM format (must be indexed)
    #[arg(long = "bam", value_name = "FILE")]
    pub bam_filename: String,

    /// Genome reference in FASTA format (must be indexed)
    #[arg(long = "ref", value_name = "FILE")]
    pub ref_filename: String,

    /// Candidate variants in VCF or BCF format, optionally compressed
    #[arg(long = "vcf", value_name = "FILE")]
    pub vcf_filename: String,

    /// Output annotated VCF. The file is BGZF-compressed if the name ends in '.gz'. Defaults to
    /// 'validated.vcf.gz' in the output directory.
    #[arg(long = "output", value_name = "FILE")]
    output_vcf_filename_option: Option<Utf8PathBuf>,

    /// This value will be filled in by output_vcf_filename_option
    #[arg(skip)]
    pub output_vcf_filename: Utf8PathBuf,

    /// Keep all intermediate files for every validated SV
    #[arg(long)]
    pub keep_intermediates: bool,

    /// Keep intermediate files only for SVs where an external tool failed
    #[arg(long)]
    pub keep_failed_intermediates: bool,

    /// Kill any external tool running longer than this, and treat the SV as failed
    #[arg(long = "stage-timeout", value_name = "SECONDS")]
    pub stage_timeout_secs: Option<u64>,

    /// vg executable
    #[arg(long, value_name = "PATH", default_value = "vg")]
    pub vg: String,

    /// samtools executable
    #[arg(long, value_name = "PATH", default_value = "samtools")]
    pub samtools: String,

    /// minigraph executable
    #[arg(long, value_name = "PATH", default_value = "minigraph")]
    pub minigraph: String,

    /// Variants are validated when either the REF or the first ALT allele is longer than this
    #[arg(hide = true, long, default_value_t = 30)]
    pub min_sv_allele_size: usize,

    /// Flank size added on each side of the SV for local graph construction
    #[arg(hide = true, long, default_value_t = GRAPH_FLANK_SIZE)]
    pub graph_flank_size: i64,

    /// Flank size added on each side of the SV for read extraction. Must not exceed
    /// --graph-flank-size.
    #[arg(hide = true, long, default_value_t = READ_FLANK_SIZE)]
    pub read_flank_size: i64,

    /// Number of times a failed external tool is rerun before the SV is treated as failed
    ///
    /// All tools are deterministic, so this is only useful to work around transient system issues.
    ///
    #[arg(hide = true, long, default_value_t = 0)]
    pub stage_retries: usize,

    /// Number of input VCF records held in memory while their SVs are validated
    #[arg(hide = true, long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Don't canonicalize input file paths
    #[arg(long)]
    pub disable_path_canonicalization: bool,
}

impl ValidateSettings {
    /// Directory for all per-SV intermediate files
    pub fn get_artifact_dir(&self) -> Utf8PathBuf {
        self.output_dir.join("sv_artifacts")
    }
}

fn get_output_vcf_filename(settings: &ValidateSettings) -> Utf8PathBuf {
    match &settings.output_vcf_filename_option {
        Some(x) => x.clone(),
        None => settings.output_dir.join(DEFAULT_OUTPUT_VCF_FILENAME),
    }
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_validate_settings(
    mut settings: ValidateSettings,
) -> SimpleResult<ValidateSettings> {
    check_required_filename(&settings.ref_filename, "reference")?;
    check_required_filename(&settings.bam_filename, "alignment")?;
    check_required_filename(&settings.vcf_filename, "variant")?;

    if settings.graph_flank_size < 0 || settings.read_flank_size < 0 {
        bail!("Flank sizes must not be negative");
    }
    if settings.read_flank_size > settings.graph_flank_size {
        bail!(
            "--read-flank-size ({}) must not exceed --graph-flank-size ({})",
            settings.read_flank_size,
            settings.graph_flank_size
        );
    }
    if settings.chunk_size == 0 {
        bail!("--chunk-size argument must be greater than 0");
    }
    if settings.stage_timeout_secs == Some(0) {
        bail!("--stage-timeout argument must be greater than 0");
    }
    if settings.keep_intermediates && settings.keep_failed_intermediates {
        bail!("--keep-intermediates and --keep-failed-intermediates can't be used together");
    }

    // An existing default output is handled with the rest of the output directory by --clobber
    settings.output_vcf_filename = get_output_vcf_filename(&settings);
    if settings.output_vcf_filename_option.is_some() && settings.output_vcf_filename.exists() {
        bail!(
            "Output variant file already exists: '{}'",
            settings.output_vcf_filename
        );
    }
    if let Some(parent) = settings.output_vcf_filename.parent() {
        // The default output location is created with the output directory
        if !parent.as_str().is_empty()
            && !parent.is_dir()
            && settings.output_vcf_filename_option.is_some()
        {
            bail!("Directory for output variant file does not exist: '{parent}'");
        }
    }

    if !settings.disable_path_canonicalization {
        settings.ref_filename = canonicalize_string_path(&settings.ref_filename)?;
        settings.bam_filename = canonicalize_string_path(&settings.bam_filename)?;
        settings.vcf_filename = canonicalize_string_path(&settings.vcf_filename)?;
    }

    Ok(settings)
}

#[derive(Debug, PartialEq)]
enum SettingValidationError {
    NotFound,
    NoIndex,
    ToolNotFound,
}

/// Check that an external tool can be started
///
fn check_tool(program: &str, version_arg: &str) -> Result<(), SettingValidationError> {
    use log::error;
    use std::process::{Command, Stdio};

    match Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Unable to run external tool '{program}': {e}");
            Err(SettingValidationError::ToolNotFound)
        }
    }
}

fn validate_settings_data_impl(settings: &ValidateSettings) -> Result<(), SettingValidationError> {
    use log::error;
    use rust_htslib::{bam, bcf, faidx};

    // IndexedReader is used to test for an alignment index recognized by htslib
    if let Err(error) = bam::IndexedReader::from_path(&settings.bam_filename) {
        error!(
            "Failed to open input alignment file with index '{}': {error}",
            settings.bam_filename
        );
        return Err(SettingValidationError::NoIndex);
    }

    if let Err(error) = faidx::Reader::from_path(&settings.ref_filename) {
        error!(
            "Failed to open indexed reference fasta file '{}': {error}",
            settings.ref_filename
        );
        return Err(SettingValidationError::NoIndex);
    }

    if let Err(error) = bcf::Reader::from_path(&settings.vcf_filename) {
        error!(
            "Failed to open input variant file '{}': {error}",
            settings.vcf_filename
        );
        return Err(SettingValidationError::NotFound);
    }

    check_tool(&settings.vg, "version")?;
    check_tool(&settings.samtools, "--version")?;
    check_tool(&settings.minigraph, "--version")?;

    Ok(())
}

/// Extended input data/settings validation that's too complex/slow to put in the cmdline parser
///
/// Assumes that the logger is setup
///
pub fn validate_settings_data(settings: &ValidateSettings) {
    if let Err(err) = validate_settings_data_impl(settings) {
        match err {
            SettingValidationError::NotFound | SettingValidationError::ToolNotFound => {
                std::process::exit(exitcode::USAGE)
            }
            _ => std::process::exit(exitcode::DATAERR),
        }
    }
}

/// Write validate settings out in json format
pub fn write_validate_settings(
    output_dir: &Utf8Path,
    shared_settings: &super::SharedSettings,
    settings: &ValidateSettings,
) {
    use log::info;

    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create settings json file: '{filename}'"
    );

    let all_settings = serde_json::json!({
        "shared": shared_settings,
        "validate": settings,
    });
    serde_json::to_writer_pretty(&f, &all_settings).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_settings(dir: &Utf8Path) -> ValidateSettings {
        let ref_filename = dir.join("ref.fa");
        let bam_filename = dir.join("reads.bam");
        let vcf_filename = dir.join("calls.vcf");
        for filename in [&ref_filename, &bam_filename, &vcf_filename] {
            std::fs::write(filename, "x").unwrap();
        }
        ValidateSettings {
            output_dir: dir.join("out"),
            bam_filename: bam_filename.to_string(),
            ref_filename: ref_filename.to_string(),
            vcf_filename: vcf_filename.to_string(),
            output_vcf_filename_option: None,
            output_vcf_filename: Utf8PathBuf::default(),
            keep_intermediates: false,
            keep_failed_intermediates: false,
            stage_timeout_secs: None,
            vg: "vg".to_string(),
            samtools: "samtools".to_string(),
            minigraph: "minigraph".to_string(),
            min_sv_allele_size: 30,
            graph_flank_size: GRAPH_FLANK_SIZE,
            read_flank_size: READ_FLANK_SIZE,
            stage_retries: 0,
            chunk_size: 1000,
            disable_path_canonicalization: false,
        }
    }

    #[test]
    fn test_default_output_vcf_filename() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let settings = validate_and_fix_validate_settings(get_test_settings(dir)).unwrap();
        assert_eq!(
            settings.output_vcf_filename,
            dir.join("out").join(DEFAULT_OUTPUT_VCF_FILENAME)
        );
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let mut settings = get_test_settings(dir);
        settings.vcf_filename = dir.join("not_there.vcf").to_string();
        assert!(validate_and_fix_validate_settings(settings).is_err());
    }

    #[test]
    fn test_flank_order() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let mut settings = get_test_settings(dir);
        settings.read_flank_size = settings.graph_flank_size + 1;
        assert!(validate_and_fix_validate_settings(settings).is_err());
    }

    #[test]
    fn test_existing_output_vcf() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let mut settings = get_test_settings(dir);
        let output_filename = dir.join("out.vcf");
        std::fs::write(&output_filename, "x").unwrap();
        settings.output_vcf_filename_option = Some(output_filename);
        assert!(validate_and_fix_validate_settings(settings).is_err());
    }

    #[test]
    fn test_conflicting_retention() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let mut settings = get_test_settings(dir);
        settings.keep_intermediates = true;
        settings.keep_failed_intermediates = true;
        assert!(validate_and_fix_validate_settings(settings).is_err());
    }

    #[test]
    fn test_missing_tool() {
        assert_eq!(
            check_tool("svvalidate-no-such-program", "--version"),
            Err(SettingValidationError::ToolNotFound)
        );
    }
}
