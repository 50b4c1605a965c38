//! Annotate every selected SV in the input VCF with its validation score
//!

use std::collections::HashMap;
use std::sync::mpsc::channel;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use rust_htslib::bcf::{self, Read};
use simple_error::{SimpleResult, bail, try_with};
use thousands::Separable;

use crate::artifacts::RetentionPolicy;
use crate::cli::{SharedSettings, ValidateSettings};
use crate::os_utils::{create_dir_all, remove_file_if_present};
use crate::run_stats::{ValidateRunStats, write_validate_run_stats};
use crate::sv_candidate::{SVCandidate, is_sv_allele_size};
use crate::tool_runner::{ExternalTools, ProcessRunner};
use crate::validate_sv::{
    SVValidationContext, SVValidationResult, SVValidationSettings, ValidationScore, validate_sv,
};
use crate::vcf_utils::{VALIDATION_SCORE_INFO_KEY, get_validation_vcf_header};

pub struct AnnotationSettings {
    pub min_sv_allele_size: usize,

    /// Number of input records read before their SVs are dispatched to the worker pool
    pub chunk_size: usize,

    pub worker_count: usize,
}

/// How an input record is handled by SV validation
enum RecordSelection {
    /// Small variant written without a validation score
    PassThrough,

    /// SV run through the local graph validation stages
    Validate(SVCandidate),

    /// SV which can't be run through validation, written with the uncallable score
    Uncallable,
}

/// Decide whether a VCF record is an SV selected for validation
///
/// Only the first ALT allele is considered. A record without an ALT allele is selected on its REF
/// length alone, and is uncallable since there is no SV allele to genotype. A selected record
/// which can't be converted into an SV candidate is also uncallable.
///
fn get_record_selection(rec: &bcf::Record, min_sv_allele_size: usize) -> RecordSelection {
    let alleles = rec.alleles();
    let ref_allele = alleles[0];
    let alt_allele = alleles.get(1).copied().unwrap_or_default();
    if !is_sv_allele_size(ref_allele.len(), alt_allele.len(), min_sv_allele_size) {
        return RecordSelection::PassThrough;
    }

    let pos = rec.pos() + 1;
    if alleles.len() < 2 {
        debug!("SV at position {pos} has no ALT allele, reporting as uncallable");
        return RecordSelection::Uncallable;
    }

    match get_sv_candidate(rec, ref_allele, alt_allele) {
        Ok(sv) => RecordSelection::Validate(sv),
        Err(e) => {
            warn!("Unable to validate SV at position {pos}, reporting as uncallable: {e}");
            RecordSelection::Uncallable
        }
    }
}

fn get_sv_candidate(
    rec: &bcf::Record,
    ref_allele: &[u8],
    alt_allele: &[u8],
) -> SimpleResult<SVCandidate> {
    let rid = match rec.rid() {
        Some(x) => x,
        None => bail!("Variant record has no chromosome"),
    };
    let chrom = try_with!(
        rec.header().rid2name(rid),
        "Unable to find chromosome name for variant record"
    );
    let chrom = try_with!(std::str::from_utf8(chrom), "Invalid chromosome name");
    let ref_allele = try_with!(std::str::from_utf8(ref_allele), "Invalid REF allele");
    let alt_allele = try_with!(std::str::from_utf8(alt_allele), "Invalid ALT allele");

    Ok(SVCandidate::new(chrom, rec.pos(), ref_allele, alt_allele))
}

fn get_uncallable_result() -> SVValidationResult {
    SVValidationResult {
        score: ValidationScore::Uncallable,
        failed_stage: None,
        cleanup_failure_count: 0,
        duration: Duration::ZERO,
    }
}

/// Validate all SVs from one chunk of input records on the worker pool
///
/// Results are returned in the order of the input records, with None for records written without
/// a validation score. Identical SVs share an artifact namespace, so each distinct SV is validated
/// once and its result is copied to any repeats.
///
fn validate_selected_records(
    worker_pool: &rayon::ThreadPool,
    context: &SVValidationContext,
    selections: &[RecordSelection],
) -> Vec<Option<SVValidationResult>> {
    let mut first_index = HashMap::new();
    let mut repeat_index = Vec::new();
    for (index, selection) in selections.iter().enumerate() {
        if let RecordSelection::Validate(sv) = selection {
            match first_index.get(sv.id()) {
                Some(&(x, _)) => repeat_index.push((index, x)),
                None => {
                    first_index.insert(sv.id(), (index, sv));
                }
            }
        }
    }

    let (tx, rx) = channel();
    worker_pool.scope(|scope| {
        for &(index, sv) in first_index.values() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result = validate_sv(context, sv);
                tx.send((index, result)).unwrap();
            });
        }
    });
    drop(tx);

    let mut results = selections
        .iter()
        .map(|x| match x {
            RecordSelection::Uncallable => Some(get_uncallable_result()),
            _ => None,
        })
        .collect::<Vec<_>>();
    for (index, result) in rx {
        results[index] = Some(result);
    }

    for (index, source_index) in repeat_index {
        results[index] = results[source_index]
            .as_ref()
            .map(|x: &SVValidationResult| SVValidationResult {
                cleanup_failure_count: 0,
                duration: Duration::ZERO,
                ..x.clone()
            });
    }
    results
}

fn annotate_vcf_impl(
    input_vcf_filename: &str,
    output_vcf_filename: &Utf8Path,
    format_filename: &Utf8Path,
    annotation_settings: &AnnotationSettings,
    context: &SVValidationContext,
) -> SimpleResult<ValidateRunStats> {
    let mut reader = try_with!(
        bcf::Reader::from_path(input_vcf_filename),
        "Unable to open input variant file: '{input_vcf_filename}'"
    );
    let header = get_validation_vcf_header(reader.header());

    let uncompressed = !format_filename.as_str().ends_with(".gz");
    let mut writer = try_with!(
        bcf::Writer::from_path(output_vcf_filename, &header, uncompressed, bcf::Format::Vcf),
        "Unable to create output variant file: '{output_vcf_filename}'"
    );

    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(annotation_settings.worker_count)
        .build()
        .unwrap();

    let mut run_stats = ValidateRunStats::default();
    let mut records = reader.records();
    loop {
        let mut chunk = Vec::new();
        for rec in records.by_ref().take(annotation_settings.chunk_size) {
            chunk.push(try_with!(
                rec,
                "Unable to read record from input variant file: '{input_vcf_filename}'"
            ));
        }
        if chunk.is_empty() {
            break;
        }

        let selections = chunk
            .iter()
            .map(|rec| get_record_selection(rec, annotation_settings.min_sv_allele_size))
            .collect::<Vec<_>>();

        let results = validate_selected_records(&worker_pool, context, &selections);

        for (mut rec, result) in chunk.into_iter().zip(results) {
            writer.translate(&mut rec);
            if let Some(result) = result {
                try_with!(
                    rec.push_info_float(
                        VALIDATION_SCORE_INFO_KEY.as_bytes(),
                        &[result.score.to_vcf_value()],
                    ),
                    "Unable to add validation score to variant record"
                );
                run_stats.add_sv_result(&result);
            }
            try_with!(
                writer.write(&rec),
                "Unable to write record to output variant file: '{output_vcf_filename}'"
            );
            run_stats.input_record_count += 1;
        }

        info!(
            "Processed {} input variant records, validated {} SVs",
            run_stats.input_record_count.separate_with_commas(),
            run_stats.selected_sv_count.separate_with_commas()
        );
    }

    Ok(run_stats)
}

/// Write the annotated copy of the input VCF
///
/// Output is first written to a temporary file next to `output_vcf_filename`, which is renamed
/// only after the last record is written.
///
pub fn annotate_vcf(
    input_vcf_filename: &str,
    output_vcf_filename: &Utf8Path,
    annotation_settings: &AnnotationSettings,
    context: &SVValidationContext,
) -> SimpleResult<ValidateRunStats> {
    let partial_filename = Utf8PathBuf::from(format!("{output_vcf_filename}.partial"));

    let result = annotate_vcf_impl(
        input_vcf_filename,
        &partial_filename,
        output_vcf_filename,
        annotation_settings,
        context,
    );

    match result {
        Ok(run_stats) => {
            try_with!(
                std::fs::rename(&partial_filename, output_vcf_filename),
                "Unable to move '{partial_filename}' to output variant file '{output_vcf_filename}'"
            );
            Ok(run_stats)
        }
        Err(e) => {
            if let Err(e) = remove_file_if_present(&partial_filename) {
                warn!("Unable to remove partial output variant file '{partial_filename}': {e}");
            }
            Err(e)
        }
    }
}

fn log_run_stats(run_stats: &ValidateRunStats) {
    info!(
        "Validated {} SVs from {} input variant records: {} scored, {} uncallable, {} failed",
        run_stats.selected_sv_count.separate_with_commas(),
        run_stats.input_record_count.separate_with_commas(),
        run_stats.scored_sv_count.separate_with_commas(),
        run_stats.uncallable_sv_count.separate_with_commas(),
        run_stats.stage_failure_count().separate_with_commas(),
    );
    for (stage, count) in run_stats.stage_failures.iter() {
        info!("  SVs failed at stage '{stage}': {count}");
    }
    if run_stats.cleanup_failure_count > 0 {
        warn!(
            "Unable to delete {} intermediate files",
            run_stats.cleanup_failure_count
        );
    }
}

/// Validate all SVs from the input VCF and write the annotated output VCF and run statistics
///
pub fn run_sv_validation(
    shared_settings: &SharedSettings,
    settings: &ValidateSettings,
) -> SimpleResult<()> {
    let runner = ProcessRunner::new(
        settings.stage_timeout_secs.map(Duration::from_secs),
        settings.stage_retries,
    );

    let artifact_dir = settings.get_artifact_dir();
    create_dir_all(&artifact_dir, "SV artifact");

    let context = SVValidationContext {
        settings: SVValidationSettings {
            graph_flank_size: settings.graph_flank_size,
            read_flank_size: settings.read_flank_size,
            retention_policy: RetentionPolicy::new(
                settings.keep_intermediates,
                settings.keep_failed_intermediates,
            ),
        },
        tools: ExternalTools {
            vg: settings.vg.clone(),
            samtools: settings.samtools.clone(),
            minigraph: settings.minigraph.clone(),
            thread_count: shared_settings.thread_count,
        },
        runner: &runner,
        ref_filename: settings.ref_filename.clone(),
        bam_filename: settings.bam_filename.clone(),
        artifact_dir,
    };

    let annotation_settings = AnnotationSettings {
        min_sv_allele_size: settings.min_sv_allele_size,
        chunk_size: settings.chunk_size,
        worker_count: shared_settings.worker_count,
    };

    info!("Starting SV validation");
    let run_stats = annotate_vcf(
        &settings.vcf_filename,
        &settings.output_vcf_filename,
        &annotation_settings,
        &context,
    )?;
    info!(
        "Finished SV validation, wrote annotated variants to '{}'",
        settings.output_vcf_filename
    );

    log_run_stats(&run_stats);
    write_validate_run_stats(&settings.output_dir, &run_stats);

    Ok(())
}
