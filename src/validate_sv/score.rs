use camino::Utf8Path;
use log::debug;
use rust_htslib::bcf::{self, Read};

use crate::tool_runner::{Stage, StageError, StageResult};

/// Value written to the VCF for an SV without a usable genotype call
pub const UNCALLABLE_SCORE: f32 = -1.0;

/// Support for the SV alt allele in the local graph genotype call
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValidationScore {
    /// Fraction of allele depth supporting the alt allele, in [0,1]
    Scored(f64),

    /// No genotype call or allele depth evidence was available
    Uncallable,
}

impl ValidationScore {
    pub fn to_vcf_value(&self) -> f32 {
        match self {
            ValidationScore::Scored(x) => *x as f32,
            ValidationScore::Uncallable => UNCALLABLE_SCORE,
        }
    }
}

/// Score from ref and alt allele depths
///
/// Negative depths, which include the htslib missing value sentinels, and zero total depth are
/// both uncallable.
///
pub fn get_allele_depth_score(ref_depth: i32, alt_depth: i32) -> ValidationScore {
    if ref_depth < 0 || alt_depth < 0 {
        return ValidationScore::Uncallable;
    }
    let total_depth = ref_depth as i64 + alt_depth as i64;
    if total_depth == 0 {
        return ValidationScore::Uncallable;
    }
    ValidationScore::Scored(alt_depth as f64 / total_depth as f64)
}

/// Score from the AD field of the first sample in the record
///
fn get_record_score(rec: &bcf::Record) -> ValidationScore {
    let ad_values = match rec.format(b"AD").integer() {
        Ok(x) => x,
        Err(_) => {
            return ValidationScore::Uncallable;
        }
    };
    match ad_values.first() {
        Some(sample_ad) if sample_ad.len() >= 2 => {
            get_allele_depth_score(sample_ad[0], sample_ad[1])
        }
        _ => ValidationScore::Uncallable,
    }
}

/// Read the genotype call file and reduce it to one validation score
///
/// Only the first record is used. The call is made from a single-SV VCF so more than one record
/// isn't expected, any additional records are ignored.
///
pub fn get_validation_score(called_vcf_filename: &Utf8Path) -> StageResult<ValidationScore> {
    let stage = Stage::ExtractScore;
    let mut reader = bcf::Reader::from_path(called_vcf_filename).map_err(|e| {
        StageError::new(
            stage,
            format!("Unable to open genotype call file '{called_vcf_filename}': {e}"),
        )
    })?;

    let mut rec = reader.empty_record();
    let score = match reader.read(&mut rec) {
        None => {
            return Ok(ValidationScore::Uncallable);
        }
        Some(Err(e)) => {
            return Err(StageError::new(
                stage,
                format!("Unable to parse genotype call file '{called_vcf_filename}': {e}"),
            ));
        }
        Some(Ok(())) => get_record_score(&rec),
    };

    let mut ignored_record_count = 0;
    while let Some(Ok(())) = reader.read(&mut rec) {
        ignored_record_count += 1;
    }
    if ignored_record_count > 0 {
        debug!(
            "Ignoring {ignored_record_count} additional records in genotype call file '{called_vcf_filename}'"
        );
    }

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_sv::test_utils::write_called_vcf;

    #[test]
    fn test_get_allele_depth_score() {
        assert_eq!(get_allele_depth_score(0, 20), ValidationScore::Scored(1.0));
        assert_eq!(get_allele_depth_score(20, 0), ValidationScore::Scored(0.0));
        assert_eq!(get_allele_depth_score(10, 30), ValidationScore::Scored(0.75));
        assert_eq!(get_allele_depth_score(0, 0), ValidationScore::Uncallable);
        assert_eq!(get_allele_depth_score(i32::MIN, 3), ValidationScore::Uncallable);
        assert_eq!(get_allele_depth_score(i32::MAX, i32::MAX), ValidationScore::Scored(0.5));
    }

    #[test]
    fn test_to_vcf_value() {
        assert_eq!(ValidationScore::Uncallable.to_vcf_value(), -1.0);
        approx::assert_ulps_eq!(ValidationScore::Scored(0.25).to_vcf_value(), 0.25, max_ulps = 4);
    }

    #[test]
    fn test_get_validation_score() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let filename = dir.join("x.called.vcf");

        write_called_vcf(&filename, &["5,15"]);
        assert_eq!(
            get_validation_score(&filename).unwrap(),
            ValidationScore::Scored(0.75)
        );
    }

    #[test]
    fn test_get_validation_score_first_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let filename = dir.join("x.called.vcf");

        write_called_vcf(&filename, &["0,8", "8,0"]);
        assert_eq!(
            get_validation_score(&filename).unwrap(),
            ValidationScore::Scored(1.0)
        );
    }

    #[test]
    fn test_get_validation_score_uncallable() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let filename = dir.join("x.called.vcf");

        // No records
        write_called_vcf(&filename, &[]);
        assert_eq!(
            get_validation_score(&filename).unwrap(),
            ValidationScore::Uncallable
        );

        // Zero depth
        write_called_vcf(&filename, &["0,0"]);
        assert_eq!(
            get_validation_score(&filename).unwrap(),
            ValidationScore::Uncallable
        );

        // Missing depth
        write_called_vcf(&filename, &["."]);
        assert_eq!(
            get_validation_score(&filename).unwrap(),
            ValidationScore::Uncallable
        );
    }

    #[test]
    fn test_get_validation_score_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let filename = dir.join("x.called.vcf");

        let err = get_validation_score(&filename).unwrap_err();
        assert_eq!(err.stage, Stage::ExtractScore);
    }
}
