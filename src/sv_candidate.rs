//! SV candidate representation and the unique id used to namespace all of its artifacts
//!

use sha2::{Digest, Sha256};

/// A single variant selected for local graph validation
///
/// All coordinates are 0-indexed, with `end` exclusive, matching the htslib record convention
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SVCandidate {
    chrom: String,
    start: i64,
    end: i64,
    ref_allele: String,
    alt_allele: String,
    id: String,
}

impl SVCandidate {
    pub fn new(chrom: &str, start: i64, ref_allele: &str, alt_allele: &str) -> Self {
        let id = get_sv_id_label(chrom, start, ref_allele, alt_allele);
        Self {
            chrom: chrom.to_string(),
            start,
            end: start + ref_allele.len() as i64,
            ref_allele: ref_allele.to_string(),
            alt_allele: alt_allele.to_string(),
            id,
        }
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    /// Unique id for this SV, used to name every artifact produced while validating it
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Hex-encoded digest of the SV allele content
///
fn get_allele_digest(ref_allele: &str, alt_allele: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ref_allele.as_bytes());
    hasher.update(b"_");
    hasher.update(alt_allele.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the SV id label from the chromosome, 0-indexed start and allele content
///
/// The allele digest keeps ids distinct for SVs which share the same position
///
pub fn get_sv_id_label(chrom: &str, start: i64, ref_allele: &str, alt_allele: &str) -> String {
    format!(
        "{chrom}_{start}_{}",
        get_allele_digest(ref_allele, alt_allele)
    )
}

/// Test whether a variant is large enough to be routed through local graph validation
///
/// * `min_sv_allele_size` - Either allele must be strictly longer than this to select the variant
///
pub fn is_sv_allele_size(ref_len: usize, alt_len: usize, min_sv_allele_size: usize) -> bool {
    ref_len > min_sv_allele_size || alt_len > min_sv_allele_size
}
