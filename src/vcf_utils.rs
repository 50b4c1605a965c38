use std::fs::File;
use std::io::{BufWriter, Write};

use camino::Utf8Path;
use rust_htslib::bcf::header::{Header, HeaderView};
use rust_htslib::{bgzf, htslib, utils};
use simple_error::{SimpleResult, bail, try_with};

use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};

pub const VALIDATION_SCORE_INFO_KEY: &str = "VAL";

/// Builds the output header from the input VCF header, adding the validation score field
///
pub fn get_validation_vcf_header(input_header: &HeaderView) -> Header {
    let mut header = Header::from_template(input_header);

    let val_info = format!(
        "##INFO=<ID={VALIDATION_SCORE_INFO_KEY},Number=1,Type=Float,Description=\"Validation score from vg genotyping\">"
    );
    header.push_record(val_info.as_bytes());
    header.push_record(format!("##source=\"{PROGRAM_NAME} {PROGRAM_VERSION}\"").as_bytes());
    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
    header.push_record(format!("##{PROGRAM_NAME}_cmdline=\"{cmdline}\"").as_bytes());

    header
}

/// Write a VCF with a single variant record and only the mandatory header lines
///
/// # Arguments
/// * `pos` - 1-indexed variant position
///
pub fn write_single_variant_vcf(
    filename: &Utf8Path,
    chrom: &str,
    pos: i64,
    ref_allele: &str,
    alt_allele: &str,
) -> SimpleResult<()> {
    let f = try_with!(
        File::create(filename),
        "Unable to create single variant VCF file: '{filename}'"
    );
    let mut f = BufWriter::new(f);
    let content = format!(
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n{chrom}\t{pos}\t.\t{ref_allele}\t{alt_allele}\t.\t.\t.\n"
    );
    try_with!(
        f.write_all(content.as_bytes()),
        "Unable to write single variant VCF file: '{filename}'"
    );
    try_with!(f.flush(), "Unable to write single variant VCF file: '{filename}'");
    Ok(())
}

/// Compress a file with BGZF
///
pub fn bgzip_file(input_filename: &Utf8Path, output_filename: &Utf8Path) -> SimpleResult<()> {
    let mut input = try_with!(
        File::open(input_filename),
        "Unable to open file for compression: '{input_filename}'"
    );
    let mut output = try_with!(
        bgzf::Writer::from_path(output_filename),
        "Unable to create compressed file: '{output_filename}'"
    );
    try_with!(
        std::io::copy(&mut input, &mut output),
        "Unable to compress '{input_filename}' to '{output_filename}'"
    );
    try_with!(
        output.flush(),
        "Unable to write compressed file: '{output_filename}'"
    );
    Ok(())
}

fn get_index_error_label(error: i32) -> &'static str {
    match error {
        -1 => "indexing failed",
        -2 => "unable to open file",
        -3 => "format not indexable",
        -4 => "failed to create and/or save the index",
        _ => "unknown error",
    }
}

/// Build a tabix index for a BGZF-compressed VCF, written to `{vcf_gz_filename}.tbi`
///
pub fn build_tabix_index(vcf_gz_filename: &Utf8Path) -> SimpleResult<()> {
    let vcf_gz_path = match utils::path_to_cstring(&vcf_gz_filename) {
        Some(x) => x,
        None => bail!("Can't convert index input path: '{vcf_gz_filename}'"),
    };

    // A min_shift of zero selects a tbi index over csi
    let ret = unsafe { htslib::bcf_index_build3(vcf_gz_path.as_ptr(), std::ptr::null(), 0, 1) };
    if ret != 0 {
        bail!(
            "Failed to build tabix index for '{vcf_gz_filename}': {}",
            get_index_error_label(ret)
        );
    }
    Ok(())
}
