//! Per-SV artifact naming and cleanup
//!
//! Every file written while validating an SV is named from the SV id, so concurrent SV
//! validations in the same directory never share a path.
//!

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};

use crate::os_utils::remove_file_if_present;

/// All intermediate files used to validate one SV
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::EnumIter)]
pub enum Artifact {
    /// Minimal VCF containing only the SV
    SingleSvVcf,
    SingleSvVcfGz,
    SingleSvVcfGzIndex,
    /// Local variation graph
    Graph,
    /// GFA export of the local graph
    GraphGfa,
    /// Alignment subset over the read window
    ReadSam,
    ReadFasta,
    /// Read to graph alignments
    ReadGaf,
    CoveragePack,
    CalledVcf,
    /// Captured stderr from all external tools run for this SV
    StageLog,
}

impl Artifact {
    fn suffix(&self) -> &'static str {
        use Artifact::*;
        match self {
            SingleSvVcf => "vcf",
            SingleSvVcfGz => "vcf.gz",
            SingleSvVcfGzIndex => "vcf.gz.tbi",
            Graph => "vg",
            GraphGfa => "gfa",
            ReadSam => "sam",
            ReadFasta => "fasta",
            ReadGaf => "gaf",
            CoveragePack => "pack",
            CalledVcf => "called.vcf",
            StageLog => "log",
        }
    }
}

/// The artifact namespace of a single SV
///
#[derive(Clone, Debug)]
pub struct ArtifactNamespace {
    dir: Utf8PathBuf,
    sv_id: String,
}

impl ArtifactNamespace {
    pub fn new(dir: &Utf8Path, sv_id: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            sv_id: sv_id.to_string(),
        }
    }

    pub fn sv_id(&self) -> &str {
        &self.sv_id
    }

    pub fn path(&self, artifact: Artifact) -> Utf8PathBuf {
        self.dir.join(format!("{}.{}", self.sv_id, artifact.suffix()))
    }

    pub fn all_paths(&self) -> Vec<Utf8PathBuf> {
        use strum::IntoEnumIterator;
        Artifact::iter().map(|x| self.path(x)).collect()
    }
}

/// Controls which SV artifacts survive the end of SV validation
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetentionPolicy {
    /// Delete all artifacts
    None,
    /// Keep artifacts only for SVs where an external stage failed
    FailedOnly,
    /// Keep all artifacts
    All,
}

impl RetentionPolicy {
    pub fn new(keep_intermediates: bool, keep_failed_intermediates: bool) -> Self {
        if keep_intermediates {
            RetentionPolicy::All
        } else if keep_failed_intermediates {
            RetentionPolicy::FailedOnly
        } else {
            RetentionPolicy::None
        }
    }

    pub fn retain(&self, is_stage_failure: bool) -> bool {
        match self {
            RetentionPolicy::None => false,
            RetentionPolicy::FailedOnly => is_stage_failure,
            RetentionPolicy::All => true,
        }
    }
}

/// Remove all artifacts from one SV namespace
///
/// Deletion is best-effort: missing files are skipped and any other error is logged and
/// ignored.
///
/// Returns the number of files which could not be deleted
///
pub fn clean_artifacts(namespace: &ArtifactNamespace) -> usize {
    let mut cleanup_failures = 0;
    for filename in namespace.all_paths() {
        if let Err(e) = remove_file_if_present(&filename) {
            warn!(
                "Unable to remove intermediate file for SV '{}': '{filename}': {e}",
                namespace.sv_id()
            );
            cleanup_failures += 1;
        }
    }
    debug!("Removed intermediate files for SV '{}'", namespace.sv_id());
    cleanup_failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths() {
        let ns = ArtifactNamespace::new(Utf8Path::new("/tmp/x"), "chr1_10_abc");
        assert_eq!(
            ns.path(Artifact::SingleSvVcfGzIndex),
            Utf8PathBuf::from("/tmp/x/chr1_10_abc.vcf.gz.tbi")
        );
        assert_eq!(
            ns.path(Artifact::CalledVcf),
            Utf8PathBuf::from("/tmp/x/chr1_10_abc.called.vcf")
        );

        // Every path is unique and carries the sv id
        let paths = ns.all_paths();
        let unique = paths.iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), paths.len());
        assert!(paths.iter().all(|x| x.as_str().contains("chr1_10_abc")));
    }

    #[test]
    fn test_clean_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let ns = ArtifactNamespace::new(dir, "sv1");
        let other_ns = ArtifactNamespace::new(dir, "sv2");

        // Only write some of the artifacts, to check that missing files are not an error
        for artifact in [Artifact::Graph, Artifact::ReadGaf, Artifact::CalledVcf] {
            std::fs::write(ns.path(artifact), "x").unwrap();
            std::fs::write(other_ns.path(artifact), "x").unwrap();
        }

        assert_eq!(clean_artifacts(&ns), 0);
        assert!(ns.all_paths().iter().all(|x| !x.exists()));

        // Neighboring namespace is untouched
        assert!(other_ns.path(Artifact::Graph).exists());
    }

    #[test]
    fn test_retention_policy() {
        let policy = RetentionPolicy::new(false, false);
        assert!(!policy.retain(false));
        assert!(!policy.retain(true));

        let policy = RetentionPolicy::new(false, true);
        assert!(!policy.retain(false));
        assert!(policy.retain(true));

        let policy = RetentionPolicy::new(true, false);
        assert!(policy.retain(false));
        assert!(policy.retain(true));
    }
}
