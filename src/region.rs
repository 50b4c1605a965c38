use std::fmt;

use crate::sv_candidate::SVCandidate;

/// Default flank size added to each side of the SV for local graph construction
pub const GRAPH_FLANK_SIZE: i64 = 50_000;

/// Default flank size added to each side of the SV for read extraction
pub const READ_FLANK_SIZE: i64 = 10_000;

/// A window on one chromosome, in 1-indexed fully closed coordinates as used for samtools region
/// strings
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionWindow {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

impl RegionWindow {
    /// Convert to a string in 'samtools' region format (e.g. chr20:100-200)
    ///
    pub fn to_region_str(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RegionWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Windows used to validate one SV
pub struct SVRegions {
    /// Window covered by the local graph
    pub graph: RegionWindow,

    /// Window from which reads are extracted for realignment to the local graph
    pub reads: RegionWindow,
}

/// Flank the SV span by `flank_size` on each side
///
/// The window is intentionally not clipped to the chromosome bounds, so that an SV placed
/// too close to a chromosome end surfaces as an error from the downstream tool.
///
fn get_flanked_window(sv: &SVCandidate, flank_size: i64) -> RegionWindow {
    RegionWindow {
        chrom: sv.chrom().to_string(),
        start: sv.start() + 1 - flank_size,
        end: sv.end() + flank_size,
    }
}

/// Plan the graph and read windows for an SV
///
pub fn plan_sv_regions(sv: &SVCandidate, graph_flank_size: i64, read_flank_size: i64) -> SVRegions {
    assert!(graph_flank_size >= read_flank_size);
    SVRegions {
        graph: get_flanked_window(sv, graph_flank_size),
        reads: get_flanked_window(sv, read_flank_size),
    }
}
