//! Breakpoint segments of the air quality index standard.
//!
//! Every pollutant maps concentration bands onto the same index bands
//! (0-50, 51-100, 101-150, 151-200, 201-300, 301-500). The table is kept as one
//! flat list of segments and checked once by [`BreakpointTable::validate`].

use crate::data_models::Pollutant;
use crate::data_models::Pollutant::{Co, No2, Pm10, Pm25, So2, O3};
use crate::errors::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointSegment {
    pub pollutant: Pollutant,
    pub c_low: f64,
    pub c_high: f64,
    pub i_low: f64,
    pub i_high: f64,
}

const fn seg(pollutant: Pollutant, c_low: f64, c_high: f64, i_low: f64, i_high: f64) -> BreakpointSegment {
    BreakpointSegment { pollutant, c_low, c_high, i_low, i_high }
}

/// Segments grouped by pollutant, each group ordered by `c_low`.
pub const BREAKPOINTS: &[BreakpointSegment] = &[
    seg(Pm25, 0.0, 12.0, 0.0, 50.0),
    seg(Pm25, 12.1, 35.4, 51.0, 100.0),
    seg(Pm25, 35.5, 55.4, 101.0, 150.0),
    seg(Pm25, 55.5, 150.4, 151.0, 200.0),
    seg(Pm25, 150.5, 250.4, 201.0, 300.0),
    seg(Pm25, 250.5, 500.0, 301.0, 500.0),
    seg(Pm10, 0.0, 54.0, 0.0, 50.0),
    seg(Pm10, 55.0, 154.0, 51.0, 100.0),
    seg(Pm10, 155.0, 254.0, 101.0, 150.0),
    seg(Pm10, 255.0, 354.0, 151.0, 200.0),
    seg(Pm10, 355.0, 424.0, 201.0, 300.0),
    seg(Pm10, 425.0, 604.0, 301.0, 500.0),
    seg(No2, 0.0, 53.0, 0.0, 50.0),
    seg(No2, 54.0, 100.0, 51.0, 100.0),
    seg(No2, 101.0, 360.0, 101.0, 150.0),
    seg(No2, 361.0, 649.0, 151.0, 200.0),
    seg(No2, 650.0, 1249.0, 201.0, 300.0),
    seg(No2, 1250.0, 2049.0, 301.0, 500.0),
    seg(So2, 0.0, 35.0, 0.0, 50.0),
    seg(So2, 36.0, 75.0, 51.0, 100.0),
    seg(So2, 76.0, 185.0, 101.0, 150.0),
    seg(So2, 186.0, 304.0, 151.0, 200.0),
    seg(So2, 305.0, 604.0, 201.0, 300.0),
    seg(So2, 605.0, 1004.0, 301.0, 500.0),
    // O3 stops at the 201-300 band.
    seg(O3, 0.0, 54.0, 0.0, 50.0),
    seg(O3, 55.0, 70.0, 51.0, 100.0),
    seg(O3, 71.0, 85.0, 101.0, 150.0),
    seg(O3, 86.0, 105.0, 151.0, 200.0),
    seg(O3, 106.0, 200.0, 201.0, 300.0),
    seg(Co, 0.0, 4.4, 0.0, 50.0),
    seg(Co, 4.5, 9.4, 51.0, 100.0),
    seg(Co, 9.5, 12.4, 101.0, 150.0),
    seg(Co, 12.5, 15.4, 151.0, 200.0),
    seg(Co, 15.5, 30.4, 201.0, 300.0),
    seg(Co, 30.5, 50.4, 301.0, 500.0),
];

#[derive(Debug, Clone)]
pub struct BreakpointTable {
    segments: &'static [BreakpointSegment],
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl BreakpointTable {
    pub fn standard() -> Self {
        Self { segments: BREAKPOINTS }
    }

    pub fn with_segments(segments: &'static [BreakpointSegment]) -> Self {
        Self { segments }
    }

    pub fn segments_for(&self, pollutant: Pollutant) -> impl Iterator<Item = &BreakpointSegment> + '_ {
        self.segments.iter().filter(move |s| s.pollutant == pollutant)
    }

    /// First segment (in list order) whose closed range contains the
    /// concentration. `None` for negative or NaN input, values above the top
    /// band, and values that fall between two bands.
    pub fn lookup(&self, pollutant: Pollutant, concentration: f64) -> Option<&BreakpointSegment> {
        if concentration.is_nan() || concentration < 0.0 {
            return None;
        }
        self.segments_for(pollutant)
            .find(|s| s.c_low <= concentration && concentration <= s.c_high)
    }

    /// Checks ordering and band sanity for every pollutant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for pollutant in Pollutant::ALL {
            let invalid = |message: String| PipelineError::InvalidBreakpoints { pollutant, message };
            let segments: Vec<&BreakpointSegment> = self.segments_for(pollutant).collect();

            let first = segments
                .first()
                .ok_or_else(|| invalid("no segments defined".to_string()))?;
            if first.c_low != 0.0 || first.i_low != 0.0 {
                return Err(invalid(format!(
                    "first segment starts at C={} I={}, expected 0",
                    first.c_low, first.i_low
                )));
            }

            for s in &segments {
                if !(s.c_low < s.c_high) {
                    return Err(invalid(format!("empty concentration band {}..{}", s.c_low, s.c_high)));
                }
                if !(s.i_low < s.i_high) {
                    return Err(invalid(format!("empty index band {}..{}", s.i_low, s.i_high)));
                }
            }

            for pair in segments.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                if next.c_low < prev.c_high || next.c_low <= prev.c_low {
                    return Err(invalid(format!(
                        "segment {}..{} overlaps or precedes {}..{}",
                        next.c_low, next.c_high, prev.c_low, prev.c_high
                    )));
                }
                if next.i_low <= prev.i_high {
                    return Err(invalid(format!(
                        "index band {}..{} does not follow {}..{}",
                        next.i_low, next.i_high, prev.i_low, prev.i_high
                    )));
                }
            }
        }
        Ok(())
    }

    /// Highest concentration any segment of this pollutant covers.
    pub fn upper_bound(&self, pollutant: Pollutant) -> Option<f64> {
        self.segments_for(pollutant).map(|s| s.c_high).reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_valid() {
        BreakpointTable::standard().validate().unwrap();
    }

    #[test]
    fn test_every_pollutant_has_segments() {
        let table = BreakpointTable::standard();
        for pollutant in Pollutant::ALL {
            let expected = if pollutant == Pollutant::O3 { 5 } else { 6 };
            assert_eq!(table.segments_for(pollutant).count(), expected, "{pollutant}");
        }
    }

    #[test]
    fn test_lookup_inside_and_on_edges() {
        let table = BreakpointTable::standard();
        let s = table.lookup(Pollutant::Pm25, 12.0).unwrap();
        assert_eq!((s.c_low, s.c_high), (0.0, 12.0));
        let s = table.lookup(Pollutant::Pm25, 12.1).unwrap();
        assert_eq!((s.c_low, s.c_high), (12.1, 35.4));
        let s = table.lookup(Pollutant::Co, 0.0).unwrap();
        assert_eq!(s.i_low, 0.0);
    }

    #[test]
    fn test_lookup_not_found() {
        let table = BreakpointTable::standard();
        assert!(table.lookup(Pollutant::Pm25, -0.1).is_none());
        assert!(table.lookup(Pollutant::Pm25, 12.05).is_none());
        assert!(table.lookup(Pollutant::Pm25, 500.1).is_none());
        assert!(table.lookup(Pollutant::O3, 200.5).is_none());
        assert!(table.lookup(Pollutant::Pm10, f64::NAN).is_none());
    }

    #[test]
    fn test_no_concentration_matches_two_segments() {
        let table = BreakpointTable::standard();
        for pollutant in Pollutant::ALL {
            for s in table.segments_for(pollutant) {
                for c in [s.c_low, s.c_high] {
                    let matches = table
                        .segments_for(pollutant)
                        .filter(|t| t.c_low <= c && c <= t.c_high)
                        .count();
                    assert_eq!(matches, 1, "{pollutant} at {c}");
                }
            }
        }
    }

    #[test]
    fn test_validate_rejects_overlap() {
        static BAD: &[BreakpointSegment] = &[
            seg(Pm25, 0.0, 12.0, 0.0, 50.0),
            seg(Pm25, 10.0, 35.4, 51.0, 100.0),
        ];
        let err = BreakpointTable::with_segments(BAD).validate().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidBreakpoints { pollutant: Pollutant::Pm25, .. }
        ));
    }

    #[test]
    fn test_validate_rejects_missing_pollutant() {
        static ONLY_PM: &[BreakpointSegment] = &[seg(Pm25, 0.0, 12.0, 0.0, 50.0)];
        let err = BreakpointTable::with_segments(ONLY_PM).validate().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidBreakpoints { pollutant: Pollutant::Pm10, .. }
        ));
    }

    #[test]
    fn test_upper_bounds() {
        let table = BreakpointTable::standard();
        assert_eq!(table.upper_bound(Pollutant::O3), Some(200.0));
        assert_eq!(table.upper_bound(Pollutant::Co), Some(50.4));
    }
}
