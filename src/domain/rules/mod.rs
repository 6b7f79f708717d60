// Domain rules - Condition gating and marker placement

use crate::domain::model::*;

/// Parsed condition tag such as `$RAW$` or `!$RAW$`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub negated: bool,
    pub flag: String,
}

impl Condition {
    pub fn parse(tag: &str) -> Self {
        let trimmed = tag.trim();
        let (negated, rest) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        Self {
            negated,
            flag: rest.trim().trim_matches('$').to_ascii_uppercase(),
        }
    }

    /// Whether the condition is true for `mode`. Unknown flags are false.
    pub fn holds(&self, mode: BuildMode) -> bool {
        let flag = match self.flag.as_str() {
            "RAW" => mode == BuildMode::Raw,
            "ENCODE" | "ENCODED" => mode == BuildMode::Encoded,
            _ => false,
        };
        flag != self.negated
    }
}

/// Single gate for every conditioned node.
///
/// Untagged nodes are always included. A tagged node is included when its
/// condition holds for the active mode, or when the caller allows nodes
/// meant for the opposite mode.
pub fn should_include(tag: Option<&str>, mode: BuildMode, allow_opposite: bool) -> bool {
    match tag {
        None => true,
        Some(tag) => Condition::parse(tag).holds(mode) || allow_opposite,
    }
}

/// Result of placing pending markers on the output timeline
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MarkerRemap {
    pub placed: Vec<Marker>,
    pub dropped: Vec<Marker>,
}

/// Position of a source time relative to the first range containing it
fn map_into_ranges(time: TimeSpec, ranges: &[TimeRange]) -> Option<TimeSpec> {
    ranges
        .iter()
        .find(|range| range.contains(time))
        .map(|range| time - range.start)
}

/// Place every input's pending markers on the output timeline.
///
/// Inputs are visited in order with a running offset. A marker's start and
/// end are matched independently against the input's ranges, so they may
/// land in different ranges. Markers with either end outside every range are
/// dropped.
pub fn remap_markers<'a, I>(inputs: I) -> MarkerRemap
where
    I: IntoIterator<Item = (&'a [TimeRange], &'a [Marker])>,
{
    let mut remap = MarkerRemap::default();
    let mut offset = TimeSpec::ZERO;

    for (ranges, markers) in inputs {
        for marker in markers {
            let start = map_into_ranges(marker.start, ranges);
            let end = map_into_ranges(marker.end, ranges);
            match (start, end) {
                (Some(start), Some(end)) => remap.placed.push(Marker::new(
                    marker.name.clone(),
                    offset + start,
                    offset + end,
                )),
                _ => remap.dropped.push(marker.clone()),
            }
        }
        offset = offset + ranges.iter().map(TimeRange::duration).sum::<TimeSpec>();
    }

    remap
}

#[cfg(test)]
mod tests;
