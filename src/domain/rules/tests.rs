// Unit tests for domain rules

use super::*;

fn secs(value: f64) -> TimeSpec {
    TimeSpec::from_seconds(value)
}

fn range(start: f64, end: f64) -> TimeRange {
    TimeRange::new(secs(start), secs(end)).unwrap()
}

#[test]
fn test_untagged_nodes_always_included() {
    assert!(should_include(None, BuildMode::Raw, false));
    assert!(should_include(None, BuildMode::Encoded, false));
}

#[test]
fn test_raw_tags_follow_mode() {
    assert!(should_include(Some("$RAW$"), BuildMode::Raw, false));
    assert!(!should_include(Some("$RAW$"), BuildMode::Encoded, false));
    assert!(should_include(Some("!$RAW$"), BuildMode::Encoded, false));
    assert!(!should_include(Some("!$RAW$"), BuildMode::Raw, false));
}

#[test]
fn test_opposite_override() {
    assert!(should_include(Some("$RAW$"), BuildMode::Encoded, true));
    assert!(should_include(Some("!$RAW$"), BuildMode::Raw, true));
}

#[test]
fn test_unknown_flag_is_false() {
    assert!(!should_include(Some("$X360$"), BuildMode::Encoded, false));
    assert!(should_include(Some("!$X360$"), BuildMode::Encoded, false));
}

#[test]
fn test_single_range_marker() {
    let ranges = [range(10.0, 30.0)];
    let markers = [Marker::at("goal", secs(15.0))];
    let remap = remap_markers([(&ranges[..], &markers[..])]);
    assert_eq!(remap.placed, vec![Marker::at("goal", secs(5.0))]);
    assert!(remap.dropped.is_empty());
}

#[test]
fn test_offset_accumulates_across_inputs() {
    let first_ranges = [range(0.0, 20.0)];
    let second_ranges = [range(100.0, 110.0)];
    let second_markers = [Marker::at("save", secs(105.0))];
    let remap = remap_markers([
        (&first_ranges[..], &[][..]),
        (&second_ranges[..], &second_markers[..]),
    ]);
    assert_eq!(remap.placed, vec![Marker::at("save", secs(25.0))]);
}

#[test]
fn test_later_range_measures_from_its_own_start() {
    let ranges = [range(0.0, 10.0), range(50.0, 60.0)];
    let markers = [Marker::at("late", secs(55.0))];
    let remap = remap_markers([(&ranges[..], &markers[..])]);
    assert_eq!(remap.placed[0].start, secs(5.0));
}

#[test]
fn test_marker_outside_ranges_is_dropped() {
    let ranges = [range(10.0, 30.0)];
    let markers = [
        Marker::at("early", secs(5.0)),
        Marker::new("straddle", secs(25.0), secs(40.0)),
    ];
    let remap = remap_markers([(&ranges[..], &markers[..])]);
    assert!(remap.placed.is_empty());
    assert_eq!(remap.dropped.len(), 2);
}

#[test]
fn test_start_and_end_matched_independently() {
    let ranges = [range(0.0, 10.0), range(20.0, 30.0)];
    let markers = [Marker::new("span", secs(5.0), secs(25.0))];
    let remap = remap_markers([(&ranges[..], &markers[..])]);
    assert_eq!(remap.placed, vec![Marker::new("span", secs(5.0), secs(5.0))]);
}
