// Unit tests for domain models

use super::*;

#[test]
fn test_time_spec_parse_seconds() {
    let time = TimeSpec::parse("123.5").unwrap();
    assert_eq!(time, TimeSpec::from_seconds(123.5));
}

#[test]
fn test_time_spec_parse_mm_ss() {
    let time = TimeSpec::parse("01:30.5").unwrap();
    assert_eq!(time, TimeSpec::from_seconds(90.5));
}

#[test]
fn test_time_spec_parse_hh_mm_ss() {
    let time = TimeSpec::parse("01:02:03.456").unwrap();
    assert_eq!(time, TimeSpec::from_micros(3_723_456_000));
}

#[test]
fn test_time_spec_parse_empty_is_zero() {
    assert_eq!(TimeSpec::parse("").unwrap(), TimeSpec::ZERO);
    assert_eq!(TimeSpec::parse("   ").unwrap(), TimeSpec::ZERO);
}

#[test]
fn test_time_spec_minutes_field_may_exceed_sixty() {
    assert_eq!(TimeSpec::parse("90:00").unwrap(), TimeSpec::from_seconds(5400.0));
}

#[test]
fn test_time_spec_parse_invalid() {
    assert!(matches!(TimeSpec::parse("abc"), Err(ReplayError::Format { .. })));
    assert!(matches!(TimeSpec::parse("1:2:3:4"), Err(ReplayError::Format { .. })));
    assert!(matches!(TimeSpec::parse("-5"), Err(ReplayError::Format { .. })));
    assert!(matches!(TimeSpec::parse("1.5:00"), Err(ReplayError::Format { .. })));
}

#[test]
fn test_time_spec_display() {
    assert_eq!(TimeSpec::from_seconds(65.0).to_string(), "0:01:05");
    assert_eq!(TimeSpec::from_seconds(3723.25).to_string(), "1:02:03.250000");
}

#[test]
fn test_time_range_rejects_backwards() {
    let start = TimeSpec::from_seconds(30.0);
    let end = TimeSpec::from_seconds(10.0);
    assert!(matches!(TimeRange::new(start, end), Err(ReplayError::Order { .. })));
    assert!(TimeRange::new(start, start).is_err());
}

#[test]
fn test_time_range_contains_is_inclusive() {
    let range = TimeRange::new(TimeSpec::from_seconds(10.0), TimeSpec::from_seconds(30.0)).unwrap();
    assert!(range.contains(TimeSpec::from_seconds(10.0)));
    assert!(range.contains(TimeSpec::from_seconds(30.0)));
    assert!(!range.contains(TimeSpec::from_seconds(30.5)));
    assert_eq!(range.duration(), TimeSpec::from_seconds(20.0));
    assert_eq!(range.to_string(), "0:00:10 - 0:00:30");
}

#[test]
fn test_segment_file_name() {
    let segment = Segment {
        input_index: 1,
        range_index: 2,
        source: PathBuf::from("/clips/match.mkv"),
        range: TimeRange::new(TimeSpec::ZERO, TimeSpec::from_seconds(1.0)).unwrap(),
        probe: MediaProbe::default(),
    };
    assert_eq!(segment.file_name(BuildMode::Encoded, ".mp4"), "1__match__2.mp4");
    assert_eq!(segment.file_name(BuildMode::Raw, ".mkv"), "raw_1__match__2.mkv");
}
