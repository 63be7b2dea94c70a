use casemon_core::timestamp::{floor_to_minute, format_timestamp, parse_timestamp};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use proptest::prelude::*;

// 1970-01-01 .. 2100-01-01, microsecond precision
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000).prop_map(|(secs, micros)| {
        DateTime::from_timestamp(secs, micros * 1_000).expect("in range")
    })
}

fn arb_offset() -> impl Strategy<Value = FixedOffset> {
    (-14 * 60i32..=14 * 60).prop_map(|minutes| FixedOffset::east_opt(minutes * 60).expect("valid offset"))
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Zulu,
    Offset,
    SpaceOffset,
    Naive,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        Just(Shape::Zulu),
        Just(Shape::Offset),
        Just(Shape::SpaceOffset),
        Just(Shape::Naive),
    ]
}

fn render(instant: DateTime<Utc>, offset: FixedOffset, shape: Shape) -> String {
    match shape {
        Shape::Zulu => instant.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string(),
        Shape::Offset => instant
            .with_timezone(&offset)
            .format("%Y-%m-%dT%H:%M:%S%.f%:z")
            .to_string(),
        Shape::SpaceOffset => instant
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S%.f%:z")
            .to_string(),
        Shape::Naive => instant.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
    }
}

proptest! {
    /// Property: every accepted shape resolves to the instant it was rendered from
    #[test]
    fn prop_parse_recovers_instant(instant in arb_instant(), offset in arb_offset(), shape in arb_shape()) {
        let input = render(instant, offset, shape);
        let parsed = parse_timestamp(&input).unwrap();
        prop_assert_eq!(parsed, instant);
    }

    /// Property: parsing the normalized output again yields the same instant
    #[test]
    fn prop_parse_is_idempotent(instant in arb_instant(), offset in arb_offset(), shape in arb_shape()) {
        let first = parse_timestamp(&render(instant, offset, shape)).unwrap();
        let normalized = format_timestamp(&first);
        let second = parse_timestamp(&normalized).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(format_timestamp(&second), normalized);
    }

    /// Property: bucketing never moves forward and stays within the minute
    #[test]
    fn prop_floor_to_minute(instant in arb_instant()) {
        let bucket = floor_to_minute(instant);

        prop_assert!(bucket <= instant);
        prop_assert!(instant - bucket < chrono::Duration::minutes(1));
        prop_assert_eq!(bucket.second(), 0);
        prop_assert_eq!(bucket.nanosecond(), 0);
        prop_assert_eq!(floor_to_minute(bucket), bucket);
    }

    /// Property: arbitrary text never panics the parser
    #[test]
    fn prop_parse_never_panics(input in ".*") {
        let _ = parse_timestamp(&input);
    }
}
