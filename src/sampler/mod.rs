//! Randomized probe parameters derived from a dataset's declared metadata: a small interior
//! region, a short time window, and a variable subset.

pub mod rng;

use chrono::Duration;

use crate::catalog::{BBox, Dataset, DatasetDescriptor, TimeRange};

pub use rng::{entropy_seed, stable_seed, Rng};

/// Region corners are rounded to this many decimal places.
pub const REGION_DECIMALS: i32 = 1;
/// Resolution assumed when the catalog declares none.
pub const DEFAULT_SPATIAL_RES: f64 = 1.0;
/// Above this many candidate variables only a random pair is requested.
pub const MAX_FULL_VARIABLE_SET: usize = 3;

/// Names containing any of these are coordinates or cell bounds, never probe variables.
const COORDINATE_FRAGMENTS: &[&str] = &["lat", "lon", "bounds", "bnds", "date"];

pub fn sample_region(descriptor: &DatasetDescriptor, rng: &mut Rng) -> Option<BBox> {
    sample_region_with(descriptor, |lo, hi| rng.uniform(lo, hi))
}

/// [sample_region] with an explicit draw function `(min, max) -> value`.
///
/// The near corner is pushed off the axis extrema; the far corner sits two resolution cells
/// further on each axis.
pub fn sample_region_with(
    descriptor: &DatasetDescriptor,
    mut draw: impl FnMut(f64, f64) -> f64,
) -> Option<BBox> {
    let bbox = descriptor.bbox?;
    let res = descriptor.spatial_res.unwrap_or(DEFAULT_SPATIAL_RES);

    let x = nudge_interior(draw(bbox.min_x, bbox.max_x), bbox.min_x, bbox.max_x);
    let y = nudge_interior(draw(bbox.min_y, bbox.max_y), bbox.min_y, bbox.max_y);

    Some(BBox::new(
        round_coord(x),
        round_coord(y),
        round_coord(x + res * 2.0),
        round_coord(y + res * 2.0),
    ))
}

fn nudge_interior(value: f64, min: f64, max: f64) -> f64 {
    let mut value = value;
    if value == max {
        value = if value > 0.0 { value - 1.0 } else { value + 1.0 };
    }
    if value == min {
        value += 1.0;
    }
    value
}

fn round_coord(value: f64) -> f64 {
    let scale = 10f64.powi(REGION_DECIMALS);
    (value * scale).round() / scale
}

/// Day-equivalent length of a nominal period such as `8D` or `1M`.
///
/// Months count 31 days and years 366 so the synthesized end is always reachable.
pub fn period_days(period: &str) -> Option<i64> {
    let period = period.trim();
    let unit = period.chars().last()?;
    let count = &period[..period.len() - unit.len_utf8()];
    let count: i64 = if count.is_empty() {
        1
    } else {
        count.parse().ok()?
    };
    if count <= 0 {
        return None;
    }
    let per_unit = match unit.to_ascii_uppercase() {
        'D' => 1,
        'W' => 7,
        'M' => 31,
        'Y' => 366,
        _ => return None,
    };
    count.checked_mul(per_unit)
}

/// Time window for the temporal probe.
///
/// Prefers the declared range start plus one nominal period; otherwise reads the first and third
/// (or last) timestamps off `opened`. `None` means the dataset has no usable time dimension.
pub fn sample_time_range(
    descriptor: &DatasetDescriptor,
    opened: Option<&dyn Dataset>,
) -> Option<TimeRange> {
    let declared_days = descriptor.time_period.as_deref().and_then(period_days);
    if let (Some(range), Some(days)) = (descriptor.time_range, declared_days) {
        let end = Duration::try_days(days).and_then(|span| range.start.checked_add_signed(span));
        match end {
            Some(end) => return Some(TimeRange::new(range.start, end)),
            None => tracing::debug!(
                data_id = %descriptor.data_id,
                days,
                "declared period overflows the calendar, using timestamps"
            ),
        }
    }

    let stamps = match opened?.timestamps() {
        Ok(stamps) => stamps,
        Err(err) => {
            tracing::debug!(data_id = %descriptor.data_id, %err, "time coordinate unreadable");
            return None;
        }
    };
    let first = stamps.first()?;
    let end = stamps.get(2).or_else(|| stamps.last())?;
    Some(TimeRange::new(first.date(), end.date()))
}

fn is_coordinate_like(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "time" || COORDINATE_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

/// Variables requested by every open: two distinct random picks when more than three data
/// variables exist, otherwise all of them. Coordinate and bounds variables are never picked.
pub fn select_variables(descriptor: &DatasetDescriptor, rng: &mut Rng) -> Vec<String> {
    let candidates: Vec<&String> = descriptor
        .data_vars
        .keys()
        .filter(|name| !is_coordinate_like(name))
        .collect();

    if candidates.len() <= MAX_FULL_VARIABLE_SET {
        return candidates.into_iter().cloned().collect();
    }

    let first = rng.index(candidates.len());
    let mut second = rng.index(candidates.len() - 1);
    if second >= first {
        second += 1;
    }
    vec![candidates[first].clone(), candidates[second].clone()]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::catalog::{FixtureDataset, FixtureStore, DataStore, OpenRequest, VariableDescriptor};

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor {
            data_id: "esacci.SST.test".to_string(),
            title: None,
            data_type: "dataset".to_string(),
            bbox: Some(BBox::new(0.0, 0.0, 10.0, 10.0)),
            spatial_res: Some(1.0),
            time_range: None,
            time_period: None,
            data_vars: BTreeMap::new(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn draw_on_axis_maximum_is_nudged_inside() {
        let mut draws = vec![10.0, 4.0].into_iter();
        let region = sample_region_with(&descriptor(), |_, _| draws.next().unwrap()).unwrap();
        assert_eq!(region, BBox::new(9.0, 4.0, 11.0, 6.0));
    }

    #[test]
    fn draw_on_axis_minimum_is_nudged_up() {
        let mut draws = vec![0.0, 0.0].into_iter();
        let region = sample_region_with(&descriptor(), |_, _| draws.next().unwrap()).unwrap();
        assert_eq!(region, BBox::new(1.0, 1.0, 3.0, 3.0));
    }

    #[test]
    fn negative_maximum_is_nudged_up() {
        let mut d = descriptor();
        d.bbox = Some(BBox::new(-20.0, -20.0, -5.0, -5.0));
        let mut draws = vec![-5.0, -10.0].into_iter();
        let region = sample_region_with(&d, |_, _| draws.next().unwrap()).unwrap();
        assert_eq!(region.min_x, -4.0);
        assert_eq!(region.min_y, -10.0);
    }

    #[test]
    fn far_corner_uses_declared_or_default_resolution() {
        let mut d = descriptor();
        d.spatial_res = None;
        let mut rng = Rng::new(11);
        let region = sample_region(&d, &mut rng).unwrap();
        assert!((region.max_x - region.min_x - 2.0).abs() < 0.11);
        assert!((region.max_y - region.min_y - 2.0).abs() < 0.11);
    }

    #[test]
    fn region_corners_are_rounded() {
        let mut draws = vec![3.14159, 2.71828].into_iter();
        let region = sample_region_with(&descriptor(), |_, _| draws.next().unwrap()).unwrap();
        assert_eq!(region, BBox::new(3.1, 2.7, 5.1, 4.7));
    }

    #[test]
    fn missing_bbox_yields_no_region() {
        let mut d = descriptor();
        d.bbox = None;
        assert!(sample_region(&d, &mut Rng::new(1)).is_none());
    }

    #[test]
    fn period_days_scales_calendar_units() {
        assert_eq!(period_days("1D"), Some(1));
        assert_eq!(period_days("8D"), Some(8));
        assert_eq!(period_days("1M"), Some(31));
        assert_eq!(period_days("2Y"), Some(732));
        assert_eq!(period_days("W"), Some(7));
        assert_eq!(period_days("0D"), None);
        assert_eq!(period_days("1Q"), None);
        assert_eq!(period_days(""), None);
    }

    #[test]
    fn declared_period_synthesizes_window() {
        let mut d = descriptor();
        d.time_range = Some(TimeRange::new(day(2003, 1, 1), day(2010, 12, 31)));
        d.time_period = Some("1M".to_string());
        let range = sample_time_range(&d, None).unwrap();
        assert_eq!(range, TimeRange::new(day(2003, 1, 1), day(2003, 2, 1)));
    }

    #[test]
    fn oversized_period_falls_back_to_timestamps() {
        let mut d = descriptor();
        d.time_range = Some(TimeRange::new(day(2003, 1, 1), day(2010, 12, 31)));
        let store = FixtureStore::new("t", vec![FixtureDataset::gridded("esacci.SST.x")]);
        let opened = store.open(&OpenRequest::new("esacci.SST.x")).unwrap();
        for period in ["200000000000D", "100000000D", "9000000000000Y"] {
            d.time_period = Some(period.to_string());
            assert_eq!(
                sample_time_range(&d, Some(opened.as_ref())),
                Some(TimeRange::new(day(2000, 1, 1), day(2000, 3, 1))),
                "period {period}"
            );
            assert_eq!(sample_time_range(&d, None), None, "period {period}");
        }
    }

    #[test]
    fn opened_timestamps_are_the_fallback() {
        let store = FixtureStore::new("t", vec![FixtureDataset::gridded("esacci.SST.x")]);
        let opened = store.open(&OpenRequest::new("esacci.SST.x")).unwrap();
        let range = sample_time_range(&descriptor(), Some(opened.as_ref())).unwrap();
        assert_eq!(range, TimeRange::new(day(2000, 1, 1), day(2000, 3, 1)));
    }

    #[test]
    fn short_time_axis_uses_last_stamp() {
        let mut fixture = FixtureDataset::gridded("esacci.SST.x");
        fixture.timestamps.truncate(2);
        let store = FixtureStore::new("t", vec![fixture]);
        let opened = store.open(&OpenRequest::new("esacci.SST.x")).unwrap();
        let range = sample_time_range(&descriptor(), Some(opened.as_ref())).unwrap();
        assert_eq!(range, TimeRange::new(day(2000, 1, 1), day(2000, 2, 1)));
    }

    #[test]
    fn no_time_dimension_yields_none() {
        let mut fixture = FixtureDataset::gridded("esacci.SST.x");
        fixture.timestamps.clear();
        let store = FixtureStore::new("t", vec![fixture]);
        let opened = store.open(&OpenRequest::new("esacci.SST.x")).unwrap();
        assert!(sample_time_range(&descriptor(), Some(opened.as_ref())).is_none());
        assert!(sample_time_range(&descriptor(), None).is_none());
    }

    #[test]
    fn small_variable_sets_are_taken_whole_without_coordinates() {
        let mut d = descriptor();
        for name in ["sst", "Latitude", "lon", "time_bnds", "time", "sst_uncertainty"] {
            d.data_vars
                .insert(name.to_string(), VariableDescriptor::default());
        }
        let picked = select_variables(&d, &mut Rng::new(5));
        assert_eq!(picked, vec!["sst".to_string(), "sst_uncertainty".to_string()]);
    }

    #[test]
    fn large_variable_sets_yield_two_distinct_picks() {
        let mut d = descriptor();
        for name in ["a", "b", "c", "d", "e"] {
            d.data_vars
                .insert(name.to_string(), VariableDescriptor::default());
        }
        for seed in 0..50 {
            let picked = select_variables(&d, &mut Rng::new(seed));
            assert_eq!(picked.len(), 2);
            assert_ne!(picked[0], picked[1]);
        }
    }
}
