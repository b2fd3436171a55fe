use std::collections::BTreeMap;

use chrono::NaiveDate;
use seoflow_core::{BookingRecord, ProfitFigures, SegmentMetrics, SegmentType};

use crate::profit::{FiguresBuilder, PricedBooking};

fn segment_value(record: &BookingRecord, segment_type: SegmentType) -> &str {
    match segment_type {
        SegmentType::ServiceType => &record.service_type,
        SegmentType::City => &record.city,
        SegmentType::VehicleType => &record.vehicle_type,
        SegmentType::BookingType => &record.booking_type,
    }
}

/// Groups bookings by one dimension.
///
/// City breakdowns come back most profitable first, ties broken by name.
/// Other dimensions are ordered by value.
#[must_use]
pub fn breakdown_by_segment(
    bookings: &[PricedBooking<'_>],
    segment_type: SegmentType,
) -> Vec<SegmentMetrics> {
    let mut groups: BTreeMap<&str, FiguresBuilder> = BTreeMap::new();
    for booking in bookings {
        groups
            .entry(segment_value(booking.record, segment_type))
            .or_default()
            .add(&booking.profit);
    }

    let mut segments: Vec<SegmentMetrics> = groups
        .into_iter()
        .map(|(value, builder)| SegmentMetrics {
            segment_type,
            segment_value: value.to_string(),
            figures: builder.build(),
        })
        .collect();

    if segment_type == SegmentType::City {
        segments.sort_by(|a, b| {
            b.figures
                .profit
                .cmp(&a.figures.profit)
                .then_with(|| a.segment_value.cmp(&b.segment_value))
        });
    }
    segments
}

/// One entry per pickup date that had bookings, oldest first.
#[must_use]
pub fn daily_rollups(bookings: &[PricedBooking<'_>]) -> Vec<(NaiveDate, ProfitFigures)> {
    let mut days: BTreeMap<NaiveDate, FiguresBuilder> = BTreeMap::new();
    for booking in bookings {
        if let Some(day) = booking.record.pickup_date {
            days.entry(day).or_default().add(&booking.profit);
        }
    }
    days.into_iter()
        .map(|(day, builder)| (day, builder.build()))
        .collect()
}
