//! `bookings` and `ads_metrics` writes and settled-record reads.
//!
//! Each write is a single `INSERT … SELECT FROM UNNEST … ON CONFLICT`
//! statement, so the existence check and the write are atomic per key even
//! when several imports run at once.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use seoflow_core::{AdMetricRecord, BookingRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{BatchWrite, DuplicatePolicy};
use crate::DbError;

const BOOKING_INSERT: &str = "INSERT INTO bookings \
         (trip_id, org, total_amount, base_rate, tax_amount, driver_payout, \
          service_type, vehicle_type, booking_type, city, pickup_date, import_run_id) \
     SELECT * FROM UNNEST(\
          $1::text[], $2::text[], $3::numeric[], $4::numeric[], $5::numeric[], $6::numeric[], \
          $7::text[], $8::text[], $9::text[], $10::text[], $11::date[], $12::uuid[])";

#[derive(Default)]
struct BookingColumns {
    trip_ids: Vec<String>,
    orgs: Vec<String>,
    totals: Vec<Decimal>,
    base_rates: Vec<Decimal>,
    taxes: Vec<Decimal>,
    payouts: Vec<Decimal>,
    service_types: Vec<String>,
    vehicle_types: Vec<String>,
    booking_types: Vec<String>,
    cities: Vec<String>,
    pickup_dates: Vec<Option<NaiveDate>>,
    run_ids: Vec<Uuid>,
}

impl BookingColumns {
    fn from_rows(rows: &[BookingRecord]) -> Self {
        let mut cols = Self::default();
        for row in rows {
            cols.trip_ids.push(row.trip_id.clone());
            cols.orgs.push(row.org.clone());
            cols.totals.push(row.total_amount);
            cols.base_rates.push(row.base_rate);
            cols.taxes.push(row.tax_amount);
            cols.payouts.push(row.driver_payout);
            cols.service_types.push(row.service_type.clone());
            cols.vehicle_types.push(row.vehicle_type.clone());
            cols.booking_types.push(row.booking_type.clone());
            cols.cities.push(row.city.clone());
            cols.pickup_dates.push(row.pickup_date);
            cols.run_ids.push(row.import_run_id);
        }
        cols
    }
}

fn tally(flags: &[bool], attempted: usize) -> BatchWrite {
    let inserted = flags.iter().filter(|&&is_new| is_new).count();
    let updated = flags.len() - inserted;
    BatchWrite {
        inserted: inserted as u64,
        updated: updated as u64,
        skipped: attempted.saturating_sub(flags.len()) as u64,
    }
}

pub(super) async fn write_bookings(
    pool: &PgPool,
    rows: &[BookingRecord],
    policy: DuplicatePolicy,
) -> Result<BatchWrite, DbError> {
    if rows.is_empty() {
        return Ok(BatchWrite::default());
    }
    let cols = BookingColumns::from_rows(rows);

    let conflict = match policy {
        DuplicatePolicy::Skip => "ON CONFLICT (trip_id) DO NOTHING",
        DuplicatePolicy::Overwrite => {
            "ON CONFLICT (trip_id) DO UPDATE SET \
                 org           = EXCLUDED.org, \
                 total_amount  = EXCLUDED.total_amount, \
                 base_rate     = EXCLUDED.base_rate, \
                 tax_amount    = EXCLUDED.tax_amount, \
                 driver_payout = EXCLUDED.driver_payout, \
                 service_type  = EXCLUDED.service_type, \
                 vehicle_type  = EXCLUDED.vehicle_type, \
                 booking_type  = EXCLUDED.booking_type, \
                 city          = EXCLUDED.city, \
                 pickup_date   = EXCLUDED.pickup_date, \
                 import_run_id = EXCLUDED.import_run_id, \
                 updated_at    = NOW()"
        }
    };

    let flags: Vec<bool> = sqlx::query_scalar::<_, bool>(&format!(
        "{BOOKING_INSERT} {conflict} RETURNING (xmax = 0) AS is_new"
    ))
    .bind(&cols.trip_ids)
    .bind(&cols.orgs)
    .bind(&cols.totals)
    .bind(&cols.base_rates)
    .bind(&cols.taxes)
    .bind(&cols.payouts)
    .bind(&cols.service_types)
    .bind(&cols.vehicle_types)
    .bind(&cols.booking_types)
    .bind(&cols.cities)
    .bind(&cols.pickup_dates)
    .bind(&cols.run_ids)
    .fetch_all(pool)
    .await?;

    Ok(tally(&flags, rows.len()))
}

pub(super) async fn upsert_ad_metrics(
    pool: &PgPool,
    rows: &[AdMetricRecord],
) -> Result<BatchWrite, DbError> {
    if rows.is_empty() {
        return Ok(BatchWrite::default());
    }

    let mut campaign_ids = Vec::with_capacity(rows.len());
    let mut dates = Vec::with_capacity(rows.len());
    let mut orgs = Vec::with_capacity(rows.len());
    let mut names: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut impressions = Vec::with_capacity(rows.len());
    let mut clicks = Vec::with_capacity(rows.len());
    let mut spends = Vec::with_capacity(rows.len());
    let mut conversions = Vec::with_capacity(rows.len());
    let mut revenues = Vec::with_capacity(rows.len());
    let mut ctrs = Vec::with_capacity(rows.len());
    let mut rois = Vec::with_capacity(rows.len());
    let mut run_ids = Vec::with_capacity(rows.len());

    for row in rows {
        campaign_ids.push(row.campaign_id.clone());
        dates.push(row.metric_date);
        orgs.push(row.org.clone());
        names.push(row.campaign_name.clone());
        impressions.push(row.impressions);
        clicks.push(row.clicks);
        spends.push(row.spend);
        conversions.push(row.conversions);
        revenues.push(row.revenue);
        ctrs.push(row.ctr);
        rois.push(row.roi);
        run_ids.push(row.import_run_id);
    }

    let flags: Vec<bool> = sqlx::query_scalar::<_, bool>(
        "INSERT INTO ads_metrics \
             (campaign_id, metric_date, org, campaign_name, impressions, clicks, spend, \
              conversions, revenue, ctr, roi, import_run_id) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::date[], $3::text[], $4::text[], $5::int8[], $6::int8[], \
              $7::numeric[], $8::int8[], $9::numeric[], $10::float8[], $11::float8[], $12::uuid[]) \
         ON CONFLICT (campaign_id, metric_date) DO UPDATE SET \
             org           = EXCLUDED.org, \
             campaign_name = COALESCE(EXCLUDED.campaign_name, ads_metrics.campaign_name), \
             impressions   = EXCLUDED.impressions, \
             clicks        = EXCLUDED.clicks, \
             spend         = EXCLUDED.spend, \
             conversions   = EXCLUDED.conversions, \
             revenue       = EXCLUDED.revenue, \
             ctr           = EXCLUDED.ctr, \
             roi           = EXCLUDED.roi, \
             import_run_id = EXCLUDED.import_run_id, \
             updated_at    = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(&campaign_ids)
    .bind(&dates)
    .bind(&orgs)
    .bind(&names)
    .bind(&impressions)
    .bind(&clicks)
    .bind(&spends)
    .bind(&conversions)
    .bind(&revenues)
    .bind(&ctrs)
    .bind(&rois)
    .bind(&run_ids)
    .fetch_all(pool)
    .await?;

    Ok(tally(&flags, rows.len()))
}

pub(super) async fn delete_records_for_import(pool: &PgPool, run_id: Uuid) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    let bookings = sqlx::query("DELETE FROM bookings WHERE import_run_id = $1")
        .bind(run_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let ads = sqlx::query("DELETE FROM ads_metrics WHERE import_run_id = $1")
        .bind(run_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(bookings + ads)
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    trip_id: String,
    org: String,
    total_amount: Decimal,
    base_rate: Decimal,
    tax_amount: Decimal,
    driver_payout: Decimal,
    service_type: String,
    vehicle_type: String,
    booking_type: String,
    city: String,
    pickup_date: Option<NaiveDate>,
    import_run_id: Uuid,
}

impl From<BookingRow> for BookingRecord {
    fn from(row: BookingRow) -> Self {
        BookingRecord {
            trip_id: row.trip_id,
            org: row.org,
            total_amount: row.total_amount,
            base_rate: row.base_rate,
            tax_amount: row.tax_amount,
            driver_payout: row.driver_payout,
            service_type: row.service_type,
            vehicle_type: row.vehicle_type,
            booking_type: row.booking_type,
            city: row.city,
            pickup_date: row.pickup_date,
            import_run_id: row.import_run_id,
        }
    }
}

pub(super) async fn list_settled_bookings(
    pool: &PgPool,
    org: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<BookingRecord>, DbError> {
    let rows = sqlx::query_as::<_, BookingRow>(
        "SELECT b.trip_id, b.org, b.total_amount, b.base_rate, b.tax_amount, b.driver_payout, \
                b.service_type, b.vehicle_type, b.booking_type, b.city, b.pickup_date, \
                b.import_run_id \
         FROM bookings b \
         JOIN imports i ON i.id = b.import_run_id \
         WHERE b.org = $1 AND b.pickup_date BETWEEN $2 AND $3 \
           AND i.status IN ('completed', 'completed_with_errors') \
         ORDER BY b.trip_id",
    )
    .bind(org)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(BookingRecord::from).collect())
}

#[derive(Debug, sqlx::FromRow)]
struct AdMetricRow {
    campaign_id: String,
    metric_date: NaiveDate,
    org: String,
    campaign_name: Option<String>,
    impressions: i64,
    clicks: i64,
    spend: Decimal,
    conversions: i64,
    revenue: Decimal,
    ctr: f64,
    roi: f64,
    import_run_id: Uuid,
}

impl From<AdMetricRow> for AdMetricRecord {
    fn from(row: AdMetricRow) -> Self {
        AdMetricRecord {
            campaign_id: row.campaign_id,
            metric_date: row.metric_date,
            org: row.org,
            campaign_name: row.campaign_name,
            impressions: row.impressions,
            clicks: row.clicks,
            spend: row.spend,
            conversions: row.conversions,
            revenue: row.revenue,
            ctr: row.ctr,
            roi: row.roi,
            import_run_id: row.import_run_id,
        }
    }
}

pub(super) async fn list_settled_ad_metrics(
    pool: &PgPool,
    org: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AdMetricRecord>, DbError> {
    let rows = sqlx::query_as::<_, AdMetricRow>(
        "SELECT a.campaign_id, a.metric_date, a.org, a.campaign_name, a.impressions, a.clicks, \
                a.spend, a.conversions, a.revenue, a.ctr, a.roi, a.import_run_id \
         FROM ads_metrics a \
         JOIN imports i ON i.id = a.import_run_id \
         WHERE a.org = $1 AND a.metric_date BETWEEN $2 AND $3 \
           AND i.status IN ('completed', 'completed_with_errors') \
         ORDER BY a.metric_date, a.campaign_id",
    )
    .bind(org)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(AdMetricRecord::from).collect())
}
