use chrono::NaiveDate;
use rust_decimal::Decimal;
use seoflow_core::{MetricsRollup, ProfitFigures, RollupKey};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct RollupRow {
    org: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    rollup_kind: String,
    rollup_date: Option<NaiveDate>,
    segment_type: Option<String>,
    segment_value: Option<String>,
    revenue: Decimal,
    tax: Decimal,
    driver_payout: Decimal,
    ad_spend: Decimal,
    profit: Decimal,
    margin: f64,
    average_order_value: Decimal,
    booking_count: i64,
}

impl TryFrom<RollupRow> for MetricsRollup {
    type Error = DbError;

    fn try_from(row: RollupRow) -> Result<Self, Self::Error> {
        let key = match (row.rollup_kind.as_str(), row.rollup_date, row.segment_type) {
            ("daily", Some(date), _) => RollupKey::Daily { date },
            ("segment", _, Some(segment_type)) => RollupKey::Segment {
                segment_type: segment_type
                    .parse()
                    .map_err(|e| DbError::decode("rollup", e))?,
                segment_value: row.segment_value.unwrap_or_default(),
            },
            (kind, _, _) => {
                return Err(DbError::decode(
                    "rollup",
                    format!("incomplete key for kind '{kind}'"),
                ))
            }
        };
        Ok(MetricsRollup {
            org: row.org,
            period_start: row.period_start,
            period_end: row.period_end,
            key,
            figures: ProfitFigures {
                revenue: row.revenue,
                tax: row.tax,
                driver_payout: row.driver_payout,
                ad_spend: row.ad_spend,
                profit: row.profit,
                margin: row.margin,
                average_order_value: row.average_order_value,
                booking_count: row.booking_count,
            },
        })
    }
}

/// Delete-then-insert in one transaction so readers never see a half-written set.
pub(super) async fn replace_rollups(
    pool: &PgPool,
    org: &str,
    from: NaiveDate,
    to: NaiveDate,
    rollups: &[MetricsRollup],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM metrics_rollups WHERE org = $1 AND period_start = $2 AND period_end = $3",
    )
    .bind(org)
    .bind(from)
    .bind(to)
    .execute(&mut *tx)
    .await?;

    for rollup in rollups {
        let (kind, date, segment_type, segment_value) = match &rollup.key {
            RollupKey::Daily { date } => ("daily", Some(*date), None, None),
            RollupKey::Segment {
                segment_type,
                segment_value,
            } => (
                "segment",
                None,
                Some(segment_type.as_str()),
                Some(segment_value.as_str()),
            ),
        };
        let f = &rollup.figures;
        sqlx::query(
            "INSERT INTO metrics_rollups \
                 (org, period_start, period_end, rollup_kind, rollup_date, segment_type, \
                  segment_value, revenue, tax, driver_payout, ad_spend, profit, margin, \
                  average_order_value, booking_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(org)
        .bind(from)
        .bind(to)
        .bind(kind)
        .bind(date)
        .bind(segment_type)
        .bind(segment_value)
        .bind(f.revenue)
        .bind(f.tax)
        .bind(f.driver_payout)
        .bind(f.ad_spend)
        .bind(f.profit)
        .bind(f.margin)
        .bind(f.average_order_value)
        .bind(f.booking_count)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub(super) async fn list_rollups(
    pool: &PgPool,
    org: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<MetricsRollup>, DbError> {
    let rows = sqlx::query_as::<_, RollupRow>(
        "SELECT org, period_start, period_end, rollup_kind, rollup_date, segment_type, \
                segment_value, revenue, tax, driver_payout, ad_spend, profit, margin, \
                average_order_value, booking_count \
         FROM metrics_rollups \
         WHERE org = $1 AND period_start = $2 AND period_end = $3 \
         ORDER BY id",
    )
    .bind(org)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(MetricsRollup::try_from).collect()
}
