//! Engine errors to API error codes.
//!
//! Caller mistakes keep their message. Store and upstream failures are
//! logged here and answered with a generic message.

use seoflow_content::ContentError;
use seoflow_core::CoreError;
use seoflow_db::DbError;
use seoflow_ingest::IngestError;
use seoflow_metrics::MetricsError;

use super::ApiError;

pub(crate) fn map_core_error(request_id: String, error: &CoreError) -> ApiError {
    match error {
        CoreError::Forbidden { .. } => ApiError::new(request_id, "forbidden", error.to_string()),
        CoreError::UnknownVariant { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
    }
}

pub(crate) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound { .. } => ApiError::new(request_id, "not_found", error.to_string()),
        DbError::InvalidTransition { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        DbError::Decode { .. } | DbError::Sqlx(_) | DbError::Migration(_) => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

pub(crate) fn map_ingest_error(request_id: String, error: &IngestError) -> ApiError {
    match error {
        IngestError::Core(e) => map_core_error(request_id, e),
        IngestError::EmptyFeed | IngestError::MissingColumn { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        IngestError::NotFound(_) => ApiError::new(request_id, "not_found", error.to_string()),
        IngestError::AlreadyRolledBack(_) | IngestError::RunInProgress(_) | IngestError::Busy => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        IngestError::Db(e) => map_db_error(request_id, e),
    }
}

pub(crate) fn map_metrics_error(request_id: String, error: &MetricsError) -> ApiError {
    match error {
        MetricsError::Core(e) => map_core_error(request_id, e),
        MetricsError::InvalidRange { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        MetricsError::AttributionTimeout { .. } | MetricsError::Attribution(_) => {
            tracing::error!(error = %error, "metrics computation failed");
            ApiError::new(request_id, "internal_error", error.to_string())
        }
        MetricsError::Db(e) => map_db_error(request_id, e),
    }
}

pub(crate) fn map_content_error(request_id: String, error: &ContentError) -> ApiError {
    match error {
        ContentError::Core(e) => map_core_error(request_id, e),
        ContentError::NotFound(_) => ApiError::new(request_id, "not_found", error.to_string()),
        ContentError::IllegalTransition { .. }
        | ContentError::NoDraft(_)
        | ContentError::NoGateResult(_)
        | ContentError::GateFailed { .. }
        | ContentError::Busy => ApiError::new(request_id, "conflict", error.to_string()),
        ContentError::Generator(_) | ContentError::GeneratorTimeout { .. } => {
            tracing::error!(error = %error, "draft generation failed");
            ApiError::new(request_id, "internal_error", error.to_string())
        }
        ContentError::Metrics(e) => map_metrics_error(request_id, e),
        ContentError::Db(e) => map_db_error(request_id, e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use seoflow_core::{Role, TopicStatus};
    use uuid::Uuid;

    use super::*;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn forbidden_callers_get_403() {
        let error = ContentError::Core(CoreError::Forbidden {
            caller: "ed".to_string(),
            actual: Role::ContentEditor,
            required: Role::Owner,
        });
        assert_eq!(
            status_of(map_content_error("r".to_string(), &error)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn illegal_transitions_are_conflicts() {
        let error = ContentError::IllegalTransition {
            topic_id: Uuid::nil(),
            from: TopicStatus::Published,
            to: TopicStatus::Draft,
        };
        let api = map_content_error("r".to_string(), &error);
        assert_eq!(api.error.code, "conflict");
    }

    #[test]
    fn lease_contention_is_a_conflict_for_both_engines() {
        assert_eq!(
            map_ingest_error("r".to_string(), &IngestError::Busy).error.code,
            "conflict"
        );
        assert_eq!(
            map_content_error("r".to_string(), &ContentError::Busy).error.code,
            "conflict"
        );
    }

    #[test]
    fn store_failures_hide_their_details() {
        let error = DbError::Decode {
            entity: "topic",
            reason: "bad status 'x'".to_string(),
        };
        let api = map_db_error("r".to_string(), &error);
        assert_eq!(api.error.code, "internal_error");
        assert_eq!(api.error.message, "database query failed");
    }
}
