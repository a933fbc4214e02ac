use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    error::AppResult,
    model::{activity_log::ActivityLog, role::Role},
};

const AUDITORS: &[Role] = &[Role::SuperAdmin, Role::Admin];

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    pub user_id: Option<u64>,
    #[schema(example = "report")]
    pub entity_type: Option<String>,
    #[schema(example = "monthly:March:2025")]
    pub entity_ref: Option<String>,
    #[schema(example = "report.lock")]
    pub action: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, MySql>, query: &'a ActivityQuery) {
    if let Some(user_id) = query.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(entity_type) = &query.entity_type {
        qb.push(" AND entity_type = ").push_bind(entity_type);
    }
    if let Some(entity_ref) = &query.entity_ref {
        qb.push(" AND entity_ref = ").push_bind(entity_ref);
    }
    if let Some(action) = &query.action {
        qb.push(" AND action = ").push_bind(action);
    }
}

/// Audit trail, newest first.
#[utoipa::path(
    get,
    path = "/api/activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Paginated activity log", body = ActivityPage),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Activity"
)]
pub async fn list_activity(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> AppResult<HttpResponse> {
    auth.require_any(AUDITORS)?;

    let window = PageWindow::new(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM activity_logs WHERE 1=1");
    push_filter(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data = QueryBuilder::<MySql>::new(
        r#"
        SELECT id, user_id, action, entity_type, entity_ref, details, created_at
        FROM activity_logs
        WHERE 1=1
        "#,
    );
    push_filter(&mut data, &query);
    data.push(" ORDER BY id DESC LIMIT ")
        .push_bind(window.per_page)
        .push(" OFFSET ")
        .push_bind(window.offset());

    let entries: Vec<ActivityLog> = data.build_query_as().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(window.wrap(entries, total)))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::testing::{bearer, call},
        model::role::Role,
    };
    use actix_web::{http::StatusCode, test::TestRequest};

    #[actix_web::test]
    async fn hr_cannot_read_the_audit_trail() {
        let resp = call(
            TestRequest::get()
                .uri("/api/activity")
                .insert_header(bearer(Role::Hr, None)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
