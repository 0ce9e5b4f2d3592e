use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::db::PlatformStat;
use crate::error::GatewayError;
use crate::metrics::STATS_UPDATES;
use crate::middleware::AuthenticatedUser;
use crate::platform::{format_followers, format_total, Platform};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatView {
    pub platform: &'static str,
    pub followers: u64,
    pub formatted_followers: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&PlatformStat> for PlatformStatView {
    fn from(stat: &PlatformStat) -> Self {
        Self {
            platform: stat.platform.as_str(),
            followers: stat.followers,
            formatted_followers: format_followers(stat.followers),
            last_updated: stat.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TotalView {
    pub count: u64,
    pub formatted: String,
}

#[derive(Debug, Serialize)]
pub struct StatsSummary {
    pub platforms: Vec<PlatformStatView>,
    pub total: TotalView,
}

impl StatsSummary {
    pub fn from_stats(stats: &[PlatformStat]) -> Self {
        let count = stats
            .iter()
            .fold(0u64, |sum, s| sum.saturating_add(s.followers));
        Self {
            platforms: stats.iter().map(PlatformStatView::from).collect(),
            total: TotalView {
                count,
                formatted: format_total(count),
            },
        }
    }
}

/// Read one `{platform, followers}` pair out of a request body.
///
/// `missing` is the message used when either field is absent.
fn parse_entry(entry: &Value, missing: &str) -> Result<(Platform, u64), GatewayError> {
    let platform = entry.get("platform").filter(|v| !v.is_null());
    let followers = entry.get("followers").filter(|v| !v.is_null());
    let (Some(platform), Some(followers)) = (platform, followers) else {
        return Err(GatewayError::BadRequest(missing.to_string()));
    };

    let platform = platform
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest(missing.to_string()))?;
    let platform: Platform = platform
        .parse()
        .map_err(|_| GatewayError::BadRequest(format!("Invalid platform: {platform}")))?;

    let followers = followers.as_u64().ok_or_else(|| {
        GatewayError::BadRequest("Followers must be a non-negative integer".to_string())
    })?;

    Ok((platform, followers))
}

/// GET /api/stats
pub async fn get_stats(state: web::Data<AppState>) -> Result<HttpResponse, GatewayError> {
    let stats = state.db.list_platform_stats()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": StatsSummary::from_stats(&stats),
    })))
}

/// PUT /api/stats/platform
pub async fn update_platform(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, GatewayError> {
    let (platform, followers) =
        parse_entry(&body, "Platform and followers count are required")?;

    let stat = state.db.upsert_platform_stat(platform, followers)?;
    STATS_UPDATES.with_label_values(&["single"]).inc();
    tracing::info!(
        user_id = %user.0.id,
        platform = %platform,
        followers,
        "platform stats updated"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": PlatformStatView::from(&stat),
    })))
}

/// PUT /api/stats/bulk
pub async fn bulk_update(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, GatewayError> {
    let items = body
        .get("platforms")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::BadRequest("Platforms array is required".to_string()))?;

    // Validate everything before writing anything
    let updates = items
        .iter()
        .map(|item| parse_entry(item, "Each platform entry requires platform and followers"))
        .collect::<Result<Vec<_>, _>>()?;

    state.db.bulk_upsert_platform_stats(&updates)?;
    STATS_UPDATES.with_label_values(&["bulk"]).inc();
    tracing::info!(user_id = %user.0.id, count = updates.len(), "bulk stats update");

    let stats = state.db.list_platform_stats()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Stats updated successfully",
        "data": StatsSummary::from_stats(&stats),
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/stats")
            .route("", web::get().to(get_stats))
            .route("/", web::get().to(get_stats))
            .route("/platform", web::put().to(update_platform))
            .route("/bulk", web::put().to(bulk_update)),
    );
}
