use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn default_key() -> String {
    "id".to_string()
}

/// Query parameters for paginated listings.
///
/// `skip` and `limit` must not be negative. Rows come back ascending by `order_by`, which
/// defaults to `id`, for example:
/// ```text
/// GET /cars?skip=20&limit=10&order_by=year
/// ```
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Rows to skip.
    #[serde(default)]
    #[param(example = 0)]
    pub skip: i64,
    /// Page size.
    #[serde(default = "default_limit")]
    #[param(example = 100)]
    pub limit: i64,
    /// Attribute to sort by.
    pub order_by: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            order_by: None,
        }
    }
}

/// Query parameters of a keyed bulk update.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BatchUpdateParams {
    /// Attribute used to find the rows each payload applies to.
    #[serde(default = "default_key")]
    #[param(example = "model")]
    pub key: String,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexResponse {
    pub msg: String,
}
