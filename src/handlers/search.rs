//! Lawyer search.
//!
//! Filters are assembled with `QueryBuilder` so every user-supplied value is a
//! bind parameter. Substring filters escape LIKE wildcards before wrapping the
//! value in `%...%`.

use axum::extract::{RawQuery, State};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use super::lawyers::{hydrate, LawyerProfileView};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::models::{LawyerProfile, LAWYER_PROFILE_SELECT};
use crate::pagination::{Page, PageParamsRaw};
use crate::AppState;

const RATING_EXPR: &str =
    "(SELECT COALESCE(AVG(r.rating), 0)::DOUBLE PRECISION FROM reviews r WHERE r.lawyer_id = lp.id)";

pub fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Approved lawyers, matching on name, city, specialization, state and country.
    Approved,
    /// Every lawyer, matching on name, city and specialization.
    Category,
}

impl SearchScope {
    fn search_columns(&self) -> &'static [&'static str] {
        match self {
            SearchScope::Approved => &[
                "u.first_name",
                "u.last_name",
                "ad.city",
                "lp.specialization",
                "ad.state",
                "ad.country",
            ],
            SearchScope::Category => &["u.first_name", "u.last_name", "ad.city", "lp.specialization"],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LawyerSearchParams {
    pub name: Option<String>,
    pub city: Option<String>,
    pub specialization: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub search: Option<String>,
}

fn push_contains(builder: &mut QueryBuilder<'static, Postgres>, column: &str, value: &str) {
    builder.push(format!(" AND {} ILIKE ", column));
    builder.push_bind(like_pattern(value));
}

pub fn lawyer_search_query(params: &LawyerSearchParams, scope: SearchScope) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(LAWYER_PROFILE_SELECT);
    builder.push(" JOIN addresses ad ON ad.id = lp.address_id WHERE TRUE");
    if scope == SearchScope::Approved {
        builder.push(" AND lp.approved");
    }

    if let Some(name) = non_blank(&params.name) {
        let pattern = like_pattern(name);
        builder.push(" AND (u.first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.last_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(city) = non_blank(&params.city) {
        push_contains(&mut builder, "ad.city", city);
    }
    if let Some(specialization) = non_blank(&params.specialization) {
        push_contains(&mut builder, "lp.specialization", specialization);
    }
    if scope == SearchScope::Approved {
        if let Some(state) = non_blank(&params.state) {
            push_contains(&mut builder, "ad.state", state);
        }
        if let Some(country) = non_blank(&params.country) {
            push_contains(&mut builder, "ad.country", country);
        }
    }

    if let Some(search) = non_blank(&params.search) {
        for term in search.split_whitespace() {
            let pattern = like_pattern(term);
            builder.push(" AND (");
            for (i, column) in scope.search_columns().iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(format!("{} ILIKE ", column));
                builder.push_bind(pattern.clone());
            }
            builder.push(")");
        }
    }

    builder.push(" ORDER BY u.first_name, u.last_name, lp.id");
    builder
}

async fn run_lawyer_search(
    state: &AppState,
    params: &LawyerSearchParams,
    scope: SearchScope,
) -> ApiResult<Vec<LawyerProfileView>> {
    let profiles = lawyer_search_query(params, scope)
        .build_query_as::<LawyerProfile>()
        .fetch_all(&state.pool)
        .await?;
    debug!("Lawyer search {:?} matched {} profiles", scope, profiles.len());
    Ok(hydrate(&state.pool, profiles).await?)
}

pub async fn search_lawyers(
    State(state): State<AppState>,
    Query(params): Query<LawyerSearchParams>,
) -> ApiResult<Json<Vec<LawyerProfileView>>> {
    Ok(Json(run_lawyer_search(&state, &params, SearchScope::Approved).await?))
}

pub async fn search_by_category(
    State(state): State<AppState>,
    Query(params): Query<LawyerSearchParams>,
) -> ApiResult<Json<Vec<LawyerProfileView>>> {
    Ok(Json(run_lawyer_search(&state, &params, SearchScope::Category).await?))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSearchParams {
    pub query: Option<String>,
    pub categories: Vec<String>,
    pub days: Vec<String>,
    pub rating: Option<f64>,
    pub page: PageParamsRaw,
}

impl ProfileSearchParams {
    /// `categories` and `days` may repeat; empty values are dropped.
    pub fn from_query(raw: Option<&str>) -> ApiResult<Self> {
        let mut params = ProfileSearchParams::default();
        let Some(raw) = raw else {
            return Ok(params);
        };
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim().to_string();
            match key.as_ref() {
                "query" => params.query = Some(value).filter(|v| !v.is_empty()),
                "categories" if !value.is_empty() => params.categories.push(value),
                "days" if !value.is_empty() => params.days.push(value),
                "rating" if !value.is_empty() => {
                    let rating = value
                        .parse::<f64>()
                        .ok()
                        .filter(|r| r.is_finite())
                        .ok_or_else(|| ApiError::validation("rating", "A valid number is required."))?;
                    params.rating = Some(rating);
                }
                "page" => params.page.page = Some(value),
                "limit" => params.page.limit = Some(value),
                _ => {}
            }
        }
        Ok(params)
    }

    fn push_filters(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        builder.push(
            " FROM lawyer_profiles lp JOIN users u ON u.id = lp.user_id \
             JOIN addresses ad ON ad.id = lp.address_id WHERE lp.approved",
        );

        if let Some(query) = &self.query {
            let pattern = like_pattern(query);
            builder.push(" AND (u.first_name ILIKE ");
            builder.push_bind(pattern.clone());
            for column in ["ad.street", "ad.city", "ad.state", "ad.country"] {
                builder.push(format!(" OR {} ILIKE ", column));
                builder.push_bind(pattern.clone());
            }
            builder.push(")");
        }
        if !self.days.is_empty() {
            let days: Vec<String> = self.days.iter().map(|d| d.to_lowercase()).collect();
            builder.push(" AND EXISTS (SELECT 1 FROM time_slots ts WHERE ts.lawyer_id = lp.id AND LOWER(ts.day) = ANY(");
            builder.push_bind(days);
            builder.push("))");
        }
        if !self.categories.is_empty() {
            let categories: Vec<String> = self.categories.iter().map(|c| c.to_lowercase()).collect();
            builder.push(" AND LOWER(lp.specialization) = ANY(");
            builder.push_bind(categories);
            builder.push(")");
        }
        if let Some(rating) = self.rating {
            builder.push(format!(" AND {} >= ", RATING_EXPR));
            builder.push_bind(rating);
        }
    }

    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*)");
        self.push_filters(&mut builder);
        builder
    }

    pub fn page_query(&self, page: Page) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(
            "SELECT lp.id, lp.specialization, lp.phone_number, lp.bio, lp.address_id, \
             lp.language, lp.approved, lp.image, u.first_name, u.last_name, u.email",
        );
        self.push_filters(&mut builder);
        builder.push(format!(" ORDER BY {} DESC, lp.id LIMIT ", RATING_EXPR));
        builder.push_bind(page.size);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());
        builder
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileSearchResponse {
    pub search_results: Vec<LawyerProfileView>,
    pub num_pages: i64,
}

/// The first gallery image stands in for the profile picture.
fn with_cover_image(mut view: LawyerProfileView) -> LawyerProfileView {
    if let Some(cover) = view.images.iter().find_map(|i| i.image.clone()) {
        view.image = Some(cover);
    }
    view
}

pub async fn search_profiles(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<ProfileSearchResponse>> {
    let params = ProfileSearchParams::from_query(raw.as_deref())?;
    let page = Page::from_params(params.page.parse()?, state.config.page_size, state.config.max_page_size)?;

    let count: i64 = params
        .count_query()
        .build_query_scalar()
        .fetch_one(&state.pool)
        .await?;
    let num_pages = page.check_in_range(count)?;

    let profiles = params
        .page_query(page)
        .build_query_as::<LawyerProfile>()
        .fetch_all(&state.pool)
        .await?;
    debug!("Profile search matched {} lawyers, page {} of {}", count, page.number, num_pages);

    let search_results = hydrate(&state.pool, profiles)
        .await?
        .into_iter()
        .map(with_cover_image)
        .collect();
    Ok(Json(ProfileSearchResponse { search_results, num_pages }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LawyerImage;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cairo"), "%cairo%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn approved_scope_filters_on_approval() {
        let sql = lawyer_search_query(&LawyerSearchParams::default(), SearchScope::Approved)
            .sql()
            .to_string();
        assert!(sql.contains("AND lp.approved"));
        let sql = lawyer_search_query(&LawyerSearchParams::default(), SearchScope::Category)
            .sql()
            .to_string();
        assert!(!sql.contains("AND lp.approved"));
    }

    #[test]
    fn name_matches_first_or_last_name() {
        let params = LawyerSearchParams { name: Some("nour".into()), ..Default::default() };
        let builder = lawyer_search_query(&params, SearchScope::Approved);
        assert!(builder.sql().contains("(u.first_name ILIKE $1 OR u.last_name ILIKE $2)"));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let params = LawyerSearchParams { city: Some("   ".into()), ..Default::default() };
        let builder = lawyer_search_query(&params, SearchScope::Approved);
        assert!(!builder.sql().contains("ad.city ILIKE"));
    }

    #[test]
    fn category_scope_ignores_state_and_country() {
        let params = LawyerSearchParams {
            state: Some("Giza".into()),
            country: Some("Egypt".into()),
            ..Default::default()
        };
        let builder = lawyer_search_query(&params, SearchScope::Category);
        assert!(!builder.sql().contains("ad.state ILIKE"));
        assert!(!builder.sql().contains("ad.country ILIKE"));
    }

    #[test]
    fn every_search_term_must_match_some_column() {
        let params = LawyerSearchParams { search: Some("tax alexandria".into()), ..Default::default() };
        let builder = lawyer_search_query(&params, SearchScope::Category);
        let sql = builder.sql();
        assert_eq!(sql.matches(" AND (").count(), 2);
        assert!(sql.contains("$8"));
        assert!(!sql.contains("$9"));
    }

    #[test]
    fn repeated_keys_collect_and_blank_values_drop() {
        let params =
            ProfileSearchParams::from_query(Some("query=cairo&categories=Tax&categories=&categories=Family&days=monday&days=&rating=3.5&page=2"))
                .unwrap();
        assert_eq!(params.query.as_deref(), Some("cairo"));
        assert_eq!(params.categories, vec!["Tax".to_string(), "Family".to_string()]);
        assert_eq!(params.days, vec!["monday".to_string()]);
        assert_eq!(params.rating, Some(3.5));
        assert_eq!(params.page.parse().unwrap().page, Some(2));
    }

    #[test]
    fn empty_query_has_no_filters() {
        let params = ProfileSearchParams::from_query(None).unwrap();
        assert_eq!(params, ProfileSearchParams::default());
        let sql = params.count_query().sql().to_string();
        assert!(sql.ends_with("WHERE lp.approved"));
    }

    #[test]
    fn bad_rating_is_a_validation_error() {
        let err = ProfileSearchParams::from_query(Some("rating=high")).unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field, .. } if field == "rating"));
    }

    #[test]
    fn bad_page_is_invalid_but_bad_limit_is_ignored() {
        let params = ProfileSearchParams::from_query(Some("page=last&limit=lots")).unwrap();
        assert!(matches!(params.page.parse(), Err(ApiError::NotFound(_))));
        let params = ProfileSearchParams::from_query(Some("limit=lots")).unwrap();
        assert_eq!(params.page.parse().unwrap().limit, None);
    }

    #[test]
    fn page_query_orders_by_computed_rating() {
        let params = ProfileSearchParams {
            days: vec!["Monday".into()],
            categories: vec!["Tax".into()],
            rating: Some(4.0),
            ..Default::default()
        };
        let sql = params.page_query(Page { number: 2, size: 10 }).sql().to_string();
        assert!(sql.contains("LOWER(ts.day) = ANY($1)"));
        assert!(sql.contains("LOWER(lp.specialization) = ANY($2)"));
        assert!(sql.contains(&format!("{} >= $3", RATING_EXPR)));
        assert!(sql.contains(&format!("ORDER BY {} DESC, lp.id LIMIT $4 OFFSET $5", RATING_EXPR)));
    }

    #[test]
    fn cover_image_prefers_gallery() {
        let view = LawyerProfileView {
            id: 1,
            first_name: String::new(),
            last_name: String::new(),
            specialization: String::new(),
            phone_number: String::new(),
            bio: String::new(),
            language: String::new(),
            address: None,
            time_slots: Vec::new(),
            rating: 0.0,
            images: vec![
                LawyerImage { id: 4, image: None },
                LawyerImage { id: 5, image: Some("core/images/g.png".into()) },
            ],
            image: Some("core/images/profile.png".into()),
        };
        assert_eq!(with_cover_image(view.clone()).image.as_deref(), Some("core/images/g.png"));

        let bare = LawyerProfileView { images: Vec::new(), ..view };
        assert_eq!(with_cover_image(bare).image.as_deref(), Some("core/images/profile.png"));
    }
}
