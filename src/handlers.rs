use crate::auth::{self, jwt, AuthContext};
use crate::bootstrap::{Catalog, PagePayload};
use crate::csrf;
use crate::errors::AppError;
use crate::export;
use crate::ledger::{LedgerView, SaleLedger};
use crate::models::{
    AppData, CisternInput, CisternIntake, CisternQuery, ControlReport, DashboardResponse, Delivery, DeliveryInput,
    ExchangeRateRecord, LedgerPreviewInput, LoginRequest, LoginResponse, ProductInput, ProductRecord,
    PromoDecrementResponse, Promotion, PromotionInput, RangeQuery, RateInput, RegisterUserRequest, SaleForm,
    SaleReceipt, SearchQuery, UserRecord, UserView,
};
use crate::promos::{self, PromoError};
use crate::sales::{self, SaleDraft};
use crate::state::AppState;
use crate::stats;
use crate::storage::persist_data;
use crate::ui;
use crate::users::{self, UserError};
use crate::{cisterns, deliveries, products, rates};
use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Locks the store and applies `change` to a copy. The copy replaces the store only
/// once it is written to disk, so a failed write changes nothing.
async fn mutate<T, E>(state: &AppState, change: impl FnOnce(&mut AppData) -> Result<T, E>) -> Result<T, AppError>
where
    AppError: From<E>,
{
    let mut data = state.data.lock().await;
    let mut draft = data.clone();
    let value = change(&mut draft)?;
    persist_data(&state.data_path, &draft).await?;
    *data = draft;
    Ok(value)
}

fn page(state: &AppState, html: String) -> Response {
    let mut response = Html(html).into_response();
    if let Some((name, value)) = csrf::cookie_header(&state.csrf_token) {
        response.headers_mut().insert(name, value);
    }
    response
}

pub async fn health() -> &'static str {
    "ok"
}

// ---- sessions ----

pub async fn login_page(State(state): State<AppState>) -> Response {
    page(&state, ui::render_login(None))
}

/// Checks the password off the async runtime and signs a session token.
async fn sign_in(state: &AppState, request: LoginRequest) -> Result<(UserRecord, String), AppError> {
    let user = {
        let data = state.data.lock().await;
        users::find_by_username(&data, &request.username).cloned()
    }
    .ok_or(UserError::InvalidCredentials)?;

    let candidate = user.clone();
    tokio::task::spawn_blocking(move || users::check_password(&candidate, &request.password))
        .await
        .map_err(AppError::internal)??;

    let token = jwt::sign_token(user.id, user.role, &user.username, &state.jwt_secret)?;
    info!(user = %user.username, role = user.role.as_str(), "signed in");
    Ok((user, token))
}

pub async fn login_api(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (user, token) = sign_in(&state, request).await?;
    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in_seconds: jwt::expires_in_seconds(),
        username: user.username,
        role: user.role,
    }))
}

/// Wrong credentials re-render the form with a 401; success sets the session cookie.
pub async fn login_form(State(state): State<AppState>, Form(request): Form<LoginRequest>) -> Response {
    let username = request.username.clone();
    match sign_in(&state, request).await {
        Ok((_, token)) => {
            let mut response = Redirect::to("/").into_response();
            if let Some((name, value)) = auth::session_cookie(&token) {
                response.headers_mut().insert(name, value);
            }
            response
        }
        Err(err) if err.status == StatusCode::UNAUTHORIZED => {
            warn!(user = %username.trim(), "sign-in refused: {}", err.message);
            let mut response = page(&state, ui::render_login(Some(&err.message)));
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response
        }
        Err(err) => err.into_response(),
    }
}

pub async fn logout() -> impl IntoResponse {
    ([auth::clear_session_cookie()], Redirect::to(auth::LOGIN_PATH))
}

// ---- users ----

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserView>> {
    let data = state.data.lock().await;
    Json(users::list(&data))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    {
        let data = state.data.lock().await;
        users::validate(&data, &request)?;
    }
    let cost = state.bcrypt_cost;
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || users::hash_password(&password, cost))
        .await
        .map_err(AppError::internal)??;

    let user = mutate(&state, |data| {
        users::create(data, &request.username, password_hash, request.role, now())
    })
    .await?;
    info!(created_by = %auth.username, user = %user.username, role = user.role.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

// ---- dashboard ----

pub async fn dashboard_page(State(state): State<AppState>) -> Response {
    let dashboard = {
        let data = state.data.lock().await;
        stats::build_dashboard(&data)
    };
    page(&state, ui::render_dashboard(&dashboard))
}

pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let data = state.data.lock().await;
    Json(stats::build_dashboard(&data))
}

// ---- point of sale ----

pub async fn sales_page(State(state): State<AppState>) -> Response {
    let payload = {
        let data = state.data.lock().await;
        PagePayload::from_store(&data)
    };
    if let Some(warning) = &payload.warning {
        warn!("{warning}");
    }
    page(&state, ui::render_sales(&payload, &state.csrf_token))
}

pub async fn get_bootstrap(State(state): State<AppState>) -> Json<PagePayload> {
    let data = state.data.lock().await;
    Json(PagePayload::from_store(&data))
}

pub async fn preview_ledger(
    State(state): State<AppState>,
    Json(input): Json<LedgerPreviewInput>,
) -> Result<Json<LedgerView>, AppError> {
    let payload = {
        let data = state.data.lock().await;
        PagePayload::from_store(&data)
    };
    let catalog = Catalog::from_payload(&payload)?;
    let ledger = SaleLedger::from_parts(input.items, input.pagos);
    Ok(Json(ledger.view(&catalog)))
}

/// The sale form carries its token as a hidden field; scripts may send the header.
pub async fn submit_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Form(form): Form<SaleForm>,
) -> Result<(StatusCode, Json<SaleReceipt>), AppError> {
    let presented = csrf::header_token(&headers).or(form.csrfmiddlewaretoken.as_deref());
    if !csrf::token_matches(&state.csrf_token, presented) {
        warn!("sale form without a valid csrf token");
        return Err(csrf::rejection());
    }

    let draft = SaleDraft::parse(&form.items, &form.pagos)?;
    let receipt = mutate(&state, |data| sales::finalize(data, draft, &auth.username, now())).await?;
    info!(
        sale_id = receipt.id,
        user = %auth.username,
        total_ref = %receipt.total_ref,
        rate = %receipt.rate_used,
        "sale recorded"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

// ---- products ----

pub async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductRecord>> {
    let data = state.data.lock().await;
    Json(products::list(&data))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductRecord>), AppError> {
    let product = mutate(&state, |data| products::create(data, input, now())).await?;
    info!(code = %product.code, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ProductRecord>, AppError> {
    let product = mutate(&state, |data| products::update(data, id, input, now())).await?;
    Ok(Json(product))
}

pub async fn delete_product(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<ProductRecord>, AppError> {
    let product = mutate(&state, |data| products::delete(data, id)).await?;
    info!(code = %product.code, "product deleted");
    Ok(Json(product))
}

// ---- exchange rate ----

pub async fn list_rates(State(state): State<AppState>) -> Json<Vec<ExchangeRateRecord>> {
    let data = state.data.lock().await;
    Json(rates::recent(&data))
}

pub async fn register_rate(
    State(state): State<AppState>,
    Json(input): Json<RateInput>,
) -> Result<(StatusCode, Json<ExchangeRateRecord>), AppError> {
    let today = now().date();
    let record = mutate(&state, |data| rates::register(data, today, input.rate)).await?;
    info!(date = %record.date, rate = %record.rate, "exchange rate registered");
    Ok((StatusCode::CREATED, Json(record)))
}

// ---- cisterns ----

pub async fn list_cisterns(
    State(state): State<AppState>,
    Query(query): Query<CisternQuery>,
) -> Json<Vec<CisternIntake>> {
    let data = state.data.lock().await;
    Json(cisterns::list(&data, query.fecha))
}

pub async fn register_cistern(
    State(state): State<AppState>,
    Json(input): Json<CisternInput>,
) -> Result<(StatusCode, Json<CisternIntake>), AppError> {
    let intake = mutate(&state, |data| cisterns::register(data, input)).await?;
    info!(liters = %intake.liters_available, "cistern intake registered");
    Ok((StatusCode::CREATED, Json(intake)))
}

// ---- deliveries ----

pub async fn deliveries_page(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    let rows = {
        let data = state.data.lock().await;
        deliveries::search(&data, query.q.as_deref())
    };
    page(&state, ui::render_deliveries(&rows, query.q.as_deref().unwrap_or_default()))
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Delivery>> {
    let data = state.data.lock().await;
    Json(deliveries::search(&data, query.q.as_deref()))
}

pub async fn register_delivery(
    State(state): State<AppState>,
    Json(input): Json<DeliveryInput>,
) -> Result<(StatusCode, Json<Delivery>), AppError> {
    let delivery = mutate(&state, |data| deliveries::register(data, input, now())).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn delete_delivery(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Redirect, AppError> {
    mutate(&state, |data| deliveries::delete(data, id)).await?;
    info!(delivery_id = id, "delivery deleted");
    Ok(Redirect::to("/deliveries"))
}

// ---- promotions ----

pub async fn list_promos(State(state): State<AppState>) -> Json<Vec<Promotion>> {
    let data = state.data.lock().await;
    Json(promos::pending(&data))
}

pub async fn register_promo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<PromotionInput>,
) -> Result<(StatusCode, Json<Promotion>), AppError> {
    let promotion = mutate(&state, |data| promos::register(data, input, &auth.username, now())).await?;
    info!(promo_id = promotion.id, bottles = promotion.bottles_paid, "promotion registered");
    Ok((StatusCode::CREATED, Json(promotion)))
}

/// Unknown promotions are a 404; every other refusal is a 200 with `success: false`.
pub async fn take_promo_bottle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<u64>,
) -> Result<Json<PromoDecrementResponse>, AppError> {
    let mut data = state.data.lock().await;
    let mut draft = data.clone();
    match promos::take_bottle(&mut draft, id, &auth.username, now()) {
        Ok(remaining) => {
            persist_data(&state.data_path, &draft).await?;
            *data = draft;
            info!(promo_id = id, remaining, "promotion bottle handed out");
            Ok(Json(PromoDecrementResponse {
                success: true,
                botellas_restantes: Some(remaining),
                error: None,
            }))
        }
        Err(err @ PromoError::NotFound(_)) => Err(err.into()),
        Err(err) => {
            warn!(promo_id = id, "promotion bottle refused: {err}");
            Ok(Json(PromoDecrementResponse {
                success: false,
                botellas_restantes: None,
                error: Some(err.to_string()),
            }))
        }
    }
}

// ---- reports ----

pub async fn control_report(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<ControlReport> {
    let data = state.data.lock().await;
    Json(stats::build_report(&data, &query))
}

pub async fn export_report(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Response, AppError> {
    let range = stats::resolve_range(&query, stats::today());
    let body = {
        let data = state.data.lock().await;
        export::sales_csv(&data, &range).map_err(AppError::internal)?
    };
    let disposition = format!("attachment; filename=\"{}\"", export::file_name(&range));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Role;
    use chrono::NaiveTime;
    use rust_decimal::Decimal;
    use std::path::PathBuf;

    /// The data path is a directory, so every write fails.
    fn unwritable_state(name: &str, data: AppData) -> (AppState, PathBuf) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("water_pos_{name}_{}_{nanos}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config {
            port: 0,
            data_path: dir.clone(),
            csrf_token: "tok".into(),
            jwt_secret: "secret".into(),
            admin_username: "admin".into(),
            admin_password: None,
            bcrypt_cost: 4,
        };
        (AppState::new(&config, data), dir)
    }

    fn cashier() -> AuthContext {
        AuthContext {
            user_id: 1,
            username: "caja".into(),
            role: Role::Trabajador,
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_the_store_unchanged() {
        let (state, dir) = unwritable_state("failed_write", AppData::default());
        let input = DeliveryInput {
            customer_name: "Ana".into(),
            address: "Calle 1".into(),
            liters_delivered: Decimal::new(20, 0),
        };
        let status = register_delivery(State(state.clone()), Json(input))
            .await
            .err()
            .map(|err| err.status);
        assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));

        let data = state.data.lock().await;
        assert_eq!(data.deliveries.len(), 0);
        assert_eq!(data.next_id, 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn failed_write_keeps_the_promo_bottle() {
        let mut data = AppData::default();
        cisterns::register(
            &mut data,
            CisternInput {
                date: now().date(),
                time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                volume: Decimal::new(100, 0),
            },
        )
        .unwrap();
        let promo = promos::register(
            &mut data,
            PromotionInput {
                customer_name: "Luis".into(),
                phone: String::new(),
                amount_paid_ref: Decimal::new(9, 0),
                bottles_paid: 2,
            },
            "caja",
            now(),
        )
        .unwrap();
        let sales_before = data.sales.len();
        let (state, dir) = unwritable_state("failed_promo", data);

        let status = take_promo_bottle(State(state.clone()), Extension(cashier()), Path(promo.id))
            .await
            .err()
            .map(|err| err.status);
        assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));

        let data = state.data.lock().await;
        assert_eq!(data.promotions[0].bottles_taken, 0);
        assert_eq!(cisterns::current_level(&data), Decimal::new(100, 0));
        assert_eq!(data.sales.len(), sales_before);
        let _ = std::fs::remove_dir_all(dir);
    }
}
