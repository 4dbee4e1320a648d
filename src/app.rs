use crate::auth;
use crate::csrf;
use crate::handlers;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    let cistern_routes = Router::new()
        .route("/api/cisternas", get(handlers::list_cisterns).post(handlers::register_cistern))
        .route_layer(middleware::from_fn(auth::workers_only));

    let delivery_routes = Router::new()
        .route("/deliveries", get(handlers::deliveries_page))
        .route("/api/deliveries", get(handlers::list_deliveries).post(handlers::register_delivery))
        .route("/delete-delivery/:id/", post(handlers::delete_delivery))
        .route_layer(middleware::from_fn(auth::delivery_managers_only));

    let owner_routes = Router::new()
        .route("/api/control-manual", get(handlers::control_report))
        .route("/control-manual/exportar/", get(handlers::export_report))
        .route("/api/usuarios", get(handlers::list_users).post(handlers::create_user))
        .route_layer(middleware::from_fn(auth::owners_only));

    // POST routes here need the X-CSRFToken header; GETs pass through.
    let protected = Router::new()
        .route("/api/ventas/preview", post(handlers::preview_ledger))
        .route("/api/productos", get(handlers::list_products).post(handlers::create_product))
        .route("/api/productos/:id", post(handlers::update_product))
        .route("/productos/eliminar/:id/", post(handlers::delete_product))
        .route("/api/tasa", get(handlers::list_rates).post(handlers::register_rate))
        .route("/api/promos", get(handlers::list_promos).post(handlers::register_promo))
        .route("/promos/restar/:id/", post(handlers::take_promo_bottle))
        .merge(cistern_routes)
        .merge(delivery_routes)
        .merge(owner_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), csrf::require_token));

    // Everything past the login screen needs a session.
    let signed_in = Router::new()
        .route("/", get(handlers::dashboard_page))
        .route("/api/dashboard", get(handlers::get_dashboard))
        // The sale form checks its own token: header or hidden field.
        .route("/ventas/", get(handlers::sales_page).post(handlers::submit_sale))
        .route("/api/ventas/bootstrap", get(handlers::get_bootstrap))
        .merge(protected)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .route(auth::LOGIN_PATH, get(handlers::login_page).post(handlers::login_form))
        .route("/api/login", post(handlers::login_api))
        .route("/logout", get(handlers::logout).post(handlers::logout))
        .merge(signed_in)
        .with_state(state)
}
