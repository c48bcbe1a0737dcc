use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::AppState;
use crate::handlers::{auth, cars, organizations, rides, users};
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::user_rate_limit::create_user_governor;

pub fn create_router(state: AppState) -> Router {
    // IP keyed limits for the unauthenticated surface
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(create_public_governor());

    let user_routes = Router::new()
        .route("/", get(users::me).patch(users::update_profile))
        .route("/driver", get(users::am_i_driver))
        .route("/rate", put(users::rate_user))
        .route("/{id}", get(users::user_info));

    let car_routes = Router::new().route(
        "/",
        get(cars::list_cars).put(cars::create_car).post(cars::update_car),
    );

    let organization_routes = Router::new()
        .route(
            "/",
            get(organizations::list_organizations).put(organizations::create_organization),
        )
        .route("/my", get(organizations::my_organizations))
        .route("/nearest", get(organizations::nearest_organizations))
        .route("/search", get(organizations::search_organizations))
        .route("/join", post(organizations::join_organization))
        .route("/leave", post(organizations::leave_organization))
        .route(
            "/{id}",
            get(organizations::get_organization)
                .post(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route("/{id}/members", get(organizations::organization_members))
        .route("/{id}/question", get(organizations::control_question));

    let ride_routes = Router::new()
        .route("/", put(rides::create_ride))
        .route("/match", get(rides::match_rides))
        .route("/my", get(rides::my_rides))
        .route("/join", post(rides::join_ride))
        .route("/finish", post(rides::finish_ride))
        .route("/cancel", post(rides::cancel_ride))
        .route("/rate", put(rides::rate_ride))
        .route("/request/my", get(rides::my_requests))
        .route("/request/accept", post(rides::accept_request))
        .route("/request/decline", post(rides::decline_request))
        .route("/{id}", get(rides::get_ride))
        .route("/{id}/passengers", get(rides::ride_passengers))
        .route("/{id}/requests", get(rides::ride_requests));

    // Everything else needs a bearer token; the per user limiter keys on its subject
    let protected_routes = Router::new()
        .nest("/user", user_routes)
        .nest("/car", car_routes)
        .nest("/organization", organization_routes)
        .nest("/ride", ride_routes)
        .layer(create_user_governor())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .with_state(state)
}
