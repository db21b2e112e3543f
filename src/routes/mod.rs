pub mod applications;
pub mod crud;
pub mod files;
pub mod groups;
pub mod payments;
pub mod reports;
pub mod students;

use std::sync::Arc;

use axum::body::HttpBody;
use axum::extract::{FromRequest, Query, RequestParts};
use axum::handler::Handler;
use axum::routing::{delete, get, patch, post};
use axum::{BoxError, Extension, Json, Router};
use serde::de::DeserializeOwned;
use tower_http::cors::{Any, CorsLayer};

use crate::auth;
use crate::config::Config;
use crate::err;
use crate::models::{
    Application, Blog, Course, Enrollment, Group, Student, Teacher, Vacancy, VacancyApplication,
};
use crate::record::Record;
use crate::store::SharedStore;
use crate::Error;

/// JSON request body. Malformed or mistyped bodies are a ValidationFailure.
pub struct Body<T>(pub T);

#[axum::async_trait]
impl<T, B> FromRequest<B> for Body<T>
where
    T: DeserializeOwned + Send,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(Error::invalid(rejection.to_string())),
        }
    }
}

/// Query string parameters, rejected the same way as [`Body`].
pub struct Params<T>(pub T);

#[axum::async_trait]
impl<T, B> FromRequest<B> for Params<T>
where
    T: DeserializeOwned + Send,
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request(req).await {
            Ok(Query(value)) => Ok(Params(value)),
            Err(rejection) => Err(Error::invalid(rejection.to_string())),
        }
    }
}

/// `GET|POST /{base}/` and `GET|PUT|PATCH|DELETE /{base}/:id`.
fn resource<R: Record>(router: Router, base: &str) -> Router {
    router
        .route(
            &format!("/{}/", base),
            get(crud::list::<R>).post(crud::create::<R>),
        )
        .route(
            &format!("/{}/:id", base),
            get(crud::read::<R>)
                .put(crud::replace::<R>)
                .patch(crud::patch::<R>)
                .delete(crud::remove::<R>),
        )
}

pub fn app(store: SharedStore, config: Arc<Config>) -> Router {
    let router = resource::<Course>(Router::new(), "courses");
    let router = resource::<Teacher>(router, "teachers");
    let router = resource::<Group>(router, "groups");
    let router = resource::<Enrollment>(router, "enrollments");
    let router = resource::<Vacancy>(router, "vacancies");
    let router = resource::<Blog>(router, "blogs");

    router
        .route(
            "/applications/",
            get(crud::list::<Application>).post(applications::intake),
        )
        .route(
            "/applications/:id",
            get(crud::read::<Application>)
                .put(applications::replace)
                .patch(applications::patch)
                .delete(crud::remove::<Application>),
        )
        .route(
            "/applications/:id/:action",
            post(applications::action).patch(applications::status),
        )
        .route(
            "/vacancy-applications/",
            get(crud::list::<VacancyApplication>).post(applications::apply_for_vacancy),
        )
        .route(
            "/vacancy-applications/:id",
            get(crud::read::<VacancyApplication>)
                .put(crud::replace::<VacancyApplication>)
                .patch(crud::patch::<VacancyApplication>)
                .delete(crud::remove::<VacancyApplication>),
        )
        .route(
            "/vacancy-applications/:id/:action",
            post(applications::vacancy_action).patch(applications::vacancy_status),
        )
        .route(
            "/students/",
            get(crud::list::<Student>).post(students::create),
        )
        .route(
            "/students/:id",
            get(crud::read::<Student>)
                .put(crud::replace::<Student>)
                .patch(crud::patch::<Student>)
                .delete(students::remove),
        )
        .route("/groups/:id/students", get(groups::members))
        .route(
            "/groups/:id/students/:student_id",
            post(groups::add_member).delete(groups::remove_member),
        )
        .route(
            "/group-students/",
            get(groups::relations).post(groups::add_relation),
        )
        .route(
            "/group-students/:key",
            get(groups::relation).delete(groups::remove_relation),
        )
        .route("/group-students/:key/:id", get(groups::relations_by))
        .route(
            "/group-students/:key/:id/:scope/:student_id",
            delete(groups::remove_pair),
        )
        .route("/contracts/", get(students::contracts))
        .route(
            "/contracts/:id",
            patch(students::update_contract).delete(students::delete_contract),
        )
        .route("/payments/", get(payments::list).post(payments::record))
        .route("/payments/:key", get(payments::read))
        .route("/payments/:key/:id/:view", get(payments::student_view))
        .route("/dashboard/stats/", get(reports::stats))
        .route("/dashboard/monthly", get(reports::monthly))
        .route("/dashboard/courses/", get(reports::courses))
        .route("/search/", get(reports::search))
        .route("/export/:kind/", get(reports::export))
        .route("/auth/login/", post(auth::login))
        .route("/auth/logout/", post(auth::logout))
        .route("/auth/me/", get(auth::me))
        .route("/upload/", post(files::upload))
        .route("/uploads/:name", get(files::serve))
        .route("/health", get(files::health))
        .fallback(err::handler404.into_service())
        .layer(Extension(store))
        .layer(Extension(config))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
