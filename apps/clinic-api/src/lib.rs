//! Clinic API - gestão clínica Allos
//!
//! Reúne a API JSON, as páginas HTML (login, consultas, altas, matches), o
//! painel de métricas, os relatórios e os comandos administrativos sobre o
//! banco compartilhado do `common-db`.

use axum::http::{header, Method};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod comandos;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod estado;
pub mod importacao;
pub mod paginas;
pub mod relatorios;

#[cfg(test)]
mod testes;

pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

use estado::Estado;

/// Todas as rotas com o estado aplicado
pub fn app(estado: Estado) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .merge(api::router().layer(cors))
        .merge(paginas::router())
        .merge(dashboard::router())
        .merge(relatorios::router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(estado)
}
