//! CRUD genérico sobre as funções do repositório
//!
//! Cada entidade exposta na API implementa [`Recurso`] (listar, buscar, criar
//! e excluir) e, quando aceita edição, [`RecursoAtualizavel`]. Os handlers
//! genéricos checam a permissão derivada do método HTTP antes de chamar o
//! repositório.

use std::future::Future;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use common_db::DbError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::{codigo_permissao, Acao, UsuarioAutenticado};
use crate::error::ApiError;
use crate::estado::Estado;

pub trait Recurso: Send + Sync + 'static {
    type Entrada: DeserializeOwned + Send + 'static;
    type Saida: Serialize + Send + 'static;

    /// App dos códigos de permissão (`acessorios` ou `principais`)
    const APP: &'static str;
    /// Modelo nos códigos de permissão e segmento da URL
    const MODELO: &'static str;

    fn listar(pool: &SqlitePool) -> impl Future<Output = Result<Vec<Self::Saida>, DbError>> + Send;

    fn buscar(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<Self::Saida, DbError>> + Send;

    fn criar(
        pool: &SqlitePool,
        entrada: Self::Entrada,
    ) -> impl Future<Output = Result<Self::Saida, DbError>> + Send;

    fn excluir(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<(), DbError>> + Send;

    fn permissao(acao: Acao) -> String {
        codigo_permissao(Self::APP, acao, Self::MODELO)
    }
}

pub trait RecursoAtualizavel: Recurso {
    fn atualizar(
        pool: &SqlitePool,
        id: i64,
        entrada: Self::Entrada,
    ) -> impl Future<Output = Result<Self::Saida, DbError>> + Send;
}

fn autorizar<R: Recurso>(usuario: &UsuarioAutenticado, metodo: &Method) -> Result<(), ApiError> {
    usuario.exigir(&R::permissao(Acao::do_metodo(metodo)))
}

fn corpo<T>(corpo: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    corpo
        .map(|Json(valor)| valor)
        .map_err(|rejeicao| ApiError::RequisicaoInvalida(rejeicao.body_text()))
}

async fn listar<R: Recurso>(
    State(estado): State<Estado>,
    metodo: Method,
    usuario: UsuarioAutenticado,
) -> Result<Json<Vec<R::Saida>>, ApiError> {
    autorizar::<R>(&usuario, &metodo)?;
    Ok(Json(R::listar(&estado.pool).await?))
}

async fn buscar<R: Recurso>(
    State(estado): State<Estado>,
    metodo: Method,
    usuario: UsuarioAutenticado,
    Path(id): Path<i64>,
) -> Result<Json<R::Saida>, ApiError> {
    autorizar::<R>(&usuario, &metodo)?;
    Ok(Json(R::buscar(&estado.pool, id).await?))
}

async fn criar<R: Recurso>(
    State(estado): State<Estado>,
    metodo: Method,
    usuario: UsuarioAutenticado,
    entrada: Result<Json<R::Entrada>, JsonRejection>,
) -> Result<(StatusCode, Json<R::Saida>), ApiError> {
    autorizar::<R>(&usuario, &metodo)?;
    let criado = R::criar(&estado.pool, corpo(entrada)?).await?;
    Ok((StatusCode::CREATED, Json(criado)))
}

async fn atualizar<R: RecursoAtualizavel>(
    State(estado): State<Estado>,
    metodo: Method,
    usuario: UsuarioAutenticado,
    Path(id): Path<i64>,
    entrada: Result<Json<R::Entrada>, JsonRejection>,
) -> Result<Json<R::Saida>, ApiError> {
    autorizar::<R>(&usuario, &metodo)?;
    Ok(Json(R::atualizar(&estado.pool, id, corpo(entrada)?).await?))
}

async fn excluir<R: Recurso>(
    State(estado): State<Estado>,
    metodo: Method,
    usuario: UsuarioAutenticado,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    autorizar::<R>(&usuario, &metodo)?;
    R::excluir(&estado.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn caminhos<R: Recurso>() -> (String, String) {
    (
        format!("/api/v1/{}/", R::MODELO),
        format!("/api/v1/{}/:id/", R::MODELO),
    )
}

/// Rotas sem edição: listar, criar, buscar e excluir
pub fn rotas_somente_leitura<R: Recurso>(router: Router<Estado>) -> Router<Estado> {
    let (colecao, item) = caminhos::<R>();
    router
        .route(&colecao, get(listar::<R>).post(criar::<R>))
        .route(&item, get(buscar::<R>).delete(excluir::<R>))
}

/// Rotas completas; PATCH tem o mesmo efeito de PUT
pub fn rotas<R: RecursoAtualizavel>(router: Router<Estado>) -> Router<Estado> {
    let (colecao, item) = caminhos::<R>();
    router.route(&colecao, get(listar::<R>).post(criar::<R>)).route(
        &item,
        get(buscar::<R>)
            .put(atualizar::<R>)
            .patch(atualizar::<R>)
            .delete(excluir::<R>),
    )
}
