//! API JSON: CRUD das entidades, emissão de token e valor da sessão

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common_db::DbError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::auth::{self, UsuarioAutenticado};
use crate::build_info;
use crate::error::ApiError;
use crate::estado::Estado;

pub mod recurso;
pub mod recursos;

use recurso::{rotas, rotas_somente_leitura};
use recursos::*;

pub fn router() -> Router<Estado> {
    let mut router = Router::new()
        .route("/health", get(saude))
        .route("/api/v1/auth/token/", post(emitir_token))
        .route("/api/pacientes/:id/valor_sessao/", get(valor_sessao));

    router = rotas::<Abordagem>(router);
    router = rotas::<Captacao>(router);
    router = rotas::<Clinica>(router);
    router = rotas::<Modalidade>(router);
    router = rotas::<Nucleo>(router);
    router = rotas::<Setor>(router);
    router = rotas::<AssociadoRecurso>(router);
    router = rotas::<TerapeutaRecurso>(router);
    router = rotas::<PacienteRecurso>(router);
    router = rotas::<ConsultaRecurso>(router);
    router = rotas_somente_leitura::<AvaliacaoRecurso>(router);
    router = rotas_somente_leitura::<AltaDesistenciaRecurso>(router);
    router = rotas::<MatchRecurso>(router);
    rotas::<SelecaoRecurso>(router)
}

async fn saude() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "versao": build_info::PKG_VERSION,
    }))
}

#[derive(Debug, Deserialize)]
pub struct Credenciais {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenEmitido {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

async fn emitir_token(
    State(estado): State<Estado>,
    corpo: Result<Json<Credenciais>, JsonRejection>,
) -> Result<Json<TokenEmitido>, ApiError> {
    let Json(credenciais) =
        corpo.map_err(|rejeicao| ApiError::RequisicaoInvalida(rejeicao.body_text()))?;
    let usuario = auth::autenticar(&estado.pool, &credenciais.username, &credenciais.password)
        .await?
        .ok_or(ApiError::NaoAutenticado)?;

    info!("Token emitido para {}", usuario.username);
    Ok(Json(TokenEmitido {
        access: estado.jwt.emitir(&usuario)?,
        token_type: "Bearer",
        expires_in: estado.jwt.ttl.num_seconds(),
    }))
}

/// Valor da sessão do paciente em reais inteiros, usado pelo formulário de consulta
async fn valor_sessao(
    State(estado): State<Estado>,
    usuario: UsuarioAutenticado,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.view_paciente")?;
    match common_db::repositorio::pacientes::valor_sessao(&estado.pool, id).await {
        Ok(valor) => Ok(Json(json!({ "vlr_sessao": valor.reais() })).into_response()),
        Err(DbError::NotFound(_)) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Paciente não encontrado" })),
        )
            .into_response()),
        Err(outro) => Err(outro.into()),
    }
}
