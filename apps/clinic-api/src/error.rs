//! Erros da API com corpo JSON estruturado

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_db::{DbError, ErrosCampos};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CorpoErro {
    pub error: DetalheErro,
}

#[derive(Debug, Serialize)]
pub struct DetalheErro {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campos: Option<ErrosCampos>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Autenticação necessária")]
    NaoAutenticado,
    #[error("Token expirado")]
    TokenExpirado,
    #[error("Permissão necessária: {0}")]
    SemPermissao(String),
    #[error("Não encontrado: {0}")]
    NaoEncontrado(String),
    #[error("Dados inválidos: {0}")]
    Validacao(ErrosCampos),
    #[error("Requisição inválida: {0}")]
    RequisicaoInvalida(String),
    #[error("Conflito: {0}")]
    Conflito(String),
    #[error("Erro interno: {0}")]
    Interno(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NaoAutenticado | ApiError::TokenExpirado => StatusCode::UNAUTHORIZED,
            ApiError::SemPermissao(_) => StatusCode::FORBIDDEN,
            ApiError::NaoEncontrado(_) => StatusCode::NOT_FOUND,
            ApiError::Validacao(_) | ApiError::RequisicaoInvalida(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflito(_) => StatusCode::CONFLICT,
            ApiError::Interno(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, campos) = match self {
            ApiError::NaoAutenticado => (
                "AUTH_REQUIRED",
                "As credenciais de autenticação não foram fornecidas.".to_string(),
                None,
            ),
            ApiError::TokenExpirado => (
                "TOKEN_EXPIRED",
                "Token expirado, autentique-se novamente.".to_string(),
                None,
            ),
            ApiError::SemPermissao(codigo) => (
                "PERMISSION_DENIED",
                format!("Você não tem permissão para executar essa ação ({}).", codigo),
                None,
            ),
            ApiError::NaoEncontrado(detalhe) => ("NOT_FOUND", detalhe, None),
            ApiError::Validacao(erros) => (
                "VALIDATION_ERROR",
                "Verifique os campos informados.".to_string(),
                Some(erros),
            ),
            ApiError::RequisicaoInvalida(detalhe) => ("BAD_REQUEST", detalhe, None),
            ApiError::Conflito(detalhe) => {
                tracing::debug!(detalhe, "Violação de restrição");
                (
                    "CONFLICT",
                    "O registro viola uma restrição de unicidade ou integridade.".to_string(),
                    None,
                )
            }
            ApiError::Interno(detalhe) => {
                tracing::error!(detalhe, "Erro interno na API");
                (
                    "INTERNAL",
                    "Ocorreu um erro interno.".to_string(),
                    None,
                )
            }
        };

        let corpo = CorpoErro {
            error: DetalheErro {
                code,
                message,
                campos,
            },
        };
        (status, Json(corpo)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(erro: DbError) -> Self {
        match erro {
            DbError::NotFound(detalhe) => ApiError::NaoEncontrado(detalhe),
            DbError::Validacao(erros) => ApiError::Validacao(erros),
            DbError::ConstraintViolation(detalhe) => ApiError::Conflito(detalhe),
            outro => ApiError::Interno(outro.to_string()),
        }
    }
}
