//! Definições de erro para a biblioteca common-db
//!
//! Este módulo define os tipos de erro usados pela biblioteca

use std::collections::BTreeMap;

use thiserror::Error;
use validator::ValidationErrors;

/// Mensagens de validação agrupadas por campo.
///
/// Erros que não pertencem a um campo específico ficam na chave `__all__`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ErrosCampos(pub BTreeMap<String, Vec<String>>);

impl ErrosCampos {
    pub const GERAL: &'static str = "__all__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn adicionar(&mut self, campo: &str, mensagem: impl Into<String>) {
        self.0
            .entry(campo.to_string())
            .or_default()
            .push(mensagem.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn campo(&self, campo: &str) -> Option<&[String]> {
        self.0.get(campo).map(Vec::as_slice)
    }

    /// Converte em `Err(DbError::Validacao)` quando houver mensagens
    pub fn into_result(self) -> Result<(), DbError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DbError::Validacao(self))
        }
    }
}

impl std::fmt::Display for ErrosCampos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let partes: Vec<String> = self
            .0
            .iter()
            .map(|(campo, msgs)| format!("{}: {}", campo, msgs.join(" ")))
            .collect();
        write!(f, "{}", partes.join("; "))
    }
}

impl From<ValidationErrors> for ErrosCampos {
    fn from(errors: ValidationErrors) -> Self {
        let mut erros = ErrosCampos::new();
        for (campo, lista) in errors.field_errors() {
            let campo = if campo == "__all__" { Self::GERAL } else { campo };
            for erro in lista {
                let mensagem = erro
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Valor inválido ({}).", erro.code));
                erros.adicionar(campo, mensagem);
            }
        }
        erros
    }
}

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de migração: {0}")]
    MigrationError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Dados inválidos: {0}")]
    Validacao(ErrosCampos),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

impl DbError {
    /// Atalho para um erro de validação em um único campo
    pub fn campo(campo: &str, mensagem: impl Into<String>) -> Self {
        let mut erros = ErrosCampos::new();
        erros.adicionar(campo, mensagem);
        DbError::Validacao(erros)
    }
}

impl From<ValidationErrors> for DbError {
    fn from(errors: ValidationErrors) -> Self {
        DbError::Validacao(errors.into())
    }
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                // SQLITE_CONSTRAINT e códigos estendidos (UNIQUE, CHECK, FOREIGN KEY)
                if let Some(code) = dbe.code() {
                    let code = code.as_ref();
                    if code == "23000" || code == "19" || code == "2067" || code == "275" || code == "787" || code == "1555" {
                        return DbError::ConstraintViolation(dbe.message().to_string());
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_vira_not_found() {
        let erro: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(erro, DbError::NotFound(_)));
    }

    #[test]
    fn erros_campos_acumula_mensagens() {
        let mut erros = ErrosCampos::new();
        erros.adicionar("cpf", "CPF inválido.");
        erros.adicionar("cpf", "Outro problema.");
        erros.adicionar(ErrosCampos::GERAL, "Formulário inválido.");

        assert_eq!(erros.campo("cpf").map(|m| m.len()), Some(2));
        assert!(erros.clone().into_result().is_err());
        assert!(ErrosCampos::new().into_result().is_ok());
    }
}
