//! Funções explícitas de acesso a dados, uma submódulo por entidade
//!
//! Todas as funções recebem o pool (ou uma conexão, quando precisam
//! participar de uma transação maior) e devolvem `DbError`.

use chrono::{DateTime, Utc};

use crate::error::DbError;

pub mod acessorios;
pub mod altas;
pub mod associados;
pub mod avaliacoes;
pub mod consultas;
pub mod matches;
pub mod pacientes;
pub mod selecoes;
pub mod terapeutas;
pub mod usuarios;

/// Momento atual usado em `created_at`/`updated_at`
pub(crate) fn agora() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn nao_encontrado(entidade: &str, id: i64) -> DbError {
    DbError::NotFound(format!("{} {} não encontrado(a)", entidade, id))
}

/// Confirma que um DELETE/UPDATE atingiu alguma linha
pub(crate) fn exigir_afetado(linhas: u64, entidade: &str, id: i64) -> Result<(), DbError> {
    if linhas == 0 {
        Err(nao_encontrado(entidade, id))
    } else {
        Ok(())
    }
}
