//! Tabelas auxiliares: captações, clínicas, modalidades, núcleos,
//! abordagens e setores
//!
//! Todas compartilham o mesmo formato de linha, então um único conjunto de
//! funções atende as seis, parametrizado por [`TabelaAcessorio`].

use sqlx::SqlitePool;
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado};
use crate::error::DbError;
use crate::models::{Acessorio, AcessorioEntrada};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabelaAcessorio {
    Captacao,
    Clinica,
    Modalidade,
    Nucleo,
    Abordagem,
    Setor,
}

impl TabelaAcessorio {
    pub const TODAS: [TabelaAcessorio; 6] = [
        TabelaAcessorio::Captacao,
        TabelaAcessorio::Clinica,
        TabelaAcessorio::Modalidade,
        TabelaAcessorio::Nucleo,
        TabelaAcessorio::Abordagem,
        TabelaAcessorio::Setor,
    ];

    pub fn tabela(self) -> &'static str {
        match self {
            TabelaAcessorio::Captacao => "captacoes",
            TabelaAcessorio::Clinica => "clinicas",
            TabelaAcessorio::Modalidade => "modalidades",
            TabelaAcessorio::Nucleo => "nucleos",
            TabelaAcessorio::Abordagem => "abordagens",
            TabelaAcessorio::Setor => "setores",
        }
    }

    /// Nome do modelo usado nos códigos de permissão (`acessorios.view_clinica`)
    pub fn modelo(self) -> &'static str {
        match self {
            TabelaAcessorio::Captacao => "captacao",
            TabelaAcessorio::Clinica => "clinica",
            TabelaAcessorio::Modalidade => "modalidade",
            TabelaAcessorio::Nucleo => "nucleo",
            TabelaAcessorio::Abordagem => "abordagem",
            TabelaAcessorio::Setor => "setor",
        }
    }

    pub fn max_nome(self) -> usize {
        match self {
            TabelaAcessorio::Clinica | TabelaAcessorio::Modalidade => 10,
            TabelaAcessorio::Nucleo => 30,
            _ => 255,
        }
    }

    fn validar(self, entrada: &AcessorioEntrada) -> Result<(), DbError> {
        entrada.validate()?;
        let max = self.max_nome();
        if entrada.nome.chars().count() > max {
            return Err(DbError::campo(
                "nome",
                format!("Certifique-se de que o nome tenha no máximo {} caracteres.", max),
            ));
        }
        Ok(())
    }
}

pub async fn listar(pool: &SqlitePool, tabela: TabelaAcessorio) -> Result<Vec<Acessorio>, DbError> {
    let sql = format!(
        "SELECT id, nome, is_active, created_at, updated_at FROM {} ORDER BY nome",
        tabela.tabela()
    );
    let linhas = sqlx::query_as::<_, Acessorio>(&sql).fetch_all(pool).await?;
    Ok(linhas)
}

pub async fn listar_ativos(
    pool: &SqlitePool,
    tabela: TabelaAcessorio,
) -> Result<Vec<Acessorio>, DbError> {
    let sql = format!(
        "SELECT id, nome, is_active, created_at, updated_at FROM {} WHERE is_active = 1 ORDER BY nome",
        tabela.tabela()
    );
    let linhas = sqlx::query_as::<_, Acessorio>(&sql).fetch_all(pool).await?;
    Ok(linhas)
}

pub async fn buscar(pool: &SqlitePool, tabela: TabelaAcessorio, id: i64) -> Result<Acessorio, DbError> {
    let sql = format!(
        "SELECT id, nome, is_active, created_at, updated_at FROM {} WHERE id = ?",
        tabela.tabela()
    );
    sqlx::query_as::<_, Acessorio>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado(tabela.modelo(), id))
}

pub async fn criar(
    pool: &SqlitePool,
    tabela: TabelaAcessorio,
    entrada: &AcessorioEntrada,
) -> Result<Acessorio, DbError> {
    tabela.validar(entrada)?;
    let agora = agora();
    let sql = format!(
        "INSERT INTO {} (nome, is_active, created_at, updated_at) VALUES (?, ?, ?, ?)",
        tabela.tabela()
    );
    let id = sqlx::query(&sql)
        .bind(entrada.nome.trim())
        .bind(entrada.is_active)
        .bind(agora)
        .bind(agora)
        .execute(pool)
        .await?
        .last_insert_rowid();
    buscar(pool, tabela, id).await
}

pub async fn atualizar(
    pool: &SqlitePool,
    tabela: TabelaAcessorio,
    id: i64,
    entrada: &AcessorioEntrada,
) -> Result<Acessorio, DbError> {
    tabela.validar(entrada)?;
    let sql = format!(
        "UPDATE {} SET nome = ?, is_active = ?, updated_at = ? WHERE id = ?",
        tabela.tabela()
    );
    let resultado = sqlx::query(&sql)
        .bind(entrada.nome.trim())
        .bind(entrada.is_active)
        .bind(agora())
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), tabela.modelo(), id)?;
    buscar(pool, tabela, id).await
}

pub async fn excluir(pool: &SqlitePool, tabela: TabelaAcessorio, id: i64) -> Result<(), DbError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", tabela.tabela());
    let resultado = sqlx::query(&sql).bind(id).execute(pool).await?;
    exigir_afetado(resultado.rows_affected(), tabela.modelo(), id)
}
