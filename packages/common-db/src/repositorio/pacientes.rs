//! Pacientes atendidos pelas clínicas

use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado};
use crate::dinheiro::Centavos;
use crate::error::DbError;
use crate::models::{Paciente, PacienteEntrada};

const SELECT_PACIENTE: &str = r#"
    SELECT p.id, p.clinica_id, p.captacao_id, p.modalidade_id, p.nome, p.email, p.telefone,
           p.nome_contato_apoio, p.parentesco_contato_apoio, p.contato_apoio,
           p.data_nascimento, p.valor_sessao, p.is_active, p.observacao,
           c.nome AS clinica_nome, cp.nome AS captacao_nome, m.nome AS modalidade_nome,
           (SELECT COUNT(*) FROM consultas x WHERE x.paciente_id = p.id) AS total_consultas,
           p.created_at, p.updated_at
    FROM pacientes p
    JOIN clinicas c ON c.id = p.clinica_id
    JOIN captacoes cp ON cp.id = p.captacao_id
    JOIN modalidades m ON m.id = p.modalidade_id
"#;

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Paciente>, DbError> {
    let sql = format!("{} ORDER BY p.nome", SELECT_PACIENTE);
    Ok(sqlx::query_as::<_, Paciente>(&sql).fetch_all(pool).await?)
}

pub async fn listar_ativos(pool: &SqlitePool) -> Result<Vec<Paciente>, DbError> {
    let sql = format!("{} WHERE p.is_active = 1 ORDER BY p.nome", SELECT_PACIENTE);
    Ok(sqlx::query_as::<_, Paciente>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Paciente, DbError> {
    let sql = format!("{} WHERE p.id = ?", SELECT_PACIENTE);
    sqlx::query_as::<_, Paciente>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("paciente", id))
}

/// Valor combinado por sessão, usado para pré-preencher o formulário de consultas
pub async fn valor_sessao(pool: &SqlitePool, id: i64) -> Result<Centavos, DbError> {
    sqlx::query_scalar::<_, Centavos>("SELECT valor_sessao FROM pacientes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("paciente", id))
}

pub async fn criar(pool: &SqlitePool, entrada: &PacienteEntrada) -> Result<Paciente, DbError> {
    entrada.validate()?;
    let agora = agora();
    let id = sqlx::query(
        r#"
        INSERT INTO pacientes (clinica_id, captacao_id, modalidade_id, nome, email, telefone,
                               nome_contato_apoio, parentesco_contato_apoio, contato_apoio,
                               data_nascimento, valor_sessao, is_active, observacao,
                               created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.clinica_id)
    .bind(entrada.captacao_id)
    .bind(entrada.modalidade_id)
    .bind(entrada.nome.trim())
    .bind(&entrada.email)
    .bind(&entrada.telefone)
    .bind(&entrada.nome_contato_apoio)
    .bind(&entrada.parentesco_contato_apoio)
    .bind(&entrada.contato_apoio)
    .bind(entrada.data_nascimento)
    .bind(entrada.valor_sessao)
    .bind(entrada.is_active)
    .bind(&entrada.observacao)
    .bind(agora)
    .bind(agora)
    .execute(pool)
    .await?
    .last_insert_rowid();
    buscar(pool, id).await
}

pub async fn atualizar(
    pool: &SqlitePool,
    id: i64,
    entrada: &PacienteEntrada,
) -> Result<Paciente, DbError> {
    entrada.validate()?;
    let resultado = sqlx::query(
        r#"
        UPDATE pacientes
        SET clinica_id = ?, captacao_id = ?, modalidade_id = ?, nome = ?, email = ?,
            telefone = ?, nome_contato_apoio = ?, parentesco_contato_apoio = ?,
            contato_apoio = ?, data_nascimento = ?, valor_sessao = ?, is_active = ?,
            observacao = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(entrada.clinica_id)
    .bind(entrada.captacao_id)
    .bind(entrada.modalidade_id)
    .bind(entrada.nome.trim())
    .bind(&entrada.email)
    .bind(&entrada.telefone)
    .bind(&entrada.nome_contato_apoio)
    .bind(&entrada.parentesco_contato_apoio)
    .bind(&entrada.contato_apoio)
    .bind(entrada.data_nascimento)
    .bind(entrada.valor_sessao)
    .bind(entrada.is_active)
    .bind(&entrada.observacao)
    .bind(agora())
    .bind(id)
    .execute(pool)
    .await?;
    exigir_afetado(resultado.rows_affected(), "paciente", id)?;
    buscar(pool, id).await
}

/// Marca o paciente como inativo; devolve `false` se ele já estava inativo
pub async fn desativar(conn: &mut SqliteConnection, id: i64) -> Result<bool, DbError> {
    let resultado = sqlx::query(
        "UPDATE pacientes SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1",
    )
    .bind(agora())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    let alterado = resultado.rows_affected() > 0;
    if alterado {
        info!("Paciente {} desativado", id);
    }
    Ok(alterado)
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM pacientes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "paciente", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pool_em_memoria, Cenario};

    #[tokio::test]
    async fn valor_sessao_do_paciente() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let id = cenario.novo_paciente(&pool, "Paula", 12050).await;

        assert_eq!(valor_sessao(&pool, id).await.unwrap(), Centavos(12050));
        assert!(matches!(valor_sessao(&pool, 999).await, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn desativar_e_idempotente() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let id = cenario.novo_paciente(&pool, "Paula", 15000).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(desativar(&mut conn, id).await.unwrap());
        assert!(!desativar(&mut conn, id).await.unwrap());
        drop(conn);

        assert!(!buscar(&pool, id).await.unwrap().is_active);
        assert!(listar_ativos(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn valor_negativo_e_rejeitado() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let mut entrada = cenario.paciente_entrada("Paula", 15000);
        entrada.valor_sessao = Centavos(-1);

        let erro = criar(&pool, &entrada).await.unwrap_err();
        assert!(matches!(erro, DbError::Validacao(_)));
    }
}
