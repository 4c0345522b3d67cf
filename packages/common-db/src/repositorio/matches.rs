//! Pareamentos entre terapeuta e paciente

use sqlx::SqlitePool;
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado};
use crate::error::DbError;
use crate::models::{Match, MatchEntrada};

const SELECT_MATCH: &str = r#"
    SELECT m.id, m.terapeuta_id, m.paciente_id, m.data_consulta,
           a.nome AS terapeuta_nome, p.nome AS paciente_nome,
           m.created_at, m.updated_at
    FROM matches m
    JOIN terapeutas t ON t.id = m.terapeuta_id
    JOIN associados a ON a.id = t.associado_id
    JOIN pacientes p ON p.id = m.paciente_id
"#;

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Match>, DbError> {
    let sql = format!("{} ORDER BY m.data_consulta DESC, m.id DESC", SELECT_MATCH);
    Ok(sqlx::query_as::<_, Match>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Match, DbError> {
    let sql = format!("{} WHERE m.id = ?", SELECT_MATCH);
    sqlx::query_as::<_, Match>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("match", id))
}

pub async fn criar(pool: &SqlitePool, entrada: &MatchEntrada) -> Result<Match, DbError> {
    entrada.validate()?;
    let agora = agora();
    let id = sqlx::query(
        r#"
        INSERT INTO matches (terapeuta_id, paciente_id, data_consulta, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.terapeuta_id)
    .bind(entrada.paciente_id)
    .bind(entrada.data_consulta)
    .bind(agora)
    .bind(agora)
    .execute(pool)
    .await?
    .last_insert_rowid();
    buscar(pool, id).await
}

pub async fn atualizar(pool: &SqlitePool, id: i64, entrada: &MatchEntrada) -> Result<Match, DbError> {
    entrada.validate()?;
    let resultado = sqlx::query(
        r#"
        UPDATE matches SET terapeuta_id = ?, paciente_id = ?, data_consulta = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(entrada.terapeuta_id)
    .bind(entrada.paciente_id)
    .bind(entrada.data_consulta)
    .bind(agora())
    .bind(id)
    .execute(pool)
    .await?;
    exigir_afetado(resultado.rows_affected(), "match", id)?;
    buscar(pool, id).await
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM matches WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "match", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{data, pool_em_memoria, Cenario};

    #[tokio::test]
    async fn crud_de_match() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;

        let mut entrada = MatchEntrada {
            terapeuta_id: cenario.terapeuta,
            paciente_id: paciente,
            data_consulta: data("2024-05-02"),
        };
        let criado = criar(&pool, &entrada).await.unwrap();
        assert_eq!(criado.terapeuta_nome, "Teodoro Terapeuta");

        entrada.data_consulta = data("2024-05-09");
        let alterado = atualizar(&pool, criado.id, &entrada).await.unwrap();
        assert_eq!(alterado.data_consulta, data("2024-05-09"));

        excluir(&pool, criado.id).await.unwrap();
        assert!(matches!(buscar(&pool, criado.id).await, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn paciente_inexistente_viola_chave_estrangeira() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;

        let entrada = MatchEntrada {
            terapeuta_id: cenario.terapeuta,
            paciente_id: 999,
            data_consulta: data("2024-05-02"),
        };
        let erro = criar(&pool, &entrada).await.unwrap_err();
        assert!(matches!(erro, DbError::ConstraintViolation(_)));
    }
}
