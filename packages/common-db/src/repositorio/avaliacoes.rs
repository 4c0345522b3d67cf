//! Avaliações periódicas respondidas pelos pacientes

use sqlx::SqlitePool;
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado};
use crate::error::DbError;
use crate::models::{Avaliacao, AvaliacaoEntrada};

const SELECT_AVALIACAO: &str = r#"
    SELECT v.id, v.terapeuta_id, v.paciente_id, v.data_consulta, v.consentimento_paciente,
           v.individual, v.interpessoal, v.social, v.geral, v.qualidade_geral,
           v.continuar_terapeuta, v.continuar_allos, v.momento,
           a.nome AS terapeuta_nome, p.nome AS paciente_nome,
           v.created_at, v.updated_at
    FROM avaliacoes v
    JOIN terapeutas t ON t.id = v.terapeuta_id
    JOIN associados a ON a.id = t.associado_id
    JOIN pacientes p ON p.id = v.paciente_id
"#;

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Avaliacao>, DbError> {
    let sql = format!("{} ORDER BY v.data_consulta DESC, v.id DESC", SELECT_AVALIACAO);
    Ok(sqlx::query_as::<_, Avaliacao>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Avaliacao, DbError> {
    let sql = format!("{} WHERE v.id = ?", SELECT_AVALIACAO);
    sqlx::query_as::<_, Avaliacao>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("avaliação", id))
}

pub async fn criar(pool: &SqlitePool, entrada: &AvaliacaoEntrada) -> Result<Avaliacao, DbError> {
    entrada.validate()?;
    let agora = agora();
    let id = sqlx::query(
        r#"
        INSERT INTO avaliacoes (terapeuta_id, paciente_id, data_consulta, consentimento_paciente,
                                individual, interpessoal, social, geral, qualidade_geral,
                                continuar_terapeuta, continuar_allos, momento,
                                created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.terapeuta_id)
    .bind(entrada.paciente_id)
    .bind(entrada.data_consulta)
    .bind(entrada.consentimento_paciente.unwrap_or(false))
    .bind(entrada.individual)
    .bind(entrada.interpessoal)
    .bind(entrada.social)
    .bind(entrada.geral)
    .bind(entrada.qualidade_geral)
    .bind(entrada.continuar_terapeuta)
    .bind(entrada.continuar_allos)
    .bind(entrada.momento)
    .bind(agora)
    .bind(agora)
    .execute(pool)
    .await?
    .last_insert_rowid();
    buscar(pool, id).await
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM avaliacoes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "avaliação", id)
}
