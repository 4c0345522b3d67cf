//! Seleção: avaliação de associados feita por terapeutas

use sqlx::SqlitePool;
use validator::Validate;

use super::{exigir_afetado, nao_encontrado};
use crate::error::DbError;
use crate::models::{Selecao, SelecaoEntrada};

const SELECT_SELECAO: &str = r#"
    SELECT s.id, s.avaliador_id, s.avaliado_id, s.data_avaliacao,
           s.estagio_mudanca, s.estrutura, s.encerramento, s.acolhimento,
           s.seguranca_terapeuta, s.seguranca_metodo, s.aprofundar, s.hipoteses,
           s.interpretacao, s.frase_timing, s.corpo_setting, s.insight_potencia,
           a.nome AS avaliador_nome, v.nome AS avaliado_nome
    FROM selecoes s
    JOIN terapeutas t ON t.id = s.avaliador_id
    JOIN associados a ON a.id = t.associado_id
    JOIN associados v ON v.id = s.avaliado_id
"#;

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Selecao>, DbError> {
    let sql = format!("{} ORDER BY s.data_avaliacao DESC, s.id DESC", SELECT_SELECAO);
    Ok(sqlx::query_as::<_, Selecao>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Selecao, DbError> {
    let sql = format!("{} WHERE s.id = ?", SELECT_SELECAO);
    sqlx::query_as::<_, Selecao>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("seleção", id))
}

fn notas(entrada: &SelecaoEntrada) -> [i64; 12] {
    [
        entrada.estagio_mudanca,
        entrada.estrutura,
        entrada.encerramento,
        entrada.acolhimento,
        entrada.seguranca_terapeuta,
        entrada.seguranca_metodo,
        entrada.aprofundar,
        entrada.hipoteses,
        entrada.interpretacao,
        entrada.frase_timing,
        entrada.corpo_setting,
        entrada.insight_potencia,
    ]
}

pub async fn criar(pool: &SqlitePool, entrada: &SelecaoEntrada) -> Result<Selecao, DbError> {
    entrada.validate()?;
    let mut query = sqlx::query(
        r#"
        INSERT INTO selecoes (avaliador_id, avaliado_id, data_avaliacao,
                              estagio_mudanca, estrutura, encerramento, acolhimento,
                              seguranca_terapeuta, seguranca_metodo, aprofundar, hipoteses,
                              interpretacao, frase_timing, corpo_setting, insight_potencia)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.avaliador_id)
    .bind(entrada.avaliado_id)
    .bind(entrada.data_avaliacao);
    for nota in notas(entrada) {
        query = query.bind(nota);
    }
    let id = query.execute(pool).await?.last_insert_rowid();
    buscar(pool, id).await
}

pub async fn atualizar(
    pool: &SqlitePool,
    id: i64,
    entrada: &SelecaoEntrada,
) -> Result<Selecao, DbError> {
    entrada.validate()?;
    let mut query = sqlx::query(
        r#"
        UPDATE selecoes
        SET avaliador_id = ?, avaliado_id = ?, data_avaliacao = ?,
            estagio_mudanca = ?, estrutura = ?, encerramento = ?, acolhimento = ?,
            seguranca_terapeuta = ?, seguranca_metodo = ?, aprofundar = ?, hipoteses = ?,
            interpretacao = ?, frase_timing = ?, corpo_setting = ?, insight_potencia = ?
        WHERE id = ?
        "#,
    )
    .bind(entrada.avaliador_id)
    .bind(entrada.avaliado_id)
    .bind(entrada.data_avaliacao);
    for nota in notas(entrada) {
        query = query.bind(nota);
    }
    let resultado = query.bind(id).execute(pool).await?;
    exigir_afetado(resultado.rows_affected(), "seleção", id)?;
    buscar(pool, id).await
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM selecoes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "seleção", id)
}
