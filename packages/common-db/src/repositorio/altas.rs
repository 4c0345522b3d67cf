//! Altas e desistências
//!
//! Registrar uma alta ou desistência desativa o paciente na mesma transação.
//! Os registros não têm caminho de atualização.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info};
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado, pacientes};
use crate::error::DbError;
use crate::models::{AltaDesistencia, AltaDesistenciaEntrada};

const SELECT_ALTA: &str = r#"
    SELECT x.id, x.terapeuta_id, x.paciente_id, x.data_sessao, x.cancelador,
           x.motivo_cancelamento, x.momento, x.tipo,
           a.nome AS terapeuta_nome, p.nome AS paciente_nome,
           x.created_at, x.updated_at
    FROM altas_desistencias x
    JOIN terapeutas t ON t.id = x.terapeuta_id
    JOIN associados a ON a.id = t.associado_id
    JOIN pacientes p ON p.id = x.paciente_id
"#;

pub async fn listar(pool: &SqlitePool) -> Result<Vec<AltaDesistencia>, DbError> {
    let sql = format!("{} ORDER BY x.created_at DESC, x.id DESC", SELECT_ALTA);
    Ok(sqlx::query_as::<_, AltaDesistencia>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<AltaDesistencia, DbError> {
    let sql = format!("{} WHERE x.id = ?", SELECT_ALTA);
    sqlx::query_as::<_, AltaDesistencia>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("alta/desistência", id))
}

/// Grava o registro e desativa o paciente, tudo na mesma transação
pub async fn registrar_alta(
    pool: &SqlitePool,
    entrada: &AltaDesistenciaEntrada,
) -> Result<AltaDesistencia, DbError> {
    entrada.validate()?;

    let agora = agora();
    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        r#"
        INSERT INTO altas_desistencias (terapeuta_id, paciente_id, data_sessao, cancelador,
                                        motivo_cancelamento, momento, tipo,
                                        created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.terapeuta_id)
    .bind(entrada.paciente_id)
    .bind(entrada.data_sessao)
    .bind(entrada.cancelador)
    .bind(&entrada.motivo_cancelamento)
    .bind(entrada.momento)
    .bind(entrada.tipo)
    .bind(agora)
    .bind(agora)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    desativar_paciente_por_alta(&mut tx, entrada.terapeuta_id, entrada.paciente_id).await?;
    tx.commit().await?;

    buscar(pool, id).await
}

/// Desativa o paciente de uma alta recém-registrada.
///
/// Paciente ou terapeuta não localizados são apenas registrados no log; o
/// cadastro da alta segue adiante.
pub async fn desativar_paciente_por_alta(
    conn: &mut SqliteConnection,
    terapeuta_id: i64,
    paciente_id: i64,
) -> Result<(), DbError> {
    let paciente: Option<String> = sqlx::query_scalar("SELECT nome FROM pacientes WHERE id = ?")
        .bind(paciente_id)
        .fetch_optional(&mut *conn)
        .await?;
    let terapeuta: Option<String> = sqlx::query_scalar(
        r#"
        SELECT a.nome FROM terapeutas t
        JOIN associados a ON a.id = t.associado_id
        WHERE t.id = ?
        "#,
    )
    .bind(terapeuta_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (paciente, terapeuta) = match (paciente, terapeuta) {
        (Some(p), Some(t)) => (p, t),
        (p, t) => {
            error!(
                paciente_id,
                terapeuta_id,
                paciente_encontrado = p.is_some(),
                terapeuta_encontrado = t.is_some(),
                "Não foi possível desativar o paciente: registro relacionado ausente"
            );
            return Ok(());
        }
    };

    pacientes::desativar(conn, paciente_id).await?;
    info!(
        "Paciente {} (ID: {}) desativado após alta/desistência registrada por {}",
        paciente, paciente_id, terapeuta
    );
    Ok(())
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM altas_desistencias WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "alta/desistência", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cancelador, MomentoAlta, TipoAlta};
    use crate::testing::{data, pool_em_memoria, Cenario};

    fn alta(terapeuta_id: i64, paciente_id: i64) -> AltaDesistenciaEntrada {
        AltaDesistenciaEntrada {
            terapeuta_id,
            paciente_id,
            data_sessao: Some(data("2024-05-10")),
            cancelador: Some(Cancelador::Paciente),
            motivo_cancelamento: Some("Mudou de cidade".to_string()),
            momento: Some(MomentoAlta::DepoisPrimeiraSessao),
            tipo: Some(TipoAlta::Desistencia),
        }
    }

    #[tokio::test]
    async fn registrar_alta_desativa_paciente() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let antes = pacientes::buscar(&pool, paciente).await.unwrap();

        let registro = registrar_alta(&pool, &alta(cenario.terapeuta, paciente)).await.unwrap();
        assert_eq!(registro.paciente_nome, "Paula");
        assert_eq!(registro.tipo, Some(TipoAlta::Desistencia));

        let depois = pacientes::buscar(&pool, paciente).await.unwrap();
        assert!(!depois.is_active);
        assert_eq!(depois.nome, antes.nome);
        assert_eq!(depois.valor_sessao, antes.valor_sessao);
        assert_eq!(depois.telefone, antes.telefone);
        assert!(depois.updated_at >= antes.updated_at);
    }

    #[tokio::test]
    async fn segunda_alta_mantem_paciente_inativo() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;

        registrar_alta(&pool, &alta(cenario.terapeuta, paciente)).await.unwrap();
        registrar_alta(&pool, &alta(cenario.terapeuta, paciente)).await.unwrap();

        assert!(!pacientes::buscar(&pool, paciente).await.unwrap().is_active);
        assert_eq!(listar(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn excluir_alta_nao_reativa_paciente() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;

        let registro = registrar_alta(&pool, &alta(cenario.terapeuta, paciente)).await.unwrap();
        excluir(&pool, registro.id).await.unwrap();

        assert!(!pacientes::buscar(&pool, paciente).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn relacionados_ausentes_nao_falham() {
        let pool = pool_em_memoria().await;
        let mut conn = pool.acquire().await.unwrap();
        desativar_paciente_por_alta(&mut conn, 41, 42).await.unwrap();
    }
}
