//! Terapeutas vinculados a associados

use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use super::{agora, associados, exigir_afetado, nao_encontrado};
use crate::error::DbError;
use crate::models::{Terapeuta, TerapeutaEntrada};

const SELECT_TERAPEUTA: &str = r#"
    SELECT t.id, t.associado_id, t.decano_id, t.abordagem_id, t.nucleo_id,
           t.clinica_id, t.modalidade_id, t.is_active,
           a.nome AS associado_nome, a.email AS associado_email,
           d.nome AS decano_nome, ab.nome AS abordagem_nome, n.nome AS nucleo_nome,
           c.nome AS clinica_nome, m.nome AS modalidade_nome,
           (SELECT COUNT(*) FROM consultas x WHERE x.terapeuta_id = t.id) AS total_consultas,
           (SELECT COUNT(DISTINCT x.paciente_id) FROM consultas x
             WHERE x.terapeuta_id = t.id) AS total_pacientes,
           t.created_at, t.updated_at
    FROM terapeutas t
    JOIN associados a ON a.id = t.associado_id
    JOIN associados d ON d.id = t.decano_id
    JOIN abordagens ab ON ab.id = t.abordagem_id
    JOIN nucleos n ON n.id = t.nucleo_id
    JOIN clinicas c ON c.id = t.clinica_id
    JOIN modalidades m ON m.id = t.modalidade_id
"#;

pub const MSG_DECANO_INVALIDO: &str =
    "O decano deve ser um associado ativo pertencente ao setor de decanos.";

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Terapeuta>, DbError> {
    let sql = format!("{} ORDER BY a.nome", SELECT_TERAPEUTA);
    Ok(sqlx::query_as::<_, Terapeuta>(&sql).fetch_all(pool).await?)
}

pub async fn listar_ativos(pool: &SqlitePool) -> Result<Vec<Terapeuta>, DbError> {
    let sql = format!("{} WHERE t.is_active = 1 ORDER BY a.nome", SELECT_TERAPEUTA);
    Ok(sqlx::query_as::<_, Terapeuta>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Terapeuta, DbError> {
    let sql = format!("{} WHERE t.id = ?", SELECT_TERAPEUTA);
    sqlx::query_as::<_, Terapeuta>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("terapeuta", id))
}

/// Terapeuta cujo associado está ligado à conta de usuário informada
pub async fn buscar_por_usuario(
    pool: &SqlitePool,
    usuario_id: i64,
) -> Result<Option<Terapeuta>, DbError> {
    let sql = format!("{} WHERE a.usuario_id = ? ORDER BY t.id LIMIT 1", SELECT_TERAPEUTA);
    Ok(sqlx::query_as::<_, Terapeuta>(&sql)
        .bind(usuario_id)
        .fetch_optional(pool)
        .await?)
}

async fn validar(conn: &mut SqliteConnection, entrada: &TerapeutaEntrada) -> Result<(), DbError> {
    entrada.validate()?;
    if !associados::eh_decano(conn, entrada.decano_id).await? {
        return Err(DbError::campo("decano_id", MSG_DECANO_INVALIDO));
    }
    Ok(())
}

/// Insere usando uma conexão já aberta (permite participar de transações maiores)
pub async fn inserir(conn: &mut SqliteConnection, entrada: &TerapeutaEntrada) -> Result<i64, DbError> {
    validar(conn, entrada).await?;
    let agora = agora();
    let id = sqlx::query(
        r#"
        INSERT INTO terapeutas (associado_id, decano_id, abordagem_id, nucleo_id, clinica_id,
                                modalidade_id, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.associado_id)
    .bind(entrada.decano_id)
    .bind(entrada.abordagem_id)
    .bind(entrada.nucleo_id)
    .bind(entrada.clinica_id)
    .bind(entrada.modalidade_id)
    .bind(entrada.is_active)
    .bind(agora)
    .bind(agora)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn criar(pool: &SqlitePool, entrada: &TerapeutaEntrada) -> Result<Terapeuta, DbError> {
    let id = {
        let mut conn = pool.acquire().await?;
        inserir(&mut conn, entrada).await?
    };
    buscar(pool, id).await
}

pub async fn atualizar(
    pool: &SqlitePool,
    id: i64,
    entrada: &TerapeutaEntrada,
) -> Result<Terapeuta, DbError> {
    {
        let mut conn = pool.acquire().await?;
        validar(&mut conn, entrada).await?;
        let resultado = sqlx::query(
            r#"
            UPDATE terapeutas
            SET associado_id = ?, decano_id = ?, abordagem_id = ?, nucleo_id = ?,
                clinica_id = ?, modalidade_id = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(entrada.associado_id)
        .bind(entrada.decano_id)
        .bind(entrada.abordagem_id)
        .bind(entrada.nucleo_id)
        .bind(entrada.clinica_id)
        .bind(entrada.modalidade_id)
        .bind(entrada.is_active)
        .bind(agora())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        exigir_afetado(resultado.rows_affected(), "terapeuta", id)?;
    }
    buscar(pool, id).await
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM terapeutas WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "terapeuta", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pool_em_memoria, Cenario};

    #[tokio::test]
    async fn decano_fora_do_setor_e_rejeitado_no_campo() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;

        let mut entrada = cenario.terapeuta_entrada(cenario.associado_comum);
        entrada.decano_id = cenario.associado_comum;

        let erro = criar(&pool, &entrada).await.unwrap_err();
        match erro {
            DbError::Validacao(erros) => {
                assert_eq!(erros.campo("decano_id"), Some(&[MSG_DECANO_INVALIDO.to_string()][..]));
            }
            outro => panic!("erro inesperado: {:?}", outro),
        }
    }

    #[tokio::test]
    async fn terapeuta_com_decano_valido_e_contagens() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;

        let terapeuta = buscar(&pool, cenario.terapeuta).await.unwrap();
        assert_eq!(terapeuta.decano_nome, "Decana Dalva");
        assert_eq!(terapeuta.total_consultas, 0);

        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paciente, "2024-05-10", Some(true), Some(15000)).await;
        cenario.nova_consulta(&pool, paciente, "2024-05-17", None, None).await;

        let terapeuta = buscar(&pool, cenario.terapeuta).await.unwrap();
        assert_eq!(terapeuta.total_consultas, 2);
        assert_eq!(terapeuta.total_pacientes, 1);
    }

    #[tokio::test]
    async fn busca_por_usuario_vinculado() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;

        let encontrado = buscar_por_usuario(&pool, cenario.usuario_terapeuta)
            .await
            .unwrap()
            .expect("terapeuta vinculado");
        assert_eq!(encontrado.id, cenario.terapeuta);
        assert!(buscar_por_usuario(&pool, 999).await.unwrap().is_none());
    }
}
