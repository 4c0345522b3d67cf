//! Associados e seus setores

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado};
use crate::error::DbError;
use crate::models::{Associado, AssociadoEntrada, SetorResumo};

const SELECT_ASSOCIADO: &str = r#"
    SELECT a.id, a.nome, a.email, a.faculdade, a.telefone, a.contato_apoio,
           a.data_nascimento, a.sexo, a.cpf, a.endereco, a.is_active, a.observacao,
           a.usuario_id, a.created_at, a.updated_at,
           (SELECT COUNT(*) FROM terapeutas t
             WHERE t.decano_id = a.id AND t.is_active = 1) AS total_terapeutas_supervisionados
    FROM associados a
"#;

/// Nome do setor que identifica os decanos (comparação sem caixa, por substring)
pub const SETOR_DECANO: &str = "decano";

fn setor_de_decano(nome: &str) -> bool {
    nome.to_lowercase().contains(SETOR_DECANO)
}

/// Preenche setores e `is_decano` de uma lista de associados com uma única consulta
async fn carregar_setores(pool: &SqlitePool, associados: &mut [Associado]) -> Result<(), DbError> {
    if associados.is_empty() {
        return Ok(());
    }

    let linhas: Vec<(i64, i64, String)> = sqlx::query_as(
        r#"
        SELECT x.associado_id, s.id, s.nome
        FROM associados_setores x
        JOIN setores s ON s.id = x.setor_id
        ORDER BY s.nome
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut por_associado: HashMap<i64, Vec<SetorResumo>> = HashMap::new();
    for (associado_id, id, nome) in linhas {
        por_associado
            .entry(associado_id)
            .or_default()
            .push(SetorResumo { id, nome });
    }

    for associado in associados.iter_mut() {
        associado.setores = por_associado.remove(&associado.id).unwrap_or_default();
        associado.is_decano = associado.setores.iter().any(|s| setor_de_decano(&s.nome));
        if !associado.is_decano {
            associado.total_terapeutas_supervisionados = 0;
        }
    }
    Ok(())
}

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Associado>, DbError> {
    let sql = format!("{} ORDER BY a.nome", SELECT_ASSOCIADO);
    let mut associados = sqlx::query_as::<_, Associado>(&sql).fetch_all(pool).await?;
    carregar_setores(pool, &mut associados).await?;
    Ok(associados)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Associado, DbError> {
    let sql = format!("{} WHERE a.id = ?", SELECT_ASSOCIADO);
    let associado = sqlx::query_as::<_, Associado>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("associado", id))?;
    let mut lista = [associado];
    carregar_setores(pool, &mut lista).await?;
    let [associado] = lista;
    Ok(associado)
}

/// Associados ativos pertencentes a um setor de decanos
pub async fn listar_decanos(pool: &SqlitePool) -> Result<Vec<Associado>, DbError> {
    Ok(listar(pool)
        .await?
        .into_iter()
        .filter(|a| a.is_active && a.is_decano)
        .collect())
}

/// Verifica se o associado está ativo e em algum setor de decanos
pub async fn eh_decano(conn: &mut SqliteConnection, associado_id: i64) -> Result<bool, DbError> {
    let existe: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM associados a
            JOIN associados_setores x ON x.associado_id = a.id
            JOIN setores s ON s.id = x.setor_id
            WHERE a.id = ? AND a.is_active = 1 AND lower(s.nome) LIKE '%' || ? || '%'
        )
        "#,
    )
    .bind(associado_id)
    .bind(SETOR_DECANO)
    .fetch_one(&mut *conn)
    .await?;
    Ok(existe)
}

/// Normaliza campos opcionais de texto: string vazia vira `None`
fn vazio_para_none(valor: &Option<String>) -> Option<String> {
    valor
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn normalizar(entrada: &AssociadoEntrada) -> AssociadoEntrada {
    AssociadoEntrada {
        nome: entrada.nome.trim().to_string(),
        email: vazio_para_none(&entrada.email),
        faculdade: vazio_para_none(&entrada.faculdade),
        contato_apoio: vazio_para_none(&entrada.contato_apoio),
        cpf: vazio_para_none(&entrada.cpf),
        observacao: vazio_para_none(&entrada.observacao),
        ..entrada.clone()
    }
}

async fn gravar_setores(
    conn: &mut SqliteConnection,
    associado_id: i64,
    setores: &[i64],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM associados_setores WHERE associado_id = ?")
        .bind(associado_id)
        .execute(&mut *conn)
        .await?;
    for setor_id in setores {
        sqlx::query("INSERT OR IGNORE INTO associados_setores (associado_id, setor_id) VALUES (?, ?)")
            .bind(associado_id)
            .bind(setor_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn criar(pool: &SqlitePool, entrada: &AssociadoEntrada) -> Result<Associado, DbError> {
    let entrada = normalizar(entrada);
    entrada.validate()?;

    let agora = agora();
    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        r#"
        INSERT INTO associados (nome, email, faculdade, telefone, contato_apoio, data_nascimento,
                                sexo, cpf, endereco, is_active, observacao, usuario_id,
                                created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entrada.nome)
    .bind(&entrada.email)
    .bind(&entrada.faculdade)
    .bind(&entrada.telefone)
    .bind(&entrada.contato_apoio)
    .bind(entrada.data_nascimento)
    .bind(entrada.sexo)
    .bind(&entrada.cpf)
    .bind(&entrada.endereco)
    .bind(entrada.is_active)
    .bind(&entrada.observacao)
    .bind(entrada.usuario_id)
    .bind(agora)
    .bind(agora)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    gravar_setores(&mut tx, id, &entrada.setores).await?;
    tx.commit().await?;

    debug!("Associado {} criado", id);
    buscar(pool, id).await
}

pub async fn atualizar(
    pool: &SqlitePool,
    id: i64,
    entrada: &AssociadoEntrada,
) -> Result<Associado, DbError> {
    let entrada = normalizar(entrada);
    entrada.validate()?;

    let mut tx = pool.begin().await?;
    let resultado = sqlx::query(
        r#"
        UPDATE associados
        SET nome = ?, email = ?, faculdade = ?, telefone = ?, contato_apoio = ?,
            data_nascimento = ?, sexo = ?, cpf = ?, endereco = ?, is_active = ?,
            observacao = ?, usuario_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&entrada.nome)
    .bind(&entrada.email)
    .bind(&entrada.faculdade)
    .bind(&entrada.telefone)
    .bind(&entrada.contato_apoio)
    .bind(entrada.data_nascimento)
    .bind(entrada.sexo)
    .bind(&entrada.cpf)
    .bind(&entrada.endereco)
    .bind(entrada.is_active)
    .bind(&entrada.observacao)
    .bind(entrada.usuario_id)
    .bind(agora())
    .bind(id)
    .execute(&mut *tx)
    .await?;
    exigir_afetado(resultado.rows_affected(), "associado", id)?;

    gravar_setores(&mut tx, id, &entrada.setores).await?;
    tx.commit().await?;

    buscar(pool, id).await
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM associados WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "associado", id)
}
