//! Contas de acesso, grupos e permissões
//!
//! Permissões são códigos no formato `<app>.<acao>_<modelo>`, concedidos a
//! grupos ou diretamente a usuários. Superusuários têm todas.

use std::collections::BTreeSet;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{agora, nao_encontrado};
use crate::error::DbError;
use crate::models::Usuario;

const SELECT_USUARIO: &str = r#"
    SELECT id, username, password_hash, first_name, last_name, is_active,
           is_staff, is_superuser, created_at, updated_at
    FROM usuarios
"#;

/// Dados para criar ou atualizar uma conta (a senha já vem em hash)
#[derive(Debug, Clone)]
pub struct NovoUsuario<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Usuario, DbError> {
    let sql = format!("{} WHERE id = ?", SELECT_USUARIO);
    sqlx::query_as::<_, Usuario>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("usuário", id))
}

pub async fn buscar_por_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Usuario>, DbError> {
    let sql = format!("{} WHERE username = ?", SELECT_USUARIO);
    Ok(sqlx::query_as::<_, Usuario>(&sql)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Cria a conta ou atualiza nome, senha e flags se o username já existir.
/// Devolve o id e se a conta foi criada.
pub async fn criar_ou_atualizar(
    conn: &mut SqliteConnection,
    dados: &NovoUsuario<'_>,
) -> Result<(i64, bool), DbError> {
    let username = dados.username.trim();
    if username.is_empty() {
        return Err(DbError::campo("username", "Informe o nome de usuário."));
    }
    let agora = agora();

    if let Some(existente) = buscar_por_username(conn, username).await? {
        sqlx::query(
            r#"
            UPDATE usuarios
            SET password_hash = ?, first_name = ?, last_name = ?, is_staff = ?,
                is_superuser = ?, is_active = 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(dados.password_hash)
        .bind(dados.first_name)
        .bind(dados.last_name)
        .bind(dados.is_staff)
        .bind(dados.is_superuser)
        .bind(agora)
        .bind(existente.id)
        .execute(&mut *conn)
        .await?;
        debug!("Usuário {} atualizado", username);
        return Ok((existente.id, false));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO usuarios (username, password_hash, first_name, last_name, is_active,
                              is_staff, is_superuser, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(dados.password_hash)
    .bind(dados.first_name)
    .bind(dados.last_name)
    .bind(dados.is_staff)
    .bind(dados.is_superuser)
    .bind(agora)
    .bind(agora)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    info!("Usuário {} criado (ID: {})", username, id);
    Ok((id, true))
}

/// Devolve o id do grupo, criando-o se necessário
pub async fn obter_ou_criar_grupo(conn: &mut SqliteConnection, nome: &str) -> Result<(i64, bool), DbError> {
    let existente: Option<i64> = sqlx::query_scalar("SELECT id FROM grupos WHERE nome = ?")
        .bind(nome)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existente {
        return Ok((id, false));
    }
    let id = sqlx::query("INSERT INTO grupos (nome) VALUES (?)")
        .bind(nome)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    info!("Grupo '{}' criado", nome);
    Ok((id, true))
}

pub async fn adicionar_ao_grupo(
    conn: &mut SqliteConnection,
    usuario_id: i64,
    grupo_id: i64,
) -> Result<(), DbError> {
    sqlx::query("INSERT OR IGNORE INTO usuarios_grupos (usuario_id, grupo_id) VALUES (?, ?)")
        .bind(usuario_id)
        .bind(grupo_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Formato `<app>.<acao>_<modelo>`, com partes em minúsculas
pub fn codigo_valido(codigo: &str) -> bool {
    let Some((app, resto)) = codigo.split_once('.') else {
        return false;
    };
    let parte_ok = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b == b'_');
    parte_ok(app) && parte_ok(resto) && resto.contains('_')
}

pub async fn conceder_permissao_grupo(
    conn: &mut SqliteConnection,
    grupo_id: i64,
    codigo: &str,
) -> Result<(), DbError> {
    if !codigo_valido(codigo) {
        return Err(DbError::campo("codigo", format!("Código de permissão inválido: {}", codigo)));
    }
    sqlx::query("INSERT OR IGNORE INTO permissoes_grupo (grupo_id, codigo) VALUES (?, ?)")
        .bind(grupo_id)
        .bind(codigo)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn conceder_permissao_usuario(
    conn: &mut SqliteConnection,
    usuario_id: i64,
    codigo: &str,
) -> Result<(), DbError> {
    if !codigo_valido(codigo) {
        return Err(DbError::campo("codigo", format!("Código de permissão inválido: {}", codigo)));
    }
    sqlx::query("INSERT OR IGNORE INTO permissoes_usuario (usuario_id, codigo) VALUES (?, ?)")
        .bind(usuario_id)
        .bind(codigo)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Permissões efetivas do usuário: diretas mais as dos seus grupos
pub async fn permissoes(pool: &SqlitePool, usuario_id: i64) -> Result<BTreeSet<String>, DbError> {
    let codigos: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT codigo FROM permissoes_usuario WHERE usuario_id = ?
        UNION
        SELECT pg.codigo FROM permissoes_grupo pg
        JOIN usuarios_grupos ug ON ug.grupo_id = pg.grupo_id
        WHERE ug.usuario_id = ?
        "#,
    )
    .bind(usuario_id)
    .bind(usuario_id)
    .fetch_all(pool)
    .await?;
    Ok(codigos.into_iter().collect())
}
