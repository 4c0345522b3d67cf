//! Comandos administrativos da linha de comando

use anyhow::{Context, Result};
use common_db::repositorio::usuarios::{self, NovoUsuario};
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::hash_senha;

/// Cria a conta de superusuário ou redefine a senha de uma existente
pub async fn criar_superusuario(pool: &SqlitePool, username: &str, senha: &str) -> Result<i64> {
    if senha.len() < 8 {
        anyhow::bail!("A senha do superusuário precisa de ao menos 8 caracteres");
    }
    let hash = hash_senha(senha)?;
    let mut conn = pool.acquire().await?;
    let (id, criado) = usuarios::criar_ou_atualizar(
        &mut conn,
        &NovoUsuario {
            username,
            password_hash: &hash,
            first_name: "",
            last_name: "",
            is_staff: true,
            is_superuser: true,
        },
    )
    .await
    .with_context(|| format!("Falha ao gravar o superusuário {}", username))?;
    info!(
        "Superusuário {} {} (ID: {})",
        username,
        if criado { "criado" } else { "atualizado" },
        id
    );
    Ok(id)
}

/// Concede os códigos ao grupo, criando-o se preciso; nada é gravado se algum código for inválido
pub async fn conceder_permissao(pool: &SqlitePool, grupo: &str, codigos: &[String]) -> Result<()> {
    let invalidos: Vec<&str> = codigos
        .iter()
        .map(String::as_str)
        .filter(|c| !usuarios::codigo_valido(c))
        .collect();
    if !invalidos.is_empty() {
        anyhow::bail!(
            "Códigos inválidos (formato <app>.<acao>_<modelo>): {}",
            invalidos.join(", ")
        );
    }

    let mut tx = pool.begin().await?;
    let (grupo_id, _) = usuarios::obter_ou_criar_grupo(&mut tx, grupo).await?;
    for codigo in codigos {
        usuarios::conceder_permissao_grupo(&mut tx, grupo_id, codigo).await?;
    }
    tx.commit().await?;
    info!("{} permissões concedidas ao grupo {}", codigos.len(), grupo);
    Ok(())
}
