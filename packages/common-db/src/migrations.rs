//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_cadastros.sql
    r#"
    -- Tabelas auxiliares
    CREATE TABLE IF NOT EXISTS captacoes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clinicas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL CHECK (length(nome) <= 10),
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS modalidades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL CHECK (length(nome) <= 10),
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS nucleos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL CHECK (length(nome) <= 30),
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS abordagens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS setores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    -- Contas de acesso
    CREATE TABLE IF NOT EXISTS usuarios (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT 1,
        is_staff BOOLEAN NOT NULL DEFAULT 0,
        is_superuser BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS grupos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS usuarios_grupos (
        usuario_id INTEGER NOT NULL,
        grupo_id INTEGER NOT NULL,
        PRIMARY KEY (usuario_id, grupo_id),
        FOREIGN KEY (usuario_id) REFERENCES usuarios (id) ON DELETE CASCADE,
        FOREIGN KEY (grupo_id) REFERENCES grupos (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS permissoes_grupo (
        grupo_id INTEGER NOT NULL,
        codigo TEXT NOT NULL,
        PRIMARY KEY (grupo_id, codigo),
        FOREIGN KEY (grupo_id) REFERENCES grupos (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS permissoes_usuario (
        usuario_id INTEGER NOT NULL,
        codigo TEXT NOT NULL,
        PRIMARY KEY (usuario_id, codigo),
        FOREIGN KEY (usuario_id) REFERENCES usuarios (id) ON DELETE CASCADE
    );

    -- Associados e setores
    CREATE TABLE IF NOT EXISTS associados (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        email TEXT UNIQUE,
        faculdade TEXT,
        telefone TEXT NOT NULL,
        contato_apoio TEXT,
        data_nascimento DATE,
        sexo TEXT NOT NULL CHECK (sexo IN ('M', 'F', 'O')),
        cpf TEXT UNIQUE,
        endereco TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        observacao TEXT,
        usuario_id INTEGER UNIQUE,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (usuario_id) REFERENCES usuarios (id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS associados_setores (
        associado_id INTEGER NOT NULL,
        setor_id INTEGER NOT NULL,
        PRIMARY KEY (associado_id, setor_id),
        FOREIGN KEY (associado_id) REFERENCES associados (id) ON DELETE CASCADE,
        FOREIGN KEY (setor_id) REFERENCES setores (id) ON DELETE CASCADE
    );

    -- Pacientes
    CREATE TABLE IF NOT EXISTS pacientes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        clinica_id INTEGER NOT NULL,
        captacao_id INTEGER NOT NULL,
        modalidade_id INTEGER NOT NULL,
        nome TEXT NOT NULL,
        email TEXT,
        telefone TEXT NOT NULL,
        nome_contato_apoio TEXT,
        parentesco_contato_apoio TEXT,
        contato_apoio TEXT,
        data_nascimento DATE,
        valor_sessao INTEGER NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        observacao TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (clinica_id) REFERENCES clinicas (id) ON DELETE CASCADE,
        FOREIGN KEY (captacao_id) REFERENCES captacoes (id) ON DELETE CASCADE,
        FOREIGN KEY (modalidade_id) REFERENCES modalidades (id) ON DELETE CASCADE
    );

    -- Terapeutas
    CREATE TABLE IF NOT EXISTS terapeutas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        associado_id INTEGER NOT NULL,
        decano_id INTEGER NOT NULL,
        abordagem_id INTEGER NOT NULL,
        nucleo_id INTEGER NOT NULL,
        clinica_id INTEGER NOT NULL,
        modalidade_id INTEGER NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (associado_id) REFERENCES associados (id) ON DELETE CASCADE,
        FOREIGN KEY (decano_id) REFERENCES associados (id) ON DELETE CASCADE,
        FOREIGN KEY (abordagem_id) REFERENCES abordagens (id) ON DELETE CASCADE,
        FOREIGN KEY (nucleo_id) REFERENCES nucleos (id) ON DELETE CASCADE,
        FOREIGN KEY (clinica_id) REFERENCES clinicas (id) ON DELETE CASCADE,
        FOREIGN KEY (modalidade_id) REFERENCES modalidades (id) ON DELETE CASCADE
    );

    -- Consultas (sessões)
    CREATE TABLE IF NOT EXISTS consultas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        terapeuta_id INTEGER NOT NULL,
        paciente_id INTEGER NOT NULL,
        valor_consulta INTEGER NOT NULL,
        realizada BOOLEAN,
        valor_pago INTEGER CHECK (valor_pago IS NULL OR valor_pago >= 0),
        data_consulta DATE NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (terapeuta_id) REFERENCES terapeutas (id) ON DELETE CASCADE,
        FOREIGN KEY (paciente_id) REFERENCES pacientes (id) ON DELETE CASCADE
    );

    -- Altas e desistências
    CREATE TABLE IF NOT EXISTS altas_desistencias (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        terapeuta_id INTEGER NOT NULL,
        paciente_id INTEGER NOT NULL,
        data_sessao DATE,
        cancelador TEXT CHECK (cancelador IN ('paciente', 'terapeuta')),
        motivo_cancelamento TEXT,
        momento TEXT,
        tipo TEXT CHECK (tipo IN ('alta', 'desistencia')),
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (terapeuta_id) REFERENCES terapeutas (id) ON DELETE CASCADE,
        FOREIGN KEY (paciente_id) REFERENCES pacientes (id) ON DELETE CASCADE
    );

    -- Avaliações periódicas
    CREATE TABLE IF NOT EXISTS avaliacoes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        terapeuta_id INTEGER NOT NULL,
        paciente_id INTEGER NOT NULL,
        data_consulta DATE NOT NULL,
        consentimento_paciente BOOLEAN DEFAULT 0,
        individual INTEGER CHECK (individual BETWEEN 0 AND 10),
        interpessoal INTEGER CHECK (interpessoal BETWEEN 0 AND 10),
        social INTEGER CHECK (social BETWEEN 0 AND 10),
        geral INTEGER CHECK (geral BETWEEN 0 AND 10),
        qualidade_geral INTEGER CHECK (qualidade_geral BETWEEN 0 AND 10),
        continuar_terapeuta BOOLEAN NOT NULL DEFAULT 0,
        continuar_allos BOOLEAN NOT NULL DEFAULT 0,
        momento TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (terapeuta_id) REFERENCES terapeutas (id) ON DELETE CASCADE,
        FOREIGN KEY (paciente_id) REFERENCES pacientes (id) ON DELETE CASCADE
    );

    -- Pareamento terapeuta/paciente
    CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        terapeuta_id INTEGER NOT NULL,
        paciente_id INTEGER NOT NULL,
        data_consulta DATE NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (terapeuta_id) REFERENCES terapeutas (id) ON DELETE CASCADE,
        FOREIGN KEY (paciente_id) REFERENCES pacientes (id) ON DELETE CASCADE
    );

    -- Seleção (avaliação entre pares)
    CREATE TABLE IF NOT EXISTS selecoes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        avaliador_id INTEGER NOT NULL,
        avaliado_id INTEGER NOT NULL,
        data_avaliacao DATE NOT NULL,
        estagio_mudanca INTEGER NOT NULL,
        estrutura INTEGER NOT NULL,
        encerramento INTEGER NOT NULL,
        acolhimento INTEGER NOT NULL,
        seguranca_terapeuta INTEGER NOT NULL,
        seguranca_metodo INTEGER NOT NULL,
        aprofundar INTEGER NOT NULL,
        hipoteses INTEGER NOT NULL,
        interpretacao INTEGER NOT NULL,
        frase_timing INTEGER NOT NULL,
        corpo_setting INTEGER NOT NULL,
        insight_potencia INTEGER NOT NULL,
        FOREIGN KEY (avaliador_id) REFERENCES terapeutas (id) ON DELETE CASCADE,
        FOREIGN KEY (avaliado_id) REFERENCES associados (id) ON DELETE CASCADE
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_consultas_terapeuta_id ON consultas (terapeuta_id);
    CREATE INDEX IF NOT EXISTS idx_consultas_paciente_id ON consultas (paciente_id);
    CREATE INDEX IF NOT EXISTS idx_consultas_data ON consultas (data_consulta);
    CREATE INDEX IF NOT EXISTS idx_pacientes_ativos ON pacientes (is_active);
    CREATE INDEX IF NOT EXISTS idx_terapeutas_associado_id ON terapeutas (associado_id);
    CREATE INDEX IF NOT EXISTS idx_matches_paciente_id ON matches (paciente_id);
    CREATE INDEX IF NOT EXISTS idx_altas_paciente_id ON altas_desistencias (paciente_id);
    CREATE INDEX IF NOT EXISTS idx_selecoes_data ON selecoes (data_avaliacao);
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            error!("Erro ao obter versão do banco: {}", e);
            // Continuar mesmo assim, pois pode ser a primeira execução
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool.begin().await.context(format!(
            "Falha ao iniciar transação para migração {}",
            migration_version
        ))?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .context(format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .context(format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.context(format!(
            "Falha ao confirmar transação para migração {}",
            migration_version
        ))?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migrations.db");

        let conn_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;

        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;

        for esperada in [
            "captacoes",
            "associados",
            "terapeutas",
            "pacientes",
            "consultas",
            "altas_desistencias",
            "avaliacoes",
            "matches",
            "selecoes",
            "usuarios",
        ] {
            assert!(tables.contains(&esperada.to_string()), "tabela {} ausente", esperada);
        }

        // Segunda execução não deve reaplicar nada
        run_migrations(&pool).await?;

        Ok(())
    }
}
