//! Importação de terapeutas a partir de planilha CSV (Windows-1252)
//!
//! Colunas esperadas: `NOME`, `USUARIO` e `SENHA`. Cada linha cria ou
//! atualiza a conta e a coloca no grupo `Terapeuta`, tudo numa transação.

use std::path::Path;

use anyhow::{bail, Context, Result};
use common_db::repositorio::usuarios::{self, NovoUsuario};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{error, info, warn};

use crate::auth::hash_senha;

pub const GRUPO_TERAPEUTA: &str = "Terapeuta";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResumoImportacao {
    pub criados: usize,
    pub atualizados: usize,
    /// Uma mensagem por linha rejeitada
    pub erros: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinhaTerapeuta {
    nome: String,
    username: String,
    senha: String,
}

/// Primeiro nome e o restante como sobrenome
fn dividir_nome(nome: &str) -> (String, String) {
    let mut partes = nome.split_whitespace();
    let primeiro = partes.next().unwrap_or_default().to_string();
    let resto: Vec<&str> = partes.collect();
    (primeiro, resto.join(" "))
}

fn decodificar(bytes: &[u8]) -> String {
    let (texto, _, com_erros) = encoding_rs::WINDOWS_1252.decode(bytes);
    if com_erros {
        warn!("Arquivo contém bytes inválidos para Windows-1252");
    }
    texto.into_owned()
}

fn ler_linhas(texto: &str) -> Result<Vec<Result<LinhaTerapeuta, String>>> {
    let mut leitor = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(texto.as_bytes());

    let cabecalho = leitor.headers().context("Falha ao ler o cabeçalho do CSV")?.clone();
    let coluna = |nome: &str| cabecalho.iter().position(|c| c.eq_ignore_ascii_case(nome));
    let (Some(i_nome), Some(i_usuario), Some(i_senha)) = (coluna("NOME"), coluna("USUARIO"), coluna("SENHA")) else {
        bail!("O CSV precisa das colunas NOME, USUARIO e SENHA");
    };

    let mut linhas = Vec::new();
    for (i, registro) in leitor.records().enumerate() {
        let numero = i + 1;
        let linha = match registro {
            Err(e) => Err(format!("linha {}: {}", numero, e)),
            Ok(registro) => {
                let campo = |indice: usize| registro.get(indice).unwrap_or_default().to_string();
                let linha = LinhaTerapeuta {
                    nome: campo(i_nome),
                    username: campo(i_usuario),
                    senha: campo(i_senha),
                };
                if linha.username.is_empty() || linha.senha.is_empty() {
                    Err(format!("linha {} ({}): usuário e senha são obrigatórios", numero, linha.nome))
                } else {
                    Ok(linha)
                }
            }
        };
        linhas.push(linha);
    }
    Ok(linhas)
}

/// Grava uma linha; devolve se a conta foi criada
async fn gravar(conn: &mut SqliteConnection, grupo_id: i64, linha: &LinhaTerapeuta) -> Result<bool> {
    let (primeiro, sobrenome) = dividir_nome(&linha.nome);
    let hash = hash_senha(&linha.senha)?;
    // conta existente mantém as flags de acesso
    let (is_staff, is_superuser) = match usuarios::buscar_por_username(conn, &linha.username).await? {
        Some(existente) => (existente.is_staff, existente.is_superuser),
        None => (true, false),
    };
    let (id, criado) = usuarios::criar_ou_atualizar(
        conn,
        &NovoUsuario {
            username: &linha.username,
            password_hash: &hash,
            first_name: &primeiro,
            last_name: &sobrenome,
            is_staff,
            is_superuser,
        },
    )
    .await?;
    usuarios::adicionar_ao_grupo(conn, id, grupo_id).await?;
    Ok(criado)
}

pub async fn importar_terapeutas(pool: &SqlitePool, caminho: &Path) -> Result<ResumoImportacao> {
    if !caminho.exists() {
        bail!("Arquivo não encontrado: {}", caminho.display());
    }
    let bytes = tokio::fs::read(caminho)
        .await
        .with_context(|| format!("Falha ao ler {}", caminho.display()))?;
    let linhas = ler_linhas(&decodificar(&bytes))?;
    info!("Arquivo carregado: {} registros encontrados", linhas.len());

    let mut resumo = ResumoImportacao::default();
    let mut tx = pool.begin().await?;
    let (grupo_id, grupo_criado) = usuarios::obter_ou_criar_grupo(&mut tx, GRUPO_TERAPEUTA).await?;
    if grupo_criado {
        info!("Grupo {} criado", GRUPO_TERAPEUTA);
    }

    for linha in linhas {
        let linha = match linha {
            Ok(linha) => linha,
            Err(mensagem) => {
                error!("Erro ao processar {}", mensagem);
                resumo.erros.push(mensagem);
                continue;
            }
        };
        // savepoint por linha: falha no meio não deixa escrita parcial
        let mut ponto = tx.begin().await?;
        let resultado = gravar(&mut ponto, grupo_id, &linha).await;
        if resultado.is_ok() {
            ponto.commit().await?;
        } else {
            ponto.rollback().await?;
        }
        match resultado {
            Ok(true) => {
                info!("Usuário criado: {}", linha.username);
                resumo.criados += 1;
            }
            Ok(false) => {
                info!("Usuário atualizado: {}", linha.username);
                resumo.atualizados += 1;
            }
            Err(e) => {
                let mensagem = format!("{} ({}): {:#}", linha.username, linha.nome, e);
                error!("Erro ao processar {}", mensagem);
                resumo.erros.push(mensagem);
            }
        }
    }
    tx.commit().await?;

    info!(
        "Importação concluída: {} criados, {} atualizados, {} erros",
        resumo.criados,
        resumo.atualizados,
        resumo.erros.len()
    );
    Ok(resumo)
}
