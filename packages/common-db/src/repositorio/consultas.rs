//! Consultas (sessões de terapia)

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use validator::Validate;

use super::{agora, exigir_afetado, nao_encontrado};
use crate::dinheiro::Centavos;
use crate::error::DbError;
use crate::models::{Consulta, ConsultaEntrada};

const SELECT_CONSULTA: &str = r#"
    SELECT c.id, c.terapeuta_id, c.paciente_id, c.valor_consulta, c.realizada,
           c.valor_pago, c.data_consulta,
           a.nome AS terapeuta_nome, p.nome AS paciente_nome,
           ab.nome AS abordagem_nome, cl.nome AS clinica_nome, d.nome AS decano_nome,
           c.created_at, c.updated_at
    FROM consultas c
    JOIN terapeutas t ON t.id = c.terapeuta_id
    JOIN associados a ON a.id = t.associado_id
    JOIN associados d ON d.id = t.decano_id
    JOIN abordagens ab ON ab.id = t.abordagem_id
    JOIN clinicas cl ON cl.id = t.clinica_id
    JOIN pacientes p ON p.id = c.paciente_id
"#;

/// Quais consultas o usuário da listagem pode ver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibilidade {
    Todas,
    DoTerapeuta(i64),
    Nenhuma,
}

/// Ordenações aceitas na listagem (`order_by`), com `-` para decrescente
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordem {
    coluna: &'static str,
    chave: &'static str,
    decrescente: bool,
}

const COLUNAS_ORDEM: [(&str, &str); 6] = [
    ("data_consulta", "c.data_consulta"),
    ("paciente", "p.nome"),
    ("terapeuta", "a.nome"),
    ("valor_consulta", "c.valor_consulta"),
    ("valor_pago", "c.valor_pago"),
    ("realizada", "c.realizada"),
];

impl Ordem {
    /// Interpreta o parâmetro; chaves fora da lista caem no padrão
    pub fn parse(texto: &str) -> Ordem {
        let (decrescente, chave) = match texto.strip_prefix('-') {
            Some(resto) => (true, resto),
            None => (false, texto),
        };
        COLUNAS_ORDEM
            .iter()
            .find(|(nome, _)| *nome == chave)
            .map(|&(nome, coluna)| Ordem {
                coluna,
                chave: nome,
                decrescente,
            })
            .unwrap_or_default()
    }

    /// Representação de volta para o parâmetro da URL
    pub fn como_parametro(&self) -> String {
        format!("{}{}", if self.decrescente { "-" } else { "" }, self.chave)
    }
}

impl Default for Ordem {
    fn default() -> Self {
        Ordem {
            coluna: "c.data_consulta",
            chave: "data_consulta",
            decrescente: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FiltroConsultas {
    pub visibilidade: Visibilidade,
    /// Trecho do nome do paciente ou do terapeuta
    pub nome: Option<String>,
    pub ordem: Ordem,
    /// Página a partir de 1
    pub pagina: u32,
    pub por_pagina: u32,
}

impl Default for FiltroConsultas {
    fn default() -> Self {
        Self {
            visibilidade: Visibilidade::Todas,
            nome: None,
            ordem: Ordem::default(),
            pagina: 1,
            por_pagina: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagina<T> {
    pub itens: Vec<T>,
    pub pagina: u32,
    pub total_paginas: u32,
    pub total_itens: i64,
}

impl<T> Pagina<T> {
    pub fn tem_anterior(&self) -> bool {
        self.pagina > 1
    }

    pub fn tem_proxima(&self) -> bool {
        self.pagina < self.total_paginas
    }
}

fn aplicar_filtro(qb: &mut QueryBuilder<'_, Sqlite>, filtro: &FiltroConsultas) {
    qb.push(" WHERE 1 = 1");
    match filtro.visibilidade {
        Visibilidade::Todas => {}
        Visibilidade::DoTerapeuta(id) => {
            qb.push(" AND c.terapeuta_id = ").push_bind(id);
        }
        Visibilidade::Nenhuma => {
            qb.push(" AND 1 = 0");
        }
    }
    if let Some(nome) = filtro.nome.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let padrao = format!("%{}%", nome);
        qb.push(" AND (p.nome LIKE ")
            .push_bind(padrao.clone())
            .push(" OR a.nome LIKE ")
            .push_bind(padrao)
            .push(")");
    }
}

pub async fn listar_paginado(
    pool: &SqlitePool,
    filtro: &FiltroConsultas,
) -> Result<Pagina<Consulta>, DbError> {
    let por_pagina = filtro.por_pagina.max(1);

    let mut contagem = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT COUNT(*)
        FROM consultas c
        JOIN terapeutas t ON t.id = c.terapeuta_id
        JOIN associados a ON a.id = t.associado_id
        JOIN pacientes p ON p.id = c.paciente_id
        "#,
    );
    aplicar_filtro(&mut contagem, filtro);
    let total_itens: i64 = contagem.build_query_scalar().fetch_one(pool).await?;

    let total_paginas = ((total_itens.max(0) as u32) + por_pagina - 1) / por_pagina;
    let total_paginas = total_paginas.max(1);
    let pagina = filtro.pagina.clamp(1, total_paginas);

    let mut consulta = QueryBuilder::<Sqlite>::new(SELECT_CONSULTA);
    aplicar_filtro(&mut consulta, filtro);
    consulta
        .push(format_args!(
            " ORDER BY {} {}, c.id DESC",
            filtro.ordem.coluna,
            if filtro.ordem.decrescente { "DESC" } else { "ASC" }
        ))
        .push(" LIMIT ")
        .push_bind(i64::from(por_pagina))
        .push(" OFFSET ")
        .push_bind(i64::from((pagina - 1) * por_pagina));

    let itens = consulta.build_query_as::<Consulta>().fetch_all(pool).await?;

    Ok(Pagina {
        itens,
        pagina,
        total_paginas,
        total_itens,
    })
}

pub async fn listar(pool: &SqlitePool) -> Result<Vec<Consulta>, DbError> {
    let sql = format!("{} ORDER BY c.data_consulta DESC, c.id DESC", SELECT_CONSULTA);
    Ok(sqlx::query_as::<_, Consulta>(&sql).fetch_all(pool).await?)
}

pub async fn buscar(pool: &SqlitePool, id: i64) -> Result<Consulta, DbError> {
    let sql = format!("{} WHERE c.id = ?", SELECT_CONSULTA);
    sqlx::query_as::<_, Consulta>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| nao_encontrado("consulta", id))
}

pub async fn criar(pool: &SqlitePool, entrada: &ConsultaEntrada) -> Result<Consulta, DbError> {
    entrada.validate()?;
    let agora = agora();
    let id = sqlx::query(
        r#"
        INSERT INTO consultas (terapeuta_id, paciente_id, valor_consulta, realizada, valor_pago,
                               data_consulta, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entrada.terapeuta_id)
    .bind(entrada.paciente_id)
    .bind(entrada.valor_consulta)
    .bind(entrada.realizada)
    .bind(entrada.valor_pago)
    .bind(entrada.data_consulta)
    .bind(agora)
    .bind(agora)
    .execute(pool)
    .await?
    .last_insert_rowid();
    buscar(pool, id).await
}

/// Uma sessão do cadastro em lote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessaoLote {
    pub data_consulta: NaiveDate,
    pub realizada: bool,
}

/// Cadastra várias sessões pagas via PIX de uma só vez.
///
/// O valor total é dividido igualmente entre as sessões e cada uma recebe a
/// cota como valor da consulta e valor pago. Tudo ou nada.
pub async fn criar_em_lote(
    pool: &SqlitePool,
    terapeuta_id: i64,
    paciente_id: i64,
    valor_total: Centavos,
    sessoes: &[SessaoLote],
) -> Result<Vec<i64>, DbError> {
    if sessoes.is_empty() {
        return Err(DbError::campo("quantidade", "Informe ao menos uma sessão."));
    }
    if !valor_total.is_positive() {
        return Err(DbError::campo(
            "valor_pix_total",
            "O valor total deve ser positivo.",
        ));
    }
    let cota = valor_total.dividir(sessoes.len() as u32);
    if !cota.is_positive() {
        return Err(DbError::campo(
            "valor_pix_total",
            "O valor total é pequeno demais para o número de sessões.",
        ));
    }

    let agora = agora();
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(sessoes.len());
    for sessao in sessoes {
        let id = sqlx::query(
            r#"
            INSERT INTO consultas (terapeuta_id, paciente_id, valor_consulta, realizada,
                                   valor_pago, data_consulta, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(terapeuta_id)
        .bind(paciente_id)
        .bind(cota)
        .bind(sessao.realizada)
        .bind(cota)
        .bind(sessao.data_consulta)
        .bind(agora)
        .bind(agora)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        ids.push(id);
    }
    tx.commit().await?;

    info!(
        "{} consultas cadastradas em lote para o paciente {} (cota {})",
        ids.len(),
        paciente_id,
        cota
    );
    Ok(ids)
}

pub async fn atualizar(
    pool: &SqlitePool,
    id: i64,
    entrada: &ConsultaEntrada,
) -> Result<Consulta, DbError> {
    entrada.validate()?;
    let resultado = sqlx::query(
        r#"
        UPDATE consultas
        SET terapeuta_id = ?, paciente_id = ?, valor_consulta = ?, realizada = ?,
            valor_pago = ?, data_consulta = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(entrada.terapeuta_id)
    .bind(entrada.paciente_id)
    .bind(entrada.valor_consulta)
    .bind(entrada.realizada)
    .bind(entrada.valor_pago)
    .bind(entrada.data_consulta)
    .bind(agora())
    .bind(id)
    .execute(pool)
    .await?;
    exigir_afetado(resultado.rows_affected(), "consulta", id)?;
    buscar(pool, id).await
}

pub async fn excluir(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let resultado = sqlx::query("DELETE FROM consultas WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    exigir_afetado(resultado.rows_affected(), "consulta", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{data, pool_em_memoria, Cenario};

    #[test]
    fn ordem_fora_da_lista_usa_padrao() {
        assert_eq!(Ordem::parse("paciente").como_parametro(), "paciente");
        assert_eq!(Ordem::parse("-valor_pago").como_parametro(), "-valor_pago");
        assert_eq!(Ordem::parse("id; DROP TABLE consultas").como_parametro(), "-data_consulta");
        assert_eq!(Ordem::parse(""), Ordem::default());
    }

    #[tokio::test]
    async fn lote_divide_valor_entre_sessoes() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;

        let sessoes = vec![
            SessaoLote {
                data_consulta: data("2024-05-03"),
                realizada: true,
            },
            SessaoLote {
                data_consulta: data("2024-05-10"),
                realizada: true,
            },
            SessaoLote {
                data_consulta: data("2024-05-17"),
                realizada: false,
            },
        ];
        let ids = criar_em_lote(&pool, cenario.terapeuta, paciente, Centavos(10000), &sessoes)
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);

        for id in ids {
            let consulta = buscar(&pool, id).await.unwrap();
            assert_eq!(consulta.valor_consulta, Centavos(3333));
            assert_eq!(consulta.valor_pago, Some(Centavos(3333)));
        }
    }

    #[tokio::test]
    async fn lote_vazio_ou_sem_valor_e_rejeitado() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;

        let erro = criar_em_lote(&pool, cenario.terapeuta, paciente, Centavos(100), &[])
            .await
            .unwrap_err();
        assert!(matches!(erro, DbError::Validacao(_)));

        let sessoes = [SessaoLote {
            data_consulta: data("2024-05-03"),
            realizada: true,
        }];
        let erro = criar_em_lote(&pool, cenario.terapeuta, paciente, Centavos::ZERO, &sessoes)
            .await
            .unwrap_err();
        assert!(matches!(erro, DbError::Validacao(_)));
    }

    #[tokio::test]
    async fn listagem_filtra_por_nome_visibilidade_e_pagina() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let rui = cenario.novo_paciente(&pool, "Rui", 15000).await;
        for dia in 1..=12 {
            let data = format!("2024-05-{:02}", dia);
            cenario.nova_consulta(&pool, paula, &data, Some(true), Some(15000)).await;
        }
        cenario.nova_consulta(&pool, rui, "2024-06-01", None, None).await;

        let pagina = listar_paginado(&pool, &FiltroConsultas::default()).await.unwrap();
        assert_eq!(pagina.total_itens, 13);
        assert_eq!(pagina.total_paginas, 2);
        assert_eq!(pagina.itens.len(), 10);
        assert_eq!(pagina.itens[0].paciente_nome, "Rui");
        assert!(pagina.tem_proxima());

        let filtro = FiltroConsultas {
            nome: Some("rui".to_string()),
            ..FiltroConsultas::default()
        };
        let pagina = listar_paginado(&pool, &filtro).await.unwrap();
        assert_eq!(pagina.total_itens, 1);

        let filtro = FiltroConsultas {
            pagina: 2,
            ordem: Ordem::parse("data_consulta"),
            ..FiltroConsultas::default()
        };
        let pagina = listar_paginado(&pool, &filtro).await.unwrap();
        assert_eq!(pagina.itens.len(), 3);
        assert_eq!(pagina.itens[2].paciente_nome, "Rui");

        let filtro = FiltroConsultas {
            visibilidade: Visibilidade::Nenhuma,
            ..FiltroConsultas::default()
        };
        assert_eq!(listar_paginado(&pool, &filtro).await.unwrap().total_itens, 0);

        let filtro = FiltroConsultas {
            visibilidade: Visibilidade::DoTerapeuta(cenario.terapeuta),
            ..FiltroConsultas::default()
        };
        assert_eq!(listar_paginado(&pool, &filtro).await.unwrap().total_itens, 13);
    }
}
