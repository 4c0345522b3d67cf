//! Métricas do painel
//!
//! Cada função calcula um bloco de indicadores a partir de uma data de
//! referência (`hoje`). [`painel`] junta todos; uma consulta que falhe é
//! registrada no log e o bloco correspondente sai zerado.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::error;

use crate::dinheiro::Centavos;
use crate::error::DbError;

/// Período considerado nas agregações de consultas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Janela {
    /// Todo o histórico
    #[default]
    Total,
    /// Últimos `n` dias até `hoje`, pela data da consulta
    Dias(u32),
}

impl Janela {
    fn inicio(self, hoje: NaiveDate) -> Option<NaiveDate> {
        match self {
            Janela::Total => None,
            // antes do menor NaiveDate vale o histórico todo
            Janela::Dias(n) => hoje.checked_sub_signed(Duration::days(i64::from(n))),
        }
    }
}

/// Como somar a receita acordada de cada terapeuta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EscopoReceita {
    /// Valor da sessão de cada paciente ativo atendido, uma vez por paciente
    #[default]
    PacientesAtivos,
    /// Valor da sessão do paciente somado a cada consulta da janela
    SessoesNaJanela,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMetricas {
    pub janela: Janela,
    pub escopo_receita: EscopoReceita,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusDiferenca {
    Positivo,
    Negativo,
    Igual,
}

impl StatusDiferenca {
    /// Sinal de `acordada - recebido`
    pub fn de(diferenca: Centavos) -> Self {
        match diferenca.0 {
            d if d > 0 => StatusDiferenca::Positivo,
            d if d < 0 => StatusDiferenca::Negativo,
            _ => StatusDiferenca::Igual,
        }
    }

    pub fn como_str(self) -> &'static str {
        match self {
            StatusDiferenca::Positivo => "positivo",
            StatusDiferenca::Negativo => "negativo",
            StatusDiferenca::Igual => "igual",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricasTerapeuta {
    pub terapeuta_id: i64,
    pub nome: String,
    pub total_consultas: i64,
    pub consultas_realizadas: i64,
    pub taxa_adesao: f64,
    pub pacientes_ativos: i64,
    pub valor_recebido: Centavos,
    pub receita_acordada: Centavos,
    /// Valor absoluto de `receita_acordada - valor_recebido`
    pub diferenca: Centavos,
    pub status_diferenca: StatusDiferenca,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricasConsultas {
    pub taxa_adesao: f64,
    pub consultas_realizadas: i64,
    pub consultas_marcadas: i64,
    pub receita_total_recebida: Centavos,
    pub receita_acordada_mensal: Centavos,
    pub captacao_pacientes_mes: i64,
    pub pacientes_ativos: i64,
    pub terapeutas_ativos: i64,
    pub preco_medio_realizado: Centavos,
    pub tempo_medio_match: f64,
    pub porcentagem_inadimplentes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacientesComConsultas {
    pub pacientes_com_consultas: i64,
    pub total_pacientes_ativos: i64,
    pub porcentagem: f64,
}

/// Série para gráficos: rótulos e valores alinhados
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Serie<T> {
    pub rotulos: Vec<String>,
    pub valores: Vec<T>,
}

impl<T> Default for Serie<T> {
    fn default() -> Self {
        Serie {
            rotulos: Vec::new(),
            valores: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Painel {
    pub hoje: NaiveDate,
    pub config: ConfigMetricas,
    pub consultas: MetricasConsultas,
    pub terapeutas: Vec<MetricasTerapeuta>,
    pub pacientes_com_consultas: PacientesComConsultas,
    pub consultas_diarias: Serie<i64>,
    pub valor_diario: Serie<Centavos>,
    pub consultas_mensais: Serie<i64>,
    pub receita_mensal: Serie<Centavos>,
}

/// Dias cobertos pelas séries mensais e pela cobertura de pacientes
const DIAS_HISTORICO: i64 = 180;
/// Dias das séries diárias, terminando em `hoje`
const DIAS_SERIE_DIARIA: i64 = 7;

fn percentual(parte: i64, total: i64) -> f64 {
    if total > 0 {
        parte as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

fn inicio_do_mes(hoje: NaiveDate) -> DateTime<Utc> {
    let primeiro = hoje.with_day(1).unwrap_or(hoje);
    Utc.from_utc_datetime(&primeiro.and_time(NaiveTime::MIN))
}

#[derive(FromRow)]
struct LinhaTerapeuta {
    id: i64,
    nome: String,
    total_consultas: i64,
    consultas_realizadas: i64,
    pacientes_ativos: i64,
    valor_recebido: Centavos,
    receita_sessoes: Centavos,
}

/// Indicadores de cada terapeuta ativo, em ordem alfabética
pub async fn metricas_por_terapeuta(
    pool: &SqlitePool,
    hoje: NaiveDate,
    config: &ConfigMetricas,
) -> Result<Vec<MetricasTerapeuta>, DbError> {
    let inicio = config.janela.inicio(hoje);

    let linhas = sqlx::query_as::<_, LinhaTerapeuta>(
        r#"
        SELECT t.id, a.nome,
               COUNT(c.id) AS total_consultas,
               COUNT(CASE WHEN c.realizada = 1 THEN 1 END) AS consultas_realizadas,
               COUNT(DISTINCT CASE WHEN p.is_active = 1 THEN c.paciente_id END) AS pacientes_ativos,
               COALESCE(SUM(CASE WHEN c.valor_pago > 0 THEN c.valor_pago END), 0) AS valor_recebido,
               COALESCE(SUM(p.valor_sessao), 0) AS receita_sessoes
        FROM terapeutas t
        JOIN associados a ON a.id = t.associado_id
        LEFT JOIN consultas c ON c.terapeuta_id = t.id
                             AND (?1 IS NULL OR c.data_consulta >= ?1)
                             AND c.data_consulta <= ?2
        LEFT JOIN pacientes p ON p.id = c.paciente_id
        WHERE t.is_active = 1
        GROUP BY t.id, a.nome
        ORDER BY a.nome
        "#,
    )
    .bind(inicio)
    .bind(hoje)
    .fetch_all(pool)
    .await?;

    let acordada_por_paciente: HashMap<i64, Centavos> = match config.escopo_receita {
        EscopoReceita::SessoesNaJanela => HashMap::new(),
        EscopoReceita::PacientesAtivos => sqlx::query_as::<_, (i64, Centavos)>(
            r#"
            SELECT x.terapeuta_id, COALESCE(SUM(p.valor_sessao), 0)
            FROM (SELECT DISTINCT terapeuta_id, paciente_id
                  FROM consultas
                  WHERE (?1 IS NULL OR data_consulta >= ?1) AND data_consulta <= ?2) x
            JOIN pacientes p ON p.id = x.paciente_id
            WHERE p.is_active = 1
            GROUP BY x.terapeuta_id
            "#,
        )
        .bind(inicio)
        .bind(hoje)
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect(),
    };

    Ok(linhas
        .into_iter()
        .map(|linha| {
            let receita_acordada = match config.escopo_receita {
                EscopoReceita::SessoesNaJanela => linha.receita_sessoes,
                EscopoReceita::PacientesAtivos => acordada_por_paciente
                    .get(&linha.id)
                    .copied()
                    .unwrap_or(Centavos::ZERO),
            };
            let diferenca = receita_acordada - linha.valor_recebido;
            MetricasTerapeuta {
                terapeuta_id: linha.id,
                nome: linha.nome,
                total_consultas: linha.total_consultas,
                consultas_realizadas: linha.consultas_realizadas,
                taxa_adesao: percentual(linha.consultas_realizadas, linha.total_consultas),
                pacientes_ativos: linha.pacientes_ativos,
                valor_recebido: linha.valor_recebido,
                receita_acordada,
                diferenca: diferenca.abs(),
                status_diferenca: StatusDiferenca::de(diferenca),
            }
        })
        .collect())
}

#[derive(FromRow)]
struct LinhaConsultas {
    marcadas: i64,
    realizadas: i64,
    recebida: Centavos,
    valor_zero: i64,
    valor_informado: i64,
    preco_medio: Option<f64>,
}

#[derive(FromRow)]
struct LinhaPacientes {
    ativos: i64,
    captacao_mes: i64,
    acordada: Centavos,
}

/// Indicadores gerais da organização
pub async fn metricas_consultas(
    pool: &SqlitePool,
    hoje: NaiveDate,
    config: &ConfigMetricas,
) -> Result<MetricasConsultas, DbError> {
    let inicio = config.janela.inicio(hoje);

    let consultas = sqlx::query_as::<_, LinhaConsultas>(
        r#"
        SELECT COUNT(*) AS marcadas,
               COUNT(CASE WHEN realizada = 1 THEN 1 END) AS realizadas,
               COALESCE(SUM(CASE WHEN valor_pago > 0 THEN valor_pago END), 0) AS recebida,
               COUNT(CASE WHEN valor_pago = 0 THEN 1 END) AS valor_zero,
               COUNT(CASE WHEN valor_pago >= 0 THEN 1 END) AS valor_informado,
               AVG(CASE WHEN realizada = 1 AND valor_pago > 0 THEN valor_pago END) AS preco_medio
        FROM consultas
        WHERE (?1 IS NULL OR data_consulta >= ?1) AND data_consulta <= ?2
        "#,
    )
    .bind(inicio)
    .bind(hoje)
    .fetch_one(pool)
    .await?;

    let inicio_mes = inicio_do_mes(hoje);
    let pacientes = sqlx::query_as::<_, LinhaPacientes>(
        r#"
        SELECT COUNT(CASE WHEN is_active = 1 THEN 1 END) AS ativos,
               COUNT(CASE WHEN created_at >= ? THEN 1 END) AS captacao_mes,
               COALESCE(SUM(CASE WHEN is_active = 1 THEN valor_sessao END), 0) AS acordada
        FROM pacientes
        "#,
    )
    .bind(inicio_mes)
    .fetch_one(pool)
    .await?;

    let terapeutas_ativos: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM terapeutas WHERE is_active = 1")
            .fetch_one(pool)
            .await?;

    Ok(MetricasConsultas {
        taxa_adesao: percentual(consultas.realizadas, consultas.marcadas),
        consultas_realizadas: consultas.realizadas,
        consultas_marcadas: consultas.marcadas,
        receita_total_recebida: consultas.recebida,
        receita_acordada_mensal: pacientes.acordada,
        captacao_pacientes_mes: pacientes.captacao_mes,
        pacientes_ativos: pacientes.ativos,
        terapeutas_ativos,
        preco_medio_realizado: consultas
            .preco_medio
            .map(|media| Centavos(media.round() as i64))
            .unwrap_or(Centavos::ZERO),
        tempo_medio_match: tempo_medio_match(pool, inicio_mes).await?,
        porcentagem_inadimplentes: percentual(consultas.valor_zero, consultas.valor_informado),
    })
}

/// Média de dias entre o cadastro do paciente e o seu primeiro match, para
/// os pacientes cujo primeiro match foi criado a partir de `desde`
async fn tempo_medio_match(pool: &SqlitePool, desde: DateTime<Utc>) -> Result<f64, DbError> {
    let linhas: Vec<(i64, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT m.paciente_id, m.created_at, p.created_at
        FROM matches m
        JOIN pacientes p ON p.id = m.paciente_id
        ORDER BY m.created_at, m.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut vistos = HashSet::new();
    let dias: Vec<i64> = linhas
        .into_iter()
        .filter(|(paciente, _, _)| vistos.insert(*paciente))
        .filter(|(_, primeiro_match, _)| *primeiro_match >= desde)
        .map(|(_, primeiro_match, criado_paciente)| {
            (primeiro_match.date_naive() - criado_paciente.date_naive()).num_days()
        })
        .collect();

    if dias.is_empty() {
        return Ok(0.0);
    }
    Ok(dias.iter().sum::<i64>() as f64 / dias.len() as f64)
}

/// Parcela dos pacientes ativos com alguma consulta nos últimos 180 dias
pub async fn porcentagem_pacientes_com_consultas(
    pool: &SqlitePool,
    hoje: NaiveDate,
) -> Result<PacientesComConsultas, DbError> {
    let desde = hoje - Duration::days(DIAS_HISTORICO);
    let (com_consultas, ativos): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(DISTINCT p.id) FROM pacientes p
               JOIN consultas c ON c.paciente_id = p.id
              WHERE p.is_active = 1 AND c.data_consulta >= ?),
            (SELECT COUNT(*) FROM pacientes WHERE is_active = 1)
        "#,
    )
    .bind(desde)
    .fetch_one(pool)
    .await?;

    Ok(PacientesComConsultas {
        pacientes_com_consultas: com_consultas,
        total_pacientes_ativos: ativos,
        porcentagem: percentual(com_consultas, ativos),
    })
}

fn ultimos_dias(hoje: NaiveDate) -> Vec<NaiveDate> {
    (0..DIAS_SERIE_DIARIA)
        .rev()
        .map(|i| hoje - Duration::days(i))
        .collect()
}

async fn totais_diarios(
    pool: &SqlitePool,
    hoje: NaiveDate,
) -> Result<HashMap<NaiveDate, (i64, Centavos)>, DbError> {
    let desde = hoje - Duration::days(DIAS_SERIE_DIARIA - 1);
    let linhas: Vec<(NaiveDate, i64, Centavos)> = sqlx::query_as(
        r#"
        SELECT data_consulta, COUNT(*), COALESCE(SUM(valor_pago), 0)
        FROM consultas
        WHERE data_consulta >= ? AND data_consulta <= ?
        GROUP BY data_consulta
        "#,
    )
    .bind(desde)
    .bind(hoje)
    .fetch_all(pool)
    .await?;
    Ok(linhas
        .into_iter()
        .map(|(dia, quantidade, valor)| (dia, (quantidade, valor)))
        .collect())
}

/// Quantidade de consultas em cada um dos últimos 7 dias (mais antigo primeiro)
pub async fn consultas_diarias(pool: &SqlitePool, hoje: NaiveDate) -> Result<Serie<i64>, DbError> {
    let totais = totais_diarios(pool, hoje).await?;
    let dias = ultimos_dias(hoje);
    Ok(Serie {
        valores: dias
            .iter()
            .map(|d| totais.get(d).map(|t| t.0).unwrap_or(0))
            .collect(),
        rotulos: dias.iter().map(|d| d.to_string()).collect(),
    })
}

/// Soma do valor pago em cada um dos últimos 7 dias
pub async fn valor_diario(pool: &SqlitePool, hoje: NaiveDate) -> Result<Serie<Centavos>, DbError> {
    let totais = totais_diarios(pool, hoje).await?;
    let dias = ultimos_dias(hoje);
    Ok(Serie {
        valores: dias
            .iter()
            .map(|d| totais.get(d).map(|t| t.1).unwrap_or(Centavos::ZERO))
            .collect(),
        rotulos: dias.iter().map(|d| d.to_string()).collect(),
    })
}

/// Rótulo `%b/%Y` a partir de `AAAA-MM`
fn rotulo_mes(ano_mes: &str) -> String {
    NaiveDate::parse_from_str(&format!("{}-01", ano_mes), "%Y-%m-%d")
        .map(|d| d.format("%b/%Y").to_string())
        .unwrap_or_else(|_| ano_mes.to_string())
}

/// Consultas por mês nos últimos 180 dias (apenas meses com dados)
pub async fn consultas_mensais(pool: &SqlitePool, hoje: NaiveDate) -> Result<Serie<i64>, DbError> {
    let desde = hoje - Duration::days(DIAS_HISTORICO);
    let linhas: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT strftime('%Y-%m', data_consulta) AS mes, COUNT(*)
        FROM consultas
        WHERE data_consulta >= ?
        GROUP BY mes
        ORDER BY mes
        "#,
    )
    .bind(desde)
    .fetch_all(pool)
    .await?;

    let (rotulos, valores) = linhas
        .into_iter()
        .map(|(mes, quantidade)| (rotulo_mes(&mes), quantidade))
        .unzip();
    Ok(Serie { rotulos, valores })
}

/// Valor pago por mês nos últimos 180 dias, só pagamentos positivos
pub async fn receita_mensal(
    pool: &SqlitePool,
    hoje: NaiveDate,
) -> Result<Serie<Centavos>, DbError> {
    let desde = hoje - Duration::days(DIAS_HISTORICO);
    let linhas: Vec<(String, Centavos)> = sqlx::query_as(
        r#"
        SELECT strftime('%Y-%m', data_consulta) AS mes, SUM(valor_pago)
        FROM consultas
        WHERE data_consulta >= ? AND valor_pago > 0
        GROUP BY mes
        ORDER BY mes
        "#,
    )
    .bind(desde)
    .fetch_all(pool)
    .await?;

    let (rotulos, valores) = linhas
        .into_iter()
        .map(|(mes, valor)| (rotulo_mes(&mes), valor))
        .unzip();
    Ok(Serie { rotulos, valores })
}

fn ou_padrao<T: Default>(resultado: Result<T, DbError>, bloco: &str) -> T {
    resultado.unwrap_or_else(|e| {
        error!("Erro ao calcular {}: {}", bloco, e);
        T::default()
    })
}

/// Monta o painel completo; nunca falha
pub async fn painel(pool: &SqlitePool, hoje: NaiveDate, config: &ConfigMetricas) -> Painel {
    Painel {
        hoje,
        config: *config,
        consultas: ou_padrao(metricas_consultas(pool, hoje, config).await, "métricas de consultas"),
        terapeutas: ou_padrao(
            metricas_por_terapeuta(pool, hoje, config).await,
            "métricas por terapeuta",
        ),
        pacientes_com_consultas: ou_padrao(
            porcentagem_pacientes_com_consultas(pool, hoje).await,
            "pacientes com consultas",
        ),
        consultas_diarias: ou_padrao(consultas_diarias(pool, hoje).await, "consultas diárias"),
        valor_diario: ou_padrao(valor_diario(pool, hoje).await, "valor diário"),
        consultas_mensais: ou_padrao(consultas_mensais(pool, hoje).await, "consultas mensais"),
        receita_mensal: ou_padrao(receita_mensal(pool, hoje).await, "receita mensal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchEntrada;
    use crate::repositorio::matches;
    use crate::testing::{data, pool_em_memoria, Cenario};

    const HOJE: &str = "2024-05-20";

    #[tokio::test]
    async fn exemplo_pago_e_nao_pago_fica_igual() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paciente, "2024-05-10", Some(true), Some(15000)).await;
        cenario.nova_consulta(&pool, paciente, "2024-05-17", Some(true), Some(0)).await;

        let metricas = metricas_por_terapeuta(&pool, data(HOJE), &ConfigMetricas::default())
            .await
            .unwrap();
        assert_eq!(metricas.len(), 1);
        let teo = &metricas[0];
        assert_eq!(teo.valor_recebido, Centavos(15000));
        assert_eq!(teo.receita_acordada, Centavos(15000));
        assert_eq!(teo.diferenca, Centavos::ZERO);
        assert_eq!(teo.status_diferenca, StatusDiferenca::Igual);
        assert_eq!(teo.taxa_adesao, 100.0);
        assert_eq!(teo.pacientes_ativos, 1);
    }

    #[tokio::test]
    async fn escopo_por_sessao_soma_cada_consulta() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paciente = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paciente, "2024-05-10", Some(true), Some(15000)).await;
        cenario.nova_consulta(&pool, paciente, "2024-05-17", Some(false), Some(0)).await;

        let config = ConfigMetricas {
            escopo_receita: EscopoReceita::SessoesNaJanela,
            ..ConfigMetricas::default()
        };
        let metricas = metricas_por_terapeuta(&pool, data(HOJE), &config).await.unwrap();
        let teo = &metricas[0];
        assert_eq!(teo.receita_acordada, Centavos(30000));
        assert_eq!(teo.diferenca, Centavos(15000));
        assert_eq!(teo.status_diferenca, StatusDiferenca::Positivo);
        assert_eq!(teo.taxa_adesao, 50.0);
    }

    #[tokio::test]
    async fn tabelas_vazias_zeram_tudo() {
        let pool = pool_em_memoria().await;
        let hoje = data(HOJE);
        let config = ConfigMetricas::default();

        assert!(metricas_por_terapeuta(&pool, hoje, &config).await.unwrap().is_empty());
        assert_eq!(
            metricas_consultas(&pool, hoje, &config).await.unwrap(),
            MetricasConsultas::default()
        );
        assert_eq!(
            porcentagem_pacientes_com_consultas(&pool, hoje).await.unwrap(),
            PacientesComConsultas::default()
        );

        let diarias = consultas_diarias(&pool, hoje).await.unwrap();
        assert_eq!(diarias.valores, vec![0; 7]);
        assert_eq!(diarias.rotulos.first().map(String::as_str), Some("2024-05-14"));
        assert_eq!(diarias.rotulos.last().map(String::as_str), Some(HOJE));
        assert!(consultas_mensais(&pool, hoje).await.unwrap().valores.is_empty());
    }

    #[tokio::test]
    async fn terapeuta_sem_consultas_tem_taxa_zero() {
        let pool = pool_em_memoria().await;
        Cenario::montar(&pool).await;

        let metricas = metricas_por_terapeuta(&pool, data(HOJE), &ConfigMetricas::default())
            .await
            .unwrap();
        assert_eq!(metricas[0].total_consultas, 0);
        assert_eq!(metricas[0].taxa_adesao, 0.0);
        assert_eq!(metricas[0].status_diferenca, StatusDiferenca::Igual);
    }

    #[tokio::test]
    async fn indicadores_gerais() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let outro = cenario.novo_terapeuta(&pool, "Olga Outra").await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let rui = cenario.novo_paciente(&pool, "Rui", 10000).await;

        cenario.nova_consulta(&pool, paula, "2024-05-10", Some(true), Some(15000)).await;
        cenario.nova_consulta(&pool, paula, "2024-05-17", Some(true), Some(0)).await;
        cenario.consulta_de(&pool, outro, rui, "2024-05-18", Some(false), None).await;
        cenario.consulta_de(&pool, outro, rui, "2024-05-19", Some(true), Some(10000)).await;

        let hoje = data(HOJE);
        let geral = metricas_consultas(&pool, hoje, &ConfigMetricas::default()).await.unwrap();
        assert_eq!(geral.consultas_marcadas, 4);
        assert_eq!(geral.consultas_realizadas, 3);
        assert_eq!(geral.taxa_adesao, 75.0);
        assert_eq!(geral.receita_total_recebida, Centavos(25000));
        assert_eq!(geral.receita_acordada_mensal, Centavos(25000));
        assert_eq!(geral.pacientes_ativos, 2);
        assert_eq!(geral.terapeutas_ativos, 2);
        assert_eq!(geral.preco_medio_realizado, Centavos(12500));
        // um pagamento zerado entre três informados
        assert!((geral.porcentagem_inadimplentes - 100.0 / 3.0).abs() < 1e-9);

        let janela = ConfigMetricas {
            janela: Janela::Dias(3),
            ..ConfigMetricas::default()
        };
        let recente = metricas_consultas(&pool, hoje, &janela).await.unwrap();
        assert_eq!(recente.consultas_marcadas, 3);
        assert_eq!(recente.receita_total_recebida, Centavos(10000));

        let valores = valor_diario(&pool, hoje).await.unwrap();
        assert_eq!(
            valores.valores,
            vec![
                Centavos::ZERO,
                Centavos::ZERO,
                Centavos::ZERO,
                Centavos(0),
                Centavos::ZERO,
                Centavos(10000),
                Centavos::ZERO,
            ]
        );
        let diarias = consultas_diarias(&pool, hoje).await.unwrap();
        assert_eq!(diarias.valores, vec![0, 0, 0, 1, 1, 1, 0]);

        let mensais = consultas_mensais(&pool, hoje).await.unwrap();
        assert_eq!(mensais.rotulos, vec!["May/2024".to_string()]);
        assert_eq!(mensais.valores, vec![4]);
        let receita = receita_mensal(&pool, hoje).await.unwrap();
        assert_eq!(receita.valores, vec![Centavos(25000)]);
    }

    #[tokio::test]
    async fn recebido_ignora_pagamentos_nao_positivos() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paula, "2024-05-10", Some(true), Some(0)).await;
        cenario.nova_consulta(&pool, paula, "2024-05-11", None, None).await;

        let hoje = data(HOJE);
        let metricas = metricas_por_terapeuta(&pool, hoje, &ConfigMetricas::default())
            .await
            .unwrap();
        assert_eq!(metricas[0].valor_recebido, Centavos::ZERO);
        assert_eq!(metricas[0].status_diferenca, StatusDiferenca::Positivo);

        let geral = metricas_consultas(&pool, hoje, &ConfigMetricas::default()).await.unwrap();
        assert_eq!(geral.porcentagem_inadimplentes, 100.0);
        assert_eq!(geral.preco_medio_realizado, Centavos::ZERO);
    }

    #[tokio::test]
    async fn paciente_inativo_sai_da_receita_acordada() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paula, "2024-05-10", Some(true), Some(15000)).await;

        sqlx::query("UPDATE pacientes SET is_active = 0 WHERE id = ?")
            .bind(paula)
            .execute(&pool)
            .await
            .unwrap();

        let metricas = metricas_por_terapeuta(&pool, data(HOJE), &ConfigMetricas::default())
            .await
            .unwrap();
        assert_eq!(metricas[0].pacientes_ativos, 0);
        assert_eq!(metricas[0].receita_acordada, Centavos::ZERO);
        assert_eq!(metricas[0].status_diferenca, StatusDiferenca::Negativo);
        assert_eq!(metricas[0].diferenca, Centavos(15000));
    }

    #[tokio::test]
    async fn tempo_medio_usa_primeiro_match_do_paciente() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let hoje = Utc::now().date_naive();

        let cadastro = Utc::now() - Duration::days(4);
        sqlx::query("UPDATE pacientes SET created_at = ? WHERE id = ?")
            .bind(cadastro)
            .bind(paula)
            .execute(&pool)
            .await
            .unwrap();

        for _ in 0..2 {
            matches::criar(
                &pool,
                &MatchEntrada {
                    terapeuta_id: cenario.terapeuta,
                    paciente_id: paula,
                    data_consulta: hoje,
                },
            )
            .await
            .unwrap();
        }

        let geral = metricas_consultas(&pool, hoje, &ConfigMetricas::default()).await.unwrap();
        assert_eq!(geral.tempo_medio_match, 4.0);
    }

    #[tokio::test]
    async fn primeiro_match_do_mes_anterior_nao_conta() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let antiga = cenario.novo_paciente(&pool, "Antiga", 15000).await;
        let nova = cenario.novo_paciente(&pool, "Nova", 15000).await;
        let hoje = Utc::now().date_naive();
        let mes = inicio_do_mes(hoje);

        for (paciente, cadastro) in [(antiga, mes - Duration::days(60)), (nova, Utc::now() - Duration::days(4))] {
            sqlx::query("UPDATE pacientes SET created_at = ? WHERE id = ?")
                .bind(cadastro)
                .bind(paciente)
                .execute(&pool)
                .await
                .unwrap();
        }

        let entrada = |paciente_id| MatchEntrada {
            terapeuta_id: cenario.terapeuta,
            paciente_id,
            data_consulta: hoje,
        };
        let anterior = matches::criar(&pool, &entrada(antiga)).await.unwrap();
        sqlx::query("UPDATE matches SET created_at = ? WHERE id = ?")
            .bind(mes - Duration::days(5))
            .bind(anterior.id)
            .execute(&pool)
            .await
            .unwrap();
        matches::criar(&pool, &entrada(antiga)).await.unwrap();
        matches::criar(&pool, &entrada(nova)).await.unwrap();

        let geral = metricas_consultas(&pool, hoje, &ConfigMetricas::default()).await.unwrap();
        assert_eq!(geral.tempo_medio_match, 4.0);
    }

    #[tokio::test]
    async fn janela_enorme_equivale_ao_historico() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paula, "1990-01-10", Some(true), Some(15000)).await;

        assert_eq!(Janela::Dias(u32::MAX).inicio(data(HOJE)), None);
        let config = ConfigMetricas {
            janela: Janela::Dias(u32::MAX),
            ..ConfigMetricas::default()
        };
        let painel = painel(&pool, data(HOJE), &config).await;
        assert_eq!(painel.consultas.consultas_marcadas, 1);
        assert_eq!(painel.terapeutas[0].total_consultas, 1);
    }

    #[tokio::test]
    async fn pacientes_com_consulta_recente() {
        let pool = pool_em_memoria().await;
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let rui = cenario.novo_paciente(&pool, "Rui", 15000).await;
        cenario.nova_consulta(&pool, paula, "2024-05-10", None, None).await;
        cenario.nova_consulta(&pool, rui, "2023-01-10", None, None).await;

        let resultado = porcentagem_pacientes_com_consultas(&pool, data(HOJE)).await.unwrap();
        assert_eq!(resultado.pacientes_com_consultas, 1);
        assert_eq!(resultado.total_pacientes_ativos, 2);
        assert_eq!(resultado.porcentagem, 50.0);
    }

    #[tokio::test]
    async fn painel_sempre_monta() {
        let pool = pool_em_memoria().await;
        pool.close().await;

        let painel = painel(&pool, data(HOJE), &ConfigMetricas::default()).await;
        assert_eq!(painel.consultas, MetricasConsultas::default());
        assert!(painel.terapeutas.is_empty());
        assert!(painel.consultas_diarias.valores.is_empty());
    }
}
