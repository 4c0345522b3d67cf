//! Painel de métricas: página HTML e os mesmos dados em JSON

use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use common_db::metricas::{self, MetricasTerapeuta, Painel};

use crate::auth::{UsuarioAutenticado, UsuarioPagina, PERMISSAO_PAINEL};
use crate::error::ApiError;
use crate::estado::Estado;
use crate::paginas::renderizar;

pub fn router() -> Router<Estado> {
    Router::new()
        .route("/dashboard/", get(pagina))
        .route("/dashboard/dados/", get(dados))
}

/// Data de referência das métricas, no mesmo relógio (UTC) dos `created_at`
pub fn hoje() -> NaiveDate {
    Utc::now().date_naive()
}

struct Cartao {
    rotulo: &'static str,
    valor: String,
}

struct LinhaTerapeuta {
    nome: String,
    total_consultas: i64,
    consultas_realizadas: i64,
    taxa_adesao: String,
    pacientes_ativos: i64,
    valor_recebido: String,
    receita_acordada: String,
    diferenca: String,
    status: &'static str,
}

impl From<&MetricasTerapeuta> for LinhaTerapeuta {
    fn from(m: &MetricasTerapeuta) -> Self {
        LinhaTerapeuta {
            nome: m.nome.clone(),
            total_consultas: m.total_consultas,
            consultas_realizadas: m.consultas_realizadas,
            taxa_adesao: format!("{:.1}", m.taxa_adesao),
            pacientes_ativos: m.pacientes_ativos,
            valor_recebido: m.valor_recebido.formatar_br(),
            receita_acordada: m.receita_acordada.formatar_br(),
            diferenca: m.diferenca.formatar_br(),
            status: m.status_diferenca.como_str(),
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct PaginaPainel {
    titulo: &'static str,
    hoje: String,
    cartoes: Vec<Cartao>,
    terapeutas: Vec<LinhaTerapeuta>,
    cobertura: String,
    /// Painel serializado para os gráficos, seguro dentro de `<script>`
    dados_json: String,
}

fn cartoes(painel: &Painel) -> Vec<Cartao> {
    let c = &painel.consultas;
    vec![
        Cartao { rotulo: "Taxa de adesão", valor: format!("{:.1}%", c.taxa_adesao) },
        Cartao { rotulo: "Consultas realizadas", valor: c.consultas_realizadas.to_string() },
        Cartao { rotulo: "Consultas marcadas", valor: c.consultas_marcadas.to_string() },
        Cartao { rotulo: "Receita recebida", valor: format!("R$ {}", c.receita_total_recebida.formatar_br()) },
        Cartao { rotulo: "Receita acordada mensal", valor: format!("R$ {}", c.receita_acordada_mensal.formatar_br()) },
        Cartao { rotulo: "Captação no mês", valor: c.captacao_pacientes_mes.to_string() },
        Cartao { rotulo: "Pacientes ativos", valor: c.pacientes_ativos.to_string() },
        Cartao { rotulo: "Terapeutas ativos", valor: c.terapeutas_ativos.to_string() },
        Cartao { rotulo: "Preço médio realizado", valor: format!("R$ {}", c.preco_medio_realizado.formatar_br()) },
        Cartao { rotulo: "Tempo médio até o match (dias)", valor: format!("{:.1}", c.tempo_medio_match) },
        Cartao { rotulo: "Inadimplência", valor: format!("{:.1}%", c.porcentagem_inadimplentes) },
    ]
}

fn json_para_script(painel: &Painel) -> Result<String, ApiError> {
    let json = serde_json::to_string(painel)
        .map_err(|e| ApiError::Interno(format!("Falha ao serializar painel: {}", e)))?;
    Ok(json.replace('<', "\\u003c"))
}

pub async fn pagina(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
) -> Result<Response, ApiError> {
    usuario.exigir(PERMISSAO_PAINEL)?;
    let painel = metricas::painel(&estado.pool, hoje(), &estado.metricas).await;
    let cobertura = &painel.pacientes_com_consultas;

    let html = renderizar(&PaginaPainel {
        titulo: "Painel",
        hoje: painel.hoje.format("%d/%m/%Y").to_string(),
        cartoes: cartoes(&painel),
        terapeutas: painel.terapeutas.iter().map(LinhaTerapeuta::from).collect(),
        cobertura: format!(
            "{} de {} pacientes ativos com consultas ({:.1}%)",
            cobertura.pacientes_com_consultas, cobertura.total_pacientes_ativos, cobertura.porcentagem
        ),
        dados_json: json_para_script(&painel)?,
    })?;
    Ok(html.into_response())
}

pub async fn dados(
    State(estado): State<Estado>,
    usuario: UsuarioAutenticado,
) -> Result<Json<Painel>, ApiError> {
    usuario.exigir(PERMISSAO_PAINEL)?;
    Ok(Json(metricas::painel(&estado.pool, hoje(), &estado.metricas).await))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use common_db::testing::Cenario;

    use super::*;
    use crate::testes::{chamar, chamar_form, texto, Ambiente};

    #[test]
    fn json_nao_fecha_o_script() {
        let mut painel = Painel {
            hoje: common_db::testing::data("2024-05-20"),
            config: Default::default(),
            consultas: Default::default(),
            terapeutas: Vec::new(),
            pacientes_com_consultas: Default::default(),
            consultas_diarias: Default::default(),
            valor_diario: Default::default(),
            consultas_mensais: Default::default(),
            receita_mensal: Default::default(),
        };
        painel.consultas_mensais.rotulos.push("</script>".into());
        let json = json_para_script(&painel).unwrap();
        assert!(!json.contains("</script>"));
        assert!(json.contains("\\u003c/script>"));
    }

    #[tokio::test]
    async fn painel_mostra_metricas_por_terapeuta() {
        let ambiente = Ambiente::novo().await;
        let pool = ambiente.estado.pool.clone();
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paula, "2024-05-10", Some(true), Some(15000)).await;
        let token = ambiente.staff("gestora", &[PERMISSAO_PAINEL]).await;

        let resposta = chamar_form(&ambiente.app(), Method::GET, "/dashboard/", Some(&token), "").await;
        assert_eq!(resposta.status(), StatusCode::OK);
        let html = texto(resposta).await;
        assert!(html.contains("Teodoro Terapeuta"));
        assert!(html.contains("150,00"));
        assert!(html.contains("dados-painel"));
    }

    #[tokio::test]
    async fn dados_em_json() {
        let ambiente = Ambiente::novo().await;
        let pool = ambiente.estado.pool.clone();
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        cenario.nova_consulta(&pool, paula, "2024-05-10", Some(true), Some(15000)).await;
        cenario.nova_consulta(&pool, paula, "2024-05-17", Some(false), None).await;
        let token = ambiente.superusuario().await;

        let (status, json) = chamar(&ambiente.app(), Method::GET, "/dashboard/dados/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["consultas"]["consultas_marcadas"], 2);
        assert_eq!(json["consultas"]["consultas_realizadas"], 1);
        assert_eq!(json["terapeutas"][0]["nome"], "Teodoro Terapeuta");
        assert_eq!(json["terapeutas"][0]["valor_recebido"], "150.00");
    }

    #[tokio::test]
    async fn referencia_em_utc_como_os_cadastros() {
        let ambiente = Ambiente::novo().await;
        let pool = ambiente.estado.pool.clone();
        let cenario = Cenario::montar(&pool).await;
        cenario.novo_paciente(&pool, "Paula", 15000).await;
        let token = ambiente.superusuario().await;

        let (status, json) = chamar(&ambiente.app(), Method::GET, "/dashboard/dados/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["hoje"], Utc::now().date_naive().to_string());
        assert_eq!(json["consultas"]["captacao_pacientes_mes"], 1);
    }

    #[tokio::test]
    async fn painel_exige_permissao() {
        let ambiente = Ambiente::novo().await;
        let token = ambiente.usuario("visitante", "senha", &[]).await;
        let app = ambiente.app();

        let resposta = chamar_form(&app, Method::GET, "/dashboard/", Some(&token), "").await;
        assert_eq!(resposta.status(), StatusCode::FORBIDDEN);

        let (status, _) = chamar(&app, Method::GET, "/dashboard/dados/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
