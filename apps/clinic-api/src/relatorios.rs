//! Relatórios para download em CSV ou Excel
//!
//! Cada tipo vira uma [`Tabela`] (cabeçalho e linhas) e a tabela é escrita no
//! formato pedido. Tabela vazia gera arquivo só com o cabeçalho.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{Local, NaiveDate};
use common_db::metricas;
use common_db::models::DIMENSOES_SELECAO;
use common_db::repositorio::acessorios::{self, TabelaAcessorio};
use common_db::repositorio::{altas, associados, avaliacoes, consultas, pacientes, selecoes, terapeutas};
use common_db::Centavos;
use rust_xlsxwriter::{Format, Workbook};
use serde::Deserialize;
use tracing::info;

use crate::auth::{UsuarioPagina, PERMISSAO_PAINEL};
use crate::dashboard::hoje;
use crate::error::ApiError;
use crate::estado::Estado;

pub fn router() -> Router<Estado> {
    Router::new().route("/relatorio/", get(gerar))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoRelatorio {
    Associados,
    Pacientes,
    Terapeutas,
    Avaliacoes,
    Consultas,
    Dashboard,
    MetricasTerapeutas,
    AltasDesistencias,
    Selecoes,
    Captacoes,
}

impl TipoRelatorio {
    pub const TODOS: [TipoRelatorio; 10] = [
        TipoRelatorio::Associados,
        TipoRelatorio::Pacientes,
        TipoRelatorio::Terapeutas,
        TipoRelatorio::Avaliacoes,
        TipoRelatorio::Consultas,
        TipoRelatorio::Dashboard,
        TipoRelatorio::MetricasTerapeutas,
        TipoRelatorio::AltasDesistencias,
        TipoRelatorio::Selecoes,
        TipoRelatorio::Captacoes,
    ];

    pub fn nome(self) -> &'static str {
        match self {
            TipoRelatorio::Associados => "associados",
            TipoRelatorio::Pacientes => "pacientes",
            TipoRelatorio::Terapeutas => "terapeutas",
            TipoRelatorio::Avaliacoes => "avaliacoes",
            TipoRelatorio::Consultas => "consultas",
            TipoRelatorio::Dashboard => "dashboard",
            TipoRelatorio::MetricasTerapeutas => "metricas_terapeutas",
            TipoRelatorio::AltasDesistencias => "altas_desistencias",
            TipoRelatorio::Selecoes => "selecoes",
            TipoRelatorio::Captacoes => "captacoes",
        }
    }

    pub fn parse(texto: &str) -> Option<Self> {
        Self::TODOS.into_iter().find(|t| t.nome() == texto)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formato {
    Csv,
    Excel,
}

impl Formato {
    pub fn parse(texto: &str) -> Option<Self> {
        match texto {
            "csv" => Some(Formato::Csv),
            "excel" => Some(Formato::Excel),
            _ => None,
        }
    }

    fn extensao(self) -> &'static str {
        match self {
            Formato::Csv => "csv",
            Formato::Excel => "xlsx",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Formato::Csv => "text/csv; charset=utf-8",
            Formato::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Celula {
    Texto(String),
    Inteiro(i64),
    /// Valor em reais, duas casas
    Dinheiro(f64),
    /// Percentuais e médias, uma casa
    Numero(f64),
}

impl Celula {
    fn opcional<T: ToString>(valor: Option<T>) -> Celula {
        Celula::Texto(valor.map(|v| v.to_string()).unwrap_or_default())
    }

    fn dinheiro(valor: Centavos) -> Celula {
        Celula::Dinheiro(valor.as_f64())
    }

    fn data(valor: NaiveDate) -> Celula {
        Celula::Texto(valor.format("%d/%m/%Y").to_string())
    }

    fn sim_nao(valor: bool) -> Celula {
        Celula::Texto(if valor { "Sim" } else { "Não" }.to_string())
    }

    fn como_texto(&self) -> String {
        match self {
            Celula::Texto(texto) => texto.clone(),
            Celula::Inteiro(n) => n.to_string(),
            Celula::Dinheiro(n) => format!("{:.2}", n),
            Celula::Numero(n) => format!("{:.1}", n),
        }
    }
}

impl From<String> for Celula {
    fn from(texto: String) -> Self {
        Celula::Texto(texto)
    }
}

impl From<&str> for Celula {
    fn from(texto: &str) -> Self {
        Celula::Texto(texto.to_string())
    }
}

impl From<i64> for Celula {
    fn from(n: i64) -> Self {
        Celula::Inteiro(n)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tabela {
    pub cabecalho: Vec<String>,
    pub linhas: Vec<Vec<Celula>>,
}

impl Tabela {
    fn new(cabecalho: &[&str]) -> Self {
        Tabela {
            cabecalho: cabecalho.iter().map(|c| c.to_string()).collect(),
            linhas: Vec::new(),
        }
    }
}

/// Carrega os dados do relatório pedido
pub async fn montar(estado: &Estado, tipo: TipoRelatorio) -> Result<Tabela, ApiError> {
    let pool = &estado.pool;
    let tabela = match tipo {
        TipoRelatorio::Associados => {
            let mut tabela = Tabela::new(&[
                "ID", "Nome", "E-mail", "Telefone", "Faculdade", "Sexo", "CPF", "Setores", "Decano", "Ativo",
            ]);
            for a in associados::listar(pool).await? {
                let setores: Vec<&str> = a.setores.iter().map(|s| s.nome.as_str()).collect();
                tabela.linhas.push(vec![
                    a.id.into(),
                    a.nome.into(),
                    Celula::opcional(a.email),
                    a.telefone.into(),
                    Celula::opcional(a.faculdade),
                    a.sexo.rotulo().into(),
                    Celula::opcional(a.cpf),
                    setores.join(", ").into(),
                    Celula::sim_nao(a.is_decano),
                    Celula::sim_nao(a.is_active),
                ]);
            }
            tabela
        }
        TipoRelatorio::Pacientes => {
            let mut tabela = Tabela::new(&[
                "ID", "Nome", "Telefone", "E-mail", "Clínica", "Captação", "Modalidade", "Valor da sessão",
                "Total de consultas", "Ativo",
            ]);
            for p in pacientes::listar(pool).await? {
                tabela.linhas.push(vec![
                    p.id.into(),
                    p.nome.into(),
                    p.telefone.into(),
                    Celula::opcional(p.email),
                    p.clinica_nome.into(),
                    p.captacao_nome.into(),
                    p.modalidade_nome.into(),
                    Celula::dinheiro(p.valor_sessao),
                    p.total_consultas.into(),
                    Celula::sim_nao(p.is_active),
                ]);
            }
            tabela
        }
        TipoRelatorio::Terapeutas => {
            let mut tabela = Tabela::new(&[
                "ID", "Nome", "Decano", "Abordagem", "Núcleo", "Clínica", "Modalidade", "Consultas", "Pacientes",
                "Ativo",
            ]);
            for t in terapeutas::listar(pool).await? {
                tabela.linhas.push(vec![
                    t.id.into(),
                    t.associado_nome.into(),
                    t.decano_nome.into(),
                    t.abordagem_nome.into(),
                    t.nucleo_nome.into(),
                    t.clinica_nome.into(),
                    t.modalidade_nome.into(),
                    t.total_consultas.into(),
                    t.total_pacientes.into(),
                    Celula::sim_nao(t.is_active),
                ]);
            }
            tabela
        }
        TipoRelatorio::Avaliacoes => {
            let mut tabela = Tabela::new(&[
                "ID", "Data", "Terapeuta", "Paciente", "Momento", "Individual", "Interpessoal", "Social", "Geral",
                "Qualidade geral", "Continuar com terapeuta", "Continuar na Allos",
            ]);
            for a in avaliacoes::listar(pool).await? {
                tabela.linhas.push(vec![
                    a.id.into(),
                    Celula::data(a.data_consulta),
                    a.terapeuta_nome.into(),
                    a.paciente_nome.into(),
                    a.momento.rotulo().into(),
                    Celula::opcional(a.individual),
                    Celula::opcional(a.interpessoal),
                    Celula::opcional(a.social),
                    Celula::opcional(a.geral),
                    Celula::opcional(a.qualidade_geral),
                    Celula::sim_nao(a.continuar_terapeuta),
                    Celula::sim_nao(a.continuar_allos),
                ]);
            }
            tabela
        }
        TipoRelatorio::Consultas => {
            let mut tabela = Tabela::new(&[
                "ID", "Data", "Terapeuta", "Paciente", "Clínica", "Valor", "Valor pago", "Diferença", "Realizada",
            ]);
            for c in consultas::listar(pool).await? {
                let diferenca = c.diferenca_valor();
                tabela.linhas.push(vec![
                    c.id.into(),
                    Celula::data(c.data_consulta),
                    c.terapeuta_nome.into(),
                    c.paciente_nome.into(),
                    c.clinica_nome.into(),
                    Celula::dinheiro(c.valor_consulta),
                    c.valor_pago.map(Celula::dinheiro).unwrap_or(Celula::Texto(String::new())),
                    Celula::dinheiro(diferenca),
                    Celula::opcional(c.realizada.map(|r| if r { "Sim" } else { "Não" })),
                ]);
            }
            tabela
        }
        TipoRelatorio::Dashboard => {
            let painel = metricas::painel(pool, hoje(), &estado.metricas).await;
            let c = &painel.consultas;
            let cobertura = &painel.pacientes_com_consultas;
            let mut tabela = Tabela::new(&["Indicador", "Valor"]);
            let linhas: Vec<(&str, Celula)> = vec![
                ("Taxa de adesão (%)", Celula::Numero(c.taxa_adesao)),
                ("Consultas realizadas", c.consultas_realizadas.into()),
                ("Consultas marcadas", c.consultas_marcadas.into()),
                ("Receita total recebida", Celula::dinheiro(c.receita_total_recebida)),
                ("Receita acordada mensal", Celula::dinheiro(c.receita_acordada_mensal)),
                ("Captação de pacientes no mês", c.captacao_pacientes_mes.into()),
                ("Pacientes ativos", c.pacientes_ativos.into()),
                ("Terapeutas ativos", c.terapeutas_ativos.into()),
                ("Preço médio realizado", Celula::dinheiro(c.preco_medio_realizado)),
                ("Tempo médio até o match (dias)", Celula::Numero(c.tempo_medio_match)),
                ("Inadimplência (%)", Celula::Numero(c.porcentagem_inadimplentes)),
                ("Pacientes ativos com consultas", cobertura.pacientes_com_consultas.into()),
                ("Cobertura de pacientes (%)", Celula::Numero(cobertura.porcentagem)),
            ];
            tabela.linhas = linhas
                .into_iter()
                .map(|(rotulo, valor)| vec![rotulo.into(), valor])
                .collect();
            tabela
        }
        TipoRelatorio::MetricasTerapeutas => {
            let painel = metricas::painel(pool, hoje(), &estado.metricas).await;
            let mut tabela = Tabela::new(&[
                "Terapeuta", "Consultas", "Realizadas", "Taxa de adesão (%)", "Pacientes ativos", "Valor recebido",
                "Receita acordada", "Diferença", "Situação",
            ]);
            for m in painel.terapeutas {
                tabela.linhas.push(vec![
                    m.nome.into(),
                    m.total_consultas.into(),
                    m.consultas_realizadas.into(),
                    Celula::Numero(m.taxa_adesao),
                    m.pacientes_ativos.into(),
                    Celula::dinheiro(m.valor_recebido),
                    Celula::dinheiro(m.receita_acordada),
                    Celula::dinheiro(m.diferenca),
                    m.status_diferenca.como_str().into(),
                ]);
            }
            tabela
        }
        TipoRelatorio::AltasDesistencias => {
            let mut tabela = Tabela::new(&[
                "ID", "Terapeuta", "Paciente", "Data da sessão", "Tipo", "Cancelado por", "Momento", "Motivo",
            ]);
            for a in altas::listar(pool).await? {
                tabela.linhas.push(vec![
                    a.id.into(),
                    a.terapeuta_nome.into(),
                    a.paciente_nome.into(),
                    a.data_sessao.map(Celula::data).unwrap_or(Celula::Texto(String::new())),
                    Celula::opcional(a.tipo.map(|t| t.rotulo())),
                    Celula::opcional(a.cancelador.map(|c| c.rotulo())),
                    Celula::opcional(a.momento.map(|m| m.rotulo())),
                    Celula::opcional(a.motivo_cancelamento),
                ]);
            }
            tabela
        }
        TipoRelatorio::Selecoes => {
            let mut cabecalho = vec!["ID", "Data", "Avaliador", "Avaliado"];
            cabecalho.extend(DIMENSOES_SELECAO.iter().map(|(_, rotulo)| *rotulo));
            cabecalho.push("Total");
            let mut tabela = Tabela::new(&cabecalho);
            for s in selecoes::listar(pool).await? {
                let notas = s.notas();
                let mut linha: Vec<Celula> = vec![
                    s.id.into(),
                    Celula::data(s.data_avaliacao),
                    s.avaliador_nome.into(),
                    s.avaliado_nome.into(),
                ];
                linha.extend(notas.iter().map(|&n| Celula::Inteiro(n)));
                linha.push(Celula::Inteiro(notas.iter().sum()));
                tabela.linhas.push(linha);
            }
            tabela
        }
        TipoRelatorio::Captacoes => {
            let mut por_captacao: HashMap<i64, (i64, i64)> = HashMap::new();
            for p in pacientes::listar(pool).await? {
                let contagem = por_captacao.entry(p.captacao_id).or_default();
                contagem.0 += 1;
                if p.is_active {
                    contagem.1 += 1;
                }
            }
            let mut tabela = Tabela::new(&["ID", "Captação", "Ativa", "Pacientes", "Pacientes ativos"]);
            for c in acessorios::listar(pool, TabelaAcessorio::Captacao).await? {
                let (total, ativos) = por_captacao.get(&c.id).copied().unwrap_or_default();
                tabela.linhas.push(vec![
                    c.id.into(),
                    c.nome.into(),
                    Celula::sim_nao(c.is_active),
                    total.into(),
                    ativos.into(),
                ]);
            }
            tabela
        }
    };
    Ok(tabela)
}

pub fn gerar_csv(tabela: &Tabela) -> Result<Vec<u8>, ApiError> {
    let falha = |e: csv::Error| ApiError::Interno(format!("Falha ao gerar CSV: {}", e));
    let mut escritor = csv::Writer::from_writer(Vec::new());
    escritor.write_record(&tabela.cabecalho).map_err(falha)?;
    for linha in &tabela.linhas {
        escritor
            .write_record(linha.iter().map(Celula::como_texto))
            .map_err(falha)?;
    }
    escritor
        .into_inner()
        .map_err(|e| ApiError::Interno(format!("Falha ao gerar CSV: {}", e)))
}

pub fn gerar_excel(tabela: &Tabela, aba: &str) -> Result<Vec<u8>, ApiError> {
    gerar_planilha(tabela, aba).map_err(|e| ApiError::Interno(format!("Falha ao gerar planilha: {}", e)))
}

fn gerar_planilha(tabela: &Tabela, aba: &str) -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    let negrito = Format::new().set_bold();
    let dinheiro = Format::new().set_num_format("0.00");
    let numero = Format::new().set_num_format("0.0");

    let planilha = workbook.add_worksheet();
    planilha.set_name(aba)?;
    for (coluna, titulo) in tabela.cabecalho.iter().enumerate() {
        planilha.write_string_with_format(0, coluna as u16, titulo, &negrito)?;
    }
    for (i, linha) in tabela.linhas.iter().enumerate() {
        let linha_planilha = (i + 1) as u32;
        for (coluna, celula) in linha.iter().enumerate() {
            let coluna = coluna as u16;
            match celula {
                Celula::Texto(texto) => {
                    planilha.write_string(linha_planilha, coluna, texto)?;
                }
                Celula::Inteiro(n) => {
                    planilha.write_number(linha_planilha, coluna, *n as f64)?;
                }
                Celula::Dinheiro(n) => {
                    planilha.write_number_with_format(linha_planilha, coluna, *n, &dinheiro)?;
                }
                Celula::Numero(n) => {
                    planilha.write_number_with_format(linha_planilha, coluna, *n, &numero)?;
                }
            }
        }
    }
    workbook.save_to_buffer()
}

#[derive(Debug, Deserialize)]
pub struct ParametrosRelatorio {
    tipo: Option<String>,
    formato: Option<String>,
}

pub async fn gerar(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Query(parametros): Query<ParametrosRelatorio>,
) -> Result<Response, ApiError> {
    usuario.exigir(PERMISSAO_PAINEL)?;

    let tipo_texto = parametros.tipo.unwrap_or_default();
    let tipo = TipoRelatorio::parse(&tipo_texto)
        .ok_or_else(|| ApiError::RequisicaoInvalida(format!("Tipo de relatório desconhecido: '{}'", tipo_texto)))?;
    let formato_texto = parametros.formato.unwrap_or_else(|| "csv".to_string());
    let formato = Formato::parse(&formato_texto)
        .ok_or_else(|| ApiError::RequisicaoInvalida(format!("Formato desconhecido: '{}'", formato_texto)))?;

    let tabela = montar(&estado, tipo).await?;
    let conteudo = match formato {
        Formato::Csv => gerar_csv(&tabela)?,
        Formato::Excel => gerar_excel(&tabela, tipo.nome())?,
    };
    let arquivo = format!(
        "relatorio_{}_{}.{}",
        tipo.nome(),
        Local::now().format("%Y%m%d_%H%M%S"),
        formato.extensao()
    );
    info!(
        "Relatório {} gerado por {} ({} linhas)",
        arquivo,
        usuario.usuario.username,
        tabela.linhas.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, formato.content_type().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", arquivo)),
        ],
        conteudo,
    )
        .into_response())
}
