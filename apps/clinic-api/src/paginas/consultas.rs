//! Páginas de consultas: listagem paginada, cadastro em lote, detalhe,
//! edição e exclusão

use std::collections::HashMap;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::NaiveDate;
use common_db::models::{validar_realizada_e_paga, Consulta, ConsultaEntrada};
use common_db::repositorio::consultas::{
    self, FiltroConsultas, Ordem, Pagina, SessaoLote, Visibilidade,
};
use common_db::{Centavos, DbError, ErrosCampos};
use serde::Deserialize;
use tracing::info;

use super::{
    id_obrigatorio, marcado, opcoes_pacientes_ativos, opcoes_terapeutas, renderizar,
    terapeuta_logado, Erros, Opcao,
};
use crate::auth::{UsuarioAutenticado, UsuarioPagina};
use crate::error::ApiError;
use crate::estado::Estado;

const POR_PAGINA: u32 = 10;
/// Sessões por cadastro em lote (um ano de sessões semanais)
pub const MAX_SESSOES_LOTE: usize = 52;

fn formatar_data(data: NaiveDate) -> String {
    data.format("%d/%m/%Y").to_string()
}

fn sim_nao(valor: Option<bool>) -> &'static str {
    match valor {
        Some(true) => "Sim",
        Some(false) => "Não",
        None => "-",
    }
}

fn ler_data(texto: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(texto.trim(), "%Y-%m-%d").ok()
}

/// Quem vê o quê na listagem: terapeuta vê as próprias, staff vê todas
async fn visibilidade(estado: &Estado, usuario: &UsuarioAutenticado) -> Result<Visibilidade, ApiError> {
    if let Some(terapeuta) = terapeuta_logado(&estado.pool, usuario).await? {
        return Ok(Visibilidade::DoTerapeuta(terapeuta.id));
    }
    if usuario.usuario.is_staff || usuario.usuario.is_superuser {
        Ok(Visibilidade::Todas)
    } else {
        Ok(Visibilidade::Nenhuma)
    }
}

// ---------------------------------------------------------------------------
// Listagem
// ---------------------------------------------------------------------------

struct LinhaConsulta {
    id: i64,
    data: String,
    paciente: String,
    terapeuta: String,
    valor_consulta: String,
    valor_pago: String,
    realizada: &'static str,
}

impl From<Consulta> for LinhaConsulta {
    fn from(c: Consulta) -> Self {
        LinhaConsulta {
            id: c.id,
            data: formatar_data(c.data_consulta),
            paciente: c.paciente_nome,
            terapeuta: c.terapeuta_nome,
            valor_consulta: c.valor_consulta.formatar_br(),
            valor_pago: c.valor_pago.map(Centavos::formatar_br).unwrap_or_else(|| "-".into()),
            realizada: sim_nao(c.realizada),
        }
    }
}

#[derive(Template)]
#[template(path = "consulta_lista.html")]
struct PaginaLista {
    titulo: &'static str,
    consultas: Vec<LinhaConsulta>,
    nome: String,
    ordem: String,
    pagina: u32,
    total_paginas: u32,
    total_itens: i64,
    tem_anterior: bool,
    tem_proxima: bool,
}

impl PaginaLista {
    /// `order_by` do cabeçalho da coluna: inverte quando já ordenada por ela
    fn link_ordem(&self, chave: &str) -> String {
        if self.ordem == chave {
            format!("-{}", chave)
        } else {
            chave.to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParametrosLista {
    nome: Option<String>,
    order_by: Option<String>,
    page: Option<u32>,
}

pub async fn lista(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Query(parametros): Query<ParametrosLista>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.view_consulta")?;

    let filtro = FiltroConsultas {
        visibilidade: visibilidade(&estado, &usuario).await?,
        nome: parametros.nome.clone(),
        ordem: parametros
            .order_by
            .as_deref()
            .map(Ordem::parse)
            .unwrap_or_default(),
        pagina: parametros.page.unwrap_or(1),
        por_pagina: POR_PAGINA,
    };
    let pagina: Pagina<Consulta> = consultas::listar_paginado(&estado.pool, &filtro).await?;

    let html = renderizar(&PaginaLista {
        titulo: "Consultas",
        tem_anterior: pagina.tem_anterior(),
        tem_proxima: pagina.tem_proxima(),
        pagina: pagina.pagina,
        total_paginas: pagina.total_paginas,
        total_itens: pagina.total_itens,
        consultas: pagina.itens.into_iter().map(LinhaConsulta::from).collect(),
        nome: parametros.nome.unwrap_or_default(),
        ordem: filtro.ordem.como_parametro(),
    })?;
    Ok(html.into_response())
}

// ---------------------------------------------------------------------------
// Cadastro em lote
// ---------------------------------------------------------------------------

struct LinhaSessao {
    indice: usize,
    numero: usize,
    data: String,
    realizada: bool,
    erro: String,
}

#[derive(Template)]
#[template(path = "consulta_criar.html")]
struct PaginaLote {
    titulo: &'static str,
    terapeutas: Vec<Opcao>,
    terapeuta_travado: bool,
    pacientes: Vec<Opcao>,
    quantidade: usize,
    vlr_pix_total: String,
    sessoes: Vec<LinhaSessao>,
    erros: Erros,
}

#[derive(Debug, Deserialize)]
pub struct ParametrosLote {
    quantidade: Option<usize>,
}

async fn pagina_lote(
    estado: &Estado,
    usuario: &UsuarioAutenticado,
    campos: &HashMap<String, String>,
    quantidade: usize,
    erros: ErrosCampos,
) -> Result<Response, ApiError> {
    let logado = terapeuta_logado(&estado.pool, usuario).await?;
    let terapeuta_id = campos.get("terapeuta_id").and_then(|v| v.parse().ok());
    let paciente_id = campos.get("paciente_id").and_then(|v| v.parse().ok());
    let sessoes = (0..quantidade)
        .map(|i| LinhaSessao {
            indice: i,
            numero: i + 1,
            data: campos
                .get(&format!("data_consulta_{}", i))
                .cloned()
                .unwrap_or_default(),
            realizada: marcado(campos.get(&format!("is_realizado_{}", i)).map(String::as_str)),
            erro: erros
                .campo(&format!("data_consulta_{}", i))
                .map(|m| m.join(" "))
                .unwrap_or_default(),
        })
        .collect();

    let html = renderizar(&PaginaLote {
        titulo: "Nova consulta",
        terapeutas: opcoes_terapeutas(&estado.pool, logado.as_ref(), terapeuta_id).await?,
        terapeuta_travado: logado.is_some(),
        pacientes: opcoes_pacientes_ativos(&estado.pool, paciente_id).await?,
        quantidade,
        vlr_pix_total: campos.get("vlr_pix_total").cloned().unwrap_or_default(),
        sessoes,
        erros: Erros(erros),
    })?;
    Ok(html.into_response())
}

pub async fn formulario_lote(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Query(parametros): Query<ParametrosLote>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.add_consulta")?;
    let quantidade = parametros.quantidade.unwrap_or(1).clamp(1, MAX_SESSOES_LOTE);
    pagina_lote(&estado, &usuario, &HashMap::new(), quantidade, ErrosCampos::new()).await
}

/// Dados do lote já validados
#[derive(Debug, PartialEq)]
struct Lote {
    terapeuta_id: i64,
    paciente_id: i64,
    valor_total: Centavos,
    sessoes: Vec<SessaoLote>,
}

/// Lê o formulário dinâmico (`data_consulta_<i>`, `is_realizado_<i>`)
fn ler_lote(
    campos: &HashMap<String, String>,
    terapeuta_forcado: Option<i64>,
) -> (usize, Result<Lote, ErrosCampos>) {
    let mut erros = ErrosCampos::new();
    let campo = |nome: &str| campos.get(nome).map(String::as_str);

    let quantidade = match campo("quantidade").map(str::trim).and_then(|q| q.parse::<usize>().ok()) {
        Some(q) if q > MAX_SESSOES_LOTE => {
            erros.adicionar(
                "quantidade",
                format!("No máximo {} consultas por cadastro.", MAX_SESSOES_LOTE),
            );
            MAX_SESSOES_LOTE
        }
        Some(q) if q >= 1 => q,
        _ => {
            erros.adicionar("quantidade", "Informe a quantidade de consultas (mínimo 1).");
            1
        }
    };

    let terapeuta_id = match terapeuta_forcado {
        Some(id) => Some(id),
        None => id_obrigatorio(
            campo("terapeuta_id"),
            "terapeuta_id",
            "Selecione o terapeuta.",
            &mut erros,
        ),
    };
    let paciente_id = id_obrigatorio(
        campo("paciente_id"),
        "paciente_id",
        "Selecione o paciente.",
        &mut erros,
    );

    let valor_total = match campo("vlr_pix_total").map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            erros.adicionar("valor_pix_total", "O valor total recebido no PIX é obrigatório.");
            None
        }
        Some(texto) => match Centavos::parse(texto) {
            Some(valor) => Some(valor),
            None => {
                erros.adicionar("valor_pix_total", "Informe um valor numérico válido.");
                None
            }
        },
    };

    let mut sessoes = Vec::new();
    for i in 0..quantidade {
        let chave = format!("data_consulta_{}", i);
        match campo(&chave).and_then(ler_data) {
            Some(data_consulta) => sessoes.push(SessaoLote {
                data_consulta,
                realizada: marcado(campo(&format!("is_realizado_{}", i))),
            }),
            None => erros.adicionar(&chave, format!("Data da consulta {} é obrigatória.", i + 1)),
        }
    }

    match (terapeuta_id, paciente_id, valor_total) {
        (Some(terapeuta_id), Some(paciente_id), Some(valor_total)) if erros.is_empty() => (
            quantidade,
            Ok(Lote {
                terapeuta_id,
                paciente_id,
                valor_total,
                sessoes,
            }),
        ),
        _ => (quantidade, Err(erros)),
    }
}

pub async fn criar_lote(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Form(campos): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.add_consulta")?;

    let forcado = terapeuta_logado(&estado.pool, &usuario).await?.map(|t| t.id);
    let (quantidade, lote) = ler_lote(&campos, forcado);
    let lote = match lote {
        Ok(lote) => lote,
        Err(erros) => return pagina_lote(&estado, &usuario, &campos, quantidade, erros).await,
    };

    match consultas::criar_em_lote(
        &estado.pool,
        lote.terapeuta_id,
        lote.paciente_id,
        lote.valor_total,
        &lote.sessoes,
    )
    .await
    {
        Ok(ids) => {
            info!(
                "{} consulta(s) cadastrada(s) por {}; valor por consulta {}",
                ids.len(),
                usuario.usuario.username,
                lote.valor_total.dividir(ids.len() as u32)
            );
            Ok(Redirect::to("/consulta/list/").into_response())
        }
        Err(DbError::Validacao(erros)) => {
            pagina_lote(&estado, &usuario, &campos, quantidade, erros).await
        }
        Err(DbError::ConstraintViolation(_)) => {
            let mut erros = ErrosCampos::new();
            erros.adicionar(ErrosCampos::GERAL, "Terapeuta ou paciente inexistente.");
            pagina_lote(&estado, &usuario, &campos, quantidade, erros).await
        }
        Err(outro) => Err(outro.into()),
    }
}

// ---------------------------------------------------------------------------
// Detalhe
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "consulta_detalhe.html")]
struct PaginaDetalhe {
    titulo: &'static str,
    consulta: LinhaConsulta,
    abordagem: String,
    clinica: String,
    decano: String,
    diferenca_valor: String,
    diferenca_negativa: bool,
}

pub async fn detalhe(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.view_consulta")?;
    let consulta = consultas::buscar(&estado.pool, id).await?;
    let diferenca = consulta.diferenca_valor();

    let html = renderizar(&PaginaDetalhe {
        titulo: "Detalhes da consulta",
        abordagem: consulta.abordagem_nome.clone(),
        clinica: consulta.clinica_nome.clone(),
        decano: consulta.decano_nome.clone(),
        diferenca_valor: diferenca.formatar_br(),
        diferenca_negativa: diferenca.0 < 0,
        consulta: LinhaConsulta::from(consulta),
    })?;
    Ok(html.into_response())
}

// ---------------------------------------------------------------------------
// Edição
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "consulta_editar.html")]
struct PaginaEdicao {
    titulo: &'static str,
    id: i64,
    paciente: String,
    terapeuta: String,
    dat_consulta: String,
    vlr_consulta: String,
    vlr_pago: String,
    is_realizado: bool,
    is_pago: bool,
    erros: Erros,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormEdicao {
    #[serde(default)]
    dat_consulta: String,
    #[serde(default)]
    vlr_consulta: String,
    vlr_pago: Option<String>,
    is_realizado: Option<String>,
    is_pago: Option<String>,
}

fn pagina_edicao(consulta: &Consulta, form: &FormEdicao, erros: ErrosCampos) -> Result<Response, ApiError> {
    let html = renderizar(&PaginaEdicao {
        titulo: "Editar consulta",
        id: consulta.id,
        paciente: consulta.paciente_nome.clone(),
        terapeuta: consulta.terapeuta_nome.clone(),
        dat_consulta: form.dat_consulta.clone(),
        vlr_consulta: form.vlr_consulta.clone(),
        vlr_pago: form.vlr_pago.clone().unwrap_or_default(),
        is_realizado: marcado(form.is_realizado.as_deref()),
        is_pago: marcado(form.is_pago.as_deref()),
        erros: Erros(erros),
    })?;
    Ok(html.into_response())
}

/// Aplica as regras do formulário de edição sobre a consulta existente
fn ler_edicao(consulta: &Consulta, form: &FormEdicao) -> Result<ConsultaEntrada, ErrosCampos> {
    let mut erros = ErrosCampos::new();

    let data_consulta = ler_data(&form.dat_consulta);
    if data_consulta.is_none() {
        erros.adicionar("dat_consulta", "Informe uma data válida.");
    }

    let valor_consulta = Centavos::parse(&form.vlr_consulta);
    match valor_consulta {
        None => erros.adicionar("vlr_consulta", "Informe um valor numérico válido."),
        Some(valor) if !valor.is_positive() => {
            erros.adicionar("vlr_consulta", "O valor da consulta deve ser positivo.")
        }
        Some(_) => {}
    }

    let informado = match form.vlr_pago.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => None,
        Some(texto) => match Centavos::parse(texto) {
            Some(valor) if valor.0 < 0 => {
                erros.adicionar("vlr_pago", "O valor pago não pode ser negativo.");
                None
            }
            Some(valor) => Some(valor),
            None => {
                erros.adicionar("vlr_pago", "Informe um valor numérico válido.");
                None
            }
        },
    };

    let realizada = marcado(form.is_realizado.as_deref());
    let pago = marcado(form.is_pago.as_deref());
    if let Err(erro) = validar_realizada_e_paga(Some(realizada), pago) {
        let mensagem = erro.message.map(|m| m.to_string()).unwrap_or_default();
        erros.adicionar("is_pago", mensagem);
    }

    match (data_consulta, valor_consulta) {
        (Some(data_consulta), Some(valor_consulta)) if erros.is_empty() => {
            // pago sem valor informado assume o valor da consulta
            let valor_pago = if pago {
                informado.filter(|v| *v != Centavos::ZERO).unwrap_or(valor_consulta)
            } else {
                Centavos::ZERO
            };
            Ok(ConsultaEntrada {
                terapeuta_id: consulta.terapeuta_id,
                paciente_id: consulta.paciente_id,
                valor_consulta,
                realizada: Some(realizada),
                valor_pago: Some(valor_pago),
                data_consulta,
            })
        }
        _ => Err(erros),
    }
}

pub async fn formulario_edicao(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.change_consulta")?;
    let consulta = consultas::buscar(&estado.pool, id).await?;
    let form = FormEdicao {
        dat_consulta: consulta.data_consulta.format("%Y-%m-%d").to_string(),
        vlr_consulta: consulta.valor_consulta.to_string(),
        vlr_pago: consulta.valor_pago.map(|v| v.to_string()),
        is_realizado: (consulta.realizada == Some(true)).then(|| "on".to_string()),
        is_pago: consulta
            .valor_pago
            .filter(|v| v.is_positive())
            .map(|_| "on".to_string()),
    };
    pagina_edicao(&consulta, &form, ErrosCampos::new())
}

pub async fn editar(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
    Form(form): Form<FormEdicao>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.change_consulta")?;
    let consulta = consultas::buscar(&estado.pool, id).await?;

    let entrada = match ler_edicao(&consulta, &form) {
        Ok(entrada) => entrada,
        Err(erros) => return pagina_edicao(&consulta, &form, erros),
    };
    match consultas::atualizar(&estado.pool, id, &entrada).await {
        Ok(_) => {
            info!("Consulta {} atualizada por {}", id, usuario.usuario.username);
            Ok(Redirect::to(&format!("/consulta/{}/detail/", id)).into_response())
        }
        Err(DbError::Validacao(erros)) => pagina_edicao(&consulta, &form, erros),
        Err(outro) => Err(outro.into()),
    }
}

// ---------------------------------------------------------------------------
// Exclusão
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "confirmar_exclusao.html")]
pub(crate) struct PaginaExclusao {
    pub titulo: &'static str,
    pub descricao: String,
    pub acao: String,
    pub voltar: String,
}

pub async fn confirmar_exclusao(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.delete_consulta")?;
    let consulta = consultas::buscar(&estado.pool, id).await?;
    let html = renderizar(&PaginaExclusao {
        titulo: "Excluir consulta",
        descricao: format!(
            "Consulta de {} com {} em {}",
            consulta.paciente_nome,
            consulta.terapeuta_nome,
            formatar_data(consulta.data_consulta)
        ),
        acao: format!("/consulta/{}/delete/", id),
        voltar: format!("/consulta/{}/detail/", id),
    })?;
    Ok(html.into_response())
}

pub async fn excluir(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.delete_consulta")?;
    consultas::excluir(&estado.pool, id).await?;
    info!("Consulta {} excluída por {}", id, usuario.usuario.username);
    Ok(Redirect::to("/consulta/list/").into_response())
}
