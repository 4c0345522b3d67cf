//! Páginas de match entre terapeuta e paciente

use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::NaiveDate;
use common_db::models::{Match, MatchEntrada};
use common_db::repositorio::{matches, pacientes};
use common_db::{DbError, ErrosCampos};
use serde::Deserialize;
use tracing::info;

use super::consultas::PaginaExclusao;
use super::{
    id_obrigatorio, opcoes_pacientes, opcoes_terapeutas, renderizar, terapeuta_logado, Erros,
    Opcao,
};
use crate::auth::{UsuarioAutenticado, UsuarioPagina};
use crate::error::ApiError;
use crate::estado::Estado;

struct LinhaMatch {
    id: i64,
    terapeuta: String,
    paciente: String,
    data: String,
}

impl From<Match> for LinhaMatch {
    fn from(m: Match) -> Self {
        LinhaMatch {
            id: m.id,
            terapeuta: m.terapeuta_nome,
            paciente: m.paciente_nome,
            data: m.data_consulta.format("%d/%m/%Y").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "match_lista.html")]
struct PaginaLista {
    titulo: &'static str,
    matches: Vec<LinhaMatch>,
}

#[derive(Template)]
#[template(path = "match_form.html")]
struct PaginaForm {
    titulo: &'static str,
    acao: String,
    terapeutas: Vec<Opcao>,
    terapeuta_travado: bool,
    pacientes: Vec<Opcao>,
    data_consulta: String,
    erros: Erros,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormMatch {
    terapeuta_id: Option<String>,
    paciente_id: Option<String>,
    #[serde(default)]
    data_consulta: String,
}

impl FormMatch {
    fn de(m: &Match) -> Self {
        FormMatch {
            terapeuta_id: Some(m.terapeuta_id.to_string()),
            paciente_id: Some(m.paciente_id.to_string()),
            data_consulta: m.data_consulta.format("%Y-%m-%d").to_string(),
        }
    }
}

fn ler_match(form: &FormMatch, terapeuta_forcado: Option<i64>) -> Result<MatchEntrada, ErrosCampos> {
    let mut erros = ErrosCampos::new();
    let terapeuta_id = match terapeuta_forcado {
        Some(id) => Some(id),
        None => id_obrigatorio(
            form.terapeuta_id.as_deref(),
            "terapeuta_id",
            "Selecione o terapeuta.",
            &mut erros,
        ),
    };
    let paciente_id = id_obrigatorio(
        form.paciente_id.as_deref(),
        "paciente_id",
        "Selecione o paciente.",
        &mut erros,
    );
    let data_consulta = NaiveDate::parse_from_str(form.data_consulta.trim(), "%Y-%m-%d").ok();
    if data_consulta.is_none() {
        erros.adicionar("data_consulta", "Informe a data da sessão.");
    }

    match (terapeuta_id, paciente_id, data_consulta) {
        (Some(terapeuta_id), Some(paciente_id), Some(data_consulta)) => Ok(MatchEntrada {
            terapeuta_id,
            paciente_id,
            data_consulta,
        }),
        _ => Err(erros),
    }
}

async fn pagina_form(
    estado: &Estado,
    usuario: &UsuarioAutenticado,
    titulo: &'static str,
    acao: String,
    form: &FormMatch,
    erros: ErrosCampos,
) -> Result<Response, ApiError> {
    let logado = terapeuta_logado(&estado.pool, usuario).await?;
    let terapeuta_id = form.terapeuta_id.as_deref().and_then(|v| v.parse().ok());
    let paciente_id = form.paciente_id.as_deref().and_then(|v| v.parse().ok());

    let html = renderizar(&PaginaForm {
        titulo,
        acao,
        terapeutas: opcoes_terapeutas(&estado.pool, logado.as_ref(), terapeuta_id).await?,
        terapeuta_travado: logado.is_some(),
        pacientes: opcoes_pacientes(pacientes::listar(&estado.pool).await?, paciente_id),
        data_consulta: form.data_consulta.clone(),
        erros: Erros(erros),
    })?;
    Ok(html.into_response())
}

pub async fn lista(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.view_match")?;
    let html = renderizar(&PaginaLista {
        titulo: "Matches",
        matches: matches::listar(&estado.pool)
            .await?
            .into_iter()
            .map(LinhaMatch::from)
            .collect(),
    })?;
    Ok(html.into_response())
}

pub async fn formulario_novo(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.add_match")?;
    pagina_form(
        &estado,
        &usuario,
        "Novo match",
        "/match/nova/".to_string(),
        &FormMatch::default(),
        ErrosCampos::new(),
    )
    .await
}

pub async fn criar(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Form(form): Form<FormMatch>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.add_match")?;
    let forcado = terapeuta_logado(&estado.pool, &usuario).await?.map(|t| t.id);
    let acao = "/match/nova/".to_string();

    let entrada = match ler_match(&form, forcado) {
        Ok(entrada) => entrada,
        Err(erros) => return pagina_form(&estado, &usuario, "Novo match", acao, &form, erros).await,
    };
    match matches::criar(&estado.pool, &entrada).await {
        Ok(criado) => {
            info!("Match {} criado por {}", criado.id, usuario.usuario.username);
            Ok(Redirect::to("/match/list/").into_response())
        }
        Err(DbError::Validacao(erros)) => {
            pagina_form(&estado, &usuario, "Novo match", acao, &form, erros).await
        }
        Err(outro) => Err(outro.into()),
    }
}

pub async fn formulario_edicao(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.change_match")?;
    let existente = matches::buscar(&estado.pool, id).await?;
    pagina_form(
        &estado,
        &usuario,
        "Editar match",
        format!("/match/{}/update/", id),
        &FormMatch::de(&existente),
        ErrosCampos::new(),
    )
    .await
}

pub async fn editar(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
    Form(form): Form<FormMatch>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.change_match")?;
    matches::buscar(&estado.pool, id).await?;
    let forcado = terapeuta_logado(&estado.pool, &usuario).await?.map(|t| t.id);
    let acao = format!("/match/{}/update/", id);

    let entrada = match ler_match(&form, forcado) {
        Ok(entrada) => entrada,
        Err(erros) => return pagina_form(&estado, &usuario, "Editar match", acao, &form, erros).await,
    };
    match matches::atualizar(&estado.pool, id, &entrada).await {
        Ok(_) => Ok(Redirect::to("/match/list/").into_response()),
        Err(DbError::Validacao(erros)) => {
            pagina_form(&estado, &usuario, "Editar match", acao, &form, erros).await
        }
        Err(outro) => Err(outro.into()),
    }
}

pub async fn confirmar_exclusao(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.delete_match")?;
    let existente = matches::buscar(&estado.pool, id).await?;
    let html = renderizar(&PaginaExclusao {
        titulo: "Excluir match",
        descricao: format!(
            "Match de {} com {} em {}",
            existente.paciente_nome,
            existente.terapeuta_nome,
            existente.data_consulta.format("%d/%m/%Y")
        ),
        acao: format!("/match/{}/delete/", id),
        voltar: "/match/list/".to_string(),
    })?;
    Ok(html.into_response())
}

pub async fn excluir(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.delete_match")?;
    matches::excluir(&estado.pool, id).await?;
    info!("Match {} excluído por {}", id, usuario.usuario.username);
    Ok(Redirect::to("/match/list/").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use common_db::testing::{data, Cenario};

    use crate::testes::{chamar_form, texto, Ambiente};

    #[test]
    fn data_obrigatoria() {
        let form = FormMatch {
            terapeuta_id: Some("1".into()),
            paciente_id: Some("2".into()),
            data_consulta: String::new(),
        };
        let erros = ler_match(&form, None).unwrap_err();
        assert_eq!(
            erros.campo("data_consulta"),
            Some(&["Informe a data da sessão.".to_string()][..])
        );
    }

    #[tokio::test]
    async fn ciclo_de_vida_do_match() {
        let ambiente = Ambiente::novo().await;
        let pool = ambiente.estado.pool.clone();
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let token = ambiente.superusuario().await;
        let app = ambiente.app();

        let corpo = format!(
            "terapeuta_id={}&paciente_id={}&data_consulta=2024-05-02",
            cenario.terapeuta, paula
        );
        let resposta = chamar_form(&app, Method::POST, "/match/nova/", Some(&token), &corpo).await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);

        let criados = matches::listar(&pool).await.unwrap();
        assert_eq!(criados.len(), 1);
        let id = criados[0].id;

        let html = texto(chamar_form(&app, Method::GET, "/match/list/", Some(&token), "").await).await;
        assert!(html.contains("Paula"));
        assert!(html.contains("02/05/2024"));

        let corpo = format!(
            "terapeuta_id={}&paciente_id={}&data_consulta=2024-05-09",
            cenario.terapeuta, paula
        );
        let resposta = chamar_form(&app, Method::POST, &format!("/match/{}/update/", id), Some(&token), &corpo).await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            matches::buscar(&pool, id).await.unwrap().data_consulta,
            data("2024-05-09")
        );

        let resposta = chamar_form(&app, Method::POST, &format!("/match/{}/delete/", id), Some(&token), "").await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);
        assert!(matches::listar(&pool).await.unwrap().is_empty());
    }
}
