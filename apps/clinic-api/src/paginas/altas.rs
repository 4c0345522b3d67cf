//! Formulário de alta/desistência
//!
//! O cadastro passa por `registrar_alta`, que desativa o paciente na mesma
//! transação.

use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::NaiveDate;
use common_db::models::{AltaDesistenciaEntrada, Cancelador, MomentoAlta, TipoAlta};
use common_db::repositorio::altas;
use common_db::{DbError, ErrosCampos};
use serde::Deserialize;
use tracing::info;

use super::{
    id_obrigatorio, opcoes_pacientes_ativos, opcoes_terapeutas, renderizar, terapeuta_logado,
    Erros, Opcao,
};
use crate::auth::{UsuarioAutenticado, UsuarioPagina};
use crate::error::ApiError;
use crate::estado::Estado;

const CANCELADORES: [(Cancelador, &str); 2] = [
    (Cancelador::Paciente, "paciente"),
    (Cancelador::Terapeuta, "terapeuta"),
];

const MOMENTOS: [MomentoAlta; 2] = [MomentoAlta::AntesPrimeiraSessao, MomentoAlta::DepoisPrimeiraSessao];

const TIPOS: [(TipoAlta, &str); 2] = [(TipoAlta::Alta, "alta"), (TipoAlta::Desistencia, "desistencia")];

#[derive(Template)]
#[template(path = "alta_criar.html")]
struct PaginaAlta {
    titulo: &'static str,
    terapeutas: Vec<Opcao>,
    terapeuta_travado: bool,
    pacientes: Vec<Opcao>,
    data_sessao: String,
    canceladores: Vec<Opcao>,
    motivo_cancelamento: String,
    momentos: Vec<Opcao>,
    tipos: Vec<Opcao>,
    erros: Erros,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormAlta {
    terapeuta_id: Option<String>,
    paciente_id: Option<String>,
    data_sessao: Option<String>,
    cancelador: Option<String>,
    motivo_cancelamento: Option<String>,
    momento: Option<String>,
    tipo: Option<String>,
}

fn preenchido(valor: &Option<String>) -> Option<&str> {
    valor.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Opções de um campo de escolha, com a escolha vazia no início
fn opcoes_escolha<T: Copy>(itens: &[(T, &str)], rotulo: fn(T) -> &'static str, atual: Option<&str>) -> Vec<Opcao> {
    std::iter::once(Opcao::new("", "---------", atual.is_none()))
        .chain(
            itens
                .iter()
                .map(|&(item, valor)| Opcao::new(valor, rotulo(item), atual == Some(valor))),
        )
        .collect()
}

fn momentos() -> Vec<(MomentoAlta, &'static str)> {
    MOMENTOS.iter().map(|&m| (m, m.rotulo())).collect()
}

/// Escolha opcional: vazio é aceito, valor fora da lista é erro
fn escolha<T: Copy>(
    itens: &[(T, &str)],
    valor: Option<&str>,
    campo: &str,
    erros: &mut ErrosCampos,
) -> Option<T> {
    let valor = valor?;
    match itens.iter().find(|(_, chave)| *chave == valor) {
        Some(&(item, _)) => Some(item),
        None => {
            erros.adicionar(campo, "Selecione uma opção válida.");
            None
        }
    }
}

fn ler_alta(form: &FormAlta, terapeuta_forcado: Option<i64>) -> Result<AltaDesistenciaEntrada, ErrosCampos> {
    let mut erros = ErrosCampos::new();

    let terapeuta_id = match terapeuta_forcado {
        Some(id) => Some(id),
        None => id_obrigatorio(
            preenchido(&form.terapeuta_id),
            "terapeuta_id",
            "Selecione o terapeuta.",
            &mut erros,
        ),
    };
    let paciente_id = id_obrigatorio(
        preenchido(&form.paciente_id),
        "paciente_id",
        "Selecione o paciente.",
        &mut erros,
    );
    let data_sessao = match preenchido(&form.data_sessao) {
        None => None,
        Some(texto) => {
            let data = NaiveDate::parse_from_str(texto, "%Y-%m-%d").ok();
            if data.is_none() {
                erros.adicionar("data_sessao", "Informe uma data válida.");
            }
            data
        }
    };
    let cancelador = escolha(&CANCELADORES, preenchido(&form.cancelador), "cancelador", &mut erros);
    let momento = escolha(&momentos(), preenchido(&form.momento), "momento", &mut erros);
    let tipo = escolha(&TIPOS, preenchido(&form.tipo), "tipo", &mut erros);

    match (terapeuta_id, paciente_id) {
        (Some(terapeuta_id), Some(paciente_id)) if erros.is_empty() => Ok(AltaDesistenciaEntrada {
            terapeuta_id,
            paciente_id,
            data_sessao,
            cancelador,
            motivo_cancelamento: preenchido(&form.motivo_cancelamento).map(str::to_string),
            momento,
            tipo,
        }),
        _ => Err(erros),
    }
}

async fn pagina(
    estado: &Estado,
    usuario: &UsuarioAutenticado,
    form: &FormAlta,
    erros: ErrosCampos,
) -> Result<Response, ApiError> {
    let logado = terapeuta_logado(&estado.pool, usuario).await?;
    let terapeuta_id = preenchido(&form.terapeuta_id).and_then(|v| v.parse().ok());
    let paciente_id = preenchido(&form.paciente_id).and_then(|v| v.parse().ok());

    let html = renderizar(&PaginaAlta {
        titulo: "Nova alta/desistência",
        terapeutas: opcoes_terapeutas(&estado.pool, logado.as_ref(), terapeuta_id).await?,
        terapeuta_travado: logado.is_some(),
        pacientes: opcoes_pacientes_ativos(&estado.pool, paciente_id).await?,
        data_sessao: form.data_sessao.clone().unwrap_or_default(),
        canceladores: opcoes_escolha(&CANCELADORES, Cancelador::rotulo, preenchido(&form.cancelador)),
        motivo_cancelamento: form.motivo_cancelamento.clone().unwrap_or_default(),
        momentos: opcoes_escolha(&momentos(), MomentoAlta::rotulo, preenchido(&form.momento)),
        tipos: opcoes_escolha(&TIPOS, TipoAlta::rotulo, preenchido(&form.tipo)),
        erros: Erros(erros),
    })?;
    Ok(html.into_response())
}

pub async fn formulario(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.add_altadesistencia")?;
    pagina(&estado, &usuario, &FormAlta::default(), ErrosCampos::new()).await
}

pub async fn registrar(
    State(estado): State<Estado>,
    UsuarioPagina(usuario): UsuarioPagina,
    Form(form): Form<FormAlta>,
) -> Result<Response, ApiError> {
    usuario.exigir("principais.add_altadesistencia")?;

    let forcado = terapeuta_logado(&estado.pool, &usuario).await?.map(|t| t.id);
    let entrada = match ler_alta(&form, forcado) {
        Ok(entrada) => entrada,
        Err(erros) => return pagina(&estado, &usuario, &form, erros).await,
    };

    match altas::registrar_alta(&estado.pool, &entrada).await {
        Ok(alta) => {
            info!(
                "Alta/desistência {} registrada por {}",
                alta.id, usuario.usuario.username
            );
            Ok(Redirect::to("/consulta/list/").into_response())
        }
        Err(DbError::Validacao(erros)) => pagina(&estado, &usuario, &form, erros).await,
        Err(outro) => Err(outro.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use common_db::repositorio::pacientes;
    use common_db::testing::Cenario;

    use crate::testes::{chamar_form, texto, Ambiente};

    #[test]
    fn escolhas_invalidas_sao_reportadas() {
        let form = FormAlta {
            terapeuta_id: Some("1".into()),
            paciente_id: Some("2".into()),
            cancelador: Some("vizinho".into()),
            momento: Some("Antes da primeira sessão".into()),
            ..FormAlta::default()
        };
        let erros = ler_alta(&form, None).unwrap_err();
        assert!(erros.campo("cancelador").is_some());
        assert!(erros.campo("momento").is_none());
    }

    #[test]
    fn campos_opcionais_vazios() {
        let form = FormAlta {
            paciente_id: Some("2".into()),
            tipo: Some("alta".into()),
            data_sessao: Some(String::new()),
            ..FormAlta::default()
        };
        let entrada = ler_alta(&form, Some(5)).unwrap();
        assert_eq!(entrada.terapeuta_id, 5);
        assert_eq!(entrada.tipo, Some(TipoAlta::Alta));
        assert_eq!(entrada.data_sessao, None);
        assert_eq!(entrada.cancelador, None);
    }

    #[tokio::test]
    async fn alta_pelo_formulario_desativa_paciente() {
        let ambiente = Ambiente::novo().await;
        let pool = ambiente.estado.pool.clone();
        let cenario = Cenario::montar(&pool).await;
        let paula = cenario.novo_paciente(&pool, "Paula", 15000).await;
        let token = ambiente
            .token_de(cenario.usuario_terapeuta, &["principais.add_altadesistencia"])
            .await;
        let app = ambiente.app();

        let html = texto(chamar_form(&app, Method::GET, "/altadesistencia/nova/", Some(&token), "").await).await;
        assert!(html.contains("Teodoro Terapeuta"));
        assert!(html.contains("Paula"));

        let corpo = format!(
            "paciente_id={}&data_sessao=2024-05-10&cancelador=paciente&momento=Depois+da+primeira+sess%C3%A3o&tipo=desistencia&motivo_cancelamento=Mudou-se",
            paula
        );
        let resposta = chamar_form(&app, Method::POST, "/altadesistencia/nova/", Some(&token), &corpo).await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);

        let paciente = pacientes::buscar(&pool, paula).await.unwrap();
        assert!(!paciente.is_active);
        let registradas = altas::listar(&pool).await.unwrap();
        assert_eq!(registradas.len(), 1);
        assert_eq!(registradas[0].terapeuta_id, cenario.terapeuta);
        assert_eq!(registradas[0].momento, Some(MomentoAlta::DepoisPrimeiraSessao));
    }

    #[tokio::test]
    async fn sem_permissao_retorna_403() {
        let ambiente = Ambiente::novo().await;
        let token = ambiente.usuario("visitante", "senha", &[]).await;
        let resposta = chamar_form(&ambiente.app(), Method::GET, "/altadesistencia/nova/", Some(&token), "").await;
        assert_eq!(resposta.status(), StatusCode::FORBIDDEN);
    }
}
