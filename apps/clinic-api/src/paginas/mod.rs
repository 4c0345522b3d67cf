//! Páginas HTML (askama): login, consultas, altas e matches

use askama::Template;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use common_db::models::{Paciente, Terapeuta};
use common_db::repositorio::{pacientes, terapeutas};
use common_db::ErrosCampos;
use sqlx::SqlitePool;

use crate::auth::UsuarioAutenticado;
use crate::error::ApiError;
use crate::estado::Estado;

pub mod altas;
pub mod consultas;
pub mod matches;
pub mod sessao;

pub fn router() -> Router<Estado> {
    Router::new()
        .route("/", get(sessao::raiz))
        .route("/login/", get(sessao::formulario).post(sessao::entrar))
        .route("/logout/", get(sessao::sair).post(sessao::sair))
        .route("/consulta/list/", get(consultas::lista))
        .route(
            "/consulta/create/",
            get(consultas::formulario_lote).post(consultas::criar_lote),
        )
        .route("/consulta/:id/detail/", get(consultas::detalhe))
        .route(
            "/consulta/:id/update/",
            get(consultas::formulario_edicao).post(consultas::editar),
        )
        .route(
            "/consulta/:id/delete/",
            get(consultas::confirmar_exclusao).post(consultas::excluir),
        )
        .route(
            "/altadesistencia/nova/",
            get(altas::formulario).post(altas::registrar),
        )
        .route("/match/list/", get(matches::lista))
        .route("/match/nova/", get(matches::formulario_novo).post(matches::criar))
        .route(
            "/match/:id/update/",
            get(matches::formulario_edicao).post(matches::editar),
        )
        .route(
            "/match/:id/delete/",
            get(matches::confirmar_exclusao).post(matches::excluir),
        )
}

pub fn renderizar<T: Template>(pagina: &T) -> Result<Html<String>, ApiError> {
    pagina
        .render()
        .map(Html)
        .map_err(|e| ApiError::Interno(format!("Falha ao renderizar página: {}", e)))
}

/// Mensagens de erro de um formulário, consultadas campo a campo no template
#[derive(Debug, Clone, Default)]
pub struct Erros(pub ErrosCampos);

impl Erros {
    pub fn de(&self, campo: &str) -> String {
        self.0.campo(campo).map(|m| m.join(" ")).unwrap_or_default()
    }

    pub fn gerais(&self) -> String {
        self.de(ErrosCampos::GERAL)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Item de um `<select>`
#[derive(Debug, Clone)]
pub struct Opcao {
    pub valor: String,
    pub rotulo: String,
    pub selecionada: bool,
}

impl Opcao {
    pub fn new(valor: impl ToString, rotulo: impl Into<String>, selecionada: bool) -> Self {
        Self {
            valor: valor.to_string(),
            rotulo: rotulo.into(),
            selecionada,
        }
    }
}

/// Terapeuta vinculado à conta logada, se houver
pub async fn terapeuta_logado(
    pool: &SqlitePool,
    usuario: &UsuarioAutenticado,
) -> Result<Option<Terapeuta>, ApiError> {
    Ok(terapeutas::buscar_por_usuario(pool, usuario.usuario.id).await?)
}

/// Opções de terapeuta; com terapeuta logado, só ele aparece
pub async fn opcoes_terapeutas(
    pool: &SqlitePool,
    logado: Option<&Terapeuta>,
    selecionado: Option<i64>,
) -> Result<Vec<Opcao>, ApiError> {
    if let Some(terapeuta) = logado {
        return Ok(vec![Opcao::new(terapeuta.id, terapeuta.associado_nome.clone(), true)]);
    }
    Ok(terapeutas::listar_ativos(pool)
        .await?
        .into_iter()
        .map(|t| Opcao::new(t.id, t.associado_nome, Some(t.id) == selecionado))
        .collect())
}

pub fn opcoes_pacientes(lista: Vec<Paciente>, selecionado: Option<i64>) -> Vec<Opcao> {
    lista
        .into_iter()
        .map(|p| Opcao::new(p.id, p.nome, Some(p.id) == selecionado))
        .collect()
}

pub async fn opcoes_pacientes_ativos(
    pool: &SqlitePool,
    selecionado: Option<i64>,
) -> Result<Vec<Opcao>, ApiError> {
    Ok(opcoes_pacientes(pacientes::listar_ativos(pool).await?, selecionado))
}

/// Lê um id de `<select>`; vazio ou inválido vira erro no campo
pub fn id_obrigatorio(valor: Option<&str>, campo: &str, mensagem: &str, erros: &mut ErrosCampos) -> Option<i64> {
    match valor.map(str::trim).filter(|v| !v.is_empty()).and_then(|v| v.parse().ok()) {
        Some(id) => Some(id),
        None => {
            erros.adicionar(campo, mensagem);
            None
        }
    }
}

/// Checkbox HTML marcado
pub fn marcado(valor: Option<&str>) -> bool {
    valor == Some("on")
}
