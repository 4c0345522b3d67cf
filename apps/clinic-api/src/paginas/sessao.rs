//! Login e logout com cookie de sessão

use askama::Template;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

use super::renderizar;
use crate::auth::{self, cookie_expirado, cookie_sessao};
use crate::error::ApiError;
use crate::estado::Estado;

const DESTINO_PADRAO: &str = "/consulta/list/";

#[derive(Template)]
#[template(path = "login.html")]
struct PaginaLogin {
    titulo: &'static str,
    username: String,
    next: String,
    erro: String,
}

#[derive(Debug, Deserialize)]
pub struct ParametrosLogin {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormLogin {
    username: String,
    password: String,
    next: Option<String>,
}

/// Só aceita caminhos locais para evitar redirecionamento aberto
fn destino_seguro(next: Option<&str>) -> &str {
    match next {
        Some(caminho) if caminho.starts_with('/') && !caminho.starts_with("//") => caminho,
        _ => DESTINO_PADRAO,
    }
}

pub async fn raiz() -> Redirect {
    Redirect::to("/login/")
}

pub async fn formulario(Query(parametros): Query<ParametrosLogin>) -> Result<Response, ApiError> {
    let pagina = PaginaLogin {
        titulo: "Entrar",
        username: String::new(),
        next: parametros.next.unwrap_or_default(),
        erro: String::new(),
    };
    Ok(renderizar(&pagina)?.into_response())
}

pub async fn entrar(
    State(estado): State<Estado>,
    Form(form): Form<FormLogin>,
) -> Result<Response, ApiError> {
    let Some(usuario) = auth::autenticar(&estado.pool, &form.username, &form.password).await? else {
        warn!("Tentativa de login inválida para {}", form.username);
        let pagina = PaginaLogin {
            titulo: "Entrar",
            username: form.username,
            next: form.next.unwrap_or_default(),
            erro: "Usuário ou senha inválidos.".to_string(),
        };
        return Ok(renderizar(&pagina)?.into_response());
    };

    let token = estado.jwt.emitir(&usuario)?;
    info!("Login de {}", usuario.username);
    let destino = destino_seguro(form.next.as_deref()).to_string();
    Ok((
        [(header::SET_COOKIE, cookie_sessao(&token, &estado))],
        Redirect::to(&destino),
    )
        .into_response())
}

pub async fn sair() -> Response {
    (
        [(header::SET_COOKIE, cookie_expirado())],
        Redirect::to("/login/"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};

    use crate::testes::{chamar_form, texto, Ambiente};

    #[test]
    fn destino_apenas_local() {
        assert_eq!(destino_seguro(Some("/match/list/")), "/match/list/");
        assert_eq!(destino_seguro(Some("//evil.example")), DESTINO_PADRAO);
        assert_eq!(destino_seguro(Some("https://evil.example")), DESTINO_PADRAO);
        assert_eq!(destino_seguro(None), DESTINO_PADRAO);
    }

    #[tokio::test]
    async fn login_grava_cookie_e_redireciona() {
        let ambiente = Ambiente::novo().await;
        ambiente.usuario("ana", "segredo123", &[]).await;
        let app = ambiente.app();

        let resposta = chamar_form(
            &app,
            Method::POST,
            "/login/",
            None,
            "username=ana&password=segredo123&next=%2Fmatch%2Flist%2F",
        )
        .await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);
        assert_eq!(resposta.headers()[header::LOCATION], "/match/list/");
        let cookie = resposta.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("allos_token="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn login_invalido_mostra_erro() {
        let ambiente = Ambiente::novo().await;
        ambiente.usuario("ana", "segredo123", &[]).await;

        let resposta = chamar_form(
            &ambiente.app(),
            Method::POST,
            "/login/",
            None,
            "username=ana&password=errada",
        )
        .await;
        assert_eq!(resposta.status(), StatusCode::OK);
        assert!(resposta.headers().get(header::SET_COOKIE).is_none());
        assert!(texto(resposta).await.contains("Usuário ou senha inválidos."));
    }

    #[tokio::test]
    async fn pagina_protegida_redireciona_ao_login() {
        let ambiente = Ambiente::novo().await;
        let resposta = chamar_form(&ambiente.app(), Method::GET, "/consulta/list/", None, "").await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resposta.headers()[header::LOCATION],
            "/login/?next=/consulta/list/"
        );
    }

    #[tokio::test]
    async fn logout_expira_cookie() {
        let ambiente = Ambiente::novo().await;
        let resposta = chamar_form(&ambiente.app(), Method::GET, "/logout/", None, "").await;
        assert_eq!(resposta.status(), StatusCode::SEE_OTHER);
        let cookie = resposta.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
