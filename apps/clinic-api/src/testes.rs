//! Utilitários dos testes de rota: app com banco em memória e chamadas via `oneshot`

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Duration;
use common_db::metricas::ConfigMetricas;
use common_db::repositorio::usuarios::{self, NovoUsuario};
use common_db::testing::pool_em_memoria;
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::{hash_senha, ChavesJwt};
use crate::estado::Estado;

pub(crate) struct Ambiente {
    pub estado: Estado,
}

impl Ambiente {
    pub async fn novo() -> Self {
        let pool = pool_em_memoria().await;
        let jwt = ChavesJwt::new(b"segredo-de-teste", Duration::hours(1));
        Ambiente {
            estado: Estado::new(pool, jwt, ConfigMetricas::default(), false),
        }
    }

    pub fn app(&self) -> Router {
        crate::app(self.estado.clone())
    }

    async fn conta(&self, username: &str, senha: &str, staff: bool, superusuario: bool, permissoes: &[&str]) -> String {
        let hash = hash_senha(senha).unwrap();
        let mut conn = self.estado.pool.acquire().await.unwrap();
        let (id, _) = usuarios::criar_ou_atualizar(
            &mut conn,
            &NovoUsuario {
                username,
                password_hash: &hash,
                first_name: username,
                last_name: "",
                is_staff: staff,
                is_superuser: superusuario,
            },
        )
        .await
        .unwrap();
        drop(conn);
        self.token_de(id, permissoes).await
    }

    /// Conta comum com as permissões dadas; devolve o token
    pub async fn usuario(&self, username: &str, senha: &str, permissoes: &[&str]) -> String {
        self.conta(username, senha, false, false, permissoes).await
    }

    pub async fn staff(&self, username: &str, permissoes: &[&str]) -> String {
        self.conta(username, "senha-staff", true, false, permissoes).await
    }

    pub async fn superusuario(&self) -> String {
        self.conta("admin", "senha-admin", true, true, &[]).await
    }

    /// Concede permissões a uma conta existente e emite o token dela
    pub async fn token_de(&self, usuario_id: i64, permissoes: &[&str]) -> String {
        let mut conn = self.estado.pool.acquire().await.unwrap();
        for codigo in permissoes {
            usuarios::conceder_permissao_usuario(&mut conn, usuario_id, codigo)
                .await
                .unwrap();
        }
        drop(conn);
        let usuario = usuarios::buscar(&self.estado.pool, usuario_id).await.unwrap();
        self.estado.jwt.emitir(&usuario).unwrap()
    }
}

async fn enviar(app: &Router, requisicao: Request<Body>) -> Response {
    app.clone().oneshot(requisicao).await.unwrap()
}

async fn json_da_resposta(resposta: Response) -> (StatusCode, Value) {
    let status = resposta.status();
    let bytes = hyper::body::to_bytes(resposta.into_body()).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn requisicao(metodo: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(metodo).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
}

pub(crate) async fn chamar(app: &Router, metodo: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let req = requisicao(metodo, uri, token).body(Body::empty()).unwrap();
    json_da_resposta(enviar(app, req).await).await
}

pub(crate) async fn chamar_com_corpo(
    app: &Router,
    metodo: Method,
    uri: &str,
    token: Option<&str>,
    corpo: Value,
) -> (StatusCode, Value) {
    let req = requisicao(metodo, uri, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(corpo.to_string()))
        .unwrap();
    json_da_resposta(enviar(app, req).await).await
}

/// Chamada de página: corpo `application/x-www-form-urlencoded`, resposta crua
pub(crate) async fn chamar_form(
    app: &Router,
    metodo: Method,
    uri: &str,
    token: Option<&str>,
    corpo: &str,
) -> Response {
    let req = requisicao(metodo, uri, token)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(corpo.to_string()))
        .unwrap();
    enviar(app, req).await
}

pub(crate) async fn bytes(resposta: Response) -> Vec<u8> {
    hyper::body::to_bytes(resposta.into_body()).await.unwrap().to_vec()
}

pub(crate) async fn texto(resposta: Response) -> String {
    String::from_utf8(bytes(resposta).await).unwrap()
}
