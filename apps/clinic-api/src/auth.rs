//! Autenticação (senha argon2, token JWT) e checagem de permissões
//!
//! O token chega pelo cabeçalho `Authorization: Bearer` (API) ou pelo cookie
//! `allos_token`, gravado pelo formulário de login. As permissões seguem o
//! formato `<app>.<acao>_<modelo>`; superusuários passam em todas.

use std::collections::BTreeSet;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};
use common_db::models::Usuario;
use common_db::repositorio::usuarios;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::estado::Estado;

pub const COOKIE_TOKEN: &str = "allos_token";

/// Permissão exigida pelo painel e pelos relatórios
pub const PERMISSAO_PAINEL: &str = "auth.view_user";

// ---------------------------------------------------------------------------
// Senhas
// ---------------------------------------------------------------------------

pub fn hash_senha(senha: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(senha.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Falha ao gerar hash da senha: {}", e))
}

pub fn verificar_senha(senha: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(senha.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Hash de senha ilegível no banco: {}", e);
            false
        }
    }
}

/// Confere usuário e senha; `None` para credenciais inválidas ou conta inativa
pub async fn autenticar(
    pool: &SqlitePool,
    username: &str,
    senha: &str,
) -> Result<Option<Usuario>, ApiError> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| ApiError::Interno(e.to_string()))?;
    let usuario = usuarios::buscar_por_username(&mut conn, username.trim()).await?;
    Ok(usuario.filter(|u| u.is_active && verificar_senha(senha, &u.password_hash)))
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub uid: i64,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub struct ChavesJwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validacao: Validation,
    pub ttl: Duration,
}

impl ChavesJwt {
    pub fn new(segredo: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(segredo),
            decoding: DecodingKey::from_secret(segredo),
            validacao: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Usa o segredo configurado ou gera um aleatório (tokens não sobrevivem a reinícios)
    pub fn do_segredo(segredo: Option<&str>, ttl: Duration) -> Self {
        match segredo.filter(|s| !s.is_empty()) {
            Some(segredo) => Self::new(segredo.as_bytes(), ttl),
            None => {
                warn!("ALLOS_JWT_SECRET não definido; usando segredo aleatório");
                let aleatorio: [u8; 32] = rand::thread_rng().gen();
                Self::new(&aleatorio, ttl)
            }
        }
    }

    pub fn emitir(&self, usuario: &Usuario) -> Result<String, ApiError> {
        let agora = Utc::now();
        let claims = Claims {
            sub: usuario.username.clone(),
            uid: usuario.id,
            iat: agora.timestamp(),
            exp: (agora + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Interno(format!("Falha ao assinar token: {}", e)))
    }

    pub fn validar(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validacao)
            .map(|dados| dados.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::TokenExpirado,
                outro => {
                    debug!("Token rejeitado: {:?}", outro);
                    ApiError::NaoAutenticado
                }
            })
    }
}

fn token_do_cabecalho(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn token_do_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|valor| valor.to_str().ok())
        .flat_map(|valor| valor.split(';'))
        .filter_map(|par| par.trim().split_once('='))
        .find(|(nome, _)| *nome == COOKIE_TOKEN)
        .map(|(_, valor)| valor)
}

/// Cabeçalho `Set-Cookie` do login
pub fn cookie_sessao(token: &str, estado: &Estado) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        COOKIE_TOKEN,
        token,
        estado.jwt.ttl.num_seconds()
    );
    if estado.cookie_seguro {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Cabeçalho `Set-Cookie` que remove a sessão
pub fn cookie_expirado() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", COOKIE_TOKEN)
}

// ---------------------------------------------------------------------------
// Permissões
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acao {
    Ver,
    Adicionar,
    Alterar,
    Excluir,
}

impl Acao {
    pub fn do_metodo(metodo: &Method) -> Acao {
        if *metodo == Method::POST {
            Acao::Adicionar
        } else if *metodo == Method::PUT || *metodo == Method::PATCH {
            Acao::Alterar
        } else if *metodo == Method::DELETE {
            Acao::Excluir
        } else {
            Acao::Ver
        }
    }

    pub fn como_str(self) -> &'static str {
        match self {
            Acao::Ver => "view",
            Acao::Adicionar => "add",
            Acao::Alterar => "change",
            Acao::Excluir => "delete",
        }
    }
}

pub fn codigo_permissao(app: &str, acao: Acao, modelo: &str) -> String {
    format!("{}.{}_{}", app, acao.como_str(), modelo)
}

/// Usuário autenticado com as permissões já carregadas
#[derive(Debug, Clone)]
pub struct UsuarioAutenticado {
    pub usuario: Usuario,
    pub permissoes: BTreeSet<String>,
}

impl UsuarioAutenticado {
    pub fn tem_permissao(&self, codigo: &str) -> bool {
        self.usuario.is_active && (self.usuario.is_superuser || self.permissoes.contains(codigo))
    }

    pub fn exigir(&self, codigo: &str) -> Result<(), ApiError> {
        if self.tem_permissao(codigo) {
            Ok(())
        } else {
            debug!("Usuário {} sem permissão {}", self.usuario.username, codigo);
            Err(ApiError::SemPermissao(codigo.to_string()))
        }
    }

    pub async fn carregar(estado: &Estado, token: &str) -> Result<Self, ApiError> {
        let claims = estado.jwt.validar(token)?;
        let usuario = match usuarios::buscar(&estado.pool, claims.uid).await {
            Ok(usuario) => usuario,
            Err(common_db::DbError::NotFound(_)) => return Err(ApiError::NaoAutenticado),
            Err(e) => return Err(e.into()),
        };
        if !usuario.is_active || usuario.username != claims.sub {
            return Err(ApiError::NaoAutenticado);
        }
        let permissoes = usuarios::permissoes(&estado.pool, usuario.id).await?;
        Ok(Self {
            usuario,
            permissoes,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<Estado> for UsuarioAutenticado {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, estado: &Estado) -> Result<Self, Self::Rejection> {
        let token = token_do_cabecalho(&parts.headers)
            .or_else(|| token_do_cookie(&parts.headers))
            .ok_or(ApiError::NaoAutenticado)?;
        UsuarioAutenticado::carregar(estado, token).await
    }
}

/// Variante para páginas HTML: sem sessão válida, redireciona ao login
#[derive(Debug, Clone)]
pub struct UsuarioPagina(pub UsuarioAutenticado);

#[axum::async_trait]
impl FromRequestParts<Estado> for UsuarioPagina {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, estado: &Estado) -> Result<Self, Self::Rejection> {
        match UsuarioAutenticado::from_request_parts(parts, estado).await {
            Ok(usuario) => Ok(UsuarioPagina(usuario)),
            Err(ApiError::NaoAutenticado | ApiError::TokenExpirado) => {
                let destino = format!("/login/?next={}", parts.uri.path());
                Err(Redirect::to(&destino).into_response())
            }
            Err(outro) => Err(outro.into_response()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn usuario(id: i64, username: &str) -> Usuario {
        Usuario {
            id,
            username: username.to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn senha_confere_com_hash() {
        let hash = hash_senha("segredo123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verificar_senha("segredo123", &hash));
        assert!(!verificar_senha("outra", &hash));
        assert!(!verificar_senha("segredo123", "nao-e-hash"));
    }

    #[test]
    fn token_valido_e_adulterado() {
        let chaves = ChavesJwt::new(b"segredo-de-teste", Duration::hours(1));
        let token = chaves.emitir(&usuario(7, "ana")).unwrap();
        let claims = chaves.validar(&token).unwrap();
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.sub, "ana");
        assert!(Uuid::parse_str(&claims.jti).is_ok());

        let outras = ChavesJwt::new(b"outro-segredo", Duration::hours(1));
        assert!(matches!(outras.validar(&token), Err(ApiError::NaoAutenticado)));
    }

    #[test]
    fn token_expirado() {
        let chaves = ChavesJwt::new(b"segredo-de-teste", Duration::hours(-2));
        let token = chaves.emitir(&usuario(1, "bia")).unwrap();
        assert!(matches!(chaves.validar(&token), Err(ApiError::TokenExpirado)));
    }

    #[test]
    fn metodo_para_acao() {
        assert_eq!(Acao::do_metodo(&Method::GET), Acao::Ver);
        assert_eq!(Acao::do_metodo(&Method::OPTIONS), Acao::Ver);
        assert_eq!(Acao::do_metodo(&Method::POST), Acao::Adicionar);
        assert_eq!(Acao::do_metodo(&Method::PATCH), Acao::Alterar);
        assert_eq!(Acao::do_metodo(&Method::DELETE), Acao::Excluir);
        assert_eq!(
            codigo_permissao("principais", Acao::Alterar, "consulta"),
            "principais.change_consulta"
        );
    }

    #[test]
    fn token_lido_do_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("tema=escuro; allos_token=abc.def.ghi"),
        );
        assert_eq!(token_do_cookie(&headers), Some("abc.def.ghi"));
        assert_eq!(token_do_cabecalho(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_do_cabecalho(&headers), Some("xyz"));
    }

    #[test]
    fn superusuario_passa_em_tudo() {
        let mut autenticado = UsuarioAutenticado {
            usuario: usuario(1, "root"),
            permissoes: BTreeSet::from(["principais.view_consulta".to_string()]),
        };
        assert!(autenticado.exigir("principais.view_consulta").is_ok());
        assert!(autenticado.exigir("principais.add_consulta").is_err());

        autenticado.usuario.is_superuser = true;
        assert!(autenticado.exigir("principais.add_consulta").is_ok());

        autenticado.usuario.is_active = false;
        assert!(autenticado.exigir("principais.view_consulta").is_err());
    }
}
