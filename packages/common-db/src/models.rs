//! Modelos de dados compartilhados entre aplicações
//!
//! Cada entidade tem uma estrutura de leitura (linha do banco já com os nomes
//! das entidades relacionadas) e uma estrutura de entrada validada, usada em
//! criação e atualização.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::dinheiro::Centavos;
use crate::validacao::{
    validar_cpf, validar_nota_selecao, validar_telefone, validar_valor_nao_negativo,
    validar_valor_positivo,
};

// ---------------------------------------------------------------------------
// Tabelas auxiliares
// ---------------------------------------------------------------------------

/// Linha genérica das tabelas auxiliares (captação, clínica, modalidade...)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Acessorio {
    pub id: i64,
    pub nome: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AcessorioEntrada {
    #[validate(length(min = 1, max = 255, message = "Informe um nome com até 255 caracteres."))]
    pub nome: String,
    #[serde(default = "padrao_ativo")]
    pub is_active: bool,
}

fn padrao_ativo() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Associados
// ---------------------------------------------------------------------------

/// Sexo declarado do associado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Sexo {
    #[serde(rename = "M")]
    #[sqlx(rename = "M")]
    Masculino,
    #[serde(rename = "F")]
    #[sqlx(rename = "F")]
    Feminino,
    #[serde(rename = "O")]
    #[sqlx(rename = "O")]
    Outro,
}

impl Sexo {
    pub fn rotulo(self) -> &'static str {
        match self {
            Sexo::Masculino => "Masculino",
            Sexo::Feminino => "Feminino",
            Sexo::Outro => "Outro",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SetorResumo {
    pub id: i64,
    pub nome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Associado {
    pub id: i64,
    pub nome: String,
    pub email: Option<String>,
    pub faculdade: Option<String>,
    pub telefone: String,
    pub contato_apoio: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
    pub sexo: Sexo,
    pub cpf: Option<String>,
    pub endereco: String,
    pub is_active: bool,
    pub observacao: Option<String>,
    pub usuario_id: Option<i64>,
    pub total_terapeutas_supervisionados: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub setores: Vec<SetorResumo>,
    #[sqlx(skip)]
    pub is_decano: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssociadoEntrada {
    #[validate(length(min = 1, max = 255, message = "Informe o nome (até 255 caracteres)."))]
    pub nome: String,
    #[serde(default)]
    pub setores: Vec<i64>,
    #[validate(email(message = "Informe um endereço de e-mail válido."))]
    pub email: Option<String>,
    pub faculdade: Option<String>,
    #[validate(custom = "validar_telefone")]
    pub telefone: String,
    #[validate(custom = "validar_telefone")]
    pub contato_apoio: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
    pub sexo: Sexo,
    #[validate(custom = "validar_cpf")]
    pub cpf: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Informe o endereço (até 100 caracteres)."))]
    pub endereco: String,
    #[serde(default = "padrao_ativo")]
    pub is_active: bool,
    pub observacao: Option<String>,
    pub usuario_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Terapeutas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Terapeuta {
    pub id: i64,
    pub associado_id: i64,
    pub decano_id: i64,
    pub abordagem_id: i64,
    pub nucleo_id: i64,
    pub clinica_id: i64,
    pub modalidade_id: i64,
    pub is_active: bool,
    pub associado_nome: String,
    pub associado_email: Option<String>,
    pub decano_nome: String,
    pub abordagem_nome: String,
    pub nucleo_nome: String,
    pub clinica_nome: String,
    pub modalidade_nome: String,
    pub total_consultas: i64,
    pub total_pacientes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TerapeutaEntrada {
    pub associado_id: i64,
    pub decano_id: i64,
    pub abordagem_id: i64,
    pub nucleo_id: i64,
    pub clinica_id: i64,
    pub modalidade_id: i64,
    #[serde(default = "padrao_ativo")]
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Pacientes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Paciente {
    pub id: i64,
    pub clinica_id: i64,
    pub captacao_id: i64,
    pub modalidade_id: i64,
    pub nome: String,
    pub email: Option<String>,
    pub telefone: String,
    pub nome_contato_apoio: Option<String>,
    pub parentesco_contato_apoio: Option<String>,
    pub contato_apoio: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
    pub valor_sessao: Centavos,
    pub is_active: bool,
    pub observacao: Option<String>,
    pub clinica_nome: String,
    pub captacao_nome: String,
    pub modalidade_nome: String,
    pub total_consultas: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PacienteEntrada {
    pub clinica_id: i64,
    pub captacao_id: i64,
    pub modalidade_id: i64,
    #[validate(length(min = 1, max = 255, message = "Informe o nome (até 255 caracteres)."))]
    pub nome: String,
    #[validate(email(message = "Informe um endereço de e-mail válido."))]
    pub email: Option<String>,
    #[validate(custom = "validar_telefone")]
    pub telefone: String,
    pub nome_contato_apoio: Option<String>,
    pub parentesco_contato_apoio: Option<String>,
    #[validate(custom = "validar_telefone")]
    pub contato_apoio: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
    #[validate(custom = "validar_valor_nao_negativo")]
    pub valor_sessao: Centavos,
    #[serde(default = "padrao_ativo")]
    pub is_active: bool,
    pub observacao: Option<String>,
}

// ---------------------------------------------------------------------------
// Consultas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consulta {
    pub id: i64,
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub valor_consulta: Centavos,
    pub realizada: Option<bool>,
    pub valor_pago: Option<Centavos>,
    pub data_consulta: NaiveDate,
    pub terapeuta_nome: String,
    pub paciente_nome: String,
    pub abordagem_nome: String,
    pub clinica_nome: String,
    pub decano_nome: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consulta {
    /// Diferença entre o valor pago e o valor combinado da sessão
    pub fn diferenca_valor(&self) -> Centavos {
        match self.valor_pago {
            Some(pago) => pago - self.valor_consulta,
            None => Centavos::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsultaEntrada {
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    #[validate(custom = "validar_valor_positivo")]
    pub valor_consulta: Centavos,
    pub realizada: Option<bool>,
    #[validate(custom = "validar_valor_nao_negativo")]
    pub valor_pago: Option<Centavos>,
    pub data_consulta: NaiveDate,
}

// ---------------------------------------------------------------------------
// Avaliações
// ---------------------------------------------------------------------------

/// Momento do processo terapêutico em que a avaliação foi respondida
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum MomentoAvaliacao {
    #[serde(rename = "No início do processo (primeira sessão)")]
    #[sqlx(rename = "No início do processo (primeira sessão)")]
    Inicio,
    #[serde(rename = "Durante o acompanhamento terapêutico")]
    #[sqlx(rename = "Durante o acompanhamento terapêutico")]
    Durante,
    #[serde(rename = "Após o encerramento da terapia")]
    #[sqlx(rename = "Após o encerramento da terapia")]
    Encerramento,
}

impl MomentoAvaliacao {
    pub fn rotulo(self) -> &'static str {
        match self {
            MomentoAvaliacao::Inicio => "No início do processo (primeira sessão)",
            MomentoAvaliacao::Durante => "Durante o acompanhamento terapêutico",
            MomentoAvaliacao::Encerramento => "Após o encerramento da terapia",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Avaliacao {
    pub id: i64,
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub data_consulta: NaiveDate,
    pub consentimento_paciente: Option<bool>,
    pub individual: Option<i64>,
    pub interpessoal: Option<i64>,
    pub social: Option<i64>,
    pub geral: Option<i64>,
    pub qualidade_geral: Option<i64>,
    pub continuar_terapeuta: bool,
    pub continuar_allos: bool,
    pub momento: MomentoAvaliacao,
    pub terapeuta_nome: String,
    pub paciente_nome: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AvaliacaoEntrada {
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub data_consulta: NaiveDate,
    #[serde(default)]
    pub consentimento_paciente: Option<bool>,
    #[validate(range(min = 0, max = 10, message = "A nota deve estar entre 0 e 10."))]
    pub individual: Option<i64>,
    #[validate(range(min = 0, max = 10, message = "A nota deve estar entre 0 e 10."))]
    pub interpessoal: Option<i64>,
    #[validate(range(min = 0, max = 10, message = "A nota deve estar entre 0 e 10."))]
    pub social: Option<i64>,
    #[validate(range(min = 0, max = 10, message = "A nota deve estar entre 0 e 10."))]
    pub geral: Option<i64>,
    #[validate(range(min = 0, max = 10, message = "A nota deve estar entre 0 e 10."))]
    pub qualidade_geral: Option<i64>,
    #[serde(default)]
    pub continuar_terapeuta: bool,
    #[serde(default)]
    pub continuar_allos: bool,
    pub momento: MomentoAvaliacao,
}

// ---------------------------------------------------------------------------
// Altas e desistências
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Cancelador {
    Paciente,
    Terapeuta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum MomentoAlta {
    #[serde(rename = "Antes da primeira sessão")]
    #[sqlx(rename = "Antes da primeira sessão")]
    AntesPrimeiraSessao,
    #[serde(rename = "Depois da primeira sessão")]
    #[sqlx(rename = "Depois da primeira sessão")]
    DepoisPrimeiraSessao,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TipoAlta {
    Alta,
    Desistencia,
}

impl Cancelador {
    pub fn rotulo(self) -> &'static str {
        match self {
            Cancelador::Paciente => "Paciente",
            Cancelador::Terapeuta => "Terapeuta",
        }
    }
}

impl MomentoAlta {
    pub fn rotulo(self) -> &'static str {
        match self {
            MomentoAlta::AntesPrimeiraSessao => "Antes da primeira sessão",
            MomentoAlta::DepoisPrimeiraSessao => "Depois da primeira sessão",
        }
    }
}

impl TipoAlta {
    pub fn rotulo(self) -> &'static str {
        match self {
            TipoAlta::Alta => "Alta",
            TipoAlta::Desistencia => "Desistência",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AltaDesistencia {
    pub id: i64,
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub data_sessao: Option<NaiveDate>,
    pub cancelador: Option<Cancelador>,
    pub motivo_cancelamento: Option<String>,
    pub momento: Option<MomentoAlta>,
    pub tipo: Option<TipoAlta>,
    pub terapeuta_nome: String,
    pub paciente_nome: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AltaDesistenciaEntrada {
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub data_sessao: Option<NaiveDate>,
    pub cancelador: Option<Cancelador>,
    pub motivo_cancelamento: Option<String>,
    pub momento: Option<MomentoAlta>,
    pub tipo: Option<TipoAlta>,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: i64,
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub data_consulta: NaiveDate,
    pub terapeuta_nome: String,
    pub paciente_nome: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchEntrada {
    pub terapeuta_id: i64,
    pub paciente_id: i64,
    pub data_consulta: NaiveDate,
}

// ---------------------------------------------------------------------------
// Seleção (avaliação entre pares)
// ---------------------------------------------------------------------------

/// Dimensões avaliadas na seleção, na ordem das colunas
pub const DIMENSOES_SELECAO: [(&str, &str); 12] = [
    ("estagio_mudanca", "Estágio de Mudança"),
    ("estrutura", "Estrutura: Coerência e Consistência"),
    ("encerramento", "Encerramento | Abertura"),
    ("acolhimento", "Sensação de Acolhimento"),
    ("seguranca_terapeuta", "Segurança do Terapeuta"),
    ("seguranca_metodo", "Segurança do Método"),
    ("aprofundar", "Capacidade de Aprofundar"),
    ("hipoteses", "Construção de Hipóteses"),
    ("interpretacao", "Capacidade Interpretativa"),
    ("frase_timing", "Construção de Frase & Timing"),
    ("corpo_setting", "Corpo & Setting"),
    ("insight_potencia", "Insight & Potência"),
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Selecao {
    pub id: i64,
    pub avaliador_id: i64,
    pub avaliado_id: i64,
    pub data_avaliacao: NaiveDate,
    pub estagio_mudanca: i64,
    pub estrutura: i64,
    pub encerramento: i64,
    pub acolhimento: i64,
    pub seguranca_terapeuta: i64,
    pub seguranca_metodo: i64,
    pub aprofundar: i64,
    pub hipoteses: i64,
    pub interpretacao: i64,
    pub frase_timing: i64,
    pub corpo_setting: i64,
    pub insight_potencia: i64,
    pub avaliador_nome: String,
    pub avaliado_nome: String,
}

impl Selecao {
    pub fn notas(&self) -> [i64; 12] {
        [
            self.estagio_mudanca,
            self.estrutura,
            self.encerramento,
            self.acolhimento,
            self.seguranca_terapeuta,
            self.seguranca_metodo,
            self.aprofundar,
            self.hipoteses,
            self.interpretacao,
            self.frase_timing,
            self.corpo_setting,
            self.insight_potencia,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SelecaoEntrada {
    pub avaliador_id: i64,
    pub avaliado_id: i64,
    pub data_avaliacao: NaiveDate,
    #[validate(custom = "validar_nota_selecao")]
    pub estagio_mudanca: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub estrutura: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub encerramento: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub acolhimento: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub seguranca_terapeuta: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub seguranca_metodo: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub aprofundar: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub hipoteses: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub interpretacao: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub frase_timing: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub corpo_setting: i64,
    #[validate(custom = "validar_nota_selecao")]
    pub insight_potencia: i64,
}

// ---------------------------------------------------------------------------
// Usuários e permissões
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Regra de negócio da consulta: sessão não realizada não pode estar paga
pub fn validar_realizada_e_paga(realizada: Option<bool>, paga: bool) -> Result<(), ValidationError> {
    if realizada == Some(false) && paga {
        let mut erro = ValidationError::new("nao_realizada_paga");
        erro.message = Some("Uma consulta não realizada não pode estar paga.".into());
        return Err(erro);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paciente_valido() -> PacienteEntrada {
        PacienteEntrada {
            clinica_id: 1,
            captacao_id: 1,
            modalidade_id: 1,
            nome: "Maria".to_string(),
            email: Some("maria@example.com".to_string()),
            telefone: "31988553344".to_string(),
            nome_contato_apoio: None,
            parentesco_contato_apoio: None,
            contato_apoio: None,
            data_nascimento: None,
            valor_sessao: Centavos(15000),
            is_active: true,
            observacao: None,
        }
    }

    #[test]
    fn paciente_valido_passa() {
        assert!(paciente_valido().validate().is_ok());
    }

    #[test]
    fn telefone_e_email_invalidos_sao_reportados_por_campo() {
        let mut paciente = paciente_valido();
        paciente.telefone = "(31) 9999".to_string();
        paciente.email = Some("sem-arroba".to_string());

        let erros = crate::error::ErrosCampos::from(paciente.validate().unwrap_err());
        assert!(erros.campo("telefone").is_some());
        assert!(erros.campo("email").is_some());
        assert!(erros.campo("nome").is_none());
    }

    #[test]
    fn consulta_rejeita_valor_zero_e_pagamento_negativo() {
        let consulta = ConsultaEntrada {
            terapeuta_id: 1,
            paciente_id: 1,
            valor_consulta: Centavos(0),
            realizada: Some(true),
            valor_pago: Some(Centavos(-100)),
            data_consulta: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        };
        let erros = crate::error::ErrosCampos::from(consulta.validate().unwrap_err());
        assert!(erros.campo("valor_consulta").is_some());
        assert!(erros.campo("valor_pago").is_some());
    }

    #[test]
    fn avaliacao_fora_da_escala() {
        let avaliacao = AvaliacaoEntrada {
            terapeuta_id: 1,
            paciente_id: 1,
            data_consulta: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            consentimento_paciente: Some(true),
            individual: Some(11),
            interpessoal: None,
            social: Some(5),
            geral: None,
            qualidade_geral: Some(-1),
            continuar_terapeuta: true,
            continuar_allos: true,
            momento: MomentoAvaliacao::Durante,
        };
        let erros = crate::error::ErrosCampos::from(avaliacao.validate().unwrap_err());
        assert!(erros.campo("individual").is_some());
        assert!(erros.campo("qualidade_geral").is_some());
        assert!(erros.campo("social").is_none());
    }

    #[test]
    fn nao_realizada_nao_pode_estar_paga() {
        assert!(validar_realizada_e_paga(Some(false), true).is_err());
        assert!(validar_realizada_e_paga(Some(true), true).is_ok());
        assert!(validar_realizada_e_paga(None, true).is_ok());
        assert!(validar_realizada_e_paga(Some(false), false).is_ok());
    }

    #[test]
    fn enums_usam_rotulos_originais_no_json() {
        let json = serde_json::to_string(&MomentoAlta::AntesPrimeiraSessao).unwrap();
        assert_eq!(json, "\"Antes da primeira sessão\"");
        let tipo: TipoAlta = serde_json::from_str("\"desistencia\"").unwrap();
        assert_eq!(tipo, TipoAlta::Desistencia);
        let sexo: Sexo = serde_json::from_str("\"F\"").unwrap();
        assert_eq!(sexo, Sexo::Feminino);
    }
}
