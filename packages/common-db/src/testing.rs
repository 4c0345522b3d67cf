//! Utilidades de teste: banco em memória e um cenário mínimo de cadastros
//!
//! Disponível nos testes desta biblioteca e, com a feature `test-utils`, nos
//! testes das aplicações.

use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::dinheiro::Centavos;
use crate::migrations::run_migrations;
use crate::models::{
    AcessorioEntrada, AssociadoEntrada, ConsultaEntrada, PacienteEntrada, Sexo, TerapeutaEntrada,
};
use crate::repositorio::acessorios::{self, TabelaAcessorio};
use crate::repositorio::usuarios::{self, NovoUsuario};
use crate::repositorio::{associados, consultas, pacientes, terapeutas};

/// Pool SQLite em memória com as migrações aplicadas.
///
/// Usa uma única conexão que nunca expira, senão o banco some.
pub async fn pool_em_memoria() -> SqlitePool {
    let opcoes = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("URL de banco em memória")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opcoes)
        .await
        .expect("Falha ao abrir banco em memória");
    run_migrations(&pool).await.expect("Falha ao aplicar migrações");
    pool
}

/// Data no formato ISO (`2024-05-10`)
pub fn data(texto: &str) -> NaiveDate {
    NaiveDate::parse_from_str(texto, "%Y-%m-%d").expect("data ISO válida")
}

pub fn associado_entrada(nome: &str) -> AssociadoEntrada {
    AssociadoEntrada {
        nome: nome.to_string(),
        setores: Vec::new(),
        email: None,
        faculdade: None,
        telefone: "31988553344".to_string(),
        contato_apoio: None,
        data_nascimento: None,
        sexo: Sexo::Feminino,
        cpf: None,
        endereco: "Rua das Flores, 10".to_string(),
        is_active: true,
        observacao: None,
        usuario_id: None,
    }
}

async fn acessorio(pool: &SqlitePool, tabela: TabelaAcessorio, nome: &str) -> i64 {
    acessorios::criar(
        pool,
        tabela,
        &AcessorioEntrada {
            nome: nome.to_string(),
            is_active: true,
        },
    )
    .await
    .expect("Falha ao criar acessório")
    .id
}

/// Cadastros básicos: tabelas auxiliares, uma decana e um terapeuta ligado a
/// uma conta de usuário
#[derive(Debug, Clone)]
pub struct Cenario {
    pub clinica: i64,
    pub captacao: i64,
    pub modalidade: i64,
    pub nucleo: i64,
    pub abordagem: i64,
    pub setor_decano: i64,
    pub setor_clinico: i64,
    pub decano: i64,
    pub usuario_terapeuta: i64,
    pub associado_comum: i64,
    pub terapeuta: i64,
}

impl Cenario {
    pub async fn montar(pool: &SqlitePool) -> Cenario {
        let clinica = acessorio(pool, TabelaAcessorio::Clinica, "Centro").await;
        let captacao = acessorio(pool, TabelaAcessorio::Captacao, "Instagram").await;
        let modalidade = acessorio(pool, TabelaAcessorio::Modalidade, "Online").await;
        let nucleo = acessorio(pool, TabelaAcessorio::Nucleo, "Núcleo Savassi").await;
        let abordagem = acessorio(pool, TabelaAcessorio::Abordagem, "TCC").await;
        let setor_decano = acessorio(pool, TabelaAcessorio::Setor, "Decanos").await;
        let setor_clinico = acessorio(pool, TabelaAcessorio::Setor, "Clínico").await;

        let mut entrada = associado_entrada("Decana Dalva");
        entrada.setores = vec![setor_decano];
        let decano = associados::criar(pool, &entrada)
            .await
            .expect("Falha ao criar decana")
            .id;

        let usuario_terapeuta = {
            let mut conn = pool.acquire().await.expect("conexão");
            usuarios::criar_ou_atualizar(
                &mut conn,
                &NovoUsuario {
                    username: "teodoro",
                    password_hash: "sem-hash",
                    first_name: "Teodoro",
                    last_name: "Terapeuta",
                    is_staff: false,
                    is_superuser: false,
                },
            )
            .await
            .expect("Falha ao criar usuário")
            .0
        };

        let mut cenario = Cenario {
            clinica,
            captacao,
            modalidade,
            nucleo,
            abordagem,
            setor_decano,
            setor_clinico,
            decano,
            usuario_terapeuta,
            associado_comum: 0,
            terapeuta: 0,
        };

        let mut entrada = associado_entrada("Teodoro Terapeuta");
        entrada.setores = vec![setor_clinico];
        entrada.usuario_id = Some(usuario_terapeuta);
        entrada.sexo = Sexo::Masculino;
        cenario.associado_comum = associados::criar(pool, &entrada)
            .await
            .expect("Falha ao criar associado")
            .id;

        cenario.terapeuta = terapeutas::criar(pool, &cenario.terapeuta_entrada(cenario.associado_comum))
            .await
            .expect("Falha ao criar terapeuta")
            .id;

        cenario
    }

    pub fn terapeuta_entrada(&self, associado_id: i64) -> TerapeutaEntrada {
        TerapeutaEntrada {
            associado_id,
            decano_id: self.decano,
            abordagem_id: self.abordagem,
            nucleo_id: self.nucleo,
            clinica_id: self.clinica,
            modalidade_id: self.modalidade,
            is_active: true,
        }
    }

    /// Outro terapeuta ativo, com associado próprio
    pub async fn novo_terapeuta(&self, pool: &SqlitePool, nome: &str) -> i64 {
        let associado = associados::criar(pool, &associado_entrada(nome))
            .await
            .expect("Falha ao criar associado")
            .id;
        terapeutas::criar(pool, &self.terapeuta_entrada(associado))
            .await
            .expect("Falha ao criar terapeuta")
            .id
    }

    pub fn paciente_entrada(&self, nome: &str, valor_sessao: i64) -> PacienteEntrada {
        PacienteEntrada {
            clinica_id: self.clinica,
            captacao_id: self.captacao,
            modalidade_id: self.modalidade,
            nome: nome.to_string(),
            email: None,
            telefone: "31988553344".to_string(),
            nome_contato_apoio: None,
            parentesco_contato_apoio: None,
            contato_apoio: None,
            data_nascimento: None,
            valor_sessao: Centavos(valor_sessao),
            is_active: true,
            observacao: None,
        }
    }

    pub async fn novo_paciente(&self, pool: &SqlitePool, nome: &str, valor_sessao: i64) -> i64 {
        pacientes::criar(pool, &self.paciente_entrada(nome, valor_sessao))
            .await
            .expect("Falha ao criar paciente")
            .id
    }

    /// Consulta com o terapeuta do cenário, valor combinado de 150,00
    pub async fn nova_consulta(
        &self,
        pool: &SqlitePool,
        paciente: i64,
        data_consulta: &str,
        realizada: Option<bool>,
        valor_pago: Option<i64>,
    ) -> i64 {
        self.consulta_de(pool, self.terapeuta, paciente, data_consulta, realizada, valor_pago)
            .await
    }

    pub async fn consulta_de(
        &self,
        pool: &SqlitePool,
        terapeuta: i64,
        paciente: i64,
        data_consulta: &str,
        realizada: Option<bool>,
        valor_pago: Option<i64>,
    ) -> i64 {
        consultas::criar(
            pool,
            &ConsultaEntrada {
                terapeuta_id: terapeuta,
                paciente_id: paciente,
                valor_consulta: Centavos(15000),
                realizada,
                valor_pago: valor_pago.map(Centavos),
                data_consulta: data(data_consulta),
            },
        )
        .await
        .expect("Falha ao criar consulta")
        .id
    }
}
