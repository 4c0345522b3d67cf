//! Entidades expostas em `/api/v1/`

use std::future::Future;

use common_db::models::{
    Acessorio, AcessorioEntrada, AltaDesistencia, AltaDesistenciaEntrada, Associado,
    AssociadoEntrada, Avaliacao, AvaliacaoEntrada, Consulta, ConsultaEntrada, Match, MatchEntrada,
    Paciente, PacienteEntrada, Selecao, SelecaoEntrada, Terapeuta, TerapeutaEntrada,
};
use common_db::repositorio::acessorios::{self, TabelaAcessorio};
use common_db::repositorio::{
    altas, associados, avaliacoes, consultas, matches, pacientes, selecoes, terapeutas,
};
use common_db::DbError;
use sqlx::SqlitePool;

use super::recurso::{Recurso, RecursoAtualizavel};

const PRINCIPAIS: &str = "principais";
const ACESSORIOS: &str = "acessorios";

/// Marcadores das tabelas auxiliares, todas com o mesmo formato
macro_rules! recurso_acessorio {
    ($marcador:ident, $tabela:expr, $modelo:literal) => {
        pub struct $marcador;

        impl Recurso for $marcador {
            type Entrada = AcessorioEntrada;
            type Saida = Acessorio;
            const APP: &'static str = ACESSORIOS;
            const MODELO: &'static str = $modelo;

            fn listar(
                pool: &SqlitePool,
            ) -> impl Future<Output = Result<Vec<Acessorio>, DbError>> + Send {
                acessorios::listar(pool, $tabela)
            }

            fn buscar(
                pool: &SqlitePool,
                id: i64,
            ) -> impl Future<Output = Result<Acessorio, DbError>> + Send {
                acessorios::buscar(pool, $tabela, id)
            }

            fn criar(
                pool: &SqlitePool,
                entrada: AcessorioEntrada,
            ) -> impl Future<Output = Result<Acessorio, DbError>> + Send {
                async move { acessorios::criar(pool, $tabela, &entrada).await }
            }

            fn excluir(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<(), DbError>> + Send {
                acessorios::excluir(pool, $tabela, id)
            }
        }

        impl RecursoAtualizavel for $marcador {
            fn atualizar(
                pool: &SqlitePool,
                id: i64,
                entrada: AcessorioEntrada,
            ) -> impl Future<Output = Result<Acessorio, DbError>> + Send {
                async move { acessorios::atualizar(pool, $tabela, id, &entrada).await }
            }
        }
    };
}

recurso_acessorio!(Abordagem, TabelaAcessorio::Abordagem, "abordagem");
recurso_acessorio!(Captacao, TabelaAcessorio::Captacao, "captacao");
recurso_acessorio!(Clinica, TabelaAcessorio::Clinica, "clinica");
recurso_acessorio!(Modalidade, TabelaAcessorio::Modalidade, "modalidade");
recurso_acessorio!(Nucleo, TabelaAcessorio::Nucleo, "nucleo");
recurso_acessorio!(Setor, TabelaAcessorio::Setor, "setor");

/// Entidade principal com o módulo de repositório de mesmo formato
macro_rules! recurso_principal {
    ($marcador:ident, $repo:ident, $entrada:ty, $saida:ty, $modelo:literal) => {
        pub struct $marcador;

        impl Recurso for $marcador {
            type Entrada = $entrada;
            type Saida = $saida;
            const APP: &'static str = PRINCIPAIS;
            const MODELO: &'static str = $modelo;

            fn listar(pool: &SqlitePool) -> impl Future<Output = Result<Vec<$saida>, DbError>> + Send {
                $repo::listar(pool)
            }

            fn buscar(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<$saida, DbError>> + Send {
                $repo::buscar(pool, id)
            }

            fn criar(
                pool: &SqlitePool,
                entrada: $entrada,
            ) -> impl Future<Output = Result<$saida, DbError>> + Send {
                async move { $repo::criar(pool, &entrada).await }
            }

            fn excluir(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<(), DbError>> + Send {
                $repo::excluir(pool, id)
            }
        }
    };
    ($marcador:ident, $repo:ident, $entrada:ty, $saida:ty, $modelo:literal, atualizavel) => {
        recurso_principal!($marcador, $repo, $entrada, $saida, $modelo);

        impl RecursoAtualizavel for $marcador {
            fn atualizar(
                pool: &SqlitePool,
                id: i64,
                entrada: $entrada,
            ) -> impl Future<Output = Result<$saida, DbError>> + Send {
                async move { $repo::atualizar(pool, id, &entrada).await }
            }
        }
    };
}

recurso_principal!(AssociadoRecurso, associados, AssociadoEntrada, Associado, "associado", atualizavel);
recurso_principal!(TerapeutaRecurso, terapeutas, TerapeutaEntrada, Terapeuta, "terapeuta", atualizavel);
recurso_principal!(PacienteRecurso, pacientes, PacienteEntrada, Paciente, "paciente", atualizavel);
recurso_principal!(ConsultaRecurso, consultas, ConsultaEntrada, Consulta, "consulta", atualizavel);
recurso_principal!(AvaliacaoRecurso, avaliacoes, AvaliacaoEntrada, Avaliacao, "avaliacao");
recurso_principal!(MatchRecurso, matches, MatchEntrada, Match, "match", atualizavel);
recurso_principal!(SelecaoRecurso, selecoes, SelecaoEntrada, Selecao, "selecao", atualizavel);

/// Alta/desistência: a criação passa pela regra que desativa o paciente
pub struct AltaDesistenciaRecurso;

impl Recurso for AltaDesistenciaRecurso {
    type Entrada = AltaDesistenciaEntrada;
    type Saida = AltaDesistencia;
    const APP: &'static str = PRINCIPAIS;
    const MODELO: &'static str = "altadesistencia";

    fn listar(pool: &SqlitePool) -> impl Future<Output = Result<Vec<AltaDesistencia>, DbError>> + Send {
        altas::listar(pool)
    }

    fn buscar(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<AltaDesistencia, DbError>> + Send {
        altas::buscar(pool, id)
    }

    fn criar(
        pool: &SqlitePool,
        entrada: AltaDesistenciaEntrada,
    ) -> impl Future<Output = Result<AltaDesistencia, DbError>> + Send {
        async move { altas::registrar_alta(pool, &entrada).await }
    }

    fn excluir(pool: &SqlitePool, id: i64) -> impl Future<Output = Result<(), DbError>> + Send {
        altas::excluir(pool, id)
    }
}
