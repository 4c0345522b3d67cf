//! Configuração da aplicação via linha de comando e variáveis de ambiente

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use common_db::metricas::{ConfigMetricas, EscopoReceita, Janela};
use common_db::DbConfig;

use crate::build_info;

#[derive(Debug, Parser)]
#[command(
    name = "clinic-api",
    version = build_info::PKG_VERSION,
    about = "Gestão clínica Allos: API, formulários, painel e relatórios"
)]
pub struct Cli {
    #[command(flatten)]
    pub config: AppConfig,

    #[command(subcommand)]
    pub comando: Option<Comando>,
}

#[derive(Debug, Subcommand)]
pub enum Comando {
    /// Inicia o servidor HTTP (padrão)
    Serve,
    /// Importa terapeutas de um CSV (NOME, USUARIO, SENHA) em CP1252
    ImportarTerapeutas {
        arquivo_csv: PathBuf,
    },
    /// Cria ou atualiza um superusuário
    CriarSuperusuario {
        #[arg(long)]
        username: String,
        #[arg(long, env = "ALLOS_SUPERUSUARIO_SENHA", hide_env_values = true)]
        senha: String,
    },
    /// Concede permissões (ex.: principais.view_consulta) a um grupo
    ConcederPermissao {
        #[arg(long)]
        grupo: String,
        #[arg(required = true)]
        codigos: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EscopoReceitaArg {
    PacientesAtivos,
    SessoesNaJanela,
}

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Endereço de escuta do servidor
    #[arg(long, env = "ALLOS_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Caminho do arquivo SQLite
    #[arg(long, env = "ALLOS_DB_PATH", default_value = "data/clinic.db")]
    pub db_path: String,

    #[arg(long, env = "ALLOS_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Nível de trace do SQL (0 desativa)
    #[arg(long, env = "ALLOS_SQL_TRACE", default_value_t = 0)]
    pub sql_trace: u8,

    /// Segredo de assinatura dos tokens (aleatório se ausente)
    #[arg(long, env = "ALLOS_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "ALLOS_TOKEN_TTL_HORAS", default_value_t = 12)]
    pub token_ttl_horas: i64,

    /// Janela das métricas em dias; sem valor usa todo o histórico
    #[arg(long, env = "ALLOS_JANELA_DIAS", value_parser = clap::value_parser!(u32).range(1..=36500))]
    pub janela_dias: Option<u32>,

    #[arg(long, env = "ALLOS_ESCOPO_RECEITA", value_enum, default_value_t = EscopoReceitaArg::PacientesAtivos)]
    pub escopo_receita: EscopoReceitaArg,

    /// Máximo de requisições simultâneas
    #[arg(long, env = "ALLOS_LIMITE_CONCORRENCIA", default_value_t = 256)]
    pub limite_concorrencia: usize,

    /// Logs em JSON
    #[arg(long, env = "ALLOS_LOG_JSON")]
    pub log_json: bool,

    /// Marca o cookie de sessão como Secure (HTTPS)
    #[arg(long, env = "ALLOS_COOKIE_SEGURO")]
    pub cookie_seguro: bool,
}

impl AppConfig {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            db_path: self.db_path.clone(),
            max_connections: self.db_max_connections,
            trace_level: self.sql_trace,
        }
    }

    pub fn config_metricas(&self) -> ConfigMetricas {
        ConfigMetricas {
            janela: self.janela_dias.map(Janela::Dias).unwrap_or(Janela::Total),
            escopo_receita: match self.escopo_receita {
                EscopoReceitaArg::PacientesAtivos => EscopoReceita::PacientesAtivos,
                EscopoReceitaArg::SessoesNaJanela => EscopoReceita::SessoesNaJanela,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padroes_sem_argumentos() {
        let cli = Cli::try_parse_from(["clinic-api"]).unwrap();
        assert!(cli.comando.is_none());
        assert_eq!(cli.config.db_path, "data/clinic.db");
        let metricas = cli.config.config_metricas();
        assert_eq!(metricas.janela, Janela::Total);
        assert_eq!(metricas.escopo_receita, EscopoReceita::PacientesAtivos);
    }

    #[test]
    fn janela_e_escopo_configuraveis() {
        let cli = Cli::try_parse_from([
            "clinic-api",
            "--janela-dias",
            "30",
            "--escopo-receita",
            "sessoes-na-janela",
        ])
        .unwrap();
        let metricas = cli.config.config_metricas();
        assert_eq!(metricas.janela, Janela::Dias(30));
        assert_eq!(metricas.escopo_receita, EscopoReceita::SessoesNaJanela);
    }

    #[test]
    fn janela_fora_dos_limites_e_recusada() {
        assert!(Cli::try_parse_from(["clinic-api", "--janela-dias", "0"]).is_err());
        assert!(Cli::try_parse_from(["clinic-api", "--janela-dias", "36501"]).is_err());
        assert!(Cli::try_parse_from(["clinic-api", "--janela-dias", "4294967295"]).is_err());
        let cli = Cli::try_parse_from(["clinic-api", "--janela-dias", "36500"]).unwrap();
        assert_eq!(cli.config.config_metricas().janela, Janela::Dias(36500));
    }

    #[test]
    fn subcomandos() {
        let cli = Cli::try_parse_from(["clinic-api", "importar-terapeutas", "terapeutas.csv"]).unwrap();
        assert!(matches!(
            cli.comando,
            Some(Comando::ImportarTerapeutas { ref arquivo_csv }) if arquivo_csv.ends_with("terapeutas.csv")
        ));

        let cli = Cli::try_parse_from([
            "clinic-api",
            "conceder-permissao",
            "--grupo",
            "Terapeuta",
            "principais.view_consulta",
            "principais.add_consulta",
        ])
        .unwrap();
        match cli.comando {
            Some(Comando::ConcederPermissao { grupo, codigos }) => {
                assert_eq!(grupo, "Terapeuta");
                assert_eq!(codigos.len(), 2);
            }
            outro => panic!("comando inesperado: {:?}", outro),
        }
    }
}
