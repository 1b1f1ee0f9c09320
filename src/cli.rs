//! Interface de linha de comando do batchsync baseada em clap.
//!
//! Define a struct [`Cli`] com as opções de conta, região, prefixo e
//! descritores JSON, além dos arquivos de especificação de jobs a submeter.

use std::path::PathBuf;

use clap::Parser;

use batchsync::config::Overrides;

/// batchsync: provisiona recursos de batch, submete jobs e acompanha até o fim.
#[derive(Debug, Parser)]
#[command(name = "batchsync", version, about)]
pub struct Cli {
    /// Conta AWS usada para executar os jobs.
    #[arg(short = 'a', long)]
    pub account: Option<String>,

    /// Arquivo de configuração TOML (padrão: ./batchsync.toml).
    #[arg(short = 'C', long = "conf")]
    pub conf: Option<PathBuf>,

    /// Arquivo JSON com a descrição do ambiente de computação a criar.
    #[arg(long = "compute-environment", visible_alias = "co")]
    pub compute_environment: Option<PathBuf>,

    /// Arquivo JSON com a definição de job a registrar.
    #[arg(short = 'j', long = "job-definition")]
    pub job_definition: Option<PathBuf>,

    /// Prefixo dos nomes do ambiente de computação, fila e definição de job.
    #[arg(short = 'p', long)]
    pub prefix: Option<String>,

    /// Arquivo JSON com a descrição da fila de jobs. Sem ele, a fila é
    /// derivada do ambiente de computação.
    #[arg(short = 'q', long = "job-queue")]
    pub job_queue: Option<PathBuf>,

    /// Região AWS onde os jobs executam.
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// Endpoint do serviço de batch (ex.: um proxy de assinatura).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Segundos entre varreduras de status.
    #[arg(long = "poll-interval", value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,

    /// Arquivos JSON com os jobs a submeter.
    #[arg(value_name = "JOB_SPEC")]
    pub job_specs: Vec<PathBuf>,
}

impl Cli {
    /// Valores da linha de comando que sobrescrevem o arquivo de configuração.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            account: self.account.clone(),
            region: self.region.clone(),
            prefix: self.prefix.clone(),
            compute_environment: self.compute_environment.clone(),
            job_definition: self.job_definition.clone(),
            job_queue: self.job_queue.clone(),
            endpoint: self.endpoint.clone(),
            poll_interval_secs: self.poll_interval,
        }
    }
}
