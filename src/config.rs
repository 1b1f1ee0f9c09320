//! Configuração do batchsync carregada a partir de `batchsync.toml`.
//!
//! O arquivo usa chaves pontuadas no mesmo espaço de nomes das propriedades
//! originais (`aws.region`, `aws.account`, `aws.batch.prefix`, ...).
//! Opções de linha de comando têm precedência sobre a variável de ambiente
//! `AWS_REGION`, que por sua vez tem precedência sobre o arquivo.
//! O resultado final é um [`SyncConfig`] explícito, entregue ao
//! sincronizador em `initialize`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::descriptor::DescriptorPaths;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "batchsync.toml";

/// Conteúdo do arquivo de configuração. Todos os campos são opcionais.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub aws: AwsSection,
}

/// Tabela `[aws]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsSection {
    pub region: Option<String>,
    pub account: Option<String>,
    #[serde(default)]
    pub batch: BatchSection,
}

/// Tabela `[aws.batch]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchSection {
    pub prefix: Option<String>,
    pub compute_environment: Option<PathBuf>,
    pub job_definition: Option<PathBuf>,
    pub job_queue: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub provision_timeout_secs: Option<u64>,
    pub provision_poll_interval_secs: Option<u64>,
}

impl FileConfig {
    /// Carrega a configuração do caminho dado, ou de `batchsync.toml` no
    /// diretório atual. Usa valores vazios se o arquivo padrão não existir;
    /// um caminho explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("cannot read config file {}: {e}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str::<FileConfig>(contents)?)
    }
}

/// Valores vindos da linha de comando; sobrescrevem o arquivo.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub account: Option<String>,
    pub region: Option<String>,
    pub prefix: Option<String>,
    pub compute_environment: Option<PathBuf>,
    pub job_definition: Option<PathBuf>,
    pub job_queue: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub poll_interval_secs: Option<u64>,
}

/// Configuração resolvida usada pelo sincronizador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub account: String,
    pub region: String,
    /// Prefixo dos nomes de recursos (`<prefix>-ce`, `<prefix>-jq`, `<prefix>-jd`).
    pub prefix: String,
    pub descriptors: DescriptorPaths,
    /// Endpoint do serviço; `None` usa o endpoint regional.
    pub endpoint: Option<String>,
    /// Intervalo entre o fim de uma varredura de status e o início da próxima.
    pub poll_interval: Duration,
    /// Tempo máximo de espera até um recurso criado ficar utilizável.
    pub provision_timeout: Duration,
    /// Intervalo entre consultas enquanto um recurso é criado.
    pub provision_poll_interval: Duration,
}

// Valor padrão do intervalo de varredura: 30s.
fn default_poll_interval_secs() -> u64 {
    30
}

// Valor padrão do tempo limite de provisionamento: 10 minutos.
fn default_provision_timeout_secs() -> u64 {
    600
}

// Valor padrão do intervalo de consulta durante o provisionamento: 5s.
fn default_provision_poll_interval_secs() -> u64 {
    5
}

impl SyncConfig {
    pub fn new(
        account: impl Into<String>,
        region: impl Into<String>,
        prefix: impl Into<String>,
        descriptors: DescriptorPaths,
    ) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            prefix: prefix.into(),
            descriptors,
            endpoint: None,
            poll_interval: Duration::from_secs(default_poll_interval_secs()),
            provision_timeout: Duration::from_secs(default_provision_timeout_secs()),
            provision_poll_interval: Duration::from_secs(default_provision_poll_interval_secs()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_provision_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.provision_timeout = timeout;
        self.provision_poll_interval = poll_interval;
        self
    }

    /// Combina linha de comando, ambiente e arquivo.
    ///
    /// `env_region` é o valor de `AWS_REGION`, passado explicitamente para
    /// que nenhum componente leia estado global.
    pub fn resolve(
        file: FileConfig,
        overrides: Overrides,
        env_region: Option<String>,
    ) -> Result<Self> {
        let batch = file.aws.batch;
        let env_region = env_region.filter(|r| !r.is_empty());

        let prefix = required(overrides.prefix, batch.prefix, "aws.batch.prefix", "prefix")?;
        let region = required(
            overrides.region.or(env_region),
            file.aws.region,
            "aws.region",
            "region",
        )?;
        let account = required(overrides.account, file.aws.account, "aws.account", "account")?;
        let compute_environment = required(
            overrides.compute_environment,
            batch.compute_environment,
            "aws.batch.compute_environment",
            "compute-environment",
        )?;
        let job_definition = required(
            overrides.job_definition,
            batch.job_definition,
            "aws.batch.job_definition",
            "job-definition",
        )?;
        // Sem fila explícita, ela é derivada do ambiente de computação.
        let job_queue = overrides.job_queue.or(batch.job_queue);

        let descriptors = DescriptorPaths {
            compute_environment,
            job_definition,
            job_queue,
        };
        let mut config = Self::new(account, region, prefix, descriptors);
        config.endpoint = overrides.endpoint.or(batch.endpoint);
        if let Some(secs) = overrides.poll_interval_secs.or(batch.poll_interval_secs) {
            config.poll_interval =
                positive_secs(secs, "aws.batch.poll_interval_secs", "--poll-interval")?;
        }
        if let Some(secs) = batch.provision_timeout_secs {
            config.provision_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = batch.provision_poll_interval_secs {
            config.provision_poll_interval =
                positive_secs(secs, "aws.batch.provision_poll_interval_secs", "")?;
        }
        Ok(config)
    }
}

fn required<T>(cli: Option<T>, file: Option<T>, key: &str, option: &str) -> Result<T> {
    cli.or(file).ok_or_else(|| {
        anyhow!(
            "Unable to determine value of {key}. Either specify it in the config file or set command line option --{option}"
        )
    })
}

// Intervalo zero faria o serviço remoto ser consultado em laço fechado.
fn positive_secs(secs: u64, key: &str, option: &str) -> Result<Duration> {
    if secs == 0 {
        let via = if option.is_empty() {
            String::new()
        } else {
            format!(" or {option}")
        };
        return Err(anyhow!("{key}{via} must be at least 1 second, got 0"));
    }
    Ok(Duration::from_secs(secs))
}
