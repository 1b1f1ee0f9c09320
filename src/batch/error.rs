//! Tipos de erro para o cliente do serviço de batch remoto.
//!
//! Define [`BatchError`] com variantes para recursos já existentes, jobs não
//! encontrados, rate limiting, erros da API e erros de rede. Usa `thiserror`
//! para derivar `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com o serviço de batch.
///
/// - [`AlreadyExists`](BatchError::AlreadyExists): a chamada de criação encontrou um recurso com o mesmo nome
/// - [`NotFound`](BatchError::NotFound): o job consultado não é conhecido pelo serviço
/// - [`RateLimited`](BatchError::RateLimited): o servidor retornou HTTP 429
/// - [`ApiError`](BatchError::ApiError): qualquer outro erro HTTP (4xx/5xx)
/// - [`NetworkError`](BatchError::NetworkError): falha na camada de rede
#[derive(Debug, Error)]
pub enum BatchError {
    /// O recurso já existe no serviço remoto.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// O job não foi encontrado (ainda não visível ou já expirado).
    #[error("job not found: {0}")]
    NotFound(String),

    /// O servidor retornou HTTP 429.
    /// O campo `retry_after_ms` indica quantos milissegundos esperar antes de retentar.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pela API (ex.: 400 parâmetro inválido, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// A resposta não tinha o formato esperado.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
