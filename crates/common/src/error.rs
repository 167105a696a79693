/// Erros do storage (localStorage ou backend em arquivo).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("quota excedida: {needed} bytes necessários, limite {limit}")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("serialização: {0}")]
    Serialization(String),
    #[error("versão de schema não suportada: {0}")]
    UnsupportedVersion(u32),
    #[error("chave inválida: {0}")]
    InvalidKey(String),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Erros do fluxo de pedido.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("filial desconhecida: {0}")]
    UnknownBranch(String),
    #[error("número de WhatsApp inválido: {0}")]
    InvalidPhone(String),
    #[error("nenhum contato configurado para a filial {0}")]
    MissingContact(String),
    #[error("URL inválida: {0}")]
    InvalidUrl(String),
}

/// Erro quando uma API do navegador não está disponível.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capacidade indisponível: {0}")]
    Unavailable(&'static str),
}

/// Erro top-level.
#[derive(Debug, thiserror::Error)]
pub enum ZatiarasError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Result type alias.
pub type ZatiarasResult<T> = Result<T, ZatiarasError>;

// Conversão implícita de io::Error → ZatiarasError (via StorageError)
impl From<std::io::Error> for ZatiarasError {
    fn from(e: std::io::Error) -> Self {
        ZatiarasError::Storage(StorageError::Io(e))
    }
}
