//! # Erros do LAC
//!
//! Taxonomia única de falhas do crate. Erros de carga (arquivo ausente, linha
//! malformada) acontecem na construção do componente dono do recurso; erros por
//! chamada (estouro de capacidade, etiquetador externo) viram o retorno de
//! [`crate::Lac::tag`]. Bytes UTF-8 inválidos nunca chegam aqui: são pulados
//! localmente pelo normalizador.

use std::path::PathBuf;

/// Result com [`LacError`] como erro padrão.
pub type Result<T, E = LacError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LacError {
    /// Dicionário ou arquivo de configuração inexistente.
    #[error("arquivo não encontrado: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Falha de leitura (permissão, UTF-8 inválido no arquivo, etc.).
    #[error("erro de leitura em {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Linha malformada em um dicionário. A carga inteira é abortada.
    #[error("erro de formato em {source_name}:{line}: {reason}")]
    Parse {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// O resultado não cabe na capacidade informada pelo chamador.
    #[error("capacidade de resultados excedida (limite {capacity})")]
    Overflow { capacity: usize },

    /// Rótulo fora do formato `<TIPO>-<POSIÇÃO>` ou vazio.
    #[error("rótulo inválido: {0:?}")]
    InvalidLabel(String),

    /// O etiquetador de sequência falhou ou violou seu contrato.
    #[error("falha no etiquetador: {0}")]
    Tagging(String),

    #[error("configuração inválida: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LacError {
    /// Converte um `io::Error` de abertura de arquivo, separando o caso "não existe".
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            LacError::FileNotFound { path }
        } else {
            LacError::Io { path, source }
        }
    }

    pub(crate) fn parse(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        LacError::Parse {
            source_name: source_name.to_string(),
            line,
            reason: reason.into(),
        }
    }
}
