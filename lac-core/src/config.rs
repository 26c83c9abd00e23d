//! # Configuração
//!
//! Parâmetros de construção do [`crate::Lac`]. Pode vir de um JSON
//! (`serde_json`) ou da convenção de diretório de configuração:
//!
//! ```text
//! conf/
//! ├── q2b.dic            # mapeamento largura-cheia → meia-largura / caixa
//! ├── strong_punc.dic    # pontuação forte, uma por linha
//! └── customization.dic  # dicionário de customização
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LacError, Result};

/// Número máximo de tokens de uma janela entregue aos etiquetadores.
pub const MAX_TOKEN_COUNT: usize = 256;

/// Tamanho máximo (em bytes, exclusivo) do nome de um tipo.
pub const TYPE_MAX_LEN: usize = 32;

/// Capacidade de resultados usada quando o chamador não informa uma.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Estratégia de customização aplicada sobre a saída do modelo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomizationMode {
    /// Dicionário `palavra/TAG` com autômato Aho-Corasick; reetiqueta os rótulos no lugar.
    #[default]
    Override,
    /// Dicionário `[D:<tipo>]` por maior casamento; gera spans fundidos por alinhamento.
    LongestMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LacConfig {
    pub max_window_len: usize,
    pub default_capacity: usize,
    pub q2b_dic: Option<PathBuf>,
    pub strong_punc_dic: Option<PathBuf>,
    pub customization_dic: Option<PathBuf>,
    pub customization_mode: CustomizationMode,
}

impl Default for LacConfig {
    fn default() -> Self {
        Self {
            max_window_len: MAX_TOKEN_COUNT,
            default_capacity: DEFAULT_CAPACITY,
            q2b_dic: None,
            strong_punc_dic: None,
            customization_dic: None,
            customization_mode: CustomizationMode::default(),
        }
    }
}

impl LacConfig {
    /// Monta a configuração a partir de um diretório `conf/`.
    ///
    /// Os três arquivos passam a ser obrigatórios: a ausência de qualquer um
    /// resulta em [`LacError::FileNotFound`] na construção do `Lac`.
    pub fn from_conf_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            q2b_dic: Some(dir.join("q2b.dic")),
            strong_punc_dic: Some(dir.join("strong_punc.dic")),
            customization_dic: Some(dir.join("customization.dic")),
            ..Self::default()
        }
    }

    /// Lê a configuração de um arquivo JSON. Campos ausentes usam o padrão.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| LacError::from_io(path, e))?;
        let config: LacConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_window_len == 0 {
            return Err(LacError::Config("max_window_len deve ser positivo".into()));
        }
        if self.default_capacity == 0 {
            return Err(LacError::Config("default_capacity deve ser positivo".into()));
        }
        Ok(())
    }
}
