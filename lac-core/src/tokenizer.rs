//! # Normalização e Tokenização por Caractere
//!
//! Divide a consulta bruta (bytes UTF-8) em tokens de um ponto de código cada,
//! preservando o offset de byte original. O texto de cada token passa por um
//! mapeamento q2b (largura-cheia → meia-largura, maiúscula → minúscula): só o
//! texto muda, os offsets continuam apontando para a consulta original.
//!
//! ## Bytes inválidos
//!
//! Uma sequência UTF-8 inválida não aborta a decodificação: o byte é pulado
//! (avança um byte e continua) e contabilizado em
//! [`NormalizedQuery::skipped_bytes`].
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use std::collections::HashMap;
//! use lac_core::tokenizer::Normalizer;
//!
//! let normalizer = Normalizer::new(HashMap::from([("Ａ".to_string(), "A".to_string())]));
//! let query = normalizer.normalize("Ａ股".as_bytes());
//!
//! assert_eq!(query.tokens[0].text, "A");
//! assert_eq!(query.offsets, vec![0, 3, 6]);
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LacError, Result};

/// Um token extraído da consulta original.
///
/// Cada token corresponde a exatamente um ponto de código da entrada. O texto
/// já está normalizado; `start`/`end` delimitam os bytes originais.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// Texto normalizado (ex: "a" para um "Ａ" de largura cheia).
    pub text: String,
    /// Índice de byte inicial na consulta original (inclusive).
    pub start: usize,
    /// Índice de byte final na consulta original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

impl Token {
    /// Comprimento em bytes na consulta original.
    pub fn byte_len(&self) -> usize {
        self.end - self.start
    }
}

/// Resultado de [`Normalizer::normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedQuery {
    pub tokens: Vec<Token>,
    /// `offsets[i]` é o byte inicial do token `i`; o último elemento é o
    /// tamanho da consulta. Sempre `tokens.len() + 1` elementos.
    pub offsets: Vec<usize>,
    /// Quantidade de bytes descartados por não formarem UTF-8 válido.
    pub skipped_bytes: usize,
}

impl NormalizedQuery {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Normalizador de tokens baseado em uma tabela q2b.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    q2b: HashMap<String, String>,
}

impl Normalizer {
    pub fn new(q2b: HashMap<String, String>) -> Self {
        Self { q2b }
    }

    /// Tabela embutida: ASCII de largura cheia (U+FF01–U+FF5E) e o espaço
    /// ideográfico viram meia-largura; letras maiúsculas ASCII viram minúsculas.
    pub fn builtin() -> Self {
        let mut q2b = HashMap::new();
        for full in '\u{FF01}'..='\u{FF5E}' {
            if let Some(half) = char::from_u32(full as u32 - 0xFEE0) {
                q2b.insert(full.to_string(), half.to_ascii_lowercase().to_string());
            }
        }
        q2b.insert("\u{3000}".to_string(), " ".to_string());
        for upper in 'A'..='Z' {
            q2b.insert(upper.to_string(), upper.to_ascii_lowercase().to_string());
        }
        Self { q2b }
    }

    /// Carrega um `q2b.dic`: linhas `origem\tdestino`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| LacError::from_io(path, e))?;
        let normalizer = Self::from_reader(std::io::BufReader::new(file), &path.display().to_string())?;
        info!("Dicionário q2b carregado: {} entradas", normalizer.len());
        Ok(normalizer)
    }

    pub fn from_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self> {
        let mut q2b = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LacError::from_io(source_name, e))?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            match (fields.next(), fields.next()) {
                (Some(from), Some(to)) if !from.is_empty() => {
                    q2b.insert(from.to_string(), to.to_string());
                }
                _ => return Err(LacError::parse(source_name, i + 1, "esperado `origem\\tdestino`")),
            }
        }
        Ok(Self { q2b })
    }

    pub fn len(&self) -> usize {
        self.q2b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q2b.is_empty()
    }

    /// Aplica o mapeamento a um único token (identidade se não mapeado).
    pub fn map_token<'a>(&'a self, token: &'a str) -> &'a str {
        self.q2b.get(token).map(String::as_str).unwrap_or(token)
    }

    /// Normaliza uma palavra inteira, caractere a caractere.
    pub fn normalize_word(&self, word: &str) -> String {
        let mut buf = [0u8; 4];
        word.chars()
            .map(|c| self.map_token(c.encode_utf8(&mut buf)).to_string())
            .collect()
    }

    /// Decodifica a consulta em tokens de um ponto de código cada.
    pub fn normalize(&self, query: &[u8]) -> NormalizedQuery {
        let mut tokens = Vec::new();
        let mut skipped_bytes = 0;
        let mut pos = 0;

        while pos < query.len() {
            match next_char(&query[pos..]) {
                Some(raw) => {
                    let end = pos + raw.len();
                    tokens.push(Token {
                        text: self.map_token(raw).to_string(),
                        start: pos,
                        end,
                        index: tokens.len(),
                    });
                    pos = end;
                }
                None => {
                    warn!("Byte inválido na posição {}: consulta deve ser UTF-8", pos);
                    skipped_bytes += 1;
                    pos += 1;
                }
            }
        }

        let offsets = tokens
            .iter()
            .map(|t| t.start)
            .chain(std::iter::once(query.len()))
            .collect();

        NormalizedQuery {
            tokens,
            offsets,
            skipped_bytes,
        }
    }
}

/// Próximo ponto de código no início de `bytes`, se bem formado.
fn next_char(bytes: &[u8]) -> Option<&str> {
    let len = match *bytes.first()? {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return None,
    };
    std::str::from_utf8(bytes.get(..len)?).ok()
}
