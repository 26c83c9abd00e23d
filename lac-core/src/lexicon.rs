//! # Dicionário de Maior Casamento
//!
//! Forma simples de customização: em vez de reetiquetar a saída do modelo, o
//! dicionário produz spans próprios, que depois só entram no resultado se
//! estiverem alinhados às fronteiras do modelo (ver [`crate::merge`]).
//!
//! ## Formato
//!
//! Separado por tabulação. Um cabeçalho `[D:<tipo>]` define o tipo ativo para
//! as linhas seguintes até o próximo cabeçalho; o primeiro campo de cada linha
//! é uma palavra do tipo ativo. Linhas antes do primeiro cabeçalho são ignoradas.
//!
//! ```text
//! [D:LOC]
//! 北京
//! 上海	comentário ignorado
//! [D:ORG]
//! 北京大学
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use crate::config::TYPE_MAX_LEN;
use crate::customization::{CustomMatch, CustomizationMatcher};
use crate::error::{LacError, Result};
use crate::segmenter::Window;
use crate::tagger::TaggedSpan;
use crate::tokenizer::Normalizer;

const HEADER_PATTERN: &str = r"^\[D:(.+)\]$";

#[derive(Debug, Clone, Default)]
pub struct LongestMatchDictionary {
    /// palavra → tipo
    words: HashMap<String, String>,
    /// Maior palavra em bytes; limita o crescimento dos candidatos.
    max_word_len: usize,
}

impl LongestMatchDictionary {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_inner(path.as_ref(), None)
    }

    pub fn load_normalized(path: impl AsRef<Path>, normalizer: &Normalizer) -> Result<Self> {
        Self::load_inner(path.as_ref(), Some(normalizer))
    }

    fn load_inner(path: &Path, normalizer: Option<&Normalizer>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| LacError::from_io(path, e))?;
        let dict = Self::from_reader(
            std::io::BufReader::new(file),
            &path.display().to_string(),
            normalizer,
        )?;
        info!("Dicionário de customização (maior casamento) carregado: {} palavras", dict.len());
        Ok(dict)
    }

    pub fn from_reader<R: BufRead>(reader: R, source_name: &str, normalizer: Option<&Normalizer>) -> Result<Self> {
        let header = Regex::new(HEADER_PATTERN).map_err(|e| LacError::Config(e.to_string()))?;
        let mut dict = Self::default();
        let mut active_type: Option<String> = None;

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LacError::from_io(source_name, e))?;
            let line = line.trim_end_matches('\r');
            let first = line.split('\t').next().unwrap_or("");
            if first.is_empty() {
                continue;
            }

            if let Some(caps) = header.captures(first) {
                let name = &caps[1];
                if name.len() >= TYPE_MAX_LEN {
                    return Err(LacError::parse(
                        source_name,
                        i + 1,
                        format!("tipo {:?} excede {} bytes", name, TYPE_MAX_LEN - 1),
                    ));
                }
                active_type = Some(name.to_string());
                continue;
            }

            let Some(tag_type) = &active_type else {
                debug!("{}:{}: palavra antes de qualquer cabeçalho ignorada", source_name, i + 1);
                continue;
            };
            let word = match normalizer {
                Some(n) => n.normalize_word(first),
                None => first.to_string(),
            };
            dict.max_word_len = dict.max_word_len.max(word.len());
            dict.words.insert(word, tag_type.clone());
        }
        Ok(dict)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn lookup(&self, word: &str) -> Option<&str> {
        self.words.get(word).map(String::as_str)
    }

    /// Varre a janela da esquerda para a direita, emitindo em cada posição o
    /// maior casamento do dicionário e saltando para depois dele.
    pub fn tag(&self, window: &Window<'_>) -> Vec<TaggedSpan> {
        let texts = window.texts();
        let mut spans = Vec::new();
        let mut i = 0;

        while i < texts.len() {
            let mut candidate = String::new();
            let mut best: Option<(usize, &str)> = None;
            let mut j = i;
            while j < texts.len() && candidate.len() + texts[j].len() <= self.max_word_len {
                candidate.push_str(texts[j]);
                j += 1;
                if let Some(tag_type) = self.lookup(&candidate) {
                    best = Some((j, tag_type));
                }
            }

            match best {
                Some((end, tag_type)) => {
                    let start = window.offsets[i];
                    spans.push(TaggedSpan::new(start, window.offsets[end] - start, tag_type, 1.0));
                    i = end;
                }
                None => i += 1,
            }
        }
        spans
    }
}

impl CustomizationMatcher for LongestMatchDictionary {
    fn matches(&self, window: &Window<'_>) -> Vec<CustomMatch> {
        self.tag(window).into_iter().map(CustomMatch::Span).collect()
    }

    fn has_entries(&self) -> bool {
        !self.words.is_empty()
    }
}
