//! # Segmentação em Janelas de Sentença
//!
//! O etiquetador externo recebe sequências de tamanho limitado. O segmentador
//! corta o fluxo de tokens normalizados em janelas que terminam em uma
//! pontuação forte (incluída na janela) ou no limite de tamanho, o que vier
//! primeiro. `\n` e `\r` são sempre pontuação forte.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use tracing::info;

use crate::config::MAX_TOKEN_COUNT;
use crate::error::{LacError, Result};
use crate::tokenizer::{NormalizedQuery, Token};

/// Uma janela de tokens entregue a um passo de etiquetagem.
///
/// Os offsets são relativos a `base` (byte inicial da janela na consulta):
/// `offsets[0] == 0` e `offsets[len]` é o comprimento da janela em bytes.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    pub tokens: &'a [Token],
    pub offsets: Vec<usize>,
    /// Offset de byte do início da janela na consulta original.
    pub base: usize,
    /// Índice do primeiro token da janela na consulta.
    pub first_token: usize,
}

impl<'a> Window<'a> {
    /// Recorta `len` tokens de `query` a partir de `start`.
    pub fn new(query: &'a NormalizedQuery, start: usize, len: usize) -> Self {
        let base = query.offsets[start];
        Self {
            tokens: &query.tokens[start..start + len],
            offsets: query.offsets[start..=start + len]
                .iter()
                .map(|o| o - base)
                .collect(),
            base,
            first_token: start,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Comprimento da janela em bytes.
    pub fn byte_len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn texts(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    strong_punc: HashSet<String>,
    max_window_len: usize,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>(), MAX_TOKEN_COUNT)
    }
}

impl SentenceSegmenter {
    pub fn new<I, S>(punctuation: I, max_window_len: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut strong_punc: HashSet<String> = punctuation.into_iter().map(Into::into).collect();
        strong_punc.insert("\n".to_string());
        strong_punc.insert("\r".to_string());
        Self {
            strong_punc,
            max_window_len: max_window_len.max(1),
        }
    }

    /// Carrega `strong_punc.dic`: um token por linha, linha vazia é erro.
    pub fn load(path: impl AsRef<Path>, max_window_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| LacError::from_io(path, e))?;
        let segmenter = Self::from_reader(
            std::io::BufReader::new(file),
            &path.display().to_string(),
            max_window_len,
        )?;
        info!("Pontuação forte carregada: {} entradas", segmenter.strong_punc.len());
        Ok(segmenter)
    }

    pub fn from_reader<R: BufRead>(reader: R, source_name: &str, max_window_len: usize) -> Result<Self> {
        let mut punctuation = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LacError::from_io(source_name, e))?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                return Err(LacError::parse(source_name, i + 1, "linha vazia"));
            }
            punctuation.push(line.to_string());
        }
        Ok(Self::new(punctuation, max_window_len))
    }

    pub fn max_window_len(&self) -> usize {
        self.max_window_len
    }

    pub fn is_strong_punc(&self, token: &str) -> bool {
        self.strong_punc.contains(token)
    }

    /// Tamanho da próxima janela começando em `start`; 0 quando não há mais tokens.
    pub fn next_window(&self, tokens: &[Token], start: usize) -> usize {
        if start >= tokens.len() {
            return 0;
        }
        let mut pos = start;
        while pos < tokens.len() && pos - start < self.max_window_len {
            pos += 1;
            if self.is_strong_punc(&tokens[pos - 1].text) {
                break;
            }
        }
        pos - start
    }

    /// Itera sobre as janelas como pares `(início, tamanho)`.
    pub fn windows<'a>(&'a self, tokens: &'a [Token]) -> impl Iterator<Item = (usize, usize)> + 'a {
        let mut start = 0;
        std::iter::from_fn(move || {
            let len = self.next_window(tokens, start);
            if len == 0 {
                return None;
            }
            let window = (start, len);
            start += len;
            Some(window)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Normalizer;

    fn tokens(text: &str) -> Vec<Token> {
        Normalizer::default().normalize(text.as_bytes()).tokens
    }

    #[test]
    fn test_window_ends_at_strong_punc() {
        let segmenter = SentenceSegmenter::new(["。"], 256);
        let toks = tokens("今天天气好。明天下雨");
        assert_eq!(toks.len(), 10);
        assert_eq!(segmenter.next_window(&toks, 0), 6);
        assert_eq!(segmenter.next_window(&toks, 6), 4);
        assert_eq!(segmenter.next_window(&toks, 10), 0);
    }

    #[test]
    fn test_window_hard_limit() {
        let segmenter = SentenceSegmenter::new(Vec::<String>::new(), 4);
        let toks = tokens("一二三四五六七八九十");
        assert_eq!(segmenter.next_window(&toks, 0), 4);
        assert_eq!(segmenter.next_window(&toks, 8), 2);
        assert_eq!(segmenter.next_window(&toks, 42), 0);
    }

    #[test]
    fn test_newline_always_strong() {
        let segmenter = SentenceSegmenter::default();
        let toks = tokens("ab\ncd\r\n");
        let windows: Vec<(usize, usize)> = segmenter.windows(&toks).collect();
        assert_eq!(windows, vec![(0, 3), (3, 3), (6, 1)]);
    }

    #[test]
    fn test_window_relative_offsets() {
        let query = Normalizer::default().normalize("北京。a大学".as_bytes());
        let window = Window::new(&query, 3, 3);
        assert_eq!(window.base, 9);
        assert_eq!(window.offsets, vec![0, 1, 4, 7]);
        assert_eq!(window.texts(), vec!["a", "大", "学"]);
        assert_eq!(window.byte_len(), 7);
    }

    #[test]
    fn test_load_rejects_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strong_punc.dic");
        std::fs::write(&path, "。\n\n！\n").unwrap();
        assert!(matches!(
            SentenceSegmenter::load(&path, 256),
            Err(LacError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_strong_punc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strong_punc.dic");
        std::fs::write(&path, "。\n！\n").unwrap();
        let segmenter = SentenceSegmenter::load(&path, 256).unwrap();
        assert!(segmenter.is_strong_punc("！"));
        assert!(segmenter.is_strong_punc("\n"));
        assert!(!segmenter.is_strong_punc("，"));
    }

    #[test]
    fn test_strong_punc_crlf_lines() {
        let segmenter = SentenceSegmenter::from_reader("。\r\n！\r\n".as_bytes(), "strong_punc.dic", 256).unwrap();
        assert!(segmenter.is_strong_punc("。"));
        assert!(segmenter.is_strong_punc("！"));

        let toks = tokens("好。再见");
        assert_eq!(segmenter.next_window(&toks, 0), 2);
    }
}
