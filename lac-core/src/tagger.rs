//! # Rótulos, Spans e o Contrato do Etiquetador
//!
//! O modelo de sequência é externo. Aqui ficam os tipos que ele produz e
//! consome, e as conversões entre as duas formas de saída:
//!
//! - **Rótulos por token** no formato `<TIPO>-<POSIÇÃO>`, ex: `LOC-B`, `n-I`.
//! - **Spans** ([`TaggedSpan`]): offset e comprimento em bytes + tipo.
//!
//! ## Posições
//!
//! | Posição | Significado                              |
//! |---------|------------------------------------------|
//! | `B`     | Begin: primeiro token de uma palavra     |
//! | `I`     | Inside: continuação da palavra aberta    |
//! | `O`     | Outside: token isolado, sem palavra      |
//! | `S`     | Single: palavra de um único token        |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::TYPE_MAX_LEN;
use crate::error::{LacError, Result};
use crate::segmenter::Window;

/// Posição de um token dentro da palavra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Begin,
    Inside,
    Outside,
    Single,
}

impl Position {
    pub fn as_char(&self) -> char {
        match self {
            Position::Begin => 'B',
            Position::Inside => 'I',
            Position::Outside => 'O',
            Position::Single => 'S',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Position::Begin),
            'I' => Some(Position::Inside),
            'O' => Some(Position::Outside),
            'S' => Some(Position::Single),
            _ => None,
        }
    }
}

/// Monta o rótulo `<TIPO>-<POSIÇÃO>`.
pub fn format_label(tag_type: &str, position: Position) -> String {
    format!("{}-{}", tag_type, position.as_char())
}

/// Separa um rótulo em tipo e posição (ex: "LOC-B" → ("LOC", Begin)).
pub fn split_label(label: &str) -> Result<(&str, Position)> {
    let (tag_type, pos) = label
        .rsplit_once('-')
        .ok_or_else(|| LacError::InvalidLabel(label.to_string()))?;
    let mut chars = pos.chars();
    match (chars.next().and_then(Position::from_char), chars.next()) {
        (Some(position), None) => Ok((tag_type, position)),
        _ => Err(LacError::InvalidLabel(label.to_string())),
    }
}

/// Troca apenas o caractere de posição (o último) de um rótulo existente.
///
/// Rótulo vazio é erro: não há caractere de posição para trocar.
pub fn set_position(label: &mut String, position: Position) -> Result<()> {
    if label.pop().is_none() {
        return Err(LacError::InvalidLabel(String::new()));
    }
    label.push(position.as_char());
    Ok(())
}

/// Um trecho contíguo da consulta com um tipo associado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSpan {
    /// Offset de byte inicial.
    pub offset: usize,
    /// Comprimento em bytes.
    pub length: usize,
    /// Tipo (ex: "LOC", "n"), sempre com menos de [`TYPE_MAX_LEN`] bytes.
    pub label: String,
    /// Confiança do tipo; 1.0 para casamentos exatos de dicionário.
    pub confidence: f64,
}

impl TaggedSpan {
    pub fn new(offset: usize, length: usize, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            offset,
            length,
            label: label.into(),
            confidence,
        }
    }

    /// Offset de byte final (exclusivo).
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Desloca o span por `base` bytes (janela → consulta).
    pub fn shifted(mut self, base: usize) -> Self {
        self.offset += base;
        self
    }

    /// Trecho correspondente no texto original, se os offsets forem válidos.
    pub fn text<'a>(&self, query: &'a str) -> Option<&'a str> {
        query.get(self.offset..self.end())
    }
}

/// Converte rótulos por token em spans, usando offsets relativos (`labels.len() + 1`).
///
/// Um novo span começa em `B`, `S` ou `O`, em mudança de tipo, ou logo após
/// um token `S`/`O`. `I` continua o span aberto do mesmo tipo.
pub fn labels_to_spans(labels: &[String], offsets: &[usize]) -> Result<Vec<TaggedSpan>> {
    if offsets.len() != labels.len() + 1 {
        return Err(LacError::Tagging(format!(
            "{} rótulos para {} offsets",
            labels.len(),
            offsets.len()
        )));
    }

    let mut spans = Vec::new();
    let mut open: Option<(usize, &str)> = None;
    let mut closes_after = false;

    for (i, label) in labels.iter().enumerate() {
        let (tag_type, position) = split_label(label)?;
        let continues = matches!(open, Some((_, t)) if t == tag_type)
            && position == Position::Inside
            && !closes_after;

        if !continues {
            if let Some((start, t)) = open.take() {
                spans.push(TaggedSpan::new(offsets[start], offsets[i] - offsets[start], t, 1.0));
            }
            open = Some((i, tag_type));
        }
        closes_after = matches!(position, Position::Single | Position::Outside);
    }

    if let Some((start, t)) = open {
        let end = offsets[labels.len()];
        spans.push(TaggedSpan::new(offsets[start], end - offsets[start], t, 1.0));
    }
    Ok(spans)
}

/// Projeta spans em rótulos por token (`T-B` no primeiro token, `T-I` no resto).
///
/// Os spans devem começar e terminar em fronteiras de token.
pub fn spans_to_labels(spans: &[TaggedSpan], offsets: &[usize]) -> Result<Vec<String>> {
    let index_of: HashMap<usize, usize> = offsets.iter().enumerate().map(|(i, &o)| (o, i)).collect();
    let mut labels = vec![String::new(); offsets.len().saturating_sub(1)];

    for span in spans {
        let (Some(&first), Some(&last)) = (index_of.get(&span.offset), index_of.get(&span.end())) else {
            return Err(LacError::Tagging(format!(
                "span [{}, {}) fora das fronteiras de token",
                span.offset,
                span.end()
            )));
        };
        for i in first..last {
            let position = if i == first { Position::Begin } else { Position::Inside };
            labels[i] = format_label(&span.label, position);
        }
    }

    if let Some(i) = labels.iter().position(String::is_empty) {
        return Err(LacError::Tagging(format!("token {} sem rótulo", i)));
    }
    Ok(labels)
}

/// Verifica o contrato do etiquetador: spans ordenados, sem lacunas nem
/// sobreposição, cobrindo exatamente a janela, com tipo não vazio e curto.
pub fn validate_main_spans(spans: &[TaggedSpan], window_len: usize) -> Result<()> {
    let mut cursor = 0;
    for span in spans {
        if span.offset != cursor || span.length == 0 {
            return Err(LacError::Tagging(format!(
                "span em {} (tamanho {}) quebra a cobertura em {}",
                span.offset, span.length, cursor
            )));
        }
        if span.label.is_empty() || span.label.len() >= TYPE_MAX_LEN {
            return Err(LacError::Tagging(format!("tipo inválido {:?}", span.label)));
        }
        cursor = span.end();
    }
    if cursor != window_len {
        return Err(LacError::Tagging(format!(
            "spans cobrem {} de {} bytes da janela",
            cursor, window_len
        )));
    }
    Ok(())
}

/// O modelo de sequência (caixa-preta).
///
/// Recebe uma janela limitada e devolve spans ordenados, sem lacunas e sem
/// sobreposição, cobrindo exatamente a janela, em offsets relativos a ela.
pub trait SequenceTagger: Send + Sync {
    fn tag(&self, window: &Window<'_>) -> Result<Vec<TaggedSpan>>;
}

/// Um span por token, todos com o mesmo tipo.
///
/// Serve de etiquetador enquanto nenhum modelo está acoplado: o resultado
/// final fica inteiramente a cargo do dicionário de customização.
#[derive(Debug, Clone)]
pub struct SingletonTagger {
    tag_type: String,
}

impl SingletonTagger {
    pub fn new(tag_type: impl Into<String>) -> Self {
        Self {
            tag_type: tag_type.into(),
        }
    }
}

impl Default for SingletonTagger {
    fn default() -> Self {
        Self::new("O")
    }
}

impl SequenceTagger for SingletonTagger {
    fn tag(&self, window: &Window<'_>) -> Result<Vec<TaggedSpan>> {
        Ok(window
            .offsets
            .windows(2)
            .map(|w| TaggedSpan::new(w[0], w[1] - w[0], self.tag_type.clone(), 1.0))
            .collect())
    }
}

/// Adapta um modelo que emite um rótulo `<TIPO>-<POSIÇÃO>` por token.
pub struct FnLabelTagger<F> {
    predict: F,
}

impl<F> FnLabelTagger<F>
where
    F: Fn(&[&str]) -> Result<Vec<String>> + Send + Sync,
{
    pub fn new(predict: F) -> Self {
        Self { predict }
    }
}

impl<F> SequenceTagger for FnLabelTagger<F>
where
    F: Fn(&[&str]) -> Result<Vec<String>> + Send + Sync,
{
    fn tag(&self, window: &Window<'_>) -> Result<Vec<TaggedSpan>> {
        let labels = (self.predict)(&window.texts())?;
        if labels.len() != window.len() {
            return Err(LacError::Tagging(format!(
                "modelo devolveu {} rótulos para {} tokens",
                labels.len(),
                window.len()
            )));
        }
        labels_to_spans(&labels, &window.offsets)
    }
}
