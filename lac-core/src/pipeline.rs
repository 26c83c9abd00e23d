//! # Pipeline LAC — Orquestrador por Janelas
//!
//! O [`Lac`] coordena todos os módulos para uma consulta:
//!
//! ```text
//! NEXT_WINDOW → TAG_MAIN → TAG_CUSTOM → MERGE → APPEND → (NEXT_WINDOW | DONE)
//! ```
//!
//! 1. **Normalização** ([`Normalizer`]): bytes → tokens com offsets originais.
//! 2. **Janela** ([`SentenceSegmenter`]): próximo trecho limitado de tokens.
//! 3. **Modelo** ([`SequenceTagger`]): spans principais, validados contra o contrato.
//! 4. **Customização** ([`CustomizationMatcher`]): overrides aplicados nos
//!    rótulos da janela, ou spans independentes.
//! 5. **Fusão** ([`merge_results`]): spans de customização alinhados substituem
//!    os spans do modelo que cobrem.
//! 6. **Tradução**: offsets da janela viram offsets da consulta e o resultado é
//!    anexado. Termina quando não há mais janelas.
//!
//! Uma janela é processada por inteiro ou a chamada inteira falha; não há
//! resultado parcial. Todo o estado por chamada pertence à chamada, então o
//! mesmo `Lac` pode ser usado de várias threads sem trava.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{CustomizationMode, LacConfig, DEFAULT_CAPACITY};
use crate::customization::{apply_override, CustomMatch, CustomizationDictionary, CustomizationMatcher};
use crate::error::{LacError, Result};
use crate::lexicon::LongestMatchDictionary;
use crate::merge::merge_results;
use crate::segmenter::{SentenceSegmenter, Window};
use crate::tagger::{labels_to_spans, spans_to_labels, validate_main_spans, SequenceTagger, TaggedSpan};
use crate::tokenizer::Normalizer;

/// Uma palavra do resultado com seu tipo e offset de byte na consulta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordItem {
    pub word: String,
    pub tag: String,
    pub offset: usize,
}

/// O etiquetador léxico.
///
/// Imutável após a construção: normalizador, segmentador, modelo e
/// dicionário são compartilhados por todas as chamadas.
#[derive(Clone)]
pub struct Lac {
    normalizer: Normalizer,
    segmenter: SentenceSegmenter,
    main_tagger: Arc<dyn SequenceTagger>,
    customization: Option<Arc<dyn CustomizationMatcher>>,
    default_capacity: usize,
}

impl Lac {
    /// Cria o etiquetador sem mapeamento q2b, com a pontuação forte mínima
    /// (`\n`, `\r`) e sem customização.
    pub fn new(main_tagger: Arc<dyn SequenceTagger>) -> Self {
        Self {
            normalizer: Normalizer::default(),
            segmenter: SentenceSegmenter::default(),
            main_tagger,
            customization: None,
            default_capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_segmenter(mut self, segmenter: SentenceSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn with_customization(mut self, customization: Arc<dyn CustomizationMatcher>) -> Self {
        self.customization = Some(customization);
        self
    }

    pub fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Constrói a partir de uma [`LacConfig`].
    ///
    /// Sem `q2b_dic`, usa [`Normalizer::builtin`]. O dicionário de
    /// customização passa pelo mesmo normalizador das consultas. Qualquer
    /// falha de carga aborta a construção.
    pub fn from_config(config: &LacConfig, main_tagger: Arc<dyn SequenceTagger>) -> Result<Self> {
        config.validate()?;

        let normalizer = match &config.q2b_dic {
            Some(path) => Normalizer::load(path)?,
            None => Normalizer::builtin(),
        };
        let segmenter = match &config.strong_punc_dic {
            Some(path) => SentenceSegmenter::load(path, config.max_window_len)?,
            None => SentenceSegmenter::new(std::iter::empty::<String>(), config.max_window_len),
        };
        let customization = match &config.customization_dic {
            Some(path) => Some(load_customization(path, config.customization_mode, &normalizer)?),
            None => None,
        };

        Ok(Self {
            normalizer,
            segmenter,
            main_tagger,
            customization,
            default_capacity: config.default_capacity,
        })
    }

    /// Atalho para [`LacConfig::from_conf_dir`] + [`Lac::from_config`].
    pub fn from_conf_dir(dir: impl AsRef<Path>, main_tagger: Arc<dyn SequenceTagger>) -> Result<Self> {
        Self::from_config(&LacConfig::from_conf_dir(dir), main_tagger)
    }

    /// `true` se há um dicionário de customização com ao menos uma entrada.
    pub fn has_customization(&self) -> bool {
        self.customization.as_ref().is_some_and(|c| c.has_entries())
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Etiqueta a consulta inteira, devolvendo no máximo `capacity` spans em
    /// offsets de byte da consulta original.
    ///
    /// Bytes UTF-8 inválidos são pulados; os que aparecem depois de um token
    /// ficam dentro do span desse token.
    pub fn tag(&self, query: impl AsRef<[u8]>, capacity: usize) -> Result<Vec<TaggedSpan>> {
        let query = self.normalizer.normalize(query.as_ref());
        let mut results: Vec<TaggedSpan> = Vec::new();

        for (start, len) in self.segmenter.windows(&query.tokens) {
            let window = Window::new(&query, start, len);
            debug!(start, len, base = window.base, "janela");

            let spans = match self.tag_window(&window, capacity - results.len()) {
                Ok(spans) => spans,
                Err(e) => {
                    error!(start, len, "falha na janela: {}", e);
                    return Err(match e {
                        LacError::Overflow { .. } => LacError::Overflow { capacity },
                        other => other,
                    });
                }
            };

            results.extend(spans.into_iter().map(|s| s.shifted(window.base)));
        }
        Ok(results)
    }

    /// Processa uma janela com no máximo `remaining` spans de saída (offsets relativos).
    fn tag_window(&self, window: &Window<'_>, remaining: usize) -> Result<Vec<TaggedSpan>> {
        let mut main = self.main_tagger.tag(window)?;
        validate_main_spans(&main, window.byte_len())?;

        let mut custom_spans = Vec::new();
        if let Some(customization) = self.customization.as_ref().filter(|c| c.has_entries()) {
            let mut overrides = Vec::new();
            for m in customization.matches(window) {
                match m {
                    CustomMatch::Span(span) => custom_spans.push(span),
                    CustomMatch::Override(ov) => overrides.push(ov),
                }
            }

            if !overrides.is_empty() {
                let mut labels = spans_to_labels(&main, &window.offsets)?;
                for ov in &overrides {
                    apply_override(&mut labels, ov)?;
                }
                let ranges: Vec<(usize, usize)> = overrides
                    .iter()
                    .map(|ov| (window.offsets[ov.begin], window.offsets[ov.end()]))
                    .collect();
                main = assign_confidence(labels_to_spans(&labels, &window.offsets)?, &main, &ranges);
            }
        }

        merge_results(&main, &custom_spans, remaining)
    }

    /// Etiqueta várias consultas em paralelo; cada uma tem seu próprio resultado.
    pub fn tag_batch<Q>(&self, queries: &[Q], capacity: usize) -> Vec<Result<Vec<TaggedSpan>>>
    where
        Q: AsRef<[u8]> + Sync,
    {
        queries.par_iter().map(|q| self.tag(q, capacity)).collect()
    }

    /// Saída por palavra: texto original, tipo e offset de cada span.
    pub fn run(&self, query: &str) -> Result<Vec<WordItem>> {
        let spans = self.tag(query, self.default_capacity)?;
        Ok(spans
            .into_iter()
            .map(|span| WordItem {
                word: span.text(query).unwrap_or_default().to_string(),
                offset: span.offset,
                tag: span.label,
            })
            .collect())
    }

    /// Apenas a segmentação em palavras.
    pub fn segment(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.run(query)?.into_iter().map(|w| w.word).collect())
    }
}

fn load_customization(
    path: &Path,
    mode: CustomizationMode,
    normalizer: &Normalizer,
) -> Result<Arc<dyn CustomizationMatcher>> {
    let matcher: Arc<dyn CustomizationMatcher> = match mode {
        CustomizationMode::Override => Arc::new(CustomizationDictionary::load_normalized(path, normalizer)?),
        CustomizationMode::LongestMatch => Arc::new(LongestMatchDictionary::load_normalized(path, normalizer)?),
    };
    Ok(matcher)
}

/// Spans reconstruídos dentro de um casamento do dicionário (`ranges`, em
/// bytes) ficam com 1.0; os demais herdam a confiança do span do modelo que
/// os contém.
fn assign_confidence(rebuilt: Vec<TaggedSpan>, original: &[TaggedSpan], ranges: &[(usize, usize)]) -> Vec<TaggedSpan> {
    rebuilt
        .into_iter()
        .map(|mut span| {
            let matched = ranges
                .iter()
                .any(|&(start, end)| start <= span.offset && span.end() <= end);
            span.confidence = if matched {
                1.0
            } else {
                let i = original.partition_point(|m| m.end() <= span.offset);
                original.get(i).map(|m| m.confidence).unwrap_or(1.0)
            };
            span
        })
        .collect()
}
