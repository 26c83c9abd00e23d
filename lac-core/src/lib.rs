//! # lac-core — Análise Léxica de Chinês com Customização
//!
//! Este crate implementa a maquinaria determinística em torno de um modelo de
//! etiquetagem de sequência (segmentação de palavras + classe gramatical /
//! entidades). O modelo em si é externo ([`SequenceTagger`]); aqui ficam as
//! peças que o tornam utilizável em produção.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui por um pipeline linear, janela a janela:
//!
//! 1.  **Entrada**: bytes da consulta (UTF-8, com bytes inválidos tolerados).
//! 2.  **Normalização** ([`tokenizer`]): um token por ponto de código, com
//!     mapeamento q2b e offsets originais.
//! 3.  **Janelas** ([`segmenter`]): cortes em pontuação forte ou no limite de
//!     [`config::MAX_TOKEN_COUNT`] tokens.
//! 4.  **Etiquetagem** ([`tagger`]): o modelo externo produz spans cobrindo a janela.
//! 5.  **Customização**:
//!     *   **Override** ([`customization`]): autômato Aho-Corasick ([`automaton`])
//!         reetiqueta os rótulos no lugar.
//!     *   **Maior casamento** ([`lexicon`]): spans próprios, fundidos por
//!         alinhamento de fronteiras ([`merge`]).
//! 6.  **Saída**: lista de [`TaggedSpan`] em offsets da consulta original.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use std::sync::Arc;
//! use lac_core::{CustomizationDictionary, Lac, SingletonTagger};
//!
//! // 1. Dicionário de customização (normalmente `conf/customization.dic`)
//! let dict = CustomizationDictionary::from_reader("北京/LOC 大学/ORG\n".as_bytes(), "inline", None)?;
//!
//! // 2. Etiquetador com um modelo de referência (um span "O" por token)
//! let lac = Lac::new(Arc::new(SingletonTagger::default())).with_customization(Arc::new(dict));
//!
//! // 3. Etiqueta com capacidade de 16 spans
//! let spans = lac.tag("北京大学", 16)?;
//! let labels: Vec<&str> = spans.iter().map(|s| s.label.as_str()).collect();
//! assert_eq!(labels, vec!["LOC", "ORG"]);
//! # Ok::<(), lac_core::LacError>(())
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: o [`Lac`], orquestrador por janelas.
//! - [`automaton`]: casamento de múltiplos padrões sobre tokens.
//! - [`merge`]: fusão de spans com verificação de alinhamento.
//! - [`config`]: parâmetros e convenção do diretório `conf/`.

pub mod automaton;
pub mod config;
pub mod customization;
pub mod error;
pub mod lexicon;
pub mod merge;
pub mod pipeline;
pub mod segmenter;
pub mod tagger;
pub mod tokenizer;

pub use config::{CustomizationMode, LacConfig};
pub use customization::{CustomMatch, CustomizationDictionary, CustomizationMatcher, TagOverride};
pub use error::{LacError, Result};
pub use lexicon::LongestMatchDictionary;
pub use pipeline::{Lac, WordItem};
pub use segmenter::{SentenceSegmenter, Window};
pub use tagger::{FnLabelTagger, SequenceTagger, SingletonTagger, TaggedSpan};
pub use tokenizer::{Normalizer, Token};
