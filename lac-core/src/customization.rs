//! # Dicionário de Customização (Aho-Corasick)
//!
//! Permite ao usuário corrigir a saída do modelo sem retreiná-lo. Cada linha
//! do dicionário é uma entrada com um ou mais sub-termos separados por espaço,
//! cada um no formato `palavra` ou `palavra/TAG`:
//!
//! ```text
//! 北京/LOC 大学/ORG
//! 春天/SEASON
//! 花 开
//! ```
//!
//! Cada palavra é quebrada em caracteres; a concatenação de todos os
//! caracteres da entrada vira um padrão no [`PatternAutomaton`], com valor
//! igual ao índice da entrada.
//!
//! ## Aplicação sobre os rótulos
//!
//! 1. Busca de maior casamento (`backtrack = false`), em ordem de fim.
//! 2. Sobreposição: um casamento cujo início cai estritamente dentro do último
//!    aceito é descartado.
//! 3. Cada sub-termo com TAG vira `TAG-I`; sem TAG, só a posição vira `I`.
//! 4. O início do casamento e cada fronteira de sub-termo viram `B`, forçando
//!    a quebra de palavra mesmo sem TAG.

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::automaton::{AutomatonMatch, PatternAutomaton};
use crate::config::TYPE_MAX_LEN;
use crate::error::{LacError, Result};
use crate::segmenter::Window;
use crate::tagger::{format_label, set_position, Position, TaggedSpan};
use crate::tokenizer::Normalizer;

/// Um sub-termo de uma entrada: TAG (vazia = herda) e fronteira acumulada em tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTerm {
    pub tag: String,
    pub boundary: usize,
}

/// Entrada do dicionário. Fronteiras estritamente crescentes; a última é o
/// tamanho total da entrada em tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub sub_terms: Vec<SubTerm>,
}

impl DictionaryEntry {
    /// Tamanho da entrada em tokens.
    pub fn len(&self) -> usize {
        self.sub_terms.last().map(|s| s.boundary).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interpreta uma linha, devolvendo a entrada e o padrão (tokens concatenados).
    fn parse(line: &str, normalizer: Option<&Normalizer>) -> std::result::Result<(Self, Vec<String>), String> {
        let mut sub_terms = Vec::new();
        let mut pattern = Vec::new();

        for item in line.split(' ').filter(|s| !s.is_empty()) {
            let (word, tag) = match item.rsplit_once('/') {
                Some((word, tag)) if item.len() > 1 => (word, tag),
                _ => (item, ""),
            };
            if word.is_empty() {
                return Err(format!("sub-termo {:?} sem palavra", item));
            }
            if tag.len() >= TYPE_MAX_LEN {
                return Err(format!("TAG {:?} excede {} bytes", tag, TYPE_MAX_LEN - 1));
            }
            for c in word.chars() {
                let mut buf = [0u8; 4];
                let raw = c.encode_utf8(&mut buf);
                let token = normalizer.map(|n| n.map_token(raw)).unwrap_or(raw);
                pattern.push(token.to_string());
            }
            sub_terms.push(SubTerm {
                tag: tag.to_string(),
                boundary: pattern.len(),
            });
        }
        Ok((Self { sub_terms }, pattern))
    }
}

/// Reetiquetagem pedida por um casamento aceito.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOverride {
    /// Índice (na janela) do primeiro token casado.
    pub begin: usize,
    pub sub_terms: Vec<SubTerm>,
}

impl TagOverride {
    /// Índice (exclusivo) do fim do casamento.
    pub fn end(&self) -> usize {
        self.begin + self.sub_terms.last().map(|s| s.boundary).unwrap_or(0)
    }
}

/// Saída de um [`CustomizationMatcher`].
#[derive(Debug, Clone, PartialEq)]
pub enum CustomMatch {
    /// Span independente, fundido pelo alinhamento de fronteiras.
    Span(TaggedSpan),
    /// Reetiquetagem no lugar dos rótulos do modelo.
    Override(TagOverride),
}

/// Estratégia de customização sobre uma janela.
///
/// Implementada por [`CustomizationDictionary`] (overrides) e por
/// [`crate::lexicon::LongestMatchDictionary`] (spans). Uma instância é
/// imutável após a carga e pode ser compartilhada entre threads.
pub trait CustomizationMatcher: Send + Sync {
    fn matches(&self, window: &Window<'_>) -> Vec<CustomMatch>;

    fn has_entries(&self) -> bool;
}

/// Aplica um override sobre os rótulos de uma janela (`<TIPO>-<POSIÇÃO>`).
pub fn apply_override(labels: &mut [String], ov: &TagOverride) -> Result<()> {
    if ov.end() > labels.len() || ov.sub_terms.is_empty() {
        return Err(LacError::Tagging(format!(
            "override [{}, {}) fora da janela de {} tokens",
            ov.begin,
            ov.end(),
            labels.len()
        )));
    }

    let mut start = ov.begin;
    for sub_term in &ov.sub_terms {
        let end = ov.begin + sub_term.boundary;
        for label in &mut labels[start..end] {
            if sub_term.tag.is_empty() {
                set_position(label, Position::Inside)?;
            } else {
                *label = format_label(&sub_term.tag, Position::Inside);
            }
        }
        start = end;
    }

    set_position(&mut labels[ov.begin], Position::Begin)?;
    for sub_term in &ov.sub_terms {
        if let Some(label) = labels.get_mut(ov.begin + sub_term.boundary) {
            set_position(label, Position::Begin)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CustomizationDictionary {
    entries: Vec<DictionaryEntry>,
    automaton: PatternAutomaton,
}

impl Default for CustomizationDictionary {
    /// Dicionário vazio, já com o autômato construído.
    fn default() -> Self {
        let mut automaton = PatternAutomaton::new();
        automaton.build();
        Self {
            entries: Vec::new(),
            automaton,
        }
    }
}

impl CustomizationDictionary {
    /// Carrega o dicionário sem normalização dos caracteres.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_inner(path.as_ref(), None)
    }

    /// Carrega o dicionário passando cada caractere pelo mesmo normalizador das consultas.
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
        info!("Dicionário de customização carregado: {} entradas", dict.len());
        Ok(dict)
    }

    /// Lê todas as linhas e só então constrói o autômato. Qualquer linha
    /// malformada aborta a carga inteira.
    pub fn from_reader<R: BufRead>(reader: R, source_name: &str, normalizer: Option<&Normalizer>) -> Result<Self> {
        let mut dict = Self::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LacError::from_io(source_name, e))?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (entry, pattern) =
                DictionaryEntry::parse(line, normalizer).map_err(|reason| LacError::parse(source_name, i + 1, reason))?;
            dict.automaton.insert(&pattern, dict.entries.len());
            dict.entries.push(entry);
        }
        dict.automaton.build();
        Ok(dict)
    }

    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: usize) -> Option<&DictionaryEntry> {
        self.entries.get(id)
    }

    /// Casamentos mais longos por posição final.
    pub fn search<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<AutomatonMatch> {
        self.automaton.search(tokens, false)
    }

    /// Casamentos aceitos após a resolução de sobreposição, em ordem de fim.
    pub fn accepted_overrides<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<TagOverride> {
        let mut accepted: Option<(usize, usize)> = None;
        let mut overrides = Vec::new();

        for m in self.search(tokens) {
            let entry = &self.entries[m.value];
            let begin = m.end + 1 - entry.len();
            if let Some((accepted_begin, accepted_end)) = accepted {
                if accepted_begin < begin && begin <= accepted_end {
                    continue;
                }
            }
            accepted = Some((begin, m.end));
            overrides.push(TagOverride {
                begin,
                sub_terms: entry.sub_terms.clone(),
            });
        }
        overrides
    }

    /// Corrige no lugar os rótulos `labels` (um por token de `tokens`).
    pub fn parse_customization<S: AsRef<str>>(&self, tokens: &[S], labels: &mut [String]) -> Result<()> {
        if tokens.len() != labels.len() {
            return Err(LacError::Tagging(format!(
                "{} tokens para {} rótulos",
                tokens.len(),
                labels.len()
            )));
        }
        for ov in self.accepted_overrides(tokens) {
            apply_override(labels, &ov)?;
        }
        Ok(())
    }
}

impl CustomizationMatcher for CustomizationDictionary {
    fn matches(&self, window: &Window<'_>) -> Vec<CustomMatch> {
        self.accepted_overrides(&window.texts())
            .into_iter()
            .map(CustomMatch::Override)
            .collect()
    }

    fn has_entries(&self) -> bool {
        CustomizationDictionary::has_entries(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chars(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn dict(content: &str) -> CustomizationDictionary {
        CustomizationDictionary::from_reader(content.as_bytes(), "test.dic", None).unwrap()
    }

    #[test]
    fn test_parse_entry_boundaries() {
        let (entry, pattern) = DictionaryEntry::parse("北京/LOC 大学/ORG", None).unwrap();
        assert_eq!(pattern, chars("北京大学"));
        assert_eq!(
            entry.sub_terms,
            vec![
                SubTerm { tag: "LOC".into(), boundary: 2 },
                SubTerm { tag: "ORG".into(), boundary: 4 },
            ]
        );
        assert_eq!(entry.len(), 4);
    }

    #[test]
    fn test_parse_entry_without_tags() {
        let (entry, _) = DictionaryEntry::parse("花  开/", None).unwrap();
        assert_eq!(entry.sub_terms.len(), 2);
        assert!(entry.sub_terms.iter().all(|s| s.tag.is_empty()));
        // "/" sozinho é a própria palavra
        let (slash, pattern) = DictionaryEntry::parse("/", None).unwrap();
        assert_eq!(pattern, vec!["/".to_string()]);
        assert_eq!(slash.len(), 1);
    }

    #[test]
    fn test_parse_entry_errors() {
        assert!(DictionaryEntry::parse("/LOC", None).is_err());
        let long_tag = format!("北京/{}", "T".repeat(TYPE_MAX_LEN));
        assert!(DictionaryEntry::parse(&long_tag, None).is_err());
    }

    #[test]
    fn test_override_relabels_with_tags() {
        let d = dict("北京/LOC 大学/ORG\n");
        let mut tags = labels(&["O-B", "O-B", "O-B", "O-B"]);
        d.parse_customization(&chars("北京大学"), &mut tags).unwrap();
        assert_eq!(tags, labels(&["LOC-B", "LOC-I", "ORG-B", "ORG-I"]));
    }

    #[test]
    fn test_override_without_tags_forces_boundaries() {
        let d = dict("花 开\n");
        let mut tags = labels(&["n-B", "n-I", "v-B", "w-B"]);
        d.parse_customization(&chars("春花开。"), &mut tags).unwrap();
        // 花 em 1, 开 em 2; o token seguinte (3) também vira B
        assert_eq!(tags, labels(&["n-B", "n-B", "v-B", "w-B"]));
    }

    #[test]
    fn test_override_continuation_inherits_type() {
        let d = dict("大学生\n");
        let mut tags = labels(&["n-B", "n-I", "v-B", "x-B"]);
        d.parse_customization(&chars("大学生x"), &mut tags).unwrap();
        assert_eq!(tags, labels(&["n-B", "n-I", "v-I", "x-B"]));
    }

    #[test]
    fn test_overlap_resolution() {
        // "ab" aceito [0,1]; "bc" começa em 1, dentro de [0,1] → descartado; "cd" [2,3] aceito
        let d = dict("a b/X\nb c/Y\nc/Z d\n");
        let overrides = d.accepted_overrides(&chars("abcd"));
        let ranges: Vec<(usize, usize)> = overrides.iter().map(|o| (o.begin, o.end())).collect();
        assert_eq!(ranges, vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_same_begin_longer_match_accepted() {
        let d = dict("北京/LOC\n北京大学/ORG\n");
        let overrides = d.accepted_overrides(&chars("北京大学"));
        let ranges: Vec<(usize, usize)> = overrides.iter().map(|o| (o.begin, o.end())).collect();
        assert_eq!(ranges, vec![(0, 2), (0, 4)]);

        let mut tags = labels(&["n-B", "n-B", "n-B", "n-B"]);
        d.parse_customization(&chars("北京大学"), &mut tags).unwrap();
        assert_eq!(tags, labels(&["ORG-B", "ORG-I", "ORG-I", "ORG-I"]));
    }

    #[test]
    fn test_empty_label_is_error() {
        let d = dict("花\n");
        let mut tags = labels(&[""]);
        assert!(matches!(
            d.parse_customization(&chars("花"), &mut tags),
            Err(LacError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CustomizationDictionary::load("/nao/existe/customization.dic").unwrap_err();
        assert!(matches!(err, LacError::FileNotFound { .. }));
    }

    #[test]
    fn test_crlf_lines() {
        let d = dict("北京/LOC\r\n\r\n");
        assert_eq!(d.len(), 1);
        assert_eq!(d.entry(0).map(|e| e.sub_terms[0].tag.as_str()), Some("LOC"));
    }

    #[test]
    fn test_load_aborts_on_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customization.dic");
        std::fs::write(&path, "北京/LOC\n/ORG\n大学\n").unwrap();
        match CustomizationDictionary::load(&path) {
            Err(LacError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("esperado erro de formato, obtido {:?}", other),
        }
    }

    #[test]
    fn test_load_normalized_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customization.dic");
        std::fs::write(&path, "ＡＢ/BRAND\n\n").unwrap();

        let d = CustomizationDictionary::load_normalized(&path, &Normalizer::builtin()).unwrap();
        assert!(d.has_entries());
        assert_eq!(d.len(), 1);
        assert_eq!(d.search(&chars("xab")).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_accepted_overrides_never_start_inside_previous(
            words in prop::collection::vec("[ab]{1,3}", 1..6),
            text in prop::collection::vec("[ab]", 0..20),
        ) {
            let d = dict(&words.join("\n"));
            let overrides = d.accepted_overrides(&text);
            for pair in overrides.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                prop_assert!(!(prev.begin < next.begin && next.begin < prev.end()));
                prop_assert!(prev.end() < next.end());
            }
            for ov in &overrides {
                prop_assert!(ov.end() <= text.len());
            }
        }
    }

    #[test]
    fn test_empty_dictionary() {
        let d = dict("\n \n");
        assert!(!d.has_entries());
        let mut tags = labels(&["n-B"]);
        d.parse_customization(&chars("a"), &mut tags).unwrap();
        assert_eq!(tags, labels(&["n-B"]));
    }
}
