//! # Fusão de Spans
//!
//! Combina os spans do modelo (ordenados, sem lacunas, cobrindo a janela) com
//! spans de customização calculados de forma independente. Um span de
//! customização só entra se começa e termina em fronteiras já presentes nos
//! spans do modelo; nesse caso substitui exatamente a sequência de spans que
//! cobre. Nunca divide um span do modelo.

use std::collections::HashSet;

use crate::error::{LacError, Result};
use crate::tagger::TaggedSpan;

/// Acumula a saída respeitando a capacidade; estourar é erro, não realocação.
struct Output {
    spans: Vec<TaggedSpan>,
    capacity: usize,
}

impl Output {
    fn push(&mut self, span: TaggedSpan) -> Result<()> {
        if self.spans.len() >= self.capacity {
            return Err(LacError::Overflow {
                capacity: self.capacity,
            });
        }
        self.spans.push(span);
        Ok(())
    }

    fn end(&self) -> usize {
        self.spans.last().map(TaggedSpan::end).unwrap_or(0)
    }
}

/// Funde `custom` em `main` com no máximo `capacity` spans no resultado.
///
/// Spans de customização desalinhados, vazios ou que começam antes do fim do
/// último span aceito são descartados em silêncio.
pub fn merge_results(main: &[TaggedSpan], custom: &[TaggedSpan], capacity: usize) -> Result<Vec<TaggedSpan>> {
    let mut boundaries: HashSet<usize> = main.iter().map(|s| s.offset).collect();
    if let Some(last) = main.last() {
        boundaries.insert(last.end());
    }

    let mut out = Output {
        spans: Vec::with_capacity(main.len().min(capacity)),
        capacity,
    };
    let mut cursor = 0;

    for span in custom {
        let aligned = boundaries.contains(&span.offset) && boundaries.contains(&span.end());
        if !aligned || span.length == 0 {
            continue;
        }
        if !out.spans.is_empty() && span.offset < out.end() {
            continue;
        }

        while cursor < main.len() && main[cursor].offset < span.offset {
            out.push(main[cursor].clone())?;
            cursor += 1;
        }
        out.push(span.clone())?;
        while cursor < main.len() && main[cursor].end() <= span.end() {
            cursor += 1;
        }
    }

    for span in &main[cursor..] {
        out.push(span.clone())?;
    }
    Ok(out.spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn singletons(n: usize, width: usize) -> Vec<TaggedSpan> {
        (0..n).map(|i| TaggedSpan::new(i * width, width, "O", 0.5)).collect()
    }

    #[test]
    fn test_aligned_span_replaces_run() {
        let main = singletons(4, 3);
        let custom = vec![TaggedSpan::new(3, 6, "LOC", 1.0)];
        let merged = merge_results(&main, &custom, 16).unwrap();
        assert_eq!(
            merged,
            vec![
                TaggedSpan::new(0, 3, "O", 0.5),
                TaggedSpan::new(3, 6, "LOC", 1.0),
                TaggedSpan::new(9, 3, "O", 0.5),
            ]
        );
    }

    #[test]
    fn test_misaligned_span_dropped() {
        let main = vec![TaggedSpan::new(0, 6, "n", 0.9), TaggedSpan::new(6, 6, "n", 0.9)];
        let custom = vec![TaggedSpan::new(3, 6, "LOC", 1.0)];
        let merged = merge_results(&main, &custom, 16).unwrap();
        assert_eq!(merged, main);
    }

    #[test]
    fn test_whole_window_and_end_boundary() {
        let main = singletons(4, 3);
        let custom = vec![TaggedSpan::new(0, 12, "ORG", 1.0)];
        let merged = merge_results(&main, &custom, 16).unwrap();
        assert_eq!(merged, custom);
    }

    #[test]
    fn test_multiple_custom_spans() {
        let main = singletons(6, 3);
        let custom = vec![TaggedSpan::new(0, 6, "LOC", 1.0), TaggedSpan::new(9, 6, "ORG", 1.0)];
        let merged = merge_results(&main, &custom, 16).unwrap();
        let labels: Vec<&str> = merged.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["LOC", "O", "ORG", "O"]);
        assert_eq!(merged.last().map(TaggedSpan::end), Some(18));
    }

    #[test]
    fn test_overlapping_custom_span_dropped() {
        let main = singletons(4, 3);
        let custom = vec![TaggedSpan::new(0, 6, "A", 1.0), TaggedSpan::new(3, 6, "B", 1.0)];
        let merged = merge_results(&main, &custom, 16).unwrap();
        let labels: Vec<&str> = merged.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "O", "O"]);
    }

    #[test]
    fn test_zero_length_custom_span_dropped() {
        let main = singletons(2, 3);
        let custom = vec![TaggedSpan::new(3, 0, "X", 1.0)];
        assert_eq!(merge_results(&main, &custom, 4).unwrap(), main);
    }

    #[test]
    fn test_overflow_returns_no_partial_result() {
        let main = singletons(4, 3);
        assert!(matches!(
            merge_results(&main, &[], 3),
            Err(LacError::Overflow { capacity: 3 })
        ));
        // a substituição reduz a saída para caber
        let custom = vec![TaggedSpan::new(0, 6, "LOC", 1.0)];
        assert_eq!(merge_results(&main, &custom, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_results(&[], &[], 0).unwrap().is_empty());
    }

    fn gapless(widths: &[usize]) -> Vec<TaggedSpan> {
        let mut offset = 0;
        widths
            .iter()
            .map(|&w| {
                let span = TaggedSpan::new(offset, w, "O", 0.5);
                offset += w;
                span
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_single_custom_span(
            widths in prop::collection::vec(1usize..4, 1..8),
            raw_start in 0usize..64,
            raw_len in 0usize..64,
        ) {
            let main = gapless(&widths);
            let total: usize = widths.iter().sum();
            let start = raw_start % total;
            let length = 1 + raw_len % (total - start);
            let custom = TaggedSpan::new(start, length, "X", 1.0);

            let merged = merge_results(&main, std::slice::from_ref(&custom), 64).unwrap();

            let aligned = main.iter().any(|m| m.offset == start)
                && main.iter().any(|m| m.end() == custom.end());
            if aligned {
                let expected: Vec<TaggedSpan> = main
                    .iter()
                    .filter(|m| m.end() <= start)
                    .cloned()
                    .chain(std::iter::once(custom.clone()))
                    .chain(main.iter().filter(|m| m.offset >= custom.end()).cloned())
                    .collect();
                let covered = main.iter().filter(|m| m.offset >= start && m.end() <= custom.end()).count();
                prop_assert_eq!(merged.len(), main.len() - covered + 1);
                prop_assert_eq!(merged, expected);
            } else {
                prop_assert_eq!(merged, main);
            }
        }
    }
}
