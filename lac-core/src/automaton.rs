//! # Autômato Aho-Corasick
//!
//! Casamento de múltiplos padrões sobre uma sequência de tokens (strings), e
//! não de bytes: cada aresta da trie é um token inteiro.
//!
//! ## Representação
//!
//! Os nós vivem em uma arena (`Vec<Node>`) e se referenciam por índice. O link
//! de falha também é um índice, de modo que a estrutura inteira é liberada de
//! uma vez quando o autômato é descartado. Índices são atribuídos em ordem de
//! inserção, então a mesma sequência de `insert` produz sempre a mesma arena.
//!
//! ## Ciclo de vida
//!
//! 1. `insert` de todos os padrões (fase exclusiva de escrita).
//! 2. `build` uma única vez, calculando os links de falha em largura.
//! 3. `search` concorrente via `&self`; não há mutação após o build.

use std::collections::{HashMap, VecDeque};

const ROOT: usize = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    children: HashMap<String, usize>,
    /// Valor terminal (id da entrada do dicionário), se o caminho é um padrão.
    value: Option<usize>,
    /// Nó do maior sufixo próprio do caminho que também é caminho a partir da raiz.
    /// Sempre `None` na raiz.
    fail: Option<usize>,
}

/// Um casamento: índice do último token e valor do padrão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AutomatonMatch {
    pub end: usize,
    pub value: usize,
}

#[derive(Debug, Clone)]
pub struct PatternAutomaton {
    nodes: Vec<Node>,
    built: bool,
}

impl Default for PatternAutomaton {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternAutomaton {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            built: false,
        }
    }

    /// Número de nós, incluindo a raiz.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Insere um padrão com o valor `value`. Padrão vazio é ignorado.
    ///
    /// Padrões com prefixo comum compartilham nós. Reinserir o mesmo padrão
    /// sobrescreve o valor. Qualquer inserção invalida um build anterior.
    pub fn insert<S: AsRef<str>>(&mut self, pattern: &[S], value: usize) {
        if pattern.is_empty() {
            return;
        }
        let mut current = ROOT;
        for token in pattern {
            let token = token.as_ref();
            current = match self.nodes[current].children.get(token) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[current].children.insert(token.to_string(), child);
                    child
                }
            };
        }
        self.nodes[current].value = Some(value);
        self.built = false;
    }

    /// Calcula os links de falha em largura a partir da raiz.
    pub fn build(&mut self) {
        self.nodes[ROOT].fail = None;
        let mut queue = VecDeque::new();

        let root_children: Vec<usize> = self.nodes[ROOT].children.values().copied().collect();
        for child in root_children {
            self.nodes[child].fail = Some(ROOT);
            queue.push_back(child);
        }

        while let Some(current) = queue.pop_front() {
            let links: Vec<(usize, usize)> = self.nodes[current]
                .children
                .iter()
                .map(|(key, &child)| (child, self.fail_target(current, key)))
                .collect();

            for (child, fail) in links {
                self.nodes[child].fail = Some(fail);
                queue.push_back(child);
            }
        }
        self.built = true;
    }

    /// Percorre a cadeia de falha de `parent` procurando um filho com chave `key`.
    fn fail_target(&self, parent: usize, key: &str) -> usize {
        let mut candidate = self.nodes[parent].fail;
        while let Some(node) = candidate {
            if let Some(&child) = self.nodes[node].children.get(key) {
                return child;
            }
            candidate = self.nodes[node].fail;
        }
        ROOT
    }

    fn fail_of(&self, node: usize) -> usize {
        self.nodes[node].fail.unwrap_or(ROOT)
    }

    /// Busca todos os padrões em `tokens`, em ordem crescente de posição final.
    ///
    /// Com `backtrack == false`, cada posição reporta no máximo um casamento:
    /// o padrão mais longo terminando ali. Com `backtrack == true`, a cadeia
    /// de falha é percorrida até a raiz e os casamentos aninhados mais curtos
    /// também são reportados (do mais longo para o mais curto).
    ///
    /// Sem backtrack, o casamento reportado não é necessariamente o nó
    /// alcançado: se ele não é terminal, vale o primeiro nó terminal da sua
    /// cadeia de falha. Assim uma posição com algum padrão terminando nela
    /// nunca fica sem casamento (ex: padrões "abc" e "b" sobre "ab").
    ///
    /// # Panics
    ///
    /// Se chamado antes de [`PatternAutomaton::build`].
    pub fn search<S: AsRef<str>>(&self, tokens: &[S], backtrack: bool) -> Vec<AutomatonMatch> {
        assert!(self.built, "PatternAutomaton::search chamado antes de build()");

        let mut matches = Vec::new();
        let mut state = ROOT;

        for (i, token) in tokens.iter().enumerate() {
            let token = token.as_ref();
            let mut next = self.nodes[state].children.get(token).copied();
            while next.is_none() && state != ROOT {
                state = self.fail_of(state);
                next = self.nodes[state].children.get(token).copied();
            }

            let Some(reached) = next else {
                continue;
            };
            state = reached;

            let mut node = reached;
            while node != ROOT {
                if let Some(value) = self.nodes[node].value {
                    matches.push(AutomatonMatch { end: i, value });
                    if !backtrack {
                        break;
                    }
                }
                node = self.fail_of(node);
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn chars(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn automaton(patterns: &[&str]) -> PatternAutomaton {
        let mut ac = PatternAutomaton::new();
        for (i, p) in patterns.iter().enumerate() {
            ac.insert(&chars(p), i);
        }
        ac.build();
        ac
    }

    #[test]
    fn test_single_pattern_exact() {
        let ac = automaton(&["北京大学"]);
        let found = ac.search(&chars("北京大学"), false);
        assert_eq!(found, vec![AutomatonMatch { end: 3, value: 0 }]);
    }

    #[test]
    fn test_shared_prefix_nodes() {
        let ac = automaton(&["北京", "北京大学"]);
        // raiz + 北 + 京 + 大 + 学
        assert_eq!(ac.node_count(), 5);
    }

    #[test]
    fn test_empty_pattern_ignored() {
        let mut ac = PatternAutomaton::new();
        ac.insert::<&str>(&[], 7);
        ac.build();
        assert_eq!(ac.node_count(), 1);
        assert!(ac.search(&chars("abc"), true).is_empty());
    }

    #[test]
    fn test_backtrack_reports_nested() {
        let ac = automaton(&["百度", "家", "家家", "高科技", "科技", "科技公司"]);
        let text = chars("百度是家高科技公司");

        let all: HashSet<(usize, usize)> = ac
            .search(&text, true)
            .into_iter()
            .map(|m| (m.end, m.value))
            .collect();
        let expected: HashSet<(usize, usize)> =
            [(1, 0), (3, 1), (6, 3), (6, 4), (8, 5)].into_iter().collect();
        assert_eq!(all, expected);

        let longest = ac.search(&text, false);
        assert_eq!(
            longest,
            vec![
                AutomatonMatch { end: 1, value: 0 },
                AutomatonMatch { end: 3, value: 1 },
                AutomatonMatch { end: 6, value: 3 },
                AutomatonMatch { end: 8, value: 5 },
            ]
        );
    }

    #[test]
    fn test_longest_found_through_fail_chain() {
        // Em "ab" o nó alcançado é o prefixo de "abc" (não terminal); "b" está na cadeia de falha.
        let ac = automaton(&["abc", "b"]);
        let found = ac.search(&chars("ab"), false);
        assert_eq!(found, vec![AutomatonMatch { end: 1, value: 1 }]);
    }

    #[test]
    fn test_fail_links_after_mismatch() {
        let ac = automaton(&["she", "he", "hers"]);
        let found: Vec<(usize, usize)> = ac
            .search(&chars("ushers"), true)
            .into_iter()
            .map(|m| (m.end, m.value))
            .collect();
        assert_eq!(found, vec![(3, 0), (3, 1), (5, 2)]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let patterns = ["he", "she", "his", "hers", "我们", "我"];
        let a = automaton(&patterns);
        let b = automaton(&patterns);
        let links_a: Vec<Option<usize>> = a.nodes.iter().map(|n| n.fail).collect();
        let links_b: Vec<Option<usize>> = b.nodes.iter().map(|n| n.fail).collect();
        assert_eq!(links_a, links_b);
        assert_eq!(a.nodes[ROOT].fail, None);
        assert!(a.nodes[1..].iter().all(|n| n.fail.is_some()));
    }

    #[test]
    #[should_panic]
    fn test_search_before_build_panics() {
        let mut ac = PatternAutomaton::new();
        ac.insert(&chars("ab"), 0);
        ac.search(&chars("ab"), false);
    }

    /// Oráculo força-bruta: todos os (fim, valor) cujo sufixo é um padrão.
    fn brute_force(patterns: &[Vec<String>], text: &[String]) -> Vec<(usize, usize, usize)> {
        let mut out = Vec::new();
        for end in 0..text.len() {
            for (value, p) in patterns.iter().enumerate() {
                if !p.is_empty() && p.len() <= end + 1 && text[end + 1 - p.len()..=end] == p[..] {
                    out.push((end, value, p.len()));
                }
            }
        }
        out
    }

    fn dedup_patterns(raw: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let mut seen = HashSet::new();
        raw.into_iter().filter(|p| !p.is_empty() && seen.insert(p.clone())).collect()
    }

    proptest! {
        #[test]
        fn prop_backtrack_matches_brute_force(
            raw in prop::collection::vec(prop::collection::vec("[abc]", 1..4), 1..6),
            text in prop::collection::vec("[abc]", 0..20),
        ) {
            let patterns = dedup_patterns(raw);
            let mut ac = PatternAutomaton::new();
            for (i, p) in patterns.iter().enumerate() {
                ac.insert(p, i);
            }
            ac.build();

            let found: HashSet<(usize, usize)> =
                ac.search(&text, true).into_iter().map(|m| (m.end, m.value)).collect();
            let expected: HashSet<(usize, usize)> =
                brute_force(&patterns, &text).into_iter().map(|(e, v, _)| (e, v)).collect();
            prop_assert_eq!(found, expected);
        }

        #[test]
        fn prop_longest_only_one_per_end(
            raw in prop::collection::vec(prop::collection::vec("[ab]", 1..4), 1..6),
            text in prop::collection::vec("[ab]", 0..20),
        ) {
            let patterns = dedup_patterns(raw);
            let mut ac = PatternAutomaton::new();
            for (i, p) in patterns.iter().enumerate() {
                ac.insert(p, i);
            }
            ac.build();

            let found = ac.search(&text, false);
            let oracle = brute_force(&patterns, &text);
            let mut ends = HashSet::new();
            for m in &found {
                prop_assert!(ends.insert(m.end));
                let longest = oracle.iter().filter(|(e, _, _)| *e == m.end).map(|(_, _, l)| *l).max();
                prop_assert_eq!(Some(patterns[m.value].len()), longest);
            }
            let oracle_ends: HashSet<usize> = oracle.iter().map(|(e, _, _)| *e).collect();
            prop_assert_eq!(ends, oracle_ends);
        }
    }
}
