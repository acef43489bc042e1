use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";
pub const BOS_TOKEN: &str = "<bos>";
pub const EOS_TOKEN: &str = "<eos>";

/// Bidirectional token string <-> id table.
///
/// The four reserved tokens are created first and are always present.
/// Ids grow monotonically; tokens are never removed or renumbered.
pub struct Vocabulary {
    token_to_id: HashMap<String, usize>,
    id_to_token: Vec<String>,
    unk_id: usize,
    pad_id: usize,
    bos_id: usize,
    eos_id: usize,
}

impl Vocabulary {
    pub fn new() -> Self {
        let mut vocab = Self {
            token_to_id: HashMap::new(),
            id_to_token: Vec::new(),
            unk_id: 0,
            pad_id: 0,
            bos_id: 0,
            eos_id: 0,
        };
        vocab.unk_id = vocab.add_token(UNK_TOKEN);
        vocab.pad_id = vocab.add_token(PAD_TOKEN);
        vocab.bos_id = vocab.add_token(BOS_TOKEN);
        vocab.eos_id = vocab.add_token(EOS_TOKEN);
        vocab
    }

    /// Returns the existing id if the token is known, otherwise appends it
    /// at the next sequential id.
    pub fn add_token(&mut self, token: &str) -> usize {
        if let Some(&id) = self.token_to_id.get(token) {
            return id;
        }
        let id = self.id_to_token.len();
        self.token_to_id.insert(token.to_string(), id);
        self.id_to_token.push(token.to_string());
        id
    }

    /// Id for a token string; unknown strings resolve to the `<unk>` id.
    pub fn get_token_id(&self, token: &str) -> usize {
        self.token_to_id
            .get(token)
            .copied()
            .unwrap_or(self.unk_id)
    }

    /// Token string for an id; out-of-range ids resolve to the `<unk>`
    /// string.
    pub fn get_token(&self, id: usize) -> &str {
        if id >= self.id_to_token.len() {
            return &self.id_to_token[self.unk_id];
        }
        &self.id_to_token[id]
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn unk_id(&self) -> usize {
        self.unk_id
    }

    pub fn pad_id(&self) -> usize {
        self.pad_id
    }

    pub fn bos_id(&self) -> usize {
        self.bos_id
    }

    pub fn eos_id(&self) -> usize {
        self.eos_id
    }

    /// Map a token to an explicit id, force-extending the id space with
    /// empty holes if necessary.
    fn insert_at(&mut self, token: &str, id: usize) {
        if id >= self.id_to_token.len() {
            self.id_to_token.resize(id + 1, String::new());
        }
        self.id_to_token[id] = token.to_string();
        self.token_to_id.insert(token.to_string(), id);
    }

    /// Reset to the four reserved tokens, then parse one entry per line.
    ///
    /// A line is either a bare token (auto-numbered) or
    /// `token<space>explicit_id`. Explicit ids take precedence and may
    /// leave unfilled holes. A file is free to reassign the reserved
    /// tokens' ids; they are re-resolved after parsing.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        self.token_to_id.clear();
        self.id_to_token.clear();

        let max_reserved = self
            .unk_id
            .max(self.pad_id)
            .max(self.bos_id)
            .max(self.eos_id);
        self.id_to_token.resize(max_reserved + 1, String::new());
        for (token, id) in [
            (UNK_TOKEN, self.unk_id),
            (PAD_TOKEN, self.pad_id),
            (BOS_TOKEN, self.bos_id),
            (EOS_TOKEN, self.eos_id),
        ] {
            self.id_to_token[id] = token.to_string();
            self.token_to_id.insert(token.to_string(), id);
        }

        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let token = match parts.next() {
                Some(t) => t,
                None => continue,
            };
            match parts.next().map(str::parse::<i64>) {
                Some(Ok(id)) if id >= 0 => self.insert_at(token, id as usize),
                _ => {
                    self.add_token(token);
                }
            }
        }

        // The file may have reassigned the reserved tokens' ids.
        if let Some(&id) = self.token_to_id.get(UNK_TOKEN) {
            self.unk_id = id;
        }
        if let Some(&id) = self.token_to_id.get(PAD_TOKEN) {
            self.pad_id = id;
        }
        if let Some(&id) = self.token_to_id.get(BOS_TOKEN) {
            self.bos_id = id;
        }
        if let Some(&id) = self.token_to_id.get(EOS_TOKEN) {
            self.eos_id = id;
        }

        log::debug!("loaded vocabulary with {} tokens", self.id_to_token.len());
        Ok(())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

/// Greedy byte-pair-encoding tokenizer over a [`Vocabulary`] and an
/// ordered merge table (lower rank = higher priority).
pub struct BpeTokenizer {
    vocab: Vocabulary,
    merges: Vec<(String, String)>,
    merge_ranks: HashMap<(String, String), usize>,
}

impl BpeTokenizer {
    pub fn new() -> Self {
        Self {
            vocab: Vocabulary::new(),
            merges: Vec::new(),
            merge_ranks: HashMap::new(),
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn num_merges(&self) -> usize {
        self.merges.len()
    }

    pub fn load_vocab<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.vocab.load_from_file(path)
    }

    /// Load merge rules, one `left right` pair per line. An optional first
    /// line containing `#version` is treated as a header and skipped.
    /// Earlier lines get lower ranks (higher priority).
    pub fn load_merges<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        self.merges.clear();
        self.merge_ranks.clear();

        let mut rank = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line_no == 0 && line.contains("#version") {
                continue;
            }
            let mut parts = line.split_whitespace();
            if let (Some(left), Some(right)) = (parts.next(), parts.next()) {
                self.merges.push((left.to_string(), right.to_string()));
                self.merge_ranks
                    .insert((left.to_string(), right.to_string()), rank);
                rank += 1;
            }
        }

        log::debug!("loaded {} BPE merge rules", self.merges.len());
        Ok(())
    }

    /// Lowercase ASCII letters and map tab/CR/LF to space; all other bytes
    /// pass through unchanged.
    pub fn preprocess(&self, text: &str) -> String {
        text.chars()
            .map(|c| match c {
                'A'..='Z' => c.to_ascii_lowercase(),
                '\t' | '\n' | '\r' => ' ',
                _ => c,
            })
            .collect()
    }

    /// Split into word tokens. Every maximal run of non-space characters is
    /// one token and every individual space is its own token, so leading,
    /// trailing and repeated spaces are all preserved.
    pub fn split_to_words(&self, text: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            if c == ' ' {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                words.push(" ".to_string());
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    /// Apply merge rules to a single word: split into characters, then
    /// repeatedly merge the lowest-rank adjacent pair found anywhere in the
    /// token list until no adjacent pair has a rank. A single pass merges
    /// every non-overlapping occurrence of the winning pair.
    pub fn bpe_encode(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }

        let mut parts: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        if parts.len() == 1 {
            return parts;
        }

        loop {
            let mut best_rank = usize::MAX;
            let mut best_pair: Option<(String, String)> = None;
            for window in parts.windows(2) {
                let key = (window[0].clone(), window[1].clone());
                if let Some(&rank) = self.merge_ranks.get(&key) {
                    if rank < best_rank {
                        best_rank = rank;
                        best_pair = Some(key);
                    }
                }
            }

            let (left, right) = match best_pair {
                Some(pair) => pair,
                None => break,
            };

            let merged = format!("{}{}", left, right);
            let mut next = Vec::with_capacity(parts.len());
            let mut i = 0;
            while i < parts.len() {
                if i + 1 < parts.len() && parts[i] == left && parts[i + 1] == right {
                    next.push(merged.clone());
                    i += 2;
                } else {
                    next.push(parts[i].clone());
                    i += 1;
                }
            }
            parts = next;

            if parts.len() < 2 {
                break;
            }
        }

        parts
    }

    /// Encode text to token ids. Unknown subwords collapse to the `<unk>`
    /// id; empty input yields an empty sequence.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let preprocessed = self.preprocess(text);
        let words = self.split_to_words(&preprocessed);

        let mut token_ids = Vec::with_capacity(words.len());
        for word in &words {
            if word.is_empty() {
                continue;
            }
            for subword in self.bpe_encode(word) {
                token_ids.push(self.vocab.get_token_id(&subword));
            }
        }
        Ok(token_ids)
    }

    /// Encode text to subword strings, without mapping through the
    /// vocabulary.
    pub fn encode_to_strings(&self, text: &str) -> Vec<String> {
        let preprocessed = self.preprocess(text);
        let words = self.split_to_words(&preprocessed);

        let mut tokens = Vec::with_capacity(words.len());
        for word in &words {
            tokens.extend(self.bpe_encode(word));
        }
        tokens
    }

    /// Decode ids by straight concatenation. Word-boundary spaces were
    /// themselves encoded as tokens, so no separators are re-inserted.
    /// A literal `"<unk>"` in the output is indistinguishable from an
    /// unknown-token placeholder; disambiguation is the caller's concern.
    pub fn decode(&self, token_ids: &[usize]) -> String {
        let mut result = String::new();
        for &id in token_ids {
            result.push_str(self.vocab.get_token(id));
        }
        result
    }
}

impl Default for BpeTokenizer {
    fn default() -> Self {
        Self::new()
    }
}
