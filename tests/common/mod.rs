#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tinyllama::{ModelConfig, TinyLlamaModel};

/// Vocabulary fixture: reserved tokens take ids 0..=3, file tokens are
/// auto-numbered from 4.
pub const VOCAB: &str = "h\ne\nl\no\nhe\nhel\nhell\nhello\nw\nr\nd\nworld\n";

/// Merge fixture with a `#version` header; earlier lines rank lower
/// (higher priority).
pub const MERGES: &str = "#version: 0.2\nh e\nhe l\nhel l\nhell o\nw o\nwo r\nwor l\nworl d\n";

pub const HELLO_ID: usize = 11;
pub const WORLD_ID: usize = 15;

pub fn small_config() -> ModelConfig {
    ModelConfig {
        model_dim: 8,
        num_layers: 2,
        num_heads: 2,
        ffn_hidden_dim: 16,
        max_sequence_length: 16,
        vocab_size: 16,
        dropout_rate: 0.0,
    }
}

pub fn write_tokenizer_files(dir: &Path) -> (PathBuf, PathBuf) {
    let vocab = dir.join("vocab.txt");
    let merges = dir.join("merges.txt");
    fs::write(&vocab, VOCAB).unwrap();
    fs::write(&merges, MERGES).unwrap();
    (vocab, merges)
}

/// A small model with the tokenizer fixture loaded and random placeholder
/// weights.
pub fn build_model(dir: &Path) -> TinyLlamaModel {
    let (vocab, merges) = write_tokenizer_files(dir);
    let mut model = TinyLlamaModel::with_config(small_config()).unwrap();
    model.load_tokenizer(&vocab, &merges).unwrap();
    model
}
