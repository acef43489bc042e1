use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Result, TinyLlamaError};

/// Model hyperparameters. Fixed at construction time; a weight file whose
/// embedded configuration disagrees with the live model is rejected.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model_dim")]
    pub model_dim: usize,
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
    #[serde(default = "default_num_heads")]
    pub num_heads: usize,
    #[serde(default = "default_ffn_hidden_dim")]
    pub ffn_hidden_dim: usize,
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    /// Unused at inference time; carried through the weight file header.
    #[serde(default = "default_dropout_rate")]
    pub dropout_rate: f32,
}

fn default_model_dim() -> usize { 512 }
fn default_num_layers() -> usize { 6 }
fn default_num_heads() -> usize { 8 }
fn default_ffn_hidden_dim() -> usize { 2048 }
fn default_max_sequence_length() -> usize { 1024 }
fn default_vocab_size() -> usize { 32000 }
fn default_dropout_rate() -> f32 { 0.1 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dim: default_model_dim(),
            num_layers: default_num_layers(),
            num_heads: default_num_heads(),
            ffn_hidden_dim: default_ffn_hidden_dim(),
            max_sequence_length: default_max_sequence_length(),
            vocab_size: default_vocab_size(),
            dropout_rate: default_dropout_rate(),
        }
    }
}

impl ModelConfig {
    /// Load a configuration from a JSON file. Missing fields fall back to
    /// the defaults above.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: ModelConfig = serde_json::from_reader(reader)
            .map_err(|e| TinyLlamaError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_dim == 0 {
            return Err(TinyLlamaError::InvalidConfig("model_dim must be > 0".into()));
        }
        if self.num_heads == 0 {
            return Err(TinyLlamaError::InvalidConfig("num_heads must be > 0".into()));
        }
        if self.model_dim % self.num_heads != 0 {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "model_dim ({}) must be divisible by num_heads ({})",
                self.model_dim, self.num_heads
            )));
        }
        if self.num_layers == 0 {
            return Err(TinyLlamaError::InvalidConfig("num_layers must be > 0".into()));
        }
        if self.ffn_hidden_dim == 0 {
            return Err(TinyLlamaError::InvalidConfig("ffn_hidden_dim must be > 0".into()));
        }
        if self.max_sequence_length == 0 {
            return Err(TinyLlamaError::InvalidConfig("max_sequence_length must be > 0".into()));
        }
        if self.vocab_size == 0 {
            return Err(TinyLlamaError::InvalidConfig("vocab_size must be > 0".into()));
        }
        Ok(())
    }
}
