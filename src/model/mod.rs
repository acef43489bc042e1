use std::path::Path;

use crate::config::ModelConfig;
use crate::core::matrix::Matrix;
use crate::error::{Result, TinyLlamaError};
use crate::inference::sampling;
use crate::loader;
use crate::nn::xavier_init;
use crate::tokenization::BpeTokenizer;
use crate::transformer::TransformerBlock;

/// Autoregressive transformer language model.
///
/// Owns the tokenizer, embedding tables, transformer blocks and output
/// projection. Weights are random placeholders until a weight file is
/// loaded; a failed load leaves the model in an unspecified state and the
/// instance should be discarded.
pub struct TinyLlamaModel {
    tokenizer: Option<BpeTokenizer>,
    embedding_weights: Matrix,
    position_embeddings: Matrix,
    blocks: Vec<TransformerBlock>,
    output_projection: Matrix,
    config: ModelConfig,
    temperature: f32,
}

impl TinyLlamaModel {
    pub fn new() -> Result<Self> {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Result<Self> {
        config.validate()?;

        let mut blocks = Vec::with_capacity(config.num_layers);
        for _ in 0..config.num_layers {
            blocks.push(TransformerBlock::new(
                config.model_dim,
                config.num_heads,
                config.ffn_hidden_dim,
            )?);
        }

        Ok(Self {
            tokenizer: None,
            embedding_weights: xavier_init(config.vocab_size, config.model_dim),
            position_embeddings: xavier_init(config.max_sequence_length, config.model_dim),
            blocks,
            output_projection: xavier_init(config.model_dim, config.vocab_size),
            config,
            temperature: 1.0,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn tokenizer(&self) -> Option<&BpeTokenizer> {
        self.tokenizer.as_ref()
    }

    /// Load the BPE tokenizer from a vocabulary file and a merges file.
    pub fn load_tokenizer<P: AsRef<Path>>(&mut self, vocab_file: P, merges_file: P) -> Result<()> {
        let mut tokenizer = BpeTokenizer::new();
        tokenizer.load_vocab(vocab_file)?;
        tokenizer.load_merges(merges_file)?;
        self.tokenizer = Some(tokenizer);
        Ok(())
    }

    /// The model is usable once a tokenizer with a non-empty vocabulary has
    /// been loaded.
    pub fn is_initialized(&self) -> bool {
        match &self.tokenizer {
            Some(t) => t.vocab_size() > 0,
            None => false,
        }
    }

    /// Lower-triangular causal mask: `mask[i][j] = 1 if j <= i else 0`.
    fn create_attention_mask(&self, seq_len: usize) -> Matrix {
        let mut mask = Matrix::new(seq_len, seq_len);
        for i in 0..seq_len {
            let row = mask.row_mut(i);
            for cell in row.iter_mut().take(i + 1) {
                *cell = 1.0;
            }
        }
        mask
    }

    /// Run the full stack and return the logits for the final sequence
    /// position (`vocab_size` values).
    pub fn forward(&self, token_ids: &[usize]) -> Result<Vec<f32>> {
        if !self.is_initialized() {
            return Err(TinyLlamaError::NotInitialized(
                "model is not fully initialized".into(),
            ));
        }
        if token_ids.is_empty() {
            return Err(TinyLlamaError::InvalidConfig("empty input tokens".into()));
        }
        let seq_len = token_ids.len();
        if seq_len > self.config.max_sequence_length {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "input sequence length {} exceeds maximum {}",
                seq_len, self.config.max_sequence_length
            )));
        }

        // embeddings[i] = embedding_row[token_ids[i]] + position_row[i]
        let dim = self.config.model_dim;
        let mut embeddings = Matrix::new(seq_len, dim);
        for (i, &token_id) in token_ids.iter().enumerate() {
            if token_id >= self.config.vocab_size {
                return Err(TinyLlamaError::OutOfBounds {
                    index: token_id,
                    dim: 0,
                    size: self.config.vocab_size,
                });
            }
            let token_row = self.embedding_weights.row(token_id);
            let pos_row = self.position_embeddings.row(i);
            for (out, (t, p)) in embeddings
                .row_mut(i)
                .iter_mut()
                .zip(token_row.iter().zip(pos_row.iter()))
            {
                *out = t + p;
            }
        }

        let mask = self.create_attention_mask(seq_len);

        let mut hidden = embeddings;
        for block in &self.blocks {
            hidden = block.forward(&hidden, Some(&mask))?;
        }

        let logits = hidden.matmul(&self.output_projection)?;
        Ok(logits.row(seq_len - 1).to_vec())
    }

    /// Temperature-scaled softmax. A non-positive temperature falls back to
    /// the model's stored default; an empty input yields an empty output.
    pub fn softmax(&self, logits: &[f32], temperature: f32) -> Vec<f32> {
        let temp = if temperature > 0.0 {
            temperature
        } else {
            self.temperature
        };
        sampling::softmax_with_temperature(logits, temp)
    }

    /// Deterministic greedy selection (argmax). Fails on an empty
    /// distribution.
    pub fn sample_token(&self, probabilities: &[f32]) -> Result<usize> {
        sampling::argmax(probabilities)
            .ok_or_else(|| TinyLlamaError::InvalidConfig("empty probability distribution".into()))
    }

    /// Greedy autoregressive generation. The returned string always begins
    /// with the original prompt text, echoed verbatim; only the newly
    /// generated suffix is decoded.
    pub fn generate_text(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String> {
        if !self.is_initialized() {
            return Err(TinyLlamaError::NotInitialized(
                "model is not fully initialized".into(),
            ));
        }
        if max_tokens == 0 {
            return Err(TinyLlamaError::InvalidConfig(
                "max_tokens must be positive".into(),
            ));
        }
        let tokenizer = match &self.tokenizer {
            Some(t) => t,
            None => {
                return Err(TinyLlamaError::NotInitialized(
                    "tokenizer not loaded".into(),
                ))
            }
        };

        let mut tokens = tokenizer.encode(prompt)?;
        if tokens.len() >= self.config.max_sequence_length {
            tokens.truncate(self.config.max_sequence_length - 1);
        }
        let prompt_len = tokens.len();
        let eos_id = tokenizer.vocab().eos_id();

        log::debug!(
            "generating up to {} tokens from a {}-token prompt",
            max_tokens,
            prompt_len
        );

        for _ in 0..max_tokens {
            if tokens.len() >= self.config.max_sequence_length {
                break;
            }
            let logits = self.forward(&tokens)?;
            let probs = self.softmax(&logits, temperature);
            let next_token = self.sample_token(&probs)?;
            tokens.push(next_token);
            if next_token == eos_id {
                break;
            }
        }

        let generated = tokenizer.decode(&tokens[prompt_len..]);
        Ok(format!("{}{}", prompt, generated))
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<usize>> {
        match &self.tokenizer {
            Some(t) => t.encode(text),
            None => Err(TinyLlamaError::NotInitialized(
                "tokenizer not loaded".into(),
            )),
        }
    }

    pub fn tokenize_to_strings(&self, text: &str) -> Result<Vec<String>> {
        match &self.tokenizer {
            Some(t) => Ok(t.encode_to_strings(text)),
            None => Err(TinyLlamaError::NotInitialized(
                "tokenizer not loaded".into(),
            )),
        }
    }

    pub fn detokenize(&self, token_ids: &[usize]) -> Result<String> {
        match &self.tokenizer {
            Some(t) => Ok(t.decode(token_ids)),
            None => Err(TinyLlamaError::NotInitialized(
                "tokenizer not loaded".into(),
            )),
        }
    }

    /// Load all weights from a binary weight file, replacing the current
    /// tensors in place. See the loader module for the format.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        loader::load_weights(self, path.as_ref())
    }

    /// Save all weights in the binary weight-file format.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        loader::save_weights(self, path.as_ref())
    }

    pub(crate) fn embedding_weights(&self) -> &Matrix {
        &self.embedding_weights
    }

    pub(crate) fn position_embeddings(&self) -> &Matrix {
        &self.position_embeddings
    }

    pub(crate) fn output_projection(&self) -> &Matrix {
        &self.output_projection
    }

    pub(crate) fn blocks(&self) -> &[TransformerBlock] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [TransformerBlock] {
        &mut self.blocks
    }

    pub(crate) fn replace_embedding_weights(&mut self, weights: Matrix) -> Result<()> {
        if weights.rows() != self.config.vocab_size || weights.cols() != self.config.model_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.config.vocab_size, self.config.model_dim],
                actual: vec![weights.rows(), weights.cols()],
            });
        }
        self.embedding_weights = weights;
        Ok(())
    }

    pub(crate) fn replace_position_embeddings(&mut self, weights: Matrix) -> Result<()> {
        if weights.rows() != self.config.max_sequence_length
            || weights.cols() != self.config.model_dim
        {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.config.max_sequence_length, self.config.model_dim],
                actual: vec![weights.rows(), weights.cols()],
            });
        }
        self.position_embeddings = weights;
        Ok(())
    }

    pub(crate) fn replace_output_projection(&mut self, weights: Matrix) -> Result<()> {
        if weights.rows() != self.config.model_dim || weights.cols() != self.config.vocab_size {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.config.model_dim, self.config.vocab_size],
                actual: vec![weights.rows(), weights.cols()],
            });
        }
        self.output_projection = weights;
        Ok(())
    }
}
