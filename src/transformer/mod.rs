use crate::attention::MultiHeadAttention;
use crate::core::matrix::Matrix;
use crate::error::{Result, TinyLlamaError};
use crate::nn::{FeedForward, LayerNorm};

/// Pre-normalization transformer block:
/// `x = input + attn(ln1(input))`, then `x + ffn(ln2(x))`.
pub struct TransformerBlock {
    attention: MultiHeadAttention,
    ffn: FeedForward,
    norm1: LayerNorm,
    norm2: LayerNorm,
    model_dim: usize,
}

impl TransformerBlock {
    pub fn new(model_dim: usize, num_heads: usize, ffn_hidden_dim: usize) -> Result<Self> {
        Ok(Self {
            attention: MultiHeadAttention::new(model_dim, num_heads)?,
            ffn: FeedForward::new(model_dim, ffn_hidden_dim),
            norm1: LayerNorm::new(model_dim),
            norm2: LayerNorm::new(model_dim),
            model_dim,
        })
    }

    pub fn model_dim(&self) -> usize {
        self.model_dim
    }

    pub fn attention(&self) -> &MultiHeadAttention {
        &self.attention
    }

    pub fn attention_mut(&mut self) -> &mut MultiHeadAttention {
        &mut self.attention
    }

    pub fn ffn(&self) -> &FeedForward {
        &self.ffn
    }

    pub fn ffn_mut(&mut self) -> &mut FeedForward {
        &mut self.ffn
    }

    /// Replace both layer-norm parameter sets in one move.
    pub fn replace_norm_weights(
        &mut self,
        ln1_weight: Vec<f32>,
        ln1_bias: Vec<f32>,
        ln2_weight: Vec<f32>,
        ln2_bias: Vec<f32>,
    ) -> Result<()> {
        self.norm1.replace_weights(ln1_weight, ln1_bias)?;
        self.norm2.replace_weights(ln2_weight, ln2_bias)?;
        Ok(())
    }

    pub fn forward(&self, input: &Matrix, mask: Option<&Matrix>) -> Result<Matrix> {
        if input.cols() != self.model_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![input.rows(), self.model_dim],
                actual: vec![input.rows(), input.cols()],
            });
        }

        // x = input + attn(ln1(input))
        let normed = self.norm1.forward(input)?;
        let attn_out = self.attention.forward(&normed, mask)?;
        let residual = input.add(&attn_out)?;

        // x = x + ffn(ln2(x))
        let normed = self.norm2.forward(&residual)?;
        let ffn_out = self.ffn.forward(&normed)?;
        residual.add(&ffn_out)
    }

    /// Serialize layer-norm parameters in file order: ln1 weight, ln1 bias,
    /// ln2 weight, ln2 bias.
    pub fn write_norm_weights<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        self.norm1.write_weights(writer)?;
        self.norm2.write_weights(writer)?;
        Ok(())
    }
}
