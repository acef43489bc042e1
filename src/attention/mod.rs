use crate::core::matrix::Matrix;
use crate::error::{Result, TinyLlamaError};
use crate::nn::xavier_init;

/// Score assigned to masked positions before softmax; effectively -inf
/// for f32.
const MASKED_SCORE: f32 = -1e9;

/// Multi-head scaled dot-product attention over four square
/// `model_dim x model_dim` projection matrices.
pub struct MultiHeadAttention {
    query_weights: Matrix,
    key_weights: Matrix,
    value_weights: Matrix,
    output_weights: Matrix,
    num_heads: usize,
    head_dim: usize,
    model_dim: usize,
}

impl MultiHeadAttention {
    pub fn new(model_dim: usize, num_heads: usize) -> Result<Self> {
        if num_heads == 0 || model_dim % num_heads != 0 {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "model_dim ({}) must be divisible by num_heads ({})",
                model_dim, num_heads
            )));
        }
        let head_dim = model_dim / num_heads;

        Ok(Self {
            query_weights: xavier_init(model_dim, model_dim),
            key_weights: xavier_init(model_dim, model_dim),
            value_weights: xavier_init(model_dim, model_dim),
            output_weights: xavier_init(model_dim, model_dim),
            num_heads,
            head_dim,
            model_dim,
        })
    }

    pub fn model_dim(&self) -> usize {
        self.model_dim
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// Replace the four projection matrices in one move. Every matrix must
    /// be `model_dim x model_dim`.
    pub fn replace_weights(
        &mut self,
        query_weights: Matrix,
        key_weights: Matrix,
        value_weights: Matrix,
        output_weights: Matrix,
    ) -> Result<()> {
        for m in [&query_weights, &key_weights, &value_weights, &output_weights] {
            if m.rows() != self.model_dim || m.cols() != self.model_dim {
                return Err(TinyLlamaError::ShapeMismatch {
                    expected: vec![self.model_dim, self.model_dim],
                    actual: vec![m.rows(), m.cols()],
                });
            }
        }
        self.query_weights = query_weights;
        self.key_weights = key_weights;
        self.value_weights = value_weights;
        self.output_weights = output_weights;
        Ok(())
    }

    /// Forward pass over a `seq_len x model_dim` input. Each head attends
    /// over its own `head_dim`-wide column block of Q/K/V; head outputs are
    /// written back into the matching block of the combined buffer, which
    /// is then run through the output projection.
    pub fn forward(&self, input: &Matrix, mask: Option<&Matrix>) -> Result<Matrix> {
        let seq_len = input.rows();

        let query = input.matmul(&self.query_weights)?;
        let key = input.matmul(&self.key_weights)?;
        let value = input.matmul(&self.value_weights)?;

        let mut combined = Matrix::new(seq_len, self.model_dim);

        for h in 0..self.num_heads {
            let offset = h * self.head_dim;

            let mut q_head = Matrix::new(seq_len, self.head_dim);
            let mut k_head = Matrix::new(seq_len, self.head_dim);
            let mut v_head = Matrix::new(seq_len, self.head_dim);
            for i in 0..seq_len {
                let src = offset..offset + self.head_dim;
                q_head.row_mut(i).copy_from_slice(&query.row(i)[src.clone()]);
                k_head.row_mut(i).copy_from_slice(&key.row(i)[src.clone()]);
                v_head.row_mut(i).copy_from_slice(&value.row(i)[src]);
            }

            let head_output = self.scaled_dot_product_attention(&q_head, &k_head, &v_head, mask)?;

            for i in 0..seq_len {
                combined.row_mut(i)[offset..offset + self.head_dim]
                    .copy_from_slice(head_output.row(i));
            }
        }

        combined.matmul(&self.output_weights)
    }

    /// `softmax(Q Kt / sqrt(head_dim)) V` with numerically stable row-wise
    /// softmax. Mask cells equal to 0 force the score to a large negative
    /// value before softmax.
    fn scaled_dot_product_attention(
        &self,
        q: &Matrix,
        k: &Matrix,
        v: &Matrix,
        mask: Option<&Matrix>,
    ) -> Result<Matrix> {
        let seq_len = q.rows();

        let mut scores = q.matmul(&k.transpose())?;
        let scale = 1.0 / (self.head_dim as f32).sqrt();
        for s in scores.as_mut_slice() {
            *s *= scale;
        }

        if let Some(mask) = mask {
            if mask.rows() != seq_len || mask.cols() != seq_len {
                return Err(TinyLlamaError::ShapeMismatch {
                    expected: vec![seq_len, seq_len],
                    actual: vec![mask.rows(), mask.cols()],
                });
            }
            for i in 0..seq_len {
                let score_row = scores.row_mut(i);
                for (s, &m) in score_row.iter_mut().zip(mask.row(i).iter()) {
                    if m == 0.0 {
                        *s = MASKED_SCORE;
                    }
                }
            }
        }

        // Row-wise softmax, subtracting the row max for stability.
        for i in 0..seq_len {
            let row = scores.row_mut(i);
            let max_val = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0f32;
            for s in row.iter_mut() {
                *s = (*s - max_val).exp();
                sum += *s;
            }
            for s in row.iter_mut() {
                *s /= sum;
            }
        }

        scores.matmul(v)
    }

    /// Serialize weights in file order: query, key, value, output.
    pub fn write_weights<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        self.query_weights.write_to(writer)?;
        self.key_weights.write_to(writer)?;
        self.value_weights.write_to(writer)?;
        self.output_weights.write_to(writer)?;
        Ok(())
    }
}
