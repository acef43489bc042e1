use rand::thread_rng;
use rand_distr::{Distribution, Normal};

use crate::core::matrix::Matrix;
use crate::error::{Result, TinyLlamaError};

const SQRT_2_OVER_PI: f32 = 0.797_884_56;
const GELU_COEFF: f32 = 0.044715;

/// Xavier/Glorot-initialized matrix. Placeholder values only; any real
/// weight load replaces the buffer wholesale.
pub(crate) fn xavier_init(rows: usize, cols: usize) -> Matrix {
    let mut rng = thread_rng();
    let std = (2.0 / (rows + cols) as f64).sqrt();
    let normal = Normal::new(0.0, std).unwrap();

    let mut m = Matrix::new(rows, cols);
    for v in m.as_mut_slice() {
        *v = normal.sample(&mut rng) as f32;
    }
    m
}

/// Tanh-approximation GELU applied element-wise.
pub(crate) fn gelu(x: f32) -> f32 {
    let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}

/// Two affine layers with a GELU nonlinearity between them.
pub struct FeedForward {
    linear1_weights: Matrix,
    linear1_bias: Vec<f32>,
    linear2_weights: Matrix,
    linear2_bias: Vec<f32>,
    model_dim: usize,
    hidden_dim: usize,
}

impl FeedForward {
    pub fn new(model_dim: usize, hidden_dim: usize) -> Self {
        Self {
            linear1_weights: xavier_init(model_dim, hidden_dim),
            linear1_bias: vec![0.0; hidden_dim],
            linear2_weights: xavier_init(hidden_dim, model_dim),
            linear2_bias: vec![0.0; model_dim],
            model_dim,
            hidden_dim,
        }
    }

    pub fn model_dim(&self) -> usize {
        self.model_dim
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Replace all weights in one move. Shapes are validated against the
    /// construction-time dimensions.
    pub fn replace_weights(
        &mut self,
        linear1_weights: Matrix,
        linear1_bias: Vec<f32>,
        linear2_weights: Matrix,
        linear2_bias: Vec<f32>,
    ) -> Result<()> {
        if linear1_weights.rows() != self.model_dim || linear1_weights.cols() != self.hidden_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.model_dim, self.hidden_dim],
                actual: vec![linear1_weights.rows(), linear1_weights.cols()],
            });
        }
        if linear1_bias.len() != self.hidden_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.hidden_dim],
                actual: vec![linear1_bias.len()],
            });
        }
        if linear2_weights.rows() != self.hidden_dim || linear2_weights.cols() != self.model_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.hidden_dim, self.model_dim],
                actual: vec![linear2_weights.rows(), linear2_weights.cols()],
            });
        }
        if linear2_bias.len() != self.model_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.model_dim],
                actual: vec![linear2_bias.len()],
            });
        }
        self.linear1_weights = linear1_weights;
        self.linear1_bias = linear1_bias;
        self.linear2_weights = linear2_weights;
        self.linear2_bias = linear2_bias;
        Ok(())
    }

    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        if input.cols() != self.model_dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![input.rows(), self.model_dim],
                actual: vec![input.rows(), input.cols()],
            });
        }

        // hidden = GELU(input * W1 + b1)
        let mut hidden = input.matmul(&self.linear1_weights)?;
        for r in 0..hidden.rows() {
            for (v, b) in hidden.row_mut(r).iter_mut().zip(self.linear1_bias.iter()) {
                *v = gelu(*v + b);
            }
        }

        // output = hidden * W2 + b2
        let mut output = hidden.matmul(&self.linear2_weights)?;
        for r in 0..output.rows() {
            for (v, b) in output.row_mut(r).iter_mut().zip(self.linear2_bias.iter()) {
                *v += b;
            }
        }
        Ok(output)
    }

    /// Serialize weights in file order: linear1, linear1 bias, linear2,
    /// linear2 bias.
    pub fn write_weights<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        self.linear1_weights.write_to(writer)?;
        write_vector(writer, &self.linear1_bias)?;
        self.linear2_weights.write_to(writer)?;
        write_vector(writer, &self.linear2_bias)?;
        Ok(())
    }
}

/// Per-row layer normalization with learned scale and shift.
///
/// Uses population variance (divide by width) and eps 1e-5, matching the
/// weight file contents.
pub struct LayerNorm {
    weight: Vec<f32>,
    bias: Vec<f32>,
    eps: f32,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            weight: vec![1.0; dim],
            bias: vec![0.0; dim],
            eps: 1e-5,
        }
    }

    pub fn dim(&self) -> usize {
        self.weight.len()
    }

    pub fn replace_weights(&mut self, weight: Vec<f32>, bias: Vec<f32>) -> Result<()> {
        if weight.len() != self.weight.len() || bias.len() != self.bias.len() {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![self.weight.len()],
                actual: vec![weight.len(), bias.len()],
            });
        }
        self.weight = weight;
        self.bias = bias;
        Ok(())
    }

    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        let dim = self.weight.len();
        if input.cols() != dim {
            return Err(TinyLlamaError::ShapeMismatch {
                expected: vec![input.rows(), dim],
                actual: vec![input.rows(), input.cols()],
            });
        }

        let mut output = Matrix::new(input.rows(), dim);
        for r in 0..input.rows() {
            let row = input.row(r);
            let mean = row.iter().sum::<f32>() / dim as f32;
            let variance = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / dim as f32;
            let denom = (variance + self.eps).sqrt();

            let out_row = output.row_mut(r);
            for j in 0..dim {
                out_row[j] = (row[j] - mean) / denom * self.weight[j] + self.bias[j];
            }
        }
        Ok(output)
    }

    pub fn write_weights<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        write_vector(writer, &self.weight)?;
        write_vector(writer, &self.bias)?;
        Ok(())
    }
}

/// Serialize a bias/norm vector as `[len: u64][len f32]`, host-endian.
pub(crate) fn write_vector<W: std::io::Write>(writer: &mut W, data: &[f32]) -> Result<()> {
    writer.write_all(&(data.len() as u64).to_ne_bytes())?;
    writer.write_all(bytemuck::cast_slice(data))?;
    Ok(())
}
