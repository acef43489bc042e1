//! Binary weight-file reader/writer.
//!
//! Fixed layout, read and written in exactly this order:
//! magic, version, six config ints, dropout rate, embedding matrix,
//! position matrix, per layer Q/K/V/O then linear1/bias/linear2/bias then
//! ln1 weight/bias and ln2 weight/bias, and finally the output projection.
//! Matrices are `[rows u64][cols u64][data f32...]`, vectors are
//! `[len u64][data f32...]`, all host-endian. Every declared dimension is
//! validated against the live model's configuration before the payload is
//! consumed, and the stream must be exhausted after the output projection.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::core::matrix::{read_f32_payload, Matrix};
use crate::error::{Result, TinyLlamaError};
use crate::model::TinyLlamaModel;

/// "TLLM" in hex.
pub const WEIGHTS_MAGIC: u32 = 0x544C_4C4D;
pub const WEIGHTS_VERSION: u32 = 1;

fn eof_error(what: &str, e: std::io::Error) -> TinyLlamaError {
    TinyLlamaError::FileFormat(format!("unexpected end of file while reading {}: {}", what, e))
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| eof_error(what, e))?;
    Ok(u32::from_ne_bytes(buf))
}

fn read_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| eof_error(what, e))?;
    Ok(i32::from_ne_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R, what: &str) -> Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| eof_error(what, e))?;
    Ok(f32::from_ne_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R, what: &str) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(|e| eof_error(what, e))?;
    Ok(u64::from_ne_bytes(buf))
}

/// Read a matrix whose declared shape must match `(rows, cols)` exactly.
/// The shape is validated before the payload is consumed.
fn read_matrix_expected<R: Read>(
    reader: &mut R,
    rows: usize,
    cols: usize,
    what: &str,
) -> Result<Matrix> {
    let file_rows = read_u64(reader, what)? as usize;
    let file_cols = read_u64(reader, what)? as usize;
    if file_rows != rows || file_cols != cols {
        return Err(TinyLlamaError::FileFormat(format!(
            "{} dimension mismatch: expected [{} x {}], got [{} x {}]",
            what, rows, cols, file_rows, file_cols
        )));
    }
    let data = read_f32_payload(reader, rows * cols)
        .map_err(|e| TinyLlamaError::FileFormat(format!("truncated data for {}: {}", what, e)))?;
    Matrix::from_vec(rows, cols, data)
}

/// Read a vector whose declared length must match `len` exactly.
fn read_vector_expected<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<f32>> {
    let file_len = read_u64(reader, what)? as usize;
    if file_len != len {
        return Err(TinyLlamaError::FileFormat(format!(
            "{} dimension mismatch: expected {}, got {}",
            what, len, file_len
        )));
    }
    read_f32_payload(reader, len)
        .map_err(|e| TinyLlamaError::FileFormat(format!("truncated data for {}: {}", what, e)))
}

fn check_config_field(name: &str, expected: usize, actual: i32) -> Result<()> {
    if actual as i64 != expected as i64 {
        return Err(TinyLlamaError::FileFormat(format!(
            "{} mismatch: expected {}, got {}",
            name, expected, actual
        )));
    }
    Ok(())
}

/// Load all weights from `path` into `model`, validating the embedded
/// configuration against the live model. On failure the model may be left
/// partially overwritten; callers should discard it.
pub fn load_weights(model: &mut TinyLlamaModel, path: &Path) -> Result<()> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let cfg = model.config().clone();

    let magic = read_u32(&mut reader, "magic number")?;
    if magic != WEIGHTS_MAGIC {
        return Err(TinyLlamaError::FileFormat(format!(
            "invalid magic number: expected 0x{:08X}, got 0x{:08X}",
            WEIGHTS_MAGIC, magic
        )));
    }

    let version = read_u32(&mut reader, "version")?;
    if version != WEIGHTS_VERSION {
        return Err(TinyLlamaError::FileFormat(format!(
            "unsupported weights file version: expected {}, got {}",
            WEIGHTS_VERSION, version
        )));
    }

    check_config_field(
        "model dimension",
        cfg.model_dim,
        read_i32(&mut reader, "model dimension")?,
    )?;
    check_config_field(
        "number of layers",
        cfg.num_layers,
        read_i32(&mut reader, "number of layers")?,
    )?;
    check_config_field(
        "number of heads",
        cfg.num_heads,
        read_i32(&mut reader, "number of heads")?,
    )?;
    check_config_field(
        "FFN hidden dimension",
        cfg.ffn_hidden_dim,
        read_i32(&mut reader, "FFN hidden dimension")?,
    )?;
    check_config_field(
        "maximum sequence length",
        cfg.max_sequence_length,
        read_i32(&mut reader, "maximum sequence length")?,
    )?;
    check_config_field(
        "vocabulary size",
        cfg.vocab_size,
        read_i32(&mut reader, "vocabulary size")?,
    )?;

    let dropout = read_f32(&mut reader, "dropout rate")?;
    if dropout.to_bits() != cfg.dropout_rate.to_bits() {
        return Err(TinyLlamaError::FileFormat(format!(
            "dropout rate mismatch: expected {}, got {}",
            cfg.dropout_rate, dropout
        )));
    }

    let dim = cfg.model_dim;
    let hidden = cfg.ffn_hidden_dim;

    let embedding = read_matrix_expected(
        &mut reader,
        cfg.vocab_size,
        dim,
        "embedding weights",
    )?;
    model.replace_embedding_weights(embedding)?;

    let position = read_matrix_expected(
        &mut reader,
        cfg.max_sequence_length,
        dim,
        "position embeddings",
    )?;
    model.replace_position_embeddings(position)?;

    for layer in 0..cfg.num_layers {
        let q = read_matrix_expected(&mut reader, dim, dim, &format!("query weights (layer {})", layer))?;
        let k = read_matrix_expected(&mut reader, dim, dim, &format!("key weights (layer {})", layer))?;
        let v = read_matrix_expected(&mut reader, dim, dim, &format!("value weights (layer {})", layer))?;
        let o = read_matrix_expected(&mut reader, dim, dim, &format!("output weights (layer {})", layer))?;
        model.blocks_mut()[layer]
            .attention_mut()
            .replace_weights(q, k, v, o)?;

        let l1 = read_matrix_expected(&mut reader, dim, hidden, &format!("linear1 weights (layer {})", layer))?;
        let b1 = read_vector_expected(&mut reader, hidden, &format!("linear1 bias (layer {})", layer))?;
        let l2 = read_matrix_expected(&mut reader, hidden, dim, &format!("linear2 weights (layer {})", layer))?;
        let b2 = read_vector_expected(&mut reader, dim, &format!("linear2 bias (layer {})", layer))?;
        model.blocks_mut()[layer]
            .ffn_mut()
            .replace_weights(l1, b1, l2, b2)?;

        let ln1_weight = read_vector_expected(&mut reader, dim, &format!("layer norm 1 weights (layer {})", layer))?;
        let ln1_bias = read_vector_expected(&mut reader, dim, &format!("layer norm 1 bias (layer {})", layer))?;
        let ln2_weight = read_vector_expected(&mut reader, dim, &format!("layer norm 2 weights (layer {})", layer))?;
        let ln2_bias = read_vector_expected(&mut reader, dim, &format!("layer norm 2 bias (layer {})", layer))?;
        model.blocks_mut()[layer].replace_norm_weights(ln1_weight, ln1_bias, ln2_weight, ln2_bias)?;
    }

    let output = read_matrix_expected(&mut reader, dim, cfg.vocab_size, "output projection")?;
    model.replace_output_projection(output)?;

    // Any trailing byte means the file does not match the declared layout.
    let mut probe = [0u8; 1];
    match reader.read(&mut probe) {
        Ok(0) => {}
        Ok(_) => {
            return Err(TinyLlamaError::FileFormat(
                "unexpected data at end of weights file".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    log::debug!(
        "loaded weights for {} layers from {}",
        cfg.num_layers,
        path.display()
    );
    Ok(())
}

/// Write the model's live tensors in the weight-file layout.
pub fn save_weights(model: &TinyLlamaModel, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let cfg = model.config();

    writer.write_all(&WEIGHTS_MAGIC.to_ne_bytes())?;
    writer.write_all(&WEIGHTS_VERSION.to_ne_bytes())?;

    writer.write_all(&(cfg.model_dim as i32).to_ne_bytes())?;
    writer.write_all(&(cfg.num_layers as i32).to_ne_bytes())?;
    writer.write_all(&(cfg.num_heads as i32).to_ne_bytes())?;
    writer.write_all(&(cfg.ffn_hidden_dim as i32).to_ne_bytes())?;
    writer.write_all(&(cfg.max_sequence_length as i32).to_ne_bytes())?;
    writer.write_all(&(cfg.vocab_size as i32).to_ne_bytes())?;
    writer.write_all(&cfg.dropout_rate.to_ne_bytes())?;

    model.embedding_weights().write_to(&mut writer)?;
    model.position_embeddings().write_to(&mut writer)?;

    for block in model.blocks() {
        block.attention().write_weights(&mut writer)?;
        block.ffn().write_weights(&mut writer)?;
        block.write_norm_weights(&mut writer)?;
    }

    model.output_projection().write_to(&mut writer)?;
    writer.flush()?;

    log::debug!(
        "saved weights for {} layers to {}",
        cfg.num_layers,
        path.display()
    );
    Ok(())
}
