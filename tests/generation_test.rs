mod common;

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use tinyllama::loader::{WEIGHTS_MAGIC, WEIGHTS_VERSION};
use tinyllama::{TinyLlamaError, TinyLlamaModel};

fn push_matrix<F: Fn(usize, usize) -> f32>(buf: &mut Vec<u8>, rows: usize, cols: usize, f: F) {
    buf.extend_from_slice(&(rows as u64).to_ne_bytes());
    buf.extend_from_slice(&(cols as u64).to_ne_bytes());
    for r in 0..rows {
        for c in 0..cols {
            buf.extend_from_slice(&f(r, c).to_ne_bytes());
        }
    }
}

fn push_vector(buf: &mut Vec<u8>, len: usize, value: f32) {
    buf.extend_from_slice(&(len as u64).to_ne_bytes());
    for _ in 0..len {
        buf.extend_from_slice(&value.to_ne_bytes());
    }
}

/// Hand-build a weight file where every block is silenced (zero layer-norm
/// weights) and the output projection routes all mass to `favored_token`.
/// The model then deterministically emits `favored_token` first.
fn write_rigged_weights(path: &Path, favored_token: usize) {
    let cfg = common::small_config();
    let mut buf = Vec::new();

    buf.extend_from_slice(&WEIGHTS_MAGIC.to_ne_bytes());
    buf.extend_from_slice(&WEIGHTS_VERSION.to_ne_bytes());
    buf.extend_from_slice(&(cfg.model_dim as i32).to_ne_bytes());
    buf.extend_from_slice(&(cfg.num_layers as i32).to_ne_bytes());
    buf.extend_from_slice(&(cfg.num_heads as i32).to_ne_bytes());
    buf.extend_from_slice(&(cfg.ffn_hidden_dim as i32).to_ne_bytes());
    buf.extend_from_slice(&(cfg.max_sequence_length as i32).to_ne_bytes());
    buf.extend_from_slice(&(cfg.vocab_size as i32).to_ne_bytes());
    buf.extend_from_slice(&cfg.dropout_rate.to_ne_bytes());

    // Constant embeddings, zero position rows.
    push_matrix(&mut buf, cfg.vocab_size, cfg.model_dim, |_, _| 0.5);
    push_matrix(&mut buf, cfg.max_sequence_length, cfg.model_dim, |_, _| 0.0);

    for _ in 0..cfg.num_layers {
        for _ in 0..4 {
            push_matrix(&mut buf, cfg.model_dim, cfg.model_dim, |_, _| 0.0);
        }
        push_matrix(&mut buf, cfg.model_dim, cfg.ffn_hidden_dim, |_, _| 0.0);
        push_vector(&mut buf, cfg.ffn_hidden_dim, 0.0);
        push_matrix(&mut buf, cfg.ffn_hidden_dim, cfg.model_dim, |_, _| 0.0);
        push_vector(&mut buf, cfg.model_dim, 0.0);
        // Zero norm weights silence both sublayers.
        for _ in 0..4 {
            push_vector(&mut buf, cfg.model_dim, 0.0);
        }
    }

    push_matrix(&mut buf, cfg.model_dim, cfg.vocab_size, |_, c| {
        if c == favored_token {
            1.0
        } else {
            0.0
        }
    });

    fs::write(path, &buf).unwrap();
}

#[test]
fn zero_max_tokens_is_rejected() {
    let dir = tempdir().unwrap();
    let model = common::build_model(dir.path());
    assert!(matches!(
        model.generate_text("hello", 0, 1.0),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
}

#[test]
fn generation_requires_initialization() {
    let model = TinyLlamaModel::with_config(common::small_config()).unwrap();
    assert!(matches!(
        model.generate_text("hello", 5, 1.0),
        Err(TinyLlamaError::NotInitialized(_))
    ));
}

#[test]
fn output_always_starts_with_the_prompt() {
    let dir = tempdir().unwrap();
    let model = common::build_model(dir.path());
    let prompt = "hello world";
    let output = model.generate_text(prompt, 4, 1.0).unwrap();
    assert!(
        output.starts_with(prompt),
        "output {:?} does not start with prompt",
        output
    );
}

#[test]
fn generation_stops_at_max_sequence_length() {
    let dir = tempdir().unwrap();
    let model = common::build_model(dir.path());

    // 8 words + 7 separating spaces = 15 prompt tokens against a cap of 16.
    let prompt = "hello hello hello hello hello hello hello hello";
    assert_eq!(model.tokenize(prompt).unwrap().len(), 15);

    // Only one slot remains before the cap, so exactly one token is
    // generated no matter how large max_tokens is.
    let prompt_ids = model.tokenize(prompt).unwrap();
    let logits = model.forward(&prompt_ids).unwrap();
    let next = model.sample_token(&model.softmax(&logits, 1.0)).unwrap();
    let expected = format!("{}{}", prompt, model.detokenize(&[next]).unwrap());

    let output = model.generate_text(prompt, 10, 1.0).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn overlong_prompts_are_truncated_but_echoed_verbatim() {
    let dir = tempdir().unwrap();
    let model = common::build_model(dir.path());

    // 20 words + 19 spaces = 39 tokens, beyond the 16-token cap.
    let prompt = std::iter::repeat("hello")
        .take(20)
        .collect::<Vec<_>>()
        .join(" ");
    let output = model.generate_text(&prompt, 4, 1.0).unwrap();
    assert!(output.starts_with(&prompt));
}

#[test]
fn generation_stops_at_the_eos_token() {
    let dir = tempdir().unwrap();
    let weights = dir.path().join("weights.bin");

    let mut model = common::build_model(dir.path());
    let eos_id = model.tokenizer().unwrap().vocab().eos_id();
    write_rigged_weights(&weights, eos_id);
    model.load_weights(&weights).unwrap();

    let output = model.generate_text("hello", 10, 1.0).unwrap();
    // The very first sampled token is <eos>, so generation stops after it.
    assert_eq!(output, "hello<eos>");
}

#[test]
fn rigged_model_emits_the_favored_token() {
    let dir = tempdir().unwrap();
    let weights = dir.path().join("weights.bin");

    let mut model = common::build_model(dir.path());
    write_rigged_weights(&weights, common::WORLD_ID);
    model.load_weights(&weights).unwrap();

    let output = model.generate_text("hello", 3, 1.0).unwrap();
    assert_eq!(output, "helloworldworldworld");
}

#[test]
fn temperature_does_not_change_greedy_selection() {
    let dir = tempdir().unwrap();
    let model = common::build_model(dir.path());
    let cold = model.generate_text("hello", 4, 0.5).unwrap();
    let hot = model.generate_text("hello", 4, 5.0).unwrap();
    // Softmax is monotone, so argmax selection is temperature-invariant.
    assert_eq!(cold, hot);
}
