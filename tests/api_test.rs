mod common;

use std::fs;

use tempfile::tempdir;

use tinyllama::{TinyLlama, TinyLlamaError};

/// A model directory with vocab.txt, merges.txt and a weights.bin saved
/// from the small test configuration.
fn write_model_dir(dir: &std::path::Path) {
    let model = common::build_model(dir);
    model.save_weights(dir.join("weights.bin")).unwrap();
}

fn ready_facade(dir: &std::path::Path) -> TinyLlama {
    write_model_dir(dir);
    let mut llama = TinyLlama::with_config(common::small_config()).unwrap();
    llama.initialize(dir).unwrap();
    llama
}

#[test]
fn new_facade_is_not_ready() {
    let llama = TinyLlama::new().unwrap();
    assert!(!llama.is_ready());
    assert!(matches!(
        llama.generate("hello", 5),
        Err(TinyLlamaError::NotInitialized(_))
    ));
    assert!(matches!(
        llama.tokenize_to_ids("hello"),
        Err(TinyLlamaError::NotInitialized(_))
    ));
    assert!(matches!(
        llama.get_vocab_size(),
        Err(TinyLlamaError::NotInitialized(_))
    ));
}

#[test]
fn initialize_rejects_missing_directory() {
    let mut llama = TinyLlama::new().unwrap();
    let err = llama.initialize("/definitely/not/a/real/path").unwrap_err();
    assert!(matches!(err, TinyLlamaError::Io(_)));
    assert!(!llama.is_ready());
}

#[test]
fn initialize_rejects_file_as_directory() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("plain.txt");
    fs::write(&file, "not a directory").unwrap();

    let mut llama = TinyLlama::new().unwrap();
    assert!(matches!(
        llama.initialize(&file),
        Err(TinyLlamaError::Io(_))
    ));
}

#[test]
fn initialize_requires_all_three_files() {
    let dir = tempdir().unwrap();
    // vocab.txt and merges.txt but no weights.bin.
    common::write_tokenizer_files(dir.path());

    let mut llama = TinyLlama::with_config(common::small_config()).unwrap();
    let err = llama.initialize(dir.path()).unwrap_err();
    assert!(matches!(err, TinyLlamaError::Io(_)));
    assert!(!llama.is_ready());
}

#[test]
fn initialize_happy_path() {
    let dir = tempdir().unwrap();
    let llama = ready_facade(dir.path());

    assert!(llama.is_ready());
    assert_eq!(llama.get_vocab_size().unwrap(), 16);
}

#[test]
fn initialize_with_explicit_paths() {
    let dir = tempdir().unwrap();
    write_model_dir(dir.path());

    let mut llama = TinyLlama::with_config(common::small_config()).unwrap();
    llama
        .initialize_with_config(
            dir.path().join("vocab.txt"),
            dir.path().join("merges.txt"),
            dir.path().join("weights.bin"),
        )
        .unwrap();
    assert!(llama.is_ready());
}

#[test]
fn double_initialization_is_rejected() {
    let dir = tempdir().unwrap();
    let mut llama = ready_facade(dir.path());
    assert!(matches!(
        llama.initialize(dir.path()),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
    // Still usable with the first initialization.
    assert!(llama.is_ready());
}

#[test]
fn generate_returns_prompt_prefixed_text() {
    let dir = tempdir().unwrap();
    let llama = ready_facade(dir.path());

    let output = llama.generate("hello world", 3).unwrap();
    assert!(output.starts_with("hello world"));
}

#[test]
fn generate_validates_arguments() {
    let dir = tempdir().unwrap();
    let llama = ready_facade(dir.path());

    assert!(matches!(
        llama.generate("", 5),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
    assert!(matches!(
        llama.generate("bad\0prompt", 5),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
    assert!(matches!(
        llama.generate("hello", 0),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
    // Above the model's 16-token sequence cap.
    assert!(matches!(
        llama.generate("hello", 17),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
    assert!(matches!(
        llama.generate("hello", 20_000),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
}

#[test]
fn tokenize_and_detokenize_roundtrip() {
    let dir = tempdir().unwrap();
    let llama = ready_facade(dir.path());

    let ids = llama.tokenize_to_ids("hello").unwrap();
    assert_eq!(ids, vec![common::HELLO_ID]);

    let strings = llama.tokenize_to_strings("hello world").unwrap();
    assert_eq!(strings, vec!["hello", " ", "world"]);

    assert_eq!(llama.detokenize(&ids).unwrap(), "hello");
    // Empty inputs are allowed for tokenization.
    assert!(llama.tokenize_to_ids("").unwrap().is_empty());
    assert_eq!(llama.detokenize(&[]).unwrap(), "");
}

#[test]
fn detokenize_rejects_oversized_input() {
    let dir = tempdir().unwrap();
    let llama = ready_facade(dir.path());

    let ids = vec![0usize; 100_001];
    assert!(matches!(
        llama.detokenize(&ids),
        Err(TinyLlamaError::InvalidConfig(_))
    ));
}

#[test]
fn set_temperature_validates_range() {
    let dir = tempdir().unwrap();
    let mut llama = ready_facade(dir.path());

    llama.set_temperature(0.7).unwrap();
    assert!(llama.set_temperature(0.0).is_err());
    assert!(llama.set_temperature(-1.0).is_err());
    assert!(llama.set_temperature(f32::NAN).is_err());
    assert!(llama.set_temperature(f32::INFINITY).is_err());
    assert!(llama.set_temperature(2000.0).is_err());
}
